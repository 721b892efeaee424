use std::sync::Arc;

use thiserror::Error;
use tile_engine::event::COLLISION;
use tile_engine::{
    grid_position, AnimationSet, AssetRegistry, Atlas, Bounds, Collidable, Component,
    ComponentKind, EntityError, EntityId, Event, EventPayload, Facing, Follow, FollowTarget, Game,
    GameCommand, InputAction, InputSnapshot, Level, ListenerConfig, ListenerContext, Separate,
    Slide, Sprite, SpriteRender, SpriteRenderAnimation, StayInBounds, Tileset, Vec2, World,
};
use tracing::{debug, info};

const TILE_PX: u32 = 32;
const TILE: f32 = TILE_PX as f32;
const PLAYER_SPAWN: Vec2 = Vec2::new(32.0, 96.0);
const SPRITE_LAYER: &str = "sprite";
const WALL_TAG: &str = "wall";
const FRAME_DELAY_MS: f32 = 100.0;

const PLAYER_NAME: &str = "pacslider";
const PLAYER_RADIUS: f32 = 15.0;
const PLAYER_TYPE: u32 = 2;
const PLAYER_MASK: u32 = 1;
const PLAYER_SPEED: f32 = 400.0;

const TILE_RADIUS: f32 = 16.0;
const TILE_TYPE: u32 = 1;
const TILE_MASK: u32 = 2;

const FOOD_TILE: u32 = 2;
const SWITCH_OFF_TILE: u32 = 9;
const SWITCH_ON_TILE: u32 = 10;
const SWITCH_COOLDOWN_SECONDS: f64 = 0.5;

const BLINKY_MAX_SPEED: f32 = 200.0;
const BLINKY_MAX_STEERING: f32 = 2.0;
const BLINKY_BOUNDS_MAX_SPEED: f32 = 400.0;
const BLINKY_BOUNDS_STEER: f32 = 10.0;
const BLINKY_FACING_HOLD_SECONDS: f32 = 0.25;

const PINKY_MIN_DISTANCE: f32 = 32.0;
const PINKY_BOUNDS_MAX_SPEED: f32 = 100.0;
const PINKY_BOUNDS_STEER: f32 = 2.0;

const SOUND_COIN: &str = "coin";
const SOUND_SWITCH: &str = "switch";

const TILESET_ASSET: &str = "tileset";
const ATLAS_ASSET: &str = "pac_atlas";
const ANIMATIONS_ASSET: &str = "pac_anim";
const LEVEL_ASSET: &str = "level1";

include!("types.rs");
include!("factories.rs");
include!("scene_impl.rs");

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
