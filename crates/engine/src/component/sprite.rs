use std::sync::Arc;

use crate::assets::{AnimationSet, AssetError, Atlas, Sprite};
use crate::render::Surface;
use crate::vector::Vec2;

use super::{DrawInfo, UpdateContext};

const MOVING_THRESHOLD: f32 = 0.01;

fn pixel_origin(origin: Vec2) -> (i32, i32) {
    (origin.x.round() as i32, origin.y.round() as i32)
}

/// Static image drawn at the entity's world position.
#[derive(Debug, Clone)]
pub struct SpriteRender {
    pub sprite: Arc<Sprite>,
    pub layer: String,
    pub z_index: i32,
    pub visible: bool,
    pub opacity: f32,
}

impl SpriteRender {
    pub fn new(sprite: Arc<Sprite>, layer: &str) -> Self {
        Self {
            sprite,
            layer: layer.to_string(),
            z_index: 0,
            visible: true,
            opacity: 1.0,
        }
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn set_sprite(&mut self, sprite: Arc<Sprite>) {
        self.sprite = sprite;
    }

    pub(super) fn draw_info(&self) -> Option<DrawInfo<'_>> {
        self.visible.then_some(DrawInfo {
            layer: &self.layer,
            z_index: self.z_index,
            opacity: self.opacity,
        })
    }

    pub(super) fn draw(&self, surface: &mut Surface, origin: Vec2) {
        let (x, y) = pixel_origin(origin);
        surface.draw_sprite(&self.sprite, x, y, self.opacity);
    }
}

/// Picks the playing animation from the entity's velocity each update.
#[derive(Debug, Clone, PartialEq)]
pub enum Facing {
    /// Four-way facing. Plays while moving, pauses when still.
    Cardinal {
        left: String,
        right: String,
        up: String,
        down: String,
    },
    /// Left/right only, switching at most once per `hold` seconds.
    Horizontal {
        left: String,
        right: String,
        hold: f32,
    },
}

/// Frame-stepped animation read from an atlas.
#[derive(Debug, Clone)]
pub struct SpriteRenderAnimation {
    atlas: Arc<Atlas>,
    animations: Arc<AnimationSet>,
    current: Option<String>,
    t: f32,
    delay_ms: Option<f32>,
    playing: bool,
    facing: Option<Facing>,
    since_switch: f32,
    pub time_offset: f32,
    pub layer: String,
    pub z_index: i32,
    pub visible: bool,
    pub opacity: f32,
}

impl SpriteRenderAnimation {
    pub fn new(atlas: Arc<Atlas>, animations: Arc<AnimationSet>, layer: &str) -> Self {
        Self {
            atlas,
            animations,
            current: None,
            t: 0.0,
            delay_ms: None,
            playing: false,
            facing: None,
            since_switch: 0.0,
            time_offset: 0.0,
            layer: layer.to_string(),
            z_index: 0,
            visible: true,
            opacity: 1.0,
        }
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn current_animation(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn elapsed(&self) -> f32 {
        self.t
    }

    /// Switches the active animation without touching the play state.
    pub fn set_animation(&mut self, name: &str) -> Result<(), AssetError> {
        if self.animations.get(name).is_none() {
            return Err(AssetError::UnknownAnimation {
                name: name.to_string(),
            });
        }
        if self.current.as_deref() != Some(name) {
            self.current = Some(name.to_string());
        }
        Ok(())
    }

    /// Starts playback from the first frame. No-op while already playing.
    pub fn play(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.t = 0.0;
    }

    pub fn play_animation(&mut self, name: &str) -> Result<(), AssetError> {
        self.set_animation(name)?;
        self.play();
        Ok(())
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Overrides the per-animation frame time. Negative values clamp to zero,
    /// and zero falls back to the animation's own timing.
    pub fn set_frame_delay(&mut self, ms: f32) {
        self.delay_ms = Some(ms.max(0.0));
    }

    pub fn frame_index(&self) -> Option<usize> {
        let clip = self.animations.get(self.current.as_deref()?)?;
        if clip.frames.is_empty() {
            return None;
        }
        let ms_per_frame = match self.delay_ms {
            Some(delay) if delay > 0.0 => delay,
            _ => clip.time,
        };
        if ms_per_frame <= 0.0 {
            return Some(0);
        }
        let t = (self.t + self.time_offset).max(0.0);
        let step = (t * 1000.0 / ms_per_frame).floor() as usize;
        Some(step % clip.frames.len())
    }

    pub fn current_frame(&self) -> Option<&Arc<Sprite>> {
        let clip = self.animations.get(self.current.as_deref()?)?;
        let frame = clip.frames.get(self.frame_index()?)?;
        self.atlas.get(frame)
    }

    pub(super) fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        self.face(ctx.velocity(), ctx.dt);
        if self.playing {
            self.t += ctx.dt;
        }
    }

    fn face(&mut self, vel: Vec2, dt: f32) {
        let Some(facing) = self.facing.take() else {
            return;
        };
        self.apply_facing(&facing, vel, dt);
        self.facing = Some(facing);
    }

    fn apply_facing(&mut self, facing: &Facing, vel: Vec2, dt: f32) {
        match facing {
            Facing::Cardinal {
                left,
                right,
                up,
                down,
            } => {
                let name = if vel.x < 0.0 {
                    Some(left)
                } else if vel.x > 0.0 {
                    Some(right)
                } else if vel.y < 0.0 {
                    Some(up)
                } else if vel.y > 0.0 {
                    Some(down)
                } else {
                    None
                };
                if let Some(name) = name {
                    self.set_facing_animation(name);
                }
                if vel.x.abs() > MOVING_THRESHOLD || vel.y.abs() > MOVING_THRESHOLD {
                    self.play();
                } else {
                    self.pause();
                }
            }
            Facing::Horizontal { left, right, hold } => {
                self.since_switch += dt;
                if self.since_switch < *hold {
                    return;
                }
                self.since_switch = 0.0;
                let name = if vel.x > 0.0 { right } else { left };
                self.set_facing_animation(name);
                self.play();
            }
        }
    }

    fn set_facing_animation(&mut self, name: &str) {
        if let Err(err) = self.set_animation(name) {
            tracing::warn!(error = %err, "facing_animation_missing");
        }
    }

    pub(super) fn draw_info(&self) -> Option<DrawInfo<'_>> {
        (self.visible && self.current.is_some()).then_some(DrawInfo {
            layer: &self.layer,
            z_index: self.z_index,
            opacity: self.opacity,
        })
    }

    pub(super) fn draw(&self, surface: &mut Surface, origin: Vec2) {
        let Some(frame) = self.current_frame() else {
            return;
        };
        let (x, y) = pixel_origin(origin);
        surface.draw_sprite(frame, x, y, self.opacity);
    }
}
