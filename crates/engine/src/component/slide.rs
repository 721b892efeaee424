use crate::input::InputAction;
use crate::vector::Vec2;

use super::UpdateContext;

const SLIDE_KEYS: [(InputAction, f32, f32); 4] = [
    (InputAction::MoveRight, 1.0, 0.0),
    (InputAction::MoveLeft, -1.0, 0.0),
    (InputAction::MoveUp, 0.0, -1.0),
    (InputAction::MoveDown, 0.0, 1.0),
];

/// Grid-slider movement: a direction press launches the entity at `speed`
/// until something stops it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slide {
    pub speed: f32,
}

impl Default for Slide {
    fn default() -> Self {
        Self { speed: 400.0 }
    }
}

impl Slide {
    pub fn new(speed: f32) -> Self {
        Self { speed }
    }

    pub(super) fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        for (action, x, y) in SLIDE_KEYS {
            if ctx.input.pressed(action) {
                self.slide(ctx, x, y);
            }
        }
        stay_in_viewport(ctx);
    }

    fn slide(&self, ctx: &mut UpdateContext<'_>, x: f32, y: f32) {
        let pos = ctx.position();
        let vel = ctx.velocity();
        // Turning is only allowed from a standstill on the other axis.
        if (x != 0.0 && vel.y != 0.0) || (y != 0.0 && vel.x != 0.0) {
            return;
        }

        let width = ctx.config.width as f32;
        let height = ctx.config.height as f32;
        let tile = ctx.config.tile_size as f32;
        if (pos.y == 0.0 && y < 0.0)
            || (pos.y == height - tile && y > 0.0)
            || (pos.x == 0.0 && x < 0.0)
            || (pos.x == width - tile && x > 0.0)
        {
            return;
        }

        ctx.set_velocity(Vec2::new(x * self.speed, y * self.speed));
    }
}

fn stay_in_viewport(ctx: &mut UpdateContext<'_>) {
    let mut pos = ctx.position();
    let mut vel = ctx.velocity();
    let tile = ctx.config.tile_size as f32;
    let max_x = ctx.config.width as f32 - tile * 2.0;
    let max_y = ctx.config.height as f32 - tile * 2.0;

    if pos.x < 0.0 && vel.x < 0.0 {
        pos.x = 0.0;
        vel.x = 0.0;
    }
    if pos.x > max_x && vel.x > 0.0 {
        pos.x = max_x;
        vel.x = 0.0;
    }
    if pos.y < tile {
        pos.y = tile;
        vel.y = 0.0;
    }
    if pos.y > max_y {
        pos.y = max_y;
        vel.y = 0.0;
    }

    ctx.set_position(pos);
    ctx.set_velocity(vel);
}
