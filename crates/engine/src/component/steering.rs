//! Force-accumulating steering behaviours.
//!
//! Each behaviour keeps its scratch vectors in the shared `vec2` pool, adds a
//! steering force to its accumulator, applies the accumulator to velocity and
//! zeroes it again before the next frame.

use crate::entity::EntityId;
use crate::pool::{PoolError, PoolHandle, VectorPool};
use crate::vector::Vec2;

use super::UpdateContext;

const WANDER_INTERVAL_SECONDS: f32 = 0.1;
const SEPARATE_DESIRED_SPEED: f32 = 100.0;

fn release_all(vectors: &mut VectorPool, handles: &[PoolHandle]) {
    for handle in handles {
        vectors.free(*handle);
    }
}

fn clamp_speed(vel: &mut Vec2, max_speed: f32) {
    if vel.length() > max_speed {
        vel.normalize().scale(max_speed);
    }
}

/// Adds the accumulator to velocity, optionally clamps speed, then clears it.
fn apply_accumulator(ctx: &mut UpdateContext<'_>, acc: PoolHandle, max_speed: Option<f32>) {
    let force = ctx.vectors[acc];
    let mut vel = ctx.velocity() + force;
    if let Some(max_speed) = max_speed {
        clamp_speed(&mut vel, max_speed);
    }
    ctx.set_velocity(vel);
    ctx.vectors[acc].zero();
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FollowTarget {
    Cursor,
    Entity(EntityId),
}

/// Seeks a target at `max_speed`, turning by at most `max_steering` per frame.
#[derive(Debug)]
pub struct Follow {
    pub target: FollowTarget,
    pub max_speed: f32,
    pub max_steering: f32,
    acc: PoolHandle,
    target_pos: PoolHandle,
    desired: PoolHandle,
    steer: PoolHandle,
}

impl Follow {
    pub fn new(vectors: &mut VectorPool, target: FollowTarget) -> Result<Self, PoolError> {
        Ok(Self {
            target,
            max_speed: 200.0,
            max_steering: 1.0,
            acc: vectors.vec2()?,
            target_pos: vectors.vec2()?,
            desired: vectors.vec2()?,
            steer: vectors.vec2()?,
        })
    }

    pub fn with_limits(mut self, max_speed: f32, max_steering: f32) -> Self {
        self.max_speed = max_speed;
        self.max_steering = max_steering;
        self
    }

    #[cfg(test)]
    fn desired(&self, vectors: &VectorPool) -> Vec2 {
        vectors[self.desired]
    }

    pub(super) fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        let target = match self.target {
            FollowTarget::Cursor => ctx.input.cursor_position_px(),
            FollowTarget::Entity(id) => ctx.entities.get(id).map(|e| e.position(&*ctx.vectors)),
        };
        if let Some(target) = target {
            ctx.vectors[self.target_pos] = target;
            self.seek(ctx);
        }
        apply_accumulator(ctx, self.acc, Some(self.max_speed));
    }

    fn seek(&mut self, ctx: &mut UpdateContext<'_>) {
        let to_target = ctx.vectors[self.target_pos] - ctx.position();
        let desired = to_target.normalized() * self.max_speed;
        ctx.vectors[self.desired] = desired;

        let mut steer = desired - ctx.velocity();
        steer.limit(self.max_steering);
        ctx.vectors[self.steer] = steer;
        ctx.vectors[self.acc] += steer;
    }

    pub(super) fn release(&mut self, vectors: &mut VectorPool) {
        release_all(
            vectors,
            &[self.acc, self.target_pos, self.desired, self.steer],
        );
    }
}

/// Random nudges every tenth of a second.
#[derive(Debug)]
pub struct Wander {
    pub max_speed: f32,
    pub force: f32,
    pub launch: bool,
    timer: f32,
    acc: PoolHandle,
    nudge: PoolHandle,
}

impl Wander {
    pub fn new(vectors: &mut VectorPool) -> Result<Self, PoolError> {
        Ok(Self {
            max_speed: 100.0,
            force: 100.0,
            launch: true,
            timer: 0.0,
            acc: vectors.vec2()?,
            nudge: vectors.vec2()?,
        })
    }

    pub(super) fn launch_speed(&self) -> Option<f32> {
        self.launch.then_some(self.max_speed)
    }

    pub(super) fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        self.timer += ctx.dt;
        if self.timer > WANDER_INTERVAL_SECONDS {
            self.timer = 0.0;
            let nudge = Vec2::random_dir(ctx.rng) * self.force;
            ctx.vectors[self.nudge] = nudge;
            ctx.vectors[self.acc] += nudge;
        }
        apply_accumulator(ctx, self.acc, Some(self.max_speed));
    }

    pub(super) fn release(&mut self, vectors: &mut VectorPool) {
        release_all(vectors, &[self.acc, self.nudge]);
    }
}

/// Repulsion from every other live entity closer than `min_distance`.
///
/// Scans the whole scene each update. Speed is not clamped; the steering force
/// is capped at `max_force`.
#[derive(Debug)]
pub struct Separate {
    pub min_distance: f32,
    pub max_speed: f32,
    pub max_force: f32,
    pub launch: bool,
    acc: PoolHandle,
    sum: PoolHandle,
}

impl Separate {
    pub const DEFAULT_MAX_FORCE: f32 = 1.0;

    pub fn new(vectors: &mut VectorPool, min_distance: f32) -> Result<Self, PoolError> {
        Ok(Self {
            min_distance,
            max_speed: 100.0,
            max_force: Self::DEFAULT_MAX_FORCE,
            launch: true,
            acc: vectors.vec2()?,
            sum: vectors.vec2()?,
        })
    }

    pub(super) fn launch_speed(&self) -> Option<f32> {
        self.launch.then_some(self.max_speed)
    }

    pub(super) fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        self.separate(ctx);
        apply_accumulator(ctx, self.acc, None);
    }

    fn separate(&mut self, ctx: &mut UpdateContext<'_>) {
        let pos = ctx.position();
        ctx.vectors[self.sum].zero();
        let mut count = 0u32;

        for id in ctx.scene.live_ids() {
            let Some(other) = ctx.entities.get(id) else {
                continue;
            };
            let other_pos = other.position(&*ctx.vectors);
            let mut offset = Vec2::ZERO;
            Vec2::sub_into(&mut offset, pos, other_pos);
            let distance = offset.length();
            if distance > 0.0 && distance < self.min_distance {
                count += 1;
                offset.normalize().divide(distance);
                ctx.vectors[self.sum] += offset;
            }
        }

        if count == 0 {
            return;
        }

        let mut desired = ctx.vectors[self.sum];
        desired
            .divide(count as f32)
            .normalize()
            .scale(SEPARATE_DESIRED_SPEED);
        let mut steer = desired - ctx.velocity();
        steer.limit(self.max_force);
        ctx.vectors[self.acc] += steer;
    }

    pub(super) fn release(&mut self, vectors: &mut VectorPool) {
        release_all(vectors, &[self.acc, self.sum]);
    }
}

/// Inclusive rectangle in world pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn new(x: f32, y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            max: Vec2::new(max_x, max_y),
        }
    }
}

/// Steers back inside `bounds` whenever the entity strays out.
#[derive(Debug)]
pub struct StayInBounds {
    pub bounds: Bounds,
    pub max_speed: f32,
    pub steer_mag: f32,
    pub launch: bool,
    acc: PoolHandle,
    steer: PoolHandle,
    desired: PoolHandle,
}

impl StayInBounds {
    pub fn new(vectors: &mut VectorPool, bounds: Bounds) -> Result<Self, PoolError> {
        Ok(Self {
            bounds,
            max_speed: 100.0,
            steer_mag: 1.0,
            launch: true,
            acc: vectors.vec2()?,
            steer: vectors.vec2()?,
            desired: vectors.vec2()?,
        })
    }

    pub fn with_limits(mut self, max_speed: f32, steer_mag: f32) -> Self {
        self.max_speed = max_speed;
        self.steer_mag = steer_mag;
        self
    }

    pub(super) fn launch_speed(&self) -> Option<f32> {
        self.launch.then_some(self.max_speed)
    }

    pub(super) fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        let pos = ctx.position();
        let vel = ctx.velocity();
        let bounds = self.bounds;
        let speed = self.max_speed;

        if pos.x < bounds.min.x {
            self.apply_desired(ctx, Vec2::new(speed, vel.y));
        }
        if pos.y < bounds.min.y {
            self.apply_desired(ctx, Vec2::new(vel.x, speed));
        }
        if pos.x > bounds.max.x {
            self.apply_desired(ctx, Vec2::new(-speed, vel.y));
        }
        if pos.y > bounds.max.y {
            self.apply_desired(ctx, Vec2::new(vel.x, -speed));
        }

        apply_accumulator(ctx, self.acc, Some(self.max_speed));
    }

    fn apply_desired(&mut self, ctx: &mut UpdateContext<'_>, desired: Vec2) {
        ctx.vectors[self.desired] = desired;
        let mut steer = desired - ctx.velocity();
        steer.limit(self.steer_mag);
        ctx.vectors[self.steer] = steer;
        ctx.vectors[self.acc] += steer;
    }

    pub(super) fn release(&mut self, vectors: &mut VectorPool) {
        release_all(vectors, &[self.acc, self.steer, self.desired]);
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::entity::{Entity, EntityArena};
    use crate::input::InputSnapshot;
    use crate::pool::{DEFAULT_VEC2_POOL_SIZE, VEC2_POOL};
    use crate::scene::Scene;
    use crate::world::WorldConfig;

    struct Fixture {
        vectors: VectorPool,
        arena: EntityArena,
        scene: Scene,
        input: InputSnapshot,
        rng: StdRng,
        config: WorldConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                vectors: VectorPool::with_vec2_pool(DEFAULT_VEC2_POOL_SIZE),
                arena: EntityArena::default(),
                scene: Scene::default(),
                input: InputSnapshot::empty(),
                rng: StdRng::seed_from_u64(3),
                config: WorldConfig::default(),
            }
        }

        fn spawn_live(&mut self, name: &str, pos: Vec2) -> EntityId {
            let id = self.arena.create(name, &mut self.vectors).expect("create");
            self.arena
                .get(id)
                .expect("entity")
                .set_position(&mut self.vectors, pos);
            self.scene.add(id);
            id
        }

        /// Runs `f` with `id` detached from the arena, as the world update does.
        fn with_ctx(&mut self, id: EntityId, f: impl FnOnce(&mut UpdateContext<'_>)) {
            let mut entity: Entity = self.arena.take(id).expect("entity");
            {
                let mut ctx = UpdateContext {
                    dt: 1.0 / 60.0,
                    entity: &mut entity,
                    vectors: &mut self.vectors,
                    entities: &self.arena,
                    scene: &mut self.scene,
                    input: &self.input,
                    rng: &mut self.rng,
                    config: &self.config,
                };
                f(&mut ctx);
            }
            self.arena.restore(entity);
        }

        fn velocity(&self, id: EntityId) -> Vec2 {
            self.arena.get(id).expect("entity").velocity(&self.vectors)
        }
    }

    #[test]
    fn follow_turns_toward_cursor_within_steering_limit() {
        let mut fx = Fixture::new();
        let ghost = fx.spawn_live("blinky", Vec2::new(0.0, 0.0));
        fx.input = InputSnapshot::empty().with_cursor_position_px(Some(Vec2::new(100.0, 0.0)));
        let mut follow = Follow::new(&mut fx.vectors, FollowTarget::Cursor)
            .expect("follow")
            .with_limits(200.0, 2.0);

        fx.with_ctx(ghost, |ctx| follow.update(ctx));

        let vel = fx.velocity(ghost);
        assert!((vel.x - 2.0).abs() < 0.0001);
        assert!(vel.y.abs() < 0.0001);
        assert_eq!(follow.desired(&fx.vectors), Vec2::new(200.0, 0.0));
    }

    #[test]
    fn follow_clamps_to_max_speed() {
        let mut fx = Fixture::new();
        let leader = fx.spawn_live("leader", Vec2::new(0.0, 50.0));
        let chaser = fx.spawn_live("chaser", Vec2::ZERO);
        fx.arena
            .get(chaser)
            .expect("chaser")
            .set_velocity(&mut fx.vectors, Vec2::new(0.0, 500.0));
        let mut follow =
            Follow::new(&mut fx.vectors, FollowTarget::Entity(leader)).expect("follow");

        fx.with_ctx(chaser, |ctx| follow.update(ctx));

        assert!((fx.velocity(chaser).length() - follow.max_speed).abs() < 0.001);
    }

    #[test]
    fn stay_in_bounds_pushes_back_inside() {
        let mut fx = Fixture::new();
        let id = fx.spawn_live("pinky", Vec2::new(-10.0, 50.0));
        let mut stay = StayInBounds::new(&mut fx.vectors, Bounds::new(0.0, 0.0, 100.0, 100.0))
            .expect("stay")
            .with_limits(100.0, 2.0);

        fx.with_ctx(id, |ctx| stay.update(ctx));

        let vel = fx.velocity(id);
        assert!((vel.x - 2.0).abs() < 0.0001);
        assert_eq!(fx.vectors[stay.acc], Vec2::ZERO);
    }

    #[test]
    fn stay_in_bounds_is_idle_inside() {
        let mut fx = Fixture::new();
        let id = fx.spawn_live("pinky", Vec2::new(50.0, 50.0));
        let mut stay =
            StayInBounds::new(&mut fx.vectors, Bounds::new(0.0, 0.0, 100.0, 100.0)).expect("stay");

        fx.with_ctx(id, |ctx| stay.update(ctx));

        assert_eq!(fx.velocity(id), Vec2::ZERO);
    }

    #[test]
    fn separate_pushes_away_from_close_neighbours_only() {
        let mut fx = Fixture::new();
        let me = fx.spawn_live("pinky", Vec2::new(0.0, 0.0));
        fx.spawn_live("near", Vec2::new(10.0, 0.0));
        fx.spawn_live("far", Vec2::new(0.0, 500.0));
        let mut separate = Separate::new(&mut fx.vectors, 32.0).expect("separate");
        separate.max_force = 3.0;

        fx.with_ctx(me, |ctx| separate.update(ctx));

        let vel = fx.velocity(me);
        assert!((vel.x + 3.0).abs() < 0.0001, "pushed left by the cap");
        assert!(vel.y.abs() < 0.0001, "far entity ignored");
    }

    #[test]
    fn separate_without_neighbours_leaves_velocity() {
        let mut fx = Fixture::new();
        let me = fx.spawn_live("alone", Vec2::ZERO);
        fx.arena
            .get(me)
            .expect("alone")
            .set_velocity(&mut fx.vectors, Vec2::new(5.0, 5.0));
        let mut separate = Separate::new(&mut fx.vectors, 32.0).expect("separate");

        fx.with_ctx(me, |ctx| separate.update(ctx));

        assert_eq!(fx.velocity(me), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn wander_nudges_after_interval_and_respects_max_speed() {
        let mut fx = Fixture::new();
        let id = fx.spawn_live("wanderer", Vec2::ZERO);
        let mut wander = Wander::new(&mut fx.vectors).expect("wander");

        fx.with_ctx(id, |ctx| {
            ctx.dt = 0.05;
            wander.update(ctx);
        });
        assert_eq!(fx.velocity(id), Vec2::ZERO);

        fx.with_ctx(id, |ctx| {
            ctx.dt = 0.06;
            wander.update(ctx);
        });
        let vel = fx.velocity(id);
        assert!(vel.length() > 0.0);
        assert!(vel.length() <= wander.max_speed + 0.001);
    }

    #[test]
    fn release_returns_scratch_vectors() {
        let mut fx = Fixture::new();
        let before = fx.vectors.in_use(VEC2_POOL).expect("in use");
        let mut follow = Follow::new(&mut fx.vectors, FollowTarget::Cursor).expect("follow");
        let with_follow = fx.vectors.in_use(VEC2_POOL).expect("in use");
        let mut separate = Separate::new(&mut fx.vectors, 10.0).expect("separate");
        assert_eq!(
            fx.vectors.in_use(VEC2_POOL).expect("in use"),
            with_follow + 2,
            "separate holds its accumulator and neighbour sum"
        );
        follow.release(&mut fx.vectors);
        separate.release(&mut fx.vectors);
        assert_eq!(fx.vectors.in_use(VEC2_POOL).expect("in use"), before);
    }
}
