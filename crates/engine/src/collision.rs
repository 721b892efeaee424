use tracing::debug;

use crate::entity::EntityId;
use crate::event::Event;
use crate::world::World;

/// Pairwise circle tests over a cached list of collidable entities.
///
/// The cache is rebuilt only when the scene reports a membership change.
#[derive(Debug)]
pub struct CollisionSystem {
    cache: Vec<EntityId>,
    first_run: bool,
    enabled: bool,
    last_checks: usize,
    last_hits: usize,
}

impl Default for CollisionSystem {
    fn default() -> Self {
        Self {
            cache: Vec::new(),
            first_run: true,
            enabled: true,
            last_checks: 0,
            last_hits: 0,
        }
    }
}

impl CollisionSystem {
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pairs that passed the mask test during the last check.
    pub fn last_check_count(&self) -> usize {
        self.last_checks
    }

    pub fn last_hit_count(&self) -> usize {
        self.last_hits
    }

    pub fn cached(&self) -> &[EntityId] {
        &self.cache
    }

    /// Rebuilds the candidate list from live roots and their direct children.
    pub fn gather(&mut self, world: &mut World) {
        let state = world.state_mut();
        if !self.first_run && !state.scene().is_dirty() {
            return;
        }
        self.first_run = false;

        self.cache.clear();
        let entities = state.entities();
        for id in state.scene().live_ids() {
            let Some(entity) = entities.get(id) else {
                continue;
            };
            if entity.collidable().is_some() {
                self.cache.push(id);
            }
            for child in entity.children() {
                if entities.get(*child).is_some_and(|c| c.collidable().is_some()) {
                    self.cache.push(*child);
                }
            }
        }
        state.scene_mut().mark_clean();
        debug!(candidates = self.cache.len(), "collision_cache_rebuilt");
    }

    /// Fires `collision` for every overlapping pair whose masks agree.
    pub fn check(&mut self, world: &mut World) {
        self.last_checks = 0;
        self.last_hits = 0;
        if !self.enabled {
            return;
        }

        for id in &self.cache {
            world.state_mut().refresh_world_coords(*id);
        }

        for i in 0..self.cache.len() {
            for j in (i + 1)..self.cache.len() {
                let (a, b) = (self.cache[i], self.cache[j]);
                if self.test_pair(world, a, b) {
                    self.last_hits += 1;
                    world.fire(Event::collision(a, b));
                }
            }
        }
    }

    fn test_pair(&mut self, world: &World, a: EntityId, b: EntityId) -> bool {
        let state = world.state();
        // Either side may have been destroyed by an earlier listener.
        let (Some(entity_a), Some(entity_b)) = (state.entities().get(a), state.entities().get(b))
        else {
            return false;
        };
        let (Some(col_a), Some(col_b)) = (entity_a.collidable(), entity_b.collidable()) else {
            return false;
        };
        if !col_a.enabled || !col_b.enabled || !col_a.accepts(col_b) {
            return false;
        }
        self.last_checks += 1;

        let pos_a = entity_a.cached_world_coords(state.vectors());
        let pos_b = entity_b.cached_world_coords(state.vectors());
        pos_a.distance(pos_b) <= col_a.bounds.radius + col_b.bounds.radius
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::component::{Collidable, Component};
    use crate::event::{EventPayload, ListenerConfig, COLLISION};
    use crate::vector::Vec2;
    use crate::world::WorldConfig;

    fn spawn_collidable(world: &mut World, name: &str, pos: Vec2, col: Collidable) -> EntityId {
        let id = world.create_entity(name).expect("create");
        world.state_mut().set_position(id, pos);
        world
            .add_component(id, Component::collidable(col))
            .expect("collidable");
        world.add(id).expect("add");
        id
    }

    fn count_collisions(world: &mut World) -> Rc<RefCell<Vec<EventPayload>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        world.on(COLLISION, ListenerConfig::default(), move |event, _| {
            sink.borrow_mut().push(event.payload);
        });
        log
    }

    fn step(system: &mut CollisionSystem, world: &mut World) {
        system.gather(world);
        system.check(world);
    }

    #[test]
    fn fires_iff_distance_within_radii() {
        for (distance, expected) in [(30.0, 1), (31.0, 1), (31.5, 0)] {
            let mut world = World::new(WorldConfig::default());
            let log = count_collisions(&mut world);
            spawn_collidable(&mut world, "food", Vec2::new(64.0, 64.0), Collidable::new(1, 2, 16.0));
            spawn_collidable(
                &mut world,
                "pacslider",
                Vec2::new(64.0 + distance, 64.0),
                Collidable::new(2, 1, 15.0),
            );

            let mut system = CollisionSystem::default();
            step(&mut system, &mut world);

            assert_eq!(log.borrow().len(), expected, "distance {distance}");
        }
    }

    #[test]
    fn one_sided_masks_never_collide() {
        let mut world = World::new(WorldConfig::default());
        let log = count_collisions(&mut world);
        spawn_collidable(&mut world, "a", Vec2::ZERO, Collidable::new(1, 2, 16.0));
        spawn_collidable(&mut world, "b", Vec2::ZERO, Collidable::new(2, 2, 16.0));

        let mut system = CollisionSystem::default();
        step(&mut system, &mut world);

        assert!(log.borrow().is_empty());
        assert_eq!(system.last_check_count(), 0);
    }

    #[test]
    fn disabled_collidable_or_system_is_skipped() {
        let mut world = World::new(WorldConfig::default());
        let log = count_collisions(&mut world);
        let a = spawn_collidable(&mut world, "a", Vec2::ZERO, Collidable::new(1, 2, 16.0));
        spawn_collidable(&mut world, "b", Vec2::ZERO, Collidable::new(2, 1, 16.0));
        let mut system = CollisionSystem::default();

        system.set_enabled(false);
        step(&mut system, &mut world);
        assert!(log.borrow().is_empty());

        system.set_enabled(true);
        world
            .entity_mut(a)
            .and_then(|e| e.collidable_mut())
            .expect("collidable")
            .enabled = false;
        step(&mut system, &mut world);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn cache_rebuilds_only_when_dirty() {
        let mut world = World::new(WorldConfig::default());
        spawn_collidable(&mut world, "a", Vec2::ZERO, Collidable::new(1, 2, 16.0));
        let mut system = CollisionSystem::default();

        system.gather(&mut world);
        assert_eq!(system.cached().len(), 1);
        assert!(!world.state().scene().is_dirty());

        let late = world.create_entity("late").expect("late");
        world
            .add_component(late, Component::collidable(Collidable::new(2, 1, 16.0)))
            .expect("collidable");
        world.state_mut().scene_mut().add(late);
        world.state_mut().scene_mut().mark_clean();
        system.gather(&mut world);
        assert_eq!(system.cached().len(), 1, "clean scene keeps the old cache");

        world.state_mut().scene_mut().mark_dirty();
        system.gather(&mut world);
        assert_eq!(system.cached().len(), 2);
    }

    #[test]
    fn child_collidables_use_world_coordinates() {
        let mut world = World::new(WorldConfig::default());
        let log = count_collisions(&mut world);
        let parent = world.create_entity("carrier").expect("carrier");
        world.state_mut().set_position(parent, Vec2::new(200.0, 0.0));
        world.add(parent).expect("add");
        let child = world.create_entity("hitbox").expect("hitbox");
        world
            .add_component(child, Component::collidable(Collidable::new(1, 2, 8.0)))
            .expect("collidable");
        world.add_child(parent, child).expect("child");
        spawn_collidable(&mut world, "sensor", Vec2::new(205.0, 0.0), Collidable::new(2, 1, 1.0));

        let mut system = CollisionSystem::default();
        step(&mut system, &mut world);

        assert_eq!(log.borrow().len(), 1);
        assert_eq!(system.cached().len(), 2);
    }

    #[test]
    fn food_scenario_resolves_player_as_self_and_removes_food() {
        let mut world = World::new(WorldConfig::default());
        let food = spawn_collidable(&mut world, "food", Vec2::new(64.0, 64.0), Collidable::new(1, 2, 16.0));
        let player = spawn_collidable(
            &mut world,
            "pacslider",
            Vec2::new(100.0, 64.0),
            Collidable::new(2, 1, 15.0),
        );
        let seen_by_player = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen_by_player);
        world
            .on_entity(player, COLLISION, ListenerConfig::only_self(), move |event, ctx| {
                sink.borrow_mut().push((ctx.context(), event.payload));
            })
            .expect("player listener");
        world
            .on_entity(food, COLLISION, ListenerConfig::only_self(), |event, ctx| {
                if let EventPayload::Pair { subject, other } = event.payload {
                    if ctx.entity(other).is_some_and(|e| e.name == "pacslider") {
                        ctx.remove(subject);
                    }
                }
            })
            .expect("food listener");

        world.state_mut().set_velocity(player, Vec2::new(-400.0, 0.0));
        let mut system = CollisionSystem::default();
        world.update(1.0 / 60.0);
        step(&mut system, &mut world);

        assert_eq!(
            seen_by_player.borrow().as_slice(),
            &[(
                Some(player),
                EventPayload::Pair {
                    subject: player,
                    other: food
                }
            )]
        );
        assert!(world.state().scene().contains(food));

        world.update(1.0 / 60.0);
        assert!(!world.state().scene().contains(food));
    }
}
