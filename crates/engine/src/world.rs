use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::component::{Component, UpdateContext};
use crate::entity::{Entity, EntityArena, EntityError, EntityId};
use crate::event::{Event, EventBus, ListenerConfig, ListenerContext, SubscriptionId};
use crate::input::InputSnapshot;
use crate::pool::{VectorPool, DEFAULT_VEC2_POOL_SIZE};
use crate::scene::Scene;
use crate::vector::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldConfig {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub vec2_pool_size: usize,
    pub rng_seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            tile_size: 32,
            vec2_pool_size: DEFAULT_VEC2_POOL_SIZE,
            rng_seed: 0x5eed,
        }
    }
}

/// Sounds requested by gameplay. There is no mixer; playback is logged.
#[derive(Debug, Default)]
pub struct AudioLog {
    counts: HashMap<String, u32>,
    last: Option<String>,
}

impl AudioLog {
    pub fn play(&mut self, name: &str) {
        info!(sound = name, "sound_played");
        *self.counts.entry(name.to_string()).or_default() += 1;
        self.last = Some(name.to_string());
    }

    pub fn count(&self, name: &str) -> u32 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

/// Everything mutable in a running world except the event bus.
///
/// Event callbacks receive this through their [`ListenerContext`].
pub struct WorldState {
    entities: EntityArena,
    vectors: VectorPool,
    scene: Scene,
    input: InputSnapshot,
    rng: StdRng,
    config: WorldConfig,
    audio: AudioLog,
    elapsed: f64,
}

impl WorldState {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            entities: EntityArena::default(),
            vectors: VectorPool::with_vec2_pool(config.vec2_pool_size),
            scene: Scene::default(),
            input: InputSnapshot::empty(),
            rng: StdRng::seed_from_u64(config.rng_seed),
            config,
            audio: AudioLog::default(),
            elapsed: 0.0,
        }
    }

    pub fn entities(&self) -> &EntityArena {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityArena {
        &mut self.entities
    }

    pub fn vectors(&self) -> &VectorPool {
        &self.vectors
    }

    pub fn vectors_mut(&mut self) -> &mut VectorPool {
        &mut self.vectors
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn input(&self) -> &InputSnapshot {
        &self.input
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn audio(&self) -> &AudioLog {
        &self.audio
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Simulated seconds since the world was built.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn play_sound(&mut self, name: &str) {
        self.audio.play(name);
    }

    /// Creates an entity in the arena without adding it to the scene.
    pub fn spawn_detached(&mut self, name: &str) -> Result<EntityId, EntityError> {
        Ok(self.entities.create(name, &mut self.vectors)?)
    }

    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.entities.get(id).map(|e| e.position(&self.vectors))
    }

    pub fn velocity(&self, id: EntityId) -> Option<Vec2> {
        self.entities.get(id).map(|e| e.velocity(&self.vectors))
    }

    pub fn set_position(&mut self, id: EntityId, pos: Vec2) -> bool {
        let Some(entity) = self.entities.get(id) else {
            return false;
        };
        entity.set_position(&mut self.vectors, pos);
        true
    }

    pub fn set_velocity(&mut self, id: EntityId, vel: Vec2) -> bool {
        let Some(entity) = self.entities.get(id) else {
            return false;
        };
        entity.set_velocity(&mut self.vectors, vel);
        true
    }

    pub fn world_coords(&self, id: EntityId) -> Option<Vec2> {
        self.entities.world_coords(id, &self.vectors)
    }

    /// Recomputes and caches the world position of `id`.
    pub(crate) fn refresh_world_coords(&mut self, id: EntityId) -> Option<Vec2> {
        let coords = self.entities.world_coords(id, &self.vectors)?;
        self.entities
            .get(id)?
            .set_cached_world_coords(&mut self.vectors, coords);
        Some(coords)
    }
}

/// The runtime context: scene, entities, pools, event bus, input and RNG.
pub struct World {
    state: WorldState,
    events: EventBus,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            state: WorldState::new(config),
            events: EventBus::default(),
        }
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut WorldState {
        &mut self.state
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn config(&self) -> &WorldConfig {
        &self.state.config
    }

    pub fn set_input(&mut self, input: InputSnapshot) {
        self.state.input = input;
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.state.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.state.entities.get_mut(id)
    }

    pub fn entity_count(&self) -> usize {
        self.state.scene.entity_count()
    }

    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.state.entities.find_by_name(name).map(Entity::id)
    }

    pub fn world_coords(&self, id: EntityId) -> Option<Vec2> {
        self.state.world_coords(id)
    }

    pub fn create_entity(&mut self, name: &str) -> Result<EntityId, EntityError> {
        self.state.spawn_detached(name)
    }

    /// Attaches `component` and runs its attach hook.
    pub fn add_component(&mut self, id: EntityId, component: Component) -> Result<(), EntityError> {
        let WorldState {
            entities,
            vectors,
            rng,
            ..
        } = &mut self.state;
        let entity = entities
            .get_mut(id)
            .ok_or(EntityError::UnknownEntity(id))?;
        if let Err(err) = entity.add_component(component, vectors) {
            warn!(error = %err, "component_rejected");
            return Err(err);
        }
        let entity = entities.get(id).ok_or(EntityError::UnknownEntity(id))?;
        if let Some(component) = entity.components().last() {
            component.on_attach(entity, vectors, rng);
        }
        Ok(())
    }

    /// Puts `id` into the live set and fires `entityadded`. Parented
    /// entities are updated through their parent and cannot be roots.
    pub fn add(&mut self, id: EntityId) -> Result<(), EntityError> {
        let entity = self
            .state
            .entities
            .get(id)
            .ok_or(EntityError::UnknownEntity(id))?;
        if let Some(parent) = entity.parent() {
            warn!(entity = %entity.name, "parented_entity_not_added");
            return Err(EntityError::InvalidParent { parent, child: id });
        }
        self.state.scene.add(id);
        self.fire(Event::entity_added(id));
        Ok(())
    }

    /// Queues `id` for removal at the next update. Repeated calls before the
    /// flush are ignored.
    pub fn remove(&mut self, id: EntityId) -> bool {
        self.state.scene.remove(id)
    }

    /// Parents `child` under `parent`, taking it out of the live set if it
    /// was a root.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> Result<(), EntityError> {
        let entities = &self.state.entities;
        if parent == child
            || !entities.contains(parent)
            || !entities.contains(child)
            || self.is_ancestor(child, parent)
        {
            return Err(EntityError::InvalidParent { parent, child });
        }
        self.detach_from_parent_quiet(child);
        self.state.scene.detach(child);
        self.state.scene.mark_dirty();

        if let Some(entity) = self.state.entities.get_mut(parent) {
            entity.children.push(child);
        }
        if let Some(entity) = self.state.entities.get_mut(child) {
            entity.parent = Some(parent);
        }
        self.fire(Event::child_added(parent, child));
        Ok(())
    }

    fn is_ancestor(&self, candidate: EntityId, of: EntityId) -> bool {
        let mut current = self.state.entities.get(of).and_then(Entity::parent);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.state.entities.get(id).and_then(Entity::parent);
        }
        false
    }

    /// Moves `child` back to the scene root. Returns false when it had no parent.
    pub fn detach_from_parent(&mut self, child: EntityId) -> bool {
        if !self.detach_from_parent_quiet(child) {
            return false;
        }
        self.state.scene.add(child);
        true
    }

    fn detach_from_parent_quiet(&mut self, child: EntityId) -> bool {
        let Some(parent) = self.state.entities.get(child).and_then(Entity::parent) else {
            return false;
        };
        if let Some(entity) = self.state.entities.get_mut(parent) {
            entity.children.retain(|id| *id != child);
        }
        if let Some(entity) = self.state.entities.get_mut(child) {
            entity.parent = None;
        }
        true
    }

    pub fn has_child(&self, id: EntityId, name: &str) -> bool {
        self.state.entities.has_child(id, name)
    }

    pub fn on(
        &mut self,
        event: &str,
        config: ListenerConfig,
        callback: impl FnMut(&Event, &mut ListenerContext<'_>) + 'static,
    ) -> SubscriptionId {
        self.events.on(event, None, config, callback)
    }

    /// Subscribes on behalf of `id`. The subscription is dropped when the
    /// entity is destroyed.
    pub fn on_entity(
        &mut self,
        id: EntityId,
        event: &str,
        config: ListenerConfig,
        callback: impl FnMut(&Event, &mut ListenerContext<'_>) + 'static,
    ) -> Result<SubscriptionId, EntityError> {
        if !self.state.entities.contains(id) {
            return Err(EntityError::UnknownEntity(id));
        }
        let subscription = self.events.on(event, Some(id), config, callback);
        if let Some(entity) = self.state.entities.get_mut(id) {
            entity.registered_events.push(subscription);
        }
        Ok(subscription)
    }

    pub fn off(&mut self, subscription: SubscriptionId) -> bool {
        for entity in self.state.entities.iter_mut() {
            entity.registered_events.retain(|id| *id != subscription);
        }
        self.events.off(subscription)
    }

    pub fn fire(&mut self, event: Event) {
        self.events.fire(event, &mut self.state);
    }

    /// One simulation step: replay deferred events, flush removals, then
    /// update every live entity.
    pub fn update(&mut self, dt: f32) {
        self.state.elapsed += f64::from(dt);

        for event in self.state.scene.take_deferred() {
            self.fire(event);
        }

        let queued = self.state.scene.take_delete_queue();
        if !queued.is_empty() {
            for id in &queued {
                if self.state.entities.contains(*id) {
                    self.fire(Event::death(*id));
                    self.state.scene.defer(Event::remove(*id));
                }
            }
            for id in queued {
                self.destroy(id);
            }
            self.state.scene.mark_dirty();
        }

        let roots: Vec<EntityId> = self.state.scene.live_ids().collect();
        for id in roots {
            self.update_entity(id, dt);
        }
    }

    fn update_entity(&mut self, id: EntityId, dt: f32) {
        let Some(mut entity) = self.state.entities.take(id) else {
            return;
        };

        let mut components = std::mem::take(&mut entity.components);
        {
            let WorldState {
                entities,
                vectors,
                scene,
                input,
                rng,
                config,
                ..
            } = &mut self.state;
            for component in &mut components {
                let mut ctx = UpdateContext {
                    dt,
                    entity: &mut entity,
                    vectors: &mut *vectors,
                    entities: &*entities,
                    scene: &mut *scene,
                    input: &*input,
                    rng: &mut *rng,
                    config: &*config,
                };
                component.update(&mut ctx);
            }
        }
        // Components attached mid-update go after the existing ones.
        let added = std::mem::replace(&mut entity.components, components);
        entity.components.extend(added);

        let vel = entity.velocity(&self.state.vectors);
        if vel.is_finite() {
            entity.integrate(&mut self.state.vectors, dt);
        } else {
            error!(
                entity = %entity.name,
                vel_x = vel.x,
                vel_y = vel.y,
                "non_finite_velocity"
            );
        }

        let children = entity.children.clone();
        self.state.entities.restore(entity);
        for child in children {
            self.update_entity(child, dt);
        }
    }

    /// Drops `id` and its subtree: listeners, pooled vectors and arena slots.
    fn destroy(&mut self, id: EntityId) {
        let Some(mut entity) = self.state.entities.take(id) else {
            return;
        };
        self.state.scene.detach(id);
        if let Some(parent) = entity.parent.and_then(|p| self.state.entities.get_mut(p)) {
            parent.children.retain(|child| *child != id);
        }
        for subscription in std::mem::take(&mut entity.registered_events) {
            self.events.off(subscription);
        }
        entity.release_resources(&mut self.state.vectors);
        debug!(entity = %entity.name, id = id.0, "entity_destroyed");

        for child in std::mem::take(&mut entity.children) {
            self.destroy(child);
        }
    }

    /// Destroys every entity and empties the scene queues. Global listeners
    /// survive; the host is expected to spawn the level again.
    pub fn restart(&mut self) {
        let entity_count = self.state.entities.len();
        for mut entity in self.state.entities.drain() {
            for subscription in std::mem::take(&mut entity.registered_events) {
                self.events.off(subscription);
            }
            entity.release_resources(&mut self.state.vectors);
        }
        self.state.scene.clear();
        self.events.clear_only_once();
        info!(entity_count, "world_restarted");
    }
}
