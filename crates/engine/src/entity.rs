use std::collections::BTreeMap;

use thiserror::Error;

use crate::component::{Collidable, Component, ComponentKind};
use crate::event::SubscriptionId;
use crate::pool::{PoolError, PoolHandle, VectorPool};
use crate::vector::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityError {
    #[error("entity {0:?} does not exist")]
    UnknownEntity(EntityId),
    #[error("entity `{entity}` already has a component named `{component}`")]
    DuplicateComponent { entity: String, component: String },
    #[error("entity {child:?} cannot be parented to {parent:?}")]
    InvalidParent { parent: EntityId, child: EntityId },
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Pooled kinematic slots owned by one entity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Kinematics {
    pub(crate) pos: PoolHandle,
    pub(crate) vel: PoolHandle,
    pub(crate) acc: PoolHandle,
    pub(crate) distance: PoolHandle,
    pub(crate) world_coords: PoolHandle,
}

impl Kinematics {
    fn acquire(vectors: &mut VectorPool) -> Result<Self, PoolError> {
        Ok(Self {
            pos: vectors.vec2()?,
            vel: vectors.vec2()?,
            acc: vectors.vec2()?,
            distance: vectors.vec2()?,
            world_coords: vectors.vec2()?,
        })
    }

    fn release(self, vectors: &mut VectorPool) {
        for handle in [self.pos, self.vel, self.acc, self.distance, self.world_coords] {
            vectors.free(handle);
        }
    }
}

pub struct Entity {
    id: EntityId,
    pub name: String,
    pub tags: Vec<String>,
    pub visible: bool,
    pub opacity: f32,
    pub rotation: f32,
    pub time_scale: f32,
    events_on: bool,
    kinematics: Kinematics,
    pub(crate) components: Vec<Component>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) parent: Option<EntityId>,
    pub(crate) registered_events: Vec<SubscriptionId>,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        name: &str,
        vectors: &mut VectorPool,
    ) -> Result<Self, PoolError> {
        Ok(Self {
            id,
            name: name.to_string(),
            tags: Vec::new(),
            visible: true,
            opacity: 1.0,
            rotation: 0.0,
            time_scale: 1.0,
            events_on: true,
            kinematics: Kinematics::acquire(vectors)?,
            components: Vec::new(),
            children: Vec::new(),
            parent: None,
            registered_events: Vec::new(),
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn events_on(&self) -> bool {
        self.events_on
    }

    pub fn set_events_on(&mut self, on: bool) {
        self.events_on = on;
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn registered_events(&self) -> &[SubscriptionId] {
        &self.registered_events
    }

    pub fn pos_handle(&self) -> PoolHandle {
        self.kinematics.pos
    }

    pub fn vel_handle(&self) -> PoolHandle {
        self.kinematics.vel
    }

    pub fn acc_handle(&self) -> PoolHandle {
        self.kinematics.acc
    }

    pub fn position(&self, vectors: &VectorPool) -> Vec2 {
        vectors[self.kinematics.pos]
    }

    pub fn velocity(&self, vectors: &VectorPool) -> Vec2 {
        vectors[self.kinematics.vel]
    }

    pub fn acceleration(&self, vectors: &VectorPool) -> Vec2 {
        vectors[self.kinematics.acc]
    }

    pub fn distance(&self, vectors: &VectorPool) -> Vec2 {
        vectors[self.kinematics.distance]
    }

    pub fn cached_world_coords(&self, vectors: &VectorPool) -> Vec2 {
        vectors[self.kinematics.world_coords]
    }

    pub fn set_position(&self, vectors: &mut VectorPool, pos: Vec2) {
        vectors[self.kinematics.pos] = pos;
    }

    pub fn set_velocity(&self, vectors: &mut VectorPool, vel: Vec2) {
        vectors[self.kinematics.vel] = vel;
    }

    pub(crate) fn set_cached_world_coords(&self, vectors: &mut VectorPool, coords: Vec2) {
        vectors[self.kinematics.world_coords] = coords;
    }

    /// Advances position by velocity and accumulates per-axis travel.
    pub(crate) fn integrate(&self, vectors: &mut VectorPool, dt: f32) {
        let vel = vectors[self.kinematics.vel];
        vectors[self.kinematics.pos] += vel * (dt * self.time_scale);
        let distance = &mut vectors[self.kinematics.distance];
        distance.x += vel.x.abs() * dt;
        distance.y += vel.y.abs() * dt;
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Attaches a component. Names are unique per entity; a rejected
    /// component hands its pooled vectors back before the error returns.
    pub fn add_component(
        &mut self,
        mut component: Component,
        vectors: &mut VectorPool,
    ) -> Result<(), EntityError> {
        if self.find_component(component.name()).is_some() {
            component.indicate_remove(vectors);
            return Err(EntityError::DuplicateComponent {
                entity: self.name.clone(),
                component: component.name().to_string(),
            });
        }
        self.components.push(component);
        Ok(())
    }

    pub fn find_component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name() == name)
    }

    pub fn find_component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.name() == name)
    }

    pub fn find_components_by_tag<'a>(
        &'a self,
        tag: &'a str,
    ) -> impl Iterator<Item = &'a Component> + 'a {
        self.components.iter().filter(move |c| c.has_tag(tag))
    }

    /// Detaches a component by name, returning its pooled vectors first.
    pub fn remove_component(&mut self, name: &str, vectors: &mut VectorPool) -> bool {
        let Some(index) = self.components.iter().position(|c| c.name() == name) else {
            return false;
        };
        let mut component = self.components.remove(index);
        component.indicate_remove(vectors);
        true
    }

    pub fn collidable(&self) -> Option<&Collidable> {
        self.components.iter().find_map(|c| match c.kind() {
            ComponentKind::Collidable(collidable) => Some(collidable),
            _ => None,
        })
    }

    pub fn collidable_mut(&mut self) -> Option<&mut Collidable> {
        self.components.iter_mut().find_map(|c| match c.kind_mut() {
            ComponentKind::Collidable(collidable) => Some(collidable),
            _ => None,
        })
    }

    /// Returns every pooled vector held by this entity and its components.
    pub(crate) fn release_resources(&mut self, vectors: &mut VectorPool) {
        for component in &mut self.components {
            component.indicate_remove(vectors);
        }
        self.kinematics.release(vectors);
    }
}

/// Owner of every entity, live or not. Parents refer to children by id only.
#[derive(Default)]
pub struct EntityArena {
    allocator: EntityIdAllocator,
    entities: BTreeMap<EntityId, Entity>,
}

impl EntityArena {
    pub fn create(&mut self, name: &str, vectors: &mut VectorPool) -> Result<EntityId, PoolError> {
        let id = self.allocator.allocate();
        let entity = Entity::new(id, name, vectors)?;
        self.entities.insert(id, entity);
        Ok(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.values().find(|entity| entity.name == name)
    }

    /// True when `id` has a descendant named `name`.
    pub fn has_child(&self, id: EntityId, name: &str) -> bool {
        let Some(entity) = self.get(id) else {
            return false;
        };
        entity.children.iter().any(|child| {
            self.get(*child).is_some_and(|c| c.name == name) || self.has_child(*child, name)
        })
    }

    /// Sum of positions from `id` up through every ancestor.
    pub fn world_coords(&self, id: EntityId, vectors: &VectorPool) -> Option<Vec2> {
        let mut entity = self.get(id)?;
        let mut coords = entity.position(vectors);
        while let Some(parent) = entity.parent.and_then(|pid| self.get(pid)) {
            coords += parent.position(vectors);
            entity = parent;
        }
        Some(coords)
    }

    pub fn root_of(&self, id: EntityId) -> Option<EntityId> {
        let mut current = self.get(id)?;
        while let Some(parent) = current.parent.and_then(|pid| self.get(pid)) {
            current = parent;
        }
        Some(current.id)
    }

    pub(crate) fn take(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub(crate) fn restore(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    pub(crate) fn drain(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.entities).into_values().collect()
    }
}
