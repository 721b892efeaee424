use std::collections::{BTreeSet, HashSet};

use crate::entity::EntityId;
use crate::event::Event;

/// Live-set bookkeeping for the running world.
///
/// Removal is never immediate: [`Scene::remove`] only queues, and the world
/// flushes the queue at the start of the next update.
#[derive(Debug, Default)]
pub struct Scene {
    live: BTreeSet<EntityId>,
    delete_queue: Vec<EntityId>,
    pending_removal: HashSet<EntityId>,
    deferred: Vec<Event>,
    dirty: bool,
}

impl Scene {
    pub(crate) fn add(&mut self, id: EntityId) {
        self.live.insert(id);
        self.dirty = true;
    }

    /// Queues `id` for removal. Returns false when it is already queued.
    pub fn remove(&mut self, id: EntityId) -> bool {
        if !self.pending_removal.insert(id) {
            return false;
        }
        self.delete_queue.push(id);
        true
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.live.contains(&id)
    }

    pub fn is_pending_removal(&self, id: EntityId) -> bool {
        self.pending_removal.contains(&id)
    }

    pub fn live_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.live.iter().copied()
    }

    pub fn entity_count(&self) -> usize {
        self.live.len()
    }

    /// Replays `event` at the start of the next update.
    pub fn defer(&mut self, event: Event) {
        self.deferred.push(event);
    }

    pub(crate) fn take_deferred(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.deferred)
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub(crate) fn take_delete_queue(&mut self) -> Vec<EntityId> {
        self.pending_removal.clear();
        std::mem::take(&mut self.delete_queue)
    }

    pub(crate) fn detach(&mut self, id: EntityId) -> bool {
        self.live.remove(&id)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Cleared by the collision system once its cache is rebuilt.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn clear(&mut self) {
        self.live.clear();
        self.delete_queue.clear();
        self.pending_removal.clear();
        self.deferred.clear();
        self.dirty = true;
    }
}
