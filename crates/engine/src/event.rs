//! Synchronous publish/subscribe keyed by event name.
//!
//! Listeners bound to an entity see collision-shaped payloads canonicalized
//! so that `subject` is always their own entity.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::entity::{Entity, EntityId};
use crate::vector::Vec2;
use crate::world::WorldState;

pub const COLLISION: &str = "collision";
pub const DEATH: &str = "death";
pub const REMOVE: &str = "remove";
pub const ENTITY_ADDED: &str = "entityadded";
pub const CHILD_ADDED: &str = "childaddedtoparent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPayload {
    None,
    Entity(EntityId),
    /// `{self, other}` pair, as produced by collision checks.
    Pair {
        subject: EntityId,
        other: EntityId,
    },
    ParentChild {
        parent: EntityId,
        child: EntityId,
    },
}

impl EventPayload {
    pub fn contains(&self, id: EntityId) -> bool {
        match *self {
            EventPayload::None => false,
            EventPayload::Entity(entity) => entity == id,
            EventPayload::Pair { subject, other } => subject == id || other == id,
            EventPayload::ParentChild { parent, child } => parent == id || child == id,
        }
    }

    /// Swaps a pair so that `context` is the subject.
    pub fn canonical_for(self, context: EntityId) -> Self {
        match self {
            EventPayload::Pair { subject, other } if subject != context => EventPayload::Pair {
                subject: other,
                other: subject,
            },
            payload => payload,
        }
    }

    pub fn ids(&self) -> Vec<EntityId> {
        match *self {
            EventPayload::None => Vec::new(),
            EventPayload::Entity(entity) => vec![entity],
            EventPayload::Pair { subject, other } => vec![subject, other],
            EventPayload::ParentChild { parent, child } => vec![parent, child],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(name: &str, payload: EventPayload) -> Self {
        Self {
            name: name.to_string(),
            payload,
        }
    }

    pub fn collision(subject: EntityId, other: EntityId) -> Self {
        Self::new(COLLISION, EventPayload::Pair { subject, other })
    }

    pub fn death(id: EntityId) -> Self {
        Self::new(DEATH, EventPayload::Entity(id))
    }

    pub fn remove(id: EntityId) -> Self {
        Self::new(REMOVE, EventPayload::Entity(id))
    }

    pub fn entity_added(id: EntityId) -> Self {
        Self::new(ENTITY_ADDED, EventPayload::Entity(id))
    }

    pub fn child_added(parent: EntityId, child: EntityId) -> Self {
        Self::new(CHILD_ADDED, EventPayload::ParentChild { parent, child })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type ListenerFn = Box<dyn FnMut(&Event, &mut ListenerContext<'_>)>;
pub type OnceKeyFn = Box<dyn Fn(&EventPayload) -> Vec<String>>;

#[derive(Default)]
pub struct ListenerConfig {
    pub only_self: bool,
    pub only_once: Option<OnceKeyFn>,
}

impl ListenerConfig {
    pub fn only_self() -> Self {
        Self {
            only_self: true,
            only_once: None,
        }
    }

    /// Delivers at most once per key across every listener sharing it.
    pub fn only_once(key: impl Fn(&EventPayload) -> Vec<String> + 'static) -> Self {
        Self {
            only_self: false,
            only_once: Some(Box::new(key)),
        }
    }
}

fn once_key(parts: Vec<String>) -> String {
    let mut parts = parts;
    parts.sort();
    parts.join(":")
}

struct Listener {
    event: String,
    context: Option<EntityId>,
    config: ListenerConfig,
    callback: ListenerFn,
}

/// What a callback may do while an event is being delivered.
pub struct ListenerContext<'a> {
    subscription: SubscriptionId,
    context: Option<EntityId>,
    state: &'a mut WorldState,
    emitted: Vec<Event>,
    offs: Vec<SubscriptionId>,
}

impl<'a> ListenerContext<'a> {
    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// The entity this listener is bound to, if any.
    pub fn context(&self) -> Option<EntityId> {
        self.context
    }

    pub fn state(&self) -> &WorldState {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut WorldState {
        &mut *self.state
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.state.entities().get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.state.entities_mut().get_mut(id)
    }

    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.state.position(id)
    }

    pub fn velocity(&self, id: EntityId) -> Option<Vec2> {
        self.state.velocity(id)
    }

    pub fn set_position(&mut self, id: EntityId, pos: Vec2) -> bool {
        self.state.set_position(id, pos)
    }

    pub fn set_velocity(&mut self, id: EntityId, vel: Vec2) -> bool {
        self.state.set_velocity(id, vel)
    }

    /// Queues an event, delivered once the current listener pass finishes.
    pub fn emit(&mut self, event: Event) {
        self.emitted.push(event);
    }

    /// Unsubscribes `id` after this callback returns. Passing the listener's
    /// own id is allowed.
    pub fn off(&mut self, id: SubscriptionId) {
        self.offs.push(id);
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        self.state.scene_mut().remove(id)
    }

    pub fn play_sound(&mut self, name: &str) {
        self.state.play_sound(name);
    }

    pub fn elapsed(&self) -> f64 {
        self.state.elapsed()
    }
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: HashMap<SubscriptionId, Listener>,
    by_name: HashMap<String, Vec<SubscriptionId>>,
    once_keys: HashMap<String, SubscriptionId>,
}

impl EventBus {
    pub fn on(
        &mut self,
        event: &str,
        context: Option<EntityId>,
        config: ListenerConfig,
        callback: impl FnMut(&Event, &mut ListenerContext<'_>) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.listeners.insert(
            id,
            Listener {
                event: event.to_string(),
                context,
                config,
                callback: Box::new(callback),
            },
        );
        self.by_name.entry(event.to_string()).or_default().push(id);
        id
    }

    /// Unsubscribes `id`. Unknown ids return false.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let Some(listener) = self.listeners.remove(&id) else {
            return false;
        };
        self.detach_index(id, &listener.event);
        true
    }

    fn detach_index(&mut self, id: SubscriptionId, event: &str) {
        if let Some(ids) = self.by_name.get_mut(event) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.by_name.remove(event);
            }
        }
        self.once_keys.retain(|_, owner| *owner != id);
    }

    pub fn clear_only_once(&mut self) {
        self.once_keys.clear();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.by_name.get(event).map_or(0, Vec::len)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.len()
    }

    pub fn debug_lines(&self) -> Vec<String> {
        let mut names: Vec<&String> = self.by_name.keys().collect();
        names.sort();
        let mut lines: Vec<String> = names
            .into_iter()
            .map(|name| format!("{name}: {}", self.listener_count(name)))
            .collect();
        lines.push(format!("once keys: {}", self.once_keys.len()));
        lines
    }

    /// Delivers `event` to every listener registered for its name, then any
    /// events the callbacks emitted, before returning.
    pub fn fire(&mut self, event: Event, state: &mut WorldState) {
        let mut queue = VecDeque::from([event]);
        while let Some(mut event) = queue.pop_front() {
            let Some(ids) = self.by_name.get(&event.name).cloned() else {
                continue;
            };
            for id in ids {
                // Gone when an earlier callback in this pass turned it off.
                let Some(mut listener) = self.listeners.remove(&id) else {
                    continue;
                };
                let outcome = self.deliver(id, &mut listener, &mut event, state);
                if outcome.offs.contains(&id) {
                    self.detach_index(id, &listener.event);
                } else {
                    self.listeners.insert(id, listener);
                }
                for off in outcome.offs {
                    if off != id {
                        self.off(off);
                    }
                }
                queue.extend(outcome.emitted);
            }
        }
    }

    fn deliver(
        &mut self,
        id: SubscriptionId,
        listener: &mut Listener,
        event: &mut Event,
        state: &mut WorldState,
    ) -> Delivery {
        let Some(context) = listener.context else {
            return invoke(id, listener, event, state);
        };

        match state.entities().get(context) {
            Some(entity) if entity.events_on() => {}
            _ => return Delivery::default(),
        }

        event.payload = event.payload.canonical_for(context);

        if listener.config.only_self && !event.payload.contains(context) {
            return Delivery::default();
        }

        if let Some(key_fn) = &listener.config.only_once {
            let key = once_key(key_fn(&event.payload));
            if self.once_keys.contains_key(&key) {
                debug!(event = %event.name, key = %key, "event_once_skipped");
                return Delivery::default();
            }
            self.once_keys.insert(key, id);
        }

        invoke(id, listener, event, state)
    }
}

#[derive(Default)]
struct Delivery {
    emitted: Vec<Event>,
    offs: Vec<SubscriptionId>,
}

fn invoke(
    id: SubscriptionId,
    listener: &mut Listener,
    event: &Event,
    state: &mut WorldState,
) -> Delivery {
    let mut ctx = ListenerContext {
        subscription: id,
        context: listener.context,
        state,
        emitted: Vec::new(),
        offs: Vec::new(),
    };
    (listener.callback)(event, &mut ctx);
    Delivery {
        emitted: ctx.emitted,
        offs: ctx.offs,
    }
}
