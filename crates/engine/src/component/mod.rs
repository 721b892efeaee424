//! Components: typed behaviour attached to exactly one entity.
//!
//! Dispatch is a tagged enum. Each component reports its [`Capabilities`] when
//! it is built, so the per-frame passes never check for optional methods.

mod collidable;
mod slide;
mod sprite;
mod steering;

use bitflags::bitflags;
use rand::rngs::StdRng;

use crate::entity::{Entity, EntityArena};
use crate::input::InputSnapshot;
use crate::pool::VectorPool;
use crate::render::Surface;
use crate::scene::Scene;
use crate::vector::Vec2;
use crate::world::WorldConfig;

pub use collidable::{BoundingCircle, Collidable};
pub use slide::Slide;
pub use sprite::{Facing, SpriteRender, SpriteRenderAnimation};
pub use steering::{Bounds, Follow, FollowTarget, Separate, StayInBounds, Wander};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const UPDATE = 1;
        const DRAW = 1 << 1;
        const COLLIDE = 1 << 2;
    }
}

/// Where and in what order a drawable component renders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInfo<'a> {
    pub layer: &'a str,
    pub z_index: i32,
    pub opacity: f32,
}

/// Everything a component may touch while its entity updates.
///
/// The updating entity is detached from the arena for the duration, so
/// `entities` holds every other entity.
pub struct UpdateContext<'a> {
    pub dt: f32,
    pub entity: &'a mut Entity,
    pub vectors: &'a mut VectorPool,
    pub entities: &'a EntityArena,
    pub scene: &'a mut Scene,
    pub input: &'a InputSnapshot,
    pub rng: &'a mut StdRng,
    pub config: &'a WorldConfig,
}

impl UpdateContext<'_> {
    pub fn position(&self) -> Vec2 {
        self.entity.position(&*self.vectors)
    }

    pub fn velocity(&self) -> Vec2 {
        self.entity.velocity(&*self.vectors)
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.entity.set_position(self.vectors, pos);
    }

    pub fn set_velocity(&mut self, vel: Vec2) {
        self.entity.set_velocity(self.vectors, vel);
    }

    /// Queues the updating entity for removal at the next flush.
    pub fn remove_self(&mut self) -> bool {
        self.scene.remove(self.entity.id())
    }
}

/// Game-specific hook for behaviour the built-in kinds do not cover.
pub trait Behaviour {
    fn capabilities(&self) -> Capabilities {
        Capabilities::UPDATE
    }

    fn update(&mut self, _ctx: &mut UpdateContext<'_>) {}

    fn draw_info(&self) -> Option<DrawInfo<'_>> {
        None
    }

    fn draw(&self, _surface: &mut Surface, _origin: Vec2) {}

    fn indicate_remove(&mut self, _vectors: &mut VectorPool) {}
}

pub enum ComponentKind {
    Sprite(SpriteRender),
    Animation(SpriteRenderAnimation),
    Collidable(Collidable),
    Follow(Follow),
    Wander(Wander),
    Separate(Separate),
    StayInBounds(StayInBounds),
    Slide(Slide),
    Script(Box<dyn Behaviour>),
}

impl ComponentKind {
    fn capabilities(&self) -> Capabilities {
        match self {
            ComponentKind::Sprite(_) => Capabilities::DRAW,
            ComponentKind::Animation(_) => Capabilities::UPDATE | Capabilities::DRAW,
            ComponentKind::Collidable(_) => Capabilities::COLLIDE,
            ComponentKind::Follow(_)
            | ComponentKind::Wander(_)
            | ComponentKind::Separate(_)
            | ComponentKind::StayInBounds(_)
            | ComponentKind::Slide(_) => Capabilities::UPDATE,
            ComponentKind::Script(behaviour) => behaviour.capabilities(),
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            ComponentKind::Sprite(_) | ComponentKind::Animation(_) => "spriterender",
            ComponentKind::Collidable(_) => "collidable",
            ComponentKind::Follow(_) => "follow",
            ComponentKind::Wander(_) => "wander",
            ComponentKind::Separate(_) => "separate",
            ComponentKind::StayInBounds(_) => "stayinbounds",
            ComponentKind::Slide(_) => "slide",
            ComponentKind::Script(_) => "script",
        }
    }
}

pub struct Component {
    name: String,
    tags: Vec<String>,
    capabilities: Capabilities,
    kind: ComponentKind,
}

impl Component {
    pub fn new(name: &str, kind: ComponentKind) -> Self {
        Self {
            name: name.to_string(),
            tags: Vec::new(),
            capabilities: kind.capabilities(),
            kind,
        }
    }

    fn with_default_name(kind: ComponentKind) -> Self {
        let name = kind.default_name();
        Self::new(name, kind)
    }

    pub fn sprite(sprite: SpriteRender) -> Self {
        Self::with_default_name(ComponentKind::Sprite(sprite))
    }

    pub fn animation(animation: SpriteRenderAnimation) -> Self {
        Self::with_default_name(ComponentKind::Animation(animation))
    }

    pub fn collidable(collidable: Collidable) -> Self {
        Self::with_default_name(ComponentKind::Collidable(collidable))
    }

    pub fn follow(follow: Follow) -> Self {
        Self::with_default_name(ComponentKind::Follow(follow))
    }

    pub fn wander(wander: Wander) -> Self {
        Self::with_default_name(ComponentKind::Wander(wander))
    }

    pub fn separate(separate: Separate) -> Self {
        Self::with_default_name(ComponentKind::Separate(separate))
    }

    pub fn stay_in_bounds(stay: StayInBounds) -> Self {
        Self::with_default_name(ComponentKind::StayInBounds(stay))
    }

    pub fn slide(slide: Slide) -> Self {
        Self::with_default_name(ComponentKind::Slide(slide))
    }

    pub fn script(name: &str, behaviour: impl Behaviour + 'static) -> Self {
        Self::new(name, ComponentKind::Script(Box::new(behaviour)))
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ComponentKind {
        &mut self.kind
    }

    /// Layer and z-order when the component should render this frame.
    pub fn draw_info(&self) -> Option<DrawInfo<'_>> {
        if !self.capabilities.contains(Capabilities::DRAW) {
            return None;
        }
        match &self.kind {
            ComponentKind::Sprite(sprite) => sprite.draw_info(),
            ComponentKind::Animation(animation) => animation.draw_info(),
            ComponentKind::Script(behaviour) => behaviour.draw_info(),
            _ => None,
        }
    }

    /// One-time setup once the component is attached to `entity`.
    pub(crate) fn on_attach(&self, entity: &Entity, vectors: &mut VectorPool, rng: &mut StdRng) {
        let launch_speed = match &self.kind {
            ComponentKind::Wander(wander) => wander.launch_speed(),
            ComponentKind::Separate(separate) => separate.launch_speed(),
            ComponentKind::StayInBounds(stay) => stay.launch_speed(),
            _ => None,
        };
        if let Some(speed) = launch_speed {
            entity.set_velocity(vectors, Vec2::random_dir(rng) * speed);
        }
    }

    pub(crate) fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        if !self.capabilities.contains(Capabilities::UPDATE) {
            return;
        }
        match &mut self.kind {
            ComponentKind::Animation(animation) => animation.update(ctx),
            ComponentKind::Follow(follow) => follow.update(ctx),
            ComponentKind::Wander(wander) => wander.update(ctx),
            ComponentKind::Separate(separate) => separate.update(ctx),
            ComponentKind::StayInBounds(stay) => stay.update(ctx),
            ComponentKind::Slide(slide) => slide.update(ctx),
            ComponentKind::Script(behaviour) => behaviour.update(ctx),
            ComponentKind::Sprite(_) | ComponentKind::Collidable(_) => {}
        }
    }

    pub(crate) fn draw(&self, surface: &mut Surface, origin: Vec2) {
        match &self.kind {
            ComponentKind::Sprite(sprite) => sprite.draw(surface, origin),
            ComponentKind::Animation(animation) => animation.draw(surface, origin),
            ComponentKind::Script(behaviour) => behaviour.draw(surface, origin),
            _ => {}
        }
    }

    /// Returns any pooled vectors the component owns.
    pub(crate) fn indicate_remove(&mut self, vectors: &mut VectorPool) {
        match &mut self.kind {
            ComponentKind::Follow(follow) => follow.release(vectors),
            ComponentKind::Wander(wander) => wander.release(vectors),
            ComponentKind::Separate(separate) => separate.release(vectors),
            ComponentKind::StayInBounds(stay) => stay.release(vectors),
            ComponentKind::Script(behaviour) => behaviour.indicate_remove(vectors),
            ComponentKind::Sprite(_)
            | ComponentKind::Animation(_)
            | ComponentKind::Collidable(_)
            | ComponentKind::Slide(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    impl Behaviour for Marker {
        fn capabilities(&self) -> Capabilities {
            Capabilities::UPDATE | Capabilities::DRAW
        }
    }

    #[test]
    fn capabilities_follow_kind() {
        let collidable = Component::collidable(Collidable::new(1, 2, 16.0));
        assert_eq!(collidable.capabilities(), Capabilities::COLLIDE);
        assert_eq!(collidable.name(), "collidable");

        let script = Component::script("marker", Marker);
        assert!(script.capabilities().contains(Capabilities::DRAW));
        assert_eq!(script.name(), "marker");
    }

    #[test]
    fn script_without_draw_info_is_not_enqueued() {
        let script = Component::script("marker", Marker);
        assert!(script.draw_info().is_none());
    }

    #[test]
    fn tags_are_queryable() {
        let component = Component::collidable(Collidable::new(1, 1, 4.0))
            .with_tag("physics")
            .with_tag("debug");
        assert!(component.has_tag("debug"));
        assert!(!component.has_tag("ui"));
        assert_eq!(component.tags().len(), 2);
    }
}
