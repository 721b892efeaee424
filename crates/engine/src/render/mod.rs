//! Layered priority-queue renderer.
//!
//! Every layer owns an offscreen surface. Drawables are bucketed per layer by
//! z-index, drained lowest first, and the layers are composited in their
//! configured order.

mod font;
mod overlay;
mod queue;
mod surface;

use std::collections::HashSet;

use tracing::{info, warn};

use crate::entity::EntityId;
use crate::vector::Vec2;
use crate::world::World;

pub use queue::PriorityQueue;
pub use surface::Surface;

pub const DEBUG_LAYER: &str = "debug";
const FRAME_CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerConfig {
    pub name: String,
    pub clear_each_frame: bool,
}

impl LayerConfig {
    pub fn new(name: &str, clear_each_frame: bool) -> Self {
        Self {
            name: name.to_string(),
            clear_each_frame,
        }
    }
}

/// Background keeps its pixels between frames; the rest redraw fully.
pub fn default_layers() -> Vec<LayerConfig> {
    vec![
        LayerConfig::new("background", false),
        LayerConfig::new("spriteprops", true),
        LayerConfig::new("sprite", true),
        LayerConfig::new("bullet", true),
        LayerConfig::new("effect", true),
        LayerConfig::new("ui", true),
        LayerConfig::new(DEBUG_LAYER, true),
    ]
}

#[derive(Debug, Clone, Copy)]
struct DrawItem {
    entity: EntityId,
    component: usize,
    origin: Vec2,
}

struct Layer {
    config: LayerConfig,
    surface: Surface,
    queue: PriorityQueue<DrawItem>,
}

pub struct Renderer {
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    warned_layers: HashSet<String>,
    debug_lines: Vec<String>,
}

impl Renderer {
    pub fn new(width: u32, height: u32, layers: Vec<LayerConfig>) -> Self {
        info!(width, height, layer_count = layers.len(), "renderer_initialized");
        Self {
            width,
            height,
            layers: layers
                .into_iter()
                .map(|config| Layer {
                    config,
                    surface: Surface::new(width, height),
                    queue: PriorityQueue::default(),
                })
                .collect(),
            warned_layers: HashSet::new(),
            debug_lines: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.config.name.as_str())
    }

    pub fn layer_surface(&self, name: &str) -> Option<&Surface> {
        self.layers
            .iter()
            .find(|layer| layer.config.name == name)
            .map(|layer| &layer.surface)
    }

    /// Text drawn on the debug layer every frame until replaced.
    pub fn set_debug_lines(&mut self, lines: Vec<String>) {
        self.debug_lines = lines;
    }

    /// Draws the world into `frame`, an RGBA8 buffer of `width * height`.
    pub fn render(&mut self, world: &World, frame: &mut [u8]) {
        for layer in &mut self.layers {
            layer.queue.clear();
        }

        for id in world.state().scene().live_ids() {
            self.enqueue_entity(world, id);
        }

        for layer in &mut self.layers {
            if layer.config.clear_each_frame {
                layer.surface.clear();
            }
            for item in layer.queue.drain() {
                let component = world
                    .entity(item.entity)
                    .and_then(|entity| entity.components().get(item.component));
                if let Some(component) = component {
                    component.draw(&mut layer.surface, item.origin);
                }
            }
            if layer.config.name == DEBUG_LAYER {
                overlay::draw_overlay(&mut layer.surface, &self.debug_lines);
            }
        }

        for pixel in frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&FRAME_CLEAR_COLOR);
        }
        for layer in &self.layers {
            layer.surface.composite_onto(frame);
        }
    }

    fn enqueue_entity(&mut self, world: &World, id: EntityId) {
        let Some(entity) = world.entity(id) else {
            return;
        };
        if !entity.visible || entity.opacity <= 0.0 {
            return;
        }
        let origin = world.world_coords(id).unwrap_or(Vec2::ZERO);

        for (index, component) in entity.components().iter().enumerate() {
            let Some(info) = component.draw_info() else {
                continue;
            };
            let item = DrawItem {
                entity: id,
                component: index,
                origin,
            };
            match self
                .layers
                .iter_mut()
                .find(|layer| layer.config.name == info.layer)
            {
                Some(layer) => layer.queue.enqueue(item, info.z_index),
                None => self.warn_unknown_layer_once(info.layer, component.name()),
            }
        }

        for child in entity.children() {
            self.enqueue_entity(world, *child);
        }
    }

    fn warn_unknown_layer_once(&mut self, layer: &str, component: &str) {
        if self.warned_layers.insert(layer.to_string()) {
            warn!(layer, component, "render_layer_unknown");
        }
    }
}
