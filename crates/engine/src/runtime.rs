use tracing::info;

use crate::app::LoopMetricsSnapshot;
use crate::collision::CollisionSystem;
use crate::entity::EntityError;
use crate::input::{InputAction, InputSnapshot};
use crate::render::{LayerConfig, Renderer};
use crate::world::{World, WorldConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameCommand {
    None,
    Restart,
    Quit,
}

/// Game-specific setup and per-tick control on top of the world.
pub trait Game {
    /// Spawns the initial entities. Runs at startup and after every restart.
    fn load(&mut self, world: &mut World) -> Result<(), EntityError>;

    /// Runs once per tick before the world updates.
    fn update(&mut self, dt: f32, input: &InputSnapshot, world: &mut World) -> GameCommand;

    fn unload(&mut self, _world: &mut World) {}

    /// Extra lines for the debug overlay.
    fn debug_lines(&self, _world: &World) -> Vec<String> {
        Vec::new()
    }
}

/// Owns one world and drives its frame phases in a fixed order: deferred
/// events, removals and entity updates, then collisions, then render.
pub struct Runtime {
    world: World,
    collisions: CollisionSystem,
    renderer: Renderer,
    game: Box<dyn Game>,
    loaded: bool,
}

impl Runtime {
    pub fn new(config: WorldConfig, layers: Vec<LayerConfig>, game: Box<dyn Game>) -> Self {
        Self {
            renderer: Renderer::new(config.width, config.height, layers),
            world: World::new(config),
            collisions: CollisionSystem::default(),
            game,
            loaded: false,
        }
    }

    pub fn load(&mut self) -> Result<(), EntityError> {
        if self.loaded {
            return Ok(());
        }
        self.game.load(&mut self.world)?;
        self.loaded = true;
        info!(entity_count = self.world.entity_count(), "game_loaded");
        Ok(())
    }

    /// Advances the simulation by one fixed step.
    pub fn tick(&mut self, dt: f32, input: InputSnapshot) -> GameCommand {
        if input.pressed(InputAction::ToggleCollisions) {
            let enabled = !self.collisions.is_enabled();
            self.collisions.set_enabled(enabled);
            info!(enabled, "collisions_toggled");
        }

        self.world.set_input(input);
        let command = self.game.update(dt, &input, &mut self.world);
        self.world.update(dt);
        self.collisions.gather(&mut self.world);
        self.collisions.check(&mut self.world);
        command
    }

    pub fn render(&mut self, frame: &mut [u8]) {
        self.renderer.render(&self.world, frame);
    }

    /// Tears every entity down and loads the game again.
    pub fn restart(&mut self) -> Result<(), EntityError> {
        if self.loaded {
            self.game.unload(&mut self.world);
        }
        self.world.restart();
        self.loaded = false;
        self.load()
    }

    pub fn shutdown(&mut self) {
        if self.loaded {
            self.game.unload(&mut self.world);
            self.world.restart();
            self.loaded = false;
        }
    }

    /// Refreshes the overlay text; `None` hides it.
    pub fn set_overlay(&mut self, metrics: Option<LoopMetricsSnapshot>) {
        let lines = metrics.map(|metrics| self.debug_lines(metrics)).unwrap_or_default();
        self.renderer.set_debug_lines(lines);
    }

    pub fn debug_lines(&self, metrics: LoopMetricsSnapshot) -> Vec<String> {
        let mut lines = vec![
            format!(
                "FPS {:.0}  TPS {:.0}  {:.2} ms",
                metrics.fps, metrics.tps, metrics.frame_time_ms
            ),
            format!("entities {}", self.world.entity_count()),
        ];
        if self.collisions.is_enabled() {
            lines.push(format!(
                "collisions {} checks {} hits",
                self.collisions.last_check_count(),
                self.collisions.last_hit_count()
            ));
        } else {
            lines.push("collisions off".to_string());
        }
        lines.extend(
            self.world
                .events()
                .debug_lines()
                .into_iter()
                .map(|line| format!(" {line}")),
        );
        lines.extend(self.game.debug_lines(&self.world));
        lines
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn collisions(&self) -> &CollisionSystem {
        &self.collisions
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.renderer.width(), self.renderer.height())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::component::{Collidable, Component};
    use crate::event::{ListenerConfig, COLLISION};
    use crate::render::default_layers;
    use crate::vector::Vec2;

    #[derive(Default)]
    struct RecordingGame {
        loads: Rc<RefCell<u32>>,
        unloads: Rc<RefCell<u32>>,
        hits: Rc<RefCell<u32>>,
        quit_after: Option<u32>,
        ticks: u32,
    }

    impl Game for RecordingGame {
        fn load(&mut self, world: &mut World) -> Result<(), EntityError> {
            *self.loads.borrow_mut() += 1;
            let a = world.create_entity("a")?;
            world.state_mut().set_position(a, Vec2::new(0.0, 0.0));
            world.add_component(a, Component::collidable(Collidable::new(1, 2, 10.0)))?;
            world.add(a)?;
            let b = world.create_entity("b")?;
            world.state_mut().set_position(b, Vec2::new(35.0, 0.0));
            world.state_mut().set_velocity(b, Vec2::new(-1200.0, 0.0));
            world.add_component(b, Component::collidable(Collidable::new(2, 1, 10.0)))?;
            world.add(b)?;
            let hits = Rc::clone(&self.hits);
            world.on_entity(b, COLLISION, ListenerConfig::only_self(), move |_, _| {
                *hits.borrow_mut() += 1;
            })?;
            Ok(())
        }

        fn update(&mut self, _dt: f32, _input: &InputSnapshot, _world: &mut World) -> GameCommand {
            self.ticks += 1;
            match self.quit_after {
                Some(limit) if self.ticks >= limit => GameCommand::Quit,
                _ => GameCommand::None,
            }
        }

        fn unload(&mut self, _world: &mut World) {
            *self.unloads.borrow_mut() += 1;
        }

        fn debug_lines(&self, _world: &World) -> Vec<String> {
            vec![format!("ticks {}", self.ticks)]
        }
    }

    fn runtime_with(game: RecordingGame) -> Runtime {
        let mut runtime = Runtime::new(WorldConfig::default(), default_layers(), Box::new(game));
        runtime.load().expect("load");
        runtime
    }

    #[test]
    fn collisions_run_after_the_update_that_caused_them() {
        let game = RecordingGame::default();
        let hits = Rc::clone(&game.hits);
        let mut runtime = runtime_with(game);

        // b covers 20px per 1/60 s tick and starts 35px away.
        runtime.tick(1.0 / 60.0, InputSnapshot::empty());
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn collision_toggle_is_edge_driven() {
        let game = RecordingGame::default();
        let hits = Rc::clone(&game.hits);
        let mut runtime = runtime_with(game);
        let toggle = InputSnapshot::empty().with_action_pressed(InputAction::ToggleCollisions);

        runtime.tick(1.0 / 60.0, toggle);
        runtime.tick(1.0 / 60.0, InputSnapshot::empty());

        assert!(!runtime.collisions().is_enabled());
        assert_eq!(*hits.borrow(), 0);
        assert!(runtime
            .debug_lines(LoopMetricsSnapshot::default())
            .contains(&"collisions off".to_string()));
    }

    #[test]
    fn restart_unloads_and_reloads_once() {
        let game = RecordingGame::default();
        let loads = Rc::clone(&game.loads);
        let unloads = Rc::clone(&game.unloads);
        let mut runtime = runtime_with(game);
        runtime.load().expect("second load is a no-op");

        runtime.restart().expect("restart");

        assert_eq!(*loads.borrow(), 2);
        assert_eq!(*unloads.borrow(), 1);
        assert_eq!(runtime.world().entity_count(), 2);
        assert_eq!(runtime.world().events().listener_count(COLLISION), 1);
    }

    #[test]
    fn game_command_is_returned_from_tick() {
        let game = RecordingGame {
            quit_after: Some(2),
            ..RecordingGame::default()
        };
        let mut runtime = runtime_with(game);

        assert_eq!(runtime.tick(0.01, InputSnapshot::empty()), GameCommand::None);
        assert_eq!(runtime.tick(0.01, InputSnapshot::empty()), GameCommand::Quit);
    }

    #[test]
    fn overlay_lines_include_listeners_and_game_lines() {
        let mut runtime = runtime_with(RecordingGame::default());
        runtime.tick(0.01, InputSnapshot::empty());

        let lines = runtime.debug_lines(LoopMetricsSnapshot::default());

        assert_eq!(lines[1], "entities 2");
        assert!(lines.iter().any(|line| line == " collision: 1"));
        assert_eq!(lines.last().map(String::as_str), Some("ticks 1"));
    }

    #[test]
    fn render_fills_a_frame_of_world_size() {
        let mut runtime = runtime_with(RecordingGame::default());
        let (width, height) = runtime.frame_size();
        let mut frame = vec![0; width as usize * height as usize * 4];
        runtime.set_overlay(Some(LoopMetricsSnapshot::default()));

        runtime.render(&mut frame);

        assert_eq!(&frame[frame.len() - 4..], &[0, 0, 0, 255]);
    }
}
