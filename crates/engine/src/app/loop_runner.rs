use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::entity::EntityError;
use crate::input::{ActionStates, InputAction, InputSnapshot};
use crate::runtime::{GameCommand, Runtime};
use crate::vector::Vec2;

use super::metrics::MetricsAccumulator;
use super::presenter::Presenter;
use super::MetricsHandle;

pub const SLOW_FRAME_ENV_VAR: &str = "PACSLIDER_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
    pub overlay_visible: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Pac-slider".to_string(),
            window_width: 640,
            window_height: 480,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
            overlay_visible: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize presenter: {0}")]
    CreatePresenter(#[source] PixelsError),
    #[error("failed to load game: {0}")]
    Load(#[from] EntityError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, runtime: Runtime) -> Result<(), AppError> {
    run_app_with_metrics(config, runtime, MetricsHandle::default())
}

/// Opens the window and runs `runtime` at a fixed tick rate until quit.
pub fn run_app_with_metrics(
    config: LoopConfig,
    mut runtime: Runtime,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    runtime.load()?;
    info!(
        entity_count = runtime.world().entity_count(),
        "scene_loaded"
    );

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let (frame_width, frame_height) = runtime.frame_size();
    let mut presenter = Presenter::new(Arc::clone(&window), frame_width, frame_height)
        .map_err(AppError::CreatePresenter)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let mut input_collector = InputCollector::new(frame_width, frame_height);

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut overlay_visible = config.overlay_visible;
    let mut failure: Option<AppError> = None;

    let run_result = event_loop.run(|event, window_target| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => {
                info!(reason = "window_close", "shutdown_requested");
                window_target.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Err(error) = presenter.resize(new_size.width, new_size.height) {
                    warn!(error = %error, "presenter_resize_failed");
                    window_target.exit();
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = window.inner_size();
                if let Err(error) = presenter.resize(size.width, size.height) {
                    warn!(error = %error, "presenter_resize_failed");
                    window_target.exit();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let cursor = presenter.window_to_frame(position.x as f32, position.y as f32);
                input_collector.set_cursor_position_px(cursor);
            }
            WindowEvent::CursorLeft { .. } => {
                input_collector.clear_cursor_position();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                input_collector.handle_keyboard_input(&event);
                if input_collector.quit_requested {
                    info!(reason = "escape_key", "shutdown_requested");
                    window_target.exit();
                }
            }
            WindowEvent::RedrawRequested => {
                if input_collector.take_overlay_toggle_pressed() {
                    overlay_visible = !overlay_visible;
                    info!(overlay_visible, "overlay_toggled");
                }

                if slow_frame_delay > Duration::ZERO {
                    // Debug perturbation only; the render cap sleeps further down.
                    thread::sleep(slow_frame_delay);
                }

                let now = Instant::now();
                let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                last_frame_instant = now;
                accumulator =
                    accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

                let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                for _ in 0..step_plan.ticks_to_run {
                    let input = input_collector.snapshot_for_tick();
                    let command = runtime.tick(fixed_dt_seconds, input);
                    metrics_accumulator.record_tick();
                    match command {
                        GameCommand::None => {}
                        GameCommand::Restart => {
                            if let Err(restart_error) = runtime.restart() {
                                error!(error = %restart_error, "restart_failed");
                                failure = Some(AppError::Load(restart_error));
                                window_target.exit();
                                return;
                            }
                            info!(
                                entity_count = runtime.world().entity_count(),
                                "scene_restarted"
                            );
                        }
                        GameCommand::Quit => {
                            info!(reason = "game_command", "shutdown_requested");
                            window_target.exit();
                            return;
                        }
                    }
                }
                accumulator = step_plan.remaining_accumulator;

                if step_plan.dropped_backlog > Duration::ZERO {
                    metrics_accumulator.record_clamp();
                    warn!(
                        dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                        max_ticks_per_frame, "sim_clamp_triggered"
                    );
                }

                let since_present = Instant::now().saturating_duration_since(last_present_instant);
                let cap_sleep = compute_cap_sleep(since_present, render_frame_target);
                if cap_sleep > Duration::ZERO {
                    thread::sleep(cap_sleep);
                }

                runtime.set_overlay(overlay_visible.then(|| metrics_handle.snapshot()));
                runtime.render(presenter.frame_mut());
                if let Err(present_error) = presenter.present() {
                    warn!(error = %present_error, "presenter_draw_failed");
                    window_target.exit();
                }
                last_present_instant = Instant::now();
                metrics_accumulator.record_frame(raw_frame_dt);

                if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                    metrics_handle.publish(snapshot);
                    info!(
                        fps = snapshot.fps,
                        tps = snapshot.tps,
                        frame_time_ms = snapshot.frame_time_ms,
                        clamped_frames = snapshot.clamped_frames,
                        entity_count = runtime.world().entity_count(),
                        "loop_metrics"
                    );
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            window.request_redraw();
        }
        Event::LoopExiting => {
            runtime.shutdown();
            info!("shutdown");
        }
        _ => {}
    });

    run_result.map_err(AppError::EventLoopRun)?;
    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    frame_width: u32,
    frame_height: u32,
}

impl InputCollector {
    fn new(frame_width: u32, frame_height: u32) -> Self {
        Self {
            frame_width,
            frame_height,
            ..Self::default()
        }
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        let is_pressed = key_event.state == ElementState::Pressed;
        self.update_action_state_from_physical_key(key_event.physical_key, is_pressed);
    }

    fn update_action_state_from_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        let Some(action) = action_for_key(key) else {
            return;
        };
        self.actions.set(action, is_pressed);
        if action == InputAction::Quit && is_pressed {
            self.quit_requested = true;
        }
    }

    /// Hands the current state to one tick and consumes its press edges.
    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(
            self.actions,
            self.cursor_position_px,
            self.frame_width,
            self.frame_height,
        );
        self.actions.clear_pressed();
        snapshot
    }

    fn take_overlay_toggle_pressed(&mut self) -> bool {
        self.actions.take_pressed(InputAction::ToggleOverlay)
    }

    fn set_cursor_position_px(&mut self, position: Vec2) {
        self.cursor_position_px = Some(position);
    }

    fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }
}

fn action_for_key(key: PhysicalKey) -> Option<InputAction> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    let action = match code {
        KeyCode::KeyW | KeyCode::ArrowUp => InputAction::MoveUp,
        KeyCode::KeyS | KeyCode::ArrowDown => InputAction::MoveDown,
        KeyCode::KeyA | KeyCode::ArrowLeft => InputAction::MoveLeft,
        KeyCode::KeyD | KeyCode::ArrowRight => InputAction::MoveRight,
        KeyCode::F3 => InputAction::ToggleOverlay,
        KeyCode::KeyC => InputAction::ToggleCollisions,
        KeyCode::KeyR => InputAction::Restart,
        KeyCode::Escape => InputAction::Quit,
        _ => return None,
    };
    Some(action)
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(mut accumulator: Duration, fixed_dt: Duration, max_ticks_per_frame: u32) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::replace(&mut accumulator, Duration::ZERO)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    cap.map_or_else(|| "off".to_string(), |value| value.to_string())
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    parse_slow_frame_delay(env::var(SLOW_FRAME_ENV_VAR), config_slow_frame_ms)
}

fn parse_slow_frame_delay(
    value: Result<String, env::VarError>,
    config_slow_frame_ms: u64,
) -> Duration {
    let fallback = Duration::from_millis(config_slow_frame_ms);
    match value {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = raw.as_str(),
                    "slow_frame_env_invalid"
                );
                fallback
            }
        },
        Err(env::VarError::NotPresent) => fallback,
        Err(err) => {
            warn!(env_var = SLOW_FRAME_ENV_VAR, error = %err, "slow_frame_env_unreadable");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut InputCollector, code: KeyCode) {
        input.update_action_state_from_physical_key(PhysicalKey::Code(code), true);
    }

    fn release(input: &mut InputCollector, code: KeyCode) {
        input.update_action_state_from_physical_key(PhysicalKey::Code(code), false);
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_keeps_remainder_below_one_tick() {
        let fixed_dt = Duration::from_millis(16);
        let plan = plan_sim_steps(Duration::from_millis(40), fixed_dt, 5);

        assert_eq!(plan.ticks_to_run, 2);
        assert_eq!(plan.remaining_accumulator, Duration::from_millis(8));
        assert_eq!(plan.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let plan = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(plan.ticks_to_run, 3);
        assert_eq!(plan.remaining_accumulator, Duration::ZERO);
        assert_eq!(plan.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn arrows_and_wasd_map_to_moves() {
        let mut input = InputCollector::new(640, 480);
        press(&mut input, KeyCode::KeyW);
        press(&mut input, KeyCode::ArrowLeft);

        let snapshot = input.snapshot_for_tick();

        assert!(snapshot.is_down(InputAction::MoveUp));
        assert!(snapshot.is_down(InputAction::MoveLeft));
        assert!(snapshot.pressed(InputAction::MoveLeft));
        assert!(!snapshot.is_down(InputAction::MoveRight));
    }

    #[test]
    fn press_edge_reaches_exactly_one_tick() {
        let mut input = InputCollector::new(640, 480);
        press(&mut input, KeyCode::ArrowRight);

        let first = input.snapshot_for_tick();
        press(&mut input, KeyCode::ArrowRight);
        let second = input.snapshot_for_tick();
        release(&mut input, KeyCode::ArrowRight);
        press(&mut input, KeyCode::ArrowRight);
        let third = input.snapshot_for_tick();

        assert!(first.pressed(InputAction::MoveRight));
        assert!(!second.pressed(InputAction::MoveRight));
        assert!(second.is_down(InputAction::MoveRight));
        assert!(third.pressed(InputAction::MoveRight));
    }

    #[test]
    fn tap_between_ticks_still_registers() {
        let mut input = InputCollector::new(640, 480);
        press(&mut input, KeyCode::KeyR);
        release(&mut input, KeyCode::KeyR);

        let snapshot = input.snapshot_for_tick();

        assert!(snapshot.pressed(InputAction::Restart));
        assert!(!snapshot.is_down(InputAction::Restart));
    }

    #[test]
    fn f3_toggle_is_edge_triggered() {
        let mut input = InputCollector::new(640, 480);

        press(&mut input, KeyCode::F3);
        assert!(input.take_overlay_toggle_pressed());
        press(&mut input, KeyCode::F3);
        assert!(!input.take_overlay_toggle_pressed());
        release(&mut input, KeyCode::F3);
        press(&mut input, KeyCode::F3);
        assert!(input.take_overlay_toggle_pressed());
    }

    #[test]
    fn escape_requests_quit() {
        let mut input = InputCollector::new(640, 480);
        press(&mut input, KeyCode::KeyC);
        assert!(!input.quit_requested);
        press(&mut input, KeyCode::Escape);
        assert!(input.quit_requested);
    }

    #[test]
    fn snapshot_carries_cursor_and_frame_size() {
        let mut input = InputCollector::new(640, 480);
        input.set_cursor_position_px(Vec2::new(100.0, 200.0));
        let snapshot = input.snapshot_for_tick();

        assert_eq!(snapshot.window_size(), (640, 480));
        assert_eq!(snapshot.cursor_position_px(), Some(Vec2::new(100.0, 200.0)));

        input.clear_cursor_position();
        assert_eq!(input.snapshot_for_tick().cursor_position_px(), None);
    }

    #[test]
    fn target_frame_duration_for_60hz_is_expected() {
        assert_eq!(target_frame_duration(None), None);
        let duration = target_frame_duration(Some(60)).expect("duration");
        assert!((duration.as_secs_f64() - (1.0 / 60.0)).abs() < 0.000_001);
    }

    #[test]
    fn compute_cap_sleep_only_when_under_budget() {
        let target = target_frame_duration(Some(60));
        assert_eq!(compute_cap_sleep(Duration::from_millis(20), target), Duration::ZERO);
        assert!(compute_cap_sleep(Duration::from_millis(5), target) > Duration::ZERO);
        assert_eq!(compute_cap_sleep(Duration::from_millis(5), None), Duration::ZERO);
    }

    #[test]
    fn normalize_render_fps_cap_disables_zero() {
        assert_eq!(normalize_render_fps_cap(Some(0)), None);
        assert_eq!(normalize_render_fps_cap(Some(60)), Some(60));
        assert_eq!(format_render_cap(None), "off");
    }

    #[test]
    fn slow_frame_env_falls_back_on_bad_values() {
        assert_eq!(
            parse_slow_frame_delay(Ok("25".to_string()), 3),
            Duration::from_millis(25)
        );
        assert_eq!(
            parse_slow_frame_delay(Ok("soon".to_string()), 3),
            Duration::from_millis(3)
        );
        assert_eq!(
            parse_slow_frame_delay(Err(env::VarError::NotPresent), 0),
            Duration::ZERO
        );
    }
}
