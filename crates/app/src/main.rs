//! Shapes viewer.
//!
//! Usage: `shapes [CONFIG] [--headless FRAMES]`
//!
//! Left-drag orbits the camera, right-drag zooms and holding `1` draws
//! wireframe. With `--headless` the scene is rendered on the simulated GPU
//! for the given number of frames and the scheduler statistics are logged.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use shapes_core::{AppConfig, FrameTimer};
use shapes_platform::{InputState, KeyCode, MouseButton, Window};
use shapes_renderer::{RenderBackend, Renderer, VulkanBackend};

/// Command line.
#[derive(Debug, Parser)]
#[command(name = "shapes", about = "Orbit around the shapes demo scene")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted.
    config: Option<PathBuf>,

    /// Render this many frames on the simulated GPU instead of opening a window.
    #[arg(long, value_name = "FRAMES")]
    headless: Option<u32>,
}

/// Applies this frame's mouse and keyboard state to `renderer`, then starts
/// a new input frame so motion is consumed exactly once.
fn apply_input<B: RenderBackend>(input: &mut InputState, renderer: &mut Renderer<B>) {
    let (dx, dy) = input.mouse_delta();
    if input.is_mouse_pressed(MouseButton::Left) {
        renderer.rotate_camera(dx, dy);
    } else if input.is_mouse_pressed(MouseButton::Right) {
        renderer.zoom_camera(dx, dy);
    }
    renderer.set_wireframe(input.is_key_pressed(KeyCode::Digit1));
    input.begin_frame();
}

struct App {
    config: AppConfig,
    // Dropped before the window it presents to.
    renderer: Option<Renderer<VulkanBackend>>,
    window: Option<Window>,
    input: InputState,
    timer: FrameTimer,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            input: InputState::new(),
            timer: FrameTimer::new(),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(renderer)) = (self.window.as_ref(), self.renderer.as_mut()) else {
            return;
        };
        if window.is_minimized() {
            return;
        }

        apply_input(&mut self.input, renderer);

        let (time, report) = self.timer.tick();
        if let Some(report) = report {
            window.set_title(&format!(
                "{}    fps: {:.0}   mspf: {:.3}",
                self.config.window.title, report.fps, report.frame_ms
            ));
        }

        if let Err(e) = renderer.render_frame(time) {
            error!("Render error: {e}");
            event_loop.exit();
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            if let Err(e) = renderer.shutdown() {
                error!("Failed to drain GPU work: {e}");
            }
            let stats = renderer.stats();
            info!(
                "Rendered {} frames ({} skipped, {} stalls)",
                stats.frames_submitted, stats.frames_skipped, stats.stalls.count
            );
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let settings = &self.config.window;
        let window = match Window::new(event_loop, settings.width, settings.height, &settings.title) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match Renderer::for_window(&window, &self.config) {
            Ok(renderer) => {
                info!("Initialization complete, entering main loop");
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to create renderer: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                    if window.is_minimized() {
                        self.timer.pause();
                    } else {
                        self.timer.resume();
                    }
                }
                if let Some(renderer) = self.renderer.as_mut()
                    && let Err(e) = renderer.resize(size.width, size.height)
                {
                    error!("Resize failed: {e}");
                    event_loop.exit();
                }
            }
            WindowEvent::Focused(false) => self.input.reset(),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                    if key == KeyCode::Escape {
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.input.on_mouse_pressed(button.into()),
                ElementState::Released => self.input.on_mouse_released(button.into()),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.input.on_mouse_moved(position.x as f32, position.y as f32);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

/// Renders `frames` frames on the simulated GPU.
fn run_headless(config: &AppConfig, frames: u32) -> Result<()> {
    let mut renderer = Renderer::headless(config)?;
    let mut timer = FrameTimer::new();

    for _ in 0..frames {
        let (time, _) = timer.tick();
        renderer.render_frame(time)?;
    }
    renderer.shutdown()?;

    let stats = renderer.stats();
    info!(
        "Headless run: {} frames submitted, {} skipped, {} stalls (avg {:?}, longest {:?})",
        stats.frames_submitted,
        stats.frames_skipped,
        stats.stalls.count,
        stats.stalls.average(),
        stats.stalls.longest
    );
    Ok(())
}

fn main() -> Result<()> {
    shapes_core::init_logging();

    let args = Args::parse();
    let config = AppConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    info!(
        "Starting shapes viewer ({} frames in flight)",
        config.renderer.frames_in_flight
    );

    if let Some(frames) = args.headless {
        return run_headless(&config, frames);
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // The loop may return without calling `exiting` on some platforms.
    if app.renderer.is_some() {
        warn!("Event loop ended without exiting; draining now");
        app.shutdown();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("shapes").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_empty() {
        let args = parse(&[]).unwrap();
        assert!(args.config.is_none());
        assert!(args.headless.is_none());
    }

    #[test]
    fn test_parse_config_and_headless() {
        let args = parse(&["shapes.toml", "--headless", "120"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("shapes.toml")));
        assert_eq!(args.headless, Some(120));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse(&["--headless"]).is_err());
        assert!(parse(&["--headless", "many"]).is_err());
        assert!(parse(&["--fast"]).is_err());
        assert!(parse(&["a.toml", "b.toml"]).is_err());
    }

    #[test]
    fn test_drag_rotates_by_motion_of_each_frame() {
        let config = AppConfig::default();
        let mut renderer = Renderer::headless(&config).unwrap();
        let mut input = InputState::new();
        let step = 10.0 * config.camera.rotate_degrees_per_pixel.to_radians();

        input.on_mouse_moved(0.0, 0.0);
        input.on_mouse_pressed(MouseButton::Left);
        let mut previous = renderer.camera().theta;
        for frame in 1..=3 {
            input.on_mouse_moved(10.0 * frame as f32, 0.0);
            apply_input(&mut input, &mut renderer);
            let theta = renderer.camera().theta;
            assert!((theta - previous - step).abs() < 1e-5, "frame {frame}");
            previous = theta;
        }
    }

    #[test]
    fn test_hover_motion_is_not_replayed_by_next_drag() {
        let mut renderer = Renderer::headless(&AppConfig::default()).unwrap();
        let mut input = InputState::new();
        let start = renderer.camera().theta;

        input.on_mouse_moved(0.0, 0.0);
        input.on_mouse_moved(500.0, 0.0);
        apply_input(&mut input, &mut renderer);
        assert_eq!(renderer.camera().theta, start);

        input.on_mouse_pressed(MouseButton::Left);
        apply_input(&mut input, &mut renderer);
        assert_eq!(renderer.camera().theta, start);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_holding_one_selects_wireframe() {
        let mut renderer = Renderer::headless(&AppConfig::default()).unwrap();
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Digit1);
        apply_input(&mut input, &mut renderer);
        renderer.render_frame(shapes_core::FrameTime { total: 0.0, delta: 0.0 }).unwrap();

        let submissions = renderer.scheduler().backend().submissions();
        assert_eq!(
            submissions[0].pipeline(),
            Some(shapes_renderer::PipelineVariant::Wireframe)
        );
    }

    #[test]
    fn test_headless_run() {
        run_headless(&AppConfig::default(), 10).unwrap();
    }
}
