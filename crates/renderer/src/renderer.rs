//! The demo scene wired to a frame scheduler.

use std::path::Path;

use shapes_core::FrameTime;
use shapes_core::config::{AppConfig, CameraConfig};
use shapes_geometry::{ProceduralShapes, ShapeKind};
use shapes_platform::Window;
use shapes_rhi::RhiResult;
use shapes_scene::{Lens, OrbitCamera, OrbitController, OrbitLimits, ShapeInstance, demo_layout};
use tracing::info;

use crate::backend::{PipelineVariant, RenderBackend};
use crate::geometry::GeometryStore;
use crate::headless::HeadlessBackend;
use crate::pass::Viewport;
use crate::render_item::{RenderItemId, RenderItemRegistry};
use crate::scheduler::{FrameOutcome, FrameScheduler, SchedulerStats};
use crate::vulkan::{SHADER_DIR, VulkanBackend};

/// Builds the orbit camera described by `config`.
pub fn camera_from_config(config: &CameraConfig) -> OrbitCamera {
    OrbitCamera::new(config.theta, config.phi, config.radius)
        .with_limits(OrbitLimits {
            min_radius: config.min_radius,
            max_radius: config.max_radius,
            phi_margin: config.phi_margin,
        })
        .with_lens(Lens {
            fov_y: config.fov_y_degrees.to_radians(),
            near: config.near,
            far: config.far,
        })
}

/// Owns the scene state and feeds it to a [`FrameScheduler`] every frame.
pub struct Renderer<B: RenderBackend> {
    scheduler: FrameScheduler<B>,
    camera: OrbitCamera,
    controller: OrbitController,
    /// Spinning instances and the items drawing them.
    animated: Vec<(RenderItemId, ShapeInstance)>,
    animate: bool,
    wireframe: bool,
}

impl<B: RenderBackend> Renderer<B> {
    /// Builds the demo scene on `backend`.
    ///
    /// Render items are created in layout order, which is also draw order.
    pub fn new(backend: B, config: &AppConfig, viewport: Viewport) -> RhiResult<Self> {
        let geometry = GeometryStore::build(&ProceduralShapes, &ShapeKind::ALL);
        let mut registry = RenderItemRegistry::new(config.renderer.frames_in_flight);

        let mut animated = Vec::new();
        for instance in demo_layout() {
            let id = registry.add(&geometry, instance.shape, instance.world());
            if instance.spin.is_some() {
                animated.push((id, instance));
            }
        }

        info!(
            "Scene built: {} render items, {} animated",
            registry.len(),
            animated.len()
        );

        let scheduler = FrameScheduler::new(backend, geometry, registry, viewport)?;

        Ok(Self {
            scheduler,
            camera: camera_from_config(&config.camera),
            controller: OrbitController::new(
                config.camera.rotate_degrees_per_pixel,
                config.camera.zoom_per_pixel,
            ),
            animated,
            animate: config.scene.animate,
            wireframe: false,
        })
    }

    /// Advances animation and renders one frame.
    pub fn render_frame(&mut self, time: FrameTime) -> RhiResult<FrameOutcome> {
        if self.animate {
            for (id, instance) in &self.animated {
                self.scheduler.set_transform(*id, instance.world_at(time.total));
            }
        }

        let pipeline = if self.wireframe {
            PipelineVariant::Wireframe
        } else {
            PipelineVariant::Opaque
        };
        self.scheduler.tick(&self.camera, time, pipeline)
    }

    /// Applies a left-button drag of `(dx, dy)` pixels.
    pub fn rotate_camera(&mut self, dx: f32, dy: f32) {
        self.controller.rotate(&mut self.camera, dx, dy);
    }

    /// Applies a right-button drag of `(dx, dy)` pixels.
    pub fn zoom_camera(&mut self, dx: f32, dy: f32) {
        self.controller.zoom(&mut self.camera, dx, dy);
    }

    /// Selects the wireframe pipeline for subsequent frames.
    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.wireframe = wireframe;
    }

    pub fn set_animate(&mut self, animate: bool) {
        self.animate = animate;
    }

    pub fn resize(&mut self, width: u32, height: u32) -> RhiResult<()> {
        self.scheduler.resize(width, height)
    }

    /// Waits for all submitted frames to finish.
    pub fn shutdown(&mut self) -> RhiResult<()> {
        self.scheduler.shutdown()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn scheduler(&self) -> &FrameScheduler<B> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler<B> {
        &mut self.scheduler
    }
}

impl Renderer<VulkanBackend> {
    /// Creates a renderer presenting to `window`.
    pub fn for_window(window: &Window, config: &AppConfig) -> RhiResult<Self> {
        let backend = VulkanBackend::new(window, &config.renderer, Path::new(SHADER_DIR))?;
        let viewport = Viewport::new(window.width(), window.height());
        Self::new(backend, config, viewport)
    }
}

impl Renderer<HeadlessBackend> {
    /// Creates a renderer on the simulated GPU, which retires each frame
    /// `frames_in_flight - 1` submissions later.
    pub fn headless(config: &AppConfig) -> RhiResult<Self> {
        let latency = config.renderer.frames_in_flight.saturating_sub(1) as u64;
        let backend = HeadlessBackend::new(config.window.width, config.window.height)
            .with_latency(latency);
        let viewport = Viewport::new(config.window.width, config.window.height);
        Self::new(backend, config, viewport)
    }
}
