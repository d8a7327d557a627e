//! Per-frame orchestration: acquire a slot, upload, record, submit, present.

use std::fmt;

use glam::Mat4;
use shapes_core::FrameTime;
use shapes_rhi::RhiResult;
use shapes_scene::OrbitCamera;
use tracing::{debug, error, info, trace};

use crate::backend::{FrameTarget, PipelineVariant, PresentStatus, RenderBackend};
use crate::descriptor_index::DescriptorLayout;
use crate::frame_ring::{FrameRing, StallStats};
use crate::geometry::GeometryStore;
use crate::pass::{Viewport, compute_pass_constants};
use crate::render_item::{RenderItemId, RenderItemRegistry};

/// Where the scheduler is within a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// No frame started, or the last one was skipped.
    Idle,
    /// A slot is acquired and its constants are being written.
    Updating,
    /// Commands are being recorded into the slot's scope.
    Recording,
    /// The frame was handed to the GPU.
    Submitted,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameState::Idle => "idle",
            FrameState::Updating => "updating",
            FrameState::Recording => "recording",
            FrameState::Submitted => "submitted",
        };
        f.write_str(name)
    }
}

/// What happened to a frame after recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Submitted {
        slot: usize,
        signal_value: u64,
        present: PresentStatus,
    },
    /// The render target was outdated; nothing was submitted.
    Skipped,
}

/// Counters reported by [`FrameScheduler::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_submitted: u64,
    pub frames_skipped: u64,
    pub stalls: StallStats,
}

/// Drives the frame ring against a backend.
///
/// Each frame runs [`update`](Self::update) then
/// [`record_and_submit`](Self::record_and_submit) on the same slot.
/// Dropping the scheduler waits for all submitted work first.
pub struct FrameScheduler<B: RenderBackend> {
    // Declared before `backend` so slot resources are released first.
    ring: FrameRing<B>,
    registry: RenderItemRegistry,
    geometry: GeometryStore,
    layout: DescriptorLayout,
    viewport: Viewport,
    state: FrameState,
    frames_submitted: u64,
    frames_skipped: u64,
    backend: B,
}

impl<B: RenderBackend> FrameScheduler<B> {
    /// Uploads `geometry`, creates one slot per ring entry of `registry` and
    /// fills the descriptor table.
    ///
    /// Slot capacity is fixed to the items registered at this point.
    pub fn new(
        mut backend: B,
        geometry: GeometryStore,
        registry: RenderItemRegistry,
        viewport: Viewport,
    ) -> RhiResult<Self> {
        for item in registry.iter() {
            assert!(
                geometry.try_range(item.shape()).is_some(),
                "render item {} draws {}, which is not in the geometry store",
                item.constant_index(),
                item.shape()
            );
        }

        backend.upload_geometry(&geometry)?;

        let depth = registry.depth();
        let ring = FrameRing::new(&mut backend, depth, registry.len())?;
        assert_eq!(ring.depth(), registry.depth(), "registry and ring depth differ");

        let layout = DescriptorLayout::new(registry.len(), depth);
        backend.create_descriptor_table(layout.table_size())?;

        for (index, slot) in ring.slots().iter().enumerate() {
            let objects = slot.objects();
            for item in 0..layout.item_count() {
                backend.write_descriptor(
                    layout.object_offset(index, item),
                    objects.storage(),
                    objects.record_offset(item),
                    objects.record_size(),
                )?;
            }
            let pass = slot.pass();
            backend.write_descriptor(
                layout.pass_offset(index),
                pass.storage(),
                pass.record_offset(0),
                pass.record_size(),
            )?;
        }

        info!(
            "Frame scheduler ready: {} items, {depth} slots, {} descriptors",
            registry.len(),
            layout.table_size()
        );

        Ok(Self {
            ring,
            registry,
            geometry,
            layout,
            viewport,
            state: FrameState::Idle,
            frames_submitted: 0,
            frames_skipped: 0,
            backend,
        })
    }

    /// Acquires the next slot (possibly waiting on the GPU), writes stale
    /// object constants and this frame's pass constants into it.
    ///
    /// Returns the acquired slot index.
    ///
    /// # Panics
    ///
    /// Panics if called in the middle of a frame.
    pub fn update(&mut self, camera: &OrbitCamera, time: FrameTime) -> RhiResult<usize> {
        assert!(
            matches!(self.state, FrameState::Idle | FrameState::Submitted),
            "update called while {}",
            self.state
        );

        let slot = self.ring.acquire_next(&self.backend)?;
        self.state = FrameState::Updating;

        let frame = self.ring.current_mut();
        let written = self.registry.flush_dirty(frame.objects_mut())?;
        let pass = compute_pass_constants(camera, self.viewport, time);
        frame.pass_mut().write(0, &pass)?;

        trace!("Updated slot {slot}: {written} object records");
        Ok(slot)
    }

    /// Records every render item into the acquired slot, submits it and
    /// presents.
    ///
    /// If the render target is outdated the frame is skipped and the
    /// scheduler returns to [`FrameState::Idle`]. The slot keeps its
    /// previous completion marker and the constants written by
    /// [`update`](Self::update) stay in place for its next use.
    ///
    /// # Panics
    ///
    /// Panics unless [`update`](Self::update) was called first.
    pub fn record_and_submit(&mut self, pipeline: PipelineVariant) -> RhiResult<FrameOutcome> {
        assert!(
            self.state == FrameState::Updating,
            "record_and_submit called while {}",
            self.state
        );
        self.state = FrameState::Recording;

        let slot = self.ring.cursor();
        let scope = self.ring.current_mut().scope_mut();

        if self.backend.begin_frame(scope, pipeline)? == FrameTarget::Outdated {
            self.frames_skipped += 1;
            self.state = FrameState::Idle;
            debug!("Render target outdated, skipping frame on slot {slot}");
            return Ok(FrameOutcome::Skipped);
        }

        self.backend.bind_pass(scope, self.layout.pass_offset(slot));
        for item in self.registry.iter() {
            self.backend.bind_geometry(scope);
            self.backend.draw(
                scope,
                self.layout.object_offset(slot, item.constant_index()),
                item.draw_args(),
            );
        }

        let signal_value = self.ring.next_timeline_value();
        self.backend
            .submit(self.ring.current_mut().scope_mut(), signal_value)?;
        self.ring.stamp_current(signal_value);
        self.state = FrameState::Submitted;
        self.frames_submitted += 1;

        let present = self.backend.present(self.ring.current_mut().scope_mut())?;
        if present == PresentStatus::Outdated {
            debug!("Presentation reported an outdated surface");
        }

        trace!("Submitted slot {slot} with timeline value {signal_value}");
        Ok(FrameOutcome::Submitted {
            slot,
            signal_value,
            present,
        })
    }

    /// Runs a whole frame.
    pub fn tick(
        &mut self,
        camera: &OrbitCamera,
        time: FrameTime,
        pipeline: PipelineVariant,
    ) -> RhiResult<FrameOutcome> {
        self.update(camera, time)?;
        self.record_and_submit(pipeline)
    }

    /// Replaces the transform of `id`; it reaches every slot over the next
    /// ring rotation.
    pub fn set_transform(&mut self, id: RenderItemId, transform: Mat4) {
        self.registry.set_transform(id, transform);
    }

    pub fn mark_dirty(&mut self, id: RenderItemId) {
        self.registry.mark_dirty(id);
    }

    /// Resizes the render target. The next frame's pass constants use the
    /// new viewport.
    pub fn resize(&mut self, width: u32, height: u32) -> RhiResult<()> {
        self.viewport = Viewport::new(width, height);
        self.backend.resize(width, height)?;
        debug!("Frame scheduler resized to {width}x{height}");
        Ok(())
    }

    /// Waits until the GPU has finished every submitted frame.
    pub fn shutdown(&mut self) -> RhiResult<()> {
        self.ring.drain(&self.backend)?;
        self.state = FrameState::Idle;
        info!(
            "Frame scheduler drained after {} frames ({} skipped)",
            self.frames_submitted, self.frames_skipped
        );
        Ok(())
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            frames_submitted: self.frames_submitted,
            frames_skipped: self.frames_skipped,
            stalls: self.ring.stall_stats(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn registry(&self) -> &RenderItemRegistry {
        &self.registry
    }

    pub fn geometry(&self) -> &GeometryStore {
        &self.geometry
    }

    pub fn layout(&self) -> &DescriptorLayout {
        &self.layout
    }

    pub fn ring(&self) -> &FrameRing<B> {
        &self.ring
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: RenderBackend> Drop for FrameScheduler<B> {
    fn drop(&mut self) {
        if let Err(e) = self.ring.drain(&self.backend) {
            error!("Failed to drain frame ring: {e}");
        }
    }
}
