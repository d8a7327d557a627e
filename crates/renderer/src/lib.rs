//! Frame pipelining engine for the shapes renderer.
//!
//! The CPU prepares frame N+1 while the GPU still executes frame N. Per-frame
//! state lives in a [`FrameRing`] of slots; a slot is reused only once the
//! GPU timeline has passed the value stamped on its last submission.
//!
//! - [`FrameScheduler`] runs the per-frame state machine
//! - [`RenderItemRegistry`] tracks which slot copies of each transform are stale
//! - [`DescriptorLayout`] maps (slot, item) pairs to descriptor table entries
//! - [`RenderBackend`] is the GPU seam, implemented by [`VulkanBackend`] and
//!   [`HeadlessBackend`]

pub mod backend;
pub mod constant_pool;
pub mod constants;
mod depth_buffer;
pub mod descriptor_index;
pub mod frame_ring;
pub mod geometry;
pub mod headless;
pub mod pass;
pub mod render_item;
mod renderer;
pub mod scheduler;
pub mod vulkan;

pub use backend::{
    ConstantStorage, DrawArgs, FrameTarget, GpuTimeline, PipelineVariant, PresentStatus,
    RenderBackend,
};
pub use constant_pool::ConstantBufferPool;
pub use constants::{ObjectConstants, PassConstants};
pub use descriptor_index::{DescriptorLayout, DescriptorRequest};
pub use frame_ring::{FrameRing, FrameSlot, StallStats};
pub use geometry::{GeometryStore, SubmeshRange};
pub use headless::HeadlessBackend;
pub use pass::{Viewport, compute_pass_constants};
pub use render_item::{RenderItem, RenderItemId, RenderItemRegistry};
pub use renderer::{Renderer, camera_from_config};
pub use scheduler::{FrameOutcome, FrameScheduler, FrameState, SchedulerStats};
pub use vulkan::VulkanBackend;
