//! The seam between the frame engine and a GPU.
//!
//! The ring, the constant pools and the scheduler only talk to the GPU
//! through these traits. [`VulkanBackend`](crate::vulkan::VulkanBackend)
//! drives real hardware; [`HeadlessBackend`](crate::headless::HeadlessBackend)
//! simulates one for tests and benchmarking.

use shapes_rhi::RhiResult;
use shapes_rhi::pipeline::PrimitiveTopology;

use crate::geometry::GeometryStore;

/// Monotonic completion counter advanced by the GPU.
pub trait GpuTimeline {
    /// Last value the GPU has reported as reached.
    fn completed_value(&self) -> RhiResult<u64>;

    /// Blocks the calling thread until the counter reaches `value`.
    ///
    /// There is no timeout: a GPU that never gets there hangs the caller.
    fn wait_for_value(&self, value: u64) -> RhiResult<()>;
}

/// CPU-writable, GPU-readable memory backing one constant pool.
pub trait ConstantStorage {
    /// Copies `bytes` to `offset`. The write becomes visible to the GPU
    /// through work submitted afterwards; no flush is issued.
    fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> RhiResult<()>;

    /// GPU-visible base address.
    fn gpu_address(&self) -> u64;

    /// Size in bytes.
    fn size(&self) -> u64;
}

/// Pipeline state used for every draw of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PipelineVariant {
    /// Filled triangles.
    #[default]
    Opaque,
    /// Triangle edges only.
    Wireframe,
}

/// Outcome of preparing the render target for a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameTarget {
    /// Recording may proceed.
    Ready,
    /// The presentation surface changed; the frame must be skipped.
    Outdated,
}

/// Outcome of presenting a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    /// Presented, but the surface needs to be rebuilt before the next frame.
    Outdated,
}

/// Indexed draw parameters for one sub-mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawArgs {
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
    pub topology: PrimitiveTopology,
}

/// A GPU the frame engine can drive.
///
/// Recording calls (`bind_*`, `draw`) are infallible: they only append to
/// the command scope. Anything that talks to the device returns
/// [`RhiResult`], and every error it yields is fatal.
pub trait RenderBackend: GpuTimeline {
    /// Host-visible buffer holding constant records.
    type ConstantBuffer: ConstantStorage;
    /// Per-slot command recording state.
    type CommandScope;

    /// Required alignment of constant records within a buffer.
    fn constant_alignment(&self) -> u64;

    fn create_constant_buffer(&mut self, size: u64) -> RhiResult<Self::ConstantBuffer>;

    fn create_command_scope(&mut self, slot: usize) -> RhiResult<Self::CommandScope>;

    /// Uploads the shared vertex and index data. Called once.
    fn upload_geometry(&mut self, geometry: &GeometryStore) -> RhiResult<()>;

    /// Allocates a descriptor table with `size` entries.
    fn create_descriptor_table(&mut self, size: usize) -> RhiResult<()>;

    /// Points table entry `offset` at `byte_size` bytes of `buffer`
    /// starting at `byte_offset`.
    fn write_descriptor(
        &mut self,
        offset: usize,
        buffer: &Self::ConstantBuffer,
        byte_offset: u64,
        byte_size: u64,
    ) -> RhiResult<()>;

    /// Resets `scope` and opens a frame with the given pipeline state.
    fn begin_frame(
        &mut self,
        scope: &mut Self::CommandScope,
        pipeline: PipelineVariant,
    ) -> RhiResult<FrameTarget>;

    /// Binds the pass constants at table entry `descriptor`.
    fn bind_pass(&mut self, scope: &mut Self::CommandScope, descriptor: usize);

    /// Binds the shared vertex and index buffers.
    fn bind_geometry(&mut self, scope: &mut Self::CommandScope);

    /// Binds the object constants at table entry `descriptor` and draws.
    fn draw(&mut self, scope: &mut Self::CommandScope, descriptor: usize, args: &DrawArgs);

    /// Closes the frame and submits it; the GPU timeline reaches
    /// `signal_value` once the work completes.
    fn submit(&mut self, scope: &mut Self::CommandScope, signal_value: u64) -> RhiResult<()>;

    /// Presents the image rendered by the last submission from `scope`.
    fn present(&mut self, scope: &mut Self::CommandScope) -> RhiResult<PresentStatus>;

    /// Rebuilds size-dependent resources.
    fn resize(&mut self, width: u32, height: u32) -> RhiResult<()>;

    /// Waits until the device has no pending work.
    fn wait_idle(&self) -> RhiResult<()>;
}
