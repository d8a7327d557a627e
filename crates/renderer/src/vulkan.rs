//! Vulkan implementation of [`RenderBackend`].
//!
//! # Synchronization
//!
//! Frame completion is tracked with one timeline semaphore. Every submission
//! signals it with the frame's timeline value next to the binary
//! render-finished semaphore used by presentation. The host reads and waits
//! on the timeline through [`GpuTimeline`]; no fences are used.
//!
//! # Descriptors
//!
//! The descriptor table is a pool of single-uniform-buffer sets indexed by
//! the linear table offset. Set 0 of the pipeline layout takes an object
//! entry, set 1 the pass entry, so both use the same set layout.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use shapes_core::config::RendererConfig;
use shapes_platform::{Surface, Window};
use shapes_rhi::buffer::{Buffer, BufferUsage};
use shapes_rhi::command::{CommandBuffer, CommandPool};
use shapes_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, write_uniform_buffer,
};
use shapes_rhi::device::Device;
use shapes_rhi::instance::Instance;
use shapes_rhi::physical_device::select_physical_device;
use shapes_rhi::pipeline::{
    CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout, PolygonMode, PrimitiveTopology,
};
use shapes_rhi::shader::{Shader, ShaderStage};
use shapes_rhi::swapchain::Swapchain;
use shapes_rhi::sync::{Semaphore, TimelineSemaphore};
use shapes_rhi::vertex::ColorVertex;
use shapes_rhi::{RhiError, RhiResult};

use crate::backend::{
    ConstantStorage, DrawArgs, FrameTarget, GpuTimeline, PipelineVariant, PresentStatus,
    RenderBackend,
};
use crate::depth_buffer::{DEPTH_FORMAT, DepthBuffer};
use crate::geometry::GeometryStore;

/// Directory holding the compiled `color.vert.spv` and `color.frag.spv`.
pub const SHADER_DIR: &str = "shaders/spirv";

impl ConstantStorage for Buffer {
    fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> RhiResult<()> {
        self.write_data(offset, bytes)
    }

    fn gpu_address(&self) -> u64 {
        self.device_address()
    }

    fn size(&self) -> u64 {
        Buffer::size(self)
    }
}

/// Per-slot recording state.
pub struct VulkanScope {
    slot: usize,
    command_buffer: CommandBuffer,
    command_pool: CommandPool,
    /// Signaled by the swapchain when the acquired image is ready.
    image_available: Semaphore,
    image_index: Option<u32>,
}

impl VulkanScope {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

struct GeometryBuffers {
    vertices: Buffer,
    indices: Buffer,
}

/// Renders into a window surface through Vulkan 1.3.
pub struct VulkanBackend {
    // Fields drop in declaration order: everything created from the device
    // goes first, then the device, the surface and finally the instance.
    geometry: Option<GeometryBuffers>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    descriptor_pool: Option<DescriptorPool>,
    fill_pipeline: Pipeline,
    wireframe_pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    set_layout: DescriptorSetLayout,
    timeline: TimelineSemaphore,
    /// One per swapchain image.
    render_finished: Vec<Semaphore>,
    depth_buffer: DepthBuffer,
    swapchain: Swapchain,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,

    clear_color: [f32; 4],
    width: u32,
    height: u32,
    swapchain_dirty: bool,
}

impl VulkanBackend {
    /// Creates the instance, device, swapchain and pipelines for `window`.
    ///
    /// # Arguments
    ///
    /// * `window` - Target window; must outlive the backend
    /// * `config` - Validation, vsync and clear color settings
    /// * `shader_dir` - Directory containing the compiled SPIR-V shaders
    ///
    /// # Errors
    ///
    /// Returns an error if no GPU supports timeline semaphores, dynamic
    /// rendering and non-solid fill, or if any Vulkan object cannot be
    /// created.
    pub fn new(window: &Window, config: &RendererConfig, shader_dir: &Path) -> RhiResult<Self> {
        let (width, height) = (window.width(), window.height());
        info!("Initializing Vulkan backend ({}x{})", width, height);

        let extensions = window
            .required_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(config.validation, &extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            config.vsync,
        )?;
        let depth_buffer = DepthBuffer::new(device.clone(), swapchain.extent())?;
        let render_finished = create_semaphores(&device, swapchain.image_count() as usize)?;
        let timeline = TimelineSemaphore::new(device.clone(), 0)?;

        let set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[DescriptorBindingBuilder::uniform_buffer(
                0,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;
        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[set_layout.handle(), set_layout.handle()],
            &[],
        )?;

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("color.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("color.frag.spv"),
            ShaderStage::Fragment,
            "main",
        )?;

        let build_pipeline = |mode: PolygonMode| {
            GraphicsPipelineBuilder::new()
                .vertex_shader(&vertex_shader)
                .fragment_shader(&fragment_shader)
                .vertex_binding(ColorVertex::binding_description())
                .vertex_attributes(&ColorVertex::attribute_descriptions())
                .topology(PrimitiveTopology::TriangleList)
                .polygon_mode(mode)
                .cull_mode(CullMode::None)
                .depth_test_enable(true)
                .depth_write_enable(true)
                .color_attachment_format(swapchain.format())
                .depth_attachment_format(DEPTH_FORMAT)
                .build(device.clone(), &pipeline_layout)
        };
        let fill_pipeline = build_pipeline(PolygonMode::Fill)?;
        let wireframe_pipeline = build_pipeline(PolygonMode::Line)?;

        info!(
            "Vulkan backend initialized: {} swapchain images",
            swapchain.image_count()
        );

        Ok(Self {
            geometry: None,
            descriptor_sets: Vec::new(),
            descriptor_pool: None,
            fill_pipeline,
            wireframe_pipeline,
            pipeline_layout,
            set_layout,
            timeline,
            render_finished,
            depth_buffer,
            swapchain,
            device,
            surface,
            instance,
            clear_color: config.clear_color,
            width,
            height,
            swapchain_dirty: false,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Rebuilds the swapchain, depth buffer and per-image semaphores for the
    /// current size.
    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        self.swapchain.recreate(
            &self.instance,
            self.surface.handle(),
            self.width,
            self.height,
        )?;
        self.depth_buffer = DepthBuffer::new(self.device.clone(), self.swapchain.extent())?;
        self.render_finished =
            create_semaphores(&self.device, self.swapchain.image_count() as usize)?;
        self.swapchain_dirty = false;
        Ok(())
    }

    fn pipeline(&self, variant: PipelineVariant) -> &Pipeline {
        match variant {
            PipelineVariant::Opaque => &self.fill_pipeline,
            PipelineVariant::Wireframe => &self.wireframe_pipeline,
        }
    }

    fn record_frame_start(&self, scope: &VulkanScope, image_index: u32, variant: PipelineVariant) -> RhiResult<()> {
        let cmd = &scope.command_buffer;
        let color_image = self.swapchain.image(image_index as usize);
        let extent = self.swapchain.extent();

        scope.command_pool.reset()?;
        cmd.begin()?;

        cmd.transition_image(
            color_image,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        cmd.transition_image(
            self.depth_buffer.image(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
        );

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_view(image_index as usize))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            });

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth_buffer.image_view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);
        cmd.set_viewport_and_scissor(extent);
        cmd.bind_graphics_pipeline(self.pipeline(variant).handle());
        Ok(())
    }

    fn descriptor_set(&self, descriptor: usize) -> vk::DescriptorSet {
        *self.descriptor_sets.get(descriptor).unwrap_or_else(|| {
            panic!(
                "descriptor {descriptor} out of range for table of {}",
                self.descriptor_sets.len()
            )
        })
    }
}

fn create_semaphores(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Semaphore>> {
    (0..count).map(|_| Semaphore::new(device.clone())).collect()
}

impl GpuTimeline for VulkanBackend {
    fn completed_value(&self) -> RhiResult<u64> {
        self.timeline.value()
    }

    fn wait_for_value(&self, value: u64) -> RhiResult<()> {
        self.timeline.wait(value, u64::MAX)
    }
}

impl RenderBackend for VulkanBackend {
    type ConstantBuffer = Buffer;
    type CommandScope = VulkanScope;

    fn constant_alignment(&self) -> u64 {
        self.device.min_uniform_alignment()
    }

    fn create_constant_buffer(&mut self, size: u64) -> RhiResult<Buffer> {
        Buffer::new(self.device.clone(), BufferUsage::Uniform, size)
    }

    fn create_command_scope(&mut self, slot: usize) -> RhiResult<VulkanScope> {
        let graphics_family = self
            .device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let command_pool = CommandPool::new(self.device.clone(), graphics_family)?;
        let command_buffer = CommandBuffer::new(self.device.clone(), &command_pool)?;
        let image_available = Semaphore::new(self.device.clone())?;
        debug!("Created command scope for slot {slot}");

        Ok(VulkanScope {
            slot,
            command_buffer,
            command_pool,
            image_available,
            image_index: None,
        })
    }

    fn upload_geometry(&mut self, geometry: &GeometryStore) -> RhiResult<()> {
        let vertices = Buffer::new_with_data(
            self.device.clone(),
            BufferUsage::Vertex,
            geometry.vertex_bytes(),
        )?;
        let indices = Buffer::new_with_data(
            self.device.clone(),
            BufferUsage::Index,
            geometry.index_bytes(),
        )?;
        info!(
            "Uploaded geometry: {} vertices, {} indices",
            geometry.vertices().len(),
            geometry.indices().len()
        );
        self.geometry = Some(GeometryBuffers { vertices, indices });
        Ok(())
    }

    fn create_descriptor_table(&mut self, size: usize) -> RhiResult<()> {
        let count = u32::try_from(size)
            .map_err(|_| RhiError::BufferError(format!("descriptor table of {size} entries")))?;
        let pool = DescriptorPool::uniform_buffers(self.device.clone(), count)?;
        let layouts = vec![self.set_layout.handle(); size];
        self.descriptor_sets = pool.allocate(&layouts)?;
        self.descriptor_pool = Some(pool);
        Ok(())
    }

    fn write_descriptor(
        &mut self,
        offset: usize,
        buffer: &Buffer,
        byte_offset: u64,
        byte_size: u64,
    ) -> RhiResult<()> {
        let set = self.descriptor_set(offset);
        write_uniform_buffer(&self.device, set, 0, buffer.handle(), byte_offset, byte_size);
        Ok(())
    }

    fn begin_frame(
        &mut self,
        scope: &mut VulkanScope,
        pipeline: PipelineVariant,
    ) -> RhiResult<FrameTarget> {
        scope.image_index = None;

        if self.width == 0 || self.height == 0 {
            return Ok(FrameTarget::Outdated);
        }
        if self.swapchain_dirty {
            debug!("Recreating swapchain before acquire");
            self.recreate_swapchain()?;
        }

        let Some((image_index, suboptimal)) = self
            .swapchain
            .acquire_next_image(scope.image_available.handle())?
        else {
            self.swapchain_dirty = true;
            return Ok(FrameTarget::Outdated);
        };
        if suboptimal {
            self.swapchain_dirty = true;
        }

        self.record_frame_start(scope, image_index, pipeline)?;
        scope.image_index = Some(image_index);
        Ok(FrameTarget::Ready)
    }

    fn bind_pass(&mut self, scope: &mut VulkanScope, descriptor: usize) {
        scope.command_buffer.bind_descriptor_sets(
            self.pipeline_layout.handle(),
            1,
            &[self.descriptor_set(descriptor)],
        );
    }

    fn bind_geometry(&mut self, scope: &mut VulkanScope) {
        let Some(geometry) = &self.geometry else {
            panic!("geometry was never uploaded");
        };
        scope
            .command_buffer
            .bind_vertex_buffer(geometry.vertices.handle());
        scope
            .command_buffer
            .bind_index_buffer(geometry.indices.handle(), vk::IndexType::UINT16);
    }

    fn draw(&mut self, scope: &mut VulkanScope, descriptor: usize, args: &DrawArgs) {
        debug_assert_eq!(args.topology, PrimitiveTopology::TriangleList);
        scope.command_buffer.bind_descriptor_sets(
            self.pipeline_layout.handle(),
            0,
            &[self.descriptor_set(descriptor)],
        );
        scope
            .command_buffer
            .draw_indexed(args.index_count, args.start_index, args.base_vertex);
    }

    fn submit(&mut self, scope: &mut VulkanScope, signal_value: u64) -> RhiResult<()> {
        let image_index = scope.image_index.ok_or_else(|| {
            RhiError::SwapchainError("submit without an acquired image".to_string())
        })?;
        let cmd = &scope.command_buffer;

        cmd.end_rendering();
        cmd.transition_image(
            self.swapchain.image(image_index as usize),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        cmd.end()?;

        let wait_semaphores = [scope.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let wait_values = [0];
        let signal_semaphores = [
            self.render_finished[image_index as usize].handle(),
            self.timeline.handle(),
        ];
        // Binary semaphores ignore their value.
        let signal_values = [0, signal_value];
        let command_buffers = [cmd.handle()];

        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        // SAFETY: the command buffer was recorded above, the semaphores are
        // alive, and the slot's previous submission has completed.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], vk::Fence::null())?;
        }
        Ok(())
    }

    fn present(&mut self, scope: &mut VulkanScope) -> RhiResult<PresentStatus> {
        let image_index = scope.image_index.take().ok_or_else(|| {
            RhiError::SwapchainError("present without an acquired image".to_string())
        })?;

        let needs_rebuild = self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.render_finished[image_index as usize].handle(),
        )?;

        if needs_rebuild || self.swapchain_dirty {
            self.swapchain_dirty = true;
            Ok(PresentStatus::Outdated)
        } else {
            Ok(PresentStatus::Presented)
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> RhiResult<()> {
        if width != self.width || height != self.height {
            debug!(
                "Resize requested: {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            self.width = width;
            self.height = height;
            self.swapchain_dirty = true;
        }
        Ok(())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during backend drop: {e}");
        }
        info!("Vulkan backend destroyed");
    }
}
