//! Graphics pipeline management.
//!
//! This module handles VkPipeline and VkPipelineLayout creation for the
//! shape pipelines. Every pipeline targets dynamic rendering and uses
//! dynamic viewport and scissor state, so a swapchain resize never forces
//! a pipeline rebuild.
//!
//! # Overview
//!
//! - [`PipelineLayout`] wraps VkPipelineLayout for descriptor set configuration
//! - [`Pipeline`] wraps a graphics VkPipeline
//! - [`GraphicsPipelineBuilder`] collects the fixed-function state and builds the pipeline
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use shapes_rhi::device::Device;
//! use shapes_rhi::shader::{Shader, ShaderStage};
//! use shapes_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, PipelineLayout, PolygonMode};
//! use shapes_rhi::vertex::ColorVertex;
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), shapes_rhi::RhiError> {
//! let vertex_shader = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/color.vert.spv"),
//!     ShaderStage::Vertex,
//!     "main",
//! )?;
//! let fragment_shader = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/color.frag.spv"),
//!     ShaderStage::Fragment,
//!     "main",
//! )?;
//!
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//!
//! let wireframe = GraphicsPipelineBuilder::new()
//!     .vertex_shader(&vertex_shader)
//!     .fragment_shader(&fragment_shader)
//!     .vertex_binding(ColorVertex::binding_description())
//!     .vertex_attributes(&ColorVertex::attribute_descriptions())
//!     .polygon_mode(PolygonMode::Line)
//!     .cull_mode(CullMode::None)
//!     .color_attachment_format(vk::Format::B8G8R8A8_SRGB)
//!     .depth_attachment_format(vk::Format::D32_SFLOAT)
//!     .build(device.clone(), &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
///
/// A pipeline layout describes the descriptor set layouts and push constant
/// ranges a pipeline can access. The shape pipelines use two sets: set 0
/// holds the per-object constants and set 1 the per-pass constants.
pub struct PipelineLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline layout handle.
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a new pipeline layout.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `descriptor_set_layouts` - Descriptor set layout handles, in set order
    /// * `push_constant_ranges` - Push constant ranges (may be empty)
    ///
    /// # Errors
    ///
    /// Returns an error if pipeline layout creation fails.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} descriptor set layout(s) and {} push constant range(s)",
            descriptor_set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Graphics pipeline wrapper.
///
/// The pipeline is immutable after creation and can be shared between
/// threads.
pub struct Pipeline {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline handle.
    pipeline: vk::Pipeline,
    /// Rasterization mode the pipeline was built with.
    polygon_mode: PolygonMode,
}

impl Pipeline {
    fn create_graphics_internal(
        device: Arc<Device>,
        create_info: &vk::GraphicsPipelineCreateInfo,
        polygon_mode: PolygonMode,
    ) -> RhiResult<Self> {
        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[*create_info], None)
                .map_err(|(_, result)| result)?
        };
        let pipeline = pipelines.into_iter().next().ok_or_else(|| {
            RhiError::PipelineError("Driver returned no pipeline handle".to_string())
        })?;

        info!("Graphics pipeline created ({:?})", polygon_mode);

        Ok(Self {
            device,
            pipeline,
            polygon_mode,
        })
    }

    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Returns the rasterization mode this pipeline was built with.
    #[inline]
    pub fn polygon_mode(&self) -> PolygonMode {
        self.polygon_mode
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Graphics pipeline destroyed ({:?})", self.polygon_mode);
    }
}

/// Primitive topology for input assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// Independent lines.
    LineList,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Connected triangles with shared edges.
    TriangleStrip,
}

impl PrimitiveTopology {
    /// Converts to Vulkan primitive topology.
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

/// Polygon rasterization mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolygonMode {
    /// Fill the polygon interior.
    #[default]
    Fill,
    /// Draw polygon edges as lines. Requires `fillModeNonSolid`.
    Line,
}

impl PolygonMode {
    /// Converts to Vulkan polygon mode.
    pub fn to_vk(self) -> vk::PolygonMode {
        match self {
            PolygonMode::Fill => vk::PolygonMode::FILL,
            PolygonMode::Line => vk::PolygonMode::LINE,
        }
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    /// Do not cull any faces.
    None,
    /// Cull front-facing triangles.
    Front,
    /// Cull back-facing triangles.
    #[default]
    Back,
}

impl CullMode {
    /// Converts to Vulkan cull mode flags.
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Front face winding order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise winding is front-facing.
    #[default]
    CounterClockwise,
    /// Clockwise winding is front-facing.
    Clockwise,
}

impl FrontFace {
    /// Converts to Vulkan front face.
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Builder for graphics pipelines targeting dynamic rendering.
///
/// Defaults: triangle list, filled polygons, back-face culling,
/// counter-clockwise front faces, depth test and write enabled with
/// `LESS`, no blending, dynamic viewport and scissor.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,

    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,

    topology: PrimitiveTopology,

    polygon_mode: PolygonMode,
    cull_mode: CullMode,
    front_face: FrontFace,
    line_width: f32,

    depth_test_enable: bool,
    depth_write_enable: bool,

    color_attachment_formats: Vec<vk::Format>,
    depth_attachment_format: Option<vk::Format>,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Creates a new graphics pipeline builder with default settings.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: PrimitiveTopology::TriangleList,
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            line_width: 1.0,
            depth_test_enable: true,
            depth_write_enable: true,
            color_attachment_formats: Vec::new(),
            depth_attachment_format: None,
        }
    }

    /// Sets the vertex shader. Required.
    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    /// Sets the fragment shader. Required.
    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Adds a vertex input binding description.
    pub fn vertex_binding(mut self, binding: vk::VertexInputBindingDescription) -> Self {
        self.vertex_bindings.push(binding);
        self
    }

    /// Appends vertex input attribute descriptions.
    pub fn vertex_attributes(mut self, attributes: &[vk::VertexInputAttributeDescription]) -> Self {
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    /// Sets the primitive topology.
    pub fn topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Sets the polygon rasterization mode.
    pub fn polygon_mode(mut self, mode: PolygonMode) -> Self {
        self.polygon_mode = mode;
        self
    }

    /// Sets the face culling mode.
    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Sets the front face winding order.
    pub fn front_face(mut self, face: FrontFace) -> Self {
        self.front_face = face;
        self
    }

    /// Enables or disables depth testing.
    pub fn depth_test_enable(mut self, enable: bool) -> Self {
        self.depth_test_enable = enable;
        self
    }

    /// Enables or disables depth writes.
    pub fn depth_write_enable(mut self, enable: bool) -> Self {
        self.depth_write_enable = enable;
        self
    }

    /// Adds a color attachment format for dynamic rendering.
    pub fn color_attachment_format(mut self, format: vk::Format) -> Self {
        self.color_attachment_formats.push(format);
        self
    }

    /// Sets the depth attachment format for dynamic rendering.
    pub fn depth_attachment_format(mut self, format: vk::Format) -> Self {
        self.depth_attachment_format = Some(format);
        self
    }

    /// Builds the graphics pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] if a shader stage or the color
    /// attachment format is missing, or a Vulkan error if creation fails.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::PipelineError("Vertex shader is required".to_string()))?;

        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::PipelineError("Fragment shader is required".to_string()))?;

        if self.color_attachment_formats.is_empty() {
            return Err(RhiError::PipelineError(
                "At least one color attachment format is required".to_string(),
            ));
        }

        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology.to_vk())
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic.
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode.to_vk())
            .line_width(self.line_width)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(self.front_face.to_vk())
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let has_depth = self.depth_attachment_format.is_some();
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth && self.depth_test_enable)
            .depth_write_enable(has_depth && self.depth_write_enable)
            .depth_compare_op(vk::CompareOp::LESS)
            .max_depth_bounds(1.0);

        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = self
            .color_attachment_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(false)
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();

        let color_blend_state =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&self.color_attachment_formats);
        if let Some(depth_format) = self.depth_attachment_format {
            rendering_info = rendering_info.depth_attachment_format(depth_format);
        }

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .push_next(&mut rendering_info);

        Pipeline::create_graphics_internal(device, &pipeline_info, self.polygon_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_topology_to_vk() {
        assert_eq!(
            PrimitiveTopology::LineList.to_vk(),
            vk::PrimitiveTopology::LINE_LIST
        );
        assert_eq!(
            PrimitiveTopology::TriangleList.to_vk(),
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
        assert_eq!(
            PrimitiveTopology::TriangleStrip.to_vk(),
            vk::PrimitiveTopology::TRIANGLE_STRIP
        );
    }

    #[test]
    fn test_polygon_mode_to_vk() {
        assert_eq!(PolygonMode::Fill.to_vk(), vk::PolygonMode::FILL);
        assert_eq!(PolygonMode::Line.to_vk(), vk::PolygonMode::LINE);
    }

    #[test]
    fn test_cull_mode_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Front.to_vk(), vk::CullModeFlags::FRONT);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
    }

    #[test]
    fn test_front_face_to_vk() {
        assert_eq!(
            FrontFace::CounterClockwise.to_vk(),
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(FrontFace::Clockwise.to_vk(), vk::FrontFace::CLOCKWISE);
    }

    #[test]
    fn test_graphics_pipeline_builder_default() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(builder.vertex_shader.is_none());
        assert!(builder.fragment_shader.is_none());
        assert!(builder.vertex_bindings.is_empty());
        assert_eq!(builder.topology, PrimitiveTopology::TriangleList);
        assert_eq!(builder.polygon_mode, PolygonMode::Fill);
        assert_eq!(builder.cull_mode, CullMode::Back);
        assert!(builder.depth_test_enable);
        assert!(builder.depth_write_enable);
        assert!(builder.depth_attachment_format.is_none());
    }

    #[test]
    fn test_graphics_pipeline_builder_wireframe_state() {
        let builder = GraphicsPipelineBuilder::new()
            .polygon_mode(PolygonMode::Line)
            .cull_mode(CullMode::None)
            .depth_attachment_format(vk::Format::D32_SFLOAT)
            .color_attachment_format(vk::Format::B8G8R8A8_SRGB);
        assert_eq!(builder.polygon_mode, PolygonMode::Line);
        assert_eq!(builder.cull_mode, CullMode::None);
        assert_eq!(builder.depth_attachment_format, Some(vk::Format::D32_SFLOAT));
        assert_eq!(builder.color_attachment_formats.len(), 1);
    }

    #[test]
    fn test_default_trait_implementations() {
        assert_eq!(PrimitiveTopology::default(), PrimitiveTopology::TriangleList);
        assert_eq!(PolygonMode::default(), PolygonMode::Fill);
        assert_eq!(CullMode::default(), CullMode::Back);
        assert_eq!(FrontFace::default(), FrontFace::CounterClockwise);
    }
}
