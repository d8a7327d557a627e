//! Vertex formats and input descriptions.
//!
//! The shape pipelines consume a single interleaved vertex stream of
//! [`ColorVertex`] at binding 0.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex with a position and a flat RGBA color.
///
/// # Memory Layout
///
/// - Offset 0: position (12 bytes)
/// - Offset 12: color (16 bytes)
/// - Total size: 28 bytes
///
/// The color is a plain array so the struct stays tightly packed.
///
/// # Shader Locations
///
/// - location 0: position (vec3)
/// - location 1: color (vec4)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    /// Object-space position.
    pub position: Vec3,
    /// Linear RGBA color.
    pub color: [f32; 4],
}

impl ColorVertex {
    /// Creates a new vertex.
    #[inline]
    pub const fn new(position: Vec3, color: [f32; 4]) -> Self {
        Self { position, color }
    }

    /// Returns the size of the vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Binding 0, per-vertex input rate.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get the vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(ColorVertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: std::mem::offset_of!(ColorVertex, color) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_vertex_size() {
        // Vec3 (12) + [f32; 4] (16)
        assert_eq!(std::mem::size_of::<ColorVertex>(), 28);
        assert_eq!(ColorVertex::size(), 28);
    }

    #[test]
    fn test_color_vertex_binding_description() {
        let binding = ColorVertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 28);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_color_vertex_attribute_descriptions() {
        let attrs = ColorVertex::attribute_descriptions();

        assert_eq!(attrs[0].location, 0);
        assert_eq!(attrs[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attrs[0].offset, 0);

        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].format, vk::Format::R32G32B32A32_SFLOAT);
        assert_eq!(attrs[1].offset, 12);
    }

    #[test]
    fn test_color_vertex_bytes() {
        let vertex = ColorVertex::new(Vec3::new(1.0, 2.0, 3.0), [0.1, 0.2, 0.3, 1.0]);
        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 28);

        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 1.0]);
    }
}
