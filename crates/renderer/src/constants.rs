//! Constant buffer record layouts.
//!
//! These structures must match the uniform blocks in `shaders/color.vert`
//! exactly (std140). All structures use `#[repr(C)]` for predictable memory
//! layout and implement `Pod` and `Zeroable` for safe byte casting.
//!
//! Matrices are stored column-major, which is what GLSL expects, so they
//! are written without transposing.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

/// Per-object constants (descriptor set 0).
///
/// # Memory Layout
///
/// - Offset 0: world matrix (64 bytes)
/// - Total size: 64 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    /// Object-to-world matrix.
    pub world: Mat4,
}

impl ObjectConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(world: Mat4) -> Self {
        Self { world }
    }
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

/// Scene-wide constants (descriptor set 1), rewritten every frame.
///
/// # Memory Layout
///
/// - Offset 0: six matrices (384 bytes)
/// - Offset 384: eye position (12 bytes) + padding (4 bytes)
/// - Offset 400: render target size (8 bytes)
/// - Offset 408: inverse render target size (8 bytes)
/// - Offset 416: near, far, total time, delta time (16 bytes)
/// - Total size: 432 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view: Mat4,
    pub inv_view: Mat4,
    pub proj: Mat4,
    pub inv_proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    /// Camera world position.
    pub eye_pos_w: Vec3,
    /// Padding for 16-byte alignment.
    pub _padding: f32,
    pub render_target_size: Vec2,
    pub inv_render_target_size: Vec2,
    pub near_z: f32,
    pub far_z: f32,
    /// Seconds since start-up.
    pub total_time: f32,
    /// Seconds since the previous frame.
    pub delta_time: f32,
}

impl PassConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn test_object_constants_size() {
        assert_eq!(ObjectConstants::SIZE, 64);
    }

    #[test]
    fn test_pass_constants_size() {
        assert_eq!(PassConstants::SIZE, 432);
        assert_eq!(PassConstants::SIZE % 16, 0);
    }

    #[test]
    fn test_pass_constants_std140_offsets() {
        assert_eq!(offset_of!(PassConstants, inv_view_proj), 320);
        assert_eq!(offset_of!(PassConstants, eye_pos_w), 384);
        assert_eq!(offset_of!(PassConstants, render_target_size), 400);
        assert_eq!(offset_of!(PassConstants, inv_render_target_size), 408);
        assert_eq!(offset_of!(PassConstants, near_z), 416);
        assert_eq!(offset_of!(PassConstants, delta_time), 428);
    }

    #[test]
    fn test_world_is_not_transposed() {
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let constants = ObjectConstants::new(world);
        let bytes = bytemuck::bytes_of(&constants);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        // Column-major: translation lives in the last column.
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_object_constants_default_identity() {
        assert_eq!(ObjectConstants::default().world, Mat4::IDENTITY);
    }
}
