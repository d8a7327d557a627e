//! Scene-wide per-frame constants.

use glam::Vec2;
use shapes_core::FrameTime;
use shapes_scene::OrbitCamera;

use crate::constants::PassConstants;

/// Size of the render target in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height. A zero-height viewport reports 1.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Builds the pass record for one frame.
///
/// Pure: the same camera, viewport and time always give the same record.
/// The camera's polar angle and radius are clamped by its limits before
/// use; the stored camera is not modified.
pub fn compute_pass_constants(camera: &OrbitCamera, viewport: Viewport, time: FrameTime) -> PassConstants {
    let view = camera.view_matrix();
    let proj = camera.lens.projection_matrix(viewport.aspect_ratio());
    let view_proj = proj * view;

    let size = Vec2::new(viewport.width as f32, viewport.height as f32);
    let inv_size = Vec2::new(
        if size.x > 0.0 { 1.0 / size.x } else { 0.0 },
        if size.y > 0.0 { 1.0 / size.y } else { 0.0 },
    );

    PassConstants {
        view,
        inv_view: view.inverse(),
        proj,
        inv_proj: proj.inverse(),
        view_proj,
        inv_view_proj: view_proj.inverse(),
        eye_pos_w: camera.eye_position(),
        _padding: 0.0,
        render_target_size: size,
        inv_render_target_size: inv_size,
        near_z: camera.lens.near,
        far_z: camera.lens.far,
        total_time: time.total,
        delta_time: time.delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3, Vec4};
    use std::f32::consts::PI;

    fn time() -> FrameTime {
        FrameTime {
            total: 2.5,
            delta: 0.016,
        }
    }

    #[test]
    fn test_is_pure() {
        let camera = OrbitCamera::default();
        let viewport = Viewport::new(1280, 720);
        let a = compute_pass_constants(&camera, viewport, time());
        let b = compute_pass_constants(&camera, viewport, time());
        assert_eq!(a, b);
    }

    #[test]
    fn test_inverses_and_products() {
        let camera = OrbitCamera::new(0.3, 1.1, 20.0);
        let pass = compute_pass_constants(&camera, Viewport::new(800, 600), time());

        assert!((pass.view * pass.inv_view).abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert!((pass.proj * pass.inv_proj).abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert!(pass.view_proj.abs_diff_eq(pass.proj * pass.view, 1e-6));
        assert!((pass.view_proj * pass.inv_view_proj).abs_diff_eq(Mat4::IDENTITY, 1e-3));
    }

    #[test]
    fn test_viewport_and_timing() {
        let camera = OrbitCamera::default();
        let pass = compute_pass_constants(&camera, Viewport::new(800, 400), time());

        assert_eq!(pass.render_target_size, Vec2::new(800.0, 400.0));
        assert_eq!(pass.inv_render_target_size, Vec2::new(1.0 / 800.0, 1.0 / 400.0));
        assert_eq!(pass.near_z, 1.0);
        assert_eq!(pass.far_z, 1000.0);
        assert_eq!(pass.total_time, 2.5);
        assert_eq!(pass.delta_time, 0.016);
    }

    #[test]
    fn test_eye_uses_clamped_parameters() {
        let camera = OrbitCamera::new(0.0, 3.3, 200.0);
        let pass = compute_pass_constants(&camera, Viewport::new(100, 100), time());

        let phi = PI - 0.1;
        let expected = Vec3::new(150.0 * phi.sin(), 150.0 * phi.cos(), 0.0);
        assert!(pass.eye_pos_w.abs_diff_eq(expected, 1e-3));
        assert!((pass.eye_pos_w.length() - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_origin_projects_to_screen_center() {
        let camera = OrbitCamera::default();
        let pass = compute_pass_constants(&camera, Viewport::new(1280, 720), time());

        let clip = pass.view_proj * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn test_zero_sized_viewport_is_finite() {
        let pass = compute_pass_constants(&OrbitCamera::default(), Viewport::new(0, 0), time());
        assert_eq!(pass.inv_render_target_size, Vec2::ZERO);
        assert!(pass.proj.is_finite());
    }
}
