//! Placement of a shape in the world.
//!
//! # Example
//!
//! ```
//! use shapes_scene::Placement;
//! use glam::Vec3;
//!
//! let placement = Placement::new()
//!     .with_scale(Vec3::new(1.0, 1.0, 0.4))
//!     .with_translation(Vec3::new(5.5, 1.5, 4.5));
//!
//! let world = placement.matrix();
//! assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(5.5, 1.5, 4.5));
//! ```

use glam::{Mat4, Vec3};

/// Scale, then translate, then yaw about the world Y axis.
///
/// The yaw is applied last, so it swings an already translated object
/// around the origin rather than turning it in place.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub scale: Vec3,
    pub translation: Vec3,
    /// Rotation about world +Y in radians.
    pub yaw: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            scale: Vec3::ONE,
            translation: Vec3::ZERO,
            yaw: 0.0,
        }
    }
}

impl Placement {
    /// Identity placement.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }

    /// Object-to-world matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.yaw)
            * Mat4::from_translation(self.translation)
            * Mat4::from_scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_default_is_identity() {
        assert_eq!(Placement::default().matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_scale_applies_before_translation() {
        let placement = Placement::new()
            .with_scale(Vec3::splat(2.0))
            .with_translation(Vec3::new(1.0, 0.0, 0.0));
        let p = placement.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(approx_eq_vec3(p, Vec3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn test_yaw_swings_translated_object() {
        let placement = Placement::new()
            .with_translation(Vec3::new(1.0, 0.0, 0.0))
            .with_yaw(FRAC_PI_2);
        let p = placement.matrix().transform_point3(Vec3::ZERO);
        // +X rotated a quarter turn about +Y lands on -Z.
        assert!(approx_eq_vec3(p, Vec3::new(0.0, 0.0, -1.0)));
    }
}
