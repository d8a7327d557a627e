//! The demo scene: a walled courtyard with towers and a few ornaments.

use glam::{Mat4, Vec3};
use shapes_geometry::ShapeKind;

use crate::transform::Placement;

/// One drawable instance in the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeInstance {
    pub shape: ShapeKind,
    pub placement: Placement,
    /// Spin about the local Y axis in radians per second, for animated
    /// instances.
    pub spin: Option<f32>,
}

impl ShapeInstance {
    fn fixed(shape: ShapeKind, placement: Placement) -> Self {
        Self {
            shape,
            placement,
            spin: None,
        }
    }

    fn spinning(shape: ShapeKind, placement: Placement, rate: f32) -> Self {
        Self {
            shape,
            placement,
            spin: Some(rate),
        }
    }

    /// World matrix at rest.
    pub fn world(&self) -> Mat4 {
        self.placement.matrix()
    }

    /// World matrix `time` seconds into the animation.
    pub fn world_at(&self, time: f32) -> Mat4 {
        match self.spin {
            Some(rate) => self.world() * Mat4::from_rotation_y(rate * time),
            None => self.world(),
        }
    }
}

fn at(x: f32, y: f32, z: f32) -> Placement {
    Placement::new().with_translation(Vec3::new(x, y, z))
}

fn scaled(sx: f32, sy: f32, sz: f32, x: f32, y: f32, z: f32) -> Placement {
    at(x, y, z).with_scale(Vec3::new(sx, sy, sz))
}

/// Returns the 22 instances of the demo scene in draw order.
///
/// ```
/// let layout = shapes_scene::demo_layout();
/// assert_eq!(layout.len(), 22);
/// ```
pub fn demo_layout() -> Vec<ShapeInstance> {
    use ShapeKind::*;

    const QUARTER: f32 = 1.57;

    vec![
        // Walls
        ShapeInstance::fixed(Box, at(8.5, 1.5, 3.0)),
        ShapeInstance::fixed(Box, at(-8.5, 1.5, 3.0)),
        ShapeInstance::fixed(Box, at(-11.5, 1.5, 0.0).with_yaw(QUARTER)),
        ShapeInstance::fixed(
            Box,
            scaled(1.0, 1.0, 0.4, 5.5, 1.5, 4.5).with_yaw(QUARTER),
        ),
        ShapeInstance::fixed(
            Box,
            scaled(1.0, 1.0, 0.4, 5.5, 1.5, -4.5).with_yaw(QUARTER),
        ),
        // Towers
        ShapeInstance::fixed(Cylinder, scaled(3.5, 2.0, 3.5, 9.0, 2.8, 11.5)),
        ShapeInstance::fixed(Cylinder, scaled(3.5, 2.0, 3.5, -9.0, 2.8, 11.5)),
        ShapeInstance::fixed(Cylinder, scaled(3.5, 1.5, 3.5, -9.0, 2.3, -5.7)),
        ShapeInstance::fixed(Cylinder, scaled(3.5, 1.5, 3.5, 9.0, 2.3, -5.7)),
        // Tower roofs
        ShapeInstance::fixed(Cone, scaled(2.0, 3.0, 2.0, 9.0, 5.6, 11.5)),
        ShapeInstance::fixed(Cone, scaled(2.0, 3.0, 2.0, -9.0, 5.6, 11.5)),
        ShapeInstance::fixed(Cone, scaled(2.0, 3.0, 2.0, -9.0, 4.6, -5.7)),
        ShapeInstance::fixed(Cone, scaled(2.0, 3.0, 2.0, 9.0, 4.6, -5.7)),
        // Ground
        ShapeInstance::fixed(Grid, Placement::new()),
        // Gate ornaments
        ShapeInstance::spinning(Sphere, scaled(1.5, 1.5, 1.5, 0.0, 6.7, -5.4), 1.0),
        ShapeInstance::spinning(Pyramid, at(-3.0, 3.0, -5.4), 0.8),
        ShapeInstance::spinning(Pyramid, at(3.0, 3.0, -5.4), -0.8),
        ShapeInstance::fixed(Wedge, at(-7.0, 0.0, -2.0).with_yaw(QUARTER)),
        ShapeInstance::fixed(Wedge, at(7.0, 0.0, -2.0).with_yaw(-QUARTER)),
        ShapeInstance::fixed(HalfCone, at(0.0, 0.0, 7.0)),
        ShapeInstance::fixed(Prism, scaled(3.0, 3.0, 1.0, 0.0, 3.0, -5.4)),
        ShapeInstance::spinning(Diamond, at(0.0, 1.0, 7.0), 1.5),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_shape_counts() {
        let layout = demo_layout();
        let count = |kind| layout.iter().filter(|i| i.shape == kind).count();

        assert_eq!(layout.len(), 22);
        assert_eq!(count(ShapeKind::Box), 5);
        assert_eq!(count(ShapeKind::Cylinder), 4);
        assert_eq!(count(ShapeKind::Cone), 4);
        assert_eq!(count(ShapeKind::Grid), 1);
        assert_eq!(count(ShapeKind::Pyramid), 2);
        assert_eq!(count(ShapeKind::Wedge), 2);
    }

    #[test]
    fn test_every_shape_is_used() {
        let layout = demo_layout();
        for shape in ShapeKind::ALL {
            assert!(layout.iter().any(|i| i.shape == shape), "{shape} unused");
        }
    }

    #[test]
    fn test_fixed_instances_do_not_move() {
        for instance in demo_layout().iter().filter(|i| i.spin.is_none()) {
            assert_eq!(instance.world_at(12.5), instance.world());
        }
    }

    #[test]
    fn test_spin_keeps_position() {
        let diamond = demo_layout()[21];
        assert_eq!(diamond.shape, ShapeKind::Diamond);

        let start = diamond.world_at(0.0).transform_point3(Vec3::ZERO);
        let later = diamond.world_at(2.0).transform_point3(Vec3::ZERO);
        assert!((start - later).length() < 1e-5);
        assert_ne!(diamond.world_at(0.0), diamond.world_at(2.0));
    }
}
