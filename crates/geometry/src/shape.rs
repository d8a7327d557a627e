//! Shape identifiers.

use std::fmt;

/// The primitive shapes the scene is built from.
///
/// Shapes are addressed by this enum everywhere (geometry store lookups,
/// scene layout), so no string keys are hashed at draw time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    Box,
    Grid,
    Sphere,
    Cylinder,
    Pyramid,
    Wedge,
    Cone,
    HalfCone,
    Prism,
    Diamond,
}

impl ShapeKind {
    /// Number of shape kinds.
    pub const COUNT: usize = 10;

    /// Every shape, in geometry-store concatenation order.
    pub const ALL: [ShapeKind; Self::COUNT] = [
        ShapeKind::Box,
        ShapeKind::Grid,
        ShapeKind::Sphere,
        ShapeKind::Cylinder,
        ShapeKind::Pyramid,
        ShapeKind::Wedge,
        ShapeKind::Cone,
        ShapeKind::HalfCone,
        ShapeKind::Prism,
        ShapeKind::Diamond,
    ];

    /// Dense index in `0..COUNT`, usable for table lookups.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lower-case name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            ShapeKind::Box => "box",
            ShapeKind::Grid => "grid",
            ShapeKind::Sphere => "sphere",
            ShapeKind::Cylinder => "cylinder",
            ShapeKind::Pyramid => "pyramid",
            ShapeKind::Wedge => "wedge",
            ShapeKind::Cone => "cone",
            ShapeKind::HalfCone => "half cone",
            ShapeKind::Prism => "prism",
            ShapeKind::Diamond => "diamond",
        }
    }

    /// Flat RGBA color every vertex of this shape is painted with.
    pub const fn color(self) -> [f32; 4] {
        match self {
            // purple
            ShapeKind::Box => [0.502, 0.0, 0.502, 1.0],
            // gray
            ShapeKind::Grid => [0.502, 0.502, 0.502, 1.0],
            // light blue
            ShapeKind::Sphere => [0.678, 0.847, 0.902, 1.0],
            // steel blue
            ShapeKind::Cylinder => [0.275, 0.510, 0.706, 1.0],
            // yellow
            ShapeKind::Pyramid => [1.0, 1.0, 0.0, 1.0],
            // crimson
            ShapeKind::Wedge => [0.863, 0.078, 0.235, 1.0],
            // pink
            ShapeKind::Cone => [1.0, 0.753, 0.796, 1.0],
            // light green
            ShapeKind::HalfCone => [0.565, 0.933, 0.565, 1.0],
            // orange
            ShapeKind::Prism => [1.0, 0.647, 0.0, 1.0],
            // silver
            ShapeKind::Diamond => [0.753, 0.753, 0.753, 1.0],
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_position_in_all() {
        for (i, shape) in ShapeKind::ALL.iter().enumerate() {
            assert_eq!(shape.index(), i);
        }
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = ShapeKind::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ShapeKind::COUNT);
    }

    #[test]
    fn test_colors_are_opaque() {
        for shape in ShapeKind::ALL {
            assert_eq!(shape.color()[3], 1.0, "{shape} is not opaque");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ShapeKind::HalfCone.to_string(), "half cone");
    }
}
