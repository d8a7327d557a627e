//! Procedural generators for the ten scene shapes.
//!
//! Every generator centers its shape on the origin. Flat-sided solids get
//! one normal per face; the sphere and the cylinder mantle get smooth
//! normals.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use tracing::debug;

use crate::mesh::{MeshData, MeshVertex};
use crate::shape::ShapeKind;
use crate::MeshProvider;

/// Axis-aligned box of the given extents.
pub fn box_mesh(width: f32, height: f32, depth: f32) -> MeshData {
    let (x, y, z) = (width * 0.5, height * 0.5, depth * 0.5);
    let corner = |sx: f32, sy: f32, sz: f32| Vec3::new(sx * x, sy * y, sz * z);

    let mut mesh = MeshData::new();
    for axis in 0..3 {
        for sign in [-1.0, 1.0] {
            let face = match axis {
                0 => [
                    corner(sign, -1.0, -1.0),
                    corner(sign, 1.0, -1.0),
                    corner(sign, 1.0, 1.0),
                    corner(sign, -1.0, 1.0),
                ],
                1 => [
                    corner(-1.0, sign, -1.0),
                    corner(1.0, sign, -1.0),
                    corner(1.0, sign, 1.0),
                    corner(-1.0, sign, 1.0),
                ],
                _ => [
                    corner(-1.0, -1.0, sign),
                    corner(1.0, -1.0, sign),
                    corner(1.0, 1.0, sign),
                    corner(-1.0, 1.0, sign),
                ],
            };
            mesh.push_face(&face, Vec3::ZERO);
        }
    }
    mesh
}

/// Flat grid in the XZ plane with `rows x cols` vertices.
pub fn grid_mesh(width: f32, depth: f32, rows: u32, cols: u32) -> MeshData {
    assert!(rows >= 2 && cols >= 2, "a grid needs at least 2x2 vertices");

    let dx = width / (cols - 1) as f32;
    let dz = depth / (rows - 1) as f32;
    let (half_w, half_d) = (width * 0.5, depth * 0.5);

    let mut mesh = MeshData::new();
    mesh.push_lattice(rows - 1, cols - 1, |row, col| {
        MeshVertex::new(
            Vec3::new(-half_w + col as f32 * dx, 0.0, half_d - row as f32 * dz),
            Vec3::Y,
        )
    });
    mesh
}

/// UV sphere.
pub fn sphere_mesh(radius: f32, slices: u32, stacks: u32) -> MeshData {
    let mut mesh = MeshData::new();
    mesh.push_lattice(stacks, slices, |stack, slice| {
        let phi = PI * stack as f32 / stacks as f32;
        let theta = TAU * slice as f32 / slices as f32;
        let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
        MeshVertex::new(normal * radius, normal)
    });
    mesh
}

/// Capped cylinder, optionally tapered, standing on the Y axis.
pub fn cylinder_mesh(
    bottom_radius: f32,
    top_radius: f32,
    height: f32,
    slices: u32,
    stacks: u32,
) -> MeshData {
    let half_h = height * 0.5;
    // Slope of the mantle; tilts the smooth normals of a tapered cylinder.
    let dr = bottom_radius - top_radius;

    let mut mesh = MeshData::new();
    mesh.push_lattice(stacks, slices, |stack, slice| {
        let t = stack as f32 / stacks as f32;
        let y = -half_h + t * height;
        let r = bottom_radius - t * dr;
        let theta = TAU * slice as f32 / slices as f32;
        let (s, c) = theta.sin_cos();
        let normal = Vec3::new(c * height, dr, s * height).normalize_or_zero();
        MeshVertex::new(Vec3::new(r * c, y, r * s), normal)
    });

    for (radius, y) in [(bottom_radius, -half_h), (top_radius, half_h)] {
        let ring = ring_points(radius, y, slices, TAU);
        mesh.push_face(&ring, Vec3::ZERO);
    }
    mesh
}

/// Square pyramid with its apex on +Y.
pub fn pyramid_mesh(base: f32, height: f32) -> MeshData {
    let b = base * 0.5;
    let half_h = height * 0.5;
    let apex = Vec3::new(0.0, half_h, 0.0);
    let corners = [
        Vec3::new(-b, -half_h, -b),
        Vec3::new(b, -half_h, -b),
        Vec3::new(b, -half_h, b),
        Vec3::new(-b, -half_h, b),
    ];
    let interior = Vec3::new(0.0, -half_h * 0.5, 0.0);

    let mut mesh = MeshData::new();
    for i in 0..4 {
        mesh.push_face(&[corners[i], corners[(i + 1) % 4], apex], interior);
    }
    mesh.push_face(&corners, interior);
    mesh
}

/// Right-angled wedge: full height at +Z, sloping down to the -Z edge.
pub fn wedge_mesh(width: f32, height: f32, depth: f32) -> MeshData {
    let (x, y, z) = (width * 0.5, height * 0.5, depth * 0.5);
    let bottom = [
        Vec3::new(-x, -y, -z),
        Vec3::new(x, -y, -z),
        Vec3::new(x, -y, z),
        Vec3::new(-x, -y, z),
    ];
    let top = [Vec3::new(-x, y, z), Vec3::new(x, y, z)];
    let interior = Vec3::new(0.0, -y * 0.5, z * 0.5);

    let mut mesh = MeshData::new();
    mesh.push_face(&bottom, interior);
    mesh.push_face(&[bottom[3], bottom[2], top[1], top[0]], interior);
    mesh.push_face(&[bottom[0], bottom[1], top[1], top[0]], interior);
    mesh.push_face(&[bottom[0], bottom[3], top[0]], interior);
    mesh.push_face(&[bottom[1], bottom[2], top[1]], interior);
    mesh
}

/// Faceted cone with its apex on +Y.
pub fn cone_mesh(radius: f32, height: f32, slices: u32) -> MeshData {
    let half_h = height * 0.5;
    let apex = Vec3::new(0.0, half_h, 0.0);
    let ring = ring_points(radius, -half_h, slices, TAU);
    let interior = Vec3::new(0.0, -half_h * 0.5, 0.0);

    let mut mesh = MeshData::new();
    for i in 0..ring.len() {
        let next = ring[(i + 1) % ring.len()];
        mesh.push_face(&[ring[i], next, apex], interior);
    }
    mesh.push_face(&ring, interior);
    mesh
}

/// A cone split along its axis; the cut face lies in the XY plane and the
/// curved half faces +Z.
pub fn half_cone_mesh(radius: f32, height: f32, slices: u32) -> MeshData {
    let half_h = height * 0.5;
    let apex = Vec3::new(0.0, half_h, 0.0);
    // `slices` segments span the half turn, so the arc has one extra point.
    let arc: Vec<Vec3> = (0..=slices)
        .map(|i| {
            let theta = PI * i as f32 / slices as f32;
            Vec3::new(radius * theta.cos(), -half_h, radius * theta.sin())
        })
        .collect();
    let interior = Vec3::new(0.0, -half_h * 0.5, radius * 0.25);

    let mut mesh = MeshData::new();
    for pair in arc.windows(2) {
        mesh.push_face(&[pair[0], pair[1], apex], interior);
    }
    mesh.push_face(&arc, interior);
    if let (Some(&first), Some(&last)) = (arc.first(), arc.last()) {
        mesh.push_face(&[first, apex, last], interior);
    }
    mesh
}

/// Triangular prism: an isosceles triangle in XY extruded along Z.
pub fn prism_mesh(width: f32, height: f32, depth: f32) -> MeshData {
    let (x, y, z) = (width * 0.5, height * 0.5, depth * 0.5);
    let front = [Vec3::new(-x, -y, z), Vec3::new(x, -y, z), Vec3::new(0.0, y, z)];
    let back = front.map(|p| Vec3::new(p.x, p.y, -z));
    let interior = Vec3::new(0.0, -y * 0.33, 0.0);

    let mut mesh = MeshData::new();
    mesh.push_face(&front, interior);
    mesh.push_face(&back, interior);
    for i in 0..3 {
        let j = (i + 1) % 3;
        mesh.push_face(&[front[i], front[j], back[j], back[i]], interior);
    }
    mesh
}

/// Octahedral diamond with its tips on the three axes.
pub fn diamond_mesh(width: f32, height: f32, depth: f32) -> MeshData {
    let (x, y, z) = (width * 0.5, height * 0.5, depth * 0.5);
    let girdle = [
        Vec3::new(x, 0.0, 0.0),
        Vec3::new(0.0, 0.0, z),
        Vec3::new(-x, 0.0, 0.0),
        Vec3::new(0.0, 0.0, -z),
    ];

    let mut mesh = MeshData::new();
    for tip in [Vec3::new(0.0, y, 0.0), Vec3::new(0.0, -y, 0.0)] {
        for i in 0..4 {
            mesh.push_face(&[girdle[i], girdle[(i + 1) % 4], tip], Vec3::ZERO);
        }
    }
    mesh
}

fn ring_points(radius: f32, y: f32, slices: u32, sweep: f32) -> Vec<Vec3> {
    (0..slices)
        .map(|i| {
            let theta = sweep * i as f32 / slices as f32;
            Vec3::new(radius * theta.cos(), y, radius * theta.sin())
        })
        .collect()
}

/// The shape set drawn by the demo scene, at its fixed dimensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProceduralShapes;

impl MeshProvider for ProceduralShapes {
    fn mesh(&self, shape: ShapeKind) -> MeshData {
        let mesh = match shape {
            ShapeKind::Box => box_mesh(2.0, 3.0, 15.0),
            ShapeKind::Grid => grid_mesh(50.0, 50.0, 60, 40),
            ShapeKind::Sphere => sphere_mesh(0.5, 20, 20),
            ShapeKind::Cylinder => cylinder_mesh(0.5, 0.5, 3.0, 20, 20),
            ShapeKind::Pyramid => pyramid_mesh(1.0, 1.0),
            ShapeKind::Wedge => wedge_mesh(1.0, 1.0, 1.0),
            ShapeKind::Cone => cone_mesh(1.0, 1.0, 16),
            ShapeKind::HalfCone => half_cone_mesh(0.5, 1.0, 16),
            ShapeKind::Prism => prism_mesh(2.0, 1.0, 1.0),
            ShapeKind::Diamond => diamond_mesh(1.0, 1.0, 1.0),
        };
        debug!(
            "Generated {}: {} vertices, {} triangles",
            shape,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every triangle of a convex solid winds counter-clockwise seen from
    /// outside, i.e. its geometric normal points away from the centroid.
    fn assert_outward(mesh: &MeshData) {
        let centroid = mesh
            .vertices
            .iter()
            .fold(Vec3::ZERO, |acc, v| acc + v.position)
            / mesh.vertex_count() as f32;
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize].position);
            let n = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(n.dot(center - centroid) > 0.0, "inward triangle at {center}");
        }
    }

    #[test]
    fn test_all_shapes_well_formed() {
        for shape in ShapeKind::ALL {
            let mesh = ProceduralShapes.mesh(shape);
            assert!(mesh.is_well_formed(), "{shape} has bad indices");
            assert!(mesh.triangle_count() > 0, "{shape} is empty");
            assert!(mesh.vertex_count() <= 65_536, "{shape} exceeds u16 range");
        }
    }

    #[test]
    fn test_box_counts_and_extent() {
        let mesh = box_mesh(2.0, 3.0, 15.0);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Vec3::new(-1.0, -1.5, -7.5));
        assert_eq!(max, Vec3::new(1.0, 1.5, 7.5));
        assert_outward(&mesh);
    }

    #[test]
    fn test_grid_counts() {
        let mesh = grid_mesh(50.0, 50.0, 60, 40);
        assert_eq!(mesh.vertex_count(), 60 * 40);
        assert_eq!(mesh.index_count(), 59 * 39 * 6);
        let (min, max) = mesh.bounds().unwrap();
        assert!((min.x + 25.0).abs() < 1e-4 && (max.z - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_sphere_vertices_on_radius() {
        let mesh = sphere_mesh(0.5, 20, 20);
        assert_eq!(mesh.vertex_count(), 21 * 21);
        for v in &mesh.vertices {
            assert!((v.position.length() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cylinder_counts() {
        let mesh = cylinder_mesh(0.5, 0.5, 3.0, 20, 20);
        assert_eq!(mesh.vertex_count(), 21 * 21 + 2 * 20);
        let (min, max) = mesh.bounds().unwrap();
        assert!((min.y + 1.5).abs() < 1e-5 && (max.y - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_cone_counts() {
        let mesh = cone_mesh(1.0, 1.0, 16);
        assert_eq!(mesh.vertex_count(), 16 * 3 + 16);
        assert_eq!(mesh.index_count(), 16 * 3 + 14 * 3);
    }

    #[test]
    fn test_convex_solids_face_outward() {
        assert_outward(&pyramid_mesh(1.0, 1.0));
        assert_outward(&wedge_mesh(1.0, 1.0, 1.0));
        assert_outward(&cone_mesh(1.0, 1.0, 16));
        assert_outward(&prism_mesh(2.0, 1.0, 1.0));
        assert_outward(&diamond_mesh(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_diamond_has_eight_faces() {
        assert_eq!(diamond_mesh(1.0, 1.0, 1.0).triangle_count(), 8);
    }
}
