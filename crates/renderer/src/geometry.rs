//! Shared vertex and index data for every shape in the scene.

use shapes_geometry::{MeshProvider, ShapeKind};
use shapes_rhi::pipeline::PrimitiveTopology;
use shapes_rhi::vertex::ColorVertex;
use tracing::info;

use crate::backend::DrawArgs;

/// Largest vertex count a sub-mesh may have with 16-bit indices.
pub const MAX_SUBMESH_VERTICES: usize = u16::MAX as usize + 1;

/// Location of one shape inside the concatenated buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmeshRange {
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
    pub vertex_count: u32,
}

/// One vertex array and one 16-bit index array holding every requested
/// shape back to back.
///
/// Built once at start-up and never mutated, so render items and all frame
/// slots can share it without synchronization.
#[derive(Debug)]
pub struct GeometryStore {
    vertices: Vec<ColorVertex>,
    indices: Vec<u16>,
    ranges: [Option<SubmeshRange>; ShapeKind::COUNT],
}

impl GeometryStore {
    /// Concatenates the meshes of `shapes`, in order, painting each with its
    /// shape color.
    ///
    /// # Panics
    ///
    /// Panics if a mesh has more than [`MAX_SUBMESH_VERTICES`] vertices or
    /// an index outside its vertex list.
    pub fn build<P: MeshProvider + ?Sized>(provider: &P, shapes: &[ShapeKind]) -> Self {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let mut ranges = [None; ShapeKind::COUNT];

        for &shape in shapes {
            if ranges[shape.index()].is_some() {
                continue;
            }

            let mesh = provider.mesh(shape);
            assert!(
                mesh.vertex_count() <= MAX_SUBMESH_VERTICES,
                "{shape} has {} vertices, more than 16-bit indices can address",
                mesh.vertex_count()
            );
            assert!(mesh.is_well_formed(), "{shape} has out-of-range indices");

            let color = shape.color();
            ranges[shape.index()] = Some(SubmeshRange {
                index_count: mesh.index_count() as u32,
                start_index: indices.len() as u32,
                base_vertex: vertices.len() as i32,
                vertex_count: mesh.vertex_count() as u32,
            });

            vertices.extend(
                mesh.vertices
                    .iter()
                    .map(|v| ColorVertex::new(v.position, color)),
            );
            indices.extend(mesh.indices.iter().map(|&i| i as u16));
        }

        info!(
            "Geometry store built: {} shapes, {} vertices, {} indices",
            ranges.iter().flatten().count(),
            vertices.len(),
            indices.len()
        );

        Self {
            vertices,
            indices,
            ranges,
        }
    }

    /// Sub-range of `shape`, if it was built.
    pub fn try_range(&self, shape: ShapeKind) -> Option<SubmeshRange> {
        self.ranges[shape.index()]
    }

    /// Draw parameters for `shape`.
    ///
    /// # Panics
    ///
    /// Panics if `shape` was not part of the build.
    pub fn draw_args(&self, shape: ShapeKind) -> DrawArgs {
        let range = self
            .try_range(shape)
            .unwrap_or_else(|| panic!("shape {shape} is not in the geometry store"));
        DrawArgs {
            index_count: range.index_count,
            start_index: range.start_index,
            base_vertex: range.base_vertex,
            topology: PrimitiveTopology::TriangleList,
        }
    }

    pub fn vertices(&self) -> &[ColorVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use shapes_geometry::{MeshData, MeshVertex, ProceduralShapes};

    /// A provider returning one triangle per shape.
    struct Triangles;

    impl MeshProvider for Triangles {
        fn mesh(&self, _shape: ShapeKind) -> MeshData {
            MeshData {
                vertices: vec![
                    MeshVertex::new(Vec3::ZERO, Vec3::Z),
                    MeshVertex::new(Vec3::X, Vec3::Z),
                    MeshVertex::new(Vec3::Y, Vec3::Z),
                ],
                indices: vec![0, 1, 2],
            }
        }
    }

    struct Huge;

    impl MeshProvider for Huge {
        fn mesh(&self, _shape: ShapeKind) -> MeshData {
            MeshData {
                vertices: vec![MeshVertex::default(); MAX_SUBMESH_VERTICES + 1],
                indices: vec![0, 1, 2],
            }
        }
    }

    #[test]
    fn test_ranges_are_consecutive() {
        let store = GeometryStore::build(
            &Triangles,
            &[ShapeKind::Box, ShapeKind::Sphere, ShapeKind::Diamond],
        );

        let sphere = store.draw_args(ShapeKind::Sphere);
        assert_eq!(sphere.index_count, 3);
        assert_eq!(sphere.start_index, 3);
        assert_eq!(sphere.base_vertex, 3);

        let diamond = store.draw_args(ShapeKind::Diamond);
        assert_eq!(diamond.start_index, 6);
        assert_eq!(diamond.base_vertex, 6);

        assert_eq!(store.vertices().len(), 9);
        assert_eq!(store.indices(), &[0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_duplicate_shapes_are_built_once() {
        let store = GeometryStore::build(&Triangles, &[ShapeKind::Cone, ShapeKind::Cone]);
        assert_eq!(store.vertices().len(), 3);
    }

    #[test]
    fn test_vertices_carry_shape_color() {
        let store = GeometryStore::build(&Triangles, &[ShapeKind::Grid, ShapeKind::Wedge]);
        assert_eq!(store.vertices()[0].color, ShapeKind::Grid.color());
        assert_eq!(store.vertices()[3].color, ShapeKind::Wedge.color());
    }

    #[test]
    fn test_missing_shape_is_none() {
        let store = GeometryStore::build(&Triangles, &[ShapeKind::Box]);
        assert!(store.try_range(ShapeKind::Prism).is_none());
    }

    #[test]
    #[should_panic(expected = "not in the geometry store")]
    fn test_missing_shape_draw_args_panics() {
        let store = GeometryStore::build(&Triangles, &[ShapeKind::Box]);
        store.draw_args(ShapeKind::Prism);
    }

    #[test]
    #[should_panic(expected = "16-bit indices")]
    fn test_oversized_mesh_panics() {
        GeometryStore::build(&Huge, &[ShapeKind::Grid]);
    }

    #[test]
    fn test_full_scene_fits_sixteen_bit_indices() {
        let store = GeometryStore::build(&ProceduralShapes, &ShapeKind::ALL);
        for shape in ShapeKind::ALL {
            let range = store.try_range(shape).unwrap();
            let start = range.start_index as usize;
            let end = start + range.index_count as usize;
            assert!(
                store.indices()[start..end]
                    .iter()
                    .all(|&i| u32::from(i) < range.vertex_count)
            );
        }
        assert_eq!(store.vertex_bytes().len(), store.vertices().len() * 28);
    }
}
