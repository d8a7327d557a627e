//! Mesh provider for the primitive shapes drawn by the renderer.
//!
//! The renderer never tessellates anything itself: it asks a
//! [`MeshProvider`] for one [`MeshData`] per [`ShapeKind`] and concatenates
//! the results into its geometry store.

mod mesh;
pub mod procedural;
mod shape;

pub use mesh::{MeshData, MeshVertex};
pub use procedural::ProceduralShapes;
pub use shape::ShapeKind;

/// Source of triangle-list meshes, one per shape kind.
pub trait MeshProvider {
    /// Returns the mesh for `shape`. Indices are triangle-list and local to
    /// the returned vertex list.
    fn mesh(&self, shape: ShapeKind) -> MeshData;
}
