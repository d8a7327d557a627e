//! Mesh data produced by a [`MeshProvider`](crate::MeshProvider).

use glam::Vec3;

/// A single generated vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

impl MeshVertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

/// Indexed triangle-list mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns `true` if the index list is a whole number of triangles and
    /// every index refers to an existing vertex.
    pub fn is_well_formed(&self) -> bool {
        let count = self.vertices.len() as u32;
        self.indices.len().is_multiple_of(3) && self.indices.iter().all(|&i| i < count)
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (min.min(v.position), max.max(v.position))
        }))
    }

    /// Appends a flat convex polygon, fan-triangulated from its first corner.
    ///
    /// The winding is flipped if needed so the face normal points away from
    /// `interior`, which must lie strictly inside the solid the face bounds.
    pub(crate) fn push_face(&mut self, corners: &[Vec3], interior: Vec3) {
        debug_assert!(corners.len() >= 3, "a face needs at least three corners");

        let mut normal = (corners[1] - corners[0])
            .cross(corners[2] - corners[0])
            .normalize_or_zero();
        let outward = normal.dot(corners[0] - interior) >= 0.0;
        if !outward {
            normal = -normal;
        }

        let base = self.vertices.len() as u32;
        self.vertices
            .extend(corners.iter().map(|&p| MeshVertex::new(p, normal)));

        let last = corners.len() as u32 - 1;
        for i in 1..last {
            if outward {
                self.indices.extend_from_slice(&[base, base + i, base + i + 1]);
            } else {
                self.indices.extend_from_slice(&[base, base + i + 1, base + i]);
            }
        }
    }

    /// Appends a `(rows + 1) x (cols + 1)` vertex lattice as quads.
    ///
    /// `vertex` is called with the row and column of each lattice point.
    pub(crate) fn push_lattice(
        &mut self,
        rows: u32,
        cols: u32,
        mut vertex: impl FnMut(u32, u32) -> MeshVertex,
    ) {
        let base = self.vertices.len() as u32;
        for row in 0..=rows {
            for col in 0..=cols {
                self.vertices.push(vertex(row, col));
            }
        }

        let stride = cols + 1;
        for row in 0..rows {
            for col in 0..cols {
                let current = base + row * stride + col;
                let next = current + stride;
                self.indices
                    .extend_from_slice(&[current, next, current + 1, current + 1, next, next + 1]);
            }
        }
    }
}
