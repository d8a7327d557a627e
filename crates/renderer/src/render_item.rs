//! Drawable instances and per-slot dirty propagation.

#[cfg(test)]
use bytemuck::Pod;
use glam::Mat4;
use shapes_geometry::ShapeKind;
use shapes_rhi::RhiResult;
use tracing::trace;

use crate::backend::{ConstantStorage, DrawArgs};
use crate::constant_pool::ConstantBufferPool;
use crate::constants::ObjectConstants;
use crate::geometry::GeometryStore;

/// Stable handle of a render item; also its constant index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderItemId(usize);

impl RenderItemId {
    /// Index of the item's record in every slot's object pool.
    pub fn constant_index(self) -> usize {
        self.0
    }
}

/// One drawable: a geometry sub-range, a world transform and the number of
/// slot copies that still hold an older transform.
#[derive(Clone, Debug)]
pub struct RenderItem {
    id: RenderItemId,
    shape: ShapeKind,
    transform: Mat4,
    staleness: usize,
    draw_args: DrawArgs,
}

impl RenderItem {
    pub fn id(&self) -> RenderItemId {
        self.id
    }

    pub fn constant_index(&self) -> usize {
        self.id.constant_index()
    }

    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Slot copies still to be refreshed, in `0..=depth`.
    pub fn staleness(&self) -> usize {
        self.staleness
    }

    pub fn draw_args(&self) -> &DrawArgs {
        &self.draw_args
    }
}

/// Owns every render item, in insertion order.
///
/// Each frame slot keeps its own copy of every item's constants. When a
/// transform changes the item is marked stale for `depth` frames; each
/// [`flush_dirty`](Self::flush_dirty) writes it into the current slot and
/// counts down once. Under strict round-robin acquisition that visits each
/// slot exactly once before the counter reaches zero.
#[derive(Debug)]
pub struct RenderItemRegistry {
    items: Vec<RenderItem>,
    depth: usize,
}

impl RenderItemRegistry {
    /// Creates an empty registry for a ring of `depth` slots.
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "ring depth must be at least 1");
        Self {
            items: Vec::new(),
            depth,
        }
    }

    /// Adds an item drawing `shape` at `transform`.
    ///
    /// Draw parameters are resolved once here. The new item starts stale in
    /// every slot.
    ///
    /// # Panics
    ///
    /// Panics if `shape` is not in `geometry`.
    pub fn add(&mut self, geometry: &GeometryStore, shape: ShapeKind, transform: Mat4) -> RenderItemId {
        let id = RenderItemId(self.items.len());
        self.items.push(RenderItem {
            id,
            shape,
            transform,
            staleness: self.depth,
            draw_args: geometry.draw_args(shape),
        });
        id
    }

    /// Replaces the transform of `id` and marks it dirty.
    pub fn set_transform(&mut self, id: RenderItemId, transform: Mat4) {
        let depth = self.depth;
        let item = self.item_mut(id);
        item.transform = transform;
        item.staleness = depth;
    }

    /// Schedules `id` for re-upload into every slot.
    pub fn mark_dirty(&mut self, id: RenderItemId) {
        let depth = self.depth;
        self.item_mut(id).staleness = depth;
    }

    /// Writes every stale item into `pool` and decrements its staleness.
    ///
    /// Returns the number of records written.
    pub fn flush_dirty<S: ConstantStorage>(
        &mut self,
        pool: &mut ConstantBufferPool<ObjectConstants, S>,
    ) -> RhiResult<usize> {
        let mut written = 0;
        for item in self.items.iter_mut().filter(|item| item.staleness > 0) {
            pool.write(item.constant_index(), &ObjectConstants::new(item.transform))?;
            item.staleness -= 1;
            written += 1;
        }
        if written > 0 {
            trace!("Flushed {written} object constants");
        }
        Ok(written)
    }

    pub fn get(&self, id: RenderItemId) -> Option<&RenderItem> {
        self.items.get(id.0)
    }

    /// Items in insertion order, which is also draw order.
    pub fn iter(&self) -> impl Iterator<Item = &RenderItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of items with at least one outdated slot copy.
    pub fn dirty_count(&self) -> usize {
        self.items.iter().filter(|item| item.staleness > 0).count()
    }

    fn item_mut(&mut self, id: RenderItemId) -> &mut RenderItem {
        let len = self.items.len();
        self.items
            .get_mut(id.0)
            .unwrap_or_else(|| panic!("render item {} out of range for {len} items", id.0))
    }
}

/// Reads back the record for `index` from a pool whose storage can be read
/// on the host.
#[cfg(test)]
pub(crate) fn read_record<T: Pod>(
    pool: &ConstantBufferPool<T, crate::headless::HostBuffer>,
    index: usize,
) -> T {
    pool.storage().read::<T>(pool.record_offset(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HostBuffer;
    use glam::Vec3;
    use shapes_geometry::ProceduralShapes;

    fn geometry() -> GeometryStore {
        GeometryStore::build(&ProceduralShapes, &[ShapeKind::Box, ShapeKind::Sphere])
    }

    fn pools(depth: usize, capacity: usize) -> Vec<ConstantBufferPool<ObjectConstants, HostBuffer>> {
        (0..depth)
            .map(|slot| {
                ConstantBufferPool::new(
                    HostBuffer::new(0x1000 * (slot as u64 + 1), capacity as u64 * 256),
                    capacity,
                    256,
                )
            })
            .collect()
    }

    #[test]
    fn test_new_items_start_stale() {
        let geometry = geometry();
        let mut registry = RenderItemRegistry::new(3);
        let id = registry.add(&geometry, ShapeKind::Box, Mat4::IDENTITY);

        assert_eq!(id.constant_index(), 0);
        assert_eq!(registry.get(id).unwrap().staleness(), 3);
        assert_eq!(registry.get(id).unwrap().draw_args(), &geometry.draw_args(ShapeKind::Box));
    }

    #[test]
    fn test_constant_indices_follow_insertion_order() {
        let geometry = geometry();
        let mut registry = RenderItemRegistry::new(2);
        let ids: Vec<_> = (0..4)
            .map(|_| registry.add(&geometry, ShapeKind::Sphere, Mat4::IDENTITY))
            .collect();

        let indices: Vec<_> = registry.iter().map(RenderItem::constant_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(ids[3].constant_index(), 3);
    }

    #[test]
    fn test_dirty_item_reaches_every_slot_once() {
        let geometry = geometry();
        let mut registry = RenderItemRegistry::new(3);
        let ids: Vec<_> = (0..6)
            .map(|_| registry.add(&geometry, ShapeKind::Box, Mat4::IDENTITY))
            .collect();
        let mut pools = pools(3, 6);
        for pool in &mut pools {
            registry.flush_dirty(pool).unwrap();
        }
        assert_eq!(registry.dirty_count(), 0);

        let moved = Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0));
        registry.set_transform(ids[5], moved);
        assert_eq!(registry.get(ids[5]).unwrap().staleness(), 3);

        for (slot, pool) in pools.iter_mut().enumerate() {
            assert_eq!(registry.flush_dirty(pool).unwrap(), 1);
            assert_eq!(read_record(pool, 5).world, moved);
            assert_eq!(registry.get(ids[5]).unwrap().staleness(), 2 - slot);
        }

        for pool in &mut pools {
            assert_eq!(registry.flush_dirty(pool).unwrap(), 0);
        }
        assert_eq!(registry.get(ids[5]).unwrap().staleness(), 0);
    }

    #[test]
    fn test_second_change_resets_staleness() {
        let geometry = geometry();
        let mut registry = RenderItemRegistry::new(3);
        let id = registry.add(&geometry, ShapeKind::Box, Mat4::IDENTITY);
        let mut pools = pools(3, 1);

        registry.flush_dirty(&mut pools[0]).unwrap();
        registry.flush_dirty(&mut pools[1]).unwrap();
        assert_eq!(registry.get(id).unwrap().staleness(), 1);

        registry.mark_dirty(id);
        assert_eq!(registry.get(id).unwrap().staleness(), 3);
    }

    #[test]
    fn test_clean_items_are_not_rewritten() {
        let geometry = geometry();
        let mut registry = RenderItemRegistry::new(1);
        registry.add(&geometry, ShapeKind::Box, Mat4::IDENTITY);
        let mut pools = pools(1, 1);

        assert_eq!(registry.flush_dirty(&mut pools[0]).unwrap(), 1);
        assert_eq!(registry.flush_dirty(&mut pools[0]).unwrap(), 0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_unknown_item_panics() {
        let geometry = geometry();
        let mut registry = RenderItemRegistry::new(3);
        registry.add(&geometry, ShapeKind::Box, Mat4::IDENTITY);

        let mut other = RenderItemRegistry::new(3);
        other.add(&geometry, ShapeKind::Box, Mat4::IDENTITY);
        let foreign = other.add(&geometry, ShapeKind::Box, Mat4::IDENTITY);
        registry.mark_dirty(foreign);
    }
}
