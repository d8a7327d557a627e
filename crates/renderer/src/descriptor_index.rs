//! Linear descriptor table layout.
//!
//! The table holds one entry per (slot, item) pair followed by one pass
//! entry per slot:
//!
//! ```text
//! [ slot 0 items | slot 1 items | ... | slot N-1 items | pass 0 .. pass N-1 ]
//! ```

/// Which constant record a table entry describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorRequest {
    /// Per-object constants of the item with this constant index.
    Item(usize),
    /// The slot's pass constants.
    Pass,
}

/// Offsets into the descriptor table for a fixed item count and ring depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorLayout {
    item_count: usize,
    depth: usize,
}

impl DescriptorLayout {
    pub fn new(item_count: usize, depth: usize) -> Self {
        assert!(depth > 0, "ring depth must be at least 1");
        Self { item_count, depth }
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of entries in the table: `(item_count + 1) * depth`.
    pub fn table_size(&self) -> usize {
        (self.item_count + 1) * self.depth
    }

    /// Entry for item `item` in slot `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` or `item` is out of range.
    pub fn object_offset(&self, slot: usize, item: usize) -> usize {
        assert!(slot < self.depth, "slot {slot} out of range for depth {}", self.depth);
        assert!(
            item < self.item_count,
            "item {item} out of range for {} items",
            self.item_count
        );
        slot * self.item_count + item
    }

    /// Pass entry of slot `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    pub fn pass_offset(&self, slot: usize) -> usize {
        assert!(slot < self.depth, "slot {slot} out of range for depth {}", self.depth);
        self.item_count * self.depth + slot
    }

    pub fn offset(&self, slot: usize, request: DescriptorRequest) -> usize {
        match request {
            DescriptorRequest::Item(item) => self.object_offset(slot, item),
            DescriptorRequest::Pass => self.pass_offset(slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_eighteen_items_three_slots() {
        let layout = DescriptorLayout::new(18, 3);
        assert_eq!(layout.table_size(), 57);
        let passes: Vec<_> = (0..3).map(|s| layout.pass_offset(s)).collect();
        assert_eq!(passes, vec![54, 55, 56]);
    }

    #[test]
    fn test_offsets_are_a_bijection() {
        for depth in 1..=4 {
            for items in 0..=7 {
                let layout = DescriptorLayout::new(items, depth);
                let mut seen = HashSet::new();
                for slot in 0..depth {
                    for item in 0..items {
                        assert!(seen.insert(layout.offset(slot, DescriptorRequest::Item(item))));
                    }
                    assert!(seen.insert(layout.offset(slot, DescriptorRequest::Pass)));
                }
                assert_eq!(seen.len(), layout.table_size());
                assert!(seen.iter().all(|&o| o < layout.table_size()));
            }
        }
    }

    #[test]
    fn test_object_offset_layout() {
        let layout = DescriptorLayout::new(22, 3);
        assert_eq!(layout.object_offset(0, 0), 0);
        assert_eq!(layout.object_offset(1, 0), 22);
        assert_eq!(layout.object_offset(2, 21), 65);
    }

    #[test]
    #[should_panic(expected = "item 5 out of range")]
    fn test_item_out_of_range_panics() {
        DescriptorLayout::new(5, 3).object_offset(0, 5);
    }

    #[test]
    #[should_panic(expected = "slot 3 out of range")]
    fn test_slot_out_of_range_panics() {
        DescriptorLayout::new(5, 3).pass_offset(3);
    }
}
