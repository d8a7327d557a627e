//! Fixed-capacity arrays of constant records in host-visible memory.

use std::marker::PhantomData;

use bytemuck::Pod;
use shapes_rhi::RhiResult;
use tracing::trace;

use crate::backend::{ConstantStorage, RenderBackend};

/// Smallest record stride accepted by any backend.
pub const MIN_CONSTANT_ALIGNMENT: u64 = 256;

/// Rounds `size` up to the next multiple of `alignment` (a power of two).
pub(crate) const fn align_up(size: u64, alignment: u64) -> u64 {
    (size + alignment - 1) & !(alignment - 1)
}

/// An array of `capacity` records of type `T`, each at a stride the GPU can
/// bind individually.
///
/// Capacity is fixed at creation; writing past it is a bug and panics.
pub struct ConstantBufferPool<T: Pod, S: ConstantStorage> {
    storage: S,
    capacity: usize,
    stride: u64,
    _record: PhantomData<T>,
}

impl<T: Pod, S: ConstantStorage> ConstantBufferPool<T, S> {
    /// Record stride for a device with the given offset alignment.
    pub fn record_stride(device_alignment: u64) -> u64 {
        let alignment = device_alignment.max(MIN_CONSTANT_ALIGNMENT);
        assert!(
            alignment.is_power_of_two(),
            "constant alignment {alignment} is not a power of two"
        );
        align_up(std::mem::size_of::<T>() as u64, alignment)
    }

    /// Wraps `storage`, which must hold at least `capacity * stride` bytes.
    pub fn new(storage: S, capacity: usize, stride: u64) -> Self {
        assert!(
            stride >= std::mem::size_of::<T>() as u64,
            "stride {stride} is smaller than the record"
        );
        assert!(
            storage.size() >= capacity as u64 * stride,
            "storage of {} bytes cannot hold {capacity} records of stride {stride}",
            storage.size()
        );
        Self {
            storage,
            capacity,
            stride,
            _record: PhantomData,
        }
    }

    /// Allocates backing storage from `backend` and wraps it.
    ///
    /// A pool always holds at least one record so its buffer is never empty.
    pub fn create<B>(backend: &mut B, capacity: usize) -> RhiResult<Self>
    where
        B: RenderBackend<ConstantBuffer = S>,
    {
        let stride = Self::record_stride(backend.constant_alignment());
        let storage = backend.create_constant_buffer(stride * capacity.max(1) as u64)?;
        Ok(Self::new(storage, capacity, stride))
    }

    /// Copies `record` into slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity`.
    pub fn write(&mut self, index: usize, record: &T) -> RhiResult<()> {
        assert!(
            index < self.capacity,
            "constant index {index} out of range for pool of {}",
            self.capacity
        );
        trace!("constant write: index {index}");
        self.storage
            .write_bytes(self.record_offset(index), bytemuck::bytes_of(record))
    }

    /// GPU address of record 0.
    pub fn base_address(&self) -> u64 {
        self.storage.gpu_address()
    }

    /// Byte offset of record `index` from the start of the buffer.
    pub fn record_offset(&self, index: usize) -> u64 {
        index as u64 * self.stride
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Byte size of one record, without stride padding.
    pub fn record_size(&self) -> u64 {
        std::mem::size_of::<T>() as u64
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ObjectConstants, PassConstants};
    use crate::headless::HostBuffer;
    use bytemuck::Zeroable;
    use glam::Mat4;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(64, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(432, 256), 512);
    }

    #[test]
    fn test_record_stride_respects_minimum() {
        assert_eq!(
            ConstantBufferPool::<ObjectConstants, HostBuffer>::record_stride(16),
            256
        );
        assert_eq!(
            ConstantBufferPool::<PassConstants, HostBuffer>::record_stride(64),
            512
        );
        assert_eq!(
            ConstantBufferPool::<ObjectConstants, HostBuffer>::record_stride(1024),
            1024
        );
    }

    #[test]
    fn test_write_lands_at_stride_offset() {
        let mut pool: ConstantBufferPool<ObjectConstants, HostBuffer> =
            ConstantBufferPool::new(HostBuffer::new(0x1000, 4 * 256), 4, 256);
        let record = ObjectConstants::new(Mat4::from_scale(glam::Vec3::splat(2.0)));
        pool.write(2, &record).unwrap();

        assert_eq!(pool.record_offset(2), 512);
        assert_eq!(pool.storage().read::<ObjectConstants>(512), record);
        assert_eq!(
            pool.storage().read::<ObjectConstants>(256),
            ObjectConstants::zeroed()
        );
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_write_past_capacity_panics() {
        let mut pool: ConstantBufferPool<ObjectConstants, HostBuffer> =
            ConstantBufferPool::new(HostBuffer::new(0, 2 * 256), 2, 256);
        let _ = pool.write(2, &ObjectConstants::default());
    }

    #[test]
    #[should_panic(expected = "cannot hold")]
    fn test_undersized_storage_panics() {
        let _pool: ConstantBufferPool<ObjectConstants, HostBuffer> =
            ConstantBufferPool::new(HostBuffer::new(0, 256), 2, 256);
    }
}
