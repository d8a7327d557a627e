//! GPU buffer management.
//!
//! Vertex, index and uniform buffers backed by gpu-allocator. All three live
//! in host-visible (`CpuToGpu`) memory that stays persistently mapped, so
//! constant uploads are plain memcpys into the mapping.
//!
//! # Overview
//!
//! - [`BufferUsage`] defines how a buffer will be used
//! - [`Buffer`] wraps VkBuffer with gpu-allocator managed memory
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shapes_rhi::device::Device;
//! use shapes_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), shapes_rhi::RhiError> {
//! let indices: [u16; 3] = [0, 1, 2];
//! let index_buffer = Buffer::new_with_data(
//!     device,
//!     BufferUsage::Index,
//!     bytemuck::cast_slice(&indices),
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Buffer usage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer - stores vertex data
    Vertex,
    /// Index buffer - stores index data
    Index,
    /// Uniform buffer - per-frame constant records, addressable by the GPU
    Uniform,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => {
                vk::BufferUsageFlags::UNIFORM_BUFFER
                    | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
            }
        }
    }

    /// Returns the memory location for this buffer type.
    ///
    /// Geometry is written once and constants every frame; both are small
    /// enough to read straight from host-visible memory.
    pub fn memory_location(self) -> MemoryLocation {
        MemoryLocation::CpuToGpu
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
        }
    }
}

/// GPU buffer wrapper with managed memory.
///
/// # Thread Safety
///
/// Host writes take `&mut self`; the GPU side is synchronized by the frame
/// timeline, not by this type.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
    /// Zero unless the usage requests a device address.
    device_address: vk::DeviceAddress,
}

impl Buffer {
    /// Creates a new buffer with the specified size.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or buffer/memory allocation fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::BufferError(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().and_then(|mut allocator| {
            Ok(allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        let device_address = if usage
            .to_vk_usage()
            .contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)
        {
            let info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
            unsafe { device.handle().get_buffer_device_address(&info) }
        } else {
            0
        };

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            device_address,
        })
    }

    /// Creates a new buffer and initializes it with data.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation or data upload fails.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let mut buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Copies `data` into the mapped buffer at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The buffer memory is not mapped
    /// - The write would exceed the buffer size
    pub fn write_data(&mut self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::BufferError(format!(
                "Write exceeds buffer size: offset {} + data {} > buffer {}",
                offset,
                data.len(),
                self.size
            )));
        }

        let mapped = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| RhiError::BufferError("Buffer memory is not mapped".to_string()))?;

        mapped[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Returns the GPU virtual address of the buffer, or 0 for vertex/index buffers.
    #[inline]
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.device_address
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        tracing::error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => tracing::error!("Failed to lock allocator: {:?}", e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert_eq!(
            BufferUsage::Vertex.to_vk_usage(),
            vk::BufferUsageFlags::VERTEX_BUFFER
        );
        assert_eq!(
            BufferUsage::Index.to_vk_usage(),
            vk::BufferUsageFlags::INDEX_BUFFER
        );
        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)
        );
    }

    #[test]
    fn test_all_buffers_are_host_visible() {
        for usage in [BufferUsage::Vertex, BufferUsage::Index, BufferUsage::Uniform] {
            assert_eq!(usage.memory_location(), MemoryLocation::CpuToGpu);
        }
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
    }
}
