//! Descriptor set management for shader resource binding.
//!
//! - [`DescriptorSetLayout`] defines the layout of shader bindings
//! - [`DescriptorPool`] allocates descriptor sets
//! - [`write_uniform_buffer`] points a set's binding at a buffer range
//!
//! # Overview
//!
//! The frame pipeline keeps one flat table of single-binding uniform buffer
//! sets. Each set views one constant record inside a frame slot's buffer, and
//! the table is written once at startup because the records never move.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use shapes_rhi::device::Device;
//! use shapes_rhi::descriptor::{DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout};
//!
//! # fn example(device: Arc<Device>) -> Result<(), shapes_rhi::RhiError> {
//! let binding = DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
//! let layout = DescriptorSetLayout::new(device.clone(), &[binding])?;
//!
//! let pool = DescriptorPool::uniform_buffers(device.clone(), 57)?;
//! let sets = pool.allocate(&vec![layout.handle(); 57])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
///
/// # Thread Safety
///
/// The layout itself is immutable after creation. It can be shared between
/// threads when wrapped in `Arc`.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a new descriptor set layout.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Descriptor pool wrapper.
///
/// Sets are never freed individually; they live as long as the pool.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    /// Creates a new descriptor pool.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );

        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Creates a pool holding `count` sets of one uniform buffer each.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn uniform_buffers(device: Arc<Device>, count: u32) -> RhiResult<Self> {
        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(count)];
        Self::new(device, count, &pool_sizes)
    }

    /// Allocates one descriptor set per entry in `layouts`.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails (e.g., pool exhausted).
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };

        debug!("Allocated {} descriptor set(s)", sets.len());

        Ok(sets)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool ({} sets)", self.max_sets);
    }
}

/// Points binding `binding` of `set` at `range` bytes of `buffer` starting at `offset`.
///
/// The set must not be in use by pending GPU work.
pub fn write_uniform_buffer(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    range: vk::DeviceSize,
) {
    let buffer_infos = [buffer_info(buffer, offset, range)];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .buffer_info(&buffer_infos);

    unsafe { device.handle().update_descriptor_sets(&[write], &[]) };
}

/// Builds a `VkDescriptorBufferInfo`.
pub fn buffer_info(
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    range: vk::DeviceSize,
) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(offset)
        .range(range)
}

/// Helpers for building descriptor set layout bindings.
pub struct DescriptorBindingBuilder;

impl DescriptorBindingBuilder {
    /// A single uniform buffer visible to `stages`.
    pub fn uniform_buffer(
        binding: u32,
        stages: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_binding_builder_uniform_buffer() {
        let binding = DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_buffer_info_helper() {
        let info = buffer_info(vk::Buffer::null(), 512, 432);
        assert_eq!(info.buffer, vk::Buffer::null());
        assert_eq!(info.offset, 512);
        assert_eq!(info.range, 432);
    }
}
