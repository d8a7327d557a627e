//! Depth attachment for the opaque pass.
//!
//! Recreated together with the swapchain whenever the surface size changes.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use shapes_rhi::device::Device;
use shapes_rhi::{RhiError, RhiResult};

/// 32-bit floating point depth.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// GPU-only depth image and its view.
pub struct DepthBuffer {
    device: Arc<Device>,
    image: vk::Image,
    image_view: vk::ImageView,
    allocation: Option<Allocation>,
    extent: vk::Extent2D,
}

impl DepthBuffer {
    /// Creates a [`DEPTH_FORMAT`] depth buffer of `extent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the extent is empty or image, memory or view
    /// creation fails.
    pub fn new(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::SwapchainError(
                "Depth buffer dimensions must be greater than 0".to_string(),
            ));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.allocator().and_then(|mut allocator| {
            Ok(allocator.allocate(&AllocationCreateDesc {
                name: "depth_buffer",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        let mut depth = Self {
            device,
            image,
            image_view: vk::ImageView::null(),
            allocation: Some(allocation),
            extent,
        };

        // From here on, Drop releases whatever was created.
        if let Some(allocation) = depth.allocation.as_ref() {
            unsafe {
                depth.device.handle().bind_image_memory(
                    image,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .level_count(1)
                    .layer_count(1),
            );
        depth.image_view = unsafe { depth.device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, DEPTH_FORMAT
        );

        Ok(depth)
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.image_view != vk::ImageView::null() {
                self.device
                    .handle()
                    .destroy_image_view(self.image_view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free depth buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Failed to lock allocator for depth buffer: {e}"),
            }
        }

        debug!(
            "Destroyed depth buffer: {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_format_has_no_stencil() {
        assert_eq!(DEPTH_FORMAT, vk::Format::D32_SFLOAT);
    }
}
