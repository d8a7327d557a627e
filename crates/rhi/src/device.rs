//! Vulkan logical device and queue management.
//!
//! This module handles VkDevice creation, queue retrieval, and gpu-allocator initialization.
//!
//! # Overview
//!
//! The [`Device`] struct provides a safe abstraction over the Vulkan logical device,
//! including:
//! - Logical device creation with the features frame pipelining relies on
//!   (timeline semaphores, dynamic rendering, non-solid fill for wireframe)
//! - Queue retrieval for graphics and presentation
//! - Memory allocation via gpu-allocator
//!
//! # Example
//!
//! ```no_run
//! use shapes_rhi::instance::Instance;
//! use shapes_rhi::physical_device::select_physical_device;
//! use shapes_rhi::device::Device;
//! use ash::vk;
//!
//! # fn example() -> Result<(), shapes_rhi::RhiError> {
//! let instance = Instance::new(false, &[])?;
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let physical_device_info = select_physical_device(instance.handle(), surface, &surface_loader)?;
//! let device = Device::new(&instance, &physical_device_info)?;
//!
//! let graphics_queue = device.graphics_queue();
//! # Ok(())
//! # }
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// This struct manages the lifetime of the Vulkan logical device and its associated
/// resources including queues and the memory allocator.
///
/// # Thread Safety
///
/// The [`Device`] is designed to be shared across threads using `Arc`. The internal
/// allocator is protected by a `Mutex` for thread-safe memory allocation.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// GPU memory allocator. Dropped explicitly before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
    /// `minUniformBufferOffsetAlignment` of the physical device.
    min_uniform_alignment: vk::DeviceSize,
}

impl Device {
    /// Creates a new logical device.
    ///
    /// This function creates a Vulkan logical device with:
    /// - The swapchain extension
    /// - Vulkan 1.2 features (timeline semaphore, buffer device address)
    /// - Vulkan 1.3 features (dynamic rendering, synchronization2)
    /// - Base features (fill mode non-solid for the wireframe pipeline)
    ///
    /// It also initializes the gpu-allocator for memory management.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The selected device is missing a graphics or present queue
    /// - Device creation fails
    /// - Allocator initialization fails
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> RhiResult<Arc<Self>> {
        let queue_families = &physical_device_info.queue_families;
        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(RhiError::NoSuitableGpu);
        };

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default()
            .timeline_semaphore(true)
            .buffer_device_address(true);

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let features = vk::PhysicalDeviceFeatures::default().fill_mode_non_solid(true);

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features_1_2)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            DEVICE_EXTENSIONS.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        debug!("Graphics queue retrieved from family {}", graphics_family);

        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!("Present queue retrieved from family {}", present_family);

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        })?;

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families: physical_device_info.queue_families,
            min_uniform_alignment: physical_device_info
                .properties
                .limits
                .min_uniform_buffer_offset_alignment,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Returns the device's minimum uniform buffer offset alignment in bytes.
    #[inline]
    pub fn min_uniform_alignment(&self) -> vk::DeviceSize {
        self.min_uniform_alignment
    }

    /// Locks the GPU memory allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if another thread panicked while holding the lock.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::VulkanError(vk::Result::ERROR_UNKNOWN))
    }

    /// Waits for the device to become idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits command buffers to the graphics queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - All command buffers are valid and recorded
    /// - Every semaphore and timeline value in `submit_infos` is valid
    /// - The fence (if not null) is not in use
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // The allocator frees its memory blocks through the device handle.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: Device is Send+Sync because:
// - ash::Device is Send+Sync
// - vk::PhysicalDevice and vk::Queue are Copy types (handles)
// - Allocator is protected by Mutex
// - QueueFamilyIndices is Copy
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_extensions_defined() {
        assert_eq!(DEVICE_EXTENSIONS, &[ash::khr::swapchain::NAME]);
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
