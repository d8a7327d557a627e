//! Synchronization primitives for Vulkan.
//!
//! This module provides wrappers for Vulkan synchronization objects:
//! - [`Semaphore`] - binary GPU-to-GPU synchronization (swapchain acquire/present)
//! - [`TimelineSemaphore`] - a monotonically increasing 64-bit counter that
//!   the GPU signals on submission completion and the CPU can query or wait on
//!
//! # Overview
//!
//! Frame pacing is expressed entirely through one timeline semaphore. Each
//! submission signals the next timeline value; before reusing a frame's
//! resources the host waits until the counter reaches the value that frame
//! was stamped with. This replaces the per-frame fence pattern.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shapes_rhi::device::Device;
//! use shapes_rhi::sync::TimelineSemaphore;
//!
//! # fn example(device: Arc<Device>) -> Result<(), shapes_rhi::RhiError> {
//! let timeline = TimelineSemaphore::new(device, 0)?;
//!
//! // ... submit work that signals value 1 ...
//!
//! if timeline.value()? < 1 {
//!     timeline.wait(1, u64::MAX)?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Binary Vulkan semaphore.
///
/// Used for the swapchain handshake:
/// - Image available semaphore: signaled when a swapchain image is ready
/// - Render finished semaphore: signaled when rendering is complete
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created semaphore");

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed semaphore");
    }
}

/// Vulkan timeline semaphore.
///
/// The counter only moves forward. Queue submissions signal it with a value
/// through `VkTimelineSemaphoreSubmitInfo`; the host reads it with
/// [`TimelineSemaphore::value`] and blocks on it with
/// [`TimelineSemaphore::wait`].
///
/// # Thread Safety
///
/// The handle is immutable after creation. Queries and host waits may be
/// issued from any thread.
pub struct TimelineSemaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl TimelineSemaphore {
    /// Creates a timeline semaphore whose counter starts at `initial_value`.
    ///
    /// Requires the `timelineSemaphore` feature, which the device enables
    /// unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>, initial_value: u64) -> RhiResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created timeline semaphore (initial value {})", initial_value);

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Returns the last value the GPU has signaled.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RhiError::DeviceLost`] if the device was lost.
    pub fn value(&self) -> RhiResult<u64> {
        let value = unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)?
        };
        Ok(value)
    }

    /// Blocks until the counter is at least `value`.
    ///
    /// # Arguments
    ///
    /// * `value` - The counter value to wait for
    /// * `timeout` - Timeout in nanoseconds. Use `u64::MAX` for infinite wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait times out or the device was lost.
    pub fn wait(&self, value: u64, timeout: u64) -> RhiResult<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        unsafe { self.device.handle().wait_semaphores(&wait_info, timeout)? };
        Ok(())
    }
}

impl Drop for TimelineSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed timeline semaphore");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn test_timeline_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TimelineSemaphore>();
    }
}
