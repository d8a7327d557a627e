//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
///
/// Every variant is fatal for the current device. [`RhiError::DeviceLost`] is
/// split out of [`RhiError::VulkanError`] so callers can report it as such and
/// tear the whole GPU context down instead of retrying.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(vk::Result),

    /// The logical device was lost; all GPU state must be recreated
    #[error("GPU device lost")]
    DeviceLost,

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Buffer creation or host write error
    #[error("Buffer error: {0}")]
    BufferError(String),

    /// Shader loading error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Timeline misuse, such as waiting on a value that was never signaled
    #[error("Timeline error: {0}")]
    Timeline(String),
}

impl From<vk::Result> for RhiError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => RhiError::DeviceLost,
            other => RhiError::VulkanError(other),
        }
    }
}

impl RhiError {
    /// Returns true if the error means the device can no longer be used.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, RhiError::DeviceLost)
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_maps_to_dedicated_variant() {
        let err: RhiError = vk::Result::ERROR_DEVICE_LOST.into();
        assert!(err.is_device_lost());
    }

    #[test]
    fn test_other_results_stay_vulkan_errors() {
        let err: RhiError = vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.into();
        assert!(matches!(
            err,
            RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        ));
        assert!(!err.is_device_lost());
    }
}
