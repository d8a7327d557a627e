//! Physical device (GPU) selection.
//!
//! # Overview
//!
//! Selection enumerates every GPU, discards those that cannot run the frame
//! pipeline and ranks the rest, preferring discrete GPUs. A device qualifies
//! when it has:
//! 1. A graphics queue family and a family that can present to the surface
//! 2. Vulkan 1.3 (dynamic rendering, synchronization2)
//! 3. Timeline semaphores, used as the frame completion counter
//! 4. `fillModeNonSolid`, used by the wireframe pipeline
//!
//! # Example
//!
//! ```no_run
//! use shapes_rhi::instance::Instance;
//! use shapes_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! # fn example() -> Result<(), shapes_rhi::RhiError> {
//! let instance = Instance::new(false, &[])?;
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let device_info = select_physical_device(instance.handle(), surface, &surface_loader)?;
//! println!("Selected GPU: {:?}", device_info.device_name());
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Queue family indices used by the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if both graphics and present queue families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the distinct queue family indices.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Capabilities checked during selection that are not part of
/// `VkPhysicalDeviceFeatures`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineCapabilities {
    pub api_version: u32,
    pub timeline_semaphore: bool,
    pub dynamic_rendering: bool,
    pub fill_mode_non_solid: bool,
}

impl PipelineCapabilities {
    /// Returns the first missing requirement, if any.
    pub fn missing_requirement(&self) -> Option<&'static str> {
        let major = vk::api_version_major(self.api_version);
        let minor = vk::api_version_minor(self.api_version);
        if major < 1 || (major == 1 && minor < 3) {
            return Some("Vulkan 1.3");
        }
        if !self.timeline_semaphore {
            return Some("timeline semaphores");
        }
        if !self.dynamic_rendering {
            return Some("dynamic rendering");
        }
        if !self.fill_mode_non_solid {
            return Some("non-solid fill mode");
        }
        None
    }
}

/// Information about a physical device (GPU).
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for different operations.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Returns the total device local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

/// Selects the most suitable physical device for rendering.
///
/// # Arguments
///
/// * `instance` - The Vulkan instance
/// * `surface` - The window surface for present support checking
/// * `surface_loader` - The surface extension loader
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no GPU meets the requirements.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| check_device_suitability(instance, device, surface, surface_loader))
        .map(|info| {
            let score = rate_device(
                info.properties.device_type,
                info.device_local_memory(),
                &info.queue_families,
            );
            debug!(
                "GPU '{}' ({}) - Score: {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            (info, score)
        })
        .max_by_key(|(_, score)| *score);

    let Some((selected, score)) = best else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, Score: {}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        score
    );

    Ok(selected)
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
    let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_str()
        .unwrap_or("Unknown");

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing required queue families (graphics={}, present={})",
            device_name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    let capabilities = query_capabilities(instance, device, properties.api_version);
    if let Some(missing) = capabilities.missing_requirement() {
        debug!("GPU '{}' skipped: {} not supported", device_name, missing);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
    })
}

fn query_capabilities(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    api_version: u32,
) -> PipelineCapabilities {
    // Chaining 1.2/1.3 feature structs is only valid on 1.3 devices.
    if vk::api_version_minor(api_version) < 3 && vk::api_version_major(api_version) == 1 {
        return PipelineCapabilities {
            api_version,
            ..Default::default()
        };
    }

    let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default();
    let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut features_1_2)
        .push_next(&mut features_1_3);
    unsafe { instance.get_physical_device_features2(device, &mut features2) };
    let fill_mode_non_solid = features2.features.fill_mode_non_solid == vk::TRUE;

    PipelineCapabilities {
        api_version,
        timeline_semaphore: features_1_2.timeline_semaphore == vk::TRUE,
        dynamic_rendering: features_1_3.dynamic_rendering == vk::TRUE,
        fill_mode_non_solid,
    }
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let present_support = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        };

        // A family doing both avoids a queue ownership transfer on present.
        if has_graphics && present_support {
            return QueueFamilyIndices {
                graphics_family: Some(i),
                present_family: Some(i),
            };
        }
        if has_graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if present_support && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

/// Rates a physical device; higher is better.
fn rate_device(
    device_type: vk::PhysicalDeviceType,
    device_local_memory: u64,
    queue_families: &QueueFamilyIndices,
) -> u32 {
    let mut score = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 10_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1_000,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    let vram_mb = (device_local_memory / (1024 * 1024)) as u32;
    score += vram_mb.min(16_000);

    if queue_families.graphics_family == queue_families.present_family {
        score += 100;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capable() -> PipelineCapabilities {
        PipelineCapabilities {
            api_version: vk::make_api_version(0, 1, 3, 0),
            timeline_semaphore: true,
            dynamic_rendering: true,
            fill_mode_non_solid: true,
        }
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());
        assert!(indices.unique_families().is_empty());
    }

    #[test]
    fn test_unique_families_shared_queue() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(indices.is_complete());
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn test_unique_families_split_queue() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(indices.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_capabilities_complete() {
        assert_eq!(capable().missing_requirement(), None);
    }

    #[test]
    fn test_capabilities_reject_vulkan_1_2() {
        let caps = PipelineCapabilities {
            api_version: vk::make_api_version(0, 1, 2, 198),
            ..capable()
        };
        assert_eq!(caps.missing_requirement(), Some("Vulkan 1.3"));
    }

    #[test]
    fn test_capabilities_require_timeline_semaphore() {
        let caps = PipelineCapabilities {
            timeline_semaphore: false,
            ..capable()
        };
        assert_eq!(caps.missing_requirement(), Some("timeline semaphores"));
    }

    #[test]
    fn test_capabilities_require_wireframe_fill() {
        let caps = PipelineCapabilities {
            fill_mode_non_solid: false,
            ..capable()
        };
        assert_eq!(caps.missing_requirement(), Some("non-solid fill mode"));
    }

    #[test]
    fn test_discrete_gpu_outranks_integrated() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        let discrete = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 1 << 30, &shared);
        let integrated = rate_device(vk::PhysicalDeviceType::INTEGRATED_GPU, 16 << 30, &shared);
        assert!(discrete > integrated);
    }
}
