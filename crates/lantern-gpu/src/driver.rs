//! The driver boundary.
//!
//! Every enumerate/query/create/destroy call the negotiation makes goes
//! through [`InstanceDriver`] or [`DeviceDriver`]. The Vulkan-backed
//! implementation lives in [`crate::vulkan`]; the negotiation logic itself
//! only sees these traits.
//!
//! Handles passed into a driver must have been produced by that same driver.

use crate::capabilities::ResolvedQueueFamilies;
use crate::surface::SwapchainConfig;
use ash::prelude::VkResult;
use ash::vk;
use std::ffi::CString;

/// Instance-level queries plus logical device creation.
pub trait InstanceDriver {
    /// Logical device type produced by [`InstanceDriver::create_device`].
    type Device: DeviceDriver;

    /// Enumerate physical devices in driver order.
    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;

    /// Human-readable device name.
    fn device_name(&self, device: vk::PhysicalDevice) -> String;

    /// Queue family properties, indexed by family.
    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;

    /// Whether `family_index` can present to `surface`.
    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;

    /// Names of every device extension the device advertises.
    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<CString>>;

    /// Surface capabilities for a device/surface pair.
    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;

    /// Supported surface formats for a device/surface pair.
    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;

    /// Supported present modes for a device/surface pair.
    fn surface_present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    /// Create a logical device.
    fn create_device(
        &self,
        device: vk::PhysicalDevice,
        request: &DeviceCreateRequest,
    ) -> VkResult<Self::Device>;
}

/// Calls issued against a logical device.
pub trait DeviceDriver {
    /// Fetch a queue created with the device.
    fn queue(&self, family_index: u32, queue_index: u32) -> vk::Queue;

    /// Create a swapchain.
    fn create_swapchain(&self, descriptor: &SwapchainDescriptor) -> VkResult<vk::SwapchainKHR>;

    /// Presentable images owned by a swapchain.
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    /// Acquire the next presentable image.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    /// Queue an image for presentation. `Ok(true)` means suboptimal.
    fn queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> VkResult<bool>;

    /// Block until the device is idle.
    fn wait_idle(&self) -> VkResult<()>;

    /// Destroy a swapchain.
    ///
    /// # Safety
    /// No in-flight work may reference the swapchain or its images.
    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    /// Destroy the logical device.
    ///
    /// # Safety
    /// Every child object (swapchains included) must already be destroyed.
    unsafe fn destroy(&self);
}

/// One queue-creation entry of a device request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRequest {
    pub family_index: u32,
    pub priorities: Vec<f32>,
}

/// Everything needed to create a logical device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceCreateRequest {
    pub queues: Vec<QueueRequest>,
    pub extensions: Vec<CString>,
    pub layers: Vec<CString>,
}

/// How swapchain images are shared between queue families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    /// One family owns the images; no family list is passed.
    Exclusive,
    /// Graphics and presentation families use the images concurrently.
    Concurrent([u32; 2]),
}

impl ImageSharing {
    /// Exclusive when the families coincide, concurrent otherwise.
    pub const fn for_families(families: ResolvedQueueFamilies) -> Self {
        if families.graphics == families.present {
            Self::Exclusive
        } else {
            Self::Concurrent([families.graphics, families.present])
        }
    }

    pub const fn mode(&self) -> vk::SharingMode {
        match self {
            Self::Exclusive => vk::SharingMode::EXCLUSIVE,
            Self::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    pub fn family_indices(&self) -> &[u32] {
        match self {
            Self::Exclusive => &[],
            Self::Concurrent(families) => families.as_slice(),
        }
    }
}

/// Parameters for a swapchain creation call.
#[derive(Debug, Clone)]
pub struct SwapchainDescriptor {
    pub surface: vk::SurfaceKHR,
    pub config: SwapchainConfig,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing: ImageSharing,
    pub old_swapchain: Option<vk::SwapchainKHR>,
}

impl SwapchainDescriptor {
    /// Build the Vulkan create info.
    ///
    /// Single array layer, color attachment usage, opaque compositing and
    /// clipping are fixed for every chain.
    pub fn create_info(&self) -> vk::SwapchainCreateInfoKHR<'_> {
        vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(self.config.image_count)
            .image_format(self.config.format)
            .image_color_space(self.config.color_space)
            .image_extent(self.config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(self.sharing.mode())
            .queue_family_indices(self.sharing.family_indices())
            .pre_transform(self.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.config.present_mode)
            .clipped(true)
            .old_swapchain(self.old_swapchain.unwrap_or(vk::SwapchainKHR::null()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn descriptor(sharing: ImageSharing, old: Option<vk::SwapchainKHR>) -> SwapchainDescriptor {
        SwapchainDescriptor {
            surface: vk::SurfaceKHR::from_raw(7),
            config: SwapchainConfig {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                present_mode: vk::PresentModeKHR::FIFO,
                extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                image_count: 3,
            },
            pre_transform: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            sharing,
            old_swapchain: old,
        }
    }

    #[test]
    fn sharing_follows_family_topology() {
        let same = ResolvedQueueFamilies {
            graphics: 0,
            present: 0,
        };
        let split = ResolvedQueueFamilies {
            graphics: 0,
            present: 2,
        };

        assert_eq!(ImageSharing::for_families(same), ImageSharing::Exclusive);
        assert_eq!(
            ImageSharing::for_families(split),
            ImageSharing::Concurrent([0, 2])
        );
    }

    #[test]
    fn exclusive_create_info_has_no_family_list() {
        let desc = descriptor(ImageSharing::Exclusive, None);
        let info = desc.create_info();

        assert_eq!(info.image_sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert_eq!(info.queue_family_index_count, 0);
        assert!(info.old_swapchain.is_null());
    }

    #[test]
    fn concurrent_create_info_lists_both_families() {
        let desc = descriptor(ImageSharing::Concurrent([1, 3]), None);
        let info = desc.create_info();

        assert_eq!(info.image_sharing_mode, vk::SharingMode::CONCURRENT);
        assert_eq!(info.queue_family_index_count, 2);
        let families = unsafe { std::slice::from_raw_parts(info.p_queue_family_indices, 2) };
        assert_eq!(families, &[1, 3]);
    }

    #[test]
    fn fixed_policies_applied() {
        let old = vk::SwapchainKHR::from_raw(42);
        let desc = descriptor(ImageSharing::Exclusive, Some(old));
        let info = desc.create_info();

        assert_eq!(info.image_array_layers, 1);
        assert_eq!(info.image_usage, vk::ImageUsageFlags::COLOR_ATTACHMENT);
        assert_eq!(info.composite_alpha, vk::CompositeAlphaFlagsKHR::OPAQUE);
        assert_eq!(info.clipped, vk::TRUE);
        assert_eq!(info.pre_transform, vk::SurfaceTransformFlagsKHR::ROTATE_90);
        assert_eq!(info.min_image_count, 3);
        assert_eq!(info.old_swapchain, old);
    }
}
