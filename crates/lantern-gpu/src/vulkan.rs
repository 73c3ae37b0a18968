//! ash-backed implementation of the driver boundary.

use crate::driver::{DeviceCreateRequest, DeviceDriver, InstanceDriver, SwapchainDescriptor};
use crate::instance::DebugMessenger;
use ash::prelude::VkResult;
use ash::vk;
use std::ffi::{c_char, CString};

/// A Vulkan instance with its surface loader and optional debug messenger.
///
/// Dropping it destroys the messenger and then the instance; every surface
/// and device created from it must already be gone.
pub struct VulkanInstance {
    entry: ash::Entry,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
    debug_messenger: Option<DebugMessenger>,
}

impl VulkanInstance {
    /// Take ownership of a created instance.
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        debug_messenger: Option<DebugMessenger>,
    ) -> Self {
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        Self {
            entry,
            instance,
            surface_loader,
            debug_messenger,
        }
    }

    /// Get the Vulkan entry.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the surface extension loader.
    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Destroy a surface created from this instance.
    ///
    /// # Safety
    /// No swapchain may still reference the surface.
    pub unsafe fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        // SAFETY: forwarded to the caller
        unsafe { self.surface_loader.destroy_surface(surface, None) };
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        // SAFETY: children are destroyed by their owners before the instance
        unsafe {
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

impl InstanceDriver for VulkanInstance {
    type Device = VulkanDevice;

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        // SAFETY: the instance is alive for the lifetime of self
        unsafe { self.instance.enumerate_physical_devices() }
    }

    fn device_name(&self, device: vk::PhysicalDevice) -> String {
        // SAFETY: device was enumerated from this instance
        let properties = unsafe { self.instance.get_physical_device_properties(device) };
        properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| format!("{device:?}"))
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        // SAFETY: device was enumerated from this instance
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(device)
        }
    }

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        // SAFETY: device and surface belong to this instance
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(device, family_index, surface)
        }
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        // SAFETY: device was enumerated from this instance
        let properties = unsafe { self.instance.enumerate_device_extension_properties(device) }?;
        Ok(properties
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        // SAFETY: device and surface belong to this instance
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(device, surface)
        }
    }

    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        // SAFETY: device and surface belong to this instance
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(device, surface)
        }
    }

    fn surface_present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        // SAFETY: device and surface belong to this instance
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(device, surface)
        }
    }

    fn create_device(
        &self,
        device: vk::PhysicalDevice,
        request: &DeviceCreateRequest,
    ) -> VkResult<Self::Device> {
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = request
            .queues
            .iter()
            .map(|queue| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(queue.family_index)
                    .queue_priorities(&queue.priorities)
            })
            .collect();

        let extension_names: Vec<*const c_char> =
            request.extensions.iter().map(|ext| ext.as_ptr()).collect();
        let layer_names: Vec<*const c_char> =
            request.layers.iter().map(|layer| layer.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::default();

        // Device layers are ignored by current loaders but older ones still
        // expect them to match the instance layers.
        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .enabled_features(&features);

        // SAFETY: every pointer in create_info outlives this call
        let logical = unsafe { self.instance.create_device(device, &create_info, None) }?;
        let swapchain_loader = ash::khr::swapchain::Device::new(&self.instance, &logical);

        Ok(VulkanDevice {
            device: logical,
            swapchain_loader,
        })
    }
}

/// A logical device with its swapchain loader.
pub struct VulkanDevice {
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
}

impl VulkanDevice {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }
}

impl DeviceDriver for VulkanDevice {
    fn queue(&self, family_index: u32, queue_index: u32) -> vk::Queue {
        // SAFETY: the family was requested at device creation
        unsafe { self.device.get_device_queue(family_index, queue_index) }
    }

    fn create_swapchain(&self, descriptor: &SwapchainDescriptor) -> VkResult<vk::SwapchainKHR> {
        let create_info = descriptor.create_info();
        // SAFETY: the surface and any retired chain belong to this device's instance
        unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        // SAFETY: swapchain was created by this device
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        // SAFETY: swapchain was created by this device
        unsafe {
            self.swapchain_loader.acquire_next_image(
                swapchain,
                timeout_ns,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    fn queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> VkResult<bool> {
        let swapchains = [swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: queue and swapchain belong to this device
        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    fn wait_idle(&self) -> VkResult<()> {
        // SAFETY: the device is alive for the lifetime of self
        unsafe { self.device.device_wait_idle() }
    }

    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        // SAFETY: forwarded to the caller
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    unsafe fn destroy(&self) {
        // SAFETY: forwarded to the caller
        unsafe { self.device.destroy_device(None) };
    }
}
