//! Scripted in-memory driver for exercising negotiation without a GPU.

use crate::driver::{DeviceCreateRequest, DeviceDriver, InstanceDriver, SwapchainDescriptor};
use crate::surface::FLEXIBLE_EXTENT;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::ffi::CString;
use std::sync::Arc;

/// One scripted physical device.
#[derive(Debug, Clone)]
pub(crate) struct FakePhysicalDevice {
    name: String,
    families: Vec<(vk::QueueFlags, bool)>,
    default_families: bool,
    extensions: Vec<CString>,
    capabilities: vk::SurfaceCapabilitiesKHR,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
}

impl FakePhysicalDevice {
    /// A device that passes every suitability check.
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            families: vec![(vk::QueueFlags::GRAPHICS, true)],
            default_families: true,
            extensions: vec![ash::khr::swapchain::NAME.to_owned()],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: FLEXIBLE_EXTENT,
                    height: FLEXIBLE_EXTENT,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    /// Append a queue family. The first call replaces the default family.
    pub(crate) fn with_family(mut self, flags: vk::QueueFlags, present: bool) -> Self {
        if self.default_families {
            self.families.clear();
            self.default_families = false;
        }
        self.families.push((flags, present));
        self
    }

    pub(crate) fn with_extensions(mut self, names: &[&std::ffi::CStr]) -> Self {
        self.extensions = names.iter().map(|&name| name.to_owned()).collect();
        self
    }

    pub(crate) fn with_formats(mut self, formats: &[vk::SurfaceFormatKHR]) -> Self {
        self.formats = formats.to_vec();
        self
    }

    pub(crate) fn with_present_modes(mut self, modes: &[vk::PresentModeKHR]) -> Self {
        self.present_modes = modes.to_vec();
        self
    }
}

#[derive(Default)]
struct InstanceState {
    enumeration_error: Option<vk::Result>,
    device_error: Option<vk::Result>,
    device_requests: Vec<DeviceCreateRequest>,
    created_devices: Vec<FakeDevice>,
    pending_swapchain_error: Option<vk::Result>,
    surface_support_queries: usize,
}

/// Scripted instance.
pub(crate) struct FakeGpu {
    devices: Mutex<Vec<FakePhysicalDevice>>,
    state: Mutex<InstanceState>,
}

impl FakeGpu {
    pub(crate) fn new(devices: Vec<FakePhysicalDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            state: Mutex::new(InstanceState::default()),
        }
    }

    /// The surface every query is expected to name.
    pub(crate) fn surface() -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0x5AF)
    }

    /// Handle of the device at `index`.
    pub(crate) fn handle(&self, index: usize) -> vk::PhysicalDevice {
        vk::PhysicalDevice::from_raw(index as u64 + 1)
    }

    pub(crate) fn handles(&self) -> Vec<vk::PhysicalDevice> {
        (0..self.devices.lock().len()).map(|i| self.handle(i)).collect()
    }

    pub(crate) fn surface_support_queries(&self) -> usize {
        self.state.lock().surface_support_queries
    }

    pub(crate) fn device_requests(&self) -> Vec<DeviceCreateRequest> {
        self.state.lock().device_requests.clone()
    }

    pub(crate) fn fail_enumeration(&self, result: vk::Result) {
        self.state.lock().enumeration_error = Some(result);
    }

    pub(crate) fn fail_device_creation(&self, result: vk::Result) {
        self.state.lock().device_error = Some(result);
    }

    /// Make the first swapchain creation on the next created device fail.
    pub(crate) fn fail_first_swapchain(&self, result: vk::Result) {
        self.state.lock().pending_swapchain_error = Some(result);
    }

    /// Every device created so far, sharing state with the originals.
    pub(crate) fn created_devices(&self) -> Vec<FakeDevice> {
        self.state.lock().created_devices.clone()
    }

    /// Change what the surface reports for the device at `index`.
    pub(crate) fn update_capabilities(
        &self,
        index: usize,
        update: impl FnOnce(&mut vk::SurfaceCapabilitiesKHR),
    ) {
        update(&mut self.devices.lock()[index].capabilities);
    }

    fn with_device<T>(
        &self,
        device: vk::PhysicalDevice,
        read: impl FnOnce(&FakePhysicalDevice) -> T,
    ) -> VkResult<T> {
        let index = (device.as_raw() as usize)
            .checked_sub(1)
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        self.devices
            .lock()
            .get(index)
            .map(read)
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn check_surface(surface: vk::SurfaceKHR) -> VkResult<()> {
        if surface == Self::surface() {
            Ok(())
        } else {
            Err(vk::Result::ERROR_SURFACE_LOST_KHR)
        }
    }
}

impl InstanceDriver for FakeGpu {
    type Device = FakeDevice;

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        match self.state.lock().enumeration_error {
            Some(e) => Err(e),
            None => Ok(self.handles()),
        }
    }

    fn device_name(&self, device: vk::PhysicalDevice) -> String {
        self.with_device(device, |d| d.name.clone())
            .unwrap_or_default()
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.with_device(device, |d| {
            d.families
                .iter()
                .map(|&(queue_flags, _)| vk::QueueFamilyProperties {
                    queue_flags,
                    queue_count: 1,
                    ..Default::default()
                })
                .collect()
        })
        .unwrap_or_default()
    }

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        Self::check_surface(surface)?;
        self.state.lock().surface_support_queries += 1;
        self.with_device(device, |d| {
            d.families
                .get(family_index as usize)
                .is_some_and(|&(_, present)| present)
        })
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        self.with_device(device, |d| d.extensions.clone())
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Self::check_surface(surface)?;
        self.with_device(device, |d| d.capabilities)
    }

    fn surface_formats(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Self::check_surface(surface)?;
        self.with_device(device, |d| d.formats.clone())
    }

    fn surface_present_modes(
        &self,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Self::check_surface(surface)?;
        self.with_device(device, |d| d.present_modes.clone())
    }

    fn create_device(
        &self,
        device: vk::PhysicalDevice,
        request: &DeviceCreateRequest,
    ) -> VkResult<Self::Device> {
        self.with_device(device, |_| ())?;
        let mut state = self.state.lock();
        if let Some(e) = state.device_error {
            return Err(e);
        }
        state.device_requests.push(request.clone());

        let device = FakeDevice::default();
        if let Some(e) = state.pending_swapchain_error.take() {
            device.fail_next_swapchain(e);
        }
        state.created_devices.push(device.clone());
        Ok(device)
    }
}

/// Swapchain traffic recorded by [`FakeDevice`], in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwapchainEvent {
    Created(vk::SwapchainKHR),
    Destroyed(vk::SwapchainKHR),
}

struct DeviceState {
    next_handle: u64,
    events: Vec<SwapchainEvent>,
    live: Vec<vk::SwapchainKHR>,
    image_counts: HashMap<vk::SwapchainKHR, u32>,
    descriptors: Vec<SwapchainDescriptor>,
    swapchain_error: Option<vk::Result>,
    images_error: Option<vk::Result>,
    acquire_results: VecDeque<VkResult<(u32, bool)>>,
    present_results: VecDeque<VkResult<bool>>,
    presented: Vec<u32>,
    idle_waits: usize,
    destroyed: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            next_handle: 100,
            events: Vec::new(),
            live: Vec::new(),
            image_counts: HashMap::new(),
            descriptors: Vec::new(),
            swapchain_error: None,
            images_error: None,
            acquire_results: VecDeque::new(),
            present_results: VecDeque::new(),
            presented: Vec::new(),
            idle_waits: 0,
            destroyed: false,
        }
    }
}

/// Scripted logical device. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct FakeDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl FakeDevice {
    pub(crate) fn live_swapchains(&self) -> Vec<vk::SwapchainKHR> {
        self.state.lock().live.clone()
    }

    pub(crate) fn events(&self) -> Vec<SwapchainEvent> {
        self.state.lock().events.clone()
    }

    pub(crate) fn created_descriptors(&self) -> Vec<SwapchainDescriptor> {
        self.state.lock().descriptors.clone()
    }

    pub(crate) fn presented(&self) -> Vec<u32> {
        self.state.lock().presented.clone()
    }

    pub(crate) fn idle_waits(&self) -> usize {
        self.state.lock().idle_waits
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Make the next swapchain creation fail.
    pub(crate) fn fail_next_swapchain(&self, result: vk::Result) {
        self.state.lock().swapchain_error = Some(result);
    }

    /// Make the next image query fail.
    pub(crate) fn fail_next_images(&self, result: vk::Result) {
        self.state.lock().images_error = Some(result);
    }

    pub(crate) fn push_acquire(&self, result: VkResult<(u32, bool)>) {
        self.state.lock().acquire_results.push_back(result);
    }

    pub(crate) fn push_present(&self, result: VkResult<bool>) {
        self.state.lock().present_results.push_back(result);
    }
}

impl DeviceDriver for FakeDevice {
    fn queue(&self, family_index: u32, _queue_index: u32) -> vk::Queue {
        vk::Queue::from_raw(1000 + u64::from(family_index))
    }

    fn create_swapchain(&self, descriptor: &SwapchainDescriptor) -> VkResult<vk::SwapchainKHR> {
        let mut state = self.state.lock();
        if let Some(e) = state.swapchain_error.take() {
            return Err(e);
        }

        let handle = vk::SwapchainKHR::from_raw(state.next_handle);
        state.next_handle += 1;
        state.live.push(handle);
        state.events.push(SwapchainEvent::Created(handle));
        state
            .image_counts
            .insert(handle, descriptor.config.image_count);
        state.descriptors.push(descriptor.clone());
        Ok(handle)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let mut state = self.state.lock();
        if let Some(e) = state.images_error.take() {
            return Err(e);
        }

        let count = state
            .image_counts
            .get(&swapchain)
            .copied()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        Ok((0..count)
            .map(|i| vk::Image::from_raw(swapchain.as_raw() * 100 + u64::from(i)))
            .collect())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout_ns: u64,
        _semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut state = self.state.lock();
        if !state.live.contains(&swapchain) {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }
        state.acquire_results.pop_front().unwrap_or(Ok((0, false)))
    }

    fn queue_present(
        &self,
        _queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        _wait_semaphores: &[vk::Semaphore],
    ) -> VkResult<bool> {
        let mut state = self.state.lock();
        if !state.live.contains(&swapchain) {
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }
        let result = state.present_results.pop_front().unwrap_or(Ok(false));
        if result.is_ok() {
            state.presented.push(image_index);
        }
        result
    }

    fn wait_idle(&self) -> VkResult<()> {
        self.state.lock().idle_waits += 1;
        Ok(())
    }

    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state.lock();
        state.live.retain(|&h| h != swapchain);
        state.image_counts.remove(&swapchain);
        state.events.push(SwapchainEvent::Destroyed(swapchain));
    }

    unsafe fn destroy(&self) {
        self.state.lock().destroyed = true;
    }
}
