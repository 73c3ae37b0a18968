//! GPU context management.
//!
//! [`GpuContext`] owns the whole chain built for one window: instance,
//! surface, logical device and swapchain. Setup runs in that order and
//! teardown in reverse; a failure part-way releases whatever was already
//! created.

use crate::config::GpuConfig;
use crate::device::{build_device, LogicalDevice};
use crate::driver::{DeviceDriver, InstanceDriver};
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, DebugMessenger};
use crate::selection::{select_physical_device, SelectedDevice};
use crate::surface::WindowSurface;
use crate::swapchain::{AcquiredImage, LifecycleState, Recreation, Swapchain, SwapchainManager};
use crate::vulkan::{VulkanDevice, VulkanInstance};
use ash::vk;

/// Main GPU context holding Vulkan resources.
pub struct GpuContext {
    swapchain: SwapchainManager,
    device: LogicalDevice<VulkanDevice>,
    selected: SelectedDevice,
    surface: vk::SurfaceKHR,
    config: GpuConfig,
    // Dropped last
    instance: VulkanInstance,
}

impl GpuContext {
    /// Get the Vulkan instance wrapper.
    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        self.device.device().device()
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        self.device.device().swapchain_loader()
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.selected.physical_device
    }

    /// Name of the selected GPU.
    pub fn device_name(&self) -> &str {
        &self.selected.name
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue()
    }

    /// Get the presentation queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue()
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.device.queue_families().graphics
    }

    /// Get the presentation queue family index.
    pub fn present_queue_family(&self) -> u32 {
        self.device.queue_families().present
    }

    /// The configuration the context was built with.
    pub fn config(&self) -> &GpuConfig {
        &self.config
    }

    /// The active swapchain, if any.
    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.swapchain()
    }

    /// Lifecycle state of the swapchain.
    pub fn swapchain_state(&self) -> LifecycleState {
        self.swapchain.state()
    }

    /// Swapchain generation; changes whenever images must be re-fetched.
    pub fn swapchain_generation(&self) -> u64 {
        self.swapchain.generation()
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        self.device.device().wait_idle()?;
        Ok(())
    }

    /// Record that the window was resized. The swapchain is rebuilt on the
    /// next call to [`GpuContext::recreate_swapchain`].
    pub fn notify_resized(&mut self) {
        self.swapchain
            .invalidate(crate::swapchain::InvalidationReason::Resized);
    }

    /// Whether the swapchain needs rebuilding before the next frame.
    pub fn needs_recreation(&self) -> bool {
        matches!(self.swapchain.state(), LifecycleState::Invalidated(_))
    }

    /// Wait for the device to go idle and rebuild the swapchain.
    pub fn recreate_swapchain(&mut self, framebuffer: vk::Extent2D) -> Result<Recreation> {
        self.wait_idle()?;
        // SAFETY: the device is idle, so nothing references the old chain
        unsafe {
            self.swapchain
                .recreate(&self.instance, self.device.device(), framebuffer)
        }
    }

    /// Acquire the next swapchain image.
    pub fn acquire_next_image(
        &mut self,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> Result<AcquiredImage> {
        self.swapchain
            .acquire_next_image(self.device.device(), timeout_ns, semaphore)
    }

    /// Present an image on the presentation queue.
    pub fn present(&mut self, image_index: u32, wait_semaphores: &[vk::Semaphore]) -> Result<()> {
        let queue = self.device.present_queue();
        self.swapchain
            .present(self.device.device(), queue, image_index, wait_semaphores)
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // SAFETY: children go before their parents; the instance drops last
        unsafe {
            let _ = self.device.device().wait_idle();
            self.swapchain.destroy(self.device.device());
            self.device.destroy();
            self.instance.destroy_surface(self.surface);
        }
        tracing::debug!("GPU context destroyed");
    }
}

/// Builder for creating a GPU context.
#[derive(Default)]
pub struct GpuContextBuilder {
    config: GpuConfig,
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn with_config(config: GpuConfig) -> Self {
        Self { config }
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_app_name(name);
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.config = self.config.with_validation(enable);
        self
    }

    /// Set the preferred present mode.
    pub fn present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.config = self.config.with_present_mode(mode);
        self
    }

    /// Build the GPU context for a window.
    pub fn build(self, window: &dyn WindowSurface) -> Result<GpuContext> {
        let config = self.config;

        // SAFETY: loading the system Vulkan library
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let window_extensions = window.required_instance_extensions()?;

        // SAFETY: entry was just loaded
        let raw_instance = unsafe {
            create_instance(
                &entry,
                &config.app_name,
                &window_extensions,
                config.enable_validation,
            )
        }?;

        let debug_messenger = if config.enable_validation {
            // SAFETY: debug utils is enabled whenever validation is
            match unsafe { DebugMessenger::new(&entry, &raw_instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    // SAFETY: nothing else was created from the instance
                    unsafe { raw_instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let instance = VulkanInstance::new(entry, raw_instance, debug_messenger);

        // SAFETY: the instance was created with the window's extensions and
        // outlives the surface
        let surface = unsafe { window.create_surface(instance.entry(), instance.instance()) }?;

        let negotiated = match negotiate(&instance, surface, &config, window.framebuffer_size()) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                // SAFETY: negotiation released everything it created
                unsafe { instance.destroy_surface(surface) };
                return Err(e);
            }
        };

        Ok(GpuContext {
            swapchain: negotiated.swapchain,
            device: negotiated.device,
            selected: negotiated.selected,
            surface,
            config,
            instance,
        })
    }
}

/// Everything negotiated for one surface.
pub(crate) struct Negotiated<D> {
    pub(crate) selected: SelectedDevice,
    pub(crate) device: LogicalDevice<D>,
    pub(crate) swapchain: SwapchainManager,
}

/// Select a device, build it and create the first swapchain.
///
/// On failure every object created here has been destroyed again.
pub(crate) fn negotiate<I: InstanceDriver + ?Sized>(
    instance: &I,
    surface: vk::SurfaceKHR,
    config: &GpuConfig,
    framebuffer: vk::Extent2D,
) -> Result<Negotiated<I::Device>> {
    let selected = select_physical_device(instance, surface, &config.required_extensions)?;
    tracing::info!("Selected GPU: {}", selected.name);

    let device = build_device(
        instance,
        &selected,
        &config.required_extensions,
        &config.layers(),
    )?;

    let mut swapchain = SwapchainManager::new(
        surface,
        selected.physical_device,
        selected.queue_families,
        config,
    );

    if let Err(e) = swapchain.create(instance, device.device(), framebuffer) {
        // SAFETY: the device has no children and no submitted work
        unsafe { device.destroy() };
        return Err(e);
    }

    Ok(Negotiated {
        selected,
        device,
        swapchain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeGpu, FakePhysicalDevice};

    const FRAMEBUFFER: vk::Extent2D = vk::Extent2D {
        width: 1280,
        height: 720,
    };

    #[test]
    fn negotiates_full_chain() {
        let gpu = FakeGpu::new(vec![
            FakePhysicalDevice::new("software").with_extensions(&[]),
            FakePhysicalDevice::new("gpu"),
        ]);

        let negotiated =
            negotiate(&gpu, FakeGpu::surface(), &GpuConfig::new(), FRAMEBUFFER).unwrap();

        assert_eq!(negotiated.selected.name, "gpu");
        assert_eq!(negotiated.swapchain.state(), LifecycleState::Active);
        let chain = negotiated.swapchain.swapchain().unwrap();
        assert_eq!(chain.extent(), FRAMEBUFFER);
        assert_eq!(negotiated.device.device().live_swapchains(), vec![chain.handle()]);
    }

    #[test]
    fn no_suitable_device_creates_nothing() {
        let gpu = FakeGpu::new(vec![FakePhysicalDevice::new("gpu").with_present_modes(&[])]);

        let result = negotiate(&gpu, FakeGpu::surface(), &GpuConfig::new(), FRAMEBUFFER);
        assert!(matches!(result, Err(GpuError::NoSuitableDevice(_))));
        assert!(gpu.device_requests().is_empty());
    }

    #[test]
    fn swapchain_failure_destroys_device() {
        let gpu = FakeGpu::new(vec![FakePhysicalDevice::new("gpu")]);
        gpu.fail_first_swapchain(vk::Result::ERROR_INITIALIZATION_FAILED);

        let result = negotiate(&gpu, FakeGpu::surface(), &GpuConfig::new(), FRAMEBUFFER);
        assert!(matches!(result, Err(GpuError::SwapchainCreation(_))));

        let devices = gpu.created_devices();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_destroyed());
        assert!(devices[0].live_swapchains().is_empty());
    }

    #[test]
    fn validation_layer_reaches_device_request() {
        let gpu = FakeGpu::new(vec![FakePhysicalDevice::new("gpu")]);
        let config = GpuConfig::new().with_validation(true);

        negotiate(&gpu, FakeGpu::surface(), &config, FRAMEBUFFER).unwrap();
        assert_eq!(
            gpu.device_requests()[0].layers,
            vec![crate::config::VALIDATION_LAYER.to_owned()]
        );
    }

    #[test]
    fn extra_required_extension_filters_devices() {
        let gpu = FakeGpu::new(vec![
            FakePhysicalDevice::new("basic"),
            FakePhysicalDevice::new("capable").with_extensions(&[
                ash::khr::swapchain::NAME,
                ash::khr::maintenance1::NAME,
            ]),
        ]);
        let config = GpuConfig::new().with_required_extension(ash::khr::maintenance1::NAME);

        let negotiated = negotiate(&gpu, FakeGpu::surface(), &config, FRAMEBUFFER).unwrap();
        assert_eq!(negotiated.selected.name, "capable");
        assert_eq!(gpu.device_requests()[0].extensions.len(), 2);
    }
}
