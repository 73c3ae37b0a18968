//! Swapchain lifecycle management.
//!
//! A [`SwapchainManager`] owns the one swapchain bound to a surface and moves
//! it through `Uninitialized → Active ⇄ Invalidated → Destroyed`. Resize
//! notifications and out-of-date presentation results invalidate the chain;
//! [`SwapchainManager::recreate`] re-queries the surface, renegotiates and
//! swaps in a new chain, destroying the retired one only after its
//! replacement exists.

use crate::capabilities::{ResolvedQueueFamilies, SurfaceSupport};
use crate::config::GpuConfig;
use crate::driver::{DeviceDriver, ImageSharing, InstanceDriver, SwapchainDescriptor};
use crate::error::{GpuError, Result};
use crate::surface::SwapchainConfig;
use ash::vk;

/// A live swapchain and the configuration it was built with.
#[derive(Debug)]
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    config: SwapchainConfig,
}

impl Swapchain {
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Presentable images, indexed by acquire index.
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    pub fn format(&self) -> vk::Format {
        self.config.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }
}

/// Why a swapchain stopped being current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The window reported a new size.
    Resized,
    /// Acquire or present reported the chain out of date.
    OutOfDate,
    /// Acquire or present succeeded but the chain no longer matches exactly.
    Suboptimal,
    /// The surface was lost.
    SurfaceLost,
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Active,
    Invalidated(InvalidationReason),
    Destroyed,
}

/// Result of a create or recreate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recreation {
    /// A new chain is active.
    Rebuilt,
    /// The surface currently has a zero extent; try again after the next resize.
    Deferred,
}

/// An image handed out by [`SwapchainManager::acquire_next_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    pub suboptimal: bool,
}

enum Slot {
    Uninitialized,
    Active(Swapchain),
    Invalidated {
        retired: Option<Swapchain>,
        reason: InvalidationReason,
    },
    Destroyed,
}

/// Owner of the swapchain for one surface.
pub struct SwapchainManager {
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    queue_families: ResolvedQueueFamilies,
    config: GpuConfig,
    slot: Slot,
    generation: u64,
}

impl SwapchainManager {
    /// Create a manager with no swapchain yet.
    pub fn new(
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
        queue_families: ResolvedQueueFamilies,
        config: &GpuConfig,
    ) -> Self {
        Self {
            surface,
            physical_device,
            queue_families,
            config: config.clone(),
            slot: Slot::Uninitialized,
            generation: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        match &self.slot {
            Slot::Uninitialized => LifecycleState::Uninitialized,
            Slot::Active(_) => LifecycleState::Active,
            Slot::Invalidated { reason, .. } => LifecycleState::Invalidated(*reason),
            Slot::Destroyed => LifecycleState::Destroyed,
        }
    }

    /// The active swapchain.
    ///
    /// `None` while invalidated: consumers must not keep using a chain that
    /// is about to be replaced.
    pub fn swapchain(&self) -> Option<&Swapchain> {
        match &self.slot {
            Slot::Active(chain) => Some(chain),
            _ => None,
        }
    }

    /// Bumped on every successful build. A consumer holding image handles
    /// from an older generation must re-fetch them.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Build the first swapchain.
    pub fn create<I, D>(
        &mut self,
        instance: &I,
        device: &D,
        framebuffer: vk::Extent2D,
    ) -> Result<Recreation>
    where
        I: InstanceDriver + ?Sized,
        D: DeviceDriver + ?Sized,
    {
        if !matches!(self.slot, Slot::Uninitialized) {
            return Err(GpuError::InvalidState(format!(
                "swapchain create called in state {:?}",
                self.state()
            )));
        }

        match self.build(instance, device, framebuffer, None)? {
            Some(chain) => {
                tracing::info!(
                    "Swapchain created: {}x{} ({} images, {:?}, {:?})",
                    chain.config.extent.width,
                    chain.config.extent.height,
                    chain.images.len(),
                    chain.config.format,
                    chain.config.present_mode,
                );
                self.slot = Slot::Active(chain);
                self.generation += 1;
                Ok(Recreation::Rebuilt)
            }
            None => {
                self.slot = Slot::Invalidated {
                    retired: None,
                    reason: InvalidationReason::Resized,
                };
                Ok(Recreation::Deferred)
            }
        }
    }

    /// Mark the active chain as stale. Returns whether the state changed.
    pub fn invalidate(&mut self, reason: InvalidationReason) -> bool {
        match std::mem::replace(&mut self.slot, Slot::Destroyed) {
            Slot::Active(chain) => {
                tracing::debug!("Swapchain invalidated: {reason:?}");
                self.slot = Slot::Invalidated {
                    retired: Some(chain),
                    reason,
                };
                true
            }
            other => {
                self.slot = other;
                false
            }
        }
    }

    /// Re-query the surface and replace the swapchain.
    ///
    /// On failure the manager stays invalidated and still owns the retired
    /// chain, which [`SwapchainManager::destroy`] will release.
    ///
    /// # Safety
    /// No in-flight work may reference the current chain or its images.
    pub unsafe fn recreate<I, D>(
        &mut self,
        instance: &I,
        device: &D,
        framebuffer: vk::Extent2D,
    ) -> Result<Recreation>
    where
        I: InstanceDriver + ?Sized,
        D: DeviceDriver + ?Sized,
    {
        match self.slot {
            Slot::Uninitialized => {
                return Err(GpuError::InvalidState(
                    "swapchain has not been created".to_string(),
                ))
            }
            Slot::Destroyed => {
                return Err(GpuError::InvalidState(
                    "swapchain has been destroyed".to_string(),
                ))
            }
            Slot::Active(_) => {
                self.invalidate(InvalidationReason::Resized);
            }
            Slot::Invalidated { .. } => {}
        }

        let retired = match &self.slot {
            Slot::Invalidated {
                retired: Some(chain),
                ..
            } => Some(chain.handle),
            _ => None,
        };

        let Some(chain) = self.build(instance, device, framebuffer, retired)? else {
            return Ok(Recreation::Deferred);
        };

        tracing::info!(
            "Swapchain recreated: {}x{} ({} images)",
            chain.config.extent.width,
            chain.config.extent.height,
            chain.images.len(),
        );

        if let Slot::Invalidated {
            retired: Some(old), ..
        } = std::mem::replace(&mut self.slot, Slot::Active(chain))
        {
            // SAFETY: caller guarantees the retired chain is no longer in use
            unsafe { device.destroy_swapchain(old.handle) };
        }
        self.generation += 1;

        Ok(Recreation::Rebuilt)
    }

    /// Acquire the next image of the active chain.
    ///
    /// Out-of-date and surface-lost results invalidate the chain and come
    /// back as the matching recoverable error; a suboptimal acquire
    /// invalidates it but still hands out the image.
    pub fn acquire_next_image<D: DeviceDriver + ?Sized>(
        &mut self,
        device: &D,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> Result<AcquiredImage> {
        let handle = match &self.slot {
            Slot::Active(chain) => chain.handle,
            Slot::Invalidated { .. } => return Err(GpuError::OutOfDate),
            _ => {
                return Err(GpuError::InvalidState(format!(
                    "acquire called in state {:?}",
                    self.state()
                )))
            }
        };

        match device.acquire_next_image(handle, timeout_ns, semaphore) {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    self.invalidate(InvalidationReason::Suboptimal);
                }
                Ok(AcquiredImage { index, suboptimal })
            }
            Err(e) => Err(self.presentation_failure(e)),
        }
    }

    /// Present an acquired image.
    ///
    /// Allowed on an invalidated chain so an image acquired as suboptimal can
    /// still be returned to the presentation engine.
    pub fn present<D: DeviceDriver + ?Sized>(
        &mut self,
        device: &D,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<()> {
        let handle = match &self.slot {
            Slot::Active(chain)
            | Slot::Invalidated {
                retired: Some(chain),
                ..
            } => chain.handle,
            _ => {
                return Err(GpuError::InvalidState(format!(
                    "present called in state {:?}",
                    self.state()
                )))
            }
        };

        match device.queue_present(queue, handle, image_index, wait_semaphores) {
            Ok(false) => Ok(()),
            Ok(true) => {
                self.invalidate(InvalidationReason::Suboptimal);
                Ok(())
            }
            Err(e) => Err(self.presentation_failure(e)),
        }
    }

    /// Destroy whatever chain is held and enter the terminal state.
    ///
    /// # Safety
    /// No in-flight work may reference the chain. Must run before the
    /// logical device or surface is destroyed.
    pub unsafe fn destroy<D: DeviceDriver + ?Sized>(&mut self, device: &D) {
        match std::mem::replace(&mut self.slot, Slot::Destroyed) {
            Slot::Active(chain)
            | Slot::Invalidated {
                retired: Some(chain),
                ..
            } => {
                // SAFETY: forwarded to the caller
                unsafe { device.destroy_swapchain(chain.handle) };
                tracing::debug!("Swapchain destroyed");
            }
            _ => {}
        }
    }

    fn presentation_failure(&mut self, result: vk::Result) -> GpuError {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => {
                self.invalidate(InvalidationReason::OutOfDate);
                GpuError::OutOfDate
            }
            vk::Result::ERROR_SURFACE_LOST_KHR => {
                self.invalidate(InvalidationReason::SurfaceLost);
                GpuError::SurfaceLost
            }
            other => GpuError::Vulkan(other),
        }
    }

    /// Negotiate against fresh capabilities and create a chain. `None` when
    /// the negotiated extent is zero-sized.
    fn build<I, D>(
        &self,
        instance: &I,
        device: &D,
        framebuffer: vk::Extent2D,
        retired: Option<vk::SwapchainKHR>,
    ) -> Result<Option<Swapchain>>
    where
        I: InstanceDriver + ?Sized,
        D: DeviceDriver + ?Sized,
    {
        let support = SurfaceSupport::query(instance, self.physical_device, self.surface)?;
        let config = SwapchainConfig::negotiate(&support, framebuffer, &self.config)?;

        if config.is_zero_sized() {
            tracing::debug!("Surface has zero extent, deferring swapchain build");
            return Ok(None);
        }

        let descriptor = SwapchainDescriptor {
            surface: self.surface,
            config,
            pre_transform: support.capabilities.current_transform,
            sharing: ImageSharing::for_families(self.queue_families),
            old_swapchain: retired.filter(|_| self.config.reuse_retired_swapchain),
        };

        let handle = device
            .create_swapchain(&descriptor)
            .map_err(GpuError::SwapchainCreation)?;

        let images = match device.swapchain_images(handle) {
            Ok(images) => images,
            Err(e) => {
                // SAFETY: the chain was created above and never handed out
                unsafe { device.destroy_swapchain(handle) };
                return Err(GpuError::SwapchainCreation(e));
            }
        };

        Ok(Some(Swapchain {
            handle,
            images,
            config,
        }))
    }
}
