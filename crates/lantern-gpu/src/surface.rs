//! Surface negotiation and window integration.
//!
//! Chooses the format, present mode, extent and image count a swapchain is
//! built with, and defines the three callbacks a windowing system has to
//! provide.

use crate::capabilities::SurfaceSupport;
use crate::config::{GpuConfig, SurfaceFormatPreference};
use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;

/// `current_extent` value meaning the surface size follows the swapchain.
pub const FLEXIBLE_EXTENT: u32 = u32::MAX;

/// Window-side collaborator of the negotiation.
pub trait WindowSurface {
    /// Instance extensions needed to present to this window.
    fn required_instance_extensions(&self) -> Result<Vec<&'static CStr>>;

    /// Create a presentation surface for this window.
    ///
    /// # Safety
    /// `instance` must have been created from `entry` with the extensions
    /// returned by [`WindowSurface::required_instance_extensions`], and must
    /// outlive the surface.
    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR>;

    /// Framebuffer size in physical pixels.
    fn framebuffer_size(&self) -> vk::Extent2D;
}

/// Instance extensions required by the display a window lives on.
pub fn required_extensions_for<W: HasDisplayHandle + ?Sized>(
    window: &W,
) -> Result<Vec<&'static CStr>> {
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;

    let names = ash_window::enumerate_required_extensions(display.as_raw())
        .map_err(|e| GpuError::SurfaceCreation(format!("Unsupported display: {e}")))?;

    // SAFETY: ash-window returns pointers to static, nul-terminated extension names
    Ok(names
        .iter()
        .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
        .collect())
}

/// Create a surface from raw window handles.
///
/// # Safety
/// The instance must be valid and outlive the surface.
pub unsafe fn create_surface_for<W: HasDisplayHandle + HasWindowHandle + ?Sized>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR> {
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
    let window_handle = window
        .window_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

    // SAFETY: caller guarantees the instance is valid
    unsafe {
        ash_window::create_surface(
            entry,
            instance,
            display.as_raw(),
            window_handle.as_raw(),
            None,
        )
    }
    .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
}

/// Negotiated swapchain parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

impl SwapchainConfig {
    /// Negotiate a configuration from what the surface supports.
    pub fn negotiate(
        support: &SurfaceSupport,
        framebuffer: vk::Extent2D,
        config: &GpuConfig,
    ) -> Result<Self> {
        let surface_format = select_surface_format(&support.formats, config.preferred_format)
            .ok_or_else(|| GpuError::InvalidState("surface reports no formats".to_string()))?;
        if support.present_modes.is_empty() {
            return Err(GpuError::InvalidState(
                "surface reports no present modes".to_string(),
            ));
        }

        Ok(Self {
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode: select_present_mode(
                &support.present_modes,
                config.preferred_present_mode,
            ),
            extent: calculate_extent(&support.capabilities, framebuffer),
            image_count: select_image_count(&support.capabilities),
        })
    }

    /// The extent has a zero dimension (e.g. a minimized window).
    pub const fn is_zero_sized(&self) -> bool {
        self.extent.width == 0 || self.extent.height == 0
    }
}

/// Select the surface format.
///
/// The preferred pair wins when offered; otherwise the first candidate.
/// `None` only for an empty candidate list.
pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: SurfaceFormatPreference,
) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .copied()
        .find(|format| preferred.matches(format))
        .or_else(|| available.first().copied())
}

/// Select the present mode, falling back to FIFO (always supported).
pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
///
/// A fixed `current_extent` is used as-is. A flexible one takes the
/// framebuffer size clamped per axis into the supported range. If a driver
/// reports a minimum above the maximum, the maximum wins.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != FLEXIBLE_EXTENT {
        capabilities.current_extent
    } else {
        let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
        vk::Extent2D {
            width: framebuffer.width.max(min.width).min(max.width),
            height: framebuffer.height.max(min.height).min(max.height),
        }
    }
}

/// One image more than the minimum, capped by the maximum (0 = unbounded).
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}
