//! Startup configuration for device and swapchain negotiation.

use ash::vk;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};

/// Standard validation layer.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Surface format/color space pair preferred when the surface offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormatPreference {
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
}

impl Default for SurfaceFormatPreference {
    fn default() -> Self {
        Self {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }
}

impl SurfaceFormatPreference {
    /// Whether a surface format matches this preference exactly.
    pub fn matches(&self, format: &vk::SurfaceFormatKHR) -> bool {
        format.format == self.format && format.color_space == self.color_space
    }
}

/// GPU configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    /// Application name reported to the driver.
    pub app_name: String,
    /// Device extensions every candidate must advertise.
    pub required_extensions: BTreeSet<CString>,
    /// Preferred surface format.
    pub preferred_format: SurfaceFormatPreference,
    /// Preferred present mode; FIFO is used when it is unavailable.
    pub preferred_present_mode: vk::PresentModeKHR,
    /// Enable the Khronos validation layer and debug messenger.
    pub enable_validation: bool,
    /// Pass the retired swapchain as `old_swapchain` when recreating.
    pub reuse_retired_swapchain: bool,
}

impl Default for GpuConfig {
    fn default() -> Self {
        let mut required_extensions = BTreeSet::new();
        required_extensions.insert(ash::khr::swapchain::NAME.to_owned());

        Self {
            app_name: "Lantern".to_string(),
            required_extensions,
            preferred_format: SurfaceFormatPreference::default(),
            preferred_present_mode: vk::PresentModeKHR::MAILBOX,
            enable_validation: cfg!(debug_assertions),
            reuse_retired_swapchain: true,
        }
    }
}

impl GpuConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Require an additional device extension.
    pub fn with_required_extension(mut self, name: &CStr) -> Self {
        self.required_extensions.insert(name.to_owned());
        self
    }

    /// Set the preferred surface format.
    pub fn with_preferred_format(mut self, format: vk::Format, color_space: vk::ColorSpaceKHR) -> Self {
        self.preferred_format = SurfaceFormatPreference {
            format,
            color_space,
        };
        self
    }

    /// Set the preferred present mode.
    pub fn with_present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.preferred_present_mode = mode;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Choose whether recreation hands the retired chain to the driver.
    pub fn with_retired_swapchain_reuse(mut self, reuse: bool) -> Self {
        self.reuse_retired_swapchain = reuse;
        self
    }

    /// Layers enabled on the instance and device.
    pub fn layers(&self) -> Vec<CString> {
        if self.enable_validation {
            vec![VALIDATION_LAYER.to_owned()]
        } else {
            Vec::new()
        }
    }
}
