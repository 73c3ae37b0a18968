//! GPU error types.

use ash::vk;
use std::fmt;
use thiserror::Error;

/// A single reason a physical device failed the suitability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsuitable {
    /// No graphics family, no presentation family, or neither.
    IncompleteQueueFamilies { graphics: bool, present: bool },
    /// Required device extensions the device does not advertise.
    MissingExtensions(Vec<String>),
    /// The surface reports no formats for this device.
    NoSurfaceFormats,
    /// The surface reports no present modes for this device.
    NoPresentModes,
    /// A capability query itself failed.
    QueryFailed(vk::Result),
}

impl fmt::Display for Unsuitable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteQueueFamilies { graphics, present } => {
                let missing = match (graphics, present) {
                    (false, false) => "graphics and present",
                    (false, true) => "graphics",
                    _ => "present",
                };
                write!(f, "no {missing} queue family")
            }
            Self::MissingExtensions(names) => {
                write!(f, "missing extensions [{}]", names.join(", "))
            }
            Self::NoSurfaceFormats => f.write_str("no surface formats"),
            Self::NoPresentModes => f.write_str("no present modes"),
            Self::QueryFailed(e) => write!(f, "capability query failed ({e})"),
        }
    }
}

/// A physical device that was assessed and rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRejection {
    pub device_name: String,
    pub reasons: Vec<Unsuitable>,
}

impl fmt::Display for DeviceRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.device_name)?;
        for (i, reason) in self.reasons.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{reason}")?;
        }
        Ok(())
    }
}

fn summarize(rejections: &[DeviceRejection]) -> String {
    if rejections.is_empty() {
        return "no candidates".to_string();
    }
    rejections
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// The Vulkan loader could not be loaded.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Instance creation was rejected by the driver.
    #[error("Instance creation failed: {0}")]
    InstanceCreation(vk::Result),

    /// Validation was requested but the layer is not installed.
    #[error("Validation layer {0} requested, but not available")]
    ValidationLayerUnavailable(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Enumeration returned no physical devices at all.
    #[error("No GPUs with Vulkan support found")]
    NoDevicesFound,

    /// Devices exist but none passed the suitability check.
    #[error("No suitable GPU found ({})", summarize(.0))]
    NoSuitableDevice(Vec<DeviceRejection>),

    /// Logical device creation was rejected by the driver.
    #[error("Logical device creation failed: {0}")]
    DeviceCreation(vk::Result),

    /// Swapchain creation was rejected by the driver.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(vk::Result),

    /// The swapchain no longer matches the surface and must be recreated.
    #[error("Swapchain is out of date")]
    OutOfDate,

    /// The presentation surface was lost.
    #[error("Presentation surface lost")]
    SurfaceLost,

    /// Operation not valid in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

impl GpuError {
    /// Whether the error is resolved by recreating the swapchain rather than
    /// tearing the application down.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::OutOfDate | Self::SurfaceLost)
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
