//! Device and presentation negotiation for the Lantern renderer.
//!
//! This crate provides:
//! - Vulkan instance creation with optional validation
//! - Capability queries and physical device selection
//! - Logical device and queue creation
//! - Surface format, present mode and extent negotiation
//! - Swapchain lifecycle management across resizes

pub mod capabilities;
pub mod config;
pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod instance;
pub mod selection;
pub mod surface;
pub mod swapchain;
pub mod vulkan;

#[cfg(test)]
mod fake;

pub use ash;
pub use capabilities::{QueueFamilyIndices, ResolvedQueueFamilies, SurfaceSupport};
pub use config::{GpuConfig, SurfaceFormatPreference};
pub use context::{GpuContext, GpuContextBuilder};
pub use driver::{DeviceDriver, InstanceDriver};
pub use error::{DeviceRejection, GpuError, Result, Unsuitable};
pub use selection::SelectedDevice;
pub use surface::{SwapchainConfig, WindowSurface};
pub use swapchain::{
    AcquiredImage, InvalidationReason, LifecycleState, Recreation, Swapchain, SwapchainManager,
};
