//! Capability queries for physical devices.
//!
//! Answers the questions device selection asks about a candidate: which
//! queue families it offers, whether it advertises the required extensions,
//! and what a given surface supports on it.

use crate::driver::InstanceDriver;
use crate::error::Unsuitable;
use ash::prelude::VkResult;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CString;

/// Queue family indices discovered on a device.
///
/// Graphics and presentation are tracked independently; a single family may
/// serve both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both a graphics and a presentation family were found.
    pub const fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// The resolved pair, if complete.
    pub const fn resolve(&self) -> Option<ResolvedQueueFamilies> {
        match (self.graphics, self.present) {
            (Some(graphics), Some(present)) => Some(ResolvedQueueFamilies { graphics, present }),
            _ => None,
        }
    }
}

/// A complete pair of queue family indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedQueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl ResolvedQueueFamilies {
    /// Both roles live on the same family.
    pub const fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Find the first graphics-capable family and the first family that can
/// present to `surface`.
///
/// Families are scanned in index order and the scan stops once both roles
/// are filled.
pub fn find_queue_families<D: InstanceDriver + ?Sized>(
    driver: &D,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> VkResult<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in driver.queue_families(device).iter().enumerate() {
        let i = i as u32;

        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(i);
        }

        if indices.present.is_none() && driver.surface_support(device, i, surface)? {
            indices.present = Some(i);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// Required extension names the device does not advertise.
pub fn missing_extensions(required: &BTreeSet<CString>, available: &[CString]) -> Vec<String> {
    let available: BTreeSet<&CString> = available.iter().collect();
    required
        .iter()
        .filter(|name| !available.contains(name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Whether every required extension is advertised by the device.
pub fn extensions_supported<D: InstanceDriver + ?Sized>(
    driver: &D,
    device: vk::PhysicalDevice,
    required: &BTreeSet<CString>,
) -> VkResult<bool> {
    let available = driver.device_extensions(device)?;
    Ok(missing_extensions(required, &available).is_empty())
}

/// What a surface supports on a particular device.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Query capabilities, formats and present modes.
    pub fn query<D: InstanceDriver + ?Sized>(
        driver: &D,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Self> {
        Ok(Self {
            capabilities: driver.surface_capabilities(device, surface)?,
            formats: driver.surface_formats(device, surface)?,
            present_modes: driver.surface_present_modes(device, surface)?,
        })
    }

    /// At least one format and one present mode are available.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Outcome of assessing one candidate device.
#[derive(Debug, Clone)]
pub struct DeviceAssessment {
    pub queue_families: QueueFamilyIndices,
    pub reasons: Vec<Unsuitable>,
}

impl DeviceAssessment {
    /// The device passed every check.
    pub fn is_suitable(&self) -> bool {
        self.reasons.is_empty() && self.queue_families.is_complete()
    }
}

/// Run every suitability check against a device, collecting all failures.
pub fn assess_device<D: InstanceDriver + ?Sized>(
    driver: &D,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    required_extensions: &BTreeSet<CString>,
) -> DeviceAssessment {
    let mut reasons = Vec::new();

    let queue_families = match find_queue_families(driver, device, surface) {
        Ok(indices) => {
            if !indices.is_complete() {
                reasons.push(Unsuitable::IncompleteQueueFamilies {
                    graphics: indices.graphics.is_some(),
                    present: indices.present.is_some(),
                });
            }
            indices
        }
        Err(e) => {
            reasons.push(Unsuitable::QueryFailed(e));
            QueueFamilyIndices::default()
        }
    };

    match driver.device_extensions(device) {
        Ok(available) => {
            let missing = missing_extensions(required_extensions, &available);
            if !missing.is_empty() {
                reasons.push(Unsuitable::MissingExtensions(missing));
            }
        }
        Err(e) => reasons.push(Unsuitable::QueryFailed(e)),
    }

    match SurfaceSupport::query(driver, device, surface) {
        Ok(support) if support.is_adequate() => {}
        Ok(support) => {
            if support.formats.is_empty() {
                reasons.push(Unsuitable::NoSurfaceFormats);
            }
            if support.present_modes.is_empty() {
                reasons.push(Unsuitable::NoPresentModes);
            }
        }
        Err(e) => reasons.push(Unsuitable::QueryFailed(e)),
    }

    DeviceAssessment {
        queue_families,
        reasons,
    }
}
