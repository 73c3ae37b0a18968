//! Physical device selection.

use crate::capabilities::{assess_device, ResolvedQueueFamilies};
use crate::driver::InstanceDriver;
use crate::error::{DeviceRejection, GpuError, Result};
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CString;

/// The physical device chosen for rendering.
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub name: String,
    pub queue_families: ResolvedQueueFamilies,
}

/// Pick the first suitable device in enumeration order.
///
/// There is no ranking: when several devices qualify the earliest one wins,
/// and enumeration order is whatever the driver reports.
pub fn pick_device<D: InstanceDriver + ?Sized>(
    driver: &D,
    candidates: &[vk::PhysicalDevice],
    surface: vk::SurfaceKHR,
    required_extensions: &BTreeSet<CString>,
) -> Result<SelectedDevice> {
    let mut rejections = Vec::new();

    for &device in candidates {
        let name = driver.device_name(device);
        let assessment = assess_device(driver, device, surface, required_extensions);

        if assessment.is_suitable() {
            if let Some(queue_families) = assessment.queue_families.resolve() {
                tracing::debug!("{name} is suitable ({queue_families:?})");
                return Ok(SelectedDevice {
                    physical_device: device,
                    name,
                    queue_families,
                });
            }
        }

        let rejection = DeviceRejection {
            device_name: name,
            reasons: assessment.reasons,
        };
        tracing::warn!("Rejected {rejection}");
        rejections.push(rejection);
    }

    Err(GpuError::NoSuitableDevice(rejections))
}

/// Enumerate physical devices and pick one for `surface`.
pub fn select_physical_device<D: InstanceDriver + ?Sized>(
    driver: &D,
    surface: vk::SurfaceKHR,
    required_extensions: &BTreeSet<CString>,
) -> Result<SelectedDevice> {
    let devices = driver.enumerate_physical_devices()?;

    if devices.is_empty() {
        return Err(GpuError::NoDevicesFound);
    }

    tracing::debug!("Found {} physical device(s)", devices.len());
    pick_device(driver, &devices, surface, required_extensions)
}
