//! Logical device creation.

use crate::capabilities::ResolvedQueueFamilies;
use crate::driver::{DeviceCreateRequest, DeviceDriver, InstanceDriver, QueueRequest};
use crate::error::{GpuError, Result};
use crate::selection::SelectedDevice;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CString;

/// Priority given to every requested queue.
pub const QUEUE_PRIORITY: f32 = 1.0;

/// A logical device and the queues retrieved from it.
///
/// Queue handles belong to the device and need no destruction of their own.
pub struct LogicalDevice<D> {
    device: D,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: ResolvedQueueFamilies,
}

impl<D: DeviceDriver> LogicalDevice<D> {
    /// The device driver.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the presentation queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Queue families the device was created with.
    pub fn queue_families(&self) -> ResolvedQueueFamilies {
        self.queue_families
    }

    /// Destroy the logical device.
    ///
    /// # Safety
    /// Every child object must already be destroyed and the device idle.
    pub unsafe fn destroy(&self) {
        // SAFETY: forwarded to the caller
        unsafe { self.device.destroy() };
    }
}

/// One queue request per distinct family.
pub fn queue_requests(families: ResolvedQueueFamilies) -> Vec<QueueRequest> {
    families
        .unique()
        .into_iter()
        .map(|family_index| QueueRequest {
            family_index,
            priorities: vec![QUEUE_PRIORITY],
        })
        .collect()
}

/// Assemble the device creation request.
pub fn device_request(
    families: ResolvedQueueFamilies,
    required_extensions: &BTreeSet<CString>,
    layers: &[CString],
) -> DeviceCreateRequest {
    DeviceCreateRequest {
        queues: queue_requests(families),
        extensions: required_extensions.iter().cloned().collect(),
        layers: layers.to_vec(),
    }
}

/// Create the logical device for a selected physical device and fetch its
/// graphics and presentation queues.
pub fn build_device<I: InstanceDriver + ?Sized>(
    driver: &I,
    selected: &SelectedDevice,
    required_extensions: &BTreeSet<CString>,
    layers: &[CString],
) -> Result<LogicalDevice<I::Device>> {
    let families = selected.queue_families;
    let request = device_request(families, required_extensions, layers);

    let device = driver
        .create_device(selected.physical_device, &request)
        .map_err(GpuError::DeviceCreation)?;

    let graphics_queue = device.queue(families.graphics, 0);
    let present_queue = device.queue(families.present, 0);

    tracing::info!(
        "Logical device created on {} ({} queue famil{})",
        selected.name,
        request.queues.len(),
        if request.queues.len() == 1 { "y" } else { "ies" }
    );

    Ok(LogicalDevice {
        device,
        graphics_queue,
        present_queue,
        queue_families: families,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeGpu, FakePhysicalDevice};

    fn selected(gpu: &FakeGpu, graphics: u32, present: u32) -> SelectedDevice {
        SelectedDevice {
            physical_device: gpu.handle(0),
            name: "gpu".to_string(),
            queue_families: ResolvedQueueFamilies { graphics, present },
        }
    }

    fn required() -> BTreeSet<CString> {
        let mut set = BTreeSet::new();
        set.insert(ash::khr::swapchain::NAME.to_owned());
        set
    }

    #[test]
    fn shared_family_requests_one_queue() {
        let requests = queue_requests(ResolvedQueueFamilies {
            graphics: 2,
            present: 2,
        });
        assert_eq!(
            requests,
            vec![QueueRequest {
                family_index: 2,
                priorities: vec![1.0]
            }]
        );
    }

    #[test]
    fn split_families_request_two_queues() {
        let requests = queue_requests(ResolvedQueueFamilies {
            graphics: 0,
            present: 1,
        });
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].family_index, 0);
        assert_eq!(requests[1].family_index, 1);
        assert!(requests
            .iter()
            .all(|r| r.priorities == vec![QUEUE_PRIORITY]));
    }

    #[test]
    fn build_issues_deduplicated_request() {
        let gpu = FakeGpu::new(vec![FakePhysicalDevice::new("gpu")]);
        let device = build_device(&gpu, &selected(&gpu, 0, 0), &required(), &[]).unwrap();

        let requests = gpu.device_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].queues.len(), 1);
        assert_eq!(
            requests[0].extensions,
            vec![ash::khr::swapchain::NAME.to_owned()]
        );
        assert!(requests[0].layers.is_empty());
        assert_eq!(device.graphics_queue(), device.present_queue());
    }

    #[test]
    fn build_fetches_queue_per_role() {
        let gpu = FakeGpu::new(vec![FakePhysicalDevice::new("gpu")]);
        let layers = vec![crate::config::VALIDATION_LAYER.to_owned()];
        let device = build_device(&gpu, &selected(&gpu, 0, 1), &required(), &layers).unwrap();

        let requests = gpu.device_requests();
        assert_eq!(requests[0].queues.len(), 2);
        assert_eq!(requests[0].layers, layers);
        assert_ne!(device.graphics_queue(), device.present_queue());
        assert_eq!(device.queue_families().present, 1);
    }

    #[test]
    fn driver_rejection_is_device_creation_error() {
        let gpu = FakeGpu::new(vec![FakePhysicalDevice::new("gpu")]);
        gpu.fail_device_creation(vk::Result::ERROR_TOO_MANY_OBJECTS);

        let result = build_device(&gpu, &selected(&gpu, 0, 0), &required(), &[]);
        assert!(matches!(
            result,
            Err(GpuError::DeviceCreation(vk::Result::ERROR_TOO_MANY_OBJECTS))
        ));
    }
}
