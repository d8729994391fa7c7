// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use ember_abi::{
    BoundedVec, CapabilityTable, Capacity, GpuApi, InitError, VkCall, MAX_PHYSICAL_DEVICES,
    MAX_QUEUE_FAMILIES,
};
use tracing::{debug, info};

/// Picks a device and queue family, then creates the logical device.
///
/// Selection is first match: the first family, on the first device, that has
/// the graphics bit and can present to the surface. Nothing is recorded
/// unless the logical device is created.
pub(crate) fn acquire_device(table: &mut CapabilityTable) -> Result<(), InitError> {
    let instance = table.handles.instance;
    let surface = table.handles.surface;
    let gpu = &mut *table.gpu;

    // SAFETY: instance and surface were recorded by the previous stages.
    let (physical_device, family) = unsafe { select_queue_family(gpu, instance, surface) }?;

    let priorities = [1.0f32];
    let queue_info = vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };
    let extensions = [ash::khr::swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();
    let create_info = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: 1,
        p_queue_create_infos: &queue_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };

    // SAFETY: `physical_device` came from this instance's enumeration.
    let device = unsafe { gpu.create_device(physical_device, &create_info) }
        .map_err(|r| InitError::vk(VkCall::CreateDevice, r))?;
    let queue = unsafe { gpu.get_device_queue(device, family, 0) };

    table.handles.physical_device = physical_device;
    table.handles.device = device;
    table.handles.queue = queue;
    table.config.queue_family_index = family;
    info!(queue_family = family, "logical device created");
    Ok(())
}

unsafe fn select_queue_family(
    gpu: &mut dyn GpuApi,
    instance: vk::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32), InitError> {
    let devices = unsafe { gpu.enumerate_physical_devices(instance) }
        .map_err(|r| InitError::vk(VkCall::EnumeratePhysicalDevices, r))?;
    let devices: BoundedVec<_, MAX_PHYSICAL_DEVICES> = BoundedVec::try_from_iter(devices)
        .map_err(|e| InitError::capacity(Capacity::PhysicalDevices, e))?;

    for &physical_device in &devices {
        let families = unsafe { gpu.queue_family_properties(physical_device) };
        let families: BoundedVec<_, MAX_QUEUE_FAMILIES> = BoundedVec::try_from_iter(families)
            .map_err(|e| InitError::capacity(Capacity::QueueFamilies, e))?;

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_count == 0 || !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                continue;
            }
            match unsafe { gpu.surface_support(physical_device, index, surface) } {
                Ok(true) => return Ok((physical_device, index)),
                Ok(false) => {}
                Err(result) => debug!(%result, index, "surface support query failed"),
            }
        }
    }
    Err(InitError::NoSuitableDevice)
}
