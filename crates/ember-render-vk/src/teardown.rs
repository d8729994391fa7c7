// SPDX-License-Identifier: CEPL-1.0
use std::mem;

use ash::vk::{self, Handle};
use ember_abi::CapabilityTable;
use tracing::{info, warn};

use crate::frame;

/// Takes the handle out of `slot`, leaving null behind. `None` if it was null already.
fn take_live<H: Handle + Copy + Default>(slot: &mut H) -> Option<H> {
    let handle = mem::take(slot);
    (handle.as_raw() != 0).then_some(handle)
}

/// Destroys every framebuffer and view and empties the image list.
/// The device must be idle.
pub(crate) fn destroy_image_targets(table: &mut CapabilityTable) {
    let device = table.handles.device;
    let gpu = &mut *table.gpu;
    for image in table.images.iter_mut() {
        unsafe {
            if let Some(framebuffer) = take_live(&mut image.framebuffer) {
                gpu.destroy_framebuffer(device, framebuffer);
            }
            if let Some(view) = take_live(&mut image.view) {
                gpu.destroy_image_view(device, view);
            }
        }
    }
    table.images.clear();
}

/// Drops the format-dependent objects. Shader modules and the layout stay.
pub(crate) fn destroy_pipeline_and_render_pass(table: &mut CapabilityTable) {
    let device = table.handles.device;
    let gpu = &mut *table.gpu;
    let h = &mut table.handles;
    unsafe {
        if let Some(pipeline) = take_live(&mut h.pipeline) {
            gpu.destroy_pipeline(device, pipeline);
        }
        if let Some(render_pass) = take_live(&mut h.render_pass) {
            gpu.destroy_render_pass(device, render_pass);
        }
    }
}

/// Releases everything in reverse creation order, nulling each field.
/// Safe on a partially initialized table and idempotent.
pub(crate) fn destroy_all(table: &mut CapabilityTable) {
    let device = table.handles.device;
    if device != vk::Device::null() {
        // SAFETY: no other thread submits to this device.
        if let Err(result) = unsafe { table.gpu.device_wait_idle(device) } {
            warn!(%result, "device did not go idle before shutdown");
        }
        frame::destroy_frame_slots(table);

        let gpu = &mut *table.gpu;
        let h = &mut table.handles;
        unsafe {
            if let Some(pool) = take_live(&mut h.command_pool) {
                gpu.destroy_command_pool(device, pool);
            }
            if let Some(pipeline) = take_live(&mut h.pipeline) {
                gpu.destroy_pipeline(device, pipeline);
            }
            if let Some(layout) = take_live(&mut h.pipeline_layout) {
                gpu.destroy_pipeline_layout(device, layout);
            }
            if let Some(module) = take_live(&mut h.fragment_shader) {
                gpu.destroy_shader_module(device, module);
            }
            if let Some(module) = take_live(&mut h.vertex_shader) {
                gpu.destroy_shader_module(device, module);
            }
        }

        destroy_image_targets(table);

        let gpu = &mut *table.gpu;
        let h = &mut table.handles;
        unsafe {
            if let Some(render_pass) = take_live(&mut h.render_pass) {
                gpu.destroy_render_pass(device, render_pass);
            }
            if let Some(swapchain) = take_live(&mut h.swapchain) {
                gpu.destroy_swapchain(device, swapchain);
            }
            gpu.destroy_device(device);
        }
        h.device = vk::Device::null();
        h.queue = vk::Queue::null();
        h.physical_device = vk::PhysicalDevice::null();
        info!("device released");
    }

    let instance = table.handles.instance;
    let gpu = &mut *table.gpu;
    let h = &mut table.handles;
    if instance != vk::Instance::null() {
        unsafe {
            if let Some(surface) = take_live(&mut h.surface) {
                gpu.destroy_surface(instance, surface);
            }
            if let Some(messenger) = take_live(&mut h.debug_messenger) {
                gpu.destroy_debug_messenger(instance, messenger);
            }
            gpu.destroy_instance(instance);
        }
        h.instance = vk::Instance::null();
    }
    table.images.clear();
    table.frames.clear();
    table.frame_index = 0;
}
