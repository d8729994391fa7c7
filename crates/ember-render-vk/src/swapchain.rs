// SPDX-License-Identifier: CEPL-1.0
//! Swapchain negotiation, creation and recreation.

use ash::vk;
use ember_abi::{
    BoundedVec, CapabilityTable, Capacity, InitError, SwapchainImage, VkCall, MAX_PRESENT_MODES,
    MAX_SURFACE_FORMATS, MAX_SWAPCHAIN_IMAGES,
};
use tracing::info;

use crate::{frame, target, teardown};

/// Used when the driver leaves the format up to us.
pub(crate) const FALLBACK_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub(crate) fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, InitError> {
    if formats.is_empty() {
        return Err(InitError::NoSurfaceFormat);
    }
    let fallback = formats
        .iter()
        .copied()
        .find(|f| f.format == FALLBACK_FORMAT.format && f.color_space == FALLBACK_FORMAT.color_space);
    // A lone UNDEFINED entry means any format is accepted.
    let first_defined = || formats.iter().copied().find(|f| f.format != vk::Format::UNDEFINED);
    Ok(fallback.or_else(first_defined).unwrap_or(FALLBACK_FORMAT))
}

/// Mailbox with three images when offered, otherwise FIFO with two.
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> (vk::PresentModeKHR, u32) {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        (vk::PresentModeKHR::MAILBOX, 3)
    } else {
        (vk::PresentModeKHR::FIFO, 2)
    }
}

pub(crate) fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// Fits the requested image count into the surface's bounds (max 0 = unbounded).
pub(crate) fn clamp_image_count(requested: u32, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = requested.max(caps.min_image_count);
    if caps.max_image_count == 0 {
        count
    } else {
        count.min(caps.max_image_count)
    }
}

/// First swapchain, sized from the host's default extent.
pub(crate) fn create_swapchain(table: &mut CapabilityTable) -> Result<(), InitError> {
    let want = table.app_info.default_extent;
    build_swapchain(table, want, vk::SwapchainKHR::null())
}

/// Queries the surface, creates a swapchain and records it with its images.
///
/// On failure nothing is recorded and the new swapchain, if any, is destroyed.
/// `old` is only handed to the driver; the caller retires it.
fn build_swapchain(
    table: &mut CapabilityTable,
    want: vk::Extent2D,
    old: vk::SwapchainKHR,
) -> Result<(), InitError> {
    let h = table.handles;
    let gpu = &mut *table.gpu;

    // SAFETY: physical device and surface were recorded by earlier stages.
    let formats = unsafe { gpu.surface_formats(h.physical_device, h.surface) }
        .map_err(|r| InitError::vk(VkCall::GetSurfaceFormats, r))?;
    let formats: BoundedVec<_, MAX_SURFACE_FORMATS> = BoundedVec::try_from_iter(formats)
        .map_err(|e| InitError::capacity(Capacity::SurfaceFormats, e))?;
    let modes = unsafe { gpu.surface_present_modes(h.physical_device, h.surface) }
        .map_err(|r| InitError::vk(VkCall::GetSurfacePresentModes, r))?;
    let modes: BoundedVec<_, MAX_PRESENT_MODES> = BoundedVec::try_from_iter(modes)
        .map_err(|e| InitError::capacity(Capacity::PresentModes, e))?;
    let caps = unsafe { gpu.surface_capabilities(h.physical_device, h.surface) }
        .map_err(|r| InitError::vk(VkCall::GetSurfaceCapabilities, r))?;

    let format = choose_surface_format(&formats)?;
    let (present_mode, wanted_images) = choose_present_mode(&modes);
    let extent = choose_extent(&caps, want);
    let min_image_count = clamp_image_count(wanted_images, &caps);
    let pre_transform = if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    };

    let create_info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        surface: h.surface,
        min_image_count,
        image_format: format.format,
        image_color_space: format.color_space,
        image_extent: extent,
        image_array_layers: 1,
        image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
        image_sharing_mode: vk::SharingMode::EXCLUSIVE,
        pre_transform,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode,
        clipped: vk::TRUE,
        old_swapchain: old,
        ..Default::default()
    };
    let swapchain = unsafe { gpu.create_swapchain(h.device, &create_info) }
        .map_err(|r| InitError::vk(VkCall::CreateSwapchain, r))?;

    let images = unsafe { gpu.swapchain_images(h.device, swapchain) }
        .map_err(|r| InitError::vk(VkCall::GetSwapchainImages, r))
        .and_then(usable_images);
    let images = match images {
        Ok(images) => images,
        Err(err) => {
            unsafe { gpu.destroy_swapchain(h.device, swapchain) };
            return Err(err);
        }
    };

    info!(
        format = ?format.format,
        color_space = ?format.color_space,
        present_mode = ?present_mode,
        width = extent.width,
        height = extent.height,
        requested_images = min_image_count,
        images = images.len(),
        "swapchain created"
    );
    table.handles.swapchain = swapchain;
    table.config.format = format;
    table.config.present_mode = present_mode;
    table.config.extent = extent;
    table.config.image_count = images.len() as u32;
    table.images = images;
    Ok(())
}

/// Refuses counts at or above the table's capacity instead of truncating.
fn usable_images(
    images: Vec<vk::Image>,
) -> Result<BoundedVec<SwapchainImage, MAX_SWAPCHAIN_IMAGES>, InitError> {
    if images.len() >= MAX_SWAPCHAIN_IMAGES {
        return Err(InitError::CapacityExceeded {
            what: Capacity::SwapchainImages,
            capacity: MAX_SWAPCHAIN_IMAGES - 1,
            found: images.len(),
        });
    }
    BoundedVec::try_from_iter(images.into_iter().map(|image| SwapchainImage {
        image,
        ..Default::default()
    }))
    .map_err(|e| InitError::capacity(Capacity::SwapchainImages, e))
}

/// Replaces the swapchain for a new window extent.
///
/// Render pass and pipeline are rebuilt only if the surface format changed,
/// frame slots only if the image count changed. On failure the old swapchain
/// is still retired and the table holds no swapchain until the next attempt.
pub(crate) fn recreate_swapchain(
    table: &mut CapabilityTable,
    want: vk::Extent2D,
) -> Result<(), InitError> {
    let device = table.handles.device;
    // The pool outlives every recreation, failed or not, once init has completed.
    if device == vk::Device::null() || table.handles.command_pool == vk::CommandPool::null() {
        return Err(InitError::NotInitialized);
    }
    // SAFETY: `device` is live; nothing below runs while the GPU still uses the old images.
    unsafe { table.gpu.device_wait_idle(device) }
        .map_err(|r| InitError::vk(VkCall::DeviceWaitIdle, r))?;

    let old = table.handles.swapchain;
    let old_format = table.config.format;
    let old_count = table.frames.len();
    teardown::destroy_image_targets(table);

    let built = build_swapchain(table, want, old);
    if old != vk::SwapchainKHR::null() {
        unsafe { table.gpu.destroy_swapchain(device, old) };
    }
    if let Err(err) = built {
        table.handles.swapchain = vk::SwapchainKHR::null();
        return Err(err);
    }

    let format = table.config.format;
    let format_changed =
        format.format != old_format.format || format.color_space != old_format.color_space;
    // Either may be missing after an earlier attempt failed halfway.
    let incomplete = table.handles.render_pass == vk::RenderPass::null()
        || table.handles.pipeline == vk::Pipeline::null();
    if format_changed || incomplete {
        info!(old = ?old_format.format, new = ?format.format, "rebuilding render pass and pipeline");
        teardown::destroy_pipeline_and_render_pass(table);
        target::create_render_pass(table)?;
        target::create_pipeline(table)?;
    }
    target::create_framebuffers(table)?;
    if table.images.len() != old_count {
        frame::destroy_frame_slots(table);
        frame::create_frame_slots(table)?;
    }
    table.frame_index = 0;
    Ok(())
}
