// SPDX-License-Identifier: CEPL-1.0
//! Frame slots and the per-frame acquire/record/submit/present cycle.

use ash::vk;
use ember_abi::{
    BoundedVec, CapabilityTable, Capacity, FrameError, FrameSlot, FrameStatus, GpuApi, GpuHandles,
    InitError, VkCall, MAX_SWAPCHAIN_IMAGES,
};
use tracing::{debug, trace, warn};

/// Creates the command pool (once) and one slot per swapchain image.
///
/// Fences start signaled so the first wait on each slot returns at once. On
/// failure every object this call created is destroyed and nothing is recorded.
pub(crate) fn create_frame_slots(table: &mut CapabilityTable) -> Result<(), InitError> {
    let device = table.handles.device;
    let count = table.images.len();
    if count > MAX_SWAPCHAIN_IMAGES {
        return Err(InitError::CapacityExceeded {
            what: Capacity::SwapchainImages,
            capacity: MAX_SWAPCHAIN_IMAGES,
            found: count,
        });
    }
    let gpu = &mut *table.gpu;

    let created_pool = table.handles.command_pool == vk::CommandPool::null();
    let pool = if created_pool {
        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: table.config.queue_family_index,
            ..Default::default()
        };
        unsafe { gpu.create_command_pool(device, &pool_info) }
            .map_err(|r| InitError::vk(VkCall::CreateCommandPool, r))?
    } else {
        table.handles.command_pool
    };

    // SAFETY: `pool` belongs to `device`.
    match unsafe { create_slots(gpu, device, pool, count) } {
        Ok(slots) => {
            table.handles.command_pool = pool;
            table.frames = slots;
            table.frame_index = 0;
            debug!(frames_in_flight = count, "frame slots created");
            Ok(())
        }
        Err(err) => {
            if created_pool {
                unsafe { gpu.destroy_command_pool(device, pool) };
            }
            Err(err)
        }
    }
}

unsafe fn create_slots(
    gpu: &mut dyn GpuApi,
    device: vk::Device,
    pool: vk::CommandPool,
    count: usize,
) -> Result<BoundedVec<FrameSlot, MAX_SWAPCHAIN_IMAGES>, InitError> {
    let alloc_info = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: count as u32,
        ..Default::default()
    };
    let buffers = unsafe { gpu.allocate_command_buffers(device, &alloc_info) }
        .map_err(|r| InitError::vk(VkCall::AllocateCommandBuffers, r))?;

    let mut slots = Vec::with_capacity(buffers.len());
    for &command_buffer in &buffers {
        match unsafe { create_slot(gpu, device, command_buffer) } {
            Ok(slot) => slots.push(slot),
            Err(err) => {
                unsafe {
                    for slot in &slots {
                        destroy_sync(gpu, device, slot);
                    }
                    gpu.free_command_buffers(device, pool, &buffers);
                }
                return Err(err);
            }
        }
    }
    BoundedVec::try_from_iter(slots).map_err(|e| InitError::capacity(Capacity::SwapchainImages, e))
}

unsafe fn create_slot(
    gpu: &mut dyn GpuApi,
    device: vk::Device,
    command_buffer: vk::CommandBuffer,
) -> Result<FrameSlot, InitError> {
    let semaphore_err = |r| InitError::vk(VkCall::CreateSemaphore, r);
    let image_available = unsafe { gpu.create_semaphore(device) }.map_err(semaphore_err)?;
    let render_finished = match unsafe { gpu.create_semaphore(device) } {
        Ok(s) => s,
        Err(r) => {
            unsafe { gpu.destroy_semaphore(device, image_available) };
            return Err(semaphore_err(r));
        }
    };
    let in_flight = match unsafe { gpu.create_fence(device, true) } {
        Ok(f) => f,
        Err(r) => {
            unsafe {
                gpu.destroy_semaphore(device, render_finished);
                gpu.destroy_semaphore(device, image_available);
            }
            return Err(InitError::vk(VkCall::CreateFence, r));
        }
    };
    Ok(FrameSlot {
        command_buffer,
        image_available,
        render_finished,
        in_flight,
    })
}

unsafe fn destroy_sync(gpu: &mut dyn GpuApi, device: vk::Device, slot: &FrameSlot) {
    unsafe {
        gpu.destroy_fence(device, slot.in_flight);
        gpu.destroy_semaphore(device, slot.render_finished);
        gpu.destroy_semaphore(device, slot.image_available);
    }
}

/// Frees every slot's command buffer and sync objects. The pool is kept.
/// The device must be idle.
pub(crate) fn destroy_frame_slots(table: &mut CapabilityTable) {
    if table.frames.is_empty() {
        return;
    }
    let device = table.handles.device;
    let gpu = &mut *table.gpu;
    let buffers: Vec<vk::CommandBuffer> = table.frames.iter().map(|s| s.command_buffer).collect();
    unsafe {
        for slot in &table.frames {
            destroy_sync(gpu, device, slot);
        }
        gpu.free_command_buffers(device, table.handles.command_pool, &buffers);
    }
    table.frames.clear();
    table.frame_index = 0;
}

/// One full frame on slot `frame_index`.
///
/// The slot fence is reset only right before the real submission, so an
/// out-of-date acquire leaves it signaled for the next attempt. A failed
/// record or submit re-arms the slot through [`rearm_slot`].
pub(crate) fn draw_frame(table: &mut CapabilityTable) -> Result<FrameStatus, FrameError> {
    if !table.is_ready() || table.handles.swapchain == vk::SwapchainKHR::null() {
        return Err(FrameError::NotInitialized);
    }
    let frame_count = table.frames.len() as u32;
    let slot = table.frames[(table.frame_index % frame_count) as usize];
    let h = table.handles;
    let extent = table.config.extent;
    let clear_color = table.app_info.clear_color;
    let gpu = &mut *table.gpu;

    // SAFETY (whole function): every handle comes from a completed init and
    // the slot's previous submission is fenced before its objects are reused.
    unsafe { gpu.wait_for_fences(h.device, &[slot.in_flight], true, u64::MAX) }
        .map_err(|r| FrameError::vk(VkCall::WaitForFences, r))?;

    let acquired = unsafe {
        gpu.acquire_next_image(
            h.device,
            h.swapchain,
            u64::MAX,
            slot.image_available,
            vk::Fence::null(),
        )
    };
    let (image_index, acquired_suboptimal) = match acquired {
        Ok(pair) => pair,
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Err(FrameError::SwapchainOutOfDate),
        Err(r) => return Err(FrameError::vk(VkCall::AcquireNextImage, r)),
    };
    let framebuffer = table
        .images
        .get(image_index as usize)
        .map(|image| image.framebuffer)
        .ok_or(FrameError::ImageIndexOutOfRange {
            index: image_index,
            count: table.images.len(),
        })?;

    let recorded =
        unsafe { record_commands(gpu, &h, slot.command_buffer, framebuffer, extent, clear_color) };
    if let Err(err) = recorded {
        unsafe { rearm_slot(gpu, &h, &slot) };
        return Err(err);
    }

    let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
    let submit = vk::SubmitInfo {
        s_type: vk::StructureType::SUBMIT_INFO,
        wait_semaphore_count: 1,
        p_wait_semaphores: &slot.image_available,
        p_wait_dst_stage_mask: wait_stages.as_ptr(),
        command_buffer_count: 1,
        p_command_buffers: &slot.command_buffer,
        signal_semaphore_count: 1,
        p_signal_semaphores: &slot.render_finished,
        ..Default::default()
    };
    unsafe { gpu.reset_fences(h.device, &[slot.in_flight]) }
        .map_err(|r| FrameError::vk(VkCall::ResetFences, r))?;
    if let Err(r) =
        unsafe { gpu.queue_submit(h.queue, std::slice::from_ref(&submit), slot.in_flight) }
    {
        unsafe { rearm_slot(gpu, &h, &slot) };
        return Err(FrameError::vk(VkCall::QueueSubmit, r));
    }

    let present = vk::PresentInfoKHR {
        s_type: vk::StructureType::PRESENT_INFO_KHR,
        wait_semaphore_count: 1,
        p_wait_semaphores: &slot.render_finished,
        swapchain_count: 1,
        p_swapchains: &h.swapchain,
        p_image_indices: &image_index,
        ..Default::default()
    };
    let presented = unsafe { gpu.queue_present(h.queue, &present) };

    // The submission went through, so this cycle counts either way.
    table.frame_index = (table.frame_index + 1) % frame_count;
    trace!(slot = ?slot.in_flight, image_index, "frame submitted");
    match presented {
        Ok(suboptimal) => {
            table.frames_presented += 1;
            if suboptimal || acquired_suboptimal {
                Ok(FrameStatus::Suboptimal { image_index })
            } else {
                Ok(FrameStatus::Presented { image_index })
            }
        }
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(FrameError::SwapchainOutOfDate),
        Err(r) => Err(FrameError::vk(VkCall::QueuePresent, r)),
    }
}

/// Consumes `image_available` and signals the slot fence with an empty batch,
/// so the next wait on this slot returns once the queue drains. Used after
/// the frame's own command buffer could not be recorded or submitted.
unsafe fn rearm_slot(gpu: &mut dyn GpuApi, h: &GpuHandles, slot: &FrameSlot) {
    let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
    let empty = vk::SubmitInfo {
        s_type: vk::StructureType::SUBMIT_INFO,
        wait_semaphore_count: 1,
        p_wait_semaphores: &slot.image_available,
        p_wait_dst_stage_mask: wait_stages.as_ptr(),
        ..Default::default()
    };
    let rearmed = unsafe { gpu.reset_fences(h.device, &[slot.in_flight]) }.and_then(|()| unsafe {
        gpu.queue_submit(h.queue, std::slice::from_ref(&empty), slot.in_flight)
    });
    if let Err(result) = rearmed {
        warn!(%result, "frame slot could not be re-armed");
    }
}

unsafe fn record_commands(
    gpu: &mut dyn GpuApi,
    h: &GpuHandles,
    cmd: vk::CommandBuffer,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    clear_color: [f32; 4],
) -> Result<(), FrameError> {
    let begin = vk::CommandBufferBeginInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        ..Default::default()
    };
    unsafe { gpu.begin_command_buffer(cmd, &begin) }
        .map_err(|r| FrameError::vk(VkCall::BeginCommandBuffer, r))?;

    let clear = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: clear_color,
        },
    }];
    let area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    let pass_begin = vk::RenderPassBeginInfo {
        s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
        render_pass: h.render_pass,
        framebuffer,
        render_area: area,
        clear_value_count: clear.len() as u32,
        p_clear_values: clear.as_ptr(),
        ..Default::default()
    };
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };

    unsafe {
        gpu.cmd_begin_render_pass(cmd, &pass_begin, vk::SubpassContents::INLINE);
        gpu.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, h.pipeline);
        gpu.cmd_set_viewport(cmd, &[viewport]);
        gpu.cmd_set_scissor(cmd, &[area]);
        gpu.cmd_draw(cmd, 3, 1, 0, 0);
        gpu.cmd_end_render_pass(cmd);
        gpu.end_command_buffer(cmd)
    }
    .map_err(|r| FrameError::vk(VkCall::EndCommandBuffer, r))
}
