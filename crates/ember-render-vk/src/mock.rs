// SPDX-License-Identifier: CEPL-1.0
//! Recording stand-in for the host's Vulkan and window services.
//!
//! Handles are sequential integers. The "GPU" finishes work the moment it is
//! submitted, so a fence passed to `queue_submit` is signaled on return.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::CString;
use std::io;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::rc::Rc;
use std::slice;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use ember_abi::{AppInfo, CapabilityTable, GpuApi, Platform, SurfaceError, VkCall};
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};

pub(crate) const VERT_PATH: &str = "shaders/triangle.vert.spv";
pub(crate) const FRAG_PATH: &str = "shaders/triangle.frag.spv";

pub(crate) const GRAPHICS: vk::QueueFlags = vk::QueueFlags::GRAPHICS;
pub(crate) const COMPUTE: vk::QueueFlags = vk::QueueFlags::COMPUTE;

#[derive(Debug, Clone)]
pub(crate) struct MockDevice {
    /// (flags, can present to the surface)
    pub families: Vec<(vk::QueueFlags, bool)>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SwapchainRecord {
    pub min_image_count: u32,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub present_mode: vk::PresentModeKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub clipped: bool,
    pub array_layers: u32,
    pub old_swapchain: vk::SwapchainKHR,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RenderPassRecord {
    pub format: vk::Format,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
    pub subpasses: u32,
    pub dependency: Option<vk::SubpassDependency>,
}

#[derive(Debug, Clone)]
pub(crate) struct PipelineRecord {
    pub stage_count: u32,
    pub vertex_bindings: u32,
    pub vertex_attributes: u32,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_bias: bool,
    pub samples: vk::SampleCountFlags,
    pub blend_attachments: u32,
    pub blend_enable: bool,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
}

#[derive(Debug, Clone)]
pub(crate) struct SubmitRecord {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub wait: Vec<vk::Semaphore>,
    pub wait_stages: Vec<vk::PipelineStageFlags>,
    pub signal: Vec<vk::Semaphore>,
    pub fence: vk::Fence,
}

#[derive(Debug, Clone)]
pub(crate) struct PresentRecord {
    pub image_index: u32,
    pub wait: Vec<vk::Semaphore>,
}

#[derive(Debug)]
pub(crate) struct MockState {
    pub devices: Vec<MockDevice>,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub caps: vk::SurfaceCapabilitiesKHR,
    pub image_count: usize,
    /// Fail the n-th (0-based) invocation of a call.
    pub fail: Option<(VkCall, usize)>,
    pub acquire_error: Option<vk::Result>,
    pub present_error: Option<vk::Result>,
    pub present_suboptimal: bool,
    /// Image index handed out by the first acquisition.
    pub first_image: u32,

    next_handle: u64,
    next_image: u32,
    pub calls: Vec<VkCall>,
    pub log: Vec<&'static str>,
    pub live: HashSet<u64>,
    pub fences: HashMap<vk::Fence, bool>,
    pub unsignaled_waits: usize,
    pub swapchains: Vec<SwapchainRecord>,
    pub render_passes: Vec<RenderPassRecord>,
    pub pipelines: Vec<PipelineRecord>,
    pub device_extensions: Vec<CString>,
    pub instance_extensions: Vec<CString>,
    pub instance_layers: Vec<CString>,
    pub begin_flags: Vec<vk::CommandBufferUsageFlags>,
    pub render_pass_begins: Vec<(vk::Framebuffer, vk::Extent2D)>,
    pub viewports: Vec<vk::Viewport>,
    pub draws: Vec<(u32, u32)>,
    pub submits: Vec<SubmitRecord>,
    pub presents: Vec<PresentRecord>,
}

impl MockState {
    /// One device with one graphics+present family, automatic extent, FIFO and MAILBOX.
    pub fn scenario() -> Self {
        Self {
            devices: vec![MockDevice {
                families: vec![(GRAPHICS | COMPUTE, true)],
            }],
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            caps: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            image_count: 3,
            fail: None,
            acquire_error: None,
            present_error: None,
            present_suboptimal: false,
            first_image: 0,
            next_handle: 0x1000,
            next_image: 0,
            calls: Vec::new(),
            log: Vec::new(),
            live: HashSet::new(),
            fences: HashMap::new(),
            unsignaled_waits: 0,
            swapchains: Vec::new(),
            render_passes: Vec::new(),
            pipelines: Vec::new(),
            device_extensions: Vec::new(),
            instance_extensions: Vec::new(),
            instance_layers: Vec::new(),
            begin_flags: Vec::new(),
            render_pass_begins: Vec::new(),
            viewports: Vec::new(),
            draws: Vec::new(),
            submits: Vec::new(),
            presents: Vec::new(),
        }
    }

    pub fn count(&self, call: VkCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    pub fn logged(&self, entry: &str) -> usize {
        self.log.iter().filter(|e| **e == entry).count()
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.fences.get(&fence).copied().unwrap_or(false)
    }

    fn check(&mut self, call: VkCall) -> VkResult<()> {
        let seen = self.count(call);
        self.calls.push(call);
        match self.fail {
            Some((failing, nth)) if failing == call && nth == seen => {
                Err(vk::Result::ERROR_INITIALIZATION_FAILED)
            }
            _ => Ok(()),
        }
    }

    fn raw(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn create<H: Handle>(&mut self, call: VkCall, entry: &'static str) -> VkResult<H> {
        self.check(call)?;
        self.log.push(entry);
        let raw = self.raw();
        self.live.insert(raw);
        Ok(H::from_raw(raw))
    }

    fn destroy<H: Handle + Copy>(&mut self, handle: H, entry: &'static str) {
        self.log.push(entry);
        assert!(
            self.live.remove(&handle.as_raw()),
            "{entry} on a handle that is not live: {:#x}",
            handle.as_raw()
        );
    }

    fn physical_device(&self, handle: vk::PhysicalDevice) -> &MockDevice {
        &self.devices[(handle.as_raw() - 0x10) as usize]
    }
}

unsafe fn c_strings(ptrs: *const *const std::ffi::c_char, count: u32) -> Vec<CString> {
    if count == 0 {
        return Vec::new();
    }
    // SAFETY: the caller passes a create-info array of `count` NUL-terminated names.
    unsafe { slice::from_raw_parts(ptrs, count as usize) }
        .iter()
        .map(|&p| unsafe { std::ffi::CStr::from_ptr(p) }.to_owned())
        .collect()
}

unsafe fn raw_slice<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if count == 0 || ptr.is_null() {
        return &[];
    }
    // SAFETY: Vulkan create infos pair every array pointer with its length.
    unsafe { slice::from_raw_parts(ptr, count as usize) }
}

pub(crate) struct MockGpu {
    state: Rc<RefCell<MockState>>,
}

impl MockGpu {
    pub fn new(state: MockState) -> (Self, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(state));
        (Self { state: state.clone() }, state)
    }
}

impl GpuApi for MockGpu {
    unsafe fn create_instance(&mut self, info: &vk::InstanceCreateInfo<'_>) -> VkResult<vk::Instance> {
        let mut s = self.state.borrow_mut();
        s.instance_extensions =
            unsafe { c_strings(info.pp_enabled_extension_names, info.enabled_extension_count) };
        s.instance_layers = unsafe { c_strings(info.pp_enabled_layer_names, info.enabled_layer_count) };
        s.create(VkCall::CreateInstance, "create_instance")
    }

    unsafe fn create_debug_messenger(
        &mut self,
        _instance: vk::Instance,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        self.state
            .borrow_mut()
            .create(VkCall::CreateDebugMessenger, "create_debug_messenger")
    }

    unsafe fn create_surface(
        &mut self,
        _instance: vk::Instance,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let mut s = self.state.borrow_mut();
        s.log.push("create_surface");
        let raw = s.raw();
        s.live.insert(raw);
        Ok(vk::SurfaceKHR::from_raw(raw))
    }

    unsafe fn enumerate_physical_devices(
        &mut self,
        _instance: vk::Instance,
    ) -> VkResult<Vec<vk::PhysicalDevice>> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::EnumeratePhysicalDevices)?;
        Ok((0..s.devices.len() as u64)
            .map(|i| vk::PhysicalDevice::from_raw(0x10 + i))
            .collect())
    }

    unsafe fn queue_family_properties(
        &mut self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        let s = self.state.borrow();
        s.physical_device(physical_device)
            .families
            .iter()
            .map(|&(queue_flags, _)| vk::QueueFamilyProperties {
                queue_flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect()
    }

    unsafe fn surface_support(
        &mut self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        let s = self.state.borrow();
        Ok(s.physical_device(physical_device).families[queue_family_index as usize].1)
    }

    unsafe fn surface_formats(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::GetSurfaceFormats)?;
        Ok(s.formats.clone())
    }

    unsafe fn surface_present_modes(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::GetSurfacePresentModes)?;
        Ok(s.present_modes.clone())
    }

    unsafe fn surface_capabilities(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::GetSurfaceCapabilities)?;
        Ok(s.caps)
    }

    unsafe fn create_device(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<vk::Device> {
        let mut s = self.state.borrow_mut();
        s.device_extensions =
            unsafe { c_strings(info.pp_enabled_extension_names, info.enabled_extension_count) };
        s.create(VkCall::CreateDevice, "create_device")
    }

    unsafe fn get_device_queue(
        &mut self,
        _device: vk::Device,
        queue_family_index: u32,
        _queue_index: u32,
    ) -> vk::Queue {
        vk::Queue::from_raw(0x900 + u64::from(queue_family_index))
    }

    unsafe fn create_swapchain(
        &mut self,
        _device: vk::Device,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        let mut s = self.state.borrow_mut();
        s.swapchains.push(SwapchainRecord {
            min_image_count: info.min_image_count,
            format: info.image_format,
            color_space: info.image_color_space,
            extent: info.image_extent,
            usage: info.image_usage,
            sharing_mode: info.image_sharing_mode,
            present_mode: info.present_mode,
            composite_alpha: info.composite_alpha,
            clipped: info.clipped == vk::TRUE,
            array_layers: info.image_array_layers,
            old_swapchain: info.old_swapchain,
        });
        s.next_image = s.first_image;
        s.create(VkCall::CreateSwapchain, "create_swapchain")
    }

    unsafe fn swapchain_images(
        &mut self,
        _device: vk::Device,
        _swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::GetSwapchainImages)?;
        Ok((0..s.image_count as u64)
            .map(|i| vk::Image::from_raw(0x500 + i))
            .collect())
    }

    unsafe fn create_image_view(
        &mut self,
        _device: vk::Device,
        _info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        self.state
            .borrow_mut()
            .create(VkCall::CreateImageView, "create_image_view")
    }

    unsafe fn create_render_pass(
        &mut self,
        _device: vk::Device,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        let attachments = unsafe { raw_slice(info.p_attachments, info.attachment_count) };
        let dependencies = unsafe { raw_slice(info.p_dependencies, info.dependency_count) };
        let color = attachments[0];
        let mut s = self.state.borrow_mut();
        s.render_passes.push(RenderPassRecord {
            format: color.format,
            load_op: color.load_op,
            store_op: color.store_op,
            initial_layout: color.initial_layout,
            final_layout: color.final_layout,
            subpasses: info.subpass_count,
            dependency: dependencies.first().copied(),
        });
        s.create(VkCall::CreateRenderPass, "create_render_pass")
    }

    unsafe fn create_framebuffer(
        &mut self,
        _device: vk::Device,
        _info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        self.state
            .borrow_mut()
            .create(VkCall::CreateFramebuffer, "create_framebuffer")
    }

    unsafe fn create_shader_module(
        &mut self,
        _device: vk::Device,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        let stage = if self.state.borrow().count(VkCall::CreateShaderModule(ember_abi::ShaderStage::Vertex))
            == self
                .state
                .borrow()
                .count(VkCall::CreateShaderModule(ember_abi::ShaderStage::Fragment))
        {
            ember_abi::ShaderStage::Vertex
        } else {
            ember_abi::ShaderStage::Fragment
        };
        assert_eq!(info.code_size % 4, 0, "SPIR-V size must be a multiple of 4");
        self.state
            .borrow_mut()
            .create(VkCall::CreateShaderModule(stage), "create_shader_module")
    }

    unsafe fn create_pipeline_layout(
        &mut self,
        _device: vk::Device,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        assert_eq!(info.set_layout_count, 0);
        assert_eq!(info.push_constant_range_count, 0);
        self.state
            .borrow_mut()
            .create(VkCall::CreatePipelineLayout, "create_pipeline_layout")
    }

    unsafe fn create_graphics_pipeline(
        &mut self,
        _device: vk::Device,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        // SAFETY: the renderer fills every state pointer it uses.
        let (vertex_input, assembly, raster, multisample, blend, dynamic) = unsafe {
            (
                &*info.p_vertex_input_state,
                &*info.p_input_assembly_state,
                &*info.p_rasterization_state,
                &*info.p_multisample_state,
                &*info.p_color_blend_state,
                &*info.p_dynamic_state,
            )
        };
        let blend_attachments = unsafe { raw_slice(blend.p_attachments, blend.attachment_count) };
        let dynamic_states =
            unsafe { raw_slice(dynamic.p_dynamic_states, dynamic.dynamic_state_count) }.to_vec();
        let mut s = self.state.borrow_mut();
        s.pipelines.push(PipelineRecord {
            stage_count: info.stage_count,
            vertex_bindings: vertex_input.vertex_binding_description_count,
            vertex_attributes: vertex_input.vertex_attribute_description_count,
            topology: assembly.topology,
            polygon_mode: raster.polygon_mode,
            cull_mode: raster.cull_mode,
            front_face: raster.front_face,
            depth_bias: raster.depth_bias_enable == vk::TRUE,
            samples: multisample.rasterization_samples,
            blend_attachments: blend.attachment_count,
            blend_enable: blend_attachments.iter().any(|a| a.blend_enable == vk::TRUE),
            dynamic_states,
            render_pass: info.render_pass,
            layout: info.layout,
        });
        s.create(VkCall::CreateGraphicsPipeline, "create_graphics_pipeline")
    }

    unsafe fn create_command_pool(
        &mut self,
        _device: vk::Device,
        _info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        self.state
            .borrow_mut()
            .create(VkCall::CreateCommandPool, "create_command_pool")
    }

    unsafe fn allocate_command_buffers(
        &mut self,
        _device: vk::Device,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::AllocateCommandBuffers)?;
        s.log.push("allocate_command_buffers");
        Ok((0..info.command_buffer_count)
            .map(|_| vk::CommandBuffer::from_raw(s.raw()))
            .collect())
    }

    unsafe fn create_semaphore(&mut self, _device: vk::Device) -> VkResult<vk::Semaphore> {
        self.state
            .borrow_mut()
            .create(VkCall::CreateSemaphore, "create_semaphore")
    }

    unsafe fn create_fence(&mut self, _device: vk::Device, signaled: bool) -> VkResult<vk::Fence> {
        let mut s = self.state.borrow_mut();
        let fence: vk::Fence = s.create(VkCall::CreateFence, "create_fence")?;
        s.fences.insert(fence, signaled);
        Ok(fence)
    }

    unsafe fn device_wait_idle(&mut self, _device: vk::Device) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::DeviceWaitIdle)?;
        s.log.push("device_wait_idle");
        Ok(())
    }

    unsafe fn wait_for_fences(
        &mut self,
        _device: vk::Device,
        fences: &[vk::Fence],
        _wait_all: bool,
        _timeout: u64,
    ) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::WaitForFences)?;
        if fences.iter().any(|f| !s.fence_signaled(*f)) {
            // A real device would block forever here.
            s.unsignaled_waits += 1;
            return Err(vk::Result::TIMEOUT);
        }
        Ok(())
    }

    unsafe fn reset_fences(&mut self, _device: vk::Device, fences: &[vk::Fence]) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::ResetFences)?;
        for fence in fences {
            s.fences.insert(*fence, false);
        }
        Ok(())
    }

    unsafe fn acquire_next_image(
        &mut self,
        _device: vk::Device,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        _semaphore: vk::Semaphore,
        _fence: vk::Fence,
    ) -> VkResult<(u32, bool)> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::AcquireNextImage)?;
        if let Some(err) = s.acquire_error.take() {
            return Err(err);
        }
        let index = s.next_image;
        s.next_image = (index + 1) % s.image_count as u32;
        Ok((index, false))
    }

    unsafe fn queue_submit(
        &mut self,
        _queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::QueueSubmit)?;
        for submit in submits {
            let record = unsafe {
                SubmitRecord {
                    command_buffers: raw_slice(submit.p_command_buffers, submit.command_buffer_count)
                        .to_vec(),
                    wait: raw_slice(submit.p_wait_semaphores, submit.wait_semaphore_count).to_vec(),
                    wait_stages: raw_slice(submit.p_wait_dst_stage_mask, submit.wait_semaphore_count)
                        .to_vec(),
                    signal: raw_slice(submit.p_signal_semaphores, submit.signal_semaphore_count)
                        .to_vec(),
                    fence,
                }
            };
            s.submits.push(record);
        }
        if fence != vk::Fence::null() {
            s.fences.insert(fence, true);
        }
        Ok(())
    }

    unsafe fn queue_present(
        &mut self,
        _queue: vk::Queue,
        info: &vk::PresentInfoKHR<'_>,
    ) -> VkResult<bool> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::QueuePresent)?;
        let record = unsafe {
            PresentRecord {
                image_index: raw_slice(info.p_image_indices, info.swapchain_count)[0],
                wait: raw_slice(info.p_wait_semaphores, info.wait_semaphore_count).to_vec(),
            }
        };
        s.presents.push(record);
        if let Some(err) = s.present_error.take() {
            return Err(err);
        }
        Ok(s.present_suboptimal)
    }

    unsafe fn begin_command_buffer(
        &mut self,
        _command_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.check(VkCall::BeginCommandBuffer)?;
        s.begin_flags.push(info.flags);
        Ok(())
    }

    unsafe fn end_command_buffer(&mut self, _command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.state.borrow_mut().check(VkCall::EndCommandBuffer)
    }

    unsafe fn cmd_begin_render_pass(
        &mut self,
        _command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
        _contents: vk::SubpassContents,
    ) {
        self.state
            .borrow_mut()
            .render_pass_begins
            .push((info.framebuffer, info.render_area.extent));
    }

    unsafe fn cmd_bind_pipeline(
        &mut self,
        _command_buffer: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _pipeline: vk::Pipeline,
    ) {
        self.state.borrow_mut().log.push("cmd_bind_pipeline");
    }

    unsafe fn cmd_set_viewport(&mut self, _command_buffer: vk::CommandBuffer, viewports: &[vk::Viewport]) {
        self.state.borrow_mut().viewports.extend_from_slice(viewports);
    }

    unsafe fn cmd_set_scissor(&mut self, _command_buffer: vk::CommandBuffer, _scissors: &[vk::Rect2D]) {
        self.state.borrow_mut().log.push("cmd_set_scissor");
    }

    unsafe fn cmd_draw(
        &mut self,
        _command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.state
            .borrow_mut()
            .draws
            .push((vertex_count, instance_count));
    }

    unsafe fn cmd_end_render_pass(&mut self, _command_buffer: vk::CommandBuffer) {
        self.state.borrow_mut().log.push("cmd_end_render_pass");
    }

    unsafe fn free_command_buffers(
        &mut self,
        _device: vk::Device,
        _pool: vk::CommandPool,
        _buffers: &[vk::CommandBuffer],
    ) {
        self.state.borrow_mut().log.push("free_command_buffers");
    }

    unsafe fn destroy_fence(&mut self, _device: vk::Device, fence: vk::Fence) {
        let mut s = self.state.borrow_mut();
        s.fences.remove(&fence);
        s.destroy(fence, "destroy_fence");
    }

    unsafe fn destroy_semaphore(&mut self, _device: vk::Device, semaphore: vk::Semaphore) {
        self.state.borrow_mut().destroy(semaphore, "destroy_semaphore");
    }

    unsafe fn destroy_command_pool(&mut self, _device: vk::Device, pool: vk::CommandPool) {
        self.state.borrow_mut().destroy(pool, "destroy_command_pool");
    }

    unsafe fn destroy_pipeline(&mut self, _device: vk::Device, pipeline: vk::Pipeline) {
        self.state.borrow_mut().destroy(pipeline, "destroy_pipeline");
    }

    unsafe fn destroy_pipeline_layout(&mut self, _device: vk::Device, layout: vk::PipelineLayout) {
        self.state
            .borrow_mut()
            .destroy(layout, "destroy_pipeline_layout");
    }

    unsafe fn destroy_shader_module(&mut self, _device: vk::Device, module: vk::ShaderModule) {
        self.state.borrow_mut().destroy(module, "destroy_shader_module");
    }

    unsafe fn destroy_framebuffer(&mut self, _device: vk::Device, framebuffer: vk::Framebuffer) {
        self.state
            .borrow_mut()
            .destroy(framebuffer, "destroy_framebuffer");
    }

    unsafe fn destroy_image_view(&mut self, _device: vk::Device, view: vk::ImageView) {
        self.state.borrow_mut().destroy(view, "destroy_image_view");
    }

    unsafe fn destroy_render_pass(&mut self, _device: vk::Device, render_pass: vk::RenderPass) {
        self.state
            .borrow_mut()
            .destroy(render_pass, "destroy_render_pass");
    }

    unsafe fn destroy_swapchain(&mut self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        self.state.borrow_mut().destroy(swapchain, "destroy_swapchain");
    }

    unsafe fn destroy_device(&mut self, device: vk::Device) {
        self.state.borrow_mut().destroy(device, "destroy_device");
    }

    unsafe fn destroy_surface(&mut self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        self.state.borrow_mut().destroy(surface, "destroy_surface");
    }

    unsafe fn destroy_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    ) {
        self.state
            .borrow_mut()
            .destroy(messenger, "destroy_debug_messenger");
    }

    unsafe fn destroy_instance(&mut self, instance: vk::Instance) {
        self.state.borrow_mut().destroy(instance, "destroy_instance");
    }
}

pub(crate) struct MockPlatform {
    dispatch: tracing::Dispatch,
    files: HashMap<PathBuf, Vec<u8>>,
    pub surface_error: Option<SurfaceError>,
}

impl MockPlatform {
    pub fn new() -> Self {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        let mut files = HashMap::new();
        files.insert(PathBuf::from(VERT_PATH), spirv_stub());
        files.insert(PathBuf::from(FRAG_PATH), spirv_stub());
        Self {
            dispatch: tracing::Dispatch::new(subscriber),
            files,
            surface_error: None,
        }
    }

    pub fn with_file(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(PathBuf::from(path), bytes);
        self
    }

    pub fn without_file(mut self, path: &str) -> Self {
        self.files.remove(Path::new(path));
        self
    }
}

impl Platform for MockPlatform {
    fn diagnostics(&self) -> &tracing::Dispatch {
        &self.dispatch
    }

    fn load_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    unsafe fn create_surface(
        &self,
        gpu: &mut dyn GpuApi,
        instance: vk::Instance,
    ) -> Result<vk::SurfaceKHR, SurfaceError> {
        if let Some(err) = &self.surface_error {
            return Err(err.clone());
        }
        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::new(NonNull::new(0x1 as *mut _), 0));
        let window = RawWindowHandle::Xlib(XlibWindowHandle::new(1));
        unsafe { gpu.create_surface(instance, display, window) }.map_err(SurfaceError::Vk)
    }
}

/// Smallest byte string `read_spv` accepts: the SPIR-V magic plus a header.
pub(crate) fn spirv_stub() -> Vec<u8> {
    [0x0723_0203u32, 0x0001_0000, 0, 1, 0]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

pub(crate) fn app_info() -> AppInfo {
    let mut info = AppInfo::new(CString::new("ember-test").unwrap(), 800, 600);
    info.extensions
        .try_push(CString::new("VK_KHR_surface").unwrap())
        .unwrap();
    info.vertex_shader = PathBuf::from(VERT_PATH);
    info.fragment_shader = PathBuf::from(FRAG_PATH);
    info
}

pub(crate) fn table_with(
    state: MockState,
    platform: MockPlatform,
) -> (CapabilityTable, Rc<RefCell<MockState>>) {
    let (gpu, state) = MockGpu::new(state);
    (
        CapabilityTable::new(Box::new(platform), Box::new(gpu), app_info()),
        state,
    )
}

pub(crate) fn table(state: MockState) -> (CapabilityTable, Rc<RefCell<MockState>>) {
    table_with(state, MockPlatform::new())
}
