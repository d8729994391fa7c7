// SPDX-License-Identifier: CEPL-1.0
use std::slice;

use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use ember_abi::GpuApi;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::debug::vulkan_debug_callback;

/// [`GpuApi`] over the statically linked Vulkan loader.
///
/// Holds the dispatch tables for the one instance and one device the renderer
/// creates. Calls made before the matching object exists fail with
/// `ERROR_INITIALIZATION_FAILED` (or do nothing, for calls without a result).
pub struct AshGpu {
    entry: Entry,
    instance: Option<ash::Instance>,
    surface: Option<surface::Instance>,
    debug_utils: Option<debug_utils::Instance>,
    device: Option<ash::Device>,
    swapchain: Option<swapchain::Device>,
}

const MISSING: vk::Result = vk::Result::ERROR_INITIALIZATION_FAILED;

impl AshGpu {
    pub fn linked() -> Self {
        Self {
            entry: Entry::linked(),
            instance: None,
            surface: None,
            debug_utils: None,
            device: None,
            swapchain: None,
        }
    }

    fn instance(&self) -> VkResult<&ash::Instance> {
        self.instance.as_ref().ok_or(MISSING)
    }

    fn surface(&self) -> VkResult<&surface::Instance> {
        self.surface.as_ref().ok_or(MISSING)
    }

    fn device(&self) -> VkResult<&ash::Device> {
        self.device.as_ref().ok_or(MISSING)
    }

    fn swapchain(&self) -> VkResult<&swapchain::Device> {
        self.swapchain.as_ref().ok_or(MISSING)
    }
}

impl GpuApi for AshGpu {
    unsafe fn create_instance(&mut self, info: &vk::InstanceCreateInfo<'_>) -> VkResult<vk::Instance> {
        let instance = unsafe { self.entry.create_instance(info, None) }?;
        self.surface = Some(surface::Instance::new(&self.entry, &instance));
        self.debug_utils = Some(debug_utils::Instance::new(&self.entry, &instance));
        let handle = instance.handle();
        self.instance = Some(instance);
        Ok(handle)
    }

    unsafe fn create_debug_messenger(
        &mut self,
        _instance: vk::Instance,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let loader = self.debug_utils.as_ref().ok_or(MISSING)?;
        let info = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(vulkan_debug_callback),
            ..Default::default()
        };
        unsafe { loader.create_debug_utils_messenger(&info, None) }
    }

    unsafe fn create_surface(
        &mut self,
        _instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let instance = self.instance()?;
        unsafe { ash_window::create_surface(&self.entry, instance, display, window, None) }
    }

    unsafe fn enumerate_physical_devices(
        &mut self,
        _instance: vk::Instance,
    ) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance()?.enumerate_physical_devices() }
    }

    unsafe fn queue_family_properties(
        &mut self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        match &self.instance {
            Some(i) => unsafe { i.get_physical_device_queue_family_properties(physical_device) },
            None => Vec::new(),
        }
    }

    unsafe fn surface_support(
        &mut self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        unsafe {
            self.surface()?.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                surface,
            )
        }
    }

    unsafe fn surface_formats(
        &mut self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.surface()?.get_physical_device_surface_formats(physical_device, surface) }
    }

    unsafe fn surface_present_modes(
        &mut self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface()?
                .get_physical_device_surface_present_modes(physical_device, surface)
        }
    }

    unsafe fn surface_capabilities(
        &mut self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface()?
                .get_physical_device_surface_capabilities(physical_device, surface)
        }
    }

    unsafe fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<vk::Device> {
        let instance = self.instance.as_ref().ok_or(MISSING)?;
        let device = unsafe { instance.create_device(physical_device, info, None) }?;
        let handle = device.handle();
        self.swapchain = Some(swapchain::Device::new(instance, &device));
        self.device = Some(device);
        Ok(handle)
    }

    unsafe fn get_device_queue(
        &mut self,
        _device: vk::Device,
        queue_family_index: u32,
        queue_index: u32,
    ) -> vk::Queue {
        match &self.device {
            Some(d) => unsafe { d.get_device_queue(queue_family_index, queue_index) },
            None => vk::Queue::null(),
        }
    }

    unsafe fn create_swapchain(
        &mut self,
        _device: vk::Device,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain()?.create_swapchain(info, None) }
    }

    unsafe fn swapchain_images(
        &mut self,
        _device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain()?.get_swapchain_images(swapchain) }
    }

    unsafe fn create_image_view(
        &mut self,
        _device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        unsafe { self.device()?.create_image_view(info, None) }
    }

    unsafe fn create_render_pass(
        &mut self,
        _device: vk::Device,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        unsafe { self.device()?.create_render_pass(info, None) }
    }

    unsafe fn create_framebuffer(
        &mut self,
        _device: vk::Device,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        unsafe { self.device()?.create_framebuffer(info, None) }
    }

    unsafe fn create_shader_module(
        &mut self,
        _device: vk::Device,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        unsafe { self.device()?.create_shader_module(info, None) }
    }

    unsafe fn create_pipeline_layout(
        &mut self,
        _device: vk::Device,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        unsafe { self.device()?.create_pipeline_layout(info, None) }
    }

    unsafe fn create_graphics_pipeline(
        &mut self,
        _device: vk::Device,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        let device = self.device()?;
        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), slice::from_ref(info), None)
        }
        .map_err(|(partial, result)| {
            for pipeline in partial.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                unsafe { device.destroy_pipeline(pipeline, None) };
            }
            result
        })?;
        pipelines.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    unsafe fn create_command_pool(
        &mut self,
        _device: vk::Device,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        unsafe { self.device()?.create_command_pool(info, None) }
    }

    unsafe fn allocate_command_buffers(
        &mut self,
        _device: vk::Device,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        unsafe { self.device()?.allocate_command_buffers(info) }
    }

    unsafe fn create_semaphore(&mut self, _device: vk::Device) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        unsafe { self.device()?.create_semaphore(&info, None) }
    }

    unsafe fn create_fence(&mut self, _device: vk::Device, signaled: bool) -> VkResult<vk::Fence> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.device()?.create_fence(&info, None) }
    }

    unsafe fn device_wait_idle(&mut self, _device: vk::Device) -> VkResult<()> {
        unsafe { self.device()?.device_wait_idle() }
    }

    unsafe fn wait_for_fences(
        &mut self,
        _device: vk::Device,
        fences: &[vk::Fence],
        wait_all: bool,
        timeout: u64,
    ) -> VkResult<()> {
        unsafe { self.device()?.wait_for_fences(fences, wait_all, timeout) }
    }

    unsafe fn reset_fences(&mut self, _device: vk::Device, fences: &[vk::Fence]) -> VkResult<()> {
        unsafe { self.device()?.reset_fences(fences) }
    }

    unsafe fn acquire_next_image(
        &mut self,
        _device: vk::Device,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain()?
                .acquire_next_image(swapchain, timeout, semaphore, fence)
        }
    }

    unsafe fn queue_submit(
        &mut self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        unsafe { self.device()?.queue_submit(queue, submits, fence) }
    }

    unsafe fn queue_present(
        &mut self,
        queue: vk::Queue,
        info: &vk::PresentInfoKHR<'_>,
    ) -> VkResult<bool> {
        unsafe { self.swapchain()?.queue_present(queue, info) }
    }

    unsafe fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        unsafe { self.device()?.begin_command_buffer(command_buffer, info) }
    }

    unsafe fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device()?.end_command_buffer(command_buffer) }
    }

    unsafe fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
        contents: vk::SubpassContents,
    ) {
        if let Some(d) = &self.device {
            unsafe { d.cmd_begin_render_pass(command_buffer, info, contents) };
        }
    }

    unsafe fn cmd_bind_pipeline(
        &mut self,
        command_buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        if let Some(d) = &self.device {
            unsafe { d.cmd_bind_pipeline(command_buffer, bind_point, pipeline) };
        }
    }

    unsafe fn cmd_set_viewport(&mut self, command_buffer: vk::CommandBuffer, viewports: &[vk::Viewport]) {
        if let Some(d) = &self.device {
            unsafe { d.cmd_set_viewport(command_buffer, 0, viewports) };
        }
    }

    unsafe fn cmd_set_scissor(&mut self, command_buffer: vk::CommandBuffer, scissors: &[vk::Rect2D]) {
        if let Some(d) = &self.device {
            unsafe { d.cmd_set_scissor(command_buffer, 0, scissors) };
        }
    }

    unsafe fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        if let Some(d) = &self.device {
            unsafe {
                d.cmd_draw(
                    command_buffer,
                    vertex_count,
                    instance_count,
                    first_vertex,
                    first_instance,
                )
            };
        }
    }

    unsafe fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        if let Some(d) = &self.device {
            unsafe { d.cmd_end_render_pass(command_buffer) };
        }
    }

    unsafe fn free_command_buffers(
        &mut self,
        _device: vk::Device,
        pool: vk::CommandPool,
        buffers: &[vk::CommandBuffer],
    ) {
        if let Some(d) = &self.device {
            unsafe { d.free_command_buffers(pool, buffers) };
        }
    }

    unsafe fn destroy_fence(&mut self, _device: vk::Device, fence: vk::Fence) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_fence(fence, None) };
        }
    }

    unsafe fn destroy_semaphore(&mut self, _device: vk::Device, semaphore: vk::Semaphore) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_semaphore(semaphore, None) };
        }
    }

    unsafe fn destroy_command_pool(&mut self, _device: vk::Device, pool: vk::CommandPool) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_command_pool(pool, None) };
        }
    }

    unsafe fn destroy_pipeline(&mut self, _device: vk::Device, pipeline: vk::Pipeline) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_pipeline(pipeline, None) };
        }
    }

    unsafe fn destroy_pipeline_layout(&mut self, _device: vk::Device, layout: vk::PipelineLayout) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_pipeline_layout(layout, None) };
        }
    }

    unsafe fn destroy_shader_module(&mut self, _device: vk::Device, module: vk::ShaderModule) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_shader_module(module, None) };
        }
    }

    unsafe fn destroy_framebuffer(&mut self, _device: vk::Device, framebuffer: vk::Framebuffer) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_framebuffer(framebuffer, None) };
        }
    }

    unsafe fn destroy_image_view(&mut self, _device: vk::Device, view: vk::ImageView) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_image_view(view, None) };
        }
    }

    unsafe fn destroy_render_pass(&mut self, _device: vk::Device, render_pass: vk::RenderPass) {
        if let Some(d) = &self.device {
            unsafe { d.destroy_render_pass(render_pass, None) };
        }
    }

    unsafe fn destroy_swapchain(&mut self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        if let Some(s) = &self.swapchain {
            unsafe { s.destroy_swapchain(swapchain, None) };
        }
    }

    unsafe fn destroy_device(&mut self, _device: vk::Device) {
        self.swapchain = None;
        if let Some(d) = self.device.take() {
            unsafe { d.destroy_device(None) };
        }
    }

    unsafe fn destroy_surface(&mut self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        if let Some(s) = &self.surface {
            unsafe { s.destroy_surface(surface, None) };
        }
    }

    unsafe fn destroy_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    ) {
        if let Some(du) = &self.debug_utils {
            unsafe { du.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    unsafe fn destroy_instance(&mut self, _instance: vk::Instance) {
        self.surface = None;
        self.debug_utils = None;
        if let Some(i) = self.instance.take() {
            unsafe { i.destroy_instance(None) };
        }
    }
}
