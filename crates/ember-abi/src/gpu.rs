// SPDX-License-Identifier: CEPL-1.0
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// One method per Vulkan entry point the renderer uses.
///
/// The host implements this over a loaded Vulkan library and stores it in the
/// capability table; the renderer calls nothing else. Every method mirrors the
/// Vulkan call of the same name, so the usual valid-usage rules apply: handles
/// passed in must be live and belong to the instance/device created through
/// this same object.
#[allow(clippy::missing_safety_doc)]
pub trait GpuApi {
    // Instance level

    unsafe fn create_instance(&mut self, info: &vk::InstanceCreateInfo<'_>) -> VkResult<vk::Instance>;
    /// Installs the host's validation callback on `instance`.
    unsafe fn create_debug_messenger(
        &mut self,
        instance: vk::Instance,
    ) -> VkResult<vk::DebugUtilsMessengerEXT>;
    unsafe fn create_surface(
        &mut self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;
    unsafe fn enumerate_physical_devices(
        &mut self,
        instance: vk::Instance,
    ) -> VkResult<Vec<vk::PhysicalDevice>>;
    unsafe fn queue_family_properties(
        &mut self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties>;
    unsafe fn surface_support(
        &mut self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    unsafe fn surface_formats(
        &mut self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    unsafe fn surface_present_modes(
        &mut self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;
    unsafe fn surface_capabilities(
        &mut self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    unsafe fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<vk::Device>;

    // Device level

    unsafe fn get_device_queue(
        &mut self,
        device: vk::Device,
        queue_family_index: u32,
        queue_index: u32,
    ) -> vk::Queue;
    unsafe fn create_swapchain(
        &mut self,
        device: vk::Device,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR>;
    unsafe fn swapchain_images(
        &mut self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>>;
    unsafe fn create_image_view(
        &mut self,
        device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView>;
    unsafe fn create_render_pass(
        &mut self,
        device: vk::Device,
        info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass>;
    unsafe fn create_framebuffer(
        &mut self,
        device: vk::Device,
        info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer>;
    unsafe fn create_shader_module(
        &mut self,
        device: vk::Device,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule>;
    unsafe fn create_pipeline_layout(
        &mut self,
        device: vk::Device,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout>;
    unsafe fn create_graphics_pipeline(
        &mut self,
        device: vk::Device,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline>;
    unsafe fn create_command_pool(
        &mut self,
        device: vk::Device,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool>;
    unsafe fn allocate_command_buffers(
        &mut self,
        device: vk::Device,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    unsafe fn create_semaphore(&mut self, device: vk::Device) -> VkResult<vk::Semaphore>;
    unsafe fn create_fence(&mut self, device: vk::Device, signaled: bool) -> VkResult<vk::Fence>;

    // Synchronization and submission

    unsafe fn device_wait_idle(&mut self, device: vk::Device) -> VkResult<()>;
    unsafe fn wait_for_fences(
        &mut self,
        device: vk::Device,
        fences: &[vk::Fence],
        wait_all: bool,
        timeout: u64,
    ) -> VkResult<()>;
    unsafe fn reset_fences(&mut self, device: vk::Device, fences: &[vk::Fence]) -> VkResult<()>;
    /// Returns the acquired image index and whether the swapchain is suboptimal.
    unsafe fn acquire_next_image(
        &mut self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<(u32, bool)>;
    unsafe fn queue_submit(
        &mut self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()>;
    /// Returns whether the swapchain is suboptimal.
    unsafe fn queue_present(
        &mut self,
        queue: vk::Queue,
        info: &vk::PresentInfoKHR<'_>,
    ) -> VkResult<bool>;

    // Command recording

    unsafe fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()>;
    unsafe fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()>;
    unsafe fn cmd_begin_render_pass(
        &mut self,
        command_buffer: vk::CommandBuffer,
        info: &vk::RenderPassBeginInfo<'_>,
        contents: vk::SubpassContents,
    );
    unsafe fn cmd_bind_pipeline(
        &mut self,
        command_buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    );
    unsafe fn cmd_set_viewport(&mut self, command_buffer: vk::CommandBuffer, viewports: &[vk::Viewport]);
    unsafe fn cmd_set_scissor(&mut self, command_buffer: vk::CommandBuffer, scissors: &[vk::Rect2D]);
    unsafe fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    unsafe fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer);

    // Destruction

    unsafe fn free_command_buffers(
        &mut self,
        device: vk::Device,
        pool: vk::CommandPool,
        buffers: &[vk::CommandBuffer],
    );
    unsafe fn destroy_fence(&mut self, device: vk::Device, fence: vk::Fence);
    unsafe fn destroy_semaphore(&mut self, device: vk::Device, semaphore: vk::Semaphore);
    unsafe fn destroy_command_pool(&mut self, device: vk::Device, pool: vk::CommandPool);
    unsafe fn destroy_pipeline(&mut self, device: vk::Device, pipeline: vk::Pipeline);
    unsafe fn destroy_pipeline_layout(&mut self, device: vk::Device, layout: vk::PipelineLayout);
    unsafe fn destroy_shader_module(&mut self, device: vk::Device, module: vk::ShaderModule);
    unsafe fn destroy_framebuffer(&mut self, device: vk::Device, framebuffer: vk::Framebuffer);
    unsafe fn destroy_image_view(&mut self, device: vk::Device, view: vk::ImageView);
    unsafe fn destroy_render_pass(&mut self, device: vk::Device, render_pass: vk::RenderPass);
    unsafe fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR);
    unsafe fn destroy_device(&mut self, device: vk::Device);
    unsafe fn destroy_surface(&mut self, instance: vk::Instance, surface: vk::SurfaceKHR);
    unsafe fn destroy_debug_messenger(
        &mut self,
        instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    );
    unsafe fn destroy_instance(&mut self, instance: vk::Instance);
}
