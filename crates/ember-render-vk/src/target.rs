// SPDX-License-Identifier: CEPL-1.0
//! Render pass, per-image framebuffers and the graphics pipeline.

use std::io::Cursor;

use ash::util::read_spv;
use ash::vk;
use ember_abi::{CapabilityTable, GpuApi, InitError, ShaderStage, VkCall};
use tracing::{debug, info};

const SHADER_ENTRY: &std::ffi::CStr = c"main";

/// One clear/store color attachment that ends up ready for presentation.
pub(crate) fn create_render_pass(table: &mut CapabilityTable) -> Result<(), InitError> {
    let color_attachment = vk::AttachmentDescription {
        format: table.config.format.format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    };
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        ..Default::default()
    };
    // The acquired image may still be read by the presentation engine until
    // color output starts.
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
            | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ..Default::default()
    };
    let create_info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_attachment,
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };

    let device = table.handles.device;
    // SAFETY: all referenced descriptions live on this stack frame.
    let render_pass = unsafe { table.gpu.create_render_pass(device, &create_info) }
        .map_err(|r| InitError::vk(VkCall::CreateRenderPass, r))?;
    table.handles.render_pass = render_pass;
    Ok(())
}

/// Creates a view and a framebuffer for every swapchain image.
///
/// Fails fast: on the first error everything this call created is destroyed
/// and no image entry is touched.
pub(crate) fn create_framebuffers(table: &mut CapabilityTable) -> Result<(), InitError> {
    let device = table.handles.device;
    let render_pass = table.handles.render_pass;
    let format = table.config.format.format;
    let extent = table.config.extent;
    let gpu = &mut *table.gpu;

    let mut built: Vec<(vk::ImageView, vk::Framebuffer)> = Vec::with_capacity(table.images.len());
    for image in &table.images {
        // SAFETY: `image` belongs to the recorded swapchain on `device`.
        match unsafe { create_image_target(gpu, device, render_pass, image.image, format, extent) } {
            Ok(pair) => built.push(pair),
            Err(err) => {
                for (view, framebuffer) in built {
                    unsafe {
                        gpu.destroy_framebuffer(device, framebuffer);
                        gpu.destroy_image_view(device, view);
                    }
                }
                return Err(err);
            }
        }
    }

    for (image, (view, framebuffer)) in table.images.iter_mut().zip(built) {
        image.view = view;
        image.framebuffer = framebuffer;
    }
    debug!(count = table.images.len(), "framebuffers created");
    Ok(())
}

unsafe fn create_image_target(
    gpu: &mut dyn GpuApi,
    device: vk::Device,
    render_pass: vk::RenderPass,
    image: vk::Image,
    format: vk::Format,
    extent: vk::Extent2D,
) -> Result<(vk::ImageView, vk::Framebuffer), InitError> {
    let view_info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        components: vk::ComponentMapping::default(),
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    let view = unsafe { gpu.create_image_view(device, &view_info) }
        .map_err(|r| InitError::vk(VkCall::CreateImageView, r))?;

    let framebuffer_info = vk::FramebufferCreateInfo {
        s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
        render_pass,
        attachment_count: 1,
        p_attachments: &view,
        width: extent.width,
        height: extent.height,
        layers: 1,
        ..Default::default()
    };
    match unsafe { gpu.create_framebuffer(device, &framebuffer_info) } {
        Ok(framebuffer) => Ok((view, framebuffer)),
        Err(r) => {
            unsafe { gpu.destroy_image_view(device, view) };
            Err(InitError::vk(VkCall::CreateFramebuffer, r))
        }
    }
}

/// Reads a shader binary through the host and checks it is SPIR-V.
fn load_shader(table: &CapabilityTable, stage: ShaderStage) -> Result<Vec<u32>, InitError> {
    let path = match stage {
        ShaderStage::Vertex => &table.app_info.vertex_shader,
        ShaderStage::Fragment => &table.app_info.fragment_shader,
    };
    let bytes = table
        .platform
        .load_file(path)
        .map_err(|e| InitError::ShaderLoad {
            stage,
            reason: format!("{}: {e}", path.display()),
        })?;
    read_spv(&mut Cursor::new(&bytes)).map_err(|e| InitError::InvalidShader {
        stage,
        reason: e.to_string(),
    })
}

/// Creates whichever shader module is still missing. Both binaries are read
/// and validated before any module is created.
fn ensure_shader_modules(table: &mut CapabilityTable) -> Result<(), InitError> {
    let device = table.handles.device;
    let missing = [
        (ShaderStage::Vertex, table.handles.vertex_shader == vk::ShaderModule::null()),
        (ShaderStage::Fragment, table.handles.fragment_shader == vk::ShaderModule::null()),
    ];
    let mut code = Vec::with_capacity(2);
    for (stage, needed) in missing {
        if needed {
            code.push((stage, load_shader(table, stage)?));
        }
    }

    for (stage, words) in code {
        let info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            code_size: words.len() * 4,
            p_code: words.as_ptr(),
            ..Default::default()
        };
        // SAFETY: `words` is validated SPIR-V and outlives the call.
        let module = unsafe { table.gpu.create_shader_module(device, &info) }
            .map_err(|r| InitError::vk(VkCall::CreateShaderModule(stage), r))?;
        match stage {
            ShaderStage::Vertex => table.handles.vertex_shader = module,
            ShaderStage::Fragment => table.handles.fragment_shader = module,
        }
    }
    Ok(())
}

/// Builds the triangle pipeline. Shader modules and the (empty) layout are
/// created on first use and reused by later rebuilds.
pub(crate) fn create_pipeline(table: &mut CapabilityTable) -> Result<(), InitError> {
    ensure_shader_modules(table)?;
    let device = table.handles.device;

    if table.handles.pipeline_layout == vk::PipelineLayout::null() {
        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            ..Default::default()
        };
        table.handles.pipeline_layout = unsafe { table.gpu.create_pipeline_layout(device, &layout_info) }
            .map_err(|r| InitError::vk(VkCall::CreatePipelineLayout, r))?;
    }

    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: table.handles.vertex_shader,
            p_name: SHADER_ENTRY.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: table.handles.fragment_shader,
            p_name: SHADER_ENTRY.as_ptr(),
            ..Default::default()
        },
    ];

    // Vertices come from gl_VertexIndex, so no buffers are bound.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        ..Default::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        primitive_restart_enable: vk::FALSE,
        ..Default::default()
    };
    // Viewport and scissor are dynamic; only the counts are fixed.
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        scissor_count: 1,
        ..Default::default()
    };
    let rasterization = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        depth_clamp_enable: vk::FALSE,
        rasterizer_discard_enable: vk::FALSE,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::CLOCKWISE,
        depth_bias_enable: vk::FALSE,
        line_width: 1.0,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        sample_shading_enable: vk::FALSE,
        ..Default::default()
    };
    let blend_attachment = vk::PipelineColorBlendAttachmentState {
        blend_enable: vk::FALSE,
        color_write_mask: vk::ColorComponentFlags::RGBA,
        ..Default::default()
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        logic_op_enable: vk::FALSE,
        attachment_count: 1,
        p_attachments: &blend_attachment,
        ..Default::default()
    };
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dynamic_states.len() as u32,
        p_dynamic_states: dynamic_states.as_ptr(),
        ..Default::default()
    };

    let create_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &rasterization,
        p_multisample_state: &multisample,
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic,
        layout: table.handles.pipeline_layout,
        render_pass: table.handles.render_pass,
        subpass: 0,
        ..Default::default()
    };
    // SAFETY: every state struct above outlives the call.
    table.handles.pipeline = unsafe { table.gpu.create_graphics_pipeline(device, &create_info) }
        .map_err(|r| InitError::vk(VkCall::CreateGraphicsPipeline, r))?;
    info!(format = ?table.config.format.format, "graphics pipeline created");
    Ok(())
}
