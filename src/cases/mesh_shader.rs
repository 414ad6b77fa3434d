//! Mesh shader smoke cases for VK_EXT_mesh_shader
//!
//! A mesh shader emits a full screen quad with a per primitive color and
//! the color buffer is read back and compared. The task variant routes the
//! color choice through the task payload.

use crate::case::{SourceCollection, TestCase, TestInstance, TestRun};
use crate::cases::RenderTarget;
use crate::cmd;
use crate::context;
use crate::dev;
use crate::hw;
use crate::memory;
use crate::queue;
use crate::shader;
use crate::status::{TestError, TestStatus};
use crate::tree::TestCaseGroup;

use ash::ext::mesh_shader;
use ash::vk;

use std::sync::Arc;

const WIDTH: u32 = 8;
const HEIGHT: u32 = 8;

/// R8G8B8A8_UNORM blue, the color every shader below writes
const EXPECTED_PIXEL: [u8; 4] = [0, 0, 255, 255];

const MESH_SHADER: &str = "\
#version 450
#extension GL_EXT_mesh_shader : enable

layout (local_size_x = 1) in;
layout (triangles) out;
layout (max_vertices = 4, max_primitives = 2) out;

layout (location = 0) out perprimitiveEXT vec4 triangleColor[];

void main ()
{
    SetMeshOutputsEXT(4u, 2u);

    gl_MeshVerticesEXT[0].gl_Position = vec4(-1.0, -1.0, 0.0, 1.0);
    gl_MeshVerticesEXT[1].gl_Position = vec4(-1.0,  1.0, 0.0, 1.0);
    gl_MeshVerticesEXT[2].gl_Position = vec4( 1.0, -1.0, 0.0, 1.0);
    gl_MeshVerticesEXT[3].gl_Position = vec4( 1.0,  1.0, 0.0, 1.0);

    gl_PrimitiveTriangleIndicesEXT[0] = uvec3(0u, 1u, 2u);
    gl_PrimitiveTriangleIndicesEXT[1] = uvec3(1u, 3u, 2u);

    triangleColor[0] = vec4(0.0, 0.0, 1.0, 1.0);
    triangleColor[1] = vec4(0.0, 0.0, 1.0, 1.0);
}
";

const TASK_SHADER: &str = "\
#version 450
#extension GL_EXT_mesh_shader : enable

layout (local_size_x = 1) in;

struct TaskData {
    uint colorIndex;
};
taskPayloadSharedEXT TaskData td;

void main ()
{
    td.colorIndex = 1u;
    EmitMeshTasksEXT(1u, 1u, 1u);
}
";

const PAYLOAD_MESH_SHADER: &str = "\
#version 450
#extension GL_EXT_mesh_shader : enable

layout (local_size_x = 1) in;
layout (triangles) out;
layout (max_vertices = 4, max_primitives = 2) out;

layout (location = 0) out perprimitiveEXT vec4 triangleColor[];

struct TaskData {
    uint colorIndex;
};
taskPayloadSharedEXT TaskData td;

void main ()
{
    SetMeshOutputsEXT(4u, 2u);

    gl_MeshVerticesEXT[0].gl_Position = vec4(-1.0, -1.0, 0.0, 1.0);
    gl_MeshVerticesEXT[1].gl_Position = vec4(-1.0,  1.0, 0.0, 1.0);
    gl_MeshVerticesEXT[2].gl_Position = vec4( 1.0, -1.0, 0.0, 1.0);
    gl_MeshVerticesEXT[3].gl_Position = vec4( 1.0,  1.0, 0.0, 1.0);

    gl_PrimitiveTriangleIndicesEXT[0] = uvec3(0u, 1u, 2u);
    gl_PrimitiveTriangleIndicesEXT[1] = uvec3(1u, 3u, 2u);

    vec4 color = (td.colorIndex == 1u)
        ? vec4(0.0, 0.0, 1.0, 1.0)
        : vec4(1.0, 0.0, 0.0, 1.0);

    triangleColor[0] = color;
    triangleColor[1] = color;
}
";

const FRAGMENT_SHADER: &str = "\
#version 450
#extension GL_EXT_mesh_shader : enable

layout (location = 0) in perprimitiveEXT vec4 triangleColor;
layout (location = 0) out vec4 outColor;

void main ()
{
    outColor = triangleColor;
}
";

/// Graphics pipeline with task/mesh stages instead of vertex input
struct MeshPipeline {
    i_core: Arc<dev::Core>,
    i_layout: vk::PipelineLayout,
    i_pipeline: vk::Pipeline,
}

impl MeshPipeline {
    fn new(
        device: &dev::Device,
        target: &RenderTarget,
        task: Option<&shader::Shader>,
        mesh: &shader::Shader,
        frag: &shader::Shader,
    ) -> Result<MeshPipeline, TestError> {
        let layout_info = vk::PipelineLayoutCreateInfo::default();

        let layout = match unsafe {
            device
                .device()
                .create_pipeline_layout(&layout_info, device.allocator())
        } {
            Ok(layout) => layout,
            Err(code) => {
                return Err(TestError::VkCall {
                    call: "vkCreatePipelineLayout",
                    code,
                })
            }
        };

        let mut stages = Vec::with_capacity(3);

        if let Some(task) = task {
            stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk::ShaderStageFlags::TASK_EXT)
                    .module(task.module())
                    .name(task.entry()),
            );
        }

        stages.push(
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::MESH_EXT)
                .module(mesh.module())
                .name(mesh.entry()),
        );
        stages.push(
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag.module())
                .name(frag.entry()),
        );

        let extent = target.color.extent();

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(std::slice::from_ref(&viewport))
            .scissors(std::slice::from_ref(&scissor));

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let attachment = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::RGBA,
            ..Default::default()
        };

        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(std::slice::from_ref(&attachment));

        // Mesh pipelines carry no vertex input or input assembly state
        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .layout(layout)
            .render_pass(target.render_pass.render_pass())
            .subpass(0);

        let pipeline = match unsafe {
            device.device().create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&info),
                device.allocator(),
            )
        } {
            Ok(mut pipelines) => pipelines.remove(0),
            Err((_, code)) => {
                unsafe {
                    device
                        .device()
                        .destroy_pipeline_layout(layout, device.allocator())
                };

                return Err(TestError::VkCall {
                    call: "vkCreateGraphicsPipelines",
                    code,
                });
            }
        };

        Ok(MeshPipeline {
            i_core: device.core().clone(),
            i_layout: layout,
            i_pipeline: pipeline,
        })
    }

    fn pipeline(&self) -> vk::Pipeline {
        self.i_pipeline
    }
}

impl Drop for MeshPipeline {
    fn drop(&mut self) {
        let device = self.i_core.device();
        let alloc = self.i_core.allocator();

        unsafe {
            device.destroy_pipeline(self.i_pipeline, alloc);
            device.destroy_pipeline_layout(self.i_layout, alloc);
        }
    }
}

struct MeshSmokeCase {
    name: &'static str,
    description: &'static str,
    with_task: bool,
}

impl TestCase for MeshSmokeCase {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn init_programs(&self, sources: &mut SourceCollection) {
        if self.with_task {
            sources.add("task", shader::Stage::Task, TASK_SHADER);
            sources.add("mesh", shader::Stage::Mesh, PAYLOAD_MESH_SHADER);
        } else {
            sources.add("mesh", shader::Stage::Mesh, MESH_SHADER);
        }

        sources.add("frag", shader::Stage::Fragment, FRAGMENT_SHADER);
    }

    fn check_support(&self, ctx: &context::Context) -> Result<(), TestError> {
        if !ctx.has_device_extension(mesh_shader::NAME) {
            return Err(TestError::NotSupported(
                "VK_EXT_mesh_shader not supported".to_string(),
            ));
        }

        if !ctx.features().mesh_shader {
            return Err(TestError::NotSupported(
                "Mesh shader not supported".to_string(),
            ));
        }

        if self.with_task && !ctx.features().task_shader {
            return Err(TestError::NotSupported(
                "Task shader not supported".to_string(),
            ));
        }

        Ok(())
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(MeshSmokeInstance {
            with_task: self.with_task,
        })
    }
}

struct MeshSmokeInstance {
    with_task: bool,
}

impl TestInstance for MeshSmokeInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        let device = run.ctx.device();

        let target = RenderTarget::new(device, WIDTH, HEIGHT, false)?;

        let task = if self.with_task {
            Some(shader::Shader::new(
                device,
                &shader::ShaderCfg {
                    stage: shader::Stage::Task,
                    entry: "main",
                },
                run.binaries.require("task"),
            )?)
        } else {
            None
        };

        let mesh = shader::Shader::new(
            device,
            &shader::ShaderCfg {
                stage: shader::Stage::Mesh,
                entry: "main",
            },
            run.binaries.require("mesh"),
        )?;

        let frag = shader::Shader::new(
            device,
            &shader::ShaderCfg {
                stage: shader::Stage::Fragment,
                entry: "main",
            },
            run.binaries.require("frag"),
        )?;

        let pipeline = MeshPipeline::new(device, &target, task.as_ref(), &mesh, &frag)?;

        let readback = memory::Buffer::new(
            device,
            &memory::BufferCfg {
                size: u64::from(WIDTH * HEIGHT * 4),
                usage: memory::BufferType::TRANSFER_DST,
                properties: hw::MemoryProperty::HOST_VISIBLE | hw::MemoryProperty::HOST_COHERENT,
            },
        )?;

        let cmd_pool = cmd::Pool::new(
            device,
            &cmd::PoolCfg {
                family_index: run.ctx.queue_family_index(),
            },
        )?;

        let loader = mesh_shader::Device::new(run.ctx.lib().instance(), device.device());

        let buffer = cmd_pool.allocate()?;
        buffer.begin_render_pass(&target.render_pass, &target.framebuffer, [0.0, 0.0, 0.0, 1.0]);

        unsafe {
            device.device().cmd_bind_pipeline(
                buffer.cmd_buffer(),
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.pipeline(),
            );
            loader.cmd_draw_mesh_tasks(buffer.cmd_buffer(), 1, 1, 1);
        }

        buffer.end_render_pass();
        buffer.copy_image_to_buffer(&target.color, &readback);

        let exec = buffer.commit()?;
        run.ctx.queue().exec(&queue::ExecInfo {
            buffer: &exec,
            timeout: u64::MAX,
        })?;

        let pixels = readback.read()?;

        for (index, pixel) in pixels.chunks_exact(4).enumerate() {
            if pixel != EXPECTED_PIXEL.as_slice() {
                run.log.message(format!(
                    "pixel ({}, {}) is [{}, {}, {}, {}], expected [0, 0, 255, 255]",
                    index as u32 % WIDTH,
                    index as u32 / WIDTH,
                    pixel[0],
                    pixel[1],
                    pixel[2],
                    pixel[3]
                ));

                return Ok(TestStatus::fail(
                    "Color buffer does not match the expected color",
                ));
            }
        }

        Ok(TestStatus::pass("Pass"))
    }
}

pub fn group() -> TestCaseGroup {
    let mut smoke = TestCaseGroup::new("smoke", "Mesh shader plumbing checks");

    smoke.add_case(Box::new(MeshSmokeCase {
        name: "mesh",
        description: "Full screen quad out of a single mesh shader work group",
        with_task: false,
    }));
    smoke.add_case(Box::new(MeshSmokeCase {
        name: "task_mesh",
        description: "Full screen quad with the color routed through the task payload",
        with_task: true,
    }));

    let mut root = TestCaseGroup::new("mesh_shader", "VK_EXT_mesh_shader cases");
    root.add_group(smoke);

    root
}
