//! Primitives generated query cases
//!
//! One query around one draw of 32 primitives per topology. The expected
//! count follows the topology's vertex to primitive formula, rasterization
//! state must not affect it. Rasterizer discard variants are gated on the
//! corresponding feature bit.

use crate::case::{SourceCollection, TestCase, TestInstance, TestRun};
use crate::cases::{read_u32, read_u64, upload_f32, RenderTarget};
use crate::cmd;
use crate::context;
use crate::graphics;
use crate::hw;
use crate::memory;
use crate::query;
use crate::queue;
use crate::shader;
use crate::status::{TestError, TestStatus};
use crate::tree::TestCaseGroup;

use ash::vk;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;

/// Primitives every draw is expected to generate
const PRIMITIVES: u64 = 32;

const VERTEX_SHADER: &str = "\
#version 450

layout (location = 0) in vec4 in_position;

void main()
{
    gl_Position = in_position;
    gl_PointSize = 1.0;
}
";

const FRAGMENT_SHADER: &str = "\
#version 450

layout (location = 0) out vec4 out_color;

void main()
{
    out_color = vec4(1.0, 0.25, 0.0, 1.0);
}
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    Get,
    Copy,
}

impl FetchMode {
    fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Get => "get",
            FetchMode::Copy => "copy",
        }
    }
}

#[derive(Clone, Copy)]
struct PgqParams {
    topology: graphics::Topology,
    fetch: FetchMode,
    sixty_four: bool,
    with_availability: bool,
    /// Cut the pipeline before rasterization
    discard: bool,
}

impl PgqParams {
    fn value_size(&self) -> u64 {
        if self.sixty_four {
            8
        } else {
            4
        }
    }

    fn element_size(&self) -> u64 {
        if self.with_availability {
            self.value_size() * 2
        } else {
            self.value_size()
        }
    }

    fn result_flags(&self) -> query::ResultFlags {
        let mut flags = query::ResultFlags::WAIT;

        if self.sixty_four {
            flags |= query::ResultFlags::TYPE_64;
        }

        if self.with_availability {
            flags |= query::ResultFlags::WITH_AVAILABILITY;
        }

        flags
    }
}

/// Vertices a draw needs to produce [`PRIMITIVES`] primitives
fn vertex_count(topology: graphics::Topology) -> u64 {
    match topology {
        graphics::Topology::POINT_LIST => PRIMITIVES,
        graphics::Topology::LINE_LIST => PRIMITIVES * 2,
        graphics::Topology::LINE_STRIP => PRIMITIVES + 1,
        graphics::Topology::TRIANGLE_LIST => PRIMITIVES * 3,
        graphics::Topology::TRIANGLE_STRIP => PRIMITIVES + 2,
        other => panic!("unsupported topology {:?}", other),
    }
}

/// Zigzag strip across the viewport, keeps every primitive non-degenerate
fn build_vertices(count: u64) -> Vec<f32> {
    let mut data = Vec::with_capacity(count as usize * 4);

    for index in 0..count {
        let t = index as f32 / count as f32;
        let x = -1.0 + 2.0 * t;
        let y = if index % 2 == 0 { -0.5 } else { 0.5 };

        data.extend_from_slice(&[x, y, 0.0, 1.0]);
    }

    data
}

struct PgqCase {
    name: String,
    description: String,
    params: PgqParams,
}

impl TestCase for PgqCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn init_programs(&self, sources: &mut SourceCollection) {
        sources.add("vert", shader::Stage::Vertex, VERTEX_SHADER);

        if !self.params.discard {
            sources.add("frag", shader::Stage::Fragment, FRAGMENT_SHADER);
        }
    }

    fn check_support(&self, ctx: &context::Context) -> Result<(), TestError> {
        if !ctx.features().primitives_generated_query {
            return Err(TestError::NotSupported(
                "VK_QUERY_TYPE_PRIMITIVES_GENERATED_EXT not supported".to_string(),
            ));
        }

        if self.params.discard
            && !ctx.features().primitives_generated_query_with_rasterizer_discard
        {
            return Err(TestError::NotSupported(
                "primitivesGeneratedQueryWithRasterizerDiscard not supported".to_string(),
            ));
        }

        Ok(())
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(PgqInstance {
            params: self.params,
        })
    }
}

struct PgqInstance {
    params: PgqParams,
}

impl TestInstance for PgqInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        let params = self.params;
        let device = run.ctx.device();

        let count = vertex_count(params.topology);
        let vertex_data = build_vertices(count);

        let target = RenderTarget::new(device, WIDTH, HEIGHT, false)?;

        let vertices = memory::Buffer::new(
            device,
            &memory::BufferCfg {
                size: std::mem::size_of_val(vertex_data.as_slice()) as u64,
                usage: memory::BufferType::VERTEX_BUFFER,
                properties: hw::MemoryProperty::HOST_VISIBLE | hw::MemoryProperty::HOST_COHERENT,
            },
        )?;

        upload_f32(&vertices, &vertex_data)?;

        let vs = shader::Shader::new(
            device,
            &shader::ShaderCfg {
                stage: shader::Stage::Vertex,
                entry: "main",
            },
            run.binaries.require("vert"),
        )?;

        let fs = if params.discard {
            None
        } else {
            Some(shader::Shader::new(
                device,
                &shader::ShaderCfg {
                    stage: shader::Stage::Fragment,
                    entry: "main",
                },
                run.binaries.require("frag"),
            )?)
        };

        let pipeline = graphics::Pipeline::new(&graphics::PipelineCfg {
            device,
            vertex_shader: &vs,
            vertex_size: 4 * std::mem::size_of::<f32>() as u32,
            vert_input: &[graphics::VertexInputCfg {
                location: 0,
                binding: 0,
                format: memory::ImageFormat::R32G32B32A32_SFLOAT,
                offset: 0,
            }],
            frag_shader: fs.as_ref(),
            topology: params.topology,
            extent: target.color.extent(),
            render_pass: &target.render_pass,
            subpass_index: 0,
            enable_depth_test: false,
            rasterizer_discard: params.discard,
            flags: vk::PipelineCreateFlags::empty(),
            cache: None,
        })?;

        let pool = query::QueryPool::new(
            device,
            &query::QueryPoolCfg {
                query_type: query::QueryType::PRIMITIVES_GENERATED_EXT,
                count: 1,
            },
        )?;

        let readback = memory::Buffer::new(
            device,
            &memory::BufferCfg {
                size: params.element_size(),
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

        let buffer = cmd_pool.allocate()?;
        buffer.reset_query_pool(&pool, 0, 1);
        buffer.begin_render_pass(&target.render_pass, &target.framebuffer, [0.0; 4]);
        buffer.bind_graphics_pipeline(&pipeline);
        buffer.bind_vertex_buffer(&vertices);

        buffer.begin_query(&pool, 0, false);
        buffer.draw(count as u32, 1, 0, 0);
        buffer.end_query(&pool, 0);

        buffer.end_render_pass();

        if params.fetch == FetchMode::Copy {
            buffer.copy_query_pool_results(
                &pool,
                0,
                1,
                &readback,
                0,
                params.element_size(),
                params.result_flags(),
            );
            buffer.set_barrier(
                &readback,
                cmd::AccessType::TRANSFER_WRITE,
                cmd::AccessType::HOST_READ,
                cmd::PipelineStage::TRANSFER,
                cmd::PipelineStage::HOST,
            );
        }

        let exec = buffer.commit()?;
        run.ctx.queue().exec(&queue::ExecInfo {
            buffer: &exec,
            timeout: u64::MAX,
        })?;

        let (generated, available) = self.capture(&pool, &readback)?;

        run.log.message(format!(
            "primitives generated: {}, expected {}",
            generated, PRIMITIVES
        ));

        if params.with_availability && available == 0 {
            return Ok(TestStatus::fail(
                "Availability was 0 although results were waited for",
            ));
        }

        if generated != PRIMITIVES {
            return Ok(TestStatus::fail(format!(
                "primitives generated == {}, expected {}",
                generated, PRIMITIVES
            )));
        }

        Ok(TestStatus::pass("Query result verification passed"))
    }
}

impl PgqInstance {
    fn capture(
        &self,
        pool: &query::QueryPool,
        readback: &memory::Buffer,
    ) -> Result<(u64, u64), TestError> {
        let params = &self.params;

        let bytes = match params.fetch {
            FetchMode::Get => {
                let mut data = vec![0u8; params.element_size() as usize];

                match pool.fetch_raw(0, 1, &mut data, params.element_size(), params.result_flags())
                {
                    vk::Result::SUCCESS => data,
                    code => {
                        return Err(TestError::VkCall {
                            call: "vkGetQueryPoolResults",
                            code,
                        })
                    }
                }
            }
            FetchMode::Copy => readback.read()?,
        };

        let (value, avail) = if params.sixty_four {
            (
                read_u64(&bytes, 0),
                if params.with_availability {
                    read_u64(&bytes, 8)
                } else {
                    1
                },
            )
        } else {
            (
                u64::from(read_u32(&bytes, 0)),
                if params.with_availability {
                    u64::from(read_u32(&bytes, 4))
                } else {
                    1
                },
            )
        };

        Ok((value, avail))
    }
}

pub fn group() -> TestCaseGroup {
    let mut pgq = TestCaseGroup::new(
        "primitives_generated",
        "Primitives generated query cases",
    );

    let topologies = [
        (graphics::Topology::POINT_LIST, "point_list"),
        (graphics::Topology::LINE_LIST, "line_list"),
        (graphics::Topology::LINE_STRIP, "line_strip"),
        (graphics::Topology::TRIANGLE_LIST, "triangle_list"),
        (graphics::Topology::TRIANGLE_STRIP, "triangle_strip"),
    ];

    for fetch in [FetchMode::Get, FetchMode::Copy] {
        for sixty_four in [false, true] {
            for with_availability in [false, true] {
                for (discard, rast_name) in [(false, "rast"), (true, "no_rast")] {
                    for (topology, topology_name) in topologies {
                        let params = PgqParams {
                            topology,
                            fetch,
                            sixty_four,
                            with_availability,
                            discard,
                        };

                        let avail_part = if with_availability {
                            "_with_availability"
                        } else {
                            ""
                        };
                        let size = if sixty_four { 64 } else { 32 };

                        let name = format!(
                            "{}_{}bit{}_{}_{}",
                            fetch.as_str(),
                            size,
                            avail_part,
                            rast_name,
                            topology_name
                        );
                        let description = format!(
                            "{} primitives generated by a {} draw, {} results as {}bit values",
                            if discard {
                                "Count with rasterizer discard"
                            } else {
                                "Count"
                            },
                            topology_name,
                            fetch.as_str(),
                            size
                        );

                        pgq.add_case(Box::new(PgqCase {
                            name,
                            description,
                            params,
                        }));
                    }
                }
            }
        }
    }

    pgq
}
