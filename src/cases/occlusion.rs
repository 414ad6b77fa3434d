//! Occlusion query cases
//!
//! Basic cases verify an empty query and a counted draw. The grid cases
//! draw the same test geometry three times with occluders in between and
//! check the sample counts per query slot, across every combination of
//! control flags, result width, wait mode, fetch path and availability.
//! The stride subgroup reads the same pool through unusual result strides.

use crate::case::{SourceCollection, TestCase, TestInstance, TestRun};
use crate::cases::{upload_f32, RenderTarget};
use crate::cmd;
use crate::graphics;
use crate::hw;
use crate::memory;
use crate::query;
use crate::queue;
use crate::shader;
use crate::status::{TestError, TestStatus};
use crate::tree::TestCaseGroup;
use crate::vk_check;

use ash::vk;

const WIDTH: u32 = 128;
const HEIGHT: u32 = 128;

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
    out_color = vec4(0.07, 0.48, 0.75, 1.0);
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitMode {
    /// Block on the submit fence before reading results
    Queue,
    /// Read immediately, relying on the WAIT result flag
    Query,
}

impl WaitMode {
    fn as_str(&self) -> &'static str {
        match self {
            WaitMode::Queue => "queue",
            WaitMode::Query => "query",
        }
    }
}

#[derive(Clone, Copy)]
struct OcclusionParams {
    precise: bool,
    sixty_four: bool,
    wait: WaitMode,
    fetch: FetchMode,
    with_availability: bool,
    topology: graphics::Topology,
    /// Distance between per-query results in bytes
    stride: u64,
}

impl OcclusionParams {
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
        let mut flags = query::ResultFlags::empty();

        if self.sixty_four {
            flags |= query::ResultFlags::TYPE_64;
        }

        if self.wait == WaitMode::Query {
            flags |= query::ResultFlags::WAIT;
        }

        if self.with_availability {
            flags |= query::ResultFlags::WITH_AVAILABILITY;
        }

        flags
    }
}

/// Per-slot expectation, inclusive bounds for the precise path
struct Expected {
    min: u64,
    max: u64,
}

fn expected_values(topology: graphics::Topology) -> [Expected; 3] {
    if topology == graphics::Topology::POINT_LIST {
        // Slot 1 keeps one point visible, slot 2 none
        [
            Expected { min: 3, max: 3 },
            Expected { min: 1, max: 1 },
            Expected { min: 0, max: 0 },
        ]
    } else {
        // Half of the centered quad, 3% tolerance for fill rule differences
        let area = (WIDTH / 2) * (HEIGHT / 2) / 2;
        let min = (0.97 * area as f32) as u64;
        let max = (1.03 * area as f32) as u64;

        [
            Expected { min, max },
            Expected { min, max },
            Expected { min: 0, max: 0 },
        ]
    }
}

fn validate(
    run: &mut TestRun,
    params: &OcclusionParams,
    results: &[u64],
    availability: &[u64],
) -> TestStatus {
    let expected = expected_values(params.topology);
    let mut passed = true;

    for (slot, value) in results.iter().enumerate() {
        run.log
            .message(format!("query[slot == {}] result == {}", slot, value));

        if params.with_availability && availability[slot] == 0 {
            run.log.message(format!(
                "availability was 0 for slot {}, results were waited for",
                slot
            ));
            passed = false;
            continue;
        }

        let want = &expected[slot];

        if params.precise || want.max == 0 {
            if *value < want.min || *value > want.max {
                run.log.message(format!(
                    "wrong value for slot {}, expected {}..{}, got {}",
                    slot, want.min, want.max, value
                ));
                passed = false;
            }
        } else if *value == 0 {
            run.log.message(format!(
                "wrong value for slot {}, expected any non-zero value, got 0",
                slot
            ));
            passed = false;
        }
    }

    if passed {
        TestStatus::pass("Query result verification passed")
    } else {
        TestStatus::fail("Query result verification failed")
    }
}

fn add_programs(sources: &mut SourceCollection) {
    sources.add("vert", shader::Stage::Vertex, VERTEX_SHADER);
    sources.add("frag", shader::Stage::Fragment, FRAGMENT_SHADER);
}

/// Common per-instance state: target, shaders, pipeline, vertex data
struct DrawState {
    target: RenderTarget,
    vertices: memory::Buffer,
    pipeline: graphics::Pipeline,
    _vs: shader::Shader,
    _fs: shader::Shader,
}

impl DrawState {
    fn new(
        run: &TestRun,
        topology: graphics::Topology,
        vertex_data: &[f32],
    ) -> Result<DrawState, TestError> {
        let device = run.ctx.device();
        let target = RenderTarget::new(device, WIDTH, HEIGHT, true)?;

        let vertices = memory::Buffer::new(
            device,
            &memory::BufferCfg {
                size: std::mem::size_of_val(vertex_data) as u64,
                usage: memory::BufferType::VERTEX_BUFFER,
                properties: hw::MemoryProperty::HOST_VISIBLE | hw::MemoryProperty::HOST_COHERENT,
            },
        )?;

        upload_f32(&vertices, vertex_data)?;

        let vs = shader::Shader::new(
            device,
            &shader::ShaderCfg {
                stage: shader::Stage::Vertex,
                entry: "main",
            },
            run.binaries.require("vert"),
        )?;

        let fs = shader::Shader::new(
            device,
            &shader::ShaderCfg {
                stage: shader::Stage::Fragment,
                entry: "main",
            },
            run.binaries.require("frag"),
        )?;

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
            frag_shader: Some(&fs),
            topology,
            extent: target.color.extent(),
            render_pass: &target.render_pass,
            subpass_index: 0,
            enable_depth_test: true,
            rasterizer_discard: false,
            flags: vk::PipelineCreateFlags::empty(),
            cache: None,
        })?;

        Ok(DrawState {
            target,
            vertices,
            pipeline,
            _vs: vs,
            _fs: fs,
        })
    }
}

struct BasicOcclusionCase {
    name: &'static str,
    description: &'static str,
    precise: bool,
}

impl TestCase for BasicOcclusionCase {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn init_programs(&self, sources: &mut SourceCollection) {
        add_programs(sources);
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(BasicOcclusionInstance {
            precise: self.precise,
        })
    }
}

struct BasicOcclusionInstance {
    precise: bool,
}

impl TestInstance for BasicOcclusionInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        #[rustfmt::skip]
        let vertex_data: [f32; 12] = [
            0.5, 0.5, 0.0, 1.0,
            0.5, 0.0, 0.0, 1.0,
            0.0, 0.5, 0.0, 1.0,
        ];

        let state = DrawState::new(run, graphics::Topology::POINT_LIST, &vertex_data)?;
        let device = run.ctx.device();

        let pool = query::QueryPool::new(
            device,
            &query::QueryPoolCfg {
                query_type: query::QueryType::OCCLUSION,
                count: 2,
            },
        )?;

        let cmd_pool = cmd::Pool::new(
            device,
            &cmd::PoolCfg {
                family_index: run.ctx.queue_family_index(),
            },
        )?;

        let buffer = cmd_pool.allocate()?;
        buffer.reset_query_pool(&pool, 0, 2);
        buffer.begin_render_pass(&state.target.render_pass, &state.target.framebuffer, [0.0; 4]);
        buffer.bind_graphics_pipeline(&state.pipeline);
        buffer.bind_vertex_buffer(&state.vertices);

        // Slot 0 stays empty, slot 1 wraps the draw
        buffer.begin_query(&pool, 0, self.precise);
        buffer.end_query(&pool, 0);

        buffer.begin_query(&pool, 1, self.precise);
        buffer.draw(3, 1, 0, 0);
        buffer.end_query(&pool, 1);

        buffer.end_render_pass();

        let exec = buffer.commit()?;
        run.ctx.queue().exec(&queue::ExecInfo {
            buffer: &exec,
            timeout: u64::MAX,
        })?;

        let results = vk_check!(
            "vkGetQueryPoolResults",
            pool.fetch_u64(0, 2, query::ResultFlags::WAIT)
        )?;

        for (slot, value) in results.iter().enumerate() {
            run.log
                .message(format!("query[slot == {}] result == {}", slot, value));
        }

        if results[0] != 0 {
            return Ok(TestStatus::fail(format!(
                "Empty query reported {} samples, expected 0",
                results[0]
            )));
        }

        if self.precise {
            if results[1] != 3 {
                return Ok(TestStatus::fail(format!(
                    "Precise query reported {} samples, expected 3",
                    results[1]
                )));
            }
        } else if results[1] == 0 {
            return Ok(TestStatus::fail(
                "Conservative query reported 0 samples, expected non-zero",
            ));
        }

        Ok(TestStatus::pass("Query result verification passed"))
    }
}

struct OcclusionCase {
    name: String,
    description: String,
    params: OcclusionParams,
}

impl TestCase for OcclusionCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn init_programs(&self, sources: &mut SourceCollection) {
        add_programs(sources);
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(OcclusionInstance {
            params: self.params,
        })
    }
}

struct OcclusionInstance {
    params: OcclusionParams,
}

impl OcclusionInstance {
    /// Read back one value (and availability word) per query slot
    ///
    /// A NOT_READY result after all the waiting is a failure, reported as
    /// an error so the runner turns it into one
    fn capture(
        &self,
        pool: &query::QueryPool,
        readback: &memory::Buffer,
    ) -> Result<(Vec<u64>, Vec<u64>), TestError> {
        let params = &self.params;
        let size = (params.stride * 3) as usize;

        let bytes = match params.fetch {
            FetchMode::Get => {
                let mut data = vec![0u8; size];

                match pool.fetch_raw(0, 3, &mut data, params.stride, params.result_flags()) {
                    vk::Result::SUCCESS => data,
                    vk::Result::NOT_READY => {
                        return Err(TestError::Internal(
                            "vkGetQueryPoolResults returned VK_NOT_READY after a wait".to_string(),
                        ))
                    }
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

        let mut results = Vec::with_capacity(3);
        let mut availability = Vec::with_capacity(3);

        for slot in 0..3usize {
            let base = slot * params.stride as usize;

            if params.sixty_four {
                results.push(crate::cases::read_u64(&bytes, base));

                if params.with_availability {
                    availability.push(crate::cases::read_u64(&bytes, base + 8));
                }
            } else {
                results.push(u64::from(crate::cases::read_u32(&bytes, base)));

                if params.with_availability {
                    availability.push(u64::from(crate::cases::read_u32(&bytes, base + 4)));
                }
            }
        }

        if !params.with_availability {
            availability = vec![1; 3];
        }

        Ok((results, availability))
    }
}

impl TestInstance for OcclusionInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        let params = self.params;

        // Test geometry sits at depth 0.5, occluders win at depth 0.0.
        // Slot 1 geometry loses two points (shared positions with the
        // partial occluder), slot 2 geometry is fully covered.
        #[rustfmt::skip]
        let vertex_data: [f32; 36] = [
             0.5,  0.5, 0.5, 1.0,
             0.5, -0.5, 0.5, 1.0,
            -0.5,  0.5, 0.5, 1.0,

            -0.5, -0.5, 0.0, 1.0,
             0.5, -0.5, 0.0, 1.0,
            -0.5,  0.5, 0.0, 1.0,

             0.5,  0.5, 0.0, 1.0,
             0.5, -0.5, 0.0, 1.0,
            -0.5,  0.5, 0.0, 1.0,
        ];

        let state = DrawState::new(run, params.topology, &vertex_data)?;
        let device = run.ctx.device();

        let pool = query::QueryPool::new(
            device,
            &query::QueryPoolCfg {
                query_type: query::QueryType::OCCLUSION,
                count: 3,
            },
        )?;

        let readback = memory::Buffer::new(
            device,
            &memory::BufferCfg {
                size: params.stride * 3,
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
        buffer.reset_query_pool(&pool, 0, 3);
        buffer.begin_render_pass(&state.target.render_pass, &state.target.framebuffer, [0.0; 4]);
        buffer.bind_graphics_pipeline(&state.pipeline);
        buffer.bind_vertex_buffer(&state.vertices);

        buffer.begin_query(&pool, 0, params.precise);
        buffer.draw(3, 1, 0, 0);
        buffer.end_query(&pool, 0);

        buffer.draw(3, 1, 3, 0);

        buffer.begin_query(&pool, 1, params.precise);
        buffer.draw(3, 1, 0, 0);
        buffer.end_query(&pool, 1);

        buffer.draw(3, 1, 6, 0);

        buffer.begin_query(&pool, 2, params.precise);
        buffer.draw(3, 1, 0, 0);
        buffer.end_query(&pool, 2);

        buffer.end_render_pass();

        // With a query-side wait the copy may be recorded before anything
        // completed, the WAIT flag orders it
        if params.fetch == FetchMode::Copy && params.wait == WaitMode::Query {
            buffer.copy_query_pool_results(
                &pool,
                0,
                3,
                &readback,
                0,
                params.stride,
                params.result_flags(),
            );
        }

        let exec = buffer.commit()?;
        run.ctx.queue().exec(&queue::ExecInfo {
            buffer: &exec,
            timeout: u64::MAX,
        })?;

        if params.fetch == FetchMode::Copy && params.wait == WaitMode::Queue {
            let copy = cmd_pool.allocate()?;
            copy.copy_query_pool_results(
                &pool,
                0,
                3,
                &readback,
                0,
                params.stride,
                params.result_flags(),
            );

            let exec_copy = copy.commit()?;
            run.ctx.queue().exec(&queue::ExecInfo {
                buffer: &exec_copy,
                timeout: u64::MAX,
            })?;
        }

        let (results, availability) = self.capture(&pool, &readback)?;

        Ok(validate(run, &params, &results, &availability))
    }
}

pub fn group() -> TestCaseGroup {
    let mut occlusion = TestCaseGroup::new("occlusion", "Occlusion query cases");

    occlusion.add_case(Box::new(BasicOcclusionCase {
        name: "basic_conservative",
        description: "draw with conservative occlusion query",
        precise: false,
    }));
    occlusion.add_case(Box::new(BasicOcclusionCase {
        name: "basic_precise",
        description: "draw with precise occlusion query",
        precise: true,
    }));

    let topologies = [
        (graphics::Topology::POINT_LIST, "points"),
        (graphics::Topology::TRIANGLE_LIST, "triangles"),
    ];

    for (precise, control) in [(false, "conservative"), (true, "precise")] {
        for (topology, topology_name) in topologies {
            for sixty_four in [false, true] {
                for wait in [WaitMode::Queue, WaitMode::Query] {
                    for fetch in [FetchMode::Get, FetchMode::Copy] {
                        for with_availability in [false, true] {
                            let mut params = OcclusionParams {
                                precise,
                                sixty_four,
                                wait,
                                fetch,
                                with_availability,
                                topology,
                                stride: 0,
                            };
                            params.stride = params.element_size();

                            let size = if sixty_four { 64 } else { 32 };
                            let avail = if with_availability { "with" } else { "without" };

                            let name = format!(
                                "{}_results_{}_size_{}_wait_{}_{}_availability_draw_{}",
                                fetch.as_str(),
                                control,
                                size,
                                wait.as_str(),
                                avail,
                                topology_name
                            );
                            let description = format!(
                                "draw occluded {} with {}, {} results {} availability bit \
                                 as {}bit variables, wait on {}",
                                topology_name,
                                control,
                                fetch.as_str(),
                                avail,
                                size,
                                wait.as_str()
                            );

                            occlusion.add_case(Box::new(OcclusionCase {
                                name,
                                description,
                                params,
                            }));
                        }
                    }
                }
            }
        }
    }

    // Same pool read through widened strides
    for fetch in [FetchMode::Get, FetchMode::Copy] {
        for with_availability in [false, true] {
            for sixty_four in [false, true] {
                let value_size: u64 = if sixty_four { 8 } else { 4 };

                for multiplier in [1u64, 2, 3, 4, 5, 13, 1024] {
                    let stride = multiplier * value_size;
                    let element = if with_availability {
                        value_size * 2
                    } else {
                        value_size
                    };

                    if element > stride {
                        continue;
                    }

                    let params = OcclusionParams {
                        precise: false,
                        sixty_four,
                        wait: WaitMode::Queue,
                        fetch,
                        with_availability,
                        topology: graphics::Topology::POINT_LIST,
                        stride,
                    };

                    let size = if sixty_four { 64 } else { 32 };
                    let avail = if with_availability { "with" } else { "without" };

                    let name = format!(
                        "{}_results_size_{}_stride_{}_{}_availability",
                        fetch.as_str(),
                        size,
                        stride,
                        avail
                    );
                    let description = format!(
                        "{} results {} availability bit as {}bit variables, stride {}",
                        fetch.as_str(),
                        avail,
                        size,
                        stride
                    );

                    occlusion.add_case(Box::new(OcclusionCase {
                        name,
                        description,
                        params,
                    }));
                }
            }
        }
    }

    occlusion
}
