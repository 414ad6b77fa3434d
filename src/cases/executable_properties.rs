//! Pipeline executable properties cases
//!
//! Every case builds the same pipeline twice against one pipeline cache and
//! compares what `VK_KHR_pipeline_executable_properties` reports for both
//! builds. A warm cache must not change the executable set, its statistics
//! or its internal representations.

use crate::case::{SourceCollection, TestCase, TestInstance, TestRun};
use crate::cases::RenderTarget;
use crate::compute;
use crate::context;
use crate::graphics;
use crate::hw;
use crate::memory;
use crate::shader;
use crate::status::{StatusCode, TestError, TestStatus};
use crate::tree::TestCaseGroup;

use ash::khr::pipeline_executable_properties;
use ash::vk;

use std::fmt;
use std::os::raw::c_char;

const VERTEX_SHADER: &str = "\
#version 450

vec2 positions[3] = vec2[](
    vec2(0.0, -0.5),
    vec2(0.5, 0.5),
    vec2(-0.5, 0.5)
);

void main()
{
    gl_Position = vec4(positions[gl_VertexIndex], 0.0, 1.0);
}
";

const FRAGMENT_SHADER: &str = "\
#version 450

layout (location = 0) out vec4 out_color;

void main()
{
    out_color = vec4(0.1, 0.6, 0.3, 1.0);
}
";

const COMPUTE_SHADER: &str = "\
#version 450

layout (local_size_x = 64) in;

layout (set = 0, binding = 0) buffer Data
{
    uint values[];
};

void main()
{
    values[gl_LocalInvocationIndex] *= 2u;
}
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineKind {
    Graphics,
    Compute,
}

#[derive(Clone, Copy)]
struct ExecutableParams {
    kind: PipelineKind,
    statistics: bool,
    internal_representations: bool,
}

impl ExecutableParams {
    fn pipeline_flags(&self) -> vk::PipelineCreateFlags {
        let mut flags = vk::PipelineCreateFlags::empty();

        if self.statistics {
            flags |= vk::PipelineCreateFlags::CAPTURE_STATISTICS_KHR;
        }

        if self.internal_representations {
            flags |= vk::PipelineCreateFlags::CAPTURE_INTERNAL_REPRESENTATIONS_KHR;
        }

        flags
    }

    fn provided_stages(&self) -> vk::ShaderStageFlags {
        match self.kind {
            PipelineKind::Graphics => {
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
            }
            PipelineKind::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }
}

/// NUL-terminated, non-empty string out of a fixed-size info array
fn checked_string(raw: &[c_char]) -> Option<String> {
    let bytes: Vec<u8> = raw.iter().map(|&c| c as u8).collect();

    checked_text(&bytes)
}

fn checked_text(data: &[u8]) -> Option<String> {
    let nul = data.iter().position(|&b| b == 0)?;

    if nul == 0 {
        return None;
    }

    Some(String::from_utf8_lossy(&data[..nul]).into_owned())
}

struct ExecutableInfo {
    name: String,
    description: String,
    stages: vk::ShaderStageFlags,
    subgroup_size: u32,
}

#[derive(PartialEq, Clone, Copy)]
enum StatisticValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl fmt::Display for StatisticValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatisticValue::Bool(true) => write!(f, "VK_TRUE"),
            StatisticValue::Bool(false) => write!(f, "VK_FALSE"),
            StatisticValue::Int(value) => write!(f, "{}", value),
            StatisticValue::Uint(value) => write!(f, "{}", value),
            StatisticValue::Float(value) => write!(f, "{}", value),
        }
    }
}

struct StatisticInfo {
    name: String,
    description: String,
    value: StatisticValue,
}

struct ExecutablePropertiesCase {
    name: String,
    description: String,
    params: ExecutableParams,
}

impl TestCase for ExecutablePropertiesCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn init_programs(&self, sources: &mut SourceCollection) {
        match self.params.kind {
            PipelineKind::Graphics => {
                sources.add("vert", shader::Stage::Vertex, VERTEX_SHADER);
                sources.add("frag", shader::Stage::Fragment, FRAGMENT_SHADER);
            }
            PipelineKind::Compute => {
                sources.add("comp", shader::Stage::Compute, COMPUTE_SHADER);
            }
        }
    }

    fn check_support(&self, ctx: &context::Context) -> Result<(), TestError> {
        if !ctx.features().pipeline_executable_info {
            return Err(TestError::NotSupported(
                "VK_KHR_pipeline_executable_properties not supported".to_string(),
            ));
        }

        Ok(())
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(ExecutablePropertiesInstance {
            params: self.params,
        })
    }
}

struct ExecutablePropertiesInstance {
    params: ExecutableParams,
}

impl TestInstance for ExecutablePropertiesInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        let device = run.ctx.device();

        let cache = graphics::PipelineCache::new(device, &[])?;
        let loader = pipeline_executable_properties::Device::new(
            run.ctx.lib().instance(),
            device.device(),
        );

        match self.params.kind {
            PipelineKind::Graphics => {
                let target = RenderTarget::new(device, 32, 32, false)?;

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

                let cfg = graphics::PipelineCfg {
                    device,
                    vertex_shader: &vs,
                    vertex_size: 0,
                    vert_input: &[],
                    frag_shader: Some(&fs),
                    topology: graphics::Topology::TRIANGLE_LIST,
                    extent: target.color.extent(),
                    render_pass: &target.render_pass,
                    subpass_index: 0,
                    enable_depth_test: false,
                    rasterizer_discard: false,
                    flags: self.params.pipeline_flags(),
                    cache: Some(&cache),
                };

                // The first build fills the cache, the second hits it
                let initial = graphics::Pipeline::new(&cfg)?;
                let cached = graphics::Pipeline::new(&cfg)?;

                self.verify(run, &loader, [initial.pipeline(), cached.pipeline()])
            }
            PipelineKind::Compute => {
                let data = memory::Buffer::new(
                    device,
                    &memory::BufferCfg {
                        size: 256,
                        usage: memory::BufferType::STORAGE_BUFFER,
                        properties: hw::MemoryProperty::DEVICE_LOCAL,
                    },
                )?;

                let cs = shader::Shader::new(
                    device,
                    &shader::ShaderCfg {
                        stage: shader::Stage::Compute,
                        entry: "main",
                    },
                    run.binaries.require("comp"),
                )?;

                let cfg = compute::PipelineCfg {
                    buffers: &[&data],
                    shader: &cs,
                    flags: self.params.pipeline_flags(),
                    cache: Some(&cache),
                };

                let initial = compute::Pipeline::new(device, &cfg)?;
                let cached = compute::Pipeline::new(device, &cfg)?;

                self.verify(run, &loader, [initial.pipeline(), cached.pipeline()])
            }
        }
    }
}

impl ExecutablePropertiesInstance {
    fn verify(
        &self,
        run: &mut TestRun,
        loader: &pipeline_executable_properties::Device,
        pipelines: [vk::Pipeline; 2],
    ) -> Result<TestStatus, TestError> {
        let mut props: [Vec<ExecutableInfo>; 2] = [Vec::new(), Vec::new()];

        for (slot, &pipeline) in pipelines.iter().enumerate() {
            let info = vk::PipelineInfoKHR::default().pipeline(pipeline);

            let raw = match unsafe { loader.get_pipeline_executable_properties(&info) } {
                Ok(raw) => raw,
                Err(code) => {
                    return Err(TestError::VkCall {
                        call: "vkGetPipelineExecutablePropertiesKHR",
                        code,
                    })
                }
            };

            for prop in &raw {
                let Some(name) = checked_string(&prop.name) else {
                    return Ok(TestStatus::fail("Invalid executable name string"));
                };

                if props[slot].iter().any(|other| other.name == name) {
                    return Ok(TestStatus::fail(
                        "Executable name string not unique within the pipeline",
                    ));
                }

                let Some(description) = checked_string(&prop.description) else {
                    return Ok(TestStatus::fail("Invalid executable description string"));
                };

                // An executable may only use stages the pipeline was built from
                if prop.stages & !self.params.provided_stages() != vk::ShaderStageFlags::empty() {
                    return Ok(TestStatus::fail("Executable uses unprovided stage"));
                }

                props[slot].push(ExecutableInfo {
                    name,
                    description,
                    stages: prop.stages,
                    subgroup_size: prop.subgroup_size,
                });
            }
        }

        if props[0].len() != props[1].len() {
            return Ok(TestStatus::fail(
                "Identical pipelines have different numbers of executables",
            ));
        }

        if props[0].is_empty() {
            return Ok(TestStatus::pass("No executables reported"));
        }

        for info in &props[0] {
            let Some(twin) = props[1].iter().find(|other| other.name == info.name) else {
                return Ok(TestStatus::fail(
                    "Identical pipelines have different sets of executables",
                ));
            };

            if twin.description != info.description {
                return Ok(TestStatus::fail("Same executable has different descriptions"));
            }

            if twin.stages != info.stages {
                return Ok(TestStatus::fail("Same executable has different stages"));
            }

            if twin.subgroup_size != info.subgroup_size {
                return Ok(TestStatus::fail(
                    "Same executable has different subgroup sizes",
                ));
            }
        }

        run.log
            .message(format!("pipeline reported {} executables", props[0].len()));

        for (index, info) in props[0].iter().enumerate() {
            run.log.message(format!(
                "executable {}: {} ({})",
                index, info.name, info.description
            ));
            run.log.message(format!(
                "stages: {:?}, subgroup size: {}",
                info.stages, info.subgroup_size
            ));

            if self.params.statistics {
                let status = self.verify_statistics(run, loader, pipelines, index as u32)?;

                if status.code() != StatusCode::Pass {
                    return Ok(status);
                }
            }

            if self.params.internal_representations {
                let status =
                    self.verify_internal_representations(run, loader, pipelines[1], index as u32)?;

                if status.code() != StatusCode::Pass {
                    return Ok(status);
                }
            }
        }

        Ok(TestStatus::pass("Pass"))
    }

    fn verify_statistics(
        &self,
        run: &mut TestRun,
        loader: &pipeline_executable_properties::Device,
        pipelines: [vk::Pipeline; 2],
        executable_index: u32,
    ) -> Result<TestStatus, TestError> {
        let mut statistics: [Vec<StatisticInfo>; 2] = [Vec::new(), Vec::new()];

        for (slot, &pipeline) in pipelines.iter().enumerate() {
            let info = vk::PipelineExecutableInfoKHR::default()
                .pipeline(pipeline)
                .executable_index(executable_index);

            let raw = match unsafe { loader.get_pipeline_executable_statistics(&info) } {
                Ok(raw) => raw,
                Err(code) => {
                    return Err(TestError::VkCall {
                        call: "vkGetPipelineExecutableStatisticsKHR",
                        code,
                    })
                }
            };

            for stat in &raw {
                let Some(name) = checked_string(&stat.name) else {
                    return Ok(TestStatus::fail("Invalid statistic name string"));
                };

                if statistics[slot].iter().any(|other| other.name == name) {
                    return Ok(TestStatus::fail(
                        "Statistic name string not unique within the executable",
                    ));
                }

                let Some(description) = checked_string(&stat.description) else {
                    return Ok(TestStatus::fail("Invalid statistic description string"));
                };

                let value = match stat.format {
                    vk::PipelineExecutableStatisticFormatKHR::BOOL32 => {
                        let b32 = unsafe { stat.value.b32 };

                        if b32 != vk::TRUE && b32 != vk::FALSE {
                            return Ok(TestStatus::fail(
                                "Boolean statistic is neither VK_TRUE nor VK_FALSE",
                            ));
                        }

                        StatisticValue::Bool(b32 == vk::TRUE)
                    }
                    vk::PipelineExecutableStatisticFormatKHR::INT64 => {
                        StatisticValue::Int(unsafe { stat.value.i64 })
                    }
                    vk::PipelineExecutableStatisticFormatKHR::UINT64 => {
                        StatisticValue::Uint(unsafe { stat.value.u64 })
                    }
                    vk::PipelineExecutableStatisticFormatKHR::FLOAT64 => {
                        StatisticValue::Float(unsafe { stat.value.f64 })
                    }
                    _ => return Ok(TestStatus::fail("Invalid statistic format")),
                };

                statistics[slot].push(StatisticInfo {
                    name,
                    description,
                    value,
                });
            }
        }

        if statistics[0].len() != statistics[1].len() {
            return Ok(TestStatus::fail(
                "Identical pipelines have different numbers of statistics",
            ));
        }

        if statistics[0].is_empty() {
            return Ok(TestStatus::pass("No statistics reported"));
        }

        for stat in &statistics[0] {
            let Some(twin) = statistics[1].iter().find(|other| other.name == stat.name) else {
                return Ok(TestStatus::fail(
                    "Identical pipelines have different statistics",
                ));
            };

            if twin.description != stat.description {
                return Ok(TestStatus::fail("Invalid statistic description string"));
            }

            if std::mem::discriminant(&twin.value) != std::mem::discriminant(&stat.value) {
                return Ok(TestStatus::fail(
                    "Identical pipelines have statistics with different formats",
                ));
            }

            let marker = if twin.value == stat.value {
                ""
            } else {
                " (non-deterministic)"
            };

            run.log.message(format!(
                "{}: {}{} ({})",
                stat.name, stat.value, marker, stat.description
            ));
        }

        Ok(TestStatus::pass("Pass"))
    }

    fn verify_internal_representations(
        &self,
        run: &mut TestRun,
        loader: &pipeline_executable_properties::Device,
        pipeline: vk::Pipeline,
        executable_index: u32,
    ) -> Result<TestStatus, TestError> {
        // Only the cache-warm pipeline is queried, it must still report
        // complete representations
        let info = vk::PipelineExecutableInfoKHR::default()
            .pipeline(pipeline)
            .executable_index(executable_index);

        let sizes = match unsafe { loader.get_pipeline_executable_internal_representations(&info) }
        {
            Ok(sizes) => sizes,
            Err(code) => {
                return Err(TestError::VkCall {
                    call: "vkGetPipelineExecutableInternalRepresentationsKHR",
                    code,
                })
            }
        };

        if sizes.is_empty() {
            return Ok(TestStatus::pass("No internal representations reported"));
        }

        let mut names = Vec::with_capacity(sizes.len());
        let mut buffers: Vec<Vec<u8>> = Vec::with_capacity(sizes.len());

        for ir in &sizes {
            let Some(name) = checked_string(&ir.name) else {
                return Ok(TestStatus::fail(
                    "Invalid internal representation name string",
                ));
            };

            if names.iter().any(|(other, _)| *other == name) {
                return Ok(TestStatus::fail(
                    "Internal representation name string not unique within the executable",
                ));
            }

            let Some(description) = checked_string(&ir.description) else {
                return Ok(TestStatus::fail(
                    "Invalid internal representation description string",
                ));
            };

            if ir.data_size == 0 {
                return Ok(TestStatus::fail("Internal representation has no data"));
            }

            // Sentinel pattern, surviving runs of it mean the buffer was
            // not fully written
            let data: Vec<u8> = (0..ir.data_size)
                .map(|i| (37usize.wrapping_mul(17 + i)) as u8)
                .collect();

            names.push((name, description));
            buffers.push(data);
        }

        let mut raw: Vec<vk::PipelineExecutableInternalRepresentationKHR> =
            Vec::with_capacity(sizes.len());

        for data in &mut buffers {
            let mut rep = vk::PipelineExecutableInternalRepresentationKHR::default();
            rep.data_size = data.len();
            rep.p_data = data.as_mut_ptr().cast();
            raw.push(rep);
        }

        let mut count = raw.len() as u32;
        let code = unsafe {
            (loader
                .fp()
                .get_pipeline_executable_internal_representations_khr)(
                loader.device(),
                &info,
                &mut count,
                raw.as_mut_ptr(),
            )
        };

        if code != vk::Result::SUCCESS && code != vk::Result::INCOMPLETE {
            return Err(TestError::VkCall {
                call: "vkGetPipelineExecutableInternalRepresentationsKHR",
                code,
            });
        }

        for (index, ir) in raw.iter().enumerate() {
            let (name, description) = &names[index];

            if ir.is_text != vk::FALSE {
                let Some(text) = checked_text(&buffers[index]) else {
                    return Ok(TestStatus::fail(
                        "Textual internal representation isn't a valid string",
                    ));
                };

                run.log
                    .message(format!("{} ({}):\n{}", name, description, text));
            } else {
                let mut chunk = 0usize;
                let mut longest = 0usize;

                for (i, &byte) in buffers[index].iter().enumerate() {
                    if byte == (37usize.wrapping_mul(17 + i)) as u8 {
                        chunk += 1;
                        longest = longest.max(chunk);
                    } else {
                        chunk = 0;
                    }
                }

                // 64 surviving sentinel bytes are no coincidence
                if longest == buffers[index].len() || longest >= 64 {
                    return Ok(TestStatus::fail(
                        "Implementation didn't fill the whole internal representation data buffer",
                    ));
                }

                run.log.message(format!(
                    "{} ({}): received {} bytes of binary data",
                    name,
                    description,
                    buffers[index].len()
                ));
            }
        }

        Ok(TestStatus::pass("Pass"))
    }
}

fn kind_cases(kind: PipelineKind, base: &str, what: &str) -> TestCaseGroup {
    let group_name = match kind {
        PipelineKind::Graphics => "graphics",
        PipelineKind::Compute => "compute",
    };

    let mut group = TestCaseGroup::new(
        group_name,
        &format!("Executable properties of {} pipelines", what),
    );

    for statistics in [false, true] {
        for internal_representations in [false, true] {
            let mut name = String::from(base);
            let mut description = format!("Enumerate executables of a {} pipeline", what);

            if statistics {
                name.push_str("_statistics");
                description.push_str(", capture statistics");
            }

            if internal_representations {
                name.push_str("_internal_representations");
                description.push_str(", capture internal representations");
            }

            group.add_case(Box::new(ExecutablePropertiesCase {
                name,
                description,
                params: ExecutableParams {
                    kind,
                    statistics,
                    internal_representations,
                },
            }));
        }
    }

    group
}

pub fn group() -> TestCaseGroup {
    let mut root = TestCaseGroup::new(
        "executable_properties",
        "VK_KHR_pipeline_executable_properties cases",
    );

    root.add_group(kind_cases(
        PipelineKind::Graphics,
        "vertex_stage_fragment_stage",
        "graphics",
    ));
    root.add_group(kind_cases(PipelineKind::Compute, "compute_stage", "compute"));

    root
}
