//! Basic instance and device information cases
//!
//! Pure sanity oracles over data the context already queried, no device
//! work is submitted.

use crate::case::{FunctionCase, TestRun};
use crate::status::{TestError, TestStatus};
use crate::tree::TestCaseGroup;

use ash::vk;

pub fn group() -> TestCaseGroup {
    let mut info = TestCaseGroup::new("info", "Instance and device information");

    info.add_case(Box::new(FunctionCase::new(
        "instance_version",
        "Instance API version is well formed",
        instance_version,
    )));
    info.add_case(Box::new(FunctionCase::new(
        "device_properties",
        "Physical device properties sanity",
        device_properties,
    )));
    info.add_case(Box::new(FunctionCase::new(
        "queue_families",
        "Queue family enumeration sanity",
        queue_families,
    )));
    info.add_case(Box::new(FunctionCase::new(
        "memory_properties",
        "Memory type and heap sanity",
        memory_properties,
    )));

    info
}

fn instance_version(run: &mut TestRun) -> Result<TestStatus, TestError> {
    let version = run.ctx.lib().version();
    let major = vk::api_version_major(version);
    let minor = vk::api_version_minor(version);

    run.log
        .message(format!("instance version {}.{}", major, minor));

    if major == 0 {
        return Ok(TestStatus::fail("Instance API major version is 0"));
    }

    if major == 1 && minor > 3 {
        return Ok(TestStatus::fail(format!(
            "Unexpected instance API version 1.{}",
            minor
        )));
    }

    Ok(TestStatus::pass("Version check passed"))
}

fn device_properties(run: &mut TestRun) -> Result<TestStatus, TestError> {
    let hw = run.ctx.hw();

    run.log.message(format!(
        "device \"{}\", API {}.{}.{}",
        hw.name(),
        hw.version_major(),
        hw.version_minor(),
        hw.version_patch()
    ));

    if hw.name().is_empty() {
        return Ok(TestStatus::fail("Empty device name"));
    }

    if hw.version_major() == 0 {
        return Ok(TestStatus::fail("Device API major version is 0"));
    }

    let limits = hw.limits();

    if limits.max_image_dimension2_d < 4096 {
        return Ok(TestStatus::fail(format!(
            "maxImageDimension2D is {}, minimum required is 4096",
            limits.max_image_dimension2_d
        )));
    }

    if limits.max_compute_work_group_invocations < 128 {
        return Ok(TestStatus::fail(format!(
            "maxComputeWorkGroupInvocations is {}, minimum required is 128",
            limits.max_compute_work_group_invocations
        )));
    }

    if limits.max_viewports == 0 || limits.max_framebuffer_width == 0 {
        return Ok(TestStatus::fail("Zero limit on a required capability"));
    }

    Ok(TestStatus::pass("Properties check passed"))
}

fn queue_families(run: &mut TestRun) -> Result<TestStatus, TestError> {
    let hw = run.ctx.hw();
    let mut families = 0usize;
    let mut universal = false;

    for family in hw.queues() {
        run.log.message(format!(
            "family {}: {} queues, graphics {}, compute {}, transfer {}",
            family.index(),
            family.count(),
            family.is_graphics(),
            family.is_compute(),
            family.is_transfer()
        ));

        if family.count() == 0 {
            return Ok(TestStatus::fail(format!(
                "Queue family {} reports zero queues",
                family.index()
            )));
        }

        if family.is_graphics() && family.is_compute() {
            universal = true;
        }

        families += 1;
    }

    if families == 0 {
        return Ok(TestStatus::fail("No queue families reported"));
    }

    if !universal {
        return Ok(TestStatus::fail(
            "No queue family supports both graphics and compute",
        ));
    }

    Ok(TestStatus::pass("Queue family check passed"))
}

fn memory_properties(run: &mut TestRun) -> Result<TestStatus, TestError> {
    let hw = run.ctx.hw();
    let mut types = 0usize;
    let mut device_local = false;
    let mut host_visible_coherent = false;

    for memory in hw.memory() {
        run.log.message(format!(
            "type {}: heap {} ({} bytes), local {}, host visible {}",
            memory.index(),
            memory.heap_index(),
            memory.heap_size(),
            memory.is_local(),
            memory.is_host_visible()
        ));

        if memory.is_local() {
            if memory.heap_size() == 0 {
                return Ok(TestStatus::fail(format!(
                    "Device local heap {} has zero size",
                    memory.heap_index()
                )));
            }

            device_local = true;
        }

        if memory.is_host_visible() && memory.is_host_coherent() {
            host_visible_coherent = true;
        }

        types += 1;
    }

    if types == 0 {
        return Ok(TestStatus::fail("No memory types reported"));
    }

    if !device_local {
        return Ok(TestStatus::fail("No device local memory type"));
    }

    if !host_visible_coherent {
        return Ok(TestStatus::fail(
            "No host visible and coherent memory type",
        ));
    }

    Ok(TestStatus::pass("Memory properties check passed"))
}
