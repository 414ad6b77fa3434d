//! Window system integration cases
//!
//! Case generation walks the display registry the tree is built from and
//! produces one subgroup per factory. Instances recreate their factory by
//! name from the default registry, so a case stays valid after the tree
//! outlives the registry it was generated from.
//!
//! The surface smoke case does not touch the shared context device: it
//! creates its own instance with exactly the extensions the display asks
//! for, which is the point of the exercise.

use crate::case::{TestCase, TestInstance, TestRun};
use crate::display::{self, DisplayCapability, NativeDisplay, PlatformType};
use crate::hw;
use crate::libvk;
use crate::memory;
use crate::status::{TestError, TestStatus};
use crate::surface;
use crate::tree::TestCaseGroup;

use ash::vk;

use std::ffi::CStr;

/// Recreate a registered display factory by name and produce its display
fn create_display(factory_name: &str) -> Result<Box<dyn NativeDisplay>, TestError> {
    let registry = display::DisplayRegistry::with_defaults();

    let factory = match registry.find(factory_name) {
        Some(factory) => factory,
        None => {
            return Err(TestError::Internal(format!(
                "display factory \"{}\" is not registered",
                factory_name
            )))
        }
    };

    Ok(factory.create(&[])?)
}

struct EnumerationCase {
    i_names: Vec<String>,
}

impl TestCase for EnumerationCase {
    fn name(&self) -> &str {
        "enumeration"
    }

    fn description(&self) -> &str {
        "Display factory registry sanity"
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(EnumerationInstance {
            i_names: self.i_names.clone(),
        })
    }
}

struct EnumerationInstance {
    i_names: Vec<String>,
}

impl TestInstance for EnumerationInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        for name in &self.i_names {
            run.log.message(format!("display factory \"{}\"", name));
        }

        if self.i_names.is_empty() {
            return Ok(TestStatus::fail("No display factories registered"));
        }

        for (index, name) in self.i_names.iter().enumerate() {
            if name.is_empty() {
                return Ok(TestStatus::fail("Empty display factory name"));
            }

            if self.i_names[..index].contains(name) {
                return Ok(TestStatus::fail(format!(
                    "Duplicate display factory name \"{}\"",
                    name
                )));
            }
        }

        Ok(TestStatus::pass("Registry check passed"))
    }
}

struct ContractCase {
    i_factory: String,
}

impl TestCase for ContractCase {
    fn name(&self) -> &str {
        "capability_contract"
    }

    fn description(&self) -> &str {
        "Advertised display accessors succeed, unadvertised ones report NotSupported"
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(ContractInstance {
            i_factory: self.i_factory.clone(),
        })
    }
}

struct ContractInstance {
    i_factory: String,
}

impl TestInstance for ContractInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        let registry = display::DisplayRegistry::with_defaults();

        let factory = match registry.find(&self.i_factory) {
            Some(factory) => factory,
            None => {
                return Err(TestError::Internal(format!(
                    "display factory \"{}\" is not registered",
                    self.i_factory
                )))
            }
        };

        let advertised = factory.capabilities();

        run.log
            .message(format!("factory capabilities {:?}", advertised));

        let display = factory.create(&[])?;

        if display.capabilities() != advertised {
            return Ok(TestStatus::fail(
                "Display capabilities do not match the factory",
            ));
        }

        run.log
            .message(format!("platform type {:?}", display.platform_type()));

        if advertised.intersects(DisplayCapability::platform_bits())
            && display.platform_type() == PlatformType::None
        {
            return Ok(TestStatus::fail(
                "Platform display does not name its platform",
            ));
        }

        let legacy = display.legacy_native();

        if advertised.contains(DisplayCapability::GET_DISPLAY_LEGACY) {
            if let Err(err) = legacy {
                return Ok(TestStatus::fail(format!(
                    "Advertised legacy display handle is unavailable: {}",
                    err
                )));
            }
        } else if !matches!(legacy, Err(display::DisplayError::NotSupported(_))) {
            return Ok(TestStatus::fail(
                "Unadvertised legacy display handle did not report NotSupported",
            ));
        }

        let native = display.platform_native();
        let attributes = display.platform_attributes();

        if advertised.intersects(DisplayCapability::platform_bits()) {
            if let Err(err) = native {
                return Ok(TestStatus::fail(format!(
                    "Advertised platform display handle is unavailable: {}",
                    err
                )));
            }

            match attributes {
                Ok(attributes) => {
                    run.log
                        .message(format!("{} platform attributes", attributes.len()));
                }
                Err(err) => {
                    return Ok(TestStatus::fail(format!(
                        "Advertised platform attributes are unavailable: {}",
                        err
                    )))
                }
            }
        } else {
            if !matches!(native, Err(display::DisplayError::NotSupported(_))) {
                return Ok(TestStatus::fail(
                    "Unadvertised platform display handle did not report NotSupported",
                ));
            }

            if !matches!(attributes, Err(display::DisplayError::NotSupported(_))) {
                return Ok(TestStatus::fail(
                    "Unadvertised platform attributes did not report NotSupported",
                ));
            }
        }

        Ok(TestStatus::pass("Capability contract check passed"))
    }
}

struct SurfaceSmokeCase {
    i_factory: String,
}

impl TestCase for SurfaceSmokeCase {
    fn name(&self) -> &str {
        "surface_smoke"
    }

    fn description(&self) -> &str {
        "Create a surface over the display and query its capabilities"
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(SurfaceSmokeInstance {
            i_factory: self.i_factory.clone(),
        })
    }
}

struct SurfaceSmokeInstance {
    i_factory: String,
}

impl TestInstance for SurfaceSmokeInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        let display = create_display(&self.i_factory)?;

        let extensions = display.required_extensions();

        for &extension in &extensions {
            let name = unsafe { CStr::from_ptr(extension) };

            run.log
                .message(format!("requiring instance extension {:?}", name));
        }

        let lib = libvk::Instance::new(&libvk::InstanceCfg {
            extensions: &extensions,
            ..Default::default()
        })?;

        let surface = display.create_surface(&lib)?;

        let hw_list = hw::Description::poll(&lib)?;
        let mut devices = 0usize;

        for device in hw_list.list() {
            let capabilities = surface::Capabilities::get(device, &surface)?;

            if let Some(status) = check_capabilities(run, device, &capabilities) {
                return Ok(status);
            }

            devices += 1;
        }

        if devices == 0 {
            return Err(TestError::Internal(
                "no physical devices reported".to_string(),
            ));
        }

        run.log.message(format!("{} devices checked", devices));

        Ok(TestStatus::pass("Surface smoke check passed"))
    }
}

/// Sanity oracle over one device's view of the surface, `None` when clean
fn check_capabilities(
    run: &mut TestRun,
    device: &hw::HWDevice,
    capabilities: &surface::Capabilities,
) -> Option<TestStatus> {
    run.log.message(format!(
        "device \"{}\": image count {}..{}, {} formats, {} present modes",
        device.name(),
        capabilities.min_img_count(),
        capabilities.max_img_count(),
        capabilities.formats().count(),
        capabilities.modes().count()
    ));

    if capabilities.min_img_count() == 0 {
        return Some(TestStatus::fail("Surface reports a zero minimum image count"));
    }

    if capabilities.max_img_count() < capabilities.min_img_count() {
        return Some(TestStatus::fail(
            "Surface maximum image count is below the minimum",
        ));
    }

    if capabilities.formats().count() == 0 {
        return Some(TestStatus::fail("Surface reports no formats"));
    }

    if capabilities
        .formats()
        .any(|format| format.format == vk::Format::UNDEFINED)
    {
        return Some(TestStatus::fail("Surface reports VK_FORMAT_UNDEFINED"));
    }

    if capabilities.modes().count() == 0 {
        return Some(TestStatus::fail("Surface reports no present modes"));
    }

    if !capabilities.is_mode_supported(vk::PresentModeKHR::FIFO) {
        return Some(TestStatus::fail("VK_PRESENT_MODE_FIFO_KHR is not supported"));
    }

    if !capabilities.is_flags_supported(memory::ImageUsageFlags::COLOR_ATTACHMENT) {
        return Some(TestStatus::fail(
            "Surface does not support color attachment usage",
        ));
    }

    None
}

/// Build the `wsi` subtree from the registered display factories
pub fn group(registry: &display::DisplayRegistry) -> TestCaseGroup {
    let mut wsi = TestCaseGroup::new("wsi", "Window system integration cases");
    let mut display_group = TestCaseGroup::new("display", "Native display cases");

    display_group.add_case(Box::new(EnumerationCase {
        i_names: registry
            .factories()
            .map(|factory| factory.name().to_string())
            .collect(),
    }));

    for factory in registry.factories() {
        let mut factory_group = TestCaseGroup::new(factory.name(), factory.description());

        factory_group.add_case(Box::new(ContractCase {
            i_factory: factory.name().to_string(),
        }));
        factory_group.add_case(Box::new(SurfaceSmokeCase {
            i_factory: factory.name().to_string(),
        }));

        display_group.add_group(factory_group);
    }

    wsi.add_group(display_group);

    wsi
}
