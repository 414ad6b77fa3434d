//! Native display abstraction for window system tests
//!
//! A [`NativeDisplay`] is an abstract display handle which can be obtained
//! through one of several platform mechanisms, advertised as
//! [`DisplayCapability`] flags. Accessors check the advertised capability at
//! runtime and report [`DisplayError::NotSupported`] when it is absent, so
//! tests over an unsupported mechanism can skip instead of fail.
//!
//! Concrete displays are produced by [`NativeDisplayFactory`] objects held
//! in a [`DisplayRegistry`].

use bitflags::bitflags;

use raw_window_handle::{HasDisplayHandle, RawDisplayHandle};

use crate::{extensions, libvk, surface, window};

use std::error::Error;
use std::ffi::{c_char, c_void};
use std::fmt;
use std::ptr;

bitflags! {
    /// How a display handle can be obtained
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisplayCapability: u32 {
        /// Legacy native display handle without attributes
        const GET_DISPLAY_LEGACY = 0b001;
        /// Platform handle plus attribute list through the core entry point
        const GET_DISPLAY_PLATFORM = 0b010;
        /// Platform handle plus attribute list through the extension entry point
        const GET_DISPLAY_PLATFORM_EXT = 0b100;
    }
}

impl DisplayCapability {
    /// Any of the platform-style bits
    pub fn platform_bits() -> DisplayCapability {
        DisplayCapability::GET_DISPLAY_PLATFORM | DisplayCapability::GET_DISPLAY_PLATFORM_EXT
    }
}

/// Windowing platform behind a display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformType {
    None,
    Headless,
    Xlib,
    Xcb,
    Wayland,
    Win32,
}

/// Key-value attribute accompanying a platform display handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformAttribute {
    pub key: i64,
    pub value: i64,
}

#[derive(Debug)]
pub enum DisplayError {
    /// The display does not advertise the required capability
    NotSupported(&'static str),
    /// Failed to construct the native display
    Creating(String),
    /// Failed to create a surface over the display
    Surface(String),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::NotSupported(what) => {
                write!(f, "Display does not support {}", what)
            }
            DisplayError::Creating(what) => {
                write!(f, "Failed to create native display: {}", what)
            }
            DisplayError::Surface(what) => {
                write!(f, "Failed to create surface: {}", what)
            }
        }
    }
}

impl Error for DisplayError {}

/// Capability record embedded in every concrete display
///
/// Constructors enforce flag consistency and panic on a contract violation
#[derive(Debug, Clone, Copy)]
pub struct DisplayCore {
    i_capabilities: DisplayCapability,
    i_platform: PlatformType,
}

impl DisplayCore {
    /// Core for a display reachable only through the legacy native handle
    ///
    /// Panics when a platform bit is set or the legacy bit is missing
    pub fn legacy(capabilities: DisplayCapability) -> DisplayCore {
        assert!(
            capabilities.contains(DisplayCapability::GET_DISPLAY_LEGACY),
            "legacy display must advertise GET_DISPLAY_LEGACY"
        );
        assert!(
            !capabilities.intersects(DisplayCapability::platform_bits()),
            "legacy display must not advertise platform capabilities"
        );

        DisplayCore {
            i_capabilities: capabilities,
            i_platform: PlatformType::None,
        }
    }

    /// Core for a display reachable through a platform handle
    ///
    /// The legacy bit may be set in addition to the platform bits
    ///
    /// Panics when `platform` is [`PlatformType::None`]
    /// or no platform bit is set
    pub fn platform(capabilities: DisplayCapability, platform: PlatformType) -> DisplayCore {
        assert!(
            platform != PlatformType::None,
            "platform display must name its platform"
        );
        assert!(
            capabilities.intersects(DisplayCapability::platform_bits()),
            "platform display must advertise a platform capability"
        );

        DisplayCore {
            i_capabilities: capabilities,
            i_platform: platform,
        }
    }

    pub fn capabilities(&self) -> DisplayCapability {
        self.i_capabilities
    }

    pub fn platform_type(&self) -> PlatformType {
        self.i_platform
    }
}

/// Abstract display handle
pub trait NativeDisplay {
    fn core(&self) -> &DisplayCore;

    /// Legacy native display handle
    ///
    /// Requires [`DisplayCapability::GET_DISPLAY_LEGACY`]
    fn legacy_native(&self) -> Result<RawDisplayHandle, DisplayError> {
        Err(DisplayError::NotSupported("legacy native display handle"))
    }

    /// Raw platform display pointer
    ///
    /// Requires one of the platform capability bits
    fn platform_native(&self) -> Result<*mut c_void, DisplayError> {
        Err(DisplayError::NotSupported("platform native display handle"))
    }

    /// Attribute list accompanying the platform handle
    fn platform_attributes(&self) -> Result<&[PlatformAttribute], DisplayError> {
        Err(DisplayError::NotSupported("platform display attributes"))
    }

    /// Instance extensions required to create a surface over this display
    fn required_extensions(&self) -> Vec<*const c_char>;

    /// Create a surface backed by this display
    ///
    /// `lib` must be created with
    /// [`required_extensions`](NativeDisplay::required_extensions) enabled
    fn create_surface(&self, lib: &libvk::Instance) -> Result<surface::Surface, DisplayError>;

    fn capabilities(&self) -> DisplayCapability {
        self.core().capabilities()
    }

    fn platform_type(&self) -> PlatformType {
        self.core().platform_type()
    }
}

/// Producer of [`NativeDisplay`] objects, one per display mechanism
pub trait NativeDisplayFactory {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Capabilities every display from this factory will advertise
    fn capabilities(&self) -> DisplayCapability;

    fn create(
        &self,
        attributes: &[PlatformAttribute],
    ) -> Result<Box<dyn NativeDisplay>, DisplayError>;
}

/// Set of display factories available on this build
pub struct DisplayRegistry {
    i_factories: Vec<Box<dyn NativeDisplayFactory>>,
}

impl DisplayRegistry {
    pub fn new() -> DisplayRegistry {
        DisplayRegistry {
            i_factories: Vec::new(),
        }
    }

    /// Registry with all factories this build supports
    pub fn with_defaults() -> DisplayRegistry {
        let mut registry = DisplayRegistry::new();

        registry.register(Box::new(HeadlessDisplayFactory));
        registry.register(Box::new(WindowDisplayFactory));

        registry
    }

    /// Add a factory
    ///
    /// Panics on a duplicate name: factory names become test case names
    /// and must be unique
    pub fn register(&mut self, factory: Box<dyn NativeDisplayFactory>) {
        assert!(
            self.find(factory.name()).is_none(),
            "duplicate display factory name: {}",
            factory.name()
        );

        self.i_factories.push(factory);
    }

    pub fn find(&self, name: &str) -> Option<&dyn NativeDisplayFactory> {
        self.i_factories
            .iter()
            .find(|factory| factory.name() == name)
            .map(|factory| factory.as_ref())
    }

    /// Keep only the named factory
    ///
    /// Returns `false` and leaves the registry intact when no factory
    /// has this name
    pub fn retain(&mut self, name: &str) -> bool {
        if self.find(name).is_none() {
            return false;
        }

        self.i_factories.retain(|factory| factory.name() == name);

        true
    }

    pub fn factories(&self) -> impl Iterator<Item = &dyn NativeDisplayFactory> {
        self.i_factories.iter().map(|factory| factory.as_ref())
    }

    pub fn len(&self) -> usize {
        self.i_factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.i_factories.is_empty()
    }
}

/// Display without any windowing system behind it
///
/// Surfaces are created through `VK_EXT_headless_surface`
pub struct HeadlessDisplay {
    i_core: DisplayCore,
}

impl HeadlessDisplay {
    pub fn new() -> HeadlessDisplay {
        HeadlessDisplay {
            i_core: DisplayCore::platform(
                DisplayCapability::GET_DISPLAY_PLATFORM,
                PlatformType::Headless,
            ),
        }
    }
}

impl NativeDisplay for HeadlessDisplay {
    fn core(&self) -> &DisplayCore {
        &self.i_core
    }

    fn platform_native(&self) -> Result<*mut c_void, DisplayError> {
        Ok(ptr::null_mut())
    }

    fn platform_attributes(&self) -> Result<&[PlatformAttribute], DisplayError> {
        Ok(&[])
    }

    fn required_extensions(&self) -> Vec<*const c_char> {
        vec![
            extensions::SURFACE_EXT_NAME,
            extensions::HEADLESS_SURFACE_EXT_NAME,
        ]
    }

    fn create_surface(&self, lib: &libvk::Instance) -> Result<surface::Surface, DisplayError> {
        surface::Surface::headless(lib).map_err(|err| DisplayError::Surface(err.to_string()))
    }
}

pub struct HeadlessDisplayFactory;

impl NativeDisplayFactory for HeadlessDisplayFactory {
    fn name(&self) -> &str {
        "headless"
    }

    fn description(&self) -> &str {
        "Surface without a native window"
    }

    fn capabilities(&self) -> DisplayCapability {
        DisplayCapability::GET_DISPLAY_PLATFORM
    }

    fn create(
        &self,
        _attributes: &[PlatformAttribute],
    ) -> Result<Box<dyn NativeDisplay>, DisplayError> {
        Ok(Box::new(HeadlessDisplay::new()))
    }
}

/// Display backed by a hidden native window
///
/// Field order matters: the window must be dropped before its event loop
pub struct WindowDisplay {
    i_core: DisplayCore,
    i_attributes: Vec<PlatformAttribute>,
    i_window: window::Window,
    #[allow(dead_code)]
    i_eventloop: window::EventLoop,
}

impl WindowDisplay {
    pub fn new() -> Result<WindowDisplay, DisplayError> {
        let eventloop = on_creating(window::eventloop())?;
        let win = on_creating(window::create_window(&eventloop))?;

        let platform = match win.display_handle() {
            Ok(handle) => match handle.as_raw() {
                RawDisplayHandle::Xlib(_) => PlatformType::Xlib,
                RawDisplayHandle::Xcb(_) => PlatformType::Xcb,
                RawDisplayHandle::Wayland(_) => PlatformType::Wayland,
                RawDisplayHandle::Windows(_) => PlatformType::Win32,
                _ => PlatformType::None,
            },
            Err(_) => PlatformType::None,
        };

        if platform == PlatformType::None {
            return Err(DisplayError::Creating(
                "unsupported windowing platform".to_string(),
            ));
        }

        Ok(WindowDisplay {
            i_core: DisplayCore::platform(
                DisplayCapability::GET_DISPLAY_LEGACY | DisplayCapability::GET_DISPLAY_PLATFORM,
                platform,
            ),
            i_attributes: Vec::new(),
            i_window: win,
            i_eventloop: eventloop,
        })
    }
}

fn on_creating<T, E: Error>(result: Result<T, E>) -> Result<T, DisplayError> {
    result.map_err(|err| DisplayError::Creating(err.to_string()))
}

impl NativeDisplay for WindowDisplay {
    fn core(&self) -> &DisplayCore {
        &self.i_core
    }

    fn legacy_native(&self) -> Result<RawDisplayHandle, DisplayError> {
        let handle = self
            .i_window
            .display_handle()
            .map_err(|err| DisplayError::Creating(err.to_string()))?;

        Ok(handle.as_raw())
    }

    fn platform_native(&self) -> Result<*mut c_void, DisplayError> {
        match self.legacy_native()? {
            RawDisplayHandle::Xlib(xlib) => {
                Ok(xlib.display.map_or(ptr::null_mut(), |d| d.as_ptr()))
            }
            RawDisplayHandle::Xcb(xcb) => {
                Ok(xcb.connection.map_or(ptr::null_mut(), |c| c.as_ptr()))
            }
            RawDisplayHandle::Wayland(wayland) => Ok(wayland.display.as_ptr()),
            RawDisplayHandle::Windows(_) => Ok(ptr::null_mut()),
            _ => Err(DisplayError::NotSupported("platform native display handle")),
        }
    }

    fn platform_attributes(&self) -> Result<&[PlatformAttribute], DisplayError> {
        Ok(&self.i_attributes)
    }

    fn required_extensions(&self) -> Vec<*const c_char> {
        extensions::required_extensions(&self.i_window)
    }

    fn create_surface(&self, lib: &libvk::Instance) -> Result<surface::Surface, DisplayError> {
        surface::Surface::new(lib, &self.i_window)
            .map_err(|err| DisplayError::Surface(err.to_string()))
    }
}

pub struct WindowDisplayFactory;

impl NativeDisplayFactory for WindowDisplayFactory {
    fn name(&self) -> &str {
        "window"
    }

    fn description(&self) -> &str {
        "Hidden native window"
    }

    fn capabilities(&self) -> DisplayCapability {
        DisplayCapability::GET_DISPLAY_LEGACY | DisplayCapability::GET_DISPLAY_PLATFORM
    }

    fn create(
        &self,
        _attributes: &[PlatformAttribute],
    ) -> Result<Box<dyn NativeDisplay>, DisplayError> {
        Ok(Box::new(WindowDisplay::new()?))
    }
}
