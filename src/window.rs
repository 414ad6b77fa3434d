//! Helper functions around `winit` library

use winit::event_loop::EventLoopBuilder;

#[cfg(target_os = "linux")]
use winit::platform::x11::EventLoopBuilderExtX11;
#[cfg(target_os = "linux")]
use winit::platform::wayland::EventLoopBuilderExtWayland;

use crate::on_error_ret;

use std::error::Error;
use std::fmt;

pub type EventLoop = winit::event_loop::EventLoop<()>;
pub type Window = winit::window::Window;

#[derive(Debug)]
pub enum WindowError {
    EventLoop,
    Window,
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err_msg = match self {
            WindowError::EventLoop => "Failed to create event loop",
            WindowError::Window => "Failed to create window",
        };

        write!(f, "{}", err_msg)
    }
}

impl Error for WindowError { }

#[cfg(target_os = "linux")]
/// Create new eventloop
///
/// Event loop can be used in different thread (unlike original winit event loop)
pub fn eventloop() -> Result<EventLoop, WindowError> {
    let mut builder = EventLoopBuilder::new();
    EventLoopBuilderExtWayland::with_any_thread(&mut builder, true);
    EventLoopBuilderExtX11::with_any_thread(&mut builder, true);

    Ok(on_error_ret!(builder.build(), WindowError::EventLoop))
}

#[cfg(not(target_os = "linux"))]
/// Create new eventloop
///
/// Event loop can be used in different thread (unlike original winit event loop)
pub fn eventloop() -> Result<EventLoop, WindowError> {
    Ok(on_error_ret!(EventLoopBuilder::new().build(), WindowError::EventLoop))
}

/// Create new hidden fixed-size window
pub fn create_window(eventloop: &EventLoop) -> Result<Window, WindowError> {
    let window = on_error_ret!(
        winit::window::WindowBuilder::new()
            .with_title("vkcts")
            .with_inner_size(winit::dpi::PhysicalSize::new(256, 256))
            .with_visible(false)
            .build(eventloop),
        WindowError::Window
    );

    Ok(window)
}
