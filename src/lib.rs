//! Conformance-style test suite exercising a Vulkan driver
//!
//! The crate has three layers:
//! 1) plumbing modules ([`libvk`], [`dev`], [`memory`], ...) which own Vulkan handles
//! 2) the framework ([`tree`], [`case`], [`runner`]) which enumerates and drives test cases
//! 3) [`cases`] with the per-feature test bodies
//!
//! Each test case is addressed by a dot-separated path (`vkcts.query_pool.occlusion.basic`)
//! and reports through the [`status`] taxonomy

pub mod macros;
pub mod status;
pub mod libvk;
pub mod layers;
pub mod extensions;
pub mod debug;
pub mod hw;
pub mod dev;
pub mod queue;
pub mod sync;
pub mod memory;
pub mod shader;
pub mod cmd;
pub mod query;
pub mod graphics;
pub mod compute;
pub mod window;
pub mod surface;
pub mod display;
pub mod case;
pub mod tree;
pub mod qpa;
pub mod context;
pub mod runner;
pub mod cases;

/// Version string reported in the result log header
pub const RELEASE_NAME: &str = concat!("vkcts-", env!("CARGO_PKG_VERSION"));
