//! Test completion codes and errors
//!
//! Every test instance finishes with [`TestStatus`]
//! or bails out early with [`TestError`]

use ash::vk;

use std::error::Error;
use std::fmt;

/// Final verdict of a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Pass,
    Fail,
    NotSupported,
    QualityWarning,
}

impl StatusCode {
    /// Name of the code as it appears in the result log
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Pass => "Pass",
            StatusCode::Fail => "Fail",
            StatusCode::NotSupported => "NotSupported",
            StatusCode::QualityWarning => "QualityWarning",
        }
    }

    /// Only [`StatusCode::Fail`] counts against the run
    pub fn is_failure(&self) -> bool {
        matches!(self, StatusCode::Fail)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Code plus human readable description
///
/// Example
/// ```
/// use vkcts::status::{TestStatus, StatusCode};
///
/// let status = TestStatus::pass("Query results verified");
///
/// assert_eq!(status.code(), StatusCode::Pass);
/// assert!(!status.code().is_failure());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStatus {
    i_code: StatusCode,
    i_description: String,
}

impl TestStatus {
    pub fn pass<S: Into<String>>(description: S) -> TestStatus {
        TestStatus {
            i_code: StatusCode::Pass,
            i_description: description.into(),
        }
    }

    pub fn fail<S: Into<String>>(description: S) -> TestStatus {
        TestStatus {
            i_code: StatusCode::Fail,
            i_description: description.into(),
        }
    }

    pub fn not_supported<S: Into<String>>(description: S) -> TestStatus {
        TestStatus {
            i_code: StatusCode::NotSupported,
            i_description: description.into(),
        }
    }

    pub fn quality_warning<S: Into<String>>(description: S) -> TestStatus {
        TestStatus {
            i_code: StatusCode::QualityWarning,
            i_description: description.into(),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.i_code
    }

    pub fn description(&self) -> &str {
        &self.i_description
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.i_code, self.i_description)
    }
}

/// Early exit from a test body
///
/// [`TestError::NotSupported`] is not a failure:
/// the runner reports such case with [`StatusCode::NotSupported`]
#[derive(Debug)]
pub enum TestError {
    /// Required feature, extension or limit is missing on this device
    NotSupported(String),
    /// Vulkan entry point returned an error code
    VkCall {
        call: &'static str,
        code: vk::Result,
    },
    /// Everything else (failed allocation, plumbing error and so on)
    Internal(String),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::NotSupported(what) => write!(f, "{}", what),
            TestError::VkCall { call, code } => write!(f, "{} call failed ({})", call, code),
            TestError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for TestError {}

macro_rules! impl_from_err {
    ( $($err:ty),+ $(,)? ) => {
        $(
            impl From<$err> for TestError {
                fn from(e: $err) -> TestError {
                    TestError::Internal(e.to_string())
                }
            }
        )+
    }
}

impl_from_err!(
    crate::libvk::InstanceError,
    crate::hw::HWError,
    crate::dev::DeviceError,
    crate::queue::QueueError,
    crate::sync::FenceError,
    crate::memory::MemoryError,
    crate::shader::ShaderError,
    crate::cmd::PoolError,
    crate::cmd::BufferError,
    crate::query::QueryPoolError,
    crate::graphics::RenderPassError,
    crate::graphics::FramebufferError,
    crate::graphics::CacheError,
    crate::graphics::PipelineError,
    crate::compute::PipelineError,
    crate::surface::SurfaceError,
    crate::surface::CapabilitiesError,
    crate::window::WindowError,
);

impl From<crate::display::DisplayError> for TestError {
    fn from(e: crate::display::DisplayError) -> TestError {
        match e {
            crate::display::DisplayError::NotSupported(what) => {
                TestError::NotSupported(what.to_string())
            }
            other => TestError::Internal(other.to_string()),
        }
    }
}
