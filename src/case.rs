//! Test case and test instance traits
//!
//! A test is split in two: a [`TestCase`] describes the test (name, GLSL
//! programs, support requirements) and is cheap to build for enumeration,
//! while a [`TestInstance`] created from it carries the per-execution state
//! and runs exactly once.

use crate::context;
use crate::shader;
use crate::status::{TestError, TestStatus};

/// Single GLSL program attached to a case
pub struct ProgramSource {
    pub stage: shader::Stage,
    pub glsl: String,
}

/// Named GLSL sources a case wants compiled before it runs
#[derive(Default)]
pub struct SourceCollection {
    i_programs: Vec<(String, ProgramSource)>,
}

impl SourceCollection {
    pub fn new() -> SourceCollection {
        SourceCollection {
            i_programs: Vec::new(),
        }
    }

    /// Add a program
    ///
    /// Panics on a duplicate name: program names are per-case unique
    pub fn add(&mut self, name: &str, stage: shader::Stage, glsl: &str) {
        assert!(
            self.i_programs.iter().all(|(n, _)| n != name),
            "duplicate program name: {}",
            name
        );

        self.i_programs.push((
            name.to_string(),
            ProgramSource {
                stage,
                glsl: glsl.to_string(),
            },
        ));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProgramSource)> {
        self.i_programs
            .iter()
            .map(|(name, src)| (name.as_str(), src))
    }

    pub fn is_empty(&self) -> bool {
        self.i_programs.is_empty()
    }
}

/// Compiled SPIR-V for every program of a case
#[derive(Default)]
pub struct BinaryCollection {
    i_binaries: Vec<(String, Vec<u32>)>,
}

impl BinaryCollection {
    pub fn new() -> BinaryCollection {
        BinaryCollection {
            i_binaries: Vec::new(),
        }
    }

    /// Panics on a duplicate name
    pub fn add(&mut self, name: &str, code: Vec<u32>) {
        assert!(
            self.i_binaries.iter().all(|(n, _)| n != name),
            "duplicate binary name: {}",
            name
        );

        self.i_binaries.push((name.to_string(), code));
    }

    /// Panics when `name` was never compiled, which is a case bug
    pub fn require(&self, name: &str) -> &[u32] {
        match self.get(name) {
            Some(code) => code,
            None => panic!("program not compiled: {}", name),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[u32]> {
        self.i_binaries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, code)| code.as_slice())
    }
}

/// Sink for per-case diagnostic messages
///
/// Everything written here ends up in the result log as `<Text>` elements
#[derive(Default)]
pub struct CaseLog {
    i_messages: Vec<String>,
}

impl CaseLog {
    pub fn new() -> CaseLog {
        CaseLog {
            i_messages: Vec::new(),
        }
    }

    pub fn message<S: Into<String>>(&mut self, text: S) {
        let text = text.into();

        log::debug!("{}", text);

        self.i_messages.push(text);
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.i_messages.iter().map(|message| message.as_str())
    }
}

/// Everything a running test instance may touch
pub struct TestRun<'a> {
    pub ctx: &'a context::Context,
    pub binaries: &'a BinaryCollection,
    pub log: &'a mut CaseLog,
}

/// Static description of a test
pub trait TestCase {
    /// Last component of the full dot-separated case path
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// GLSL programs to compile before the instance runs
    fn init_programs(&self, _sources: &mut SourceCollection) {}

    /// Requirement check, runs before program compilation
    ///
    /// Return [`TestError::NotSupported`] to skip the case
    fn check_support(&self, _ctx: &context::Context) -> Result<(), TestError> {
        Ok(())
    }

    fn create_instance(&self) -> Box<dyn TestInstance>;
}

/// Executable side of a test, runs exactly once
pub trait TestInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError>;
}

/// Adapter turning a free function into a [`TestCase`]
pub struct FunctionCase {
    i_name: String,
    i_description: String,
    i_func: fn(&mut TestRun) -> Result<TestStatus, TestError>,
}

impl FunctionCase {
    pub fn new(
        name: &str,
        description: &str,
        func: fn(&mut TestRun) -> Result<TestStatus, TestError>,
    ) -> FunctionCase {
        FunctionCase {
            i_name: name.to_string(),
            i_description: description.to_string(),
            i_func: func,
        }
    }
}

impl TestCase for FunctionCase {
    fn name(&self) -> &str {
        &self.i_name
    }

    fn description(&self) -> &str {
        &self.i_description
    }

    fn create_instance(&self) -> Box<dyn TestInstance> {
        Box::new(FunctionInstance { i_func: self.i_func })
    }
}

struct FunctionInstance {
    i_func: fn(&mut TestRun) -> Result<TestStatus, TestError>,
}

impl TestInstance for FunctionInstance {
    fn iterate(&mut self, run: &mut TestRun) -> Result<TestStatus, TestError> {
        (self.i_func)(run)
    }
}
