//! Case selection and execution
//!
//! The runner builds the case tree, filters it by the selection patterns,
//! creates one shared [`Context`] and executes every selected case in
//! enumeration order, writing the QPA result log as it goes. A panicking
//! case is caught and reported as a failure without taking down the run.

use crate::case::{BinaryCollection, CaseLog, SourceCollection, TestCase, TestRun};
use crate::cases;
use crate::context::{Context, ContextCfg, ContextError};
use crate::display::DisplayRegistry;
use crate::qpa;
use crate::status::{StatusCode, TestError, TestStatus};
use crate::tree;

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

pub struct RunCfg {
    /// `*`-wildcard patterns over full case paths
    pub patterns: Vec<String>,
    /// Where the QPA result log goes
    pub log_path: PathBuf,
    /// Restrict window system cases to one display factory
    pub display: Option<String>,
    pub context: ContextCfg,
}

/// Per-status counts of one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub not_supported: usize,
    pub warnings: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.not_supported + self.warnings
    }

    /// A run is ok when nothing failed; skips and warnings do not count
    pub fn is_ok(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug)]
pub enum RunnerError {
    Context(ContextError),
    Log(io::Error),
    UnknownDisplay(String),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Context(err) => write!(f, "{}", err),
            RunnerError::Log(err) => write!(f, "Failed to write result log: {}", err),
            RunnerError::UnknownDisplay(name) => write!(f, "Unknown display: {}", name),
        }
    }
}

impl Error for RunnerError {}

impl From<ContextError> for RunnerError {
    fn from(err: ContextError) -> RunnerError {
        RunnerError::Context(err)
    }
}

impl From<io::Error> for RunnerError {
    fn from(err: io::Error) -> RunnerError {
        RunnerError::Log(err)
    }
}

fn registry_for(display: Option<&str>) -> Result<DisplayRegistry, RunnerError> {
    let mut registry = DisplayRegistry::with_defaults();

    if let Some(name) = display {
        if !registry.retain(name) {
            return Err(RunnerError::UnknownDisplay(name.to_string()));
        }
    }

    Ok(registry)
}

/// Print `GROUP:`/`TEST:` lines for the selected subtree
pub fn list(patterns: &[String], display: Option<&str>) -> Result<(), RunnerError> {
    let registry = registry_for(display)?;
    let root = cases::build_root(&registry);

    let selected: Vec<String> = root
        .case_paths()
        .into_iter()
        .filter(|path| tree::matches_any(patterns, path))
        .collect();

    for (path, is_group) in root.entries() {
        if is_group {
            let prefix = format!("{}.", path);

            if selected.iter().any(|case| case.starts_with(&prefix)) {
                println!("GROUP: {}", path);
            }
        } else if selected.contains(&path) {
            println!("TEST: {}", path);
        }
    }

    Ok(())
}

/// Execute every case matching the patterns
///
/// Returns the summary; only infrastructure problems (no device, log IO)
/// are reported as `Err`, case failures end up in the summary
pub fn execute(cfg: &RunCfg) -> Result<RunSummary, RunnerError> {
    let registry = registry_for(cfg.display.as_deref())?;
    let root = cases::build_root(&registry);

    let selected: Vec<(String, &dyn TestCase)> = root
        .cases()
        .into_iter()
        .filter(|(path, _)| tree::matches_any(&cfg.patterns, path))
        .collect();

    let target = cfg.display.as_deref().unwrap_or("default");
    let mut log = qpa::TestLog::create(&cfg.log_path, target)?;

    let ctx = Context::new(&cfg.context)?;

    log::info!("running {} cases", selected.len());

    let mut summary = RunSummary::default();

    for (path, case) in selected {
        log.begin_case(&path)?;

        let mut case_log = CaseLog::new();
        let status = run_case(&ctx, case, &mut case_log);

        for message in case_log.messages() {
            log.message(message)?;
        }

        log.end_case(&status)?;

        println!("{}: {}", path, status);

        match status.code() {
            StatusCode::Pass => summary.passed += 1,
            StatusCode::Fail => summary.failed += 1,
            StatusCode::NotSupported => summary.not_supported += 1,
            StatusCode::QualityWarning => summary.warnings += 1,
        }

        // A case must not leak device work into the next one
        if let Err(err) = ctx.device().wait_idle() {
            log::error!("{}", err);
        }
    }

    log.end_session()?;

    Ok(summary)
}

fn run_case(ctx: &Context, case: &dyn TestCase, case_log: &mut CaseLog) -> TestStatus {
    if let Err(err) = case.check_support(ctx) {
        return status_from_error(err);
    }

    let mut sources = SourceCollection::new();
    case.init_programs(&mut sources);

    let mut binaries = BinaryCollection::new();

    for (name, source) in sources.iter() {
        match ctx.compile(name, source.stage, &source.glsl) {
            Ok(code) => binaries.add(name, code),
            Err(err) => return TestStatus::fail(err.to_string()),
        }
    }

    let mut instance = case.create_instance();

    let mut run = TestRun {
        ctx,
        binaries: &binaries,
        log: case_log,
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| instance.iterate(&mut run)));

    match outcome {
        Ok(Ok(status)) => status,
        Ok(Err(err)) => status_from_error(err),
        Err(payload) => TestStatus::fail(panic_message(&payload)),
    }
}

fn status_from_error(err: TestError) -> TestStatus {
    match err {
        TestError::NotSupported(what) => TestStatus::not_supported(what),
        other => TestStatus::fail(other.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panic: {}", text)
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panic: {}", text)
    } else {
        "panic".to_string()
    }
}
