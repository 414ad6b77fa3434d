//! Command line test runner
//!
//! `RUST_LOG` controls diagnostic output; the QPA result log written by
//! `run` is separate and always produced.

use anyhow::Result;
use clap::{Parser, Subcommand};

use vkcts::context::ContextCfg;
use vkcts::runner::{self, RunCfg, RunSummary};

use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List test cases matching the selection patterns
    List {
        /// `*`-wildcard pattern over full case paths, repeatable
        /// or comma separated
        #[arg(short = 'c', long = "case", value_name = "PATTERN", value_delimiter = ',')]
        cases: Vec<String>,
        /// Generate window system cases for this display factory only
        #[arg(long, value_name = "NAME")]
        display: Option<String>,
    },
    /// Execute test cases matching the selection patterns
    Run {
        /// `*`-wildcard pattern over full case paths, repeatable
        /// or comma separated
        #[arg(short = 'c', long = "case", value_name = "PATTERN", value_delimiter = ',')]
        cases: Vec<String>,
        /// Index into the physical device enumeration order
        #[arg(long, value_name = "N", default_value_t = 0)]
        device_index: usize,
        /// Enable the validation layer and the debug messenger
        #[arg(long)]
        validation: bool,
        /// Restrict window system cases to one display factory
        #[arg(long, value_name = "NAME")]
        display: Option<String>,
        /// Result log path
        #[arg(long, value_name = "PATH", default_value = "TestResults.qpa")]
        log: PathBuf,
    },
}

/// An empty selection means everything
fn patterns_or_all(cases: Vec<String>) -> Vec<String> {
    if cases.is_empty() {
        vec!["*".to_string()]
    } else {
        cases
    }
}

fn print_totals(summary: &RunSummary) {
    let total = summary.total();

    println!();
    println!("Test run totals:");
    println!("  Passed:        {}/{}", summary.passed, total);
    println!("  Failed:        {}/{}", summary.failed, total);
    println!("  Not supported: {}/{}", summary.not_supported, total);
    println!("  Warnings:      {}/{}", summary.warnings, total);
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Command::List { cases, display } => {
            runner::list(&patterns_or_all(cases), display.as_deref())?;

            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            cases,
            device_index,
            validation,
            display,
            log,
        } => {
            let cfg = RunCfg {
                patterns: patterns_or_all(cases),
                log_path: log,
                display,
                context: ContextCfg {
                    device_index,
                    validation,
                },
            };

            let summary = runner::execute(&cfg)?;

            print_totals(&summary);

            if summary.is_ok() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
