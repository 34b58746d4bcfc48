#![forbid(unsafe_code)]

//! Black-box conformance oracle for an emulator's cassette-tape subsystem.
//!
//! Each [`TestCase`] becomes one emulator process run. The run is judged on
//! its exit code, the `tapetest:` lines it prints, and optionally the tape
//! file it writes. [`run_suite`] sequences the cases, applies mode-based
//! skipping, and aborts the suite when the bootstrap case fails.

use std::path::PathBuf;

use thiserror::Error;

pub mod case;
pub mod checks;
pub mod config;
pub mod driver;
pub mod exit_code;
pub mod manifest;
pub mod oracle;
pub mod report;
pub mod scratch;
pub mod transcript;

pub use case::{OutputCheck, OutputSpec, TestCase};
pub use checks::{CheckFailure, check_output};
pub use config::{HarnessConfig, SuiteMode};
pub use driver::{Emulator, Invocation, ProcessDriver, RunResult};
pub use exit_code::{EmulatorExit, exit_symbol};
pub use manifest::{load_manifest, parse_manifest};
pub use oracle::{
    CaseOutcome, CaseRecord, EventLog, LifecycleHooks, NoopHooks, SuiteEvent, SuiteEventKind,
    SuiteReport, SuiteState, run_suite, step,
};
pub use report::{format_case_line, format_elapsed, format_summary};
pub use scratch::ScratchPaths;
pub use transcript::{FailureReason, SENTINEL_PREFIX, Verdict, sentinel_payloads, verify};

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("cannot prepare scratch file {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tape file does not exist: {path} (case {case})")]
    MissingTape { case: String, path: PathBuf },
    #[error("manifest error: {0}")]
    Manifest(String),
}
