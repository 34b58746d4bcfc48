use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_EXPIRY_SECS: u32 = 10;

fn default_expiry() -> u32 {
    DEFAULT_EXPIRY_SECS
}

fn default_true() -> bool {
    true
}

/// One emulator run and what it must produce. Built once by the manifest
/// loader and never mutated while the suite runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    pub group: String,
    pub name: String,
    /// Debugger commands, passed through verbatim. Empty selects the
    /// default shutdown script.
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub tape: Option<PathBuf>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// `None` leaves the exit code unchecked.
    #[serde(
        default,
        deserialize_with = "crate::exit_code::deserialize_expected_exit"
    )]
    pub expected_exit: Option<i32>,
    /// `None` leaves the transcript unchecked; `Some(vec![])` demands that
    /// no sentinel lines appear.
    #[serde(default)]
    pub expected_stdout: Option<Vec<String>>,
    #[serde(default)]
    pub tapetest_bits: u32,
    #[serde(default = "default_expiry")]
    pub expiry_secs: u32,
    /// Per-case emulator config; the harness default applies when absent.
    #[serde(default)]
    pub cfg: Option<PathBuf>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub unimplemented: bool,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub output: Option<OutputSpec>,
}

impl TestCase {
    #[must_use]
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            script: String::new(),
            tape: None,
            extra_args: Vec::new(),
            expected_exit: None,
            expected_stdout: None,
            tapetest_bits: 0,
            expiry_secs: DEFAULT_EXPIRY_SECS,
            cfg: None,
            skip: false,
            unimplemented: false,
            protected: false,
            output: None,
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }
}

/// A tape or serial file the run writes, and the checks it must pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSpec {
    /// Relative paths are taken inside the scratch directory.
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub expect_present: bool,
    #[serde(default)]
    pub checks: Vec<OutputCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "check")]
pub enum OutputCheck {
    /// The file decodes as a UEF container.
    Parses,
    /// Header only, no chunks.
    NoChunks,
    OriginFirst,
    OriginCount {
        count: usize,
    },
    ChunkTypeCount {
        chunk_type: u16,
        count: usize,
    },
    BaudSequence {
        bauds: Vec<u16>,
    },
    NoSilenceAfterData,
    RunLengths {
        unit_pulses: u32,
    },
    ToneSequence {
        pattern: String,
    },
    MagicPrefix {
        magic: String,
    },
    Contains {
        text: String,
        #[serde(default)]
        gunzip: bool,
    },
    Lacks {
        text: String,
        #[serde(default)]
        gunzip: bool,
    },
    ExactText {
        text: String,
    },
}
