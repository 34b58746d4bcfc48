use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exit_code::{exit_symbol, observed_symbol};

/// Stdout lines starting with this are the only ones the oracle compares.
pub const SENTINEL_PREFIX: &str = "tapetest:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FailureReason {
    /// The emulator could not be started at all.
    Exec { message: String },
    BlankOutput,
    ContentMismatch { index: usize },
    CountMismatch { expected: usize, found: usize },
    ExitMismatch { observed: String, expected: String },
    Output { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exec { .. } => f.write_str("exec"),
            Self::BlankOutput => f.write_str("blank output"),
            Self::ContentMismatch { .. } => f.write_str("content mismatch"),
            Self::CountMismatch { .. } => f.write_str("count mismatch"),
            Self::ExitMismatch { observed, expected } => write!(f, "{observed}!={expected}"),
            Self::Output { message } => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub observed_exit_symbol: String,
    pub failure: Option<FailureReason>,
}

impl Verdict {
    #[must_use]
    pub fn pass(observed_exit_symbol: String) -> Self {
        Self {
            passed: true,
            observed_exit_symbol,
            failure: None,
        }
    }

    #[must_use]
    pub fn fail(observed_exit_symbol: String, reason: FailureReason) -> Self {
        Self {
            passed: false,
            observed_exit_symbol,
            failure: Some(reason),
        }
    }

    #[must_use]
    pub fn exec_failed(message: String) -> Self {
        Self::fail(observed_symbol(None), FailureReason::Exec { message })
    }
}

/// Payloads of the sentinel lines, prefix stripped, in output order.
#[must_use]
pub fn sentinel_payloads(lines: &[String]) -> Vec<&str> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix(SENTINEL_PREFIX))
        .collect()
}

/// Strict positional comparison of sentinel payloads against `expected`.
pub fn check_transcript(lines: &[String], expected: &[String]) -> Result<(), FailureReason> {
    let payloads = sentinel_payloads(lines);
    if !expected.is_empty() && payloads.is_empty() {
        return Err(FailureReason::BlankOutput);
    }
    for (index, payload) in payloads.iter().enumerate() {
        if let Some(want) = expected.get(index)
            && *payload != want.as_str()
        {
            return Err(FailureReason::ContentMismatch { index });
        }
    }
    if payloads.len() != expected.len() {
        return Err(FailureReason::CountMismatch {
            expected: expected.len(),
            found: payloads.len(),
        });
    }
    Ok(())
}

/// Judges one completed run. The transcript is checked first; the exit code
/// is compared only when the transcript passed. `None` for either
/// expectation leaves that surface unchecked.
#[must_use]
pub fn verify(
    lines: &[String],
    expected_exit: Option<i32>,
    observed_exit: Option<i32>,
    expected_stdout: Option<&[String]>,
) -> Verdict {
    let observed = observed_symbol(observed_exit);

    if let Some(expected) = expected_stdout
        && let Err(reason) = check_transcript(lines, expected)
    {
        return Verdict::fail(observed, reason);
    }

    if let Some(expected) = expected_exit
        && observed_exit != Some(expected)
    {
        let reason = FailureReason::ExitMismatch {
            observed: observed.clone(),
            expected: exit_symbol(expected),
        };
        return Verdict::fail(observed, reason);
    }

    Verdict::pass(observed)
}
