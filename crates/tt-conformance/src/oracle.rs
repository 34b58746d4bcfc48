use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::HarnessError;
use crate::case::TestCase;
use crate::checks::check_output;
use crate::config::{HarnessConfig, SuiteMode};
use crate::driver::{Emulator, Invocation};
use crate::transcript::{FailureReason, Verdict, verify};

/// Running totals for one suite. Threaded through [`step`] by the caller;
/// nothing else mutates it.
#[derive(Debug, Clone)]
pub struct SuiteState {
    pub tests_run: usize,
    pub successes: usize,
    pub skips: usize,
    started: Instant,
}

impl SuiteState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tests_run: 0,
            successes: 0,
            skips: 0,
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for SuiteState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CaseOutcome {
    Skipped,
    Ran { number: usize, verdict: Verdict },
}

impl CaseOutcome {
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Ran { verdict, .. } if verdict.passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub group: String,
    pub name: String,
    pub outcome: CaseOutcome,
}

/// Suite event kinds written to the JSONL log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SuiteEventKind {
    SuiteStart {
        mode: SuiteMode,
        cases: usize,
    },
    CaseEnd {
        group: String,
        name: String,
        outcome: CaseOutcome,
        elapsed_ms: u64,
    },
    Aborted {
        reason: String,
    },
    SuiteEnd {
        tests_run: usize,
        successes: usize,
        skips: usize,
        elapsed_secs: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteEvent {
    pub ts_unix_ms: u64,
    pub event: SuiteEventKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    pub events: Vec<SuiteEvent>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, event: SuiteEventKind) {
        self.events.push(SuiteEvent {
            ts_unix_ms: now_unix_ms(),
            event,
        });
    }

    pub fn write_jsonl(&self, path: &Path) -> Result<(), HarnessError> {
        let mut file = fs::File::create(path)?;
        for entry in &self.events {
            let line = serde_json::to_string(entry)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Callbacks around suite execution. Default implementations are no-ops.
pub trait LifecycleHooks {
    fn before_suite(&mut self, _mode: SuiteMode, _cases: &[TestCase]) {}
    fn before_case(&mut self, _case: &TestCase) {}
    fn after_case(&mut self, _case: &TestCase, _outcome: &CaseOutcome) {}
    fn after_suite(&mut self, _report: &SuiteReport) {}
}

/// Default no-op hooks.
pub struct NoopHooks;
impl LifecycleHooks for NoopHooks {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub mode: SuiteMode,
    pub tests_run: usize,
    pub successes: usize,
    pub skips: usize,
    /// Set when the bootstrap case failed and the remaining cases were not
    /// attempted.
    pub aborted: bool,
    pub elapsed_secs: u64,
    pub cases: Vec<CaseRecord>,
    pub events: EventLog,
}

impl SuiteReport {
    #[must_use]
    pub fn is_green(&self) -> bool {
        !self.aborted && self.successes == self.tests_run
    }
}

/// Resolves `path` inside the scratch directory unless it is absolute or
/// carries a `{tmp}` placeholder.
fn output_path(config: &HarnessConfig, path: &Path) -> PathBuf {
    let scratch = config.scratch();
    let expanded = scratch.expand_path(path);
    if expanded.is_absolute() {
        expanded
    } else {
        scratch.root().join(expanded)
    }
}

/// Runs or skips one case and folds its verdict into `state`.
///
/// A tape outside the scratch directory that does not exist is a broken
/// corpus and aborts with [`HarnessError::MissingTape`]. A missing scratch
/// tape means an earlier save failed, so only this case fails.
pub fn step(
    state: &mut SuiteState,
    config: &HarnessConfig,
    case: &TestCase,
    skip: bool,
    emulator: &mut dyn Emulator,
) -> Result<CaseOutcome, HarnessError> {
    if skip {
        state.skips += 1;
        return Ok(CaseOutcome::Skipped);
    }

    let scratch = config.scratch();
    let tape = case.tape.as_deref().map(|tape| scratch.expand_path(tape));
    let extra_args: Vec<String> = case.extra_args.iter().map(|arg| scratch.expand(arg)).collect();
    let cfg = case.cfg.clone().unwrap_or_else(|| config.cfg_file.clone());
    let output = case
        .output
        .as_ref()
        .map(|spec| (spec, output_path(config, &spec.path)));

    state.tests_run += 1;
    let number = state.tests_run;

    if let Some(tape) = &tape
        && !tape.exists()
    {
        if !scratch.is_scratch(tape) {
            return Err(HarnessError::MissingTape {
                case: case.label(),
                path: tape.clone(),
            });
        }
        let verdict = Verdict::fail(
            "-".to_owned(),
            FailureReason::Output {
                message: "no tape".to_owned(),
            },
        );
        return Ok(CaseOutcome::Ran { number, verdict });
    }

    let invocation = Invocation {
        script: &case.script,
        tape: tape.as_deref(),
        extra_args: &extra_args,
        tapetest_bits: case.tapetest_bits,
        expiry_secs: case.expiry_secs,
        cfg: &cfg,
        output: output.as_ref().map(|(_, path)| path.as_path()),
    };
    let run = emulator.invoke(&invocation)?;

    let mut verdict = if run.exec_succeeded {
        verify(
            &run.stdout_lines,
            case.expected_exit,
            run.exit_code,
            case.expected_stdout.as_deref(),
        )
    } else {
        Verdict::exec_failed(run.exec_error.unwrap_or_default())
    };

    if verdict.passed
        && let Some((spec, path)) = &output
        && let Err(failure) = check_output(path, spec)
    {
        debug!(case = %case.label(), path = %path.display(), %failure, "output check failed");
        verdict = Verdict::fail(
            verdict.observed_exit_symbol,
            FailureReason::Output {
                message: failure.to_string(),
            },
        );
    }

    if verdict.passed {
        state.successes += 1;
    }
    Ok(CaseOutcome::Ran { number, verdict })
}

/// Runs `cases` in order, one emulator process at a time.
///
/// The first case that is not skipped is the bootstrap: if it fails, no
/// further case is attempted and the report is marked `aborted`. The
/// bootstrap (index 0) is never skipped by mode, only by its own flag.
pub fn run_suite(
    config: &HarnessConfig,
    cases: &[TestCase],
    emulator: &mut dyn Emulator,
    hooks: &mut dyn LifecycleHooks,
) -> Result<SuiteReport, HarnessError> {
    let mut state = SuiteState::new();
    let mut events = EventLog::new();
    let mut records = Vec::with_capacity(cases.len());
    let mut bootstrap_done = false;
    let mut aborted = false;

    hooks.before_suite(config.mode, cases);
    events.record(SuiteEventKind::SuiteStart {
        mode: config.mode,
        cases: cases.len(),
    });
    info!(mode = config.mode.as_str(), cases = cases.len(), "suite start");

    for (index, case) in cases.iter().enumerate() {
        let skip = case.skip || (index > 0 && config.mode.excludes(case));
        hooks.before_case(case);
        let case_start = Instant::now();
        let outcome = step(&mut state, config, case, skip, emulator)?;
        hooks.after_case(case, &outcome);

        events.record(SuiteEventKind::CaseEnd {
            group: case.group.clone(),
            name: case.name.clone(),
            outcome: outcome.clone(),
            elapsed_ms: case_start.elapsed().as_millis() as u64,
        });
        let ran = !outcome.is_skipped();
        records.push(CaseRecord {
            group: case.group.clone(),
            name: case.name.clone(),
            outcome,
        });

        if ran && !bootstrap_done {
            bootstrap_done = true;
            if state.successes == 0 {
                let reason = format!("bootstrap case {} failed", case.label());
                error!(case = %case.label(), "basic run-and-shutdown failed; aborting suite");
                events.record(SuiteEventKind::Aborted { reason });
                aborted = true;
                break;
            }
        }
    }

    let elapsed_secs = state.elapsed().as_secs();
    events.record(SuiteEventKind::SuiteEnd {
        tests_run: state.tests_run,
        successes: state.successes,
        skips: state.skips,
        elapsed_secs,
    });
    info!(
        tests_run = state.tests_run,
        successes = state.successes,
        skips = state.skips,
        aborted,
        "suite end"
    );

    let report = SuiteReport {
        mode: config.mode,
        tests_run: state.tests_run,
        successes: state.successes,
        skips: state.skips,
        aborted,
        elapsed_secs,
        cases: records,
        events,
    };
    hooks.after_suite(&report);

    if let Some(path) = &config.event_log {
        report.events.write_jsonl(path)?;
    }
    Ok(report)
}
