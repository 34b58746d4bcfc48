use crate::case::TestCase;
use crate::oracle::{CaseOutcome, SuiteReport};

pub const NAME_PAD: usize = 58;

/// One `T` line for a finished case, e.g.
/// `T  3:UEF:chunk &117 ...   ok   (eof)`.
#[must_use]
pub fn format_case_line(case: &TestCase, outcome: &CaseOutcome) -> String {
    let label = format!("{:<NAME_PAD$}", case.label());
    match outcome {
        CaseOutcome::Skipped => format!("T    {label} skip (-)"),
        CaseOutcome::Ran { number, verdict } if verdict.passed => {
            format!("T{number:3}:{label} ok   ({})", verdict.observed_exit_symbol)
        }
        CaseOutcome::Ran { number, verdict } => match &verdict.failure {
            Some(reason) => format!("T{number:3}:{label} FAIL ({reason})"),
            None => format!("T{number:3}:{label} FAIL"),
        },
    }
}

/// `H:MM:SS` past an hour, `MM:SS` past a minute, else `N second(s)`.
#[must_use]
pub fn format_elapsed(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{mins:02}:{secs:02}")
    } else if mins > 0 {
        format!("{mins:02}:{secs:02}")
    } else if secs == 1 {
        "1 second".to_owned()
    } else {
        format!("{secs} seconds")
    }
}

#[must_use]
pub fn format_summary(report: &SuiteReport) -> String {
    format!(
        "RESULTS: {} / {} tests succeeded, {} skipped; took {}",
        report.successes,
        report.tests_run,
        report.skips,
        format_elapsed(report.elapsed_secs)
    )
}
