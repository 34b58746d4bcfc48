#![forbid(unsafe_code)]

//! Checks over TIBET tone text.
//!
//! A TIBET file describes a tape as lines of tone characters, `.` and `-`
//! being the two square-wave polarities. Each data block sits between a
//! `data` keyword and an `end` keyword. Stripping newlines joins a block
//! onto one line so a single pattern finds every block.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub const TIBET_MAGIC: &str = "tibet";
pub const TONE_CHARS: [char; 2] = ['.', '-'];

static SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"data([.-]*)end").expect("span regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunViolation {
    #[error("span {span}: run of {run_length} at offset {offset} is not a multiple of {tone_unit}")]
    NotMultiple {
        span: usize,
        offset: usize,
        run_length: usize,
        tone_unit: usize,
    },
    #[error("shortest run is {min_run}, expected exactly {tone_unit}")]
    ShortestRun { min_run: usize, tone_unit: usize },
    #[error("spans contain no tone runs")]
    NoRuns,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToneError {
    #[error("no data spans found")]
    NoSpans,
    #[error("tone unit must be at least one pulse")]
    ZeroUnit,
    #[error("run-length violation: {0}")]
    RunLengthViolation(RunViolation),
}

/// Tone characters found between one `data` / `end` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneSpan {
    tones: String,
}

impl ToneSpan {
    #[must_use]
    pub fn tones(&self) -> &str {
        &self.tones
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }

    /// Maximal runs of one repeated tone character as `(offset, length)`.
    #[must_use]
    pub fn runs(&self) -> Vec<(usize, usize)> {
        let bytes = self.tones.as_bytes();
        let mut runs = Vec::new();
        let mut start = 0;
        for i in 1..=bytes.len() {
            if i == bytes.len() || bytes[i] != bytes[start] {
                runs.push((start, i - start));
                start = i;
            }
        }
        runs
    }
}

fn strip_newlines(text: &str) -> String {
    text.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

/// Every `data`..`end` span of `text`, newlines removed first.
#[must_use]
pub fn extract_tone_spans(text: &str) -> Vec<ToneSpan> {
    let flat = strip_newlines(text);
    SPAN_RE
        .captures_iter(&flat)
        .filter_map(|caps| caps.get(1))
        .map(|m| ToneSpan {
            tones: m.as_str().to_owned(),
        })
        .collect()
}

/// Checks that every tone run in every span is a whole number of tone units
/// (`2 * unit_pulses` characters) and that the shortest run is exactly one
/// unit. The first violation is returned.
pub fn check_run_lengths(text: &str, unit_pulses: u32) -> Result<(), ToneError> {
    if unit_pulses == 0 {
        return Err(ToneError::ZeroUnit);
    }
    let tone_unit = 2 * unit_pulses as usize;

    let spans = extract_tone_spans(text);
    if spans.is_empty() {
        return Err(ToneError::NoSpans);
    }

    let mut shortest: Option<usize> = None;
    for (span, tone_span) in spans.iter().enumerate() {
        // The last run of a span is checked like any other.
        for (offset, run_length) in tone_span.runs() {
            if run_length < tone_unit || run_length % tone_unit != 0 {
                return Err(ToneError::RunLengthViolation(RunViolation::NotMultiple {
                    span,
                    offset,
                    run_length,
                    tone_unit,
                }));
            }
            shortest = Some(shortest.map_or(run_length, |s| s.min(run_length)));
        }
    }

    match shortest {
        None => Err(ToneError::RunLengthViolation(RunViolation::NoRuns)),
        Some(min_run) if min_run != tone_unit => Err(ToneError::RunLengthViolation(
            RunViolation::ShortestRun { min_run, tone_unit },
        )),
        Some(_) => Ok(()),
    }
}

/// Whether `pattern` occurs in `text` once newlines are removed.
#[must_use]
pub fn contains_tone_sequence(text: &str, pattern: &str) -> bool {
    strip_newlines(text).contains(pattern)
}

#[must_use]
pub fn has_tibet_magic(text: &str) -> bool {
    text.contains(TIBET_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::{
        RunViolation, ToneError, check_run_lengths, contains_tone_sequence, extract_tone_spans,
        has_tibet_magic,
    };

    #[test]
    fn four_pulses_at_unit_two_is_ok() {
        check_run_lengths("data----end", 2).expect("one unit");
    }

    #[test]
    fn run_of_three_is_a_violation() {
        let err = check_run_lengths("data---....end", 2).expect_err("3 is not 4");
        assert_eq!(
            err,
            ToneError::RunLengthViolation(RunViolation::NotMultiple {
                span: 0,
                offset: 0,
                run_length: 3,
                tone_unit: 4,
            })
        );
    }

    #[test]
    fn trailing_run_is_checked() {
        assert!(matches!(
            check_run_lengths("data----..end", 2),
            Err(ToneError::RunLengthViolation(RunViolation::NotMultiple {
                offset: 4,
                run_length: 2,
                ..
            }))
        ));
    }

    #[test]
    fn multiples_need_one_exact_unit() {
        check_run_lengths("data........----........end", 2).expect("4 is present");
        assert_eq!(
            check_run_lengths("data........--------end", 2),
            Err(ToneError::RunLengthViolation(RunViolation::ShortestRun {
                min_run: 8,
                tone_unit: 4,
            }))
        );
    }

    #[test]
    fn newlines_are_stripped_before_matching() {
        let text = "tibet 0.5\nleader 100\ndata\n--\n--\n....\nend\n";
        let spans = extract_tone_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].tones(), "----....");
        check_run_lengths(text, 2).expect("split lines join");
    }

    #[test]
    fn shortest_run_spans_all_blocks() {
        let text = "data--------end\nsilence 1.0\ndata....----end";
        assert_eq!(extract_tone_spans(text).len(), 2);
        check_run_lengths(text, 2).expect("second span has a unit run");
    }

    #[test]
    fn no_spans_and_zero_unit() {
        assert_eq!(check_run_lengths("leader 20\n", 2), Err(ToneError::NoSpans));
        assert_eq!(check_run_lengths("data--end", 0), Err(ToneError::ZeroUnit));
        assert_eq!(
            check_run_lengths("dataend", 1),
            Err(ToneError::RunLengthViolation(RunViolation::NoRuns))
        );
    }

    #[test]
    fn runs_of_a_span() {
        let spans = extract_tone_spans("data..---.end");
        assert_eq!(spans[0].runs(), vec![(0, 2), (2, 3), (5, 1)]);
        assert!(extract_tone_spans("dataend")[0].is_empty());
    }

    #[test]
    fn tone_sequence_and_magic() {
        let text = "tibet 0.5\ndata\n--..\n--..\nend\n";
        assert!(contains_tone_sequence(text, "--..--.."));
        assert!(!contains_tone_sequence(text, "...."));
        assert!(has_tibet_magic(text));
        assert!(!has_tibet_magic("RIFF"));
    }
}
