#![cfg(unix)]
#![forbid(unsafe_code)]

//! Drives a shell-script stand-in for the emulator through the real
//! process driver and suite runner.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tt_conformance::{
    CaseOutcome, EmulatorExit, HarnessConfig, NoopHooks, OutputCheck, OutputSpec,
    ProcessDriver, TestCase, format_case_line, run_suite,
};

const FAKE_EMULATOR: &str = r#"#!/bin/sh
exec_file=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -exec) exec_file="$2"; shift ;;
    -tapesave) out="$2"; shift ;;
  esac
  shift
done
echo "fake emulator starting"
echo "tapetest:cat A"
echo "not a sentinel"
echo "tapetest:cat B"
if [ -n "$out" ]; then
  printf 'tibet 0.5\ndata\n----....\n--------\nend\n' > "$out"
fi
first="$(head -n 1 "$exec_file")"
case "$first" in
  "b 4000") exit 12 ;;
  exit*) exit "${first#exit }" ;;
  *) exit 10 ;;
esac
"#;

fn install_fake(dir: &Path) -> PathBuf {
    let path = dir.join("fake-b-em");
    fs::write(&path, FAKE_EMULATOR).expect("write fake emulator");
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn stdout(lines: &[&str]) -> Option<Vec<String>> {
    Some(lines.iter().map(|line| (*line).to_owned()).collect())
}

fn failure_text(outcome: &CaseOutcome) -> Option<String> {
    match outcome {
        CaseOutcome::Ran { verdict, .. } => verdict.failure.as_ref().map(ToString::to_string),
        CaseOutcome::Skipped => None,
    }
}

// Single test: the fake binary is written once before any child is forked.
#[test]
fn suite_against_shell_emulator() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scratch_dir = dir.path().join("scratch");
    fs::create_dir(&scratch_dir).expect("scratch dir");

    let mut config = HarnessConfig::rooted(dir.path().to_path_buf());
    config.emulator = install_fake(dir.path());
    config.tmp_dir = scratch_dir.clone();
    config.scratch().preflight().expect("preflight");

    let mut bootstrap = TestCase::new("exec", "basic run+shutdown paradigm");
    bootstrap.expected_exit = Some(EmulatorExit::Bp0.code());
    bootstrap.expected_stdout = stdout(&["cat A", "cat B"]);

    let mut wrong_exit = TestCase::new("simple", "wrong exit");
    wrong_exit.script = "exit 11\n".to_owned();
    wrong_exit.expected_exit = Some(EmulatorExit::Bp0.code());

    let mut wrong_line = TestCase::new("simple", "wrong line");
    wrong_line.expected_exit = Some(EmulatorExit::Bp0.code());
    wrong_line.expected_stdout = stdout(&["cat A", "cat C"]);

    let mut skipped = TestCase::new("simple", "skipped");
    skipped.skip = true;

    let mut save = TestCase::new("tapesave", "run lengths @ 600 baud");
    save.extra_args = vec!["-record".into(), "-tapesave".into(), "{tmp}/my.tibet".into()];
    save.expected_exit = Some(EmulatorExit::Bp0.code());
    save.output = Some(OutputSpec {
        path: "my.tibet".into(),
        expect_present: true,
        checks: vec![
            OutputCheck::Contains {
                text: "tibet".into(),
                gunzip: false,
            },
            OutputCheck::RunLengths { unit_pulses: 2 },
        ],
    });

    let cases = vec![bootstrap, wrong_exit, wrong_line, skipped, save];
    let mut driver = ProcessDriver::from_config(&config);
    let report = run_suite(&config, &cases, &mut driver, &mut NoopHooks).expect("suite runs");

    assert!(!report.aborted);
    assert_eq!(
        (report.tests_run, report.successes, report.skips),
        (4, 2, 1)
    );
    assert_eq!(failure_text(&report.cases[1].outcome).as_deref(), Some("eof!=bp0"));
    assert_eq!(
        failure_text(&report.cases[2].outcome).as_deref(),
        Some("content mismatch")
    );
    assert!(report.cases[4].outcome.passed());
    assert!(scratch_dir.join("my.tibet").exists());

    let line = format_case_line(&cases[0], &report.cases[0].outcome);
    assert!(line.starts_with("T  1:exec:basic run+shutdown paradigm"));
    assert!(line.ends_with("ok   (bp0)"));

    config.scratch().clean().expect("clean");
    assert!(!scratch_dir.join("my.tibet").exists());
}
