use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::HarnessError;
use crate::config::HarnessConfig;
use crate::scratch::{ScratchPaths, unlink};

/// Debugger script used when a case supplies none: break at &4000 in I/O
/// space, then CALL it so the emulator exits with `bp0`.
pub const DEFAULT_SCRIPT: &str = "b 4000\nbx 0\npaste ?&4000=&60|MCALL &4000|M\nc\n";

pub const SLOW_STARTUP_BIT: u32 = 16;
pub const SHOW_TAPECTRL_BIT: u32 = 32;

/// Everything one emulator run needs. Paths are already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub script: &'a str,
    pub tape: Option<&'a Path>,
    pub extra_args: &'a [String],
    pub tapetest_bits: u32,
    pub expiry_secs: u32,
    pub cfg: &'a Path,
    /// Output file to unlink before the run.
    pub output: Option<&'a Path>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunResult {
    /// `None` when the process was killed by a signal or never started.
    pub exit_code: Option<i32>,
    pub stdout_lines: Vec<String>,
    pub exec_succeeded: bool,
    pub exec_error: Option<String>,
}

impl RunResult {
    #[must_use]
    pub fn exited(exit_code: i32, stdout_lines: Vec<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout_lines,
            exec_succeeded: true,
            exec_error: None,
        }
    }

    #[must_use]
    pub fn exec_failed(message: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            stdout_lines: Vec::new(),
            exec_succeeded: false,
            exec_error: Some(message.into()),
        }
    }
}

/// Something that can run one tape test. [`ProcessDriver`] spawns the real
/// emulator; tests substitute scripted fakes.
pub trait Emulator {
    /// Harness-level failures (scratch files that cannot be written) are
    /// errors. A binary that cannot be started is reported through
    /// [`RunResult::exec_succeeded`] instead.
    fn invoke(&mut self, invocation: &Invocation<'_>) -> Result<RunResult, HarnessError>;
}

/// Runs the emulator as a blocking child process. There is no host-side
/// watchdog; the child's own `-expire` flag bounds each run.
#[derive(Debug, Clone)]
pub struct ProcessDriver {
    program: PathBuf,
    scratch: ScratchPaths,
    slow_startup: bool,
    show_tapectrl: bool,
    verbose: bool,
    show_output: bool,
}

impl ProcessDriver {
    #[must_use]
    pub fn new(program: PathBuf, scratch: ScratchPaths) -> Self {
        Self {
            program,
            scratch,
            slow_startup: false,
            show_tapectrl: false,
            verbose: false,
            show_output: false,
        }
    }

    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            slow_startup: config.slow_startup,
            show_tapectrl: config.show_tapectrl,
            verbose: config.verbose,
            show_output: config.show_output,
            ..Self::new(config.emulator.clone(), config.scratch())
        }
    }

    #[must_use]
    pub fn effective_bits(&self, tapetest_bits: u32) -> u32 {
        let mut bits = tapetest_bits;
        if self.show_tapectrl {
            bits |= SHOW_TAPECTRL_BIT;
        }
        if self.slow_startup {
            bits |= SLOW_STARTUP_BIT;
        }
        bits
    }

    /// Arguments after the program name. `-expire` is always last.
    #[must_use]
    pub fn command_args(&self, invocation: &Invocation<'_>) -> Vec<String> {
        let mut args = vec![
            "-sp4".to_owned(),
            "-exec".to_owned(),
            self.scratch.debugger_exec().display().to_string(),
            "-cfg".to_owned(),
            invocation.cfg.display().to_string(),
            "-debug".to_owned(),
            "-tapetest".to_owned(),
            self.effective_bits(invocation.tapetest_bits).to_string(),
        ];
        if let Some(tape) = invocation.tape {
            args.push("-tape".to_owned());
            args.push(tape.display().to_string());
        }
        args.extend(invocation.extra_args.iter().cloned());
        args.push("-expire".to_owned());
        args.push(invocation.expiry_secs.to_string());
        args
    }

    fn prepare_scratch(&self, invocation: &Invocation<'_>) -> Result<(), HarnessError> {
        let script = if invocation.script.is_empty() {
            DEFAULT_SCRIPT
        } else {
            invocation.script
        };
        let path = self.scratch.debugger_exec();
        unlink(&path)
            .and_then(|()| fs::write(&path, script))
            .map_err(|source| HarnessError::Scratch {
                path: path.clone(),
                source,
            })?;

        if let Some(output) = invocation.output {
            unlink(output).map_err(|source| HarnessError::Scratch {
                path: output.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

impl Emulator for ProcessDriver {
    fn invoke(&mut self, invocation: &Invocation<'_>) -> Result<RunResult, HarnessError> {
        self.prepare_scratch(invocation)?;

        let args = self.command_args(invocation);
        if self.verbose {
            info!(program = %self.program.display(), args = %args.join(" "), "spawning emulator");
        } else {
            debug!(program = %self.program.display(), ?args, "spawning emulator");
        }

        let output = match Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                warn!(program = %self.program.display(), error = %err, "emulator failed to start");
                return Ok(RunResult::exec_failed(err.to_string()));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if self.show_output {
            println!("{stdout}");
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.chars().take(500).collect::<String>(), "emulator stderr");
        }

        let stdout_lines: Vec<String> = stdout.lines().map(str::to_owned).collect();
        debug!(
            code = ?output.status.code(),
            lines = stdout_lines.len(),
            "emulator exited"
        );
        Ok(RunResult {
            exit_code: output.status.code(),
            stdout_lines,
            exec_succeeded: true,
            exec_error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{DEFAULT_SCRIPT, Emulator, Invocation, ProcessDriver, RunResult};
    use crate::scratch::ScratchPaths;

    fn driver(root: &Path) -> ProcessDriver {
        ProcessDriver::new(
            PathBuf::from("./b-em"),
            ScratchPaths::new(root.to_path_buf()),
        )
    }

    fn invocation<'a>(extra: &'a [String], tape: Option<&'a Path>) -> Invocation<'a> {
        Invocation {
            script: "",
            tape,
            extra_args: extra,
            tapetest_bits: 7,
            expiry_secs: 10,
            cfg: Path::new("/tt/cfgs/standard.cfg"),
            output: None,
        }
    }

    #[test]
    fn command_line_order() {
        let extra = vec!["-record".to_owned(), "-tapesave".to_owned(), "/tmp/my.uef".to_owned()];
        let args = driver(Path::new("/tmp")).command_args(&invocation(
            &extra,
            Some(Path::new("/tt/UEF/a.uef")),
        ));
        assert_eq!(
            args,
            vec![
                "-sp4",
                "-exec",
                "/tmp/debugger-exec",
                "-cfg",
                "/tt/cfgs/standard.cfg",
                "-debug",
                "-tapetest",
                "7",
                "-tape",
                "/tt/UEF/a.uef",
                "-record",
                "-tapesave",
                "/tmp/my.uef",
                "-expire",
                "10",
            ]
        );
    }

    #[test]
    fn harness_flags_augment_bits() {
        let mut d = driver(Path::new("/tmp"));
        assert_eq!(d.effective_bits(0), 0);
        d.slow_startup = true;
        assert_eq!(d.effective_bits(3), 19);
        d.show_tapectrl = true;
        assert_eq!(d.effective_bits(3), 51);
        let args = d.command_args(&invocation(&[], None));
        assert!(!args.contains(&"-tape".to_owned()));
        assert_eq!(args[args.len() - 2..], ["-expire", "10"]);
    }

    #[test]
    fn script_is_rewritten_and_output_unlinked_before_spawn() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchPaths::new(dir.path().to_path_buf());
        let stale = scratch.file("my.uef");
        std::fs::write(scratch.debugger_exec(), "old script").expect("seed");
        std::fs::write(&stale, b"stale").expect("seed");

        let mut d = ProcessDriver::new(dir.path().join("no-such-emulator"), scratch.clone());
        let mut inv = invocation(&[], None);
        inv.output = Some(&stale);
        let result = d.invoke(&inv).expect("harness ok");

        assert!(!result.exec_succeeded);
        assert_eq!(result.exit_code, None);
        assert!(result.exec_error.is_some());
        assert!(!stale.exists());
        let written = std::fs::read_to_string(scratch.debugger_exec()).expect("script");
        assert_eq!(written, DEFAULT_SCRIPT);
    }

    #[test]
    fn run_result_constructors() {
        let ok = RunResult::exited(11, vec!["tapetest:x".to_owned()]);
        assert!(ok.exec_succeeded);
        assert_eq!(ok.exit_code, Some(11));
        assert!(!RunResult::exec_failed("nope").exec_succeeded);
    }
}
