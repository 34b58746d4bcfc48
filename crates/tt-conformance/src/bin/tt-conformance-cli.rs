#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tt_conformance::{
    CaseOutcome, HarnessConfig, HarnessError, LifecycleHooks, ProcessDriver, SuiteMode,
    SuiteReport, TestCase, format_case_line, format_summary, load_manifest, run_suite,
};

/// Automated tape tests for the emulator's cassette subsystem.
#[derive(Parser, Debug)]
#[command(name = "tt-conformance-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// brief: synthetic tests only; full: plus protected games and longer
    /// tests; extra: plus tests the emulator does not pass yet
    #[arg(value_enum)]
    mode: SuiteMode,

    /// Test manifest (YAML, or JSON by extension)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Emulator executable
    #[arg(long)]
    emulator: Option<PathBuf>,

    /// Writable directory for the debugger script and tape outputs
    #[arg(long)]
    tmp_dir: Option<PathBuf>,

    /// Root of the tape-test corpus
    #[arg(long)]
    tests_root: Option<PathBuf>,

    /// Default emulator config file
    #[arg(long)]
    cfg: Option<PathBuf>,

    /// Write suite events as JSONL
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Show emulator command lines
    #[arg(short, long)]
    verbose: bool,

    /// Echo the emulator's full console output
    #[arg(long)]
    show_output: bool,

    /// Delay emulator startup (slower, more stable on some hosts)
    #[arg(long)]
    slow_startup: bool,

    /// Force the tape-control window open
    #[arg(long)]
    show_tapectrl: bool,
}

struct ConsoleHooks;

impl LifecycleHooks for ConsoleHooks {
    fn after_case(&mut self, case: &TestCase, outcome: &CaseOutcome) {
        println!("{}", format_case_line(case, outcome));
    }

    fn after_suite(&mut self, report: &SuiteReport) {
        if report.aborted {
            println!("\nFATAL: Basic run-and-shutdown failed. Check paths? Aborting.");
        }
        println!("\nT\nT    {}\n", format_summary(report));
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli) {
        Ok(report) if report.is_green() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(err) => {
            eprintln!("FATAL: {err}");
            ExitCode::from(2)
        }
    }
}

fn build_config(cli: Cli) -> HarnessConfig {
    let mut config = match cli.tests_root {
        Some(root) => HarnessConfig::rooted(root).with_env_overrides(),
        None => HarnessConfig::from_env(),
    };
    if let Some(manifest) = cli.manifest {
        config.manifest = manifest;
    }
    if let Some(emulator) = cli.emulator {
        config.emulator = emulator;
    }
    if let Some(tmp_dir) = cli.tmp_dir {
        config.tmp_dir = tmp_dir;
    }
    if let Some(cfg) = cli.cfg {
        config.cfg_file = cfg;
    }
    config.event_log = cli.event_log;
    config.mode = cli.mode;
    config.verbose = cli.verbose;
    config.show_output = cli.show_output;
    config.slow_startup = cli.slow_startup;
    config.show_tapectrl = cli.show_tapectrl;
    config
}

fn run(cli: Cli) -> Result<SuiteReport, HarnessError> {
    let config = build_config(cli);
    let scratch = config.scratch();
    scratch.preflight()?;

    let cases = load_manifest(&config.manifest)?;
    let mut driver = ProcessDriver::from_config(&config);
    let report = run_suite(&config, &cases, &mut driver, &mut ConsoleHooks)?;
    scratch.clean()?;
    Ok(report)
}
