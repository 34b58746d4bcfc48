use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::case::TestCase;
use crate::scratch::ScratchPaths;

pub const ENV_EMULATOR: &str = "TAPETEST_EMULATOR";
pub const ENV_TMPDIR: &str = "TAPETEST_TMPDIR";
pub const ENV_ROOT: &str = "TAPETEST_ROOT";

/// Groups that exercise protected game loaders or long-running tapes.
pub const BRIEF_EXCLUDED_GROUPS: [&str; 6] = [
    "prot-beebjit",
    "prot-x",
    "makeuef",
    "ultron",
    "tdre",
    "simpleslow",
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SuiteMode {
    /// Synthetic tests only; no protected games or slow groups.
    Brief,
    /// Everything except cases the emulator is known not to pass yet.
    #[default]
    Full,
    /// Full, plus the not-yet-passing cases.
    Extra,
}

impl SuiteMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brief => "brief",
            Self::Full => "full",
            Self::Extra => "extra",
        }
    }

    #[must_use]
    pub fn runs_group(self, group: &str) -> bool {
        !(self == Self::Brief && BRIEF_EXCLUDED_GROUPS.contains(&group))
    }

    /// Whether the mode turns `case` off. The explicit `skip` flag is not
    /// considered here.
    #[must_use]
    pub fn excludes(self, case: &TestCase) -> bool {
        match self {
            Self::Brief => case.protected || case.unimplemented || !self.runs_group(&case.group),
            Self::Full => case.unimplemented,
            Self::Extra => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Emulator executable, run from the current directory so it finds its
    /// ROMs.
    pub emulator: PathBuf,
    pub tmp_dir: PathBuf,
    /// Root of the tape-test corpus (tapes, cfgs, manifest).
    pub tests_root: PathBuf,
    pub cfg_file: PathBuf,
    pub manifest: PathBuf,
    pub event_log: Option<PathBuf>,
    pub mode: SuiteMode,
    pub verbose: bool,
    pub show_output: bool,
    pub slow_startup: bool,
    pub show_tapectrl: bool,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        Self::rooted(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"))
    }

    /// Default layout under a given corpus root.
    #[must_use]
    pub fn rooted(tests_root: PathBuf) -> Self {
        Self {
            emulator: PathBuf::from(".").join("b-em"),
            tmp_dir: std::env::temp_dir(),
            cfg_file: tests_root.join("cfgs").join("standard.cfg"),
            manifest: tests_root.join("tapetests.yaml"),
            event_log: None,
            mode: SuiteMode::default(),
            verbose: false,
            show_output: false,
            slow_startup: false,
            show_tapectrl: false,
            tests_root,
        }
    }

    /// Defaults overridden by `TAPETEST_ROOT`, `TAPETEST_EMULATOR` and
    /// `TAPETEST_TMPDIR`.
    #[must_use]
    pub fn from_env() -> Self {
        let base = match std::env::var_os(ENV_ROOT) {
            Some(root) => Self::rooted(PathBuf::from(root)),
            None => Self::default_paths(),
        };
        base.with_env_overrides()
    }

    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(emulator) = std::env::var_os(ENV_EMULATOR) {
            self.emulator = PathBuf::from(emulator);
        }
        if let Some(tmp_dir) = std::env::var_os(ENV_TMPDIR) {
            self.tmp_dir = PathBuf::from(tmp_dir);
        }
        self
    }

    #[must_use]
    pub fn scratch(&self) -> ScratchPaths {
        ScratchPaths::new(self.tmp_dir.clone())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{HarnessConfig, SuiteMode};
    use crate::case::TestCase;

    #[test]
    fn rooted_layout() {
        let config = HarnessConfig::rooted(PathBuf::from("/corpus"));
        assert_eq!(config.cfg_file, PathBuf::from("/corpus/cfgs/standard.cfg"));
        assert_eq!(config.manifest, PathBuf::from("/corpus/tapetests.yaml"));
        assert_eq!(config.mode, SuiteMode::Full);
        assert!(!config.slow_startup && !config.show_tapectrl);
    }

    #[test]
    fn brief_drops_protected_and_slow_groups() {
        let simple = TestCase::new("simple", "a");
        let slow = TestCase::new("simpleslow", "b");
        let mut prot = TestCase::new("UEF", "c");
        prot.protected = true;

        assert!(!SuiteMode::Brief.excludes(&simple));
        assert!(SuiteMode::Brief.excludes(&slow));
        assert!(SuiteMode::Brief.excludes(&prot));
        assert!(!SuiteMode::Full.excludes(&slow));
        assert!(!SuiteMode::Full.excludes(&prot));
    }

    #[test]
    fn unimplemented_runs_only_in_extra() {
        let mut case = TestCase::new("UEF-meta", "chunk &130");
        case.unimplemented = true;
        assert!(SuiteMode::Brief.excludes(&case));
        assert!(SuiteMode::Full.excludes(&case));
        assert!(!SuiteMode::Extra.excludes(&case));
    }
}
