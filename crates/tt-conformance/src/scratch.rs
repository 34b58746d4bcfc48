use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::HarnessError;

pub const TMP_PLACEHOLDER: &str = "{tmp}";

pub const DEBUGGER_EXEC: &str = "debugger-exec";
pub const UEF_OUT: &str = "my.uef";
pub const UEF_UNCOMPRESSED_OUT: &str = "my.unzuef";
pub const CSW_OUT: &str = "my.csw";
pub const CSW_UNCOMPRESSED_OUT: &str = "my.unzcsw";
pub const TIBET_OUT: &str = "my.tibet";
pub const TIBETZ_OUT: &str = "my.tibetz";
pub const WAV_OUT: &str = "my.wav";
pub const SERIAL_OUT: &str = "rs423out.txt";

pub const SCRATCH_FILES: [&str; 9] = [
    DEBUGGER_EXEC,
    UEF_OUT,
    UEF_UNCOMPRESSED_OUT,
    CSW_OUT,
    CSW_UNCOMPRESSED_OUT,
    TIBET_OUT,
    TIBETZ_OUT,
    WAV_OUT,
    SERIAL_OUT,
];

/// Fixed scratch paths shared by every emulator run. Runs are sequential,
/// so one set of names suffices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchPaths {
    root: PathBuf,
}

impl ScratchPaths {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn debugger_exec(&self) -> PathBuf {
        self.root.join(DEBUGGER_EXEC)
    }

    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn all(&self) -> impl Iterator<Item = PathBuf> + '_ {
        SCRATCH_FILES.iter().map(|name| self.root.join(name))
    }

    /// Replaces every `{tmp}` in `text` with the scratch directory.
    #[must_use]
    pub fn expand(&self, text: &str) -> String {
        text.replace(TMP_PLACEHOLDER, &self.root.to_string_lossy())
    }

    #[must_use]
    pub fn expand_path(&self, path: &Path) -> PathBuf {
        match path.to_str() {
            Some(text) if text.contains(TMP_PLACEHOLDER) => PathBuf::from(self.expand(text)),
            _ => path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn is_scratch(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Proves every scratch file can be created, then removes them all.
    pub fn preflight(&self) -> Result<(), HarnessError> {
        self.clean()?;
        for path in self.all() {
            fs::write(&path, b" ").map_err(|source| HarnessError::Scratch {
                path: path.clone(),
                source,
            })?;
        }
        self.clean()
    }

    pub fn clean(&self) -> Result<(), HarnessError> {
        for path in self.all() {
            unlink(&path).map_err(|source| HarnessError::Scratch {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Removes `path`; a file that is already gone is not an error.
pub fn unlink(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
