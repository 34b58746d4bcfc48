use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::HarnessError;
use crate::case::TestCase;
use crate::scratch::TMP_PLACEHOLDER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
}

impl ManifestFormat {
    /// `.json` is JSON; anything else is read as YAML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    cases: Vec<TestCase>,
}

pub fn load_manifest(path: &Path) -> Result<Vec<TestCase>, HarnessError> {
    let body = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let cases = parse_manifest(&body, ManifestFormat::from_path(path), base_dir)?;
    debug!(path = %path.display(), cases = cases.len(), "manifest loaded");
    Ok(cases)
}

/// Parses a manifest body and resolves `tape` and `cfg` against `base_dir`.
pub fn parse_manifest(
    body: &str,
    format: ManifestFormat,
    base_dir: &Path,
) -> Result<Vec<TestCase>, HarnessError> {
    let file: ManifestFile = match format {
        ManifestFormat::Yaml => serde_yaml::from_str(body)?,
        ManifestFormat::Json => serde_json::from_str(body)?,
    };
    if file.cases.is_empty() {
        return Err(HarnessError::Manifest("manifest has no cases".to_owned()));
    }

    file.cases
        .into_iter()
        .enumerate()
        .map(|(index, mut case)| {
            if case.group.is_empty() || case.name.is_empty() {
                return Err(HarnessError::Manifest(format!(
                    "case #{index} needs both a group and a name"
                )));
            }
            case.tape = case.tape.map(|tape| resolve(base_dir, tape));
            case.cfg = case.cfg.map(|cfg| resolve(base_dir, cfg));
            Ok(case)
        })
        .collect()
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    let templated = path
        .to_str()
        .is_some_and(|text| text.starts_with(TMP_PLACEHOLDER));
    if path.is_absolute() || templated {
        path
    } else {
        base_dir.join(path)
    }
}
