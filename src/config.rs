//! Configuration loading from TOML.
//!
//! Every key has a default that reproduces the fixed layout of the
//! simulation project (`tests/fingerprints.yml`, `opp_run`, the model's
//! shared library two levels above each example directory), so the file
//! is optional. Paths are resolved once, up front, into absolute form.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read when `FPCHECK_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "fingerprint-check.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub harness: HarnessConfig,
    pub simulator: SimulatorConfig,
    pub markers: MarkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory holding the cases file.
    pub tests_dir: PathBuf,
    pub cases_file: PathBuf,
    /// Directory case `workdir`s are relative to. Defaults to `tests_dir/..`.
    pub run_root: Option<PathBuf>,
    /// Deadline for draining one case's output; 0 disables it.
    pub case_timeout_secs: u64,
    /// Write re-baselined fingerprints back to the cases file.
    pub rewrite_cases: bool,
    /// Where to write the JSON run record, if anywhere.
    pub record_path: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tests_dir: PathBuf::from("."),
            cases_file: PathBuf::from("fingerprints.yml"),
            run_root: None,
            case_timeout_secs: 0,
            rewrite_cases: false,
            record_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulatorConfig {
    pub program: String,
    /// Model library, relative to each case's working directory.
    pub library: String,
    pub ned_path: String,
    pub user_interface: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            program: "opp_run".to_string(),
            library: "../../src/libib_flit_sim.so".to_string(),
            ned_path: "..:../../src".to_string(),
            user_interface: "Cmdenv".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarkerConfig {
    pub verified: String,
    /// Text immediately preceding the calculated fingerprint.
    pub mismatch_prefix: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            verified: "Fingerprint successfully verified".to_string(),
            mismatch_prefix: "Fingerprint mismatch! calculated: ".to_string(),
        }
    }
}

/// Absolute locations derived from [`HarnessConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub cases_file: PathBuf,
    pub run_root: PathBuf,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load `path` when given explicitly; otherwise fall back to defaults if
    /// the default file is absent.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }
}

impl HarnessConfig {
    pub fn case_timeout(&self) -> Option<Duration> {
        (self.case_timeout_secs > 0).then(|| Duration::from_secs(self.case_timeout_secs))
    }

    /// Resolve the cases file and canonical run root relative to `base`.
    ///
    /// The run root must exist; each case's working directory is joined onto
    /// it, never onto the previous case's directory.
    pub fn resolve(&self, base: &Path) -> Result<ResolvedPaths> {
        let tests_dir = base.join(&self.tests_dir);
        let cases_file = tests_dir.join(&self.cases_file);
        let root = match &self.run_root {
            Some(root) => base.join(root),
            None => tests_dir.join(".."),
        };
        let run_root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve run root: {}", root.display()))?;
        Ok(ResolvedPaths { cases_file, run_root })
    }
}
