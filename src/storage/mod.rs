//! Persistence layer.
//!
//! Reads the YAML list of test cases, writes it back after re-baselining,
//! and saves the JSON run record.

use std::path::Path;
use tracing::{debug, error, info};

use crate::config::HarnessConfig;
use crate::engine::reporter::{RunRecord, RunReport};
use crate::types::{HarnessError, TestCase};

/// Load the ordered list of test cases.
///
/// Only the document shape is checked here (a sequence of mappings);
/// missing keys surface when a case is turned into an invocation.
pub fn load_cases(path: &Path) -> Result<Vec<TestCase>, HarnessError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| HarnessError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let cases: Vec<TestCase> = serde_yaml::from_str(&yaml).map_err(|source| HarnessError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), count = cases.len(), "Test cases loaded");
    Ok(cases)
}

/// Render the case list as a YAML document.
pub fn render_cases(cases: &[TestCase]) -> Result<String, HarnessError> {
    serde_yaml::to_string(cases).map_err(HarnessError::Render)
}

/// Overwrite the cases file with the (re-baselined) list.
pub fn save_cases(cases: &[TestCase], path: &Path) -> Result<(), HarnessError> {
    let yaml = render_cases(cases)?;
    std::fs::write(path, yaml).map_err(|e| HarnessError::Persist {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    info!(path = %path.display(), count = cases.len(), "Test cases rewritten");
    Ok(())
}

/// Save the run record as pretty JSON.
pub fn save_run_record(record: &RunRecord, path: &Path) -> Result<(), HarnessError> {
    let persist_err = |message: String| HarnessError::Persist {
        path: path.to_path_buf(),
        message,
    };

    let json = serde_json::to_string_pretty(record).map_err(|e| persist_err(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| persist_err(e.to_string()))?;

    debug!(path = %path.display(), summary = %record.summary, "Run record saved");
    Ok(())
}

/// Which side outputs [`persist_run`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Persisted {
    pub cases_rewritten: bool,
    pub record_saved: bool,
}

/// Write the optional side outputs of a run.
///
/// The cases file is rewritten only when `rewrite_cases` is set and at least
/// one fingerprint was re-baselined. Failures are logged and reported as
/// `false`; they never affect the run's result.
pub fn persist_run(
    harness: &HarnessConfig,
    cases_file: &Path,
    cases: &[TestCase],
    report: &RunReport,
) -> Persisted {
    let mut persisted = Persisted::default();

    if harness.rewrite_cases && report.needs_rewrite() {
        match save_cases(cases, cases_file) {
            Ok(()) => persisted.cases_rewritten = true,
            Err(e) => error!(error = %e, "Failed to rewrite test cases"),
        }
    }

    if let Some(path) = &harness.record_path {
        match save_run_record(&report.to_record(), path) {
            Ok(()) => persisted.record_saved = true,
            Err(e) => error!(error = %e, "Failed to save run record"),
        }
    }

    persisted
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
