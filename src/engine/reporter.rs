//! Run reporter — pass/fail tally, final dump, and the JSON run record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::storage;
use crate::types::{CaseOutcome, HarnessError, Summary, TestCase};

// ---------------------------------------------------------------------------
// Per-case report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    pub index: usize,
    pub label: String,
    pub outcome: CaseOutcome,
    pub expected: Option<String>,
    /// Fingerprint after the run; differs from `expected` only on mismatch.
    pub fingerprint: Option<String>,
    /// A mismatch was observed and written into the case, whatever the
    /// outcome (a case can mismatch and then time out).
    pub rebaselined: bool,
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Everything produced by one pass over the case list.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: Summary,
    pub cases: Vec<CaseReport>,
    /// Fatal error that stopped the run early.
    pub aborted: Option<HarnessError>,
    pub interrupted: bool,
}

impl RunReport {
    pub fn new(total: usize) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            summary: Summary { passed: 0, total },
            cases: Vec::with_capacity(total),
            aborted: None,
            interrupted: false,
        }
    }

    pub fn record(&mut self, case: CaseReport, verified: bool) {
        if verified {
            self.summary.passed += 1;
        }
        self.cases.push(case);
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none() && !self.interrupted
    }

    /// Cases whose expected fingerprint was overwritten during the run.
    pub fn mismatches(&self) -> usize {
        self.cases.iter().filter(|c| c.rebaselined).count()
    }

    /// Whether the in-memory case list differs from what was loaded.
    pub fn needs_rewrite(&self) -> bool {
        self.mismatches() > 0
    }

    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            started_at: self.started_at,
            finished_at: self.finished_at,
            summary: self.summary,
            cases: self.cases.clone(),
            aborted: self.aborted.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable snapshot of a [`RunReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: Summary,
    pub cases: Vec<CaseReport>,
    pub aborted: Option<String>,
}

/// Write the updated case list followed by the `Passed: n/m` line.
pub fn write_final_report<W: Write>(
    out: &mut W,
    cases: &[TestCase],
    summary: &Summary,
) -> Result<(), HarnessError> {
    let yaml = storage::render_cases(cases)?;
    let io_err = |e: std::io::Error| HarnessError::Persist {
        path: "<stdout>".into(),
        message: e.to_string(),
    };
    out.write_all(yaml.as_bytes()).map_err(io_err)?;
    writeln!(out, "{summary}").map_err(io_err)?;
    Ok(())
}
