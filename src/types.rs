//! Shared types for the fingerprint runner.
//!
//! Test cases are kept as raw YAML mappings so that key order and any
//! fields the runner does not understand survive the round trip back to
//! disk. Everything else here is small value types passed between the
//! loader, the process layer and the engine.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// A simulation fingerprint in `HHHH-HHHH` hex form.
///
/// Letter case is kept exactly as observed so a re-baselined value is
/// written back the way the simulator printed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_well_formed(s: &str) -> bool {
        let bytes = s.as_bytes();
        bytes.len() == 9
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_hexdigit)
            && bytes[5..].iter().all(u8::is_ascii_hexdigit)
    }
}

impl FromStr for Fingerprint {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_well_formed(s) {
            Ok(Fingerprint(s.to_string()))
        } else {
            Err(HarnessError::InvalidFingerprint(s.to_string()))
        }
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Test case
// ---------------------------------------------------------------------------

pub const KEY_WORKDIR: &str = "workdir";
pub const KEY_INIFILE: &str = "inifile";
pub const KEY_FINGERPRINT: &str = "fingerprint";
pub const KEY_CONFIG: &str = "config";

/// One declarative simulation run and its expected fingerprint.
///
/// Backed by the mapping read from the cases file. Only `fingerprint` is
/// ever written, and only in place, so unknown keys keep their position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestCase {
    fields: Mapping,
}

impl TestCase {
    pub fn from_mapping(fields: Mapping) -> Self {
        Self { fields }
    }

    /// Convenience constructor for the four known keys.
    pub fn new(workdir: &str, inifile: &str, fingerprint: &str, config: Option<&str>) -> Self {
        let mut fields = Mapping::new();
        fields.insert(KEY_WORKDIR.into(), workdir.into());
        fields.insert(KEY_INIFILE.into(), inifile.into());
        fields.insert(KEY_FINGERPRINT.into(), fingerprint.into());
        if let Some(config) = config {
            fields.insert(KEY_CONFIG.into(), config.into());
        }
        Self { fields }
    }

    pub fn mapping(&self) -> &Mapping {
        &self.fields
    }

    /// Scalar value of `key` rendered as text, if present.
    pub fn field(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn workdir(&self) -> Option<String> {
        self.field(KEY_WORKDIR)
    }

    pub fn inifile(&self) -> Option<String> {
        self.field(KEY_INIFILE)
    }

    pub fn fingerprint(&self) -> Option<String> {
        self.field(KEY_FINGERPRINT)
    }

    pub fn config(&self) -> Option<String> {
        self.field(KEY_CONFIG)
    }

    /// Overwrite the expected fingerprint, keeping the key's position.
    pub fn set_fingerprint(&mut self, fingerprint: &Fingerprint) {
        let value = Value::String(fingerprint.to_string());
        match self.fields.get_mut(KEY_FINGERPRINT) {
            Some(slot) => *slot = value,
            None => {
                self.fields.insert(KEY_FINGERPRINT.into(), value);
            }
        }
    }

    /// `workdir/inifile` label used in the run log.
    pub fn label(&self) -> String {
        format!(
            "{}/{}",
            self.workdir().unwrap_or_default(),
            self.inifile().unwrap_or_default()
        )
    }
}

// ---------------------------------------------------------------------------
// Per-case results
// ---------------------------------------------------------------------------

/// What the matcher saw in one case's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// The success marker appeared at least once.
    pub verified: bool,
    /// Last fingerprint reported by a mismatch line.
    pub observed: Option<Fingerprint>,
}

/// Terminal state of a single case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseOutcome {
    Verified,
    MismatchRecorded,
    /// Output ended without either marker.
    NoSignal,
    /// The per-case deadline expired before the output stream closed.
    TimedOut,
    /// The run was interrupted while this case was in flight.
    Cancelled,
}

impl CaseOutcome {
    /// Outcome for a stream that was drained to EOF.
    pub fn from_result(result: &RunResult) -> Self {
        if result.observed.is_some() {
            CaseOutcome::MismatchRecorded
        } else if result.verified {
            CaseOutcome::Verified
        } else {
            CaseOutcome::NoSignal
        }
    }
}

impl fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseOutcome::Verified => write!(f, "VERIFIED"),
            CaseOutcome::MismatchRecorded => write!(f, "MISMATCH"),
            CaseOutcome::NoSignal => write!(f, "NO SIGNAL"),
            CaseOutcome::TimedOut => write!(f, "TIMED OUT"),
            CaseOutcome::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Pass count over the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: usize,
    pub total: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passed: {}/{}", self.passed, self.total)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Failed to read test cases from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse test cases from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Test case #{index} has no `{field}` field")]
    InvalidCase { index: usize, field: &'static str },

    #[error("Invalid fingerprint: {0:?}")]
    InvalidFingerprint(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read output of {label}: {source}")]
    Output {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid marker pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to render test cases: {0}")]
    Render(#[source] serde_yaml::Error),

    #[error("Failed to write {path}: {message}")]
    Persist { path: PathBuf, message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
