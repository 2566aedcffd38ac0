//! Fingerprint marker detection.
//!
//! Turns raw simulator output lines into tagged events. The two checks are
//! independent: a line carrying both markers yields both events.

use regex::Regex;

use crate::config::MarkerConfig;
use crate::types::{Fingerprint, HarnessError, RunResult};

/// Classification of one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent<'a> {
    Verified,
    Mismatch(Fingerprint),
    Other(&'a str),
}

impl LineEvent<'_> {
    pub fn is_marker(&self) -> bool {
        !matches!(self, LineEvent::Other(_))
    }
}

/// Recognises the success and mismatch markers.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    verified: String,
    mismatch: Regex,
}

impl LineClassifier {
    pub fn new(markers: &MarkerConfig) -> Result<Self, HarnessError> {
        let pattern = format!(
            "{}([0-9A-Fa-f]{{4}}-[0-9A-Fa-f]{{4}})",
            regex::escape(&markers.mismatch_prefix)
        );
        Ok(Self {
            verified: markers.verified.clone(),
            mismatch: Regex::new(&pattern)?,
        })
    }

    pub fn classify<'a>(&self, line: &'a str) -> Vec<LineEvent<'a>> {
        let mut events = Vec::with_capacity(1);
        if line.contains(&self.verified) {
            events.push(LineEvent::Verified);
        }
        if let Some(fp) = self
            .mismatch
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
        {
            events.push(LineEvent::Mismatch(fp));
        }
        if events.is_empty() {
            events.push(LineEvent::Other(line));
        }
        events
    }
}

/// Folds one case's events into a [`RunResult`].
#[derive(Debug, Default)]
pub struct CaseMatcher {
    result: RunResult,
    lines_seen: usize,
}

impl CaseMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &LineEvent<'_>) {
        match event {
            LineEvent::Verified => self.result.verified = true,
            // Later mismatches overwrite earlier ones.
            LineEvent::Mismatch(fp) => self.result.observed = Some(fp.clone()),
            LineEvent::Other(_) => {}
        }
    }

    pub fn count_line(&mut self) {
        self.lines_seen += 1;
    }

    pub fn lines_seen(&self) -> usize {
        self.lines_seen
    }

    pub fn result(&self) -> &RunResult {
        &self.result
    }

    pub fn into_result(self) -> RunResult {
        self.result
    }
}
