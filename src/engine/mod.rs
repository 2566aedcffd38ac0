//! Core engine — run each case, match fingerprints, report.

pub mod matcher;
pub mod reporter;
pub mod runner;
