//! fingerprint-check — regression runner for simulation fingerprints.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod process;
pub mod engine;
pub mod storage;
