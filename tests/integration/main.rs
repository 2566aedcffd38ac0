//! Integration tests for the fingerprint runner.

mod scripted_launcher;
#[cfg(unix)]
mod subprocess;
