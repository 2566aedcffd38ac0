//! Simulator invocation.
//!
//! Defines the `Launcher` and `OutputLines` traits and the argument vector
//! each test case is turned into. The real implementation spawns
//! `opp_run` with `tokio::process`; tests substitute scripted output.

pub mod subprocess;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::SimulatorConfig;
use crate::types::{HarnessError, TestCase, KEY_FINGERPRINT, KEY_INIFILE, KEY_WORKDIR};

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// A fully resolved simulator run: argv plus the absolute directory to
/// start it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub working_dir: PathBuf,
}

impl Invocation {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// The fixed part of every command line.
#[derive(Debug, Clone)]
pub struct InvocationTemplate {
    pub program: String,
    pub library: String,
    pub ned_path: String,
    pub user_interface: String,
}

impl From<&SimulatorConfig> for InvocationTemplate {
    fn from(cfg: &SimulatorConfig) -> Self {
        Self {
            program: cfg.program.clone(),
            library: cfg.library.clone(),
            ned_path: cfg.ned_path.clone(),
            user_interface: cfg.user_interface.clone(),
        }
    }
}

impl InvocationTemplate {
    /// Build the invocation for the case at `index`.
    ///
    /// Argument order is fixed: program, `-l` library, `-n` NED path,
    /// `-u` UI, optional `-c` config, `--fingerprint=<expected>`, inifile.
    pub fn invocation_for(
        &self,
        index: usize,
        case: &TestCase,
        run_root: &Path,
    ) -> Result<Invocation, HarnessError> {
        let missing = |field| HarnessError::InvalidCase { index, field };
        let workdir = case.workdir().ok_or_else(|| missing(KEY_WORKDIR))?;
        let inifile = case.inifile().ok_or_else(|| missing(KEY_INIFILE))?;
        let fingerprint = case.fingerprint().ok_or_else(|| missing(KEY_FINGERPRINT))?;

        let mut argv = vec![
            self.program.clone(),
            "-l".to_string(),
            self.library.clone(),
            "-n".to_string(),
            self.ned_path.clone(),
            "-u".to_string(),
            self.user_interface.clone(),
        ];
        if let Some(config) = case.config() {
            argv.push("-c".to_string());
            argv.push(config);
        }
        argv.push(format!("--fingerprint={fingerprint}"));
        argv.push(inifile);

        // `workdir` always names a directory under the run root, even when
        // written with a leading slash.
        Ok(Invocation {
            argv,
            working_dir: run_root.join(workdir.trim_start_matches('/')),
        })
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Line-by-line view of a running simulation's standard output.
#[async_trait]
pub trait OutputLines: Send {
    /// Next line without its terminator, or `None` once the stream closed.
    async fn next_line(&mut self) -> std::io::Result<Option<String>>;
}

/// Abstraction over starting a simulation run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start the run and hand back its output stream.
    async fn launch(&self, invocation: &Invocation) -> Result<Box<dyn OutputLines>, HarnessError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
