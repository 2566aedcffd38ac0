//! Scripted launcher for integration testing.
//!
//! Provides a deterministic `Launcher` that replays canned output per
//! working directory and records every invocation it was asked to start,
//! all in-memory with no external processes.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fingerprint_check::config::{MarkerConfig, SimulatorConfig};
use fingerprint_check::engine::matcher::LineClassifier;
use fingerprint_check::engine::runner::Runner;
use fingerprint_check::process::{Invocation, InvocationTemplate, Launcher, OutputLines};
use fingerprint_check::types::HarnessError;

pub const ROOT: &str = "/sim/root";

/// Replays scripted stdout keyed by the case's working directory.
#[derive(Clone, Default)]
pub struct ScriptedLauncher {
    scripts: HashMap<PathBuf, Vec<String>>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    /// Working directory whose launch fails as if the program were missing.
    fail_on: Option<PathBuf>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the output of the case whose `workdir` is `workdir`.
    pub fn with_output(mut self, workdir: &str, lines: &[&str]) -> Self {
        self.scripts.insert(
            Path::new(ROOT).join(workdir),
            lines.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    pub fn failing_on(mut self, workdir: &str) -> Self {
        self.fail_on = Some(Path::new(ROOT).join(workdir));
        self
    }

    /// Shared handle to the invocations seen so far.
    pub fn invocations(&self) -> Arc<Mutex<Vec<Invocation>>> {
        Arc::clone(&self.invocations)
    }

    pub fn into_runner(self) -> Runner {
        Runner::new(
            Box::new(self),
            InvocationTemplate::from(&SimulatorConfig::default()),
            LineClassifier::new(&MarkerConfig::default()).unwrap(),
            PathBuf::from(ROOT),
        )
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    async fn launch(&self, invocation: &Invocation) -> Result<Box<dyn OutputLines>, HarnessError> {
        self.invocations.lock().unwrap().push(invocation.clone());

        if self.fail_on.as_deref() == Some(invocation.working_dir.as_path()) {
            return Err(HarnessError::Spawn {
                program: invocation.program().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let lines = self
            .scripts
            .get(&invocation.working_dir)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(ScriptedOutput(lines.into())))
    }
}

struct ScriptedOutput(VecDeque<String>);

#[async_trait]
impl OutputLines for ScriptedOutput {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        Ok(self.0.pop_front())
    }
}
