//! `tokio::process` launcher.
//!
//! Each run is started directly in its absolute working directory; the
//! harness never changes its own current directory. Children are killed
//! when their output handle is dropped, which is how a timed-out or
//! cancelled case gets cleaned up.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use super::{Invocation, Launcher, OutputLines};
use crate::types::HarnessError;

/// Spawns the simulator as a child process.
#[derive(Debug, Default, Clone)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, invocation: &Invocation) -> Result<Box<dyn OutputLines>, HarnessError> {
        let program = invocation.program().to_string();
        let spawn_err = |source| HarnessError::Spawn {
            program: program.clone(),
            source,
        };

        let mut child = Command::new(&program)
            .args(invocation.args())
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        let stdout = child.stdout.take().ok_or_else(|| {
            spawn_err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "child stdout was not captured",
            ))
        })?;

        debug!(
            program = %program,
            pid = ?child.id(),
            workdir = %invocation.working_dir.display(),
            "Simulation started"
        );

        Ok(Box::new(ProcessOutput {
            program,
            child,
            reader: BufReader::new(stdout),
            buf: Vec::new(),
        }))
    }
}

/// Output of a running child. Reaps the child once stdout reaches EOF.
struct ProcessOutput {
    program: String,
    child: Child,
    reader: BufReader<ChildStdout>,
    buf: Vec<u8>,
}

#[async_trait]
impl OutputLines for ProcessOutput {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            let status = self.child.wait().await?;
            if status.success() {
                debug!(program = %self.program, "Simulation exited");
            } else {
                warn!(program = %self.program, status = %status, "Simulation exited with failure");
            }
            return Ok(None);
        }
        Ok(Some(decode_line(&self.buf)))
    }
}

/// Lossy UTF-8 decode with the line terminator removed.
fn decode_line(raw: &[u8]) -> String {
    let trimmed = raw
        .strip_suffix(b"\n")
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
        .unwrap_or(raw);
    String::from_utf8_lossy(trimmed).into_owned()
}
