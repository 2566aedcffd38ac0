//! Sequential case runner.
//!
//! For each case: build the invocation, launch it, drain its output through
//! the matcher, and re-baseline the expected fingerprint on mismatch. The
//! next case starts only after the previous one's output is closed.

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::matcher::{CaseMatcher, LineClassifier};
use super::reporter::{CaseReport, RunReport};
use crate::process::{InvocationTemplate, Launcher, OutputLines};
use crate::types::{CaseOutcome, HarnessError, TestCase};

/// How draining one case's output ended.
#[derive(Debug)]
enum Drain {
    Completed,
    TimedOut,
    Cancelled,
    Failed(std::io::Error),
}

pub struct Runner {
    launcher: Box<dyn Launcher>,
    template: InvocationTemplate,
    classifier: LineClassifier,
    run_root: PathBuf,
    case_timeout: Option<Duration>,
}

impl Runner {
    pub fn new(
        launcher: Box<dyn Launcher>,
        template: InvocationTemplate,
        classifier: LineClassifier,
        run_root: PathBuf,
    ) -> Self {
        Self {
            launcher,
            template,
            classifier,
            run_root,
            case_timeout: None,
        }
    }

    /// Bound the time spent draining any single case's output.
    pub fn with_case_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.case_timeout = timeout;
        self
    }

    /// Run every case in order, updating fingerprints in place.
    ///
    /// A fatal error stops the run; it is returned inside the report so the
    /// cases processed so far can still be flushed. Setting `cancel` to
    /// `true` interrupts the case in flight and stops the run.
    pub async fn run(&self, cases: &mut [TestCase], mut cancel: watch::Receiver<bool>) -> RunReport {
        let mut report = RunReport::new(cases.len());
        info!(
            count = cases.len(),
            root = %self.run_root.display(),
            "Starting fingerprint run"
        );

        for (index, case) in cases.iter_mut().enumerate() {
            if *cancel.borrow() {
                report.interrupted = true;
                break;
            }

            match self.run_case(index, case, &mut cancel).await {
                Ok((case_report, verified)) => {
                    let outcome = case_report.outcome;
                    report.record(case_report, verified);
                    if outcome == CaseOutcome::Cancelled {
                        report.interrupted = true;
                        break;
                    }
                }
                Err(e) => {
                    error!(case = index, error = %e, "Aborting run");
                    report.aborted = Some(e);
                    break;
                }
            }
        }

        report.finish();
        info!(
            summary = %report.summary,
            mismatches = report.mismatches(),
            complete = report.is_complete(),
            "Fingerprint run finished"
        );
        report
    }

    async fn run_case(
        &self,
        index: usize,
        case: &mut TestCase,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(CaseReport, bool), HarnessError> {
        let invocation = self.template.invocation_for(index, case, &self.run_root)?;
        let label = case.label();
        let expected = case.fingerprint();

        println!("Running {label}");
        debug!(case = index, argv = ?invocation.argv, "Launching");

        let mut output = self.launcher.launch(&invocation).await?;
        let mut matcher = CaseMatcher::new();

        let drain = tokio::select! {
            drain = self.drain_with_deadline(&mut *output, &mut matcher) => drain,
            _ = cancelled(cancel) => Drain::Cancelled,
        };
        // Dropping the handle kills a child that is still running.
        drop(output);

        // A failed read aborts the run; the case keeps its loaded fingerprint.
        let interrupted = match drain {
            Drain::Failed(source) => return Err(HarnessError::Output { label, source }),
            Drain::Completed => None,
            Drain::TimedOut => {
                warn!(case = index, label = %label, lines = matcher.lines_seen(), "Case timed out");
                Some(CaseOutcome::TimedOut)
            }
            Drain::Cancelled => {
                warn!(case = index, label = %label, "Case cancelled");
                Some(CaseOutcome::Cancelled)
            }
        };

        let result = matcher.result().clone();
        if let Some(observed) = &result.observed {
            case.set_fingerprint(observed);
        }
        let outcome = interrupted.unwrap_or_else(|| CaseOutcome::from_result(&result));

        match outcome {
            CaseOutcome::NoSignal => warn!(
                case = index,
                label = %label,
                lines = matcher.lines_seen(),
                "No fingerprint marker in output"
            ),
            _ => info!(case = index, label = %label, outcome = %outcome, "Case finished"),
        }

        let case_report = CaseReport {
            index,
            label,
            outcome,
            expected,
            fingerprint: case.fingerprint(),
            rebaselined: result.observed.is_some(),
        };
        Ok((case_report, result.verified))
    }

    async fn drain_with_deadline(
        &self,
        output: &mut dyn OutputLines,
        matcher: &mut CaseMatcher,
    ) -> Drain {
        match self.case_timeout {
            Some(limit) => tokio::time::timeout(limit, self.drain(output, matcher))
                .await
                .unwrap_or(Drain::TimedOut),
            None => self.drain(output, matcher).await,
        }
    }

    async fn drain(&self, output: &mut dyn OutputLines, matcher: &mut CaseMatcher) -> Drain {
        loop {
            let line = match output.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Drain::Completed,
                Err(e) => return Drain::Failed(e),
            };
            matcher.count_line();

            let events = self.classifier.classify(&line);
            if events.iter().any(|e| e.is_marker()) {
                println!("{line}");
            }
            for event in &events {
                matcher.record(event);
            }
        }
    }
}

/// Resolves once `cancel` reads `true`; never resolves if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
