//! fingerprint-check — entry point.
//!
//! Loads configuration, initialises logging, runs every test case in the
//! cases file against the simulator, then prints the updated case list and
//! the `Passed: n/m` line. Exits non-zero only when the harness itself
//! fails or is interrupted; fingerprint mismatches are reported, not fatal.

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use fingerprint_check::config::{self, AppConfig};
use fingerprint_check::engine::matcher::LineClassifier;
use fingerprint_check::engine::reporter::{self, RunReport};
use fingerprint_check::engine::runner::Runner;
use fingerprint_check::process::subprocess::ProcessLauncher;
use fingerprint_check::process::InvocationTemplate;
use fingerprint_check::storage;
use fingerprint_check::types::TestCase;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("FPCHECK_CONFIG").ok();
    let cfg = AppConfig::load_or_default(config_path.as_deref())?;

    init_logging();

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let paths = cfg.harness.resolve(&cwd)?;
    info!(
        cases = %paths.cases_file.display(),
        root = %paths.run_root.display(),
        program = %cfg.simulator.program,
        config = config_path.as_deref().unwrap_or(config::DEFAULT_CONFIG_FILE),
        "fingerprint-check starting"
    );

    let mut cases = storage::load_cases(&paths.cases_file)?;

    let runner = Runner::new(
        Box::new(ProcessLauncher::new()),
        InvocationTemplate::from(&cfg.simulator),
        LineClassifier::new(&cfg.markers)?,
        paths.run_root.clone(),
    )
    .with_case_timeout(cfg.harness.case_timeout());

    // Ctrl+C cancels the case in flight; the partial report is still printed.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling current case");
            let _ = cancel_tx.send(true);
        }
    });

    let report = runner.run(&mut cases, cancel_rx).await;

    emit(&cases, &report)?;
    storage::persist_run(&cfg.harness, &paths.cases_file, &cases, &report);

    if let Some(e) = report.aborted {
        return Err(e).context("Fingerprint run aborted");
    }
    if report.interrupted {
        bail!("Fingerprint run interrupted");
    }
    Ok(())
}

/// Print the updated case list and the summary line to stdout.
fn emit(cases: &[TestCase], report: &RunReport) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    reporter::write_final_report(&mut out, cases, &report.summary)?;
    Ok(())
}

/// Initialise the `tracing` subscriber. Logs go to stderr so stdout stays
/// a clean report.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fingerprint_check=info"));

    let json_logging = std::env::var("FPCHECK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
