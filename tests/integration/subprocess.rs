//! Runs against a real child process: a small shell script standing in for
//! `opp_run` that reacts to the directory it was started in.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use fingerprint_check::config::{MarkerConfig, SimulatorConfig};
use fingerprint_check::engine::matcher::LineClassifier;
use fingerprint_check::engine::runner::Runner;
use fingerprint_check::process::subprocess::ProcessLauncher;
use fingerprint_check::process::InvocationTemplate;
use fingerprint_check::types::{CaseOutcome, HarnessError, TestCase};
use tokio::sync::watch;

const FAKE_SIMULATOR: &str = r#"#!/bin/sh
printf '%s\n' "$@" > argv.txt
case "$(basename "$PWD")" in
  verify) echo "Fingerprint successfully verified" ;;
  mismatch)
    echo "Running simulation..."
    echo "Fingerprint mismatch! calculated: ab12-cd34, expected: 0000-0000"
    ;;
  hang) exec sleep 30 ;;
  fail)
    echo "Fingerprint successfully verified"
    exit 3
    ;;
  *) echo "unrelated output" ;;
esac
"#;

/// Written once, before any test spawns, so no child can inherit a
/// writable handle to it.
fn fake_simulator() -> &'static Path {
    static SCRIPT: OnceLock<PathBuf> = OnceLock::new();
    SCRIPT.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("fpcheck_bin_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fake_opp_run");
        fs::write(&path, FAKE_SIMULATOR).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    })
}

/// Fresh run root containing one directory per workdir.
fn run_root(workdirs: &[&str]) -> PathBuf {
    let root = std::env::temp_dir().join(format!("fpcheck_root_{}", uuid::Uuid::new_v4()));
    for w in workdirs {
        fs::create_dir_all(root.join(w)).unwrap();
    }
    root.canonicalize().unwrap()
}

fn runner(program: &str, root: &Path) -> Runner {
    let simulator = SimulatorConfig {
        program: program.to_string(),
        ..SimulatorConfig::default()
    };
    Runner::new(
        Box::new(ProcessLauncher::new()),
        InvocationTemplate::from(&simulator),
        LineClassifier::new(&MarkerConfig::default()).unwrap(),
        root.to_path_buf(),
    )
}

fn case(workdir: &str) -> TestCase {
    TestCase::new(workdir, "omnetpp.ini", "0000-0000", None)
}

#[tokio::test]
async fn test_real_process_outcomes() {
    let program = fake_simulator().to_str().unwrap().to_string();
    let root = run_root(&["examples/verify", "examples/mismatch", "examples/quiet"]);
    let mut cases = vec![
        case("examples/verify"),
        case("examples/mismatch"),
        case("examples/quiet"),
    ];
    let (_tx, rx) = watch::channel(false);

    let report = runner(&program, &root).run(&mut cases, rx).await;

    assert!(report.is_complete());
    assert_eq!(report.summary.to_string(), "Passed: 1/3");
    let outcomes: Vec<_> = report.cases.iter().map(|c| c.outcome).collect();
    assert_eq!(
        outcomes,
        [CaseOutcome::Verified, CaseOutcome::MismatchRecorded, CaseOutcome::NoSignal]
    );
    assert_eq!(cases[0].fingerprint().as_deref(), Some("0000-0000"));
    assert_eq!(cases[1].fingerprint().as_deref(), Some("ab12-cd34"));
    assert_eq!(cases[2].fingerprint().as_deref(), Some("0000-0000"));

    // Each run started in its own directory with the full argument list.
    let argv = fs::read_to_string(root.join("examples/verify/argv.txt")).unwrap();
    let argv: Vec<_> = argv.lines().collect();
    assert_eq!(
        argv,
        [
            "-l",
            "../../src/libib_flit_sim.so",
            "-n",
            "..:../../src",
            "-u",
            "Cmdenv",
            "--fingerprint=0000-0000",
            "omnetpp.ini",
        ]
    );
    assert!(root.join("examples/mismatch/argv.txt").exists());
    assert!(!root.join("argv.txt").exists());

    fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_failing_exit_status_still_counts_marker() {
    let program = fake_simulator().to_str().unwrap().to_string();
    let root = run_root(&["fail"]);
    let mut cases = vec![case("fail")];
    let (_tx, rx) = watch::channel(false);

    let report = runner(&program, &root).run(&mut cases, rx).await;

    assert_eq!(report.cases[0].outcome, CaseOutcome::Verified);
    assert_eq!(report.summary.to_string(), "Passed: 1/1");

    fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_hung_process_is_timed_out() {
    let program = fake_simulator().to_str().unwrap().to_string();
    let root = run_root(&["hang", "verify"]);
    let mut cases = vec![case("hang"), case("verify")];
    let (_tx, rx) = watch::channel(false);

    let started = Instant::now();
    let report = runner(&program, &root)
        .with_case_timeout(Some(Duration::from_millis(300)))
        .run(&mut cases, rx)
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(report.cases[0].outcome, CaseOutcome::TimedOut);
    assert_eq!(report.cases[1].outcome, CaseOutcome::Verified);
    assert_eq!(report.summary.to_string(), "Passed: 1/2");

    fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_missing_program_aborts_run() {
    fake_simulator();
    let root = run_root(&["verify"]);
    let mut cases = vec![case("verify"), case("verify")];
    let (_tx, rx) = watch::channel(false);

    let report = runner("/nonexistent/fpcheck_opp_run", &root)
        .run(&mut cases, rx)
        .await;

    assert!(matches!(report.aborted, Some(HarnessError::Spawn { .. })));
    assert!(report.cases.is_empty());
    assert_eq!(report.summary.to_string(), "Passed: 0/2");

    fs::remove_dir_all(&root).unwrap();
}
