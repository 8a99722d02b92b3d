//! The `pagefork` binary in both roles

#![cfg(unix)]

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn pagefork() -> Command {
    let mut cmd = Command::cargo_bin("pagefork").expect("binary built");
    cmd.env_remove("PAGEFORK_PROCESSES")
        .env_remove("PAGEFORK_DRY_RUN")
        .env_remove("PAGEFORK_LAST_PAGE")
        .env("PAGEFORK_PAUSE_MAX_MS", "0")
        .env("PAGEFORK_LOG", "info")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn parent_runs_workers_and_relays_their_output() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("multiproc").to_string_lossy().into_owned();

    pagefork()
        .args(["--last-page", "4", "-n", "2", "--log-prefix", &prefix])
        .assert()
        .success()
        .stdout(predicate::str::contains("-page_start 1 -page_finish 2"))
        .stdout(predicate::str::contains("-page_start 3 -page_finish 4"))
        .stdout(predicate::str::contains("SampleWorker::run [1, 2] finish"))
        .stdout(predicate::str::contains("SampleWorker::run [3, 4] finish"));

    let first = fs::read_to_string(dir.path().join("multiproc0.log")).unwrap();
    assert!(first.contains("SampleWorker::run [1, 2] start"));
    assert!(first.contains("[2, 11]"));
    assert!(!first.contains("[3, 12]"));

    let second = fs::read_to_string(dir.path().join("multiproc1.log")).unwrap();
    assert!(second.contains("SampleWorker::run [3, 4] start"));
    assert!(second.contains("[4, 19]"));
}

#[test]
fn dry_run_only_prints_commands() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("dry").to_string_lossy().into_owned();

    pagefork()
        .args(["--first-page", "0", "--last-page", "9", "-n", "4", "--dry-run", "--log-prefix", &prefix])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("-page_start 9 -page_finish 9 -log_to {prefix}3.log > {prefix}3.log")))
        .stdout(predicate::str::contains("SampleWorker").not());

    assert!(!dir.path().join("dry0.log").exists());
}

#[test]
fn missing_page_range_is_an_error() {
    pagefork()
        .assert()
        .failure()
        .stderr(predicate::str::contains("No page range"));
}

#[test]
fn zero_processes_fails() {
    pagefork()
        .args(["--last-page", "3", "-n", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("processes"));
}

#[test]
fn cli_process_count_overrides_invalid_environment() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("m").to_string_lossy().into_owned();

    pagefork()
        .env("PAGEFORK_PROCESSES", "0")
        .args(["-n", "2", "--last-page", "4", "--log-prefix", &prefix])
        .assert()
        .success()
        .stdout(predicate::str::contains("SampleWorker::run [1, 2] finish"))
        .stdout(predicate::str::contains("SampleWorker::run [3, 4] finish"));
}

#[test]
fn commands_and_worker_output_survive_a_strict_log_level() {
    let dir = TempDir::new().unwrap();
    let prefix = dir.path().join("quiet").to_string_lossy().into_owned();

    pagefork()
        .env("PAGEFORK_LOG", "warn")
        .args(["--last-page", "2", "-n", "1", "--log-prefix", &prefix])
        .assert()
        .success()
        .stdout(predicate::str::contains("-page_start 1 -page_finish 2"))
        .stdout(predicate::str::contains("0: "))
        .stdout(predicate::str::contains("SampleWorker::run [1, 2] finish"))
        .stdout(predicate::str::contains("Dispatching pages").not());
}

#[test]
fn child_role_runs_the_sample_worker_directly() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("child.log");

    pagefork()
        .args(["-parent_id", "1", "-page_start", "5", "-page_finish", "5"])
        .arg("-log_to")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("[5, 20]"))
        .stdout(predicate::str::contains("[5, 23]"))
        .stdout(predicate::str::contains("[5, 24]").not());

    let content = fs::read_to_string(&log).unwrap();
    assert!(content.contains("SampleWorker::run [5, 5] finish"));
}

#[test]
fn child_with_bad_range_exits_nonzero() {
    pagefork()
        .args(["-parent_id", "1", "-page_start", "five", "-page_finish", "5"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Sub-process failed"));
}
