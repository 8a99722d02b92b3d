//! Parent-side dispatch against real `sh` workers
//!
//! Workers are `sh -c <script> worker -parent_id P -page_start N -page_finish M -log_to L`,
//! so inside the script `$2` is the parent id, `$4`/`$6` the page bounds and
//! `$8` the log path.

#![cfg(unix)]

use async_trait::async_trait;
use pagefork::{
    DispatchError, DispatchOptions, DispatchResult, Dispatcher, Entrypoint, MemorySink, WorkContext,
    WorkRange, WorkerBody,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct NeverCalled;

#[async_trait]
impl WorkerBody for NeverCalled {
    async fn run(&self, _ctx: &WorkContext) -> anyhow::Result<()> {
        panic!("the parent must not run the worker body");
    }
}

fn sh(script: &str) -> Entrypoint {
    Entrypoint::new("sh").args(["-c", script, "worker"])
}

fn parent(entrypoint: Entrypoint, sink: &MemorySink) -> Dispatcher<HashMap<String, String>, NeverCalled> {
    Dispatcher::new(
        HashMap::new(),
        NeverCalled,
        DispatchOptions::new(entrypoint),
        Arc::new(sink.clone()),
    )
}

fn prefix(dir: &TempDir) -> String {
    dir.path().join("logs").join("multiproc").to_string_lossy().into_owned()
}

#[tokio::test]
async fn two_workers_over_four_pages() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();
    let dispatcher = parent(
        sh(r#"echo "start $4 $6"; echo "parent $2"; echo "log $8"; echo "done $4""#),
        &sink,
    );

    let dispatch = dispatcher
        .dispatch(WorkRange::new(1, 4), 2, &prefix(&dir))
        .await
        .unwrap();

    let ranges: Vec<_> = dispatch.assignments.iter().map(|a| a.range).collect();
    assert_eq!(ranges, vec![WorkRange::new(1, 2), WorkRange::new(3, 4)]);

    let log_paths: Vec<PathBuf> = dispatch.assignments.iter().map(|a| a.log_path.clone()).collect();
    assert_eq!(
        log_paths,
        vec![
            dir.path().join("logs").join("multiproc0.log"),
            dir.path().join("logs").join("multiproc1.log"),
        ]
    );

    let pid = std::process::id();
    for (index, (start, end)) in [(1, 2), (3, 4)].into_iter().enumerate() {
        assert_eq!(
            sink.lines_for(index),
            vec![
                format!("start {start} {end}"),
                format!("parent {pid}"),
                format!("log {}", log_paths[index].display()),
                format!("done {start}"),
            ]
        );
        // The worker's stderr target exists once it has been launched
        assert!(log_paths[index].exists());
    }

    let report = dispatch.report.unwrap();
    assert_eq!(report.total(), 2);
    assert!(report.is_success());
    assert!(report.outcomes.iter().all(|o| o.exit_code == Some(0) && o.lines == 4));
}

#[tokio::test]
async fn commands_are_logged_before_output() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();
    let dispatcher = parent(sh("echo hi"), &sink);

    dispatcher
        .dispatch(WorkRange::new(0, 9), 4, &prefix(&dir))
        .await
        .unwrap();

    let messages = sink.messages();
    let commands: Vec<_> = messages.iter().filter(|m| m.starts_with("sh -c")).collect();
    assert_eq!(commands.len(), 4);
    assert!(commands[2].contains("-page_start 6 -page_finish 8 -log_to "));
    assert!(commands[2].ends_with(&format!("> {}2.log", prefix(&dir))));

    // All launches happen before supervision starts relaying
    let first_output = messages.iter().position(|m| m.ends_with(": hi")).unwrap();
    let last_command = messages.iter().rposition(|m| m.starts_with("sh -c")).unwrap();
    assert!(last_command < first_output);
    assert_eq!(messages.len(), 8);
}

#[tokio::test]
async fn long_output_is_relayed_in_order() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();
    let dispatcher = parent(sh(r#"i=$4; while [ "$i" -le "$6" ]; do echo "page $i"; i=$((i+1)); done"#), &sink);

    dispatcher
        .dispatch(WorkRange::new(1, 300), 3, &prefix(&dir))
        .await
        .unwrap();

    for (index, first) in [(0usize, 1), (1, 101), (2, 201)] {
        let expected: Vec<String> = (first..first + 100).map(|p| format!("page {p}")).collect();
        assert_eq!(sink.lines_for(index), expected);
    }
}

#[tokio::test]
async fn failed_worker_fails_the_dispatch() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();
    let dispatcher = parent(sh(r#"echo "pages $4"; [ "$4" -ne 3 ] || exit 2"#), &sink);

    let result = dispatcher.run(WorkRange::new(1, 4), 2, &prefix(&dir)).await;

    assert_eq!(
        result,
        DispatchResult::Failed("Initialization failed: 1 of 2 sub-processes exited unsuccessfully".to_string())
    );
    // Output of the failing worker is still relayed
    assert_eq!(sink.lines_for(1), vec!["pages 3"]);
    assert_eq!(sink.lines_for(0), vec!["pages 1"]);
}

#[tokio::test]
async fn launch_failure_aborts_remaining_launches() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();
    // The log directory is a regular file, so opening any log file fails
    let blocker = dir.path().join("logs");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let dispatcher = parent(sh("echo never"), &sink);

    let err = dispatcher
        .dispatch(WorkRange::new(1, 4), 2, &prefix(&dir))
        .await
        .unwrap_err();

    match err {
        DispatchError::LaunchFailure { assignment, .. } => assert_eq!(assignment.index, 0),
        other => panic!("unexpected error: {other}"),
    }
    // Only the first command was attempted
    assert_eq!(sink.messages().len(), 1);
}

#[tokio::test]
async fn stalled_worker_is_reported() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();
    let dispatcher = Dispatcher::new(
        HashMap::new(),
        NeverCalled,
        DispatchOptions::new(sh(r#"echo "up $4"; [ "$4" -ne 2 ] || exec sleep 30"#))
            .stall_timeout(Some(Duration::from_millis(500))),
        Arc::new(sink.clone()),
    );

    let err = dispatcher
        .dispatch(WorkRange::new(1, 2), 2, &prefix(&dir))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::SupervisionStall { index: 1, .. }));
    assert_eq!(sink.lines_for(0), vec!["up 1"]);
    assert_eq!(sink.lines_for(1), vec!["up 2"]);
}

#[tokio::test]
async fn dry_run_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let sink = MemorySink::new();
    let dispatcher = Dispatcher::new(
        HashMap::new(),
        NeverCalled,
        DispatchOptions::new(sh("echo never")).dry_run(true),
        Arc::new(sink.clone()),
    );

    assert!(dispatcher.init_multiprocess(WorkRange::new(1, 4), 2, &prefix(&dir)).await);

    assert_eq!(sink.messages().len(), 2);
    assert!(!dir.path().join("logs").exists());
}
