//! Supervision of launched workers.
//!
//! The supervisor walks the live handles round-robin, reading one line from
//! each per pass and relaying it as `"<index>: <line>"`. A handle that reports
//! end-of-stream is closed (its child reaped) and dropped from the set. The
//! loop ends once the set is empty.
//!
//! Lines from one child keep their order; lines from different children are
//! only approximately interleaved.

use crate::config::TERMINATE_GRACE;
use crate::handle::ProcessHandle;
use crate::logging::{debug, warn};
use crate::sink::LogSink;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How one child ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildOutcome {
    pub index: usize,
    pub pid: Option<u32>,
    /// Lines relayed to the sink
    pub lines: usize,
    /// `None` when there was no process behind the handle or it died by signal
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stalled: bool,
    pub finished_at: DateTime<Utc>,
}

/// Result of one supervision run, outcomes ordered by index.
#[derive(Debug, Clone)]
pub struct SupervisionReport {
    pub outcomes: Vec<ChildOutcome>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl SupervisionReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    pub fn stalled(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| o.stalled)
            .map(|o| o.index)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

enum LineRead {
    Line(String),
    End,
    Failed(io::Error),
    Stalled,
}

/// Drains every handle into the log sink until all of them are closed.
pub struct ProcessSupervisor {
    sink: Arc<dyn LogSink>,
    stall_timeout: Option<Duration>,
}

impl ProcessSupervisor {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            stall_timeout: None,
        }
    }

    /// Give up on a child that produces no line for `timeout`.
    ///
    /// Without a timeout a child that never closes its stream stalls
    /// supervision forever.
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub async fn supervise(&self, mut handles: BTreeMap<usize, ProcessHandle>) -> SupervisionReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut line_counts: HashMap<usize, usize> = HashMap::new();
        let mut outcomes = Vec::with_capacity(handles.len());

        while !handles.is_empty() {
            let indexes: Vec<usize> = handles.keys().copied().collect();

            for index in indexes {
                let Some(handle) = handles.get_mut(&index) else {
                    continue;
                };

                let pid = handle.pid();
                let (stalled, stop) = match self.read_line(handle).await {
                    LineRead::Line(line) => {
                        self.sink.log(&format!("{index}: {line}"));
                        *line_counts.entry(index).or_default() += 1;
                        continue;
                    }
                    LineRead::End => (false, false),
                    // The stream is unusable, so the child could block on a full pipe forever
                    LineRead::Failed(err) => {
                        warn(format!("Reading output of sub-process #{index} failed: {err}, terminating"));
                        (false, true)
                    }
                    LineRead::Stalled => {
                        let timeout = self.stall_timeout.unwrap_or_default();
                        warn(format!(
                            "Sub-process #{index} produced no output for {:.1}s, terminating",
                            timeout.as_secs_f64()
                        ));
                        (true, true)
                    }
                };

                let Some(mut handle) = handles.remove(&index) else {
                    continue;
                };

                if stop {
                    if let Err(err) = handle.terminate(TERMINATE_GRACE).await {
                        warn(format!("Failed to terminate sub-process #{index}: {err}"));
                    }
                }

                let lines = line_counts.get(&index).copied().unwrap_or(0);
                outcomes.push(release(handle, pid, lines, stalled).await);
            }
        }

        outcomes.sort_by_key(|o| o.index);
        SupervisionReport {
            outcomes,
            started_at,
            duration: start.elapsed(),
        }
    }

    async fn read_line(&self, handle: &mut ProcessHandle) -> LineRead {
        let result = match self.stall_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, handle.next_line()).await {
                Ok(result) => result,
                Err(_) => return LineRead::Stalled,
            },
            None => handle.next_line().await,
        };

        match result {
            Ok(Some(line)) => LineRead::Line(line),
            Ok(None) => LineRead::End,
            Err(err) => LineRead::Failed(err),
        }
    }
}

async fn release(handle: ProcessHandle, pid: Option<u32>, lines: usize, stalled: bool) -> ChildOutcome {
    let index = handle.index();
    let (exit_code, success) = match handle.close().await {
        Ok(Some(status)) => (status.code(), status.success()),
        Ok(None) => (None, true),
        Err(err) => {
            warn(format!("Failed to reap sub-process #{index}: {err}"));
            (None, false)
        }
    };

    debug(format!(
        "Sub-process #{index} closed: lines={lines} exit={}",
        describe_exit(exit_code, stalled)
    ));

    ChildOutcome {
        index,
        pid,
        lines,
        exit_code,
        success: success && !stalled,
        stalled,
        finished_at: Utc::now(),
    }
}

fn describe_exit(exit_code: Option<i32>, stalled: bool) -> String {
    match (stalled, exit_code) {
        (true, _) => "terminated_after_stall".to_string(),
        (false, Some(code)) => code.to_string(),
        (false, None) => "none".to_string(),
    }
}
