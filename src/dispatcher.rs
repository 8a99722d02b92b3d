//! Parent/child coordination.
//!
//! A process started without `-parent_id` is the parent: it partitions the
//! page range, launches one worker per chunk and supervises them. A process
//! started with `-parent_id` is a worker: it reads its assigned range and runs
//! the [`WorkerBody`] once.
//!
//! Faults on either path stop at this boundary. They come back as a failed
//! [`DispatchResult`], never as a panic or an error escaping to `main`. A
//! panicking worker body is caught and reported like any other worker fault.

use crate::args::{required_arg, ArgumentSource, Role};
use crate::assignment::ProcessAssignment;
use crate::config::{ARG_LOG_TO, ARG_PAGE_FINISH, ARG_PAGE_START, ARG_PARENT_ID};
use crate::error::DispatchError;
use crate::handle::ProcessHandle;
use crate::launcher::{Entrypoint, ProcessLauncher};
use crate::logging::{debug, info};
use crate::platform;
use crate::range::{partition_range, WorkRange};
use crate::sink::LogSink;
use crate::supervisor::{ProcessSupervisor, SupervisionReport};
use anyhow::anyhow;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything a worker needs to process its slice.
#[derive(Clone)]
pub struct WorkContext {
    pub range: WorkRange,
    pub parent_id: u32,
    pub log_path: Option<PathBuf>,
    sink: Arc<dyn LogSink>,
}

impl WorkContext {
    pub fn new(range: WorkRange, parent_id: u32, log_path: Option<PathBuf>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            range,
            parent_id,
            log_path,
            sink,
        }
    }

    pub fn log(&self, message: impl AsRef<str>) {
        self.sink.log(message.as_ref());
    }
}

impl std::fmt::Debug for WorkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkContext")
            .field("range", &self.range)
            .field("parent_id", &self.parent_id)
            .field("log_path", &self.log_path)
            .finish()
    }
}

/// The per-range task supplied by the embedding program.
///
/// Pages must be processed in ascending order, and the side effects of one
/// range must not depend on any other worker's progress.
#[async_trait]
pub trait WorkerBody: Send + Sync {
    async fn run(&self, ctx: &WorkContext) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: WorkerBody + ?Sized> WorkerBody for Arc<T> {
    async fn run(&self, ctx: &WorkContext) -> anyhow::Result<()> {
        (**self).run(ctx).await
    }
}

/// Outcome of either role path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Ok,
    Failed(String),
}

impl DispatchResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, DispatchResult::Ok)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DispatchResult::Ok => None,
            DispatchResult::Failed(reason) => Some(reason),
        }
    }
}

/// Parent-side launch parameters.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub entrypoint: Entrypoint,
    pub dry_run: bool,
    pub stall_timeout: Option<Duration>,
}

impl DispatchOptions {
    pub fn new(entrypoint: Entrypoint) -> Self {
        Self {
            entrypoint,
            dry_run: false,
            stall_timeout: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }
}

/// Children started by one dispatch and the assignments behind them.
#[derive(Debug)]
pub struct Dispatch {
    pub assignments: Vec<ProcessAssignment>,
    pub report: Option<SupervisionReport>,
}

pub struct Dispatcher<A, W> {
    args: A,
    worker: W,
    options: DispatchOptions,
    sink: Arc<dyn LogSink>,
}

impl<A: ArgumentSource, W: WorkerBody> Dispatcher<A, W> {
    pub fn new(args: A, worker: W, options: DispatchOptions, sink: Arc<dyn LogSink>) -> Self {
        Self {
            args,
            worker,
            options,
            sink,
        }
    }

    pub fn role(&self) -> Role {
        Role::detect(&self.args)
    }

    pub fn is_child(&self) -> bool {
        self.role() == Role::Child
    }

    /// Run whichever path this process's role selects.
    ///
    /// `range`, `processes` and `log_prefix` only matter on the parent path.
    pub async fn run(&self, range: WorkRange, processes: usize, log_prefix: &str) -> DispatchResult {
        match self.role() {
            Role::Child => match self.run_sub_process().await {
                Ok(()) => DispatchResult::Ok,
                Err(err) => self.failed("Sub-process failed", err),
            },
            Role::Parent => match self.dispatch(range, processes, log_prefix).await {
                Ok(_) => DispatchResult::Ok,
                Err(err) => self.failed("Initialization failed", err),
            },
        }
    }

    /// [`run`](Self::run) collapsed to `true` on a clean run.
    pub async fn init_multiprocess(&self, range: WorkRange, processes: usize, log_prefix: &str) -> bool {
        self.run(range, processes, log_prefix).await.is_ok()
    }

    fn failed(&self, prefix: &str, err: DispatchError) -> DispatchResult {
        let reason = format!("{prefix}: {err}");
        self.sink.log(&reason);
        debug(format!("failure category: {}", err.category()));
        if err.is_pre_launch() {
            debug("no sub-process was started");
        }
        DispatchResult::Failed(reason)
    }

    /// Parent path: partition, launch every chunk, supervise until all close.
    ///
    /// The first launch failure stops further launches; workers already
    /// started are still supervised to completion before the failure is
    /// returned.
    pub async fn dispatch(&self, range: WorkRange, processes: usize, log_prefix: &str) -> Result<Dispatch, DispatchError> {
        let ranges = partition_range(range, processes)?;
        let parent_id = platform::current_pid();

        let assignments: Vec<ProcessAssignment> = ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| ProcessAssignment::new(index, range, log_prefix, parent_id))
            .collect();

        info(format!(
            "Dispatching pages {} to {} sub-process(es)",
            range,
            assignments.len()
        ));

        let launcher = ProcessLauncher::new(self.options.entrypoint.clone(), self.sink.clone())
            .with_dry_run(self.options.dry_run);

        let mut handles: BTreeMap<usize, ProcessHandle> = BTreeMap::new();
        let mut launch_error = None;
        for assignment in &assignments {
            match launcher.launch(assignment) {
                Ok(Some(handle)) => {
                    handles.insert(assignment.index, handle);
                }
                Ok(None) => {}
                Err(err) => {
                    launch_error = Some(err);
                    break;
                }
            }
        }

        if launcher.is_dry_run() {
            return Ok(Dispatch {
                assignments,
                report: None,
            });
        }

        let report = ProcessSupervisor::new(self.sink.clone())
            .with_stall_timeout(self.options.stall_timeout)
            .supervise(handles)
            .await;

        if let Some(err) = launch_error {
            return Err(err);
        }

        if let Some(&index) = report.stalled().first() {
            return Err(DispatchError::SupervisionStall {
                index,
                timeout: self.options.stall_timeout.unwrap_or_default(),
            });
        }

        if !report.is_success() {
            return Err(DispatchError::ChildrenFailed {
                failed: report.failed(),
                total: report.total(),
            });
        }

        Ok(Dispatch {
            assignments,
            report: Some(report),
        })
    }

    /// Child path: read the assigned range and run the worker once.
    ///
    /// A panic in the worker body is caught and reported as a
    /// [`DispatchError::WorkerFailure`].
    pub async fn run_sub_process(&self) -> Result<(), DispatchError> {
        let ctx = self.work_context()?;
        match AssertUnwindSafe(self.worker.run(&ctx)).catch_unwind().await {
            Ok(result) => result.map_err(DispatchError::WorkerFailure),
            Err(payload) => Err(DispatchError::WorkerFailure(anyhow!(
                "worker panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }

    /// Context built from this process's `-page_start`/`-page_finish`/`-log_to`.
    pub fn work_context(&self) -> Result<WorkContext, DispatchError> {
        let start: i64 = required_arg(&self.args, ARG_PAGE_START)?;
        let end: i64 = required_arg(&self.args, ARG_PAGE_FINISH)?;
        let parent_id: u32 = required_arg(&self.args, ARG_PARENT_ID)?;
        let log_path = self
            .args
            .get_arg(ARG_LOG_TO)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(WorkContext::new(
            WorkRange::new(start, end),
            parent_id,
            log_path,
            self.sink.clone(),
        ))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
