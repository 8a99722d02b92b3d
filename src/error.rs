//! Error handling for pagefork
//!
//! Every fault raised on either role path is a [`DispatchError`]. The
//! dispatcher converts it into a logged message plus a failed
//! [`DispatchResult`](crate::dispatcher::DispatchResult) at the role boundary.

use crate::assignment::ProcessAssignment;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for dispatch and sub-process execution
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Non-positive process count handed to the partitioner
    #[error("Invalid configuration: process count must be at least 1 (got {processes})")]
    InvalidConfiguration { processes: usize },

    /// The OS refused to start a child process
    #[error("Failed to launch sub-process #{} for pages [{}, {}]: {source}", assignment.index, assignment.range.start, assignment.range.end)]
    LaunchFailure {
        assignment: Box<ProcessAssignment>,
        #[source]
        source: io::Error,
    },

    /// The worker body failed while processing its assigned range
    #[error("{0}")]
    WorkerFailure(#[source] anyhow::Error),

    /// A child produced no line within the configured stall timeout
    #[error("Sub-process #{index} stalled: no output for {}s", timeout.as_secs_f64())]
    SupervisionStall { index: usize, timeout: Duration },

    /// One or more children exited unsuccessfully
    #[error("{failed} of {total} sub-processes exited unsuccessfully")]
    ChildrenFailed { failed: usize, total: usize },

    #[error("Missing required argument: -{name}")]
    MissingArgument { name: &'static str },

    #[error("Invalid value for -{name}: {value:?}")]
    InvalidArgument { name: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Config file error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid setting {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Coarse classification used when reporting failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Launch,
    Worker,
    Supervision,
    Argument,
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Launch => "launch",
            ErrorCategory::Worker => "worker",
            ErrorCategory::Supervision => "supervision",
            ErrorCategory::Argument => "argument",
            ErrorCategory::Io => "io",
        }
    }
}

impl DispatchError {
    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            DispatchError::InvalidConfiguration { .. } => ErrorCategory::Config,
            DispatchError::LaunchFailure { .. } => ErrorCategory::Launch,
            DispatchError::WorkerFailure(_) => ErrorCategory::Worker,
            DispatchError::SupervisionStall { .. } | DispatchError::ChildrenFailed { .. } => {
                ErrorCategory::Supervision
            }
            DispatchError::MissingArgument { .. } | DispatchError::InvalidArgument { .. } => {
                ErrorCategory::Argument
            }
            DispatchError::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether the failure happened before any child process was started
    pub fn is_pre_launch(&self) -> bool {
        matches!(
            self,
            DispatchError::InvalidConfiguration { .. }
                | DispatchError::MissingArgument { .. }
                | DispatchError::InvalidArgument { .. }
        )
    }
}
