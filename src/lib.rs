//! pagefork
//!
//! Split a numbered page range across N worker subprocesses, launch them,
//! and relay their output until every worker has finished.
//!
//! The same executable plays both roles. Started normally it is the parent;
//! started with `-parent_id <pid> -page_start <n> -page_finish <m> -log_to <path>`
//! it is a worker for pages `[n, m]`.

pub mod args;
pub mod assignment;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod launcher;
pub mod logging;
pub mod platform;
pub mod range;
pub mod sample;
pub mod settings;
pub mod sink;
pub mod supervisor;

// Re-export commonly used types for convenience
pub use args::{is_child, ArgumentSource, Role, ShellArgs};
pub use assignment::ProcessAssignment;
pub use dispatcher::{Dispatch, DispatchOptions, DispatchResult, Dispatcher, WorkContext, WorkerBody};
pub use error::{DispatchError, SettingsError};
pub use handle::ProcessHandle;
pub use launcher::{CommandLine, Entrypoint, ProcessLauncher};
pub use range::{partition, WorkRange};
pub use settings::DispatchSettings;
pub use sink::{LogSink, MemorySink, TracingSink};
pub use supervisor::{ChildOutcome, ProcessSupervisor, SupervisionReport};
