//! Building and starting worker processes.
//!
//! Each worker is the current program re-invoked with its assignment encoded
//! as `-name value` flags:
//!
//! ```text
//! <entrypoint> -parent_id <pid> -page_start <n> -page_finish <m> -log_to <path> > <path>
//! ```
//!
//! The rendered line is what gets logged for auditing. The process itself is
//! started without a shell: stdout is piped back to the supervisor, stderr
//! is appended to the log file, and the worker writes its own log there via
//! `-log_to`.

use crate::assignment::ProcessAssignment;
use crate::error::DispatchError;
use crate::handle::ProcessHandle;
use crate::logging::debug;
use crate::platform;
use crate::sink::LogSink;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

/// Program (plus fixed leading arguments) that runs one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoint {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Entrypoint {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// The currently running executable.
    pub fn current() -> io::Result<Self> {
        std::env::current_exe().map(Self::new)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Fully constructed worker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub redirect: PathBuf,
}

impl CommandLine {
    pub fn new(entrypoint: &Entrypoint, assignment: &ProcessAssignment) -> Self {
        let mut args = entrypoint.args.clone();
        for (name, value) in assignment.arguments() {
            args.push(prepare_argument(name));
            args.push(value);
        }

        Self {
            program: entrypoint.program.clone(),
            args,
            redirect: assignment.log_path.clone(),
        }
    }

    /// Shell-style rendering used for the audit log.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 3);
        parts.push(shell_quote(&self.program.to_string_lossy()));
        parts.extend(self.args.iter().map(|arg| shell_quote(arg)));
        parts.push(">".to_string());
        parts.push(shell_quote(&self.redirect.to_string_lossy()));
        parts.join(" ")
    }
}

fn prepare_argument(name: &str) -> String {
    format!("-{name}")
}

fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Starts one worker process per assignment.
pub struct ProcessLauncher {
    entrypoint: Entrypoint,
    dry_run: bool,
    sink: Arc<dyn LogSink>,
}

impl ProcessLauncher {
    pub fn new(entrypoint: Entrypoint, sink: Arc<dyn LogSink>) -> Self {
        Self {
            entrypoint,
            dry_run: false,
            sink,
        }
    }

    /// In dry-run mode commands are logged but never started.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn entrypoint(&self) -> &Entrypoint {
        &self.entrypoint
    }

    pub fn command_line(&self, assignment: &ProcessAssignment) -> CommandLine {
        CommandLine::new(&self.entrypoint, assignment)
    }

    /// Log the command for `assignment` and start it.
    ///
    /// Returns `Ok(None)` in dry-run mode. Must be called from within a
    /// Tokio runtime.
    pub fn launch(&self, assignment: &ProcessAssignment) -> Result<Option<ProcessHandle>, DispatchError> {
        let command_line = self.command_line(assignment);
        self.sink.log(&command_line.render());

        if self.dry_run {
            debug(format!("dry run: sub-process #{} not started", assignment.index));
            return Ok(None);
        }

        let launch_failure = |source: io::Error| DispatchError::LaunchFailure {
            assignment: Box::new(assignment.clone()),
            source,
        };

        let log_file = open_log_file(&command_line.redirect).map_err(launch_failure)?;

        let mut command = std::process::Command::new(&command_line.program);
        command.args(&command_line.args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::from(log_file));
        platform::prepare_command(&mut command).map_err(launch_failure)?;

        let child = tokio::process::Command::from(command)
            .spawn()
            .map_err(launch_failure)?;

        let handle = ProcessHandle::from_child(assignment.index, child).map_err(launch_failure)?;
        debug(format!(
            "Started sub-process #{} pid={:?} pages={} log={}",
            assignment.index,
            handle.pid(),
            assignment.range,
            assignment.log_path.display()
        ));

        Ok(Some(handle))
    }
}

fn open_log_file(path: &Path) -> io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}
