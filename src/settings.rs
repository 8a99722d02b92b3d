//! Dispatch settings
//!
//! Layered with the `config` crate, lowest precedence first:
//! built-in defaults, an optional TOML file, `PAGEFORK_*` environment variables.
//! Command line flags are applied on top by the binary.

use crate::config::{DEFAULT_FIRST_PAGE, DEFAULT_PROCESSES, ENV_PREFIX, SAMPLE_PAGE_SIZE};
use crate::error::SettingsError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatchSettings {
    pub processes: usize,
    pub log_prefix: String,
    /// Log commands without starting any worker
    pub dry_run: bool,
    #[serde(default)]
    pub stall_timeout_secs: Option<u64>,
    /// Worker program; defaults to the running executable
    #[serde(default)]
    pub program: Option<PathBuf>,
    pub first_page: i64,
    #[serde(default)]
    pub last_page: Option<i64>,
    pub page_size: usize,
    /// Upper bound of the sample worker's random pause, in milliseconds
    #[serde(default)]
    pub pause_max_ms: Option<u64>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            processes: DEFAULT_PROCESSES,
            log_prefix: String::new(),
            dry_run: false,
            stall_timeout_secs: None,
            program: None,
            first_page: DEFAULT_FIRST_PAGE,
            last_page: None,
            page_size: SAMPLE_PAGE_SIZE,
            pause_max_ms: None,
        }
    }
}

impl DispatchSettings {
    /// Load settings, reading `file` when given (it must then exist).
    ///
    /// Values are not validated here; command line overrides may still
    /// replace them. Call [`validate`](Self::validate) once they are applied.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("processes", defaults.processes as i64)?
            .set_default("log_prefix", defaults.log_prefix)?
            .set_default("dry_run", defaults.dry_run)?
            .set_default("first_page", defaults.first_page)?
            .set_default("page_size", defaults.page_size as i64)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Full check for the dispatching parent.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.processes == 0 {
            return Err(SettingsError::Invalid {
                field: "processes",
                message: "must be at least 1".to_string(),
            });
        }
        self.validate_worker()?;
        if self.stall_timeout_secs == Some(0) {
            return Err(SettingsError::Invalid {
                field: "stall_timeout_secs",
                message: "must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    /// Only the fields a worker reads.
    ///
    /// Workers inherit the parent's environment, while the parent's command
    /// line overrides never reach them, so dispatch-only fields are skipped.
    pub fn validate_worker(&self) -> Result<(), SettingsError> {
        if self.page_size == 0 {
            return Err(SettingsError::Invalid {
                field: "page_size",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs.map(Duration::from_secs)
    }

    pub fn pause_max(&self) -> Option<Duration> {
        self.pause_max_ms.map(Duration::from_millis)
    }
}
