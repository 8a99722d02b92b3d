//! Named command line arguments and role detection.
//!
//! Children are started as `entrypoint -parent_id <pid> -page_start <n> ...`;
//! the presence of a non-empty `parent_id` is the only thing that marks a
//! process as a child.

use crate::config::ARG_PARENT_ID;
use crate::error::DispatchError;
use std::collections::HashMap;
use std::ffi::OsString;
use std::str::FromStr;

/// Supplies named string arguments to the running process.
pub trait ArgumentSource: Send + Sync {
    /// Value of `name`, or `None` when the argument was not given.
    fn get_arg(&self, name: &str) -> Option<String>;
}

impl ArgumentSource for HashMap<String, String> {
    fn get_arg(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<T: ArgumentSource + ?Sized> ArgumentSource for &T {
    fn get_arg(&self, name: &str) -> Option<String> {
        (**self).get_arg(name)
    }
}

/// Which of the two dispatcher paths this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Parent,
    Child,
}

impl Role {
    /// Derive the role from `source`. Has no side effects and may be called any number of times.
    pub fn detect(source: &dyn ArgumentSource) -> Self {
        if is_child(source) {
            Role::Child
        } else {
            Role::Parent
        }
    }
}

/// `true` iff `parent_id` is present and non-empty. `"0"` counts as present.
pub fn is_child(source: &dyn ArgumentSource) -> bool {
    source
        .get_arg(ARG_PARENT_ID)
        .is_some_and(|value| !value.is_empty())
}

/// Read and parse a required argument.
pub fn required_arg<T: FromStr>(source: &dyn ArgumentSource, name: &'static str) -> Result<T, DispatchError> {
    let value = source
        .get_arg(name)
        .filter(|value| !value.is_empty())
        .ok_or(DispatchError::MissingArgument { name })?;
    value
        .trim()
        .parse()
        .map_err(|_| DispatchError::InvalidArgument { name, value })
}

/// `-name value` style arguments as seen by shell scripts.
///
/// Accepted forms:
/// - `-name value` / `--name value`
/// - `-name=value` / `--name=value`
/// - `-flag` with no value, stored as `"true"`
///
/// A token that parses as a number is always a value, so `-page_start -5` works.
#[derive(Debug, Clone, Default)]
pub struct ShellArgs {
    values: HashMap<String, String>,
}

impl ShellArgs {
    /// Parse the current process arguments, skipping the program name.
    pub fn from_env() -> Self {
        Self::parse(std::env::args_os().skip(1))
    }

    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut parsed = Self::default();
        let mut current: Option<String> = None;

        for raw in args {
            let arg = raw.into().to_string_lossy().into_owned();

            if let Some(name) = flag_name(&arg) {
                if let Some((name, value)) = name.split_once('=') {
                    parsed.values.insert(name.to_string(), value.to_string());
                    current = None;
                } else {
                    parsed.values.insert(name.to_string(), "true".to_string());
                    current = Some(name.to_string());
                }
                continue;
            }

            // Values not following a flag belong to the embedding program
            if let Some(name) = current.take() {
                parsed.values.insert(name, arg);
            }
        }

        parsed
    }
}

impl ArgumentSource for ShellArgs {
    fn get_arg(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

fn flag_name(arg: &str) -> Option<&str> {
    if !arg.starts_with('-') || arg.len() < 2 || arg.parse::<f64>().is_ok() {
        return None;
    }
    let name = arg.trim_start_matches('-');
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
