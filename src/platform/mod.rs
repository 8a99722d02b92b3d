//! Platform-specific process helpers

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::{prepare_command, request_terminate};

#[cfg(not(unix))]
mod fallback {
    use std::io;
    use std::process::Command;

    pub fn prepare_command(_cmd: &mut Command) -> io::Result<()> {
        Ok(())
    }

    /// No graceful signal here; callers fall back to a hard kill
    pub fn request_terminate(_pid: u32) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

#[cfg(not(unix))]
pub use fallback::{prepare_command, request_terminate};

pub fn current_pid() -> u32 {
    std::process::id()
}
