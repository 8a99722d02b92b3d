//! Owned, readable connection to one child's output stream.

use crate::logging::debug;
use crate::platform;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::time::timeout;

type LineSource = Box<dyn AsyncBufRead + Unpin + Send>;

/// Readable byte stream bound to one running child.
///
/// `close` consumes the handle, so a handle can only be released once and
/// cannot be read after release.
pub struct ProcessHandle {
    index: usize,
    reader: LineSource,
    child: Option<Child>,
    buffer: Vec<u8>,
}

impl ProcessHandle {
    /// Take ownership of the child's stdout.
    pub fn from_child(index: usize, mut child: Child) -> io::Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Child stdout not captured"))?;

        Ok(Self {
            index,
            reader: Box::new(BufReader::new(stdout)),
            child: Some(child),
            buffer: Vec::new(),
        })
    }

    /// A handle over an arbitrary stream with no process behind it.
    pub fn from_reader<R>(index: usize, reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self {
            index,
            reader: Box::new(reader),
            child: None,
            buffer: Vec::new(),
        }
    }

    /// A handle reading `reader` while owning `child`.
    #[cfg(test)]
    pub(crate) fn from_parts<R>(index: usize, reader: R, child: Child) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self {
            index,
            reader: Box::new(reader),
            child: Some(child),
            buffer: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Next line without its terminator, or `None` at end-of-stream.
    ///
    /// Invalid UTF-8 is replaced rather than treated as an error.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buffer.clear();
        let read = self.reader.read_until(b'\n', &mut self.buffer).await?;
        if read == 0 {
            return Ok(None);
        }

        if self.buffer.last() == Some(&b'\n') {
            self.buffer.pop();
            if self.buffer.last() == Some(&b'\r') {
                self.buffer.pop();
            }
        }

        Ok(Some(String::from_utf8_lossy(&self.buffer).into_owned()))
    }

    /// Stop the child: SIGTERM, then a hard kill if it is still running
    /// after `grace`. The child is not reaped; [`close`](Self::close) does that.
    pub async fn terminate(&mut self, grace: Duration) -> io::Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        if child.try_wait()?.is_some() {
            return Ok(());
        }

        if let Some(pid) = child.id() {
            match platform::request_terminate(pid) {
                Ok(()) => {
                    if timeout(grace, child.wait()).await.is_ok() {
                        return Ok(());
                    }
                }
                Err(err) => debug(format!("pid={pid} SIGTERM failed: {err}")),
            }
        }

        debug(format!("sub-process #{} still running, killing", self.index));
        child.kill().await
    }

    /// Release the stream and reap the child, if there is one.
    pub async fn close(self) -> io::Result<Option<ExitStatus>> {
        let Self { reader, child, .. } = self;
        drop(reader);

        match child {
            Some(mut child) => child.wait().await.map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("index", &self.index)
            .field("pid", &self.pid())
            .finish()
    }
}
