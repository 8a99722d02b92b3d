//! Log sinks: where dispatch messages and relayed child output go.

use crate::config::RELAY_TARGET;
use std::sync::{Arc, Mutex};

/// Accepts one log message at a time.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Forwards every message to `tracing` at info level under [`RELAY_TARGET`].
///
/// [`init_logger`](crate::logging::init_logger) keeps that target enabled
/// whatever the configured level, so launch commands and worker output are
/// never filtered away.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::info!(target: RELAY_TARGET, "{}", message);
    }
}

/// Collects messages in memory, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Messages starting with `"<index>: "`, with that prefix removed.
    pub fn lines_for(&self, index: usize) -> Vec<String> {
        let prefix = format!("{index}: ");
        self.messages()
            .into_iter()
            .filter_map(|message| message.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        if let Ok(mut guard) = self.messages.lock() {
            guard.push(message.to_string());
        }
    }
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn log(&self, message: &str) {
        (**self).log(message)
    }
}
