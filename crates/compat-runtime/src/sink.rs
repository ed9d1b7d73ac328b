//! Destinations for user-facing warnings.
//!
//! Warnings raised while preparing the environment (rejected cache
//! candidates, offline skips, relaxed role names, `[WARNING]:` lines from
//! the runtime) go through a [`WarningSink`] so callers can capture them
//! instead of scraping logs.

use std::sync::Mutex;

pub trait WarningSink: Send + Sync {
    fn warn(&self, message: &str);
}

/// Forwards warnings to `tracing` at WARN level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Keeps every warning in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl WarningSink for CollectingSink {
    fn warn(&self, message: &str) {
        tracing::debug!(warning = message, "Collected warning");
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}
