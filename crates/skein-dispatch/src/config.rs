//! Dispatch queue configuration and construction errors.

use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;

use skein_core::ConfigError;

// ── DispatchError ──────────────────────────────────────────────

/// Errors from constructing a [`DispatchQueue`](crate::DispatchQueue).
#[derive(Debug)]
pub enum DispatchError {
    /// The configuration failed validation.
    Config(ConfigError),
    /// The OS refused to spawn a worker thread.
    Spawn(io::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Spawn(e) => write!(f, "failed to spawn dispatch worker: {e}"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Spawn(e) => Some(e),
        }
    }
}

impl From<ConfigError> for DispatchError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ── DispatchConfig ─────────────────────────────────────────────

/// Construction parameters for a [`DispatchQueue`](crate::DispatchQueue).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Queue name; worker threads are named `{name}-{index}`.
    pub name: String,
    /// Number of worker threads. Must be at least 1.
    pub thread_count: usize,
    /// How long an idle worker waits before rechecking unready items.
    /// `None` yields the thread instead of waiting.
    pub poll_interval: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            name: "dispatch".into(),
            thread_count: 1,
            poll_interval: Some(Duration::from_millis(5)),
        }
    }
}

impl DispatchConfig {
    /// Config for a named queue with `thread_count` workers.
    pub fn new(name: impl Into<String>, thread_count: usize) -> Self {
        Self {
            name: name.into(),
            thread_count,
            ..Self::default()
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(())
    }
}
