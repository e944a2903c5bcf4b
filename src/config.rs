//! Configuration of the pooled scheduler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`PooledScheduler`](crate::scheduler::PooledScheduler).
///
/// The pool is elastic: it starts without threads, spawns one whenever work
/// arrives and no worker is idle, and lets a worker retire after it stayed idle
/// for `keep_alive_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker threads are named `<thread_name_prefix>-<n>`.
    pub thread_name_prefix: String,
    /// How long an idle worker waits for work before it exits.
    pub keep_alive_ms: u64,
    /// Stack size for worker threads; the platform default when `None`.
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            thread_name_prefix: "rxlite-io".to_string(),
            keep_alive_ms: 60_000,
            stack_size: None,
        }
    }
}

impl PoolConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the idle keep-alive of worker threads.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive_ms = u64::try_from(keep_alive.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the worker thread stack size in bytes.
    #[must_use]
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Idle keep-alive as a `Duration`.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        if self.keep_alive_ms == 0 {
            return Err("keep_alive_ms must be greater than 0".into());
        }
        if self.stack_size == Some(0) {
            return Err("stack_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse pool configuration from a JSON string and validate it. Missing
    /// fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: PoolConfig =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
