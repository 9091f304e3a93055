//! Poller configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ConfigurationError;

/// Configuration for long-running-operation polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerOptions {
    /// Wait between polls when the service gives no `Retry-After`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Timeout applied to each individual poll (0 = none).
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Give up after this many polls.
    #[serde(default)]
    pub max_polls: Option<u32>,
}

const fn default_poll_interval_ms() -> u64 {
    1_000
}

const fn default_poll_timeout_ms() -> u64 {
    30_000
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            max_polls: None,
        }
    }
}

impl PollerOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default wait between polls.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    /// Sets the per-poll timeout.
    #[must_use]
    pub const fn with_poll_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.poll_timeout_ms = timeout_ms;
        self
    }

    /// Caps the number of polls.
    #[must_use]
    pub const fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Returns the default wait between polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Checks the options for values that can never succeed.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_polls == Some(0) {
            return Err(ConfigurationError::new("max_polls", "must be at least 1"));
        }
        Ok(())
    }
}
