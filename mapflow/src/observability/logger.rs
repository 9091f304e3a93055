//! Pluggable pipeline logger.
//!
//! Pipeline stages never call `tracing` directly for per-request records;
//! they go through an [`HttpPipelineLogger`] so callers can redirect or
//! silence them. The default implementation forwards to `tracing`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a pipeline log record. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpPipelineLogLevel {
    /// Nothing is logged.
    Off,
    /// Failures only.
    Error,
    /// Failures and slow attempts.
    Warning,
    /// Every attempt.
    #[default]
    Info,
}

impl fmt::Display for HttpPipelineLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        f.write_str(name)
    }
}

/// Sink for per-request pipeline log records.
pub trait HttpPipelineLogger: Send + Sync {
    /// The least severe level this logger wants to receive.
    fn minimum_log_level(&self) -> HttpPipelineLogLevel;

    /// Records a message.
    fn log(&self, level: HttpPipelineLogLevel, message: &str);

    /// Returns true if a record at `level` would be kept.
    fn should_log(&self, level: HttpPipelineLogLevel) -> bool {
        level != HttpPipelineLogLevel::Off && level <= self.minimum_log_level()
    }
}

/// Logger forwarding records to `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct TracingPipelineLogger {
    minimum: HttpPipelineLogLevel,
}

impl TracingPipelineLogger {
    /// Creates a logger keeping records at `minimum` and above.
    #[must_use]
    pub const fn new(minimum: HttpPipelineLogLevel) -> Self {
        Self { minimum }
    }
}

impl Default for TracingPipelineLogger {
    fn default() -> Self {
        Self::new(HttpPipelineLogLevel::Info)
    }
}

impl HttpPipelineLogger for TracingPipelineLogger {
    fn minimum_log_level(&self) -> HttpPipelineLogLevel {
        self.minimum
    }

    fn log(&self, level: HttpPipelineLogLevel, message: &str) {
        match level {
            HttpPipelineLogLevel::Off => {}
            HttpPipelineLogLevel::Error => tracing::error!(target: "mapflow::pipeline", "{}", message),
            HttpPipelineLogLevel::Warning => tracing::warn!(target: "mapflow::pipeline", "{}", message),
            HttpPipelineLogLevel::Info => tracing::info!(target: "mapflow::pipeline", "{}", message),
        }
    }
}

/// Logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPipelineLogger;

impl HttpPipelineLogger for NoOpPipelineLogger {
    fn minimum_log_level(&self) -> HttpPipelineLogLevel {
        HttpPipelineLogLevel::Off
    }

    fn log(&self, _level: HttpPipelineLogLevel, _message: &str) {}
}
