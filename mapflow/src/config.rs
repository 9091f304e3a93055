//! Serializable pipeline configuration.
//!
//! Every field has a default, so `{}` is a valid document:
//!
//! ```json
//! {
//!   "retry": { "policy_type": "fixed", "max_tries": 3, "retry_delay_ms": 500, "max_retry_delay_ms": 500 },
//!   "logging": { "log_warning_if_try_over_threshold_ms": 2000 },
//!   "log_level": "warning",
//!   "poller": { "poll_interval_ms": 2000, "max_polls": 30 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::{ConfigurationError, Result};
use crate::lro::PollerOptions;
use crate::observability::{HttpPipelineLogLevel, TracingPipelineLogger};
use crate::pipeline::NewPipelineOptions;
use crate::policies::{RequestLogOptions, RetryOptions};

/// Configuration for a pipeline and its poller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Retry stage options.
    #[serde(default)]
    pub retry: RetryOptions,
    /// Logging stage options.
    #[serde(default)]
    pub logging: RequestLogOptions,
    /// Minimum level kept by the default pipeline logger.
    #[serde(default)]
    pub log_level: HttpPipelineLogLevel,
    /// Long-running-operation polling options.
    #[serde(default)]
    pub poller: PollerOptions,
}

impl PipelineConfig {
    /// Creates a configuration with every field at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document. Missing fields take their defaults; the result
    /// is validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the retry options.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the logging stage options.
    #[must_use]
    pub const fn with_logging(mut self, logging: RequestLogOptions) -> Self {
        self.logging = logging;
        self
    }

    /// Sets the pipeline log level.
    #[must_use]
    pub const fn with_log_level(mut self, log_level: HttpPipelineLogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    /// Sets the poller options.
    #[must_use]
    pub const fn with_poller(mut self, poller: PollerOptions) -> Self {
        self.poller = poller;
        self
    }

    /// Checks every section.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        self.retry.resolve()?;
        self.poller.validate()
    }

    /// Validates and converts into options for
    /// [`new_pipeline`](crate::pipeline::new_pipeline). The logger forwards
    /// to `tracing` at `log_level`; no HTTP client is set.
    pub fn into_pipeline_options(self) -> std::result::Result<NewPipelineOptions, ConfigurationError> {
        self.validate()?;
        Ok(NewPipelineOptions::new()
            .with_retry_options(self.retry)
            .with_log_options(self.logging)
            .with_logger(Arc::new(TracingPipelineLogger::new(self.log_level))))
    }
}
