//! Observability utilities.

mod logger;
mod subscriber;

pub use logger::{HttpPipelineLogLevel, HttpPipelineLogger, NoOpPipelineLogger, TracingPipelineLogger};
pub use subscriber::{init_tracing, LogFormat, LOG_ENV_VAR};
