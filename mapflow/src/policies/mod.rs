//! Request policies: the stages a request passes through on its way to the
//! transport.
//!
//! A [`RequestPolicyFactory`] is stored in a [`Pipeline`](crate::pipeline::Pipeline)
//! and instantiated per call into a [`RequestPolicy`] bound to the next stage.
//! Each policy may mutate the request before delegating and inspect the
//! response on the way back.

mod deserialization;
mod logging;
mod retry;
mod transport;

pub use deserialization::{service_error_from_response, DeserializationPolicy, DeserializationPolicyFactory};
pub use logging::{LoggingPolicy, LoggingPolicyFactory, RequestLogOptions};
pub use retry::{
    ResolvedRetryOptions, RetryOptions, RetryPolicy, RetryPolicyFactory, RetryPolicyType,
};
pub use transport::TransportPolicy;

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::Result;
use crate::http::{HttpRequest, HttpResponse};
use crate::observability::{HttpPipelineLogLevel, HttpPipelineLogger, TracingPipelineLogger};

/// One bound link of the chain.
#[async_trait]
pub trait RequestPolicy: Send + Sync {
    /// Processes the request, normally by delegating to the next policy.
    async fn send_request(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Shared handle to the next link of the chain.
pub type NextPolicy = Arc<dyn RequestPolicy>;

/// Produces a [`RequestPolicy`] bound to the next link.
pub trait RequestPolicyFactory: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Binds a new policy in front of `next`.
    fn create(&self, next: NextPolicy, options: &RequestPolicyOptions) -> NextPolicy;
}

/// Options shared by every policy of a pipeline.
#[derive(Clone)]
pub struct RequestPolicyOptions {
    logger: Arc<dyn HttpPipelineLogger>,
}

impl RequestPolicyOptions {
    /// Creates options around a logger.
    #[must_use]
    pub fn new(logger: Arc<dyn HttpPipelineLogger>) -> Self {
        Self { logger }
    }

    /// Returns true if the logger keeps records at `level`.
    #[must_use]
    pub fn should_log(&self, level: HttpPipelineLogLevel) -> bool {
        self.logger.should_log(level)
    }

    /// Logs through the pipeline logger.
    pub fn log(&self, level: HttpPipelineLogLevel, message: &str) {
        if self.should_log(level) {
            self.logger.log(level, message);
        }
    }
}

impl Default for RequestPolicyOptions {
    fn default() -> Self {
        Self::new(Arc::new(TracingPipelineLogger::default()))
    }
}

impl std::fmt::Debug for RequestPolicyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPolicyOptions")
            .field("minimum_log_level", &self.logger.minimum_log_level())
            .finish()
    }
}
