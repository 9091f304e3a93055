//! Builder for custom pipelines.

use std::sync::Arc;

use super::defaults::resolve_http_client;
use super::{Pipeline, PipelineOptions};
use crate::errors::Result;
use crate::http::HttpClient;
use crate::observability::{HttpPipelineLogger, TracingPipelineLogger};
use crate::policies::RequestPolicyFactory;

/// Assembles a [`Pipeline`] from arbitrary factories.
///
/// Factories are added outermost first; the transport is appended by the
/// pipeline itself.
#[derive(Default)]
pub struct PipelineBuilder {
    factories: Vec<Arc<dyn RequestPolicyFactory>>,
    logger: Option<Arc<dyn HttpPipelineLogger>>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a factory inside the ones added so far.
    #[must_use]
    pub fn policy(mut self, factory: impl RequestPolicyFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Appends an already shared factory.
    #[must_use]
    pub fn shared_policy(mut self, factory: Arc<dyn RequestPolicyFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Sets the pipeline logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn HttpPipelineLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets the transport.
    #[must_use]
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Returns the number of factories added.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no factory was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Builds the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        let http_client = resolve_http_client(self.http_client)?;
        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingPipelineLogger::default()));
        Ok(Pipeline::new(
            self.factories,
            PipelineOptions::new(logger, http_client),
        ))
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field(
                "factories",
                &self.factories.iter().map(|factory| factory.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
