//! The pipeline and its send path.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::errors::Result;
use crate::http::{HttpClient, HttpRequest, HttpResponse, REQUEST_ID_HEADER};
use crate::observability::HttpPipelineLogger;
use crate::policies::{NextPolicy, RequestPolicyFactory, RequestPolicyOptions, TransportPolicy};

/// Options shared by every stage of a pipeline.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Sink for per-request log records.
    pub logger: Arc<dyn HttpPipelineLogger>,
    /// Transport terminating the chain.
    pub http_client: Arc<dyn HttpClient>,
}

impl PipelineOptions {
    /// Creates options from a logger and a transport.
    #[must_use]
    pub fn new(logger: Arc<dyn HttpPipelineLogger>, http_client: Arc<dyn HttpClient>) -> Self {
        Self { logger, http_client }
    }
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("minimum_log_level", &self.logger.minimum_log_level())
            .finish_non_exhaustive()
    }
}

/// An ordered list of policy factories, outermost first.
///
/// Immutable once built and cheap to clone; one pipeline can serve any number
/// of concurrent calls. Each [`send`](Self::send) instantiates a fresh chain
/// so no per-call state leaks between calls.
#[derive(Clone)]
pub struct Pipeline {
    factories: Vec<Arc<dyn RequestPolicyFactory>>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Creates a pipeline from factories ordered outermost to innermost.
    ///
    /// The transport always terminates the chain and is not part of
    /// `factories`.
    #[must_use]
    pub fn new(factories: Vec<Arc<dyn RequestPolicyFactory>>, options: PipelineOptions) -> Self {
        Self { factories, options }
    }

    /// Returns the factories, outermost first.
    #[must_use]
    pub fn factories(&self) -> &[Arc<dyn RequestPolicyFactory>] {
        &self.factories
    }

    /// Returns the factory names, outermost first.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.factories.iter().map(|factory| factory.name()).collect()
    }

    /// Returns the shared options.
    #[must_use]
    pub const fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Instantiates the chain, innermost first.
    fn build_chain(&self) -> NextPolicy {
        let policy_options = RequestPolicyOptions::new(self.options.logger.clone());
        let transport: NextPolicy = Arc::new(TransportPolicy::new(self.options.http_client.clone()));
        self.factories
            .iter()
            .rev()
            .fold(transport, |next, factory| factory.create(next, &policy_options))
    }

    /// Sends `request` through the chain.
    ///
    /// A request whose aborter has already fired is rejected with a
    /// cancellation error before any stage runs.
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        request.aborter.check("request aborted before dispatch")?;

        if !request.headers.contains(REQUEST_ID_HEADER) {
            request
                .headers
                .set(REQUEST_ID_HEADER, request.request_id.clone());
        }

        debug!(
            request_id = %request.request_id,
            method = %request.method,
            stages = self.factories.len(),
            "Dispatching request"
        );

        self.build_chain().send_request(request).await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("options", &self.options)
            .finish()
    }
}
