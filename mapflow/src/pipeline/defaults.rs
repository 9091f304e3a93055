//! The canonical pipeline.

use std::fmt;
use std::sync::Arc;

use super::{Pipeline, PipelineOptions};
use crate::credentials::Credential;
use crate::errors::{ConfigurationError, Result};
use crate::http::HttpClient;
use crate::observability::{HttpPipelineLogger, TracingPipelineLogger};
use crate::policies::{
    DeserializationPolicyFactory, LoggingPolicyFactory, RequestLogOptions, RequestPolicyFactory,
    RetryOptions, RetryPolicyFactory,
};

/// Options for [`new_pipeline`].
#[derive(Clone, Default)]
pub struct NewPipelineOptions {
    /// Retry stage configuration.
    pub retry_options: RetryOptions,
    /// Logging stage configuration.
    pub log_options: RequestLogOptions,
    /// Pipeline logger; defaults to [`TracingPipelineLogger`].
    pub logger: Option<Arc<dyn HttpPipelineLogger>>,
    /// Transport; defaults to the reqwest client when that feature is enabled.
    pub http_client: Option<Arc<dyn HttpClient>>,
}

impl NewPipelineOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry options.
    #[must_use]
    pub fn with_retry_options(mut self, retry_options: RetryOptions) -> Self {
        self.retry_options = retry_options;
        self
    }

    /// Sets the logging stage options.
    #[must_use]
    pub fn with_log_options(mut self, log_options: RequestLogOptions) -> Self {
        self.log_options = log_options;
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
}

impl fmt::Debug for NewPipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewPipelineOptions")
            .field("retry_options", &self.retry_options)
            .field("log_options", &self.log_options)
            .field("custom_logger", &self.logger.is_some())
            .field("custom_http_client", &self.http_client.is_some())
            .finish()
    }
}

/// Builds the standard pipeline: deserialization, `credential`, retry,
/// logging, transport.
///
/// Fails with a configuration error if the retry options are invalid, or if
/// no HTTP client is given and the `reqwest-client` feature is disabled.
pub fn new_pipeline(credential: Credential, options: NewPipelineOptions) -> Result<Pipeline> {
    let retry = RetryPolicyFactory::new(&options.retry_options)?;
    let http_client = resolve_http_client(options.http_client)?;
    let logger = options
        .logger
        .unwrap_or_else(|| Arc::new(TracingPipelineLogger::default()));

    let factories: Vec<Arc<dyn RequestPolicyFactory>> = vec![
        Arc::new(DeserializationPolicyFactory),
        Arc::new(credential),
        Arc::new(retry),
        Arc::new(LoggingPolicyFactory::new(options.log_options)),
    ];

    Ok(Pipeline::new(factories, PipelineOptions::new(logger, http_client)))
}

/// Returns `client`, or the default transport when none is given.
pub(crate) fn resolve_http_client(
    client: Option<Arc<dyn HttpClient>>,
) -> std::result::Result<Arc<dyn HttpClient>, ConfigurationError> {
    match client {
        Some(client) => Ok(client),
        None => default_http_client(),
    }
}

#[cfg(feature = "reqwest-client")]
#[allow(clippy::unnecessary_wraps)]
fn default_http_client() -> std::result::Result<Arc<dyn HttpClient>, ConfigurationError> {
    Ok(Arc::new(crate::http::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "reqwest-client"))]
fn default_http_client() -> std::result::Result<Arc<dyn HttpClient>, ConfigurationError> {
    Err(ConfigurationError::new(
        "http_client",
        "no HTTP client given and the reqwest-client feature is disabled",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MapflowError;
    use crate::testing::ScriptedHttpClient;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonical_stage_order() {
        let pipeline = new_pipeline(
            Credential::subscription_key("key").unwrap(),
            NewPipelineOptions::new().with_http_client(Arc::new(ScriptedHttpClient::new())),
        )
        .unwrap();

        assert_eq!(
            pipeline.stage_names(),
            vec!["deserialization", "subscription_key", "retry", "logging"]
        );
    }

    #[test]
    fn test_invalid_retry_options_rejected() {
        let err = new_pipeline(
            Credential::subscription_key("key").unwrap(),
            NewPipelineOptions::new()
                .with_retry_options(RetryOptions::new().with_max_tries(0))
                .with_http_client(Arc::new(ScriptedHttpClient::new())),
        )
        .unwrap_err();

        assert!(matches!(err, MapflowError::Configuration(ref e) if e.field == "max_tries"));
    }

    #[cfg(feature = "reqwest-client")]
    #[test]
    fn test_default_transport_when_feature_enabled() {
        assert!(resolve_http_client(None).is_ok());
    }

    #[cfg(not(feature = "reqwest-client"))]
    #[test]
    fn test_missing_transport_is_configuration_error() {
        let err = resolve_http_client(None).err().unwrap();
        assert_eq!(err.field, "http_client");
    }
}
