//! Per-attempt latency logging.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::{NextPolicy, RequestPolicy, RequestPolicyFactory, RequestPolicyOptions};
use crate::credentials::SUBSCRIPTION_KEY_QUERY_PARAM;
use crate::errors::Result;
use crate::http::{HttpRequest, HttpResponse};
use crate::observability::HttpPipelineLogLevel;

/// Logging stage configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogOptions {
    /// Attempts slower than this are logged as warnings.
    #[serde(default = "default_threshold")]
    pub log_warning_if_try_over_threshold_ms: u64,
}

const fn default_threshold() -> u64 {
    3_000
}

impl Default for RequestLogOptions {
    fn default() -> Self {
        Self {
            log_warning_if_try_over_threshold_ms: default_threshold(),
        }
    }
}

impl RequestLogOptions {
    /// Sets the slow-attempt threshold.
    #[must_use]
    pub const fn with_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.log_warning_if_try_over_threshold_ms = threshold_ms;
        self
    }
}

/// Factory for [`LoggingPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPolicyFactory {
    options: RequestLogOptions,
}

impl LoggingPolicyFactory {
    /// Creates the factory.
    #[must_use]
    pub const fn new(options: RequestLogOptions) -> Self {
        Self { options }
    }
}

impl RequestPolicyFactory for LoggingPolicyFactory {
    fn name(&self) -> &str {
        "logging"
    }

    fn create(&self, next: NextPolicy, options: &RequestPolicyOptions) -> NextPolicy {
        Arc::new(LoggingPolicy {
            next,
            options: self.options,
            policy_options: options.clone(),
        })
    }
}

/// Times each attempt and reports it through the pipeline logger.
///
/// Exactly one record per attempt: Error for a failed attempt, else Warning
/// when it ran over the threshold, else Info. A slow attempt is marked
/// `SLOW` whatever its level. Never alters the request or the response.
pub struct LoggingPolicy {
    next: NextPolicy,
    options: RequestLogOptions,
    policy_options: RequestPolicyOptions,
}

#[async_trait]
impl RequestPolicy for LoggingPolicy {
    async fn send_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let summary = format!(
            "request_id={} attempt={} {} {}",
            request.request_id,
            request.attempt,
            request.method,
            request.redacted_url(&[SUBSCRIPTION_KEY_QUERY_PARAM]),
        );

        let started = Instant::now();
        let outcome = self.next.send_request(request).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let threshold = self.options.log_warning_if_try_over_threshold_ms;
        let slow = elapsed_ms > threshold;

        let (failed, result) = match &outcome {
            Ok(response) => (response.status >= 400, format!("status={}", response.status)),
            Err(error) => (true, format!("error=\"{error}\"")),
        };
        let level = if failed {
            HttpPipelineLogLevel::Error
        } else if slow {
            HttpPipelineLogLevel::Warning
        } else {
            HttpPipelineLogLevel::Info
        };
        let prefix = if slow { "SLOW attempt: " } else { "" };
        let suffix = if slow { format!(" threshold_ms={threshold}") } else { String::new() };
        self.policy_options.log(
            level,
            &format!("{prefix}{summary} {result} elapsed_ms={elapsed_ms}{suffix}"),
        );

        outcome
    }
}
