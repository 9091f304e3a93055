//! Retry stage with fixed or exponential backoff.
//!
//! Attempts are numbered from 1. The delay before attempt `n >= 2` is
//! `retry_delay_ms` for the fixed policy and
//! `min(max_retry_delay_ms, retry_delay_ms * 2^(n-2))` for the exponential one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{NextPolicy, RequestPolicy, RequestPolicyFactory, RequestPolicyOptions};
use crate::errors::{CancellationError, ConfigurationError, MapflowError, Result, ServiceError};
use crate::http::{is_transient_status, HttpRequest, HttpResponse};

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_TRIES: u32 = 4;
/// Default base delay between attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 4_000;
/// Default upper bound on a single delay.
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 120_000;

/// Backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicyType {
    /// delay = base * 2^(attempt - 2), capped
    #[default]
    Exponential,
    /// delay = base
    Fixed,
}

/// User-facing retry configuration. Unset fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOptions {
    /// Backoff schedule.
    #[serde(default)]
    pub policy_type: Option<RetryPolicyType>,
    /// Maximum attempts including the first (>= 1).
    #[serde(default)]
    pub max_tries: Option<u32>,
    /// Base delay in milliseconds.
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    /// Cap on a single delay in milliseconds.
    #[serde(default)]
    pub max_retry_delay_ms: Option<u64>,
}

impl RetryOptions {
    /// Creates options with every field at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backoff schedule.
    #[must_use]
    pub const fn with_policy_type(mut self, policy_type: RetryPolicyType) -> Self {
        self.policy_type = Some(policy_type);
        self
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub const fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = Some(max_tries);
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_retry_delay_ms(mut self, delay: u64) -> Self {
        self.retry_delay_ms = Some(delay);
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub const fn with_max_retry_delay_ms(mut self, delay: u64) -> Self {
        self.max_retry_delay_ms = Some(delay);
        self
    }

    /// Validates the options and fills in defaults.
    pub fn resolve(&self) -> std::result::Result<ResolvedRetryOptions, ConfigurationError> {
        let max_tries = self.max_tries.unwrap_or(DEFAULT_MAX_TRIES);
        if max_tries == 0 {
            return Err(ConfigurationError::new("max_tries", "must be at least 1"));
        }

        // An explicit 0 on either delay disables backoff, and then both must be 0.
        let delay_zero = self.retry_delay_ms == Some(0);
        let max_zero = self.max_retry_delay_ms == Some(0);
        if delay_zero != max_zero {
            return Err(ConfigurationError::new(
                "retry_delay_ms",
                "retry_delay_ms and max_retry_delay_ms must both be 0 or both be non-zero",
            ));
        }

        if let (Some(delay), Some(max)) = (self.retry_delay_ms, self.max_retry_delay_ms) {
            if delay > max {
                return Err(ConfigurationError::new(
                    "retry_delay_ms",
                    format!("retry_delay_ms ({delay}) exceeds max_retry_delay_ms ({max})"),
                ));
            }
        }

        Ok(ResolvedRetryOptions {
            policy_type: self.policy_type.unwrap_or_default(),
            max_tries,
            retry_delay_ms: self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
            max_retry_delay_ms: self.max_retry_delay_ms.unwrap_or(DEFAULT_MAX_RETRY_DELAY_MS),
        })
    }
}

/// Validated retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRetryOptions {
    /// Backoff schedule.
    pub policy_type: RetryPolicyType,
    /// Maximum attempts including the first.
    pub max_tries: u32,
    /// Base delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Cap on a single delay in milliseconds.
    pub max_retry_delay_ms: u64,
}

impl Default for ResolvedRetryOptions {
    fn default() -> Self {
        Self {
            policy_type: RetryPolicyType::Exponential,
            max_tries: DEFAULT_MAX_TRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
        }
    }
}

impl ResolvedRetryOptions {
    /// Delay to wait before `attempt` (1-based). Zero for the first attempt.
    #[must_use]
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let ms = match self.policy_type {
            RetryPolicyType::Fixed => self.retry_delay_ms,
            RetryPolicyType::Exponential => {
                let factor = 2u64.checked_pow(attempt - 2).unwrap_or(u64::MAX);
                self.retry_delay_ms
                    .saturating_mul(factor)
                    .min(self.max_retry_delay_ms)
            }
        };
        Duration::from_millis(ms)
    }
}

/// Factory for [`RetryPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyFactory {
    options: ResolvedRetryOptions,
}

impl RetryPolicyFactory {
    /// Validates `options` and creates the factory.
    pub fn new(options: &RetryOptions) -> std::result::Result<Self, ConfigurationError> {
        Ok(Self {
            options: options.resolve()?,
        })
    }

    /// Returns the validated options.
    #[must_use]
    pub const fn options(&self) -> &ResolvedRetryOptions {
        &self.options
    }
}

impl RequestPolicyFactory for RetryPolicyFactory {
    fn name(&self) -> &str {
        "retry"
    }

    fn create(&self, next: NextPolicy, _options: &RequestPolicyOptions) -> NextPolicy {
        Arc::new(RetryPolicy {
            next,
            options: self.options,
        })
    }
}

/// Re-sends transient failures with backoff, strictly sequentially.
pub struct RetryPolicy {
    next: NextPolicy,
    options: ResolvedRetryOptions,
}

impl RetryPolicy {
    fn is_transient(outcome: &Result<HttpResponse>) -> bool {
        match outcome {
            Ok(response) => is_transient_status(response.status),
            Err(error) => error.is_transient(),
        }
    }
}

#[async_trait]
impl RequestPolicy for RetryPolicy {
    async fn send_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let aborter = request.aborter.clone();
        let mut attempt = 1;

        loop {
            aborter.check(&format!("before attempt {attempt}"))?;

            let mut attempt_request = request.clone();
            attempt_request.attempt = attempt;
            if attempt > 1 {
                attempt_request.resign();
            }

            let outcome = self.next.send_request(attempt_request).await;
            if !Self::is_transient(&outcome) {
                return outcome;
            }
            if aborter.is_aborted() {
                return Err(CancellationError::new(format!("after attempt {attempt}")).into());
            }
            if attempt >= self.options.max_tries {
                return match outcome {
                    Err(MapflowError::Transport(error)) => Err(ServiceError::from_transport(&error, attempt)
                        .with_request_id(request.request_id.clone())
                        .into()),
                    other => other,
                };
            }

            let delay = self.options.delay_before_attempt(attempt + 1);
            debug!(
                request_id = %request.request_id,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                status = outcome.as_ref().ok().map(|r| r.status),
                "Retrying after transient failure"
            );

            aborter.check("before retry delay")?;
            if !delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = aborter.aborted() => {
                        return Err(CancellationError::new("during retry delay").into());
                    }
                }
            }

            attempt += 1;
        }
    }
}
