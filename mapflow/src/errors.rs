//! Error types for the mapflow request-dispatch core.
//!
//! Retryable conditions are absorbed by the retry stage; only the final
//! outcome of a call crosses the pipeline boundary as a [`MapflowError`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result alias used by every pipeline operation.
pub type Result<T> = std::result::Result<T, MapflowError>;

/// The main error type for mapflow operations.
#[derive(Debug, Error)]
pub enum MapflowError {
    /// The call's aborter fired before the call completed.
    #[error("{0}")]
    Cancelled(#[from] CancellationError),

    /// A network-level failure reported by the transport.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// The service rejected the request with a non-retryable status.
    #[error("Request rejected: {0}")]
    PermanentRequest(ServiceError),

    /// Invalid credential or pipeline configuration.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Terminal failure reported by (or on the way to) the remote service.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// The response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MapflowError {
    /// Returns true if this error represents a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns true if the error is worth another attempt.
    ///
    /// Only transport failures qualify; status-based decisions are made on
    /// responses before they are turned into errors.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns the HTTP status associated with the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::PermanentRequest(e) | Self::Service(e) => e.status,
            _ => None,
        }
    }
}

/// Raised when an aborter fires before a call completes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("The operation was aborted: {reason}")]
pub struct CancellationError {
    /// Where the cancellation was observed.
    pub reason: String,
}

impl CancellationError {
    /// Creates a new cancellation error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Connection could not be established.
    Connect,
    /// The transport gave up waiting.
    Timeout,
    /// Reading or writing the body failed.
    Io,
    /// The transport could not build the request.
    InvalidRequest,
    /// Anything else.
    Other,
}

/// A network-level failure surfaced by an [`HttpClient`](crate::http::HttpClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Transport error ({kind:?}): {message}")]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// Human readable description.
    pub message: String,
}

impl TransportError {
    /// Creates a new transport error.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a connection failure.
    #[must_use]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Shorthand for a timeout.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// The request's aborter fired while the transport was waiting.
    #[must_use]
    pub fn aborted() -> Self {
        Self::new(TransportErrorKind::Other, "request aborted while in flight")
    }
}

/// Error raised at construction time for unusable configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Configuration error in '{field}': {message}")]
pub struct ConfigurationError {
    /// The option or credential field at fault.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Terminal failure wrapping what the service (or transport) reported.
#[derive(Debug, Clone, Error, PartialEq, Eq, Default, Serialize, Deserialize)]
#[error("Service error{}: {message}", status_and_code(.status, .code))]
pub struct ServiceError {
    /// HTTP status, absent when the failure never produced a response.
    pub status: Option<u16>,
    /// Service error code (e.g. "BadRequest").
    pub code: Option<String>,
    /// Error message.
    pub message: String,
    /// Raw response body, if any.
    pub body: Option<String>,
    /// Request id the failure belongs to.
    pub request_id: Option<String>,
    /// Number of attempts made before giving up.
    pub attempts: u32,
}

impl ServiceError {
    /// Creates a new service error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Sets the HTTP status.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the service error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Sets the number of attempts made.
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Wraps a transport failure that exhausted its retries.
    #[must_use]
    pub fn from_transport(error: &TransportError, attempts: u32) -> Self {
        Self::new(error.message.clone())
            .with_code(format!("{:?}", error.kind))
            .with_attempts(attempts)
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("attempts".to_string(), serde_json::json!(self.attempts));
        if let Some(status) = self.status {
            map.insert("status".to_string(), serde_json::json!(status));
        }
        if let Some(ref code) = self.code {
            map.insert("code".to_string(), serde_json::json!(code));
        }
        if let Some(ref request_id) = self.request_id {
            map.insert("request_id".to_string(), serde_json::json!(request_id));
        }
        map
    }
}

fn status_and_code(status: &Option<u16>, code: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(status) = status {
        out.push_str(&format!(" {status}"));
    }
    if let Some(code) = code {
        out.push_str(&format!(" [{code}]"));
    }
    out
}
