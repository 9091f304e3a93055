//! The transport capability.

use async_trait::async_trait;

use super::{HttpRequest, HttpResponse};
use crate::errors::TransportError;

/// Sends a fully prepared request over the network.
///
/// Implementations may honour the request's aborter to interrupt an
/// in-flight send; the pipeline itself only guarantees that no new attempt
/// starts once it has fired.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends the request and returns the raw response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
