//! Innermost link: hands the request to the HTTP client.

use async_trait::async_trait;
use std::sync::Arc;

use super::RequestPolicy;
use crate::errors::Result;
use crate::http::{HttpClient, HttpRequest, HttpResponse};

/// Terminates the chain at a pluggable [`HttpClient`].
pub struct TransportPolicy {
    client: Arc<dyn HttpClient>,
}

impl TransportPolicy {
    /// Wraps a client.
    #[must_use]
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequestPolicy for TransportPolicy {
    async fn send_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self.client.send(request).await?)
    }
}
