//! Outermost stage: decodes JSON bodies and turns error statuses into errors.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{NextPolicy, RequestPolicy, RequestPolicyFactory, RequestPolicyOptions};
use crate::errors::{MapflowError, Result, ServiceError};
use crate::http::{is_transient_status, HttpRequest, HttpResponse};

/// Factory for [`DeserializationPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeserializationPolicyFactory;

impl RequestPolicyFactory for DeserializationPolicyFactory {
    fn name(&self) -> &str {
        "deserialization"
    }

    fn create(&self, next: NextPolicy, _options: &RequestPolicyOptions) -> NextPolicy {
        Arc::new(DeserializationPolicy { next })
    }
}

/// Parses JSON/GeoJSON bodies of successful responses into
/// [`HttpResponse::parsed_body`] and surfaces error statuses as
/// [`MapflowError::PermanentRequest`] or [`MapflowError::Service`].
pub struct DeserializationPolicy {
    next: NextPolicy,
}

#[async_trait]
impl RequestPolicy for DeserializationPolicy {
    async fn send_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request_id = request.request_id.clone();
        let mut response = self.next.send_request(request).await?;

        if response.is_success() {
            if response.parsed_body.is_none() && response.is_json() && !response.body.is_empty() {
                response.parsed_body = Some(serde_json::from_slice(&response.body)?);
            }
            return Ok(response);
        }

        let error = service_error_from_response(&response).with_request_id(request_id);
        if is_transient_status(response.status) {
            Err(MapflowError::Service(error))
        } else {
            Err(MapflowError::PermanentRequest(error))
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// Builds a [`ServiceError`] from an error response.
///
/// Understands the `{"error": {"code": ..., "message": ...}}` envelope and
/// falls back to the raw body text.
#[must_use]
pub fn service_error_from_response(response: &HttpResponse) -> ServiceError {
    let text = response.text();
    let mut error = ServiceError::new(format!("HTTP {}", response.status)).with_status(response.status);

    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&response.body) {
        if let Some(code) = envelope.error.code {
            error = error.with_code(code);
        }
        if let Some(message) = envelope.error.message {
            error.message = message;
        }
    } else if !text.trim().is_empty() {
        error.message = text.trim().to_string();
    }

    if !text.is_empty() {
        error = error.with_body(text);
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FixedPolicy(HttpResponse);

    #[async_trait]
    impl RequestPolicy for FixedPolicy {
        async fn send_request(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Ok(self.0.clone())
        }
    }

    fn policy_returning(response: HttpResponse) -> NextPolicy {
        DeserializationPolicyFactory.create(Arc::new(FixedPolicy(response)), &RequestPolicyOptions::default())
    }

    #[tokio::test]
    async fn test_parses_geojson_body() {
        let body = serde_json::json!({"type": "FeatureCollection", "features": []});
        let response = HttpResponse::new(200)
            .with_header("content-type", "application/geo+json")
            .with_body(body.to_string());

        let result = policy_returning(response)
            .send_request(HttpRequest::get("https://example.test"))
            .await
            .unwrap();
        assert_eq!(result.parsed_body, Some(body));
    }

    #[tokio::test]
    async fn test_leaves_binary_body_alone() {
        let response = HttpResponse::new(200)
            .with_header("content-type", "image/png")
            .with_body(vec![0x89, 0x50, 0x4e, 0x47]);

        let result = policy_returning(response)
            .send_request(HttpRequest::get("https://example.test"))
            .await
            .unwrap();
        assert!(result.parsed_body.is_none());
        assert_eq!(result.body.len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_json_is_serialization_error() {
        let response = HttpResponse::new(200)
            .with_header("content-type", "application/json")
            .with_body("{not json");

        let err = policy_returning(response)
            .send_request(HttpRequest::get("https://example.test"))
            .await
            .unwrap_err();
        assert!(matches!(err, MapflowError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let response = HttpResponse::json(
            400,
            &serde_json::json!({"error": {"code": "BadRequest", "message": "query is required"}}),
        );

        let err = policy_returning(response)
            .send_request(HttpRequest::get("https://example.test").with_request_id("req-1"))
            .await
            .unwrap_err();
        match err {
            MapflowError::PermanentRequest(error) => {
                assert_eq!(error.status, Some(400));
                assert_eq!(error.code.as_deref(), Some("BadRequest"));
                assert_eq!(error.message, "query is required");
                assert_eq!(error.request_id.as_deref(), Some("req-1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_service_error() {
        let response = HttpResponse::new(503).with_body("upstream unavailable");

        let err = policy_returning(response)
            .send_request(HttpRequest::get("https://example.test"))
            .await
            .unwrap_err();
        match err {
            MapflowError::Service(error) => {
                assert_eq!(error.status, Some(503));
                assert_eq!(error.message, "upstream unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_service_error_empty_body() {
        let error = service_error_from_response(&HttpResponse::new(404));
        assert_eq!(error.message, "HTTP 404");
        assert!(error.body.is_none());
    }
}
