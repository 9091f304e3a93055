//! `202 Accepted` + `Location` polling over a pipeline.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::poll::wait_or_abort;
use super::{poll_until_done, PollStatus, PollerOptions};
use crate::errors::{Result, ServiceError};
use crate::http::{HttpRequest, HttpResponse};
use crate::pipeline::Pipeline;

const ACCEPTED: u16 = 202;

/// Drives a long-running operation to completion.
///
/// The initial request is sent once. A `202 Accepted` response carrying a
/// `Location` header starts polling that location with GET until the service
/// answers with anything other than 202; that final response is returned.
/// Any other initial response is returned as is.
#[derive(Debug, Clone, Copy)]
pub struct LroPoller<'a> {
    pipeline: &'a Pipeline,
    options: PollerOptions,
}

impl<'a> LroPoller<'a> {
    /// Creates a poller sending through `pipeline`.
    #[must_use]
    pub const fn new(pipeline: &'a Pipeline, options: PollerOptions) -> Self {
        Self { pipeline, options }
    }

    /// Sends `initial` and polls until the operation completes.
    ///
    /// Poll requests reuse the caller's request id and each carries its own
    /// child of the initial request's aborter.
    pub async fn run(&self, initial: HttpRequest) -> Result<HttpResponse> {
        self.options.validate()?;

        let aborter = initial.aborter.clone();
        let request_id = initial.request_id.clone();
        let base_url = initial.url.clone();

        let response = self.pipeline.send(initial).await?;
        if response.status != ACCEPTED {
            return Ok(response);
        }
        let Some(location) = response.headers.get("location") else {
            return Ok(response);
        };
        let location = resolve_location(&base_url, location).map_err(|err| {
            ServiceError::new(format!("unusable Location header {location:?}: {err}"))
                .with_status(ACCEPTED)
                .with_code("InvalidLocation")
                .with_request_id(request_id.clone())
        })?;

        debug!(request_id = %request_id, location = %location, "Polling long-running operation");
        let first_wait = retry_after(&response).unwrap_or_else(|| self.options.poll_interval());
        wait_or_abort(&aborter, first_wait).await?;

        let pipeline = self.pipeline;
        poll_until_done(&aborter, &self.options, move |poll_aborter| {
            let request = HttpRequest::get(location.clone())
                .with_aborter(poll_aborter)
                .with_request_id(request_id.clone());
            async move {
                let response = pipeline.send(request).await?;
                if response.status == ACCEPTED {
                    Ok(PollStatus::Pending {
                        retry_after: retry_after(&response),
                    })
                } else {
                    Ok(PollStatus::Done(response))
                }
            }
        })
        .await
    }
}

fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .headers
        .get("retry-after")
        .and_then(|value| parse_retry_after(value, Utc::now()))
}

/// Parses a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero wait. Unparseable values yield `None`.
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Resolves a `Location` header against the URL of the initial request.
fn resolve_location(base: &str, location: &str) -> std::result::Result<String, url::ParseError> {
    Ok(Url::parse(base)?.join(location)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aborter::Aborter;
    use crate::credentials::Credential;
    use crate::pipeline::{new_pipeline, NewPipelineOptions};
    use crate::policies::RetryOptions;
    use crate::testing::{ScriptedHttpClient, ScriptedReply};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn pipeline(client: Arc<ScriptedHttpClient>) -> Pipeline {
        new_pipeline(
            Credential::subscription_key("key").unwrap(),
            NewPipelineOptions::new()
                .with_retry_options(RetryOptions::new().with_max_tries(1))
                .with_http_client(client),
        )
        .unwrap()
    }

    fn accepted(location: &str) -> ScriptedReply {
        ScriptedReply::response(
            HttpResponse::new(202)
                .with_header("location", location)
                .with_header("retry-after", "0"),
        )
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120", Utc::now()), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 3 ", Utc::now()), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("soon", Utc::now()), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 30).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(30))
        );
        let later = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", later),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_resolve_location() {
        let base = "https://maps.test/mapData/upload?api-version=2.0";
        assert_eq!(
            resolve_location(base, "https://other.test/status/1").unwrap(),
            "https://other.test/status/1"
        );
        assert_eq!(
            resolve_location(base, "/mapData/operations/1").unwrap(),
            "https://maps.test/mapData/operations/1"
        );
        assert_eq!(
            resolve_location("https://maps.test/mapData/upload", "operations/1").unwrap(),
            "https://maps.test/mapData/operations/1"
        );
    }

    #[test]
    fn test_resolve_scheme_relative_location() {
        assert_eq!(
            resolve_location("https://maps.test/mapData/upload", "//status.maps.test/operations/1").unwrap(),
            "https://status.maps.test/operations/1"
        );
    }

    #[test]
    fn test_resolve_location_ignores_base_query() {
        assert_eq!(
            resolve_location("https://maps.test/mapData/upload?udid=a/b", "operations/1").unwrap(),
            "https://maps.test/mapData/operations/1"
        );
    }

    #[test]
    fn test_resolve_location_rejects_relative_base() {
        assert!(resolve_location("mapData/upload", "operations/1").is_err());
    }

    #[tokio::test]
    async fn test_unusable_location_is_service_error() {
        let client = Arc::new(ScriptedHttpClient::with_replies([ScriptedReply::response(
            HttpResponse::new(202).with_header("location", "http://[::1"),
        )]));
        let pipeline = pipeline(client.clone());

        let err = LroPoller::new(&pipeline, PollerOptions::default())
            .run(HttpRequest::post("https://maps.test/mapData/upload"))
            .await
            .unwrap_err();

        match err {
            crate::errors::MapflowError::Service(error) => {
                assert_eq!(error.status, Some(202));
                assert_eq!(error.code.as_deref(), Some("InvalidLocation"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_polls_location_until_complete() {
        let client = Arc::new(ScriptedHttpClient::with_replies([
            accepted("https://maps.test/operations/7"),
            accepted("https://maps.test/operations/7"),
            ScriptedReply::response(HttpResponse::json(200, &serde_json::json!({"status": "Succeeded"}))),
        ]));
        let pipeline = pipeline(client.clone());

        let initial = HttpRequest::post("https://maps.test/mapData/upload").with_request_id("lro-1");
        let response = LroPoller::new(&pipeline, PollerOptions::new().with_poll_interval_ms(5))
            .run(initial)
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.parsed_body, Some(serde_json::json!({"status": "Succeeded"})));

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        for recorded in &requests[1..] {
            assert_eq!(recorded.request.url, "https://maps.test/operations/7");
            assert_eq!(recorded.request.request_id, "lro-1");
            assert!(!recorded.request.aborter.ptr_eq(&requests[0].request.aborter));
        }
    }

    #[tokio::test]
    async fn test_non_accepted_initial_response_returned() {
        let client = Arc::new(ScriptedHttpClient::with_replies([ScriptedReply::status(201)]));
        let pipeline = pipeline(client.clone());

        let response = LroPoller::new(&pipeline, PollerOptions::default())
            .run(HttpRequest::post("https://maps.test/mapData/upload"))
            .await
            .unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_hung_poll_times_out_without_aborting_caller() {
        let client = Arc::new(ScriptedHttpClient::with_replies([
            accepted("/operations/3"),
            ScriptedReply::status(200).after(Duration::from_secs(30)),
        ]));
        let pipeline = pipeline(client.clone());
        let aborter = Aborter::none();

        let err = LroPoller::new(
            &pipeline,
            PollerOptions::new().with_poll_interval_ms(5).with_poll_timeout_ms(20),
        )
        .run(HttpRequest::post("https://maps.test/mapData/upload").with_aborter(aborter.clone()))
        .await
        .unwrap_err();

        assert!(err.is_cancelled(), "unexpected error: {err:?}");
        assert!(!aborter.is_aborted());
        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].request.aborter.is_aborted());
    }

    #[tokio::test]
    async fn test_abort_stops_polling() {
        let client = Arc::new(ScriptedHttpClient::new());
        for _ in 0..50 {
            client.push(ScriptedReply::response(
                HttpResponse::new(202).with_header("location", "/operations/9"),
            ));
        }
        let pipeline = pipeline(client.clone());

        let aborter = Aborter::timeout(60);
        let err = LroPoller::new(&pipeline, PollerOptions::new().with_poll_interval_ms(20))
            .run(HttpRequest::post("https://maps.test/mapData/upload").with_aborter(aborter))
            .await
            .unwrap_err();

        assert!(err.is_cancelled(), "unexpected error: {err:?}");
        assert!(client.call_count() < 10);
    }
}
