//! Scripted HTTP client.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::errors::{TransportError, TransportErrorKind};
use crate::http::{HttpClient, HttpRequest, HttpResponse};

/// One scripted outcome.
#[derive(Debug)]
pub struct ScriptedReply {
    delay: Duration,
    outcome: Result<HttpResponse, TransportError>,
}

impl ScriptedReply {
    /// Replies with an empty response of `status`.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::response(HttpResponse::new(status))
    }

    /// Replies with `response`.
    #[must_use]
    pub fn response(response: HttpResponse) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(response),
        }
    }

    /// Fails with a transport error.
    #[must_use]
    pub fn error(error: TransportError) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(error),
        }
    }

    /// Holds the reply back for `delay`. An abort of the request's aborter
    /// during the delay ends it with an in-flight abort error.
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request as seen by the transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The request, headers and query as signed.
    pub request: HttpRequest,
    /// When the transport received it.
    pub received_at: Instant,
}

/// Replays scripted replies in order and records each request.
///
/// Once the script is exhausted every further call fails with a transport
/// error of kind [`TransportErrorKind::Other`].
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    script: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedHttpClient {
    /// Creates a client with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client from a list of replies.
    #[must_use]
    pub fn with_replies(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Appends a reply to the script.
    pub fn push(&self, reply: ScriptedReply) {
        self.script.lock().push_back(reply);
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the time between consecutive requests.
    #[must_use]
    pub fn gaps(&self) -> Vec<Duration> {
        self.requests
            .lock()
            .windows(2)
            .map(|pair| pair[1].received_at.duration_since(pair[0].received_at))
            .collect()
    }

    /// Returns the number of replies not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let aborter = request.aborter.clone();
        self.requests.lock().push(RecordedRequest {
            request,
            received_at: Instant::now(),
        });

        let reply = self.script.lock().pop_front();
        let Some(reply) = reply else {
            return Err(TransportError::new(TransportErrorKind::Other, "script exhausted"));
        };

        if !reply.delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(reply.delay) => {}
                () = aborter.aborted() => return Err(TransportError::aborted()),
            }
        }
        reply.outcome
    }
}
