//! Test doubles for pipelines.
//!
//! - [`ScriptedHttpClient`]: an [`HttpClient`](crate::http::HttpClient) that
//!   replays a script of responses and failures and records every request
//! - [`RecordingLogger`]: an [`HttpPipelineLogger`](crate::observability::HttpPipelineLogger)
//!   that keeps records in memory
//!
//! Compiled for this crate's own tests, and for dependents through the
//! `test-utils` feature.

mod http_client;
mod logger;

pub use http_client::{RecordedRequest, ScriptedHttpClient, ScriptedReply};
pub use logger::RecordingLogger;
