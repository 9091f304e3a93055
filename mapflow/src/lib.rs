//! # Mapflow
//!
//! The request-dispatch core of a typed geospatial REST client.
//!
//! Endpoint wrappers build an [`HttpRequest`](http::HttpRequest) and hand it
//! to a shared [`Pipeline`](pipeline::Pipeline). The pipeline runs it through:
//!
//! - **Deserialization**: JSON/GeoJSON bodies parsed, error statuses mapped to errors
//! - **Signing**: subscription key, rotatable bearer token, or a host session
//! - **Retry**: fixed or exponential backoff over transient failures
//! - **Logging**: per-attempt latency through a pluggable logger
//! - **Transport**: any [`HttpClient`](http::HttpClient), reqwest by default
//!
//! Every call is governed by an [`Aborter`](aborter::Aborter), a node in a
//! tree of cancellation scopes with optional timeouts.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mapflow::prelude::*;
//!
//! let pipeline = new_pipeline(
//!     Credential::subscription_key(key)?,
//!     NewPipelineOptions::new().with_retry_options(RetryOptions::new().with_max_tries(3)),
//! )?;
//!
//! let request = HttpRequest::get("https://atlas.microsoft.com/search/address/json")
//!     .with_query("query", "1 Microsoft Way")
//!     .with_aborter(Aborter::timeout(10_000));
//! let response = pipeline.send(request).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod aborter;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod http;
pub mod lro;
pub mod observability;
pub mod pipeline;
pub mod policies;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aborter::Aborter;
    pub use crate::config::PipelineConfig;
    pub use crate::credentials::{
        spawn_token_refresh, Credential, KeyPlacement, MapControlSession, TokenCredential,
    };
    pub use crate::errors::{
        CancellationError, ConfigurationError, MapflowError, Result, ServiceError, TransportError,
    };
    pub use crate::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
    pub use crate::lro::{poll_until_done, LroPoller, PollStatus, PollerOptions};
    pub use crate::observability::{
        init_tracing, HttpPipelineLogLevel, HttpPipelineLogger, LogFormat, TracingPipelineLogger,
    };
    pub use crate::pipeline::{new_pipeline, NewPipelineOptions, Pipeline, PipelineBuilder};
    pub use crate::policies::{RequestLogOptions, RetryOptions, RetryPolicyType};
}
