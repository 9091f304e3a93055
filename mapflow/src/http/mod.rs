//! Transport-facing request/response model and the pluggable HTTP client.

mod client;
mod request;
mod response;

#[cfg(feature = "reqwest-client")]
mod reqwest_client;

pub use client::HttpClient;
pub use request::{HttpHeaders, HttpMethod, HttpRequest, REQUEST_ID_HEADER};
pub use response::HttpResponse;

#[cfg(feature = "reqwest-client")]
pub use reqwest_client::ReqwestHttpClient;

/// Returns true for statuses that are conventionally worth retrying:
/// request timeout, too many requests, and server errors other than
/// "not implemented" and "HTTP version not supported".
#[must_use]
pub const fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (status >= 500 && status < 600 && status != 501 && status != 505)
}
