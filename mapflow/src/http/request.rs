//! Outbound request model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::aborter::Aborter;
use crate::credentials::Credential;

/// Header carrying the per-call request id.
pub const REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
}

impl HttpMethod {
    /// Returns the method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive header map. Names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeaders(BTreeMap<String, String>);

impl HttpHeaders {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any previous value.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Returns a header value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Removes a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A request travelling through the pipeline.
///
/// Query parameters added with [`set_query_param`](Self::set_query_param) are
/// kept separately from `url` and encoded by [`full_url`](Self::full_url);
/// parameters already embedded in `url` are passed through untouched.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Target URL, without the managed query parameters.
    pub url: String,
    /// Request headers.
    pub headers: HttpHeaders,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Cancellation scope governing this call.
    pub aborter: Aborter,
    /// Per-call request id, shared by all attempts.
    pub request_id: String,
    /// Current attempt number, stamped by the retry stage (1-based).
    pub attempt: u32,
    query: Vec<(String, String)>,
    credential: Option<Credential>,
}

impl HttpRequest {
    /// Creates a request with a fresh request id and an unbounded aborter.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HttpHeaders::new(),
            body: None,
            aborter: Aborter::none(),
            request_id: uuid::Uuid::new_v4().to_string(),
            attempt: 1,
            query: Vec::new(),
            credential: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Sets the aborter governing this call.
    #[must_use]
    pub fn with_aborter(mut self, aborter: Aborter) -> Self {
        self.aborter = aborter;
        self
    }

    /// Sets the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Sets a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_query_param(name, value);
        self
    }

    /// Sets a raw body with its content type.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        self.body = Some(body.into());
        self.headers.set("content-type", content_type);
        self
    }

    /// Serializes `payload` as the JSON body.
    pub fn with_json_body<T: Serialize>(self, payload: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(payload)?;
        Ok(self.with_body(body, "application/json"))
    }

    /// Sets a query parameter, replacing an existing one with the same name.
    pub fn set_query_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.query.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value;
        } else {
            self.query.push((name, value));
        }
    }

    /// Returns a managed query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the managed query parameters in insertion order.
    #[must_use]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    /// Returns the URL with the managed query parameters encoded and appended.
    #[must_use]
    pub fn full_url(&self) -> String {
        self.render_url(|_, value| urlencoding::encode(value).into_owned())
    }

    /// Like [`full_url`](Self::full_url), with the values of `hidden`
    /// parameters replaced so the result is safe to log.
    #[must_use]
    pub fn redacted_url(&self, hidden: &[&str]) -> String {
        self.render_url(|name, value| {
            if hidden.contains(&name) {
                "REDACTED".to_string()
            } else {
                urlencoding::encode(value).into_owned()
            }
        })
    }

    fn render_url(&self, mut render_value: impl FnMut(&str, &str) -> String) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let mut out = self.url.clone();
        let mut separator = if out.contains('?') { '&' } else { '?' };
        for (name, value) in &self.query {
            out.push(separator);
            out.push_str(&urlencoding::encode(name));
            out.push('=');
            out.push_str(&render_value(name, value));
            separator = '&';
        }
        out
    }

    /// Returns the credential recorded by the signer stage.
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub(crate) fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    /// Re-applies the recorded credential, picking up rotated secrets.
    ///
    /// A request that was never signed is left as is.
    pub fn resign(&mut self) {
        if let Some(credential) = self.credential.clone() {
            credential.sign(self);
        }
    }
}
