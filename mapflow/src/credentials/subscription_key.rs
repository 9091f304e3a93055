//! Static subscription key.

use std::fmt;

use crate::errors::ConfigurationError;
use crate::http::HttpRequest;

/// Query parameter carrying the subscription key by default.
pub const SUBSCRIPTION_KEY_QUERY_PARAM: &str = "subscription-key";

/// Where the key is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPlacement {
    /// As a query parameter with this name.
    Query(String),
    /// As a header with this name.
    Header(String),
}

impl Default for KeyPlacement {
    fn default() -> Self {
        Self::Query(SUBSCRIPTION_KEY_QUERY_PARAM.to_string())
    }
}

/// Stateless credential injecting a fixed key into every request.
#[derive(Clone)]
pub struct SubscriptionKeyCredential {
    key: String,
    placement: KeyPlacement,
}

impl SubscriptionKeyCredential {
    /// Creates a credential sending the key as the `subscription-key` query
    /// parameter. Blank keys are rejected.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigurationError> {
        Self::with_placement(key, KeyPlacement::default())
    }

    /// Creates a credential with an explicit placement.
    pub fn with_placement(
        key: impl Into<String>,
        placement: KeyPlacement,
    ) -> Result<Self, ConfigurationError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigurationError::new("subscription_key", "key must not be empty"));
        }
        let name = match &placement {
            KeyPlacement::Query(name) | KeyPlacement::Header(name) => name,
        };
        if name.trim().is_empty() {
            return Err(ConfigurationError::new("subscription_key", "placement name must not be empty"));
        }
        Ok(Self { key, placement })
    }

    /// Returns where the key is attached.
    #[must_use]
    pub const fn placement(&self) -> &KeyPlacement {
        &self.placement
    }

    pub(crate) fn sign(&self, request: &mut HttpRequest) {
        match &self.placement {
            KeyPlacement::Query(name) => request.set_query_param(name.clone(), self.key.clone()),
            KeyPlacement::Header(name) => request.headers.set(name, self.key.clone()),
        }
    }
}

impl fmt::Debug for SubscriptionKeyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionKeyCredential")
            .field("key", &"<redacted>")
            .field("placement", &self.placement)
            .finish()
    }
}
