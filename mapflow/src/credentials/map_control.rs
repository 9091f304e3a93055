//! Signing delegated to an authenticated host session.

use std::fmt;
use std::sync::Arc;

use crate::errors::ConfigurationError;
use crate::http::HttpRequest;

/// An already-authenticated host session (e.g. an embedded map control) that
/// owns the credential material and knows how to sign requests with it.
#[cfg_attr(test, mockall::automock)]
pub trait MapControlSession: Send + Sync {
    /// Whether the session has completed authentication.
    fn is_authenticated(&self) -> bool;

    /// Adds the session's authentication to the request.
    fn sign_request(&self, request: &mut HttpRequest);
}

/// Credential holding no secret of its own.
#[derive(Clone)]
pub struct MapControlCredential {
    session: Arc<dyn MapControlSession>,
}

impl MapControlCredential {
    /// Wraps a session. A session that has not authenticated yet is rejected.
    pub fn new(session: Arc<dyn MapControlSession>) -> Result<Self, ConfigurationError> {
        if !session.is_authenticated() {
            return Err(ConfigurationError::new(
                "map_control",
                "host session is not authenticated",
            ));
        }
        Ok(Self { session })
    }

    pub(crate) fn sign(&self, request: &mut HttpRequest) {
        self.session.sign_request(request);
    }
}

impl fmt::Debug for MapControlCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapControlCredential")
            .field("authenticated", &self.session.is_authenticated())
            .finish()
    }
}
