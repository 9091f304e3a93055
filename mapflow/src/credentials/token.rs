//! Rotatable bearer token.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::errors::ConfigurationError;
use crate::http::HttpRequest;

/// Header carrying the client (account) id next to the token.
pub const CLIENT_ID_HEADER: &str = "x-ms-client-id";
/// Authorization scheme used unless overridden.
pub const DEFAULT_TOKEN_SCHEME: &str = "Bearer";

#[derive(Debug)]
struct TokenState {
    client_id: String,
    token: String,
}

/// Bearer token credential backed by a shared mutable cell.
///
/// Clones share the cell: rotating the token through any clone affects every
/// pipeline using the credential from its next signing pass on, without
/// rebuilding anything.
#[derive(Clone)]
pub struct TokenCredential {
    state: Arc<RwLock<TokenState>>,
    scheme: Arc<str>,
}

impl TokenCredential {
    /// Creates a credential. An empty token is rejected; an empty client id
    /// omits the client id header.
    pub fn new(client_id: impl Into<String>, token: impl Into<String>) -> Result<Self, ConfigurationError> {
        let token = token.into();
        validate_token(&token)?;
        Ok(Self {
            state: Arc::new(RwLock::new(TokenState {
                client_id: client_id.into(),
                token,
            })),
            scheme: Arc::from(DEFAULT_TOKEN_SCHEME),
        })
    }

    /// Uses a different authorization scheme.
    pub fn with_scheme(mut self, scheme: impl AsRef<str>) -> Result<Self, ConfigurationError> {
        let scheme = scheme.as_ref().trim();
        if scheme.is_empty() {
            return Err(ConfigurationError::new("token_scheme", "scheme must not be empty"));
        }
        self.scheme = Arc::from(scheme);
        Ok(self)
    }

    /// Returns the current token.
    #[must_use]
    pub fn token(&self) -> String {
        self.state.read().token.clone()
    }

    /// Returns the current client id.
    #[must_use]
    pub fn client_id(&self) -> String {
        self.state.read().client_id.clone()
    }

    /// Returns the authorization scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Rotates the token in place.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), ConfigurationError> {
        let token = token.into();
        validate_token(&token)?;
        self.state.write().token = token;
        Ok(())
    }

    /// Replaces the client id in place.
    pub fn set_client_id(&self, client_id: impl Into<String>) {
        self.state.write().client_id = client_id.into();
    }

    pub(crate) fn sign(&self, request: &mut HttpRequest) {
        let state = self.state.read();
        request
            .headers
            .set("authorization", format!("{} {}", self.scheme, state.token));
        if state.client_id.is_empty() {
            request.headers.remove(CLIENT_ID_HEADER);
        } else {
            request.headers.set(CLIENT_ID_HEADER, state.client_id.clone());
        }
    }
}

fn validate_token(token: &str) -> Result<(), ConfigurationError> {
    if token.trim().is_empty() {
        return Err(ConfigurationError::new("token", "token must not be empty"));
    }
    Ok(())
}

impl fmt::Debug for TokenCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredential")
            .field("client_id", &self.client_id())
            .field("token", &"<redacted>")
            .field("scheme", &self.scheme)
            .finish()
    }
}
