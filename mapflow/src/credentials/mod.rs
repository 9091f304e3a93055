//! Request signing.
//!
//! A [`Credential`] is a closed set of authentication schemes. It acts as a
//! [`RequestPolicyFactory`]: the policy it creates records the credential on
//! the request, signs it and delegates. The retry stage re-applies the
//! recorded credential on every later attempt, so rotating a
//! [`TokenCredential`] takes effect even for retries of an in-flight call.

mod map_control;
mod refresh;
mod subscription_key;
mod token;

pub use map_control::{MapControlCredential, MapControlSession};
pub use refresh::spawn_token_refresh;
pub use subscription_key::{KeyPlacement, SubscriptionKeyCredential, SUBSCRIPTION_KEY_QUERY_PARAM};
pub use token::{TokenCredential, CLIENT_ID_HEADER, DEFAULT_TOKEN_SCHEME};

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::{ConfigurationError, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::policies::{NextPolicy, RequestPolicy, RequestPolicyFactory, RequestPolicyOptions};

/// Authentication material attached to every request of a pipeline.
#[derive(Clone)]
pub enum Credential {
    /// Static subscription key.
    SubscriptionKey(SubscriptionKeyCredential),
    /// Rotatable bearer token.
    Token(TokenCredential),
    /// Signing delegated to an authenticated host session.
    MapControl(MapControlCredential),
}

impl Credential {
    /// Subscription key sent as the `subscription-key` query parameter.
    pub fn subscription_key(key: impl Into<String>) -> std::result::Result<Self, ConfigurationError> {
        Ok(Self::SubscriptionKey(SubscriptionKeyCredential::new(key)?))
    }

    /// Bearer token with a client id.
    pub fn token(
        client_id: impl Into<String>,
        token: impl Into<String>,
    ) -> std::result::Result<Self, ConfigurationError> {
        Ok(Self::Token(TokenCredential::new(client_id, token)?))
    }

    /// Delegates signing to a host session.
    pub fn map_control(
        session: Arc<dyn MapControlSession>,
    ) -> std::result::Result<Self, ConfigurationError> {
        Ok(Self::MapControl(MapControlCredential::new(session)?))
    }

    /// Attaches the current authentication material to `request`.
    ///
    /// Idempotent: signing twice leaves a single set of headers/parameters.
    pub fn sign(&self, request: &mut HttpRequest) {
        match self {
            Self::SubscriptionKey(credential) => credential.sign(request),
            Self::Token(credential) => credential.sign(request),
            Self::MapControl(credential) => credential.sign(request),
        }
    }

    /// Short scheme name for diagnostics.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        match self {
            Self::SubscriptionKey(_) => "subscription_key",
            Self::Token(_) => "token",
            Self::MapControl(_) => "map_control",
        }
    }
}

impl From<SubscriptionKeyCredential> for Credential {
    fn from(credential: SubscriptionKeyCredential) -> Self {
        Self::SubscriptionKey(credential)
    }
}

impl From<TokenCredential> for Credential {
    fn from(credential: TokenCredential) -> Self {
        Self::Token(credential)
    }
}

impl From<MapControlCredential> for Credential {
    fn from(credential: MapControlCredential) -> Self {
        Self::MapControl(credential)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SubscriptionKey(c) => f.debug_tuple("SubscriptionKey").field(c).finish(),
            Self::Token(c) => f.debug_tuple("Token").field(c).finish(),
            Self::MapControl(c) => f.debug_tuple("MapControl").field(c).finish(),
        }
    }
}

impl RequestPolicyFactory for Credential {
    fn name(&self) -> &str {
        self.scheme()
    }

    fn create(&self, next: NextPolicy, _options: &RequestPolicyOptions) -> NextPolicy {
        Arc::new(CredentialPolicy {
            credential: self.clone(),
            next,
        })
    }
}

/// Signs each request with a [`Credential`] before delegating.
pub struct CredentialPolicy {
    credential: Credential,
    next: NextPolicy,
}

#[async_trait]
impl RequestPolicy for CredentialPolicy {
    async fn send_request(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        request.set_credential(self.credential.clone());
        self.credential.sign(&mut request);
        self.next.send_request(request).await
    }
}
