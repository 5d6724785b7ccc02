//! Remote cart service credential types.
//!
//! The credential is supplied by the identity layer; the cart engine
//! only carries it to the transport boundary.

use secrecy::{ExposeSecret, SecretString};

/// Bearer token authenticating a shopper against the remote cart service.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct AccessCredential {
    token: SecretString,
}

impl AccessCredential {
    /// Wrap a raw bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }

    /// Expose the raw token.
    ///
    /// Call this only at the transport boundary (request headers).
    #[must_use]
    pub fn expose(&self) -> &str {
        self.token.expose_secret()
    }
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("token", &"[REDACTED]")
            .finish()
    }
}
