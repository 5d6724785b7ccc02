//! Authentication-mode routing.
//!
//! Decides which storage authority owns a logical cart operation. The
//! authentication state is always an explicit argument supplied by the
//! identity layer; cart logic never reads it from ambient state.

use tidepool_core::{AccessCredential, AccountId};

/// Authentication state supplied by the identity layer.
#[derive(Debug, Clone)]
pub enum AuthState {
    /// No server-side identity; local storage owns the cart.
    Anonymous,
    /// Identity backed by a remote account.
    Authenticated {
        account: AccountId,
        credential: AccessCredential,
    },
}

impl AuthState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Storage authority for a single logical cart operation.
#[derive(Debug)]
pub enum Route<'a> {
    /// Apply in memory and mirror to durable local storage.
    Local,
    /// Request-then-settle against the remote cart service.
    Remote(&'a AccessCredential),
}

/// Pick the authority for an operation. Pure function of the supplied
/// authentication state.
#[must_use]
pub fn route(auth: &AuthState) -> Route<'_> {
    match auth {
        AuthState::Anonymous => Route::Local,
        AuthState::Authenticated { credential, .. } => Route::Remote(credential),
    }
}
