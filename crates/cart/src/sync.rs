//! Authentication-transition synchronization.
//!
//! When a session starts already authenticated, or an anonymous session
//! logs in, the remote cart is pulled and replaces local state
//! wholesale. There is no merge step: pre-login anonymous intent is
//! discarded once the fetch completes. Logout has no trigger; the mode
//! resolver simply routes subsequent operations locally.

use tidepool_core::AccessCredential;
use tracing::{info, warn};

use crate::remote::RemoteCart;
use crate::route::{AuthState, Route, route};
use crate::storage::StringStore;
use crate::store::CartStore;

/// Where the session stands relative to the remote cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No server identity; local storage owns the cart.
    Anonymous,
    /// Remote fetch in flight after an authentication transition.
    Syncing,
    /// Remote cart pulled, or degraded after a failed fetch.
    Ready,
}

impl<R: RemoteCart, S: StringStore> CartStore<R, S> {
    /// Initial-mount trigger: pull the remote cart if the session is
    /// already authenticated, otherwise stay anonymous.
    pub async fn start_session(&mut self, auth: &AuthState) {
        match route(auth) {
            Route::Local => self.phase = SessionPhase::Anonymous,
            Route::Remote(credential) => self.sync_from_remote(credential).await,
        }
    }

    /// Login trigger: the anonymous → authenticated transition.
    pub async fn login(&mut self, credential: &AccessCredential) {
        self.sync_from_remote(credential).await;
    }

    /// Pull the remote cart and replace state wholesale, persisting the
    /// result. A failed fetch enters `Ready` degraded: existing items
    /// stay visible and `error` carries the reason.
    async fn sync_from_remote(&mut self, credential: &AccessCredential) {
        self.phase = SessionPhase::Syncing;
        self.state.loading = true;
        let result = self.remote.fetch(credential).await;
        self.state.loading = false;
        match result {
            Ok(items) => {
                info!(lines = items.len(), "replacing cart with remote state");
                self.replace_items(items);
                self.state.error = None;
            }
            Err(err) => {
                warn!(%err, "cart sync failed, keeping existing items");
                self.state.error = Some(err.to_string());
            }
        }
        self.phase = SessionPhase::Ready;
    }
}
