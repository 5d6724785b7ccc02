//! The cart store: single source of truth for in-memory cart state.
//!
//! Callers issue logical intents (add/update/remove/clear) without
//! knowing which authority handles them. Anonymous sessions mutate in
//! memory synchronously; authenticated sessions follow a
//! request-then-settle protocol against the remote gateway, applying
//! only server-confirmed parameters. Either way, every change to the
//! line list schedules a debounced write of the durable local replica.

use std::collections::HashMap;

use chrono::Utc;
use tidepool_core::{Price, VariantId};
use tracing::debug;

use crate::persist::LocalCartStore;
use crate::remote::{GatewayError, RemoteCart};
use crate::route::{AuthState, Route, route};
use crate::storage::StringStore;
use crate::sync::SessionPhase;
use crate::types::{CartLineItem, CartState, ProductSnapshot, Totals};

/// Owns [`CartState`] and exposes the four mutations plus read
/// selectors. Constructed explicitly and handed to consumers; there is
/// no ambient global cart.
pub struct CartStore<R, S> {
    pub(crate) remote: R,
    pub(crate) local: LocalCartStore<S>,
    pub(crate) state: CartState,
    pub(crate) totals: Totals,
    pub(crate) phase: SessionPhase,
    seq: SequenceGuard,
}

impl<R: RemoteCart, S: StringStore> CartStore<R, S> {
    /// Create an empty store over the given gateway and local adapter.
    #[must_use]
    pub fn new(remote: R, local: LocalCartStore<S>) -> Self {
        Self {
            remote,
            local,
            state: CartState::default(),
            totals: Totals::default(),
            phase: SessionPhase::Anonymous,
            seq: SequenceGuard::default(),
        }
    }

    /// Replace state with the durable local replica.
    ///
    /// The fast first paint on process start; does not schedule a write.
    pub fn hydrate(&mut self) {
        self.state.items = self.local.load();
        self.totals = Totals::of(&self.state.items);
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// Current line items in display order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.state.items
    }

    /// True while a remote-path request is in flight.
    #[must_use]
    pub const fn loading(&self) -> bool {
        self.state.loading
    }

    /// Last operation failure, if the most recent operation failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    /// Total units across all lines.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.totals.units
    }

    /// Number of distinct variant lines.
    #[must_use]
    pub const fn distinct_line_count(&self) -> usize {
        self.totals.lines
    }

    /// Summed monetary total across all lines.
    #[must_use]
    pub const fn total(&self) -> Price {
        self.totals.amount
    }

    /// Where the session stands relative to the remote cart.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn contains(&self, variant_id: &VariantId) -> bool {
        self.line_for(variant_id).is_some()
    }

    /// Quantity of the given variant; zero if absent.
    #[must_use]
    pub fn quantity_of(&self, variant_id: &VariantId) -> u32 {
        self.line_for(variant_id).map_or(0, |line| line.quantity)
    }

    #[must_use]
    pub fn line_for(&self, variant_id: &VariantId) -> Option<&CartLineItem> {
        self.state
            .items
            .iter()
            .find(|line| &line.variant_id == variant_id)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` of a variant.
    ///
    /// An already-present variant accumulates quantity; a new one is
    /// appended with `added_at = now`. A zero quantity is silently
    /// ignored (the caller layer validates input).
    pub async fn add_item(
        &mut self,
        auth: &AuthState,
        variant_id: VariantId,
        quantity: u32,
        snapshot: ProductSnapshot,
    ) {
        if quantity == 0 {
            debug!(variant = %variant_id, "ignoring add with zero quantity");
            return;
        }
        match route(auth) {
            Route::Local => {
                self.merge_add(&variant_id, quantity, &snapshot);
                self.items_changed();
                self.state.error = None;
            }
            Route::Remote(credential) => {
                let ticket = self.seq.issue(&variant_id);
                self.state.loading = true;
                let result = self.remote.add(credential, &variant_id, quantity).await;
                self.state.loading = false;
                match result {
                    Ok(ack) => {
                        if self.seq.try_apply(&variant_id, ticket)
                            && self.merge_add(&ack.variant_id, ack.quantity, &snapshot)
                        {
                            self.items_changed();
                        }
                        self.state.error = None;
                    }
                    Err(err) => self.reject(err),
                }
            }
        }
    }

    /// Set a variant's quantity. Zero removes the line; delete-by-update
    /// is a first-class path, not an error.
    pub async fn update_quantity(&mut self, auth: &AuthState, variant_id: &VariantId, quantity: u32) {
        match route(auth) {
            Route::Local => {
                if self.apply_quantity(variant_id, quantity) {
                    self.items_changed();
                }
                self.state.error = None;
            }
            Route::Remote(credential) => {
                let ticket = self.seq.issue(variant_id);
                self.state.loading = true;
                let result = self.remote.update(credential, variant_id, quantity).await;
                self.state.loading = false;
                match result {
                    Ok(ack) => {
                        if self.seq.try_apply(variant_id, ticket)
                            && self.apply_quantity(&ack.variant_id, ack.quantity)
                        {
                            self.items_changed();
                        }
                        self.state.error = None;
                    }
                    Err(err) => self.reject(err),
                }
            }
        }
    }

    /// Remove a variant's line. No-op if absent.
    pub async fn remove_item(&mut self, auth: &AuthState, variant_id: &VariantId) {
        match route(auth) {
            Route::Local => {
                if self.apply_remove(variant_id) {
                    self.items_changed();
                }
                self.state.error = None;
            }
            Route::Remote(credential) => {
                let ticket = self.seq.issue(variant_id);
                self.state.loading = true;
                let result = self.remote.remove(credential, variant_id).await;
                self.state.loading = false;
                match result {
                    Ok(()) => {
                        if self.seq.try_apply(variant_id, ticket) && self.apply_remove(variant_id) {
                            self.items_changed();
                        }
                        self.state.error = None;
                    }
                    Err(err) => self.reject(err),
                }
            }
        }
    }

    /// Empty the cart and purge the durable local copy.
    pub async fn clear(&mut self, auth: &AuthState) {
        match route(auth) {
            Route::Local => self.apply_clear(),
            Route::Remote(credential) => {
                self.state.loading = true;
                let result = self.remote.clear(credential).await;
                self.state.loading = false;
                match result {
                    Ok(()) => self.apply_clear(),
                    Err(err) => self.reject(err),
                }
            }
        }
    }

    // =========================================================================
    // Internal state transitions
    // =========================================================================

    /// Merge-or-append. Returns whether the list changed.
    fn merge_add(&mut self, variant_id: &VariantId, quantity: u32, snapshot: &ProductSnapshot) -> bool {
        if quantity == 0 {
            return false;
        }
        if let Some(line) = self
            .state
            .items
            .iter_mut()
            .find(|line| &line.variant_id == variant_id)
        {
            line.quantity = line.quantity.saturating_add(quantity);
        } else {
            self.state.items.push(CartLineItem {
                variant_id: variant_id.clone(),
                quantity,
                snapshot: snapshot.clone(),
                added_at: Utc::now(),
            });
        }
        true
    }

    /// Set-or-remove (quantity floor). Returns whether the list changed.
    fn apply_quantity(&mut self, variant_id: &VariantId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.apply_remove(variant_id);
        }
        match self
            .state
            .items
            .iter_mut()
            .find(|line| &line.variant_id == variant_id)
        {
            Some(line) if line.quantity == quantity => false,
            Some(line) => {
                line.quantity = quantity;
                true
            }
            // Unknown variant: nothing to resurrect a snapshot from
            None => false,
        }
    }

    /// Delete-if-present. Returns whether the list changed.
    fn apply_remove(&mut self, variant_id: &VariantId) -> bool {
        let before = self.state.items.len();
        self.state.items.retain(|line| &line.variant_id != variant_id);
        self.state.items.len() != before
    }

    fn apply_clear(&mut self) {
        self.state.items.clear();
        self.totals = Totals::default();
        self.seq.reset();
        self.local.clear();
        self.state.error = None;
    }

    /// Wholesale replacement, used by the synchronization trigger.
    pub(crate) fn replace_items(&mut self, items: Vec<CartLineItem>) {
        self.state.items = items;
        self.items_changed();
    }

    /// Recompute cached aggregates and mirror the list to the durable
    /// replica. The single hook behind every list change, whichever
    /// authority produced it.
    fn items_changed(&mut self) {
        self.totals = Totals::of(&self.state.items);
        self.local.save(&self.state.items);
    }

    /// Settle a rejected remote mutation: surface the reason, leave
    /// `items` untouched.
    fn reject(&mut self, err: GatewayError) {
        debug!(%err, "remote cart mutation rejected");
        self.state.error = Some(err.to_string());
    }
}

// =============================================================================
// SequenceGuard
// =============================================================================

/// Per-variant confirmation ordering guard.
///
/// Remote mutations take a monotonically increasing ticket at request
/// time; a confirmation carrying a ticket older than the last applied
/// one for that variant is discarded rather than applied.
#[derive(Debug, Default)]
struct SequenceGuard {
    issued: HashMap<VariantId, u64>,
    applied: HashMap<VariantId, u64>,
}

impl SequenceGuard {
    fn issue(&mut self, variant_id: &VariantId) -> u64 {
        let next = self.issued.entry(variant_id.clone()).or_insert(0);
        *next += 1;
        *next
    }

    fn try_apply(&mut self, variant_id: &VariantId, ticket: u64) -> bool {
        let applied = self.applied.entry(variant_id.clone()).or_insert(0);
        if ticket <= *applied {
            return false;
        }
        *applied = ticket;
        true
    }

    fn reset(&mut self) {
        self.issued.clear();
        self.applied.clear();
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tidepool_core::{AccessCredential, AccountId};

    use super::test_support::FakeRemote;
    use super::*;
    use crate::persist::{CART_KEY, LocalCartStore};
    use crate::storage::{MemoryStore, StringStore};
    use crate::types::test_support::line;

    fn snapshot(price: &str) -> ProductSnapshot {
        line("unused", "p1", 1, price).snapshot
    }

    fn anonymous_store() -> (CartStore<FakeRemote, MemoryStore>, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::default());
        let store = CartStore::new(
            FakeRemote::with_fetch(Vec::new()),
            LocalCartStore::new(Arc::clone(&storage)),
        );
        (store, storage)
    }

    fn authenticated() -> AuthState {
        AuthState::Authenticated {
            account: AccountId::new("acct-1"),
            credential: AccessCredential::new("tok-1"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_accumulates_per_variant() {
        let (mut store, _) = anonymous_store();
        let auth = AuthState::Anonymous;
        let v1 = VariantId::new("v1");

        store.add_item(&auth, v1.clone(), 2, snapshot("100")).await;
        store.add_item(&auth, v1.clone(), 3, snapshot("100")).await;
        store.add_item(&auth, VariantId::new("v2"), 1, snapshot("10")).await;

        assert_eq!(store.distinct_line_count(), 2);
        assert_eq!(store.quantity_of(&v1), 5);
        assert_eq!(store.count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worked_scenario_add_update_floor() {
        let (mut store, _) = anonymous_store();
        let auth = AuthState::Anonymous;
        let v1 = VariantId::new("v1");

        store.add_item(&auth, v1.clone(), 2, snapshot("100")).await;
        assert_eq!(store.count(), 2);
        assert_eq!(store.total().amount, "200".parse().unwrap());

        store.add_item(&auth, v1.clone(), 3, snapshot("100")).await;
        assert_eq!(store.quantity_of(&v1), 5);
        assert_eq!(store.total().amount, "500".parse().unwrap());

        store.update_quantity(&auth, &v1, 0).await;
        assert!(store.items().is_empty());
        assert_eq!(store.total().amount, "0".parse().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_to_zero_removes_line() {
        let (mut store, _) = anonymous_store();
        let auth = AuthState::Anonymous;
        let v1 = VariantId::new("v1");

        store.add_item(&auth, v1.clone(), 4, snapshot("5")).await;
        store.update_quantity(&auth, &v1, 0).await;

        assert!(!store.contains(&v1));
        assert_eq!(store.quantity_of(&v1), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_unknown_variant_is_noop() {
        let (mut store, _) = anonymous_store();
        let auth = AuthState::Anonymous;

        store.update_quantity(&auth, &VariantId::new("ghost"), 3).await;
        assert!(store.items().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_zero_quantity_is_silently_ignored() {
        let (mut store, _) = anonymous_store();
        store
            .add_item(&AuthState::Anonymous, VariantId::new("v1"), 0, snapshot("5"))
            .await;
        assert!(store.items().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_absent_variant_is_noop() {
        let (mut store, _) = anonymous_store();
        let auth = AuthState::Anonymous;

        store.add_item(&auth, VariantId::new("v1"), 1, snapshot("5")).await;
        store.remove_item(&auth, &VariantId::new("ghost")).await;
        assert_eq!(store.distinct_line_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_persist_to_local_replica() {
        let (mut store, storage) = anonymous_store();
        let auth = AuthState::Anonymous;

        store.add_item(&auth, VariantId::new("v1"), 2, snapshot("5")).await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        let raw = storage.get(CART_KEY).unwrap().unwrap();
        let stored: Vec<CartLineItem> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.first().unwrap().quantity, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_purges_durable_copy() {
        let (mut store, storage) = anonymous_store();
        let auth = AuthState::Anonymous;

        store.add_item(&auth, VariantId::new("v1"), 2, snapshot("5")).await;
        store.clear(&auth).await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(store.items().is_empty());
        assert_eq!(storage.get(CART_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hydrate_restores_replica_without_rewriting() {
        let storage = Arc::new(MemoryStore::default());
        let items = vec![line("v1", "p1", 3, "2.50")];
        storage
            .set(CART_KEY, &serde_json::to_string(&items).unwrap())
            .unwrap();

        let mut store = CartStore::new(
            FakeRemote::with_fetch(Vec::new()),
            LocalCartStore::new(Arc::clone(&storage)),
        );
        store.hydrate();

        assert_eq!(store.items(), items.as_slice());
        assert_eq!(store.count(), 3);
        assert_eq!(store.total().amount, "7.50".parse().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_add_applies_echoed_parameters() {
        let storage = Arc::new(MemoryStore::default());
        let fake = FakeRemote::with_fetch(Vec::new());
        // Server clamps the requested 5 down to 3 (stock ceiling)
        *fake.ack_quantity.lock().unwrap() = Some(3);
        let mut store = CartStore::new(fake, LocalCartStore::new(storage));

        store
            .add_item(&authenticated(), VariantId::new("v1"), 5, snapshot("5"))
            .await;

        assert_eq!(store.quantity_of(&VariantId::new("v1")), 3);
        assert!(store.error().is_none());
        assert!(!store.loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_remote_mutation_leaves_items_unchanged() {
        let storage = Arc::new(MemoryStore::default());
        let mut store = CartStore::new(
            FakeRemote::with_fetch(Vec::new()),
            LocalCartStore::new(storage),
        );
        let auth = authenticated();
        let v1 = VariantId::new("v1");

        store.add_item(&auth, v1.clone(), 2, snapshot("5")).await;
        let before = store.items().to_vec();

        *store.remote.fail_mutations.lock().unwrap() = Some("Variant is out of stock".to_string());
        store.update_quantity(&auth, &v1, 9).await;

        assert_eq!(store.items(), before.as_slice());
        assert_eq!(store.error(), Some("Variant is out of stock"));
        assert!(!store.loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_clears_on_next_successful_operation() {
        let storage = Arc::new(MemoryStore::default());
        let mut store = CartStore::new(
            FakeRemote::failing("service down"),
            LocalCartStore::new(storage),
        );
        let auth = authenticated();
        let v1 = VariantId::new("v1");

        store.add_item(&auth, v1.clone(), 1, snapshot("5")).await;
        assert!(store.error().is_some());

        *store.remote.fail_mutations.lock().unwrap() = None;
        store.add_item(&auth, v1, 1, snapshot("5")).await;
        assert!(store.error().is_none());
    }

    #[test]
    fn test_sequence_guard_discards_stale_confirmations() {
        let mut seq = SequenceGuard::default();
        let v1 = VariantId::new("v1");

        let first = seq.issue(&v1);
        let second = seq.issue(&v1);

        // Confirmations arrive out of order: newer settles first
        assert!(seq.try_apply(&v1, second));
        assert!(!seq.try_apply(&v1, first));
    }

    #[test]
    fn test_sequence_guard_is_per_variant() {
        let mut seq = SequenceGuard::default();
        let v1 = VariantId::new("v1");
        let v2 = VariantId::new("v2");

        let t1 = seq.issue(&v1);
        let _ = seq.issue(&v1);
        let t2 = seq.issue(&v2);

        assert!(seq.try_apply(&v2, t2));
        assert!(seq.try_apply(&v1, t1));
    }
}
