//! Durable mirror of the in-memory cart.
//!
//! Every cart mutation schedules a write here regardless of which
//! authority (local or remote) handled it, so the stored replica always
//! reflects the last known cart: it is the offline fallback and the
//! fast first paint on reload. Rapid mutations are coalesced by a
//! debounce window; only the latest snapshot ever reaches storage.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::storage::StringStore;
use crate::types::CartLineItem;

/// Well-known key holding the serialized cart payload.
pub const CART_KEY: &str = "tidepool.cart";

/// Default quiet window for coalescing rapid saves.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Stored payload encodings. Early deployments wrapped the list in an
/// object; current ones write the bare list. Both must hydrate.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum StoredCart {
    Bare(Vec<CartLineItem>),
    Wrapped { items: Vec<CartLineItem> },
}

/// Debounced persistence adapter for the cart line list.
///
/// The deferred write task is owned by the instance: separate carts
/// (e.g. under test) never share timer state.
pub struct LocalCartStore<S> {
    storage: Arc<S>,
    debounce: Duration,
    pending: Option<JoinHandle<()>>,
    snapshot: Arc<Mutex<Option<Vec<CartLineItem>>>>,
}

impl<S: StringStore> LocalCartStore<S> {
    /// Create an adapter with the default quiet window.
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_debounce(storage, DEFAULT_DEBOUNCE)
    }

    /// Create an adapter with an explicit quiet window.
    #[must_use]
    pub fn with_debounce(storage: Arc<S>, debounce: Duration) -> Self {
        Self {
            storage,
            debounce,
            pending: None,
            snapshot: Arc::new(Mutex::new(None)),
        }
    }

    /// Read the stored cart.
    ///
    /// Missing key, parse failure, and legacy encodings all resolve to a
    /// plain list; this never errors to the caller.
    #[must_use]
    pub fn load(&self) -> Vec<CartLineItem> {
        let raw = match self.storage.get(CART_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(%err, "failed to read stored cart, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str::<StoredCart>(&raw) {
            Ok(StoredCart::Bare(items) | StoredCart::Wrapped { items }) => items,
            Err(err) => {
                warn!(%err, "stored cart payload is corrupt, starting empty");
                Vec::new()
            }
        }
    }

    /// Schedule a debounced write of `items`.
    ///
    /// Calls within the quiet window coalesce into one write carrying
    /// the latest snapshot; a call after the previous timer fired starts
    /// a fresh window. Write failures are logged, never propagated.
    pub fn save(&mut self, items: &[CartLineItem]) {
        *lock(&self.snapshot) = Some(items.to_vec());
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        let storage = Arc::clone(&self.storage);
        let snapshot = Arc::clone(&self.snapshot);
        let debounce = self.debounce;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            write_snapshot(&*storage, &snapshot);
        }));
    }

    /// Remove the durable copy outright.
    ///
    /// Cancels any pending write first so a delayed timer cannot
    /// resurrect cleared data.
    pub fn clear(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        lock(&self.snapshot).take();
        if let Err(err) = self.storage.remove(CART_KEY) {
            warn!(%err, "failed to remove stored cart");
        }
    }

    /// Write any pending snapshot immediately (shutdown hook).
    pub fn flush(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        write_snapshot(&*self.storage, &self.snapshot);
    }
}

fn lock(
    snapshot: &Mutex<Option<Vec<CartLineItem>>>,
) -> std::sync::MutexGuard<'_, Option<Vec<CartLineItem>>> {
    snapshot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn write_snapshot<S: StringStore + ?Sized>(
    storage: &S,
    snapshot: &Mutex<Option<Vec<CartLineItem>>>,
) {
    let Some(items) = lock(snapshot).take() else {
        return;
    };
    match serde_json::to_string(&items) {
        Ok(payload) => {
            if let Err(err) = storage.set(CART_KEY, &payload) {
                warn!(%err, "failed to persist cart");
            }
        }
        Err(err) => warn!(%err, "failed to serialize cart"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::test_support::line;

    fn stored_items(storage: &MemoryStore) -> Option<Vec<CartLineItem>> {
        storage
            .get(CART_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[test]
    fn test_load_missing_key_is_empty() {
        let local = LocalCartStore::new(Arc::new(MemoryStore::default()));
        assert!(local.load().is_empty());
    }

    #[test]
    fn test_load_accepts_bare_list_encoding() {
        let storage = Arc::new(MemoryStore::default());
        let items = vec![line("v1", "p1", 2, "5")];
        storage
            .set(CART_KEY, &serde_json::to_string(&items).unwrap())
            .unwrap();

        let local = LocalCartStore::new(storage);
        assert_eq!(local.load(), items);
    }

    #[test]
    fn test_load_accepts_legacy_wrapped_encoding() {
        let storage = Arc::new(MemoryStore::default());
        let items = vec![line("v1", "p1", 2, "5")];
        let wrapped = format!("{{\"items\":{}}}", serde_json::to_string(&items).unwrap());
        storage.set(CART_KEY, &wrapped).unwrap();

        let local = LocalCartStore::new(storage);
        assert_eq!(local.load(), items);
    }

    #[test]
    fn test_load_corrupt_payload_is_empty() {
        let storage = Arc::new(MemoryStore::default());
        storage.set(CART_KEY, "{not json").unwrap();

        let local = LocalCartStore::new(storage);
        assert!(local.load().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_to_last_snapshot() {
        let storage = Arc::new(MemoryStore::default());
        let mut local = LocalCartStore::new(Arc::clone(&storage));

        local.save(&[line("v1", "p1", 1, "5")]);
        local.save(&[line("v1", "p1", 2, "5")]);
        local.save(&[line("v1", "p1", 3, "5")]);

        // Nothing lands inside the quiet window
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(stored_items(&storage), None);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let items = stored_items(&storage).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().quantity, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_after_settled_window_writes_again() {
        let storage = Arc::new(MemoryStore::default());
        let mut local = LocalCartStore::new(Arc::clone(&storage));

        local.save(&[line("v1", "p1", 1, "5")]);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(stored_items(&storage).unwrap().first().unwrap().quantity, 1);

        local.save(&[line("v1", "p1", 7, "5")]);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(stored_items(&storage).unwrap().first().unwrap().quantity, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_write() {
        let storage = Arc::new(MemoryStore::default());
        let mut local = LocalCartStore::new(Arc::clone(&storage));

        local.save(&[line("v1", "p1", 1, "5")]);
        local.clear();

        // Let the (aborted) timer slot elapse; nothing may resurrect
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(storage.get(CART_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_removes_previously_written_payload() {
        let storage = Arc::new(MemoryStore::default());
        let mut local = LocalCartStore::new(Arc::clone(&storage));

        local.save(&[line("v1", "p1", 1, "5")]);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(stored_items(&storage).is_some());

        local.clear();
        assert_eq!(storage.get(CART_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_pending_snapshot_immediately() {
        let storage = Arc::new(MemoryStore::default());
        let mut local = LocalCartStore::new(Arc::clone(&storage));

        local.save(&[line("v1", "p1", 4, "5")]);
        local.flush();
        assert_eq!(stored_items(&storage).unwrap().first().unwrap().quantity, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_do_not_share_timer_state() {
        let storage_a = Arc::new(MemoryStore::default());
        let storage_b = Arc::new(MemoryStore::default());
        let mut a = LocalCartStore::new(Arc::clone(&storage_a));
        let mut b = LocalCartStore::new(Arc::clone(&storage_b));

        a.save(&[line("v1", "p1", 1, "5")]);
        b.save(&[line("v9", "p9", 9, "5")]);
        a.clear();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(storage_a.get(CART_KEY).unwrap(), None);
        assert_eq!(stored_items(&storage_b).unwrap().first().unwrap().quantity, 9);
    }
}
