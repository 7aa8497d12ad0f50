//! Client-side query cache.
//!
//! Holds query results by [`CacheKey`] together with a stale flag and the
//! number of views currently observing the key. Invalidation only marks
//! entries stale; a refetch is requested when someone is looking.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::keys::CacheKey;

/// Anything the invalidation router can drive.
///
/// Implementations must only mark data stale; they must not fetch or write
/// query results themselves.
pub trait InvalidationTarget: Send + Sync {
    /// Marks one key stale.
    fn invalidate(&self, key: &CacheKey);

    /// Marks every key stale.
    fn invalidate_all(&self);
}

/// Outcome of invalidating a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// Nothing is cached under the key.
    Unknown,
    /// The key was already stale; nothing changed.
    AlreadyStale,
    /// The key is now stale.
    Stale {
        /// Whether a refetch was requested because the key is observed.
        refetch: bool,
    },
}

/// Snapshot of a cached query.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
    /// Last fetched value, if any.
    pub value: Option<Value>,
    /// Whether the value is stale.
    pub stale: bool,
    /// Number of views observing the key.
    pub observers: usize,
}

#[derive(Debug, Default)]
struct Entry {
    value: Option<Value>,
    stale: bool,
    observers: usize,
}

/// In-memory query cache.
#[derive(Debug)]
pub struct QueryCache {
    entries: Arc<DashMap<CacheKey, Entry>>,
    refetch_tx: mpsc::UnboundedSender<CacheKey>,
}

impl QueryCache {
    /// Creates an empty cache and the receiver of its refetch requests.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CacheKey>) {
        let (refetch_tx, refetch_rx) = mpsc::unbounded_channel();
        let cache = Self {
            entries: Arc::new(DashMap::new()),
            refetch_tx,
        };
        (cache, refetch_rx)
    }

    /// Records a freshly fetched value.
    pub fn store(&self, key: CacheKey, value: Value) {
        let mut entry = self.entries.entry(key).or_default();
        entry.value = Some(value);
        entry.stale = false;
    }

    /// Registers a view observing `key`. The observation ends when the
    /// returned guard is dropped.
    #[must_use]
    pub fn observe(&self, key: CacheKey) -> QueryObserver {
        self.entries.entry(key.clone()).or_default().observers += 1;
        QueryObserver {
            entries: Arc::clone(&self.entries),
            key,
        }
    }

    /// Returns a snapshot of the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedQuery> {
        self.entries.get(key).map(|entry| CachedQuery {
            value: entry.value.clone(),
            stale: entry.stale,
            observers: entry.observers,
        })
    }

    /// Returns true if `key` is cached and stale.
    #[must_use]
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.stale)
    }

    /// Returns the number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks `key` stale, requesting a refetch if it is observed.
    ///
    /// Idempotent: a key that is already stale is left alone and no second
    /// refetch is requested.
    pub fn mark_stale(&self, key: &CacheKey) -> Invalidation {
        let refetch = {
            let Some(mut entry) = self.entries.get_mut(key) else {
                return Invalidation::Unknown;
            };
            if entry.stale {
                return Invalidation::AlreadyStale;
            }
            entry.stale = true;
            entry.observers > 0
        };

        if refetch {
            debug!(key = %key, "requesting refetch");
            // The receiver going away only means nobody refetches any more.
            let _ = self.refetch_tx.send(key.clone());
        }

        Invalidation::Stale { refetch }
    }

    /// Marks every cached key stale. Returns how many keys changed.
    pub fn mark_all_stale(&self) -> usize {
        let keys: Vec<CacheKey> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.iter()
            .filter(|key| matches!(self.mark_stale(key), Invalidation::Stale { .. }))
            .count()
    }
}

impl InvalidationTarget for QueryCache {
    fn invalidate(&self, key: &CacheKey) {
        self.mark_stale(key);
    }

    fn invalidate_all(&self) {
        let changed = self.mark_all_stale();
        debug!(changed, "invalidated all cached queries");
    }
}

/// Guard for a view observing a cache key.
#[derive(Debug)]
pub struct QueryObserver {
    entries: Arc<DashMap<CacheKey, Entry>>,
    key: CacheKey,
}

impl QueryObserver {
    /// Returns the observed key.
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        if let Some(mut entry) = self.entries.get_mut(&self.key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
        self.entries
            .remove_if(&self.key, |_, entry| entry.observers == 0 && entry.value.is_none());
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_store_and_get() {
        let (cache, _refetch) = QueryCache::new();
        cache.store(CacheKey::Refunds, json!([{"id": "R1"}]));

        let entry = cache.get(&CacheKey::Refunds).expect("entry");
        assert_eq!(entry.value, Some(json!([{"id": "R1"}])));
        assert!(!entry.stale);
        assert_eq!(entry.observers, 0);
    }

    #[test]
    fn test_invalidate_unknown_key() {
        let (cache, _refetch) = QueryCache::new();
        assert_eq!(cache.mark_stale(&CacheKey::Analytics), Invalidation::Unknown);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_unobserved_key_does_not_refetch() {
        let (cache, mut refetch) = QueryCache::new();
        cache.store(CacheKey::Refunds, json!([]));

        assert_eq!(
            cache.mark_stale(&CacheKey::Refunds),
            Invalidation::Stale { refetch: false }
        );
        assert!(cache.is_stale(&CacheKey::Refunds));
        assert!(refetch.try_recv().is_err());
    }

    #[test]
    fn test_invalidate_observed_key_requests_refetch_once() {
        let (cache, mut refetch) = QueryCache::new();
        cache.store(CacheKey::NotificationCount, json!(3));
        let _observer = cache.observe(CacheKey::NotificationCount);

        assert_eq!(
            cache.mark_stale(&CacheKey::NotificationCount),
            Invalidation::Stale { refetch: true }
        );
        assert_eq!(
            cache.mark_stale(&CacheKey::NotificationCount),
            Invalidation::AlreadyStale
        );

        assert_eq!(refetch.try_recv().ok(), Some(CacheKey::NotificationCount));
        assert!(refetch.try_recv().is_err());
    }

    #[test]
    fn test_store_clears_stale_flag() {
        let (cache, _refetch) = QueryCache::new();
        cache.store(CacheKey::refund("R1"), json!({"status": "PENDING"}));
        cache.mark_stale(&CacheKey::refund("R1"));
        cache.store(CacheKey::refund("R1"), json!({"status": "PAID"}));

        assert!(!cache.is_stale(&CacheKey::refund("R1")));
    }

    #[test]
    fn test_observer_drop_releases_empty_entry() {
        let (cache, _refetch) = QueryCache::new();
        let observer = cache.observe(CacheKey::Analytics);
        assert_eq!(observer.key(), &CacheKey::Analytics);
        assert_eq!(cache.len(), 1);

        drop(observer);
        assert!(cache.get(&CacheKey::Analytics).is_none());
    }

    #[test]
    fn test_observer_drop_keeps_cached_value() {
        let (cache, _refetch) = QueryCache::new();
        cache.store(CacheKey::Refunds, json!([]));
        let observer = cache.observe(CacheKey::Refunds);
        drop(observer);

        let entry = cache.get(&CacheKey::Refunds).expect("entry");
        assert_eq!(entry.observers, 0);
        assert!(entry.value.is_some());
    }

    #[test]
    fn test_mark_all_stale() {
        let (cache, _refetch) = QueryCache::new();
        cache.store(CacheKey::Refunds, json!([]));
        cache.store(CacheKey::StaffTabCounts, json!({}));
        cache.mark_stale(&CacheKey::Refunds);

        assert_eq!(cache.mark_all_stale(), 1);
        assert!(cache.is_stale(&CacheKey::Refunds));
        assert!(cache.is_stale(&CacheKey::StaffTabCounts));
    }
}
