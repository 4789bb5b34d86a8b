//! Bounded key/value store with time-based staleness.
//!
//! Values live under [`TaskKey`]s and carry an expiry instant. A stale item
//! is never returned to a caller; it is removed on access. Capacity-driven
//! eviction is delegated to the underlying LRU policy.

use keyproofs_core::{TaskKey, TaskValue};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default capacity of the shared result cache.
pub const DEFAULT_CAPACITY: usize = 4096;

struct CacheItem {
    value: TaskValue,
    expire_at: Instant,
}

impl CacheItem {
    fn stale(&self, now: Instant) -> bool {
        self.expire_at <= now
    }
}

/// Concurrent bounded cache for task results.
///
/// Cheap to clone; all clones share the same store.
#[derive(Clone)]
pub struct TaskCache {
    inner: Arc<Mutex<LruCache<TaskKey, CacheItem>>>,
}

impl TaskCache {
    /// Create a cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY).expect("nonzero"));
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Store `value` under `key`, expiring `ttl` from now. Overwrites any
    /// prior value.
    pub fn add(&self, key: TaskKey, value: TaskValue, ttl: Duration) {
        let item = CacheItem {
            value,
            expire_at: Instant::now() + ttl,
        };
        self.lock().put(key, item);
    }

    /// Fetch a fresh value. A stale hit is evicted and reported as absent.
    pub fn get(&self, key: &TaskKey) -> Option<TaskValue> {
        let now = Instant::now();
        let mut inner = self.lock();

        match inner.get(key) {
            Some(item) if !item.stale(now) => Some(item.value.clone()),
            Some(_) => {
                tracing::trace!(key = %key, "evicting stale cache entry");
                inner.pop(key);
                None
            }
            None => None,
        }
    }

    /// Whether a fresh value exists for `key`.
    pub fn contains(&self, key: &TaskKey) -> bool {
        self.get(key).is_some()
    }

    /// Drop any value stored under `key`.
    pub fn remove(&self, key: &TaskKey) {
        self.lock().pop(key);
    }

    /// Number of entries currently held, stale or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<TaskKey, CacheItem>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Default for TaskCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
