//! TTL-based cache for upstream responses.
//!
//! Provides a thread-safe cache with automatic expiration to prevent unbounded
//! memory growth in long-running server processes. Expired entries are
//! dropped lazily when looked up and in bulk by a periodic sweep.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default lifetime of a cached upstream response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A thread-safe cache with time-to-live expiration.
///
/// An entry is valid while `now - inserted_at < ttl`.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, TtlEntry<V>>>,
    ttl: Duration,
}

struct TtlEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> TtlEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() < ttl
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the specified TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Insert a value, replacing any existing entry and resetting the TTL.
    pub async fn insert(&self, key: K, value: V) {
        let entry = TtlEntry {
            value,
            inserted_at: Instant::now(),
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Insert a value with an explicit timestamp (tests only).
    #[cfg(test)]
    pub async fn insert_at(&self, key: K, value: V, inserted_at: Instant) {
        let entry = TtlEntry { value, inserted_at };
        self.entries.write().await.insert(key, entry);
    }

    /// Get a value if it exists and hasn't expired.
    ///
    /// An expired entry found here is removed.
    pub async fn get(&self, key: &K) -> Option<V> {
        {
            let guard = self.entries.read().await;
            match guard.get(key) {
                None => return None,
                Some(entry) if entry.is_fresh(self.ttl) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut guard = self.entries.write().await;
        // Another writer may have refreshed the entry in between.
        if let Some(entry) = guard.get(key) {
            if entry.is_fresh(self.ttl) {
                return Some(entry.value.clone());
            }
            guard.remove(key);
        }
        None
    }

    /// Remove all expired entries and return the count of removed entries.
    pub async fn cleanup_expired(&self) -> usize {
        let mut guard = self.entries.write().await;
        let before_count = guard.len();
        guard.retain(|_, entry| entry.is_fresh(self.ttl));
        before_count - guard.len()
    }

    /// Get the current number of entries (including expired ones not yet cleaned).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Run `cleanup_expired` every `interval` until the returned task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.cleanup_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_get() {
        let cache: TtlCache<String, i32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("key".to_string(), 42).await;
        assert_eq!(cache.get(&"key".to_string()).await, Some(42));
    }

    #[tokio::test]
    async fn get_returns_none_for_missing() {
        let cache: TtlCache<String, i32> = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get(&"missing".to_string()).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_purged_on_lookup() {
        let ttl = Duration::from_secs(300);
        let cache: TtlCache<String, i32> = TtlCache::new(ttl);
        cache.insert("key".to_string(), 42).await;

        tokio::time::advance(ttl).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&"key".to_string()).await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_fresh_just_before_ttl() {
        let ttl = Duration::from_secs(300);
        let cache: TtlCache<String, i32> = TtlCache::new(ttl);
        cache.insert("key".to_string(), 42).await;

        tokio::time::advance(ttl - Duration::from_millis(1)).await;

        assert_eq!(cache.get(&"key".to_string()).await, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_removes_expired() {
        let ttl = Duration::from_millis(10);
        let cache: TtlCache<String, i32> = TtlCache::new(ttl);
        cache.insert("key1".to_string(), 1).await;
        cache.insert("key2".to_string(), 2).await;
        tokio::time::advance(ttl + Duration::from_millis(1)).await;
        cache.insert("key3".to_string(), 3).await;

        let removed = cache.cleanup_expired().await;
        assert_eq!(removed, 2);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&"key3".to_string()).await, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_resets_ttl() {
        let ttl = Duration::from_secs(10);
        let cache: TtlCache<String, i32> = TtlCache::new(ttl);
        cache.insert("key".to_string(), 1).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.insert("key".to_string(), 2).await;
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get(&"key".to_string()).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_entries_periodically() {
        let ttl = Duration::from_secs(60);
        let cache: Arc<TtlCache<String, i32>> = Arc::new(TtlCache::new(ttl));
        let old = Instant::now();
        cache.insert_at("stale".to_string(), 1, old).await;

        let sweeper = cache.spawn_sweeper(ttl);

        // Past the first sweep; the entry is now older than the TTL.
        tokio::time::sleep(ttl + Duration::from_secs(1)).await;
        assert_eq!(cache.len().await, 0);

        sweeper.abort();
    }
}
