use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// In-memory TTL cache for upstream responses.
///
/// Entries expire lazily: a `get` that observes a stale entry removes it
/// and reports a miss. There is no background sweeper and no capacity
/// bound, so key cardinality is expected to stay small (one key per
/// upstream endpoint + symbol + expiration).
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let mut map = self.entries.lock().await;
        match map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store with the cache-wide TTL, overwriting any existing entry.
    pub async fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.ttl).await;
    }

    pub async fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let mut map = self.entries.lock().await;
        map.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}
