use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Concurrency-safe key→value store with a fixed time-to-live per instance.
///
/// Entries are replaced wholesale on `put`, never mutated in place, and are
/// lazily evicted: expiry is checked on read, there is no background sweep.
/// A `get` of an absent or expired key is a miss — callers always treat a
/// miss as "must refresh".
#[derive(Clone)]
pub struct Cache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    ttl: Duration,
    inner: Arc<Mutex<HashMap<K, Entry<V>>>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + std::fmt::Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry expired for key: {:?}", key);
                cache.remove(key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    pub async fn put(&self, key: K, value: V) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_put_roundtrip() {
        let cache = Cache::<String, i32>::new(Duration::from_secs(60));

        assert!(cache.get(&"key1".to_string()).await.is_none());

        cache.put("key1".to_string(), 123).await;
        assert_eq!(cache.get(&"key1".to_string()).await, Some(123));

        assert!(cache.get(&"key2".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn put_replaces_existing_entry() {
        let cache = Cache::<String, i32>::new(Duration::from_secs(60));

        cache.put("key".to_string(), 1).await;
        cache.put("key".to_string(), 2).await;
        assert_eq!(cache.get(&"key".to_string()).await, Some(2));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = Cache::<String, i32>::new(Duration::from_millis(30));

        cache.put("key".to_string(), 7).await;
        assert_eq!(cache.get(&"key".to_string()).await, Some(7));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get(&"key".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn refresh_after_expiry_restarts_ttl() {
        let cache = Cache::<String, i32>::new(Duration::from_millis(40));

        cache.put("key".to_string(), 1).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get(&"key".to_string()).await.is_none());

        cache.put("key".to_string(), 2).await;
        assert_eq!(cache.get(&"key".to_string()).await, Some(2));
    }

    #[tokio::test]
    async fn concurrent_access_from_many_tasks() {
        let cache = Cache::<String, u64>::new(Duration::from_secs(60));

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.put(format!("key{i}"), i).await;
                cache.get(&format!("key{i}")).await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(i as u64));
        }
    }
}
