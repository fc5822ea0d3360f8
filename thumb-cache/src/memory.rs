use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thumb_core::CasResult;

use crate::{CacheEntry, ExpirableCache};

/// In-memory expirable cache.
///
/// Every operation takes effect atomically when it is polled, so an
/// `invalidate` issued after a `put` always wins.
pub struct MemoryCache<K, V> {
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for MemoryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

#[async_trait]
impl<K, V> ExpirableCache for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;
    type Hit = V;

    async fn get_if_present(&self, key: &K) -> CasResult<Option<V>> {
        let now = Utc::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired_at(now) => {
                    return Ok(Some(entry.value().clone()))
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: K, value: V, expires_at: Option<DateTime<Utc>>) -> CasResult<()> {
        self.entries
            .write()
            .insert(key, CacheEntry::new(value, expires_at));
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> CasResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn invalidate_all(&self, keys: &[K]) -> CasResult<()> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn clean_up(&self) -> CasResult<usize> {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn expired_entries_are_absent() {
        let cache = MemoryCache::new();
        cache
            .put("k", 1, Some(Utc::now() - Duration::seconds(1)))
            .await
            .unwrap();

        assert_eq!(cache.get_if_present(&"k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn entries_without_expiry_persist() {
        let cache = MemoryCache::new();
        cache.put("k", 1, None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(cache.get_if_present(&"k").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn clean_up_counts_removed_entries() {
        let cache = MemoryCache::new();
        let past = Some(Utc::now() - Duration::seconds(5));
        cache.put("a", 1, past).await.unwrap();
        cache.put("b", 2, past).await.unwrap();
        cache.put("c", 3, None).await.unwrap();
        cache
            .put_with_ttl("d", 4, std::time::Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.clean_up().await.unwrap(), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.clean_up().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalidate_all_drops_each_key() {
        let cache = MemoryCache::new();
        cache.put("a", 1, None).await.unwrap();
        cache.put("b", 2, None).await.unwrap();
        cache.put("c", 3, None).await.unwrap();

        cache.invalidate_all(&["a", "b"]).await.unwrap();
        assert_eq!(cache.get_if_present(&"a").await.unwrap(), None);
        assert_eq!(cache.get_if_present(&"c").await.unwrap(), Some(3));
    }
}
