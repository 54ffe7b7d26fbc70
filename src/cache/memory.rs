//! In-Memory Store Module
//!
//! HashMap storage with lazy and swept TTL expiration, shared behind a tokio
//! RwLock. Each primitive runs under a single write guard, which is what makes
//! `claim`, `increment` and `compare_and_delete` atomic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, CacheStats, CacheStore};
use crate::error::{CacheError, Result};

// == Memory Map ==
/// Entries plus statistics, guarded together.
#[derive(Debug, Default)]
struct MemoryMap {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

impl MemoryMap {
    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        if self.entries.get(key).is_some_and(CacheEntry::is_expired) {
            self.entries.remove(key);
            self.stats.record_expired(1);
        }
        self.entries.get_mut(key)
    }

    fn live(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key).filter(|entry| !entry.is_expired())
    }

    fn sync_len(&mut self) {
        let len = self.entries.len();
        self.stats.set_total_entries(len);
    }
}

// == Memory Store ==
/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryMap>>,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Stats ==
    /// Returns current store statistics.
    pub async fn stats(&self) -> CacheStats {
        let map = self.inner.read().await;
        let mut stats = map.stats.clone();
        stats.set_total_entries(map.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut map = self.inner.write().await;
        let now = Utc::now();
        let before = map.entries.len();
        map.entries.retain(|_, entry| !entry.is_expired_at(now));
        let count = before - map.entries.len();

        map.stats.record_expired(count);
        map.sync_len();
        count
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn claim(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut map = self.inner.write().await;
        if map.live_mut(key).is_some() {
            return Ok(false);
        }

        map.entries
            .insert(key.to_string(), CacheEntry::new(value.to_string(), Some(ttl)));
        map.sync_len();
        Ok(true)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut map = self.inner.write().await;
        let next = match map.live_mut(key) {
            Some(entry) => {
                let current: i64 = entry.value.parse().map_err(|_| {
                    CacheError::InvalidRequest(format!("Value at {} is not an integer", key))
                })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    CacheError::InvalidRequest(format!("Increment of {} would overflow", key))
                })?;
                entry.value = next.to_string();
                next
            }
            None => {
                map.entries
                    .insert(key.to_string(), CacheEntry::new("1".to_string(), None));
                1
            }
        };

        map.sync_len();
        Ok(next)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut map = self.inner.write().await;
        let matches = map.live_mut(key).is_some_and(|entry| entry.value == expected);
        if matches {
            map.entries.remove(key);
        }

        map.sync_len();
        Ok(matches)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut map = self.inner.write().await;
        let removed = map.live_mut(key).is_some() && map.entries.remove(key).is_some();

        map.sync_len();
        Ok(removed)
    }

    async fn remaining_expiry(&self, key: &str) -> Result<Option<Duration>> {
        let map = self.inner.read().await;
        Ok(map.live(key).and_then(CacheEntry::ttl_remaining))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        // Write guard: a read may purge an expired entry and always updates stats
        let mut map = self.inner.write().await;
        let value = map.live_mut(key).map(|entry| entry.value.clone());
        match value {
            Some(_) => map.stats.record_hit(),
            None => map.stats.record_miss(),
        }

        map.sync_len();
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut map = self.inner.write().await;
        map.entries
            .insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));

        map.sync_len();
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.inner.read().await.live(key).is_some())
    }

    async fn expire_in(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut map = self.inner.write().await;
        Ok(map
            .live_mut(key)
            .map(|entry| entry.expire_in(ttl))
            .is_some())
    }

    async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut map = self.inner.write().await;
        Ok(map
            .live_mut(key)
            .map(|entry| entry.expire_at(at))
            .is_some())
    }

    async fn exists_many(&self, keys: &[&str]) -> Result<u64> {
        let map = self.inner.read().await;
        Ok(keys.iter().filter(|key| map.live(key).is_some()).count() as u64)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let mut map = self.inner.write().await;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = map.live_mut(key).map(|entry| entry.value.clone());
            match value {
                Some(_) => map.stats.record_hit(),
                None => map.stats.record_miss(),
            }
            values.push(value);
        }

        map.sync_len();
        Ok(values)
    }

    async fn set_many(&self, entries: &[(&str, &str)], ttl: Option<Duration>) -> Result<()> {
        let mut map = self.inner.write().await;
        for (key, value) in entries {
            map.entries
                .insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        }

        map.sync_len();
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<u64> {
        let mut map = self.inner.write().await;
        let mut removed = 0;
        for key in keys {
            if map.live_mut(key).is_some() && map.entries.remove(*key).is_some() {
                removed += 1;
            }
        }

        map.sync_len();
        Ok(removed)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_store_new() {
        let store = MemoryStore::new();
        assert_eq!(store.len().await, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = MemoryStore::new();

        store.set("key1", "value1", None).await.unwrap();
        assert_eq!(store.get("key1").await.unwrap().as_deref(), Some("value1"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_get_nonexistent() {
        let store = MemoryStore::new();
        assert!(store.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_delete() {
        let store = MemoryStore::new();

        store.set("key1", "value1", None).await.unwrap();
        assert!(store.delete("key1").await.unwrap());
        assert!(!store.delete("key1").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_overwrite_clears_ttl() {
        let store = MemoryStore::new();

        store.set("key1", "value1", Some(LONG)).await.unwrap();
        store.set("key1", "value2", None).await.unwrap();

        assert_eq!(store.get("key1").await.unwrap().as_deref(), Some("value2"));
        assert!(store.remaining_expiry("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_ttl_expiration() {
        let store = MemoryStore::new();

        store
            .set("key1", "value1", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(store.exists("key1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!store.exists("key1").await.unwrap());
        assert!(store.get("key1").await.unwrap().is_none());
        assert_eq!(store.stats().await.expired, 1);
    }

    #[tokio::test]
    async fn test_claim_only_when_absent() {
        let store = MemoryStore::new();

        assert!(store.claim("lock", "a", LONG).await.unwrap());
        assert!(!store.claim("lock", "b", LONG).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_claim_succeeds_over_expired_entry() {
        let store = MemoryStore::new();

        assert!(store.claim("lock", "a", Duration::from_millis(30)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.claim("lock", "b", LONG).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_increment_from_absent() {
        let store = MemoryStore::new();

        assert_eq!(store.increment("counter").await.unwrap(), 1);
        assert_eq!(store.increment("counter").await.unwrap(), 2);
        assert_eq!(store.get("counter").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_increment_keeps_expiry() {
        let store = MemoryStore::new();

        store.set("counter", "41", Some(LONG)).await.unwrap();
        assert_eq!(store.increment("counter").await.unwrap(), 42);
        assert!(store.remaining_expiry("counter").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_increment_rejects_non_integer() {
        let store = MemoryStore::new();

        store.set("text", "hello", None).await.unwrap();
        let result = store.increment("text").await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_compare_and_delete() {
        let store = MemoryStore::new();

        store.claim("lock", "owner", LONG).await.unwrap();
        assert!(!store.compare_and_delete("lock", "intruder").await.unwrap());
        assert!(store.exists("lock").await.unwrap());

        assert!(store.compare_and_delete("lock", "owner").await.unwrap());
        assert!(!store.exists("lock").await.unwrap());
        assert!(!store.compare_and_delete("lock", "owner").await.unwrap());
    }

    #[tokio::test]
    async fn test_remaining_expiry() {
        let store = MemoryStore::new();

        store.claim("lock", "owner", LONG).await.unwrap();
        store.set("plain", "v", None).await.unwrap();

        let remaining = store.remaining_expiry("lock").await.unwrap().unwrap();
        assert!(remaining <= LONG && remaining > Duration::from_secs(59));
        assert!(store.remaining_expiry("plain").await.unwrap().is_none());
        assert!(store.remaining_expiry("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expire_in_and_at() {
        let store = MemoryStore::new();

        assert!(!store.expire_in("missing", LONG).await.unwrap());

        store.set("key1", "v", None).await.unwrap();
        assert!(store.expire_in("key1", LONG).await.unwrap());
        assert!(store.remaining_expiry("key1").await.unwrap().is_some());

        let past = Utc::now() - chrono::Duration::seconds(1);
        assert!(store.expire_at("key1", past).await.unwrap());
        assert!(!store.exists("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_stats() {
        let store = MemoryStore::new();

        store.set("key1", "value1", None).await.unwrap();
        store.get("key1").await.unwrap();
        store.get("nonexistent").await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[tokio::test]
    async fn test_store_cleanup_expired() {
        let store = MemoryStore::new();

        store
            .set("key1", "value1", Some(Duration::from_millis(30)))
            .await
            .unwrap();
        store.set("key2", "value2", Some(LONG)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.exists("key2").await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_set_and_get() {
        let store = MemoryStore::new();

        store
            .set_many(&[("a", "1"), ("b", "2")], Some(LONG))
            .await
            .unwrap();

        let values = store.get_many(&["a", "missing", "b"]).await.unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("2".to_string())]
        );
        assert!(store.remaining_expiry("b").await.unwrap().is_some());

        let stats = store.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 2);
    }

    #[tokio::test]
    async fn test_batch_exists_and_remove() {
        let store = MemoryStore::new();
        store.set_many(&[("a", "1"), ("b", "2"), ("c", "3")], None).await.unwrap();
        store
            .set("gone", "v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.exists_many(&["a", "a", "gone", "missing"]).await.unwrap(), 2);
        assert_eq!(store.remove_many(&["a", "b", "gone", "missing"]).await.unwrap(), 2);
        assert_eq!(store.exists_many(&["a", "b", "c"]).await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_batch_with_no_keys() {
        let store = MemoryStore::new();

        assert_eq!(store.exists_many(&[]).await.unwrap(), 0);
        assert!(store.get_many(&[]).await.unwrap().is_empty());
        store.set_many(&[], None).await.unwrap();
        assert_eq!(store.remove_many(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.set("shared", "v", None).await.unwrap();
        assert!(other.exists("shared").await.unwrap());

        let isolated = MemoryStore::new();
        assert!(!isolated.exists("shared").await.unwrap());
    }
}
