//! Cache Client
//!
//! Typed facade over a [`CacheStore`]: values are JSON-encoded with serde, and
//! locks come from a [`LockProvider`] sharing the same store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::cache::{CacheStore, MemoryStore, RedisStore};
use crate::config::{Backend, Config};
use crate::error::Result;
use crate::lock::{CancellationSignal, Lease, LockOptions, LockProvider};

// == Cache Client ==
#[derive(Debug, Clone)]
pub struct CacheClient {
    store: Arc<dyn CacheStore>,
    locks: LockProvider,
}

impl CacheClient {
    /// Creates a client over `store` with the given lock options.
    pub fn new(store: Arc<dyn CacheStore>, options: LockOptions) -> Self {
        let locks = LockProvider::new(Arc::clone(&store), options);
        Self { store, locks }
    }

    /// Creates a client over a fresh in-memory store with default lock options.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), LockOptions::default())
    }

    /// Builds the backend named in `config`.
    ///
    /// A Redis backend connects eagerly, so an unreachable server fails here.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn CacheStore> = match config.backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::Redis => Arc::new(RedisStore::connect(&config.redis_url).await?),
        };
        info!("Cache client using {:?} backend", config.backend);
        Ok(Self::new(store, LockOptions::from_config(config)))
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn locks(&self) -> &LockProvider {
        &self.locks
    }

    /// Reads and decodes the value at `key`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encodes and stores `value`; `ttl` of None stores it without expiry.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw, ttl).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.store.exists(key).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key).await
    }

    pub async fn expire_in(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.store.expire_in(key, ttl).await
    }

    pub async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> Result<bool> {
        self.store.expire_at(key, at).await
    }

    // == Batch Operations ==
    /// Counts how many of `keys` are live.
    pub async fn exists_many(&self, keys: &[&str]) -> Result<u64> {
        self.store.exists_many(keys).await
    }

    /// Reads and decodes every key, in order. Missing keys come back as None.
    pub async fn get_many<T: DeserializeOwned>(&self, keys: &[&str]) -> Result<Vec<Option<T>>> {
        let raws = self.store.get_many(keys).await?;
        let mut values = Vec::with_capacity(raws.len());
        for raw in raws {
            values.push(match raw {
                Some(raw) => Some(serde_json::from_str(&raw)?),
                None => None,
            });
        }
        Ok(values)
    }

    /// Encodes and stores every pair with the same `ttl`.
    pub async fn set_many<T: Serialize>(
        &self,
        entries: &[(&str, T)],
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            encoded.push((*key, serde_json::to_string(value)?));
        }
        let pairs: Vec<(&str, &str)> = encoded
            .iter()
            .map(|(key, raw)| (*key, raw.as_str()))
            .collect();
        self.store.set_many(&pairs, ttl).await
    }

    /// Removes every key; returns how many were live.
    pub async fn remove_many(&self, keys: &[&str]) -> Result<u64> {
        self.store.remove_many(keys).await
    }

    /// Acquires the lock on `resource`; see [`LockProvider::acquire`].
    pub async fn acquire_lock(&self, resource: &str, cancel: &CancellationSignal) -> Result<Lease> {
        self.locks.acquire(resource, cancel).await
    }
}
