//! Cache Module
//!
//! The store contract shared by every backend, plus the in-memory and Redis
//! implementations of it.
//!
//! The lock protocol only relies on [`CacheStore::claim`],
//! [`CacheStore::compare_and_delete`] and [`CacheStore::remaining_expiry`];
//! every primitive used for a mutual-exclusion decision must be atomic.

mod entry;
mod memory;
mod redis_store;
mod stats;


use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

// Re-export public types
pub use entry::CacheEntry;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use stats::CacheStats;

// == Cache Store ==
/// Capability interface over a key-value store with per-key expiry.
#[async_trait]
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Sets `key` to `value` with expiry `ttl` only if the key is absent.
    ///
    /// Returns whether the write happened.
    async fn claim(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Increments the integer stored at `key`, treating absent as 0, and
    /// returns the new value. An existing expiry is kept.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Deletes `key` only if its current value equals `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;

    /// Deletes `key` regardless of value. Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remaining time to live of `key`; None when absent or persistent.
    async fn remaining_expiry(&self, key: &str) -> Result<Option<Duration>>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Upserts `key`. A `None` ttl stores the value without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Removes `key`, ignoring whether it was present.
    async fn remove(&self, key: &str) -> Result<()> {
        self.delete(key).await.map(|_| ())
    }

    /// Sets a relative expiry on a live key. Returns false if the key is absent.
    async fn expire_in(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Sets an absolute expiry on a live key. Returns false if the key is absent.
    async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> Result<bool>;

    // == Batch Operations ==
    // Defaults issue one call per key; backends override them with a single
    // round trip where they can.

    /// Counts the live keys among `keys`. A key listed twice counts twice.
    async fn exists_many(&self, keys: &[&str]) -> Result<u64> {
        let mut count = 0;
        for key in keys {
            if self.exists(key).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Reads every key, in order.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    /// Upserts every pair with the same `ttl`.
    async fn set_many(&self, entries: &[(&str, &str)], ttl: Option<Duration>) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value, ttl).await?;
        }
        Ok(())
    }

    /// Deletes every key. Returns how many live keys were removed.
    async fn remove_many(&self, keys: &[&str]) -> Result<u64> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
