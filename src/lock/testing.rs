//! Fault-injecting store used by the lock tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::{CacheStore, MemoryStore};
use crate::error::{CacheError, Result};

#[derive(Debug, Default)]
struct Faults {
    claims: AtomicUsize,
    releases: AtomicUsize,
    expiry_reads: AtomicUsize,
    /// Faulted claims still write, like a timeout after the server applied SET
    claims_land: AtomicBool,
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn timeout() -> CacheError {
    CacheError::Transient("injected timeout".to_string())
}

/// A [`MemoryStore`] that fails a configured number of primitive calls.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    faults: Arc<Faults>,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub(crate) fn fail_next_claims(&self, count: usize) {
        self.faults.claims.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_releases(&self, count: usize) {
        self.faults.releases.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_expiry_reads(&self, count: usize) {
        self.faults.expiry_reads.store(count, Ordering::SeqCst);
    }

    pub(crate) fn faulted_claims_land(&self, land: bool) {
        self.faults.claims_land.store(land, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn claim(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        if take(&self.faults.claims) {
            if self.faults.claims_land.load(Ordering::SeqCst) {
                self.inner.claim(key, value, ttl).await?;
            }
            return Err(timeout());
        }
        self.inner.claim(key, value, ttl).await
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        self.inner.increment(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        if take(&self.faults.releases) {
            return Err(timeout());
        }
        self.inner.compare_and_delete(key, expected).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn remaining_expiry(&self, key: &str) -> Result<Option<Duration>> {
        if take(&self.faults.expiry_reads) {
            return Err(timeout());
        }
        self.inner.remaining_expiry(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn expire_in(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.inner.expire_in(key, ttl).await
    }

    async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> Result<bool> {
        self.inner.expire_at(key, at).await
    }
}
