//! Lease Handle
//!
//! A held lock on one resource. Releasing is token-checked: the key is only
//! deleted while it still holds this lease's holder token.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::error::{CacheError, Result};

// == Holder Token ==
/// Random 128-bit identity of one acquisition, stored as the lock key's value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HolderToken(String);

impl HolderToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HolderToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HolderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compare-and-delete with a single retry on a transient fault.
///
/// Returns whether the claim was still ours and is now gone.
pub(crate) async fn clear_claim(
    store: &dyn CacheStore,
    key: &str,
    token: &HolderToken,
) -> Result<bool> {
    match store.compare_and_delete(key, token.as_str()).await {
        Err(err) if err.is_transient() => {
            warn!("Release of {} hit a transient fault, retrying once: {}", key, err);
            store.compare_and_delete(key, token.as_str()).await
        }
        outcome => outcome,
    }
}

// == Lease ==
/// A held lock. Active until released, disposed, or dropped.
///
/// Dropping an active lease spawns a best-effort release on the current tokio
/// runtime; call [`release`](Self::release) to observe the outcome.
#[derive(Debug)]
pub struct Lease {
    key: String,
    token: HolderToken,
    store: Arc<dyn CacheStore>,
    released: bool,
    disposed: bool,
}

impl Lease {
    pub(crate) fn new(key: String, token: HolderToken, store: Arc<dyn CacheStore>) -> Self {
        Self {
            key,
            token,
            store,
            released: false,
            disposed: false,
        }
    }

    /// The lock key held in the store.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &HolderToken {
        &self.token
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    // == Release ==
    /// Releases the lease. Calling it again after success is a no-op.
    ///
    /// # Errors
    /// - [`CacheError::OwnershipViolation`] if the key expired and is gone or
    ///   held by another holder. The lease is marked released regardless.
    /// - A transient store error if the retried compare-and-delete also fails.
    ///   The lease stays active and the key is left to expire.
    pub async fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }

        let deleted = clear_claim(self.store.as_ref(), &self.key, &self.token).await?;
        self.released = true;

        if !deleted {
            warn!("Lease on {} was lost before release", self.key);
            return Err(CacheError::OwnershipViolation {
                key: self.key.clone(),
            });
        }

        info!("Released lock {}", self.key);
        Ok(())
    }

    // == Dispose ==
    /// Strict disposal: releases on the first call, fails on every later one.
    ///
    /// A first call that ends in [`CacheError::OwnershipViolation`] still
    /// counts as the disposal. Only a transient failure leaves the lease
    /// disposable again.
    ///
    /// # Errors
    /// [`CacheError::AlreadyDisposed`] on a second call, plus anything
    /// [`release`](Self::release) returns.
    pub async fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Err(CacheError::AlreadyDisposed(self.key.clone()));
        }

        let result = self.release().await;
        if self.released {
            self.disposed = true;
        }
        result
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Lease on {} dropped outside a runtime, leaving it to expire", self.key);
            return;
        };

        let store = Arc::clone(&self.store);
        let key = std::mem::take(&mut self.key);
        let token = self.token.clone();
        runtime.spawn(async move {
            match clear_claim(store.as_ref(), &key, &token).await {
                Ok(true) => debug!("Released dropped lease on {}", key),
                Ok(false) => warn!("Dropped lease on {} was already lost", key),
                Err(err) => warn!("Failed to release dropped lease on {}: {}", key, err),
            }
        });
    }
}
