//! Lock Acquirer
//!
//! Turns the store's atomic claim into a mutual-exclusion lease by polling.
//!
//! Each `acquire` call mints one holder token and loops:
//! claim the key with that token, and on contention sleep for the key's
//! remaining TTL (or the fixed retry delay) while racing the cancellation
//! signal. There is no queueing; contenders race on every retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::lock::{CancellationSignal, HolderToken, Lease};

/// Lower bound on a poll sleep, so a key about to expire is not busy-polled.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// == Lock Options ==
#[derive(Debug, Clone)]
pub struct LockOptions {
    /// Expiry written with every claim
    pub ttl: Duration,
    /// Poll delay when the holder's remaining TTL cannot be read
    pub retry_delay: Duration,
    /// Namespace prepended to resource names
    pub key_prefix: String,
    /// Upper bound on one poll sleep; None waits out the holder's full TTL
    pub max_poll: Option<Duration>,
}

impl LockOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl: config.lock_ttl(),
            retry_delay: config.lock_retry_delay(),
            key_prefix: config.lock_key_prefix.clone(),
            max_poll: config.lock_max_poll(),
        }
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// == Lock Provider ==
/// Hands out [`Lease`]s on named resources over any [`CacheStore`].
#[derive(Debug, Clone)]
pub struct LockProvider {
    store: Arc<dyn CacheStore>,
    options: LockOptions,
}

impl LockProvider {
    pub fn new(store: Arc<dyn CacheStore>, options: LockOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// The store key guarding `resource`.
    pub fn lock_key(&self, resource: &str) -> String {
        format!("{}{}", self.options.key_prefix, resource)
    }

    // == Try Acquire ==
    /// Makes a single claim attempt. Returns None if the resource is held.
    pub async fn try_acquire(&self, resource: &str) -> Result<Option<Lease>> {
        let key = self.validated_key(resource)?;
        let token = HolderToken::new();

        if self.store.claim(&key, token.as_str(), self.options.ttl).await? {
            info!("Acquired lock {}", key);
            return Ok(Some(Lease::new(key, token, Arc::clone(&self.store))));
        }
        Ok(None)
    }

    // == Acquire ==
    /// Suspends until the lease on `resource` is obtained.
    ///
    /// Store faults are logged and retried after the fixed retry delay; only
    /// the cancellation signal bounds the wait, so production callers should
    /// pass a signal that eventually fires.
    ///
    /// # Errors
    /// - [`CacheError::Cancelled`] once `cancel` fires before a claim succeeds
    /// - [`CacheError::InvalidRequest`] for an empty resource name
    pub async fn acquire(&self, resource: &str, cancel: &CancellationSignal) -> Result<Lease> {
        let key = self.validated_key(resource)?;
        let token = HolderToken::new();
        // Set once a claim faulted: that write may have landed anyway
        let mut ambiguous = false;

        loop {
            if cancel.is_cancelled() {
                return Err(self.abandon(&key, &token, ambiguous).await);
            }

            let delay = match self.store.claim(&key, token.as_str(), self.options.ttl).await {
                Ok(true) => {
                    info!("Acquired lock {}", key);
                    return Ok(Lease::new(key, token, Arc::clone(&self.store)));
                }
                Ok(false) => {
                    if ambiguous && self.holds(&key, &token).await {
                        info!("Acquired lock {} through an earlier faulted claim", key);
                        return Ok(Lease::new(key, token, Arc::clone(&self.store)));
                    }
                    self.backoff(&key).await
                }
                Err(err) => {
                    warn!("Claim on {} failed, will retry: {}", key, err);
                    ambiguous = true;
                    self.options.retry_delay
                }
            };

            debug!("Lock {} is held, waiting {:?}", key, delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Err(self.abandon(&key, &token, ambiguous).await);
                }
            }
        }
    }

    fn validated_key(&self, resource: &str) -> Result<String> {
        if resource.is_empty() {
            return Err(CacheError::InvalidRequest(
                "Lock resource name cannot be empty".to_string(),
            ));
        }
        Ok(self.lock_key(resource))
    }

    /// How long to wait before the next claim on a held key.
    async fn backoff(&self, key: &str) -> Duration {
        let delay = match self.store.remaining_expiry(key).await {
            Ok(Some(remaining)) => remaining.max(MIN_POLL_INTERVAL),
            Ok(None) => self.options.retry_delay,
            Err(err) => {
                debug!("Could not read expiry of {}: {}", key, err);
                self.options.retry_delay
            }
        };
        match self.options.max_poll {
            Some(ceiling) => delay.min(ceiling.max(MIN_POLL_INTERVAL)),
            None => delay,
        }
    }

    async fn holds(&self, key: &str, token: &HolderToken) -> bool {
        matches!(self.store.get(key).await, Ok(Some(value)) if value == token.as_str())
    }

    /// Ends a cancelled attempt, clearing any claim a faulted write may have left.
    async fn abandon(&self, key: &str, token: &HolderToken, ambiguous: bool) -> CacheError {
        if ambiguous {
            match self.store.compare_and_delete(key, token.as_str()).await {
                Ok(true) => warn!("Cleared claim on {} left by a faulted attempt", key),
                Ok(false) => {}
                Err(err) => warn!("Could not clear possible claim on {}: {}", key, err),
            }
        }

        debug!("Acquire of {} cancelled", key);
        CacheError::Cancelled
    }
}
