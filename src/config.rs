//! Configuration Module
//!
//! Handles loading backend and lock settings from environment variables.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Which store backs the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// In-process map owned by this process
    Memory,
    /// Networked Redis store
    Redis,
}

impl Backend {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" => Backend::Memory,
            "redis" => Backend::Redis,
            other => {
                warn!("Unknown CACHE_BACKEND '{}', falling back to memory", other);
                Backend::Memory
            }
        }
    }
}

/// Cache and lock configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store backend selected at construction time
    pub backend: Backend,
    /// Redis connection URL, used when `backend` is `Redis`
    pub redis_url: String,
    /// Lease TTL in milliseconds
    pub lock_ttl_ms: u64,
    /// Fallback poll delay in milliseconds when no TTL can be read
    pub lock_retry_delay_ms: u64,
    /// Namespace prepended to every lock resource name
    pub lock_key_prefix: String,
    /// Optional ceiling on one poll sleep in milliseconds
    pub lock_max_poll_ms: Option<u64>,
    /// In-memory expiry sweep interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory` or `redis` (default: memory)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1:6379)
    /// - `LOCK_TTL_MS` - Lease TTL (default: 60000)
    /// - `LOCK_RETRY_DELAY_MS` - Fallback poll delay (default: 1000)
    /// - `LOCK_KEY_PREFIX` - Lock key namespace (default: "lock:")
    /// - `LOCK_MAX_POLL_MS` - Poll sleep ceiling (default: unset, wait out the TTL)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env::var("CACHE_BACKEND")
                .ok()
                .map(|v| Backend::parse(&v))
                .unwrap_or(defaults.backend),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            lock_ttl_ms: env::var("LOCK_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lock_ttl_ms),
            lock_retry_delay_ms: env::var("LOCK_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lock_retry_delay_ms),
            lock_key_prefix: env::var("LOCK_KEY_PREFIX").unwrap_or(defaults.lock_key_prefix),
            lock_max_poll_ms: env::var("LOCK_MAX_POLL_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
            cleanup_interval: env::var("CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Lease TTL as a Duration.
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    /// Fallback poll delay as a Duration.
    pub fn lock_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_retry_delay_ms)
    }

    pub fn lock_max_poll(&self) -> Option<Duration> {
        self.lock_max_poll_ms.map(Duration::from_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            lock_ttl_ms: 60_000,
            lock_retry_delay_ms: 1_000,
            lock_key_prefix: "lock:".to_string(),
            lock_max_poll_ms: None,
            cleanup_interval: 1,
        }
    }
}
