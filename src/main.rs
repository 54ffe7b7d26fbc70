//! Cache Lock - contention demo
//!
//! Runs a set of workers that all increment one cached counter, each under
//! the distributed lock, and reports whether any increment was lost.

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_lock::{
    spawn_cleanup_task, Backend, CacheClient, CancellationSignal, CancellationSource, Config,
    LockOptions, MemoryStore, RedisStore,
};

const COUNTER_KEY: &str = "demo:counter";
const LOCK_NAME: &str = "demo-counter";

/// Main entry point for the contention demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the configured store (plus the sweep task for the memory backend)
/// 4. Run `LOCK_DEMO_WORKERS` workers against one lock
/// 5. Cancel outstanding acquisitions on Ctrl+C
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_lock=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cache Lock demo");

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={:?}, lock_ttl={}ms, retry_delay={}ms",
        config.backend, config.lock_ttl_ms, config.lock_retry_delay_ms
    );

    let workers: usize = env::var("LOCK_DEMO_WORKERS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8);

    let mut options = LockOptions::from_config(&config);
    // Waiters would otherwise sleep out the whole TTL after each release
    options.max_poll.get_or_insert(config.lock_retry_delay());

    let (client, cleanup_handle) = match config.backend {
        Backend::Memory => {
            let store = MemoryStore::new();
            let handle = spawn_cleanup_task(store.clone(), config.cleanup_interval);
            (CacheClient::new(Arc::new(store), options), Some(handle))
        }
        Backend::Redis => {
            let store = RedisStore::connect(&config.redis_url)
                .await
                .context("failed to connect to Redis")?;
            (CacheClient::new(Arc::new(store), options), None)
        }
    };

    client.set(COUNTER_KEY, &0u64, None).await?;

    let source = CancellationSource::new();
    let shutdown = {
        let source = source.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, cancelling waiting workers...");
                source.cancel();
            }
        })
    };

    let mut tasks = Vec::with_capacity(workers);
    for id in 0..workers {
        let client = client.clone();
        let cancel = source.signal();
        tasks.push(tokio::spawn(async move { run_worker(id, client, cancel).await }));
    }

    let mut completed = 0u64;
    for task in tasks {
        match task.await.context("worker panicked")? {
            Ok(()) => completed += 1,
            Err(err) => warn!("Worker stopped: {}", err),
        }
    }

    shutdown.abort();
    if let Some(handle) = cleanup_handle {
        handle.abort();
    }

    let total: u64 = client.get(COUNTER_KEY).await?.unwrap_or(0);
    info!("{} workers completed, counter = {}", completed, total);
    if total != completed {
        bail!("counter {} does not match {} completed workers", total, completed);
    }
    Ok(())
}

/// Increments the shared counter inside one lease.
async fn run_worker(
    id: usize,
    client: CacheClient,
    cancel: CancellationSignal,
) -> cache_lock::Result<()> {
    let mut lease = client.acquire_lock(LOCK_NAME, &cancel).await?;

    let current: u64 = client.get(COUNTER_KEY).await?.unwrap_or(0);
    client.set(COUNTER_KEY, &(current + 1), None).await?;
    info!("Worker {} raised counter to {}", id, current + 1);

    lease.release().await
}
