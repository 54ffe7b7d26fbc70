//! Cache Lock - a key-value cache over interchangeable stores
//!
//! Provides one store contract for an in-process map and Redis, and a
//! distributed lock built only from the store's atomic key operations.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod lock;
pub mod tasks;

pub use cache::{CacheStore, MemoryStore, RedisStore};
pub use client::CacheClient;
pub use config::{Backend, Config};
pub use error::{CacheError, Result};
pub use lock::{CancellationSignal, CancellationSource, Lease, LockOptions, LockProvider};
pub use tasks::spawn_cleanup_task;
