//! Error types for the cache and lock layers
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache stores, the typed client and leases.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The caller's cancellation signal fired while acquiring a lease
    #[error("Lock acquisition cancelled")]
    Cancelled,

    /// The strict disposal contract was invoked a second time
    #[error("Lease already disposed: {0}")]
    AlreadyDisposed(String),

    /// The lock key was gone or held by another token at release time
    #[error("Lease on {key} is no longer owned by this holder")]
    OwnershipViolation { key: String },

    /// Timeout or dropped connection; the operation may be retried.
    /// The built-in stores report these through [`CacheError::Store`]; custom
    /// [`CacheStore`](crate::cache::CacheStore) backends raise this directly.
    #[error("Transient store fault: {0}")]
    Transient(String),

    /// Redis backend failure
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Returns true when retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CacheError::Transient(_) => true,
            CacheError::Store(err) => {
                err.is_timeout() || err.is_connection_dropped() || err.is_io_error()
            }
            _ => false,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CacheError::Transient("timeout".to_string()).is_transient());
        assert!(!CacheError::Cancelled.is_transient());
        assert!(!CacheError::AlreadyDisposed("k".to_string()).is_transient());
        assert!(!CacheError::OwnershipViolation { key: "k".to_string() }.is_transient());
    }

    #[test]
    fn test_redis_io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = CacheError::from(redis::RedisError::from(io));
        assert!(err.is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = CacheError::OwnershipViolation { key: "lock:R".to_string() };
        assert_eq!(err.to_string(), "Lease on lock:R is no longer owned by this holder");
        assert_eq!(CacheError::Cancelled.to_string(), "Lock acquisition cancelled");
    }
}
