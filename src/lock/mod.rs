//! Lock Module
//!
//! Distributed mutual exclusion built from the cache store's atomic key
//! operations: a claim (set-if-absent with TTL) takes the lock, a
//! token-checked compare-and-delete releases it, and the TTL clears the lock
//! of a holder that never comes back.

mod acquirer;
mod cancel;
mod lease;

#[cfg(test)]
pub(crate) mod testing;

pub use acquirer::{LockOptions, LockProvider, MIN_POLL_INTERVAL};
pub use cancel::{CancellationSignal, CancellationSource};
pub use lease::{HolderToken, Lease};
