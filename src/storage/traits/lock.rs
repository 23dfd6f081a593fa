//! Distributed lock trait.

use crate::Result;
use std::time::Duration;

/// A held lock lease.
///
/// The token is a fencing value unique to this acquisition; renew and
/// release only succeed while the backend still associates the key with
/// this token, so a lease that expired and was re-acquired elsewhere cannot
/// be renewed or released by the old holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    /// Lock key, e.g. `gc:{namespace}`.
    pub key: String,
    /// Fencing token for this acquisition.
    pub token: String,
}

/// Trait for the cross-process lock primitive.
///
/// The per-namespace lock is the sole mutual-exclusion mechanism keeping
/// two GC sessions for the same namespace from running concurrently. Leases
/// carry a bounded TTL so a crashed holder stalls future cycles for at most
/// one TTL.
pub trait LockBackend: Send + Sync {
    /// Attempts to acquire the lock.
    ///
    /// Returns `Ok(None)` when another process holds an unexpired lease;
    /// contention is not an error.
    fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockLease>>;

    /// Extends a held lease by `ttl` from now.
    ///
    /// Returns `false` if the lease is no longer held (expired and possibly
    /// taken over); the holder must stop assuming exclusivity.
    fn renew(&self, lease: &LockLease, ttl: Duration) -> Result<bool>;

    /// Releases a held lease. Releasing an already-expired lease is a no-op.
    fn release(&self, lease: LockLease) -> Result<()>;
}
