//! In-memory TTL lock backend.

use crate::storage::traits::{LockBackend, LockLease};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct HeldLock {
    token: String,
    expires_at: Instant,
}

/// In-memory [`LockBackend`] with real TTL expiry and fencing tokens.
#[derive(Debug, Default)]
pub struct MemoryLockBackend {
    locks: Mutex<HashMap<String, HeldLock>>,
}

impl MemoryLockBackend {
    /// Creates a backend with no held locks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockBackend for MemoryLockBackend {
    fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockLease>> {
        let mut locks = self.locks.lock().map_err(|e| Error::operation("lock_acquire", e))?;
        let now = Instant::now();
        if locks.get(key).is_some_and(|held| held.expires_at > now) {
            return Ok(None);
        }
        let token = uuid::Uuid::new_v4().to_string();
        locks.insert(
            key.to_string(),
            HeldLock {
                token: token.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(Some(LockLease {
            key: key.to_string(),
            token,
        }))
    }

    fn renew(&self, lease: &LockLease, ttl: Duration) -> Result<bool> {
        let mut locks = self.locks.lock().map_err(|e| Error::operation("lock_renew", e))?;
        let now = Instant::now();
        match locks.get_mut(&lease.key) {
            Some(held) if held.token == lease.token && held.expires_at > now => {
                held.expires_at = now + ttl;
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    fn release(&self, lease: LockLease) -> Result<()> {
        let mut locks = self.locks.lock().map_err(|e| Error::operation("lock_release", e))?;
        if locks.get(&lease.key).is_some_and(|held| held.token == lease.token) {
            locks.remove(&lease.key);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_mutual_exclusion() {
        let backend = MemoryLockBackend::new();
        let lease = backend.try_acquire("gc:ns", TTL).expect("acquire").expect("free");
        assert!(backend.try_acquire("gc:ns", TTL).expect("acquire").is_none());

        backend.release(lease).expect("release");
        assert!(backend.try_acquire("gc:ns", TTL).expect("acquire").is_some());
    }

    #[test]
    fn test_expired_lease_can_be_taken_over() {
        let backend = MemoryLockBackend::new();
        let old = backend
            .try_acquire("gc:ns", Duration::ZERO)
            .expect("acquire")
            .expect("free");

        let new = backend.try_acquire("gc:ns", TTL).expect("acquire").expect("expired");
        assert_ne!(old.token, new.token);

        // The old holder can no longer renew, and releasing the stale lease
        // must not drop the new holder's lock.
        assert!(!backend.renew(&old, TTL).expect("renew"));
        backend.release(old).expect("release");
        assert!(backend.try_acquire("gc:ns", TTL).expect("acquire").is_none());
    }

    #[test]
    fn test_renew_extends_held_lease() {
        let backend = MemoryLockBackend::new();
        let lease = backend.try_acquire("gc:ns", TTL).expect("acquire").expect("free");
        assert!(backend.renew(&lease, TTL).expect("renew"));
    }

    #[test]
    fn test_independent_keys_do_not_contend() {
        let backend = MemoryLockBackend::new();
        assert!(backend.try_acquire("gc:a", TTL).expect("acquire").is_some());
        assert!(backend.try_acquire("gc:b", TTL).expect("acquire").is_some());
    }
}
