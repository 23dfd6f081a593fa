//! # Blobsweep
//!
//! Namespace garbage collector for content-addressable blob stores.
//!
//! Blobsweep keeps a content-addressed blob store bounded in size by running
//! a resumable mark-and-sweep cycle per namespace: it discovers root blobs
//! from named refs, propagates reachability breadth-first through blob header
//! imports, and deletes unreachable blobs once they have aged past a grace
//! window. All durable bookkeeping is written as idempotent upserts so a
//! cycle can crash at any point and resume on the next scheduler tick.
//!
//! ## Features
//!
//! - Crash-resumable cycles (paginated durable reachability log)
//! - Bounded traversal memory (one reachable set per cycle, no second frontier copy)
//! - Two-cycle deletion latency guarding against in-flight writers
//! - Cross-process mutual exclusion via TTL lock leases
//! - Pluggable backends (blob store, ref store, document store, lock)
//!
//! ## Example
//!
//! ```rust,ignore
//! use blobsweep::{CancelToken, GcConfig, GcScheduler};
//!
//! let scheduler = GcScheduler::new(GcConfig::from_env(), blobs, refs, docs, locks);
//! scheduler.tick(&CancelToken::new())?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod bundle;
pub mod config;
pub mod gc;
pub mod models;
pub mod storage;

// Re-exports for convenience
pub use config::{GcConfig, NamespacePolicy};
pub use gc::{GcScheduler, GcSession, GcSummary, NodeCache, ReachabilityLog};
pub use models::{
    BlobEntry, BlobId, BlobLocator, GcStateDocument, Hash, NamespaceGcState, NamespaceId,
    NodeRecord, ReachabilityPage, RefEntry,
};
pub use storage::{BlobBackend, CancelToken, DocumentStore, LockBackend, LockLease, RefBackend};

/// Error type for blobsweep operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed blob paths, bad namespace ids, hex decode failures |
/// | `OperationFailed` | Blob/document/lock backend I/O fails (transient, retried next tick) |
/// | `InvalidHeader` | Blob header prelude or import list cannot be decoded |
/// | `InvariantViolation` | Page-sequence gap, read cursor beyond log head (fatal to the cycle) |
/// | `Cancelled` | Cancellation was requested mid-phase |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation against a backend failed.
    ///
    /// Transient by classification: all durable GC writes are idempotent
    /// upserts, so the enclosing session aborts and the scheduler retries
    /// the namespace on its next due tick.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A blob header could not be decoded.
    ///
    /// Callers on the GC path downgrade this to a warning: an unreadable
    /// blob is still reachable, it just contributes no further edges.
    #[error("invalid blob header: {0}")]
    InvalidHeader(String),

    /// Durable GC bookkeeping violated a structural invariant.
    ///
    /// Fatal to the session; the cycle is abandoned but left resumable
    /// (no pages are deleted until a cycle completes).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Creates an `OperationFailed` error for the given operation.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for blobsweep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current unix timestamp in seconds.
///
/// # Example
///
/// ```rust
/// use blobsweep::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
