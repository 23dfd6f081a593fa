//! Cached node records for the reachability scanner.

use super::blob::{BlobId, BlobLocator};
use super::hash::{Hash, NamespaceId};
use serde::{Deserialize, Serialize};

/// Computes the node-cache key for a blob within a namespace.
///
/// Keys are `SHA-256(namespace || blob_hash)` so identical blob ids in
/// different namespaces never collide in the node cache or reachability log.
#[must_use]
pub fn node_key(namespace: &NamespaceId, blob_id: BlobId) -> Hash {
    let mut data = Vec::with_capacity(namespace.as_str().len() + 32);
    data.extend_from_slice(namespace.as_str().as_bytes());
    data.extend_from_slice(blob_id.hash().as_bytes());
    Hash::digest(&data)
}

/// Durable cache record for one blob the GC has observed.
///
/// Memoizes the expensive "parse header, extract imports" step across
/// cycles. Records are created with insert-if-absent semantics: existing
/// fields are never overwritten on re-observation, and `imports` is set
/// exactly once when first computed. A record whose blob was swept is
/// deleted with it; if the blob is later re-observed the record is recreated
/// as a placeholder, restarting its grace window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node-cache key, see [`node_key`].
    pub id: Hash,
    /// Where the blob's bytes can be read from.
    pub locator: BlobLocator,
    /// Direct outgoing references, or `None` if not yet computed.
    pub imports: Option<Vec<Hash>>,
    /// When this record was created, unix seconds.
    pub last_touched: u64,
}

impl NodeRecord {
    /// Creates a placeholder record with imports not yet computed.
    #[must_use]
    pub const fn placeholder(id: Hash, locator: BlobLocator, now: u64) -> Self {
        Self {
            id,
            locator,
            imports: None,
            last_touched: now,
        }
    }
}
