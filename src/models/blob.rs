//! Blob identities, locators and enumeration entries.

use super::hash::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hash identifying a blob within a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(Hash);

impl BlobId {
    /// Wraps an existing content hash.
    #[must_use]
    pub const fn new(hash: Hash) -> Self {
        Self(hash)
    }

    /// Computes the blob id for a blob's full byte content.
    #[must_use]
    pub fn from_content(data: &[u8]) -> Self {
        Self(Hash::digest(data))
    }

    /// Returns the underlying content hash.
    #[must_use]
    pub const fn hash(&self) -> Hash {
        self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque pointer into the backing store sufficient to read a blob's bytes.
///
/// Immutable once created. `host` names the storage host or bucket the blob
/// lives on; `blob_id` is its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobLocator {
    /// Storage host (or bucket/region) holding the blob.
    pub host: String,
    /// Content hash of the blob.
    pub blob_id: BlobId,
}

impl BlobLocator {
    /// Creates a locator.
    pub fn new(host: impl Into<String>, blob_id: BlobId) -> Self {
        Self {
            host: host.into(),
            blob_id,
        }
    }
}

impl fmt::Display for BlobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.blob_id)
    }
}

/// One blob observed while enumerating the physical backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Storage host the enumeration ran against.
    pub host: String,
    /// Backend-relative path of the blob.
    pub path: String,
    /// Last modification time, unix seconds.
    pub last_modified: u64,
}

/// A named root pointer: one ref and the blob it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// Ref name, e.g. `builds/nightly/12842`.
    pub name: String,
    /// Locator of the ref's target blob.
    pub target: BlobLocator,
}
