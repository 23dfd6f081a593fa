//! Content hashes and namespace identifiers.

use crate::{Error, Result};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of bytes in a content hash (SHA-256).
pub const HASH_LEN: usize = 32;

/// A fixed-size content hash.
///
/// Identifies either a blob (its content hash) or a namespace+blob pair
/// (the node-cache key, see [`crate::models::node_key`]). Immutable,
/// comparable and hashable; rendered as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// Creates a hash from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Computes the SHA-256 digest of `data`.
    #[must_use]
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Returns the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Parses a hash from a lowercase hex string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the string is not exactly
    /// 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s).map_err(|e| Error::InvalidInput(format!("invalid hash hex: {e}")))?;
        let bytes: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidInput(format!("hash must be {HASH_LEN} bytes")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// Durable documents render hashes as hex strings so they stay readable in
// whatever document database backs the store.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(|e| D::Error::custom(e.to_string()))
    }
}

/// Identifier of a storage namespace.
///
/// Namespaces partition the blob store; refs, node records and GC cycles
/// are all namespace-scoped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(String);

impl NamespaceId {
    /// Creates a namespace id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the namespace id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NamespaceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
