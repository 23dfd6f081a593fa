//! Blob backend trait.

use crate::Result;
use crate::models::{BlobEntry, BlobId, BlobLocator, Hash, NamespaceId};

/// Streaming enumeration of the blobs physically present in a namespace.
pub type BlobIter<'a> = Box<dyn Iterator<Item = Result<BlobEntry>> + Send + 'a>;

/// Trait for physical blob storage backends (local disk, object storage).
///
/// The GC only needs a narrow slice of a blob store: enumerate what exists,
/// read a prefix of a blob's bytes, and delete. The read/write data path is
/// the host system's concern.
pub trait BlobBackend: Send + Sync {
    /// Enumerates every blob physically present in the namespace.
    ///
    /// The iterator is pull-based so sweeps never hold the full listing in
    /// memory; entries carry the backend path and last-modified time.
    fn enumerate(&self, namespace: &NamespaceId) -> Result<BlobIter<'_>>;

    /// Reads up to `len` bytes from the start of a blob.
    ///
    /// Returns `Ok(None)` if the blob does not exist. May return fewer than
    /// `len` bytes when the blob is shorter.
    fn read_prefix(
        &self,
        namespace: &NamespaceId,
        locator: &BlobLocator,
        len: usize,
    ) -> Result<Option<Vec<u8>>>;

    /// Deletes a blob. Returns whether it existed.
    fn delete(&self, namespace: &NamespaceId, locator: &BlobLocator) -> Result<bool>;
}

/// Parses a blob id out of a backend path.
///
/// The final path segment is the blob's content hash in hex, optionally
/// carrying a `.blob` extension. Returns `None` for paths that are not
/// blob objects (temp files, markers).
#[must_use]
pub fn parse_blob_id_from_path(path: &str) -> Option<BlobId> {
    let name = path.rsplit('/').next()?;
    let hex = name.strip_suffix(".blob").unwrap_or(name);
    Hash::from_hex(hex).ok().map(BlobId::new)
}
