//! In-memory blob backend.

use crate::models::{BlobEntry, BlobId, BlobLocator, NamespaceId};
use crate::storage::traits::{BlobBackend, BlobIter};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Host name reported in locators minted by this backend.
const HOST: &str = "memory";

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    last_modified: u64,
}

/// In-memory [`BlobBackend`].
///
/// Tracks how many prefix reads were issued so tests can assert that import
/// extraction is memoized rather than repeated.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<(NamespaceId, BlobId), StoredBlob>>,
    prefix_reads: AtomicU64,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores blob bytes, returning a locator for them.
    ///
    /// `last_modified` is caller-supplied so tests can age blobs.
    pub fn put(&self, namespace: &NamespaceId, bytes: Vec<u8>, last_modified: u64) -> BlobLocator {
        let id = BlobId::from_content(&bytes);
        let mut blobs = self.blobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        blobs.insert(
            (namespace.clone(), id),
            StoredBlob {
                bytes,
                last_modified,
            },
        );
        BlobLocator::new(HOST, id)
    }

    /// Whether a blob is physically present.
    #[must_use]
    pub fn contains(&self, namespace: &NamespaceId, id: BlobId) -> bool {
        let blobs = self.blobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        blobs.contains_key(&(namespace.clone(), id))
    }

    /// Number of prefix reads issued since creation.
    #[must_use]
    pub fn prefix_read_count(&self) -> u64 {
        self.prefix_reads.load(Ordering::Relaxed)
    }
}

impl BlobBackend for MemoryBlobStore {
    fn enumerate(&self, namespace: &NamespaceId) -> Result<BlobIter<'_>> {
        let blobs = self.blobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut entries: Vec<BlobEntry> = blobs
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|((ns, id), stored)| BlobEntry {
                host: HOST.to_string(),
                path: format!("{ns}/{id}.blob"),
                last_modified: stored.last_modified,
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn read_prefix(
        &self,
        namespace: &NamespaceId,
        locator: &BlobLocator,
        len: usize,
    ) -> Result<Option<Vec<u8>>> {
        self.prefix_reads.fetch_add(1, Ordering::Relaxed);
        let blobs = self.blobs.lock().map_err(|e| Error::operation("read_prefix", e))?;
        Ok(blobs
            .get(&(namespace.clone(), locator.blob_id))
            .map(|stored| stored.bytes[..stored.bytes.len().min(len)].to_vec()))
    }

    fn delete(&self, namespace: &NamespaceId, locator: &BlobLocator) -> Result<bool> {
        let mut blobs = self.blobs.lock().map_err(|e| Error::operation("delete_blob", e))?;
        Ok(blobs.remove(&(namespace.clone(), locator.blob_id)).is_some())
    }
}
