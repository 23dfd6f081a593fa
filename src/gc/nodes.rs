//! Node cache and import extraction.
//!
//! Node records memoize the expensive "read blob header, extract imports"
//! step in the document store, keyed by the namespace-scoped blob hash.
//! Records are a set-once cache: inserts never overwrite existing fields,
//! and the import list is written exactly once when first computed.
//!
//! Import extraction reads a growable prefix of the blob rather than the
//! whole payload: an initial 64 KiB fetch covers almost every header, and
//! only when the prelude declares a longer header is the exact length
//! refetched. Missing or corrupt blobs yield an empty import list with a
//! warning, never a failed cycle: an unreadable blob was referenced, so it
//! stays reachable; it just contributes no further edges.

use crate::bundle::{INITIAL_PREFIX_LEN, PRELUDE_LEN, parse_header, read_prelude_length};
use crate::models::{BlobLocator, Hash, NamespaceId, NodeRecord, node_key};
use crate::storage::{BlobBackend, DocumentStore};
use crate::{Error, Result, current_timestamp};
use std::sync::Arc;
use tracing::{debug, warn};

/// Namespace-scoped view over the durable node record cache.
pub struct NodeCache {
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobBackend>,
    namespace: NamespaceId,
}

impl NodeCache {
    /// Creates a cache over the given backends.
    #[must_use]
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobBackend>,
        namespace: NamespaceId,
    ) -> Self {
        Self {
            docs,
            blobs,
            namespace,
        }
    }

    /// The namespace this cache is scoped to.
    #[must_use]
    pub const fn namespace(&self) -> &NamespaceId {
        &self.namespace
    }

    /// Fetches a record by its namespace-scoped key.
    pub fn get(&self, id: Hash) -> Result<Option<NodeRecord>> {
        self.docs.get_node(id)
    }

    /// Returns a record's direct imports, computing and persisting them on
    /// first use.
    ///
    /// When extraction runs, placeholder records for every import are
    /// durably inserted *before* the import list is persisted on `record`,
    /// so any record whose imports are set is guaranteed to have a record
    /// behind each import hash.
    ///
    /// # Errors
    ///
    /// Only transient store errors propagate; unreadable blob data is
    /// downgraded to an empty import list.
    pub fn imports(&self, record: &NodeRecord) -> Result<Vec<Hash>> {
        if let Some(imports) = &record.imports {
            return Ok(imports.clone());
        }

        let locators = self.extract_imports(&record.locator)?;
        let now = current_timestamp();
        let placeholders: Vec<NodeRecord> = locators
            .iter()
            .map(|locator| {
                NodeRecord::placeholder(
                    node_key(&self.namespace, locator.blob_id),
                    locator.clone(),
                    now,
                )
            })
            .collect();
        self.docs.insert_nodes_if_absent(&placeholders)?;

        let keys: Vec<Hash> = placeholders.iter().map(|r| r.id).collect();
        self.docs.set_node_imports(record.id, &keys)?;
        Ok(keys)
    }

    /// Reads and parses a blob's header into its import locators.
    fn extract_imports(&self, locator: &BlobLocator) -> Result<Vec<BlobLocator>> {
        let Some(prefix) = self
            .blobs
            .read_prefix(&self.namespace, locator, INITIAL_PREFIX_LEN)?
        else {
            warn!(
                namespace = %self.namespace,
                blob = %locator,
                "Blob missing while extracting imports, treating as leaf"
            );
            return Ok(Vec::new());
        };

        match self.parse_prefix(locator, prefix) {
            Ok(imports) => Ok(imports),
            Err(Error::InvalidHeader(cause)) => {
                warn!(
                    namespace = %self.namespace,
                    blob = %locator,
                    cause,
                    "Unreadable blob header, treating as leaf"
                );
                Ok(Vec::new())
            },
            Err(e) => Err(e),
        }
    }

    fn parse_prefix(&self, locator: &BlobLocator, prefix: Vec<u8>) -> Result<Vec<BlobLocator>> {
        let header_len = read_prelude_length(&prefix)?;
        let total = PRELUDE_LEN + header_len;

        let bytes = if prefix.len() >= total {
            prefix
        } else {
            // Header longer than the initial fetch; refetch exactly.
            debug!(
                namespace = %self.namespace,
                blob = %locator,
                header_len,
                "Header exceeds initial prefix, refetching"
            );
            self.blobs
                .read_prefix(&self.namespace, locator, total)?
                .ok_or_else(|| Error::InvalidHeader("blob vanished during refetch".to_string()))?
        };

        if bytes.len() < total {
            return Err(Error::InvalidHeader(format!(
                "blob shorter ({}) than declared header ({total})",
                bytes.len()
            )));
        }
        parse_header(&bytes[PRELUDE_LEN..total])
    }
}
