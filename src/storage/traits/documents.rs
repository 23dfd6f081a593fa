//! Document store trait for durable GC bookkeeping.

use crate::Result;
use crate::models::{GcStateDocument, Hash, NamespaceId, NodeRecord, ReachabilityPage};

/// Trait for the document database backing GC bookkeeping.
///
/// Three families of documents live here: reachability pages (keyed by
/// namespace + cycle + base index), node records (keyed by their
/// namespace-scoped hash), and the singleton scheduler state document with
/// compare-and-update semantics. Every write is an upsert or
/// insert-if-absent so crashed writers can always retry.
pub trait DocumentStore: Send + Sync {
    // --- Reachability pages ---

    /// Upserts a page, keyed by `(namespace, cycle, base_index)`.
    ///
    /// Idempotent: re-flushing the same page after a crash is safe.
    fn upsert_page(&self, namespace: &NamespaceId, page: &ReachabilityPage) -> Result<()>;

    /// Returns all pages for a cycle, ordered by ascending `base_index`.
    fn list_pages(&self, namespace: &NamespaceId, cycle: u64) -> Result<Vec<ReachabilityPage>>;

    /// Deletes all pages for a cycle, returning how many were removed.
    fn delete_pages(&self, namespace: &NamespaceId, cycle: u64) -> Result<usize>;

    // --- Node records ---

    /// Fetches a node record by its namespace-scoped key.
    fn get_node(&self, id: Hash) -> Result<Option<NodeRecord>>;

    /// Inserts a record if no record with its id exists.
    ///
    /// Existing records are left untouched (set-once cache, never a
    /// replace). Returns whether the record was newly inserted.
    fn insert_node_if_absent(&self, record: &NodeRecord) -> Result<bool>;

    /// Batch form of [`Self::insert_node_if_absent`].
    ///
    /// Returns how many records were newly inserted. The default
    /// implementation loops; backends with a bulk write path override it.
    fn insert_nodes_if_absent(&self, records: &[NodeRecord]) -> Result<usize> {
        let mut inserted = 0;
        for record in records {
            if self.insert_node_if_absent(record)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Sets a record's import list. Single-field update, applied once.
    fn set_node_imports(&self, id: Hash, imports: &[Hash]) -> Result<()>;

    /// Deletes a node record. Returns whether it existed.
    fn delete_node(&self, id: Hash) -> Result<bool>;

    // --- Scheduler state singleton ---

    /// Loads the scheduler state document and its version.
    ///
    /// A store with no document yet returns the default document at
    /// version 0.
    fn load_state(&self) -> Result<(GcStateDocument, u64)>;

    /// Stores the state document if the current version still matches
    /// `expected_version`.
    ///
    /// Returns `false` on a version conflict; callers re-read and retry
    /// (optimistic concurrency).
    fn try_store_state(&self, expected_version: u64, doc: &GcStateDocument) -> Result<bool>;
}
