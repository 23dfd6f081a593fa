//! Durable, paginated reachability log.
//!
//! One log exists per `(namespace, cycle)`. It records every hash proven
//! reachable during the cycle, deduplicated against an in-memory seen set,
//! and carries the BFS read cursor so a crashed cycle can resume where it
//! left off instead of re-deriving everything. Hashes are flushed in pages
//! of [`MAX_PAGE_ITEMS`] keyed by `(cycle, base_index)`; flushing is an
//! upsert, so retrying after a crash mid-flush is safe.
//!
//! Memory is bounded to a single set of all hashes proven reachable this
//! cycle (plus their append order); the traversal frontier is the log
//! itself, never a second in-memory copy.

use crate::models::{Hash, MAX_PAGE_ITEMS, NamespaceId, READ_INDEX_PENDING, ReachabilityPage};
use crate::storage::DocumentStore;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Append-only reachability log for one GC cycle.
pub struct ReachabilityLog {
    docs: Arc<dyn DocumentStore>,
    namespace: NamespaceId,
    cycle: u64,
    /// Every hash appended this cycle, for O(1) dedup.
    seen: HashSet<Hash>,
    /// Every hash appended this cycle, in append order. Sealed pages are
    /// prefixes of this vector; the open page is its tail.
    entries: Vec<Hash>,
    /// Base index of the current open page.
    open_base: u64,
    /// BFS read cursor; [`READ_INDEX_PENDING`] until root discovery
    /// completes durably.
    read_index: i64,
}

impl ReachabilityLog {
    /// Creates an empty log for a fresh cycle.
    #[must_use]
    pub fn new(docs: Arc<dyn DocumentStore>, namespace: NamespaceId, cycle: u64) -> Self {
        Self {
            docs,
            namespace,
            cycle,
            seen: HashSet::new(),
            entries: Vec::new(),
            open_base: 0,
            read_index: READ_INDEX_PENDING,
        }
    }

    /// The cycle this log belongs to.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Index one past the last appended hash.
    #[must_use]
    pub fn head_index(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Current BFS read cursor, or `None` while root discovery is
    /// incomplete.
    #[must_use]
    pub const fn read_index(&self) -> Option<u64> {
        if self.read_index < 0 {
            None
        } else {
            #[allow(clippy::cast_sign_loss)]
            Some(self.read_index as u64)
        }
    }

    /// Whether `hash` has been proven reachable this cycle.
    #[must_use]
    pub fn contains(&self, hash: Hash) -> bool {
        self.seen.contains(&hash)
    }

    /// Appends a hash if it has not been seen this cycle.
    ///
    /// Returns whether it was newly added. Seals and flushes the open page
    /// when it reaches [`MAX_PAGE_ITEMS`], opening a new page with the read
    /// cursor carried over.
    pub fn append(&mut self, hash: Hash) -> Result<bool> {
        if !self.seen.insert(hash) {
            return Ok(false);
        }
        self.entries.push(hash);
        if self.open_len() >= MAX_PAGE_ITEMS {
            self.flush()?;
            self.open_base = self.head_index();
        }
        Ok(true)
    }

    /// Durably upserts the current open page.
    ///
    /// Idempotent: keyed by `(cycle, base_index)`, so a crash mid-flush is
    /// safe to retry.
    pub fn flush(&mut self) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let page = ReachabilityPage {
            cycle: self.cycle,
            base_index: self.open_base,
            read_index: self.read_index,
            hashes: self.entries[self.open_base as usize..].to_vec(),
        };
        self.docs.upsert_page(&self.namespace, &page)
    }

    /// Advances the read cursor to `index`.
    ///
    /// The cursor is monotone and may never pass the head of the log; both
    /// violations are fatal to the session.
    pub fn set_read_index(&mut self, index: u64) -> Result<()> {
        let index_signed =
            i64::try_from(index).map_err(|_| Error::InvariantViolation("read index overflow".into()))?;
        if index > self.head_index() {
            return Err(Error::InvariantViolation(format!(
                "read index {index} beyond log head {}",
                self.head_index()
            )));
        }
        if index_signed < self.read_index {
            return Err(Error::InvariantViolation(format!(
                "read index regressed from {} to {index}",
                self.read_index
            )));
        }
        self.read_index = index_signed;
        Ok(())
    }

    /// Returns up to `len` hashes starting at global index `start`.
    #[must_use]
    pub fn slice(&self, start: u64, len: usize) -> &[Hash] {
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(self.entries.len());
        let end = start.saturating_add(len).min(self.entries.len());
        &self.entries[start..end]
    }

    /// Replays all durably-stored pages for this cycle, rebuilding the seen
    /// set, the open page and the read cursor.
    ///
    /// Pages must form a contiguous `base_index` run starting at 0; a gap
    /// means the durable log is corrupt and the session must abandon the
    /// cycle (resumable, nothing is deleted).
    pub fn recover(&mut self) -> Result<()> {
        self.seen.clear();
        self.entries.clear();
        self.open_base = 0;
        self.read_index = READ_INDEX_PENDING;

        let pages = self.docs.list_pages(&self.namespace, self.cycle)?;
        let mut expected_base = 0u64;
        for page in &pages {
            if page.base_index != expected_base {
                return Err(Error::InvariantViolation(format!(
                    "page gap in cycle {}: expected base {expected_base}, found {}",
                    self.cycle, page.base_index
                )));
            }
            for hash in &page.hashes {
                self.seen.insert(*hash);
                self.entries.push(*hash);
            }
            expected_base = page.head_index();
            self.open_base = page.base_index;
            self.read_index = page.read_index;
        }

        // A full final page was sealed; the next append starts a new page.
        if self.head_index() - self.open_base >= MAX_PAGE_ITEMS as u64 {
            self.open_base = self.head_index();
        }

        if self.read_index > i64::try_from(self.head_index()).unwrap_or(i64::MAX) {
            return Err(Error::InvariantViolation(format!(
                "recovered read index {} beyond log head {}",
                self.read_index,
                self.head_index()
            )));
        }

        debug!(
            namespace = %self.namespace,
            cycle = self.cycle,
            pages = pages.len(),
            hashes = self.entries.len(),
            read_index = self.read_index,
            "Recovered reachability log"
        );
        Ok(())
    }

    fn open_len(&self) -> usize {
        self.entries.len() - self.open_base as usize
    }
}
