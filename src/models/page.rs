//! Durable reachability log pages.

use super::hash::Hash;
use serde::{Deserialize, Serialize};

/// Maximum number of hashes held by one page before it is sealed.
pub const MAX_PAGE_ITEMS: usize = 1000;

/// Sentinel `read_index` meaning root-set discovery has not completed yet.
pub const READ_INDEX_PENDING: i64 = -1;

/// One durable page of the reachability log.
///
/// Pages for a given cycle form a contiguous, gap-free sequence ordered by
/// `base_index`, starting at 0. A page only grows by append while open; once
/// it holds [`MAX_PAGE_ITEMS`] entries it is sealed and a new page starts at
/// `base_index + hashes.len()`. The BFS read cursor (`read_index`) is carried
/// on whichever page was flushed last and is monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityPage {
    /// Cycle this page belongs to.
    pub cycle: u64,
    /// Global index of the first hash on this page.
    pub base_index: u64,
    /// BFS read cursor at the time this page was flushed.
    ///
    /// [`READ_INDEX_PENDING`] (-1) while root discovery is still running.
    pub read_index: i64,
    /// Hashes proven reachable, in append order.
    pub hashes: Vec<Hash>,
}

impl ReachabilityPage {
    /// Creates an empty open page.
    #[must_use]
    pub const fn new(cycle: u64, base_index: u64, read_index: i64) -> Self {
        Self {
            cycle,
            base_index,
            read_index,
            hashes: Vec::new(),
        }
    }

    /// Global index one past the last hash on this page.
    #[must_use]
    pub fn head_index(&self) -> u64 {
        self.base_index + self.hashes.len() as u64
    }

    /// Whether this page has reached capacity and must be sealed.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.hashes.len() >= MAX_PAGE_ITEMS
    }
}
