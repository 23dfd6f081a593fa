//! Durable scheduler state.

use super::hash::NamespaceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-namespace scheduling record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceGcState {
    /// Active cycle number, or 0 when no cycle is in flight.
    pub cycle: u64,
    /// Start time of the active cycle, unix seconds.
    pub start_time: u64,
    /// Start time of the last completed cycle, unix seconds.
    pub last_start_time: u64,
}

impl NamespaceGcState {
    /// Whether a cycle is currently in flight for this namespace.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.cycle != 0
    }
}

/// Process-wide singleton document holding all scheduler state.
///
/// Stored as one versioned document so updates go through a
/// compare-and-update retry loop rather than a language-level global.
/// `next_cycle` is a monotonic counter handed out to new sessions; no two
/// sessions in the cluster's history ever reuse a cycle number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcStateDocument {
    /// Next cycle number to hand out.
    pub next_cycle: u64,
    /// Per-namespace state, keyed by namespace id.
    pub namespaces: BTreeMap<NamespaceId, NamespaceGcState>,
}

impl Default for GcStateDocument {
    fn default() -> Self {
        Self {
            // Cycle 0 means "idle", so numbering starts at 1.
            next_cycle: 1,
            namespaces: BTreeMap::new(),
        }
    }
}

impl GcStateDocument {
    /// Allocates the next cycle number, advancing the counter.
    pub const fn allocate_cycle(&mut self) -> u64 {
        let cycle = self.next_cycle;
        self.next_cycle += 1;
        cycle
    }
}
