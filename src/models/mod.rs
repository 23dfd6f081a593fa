//! Data models for blobsweep.
//!
//! This module contains all the core data structures used throughout the
//! garbage collector: content hashes and blob locators, the durable
//! reachability log pages, cached node records, and the singleton scheduler
//! state document.

mod blob;
mod hash;
mod node;
mod page;
mod state;

pub use blob::{BlobEntry, BlobId, BlobLocator, RefEntry};
pub use hash::{Hash, NamespaceId};
pub use node::{NodeRecord, node_key};
pub use page::{MAX_PAGE_ITEMS, READ_INDEX_PENDING, ReachabilityPage};
pub use state::{GcStateDocument, NamespaceGcState};
