//! Garbage collection module.
//!
//! This module implements the namespace garbage collector: a resumable
//! mark-and-sweep cycle per namespace plus the scheduler that drives one
//! cycle at a time under a cross-process lock.
//!
//! # Overview
//!
//! A cycle walks four phases: recover prior progress from the durable
//! reachability log, discover roots from the namespace's refs, propagate
//! reachability breadth-first through blob header imports, then sweep,
//! deleting unreachable blobs only once they have aged past the namespace's
//! grace window. Orphans observed for the first time get a placeholder node
//! record instead of deletion, so a blob is only ever removed on the cycle
//! *after* it was first seen unreachable. That two-cycle latency is the
//! safety mechanism against races with in-flight writers whose
//! link-publishing transaction has not completed yet.
//!
//! # Example
//!
//! ```rust,ignore
//! use blobsweep::gc::GcScheduler;
//! use blobsweep::storage::CancelToken;
//!
//! let scheduler = GcScheduler::new(config, blobs, refs, docs, locks);
//!
//! // One manual tick: collect the earliest-due namespace.
//! if let Some(summary) = scheduler.tick(&CancelToken::new())? {
//!     println!("{}", summary.summary());
//! }
//!
//! // Or run the periodic loop until cancelled.
//! scheduler.run(cancel).await;
//! ```
//!
//! # Crash safety
//!
//! Every durable write is an idempotent upsert and the reachability log is
//! paginated and monotonic, so a session killed at any point resumes on the
//! next scheduler tick without losing edges or double-deleting.

mod nodes;
mod reachability;
mod scheduler;
mod session;

pub use nodes::NodeCache;
pub use reachability::ReachabilityLog;
pub use scheduler::GcScheduler;
pub use session::{GcSession, GcSummary};
