//! One mark-and-sweep cycle for one namespace.
//!
//! A session walks `Recovering → RootDiscovery → Propagating → Sweeping`,
//! exposed as individual phase methods so the scheduler can renew its lock
//! lease between phases; [`GcSession::run`] drives them all for callers
//! that do not need that hook.
//!
//! Crash semantics: any transient I/O error aborts the current phase but
//! every durable write so far is a valid idempotent upsert, so the
//! scheduler simply starts a fresh session next tick and it re-enters
//! recovery. No phase deletes a blob except the sweep, and only past the
//! grace window.

use crate::config::{GcConfig, NamespacePolicy};
use crate::models::{BlobLocator, NamespaceId, NodeRecord, node_key};
use crate::storage::{
    BlobBackend, CancelToken, DocumentStore, RefBackend, parse_blob_id_from_path,
};
use crate::{Error, Result, current_timestamp};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::nodes::NodeCache;
use super::reachability::ReachabilityLog;

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// Result of one garbage collection cycle.
#[derive(Debug, Clone)]
pub struct GcSummary {
    /// Namespace that was collected.
    pub namespace: NamespaceId,
    /// Cycle number of this session.
    pub cycle: u64,
    /// Refs enumerated during root discovery.
    pub refs_scanned: u64,
    /// Root hashes newly appended to the reachability log.
    pub roots_added: u64,
    /// Hashes the BFS read cursor advanced over.
    pub hashes_processed: u64,
    /// Import hashes newly appended during propagation.
    pub edges_appended: u64,
    /// Blobs enumerated during the sweep.
    pub blobs_scanned: u64,
    /// Unreachable blobs deleted (aged past the grace window).
    pub blobs_deleted: u64,
    /// Orphans left for a later cycle (inside the grace window or first
    /// observed just now).
    pub orphans_deferred: u64,
    /// Duration of the session in milliseconds.
    pub duration_ms: u64,
}

impl GcSummary {
    fn new(namespace: NamespaceId, cycle: u64) -> Self {
        Self {
            namespace,
            cycle,
            refs_scanned: 0,
            roots_added: 0,
            hashes_processed: 0,
            edges_appended: 0,
            blobs_scanned: 0,
            blobs_deleted: 0,
            orphans_deferred: 0,
            duration_ms: 0,
        }
    }

    /// Returns `true` if any blobs were deleted.
    #[must_use]
    pub const fn has_deleted_blobs(&self) -> bool {
        self.blobs_deleted > 0
    }

    /// Returns a human-readable summary of the cycle.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "cycle {} of '{}': {} reachable, deleted {} of {} scanned blobs, deferred {} ({}ms)",
            self.cycle,
            self.namespace,
            self.roots_added + self.edges_appended,
            self.blobs_deleted,
            self.blobs_scanned,
            self.orphans_deferred,
            self.duration_ms
        )
    }
}

/// Runs one full mark-and-sweep cycle for one namespace.
pub struct GcSession {
    namespace: NamespaceId,
    policy: NamespacePolicy,
    cycle: u64,
    /// Start time of the cycle, unix seconds. Fixed when the cycle is
    /// allocated, not when a resumed session restarts, so the grace-window
    /// cutoff never moves forward across crashes.
    start_time: u64,
    root_batch_size: usize,
    read_batch_size: usize,
    blobs: Arc<dyn BlobBackend>,
    refs: Arc<dyn RefBackend>,
    docs: Arc<dyn DocumentStore>,
    log: ReachabilityLog,
    nodes: NodeCache,
    summary: GcSummary,
    started: Instant,
}

impl GcSession {
    /// Creates a session for one `(namespace, cycle)`.
    #[must_use]
    pub fn new(
        config: &GcConfig,
        policy: NamespacePolicy,
        cycle: u64,
        start_time: u64,
        blobs: Arc<dyn BlobBackend>,
        refs: Arc<dyn RefBackend>,
        docs: Arc<dyn DocumentStore>,
    ) -> Self {
        let namespace = policy.id.clone();
        let log = ReachabilityLog::new(Arc::clone(&docs), namespace.clone(), cycle);
        let nodes = NodeCache::new(Arc::clone(&docs), Arc::clone(&blobs), namespace.clone());
        Self {
            namespace: namespace.clone(),
            policy,
            cycle,
            start_time,
            root_batch_size: config.root_batch_size.max(1),
            read_batch_size: config.read_batch_size.max(1),
            blobs,
            refs,
            docs,
            log,
            nodes,
            summary: GcSummary::new(namespace, cycle),
            started: Instant::now(),
        }
    }

    /// The cycle this session is running.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Replays durable pages for this cycle, restoring the seen set and
    /// read cursor from a previous attempt.
    pub fn recover(&mut self) -> Result<()> {
        self.log.recover()
    }

    /// Enumerates every ref in the namespace and seeds the reachability log
    /// with the root set.
    ///
    /// A no-op if a recovered log shows root discovery already completed.
    /// Completion is durable: the read cursor is set to 0 and flushed only
    /// after every root's node record has been written.
    #[instrument(
        name = "blobsweep.gc.roots",
        skip(self, cancel),
        fields(namespace = %self.namespace, cycle = self.cycle)
    )]
    pub fn discover_roots(&mut self, cancel: &CancelToken) -> Result<()> {
        if self.log.read_index().is_some() {
            debug!("Root discovery already complete, skipping");
            return Ok(());
        }

        let now = current_timestamp();
        let mut pending: Vec<NodeRecord> = Vec::with_capacity(self.root_batch_size);
        let refs = Arc::clone(&self.refs);
        for entry in refs.enumerate_refs(&self.namespace)? {
            cancel.check()?;
            let entry = entry?;
            self.summary.refs_scanned += 1;

            let key = node_key(&self.namespace, entry.target.blob_id);
            if self.log.append(key)? {
                self.summary.roots_added += 1;
            }
            // Upsert regardless of append newness: after a crash the log
            // may already hold roots whose records were never written.
            pending.push(NodeRecord::placeholder(key, entry.target, now));
            if pending.len() >= self.root_batch_size {
                self.docs.insert_nodes_if_absent(&pending)?;
                pending.clear();
            }
        }
        if !pending.is_empty() {
            self.docs.insert_nodes_if_absent(&pending)?;
        }

        self.log.set_read_index(0)?;
        self.log.flush()?;

        info!(
            refs_scanned = self.summary.refs_scanned,
            roots_added = self.summary.roots_added,
            "Root discovery complete"
        );
        Ok(())
    }

    /// Propagates reachability breadth-first until the read cursor catches
    /// up with the head of the log.
    ///
    /// The cursor only advances over hashes whose imports have been
    /// appended, and cursor flushes piggyback on the open page, so a crash
    /// can never lose an edge: at worst a batch of hashes is reprocessed,
    /// and re-appending is a no-op.
    #[instrument(
        name = "blobsweep.gc.propagate",
        skip(self, cancel),
        fields(namespace = %self.namespace, cycle = self.cycle)
    )]
    pub fn propagate(&mut self, cancel: &CancelToken) -> Result<()> {
        let Some(mut index) = self.log.read_index() else {
            return Err(Error::InvariantViolation(
                "propagation started before root discovery completed".to_string(),
            ));
        };

        while index < self.log.head_index() {
            cancel.check()?;
            let batch: Vec<_> = self.log.slice(index, self.read_batch_size).to_vec();
            for key in batch {
                match self.nodes.get(key)? {
                    Some(record) => {
                        for import in self.nodes.imports(&record)? {
                            if self.log.append(import)? {
                                self.summary.edges_appended += 1;
                            }
                        }
                    },
                    None => {
                        // Should not happen: placeholders are written before
                        // their hash becomes readable from the log.
                        warn!(hash = %key, "Reachable hash has no node record");
                    },
                }
                index += 1;
                self.summary.hashes_processed += 1;
            }
            self.log.set_read_index(index)?;
            self.log.flush()?;
        }

        info!(
            hashes_processed = self.summary.hashes_processed,
            edges_appended = self.summary.edges_appended,
            reachable = self.log.head_index(),
            "Propagation complete"
        );
        Ok(())
    }

    /// Enumerates the physical backend and deletes unreachable blobs that
    /// aged past the grace window.
    ///
    /// An orphan without a node record is given a placeholder instead of
    /// being deleted, so deletion always lags first observation by at
    /// least one cycle. Placeholder timestamps are never refreshed: the
    /// grace clock starts at first observation.
    #[instrument(
        name = "blobsweep.gc.sweep",
        skip(self, cancel),
        fields(namespace = %self.namespace, cycle = self.cycle)
    )]
    pub fn sweep(&mut self, cancel: &CancelToken) -> Result<()> {
        let cutoff = self.start_time.saturating_sub(self.policy.delay_secs());
        let now = current_timestamp();

        let blobs = Arc::clone(&self.blobs);
        for entry in blobs.enumerate(&self.namespace)? {
            cancel.check()?;
            let entry = entry?;
            self.summary.blobs_scanned += 1;

            let Some(blob_id) = parse_blob_id_from_path(&entry.path) else {
                debug!(path = %entry.path, "Skipping non-blob object");
                continue;
            };
            let key = node_key(&self.namespace, blob_id);
            if self.log.contains(key) {
                continue;
            }

            match self.docs.get_node(key)? {
                Some(record) if record.last_touched < cutoff => {
                    self.blobs.delete(&self.namespace, &record.locator)?;
                    self.docs.delete_node(key)?;
                    self.summary.blobs_deleted += 1;
                    info!(
                        blob = %blob_id,
                        first_observed = record.last_touched,
                        "Deleted unreachable blob"
                    );
                },
                Some(_) => {
                    // Inside the grace window; reconsidered next cycle.
                    self.summary.orphans_deferred += 1;
                },
                None => {
                    let record = NodeRecord::placeholder(
                        key,
                        BlobLocator::new(entry.host.clone(), blob_id),
                        now,
                    );
                    self.docs.insert_node_if_absent(&record)?;
                    self.summary.orphans_deferred += 1;
                    debug!(blob = %blob_id, "Orphan first observed, deferring deletion");
                },
            }
        }

        info!(
            blobs_scanned = self.summary.blobs_scanned,
            blobs_deleted = self.summary.blobs_deleted,
            orphans_deferred = self.summary.orphans_deferred,
            "Sweep complete"
        );
        Ok(())
    }

    /// Finalizes the summary and records cycle metrics.
    pub fn finish(&mut self) -> GcSummary {
        self.summary.duration_ms = duration_to_millis(self.started.elapsed());

        metrics::counter!(
            "gc_session_runs_total",
            "namespace" => self.namespace.to_string()
        )
        .increment(1);
        metrics::counter!(
            "gc_blobs_deleted_total",
            "namespace" => self.namespace.to_string()
        )
        .increment(self.summary.blobs_deleted);
        metrics::gauge!("gc_reachable_blobs").set(u64_to_f64(self.log.head_index()));
        metrics::histogram!("gc_session_duration_ms").record(u64_to_f64(self.summary.duration_ms));

        info!(
            namespace = %self.namespace,
            cycle = self.cycle,
            summary = %self.summary.summary(),
            "GC session complete"
        );
        self.summary.clone()
    }

    /// Drives all phases in order and finalizes.
    ///
    /// # Errors
    ///
    /// Returns the first phase error; durable state stays consistent and a
    /// fresh session for the same cycle resumes cleanly.
    #[instrument(
        name = "blobsweep.gc.session",
        skip(self, cancel),
        fields(namespace = %self.namespace, cycle = self.cycle)
    )]
    pub fn run(&mut self, cancel: &CancelToken) -> Result<GcSummary> {
        self.recover()?;
        self.discover_roots(cancel)?;
        self.propagate(cancel)?;
        self.sweep(cancel)?;
        Ok(self.finish())
    }
}
