//! Cluster-wide GC scheduling.
//!
//! The scheduler keeps durable per-namespace cycle state in a single
//! versioned document, picks the earliest-due namespace on each tick, and
//! drives one [`GcSession`] to completion under a cross-process TTL lock.
//! Multiple processes may collect different namespaces concurrently; the
//! per-namespace lock guarantees no two ever collect the same one.
//!
//! One namespace is advanced per tick per process. Lock contention is not
//! an error: the loser just moves to the next-due namespace. The lock
//! lease is renewed at session phase boundaries so long sweeps outlive the
//! TTL without ever running unfenced.

use crate::config::{GcConfig, NamespacePolicy};
use crate::models::GcStateDocument;
use crate::storage::{BlobBackend, CancelToken, DocumentStore, LockBackend, LockLease, RefBackend};
use crate::{Error, Result, current_timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::session::{GcSession, GcSummary};

/// Attempts before giving up on a state-document version conflict.
const MAX_STATE_RETRIES: usize = 16;

/// Periodic garbage collection scheduler.
pub struct GcScheduler {
    config: GcConfig,
    blobs: Arc<dyn BlobBackend>,
    refs: Arc<dyn RefBackend>,
    docs: Arc<dyn DocumentStore>,
    locks: Arc<dyn LockBackend>,
}

impl GcScheduler {
    /// Creates a scheduler over the given backends.
    #[must_use]
    pub fn new(
        config: GcConfig,
        blobs: Arc<dyn BlobBackend>,
        refs: Arc<dyn RefBackend>,
        docs: Arc<dyn DocumentStore>,
        locks: Arc<dyn LockBackend>,
    ) -> Self {
        Self {
            config,
            blobs,
            refs,
            docs,
            locks,
        }
    }

    /// Lock key for a namespace.
    fn lock_key(policy: &NamespacePolicy) -> String {
        format!("gc:{}", policy.id)
    }

    fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.config.lock_ttl_secs)
    }

    /// Read-modify-upsert on the singleton state document, retried on
    /// version conflicts (optimistic concurrency).
    fn update_state<F>(&self, mut apply: F) -> Result<GcStateDocument>
    where
        F: FnMut(&mut GcStateDocument),
    {
        for _ in 0..MAX_STATE_RETRIES {
            let (mut doc, version) = self.docs.load_state()?;
            apply(&mut doc);
            if self.docs.try_store_state(version, &doc)? {
                return Ok(doc);
            }
        }
        Err(Error::operation(
            "update_state",
            "too many state document version conflicts",
        ))
    }

    /// Brings the state document in line with the configured namespaces:
    /// new namespaces get an idle record, stale records are dropped.
    fn sync_state(&self) -> Result<()> {
        let (doc, _) = self.docs.load_state()?;
        let missing = self
            .config
            .namespaces
            .iter()
            .any(|p| !doc.namespaces.contains_key(&p.id));
        let stale = doc
            .namespaces
            .keys()
            .any(|id| self.config.policy(id).is_none());
        if !missing && !stale {
            return Ok(());
        }

        self.update_state(|doc| {
            for policy in &self.config.namespaces {
                doc.namespaces.entry(policy.id.clone()).or_default();
            }
            doc.namespaces.retain(|id, _| self.config.policy(id).is_some());
        })?;
        Ok(())
    }

    /// Runs one scheduling iteration: collect the earliest-due namespace
    /// whose lock is free.
    ///
    /// Returns `Ok(None)` when nothing is due or every due namespace is
    /// locked by another process.
    #[instrument(name = "blobsweep.gc.tick", skip(self, cancel))]
    pub fn tick(&self, cancel: &CancelToken) -> Result<Option<GcSummary>> {
        cancel.check()?;
        self.sync_state()?;
        metrics::counter!("gc_scheduler_ticks_total").increment(1);

        let (state, _) = self.docs.load_state()?;
        let now = current_timestamp();

        // A namespace with a cycle already in flight (e.g. a crashed
        // holder elsewhere) is due immediately; otherwise due at
        // last start + frequency.
        let mut due: Vec<(u64, &NamespacePolicy)> = self
            .config
            .namespaces
            .iter()
            .map(|policy| {
                let ns_state = state.namespaces.get(&policy.id).cloned().unwrap_or_default();
                let due_at = if ns_state.is_active() {
                    0
                } else {
                    ns_state.last_start_time + policy.frequency_secs()
                };
                (due_at, policy)
            })
            .filter(|(due_at, _)| *due_at <= now)
            .collect();
        due.sort_by(|a, b| (a.0, &a.1.id).cmp(&(b.0, &b.1.id)));

        for (_, policy) in due {
            cancel.check()?;
            let Some(lease) = self.locks.try_acquire(&Self::lock_key(policy), self.lock_ttl())?
            else {
                metrics::counter!("gc_lock_contention_total").increment(1);
                debug!(namespace = %policy.id, "Namespace locked by another process");
                continue;
            };

            let result = self.collect_namespace(policy, &lease, cancel);
            if let Err(e) = self.locks.release(lease) {
                warn!(namespace = %policy.id, error = %e, "Failed to release namespace lock");
            }
            return result.map(Some);
        }

        Ok(None)
    }

    /// Allocates or resumes the namespace's cycle, runs the session phase
    /// by phase (renewing the lease between phases), and on completion
    /// discards per-cycle bookkeeping and marks the namespace idle.
    fn collect_namespace(
        &self,
        policy: &NamespacePolicy,
        lease: &LockLease,
        cancel: &CancelToken,
    ) -> Result<GcSummary> {
        let now = current_timestamp();
        let doc = self.update_state(|doc| {
            let idle = doc.namespaces.get(&policy.id).is_none_or(|e| !e.is_active());
            if idle {
                let cycle = doc.allocate_cycle();
                let entry = doc.namespaces.entry(policy.id.clone()).or_default();
                entry.cycle = cycle;
                entry.start_time = now;
            }
        })?;
        let ns_state = doc
            .namespaces
            .get(&policy.id)
            .cloned()
            .ok_or_else(|| Error::operation("collect", "namespace state vanished"))?;
        let (cycle, start_time) = (ns_state.cycle, ns_state.start_time);

        info!(
            namespace = %policy.id,
            cycle,
            start_time,
            "Starting GC session"
        );

        let mut session = GcSession::new(
            &self.config,
            policy.clone(),
            cycle,
            start_time,
            Arc::clone(&self.blobs),
            Arc::clone(&self.refs),
            Arc::clone(&self.docs),
        );
        session.recover()?;
        self.renew(lease)?;
        session.discover_roots(cancel)?;
        self.renew(lease)?;
        session.propagate(cancel)?;
        self.renew(lease)?;
        session.sweep(cancel)?;
        let summary = session.finish();

        // Cycle done: per-cycle pages go away and the namespace returns to
        // idle with its last start time advanced.
        self.docs.delete_pages(&policy.id, cycle)?;
        self.update_state(|doc| {
            if let Some(entry) = doc.namespaces.get_mut(&policy.id) {
                entry.cycle = 0;
                entry.last_start_time = start_time;
            }
        })?;

        Ok(summary)
    }

    /// Renews the lease; losing it means another process may own the
    /// namespace, so the session must stop.
    fn renew(&self, lease: &LockLease) -> Result<()> {
        if self.locks.renew(lease, self.lock_ttl())? {
            Ok(())
        } else {
            Err(Error::operation("lock_renew", "namespace lease lost"))
        }
    }

    /// Runs the periodic scheduler loop until cancelled.
    ///
    /// Intended to be spawned as a dedicated background task; each tick
    /// performs blocking backend I/O.
    pub async fn run(&self, cancel: CancelToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(
            self.config.tick_interval_secs.max(1),
        ));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.config.tick_interval_secs,
            namespaces = self.config.namespaces.len(),
            "GC scheduler started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("GC scheduler shutting down");
                    break;
                },
                _ = interval.tick() => {
                    match self.tick(&cancel) {
                        Ok(Some(summary)) => {
                            info!(result = %summary.summary(), "GC tick collected a namespace");
                        },
                        Ok(None) => debug!("No namespace due"),
                        Err(Error::Cancelled) => {
                            info!("GC scheduler shutting down");
                            break;
                        },
                        Err(e) => warn!(error = %e, "GC tick failed, retrying next tick"),
                    }
                },
            }
        }
    }
}
