//! End-to-end garbage collection cycle tests over the in-memory backends.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use blobsweep::bundle::encode_header;
use blobsweep::config::{GcConfig, NamespacePolicy};
use blobsweep::models::{BlobLocator, NamespaceId, NodeRecord, node_key};
use blobsweep::storage::memory::{
    MemoryBlobStore, MemoryDocumentStore, MemoryLockBackend, MemoryRefStore,
};
use blobsweep::storage::{
    BlobBackend, BlobIter, CancelToken, DocumentStore, LockBackend, RefBackend,
};
use blobsweep::{Error, GcScheduler, GcSession, current_timestamp};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

const HOUR: u64 = 3600;

struct World {
    config: GcConfig,
    policy: NamespacePolicy,
    ns: NamespaceId,
    blobs: Arc<MemoryBlobStore>,
    refs: Arc<MemoryRefStore>,
    docs: Arc<MemoryDocumentStore>,
    locks: Arc<MemoryLockBackend>,
}

impl World {
    fn new() -> Self {
        let policy = NamespacePolicy::new("game.assets").with_delay_hours(6.0);
        Self {
            config: GcConfig::new().with_namespace(policy.clone()),
            policy,
            ns: NamespaceId::new("game.assets"),
            blobs: Arc::new(MemoryBlobStore::new()),
            refs: Arc::new(MemoryRefStore::new()),
            docs: Arc::new(MemoryDocumentStore::new()),
            locks: Arc::new(MemoryLockBackend::new()),
        }
    }

    /// Stores a blob whose header imports the given locators.
    fn put_blob(&self, imports: &[BlobLocator], payload: &[u8]) -> BlobLocator {
        let mut bytes = encode_header(imports);
        bytes.extend_from_slice(payload);
        self.blobs.put(&self.ns, bytes, current_timestamp())
    }

    fn session(&self, cycle: u64, start_time: u64) -> GcSession {
        self.session_over(cycle, start_time, Arc::clone(&self.blobs) as Arc<dyn BlobBackend>)
    }

    fn session_over(&self, cycle: u64, start_time: u64, blobs: Arc<dyn BlobBackend>) -> GcSession {
        GcSession::new(
            &self.config,
            self.policy.clone(),
            cycle,
            start_time,
            blobs,
            Arc::clone(&self.refs) as Arc<dyn RefBackend>,
            Arc::clone(&self.docs) as Arc<dyn DocumentStore>,
        )
    }

    fn scheduler(&self) -> GcScheduler {
        GcScheduler::new(
            self.config.clone(),
            Arc::clone(&self.blobs) as Arc<dyn BlobBackend>,
            Arc::clone(&self.refs) as Arc<dyn RefBackend>,
            Arc::clone(&self.docs) as Arc<dyn DocumentStore>,
            Arc::clone(&self.locks) as Arc<dyn LockBackend>,
        )
    }
}

/// Blob backend that fails prefix reads once a read budget is exhausted,
/// simulating a backend outage partway through propagation.
struct FailingBlobStore {
    inner: Arc<MemoryBlobStore>,
    budget: AtomicI64,
}

impl FailingBlobStore {
    fn new(inner: Arc<MemoryBlobStore>, budget: i64) -> Self {
        Self {
            inner,
            budget: AtomicI64::new(budget),
        }
    }
}

impl BlobBackend for FailingBlobStore {
    fn enumerate(&self, namespace: &NamespaceId) -> blobsweep::Result<BlobIter<'_>> {
        self.inner.enumerate(namespace)
    }

    fn read_prefix(
        &self,
        namespace: &NamespaceId,
        locator: &BlobLocator,
        len: usize,
    ) -> blobsweep::Result<Option<Vec<u8>>> {
        if self.budget.fetch_sub(1, Ordering::SeqCst) <= 0 {
            return Err(Error::operation("read_prefix", "injected outage"));
        }
        self.inner.read_prefix(namespace, locator, len)
    }

    fn delete(&self, namespace: &NamespaceId, locator: &BlobLocator) -> blobsweep::Result<bool> {
        self.inner.delete(namespace, locator)
    }
}

/// A referenced chain survives a full scheduler tick while an unreachable
/// blob whose record has aged past the grace window is deleted, record and
/// all. Per-cycle pages are discarded afterwards.
#[test]
fn test_tick_keeps_reachable_chain_and_deletes_aged_orphan() {
    let w = World::new();
    let now = current_timestamp();

    let leaf = w.put_blob(&[], b"leaf payload");
    let root = w.put_blob(&[leaf.clone()], b"root payload");
    w.refs.set_ref(&w.ns, "main", root.clone());

    // The orphan was first observed unreachable two cycles ago.
    let orphan = w.put_blob(&[], b"orphan payload");
    let orphan_key = node_key(&w.ns, orphan.blob_id);
    w.docs
        .insert_node_if_absent(&NodeRecord::placeholder(
            orphan_key,
            orphan.clone(),
            now - 7 * HOUR,
        ))
        .expect("seed orphan record");

    let summary = w
        .scheduler()
        .tick(&CancelToken::new())
        .expect("tick")
        .expect("namespace due");

    assert_eq!(summary.roots_added, 1);
    assert_eq!(summary.edges_appended, 1);
    assert_eq!(summary.blobs_deleted, 1);
    assert!(w.blobs.contains(&w.ns, root.blob_id));
    assert!(w.blobs.contains(&w.ns, leaf.blob_id));
    assert!(!w.blobs.contains(&w.ns, orphan.blob_id));
    assert!(w.docs.get_node(orphan_key).expect("get").is_none());
    assert_eq!(w.docs.page_count(), 0);
}

/// A fresh orphan is only observed on its first cycle and deleted on a
/// later one, once its placeholder has aged past the grace window.
#[test]
fn test_orphan_survives_first_cycle_then_deleted() {
    let w = World::new();
    let t0 = 1_700_000_000u64;
    let orphan = w.put_blob(&[], b"young orphan");

    let first = w
        .session(1, t0)
        .run(&CancelToken::new())
        .expect("cycle 1");
    assert_eq!(first.blobs_deleted, 0);
    assert_eq!(first.orphans_deferred, 1);
    assert!(w.blobs.contains(&w.ns, orphan.blob_id));

    let key = node_key(&w.ns, orphan.blob_id);
    let record = w.docs.get_node(key).expect("get").expect("placeholder");

    // One hour after first observation: still inside the window.
    let second = w
        .session(2, record.last_touched + HOUR)
        .run(&CancelToken::new())
        .expect("cycle 2");
    assert_eq!(second.blobs_deleted, 0);
    assert!(w.blobs.contains(&w.ns, orphan.blob_id));

    // Seven hours after first observation: past the window, deleted.
    let third = w
        .session(3, record.last_touched + 7 * HOUR)
        .run(&CancelToken::new())
        .expect("cycle 3");
    assert_eq!(third.blobs_deleted, 1);
    assert!(!w.blobs.contains(&w.ns, orphan.blob_id));
}

/// A session killed mid-propagation resumes from its durable cursor: no
/// reachability is lost, no blob is deleted, and blobs whose imports were
/// already persisted are not re-read from the blob store.
#[test]
fn test_crash_mid_propagation_resumes_without_rework() {
    let w = World::new();
    let now = current_timestamp();

    // One root importing 1200 leaves: the log seals a full page of 1000
    // during propagation.
    let leaves: Vec<BlobLocator> = (0..1200)
        .map(|n: u32| w.put_blob(&[], &n.to_le_bytes()))
        .collect();
    let root = w.put_blob(&leaves, b"wide root");
    w.refs.set_ref(&w.ns, "main", root.clone());

    // Enough reads for the root header plus a few hundred leaves, then an
    // outage mid-batch.
    let failing = Arc::new(FailingBlobStore::new(Arc::clone(&w.blobs), 500));
    let mut crashed = w.session_over(1, now, failing as Arc<dyn BlobBackend>);
    let err = crashed.run(&CancelToken::new()).expect_err("outage aborts");
    assert!(matches!(err, Error::OperationFailed { .. }));

    // Durable pages are contiguous and the first is exactly full.
    let pages = w.docs.list_pages(&w.ns, 1).expect("pages");
    assert!(!pages.is_empty());
    assert_eq!(pages[0].base_index, 0);
    assert_eq!(pages[0].hashes.len(), 1000);

    let reads_before_resume = w.blobs.prefix_read_count();
    let summary = w
        .session(1, now)
        .run(&CancelToken::new())
        .expect("resumed cycle");
    let resume_reads = w.blobs.prefix_read_count() - reads_before_resume;

    // Everything stays reachable.
    assert_eq!(summary.blobs_deleted, 0);
    assert!(w.blobs.contains(&w.ns, root.blob_id));
    for leaf in &leaves {
        assert!(w.blobs.contains(&w.ns, leaf.blob_id));
    }

    // Imports persisted before the crash are served from node records, so
    // the resume reads fewer blobs than a from-scratch traversal would.
    assert!(resume_reads < 1201, "resume re-read too much: {resume_reads}");

    // Root discovery is not repeated on resume.
    assert_eq!(summary.roots_added, 0);
}

/// A crash during root discovery leaves pages with the pending read cursor
/// and some root records unwritten. The resumed session re-runs discovery:
/// recovered roots are not re-appended, every root's record is backfilled,
/// and nothing reachable is deleted.
#[test]
fn test_crash_mid_root_discovery_resumes() {
    let w = World::new();
    let now = current_timestamp();

    let roots: Vec<BlobLocator> = (0..1100)
        .map(|n: u32| {
            let locator = w.put_blob(&[], &n.to_le_bytes());
            w.refs.set_ref(&w.ns, format!("builds/{n:04}"), locator.clone());
            locator
        })
        .collect();

    // The crashed attempt sealed page 0 with 1000 root keys but died before
    // writing any node records or completing discovery.
    let mut page = blobsweep::ReachabilityPage::new(1, 0, blobsweep::models::READ_INDEX_PENDING);
    for locator in &roots[..1000] {
        page.hashes.push(node_key(&w.ns, locator.blob_id));
    }
    w.docs.upsert_page(&w.ns, &page).expect("page 0");
    assert_eq!(w.docs.node_count(), 0);

    let summary = w
        .session(1, now)
        .run(&CancelToken::new())
        .expect("resumed cycle");

    // Discovery re-ran over every ref; only the 100 unrecovered roots were
    // newly appended.
    assert_eq!(summary.refs_scanned, 1100);
    assert_eq!(summary.roots_added, 100);
    assert_eq!(summary.blobs_deleted, 0);

    // Every root, recovered or not, got its record backfilled.
    assert_eq!(w.docs.node_count(), 1100);
    for locator in &roots {
        let key = node_key(&w.ns, locator.blob_id);
        let record = w.docs.get_node(key).expect("get").expect("backfilled");
        assert!(w.blobs.contains(&w.ns, record.locator.blob_id));
    }
}

/// A cycle whose only durable artifact is a sealed page 0 recovers exactly
/// those 1000 hashes, skips root discovery, and extracts imports only for
/// hashes whose records do not already carry them.
#[test]
fn test_recovery_from_sealed_page_zero() {
    let w = World::new();
    let now = current_timestamp();

    let mut page = blobsweep::ReachabilityPage::new(1, 0, 0);
    for n in 0..1000u32 {
        let locator = w.put_blob(&[], &n.to_le_bytes());
        let key = node_key(&w.ns, locator.blob_id);
        page.hashes.push(key);
        w.docs
            .insert_node_if_absent(&NodeRecord::placeholder(key, locator, now))
            .expect("record");
        // The first half already had their (empty) imports persisted
        // before the crash.
        if n < 500 {
            w.docs.set_node_imports(key, &[]).expect("imports");
        }
    }
    w.docs.upsert_page(&w.ns, &page).expect("page 0");

    let reads_before = w.blobs.prefix_read_count();
    let summary = w
        .session(1, now)
        .run(&CancelToken::new())
        .expect("resumed cycle");

    assert_eq!(summary.roots_added, 0);
    assert_eq!(summary.hashes_processed, 1000);
    assert_eq!(summary.blobs_deleted, 0);
    // Only the 500 records without persisted imports hit the blob store.
    assert_eq!(w.blobs.prefix_read_count() - reads_before, 500);
}

/// Recovery is idempotent: replaying the same durable pages twice yields
/// the same log and a completed cycle re-run deletes nothing new.
#[test]
fn test_completed_cycle_rerun_is_noop() {
    let w = World::new();
    let now = current_timestamp();
    let root = w.put_blob(&[], b"root");
    w.refs.set_ref(&w.ns, "main", root);

    let first = w.session(1, now).run(&CancelToken::new()).expect("run");
    let second = w
        .session(1, now)
        .run(&CancelToken::new())
        .expect("re-run");

    assert_eq!(second.roots_added, 0);
    assert_eq!(second.hashes_processed, 0);
    assert_eq!(second.blobs_deleted, first.blobs_deleted);
}

/// Two scheduler processes contend for one namespace: the loser observes a
/// held lock, makes no writes, and succeeds once the lock is free.
#[test]
fn test_lock_contention_leaves_loser_without_writes() {
    let w = World::new();
    let orphan = w.put_blob(&[], b"contended orphan");
    let key = node_key(&w.ns, orphan.blob_id);
    w.docs
        .insert_node_if_absent(&NodeRecord::placeholder(
            key,
            orphan.clone(),
            current_timestamp() - 7 * HOUR,
        ))
        .expect("seed record");

    let winner_lease = w
        .locks
        .try_acquire("gc:game.assets", Duration::from_secs(60))
        .expect("acquire")
        .expect("lock free");

    // The loser's tick finds the namespace due but locked.
    let loser = w.scheduler();
    assert!(loser.tick(&CancelToken::new()).expect("tick").is_none());
    assert!(w.blobs.contains(&w.ns, orphan.blob_id));
    assert_eq!(w.docs.page_count(), 0);

    w.locks.release(winner_lease).expect("release");
    let summary = loser
        .tick(&CancelToken::new())
        .expect("tick")
        .expect("now collectable");
    assert_eq!(summary.blobs_deleted, 1);
    assert!(!w.blobs.contains(&w.ns, orphan.blob_id));
}

/// Deleting a ref makes its subtree collectable, but only after the grace
/// window; shared blobs reachable from a surviving ref are never touched.
#[test]
fn test_ref_removal_orphans_subtree_but_not_shared_blobs() {
    let w = World::new();
    let t0 = 1_700_000_000u64;

    let shared = w.put_blob(&[], b"shared leaf");
    let keep_root = w.put_blob(&[shared.clone()], b"kept root");
    let drop_root = w.put_blob(&[shared.clone()], b"dropped root");
    w.refs.set_ref(&w.ns, "keep", keep_root.clone());
    w.refs.set_ref(&w.ns, "drop", drop_root.clone());

    w.session(1, t0).run(&CancelToken::new()).expect("cycle 1");
    assert!(w.blobs.contains(&w.ns, drop_root.blob_id));

    w.refs.remove_ref(&w.ns, "drop");

    // First cycle without the ref: the root is a fresh orphan. Its record
    // exists from cycle 1 root discovery, timestamped then, so age it out
    // with a start far enough in the future.
    let drop_key = node_key(&w.ns, drop_root.blob_id);
    let record = w.docs.get_node(drop_key).expect("get").expect("record");
    let late = record.last_touched + 7 * HOUR;

    let summary = w.session(2, late).run(&CancelToken::new()).expect("cycle 2");
    assert_eq!(summary.blobs_deleted, 1);
    assert!(!w.blobs.contains(&w.ns, drop_root.blob_id));
    assert!(w.blobs.contains(&w.ns, keep_root.blob_id));
    assert!(w.blobs.contains(&w.ns, shared.blob_id));
}
