//! Storage collaborators for the garbage collector.
//!
//! The GC core depends only on four narrow traits (blob backend, ref
//! store, document store and distributed lock) consumed as
//! `Arc<dyn Trait + Send + Sync>` so the host system can plug in disk,
//! object-store or database implementations. In-memory reference
//! implementations live in [`memory`] and back the test suite.

mod cancel;
pub mod memory;
pub mod traits;

pub use cancel::CancelToken;
pub use traits::{
    BlobBackend, BlobIter, DocumentStore, LockBackend, LockLease, RefBackend, RefIter,
    parse_blob_id_from_path,
};
