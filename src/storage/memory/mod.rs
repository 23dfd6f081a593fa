//! In-memory reference implementations of the storage traits.
//!
//! These back the test suite and double as the reference semantics for real
//! backends: the document store round-trips every document through JSON the
//! way a document database would, and the lock backend enforces TTL leases
//! with fencing tokens.

mod blob;
mod documents;
mod lock;
mod refs;

pub use blob::MemoryBlobStore;
pub use documents::MemoryDocumentStore;
pub use lock::MemoryLockBackend;
pub use refs::MemoryRefStore;
