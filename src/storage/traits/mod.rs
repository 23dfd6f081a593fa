//! Storage backend traits.

mod blob;
mod documents;
mod lock;
mod refs;

pub use blob::{BlobBackend, BlobIter, parse_blob_id_from_path};
pub use documents::DocumentStore;
pub use lock::{LockBackend, LockLease};
pub use refs::{RefBackend, RefIter};
