//! Ref store trait.

use crate::Result;
use crate::models::{NamespaceId, RefEntry};

/// Streaming enumeration of the refs in a namespace.
pub type RefIter<'a> = Box<dyn Iterator<Item = Result<RefEntry>> + Send + 'a>;

/// Trait for the ref-name-to-blob mapping store.
///
/// Refs are the GC's root set: every ref target is unconditionally
/// reachable.
pub trait RefBackend: Send + Sync {
    /// Enumerates every ref in the namespace with its target locator.
    fn enumerate_refs(&self, namespace: &NamespaceId) -> Result<RefIter<'_>>;
}
