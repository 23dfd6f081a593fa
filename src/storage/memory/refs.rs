//! In-memory ref store.

use crate::Result;
use crate::models::{BlobLocator, NamespaceId, RefEntry};
use crate::storage::traits::{RefBackend, RefIter};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// In-memory [`RefBackend`].
#[derive(Debug, Default)]
pub struct MemoryRefStore {
    refs: Mutex<HashMap<NamespaceId, BTreeMap<String, BlobLocator>>>,
}

impl MemoryRefStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Points a ref at a blob, creating or retargeting it.
    pub fn set_ref(&self, namespace: &NamespaceId, name: impl Into<String>, target: BlobLocator) {
        let mut refs = self.refs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        refs.entry(namespace.clone())
            .or_default()
            .insert(name.into(), target);
    }

    /// Removes a ref. Returns whether it existed.
    pub fn remove_ref(&self, namespace: &NamespaceId, name: &str) -> bool {
        let mut refs = self.refs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        refs.get_mut(namespace).is_some_and(|m| m.remove(name).is_some())
    }
}

impl RefBackend for MemoryRefStore {
    fn enumerate_refs(&self, namespace: &NamespaceId) -> Result<RefIter<'_>> {
        let refs = self.refs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entries: Vec<RefEntry> = refs
            .get(namespace)
            .map(|m| {
                m.iter()
                    .map(|(name, target)| RefEntry {
                        name: name.clone(),
                        target: target.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::BlobId;

    #[test]
    fn test_set_enumerate_remove() {
        let store = MemoryRefStore::new();
        let ns = NamespaceId::new("ns");
        let target = BlobLocator::new("memory", BlobId::from_content(b"root"));
        store.set_ref(&ns, "builds/nightly", target.clone());

        let entries: Vec<_> = store
            .enumerate_refs(&ns)
            .expect("enumerate")
            .collect::<Result<_>>()
            .expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "builds/nightly");
        assert_eq!(entries[0].target, target);

        assert!(store.remove_ref(&ns, "builds/nightly"));
        assert!(!store.remove_ref(&ns, "builds/nightly"));
    }

    #[test]
    fn test_empty_namespace_yields_nothing() {
        let store = MemoryRefStore::new();
        let entries: Vec<_> = store
            .enumerate_refs(&NamespaceId::new("empty"))
            .expect("enumerate")
            .collect();
        assert!(entries.is_empty());
    }
}
