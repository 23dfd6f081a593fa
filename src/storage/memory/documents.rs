//! In-memory document store.

use crate::models::{GcStateDocument, Hash, NamespaceId, NodeRecord, ReachabilityPage};
use crate::storage::traits::DocumentStore;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// In-memory [`DocumentStore`].
///
/// Every document is stored as serialized JSON and deserialized on read,
/// matching the behavior of the document databases real deployments use and
/// keeping the serde round-trip honest in tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    /// Pages keyed by `(namespace, cycle, base_index)`; BTreeMap keeps the
    /// range scan ordered by base index for free.
    pages: Mutex<BTreeMap<(NamespaceId, u64, u64), String>>,
    nodes: Mutex<HashMap<Hash, String>>,
    /// `(document_json, version)`; version 0 means "never written".
    state: Mutex<(Option<String>, u64)>,
}

fn encode<T: serde::Serialize>(operation: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::operation(operation, e))
}

fn decode<T: serde::de::DeserializeOwned>(operation: &str, json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| Error::operation(operation, e))
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of node records currently stored. Test observability.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Number of pages currently stored across all cycles. Test observability.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn upsert_page(&self, namespace: &NamespaceId, page: &ReachabilityPage) -> Result<()> {
        let json = encode("upsert_page", page)?;
        let mut pages = self.pages.lock().map_err(|e| Error::operation("upsert_page", e))?;
        pages.insert((namespace.clone(), page.cycle, page.base_index), json);
        Ok(())
    }

    fn list_pages(&self, namespace: &NamespaceId, cycle: u64) -> Result<Vec<ReachabilityPage>> {
        let pages = self.pages.lock().map_err(|e| Error::operation("list_pages", e))?;
        pages
            .range((namespace.clone(), cycle, 0)..=(namespace.clone(), cycle, u64::MAX))
            .map(|(_, json)| decode("list_pages", json))
            .collect()
    }

    fn delete_pages(&self, namespace: &NamespaceId, cycle: u64) -> Result<usize> {
        let mut pages = self.pages.lock().map_err(|e| Error::operation("delete_pages", e))?;
        let keys: Vec<_> = pages
            .range((namespace.clone(), cycle, 0)..=(namespace.clone(), cycle, u64::MAX))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            pages.remove(key);
        }
        Ok(keys.len())
    }

    fn get_node(&self, id: Hash) -> Result<Option<NodeRecord>> {
        let nodes = self.nodes.lock().map_err(|e| Error::operation("get_node", e))?;
        nodes.get(&id).map(|json| decode("get_node", json)).transpose()
    }

    fn insert_node_if_absent(&self, record: &NodeRecord) -> Result<bool> {
        let json = encode("insert_node", record)?;
        let mut nodes = self.nodes.lock().map_err(|e| Error::operation("insert_node", e))?;
        if nodes.contains_key(&record.id) {
            return Ok(false);
        }
        nodes.insert(record.id, json);
        Ok(true)
    }

    fn set_node_imports(&self, id: Hash, imports: &[Hash]) -> Result<()> {
        let mut nodes = self.nodes.lock().map_err(|e| Error::operation("set_node_imports", e))?;
        let Some(json) = nodes.get(&id) else {
            return Err(Error::operation(
                "set_node_imports",
                format!("no node record for {id}"),
            ));
        };
        let mut record: NodeRecord = decode("set_node_imports", json)?;
        record.imports = Some(imports.to_vec());
        let json = encode("set_node_imports", &record)?;
        nodes.insert(id, json);
        Ok(())
    }

    fn delete_node(&self, id: Hash) -> Result<bool> {
        let mut nodes = self.nodes.lock().map_err(|e| Error::operation("delete_node", e))?;
        Ok(nodes.remove(&id).is_some())
    }

    fn load_state(&self) -> Result<(GcStateDocument, u64)> {
        let state = self.state.lock().map_err(|e| Error::operation("load_state", e))?;
        let (json, version) = &*state;
        let doc = match json {
            Some(json) => decode("load_state", json)?,
            None => GcStateDocument::default(),
        };
        Ok((doc, *version))
    }

    fn try_store_state(&self, expected_version: u64, doc: &GcStateDocument) -> Result<bool> {
        let json = encode("store_state", doc)?;
        let mut state = self.state.lock().map_err(|e| Error::operation("store_state", e))?;
        if state.1 != expected_version {
            return Ok(false);
        }
        *state = (Some(json), expected_version + 1);
        Ok(true)
    }
}
