//! In-memory document store
//!
//! `MemoryStore` implements the external-store interface over a `DashMap`
//! keyed by store identifier. The binary seeds it from the snapshot at start
//! so that every command runs the full write-through protocol without a
//! network store, and loads the index from it. Tests use it as a
//! well-behaved store.
//!
//! # Thread Safety
//!
//! Documents are sharded by key inside the `DashMap`, so reads and writes
//! of different customers never block each other. Values handed out are
//! clones, never references into the map.

use crate::core::traits::{ExternalStore, RecordSource};
use crate::types::{CustomerRecord, LedgerError};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::warn;

/// Concurrent in-memory document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: DashMap<String, CustomerRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, one document per primary key
    ///
    /// Later records with an already present key are ignored, matching how
    /// the index treats duplicates.
    pub fn from_records(records: impl IntoIterator<Item = CustomerRecord>) -> Self {
        let store = Self::new();
        for record in records {
            if store.documents.contains_key(&record.tax_id) {
                warn!(key = %record.tax_id, "duplicate primary key while seeding, keeping first");
                continue;
            }
            store.documents.insert(record.tax_id.clone(), record);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Every stored document, ascending by store identifier
    pub fn documents(&self) -> Vec<CustomerRecord> {
        let mut documents: Vec<CustomerRecord> = self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        documents.sort_by(|a, b| a.tax_id.cmp(&b.tax_id));
        documents
    }
}

impl RecordSource for MemoryStore {
    fn read_all(&self) -> Result<Vec<CustomerRecord>, LedgerError> {
        Ok(self.documents())
    }
}

impl ExternalStore for MemoryStore {
    fn get_by_store_id(&self, id: &str) -> Result<Option<CustomerRecord>, LedgerError> {
        Ok(self.documents.get(id).map(|entry| entry.value().clone()))
    }

    fn set_by_store_id(&self, id: &str, record: &CustomerRecord) -> Result<(), LedgerError> {
        self.documents.insert(id.to_string(), record.clone());
        Ok(())
    }

    /// # Errors
    ///
    /// * `NotFound` - no document under `id`
    /// * `Validation` - the fields do not fit the record shape; the stored
    ///   document is left untouched
    fn update_fields(&self, id: &str, fields: &Map<String, Value>) -> Result<(), LedgerError> {
        let mut entry = self
            .documents
            .get_mut(id)
            .ok_or_else(|| LedgerError::not_found(id))?;

        let mut updated = entry.value().clone();
        updated.merge_fields(fields)?;
        *entry.value_mut() = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_and_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get_by_store_id("1"), Ok(None));

        store
            .set_by_store_id("1", &CustomerRecord::new("1", "Ana"))
            .unwrap();

        let found = store.get_by_store_id("1").unwrap().unwrap();
        assert_eq!(found.name, "Ana");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_seed_keeps_first_duplicate() {
        let store = MemoryStore::from_records(vec![
            CustomerRecord::new("2", "first"),
            CustomerRecord::new("1", "one"),
            CustomerRecord::new("2", "second"),
        ]);

        let names: Vec<_> = store.documents().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["one", "first"]);
    }

    #[test]
    fn test_update_fields_merges() {
        let store = MemoryStore::from_records(vec![CustomerRecord::new("1", "Ana")]);
        let fields = json!({"state": "BA", "referrer": null});

        store.update_fields("1", fields.as_object().unwrap()).unwrap();

        let record = store.get_by_store_id("1").unwrap().unwrap();
        assert_eq!(record.state.as_deref(), Some("BA"));
        assert_eq!(record.referrer, None);
    }

    #[test]
    fn test_update_fields_errors() {
        let store = MemoryStore::from_records(vec![CustomerRecord::new("1", "Ana")]);

        let missing = store.update_fields("9", &Map::new());
        assert!(matches!(missing, Err(LedgerError::NotFound { .. })));

        let bad = json!({"withdrawals": 5});
        assert!(store.update_fields("1", bad.as_object().unwrap()).is_err());
        assert!(store.get_by_store_id("1").unwrap().unwrap().withdrawals.is_empty());
    }
}
