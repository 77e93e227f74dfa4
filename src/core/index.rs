//! Shared customer index
//!
//! `CustomerIndex` is the single owning component around the ordered index.
//! It is cheap to clone (every clone shares the same tree) and hands out
//! copies of records, never references into the tree, so callers can hold
//! on to results while the tree is rebalanced underneath them.
//!
//! # Thread Safety
//!
//! The tree sits behind an `RwLock`: traversals take the read side, every
//! structural change takes the write side, so a rotation is never observed
//! half-done. A poisoned lock is recovered rather than propagated; every
//! write leaves the tree in a valid state before anything can panic.

use crate::core::tree::AvlTree;
use crate::types::{CustomerRecord, PrimaryKey};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Tree type stored by the index
pub type CustomerTree = AvlTree<PrimaryKey, CustomerRecord>;

/// Lock-guarded, shareable ordered index of customer records
#[derive(Clone, Default)]
pub struct CustomerIndex {
    tree: Arc<RwLock<CustomerTree>>,
}

impl CustomerIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already built tree
    pub fn from_tree(tree: CustomerTree) -> Self {
        CustomerIndex {
            tree: Arc::new(RwLock::new(tree)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CustomerTree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CustomerTree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a freshly loaded tree
    pub fn reload(&self, tree: CustomerTree) {
        *self.write() = tree;
    }

    /// Copy of the record stored under `key`
    pub fn find(&self, key: &str) -> Option<CustomerRecord> {
        self.read().find(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains(key)
    }

    /// Ascending snapshot of every record
    ///
    /// Recomputed on each call; this is the input of every aggregation.
    pub fn snapshot(&self) -> Vec<CustomerRecord> {
        self.read().iter().map(|(_, record)| record.clone()).collect()
    }

    /// Insert a record under its own primary key
    ///
    /// Returns `false` (and keeps the stored record) if the key exists.
    pub fn insert(&self, record: CustomerRecord) -> bool {
        self.write().insert(record.tax_id.clone(), record)
    }

    /// Remove and return the record under `key`
    pub fn remove(&self, key: &str) -> Option<CustomerRecord> {
        self.write().remove(key)
    }

    /// Evict `stale_key` and insert `record` under its primary key
    ///
    /// Both steps happen under one write guard, so no traversal can see the
    /// record missing in between.
    pub fn replace(&self, stale_key: &str, record: CustomerRecord) -> Option<CustomerRecord> {
        let mut tree = self.write();
        let previous = tree.remove(stale_key);
        tree.insert(record.tax_id.clone(), record);
        previous
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Height of the underlying tree
    pub fn height(&self) -> usize {
        self.read().height()
    }

    /// Check the tree invariants
    pub fn is_height_balanced(&self) -> bool {
        self.read().is_height_balanced()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, name: &str) -> CustomerRecord {
        CustomerRecord::new(key, name)
    }

    #[test]
    fn test_clones_share_the_same_tree() {
        let index = CustomerIndex::new();
        let other = index.clone();

        assert!(index.insert(record("2", "Bia")));
        assert_eq!(other.find("2").map(|r| r.name), Some("Bia".to_string()));
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_keeps_first_record() {
        let index = CustomerIndex::new();
        assert!(index.insert(record("1", "first")));
        assert!(!index.insert(record("1", "second")));
        assert_eq!(index.find("1").unwrap().name, "first");
    }

    #[test]
    fn test_snapshot_is_ordered_by_key() {
        let index = CustomerIndex::new();
        for key in ["30", "10", "20"] {
            index.insert(record(key, key));
        }
        let keys: Vec<_> = index.snapshot().into_iter().map(|r| r.tax_id).collect();
        assert_eq!(keys, vec!["10", "20", "30"]);
    }

    #[test]
    fn test_replace_swaps_the_stored_record() {
        let index = CustomerIndex::new();
        index.insert(record("1", "old"));

        let previous = index.replace("1", record("1", "new"));

        assert_eq!(previous.map(|r| r.name), Some("old".to_string()));
        assert_eq!(index.find("1").unwrap().name, "new");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_replace_with_absent_stale_key_inserts() {
        let index = CustomerIndex::new();
        assert!(index.replace("missing", record("5", "five")).is_none());
        assert!(index.contains("5"));
    }

    #[test]
    fn test_reload_discards_previous_contents() {
        let index = CustomerIndex::new();
        index.insert(record("1", "gone"));

        let tree: CustomerTree = [record("9", "nine")]
            .into_iter()
            .map(|r| (r.tax_id.clone(), r))
            .collect();
        index.reload(tree);

        assert!(!index.contains("1"));
        assert!(index.contains("9"));
        assert!(index.is_height_balanced());
    }
}
