//! Snapshot loader and write-through synchronizer
//!
//! Builds the index from a bulk record source and owns the single write path
//! every mutating feature goes through.
//!
//! # Write-Through Protocol
//!
//! ```text
//! store get ──► NotFound? ──► mutate ──► store write ──► snapshot upsert ──► index replace
//! ```
//!
//! Steps run in that order under one write gate, so two mutations never
//! interleave. A failure at any step aborts the protocol and leaves the
//! index untouched. The index update is not atomic with the writes before it:
//! after a crash between them the store is right and the index is stale, which
//! is why the index is only ever treated as a cache.
//!
//! The store identifier is the primary key. A mutation that tries to change
//! the primary key is rejected before anything is written.

use crate::config::RetryPolicy;
use crate::core::accrual::{accrue_yield, accruing_contracts};
use crate::core::index::{CustomerIndex, CustomerTree};
use crate::core::traits::{ExternalStore, RecordSource, SnapshotWriter};
use crate::types::{CustomerRecord, LedgerError, SweepFailure, SweepReport};
use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Build a fresh tree from every record of `source`
///
/// # Errors
///
/// * `MalformedSnapshot` - the source could not be decoded, or a record has
///   an empty primary key. No partial tree is ever returned.
pub fn load_all<R: RecordSource + ?Sized>(source: &R) -> Result<CustomerTree, LedgerError> {
    let records = source.read_all()?;
    let mut tree = CustomerTree::new();
    let mut duplicates = 0usize;

    for (position, record) in records.into_iter().enumerate() {
        if record.tax_id.trim().is_empty() {
            return Err(LedgerError::malformed_snapshot(format!(
                "record {} has an empty primary key",
                position
            )));
        }

        let key = record.tax_id.clone();
        if !tree.insert(key.clone(), record) {
            duplicates += 1;
            warn!(key = %key, position, "duplicate primary key in snapshot, keeping first");
        }
    }

    info!(records = tree.len(), duplicates, height = tree.height(), "index loaded");
    Ok(tree)
}

struct Applied {
    record: CustomerRecord,
    changed: bool,
}

/// Owner of the write path into store, snapshot and index
///
/// Generic over the store and snapshot collaborators so tests can plug in
/// failing doubles.
pub struct Synchronizer<S, W> {
    index: CustomerIndex,
    store: S,
    snapshot: W,
    write_gate: Mutex<()>,
    retry: RetryPolicy,
}

impl<S, W> Synchronizer<S, W>
where
    S: ExternalStore,
    W: SnapshotWriter,
{
    /// Create a synchronizer writing into `index`
    pub fn new(index: CustomerIndex, store: S, snapshot: W, retry: RetryPolicy) -> Self {
        Synchronizer {
            index,
            store,
            snapshot,
            write_gate: Mutex::new(()),
            retry,
        }
    }

    /// The index kept in sync by this synchronizer
    pub fn index(&self) -> &CustomerIndex {
        &self.index
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> &W {
        &self.snapshot
    }

    /// Whether the store holds a document under `store_id`
    pub fn exists(&self, store_id: &str) -> Result<bool, LedgerError> {
        self.retry
            .run("store read", || self.store.get_by_store_id(store_id))
            .map(|found| found.is_some())
    }

    /// Rebuild the index from `source`
    ///
    /// The current contents stay in place if the load fails.
    ///
    /// # Returns
    ///
    /// Number of records in the reloaded index
    pub fn reload<R: RecordSource + ?Sized>(&self, source: &R) -> Result<usize, LedgerError> {
        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let tree = load_all(source)?;
        let len = tree.len();
        self.index.reload(tree);
        Ok(len)
    }

    /// Overwrite the snapshot with the current index contents
    pub fn rewrite_snapshot(&self) -> Result<usize, LedgerError> {
        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let records = self.index.snapshot();
        self.retry
            .run("snapshot rewrite", || self.snapshot.rewrite(&records))?;
        Ok(records.len())
    }

    /// Run `mutate` against the authoritative record and write it through
    ///
    /// # Arguments
    ///
    /// * `store_id` - Identifier of the document in the external store
    /// * `mutate` - Change to apply; an error aborts before any write
    ///
    /// # Returns
    ///
    /// The record as written to the store
    ///
    /// # Errors
    ///
    /// * `NotFound` - the store has no document under `store_id`
    /// * `Validation` - `mutate` rejected the change or altered the primary key
    /// * `Upstream` - a store or snapshot write failed after retries
    pub fn apply_mutation<F>(&self, store_id: &str, mutate: F) -> Result<CustomerRecord, LedgerError>
    where
        F: FnOnce(&mut CustomerRecord) -> Result<(), LedgerError>,
    {
        self.run_protocol(
            store_id,
            |record| mutate(record).map(|()| true),
            |store, record| store.set_by_store_id(store_id, record),
        )
        .map(|applied| applied.record)
    }

    /// Merge top-level fields, sending only those fields to the store
    pub fn patch_fields(
        &self,
        store_id: &str,
        fields: Map<String, Value>,
    ) -> Result<CustomerRecord, LedgerError> {
        if fields.is_empty() {
            return Err(LedgerError::validation("no fields to update"));
        }

        self.run_protocol(
            store_id,
            |record| record.merge_fields(&fields).map(|()| true),
            |store, _| store.update_fields(store_id, &fields),
        )
        .map(|applied| applied.record)
    }

    /// Register a new customer
    ///
    /// Stamps the registration time and defaults the verification flags to
    /// `false` before writing store, snapshot and index.
    ///
    /// # Errors
    ///
    /// * `Validation` - empty key, missing credential hash, or the key is
    ///   already present in the store
    pub fn create(
        &self,
        mut record: CustomerRecord,
        now: NaiveDateTime,
    ) -> Result<CustomerRecord, LedgerError> {
        if record.tax_id.trim().is_empty() {
            return Err(LedgerError::validation("primary key is required"));
        }
        if record.password_hash.as_deref().map_or(true, str::is_empty) {
            return Err(LedgerError::validation("credential hash is required"));
        }

        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let key = record.tax_id.clone();

        let existing = self
            .retry
            .run("store read", || self.store.get_by_store_id(&key))?;
        if existing.is_some() {
            return Err(LedgerError::validation(format!("customer {} already exists", key)));
        }

        record.registered_at = Some(now);
        record.documents_sent.get_or_insert(false);
        record.documents_verified.get_or_insert(false);

        self.retry
            .run("store write", || self.store.set_by_store_id(&key, &record))?;
        self.retry
            .run("snapshot write", || self.snapshot.upsert(&record))?;
        self.index.replace(&key, record.clone());

        info!(key = %key, "customer created");
        Ok(record)
    }

    /// Advance the accrual of one customer, persisting only on change
    ///
    /// # Returns
    ///
    /// Whether any contract advanced
    pub fn accrue_one(&self, store_id: &str) -> Result<bool, LedgerError> {
        self.run_protocol(store_id, |record| Ok(accrue_yield(record)), |store, record| {
            store.set_by_store_id(store_id, record)
        })
        .map(|applied| applied.changed)
    }

    /// Accrue every customer currently in the index
    ///
    /// Per-record failures are collected in the report and never stop the
    /// sweep. The report is stamped with `clock` once the sweep is done and
    /// handed to the snapshot; failing to record it is logged, not returned.
    pub fn accrue_all(&self, clock: impl Fn() -> NaiveDateTime) -> SweepReport {
        let mut updated = 0;
        let mut unchanged = 0;
        let mut failures = Vec::new();

        for record in self.index.snapshot() {
            match self.accrue_one(&record.tax_id) {
                Ok(true) => updated += 1,
                Ok(false) => unchanged += 1,
                Err(err) => {
                    error!(key = %record.tax_id, error = %err, "accrual failed");
                    failures.push(SweepFailure {
                        contract_ids: accruing_contracts(&record),
                        key: record.tax_id,
                        name: record.name,
                        error: err.to_string(),
                    });
                }
            }
        }

        let report = SweepReport {
            finished_at: clock(),
            updated,
            unchanged,
            failures,
        };
        if let Err(err) = self
            .retry
            .run("sweep record", || self.snapshot.record_sweep(&report))
        {
            error!(error = %err, "could not record accrual sweep");
        }

        info!(
            finished_at = %report.finished_at,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failures.len(),
            "accrual sweep finished"
        );
        report
    }

    fn run_protocol<F, P>(&self, store_id: &str, mutate: F, persist: P) -> Result<Applied, LedgerError>
    where
        F: FnOnce(&mut CustomerRecord) -> Result<bool, LedgerError>,
        P: Fn(&S, &CustomerRecord) -> Result<(), LedgerError>,
    {
        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self
            .retry
            .run("store read", || self.store.get_by_store_id(store_id))?
            .ok_or_else(|| LedgerError::not_found(store_id))?;

        let mut updated = current.clone();
        let changed = mutate(&mut updated)?;

        if updated.tax_id != store_id {
            return Err(LedgerError::validation(format!(
                "primary key of {} cannot change (got {})",
                store_id, updated.tax_id
            )));
        }

        if !changed {
            debug!(key = %store_id, "nothing to persist");
            return Ok(Applied {
                record: current,
                changed: false,
            });
        }

        self.retry
            .run("store write", || persist(&self.store, &updated))?;
        self.retry
            .run("snapshot write", || self.snapshot.upsert(&updated))?;
        self.index.replace(store_id, updated.clone());

        debug!(key = %store_id, "mutation applied");
        Ok(Applied {
            record: updated,
            changed: true,
        })
    }
}
