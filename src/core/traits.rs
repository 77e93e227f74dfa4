//! Collaborator interfaces consumed by the index
//!
//! The index never embeds the protocols of the document store or the
//! snapshot file; it only talks to them through these traits. Both the
//! bundled implementations in `io` and test doubles plug in here.

use crate::types::{CustomerRecord, LedgerError, SweepReport};
use serde_json::{Map, Value};

/// Bulk source of customer records, read once at load time
pub trait RecordSource {
    /// Read every record
    ///
    /// Any malformed record fails the whole read with `MalformedSnapshot`.
    fn read_all(&self) -> Result<Vec<CustomerRecord>, LedgerError>;
}

/// Authoritative document store, addressed by store identifier
///
/// Assumed strongly consistent for a single key.
pub trait ExternalStore {
    /// Fetch a document; `Ok(None)` when absent
    fn get_by_store_id(&self, id: &str) -> Result<Option<CustomerRecord>, LedgerError>;

    /// Create or overwrite a document
    fn set_by_store_id(&self, id: &str, record: &CustomerRecord) -> Result<(), LedgerError>;

    /// Merge top-level fields into an existing document
    fn update_fields(&self, id: &str, fields: &Map<String, Value>) -> Result<(), LedgerError>;
}

/// Local snapshot used as a warm-start cache for the next load
pub trait SnapshotWriter {
    /// Replace the record with the same primary key, or append it
    fn upsert(&self, record: &CustomerRecord) -> Result<(), LedgerError>;

    /// Overwrite the whole snapshot with `records`
    fn rewrite(&self, records: &[CustomerRecord]) -> Result<(), LedgerError>;

    /// Remember the outcome of the last accrual sweep
    fn record_sweep(&self, report: &SweepReport) -> Result<(), LedgerError>;
}
