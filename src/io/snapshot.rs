//! JSON snapshot file
//!
//! The snapshot is a flat, pretty-printed JSON array of customer records. It
//! is read once to build the index and kept in step with the store on every
//! write, so the next start does not have to pull everything from the store.
//!
//! # Writes
//!
//! Every write goes to a sibling temporary file that is then renamed over the
//! snapshot, so a crash mid-write never leaves a truncated array behind.
//! Write failures are reported as `Upstream` errors, which makes them
//! eligible for retry in the write-through protocol.
//!
//! # Sweep Marker
//!
//! The outcome of the last accrual sweep is kept in a sidecar file next to
//! the snapshot (`customers.json` → `customers.sweep.json`), so a restarted
//! process can tell whether today's sweep already ran.

use crate::core::traits::{RecordSource, SnapshotWriter};
use crate::types::{CustomerRecord, LedgerError, SweepReport};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Summary of the last accrual sweep, as stored in the sidecar file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepMarker {
    pub finished_at: NaiveDateTime,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl From<&SweepReport> for SweepMarker {
    fn from(report: &SweepReport) -> Self {
        SweepMarker {
            finished_at: report.finished_at,
            updated: report.updated,
            unchanged: report.unchanged,
            failed: report.failures.len(),
        }
    }
}

/// Snapshot stored as a JSON array on disk
#[derive(Debug)]
pub struct JsonSnapshotFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonSnapshotFile {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sweep marker file
    pub fn sweep_path(&self) -> PathBuf {
        self.path.with_extension("sweep.json")
    }

    /// The last recorded sweep, `None` if no sweep ever ran
    ///
    /// # Errors
    ///
    /// * `MalformedSnapshot` - the marker file does not decode
    pub fn last_sweep(&self) -> Result<Option<SweepMarker>, LedgerError> {
        let path = self.sweep_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LedgerError::from(e)),
        };

        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|e| LedgerError::malformed_snapshot(format!("{}: {}", path.display(), e)))
    }

    fn read_records(&self) -> Result<Vec<CustomerRecord>, LedgerError> {
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LedgerError::FileNotFound {
                path: self.path.display().to_string(),
            },
            _ => LedgerError::from(e),
        })?;

        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            LedgerError::malformed_snapshot(format!("{}: {}", self.path.display(), e))
        })
    }

    fn write_records(&self, records: &[CustomerRecord]) -> Result<(), LedgerError> {
        replace_file(&self.path, records)?;
        debug!(path = %self.path.display(), records = records.len(), "snapshot written");
        Ok(())
    }
}

/// Write `value` as pretty JSON to a staging file, then rename it over `path`
fn replace_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), LedgerError> {
    let staging = path.with_extension("json.tmp");

    let file = File::create(&staging).map_err(|e| write_failed(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| write_failed(path, e))?;
    writer.flush().map_err(|e| write_failed(path, e))?;
    drop(writer);

    fs::rename(&staging, path).map_err(|e| write_failed(path, e))
}

fn write_failed(path: &Path, error: impl Display) -> LedgerError {
    LedgerError::upstream("snapshot write", format!("{}: {}", path.display(), error))
}

impl RecordSource for JsonSnapshotFile {
    /// # Errors
    ///
    /// * `FileNotFound` - no snapshot at the configured path
    /// * `MalformedSnapshot` - the file is not an array of valid records
    fn read_all(&self) -> Result<Vec<CustomerRecord>, LedgerError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_records()
    }
}

impl SnapshotWriter for JsonSnapshotFile {
    /// Replace the record with the same primary key, or append it
    ///
    /// A missing snapshot is treated as empty.
    fn upsert(&self, record: &CustomerRecord) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut records = match self.read_records() {
            Ok(records) => records,
            Err(LedgerError::FileNotFound { .. }) => Vec::new(),
            Err(e) => return Err(LedgerError::upstream("snapshot read", e.to_string())),
        };

        match records.iter_mut().find(|r| r.tax_id == record.tax_id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }

        self.write_records(&records)
    }

    fn rewrite(&self, records: &[CustomerRecord]) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_records(records)
    }

    fn record_sweep(&self, report: &SweepReport) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.sweep_path();
        replace_file(&path, &SweepMarker::from(report))?;
        debug!(path = %path.display(), finished_at = %report.finished_at, "sweep recorded");
        Ok(())
    }
}
