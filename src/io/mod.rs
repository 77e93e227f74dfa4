//! I/O module
//!
//! Concrete collaborators of the index and report output.
//!
//! # Components
//!
//! - `snapshot` - JSON snapshot file (bulk record source and snapshot writer)
//! - `memory_store` - In-memory document store implementing `ExternalStore`
//! - `csv_format` - CSV export of derived reports

pub mod csv_format;
pub mod memory_store;
pub mod snapshot;

pub use csv_format::{write_derived_csv, write_top_investors_csv};
pub use memory_store::MemoryStore;
pub use snapshot::{JsonSnapshotFile, SweepMarker};
