//! Core business logic module
//!
//! This module contains the index and everything that reads or writes it:
//! - `tree` - Height-balanced ordered map
//! - `index` - Shared, lock-guarded customer index
//! - `traits` - Collaborator interfaces (record source, store, snapshot)
//! - `synchronizer` - Snapshot loading and the write-through protocol
//! - `mutations` - Per-feature record mutations
//! - `aggregation` - Derived financial figures, rankings and counts
//! - `accrual` - Daily yield accrual step
//! - `engine` - Caller-facing query and mutation surface

pub mod accrual;
pub mod aggregation;
pub mod engine;
pub mod index;
pub mod mutations;
pub mod synchronizer;
pub mod traits;
pub mod tree;

pub use engine::LedgerEngine;
pub use index::{CustomerIndex, CustomerTree};
pub use mutations::ContractRequest;
pub use synchronizer::{load_all, Synchronizer};
pub use traits::{ExternalStore, RecordSource, SnapshotWriter};
pub use tree::AvlTree;
