//! Investor Index Library
//! # Overview
//!
//! This library keeps an in-memory, ordered index over customer records that
//! live in an external document store and are mirrored to a local JSON
//! snapshot, and computes every financial report from that index.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (CustomerRecord, Contract, Withdrawal, reports, errors)
//! - [`core`] - Business logic components:
//!   - [`core::tree`] - Height-balanced ordered map
//!   - [`core::index`] - Shared customer index
//!   - [`core::synchronizer`] - Load and write-through protocol
//!   - [`core::aggregation`] - Derived financial figures
//!   - [`core::engine`] - Caller-facing surface
//! - [`io`] - JSON snapshot, in-memory store, CSV export
//! - [`cli`], [`config`], [`logging`], [`scheduler`] - Process shell
//!
//! # Data Flow
//!
//! Reads: index → ordered snapshot → aggregation → caller.
//!
//! Writes: caller → external store → local snapshot → index. Only the
//! mutation differs between features; the sequence is always the same.
//!
//! # Contract Statuses
//!
//! - **Active** (1): accrues yield daily; profit is withdrawable
//! - **Matured** (2): principal and profit are withdrawable
//! - **Cancelled** (3) and **Rejected** (4): ignored by every aggregate

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod scheduler;
pub mod types;

pub use config::{LedgerConfig, RetryPolicy, ScheduleConfig};
pub use crate::core::{CustomerIndex, LedgerEngine, Synchronizer};
pub use io::{write_derived_csv, write_top_investors_csv, JsonSnapshotFile, MemoryStore};
pub use types::{
    Contract, ContractStatus, CustomerRecord, LedgerError, PrimaryKey, ReferralCredit, Withdrawal,
    WithdrawalStatus,
};
