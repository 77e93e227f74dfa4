//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `customer`: Customer records and referral credits
//! - `contract`: Investment contracts and their lifecycle status
//! - `withdrawal`: Withdrawal requests and their lifecycle status
//! - `report`: Derived, read-only report shapes
//! - `amount`: Lenient decoding of monetary amounts
//! - `error`: Error types for the index

pub mod amount;
pub mod contract;
pub mod customer;
pub mod error;
pub mod report;
pub mod withdrawal;

pub use contract::{Contract, ContractStatus};
pub use customer::{CustomerRecord, PrimaryKey, ReferralCredit};
pub use error::LedgerError;
pub use report::{
    ContractEntry, CustomerView, DerivedFinancials, PlatformTotals, PurchasePoint, RegionCounts,
    SweepFailure, SweepReport, TopInvestor, WithdrawalEntry,
};
pub use withdrawal::{Withdrawal, WithdrawalStatus};
