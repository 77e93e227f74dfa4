//! Derived report shapes
//!
//! Everything in this module is computed on read by the aggregation engine
//! and never persisted back into a `CustomerRecord`.

use super::contract::Contract;
use super::customer::{CustomerRecord, PrimaryKey};
use super::withdrawal::Withdrawal;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-customer derived financial fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedFinancials {
    /// Sum of principal over counted contracts
    pub total_spent: Decimal,

    /// Sum of profit over counted contracts
    pub total_profit: Decimal,

    /// Profit of active contracts plus profit and principal of matured ones
    pub available_balance: Decimal,

    /// Coins held in active contracts
    pub total_coins: Decimal,

    /// Sum of referral credits
    pub total_referral: Decimal,

    /// `total_profit + total_spent + total_referral`
    pub total_platform_value: Decimal,

    /// Sum of withdrawals still in `Requested` status
    pub amount_withdrawn: Decimal,

    /// Payout ceiling minus `amount_withdrawn`
    pub net_receivable: Decimal,
}

/// A customer record together with its derived fields
///
/// The record serializes flat; derived fields sit under `financials` so a
/// stored field with the same name can never shadow them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerView {
    #[serde(flatten)]
    pub record: CustomerRecord,

    pub financials: DerivedFinancials,
}

/// Platform-wide totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlatformTotals {
    /// Coins held in active contracts across all customers
    pub total_coins: Decimal,

    /// Principal plus profit of active contracts (before paid withdrawals)
    pub total_platform_balance: Decimal,

    /// Profit of active and matured contracts
    pub total_earnings: Decimal,

    /// Sum of withdrawals in `Paid` status
    pub total_withdrawals_paid: Decimal,

    /// `total_platform_balance - total_withdrawals_paid`
    pub final_balance: Decimal,
}

/// One entry of the top-investor ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopInvestor {
    pub name: String,
    pub key: PrimaryKey,
    pub total_invested: Decimal,
}

/// Customer count per region code, over a closed set of codes
pub type RegionCounts = BTreeMap<&'static str, usize>;

/// A contract flattened with its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractEntry {
    #[serde(flatten)]
    pub contract: Contract,
    pub client_name: String,
    pub client_key: PrimaryKey,
}

/// A withdrawal flattened with its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalEntry {
    #[serde(flatten)]
    pub withdrawal: Withdrawal,
    pub client_name: String,
    pub client_key: PrimaryKey,
    pub client_username: String,
}

/// Purchase date and principal of one counted contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchasePoint {
    pub purchase_date: NaiveDateTime,
    pub principal: Decimal,
}

/// Outcome of a bulk accrual sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    /// When the sweep finished
    pub finished_at: NaiveDateTime,

    /// Records written back because at least one contract advanced
    pub updated: usize,

    /// Records that had nothing to accrue
    pub unchanged: usize,

    /// Per-record failures; never abort the sweep
    pub failures: Vec<SweepFailure>,
}

/// One record the sweep could not persist
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepFailure {
    pub key: PrimaryKey,
    pub name: String,
    /// Active contracts that were meant to advance
    pub contract_ids: Vec<String>,
    pub error: String,
}
