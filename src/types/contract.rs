//! Contract-related types
//!
//! A contract is one investment position held by a customer. Its lifecycle
//! status decides whether it takes part in any financial aggregation.

use super::amount;
use super::error::LedgerError;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a contract
///
/// Stored as its numeric code (`1..=4`) in snapshot documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ContractStatus {
    /// Running; accrues yield daily
    Active = 1,
    /// Matured or closed while performing; principal becomes withdrawable
    Matured = 2,
    /// Cancelled; excluded from every aggregate
    Cancelled = 3,
    /// Rejected (e.g. payment never confirmed); excluded from every aggregate
    Rejected = 4,
}

impl ContractStatus {
    /// Whether contracts in this status take part in financial aggregation
    pub fn is_counted(self) -> bool {
        matches!(self, ContractStatus::Active | ContractStatus::Matured)
    }
}

impl TryFrom<u8> for ContractStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ContractStatus::Active),
            2 => Ok(ContractStatus::Matured),
            3 => Ok(ContractStatus::Cancelled),
            4 => Ok(ContractStatus::Rejected),
            other => Err(format!("unknown contract status {}", other)),
        }
    }
}

impl From<ContractStatus> for u8 {
    fn from(status: ContractStatus) -> Self {
        status as u8
    }
}

/// One investment position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Purchase identifier, unique within the owning customer
    #[serde(default)]
    pub id: String,

    /// When the contract was purchased
    pub purchase_date: NaiveDateTime,

    /// Principal amount invested
    #[serde(deserialize_with = "amount::deserialize")]
    pub principal: Decimal,

    /// Maximum yield percentage this contract can ever accrue
    ///
    /// Contracts without a cap neither accrue nor contribute a receivable.
    #[serde(default, deserialize_with = "amount::deserialize_opt")]
    pub yield_cap_pct: Option<Decimal>,

    /// Yield percentage accrued so far
    ///
    /// Non-decreasing while the contract is active and bounded by `yield_cap_pct`.
    #[serde(default, deserialize_with = "amount::deserialize")]
    pub accrued_yield_pct: Decimal,

    /// Lifecycle status
    pub status: ContractStatus,

    /// Maturity date
    #[serde(default)]
    pub yield_term: Option<NaiveDate>,

    /// Coin-denominated reward quantity
    #[serde(default, deserialize_with = "amount::deserialize_opt")]
    pub coins: Option<Decimal>,
}

impl Contract {
    /// Profit earned so far: `principal × accrued / 100`
    pub fn profit(&self) -> Decimal {
        self.principal * self.accrued_yield_pct / Decimal::ONE_HUNDRED
    }

    /// Maximum payout ceiling: `principal × cap / 100` (zero without a cap)
    pub fn receivable(&self) -> Decimal {
        self.yield_cap_pct
            .map(|cap| self.principal * cap / Decimal::ONE_HUNDRED)
            .unwrap_or(Decimal::ZERO)
    }

    /// Check an edited contract against its state before the edit
    ///
    /// While the contract is active its accrued yield may not pass the cap,
    /// and it may not go down unless the contract was inactive before.
    ///
    /// # Errors
    ///
    /// * `Validation` - the edit breaks either bound
    pub fn check_yield_edit(&self, previous: Option<&Contract>) -> Result<(), LedgerError> {
        if self.status != ContractStatus::Active {
            return Ok(());
        }

        if let Some(cap) = self.yield_cap_pct {
            if self.accrued_yield_pct > cap {
                return Err(LedgerError::validation(format!(
                    "contract {}: accrued yield {} exceeds cap {}",
                    self.id, self.accrued_yield_pct, cap
                )));
            }
        }

        if let Some(before) = previous.filter(|c| c.status == ContractStatus::Active) {
            if self.accrued_yield_pct < before.accrued_yield_pct {
                return Err(LedgerError::validation(format!(
                    "contract {}: accrued yield cannot drop from {} to {} while active",
                    self.id, before.accrued_yield_pct, self.accrued_yield_pct
                )));
            }
        }
        Ok(())
    }
}
