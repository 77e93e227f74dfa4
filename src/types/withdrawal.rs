//! Withdrawal request types

use super::amount;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a withdrawal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WithdrawalStatus {
    /// Requested by the customer, not yet paid out
    Requested = 1,
    /// Paid out
    Paid = 2,
}

impl TryFrom<u8> for WithdrawalStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(WithdrawalStatus::Requested),
            2 => Ok(WithdrawalStatus::Paid),
            other => Err(format!("unknown withdrawal status {}", other)),
        }
    }
}

impl From<WithdrawalStatus> for u8 {
    fn from(status: WithdrawalStatus) -> Self {
        status as u8
    }
}

/// A withdrawal request
///
/// `requested_at` doubles as the identifier of the request within its
/// customer; edits address a withdrawal by that timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Requested amount
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: Decimal,

    /// When the request was made
    pub requested_at: NaiveDateTime,

    /// Lifecycle status
    pub status: WithdrawalStatus,
}
