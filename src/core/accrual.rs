//! Daily yield accrual
//!
//! One accrual step advances every active, capped contract of a record by
//! `cap / 1080` percentage points and clamps the result at the cap. The
//! divisor is the number of daily steps in the contract term.

use crate::types::{ContractStatus, CustomerRecord};
use rust_decimal::Decimal;

/// Number of accrual steps it takes a contract to reach its cap
pub const ACCRUAL_STEPS: u32 = 1080;

/// Advance the accrued yield of every eligible contract by one step
///
/// # Returns
///
/// `true` if at least one contract changed. Records that return `false`
/// need no write-back.
pub fn accrue_yield(record: &mut CustomerRecord) -> bool {
    let mut changed = false;

    for contract in record
        .contracts
        .iter_mut()
        .filter(|c| c.status == ContractStatus::Active)
    {
        let Some(cap) = contract.yield_cap_pct else {
            continue;
        };
        if contract.accrued_yield_pct >= cap {
            continue;
        }

        let step = cap / Decimal::from(ACCRUAL_STEPS);
        contract.accrued_yield_pct = (contract.accrued_yield_pct + step).min(cap);
        changed = true;
    }

    changed
}

/// Ids of the contracts a step would advance
pub fn accruing_contracts(record: &CustomerRecord) -> Vec<String> {
    record
        .contracts
        .iter()
        .filter(|c| c.status == ContractStatus::Active)
        .filter(|c| matches!(c.yield_cap_pct, Some(cap) if c.accrued_yield_pct < cap))
        .map(|c| c.id.clone())
        .collect()
}
