//! Record mutations
//!
//! Every mutating feature of the ledger is expressed here as a closure over
//! `&mut CustomerRecord`. The closures never touch the store, the snapshot or
//! the index; the synchronizer runs them inside the write-through protocol.
//!
//! A closure that returns an error leaves the protocol before anything is
//! written, so validation failures never reach the store.

use crate::types::{
    Contract, ContractStatus, CustomerRecord, LedgerError, PrimaryKey, ReferralCredit, Withdrawal,
    WithdrawalStatus,
};
use chrono::{Months, NaiveDateTime};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Contract term, in months, stamped on newly purchased contracts
pub const CONTRACT_TERM_MONTHS: u32 = 36;

/// Share of the referred amount credited to the referrer
pub const REFERRAL_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Caller-supplied part of a new contract
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRequest {
    pub id: String,
    pub principal: Decimal,
    pub yield_cap_pct: Option<Decimal>,
    pub coins: Option<Decimal>,
    pub status: ContractStatus,
}

impl ContractRequest {
    /// An active contract with the given principal and cap
    pub fn new(id: impl Into<String>, principal: Decimal, yield_cap_pct: Decimal) -> Self {
        ContractRequest {
            id: id.into(),
            principal,
            yield_cap_pct: Some(yield_cap_pct),
            coins: None,
            status: ContractStatus::Active,
        }
    }
}

/// Append a contract purchased at `now`, maturing three years later
///
/// # Errors
///
/// * `Validation` - empty id, non-positive principal, negative cap, or an id
///   already used by another contract of the same customer
pub fn add_contract(
    request: ContractRequest,
    now: NaiveDateTime,
) -> impl FnOnce(&mut CustomerRecord) -> Result<(), LedgerError> {
    move |record| {
        if request.id.trim().is_empty() {
            return Err(LedgerError::validation("contract id is required"));
        }
        if request.principal <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "contract principal must be positive, got {}",
                request.principal
            )));
        }
        if request.yield_cap_pct.is_some_and(|cap| cap < Decimal::ZERO) {
            return Err(LedgerError::validation("yield cap cannot be negative"));
        }
        if record.contracts.iter().any(|c| c.id == request.id) {
            return Err(LedgerError::validation(format!(
                "contract {} already exists for {}",
                request.id, record.tax_id
            )));
        }

        let yield_term = now
            .date()
            .checked_add_months(Months::new(CONTRACT_TERM_MONTHS))
            .ok_or_else(|| LedgerError::validation("contract term out of range"))?;

        record.contracts.push(Contract {
            id: request.id,
            purchase_date: now,
            principal: request.principal,
            yield_cap_pct: request.yield_cap_pct,
            accrued_yield_pct: Decimal::ZERO,
            status: request.status,
            yield_term: Some(yield_term),
            coins: request.coins,
        });
        Ok(())
    }
}

/// Append a withdrawal request stamped with `now`
///
/// # Errors
///
/// * `Validation` - non-positive amount, or another request already uses the
///   same timestamp (timestamps address withdrawals)
pub fn add_withdrawal(
    amount: Decimal,
    now: NaiveDateTime,
) -> impl FnOnce(&mut CustomerRecord) -> Result<(), LedgerError> {
    move |record| {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "withdrawal amount must be positive, got {}",
                amount
            )));
        }
        if record.withdrawals.iter().any(|w| w.requested_at == now) {
            return Err(LedgerError::validation(format!(
                "a withdrawal was already requested at {}",
                now
            )));
        }

        record.withdrawals.push(Withdrawal {
            amount,
            requested_at: now,
            status: WithdrawalStatus::Requested,
        });
        Ok(())
    }
}

/// Merge top-level fields into the record; the primary key stays fixed
pub fn update_fields(
    fields: Map<String, Value>,
) -> impl FnOnce(&mut CustomerRecord) -> Result<(), LedgerError> {
    move |record| {
        if fields.is_empty() {
            return Err(LedgerError::validation("no fields to update"));
        }
        record.merge_fields(&fields)
    }
}

/// Set one field of the contract with the given id
///
/// # Errors
///
/// * `NotFound` - no contract with that id
/// * `Validation` - the field name is empty, the value does not decode, or
///   an active contract's accrued yield would drop or pass its cap
pub fn update_contract_field(
    contract_id: impl Into<String>,
    field: impl Into<String>,
    value: Value,
) -> impl FnOnce(&mut CustomerRecord) -> Result<(), LedgerError> {
    let contract_id = contract_id.into();
    let field = field.into();

    move |record| {
        let key = record.tax_id.clone();
        let contract = record
            .contracts
            .iter_mut()
            .find(|c| c.id == contract_id)
            .ok_or_else(|| LedgerError::not_found(format!("{}/contract/{}", key, contract_id)))?;

        let previous = contract.clone();
        set_field(contract, &field, value)?;
        if let Err(err) = contract.check_yield_edit(Some(&previous)) {
            *contract = previous;
            return Err(err);
        }
        Ok(())
    }
}

/// Set one field of the withdrawal requested at `requested_at`
///
/// # Errors
///
/// * `NotFound` - no withdrawal with that timestamp
/// * `Validation` - the field name is empty or the value does not decode
pub fn update_withdrawal_field(
    requested_at: NaiveDateTime,
    field: impl Into<String>,
    value: Value,
) -> impl FnOnce(&mut CustomerRecord) -> Result<(), LedgerError> {
    let field = field.into();

    move |record| {
        let key = record.tax_id.clone();
        let withdrawal = record
            .withdrawals
            .iter_mut()
            .find(|w| w.requested_at == requested_at)
            .ok_or_else(|| {
                LedgerError::not_found(format!("{}/withdrawal/{}", key, requested_at))
            })?;

        set_field(withdrawal, &field, value)
    }
}

/// Overwrite the document verification flags
pub fn set_verification(
    documents_sent: bool,
    documents_verified: bool,
) -> impl FnOnce(&mut CustomerRecord) -> Result<(), LedgerError> {
    move |record| {
        record.documents_sent = Some(documents_sent);
        record.documents_verified = Some(documents_verified);
        Ok(())
    }
}

/// Referral credit worth [`REFERRAL_RATE`] of `base_amount`
pub fn referral_credit(
    referred_key: impl Into<PrimaryKey>,
    referred_name: impl Into<String>,
    base_amount: Decimal,
    now: NaiveDateTime,
) -> ReferralCredit {
    ReferralCredit {
        value: base_amount * REFERRAL_RATE,
        referred_name: referred_name.into(),
        referred_key: referred_key.into(),
        credited_at: now,
    }
}

/// Append a referral credit to the referrer
pub fn add_referral_credit(
    credit: ReferralCredit,
) -> impl FnOnce(&mut CustomerRecord) -> Result<(), LedgerError> {
    move |record| {
        if credit.referred_key == record.tax_id {
            return Err(LedgerError::validation("a customer cannot refer themselves"));
        }
        if credit.value < Decimal::ZERO {
            return Err(LedgerError::validation("referral credit cannot be negative"));
        }
        record.referrals.push(credit);
        Ok(())
    }
}

/// Drop the referrer link of a customer whose referral was credited
pub fn clear_referrer() -> impl FnOnce(&mut CustomerRecord) -> Result<(), LedgerError> {
    |record| {
        record.referrer = None;
        Ok(())
    }
}

fn set_field<T>(entry: &mut T, field: &str, value: Value) -> Result<(), LedgerError>
where
    T: Serialize + DeserializeOwned,
{
    if field.trim().is_empty() {
        return Err(LedgerError::validation("field name is required"));
    }

    let mut document = serde_json::to_value(&*entry)
        .map_err(|e| LedgerError::validation(format!("encode entry: {}", e)))?;
    match &mut document {
        Value::Object(object) => {
            object.insert(field.to_string(), value);
        }
        _ => return Err(LedgerError::validation("entry is not an object")),
    }

    *entry = serde_json::from_value(document)
        .map_err(|e| LedgerError::validation(format!("invalid value for {}: {}", field, e)))?;
    Ok(())
}
