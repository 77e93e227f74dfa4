//! Customer record types
//!
//! A `CustomerRecord` is the unit of storage everywhere: in the external
//! document store, in the local snapshot file and as the value held by the
//! ordered index.

use super::amount;
use super::contract::Contract;
use super::error::LedgerError;
use super::withdrawal::Withdrawal;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique natural identifier of a customer (national tax ID)
///
/// Also used as the store identifier: documents are addressed by it.
pub type PrimaryKey = String;

/// Credit granted to a customer for referring someone
///
/// Created once when the referred customer is claimed; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralCredit {
    /// Credited value
    #[serde(deserialize_with = "amount::deserialize")]
    pub value: Decimal,

    /// Name of the referred customer
    pub referred_name: String,

    /// Primary key of the referred customer
    pub referred_key: PrimaryKey,

    /// When the credit was granted
    pub credited_at: NaiveDateTime,
}

/// Full customer document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Primary key
    pub tax_id: PrimaryKey,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub username: String,

    /// Credential hash, opaque to the index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    #[serde(default)]
    pub registered_at: Option<NaiveDateTime>,

    /// State / region as typed by the customer; normalized only when counted
    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub contracts: Vec<Contract>,

    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,

    #[serde(default)]
    pub referrals: Vec<ReferralCredit>,

    /// Primary key of the customer who referred this one, until credited
    #[serde(default)]
    pub referrer: Option<PrimaryKey>,

    #[serde(default)]
    pub documents_sent: Option<bool>,

    #[serde(default)]
    pub documents_verified: Option<bool>,

    /// Fields the index does not interpret, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CustomerRecord {
    /// Create an empty record for the given key
    pub fn new(tax_id: impl Into<PrimaryKey>, name: impl Into<String>) -> Self {
        CustomerRecord {
            tax_id: tax_id.into(),
            name: name.into(),
            username: String::new(),
            password_hash: None,
            registered_at: None,
            state: None,
            address: None,
            contracts: Vec::new(),
            withdrawals: Vec::new(),
            referrals: Vec::new(),
            referrer: None,
            documents_sent: None,
            documents_verified: None,
            extra: Map::new(),
        }
    }

    /// The primary key of this record
    pub fn key(&self) -> &str {
        &self.tax_id
    }

    /// Merge top-level fields into the record
    ///
    /// Fields are applied on the JSON form of the record, so unknown names end
    /// up in `extra` and known names must decode to their typed shape.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the fields try to change the primary key, do
    /// not decode, or move an active contract's accrued yield backwards or
    /// past its cap.
    pub fn merge_fields(&mut self, fields: &Map<String, Value>) -> Result<(), LedgerError> {
        if let Some(new_key) = fields.get("tax_id") {
            if new_key.as_str() != Some(self.tax_id.as_str()) {
                return Err(LedgerError::validation("tax_id is immutable"));
            }
        }

        let mut document = serde_json::to_value(&*self)
            .map_err(|e| LedgerError::validation(format!("encode {}: {}", self.tax_id, e)))?;
        if let Value::Object(object) = &mut document {
            object.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let merged: CustomerRecord = serde_json::from_value(document)
            .map_err(|e| LedgerError::validation(format!("invalid field value: {}", e)))?;

        for contract in &merged.contracts {
            let previous = self.contracts.iter().find(|c| c.id == contract.id);
            if previous != Some(contract) {
                contract.check_yield_edit(previous)?;
            }
        }

        *self = merged;
        Ok(())
    }
}
