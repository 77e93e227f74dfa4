//! Ledger engine
//!
//! `LedgerEngine` is the caller-facing surface of the crate. Reads take a
//! traversal snapshot of the index and hand it to the aggregation functions;
//! writes build a mutation and run it through the synchronizer.
//!
//! The engine never computes anything itself. Every figure comes from
//! `aggregation`, every change from `mutations`, so the same rule is never
//! written twice.

use crate::core::aggregation;
use crate::core::index::CustomerIndex;
use crate::core::mutations::{self, ContractRequest};
use crate::core::synchronizer::{load_all, Synchronizer};
use crate::core::traits::{ExternalStore, RecordSource, SnapshotWriter};
use crate::config::RetryPolicy;
use crate::types::{
    ContractEntry, CustomerRecord, CustomerView, LedgerError, PlatformTotals, PurchasePoint,
    RegionCounts, SweepReport, TopInvestor, WithdrawalEntry,
};
use chrono::{Local, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::info;

/// Source of the current wall-clock time
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Query and mutation surface over one index
pub struct LedgerEngine<S, W> {
    sync: Synchronizer<S, W>,
    top_n: usize,
    clock: Clock,
}

impl<S, W> LedgerEngine<S, W>
where
    S: ExternalStore,
    W: SnapshotWriter,
{
    /// Load the index from `source` and wire it to the collaborators
    ///
    /// # Errors
    ///
    /// Any load error, most notably `MalformedSnapshot`. The engine is never
    /// built over a partial index.
    pub fn load<R: RecordSource + ?Sized>(
        source: &R,
        store: S,
        snapshot: W,
        retry: RetryPolicy,
    ) -> Result<Self, LedgerError> {
        let index = CustomerIndex::from_tree(load_all(source)?);
        Ok(Self::new(index, store, snapshot, retry))
    }

    /// Wrap an existing index
    pub fn new(index: CustomerIndex, store: S, snapshot: W, retry: RetryPolicy) -> Self {
        LedgerEngine {
            sync: Synchronizer::new(index, store, snapshot, retry),
            top_n: aggregation::DEFAULT_TOP_N,
            clock: local_now,
        }
    }

    /// Default length used by [`Self::top_investors_default`]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Replace the wall clock used to stamp new entries
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn index(&self) -> &CustomerIndex {
        self.sync.index()
    }

    pub fn synchronizer(&self) -> &Synchronizer<S, W> {
        &self.sync
    }

    // Reads

    /// Copy of the record stored under `key`
    pub fn by_key(&self, key: &str) -> Option<CustomerRecord> {
        self.index().find(key)
    }

    /// Derived view of one customer
    pub fn view(&self, key: &str) -> Option<CustomerView> {
        self.by_key(key).map(aggregation::customer_view)
    }

    /// Every record, ascending by primary key
    pub fn all(&self) -> Vec<CustomerRecord> {
        self.index().snapshot()
    }

    /// Every record together with its derived fields
    pub fn derived_all(&self) -> Vec<CustomerView> {
        aggregation::derive_all(self.all())
    }

    pub fn platform_totals(&self) -> PlatformTotals {
        aggregation::platform_totals(&self.all())
    }

    pub fn top_investors(&self, n: usize) -> Vec<TopInvestor> {
        aggregation::top_investors(&self.all(), n)
    }

    /// Top investors with the configured ranking length
    pub fn top_investors_default(&self) -> Vec<TopInvestor> {
        self.top_investors(self.top_n)
    }

    pub fn count_by_region(&self) -> RegionCounts {
        aggregation::count_by_region(&self.all())
    }

    pub fn contracts(&self) -> Vec<ContractEntry> {
        aggregation::contract_ledger(&self.all())
    }

    pub fn withdrawals(&self) -> Vec<WithdrawalEntry> {
        aggregation::withdrawal_ledger(&self.all())
    }

    pub fn registration_dates(&self) -> Vec<Option<NaiveDateTime>> {
        aggregation::registration_dates(&self.all())
    }

    pub fn customers_without_contracts(&self) -> Vec<CustomerRecord> {
        aggregation::customers_without_contracts(&self.all())
    }

    pub fn purchase_timeline(&self) -> Vec<PurchasePoint> {
        aggregation::purchase_timeline(&self.all())
    }

    // Writes

    /// Apply an arbitrary mutation through the write-through protocol
    pub fn mutate<F>(&self, lookup_id: &str, mutate: F) -> Result<CustomerRecord, LedgerError>
    where
        F: FnOnce(&mut CustomerRecord) -> Result<(), LedgerError>,
    {
        self.sync.apply_mutation(lookup_id, mutate)
    }

    /// Register a new customer, stamped with the current time
    pub fn create_customer(&self, record: CustomerRecord) -> Result<CustomerRecord, LedgerError> {
        self.sync.create(record, (self.clock)())
    }

    pub fn add_contract(
        &self,
        key: &str,
        request: ContractRequest,
    ) -> Result<CustomerRecord, LedgerError> {
        self.mutate(key, mutations::add_contract(request, (self.clock)()))
    }

    pub fn add_withdrawal(&self, key: &str, amount: Decimal) -> Result<CustomerRecord, LedgerError> {
        self.mutate(key, mutations::add_withdrawal(amount, (self.clock)()))
    }

    /// Merge top-level fields; only the given fields are sent to the store
    pub fn update_fields(
        &self,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<CustomerRecord, LedgerError> {
        self.sync.patch_fields(key, fields)
    }

    pub fn update_contract_field(
        &self,
        key: &str,
        contract_id: &str,
        field: &str,
        value: Value,
    ) -> Result<CustomerRecord, LedgerError> {
        self.mutate(key, mutations::update_contract_field(contract_id, field, value))
    }

    pub fn update_withdrawal_field(
        &self,
        key: &str,
        requested_at: NaiveDateTime,
        field: &str,
        value: Value,
    ) -> Result<CustomerRecord, LedgerError> {
        self.mutate(key, mutations::update_withdrawal_field(requested_at, field, value))
    }

    pub fn set_verification(
        &self,
        key: &str,
        documents_sent: bool,
        documents_verified: bool,
    ) -> Result<CustomerRecord, LedgerError> {
        self.mutate(key, mutations::set_verification(documents_sent, documents_verified))
    }

    /// Credit a referrer with a share of the referred customer's purchase
    ///
    /// Runs two independent protocol passes: the credit on the referrer, then
    /// the removal of the referred customer's referrer link. The referred
    /// customer is looked up in the store first, so an unknown key credits
    /// nobody. If the second pass fails the credit stays in place.
    ///
    /// # Returns
    ///
    /// The updated referrer and referred records
    pub fn credit_referral(
        &self,
        referrer: &str,
        referred: &str,
        referred_name: &str,
        base_amount: Decimal,
    ) -> Result<(CustomerRecord, CustomerRecord), LedgerError> {
        if referrer.is_empty() || referred.is_empty() || referred_name.is_empty() {
            return Err(LedgerError::validation(
                "referrer, referred key and referred name are required",
            ));
        }

        if !self.sync.exists(referred)? {
            return Err(LedgerError::not_found(referred));
        }

        let credit = mutations::referral_credit(referred, referred_name, base_amount, (self.clock)());
        let value = credit.value;
        let referrer_record = self.mutate(referrer, mutations::add_referral_credit(credit))?;
        let referred_record = self.mutate(referred, mutations::clear_referrer())?;

        info!(referrer = %referrer, referred = %referred, value = %value, "referral credited");
        Ok((referrer_record, referred_record))
    }

    /// Accrue one customer; `true` if anything changed
    pub fn accrue_one(&self, key: &str) -> Result<bool, LedgerError> {
        self.sync.accrue_one(key)
    }

    /// No-argument sweep entry point for the daily scheduler
    ///
    /// The report is stamped with the engine clock.
    pub fn accrue_all(&self) -> SweepReport {
        self.sync.accrue_all(self.clock)
    }

    // Lifecycle

    /// Rebuild the index from `source`; the old index survives a failed load
    pub fn reload<R: RecordSource + ?Sized>(&self, source: &R) -> Result<usize, LedgerError> {
        self.sync.reload(source)
    }

    /// Overwrite the snapshot with the whole index
    pub fn rewrite_snapshot(&self) -> Result<usize, LedgerError> {
        self.sync.rewrite_snapshot()
    }

    /// Whether a customer exists in the index
    pub fn contains(&self, key: &str) -> bool {
        self.index().contains(key)
    }
}
