//! Aggregation engine
//!
//! Stateless, deterministic computations over a traversal snapshot of the
//! index. Nothing here writes back into a record; callers that want to
//! persist a derived value go through the synchronizer.
//!
//! # Exclusions
//!
//! Contracts in `Cancelled` or `Rejected` status contribute nothing to any
//! figure computed in this module.
//!
//! # Withdrawal Polarity
//!
//! Per-customer `amount_withdrawn` sums *requested* withdrawals while the
//! platform totals subtract *paid* ones. The two figures answer different
//! questions and are kept apart on purpose.

use crate::types::{
    ContractEntry, ContractStatus, CustomerRecord, CustomerView, DerivedFinancials,
    PlatformTotals, PurchasePoint, RegionCounts, TopInvestor, WithdrawalEntry, WithdrawalStatus,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Default length of the top-investor ranking
pub const DEFAULT_TOP_N: usize = 20;

/// Closed set of region codes counted by [`count_by_region`]
pub const REGION_CODES: [&str; 27] = [
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MG", "MS", "MT", "PA", "PB",
    "PE", "PI", "PR", "RJ", "RN", "RO", "RR", "RS", "SC", "SE", "SP", "TO",
];

/// Compute the derived financial fields of one customer
pub fn derive_financials(record: &CustomerRecord) -> DerivedFinancials {
    let mut derived = DerivedFinancials::default();
    let mut receivable = Decimal::ZERO;

    for contract in record.contracts.iter().filter(|c| c.status.is_counted()) {
        let profit = contract.profit();

        match contract.status {
            ContractStatus::Active => {
                derived.available_balance += profit;
                if let Some(coins) = contract.coins {
                    derived.total_coins += coins;
                }
            }
            _ => derived.available_balance += profit + contract.principal,
        }

        receivable += contract.receivable();
        derived.total_spent += contract.principal;
        derived.total_profit += profit;
    }

    derived.total_referral = record.referrals.iter().map(|r| r.value).sum();
    derived.total_platform_value =
        derived.total_profit + derived.total_spent + derived.total_referral;

    derived.amount_withdrawn = record
        .withdrawals
        .iter()
        .filter(|w| w.status == WithdrawalStatus::Requested)
        .map(|w| w.amount)
        .sum();
    derived.net_receivable = receivable - derived.amount_withdrawn;

    derived
}

/// Pair a record with its derived fields
pub fn customer_view(record: CustomerRecord) -> CustomerView {
    let financials = derive_financials(&record);
    CustomerView { record, financials }
}

/// Derived view of every record, in snapshot order
pub fn derive_all(records: Vec<CustomerRecord>) -> Vec<CustomerView> {
    records.into_iter().map(customer_view).collect()
}

/// Platform-wide totals across every contract and withdrawal
pub fn platform_totals(records: &[CustomerRecord]) -> PlatformTotals {
    let mut totals = PlatformTotals::default();

    for record in records {
        for contract in record.contracts.iter().filter(|c| c.status.is_counted()) {
            let profit = contract.profit();
            if contract.status == ContractStatus::Active {
                totals.total_coins += contract.coins.unwrap_or(Decimal::ZERO);
                totals.total_platform_balance += contract.principal + profit;
            }
            totals.total_earnings += profit;
        }

        totals.total_withdrawals_paid += record
            .withdrawals
            .iter()
            .filter(|w| w.status == WithdrawalStatus::Paid)
            .map(|w| w.amount)
            .sum::<Decimal>();
    }

    totals.final_balance = totals.total_platform_balance - totals.total_withdrawals_paid;
    totals
}

/// Principal over counted contracts
pub fn total_invested(record: &CustomerRecord) -> Decimal {
    record
        .contracts
        .iter()
        .filter(|c| c.status.is_counted())
        .map(|c| c.principal)
        .sum()
}

/// The `n` customers with the highest invested principal
///
/// Sorted descending; ties keep snapshot order (the sort is stable).
pub fn top_investors(records: &[CustomerRecord], n: usize) -> Vec<TopInvestor> {
    let mut ranking: Vec<TopInvestor> = records
        .iter()
        .map(|record| TopInvestor {
            name: record.name.clone(),
            key: record.tax_id.clone(),
            total_invested: total_invested(record),
        })
        .collect();

    ranking.sort_by(|a, b| b.total_invested.cmp(&a.total_invested));
    ranking.truncate(n);
    ranking
}

/// Strip diacritics and uppercase
///
/// Precomposed Latin-1 letters fold to their base letter and combining
/// marks (U+0300..=U+036F) are dropped, so both composed and decomposed
/// input normalize alike. Whitespace is kept as is.
pub fn normalize_region(raw: &str) -> String {
    raw.chars()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .flat_map(|c| {
            let base = match c {
                'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
                'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'E',
                'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
                'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
                'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
                'ç' | 'Ç' => 'C',
                'ñ' | 'Ñ' => 'N',
                'ý' | 'ÿ' | 'Ý' => 'Y',
                other => other,
            };
            base.to_uppercase()
        })
        .collect()
}

/// Count customers per region code
///
/// Every code of [`REGION_CODES`] is present in the result, zero or not.
/// Records with a missing or unrecognized region are skipped.
pub fn count_by_region(records: &[CustomerRecord]) -> RegionCounts {
    let mut counts: RegionCounts = REGION_CODES.iter().map(|code| (*code, 0)).collect();

    for state in records.iter().filter_map(|r| r.state.as_deref()) {
        let normalized = normalize_region(state);
        if let Some(count) = counts.get_mut(normalized.as_str()) {
            *count += 1;
        }
    }

    counts
}

/// Every contract of every customer, tagged with its owner
pub fn contract_ledger(records: &[CustomerRecord]) -> Vec<ContractEntry> {
    records
        .iter()
        .flat_map(|record| {
            record.contracts.iter().map(move |contract| ContractEntry {
                contract: contract.clone(),
                client_name: record.name.clone(),
                client_key: record.tax_id.clone(),
            })
        })
        .collect()
}

/// Every withdrawal of every customer, tagged with its owner
pub fn withdrawal_ledger(records: &[CustomerRecord]) -> Vec<WithdrawalEntry> {
    records
        .iter()
        .flat_map(|record| {
            record.withdrawals.iter().map(move |withdrawal| WithdrawalEntry {
                withdrawal: withdrawal.clone(),
                client_name: record.name.clone(),
                client_key: record.tax_id.clone(),
                client_username: record.username.clone(),
            })
        })
        .collect()
}

/// Registration timestamps in snapshot order (`None` when unknown)
pub fn registration_dates(records: &[CustomerRecord]) -> Vec<Option<NaiveDateTime>> {
    records.iter().map(|r| r.registered_at).collect()
}

/// Customers that never bought a contract
pub fn customers_without_contracts(records: &[CustomerRecord]) -> Vec<CustomerRecord> {
    records
        .iter()
        .filter(|r| r.contracts.is_empty())
        .cloned()
        .collect()
}

/// Purchase date and principal of every counted contract
pub fn purchase_timeline(records: &[CustomerRecord]) -> Vec<PurchasePoint> {
    records
        .iter()
        .flat_map(|r| r.contracts.iter())
        .filter(|c| c.status.is_counted())
        .map(|c| PurchasePoint {
            purchase_date: c.purchase_date,
            principal: c.principal,
        })
        .collect()
}
