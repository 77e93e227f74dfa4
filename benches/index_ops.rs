//! Benchmark suite for index and report operations
//!
//! Uses the divan benchmarking framework over synthetic customer sets of
//! increasing size. Keys are shuffled with a fixed seed so every run builds
//! the same tree.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```

use chrono::NaiveDate;
use divan::Bencher;
use investor_index::core::aggregation::{derive_all, platform_totals, top_investors};
use investor_index::core::{AvlTree, CustomerTree};
use investor_index::{Contract, ContractStatus, CustomerRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

const SIZES: [usize; 3] = [100, 1_000, 10_000];

fn main() {
    divan::main();
}

fn customers(count: usize) -> Vec<CustomerRecord> {
    let mut rng = StdRng::seed_from_u64(42);
    let purchase_date = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date");

    let mut records: Vec<CustomerRecord> = (0..count)
        .map(|i| {
            let mut record = CustomerRecord::new(format!("{:011}", i), format!("Customer {}", i));
            record.contracts.push(Contract {
                id: format!("C-{}", i),
                purchase_date,
                principal: Decimal::from(rng.gen_range(100..50_000)),
                yield_cap_pct: Some(Decimal::from(30)),
                accrued_yield_pct: Decimal::from(rng.gen_range(0..30)),
                status: ContractStatus::Active,
                yield_term: None,
                coins: None,
            });
            record
        })
        .collect();
    records.shuffle(&mut rng);
    records
}

fn build(records: &[CustomerRecord]) -> CustomerTree {
    let mut tree = AvlTree::new();
    for record in records {
        tree.insert(record.tax_id.clone(), record.clone());
    }
    tree
}

/// Insert every record into an empty tree
#[divan::bench(args = SIZES)]
fn build_index(bencher: Bencher, count: usize) {
    let records = customers(count);
    bencher.bench(|| build(divan::black_box(&records)));
}

/// Point lookups for every key
#[divan::bench(args = SIZES)]
fn find_every_key(bencher: Bencher, count: usize) {
    let records = customers(count);
    let tree = build(&records);
    bencher.bench(|| {
        records
            .iter()
            .filter(|r| tree.find(r.tax_id.as_str()).is_some())
            .count()
    });
}

/// Ordered snapshot of the whole tree
#[divan::bench(args = SIZES)]
fn in_order_snapshot(bencher: Bencher, count: usize) {
    let tree = build(&customers(count));
    bencher.bench(|| tree.in_order());
}

/// Derived figures plus platform totals over an ordered snapshot
#[divan::bench(args = SIZES)]
fn derive_reports(bencher: Bencher, count: usize) {
    let tree = build(&customers(count));
    bencher.bench(|| {
        let records: Vec<CustomerRecord> = tree.iter().map(|(_, r)| r.clone()).collect();
        let totals = platform_totals(&records);
        (derive_all(records).len(), totals)
    });
}

/// Top-20 ranking
#[divan::bench(args = SIZES)]
fn rank_top_investors(bencher: Bencher, count: usize) {
    let records: Vec<CustomerRecord> = build(&customers(count))
        .iter()
        .map(|(_, r)| r.clone())
        .collect();
    bencher.bench(|| top_investors(&records, 20));
}
