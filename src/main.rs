//! Investor Index CLI
//!
//! Command-line interface over the investor ledger.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --snapshot data.json show 12345678900
//! cargo run -- --snapshot data.json list --csv > customers.csv
//! cargo run -- --snapshot data.json top -n 10
//! cargo run -- --snapshot data.json accrue
//! cargo run -- --snapshot data.json last-sweep
//! cargo run -- --snapshot data.json schedule --at 02:00
//! ```
//!
//! The snapshot seeds an in-memory document store, the index is loaded from
//! that store, and every write runs through the write-through protocol, so
//! the snapshot file is kept up to date. Reports go to stdout, logs to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing snapshot, malformed snapshot, unknown customer, etc.)

use investor_index::cli::{self, Command};
use investor_index::config::LedgerConfig;
use investor_index::core::traits::RecordSource;
use investor_index::core::{load_all, CustomerIndex, LedgerEngine};
use investor_index::io::{write_derived_csv, write_top_investors_csv, JsonSnapshotFile, MemoryStore};
use investor_index::logging;
use investor_index::scheduler::{self, DailySchedule};
use investor_index::types::LedgerError;
use serde::Serialize;
use serde_json::json;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use tracing::info;

type Engine = LedgerEngine<MemoryStore, JsonSnapshotFile>;

fn main() {
    let args = cli::parse_args();
    logging::init_logging(&args.log_level);
    let config = args.to_config();

    if let Err(e) = run(&config, args.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn open_engine(config: &LedgerConfig) -> Result<Engine, LedgerError> {
    let snapshot = JsonSnapshotFile::new(&config.snapshot_path);
    let store = MemoryStore::from_records(snapshot.read_all()?);
    let index = CustomerIndex::from_tree(load_all(&store)?);

    info!(path = %config.snapshot_path.display(), customers = index.len(), "ledger opened");
    match snapshot.last_sweep()? {
        Some(marker) => info!(finished_at = %marker.finished_at, "last accrual sweep"),
        None => info!("no accrual sweep recorded yet"),
    }
    Ok(LedgerEngine::new(index, store, snapshot, config.retry).with_top_n(config.top_n))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), LedgerError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).map_err(|e| LedgerError::Io {
        message: format!("Failed to write output: {}", e),
    })?;
    writeln!(out)?;
    Ok(())
}

fn run(config: &LedgerConfig, command: Command) -> Result<(), LedgerError> {
    let engine = open_engine(config)?;

    match command {
        Command::Show { key } => {
            let view = engine.view(&key).ok_or_else(|| LedgerError::not_found(key))?;
            print_json(&view)
        }
        Command::List { raw: true, .. } => print_json(&engine.all()),
        Command::List { csv: true, .. } => {
            write_derived_csv(&engine.derived_all(), &mut io::stdout().lock())
        }
        Command::List { .. } => print_json(&engine.derived_all()),
        Command::Totals => print_json(&engine.platform_totals()),
        Command::Top { csv, .. } => {
            let ranking = engine.top_investors_default();
            if csv {
                write_top_investors_csv(&ranking, &mut io::stdout().lock())
            } else {
                print_json(&ranking)
            }
        }
        Command::Regions => print_json(&engine.count_by_region()),
        Command::Contracts => print_json(&engine.contracts()),
        Command::Withdrawals => print_json(&engine.withdrawals()),
        Command::Idle => print_json(&engine.customers_without_contracts()),
        Command::Accrue { key: Some(key) } => {
            let changed = engine.accrue_one(&key)?;
            print_json(&json!({ "key": key, "changed": changed }))
        }
        Command::Accrue { key: None } => print_json(&engine.accrue_all()),
        Command::LastSweep => print_json(&engine.synchronizer().snapshot().last_sweep()?),
        Command::Schedule { .. } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let schedule = DailySchedule::new(config.schedule);
            let runs = runtime.block_on(scheduler::run_daily(schedule, Arc::new(engine)));
            info!(runs, "scheduler stopped");
            Ok(())
        }
    }
}
