//! CSV report export
//!
//! Flat CSV renderings of the derived customer summary and of the top
//! investor ranking. Amounts are written with two decimal places.
//!
//! All functions write to any `Write`, so they are tested against in-memory
//! buffers.

use crate::types::{CustomerView, LedgerError, TopInvestor};
use csv::Writer;
use std::io::Write;

fn csv_error(context: &str, error: csv::Error) -> LedgerError {
    LedgerError::Io {
        message: format!("{}: {}", context, error),
    }
}

/// Write one summary row per customer
///
/// Columns: key, name, total_spent, total_profit, available_balance,
/// total_coins, total_referral, total_platform_value, amount_withdrawn,
/// net_receivable. Rows keep the order of `views`.
///
/// # Errors
///
/// Returns `Io` if the writer fails.
pub fn write_derived_csv(views: &[CustomerView], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "key",
            "name",
            "total_spent",
            "total_profit",
            "available_balance",
            "total_coins",
            "total_referral",
            "total_platform_value",
            "amount_withdrawn",
            "net_receivable",
        ])
        .map_err(|e| csv_error("Failed to write CSV header", e))?;

    for view in views {
        let f = &view.financials;
        writer
            .write_record(&[
                view.record.tax_id.clone(),
                view.record.name.clone(),
                format!("{:.2}", f.total_spent),
                format!("{:.2}", f.total_profit),
                format!("{:.2}", f.available_balance),
                format!("{:.2}", f.total_coins),
                format!("{:.2}", f.total_referral),
                format!("{:.2}", f.total_platform_value),
                format!("{:.2}", f.amount_withdrawn),
                format!("{:.2}", f.net_receivable),
            ])
            .map_err(|e| csv_error("Failed to write customer row", e))?;
    }

    writer
        .flush()
        .map_err(|e| LedgerError::Io {
            message: format!("Failed to flush output: {}", e),
        })
}

/// Write the top investor ranking, one row per entry, rank first
pub fn write_top_investors_csv(
    ranking: &[TopInvestor],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["rank", "key", "name", "total_invested"])
        .map_err(|e| csv_error("Failed to write CSV header", e))?;

    for (position, investor) in ranking.iter().enumerate() {
        writer
            .write_record(&[
                (position + 1).to_string(),
                investor.key.clone(),
                investor.name.clone(),
                format!("{:.2}", investor.total_invested),
            ])
            .map_err(|e| csv_error("Failed to write ranking row", e))?;
    }

    writer
        .flush()
        .map_err(|e| LedgerError::Io {
            message: format!("Failed to flush output: {}", e),
        })
}
