use crate::config::{LedgerConfig, RetryPolicy, ScheduleConfig};
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Query and maintain the investor ledger
#[derive(Parser, Debug)]
#[command(name = "investor-index")]
#[command(about = "Query and maintain the investor ledger", long_about = None)]
pub struct CliArgs {
    /// JSON snapshot holding every customer record
    #[arg(
        long = "snapshot",
        value_name = "PATH",
        help = "Path to the JSON snapshot file"
    )]
    pub snapshot: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "info",
        help = "Log level: error, warn, info, debug or trace"
    )]
    pub log_level: String,

    /// Attempts per store or snapshot write
    #[arg(
        long = "retries",
        value_name = "COUNT",
        help = "Attempts per upstream write, including the first (default: 3)"
    )]
    pub retries: Option<u32>,

    /// Delay before the first retry
    #[arg(
        long = "retry-delay-ms",
        value_name = "MS",
        help = "Delay before the first retry in milliseconds, doubled each attempt (default: 100)"
    )]
    pub retry_delay_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Ledger operations
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show one customer with derived fields
    Show {
        /// Primary key of the customer
        key: String,
    },
    /// List every customer
    List {
        /// Omit derived fields
        #[arg(long)]
        raw: bool,
        /// Write a CSV summary instead of JSON
        #[arg(long, conflicts_with = "raw")]
        csv: bool,
    },
    /// Platform-wide totals
    Totals,
    /// Customers ranked by invested principal
    Top {
        /// Ranking length
        #[arg(short = 'n', long = "count", value_name = "N")]
        count: Option<usize>,
        /// Write CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },
    /// Customer count per region code
    Regions,
    /// Every contract with its owner
    Contracts,
    /// Every withdrawal with its owner
    Withdrawals,
    /// Customers without contracts
    Idle,
    /// Run one accrual step
    Accrue {
        /// Accrue a single customer instead of the whole index
        #[arg(long)]
        key: Option<String>,
    },
    /// When the last accrual sweep finished
    LastSweep,
    /// Run the accrual sweep every day until interrupted
    Schedule {
        /// Local time of day, HH:MM
        #[arg(long, value_name = "HH:MM", value_parser = parse_time_of_day)]
        at: Option<NaiveTime>,
    },
}

/// Parse a `HH:MM` time of day
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| format!("invalid time '{}' (expected HH:MM): {}", raw, e))
}

impl CliArgs {
    /// Build the runtime configuration from the arguments
    ///
    /// Missing values take their defaults; invalid ones fall back to the
    /// defaults with a warning.
    ///
    /// # Returns
    ///
    /// A `LedgerConfig` with values from CLI arguments or defaults.
    pub fn to_config(&self) -> LedgerConfig {
        let default_retry = RetryPolicy::default();
        let retry = if self.retries.is_some() || self.retry_delay_ms.is_some() {
            RetryPolicy::new(
                self.retries.unwrap_or(default_retry.max_attempts),
                self.retry_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_retry.base_delay),
            )
        } else {
            default_retry
        };

        let mut config = LedgerConfig::new(self.snapshot.clone());
        config.retry = retry;

        match &self.command {
            Command::Top { count: Some(n), .. } => config = config.with_top_n(*n),
            Command::Schedule { at: Some(at) } => config.schedule = ScheduleConfig { at: *at },
            _ => {}
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::show(&["program", "--snapshot", "d.json", "show", "111"], Command::Show { key: "111".to_string() })]
    #[case::list(&["program", "--snapshot", "d.json", "list"], Command::List { raw: false, csv: false })]
    #[case::list_raw(&["program", "--snapshot", "d.json", "list", "--raw"], Command::List { raw: true, csv: false })]
    #[case::totals(&["program", "--snapshot", "d.json", "totals"], Command::Totals)]
    #[case::top(&["program", "--snapshot", "d.json", "top", "-n", "5", "--csv"], Command::Top { count: Some(5), csv: true })]
    #[case::regions(&["program", "--snapshot", "d.json", "regions"], Command::Regions)]
    #[case::idle(&["program", "--snapshot", "d.json", "idle"], Command::Idle)]
    #[case::accrue_one(&["program", "--snapshot", "d.json", "accrue", "--key", "9"], Command::Accrue { key: Some("9".to_string()) })]
    #[case::accrue_all(&["program", "--snapshot", "d.json", "accrue"], Command::Accrue { key: None })]
    #[case::last_sweep(&["program", "--snapshot", "d.json", "last-sweep"], Command::LastSweep)]
    fn test_command_parsing(#[case] args: &[&str], #[case] expected: Command) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.command, expected);
        assert_eq!(parsed.log_level, "info");
    }

    #[rstest]
    #[case::defaults(&["program", "--snapshot", "d.json", "totals"], 3, 100)]
    #[case::retries(&["program", "--snapshot", "d.json", "--retries", "5", "totals"], 5, 100)]
    #[case::delay(&["program", "--snapshot", "d.json", "--retry-delay-ms", "20", "totals"], 3, 20)]
    #[case::zero_retries_fall_back(&["program", "--snapshot", "d.json", "--retries", "0", "totals"], 3, 100)]
    fn test_retry_config(#[case] args: &[&str], #[case] attempts: u32, #[case] delay_ms: u64) {
        let config = CliArgs::try_parse_from(args).unwrap().to_config();
        assert_eq!(config.retry.max_attempts, attempts);
        assert_eq!(config.retry.base_delay, Duration::from_millis(delay_ms));
    }

    #[rstest]
    #[case::default_top(&["program", "--snapshot", "d.json", "top"], 20)]
    #[case::custom_top(&["program", "--snapshot", "d.json", "top", "--count", "3"], 3)]
    #[case::zero_top(&["program", "--snapshot", "d.json", "top", "-n", "0"], 20)]
    fn test_top_n_config(#[case] args: &[&str], #[case] expected: usize) {
        let config = CliArgs::try_parse_from(args).unwrap().to_config();
        assert_eq!(config.top_n, expected);
        assert_eq!(config.snapshot_path, PathBuf::from("d.json"));
    }

    #[test]
    fn test_schedule_time() {
        let args = ["program", "--snapshot", "d.json", "schedule", "--at", "03:30"];
        let config = CliArgs::try_parse_from(args).unwrap().to_config();
        assert_eq!(config.schedule.at, NaiveTime::from_hms_opt(3, 30, 0).unwrap());

        let default = CliArgs::try_parse_from(["program", "--snapshot", "d.json", "schedule"])
            .unwrap()
            .to_config();
        assert_eq!(default.schedule.at, NaiveTime::from_hms_opt(2, 0, 0).unwrap());
    }

    #[rstest]
    #[case::missing_snapshot(&["program", "totals"])]
    #[case::missing_command(&["program", "--snapshot", "d.json"])]
    #[case::show_without_key(&["program", "--snapshot", "d.json", "show"])]
    #[case::bad_time(&["program", "--snapshot", "d.json", "schedule", "--at", "25:00"])]
    #[case::raw_and_csv(&["program", "--snapshot", "d.json", "list", "--raw", "--csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
