//! Runtime configuration
//!
//! `LedgerConfig` is assembled from command-line arguments (see
//! `CliArgs::to_config`). Invalid numeric values never abort start-up: they
//! fall back to their defaults with a warning.

use crate::core::aggregation::DEFAULT_TOP_N;
use crate::types::LedgerError;
use chrono::NaiveTime;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff for upstream failures
///
/// Only `LedgerError::Upstream` is retried; every other error is returned on
/// the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each following one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Create a policy, replacing a zero attempt count with the default
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        let default = Self::default();

        let max_attempts = if max_attempts == 0 {
            warn!(
                max_attempts,
                fallback = default.max_attempts,
                "invalid retry attempt count, using default"
            );
            default.max_attempts
        } else {
            max_attempts
        };

        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A policy that runs every operation exactly once
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay slept after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op`, retrying transient failures with backoff
    ///
    /// # Arguments
    ///
    /// * `operation` - Name used in log lines
    /// * `op` - The fallible operation
    ///
    /// # Returns
    ///
    /// The first success, or the last error once attempts are exhausted.
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Result<T, LedgerError>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Err(error) if error.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(operation, attempt, ?delay, %error, "retrying after upstream failure");
                    thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Daily trigger time of the accrual sweep, in local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub at: NaiveTime,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            at: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Full runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// JSON snapshot used as record source and warm-start cache
    pub snapshot_path: PathBuf,
    /// Length of the top-investor ranking
    pub top_n: usize,
    pub retry: RetryPolicy,
    pub schedule: ScheduleConfig,
}

impl LedgerConfig {
    /// Configuration with defaults for everything but the snapshot path
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            top_n: DEFAULT_TOP_N,
            retry: RetryPolicy::default(),
            schedule: ScheduleConfig::default(),
        }
    }

    /// Override the ranking length; zero keeps the default
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        if top_n == 0 {
            warn!(top_n, fallback = DEFAULT_TOP_N, "invalid ranking length, using default");
        } else {
            self.top_n = top_n;
        }
        self
    }
}
