//! Daily accrual trigger
//!
//! Sleeps until the configured local time, runs the accrual sweep on a
//! blocking thread and goes back to sleep. The sweep itself is synchronous;
//! only the waiting happens on the tokio runtime.

use crate::config::ScheduleConfig;
use crate::core::engine::LedgerEngine;
use crate::core::traits::{ExternalStore, SnapshotWriter};
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// A fixed wall-clock time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(config: ScheduleConfig) -> Self {
        DailySchedule { at: config.at }
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// Next occurrence of the configured time strictly after `now`
    pub fn next_run_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.at);
        if today > now {
            today
        } else {
            today + TimeDelta::days(1)
        }
    }

    /// How long to sleep from `now` until the next run
    pub fn delay_from(&self, now: NaiveDateTime) -> Duration {
        (self.next_run_after(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Run the daily sweep until Ctrl-C
///
/// # Returns
///
/// Number of sweeps that ran
pub async fn run_daily<S, W>(schedule: DailySchedule, engine: Arc<LedgerEngine<S, W>>) -> usize
where
    S: ExternalStore + Send + Sync + 'static,
    W: SnapshotWriter + Send + Sync + 'static,
{
    run_until(schedule, engine, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    })
    .await
}

/// Run the daily sweep until `shutdown` completes
pub async fn run_until<S, W, F>(
    schedule: DailySchedule,
    engine: Arc<LedgerEngine<S, W>>,
    shutdown: F,
) -> usize
where
    S: ExternalStore + Send + Sync + 'static,
    W: SnapshotWriter + Send + Sync + 'static,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut runs = 0;

    loop {
        let now = Local::now().naive_local();
        let next = schedule.next_run_after(now);
        info!(next = %next, "next accrual sweep scheduled");

        tokio::select! {
            _ = &mut shutdown => return runs,
            _ = tokio::time::sleep(schedule.delay_from(now)) => {}
        }

        let sweep_engine = Arc::clone(&engine);
        match tokio::task::spawn_blocking(move || sweep_engine.accrue_all()).await {
            Ok(report) => {
                runs += 1;
                if report.failures.is_empty() {
                    info!(updated = report.updated, "daily accrual finished");
                } else {
                    for failure in &report.failures {
                        warn!(
                            key = %failure.key,
                            contracts = ?failure.contract_ids,
                            error = %failure.error,
                            "customer left unaccrued"
                        );
                    }
                }
            }
            Err(e) => error!(error = %e, "accrual sweep panicked"),
        }
    }
}
