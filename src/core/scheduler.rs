//! Cron-based scheduler for periodic scoring passes

use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::trends::engine::TrendEngine;

pub type SchedulerError = Box<dyn std::error::Error + Send + Sync>;

/// Cron expression firing every `interval_seconds`.
///
/// Cron steps restart at every unit boundary, so an interval must divide its
/// unit evenly to fire at a steady rate. Anything else (45s, 7h) yields `None`.
pub fn cron_expression(interval_seconds: u64) -> Option<String> {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 3600;
    const DAY: u64 = 86_400;

    let divides = |step: u64, unit: u64| step > 0 && step < unit && unit % step == 0;

    if divides(interval_seconds, MINUTE) {
        Some(format!("*/{} * * * * *", interval_seconds))
    } else if interval_seconds % MINUTE == 0 && divides(interval_seconds / MINUTE, 60) {
        Some(format!("0 */{} * * * *", interval_seconds / MINUTE))
    } else if interval_seconds % HOUR == 0 && divides(interval_seconds / HOUR, 24) {
        Some(format!("0 0 */{} * * *", interval_seconds / HOUR))
    } else if interval_seconds == DAY {
        Some("0 0 0 * * *".to_string())
    } else {
        None
    }
}

/// Runs a population scoring pass on every cron tick
pub struct ScoringScheduler {
    engine: Arc<TrendEngine>,
    schedule: Schedule,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl ScoringScheduler {
    /// `interval_seconds` of 0 means scheduling is disabled and is rejected,
    /// as is any interval [`cron_expression`] cannot express.
    pub fn new(engine: Arc<TrendEngine>, interval_seconds: u64) -> Result<Self, SchedulerError> {
        if interval_seconds == 0 {
            return Err("Scheduler disabled: interval_seconds is 0".into());
        }

        let cron_expr = cron_expression(interval_seconds).ok_or_else(|| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "Interval of {}s does not evenly divide a minute, hour or day",
                    interval_seconds
                ),
            )) as SchedulerError
        })?;
        let schedule = Schedule::from_str(&cron_expr).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid cron expression '{}': {}", cron_expr, e),
            )) as SchedulerError
        })?;

        info!(
            interval = interval_seconds,
            cron = %cron_expr,
            "ScoringScheduler: created with interval {}s",
            interval_seconds
        );

        Ok(Self {
            engine,
            schedule,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn start(&self) {
        let engine = self.engine.clone();
        let schedule = self.schedule.clone();

        let handle = tokio::spawn(async move {
            info!("ScoringScheduler: started, waiting for cron schedule...");

            loop {
                let Some(next_tick) = schedule.upcoming(Utc).next() else {
                    warn!("ScoringScheduler: schedule has no upcoming ticks");
                    tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
                    continue;
                };
                let now = Utc::now();
                if next_tick > now {
                    let wait = (next_tick - now).to_std().unwrap_or_default();
                    tokio::time::sleep(wait).await;
                }

                debug!(tick = %next_tick, "ScoringScheduler: cron tick");
                // Failures are logged and counted by the engine; the next tick retries
                let _ = engine.run_pass(Utc::now()).await;
            }
        });

        *self.handle.write().await = Some(handle);
        info!("ScoringScheduler: started successfully");
    }

    pub async fn stop(&self) {
        if let Some(h) = self.handle.write().await.take() {
            h.abort();
            info!("ScoringScheduler: stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
