//! Shoptrend Worker
//!
//! Runs population scoring passes on a fixed schedule against the shared store.

use dotenvy::dotenv;
use shoptrend::config::{self, ScoringConfig};
use shoptrend::core::scheduler::ScoringScheduler;
use shoptrend::db::PgStore;
use shoptrend::logging;
use shoptrend::metrics::Metrics;
use shoptrend::trends::TrendEngine;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let scoring_config = ScoringConfig::from_env();
    let env = config::get_environment();
    info!("Starting Shoptrend Worker");
    info!(environment = %env, "Environment");

    if scoring_config.interval_seconds == 0 {
        return Err("SCORING_INTERVAL_SECONDS must be > 0 for worker".into());
    }

    let metrics = Arc::new(Metrics::new()?);

    info!("Initializing PostgreSQL connection...");
    let store = match PgStore::connect(&config::get_database_url()).await {
        Ok(store) => {
            info!("PostgreSQL connected");
            metrics.database_connected.set(1.0);
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "Worker requires PostgreSQL - exiting");
            return Err(format!("PostgreSQL connection required for worker: {}", e).into());
        }
    };

    info!(
        interval = scoring_config.interval_seconds,
        sample_limit = scoring_config.population_sample_limit,
        retention_days = scoring_config.snapshot_retention_days,
        "Scoring pass: every {} seconds",
        scoring_config.interval_seconds
    );

    let interval = scoring_config.interval_seconds;
    let engine = Arc::new(TrendEngine::new(store, scoring_config).with_metrics(metrics));

    let scheduler = ScoringScheduler::new(engine, interval)
        .map_err(|e| format!("Failed to create scheduler: {}", e))?;
    scheduler.start().await;

    info!("Worker started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down worker...");
            scheduler.stop().await;
            info!("Worker stopped");
        }
    }

    Ok(())
}
