//! Shoptrend API Server
//!
//! Serves trending listings, item detail and snapshot ingestion over HTTP.
//! Scheduled scoring passes run in the separate worker process.

use dotenvy::dotenv;
use shoptrend::config::{self, ScoringConfig, StorageBackend};
use shoptrend::core::http::start_server;
use shoptrend::db::{ItemStore, MemoryStore, PgStore};
use shoptrend::logging;
use shoptrend::metrics::Metrics;
use shoptrend::trends::TrendEngine;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let port = config::get_port();
    let env = config::get_environment();
    info!("Starting Shoptrend API Server");
    info!(environment = %env, "Environment");
    info!(port = port, "HTTP Server: http://0.0.0.0:{}", port);

    let metrics = Arc::new(Metrics::new()?);

    // The API stays up without a store; data routes then answer 503
    let store: Option<Arc<dyn ItemStore>> = match config::get_storage_backend() {
        StorageBackend::Memory => {
            warn!("Using in-memory item store; data is lost on restart");
            Some(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => match PgStore::connect(&config::get_database_url()).await {
            Ok(store) => {
                info!("PostgreSQL connected for API server");
                Some(Arc::new(store))
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to PostgreSQL - product endpoints will be unavailable");
                None
            }
        },
    };
    metrics
        .database_connected
        .set(if store.is_some() { 1.0 } else { 0.0 });

    let trends = store.map(|store| {
        Arc::new(TrendEngine::new(store, ScoringConfig::from_env()).with_metrics(metrics.clone()))
    });

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, metrics, trends).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("API server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down API server...");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    Ok(())
}
