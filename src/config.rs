//! Environment-driven configuration

use std::env;
use std::str::FromStr;

use crate::trends::derivation::DerivationWindows;

/// Deployment environment name (`production`, `sandbox`, ...)
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_database_url() -> String {
    env::var("DATABASE_URL")
        .unwrap_or_else(|_| "host=localhost user=postgres dbname=shoptrend".to_string())
}

pub fn get_port() -> u16 {
    env_or("PORT", 8080)
}

/// Storage backend selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

pub fn get_storage_backend() -> StorageBackend {
    match env::var("STORAGE_BACKEND").as_deref() {
        Ok("memory") => StorageBackend::Memory,
        _ => StorageBackend::Postgres,
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Tunables for scoring passes and history handling
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Upper bound on items sampled for population statistics
    pub population_sample_limit: usize,
    /// Maximum age of cached population statistics used for single-item rescoring
    pub stats_refresh_interval_seconds: u64,
    pub windows: DerivationWindows,
    pub snapshot_retention_days: u32,
    pub detail_history_days: u32,
    /// Scheduled pass interval; 0 disables the worker schedule
    pub interval_seconds: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            population_sample_limit: 1000,
            stats_refresh_interval_seconds: 3600,
            windows: DerivationWindows::default(),
            snapshot_retention_days: 30,
            detail_history_days: 30,
            interval_seconds: 3600,
        }
    }
}

impl ScoringConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            population_sample_limit: env_or(
                "POPULATION_SAMPLE_LIMIT",
                defaults.population_sample_limit,
            ),
            stats_refresh_interval_seconds: env_or(
                "STATS_REFRESH_INTERVAL_SECONDS",
                defaults.stats_refresh_interval_seconds,
            ),
            windows: defaults.windows,
            snapshot_retention_days: env_or(
                "SNAPSHOT_RETENTION_DAYS",
                defaults.snapshot_retention_days,
            ),
            detail_history_days: env_or("DETAIL_HISTORY_DAYS", defaults.detail_history_days),
            interval_seconds: env_or("SCORING_INTERVAL_SECONDS", defaults.interval_seconds),
        }
    }
}
