pub mod config;
pub mod core;
pub mod db;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod trends;
