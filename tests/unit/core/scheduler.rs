use std::sync::Arc;

use shoptrend::config::ScoringConfig;
use shoptrend::core::scheduler::{cron_expression, ScoringScheduler};
use shoptrend::db::MemoryStore;
use shoptrend::trends::TrendEngine;

fn engine() -> Arc<TrendEngine> {
    Arc::new(TrendEngine::new(
        Arc::new(MemoryStore::new()),
        ScoringConfig::default(),
    ))
}

#[test]
fn cron_expression_matches_interval() {
    let expr = |secs| cron_expression(secs).unwrap();

    assert_eq!(expr(1), "*/1 * * * * *");
    assert_eq!(expr(15), "*/15 * * * * *");
    assert_eq!(expr(60), "0 */1 * * * *");
    assert_eq!(expr(300), "0 */5 * * * *");
    assert_eq!(expr(3600), "0 0 */1 * * *");
    assert_eq!(expr(6 * 3600), "0 0 */6 * * *");
    assert_eq!(expr(86_400), "0 0 0 * * *");
}

#[test]
fn uneven_intervals_have_no_expression() {
    for secs in [0, 45, 90, 7 * 60, 45 * 60, 5400, 7 * 3600, 2 * 86_400] {
        assert_eq!(cron_expression(secs), None, "{}s", secs);
    }
}

#[test]
fn zero_interval_is_rejected() {
    assert!(ScoringScheduler::new(engine(), 0).is_err());
}

#[test]
fn uneven_interval_is_rejected() {
    assert!(ScoringScheduler::new(engine(), 45).is_err());
    assert!(ScoringScheduler::new(engine(), 7 * 3600).is_err());
    assert!(ScoringScheduler::new(engine(), 900).is_ok());
}

#[tokio::test]
async fn scheduler_starts_and_stops() {
    let scheduler = ScoringScheduler::new(engine(), 3600).unwrap();
    assert!(!scheduler.is_running().await);

    scheduler.start().await;
    assert!(scheduler.is_running().await);

    scheduler.stop().await;
    assert!(!scheduler.is_running().await);
}
