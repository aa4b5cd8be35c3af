//! Confidence in an item's trend data from sampling density

/// Hourly snapshots for a full week
pub const IDEAL_SNAPSHOTS: f64 = 24.0 * 7.0;
pub const IDEAL_DAYS: f64 = 7.0;

const SNAPSHOT_WEIGHT: f64 = 0.6;
const DAYS_WEIGHT: f64 = 0.4;

/// Confidence in [0, 1]. Each factor saturates at 1.0 before weighting.
pub fn compute_confidence(snapshot_count: i64, days_tracked: f64) -> f64 {
    let snapshots = (snapshot_count.max(0) as f64 / IDEAL_SNAPSHOTS).min(1.0);
    let days = (days_tracked.max(0.0) / IDEAL_DAYS).min(1.0);
    snapshots * SNAPSHOT_WEIGHT + days * DAYS_WEIGHT
}
