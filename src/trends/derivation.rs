//! Velocity, acceleration, discount and stock metrics from snapshot history

use chrono::{DateTime, Duration, Utc};

use crate::models::{RawMetrics, Snapshot};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Trailing windows used for short and long velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationWindows {
    pub short_days: u32,
    pub long_days: u32,
}

impl Default for DerivationWindows {
    fn default() -> Self {
        Self {
            short_days: 3,
            long_days: 7,
        }
    }
}

/// Snapshots observed within `window_days` up to `now`, oldest first.
///
/// Snapshots stamped after `now` are left out.
fn in_window(snapshots: &[Snapshot], window_days: u32, now: DateTime<Utc>) -> Vec<&Snapshot> {
    let cutoff = now - Duration::days(i64::from(window_days));
    let mut recent: Vec<&Snapshot> = snapshots
        .iter()
        .filter(|s| s.timestamp >= cutoff && s.timestamp <= now)
        .collect();
    recent.sort_by_key(|s| s.timestamp);
    recent
}

/// Orders per day over the trailing window.
///
/// Fewer than two snapshots in the window, or zero elapsed time between the
/// first and last, yields 0.
pub fn velocity(snapshots: &[Snapshot], window_days: u32, now: DateTime<Utc>) -> f64 {
    let recent = in_window(snapshots, window_days, now);
    let [first, .., last] = recent.as_slice() else {
        return 0.0;
    };

    let elapsed_days = (last.timestamp - first.timestamp).num_milliseconds() as f64 / MILLIS_PER_DAY;
    if elapsed_days == 0.0 {
        return 0.0;
    }

    (last.sold_count - first.sold_count) as f64 / elapsed_days
}

/// Relative change of the short velocity against the long one.
pub fn acceleration(velocity_short: f64, velocity_long: f64) -> f64 {
    if velocity_long == 0.0 {
        return 0.0;
    }
    (velocity_short - velocity_long) / velocity_long
}

/// Fractional discount off the original price. Price increases come out negative.
pub fn discount_rate(current_price: f64, original_price: Option<f64>) -> f64 {
    match original_price {
        Some(original) if original != 0.0 => (original - current_price) / original,
        _ => 0.0,
    }
}

/// Fraction of snapshots that were in stock; 1.0 with no history.
pub fn stock_stability(snapshots: &[Snapshot]) -> f64 {
    if snapshots.is_empty() {
        return 1.0;
    }
    let in_stock = snapshots.iter().filter(|s| s.in_stock).count();
    in_stock as f64 / snapshots.len() as f64
}

/// Counter tracked by a snapshot that can be differenced over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Sold,
    Reviews,
}

impl Counter {
    fn read(&self, snapshot: &Snapshot) -> i64 {
        match self {
            Counter::Sold => snapshot.sold_count,
            Counter::Reviews => snapshot.review_count,
        }
    }
}

/// Change in a counter between the first and last snapshot of the window.
pub fn window_delta(
    snapshots: &[Snapshot],
    window_days: u32,
    now: DateTime<Utc>,
    counter: Counter,
) -> i64 {
    let recent = in_window(snapshots, window_days, now);
    match recent.as_slice() {
        [first, .., last] => counter.read(last) - counter.read(first),
        _ => 0,
    }
}

/// Number of times the sold count went down between consecutive observations.
pub fn sold_count_anomalies(snapshots: &[Snapshot]) -> usize {
    let mut ordered: Vec<&Snapshot> = snapshots.iter().collect();
    ordered.sort_by_key(|s| s.timestamp);
    ordered
        .windows(2)
        .filter(|pair| pair[1].sold_count < pair[0].sold_count)
        .count()
}

impl RawMetrics {
    /// Derive every raw scoring input for one item.
    ///
    /// `history` is expected to cover at least the long window; stock
    /// stability is measured over whatever slice is passed in.
    pub fn derive(
        history: &[Snapshot],
        current_price: f64,
        original_price: Option<f64>,
        windows: DerivationWindows,
        now: DateTime<Utc>,
    ) -> Self {
        let velocity_3d = velocity(history, windows.short_days, now);
        let velocity_7d = velocity(history, windows.long_days, now);

        Self {
            orders_3d_delta: window_delta(history, windows.short_days, now, Counter::Sold),
            orders_7d_delta: window_delta(history, windows.long_days, now, Counter::Sold),
            reviews_3d_delta: window_delta(history, windows.short_days, now, Counter::Reviews),
            velocity_3d,
            velocity_7d,
            acceleration: acceleration(velocity_3d, velocity_7d),
            price_discount_rate: discount_rate(current_price, original_price),
            stock_stability: stock_stability(history),
        }
    }
}
