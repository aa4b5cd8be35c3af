//! Z-score normalization and the composite trend score

use serde::Serialize;

use crate::models::{PopulationStatistics, RawMetrics, ScoredMetric};
use crate::trends::weights::TrendWeights;

/// Composite value treated as the bottom of the 0-100 scale
const Z_FLOOR: f64 = -3.0;
/// Width of the z range mapped onto 0-100
const Z_SPAN: f64 = 6.0;

/// Standard score of `value`; zero when the metric does not discriminate.
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev == 0.0 {
        return 0.0;
    }
    (value - mean) / std_dev
}

/// Per-metric z-scores of one item against a population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZScores {
    pub orders_3d: f64,
    pub acceleration: f64,
    pub discount: f64,
    pub reviews_3d: f64,
    pub stock: f64,
}

impl ZScores {
    pub fn compute(metrics: &RawMetrics, stats: &PopulationStatistics) -> Self {
        let z = |metric: ScoredMetric| {
            let baseline = stats.get(metric);
            z_score(metric.value(metrics), baseline.mean, baseline.std_dev)
        };

        Self {
            orders_3d: z(ScoredMetric::Orders3d),
            acceleration: z(ScoredMetric::Acceleration),
            discount: z(ScoredMetric::Discount),
            reviews_3d: z(ScoredMetric::Reviews3d),
            stock: z(ScoredMetric::Stock),
        }
    }

    pub fn get(&self, metric: ScoredMetric) -> f64 {
        match metric {
            ScoredMetric::Orders3d => self.orders_3d,
            ScoredMetric::Acceleration => self.acceleration,
            ScoredMetric::Discount => self.discount,
            ScoredMetric::Reviews3d => self.reviews_3d,
            ScoredMetric::Stock => self.stock,
        }
    }

    /// Weighted contribution of each metric, in scoring order
    pub fn contributions(&self) -> Vec<(ScoredMetric, f64)> {
        ScoredMetric::ALL
            .iter()
            .map(|&metric| (metric, self.get(metric) * TrendWeights::get(metric)))
            .collect()
    }

    pub fn weighted_sum(&self) -> f64 {
        self.orders_3d * TrendWeights::ORDERS
            + self.acceleration * TrendWeights::ACCELERATION
            + self.discount * TrendWeights::DISCOUNT
            + self.reviews_3d * TrendWeights::REVIEWS
            + self.stock * TrendWeights::STOCK
    }
}

/// Map a weighted z composite onto 0-100, saturating at the bounds.
pub fn normalize_composite(composite: f64) -> f64 {
    let unit = (composite - Z_FLOOR) / Z_SPAN;
    if unit.is_nan() {
        // Opposite infinite z-scores cancelled out
        return 50.0;
    }
    100.0 * unit.clamp(0.0, 1.0)
}

/// Trend score in [0, 100] for one item against the pass statistics.
pub fn trend_score(metrics: &RawMetrics, stats: &PopulationStatistics) -> f64 {
    normalize_composite(ZScores::compute(metrics, stats).weighted_sum())
}
