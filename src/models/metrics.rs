//! Raw scoring inputs and per-pass population baselines

use serde::{Deserialize, Serialize};

/// Metrics derived from one item's snapshot history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    pub orders_3d_delta: i64,
    pub orders_7d_delta: i64,
    pub reviews_3d_delta: i64,
    /// Orders per day over the short window
    pub velocity_3d: f64,
    /// Orders per day over the long window
    pub velocity_7d: f64,
    pub acceleration: f64,
    pub price_discount_rate: f64,
    /// Fraction of observations in stock, 0-1
    pub stock_stability: f64,
}

impl RawMetrics {
    /// Instability is the scored quantity, not stability.
    pub fn stock_instability(&self) -> f64 {
        1.0 - self.stock_stability
    }
}

/// The five metrics that take part in z-score normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoredMetric {
    #[serde(rename = "orders_3d")]
    Orders3d,
    Acceleration,
    Discount,
    #[serde(rename = "reviews_3d")]
    Reviews3d,
    Stock,
}

impl ScoredMetric {
    pub const ALL: [ScoredMetric; 5] = [
        ScoredMetric::Orders3d,
        ScoredMetric::Acceleration,
        ScoredMetric::Discount,
        ScoredMetric::Reviews3d,
        ScoredMetric::Stock,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScoredMetric::Orders3d => "orders_3d",
            ScoredMetric::Acceleration => "acceleration",
            ScoredMetric::Discount => "discount",
            ScoredMetric::Reviews3d => "reviews_3d",
            ScoredMetric::Stock => "stock",
        }
    }

    /// Raw value of this metric as it enters the z-score.
    pub fn value(&self, metrics: &RawMetrics) -> f64 {
        match self {
            ScoredMetric::Orders3d => metrics.orders_3d_delta as f64,
            ScoredMetric::Acceleration => metrics.acceleration,
            ScoredMetric::Discount => metrics.price_discount_rate,
            ScoredMetric::Reviews3d => metrics.reviews_3d_delta as f64,
            ScoredMetric::Stock => metrics.stock_instability(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricBaseline {
    pub mean: f64,
    pub std_dev: f64,
}

impl MetricBaseline {
    /// Baseline used when there is nothing to aggregate.
    pub const NEUTRAL: MetricBaseline = MetricBaseline {
        mean: 0.0,
        std_dev: 1.0,
    };
}

/// Mean and standard deviation per scored metric for one scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationStatistics {
    pub orders_3d: MetricBaseline,
    pub acceleration: MetricBaseline,
    pub discount: MetricBaseline,
    pub reviews_3d: MetricBaseline,
    pub stock: MetricBaseline,
    pub sample_size: usize,
}

impl PopulationStatistics {
    pub fn neutral() -> Self {
        Self {
            orders_3d: MetricBaseline::NEUTRAL,
            acceleration: MetricBaseline::NEUTRAL,
            discount: MetricBaseline::NEUTRAL,
            reviews_3d: MetricBaseline::NEUTRAL,
            stock: MetricBaseline::NEUTRAL,
            sample_size: 0,
        }
    }

    pub fn get(&self, metric: ScoredMetric) -> MetricBaseline {
        match metric {
            ScoredMetric::Orders3d => self.orders_3d,
            ScoredMetric::Acceleration => self.acceleration,
            ScoredMetric::Discount => self.discount,
            ScoredMetric::Reviews3d => self.reviews_3d,
            ScoredMetric::Stock => self.stock,
        }
    }
}

impl Default for PopulationStatistics {
    fn default() -> Self {
        Self::neutral()
    }
}
