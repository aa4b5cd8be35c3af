//! Population baselines for z-score normalization

use statrs::statistics::Statistics;

use crate::models::{Item, MetricBaseline, PopulationStatistics, RawMetrics, ScoredMetric};

/// Mean and population standard deviation of one metric column.
///
/// The deviation is taken in a second pass around the mean so a constant
/// column comes out at exactly zero rather than as rounding noise.
fn baseline(values: &[f64]) -> MetricBaseline {
    let Some(&first) = values.first() else {
        return MetricBaseline::NEUTRAL;
    };
    if values.iter().all(|&v| v == first) {
        return MetricBaseline {
            mean: first,
            std_dev: 0.0,
        };
    }

    let mean = values.iter().mean();
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    MetricBaseline {
        mean,
        std_dev: variance.sqrt(),
    }
}

/// Aggregate baselines across a scoring population.
///
/// An empty population yields `{mean: 0, std_dev: 1}` for every metric so
/// downstream z-scores stay neutral.
pub fn aggregate(population: &[RawMetrics]) -> PopulationStatistics {
    let column = |metric: ScoredMetric| -> MetricBaseline {
        let values: Vec<f64> = population.iter().map(|m| metric.value(m)).collect();
        baseline(&values)
    };

    PopulationStatistics {
        orders_3d: column(ScoredMetric::Orders3d),
        acceleration: column(ScoredMetric::Acceleration),
        discount: column(ScoredMetric::Discount),
        reviews_3d: column(ScoredMetric::Reviews3d),
        stock: column(ScoredMetric::Stock),
        sample_size: population.len(),
    }
}

/// Raw metrics as last persisted on an item.
pub fn stored_metrics(item: &Item) -> RawMetrics {
    RawMetrics {
        orders_3d_delta: item.orders_3d_delta,
        orders_7d_delta: item.orders_7d_delta,
        reviews_3d_delta: item.reviews_3d_delta,
        velocity_3d: item.velocity_3d,
        velocity_7d: 0.0,
        acceleration: item.acceleration,
        price_discount_rate: item.price_discount_rate,
        stock_stability: item.stock_stability,
    }
}

/// Aggregate baselines from the metrics already stored on a sampled population.
pub fn aggregate_items(items: &[Item]) -> PopulationStatistics {
    let population: Vec<RawMetrics> = items.iter().map(stored_metrics).collect();
    aggregate(&population)
}
