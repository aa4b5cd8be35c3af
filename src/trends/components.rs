//! Product viability components as percentile ranks within a scoring pass

use std::collections::HashMap;

use crate::models::{Item, PvsComponents};
use crate::trends::weights::PvsWeights;

/// Mid-rank percentile of `value` within `population`, 0-100.
///
/// Ties share the midpoint so a population of identical values ranks 50.
pub fn percentile_rank(population: &[f64], value: f64) -> f64 {
    if population.is_empty() {
        return 0.0;
    }
    let below = population.iter().filter(|&&v| v < value).count() as f64;
    let equal = population.iter().filter(|&&v| v == value).count() as f64;
    (below + 0.5 * equal) / population.len() as f64 * 100.0
}

impl PvsComponents {
    /// Composite viability score from the weighted components.
    pub fn weighted_total(&self) -> f64 {
        self.demand_momentum * PvsWeights::DEMAND_MOMENTUM
            + self.sustained_interest * PvsWeights::SUSTAINED_INTEREST
            + self.price_stability * PvsWeights::PRICE_STABILITY
            + self.saturation * PvsWeights::SATURATION
            + self.sentiment * PvsWeights::SENTIMENT
            + self.seasonality * PvsWeights::SEASONALITY
    }
}

fn price_stability_raw(item: &Item) -> f64 {
    1.0 - item.price_discount_rate.abs().min(1.0)
}

fn sentiment_raw(item: &Item) -> f64 {
    let growth = item.reviews_3d_delta.max(0) as f64;
    (item.rating / 5.0) * growth.ln_1p()
}

/// Compute components for every scored item of a pass, in input order.
///
/// Items must already carry their trend score and derived deltas.
/// Seasonality is left at its default.
pub fn compute_components(items: &[Item]) -> Vec<PvsComponents> {
    let mut per_category: HashMap<&str, usize> = HashMap::new();
    for item in items {
        *per_category.entry(item.category.as_str()).or_insert(0) += 1;
    }
    let saturation_raw = |item: &Item| -> f64 {
        let peers = per_category.get(item.category.as_str()).copied().unwrap_or(1);
        1.0 / peers.max(1) as f64
    };

    let scores: Vec<f64> = items.iter().map(|i| i.trend_score).collect();
    let sustained: Vec<f64> = items.iter().map(|i| i.orders_7d_delta as f64).collect();
    let stability: Vec<f64> = items.iter().map(price_stability_raw).collect();
    let saturation: Vec<f64> = items.iter().map(saturation_raw).collect();
    let sentiment: Vec<f64> = items.iter().map(sentiment_raw).collect();

    (0..items.len())
        .map(|idx| PvsComponents {
            demand_momentum: percentile_rank(&scores, scores[idx]),
            sustained_interest: percentile_rank(&sustained, sustained[idx]),
            price_stability: percentile_rank(&stability, stability[idx]),
            saturation: percentile_rank(&saturation, saturation[idx]),
            sentiment: percentile_rank(&sentiment, sentiment[idx]),
            seasonality: PvsComponents::default().seasonality,
        })
        .collect()
}
