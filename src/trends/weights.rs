//! Composite weights for the trend score and the viability components

use crate::models::ScoredMetric;

/// Trend score weights per z-scored metric
pub struct TrendWeights;

impl TrendWeights {
    pub const ORDERS: f64 = 0.45;
    pub const ACCELERATION: f64 = 0.20;
    pub const DISCOUNT: f64 = 0.15;
    pub const REVIEWS: f64 = 0.10;
    pub const STOCK: f64 = 0.10;

    /// Get weight for a metric
    pub fn get(metric: ScoredMetric) -> f64 {
        match metric {
            ScoredMetric::Orders3d => Self::ORDERS,
            ScoredMetric::Acceleration => Self::ACCELERATION,
            ScoredMetric::Discount => Self::DISCOUNT,
            ScoredMetric::Reviews3d => Self::REVIEWS,
            ScoredMetric::Stock => Self::STOCK,
        }
    }

    /// Verify weights sum to 1.0
    pub fn verify() -> bool {
        (Self::ORDERS + Self::ACCELERATION + Self::DISCOUNT + Self::REVIEWS + Self::STOCK - 1.0)
            .abs()
            < 0.001
    }
}

/// Product viability component weights
pub struct PvsWeights;

impl PvsWeights {
    pub const DEMAND_MOMENTUM: f64 = 0.35;
    pub const SUSTAINED_INTEREST: f64 = 0.20;
    pub const PRICE_STABILITY: f64 = 0.15;
    pub const SATURATION: f64 = 0.15;
    pub const SENTIMENT: f64 = 0.10;
    pub const SEASONALITY: f64 = 0.05;

    pub fn verify() -> bool {
        (Self::DEMAND_MOMENTUM
            + Self::SUSTAINED_INTEREST
            + Self::PRICE_STABILITY
            + Self::SATURATION
            + Self::SENTIMENT
            + Self::SEASONALITY
            - 1.0)
            .abs()
            < 0.001
    }
}
