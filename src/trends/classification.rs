//! Trend category rules, viability grading and the plain-English summary

use crate::models::{Item, RawMetrics, TrendCategory, ViabilityGrade};

const BREAKOUT_MIN_ORDERS_3D: i64 = 500;
const BREAKOUT_MIN_ACCELERATION: f64 = 0.3;
const DISCOUNT_MIN_RATE: f64 = 0.25;
const DISCOUNT_MIN_VELOCITY: f64 = 50.0;
const SUSTAINED_MIN_VELOCITY: f64 = 100.0;
const SUSTAINED_MAX_ACCELERATION: f64 = 0.2;

/// Classify an item. Rules are checked in priority order and the first match wins.
///
/// `Sustained` is also the fallback for moderate performers that match no
/// rule, so every item gets a category.
pub fn classify_trend(metrics: &RawMetrics) -> TrendCategory {
    if metrics.orders_3d_delta > BREAKOUT_MIN_ORDERS_3D
        && metrics.acceleration > BREAKOUT_MIN_ACCELERATION
    {
        return TrendCategory::Breakout;
    }

    if metrics.price_discount_rate > DISCOUNT_MIN_RATE
        && metrics.velocity_3d > DISCOUNT_MIN_VELOCITY
    {
        return TrendCategory::DiscountDriven;
    }

    if metrics.velocity_3d > SUSTAINED_MIN_VELOCITY
        && metrics.acceleration.abs() < SUSTAINED_MAX_ACCELERATION
    {
        return TrendCategory::Sustained;
    }

    TrendCategory::Sustained
}

/// Trend score after rating, social-proof and confidence adjustments.
pub fn adjusted_viability_score(
    trend_score: f64,
    rating: f64,
    review_count: i64,
    confidence: f64,
) -> f64 {
    let mut score = trend_score;

    if rating >= 4.5 {
        score += 10.0;
    } else if rating >= 4.0 {
        score += 5.0;
    } else if rating < 3.5 {
        score -= 10.0;
    }

    if review_count > 1000 {
        score += 5.0;
    } else if review_count < 50 {
        score -= 5.0;
    }

    if confidence < 0.5 {
        score -= 10.0;
    }

    score
}

/// Coarse letter grade. Only A, B, C and D are produced.
pub fn grade_viability(
    trend_score: f64,
    rating: f64,
    review_count: i64,
    confidence: f64,
) -> ViabilityGrade {
    let score = adjusted_viability_score(trend_score, rating, review_count, confidence);

    if score >= 75.0 {
        ViabilityGrade::A
    } else if score >= 60.0 {
        ViabilityGrade::B
    } else if score >= 45.0 {
        ViabilityGrade::C
    } else {
        ViabilityGrade::D
    }
}

/// One-line summary such as `"A: strong 3d momentum, stable price, low saturation."`
pub fn viability_summary(item: &Item) -> String {
    let mut parts: Vec<&str> = Vec::new();

    if item.orders_3d_delta > 500 {
        parts.push("strong 3d momentum");
    } else if item.orders_3d_delta > 100 {
        parts.push("moderate momentum");
    }

    if item.price_discount_rate < 0.1 {
        parts.push("stable price");
    } else if item.price_discount_rate > 0.3 {
        parts.push("heavy discount");
    }

    if item.reviews_3d_delta > 50 {
        parts.push("strong review growth");
    } else if item.reviews_3d_delta < 10 {
        parts.push("watch review growth");
    }

    if item.pvs.saturation >= 50.0 {
        parts.push("low saturation");
    } else {
        parts.push("crowded category");
    }

    let grade = item.viability_grade.unwrap_or(ViabilityGrade::C);
    format!("{}: {}.", grade, parts.join(", "))
}
