//! Trend scoring: metric derivation, population statistics, scoring and grading

pub mod classification;
pub mod components;
pub mod confidence;
pub mod derivation;
pub mod engine;
pub mod population;
pub mod scoring;
pub mod weights;

pub use classification::{classify_trend, grade_viability, viability_summary};
pub use confidence::compute_confidence;
pub use derivation::DerivationWindows;
pub use engine::{score_population, IngestError, PassReport, ScoredPopulation, TrendEngine};
pub use scoring::trend_score;
