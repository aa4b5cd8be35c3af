//! Shared data models spanning the engine layers.

pub mod item;
pub mod metrics;

pub use item::{
    Item, ItemDetail, NewListing, PricePoint, PvsComponents, SalesPoint, Snapshot, TrendCategory,
    ViabilityGrade,
};
pub use metrics::{MetricBaseline, PopulationStatistics, RawMetrics, ScoredMetric};
