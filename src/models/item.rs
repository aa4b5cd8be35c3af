//! Tracked listing, snapshot and detail view models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trend category assigned by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendCategory {
    Breakout,
    DiscountDriven,
    Sustained,
}

impl TrendCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendCategory::Breakout => "breakout",
            TrendCategory::DiscountDriven => "discount_driven",
            TrendCategory::Sustained => "sustained",
        }
    }
}

impl fmt::Display for TrendCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakout" => Ok(TrendCategory::Breakout),
            "discount_driven" => Ok(TrendCategory::DiscountDriven),
            "sustained" => Ok(TrendCategory::Sustained),
            other => Err(format!("unknown trend category: {}", other)),
        }
    }
}

/// Viability letter grade.
///
/// The grading rules only ever produce `A`, `B`, `C` and `D`. The signed
/// variants and `E` are part of the stored/wire vocabulary and are accepted
/// when parsing, but no threshold maps to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViabilityGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "C-")]
    CMinus,
    D,
    E,
}

impl ViabilityGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViabilityGrade::APlus => "A+",
            ViabilityGrade::A => "A",
            ViabilityGrade::AMinus => "A-",
            ViabilityGrade::BPlus => "B+",
            ViabilityGrade::B => "B",
            ViabilityGrade::BMinus => "B-",
            ViabilityGrade::CPlus => "C+",
            ViabilityGrade::C => "C",
            ViabilityGrade::CMinus => "C-",
            ViabilityGrade::D => "D",
            ViabilityGrade::E => "E",
        }
    }
}

impl fmt::Display for ViabilityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViabilityGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A+" => Ok(ViabilityGrade::APlus),
            "A" => Ok(ViabilityGrade::A),
            "A-" => Ok(ViabilityGrade::AMinus),
            "B+" => Ok(ViabilityGrade::BPlus),
            "B" => Ok(ViabilityGrade::B),
            "B-" => Ok(ViabilityGrade::BMinus),
            "C+" => Ok(ViabilityGrade::CPlus),
            "C" => Ok(ViabilityGrade::C),
            "C-" => Ok(ViabilityGrade::CMinus),
            "D" => Ok(ViabilityGrade::D),
            "E" => Ok(ViabilityGrade::E),
            other => Err(format!("unknown viability grade: {}", other)),
        }
    }
}

fn default_in_stock() -> bool {
    true
}

/// One point-in-time observation of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    /// Cumulative units sold as displayed on the listing
    pub sold_count: i64,
    pub rating: f64,
    pub review_count: i64,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, price: f64, sold_count: i64) -> Self {
        Self {
            timestamp,
            price,
            original_price: None,
            sold_count,
            rating: 0.0,
            review_count: 0,
            in_stock: true,
        }
    }

    pub fn with_original_price(mut self, original_price: f64) -> Self {
        self.original_price = Some(original_price);
        self
    }

    pub fn with_reviews(mut self, rating: f64, review_count: i64) -> Self {
        self.rating = rating;
        self.review_count = review_count;
        self
    }

    pub fn with_in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = in_stock;
        self
    }

    /// Reject observations no real listing can produce.
    pub fn validate(&self) -> Result<(), String> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("price must be a non-negative number, got {}", self.price));
        }
        if let Some(original) = self.original_price {
            if !original.is_finite() || original < 0.0 {
                return Err(format!(
                    "original_price must be a non-negative number, got {}",
                    original
                ));
            }
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(format!("rating must be within 0-5, got {}", self.rating));
        }
        if self.review_count < 0 {
            return Err(format!("review_count must be non-negative, got {}", self.review_count));
        }
        if self.sold_count < 0 {
            return Err(format!("sold_count must be non-negative, got {}", self.sold_count));
        }
        Ok(())
    }
}

/// Product viability sub-components, each a 0-100 percentile within a scoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PvsComponents {
    #[serde(rename = "pv_demand_momentum", default)]
    pub demand_momentum: f64,
    #[serde(rename = "pv_sustained_interest", default)]
    pub sustained_interest: f64,
    #[serde(rename = "pv_price_stability", default)]
    pub price_stability: f64,
    #[serde(rename = "pv_saturation", default)]
    pub saturation: f64,
    #[serde(rename = "pv_sentiment", default)]
    pub sentiment: f64,
    /// Not computed yet; stays at its default.
    #[serde(rename = "pv_seasonality", default)]
    pub seasonality: f64,
}

/// Descriptive attributes used to register a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListing {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub image_url: String,
    pub category: String,
    #[serde(default)]
    pub shop_id: String,
    #[serde(default)]
    pub shop_name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub product_url: String,
    #[serde(default)]
    pub shop_url: String,
    #[serde(default)]
    pub commission_rate: Option<f64>,
    #[serde(default)]
    pub has_affiliate_program: bool,
}

/// A tracked listing with its current state and computed trend fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub image_url: String,
    pub category: String,
    #[serde(default)]
    pub shop_id: String,
    #[serde(default)]
    pub shop_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    // Current data
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub sold_count: i64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: i64,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,

    #[serde(default)]
    pub product_url: String,
    #[serde(default)]
    pub shop_url: String,

    // Trend metrics
    #[serde(default)]
    pub trend_score: f64,
    #[serde(default)]
    pub orders_3d_delta: i64,
    #[serde(default)]
    pub orders_7d_delta: i64,
    #[serde(default)]
    pub reviews_3d_delta: i64,
    #[serde(default)]
    pub velocity_3d: f64,
    #[serde(default)]
    pub acceleration: f64,
    #[serde(default)]
    pub price_discount_rate: f64,
    #[serde(default = "default_stock_stability")]
    pub stock_stability: f64,

    // Classification
    #[serde(default)]
    pub trend_category: Option<TrendCategory>,
    #[serde(default)]
    pub viability_grade: Option<ViabilityGrade>,
    #[serde(default)]
    pub viability_summary: String,
    #[serde(default)]
    pub confidence_score: f64,

    #[serde(flatten)]
    pub pvs: PvsComponents,

    #[serde(default)]
    pub commission_rate: Option<f64>,
    #[serde(default)]
    pub has_affiliate_program: bool,

    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub snapshot_count: i64,
}

fn default_stock_stability() -> f64 {
    1.0
}

impl Item {
    /// Create an untracked item from listing attributes; computed fields start neutral.
    pub fn new(listing: NewListing, now: DateTime<Utc>) -> Self {
        Self {
            id: listing.id,
            title: listing.title,
            image_url: listing.image_url,
            category: listing.category,
            shop_id: listing.shop_id,
            shop_name: listing.shop_name,
            country: listing.country,
            current_price: 0.0,
            original_price: None,
            sold_count: 0,
            rating: 0.0,
            review_count: 0,
            in_stock: true,
            product_url: listing.product_url,
            shop_url: listing.shop_url,
            trend_score: 0.0,
            orders_3d_delta: 0,
            orders_7d_delta: 0,
            reviews_3d_delta: 0,
            velocity_3d: 0.0,
            acceleration: 0.0,
            price_discount_rate: 0.0,
            stock_stability: 1.0,
            trend_category: None,
            viability_grade: None,
            viability_summary: String::new(),
            confidence_score: 0.0,
            pvs: PvsComponents::default(),
            commission_rate: listing.commission_rate,
            has_affiliate_program: listing.has_affiliate_program,
            first_seen: now,
            last_updated: now,
            snapshot_count: 0,
        }
    }

    /// Overwrite descriptive attributes, leaving tracked state untouched.
    pub fn update_listing(&mut self, listing: NewListing) {
        self.title = listing.title;
        self.image_url = listing.image_url;
        self.category = listing.category;
        self.shop_id = listing.shop_id;
        self.shop_name = listing.shop_name;
        self.country = listing.country;
        self.product_url = listing.product_url;
        self.shop_url = listing.shop_url;
        self.commission_rate = listing.commission_rate;
        self.has_affiliate_program = listing.has_affiliate_program;
    }

    /// Fold a newly appended snapshot into the current state.
    ///
    /// Returns false when the snapshot is older than the last observation, in
    /// which case only the counter moves.
    pub fn observe(&mut self, snapshot: &Snapshot) -> bool {
        self.snapshot_count += 1;
        if self.snapshot_count > 1 && snapshot.timestamp < self.last_updated {
            return false;
        }
        self.current_price = snapshot.price;
        self.original_price = snapshot.original_price;
        self.sold_count = snapshot.sold_count;
        self.rating = snapshot.rating;
        self.review_count = snapshot.review_count;
        self.in_stock = snapshot.in_stock;
        self.last_updated = snapshot.timestamp;
        true
    }

    /// Copy computed fields from a scored copy, keeping this item's listing
    /// and observed state.
    pub fn merge_computed(&mut self, scored: &Item) {
        self.trend_score = scored.trend_score;
        self.orders_3d_delta = scored.orders_3d_delta;
        self.orders_7d_delta = scored.orders_7d_delta;
        self.reviews_3d_delta = scored.reviews_3d_delta;
        self.velocity_3d = scored.velocity_3d;
        self.acceleration = scored.acceleration;
        self.price_discount_rate = scored.price_discount_rate;
        self.stock_stability = scored.stock_stability;
        self.trend_category = scored.trend_category;
        self.viability_grade = scored.viability_grade;
        self.viability_summary = scored.viability_summary.clone();
        self.confidence_score = scored.confidence_score;
        self.pvs = scored.pvs;
    }

    /// Fractional days between first sighting and `now`, never negative.
    pub fn days_tracked(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.first_seen).num_milliseconds();
        (millis as f64 / 86_400_000.0).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: DateTime<Utc>,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesPoint {
    pub date: DateTime<Utc>,
    pub sold_count: i64,
}

/// Item plus the history used by detail views and charts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    pub snapshots: Vec<Snapshot>,
    pub price_history: Vec<PricePoint>,
    pub sales_history: Vec<SalesPoint>,
}

impl ItemDetail {
    pub fn new(item: Item, snapshots: Vec<Snapshot>) -> Self {
        let price_history = snapshots
            .iter()
            .map(|s| PricePoint {
                date: s.timestamp,
                price: s.price,
            })
            .collect();
        let sales_history = snapshots
            .iter()
            .map(|s| SalesPoint {
                date: s.timestamp,
                sold_count: s.sold_count,
            })
            .collect();

        Self {
            item,
            snapshots,
            price_history,
            sales_history,
        }
    }
}
