//! Catalog data model
//!
//! A `CatalogItem` is one marketplace listing as the host UI hands it over.
//! Fields that the backend may omit deserialize to empty values, and every
//! engine treats an empty or unparsable field as "absent" rather than failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single `{traitType, value}` pair on an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

impl Attribute {
    pub fn new(trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }
}

/// A marketplace listing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub creator: String,
    pub category: String,
    /// Decimal price in the base currency unit, kept as the backend sends it
    pub price: String,
    pub rarity: Option<String>,
    pub attributes: Vec<Attribute>,
    pub tags: Vec<String>,
    pub is_auction: bool,
    pub auction_end_time: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub views: u64,
    pub owner: Option<String>,
    pub is_verified: bool,
}

impl CatalogItem {
    /// Create an item with an id and name; remaining fields default
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Numeric price, or `None` when the item is unpriced
    pub fn price_value(&self) -> Option<f64> {
        parse_price(&self.price)
    }

    /// Value of the given trait, if the item carries it
    pub fn attribute(&self, trait_type: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.trait_type == trait_type)
            .map(|a| a.value.as_str())
    }

    /// Non-empty rarity
    pub fn rarity(&self) -> Option<&str> {
        self.rarity.as_deref().filter(|r| !r.is_empty())
    }

    /// Text fields searched by the search engine, empty ones skipped
    pub fn searchable_fields(&self) -> impl Iterator<Item = &str> {
        [
            self.name.as_str(),
            self.description.as_str(),
            self.creator.as_str(),
            self.category.as_str(),
        ]
        .into_iter()
        .chain(self.tags.iter().map(String::as_str))
        .filter(|f| !f.is_empty())
    }

    /// True when the listing is an auction whose end lies after `now`
    pub fn auction_open_at(&self, now: DateTime<Utc>) -> bool {
        self.is_auction && self.auction_end_time.map_or(false, |end| end > now)
    }
}

/// Parse a decimal price; anything that is not a finite non-negative number is unpriced
pub fn parse_price(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Trimmed lower-case form used for case-insensitive comparisons
pub(crate) fn fold(text: &str) -> String {
    text.trim().to_lowercase()
}
