//! User Preferences and Interaction Tracking
//!
//! Interaction records snapshot the listing at view time so the profile can be
//! rebuilt even after the item leaves the catalog. The preference profile is a
//! pure function of the records plus the favorite and purchase sets; it is
//! never persisted.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{parse_price, Attribute, CatalogItem};
use crate::config::RecommendationConfig;

/// Per-item view record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub item_id: String,
    pub count: u32,
    pub last_viewed_at: DateTime<Utc>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl InteractionRecord {
    /// First view of an item
    pub fn first_view(item: &CatalogItem, at: DateTime<Utc>) -> Self {
        Self {
            item_id: item.id.clone(),
            count: 1,
            last_viewed_at: at,
            category: item.category.clone(),
            creator: item.creator.clone(),
            price: item.price.clone(),
            rarity: item.rarity.clone(),
            attributes: item.attributes.clone(),
        }
    }

    /// Another view: bump the counter and refresh the snapshot
    pub fn record_view(&mut self, item: &CatalogItem, at: DateTime<Utc>) {
        self.count = self.count.saturating_add(1);
        self.last_viewed_at = at;
        self.category = item.category.clone();
        self.creator = item.creator.clone();
        self.price = item.price.clone();
        self.rarity = item.rarity.clone();
        self.attributes = item.attributes.clone();
    }
}

/// Coarse price band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBucket {
    Low,
    Medium,
    High,
}

impl PriceBucket {
    /// Bucket for a price string, `None` when unpriced
    pub fn of(price: &str, config: &RecommendationConfig) -> Option<Self> {
        parse_price(price).map(|p| Self::for_value(p, config))
    }

    pub fn for_value(price: f64, config: &RecommendationConfig) -> Self {
        if price < config.price_low_threshold {
            PriceBucket::Low
        } else if price < config.price_high_threshold {
            PriceBucket::Medium
        } else {
            PriceBucket::High
        }
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceBucket::Low => write!(f, "low"),
            PriceBucket::Medium => write!(f, "medium"),
            PriceBucket::High => write!(f, "high"),
        }
    }
}

/// Weighted tallies over the dimensions recommendations are scored on
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreferenceProfile {
    pub categories: HashMap<String, f64>,
    pub creators: HashMap<String, f64>,
    pub price_buckets: HashMap<PriceBucket, f64>,
    pub rarities: HashMap<String, f64>,
    /// Trait type -> value -> tally
    pub attributes: HashMap<String, HashMap<String, f64>>,
}

impl PreferenceProfile {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.creators.is_empty()
            && self.price_buckets.is_empty()
            && self.rarities.is_empty()
            && self.attributes.is_empty()
    }

    /// Highest-tallied category, if any
    pub fn top_category(&self) -> Option<&str> {
        top_key(&self.categories)
    }

    /// Highest-tallied creator, if any
    pub fn top_creator(&self) -> Option<&str> {
        top_key(&self.creators)
    }
}

fn top_key(tallies: &HashMap<String, f64>) -> Option<&str> {
    tallies
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(k, _)| k.as_str())
}

/// Largest tally in a dimension (0 when empty)
pub(crate) fn max_tally<'a, I>(tallies: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    tallies.into_iter().copied().fold(0.0, f64::max)
}

/// Build the preference profile from interaction history.
///
/// Each record contributes its view count, plus the favorite bonus when the
/// item is favorited and the purchase bonus when it was bought.
pub fn build_profile(
    history: &[InteractionRecord],
    favorites: &HashSet<String>,
    purchases: &HashSet<String>,
    config: &RecommendationConfig,
) -> PreferenceProfile {
    let mut profile = PreferenceProfile::default();

    for record in history {
        let mut weight = f64::from(record.count);
        if favorites.contains(&record.item_id) {
            weight += config.favorite_bonus;
        }
        if purchases.contains(&record.item_id) {
            weight += config.purchase_bonus;
        }
        if weight <= 0.0 {
            continue;
        }

        if !record.category.is_empty() {
            *profile.categories.entry(record.category.clone()).or_insert(0.0) += weight;
        }
        if !record.creator.is_empty() {
            *profile.creators.entry(record.creator.clone()).or_insert(0.0) += weight;
        }
        if let Some(bucket) = PriceBucket::of(&record.price, config) {
            *profile.price_buckets.entry(bucket).or_insert(0.0) += weight;
        }
        if let Some(rarity) = record.rarity.as_deref().filter(|r| !r.is_empty()) {
            *profile.rarities.entry(rarity.to_string()).or_insert(0.0) += weight;
        }
        for attr in &record.attributes {
            *profile
                .attributes
                .entry(attr.trait_type.clone())
                .or_default()
                .entry(attr.value.clone())
                .or_insert(0.0) += weight;
        }
    }

    profile
}
