//! Structured filter criteria
//!
//! Every field has a total default meaning "no constraint", so
//! `FilterCriteria::default()` matches every item.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;

/// Sort orders offered by the catalog UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    Popular,
    NameAsc,
    NameDesc,
    /// Persisted value this build does not know; sorting leaves order unchanged
    #[serde(other)]
    Unrecognized,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Newest => "newest",
            SortBy::Oldest => "oldest",
            SortBy::PriceAsc => "priceAsc",
            SortBy::PriceDesc => "priceDesc",
            SortBy::Popular => "popular",
            SortBy::NameAsc => "nameAsc",
            SortBy::NameDesc => "nameDesc",
            SortBy::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortBy::Newest),
            "oldest" => Ok(SortBy::Oldest),
            "priceAsc" => Ok(SortBy::PriceAsc),
            "priceDesc" => Ok(SortBy::PriceDesc),
            "popular" => Ok(SortBy::Popular),
            "nameAsc" => Ok(SortBy::NameAsc),
            "nameDesc" => Ok(SortBy::NameDesc),
            other => Err(crate::error::Error::invalid_argument(format!(
                "unknown sort order '{}'",
                other
            ))),
        }
    }
}

/// Inclusive price bounds; an absent bound is unconstrained
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Unpriced items only pass an unbounded range
    pub fn admits(&self, price: Option<f64>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        match price {
            Some(p) => self.min.map_or(true, |min| p >= min) && self.max.map_or(true, |max| p <= max),
            None => false,
        }
    }
}

/// Inclusive creation-date bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Items without a creation date fail any bounded range
    pub fn admits(&self, created_at: Option<DateTime<Utc>>) -> bool {
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        match created_at {
            Some(t) => self.start.map_or(true, |s| t >= s) && self.end.map_or(true, |e| t <= e),
            None => false,
        }
    }
}

/// The user's structured filter selection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    /// Empty means any category
    pub categories: BTreeSet<String>,
    pub price_range: PriceRange,
    /// Empty means any rarity
    pub rarity: BTreeSet<String>,
    pub sort_by: SortBy,
    pub only_verified: bool,
    /// Only items owned by the current account
    pub show_owned: bool,
    /// Trait type -> required value
    pub attributes: BTreeMap<String, String>,
    pub creation_date_range: Option<DateRange>,
}

impl FilterCriteria {
    /// True when every constraint admits the item
    pub fn matches(&self, item: &CatalogItem, current_account: Option<&str>) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&item.category) {
            return false;
        }
        if !self.price_range.admits(item.price_value()) {
            return false;
        }
        if self.only_verified && !item.is_verified {
            return false;
        }
        if self.show_owned && !is_owned_by(item, current_account) {
            return false;
        }
        if !self.rarity.is_empty() && !item.rarity().map_or(false, |r| self.rarity.contains(r)) {
            return false;
        }
        if !self
            .attributes
            .iter()
            .all(|(trait_type, value)| item.attribute(trait_type) == Some(value.as_str()))
        {
            return false;
        }
        if let Some(range) = &self.creation_date_range {
            if !range.admits(item.created_at) {
                return false;
            }
        }
        true
    }

    /// Number of constrained dimensions (sort order is not a constraint)
    pub fn active_count(&self) -> usize {
        let date_bounded = self
            .creation_date_range
            .map_or(false, |r| r.start.is_some() || r.end.is_some());
        [
            !self.categories.is_empty(),
            !self.price_range.is_unbounded(),
            !self.rarity.is_empty(),
            self.only_verified,
            self.show_owned,
            date_bounded,
        ]
        .iter()
        .filter(|active| **active)
        .count()
            + self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }
}

fn is_owned_by(item: &CatalogItem, account: Option<&str>) -> bool {
    match (item.owner.as_deref(), account) {
        (Some(owner), Some(account)) if !account.is_empty() => owner.eq_ignore_ascii_case(account),
        _ => false,
    }
}

/// A named, persisted criteria preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFilter {
    pub name: String,
    pub criteria: FilterCriteria,
    pub saved_at: DateTime<Utc>,
}
