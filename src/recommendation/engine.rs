//! Recommendation Engine
//!
//! Scores and ranks catalog items against the user's preference profile, or
//! against a reference item when the caller is showing one. Also provides the
//! profile-free views (trending, newly listed, ending soon).

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::preferences::{build_profile, max_tally, InteractionRecord, PreferenceProfile, PriceBucket};
use crate::catalog::CatalogItem;
use crate::config::RecommendationConfig;
use crate::store::{self, KeyValueStore, FAVORITES_KEY, PURCHASE_HISTORY_KEY, VIEW_HISTORY_KEY};
use crate::telemetry::{self, PerformanceTimer};

/// A ranked recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: CatalogItem,
    pub score: f64,
    pub reason: RecommendationReason,
}

/// Why this item was recommended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    /// Alike the item currently being viewed
    SimilarTo { item_id: String, similarity: f64 },
    /// In a category the user engages with
    CategoryMatch { category: String },
    /// From a creator the user engages with
    CreatorAffinity { creator: String },
    /// In the user's usual price band
    PriceMatch { bucket: PriceBucket },
    /// Of a rarity the user engages with
    RarityMatch { rarity: String },
    /// Carries a trait value the user engages with
    AttributeMatch { trait_type: String, value: String },
    /// Popular right now (no personal signal available)
    Trending { views: u64 },
    /// Nothing in the profile applies
    Discovery,
}

/// Dimension weights shared by match scoring and item similarity
#[derive(Debug, Clone)]
pub struct MatchWeights {
    pub category: f64,
    pub creator: f64,
    pub price: f64,
    pub rarity: f64,
    pub attributes: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            category: 0.30,
            creator: 0.20,
            price: 0.10,
            rarity: 0.20,
            attributes: 0.20,
        }
    }
}

/// Weighted sum over the dimensions that apply, normalized by their weights
#[derive(Default)]
struct ScoreAccumulator {
    total: f64,
    possible: f64,
    strongest: Option<(f64, RecommendationReason)>,
}

impl ScoreAccumulator {
    fn add(&mut self, weight: f64, sub_score: f64) {
        self.total += weight * sub_score;
        self.possible += weight;
    }

    fn add_with_reason(&mut self, weight: f64, sub_score: f64, reason: impl FnOnce() -> RecommendationReason) {
        self.add(weight, sub_score);
        let contribution = weight * sub_score;
        let stronger = self
            .strongest
            .as_ref()
            .map_or(true, |(best, _)| contribution > *best);
        if contribution > 0.0 && stronger {
            self.strongest = Some((contribution, reason()));
        }
    }

    fn ratio(&self) -> Option<f64> {
        (self.possible > 0.0).then(|| (self.total / self.possible).clamp(0.0, 1.0))
    }
}

/// Similarity of two items in `[0, 1]`, renormalized over the dimensions both carry
pub fn item_similarity(weights: &MatchWeights, a: &CatalogItem, b: &CatalogItem) -> f64 {
    let mut acc = ScoreAccumulator::default();

    if !a.category.is_empty() && !b.category.is_empty() {
        acc.add(weights.category, same(&a.category, &b.category));
    }
    if !a.creator.is_empty() && !b.creator.is_empty() {
        acc.add(weights.creator, same(&a.creator, &b.creator));
    }
    if let (Some(p1), Some(p2)) = (a.price_value(), b.price_value()) {
        let max = p1.max(p2);
        let closeness = if max > 0.0 { 1.0 - (p1 - p2).abs() / max } else { 1.0 };
        acc.add(weights.price, closeness);
    }
    if let (Some(r1), Some(r2)) = (a.rarity(), b.rarity()) {
        acc.add(weights.rarity, same(r1, r2));
    }
    if !a.attributes.is_empty() && !b.attributes.is_empty() {
        let matching = a
            .attributes
            .iter()
            .filter(|attr| b.attribute(&attr.trait_type) == Some(attr.value.as_str()))
            .count();
        let largest = a.attributes.len().max(b.attributes.len());
        acc.add(weights.attributes, matching as f64 / largest as f64);
    }

    acc.ratio()
        .unwrap_or(if a.id == b.id { 1.0 } else { 0.0 })
}

fn same(a: &str, b: &str) -> f64 {
    if a == b {
        1.0
    } else {
        0.0
    }
}

/// Main recommendation engine
pub struct RecommendationEngine {
    store: Arc<dyn KeyValueStore>,
    config: RecommendationConfig,
    weights: MatchWeights,
    history: Vec<InteractionRecord>,
    favorites: Vec<String>,
    purchases: Vec<String>,
}

impl RecommendationEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, config: RecommendationConfig) -> Self {
        Self::with_weights(store, config, MatchWeights::default())
    }

    pub fn with_weights(
        store: Arc<dyn KeyValueStore>,
        config: RecommendationConfig,
        weights: MatchWeights,
    ) -> Self {
        let history = store::load_or_default(store.as_ref(), VIEW_HISTORY_KEY);
        let favorites = store::load_or_default(store.as_ref(), FAVORITES_KEY);
        let purchases = store::load_or_default(store.as_ref(), PURCHASE_HISTORY_KEY);

        let mut engine = Self {
            store,
            config,
            weights,
            history,
            favorites,
            purchases,
        };
        engine.evict_oldest_views();

        debug!(
            "Recommendation engine restored {} interactions, {} favorites, {} purchases",
            engine.history.len(),
            engine.favorites.len(),
            engine.purchases.len()
        );
        engine
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    // ---- Interaction tracking ----

    pub fn history(&self) -> &[InteractionRecord] {
        &self.history
    }

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    pub fn purchases(&self) -> &[String] {
        &self.purchases
    }

    /// Record a view of `item` now
    pub fn record_view(&mut self, item: &CatalogItem) {
        self.record_view_at(item, Utc::now());
    }

    /// Record a view of `item` at a given time
    pub fn record_view_at(&mut self, item: &CatalogItem, at: DateTime<Utc>) {
        if item.id.is_empty() {
            debug!("Ignoring view of an item without id");
            return;
        }
        match self.history.iter_mut().find(|r| r.item_id == item.id) {
            Some(record) => record.record_view(item, at),
            None => self.history.push(InteractionRecord::first_view(item, at)),
        }
        self.evict_oldest_views();
        store::persist(self.store.as_ref(), VIEW_HISTORY_KEY, &self.history);
    }

    /// Flip the favorite flag; returns whether the item is now a favorite
    pub fn toggle_favorite(&mut self, item_id: &str) -> bool {
        let now_favorite = match self.favorites.iter().position(|id| id == item_id) {
            Some(idx) => {
                self.favorites.remove(idx);
                false
            }
            None => {
                self.favorites.push(item_id.to_string());
                true
            }
        };
        store::persist(self.store.as_ref(), FAVORITES_KEY, &self.favorites);
        now_favorite
    }

    pub fn is_favorite(&self, item_id: &str) -> bool {
        self.favorites.iter().any(|id| id == item_id)
    }

    /// Remember a purchase; returns false if it was already recorded
    pub fn record_purchase(&mut self, item_id: &str) -> bool {
        if item_id.is_empty() || self.purchases.iter().any(|id| id == item_id) {
            return false;
        }
        self.purchases.push(item_id.to_string());
        store::persist(self.store.as_ref(), PURCHASE_HISTORY_KEY, &self.purchases);
        true
    }

    /// Forget all view records (favorites and purchases are kept)
    pub fn clear_history(&mut self) {
        self.history.clear();
        store::forget(self.store.as_ref(), VIEW_HISTORY_KEY);
    }

    fn evict_oldest_views(&mut self) {
        while self.history.len() > self.config.max_history_items {
            let oldest = self
                .history
                .iter()
                .enumerate()
                .min_by_key(|(idx, r)| (r.last_viewed_at, *idx))
                .map(|(idx, _)| idx);
            match oldest {
                Some(idx) => {
                    self.history.remove(idx);
                }
                None => break,
            }
        }
    }

    // ---- Scoring ----

    /// Rebuild the preference profile from persisted interactions
    pub fn profile(&self) -> PreferenceProfile {
        let favorites: HashSet<String> = self.favorites.iter().cloned().collect();
        let purchases: HashSet<String> = self.purchases.iter().cloned().collect();
        build_profile(&self.history, &favorites, &purchases, &self.config)
    }

    /// How well `item` fits `profile`, in `[0, 1]`
    pub fn match_score(&self, item: &CatalogItem, profile: &PreferenceProfile) -> f64 {
        self.score_against_profile(item, profile).0
    }

    /// Similarity of two items, in `[0, 1]`
    pub fn similarity(&self, a: &CatalogItem, b: &CatalogItem) -> f64 {
        item_similarity(&self.weights, a, b)
    }

    fn score_against_profile(
        &self,
        item: &CatalogItem,
        profile: &PreferenceProfile,
    ) -> (f64, RecommendationReason) {
        if !self.config.personalization_enabled || profile.is_empty() {
            return (0.0, RecommendationReason::Discovery);
        }

        let w = &self.weights;
        let mut acc = ScoreAccumulator::default();

        if !item.category.is_empty() && !profile.categories.is_empty() {
            let sub = tally_ratio(profile.categories.get(&item.category), max_tally(profile.categories.values()));
            acc.add_with_reason(w.category, sub, || RecommendationReason::CategoryMatch {
                category: item.category.clone(),
            });
        }

        if !item.creator.is_empty() && !profile.creators.is_empty() {
            let sub = tally_ratio(profile.creators.get(&item.creator), max_tally(profile.creators.values()));
            acc.add_with_reason(w.creator, sub, || RecommendationReason::CreatorAffinity {
                creator: item.creator.clone(),
            });
        }

        if let Some(bucket) = PriceBucket::of(&item.price, &self.config) {
            if !profile.price_buckets.is_empty() {
                let sub = tally_ratio(
                    profile.price_buckets.get(&bucket),
                    max_tally(profile.price_buckets.values()),
                );
                acc.add_with_reason(w.price, sub, || RecommendationReason::PriceMatch { bucket });
            }
        }

        if let Some(rarity) = item.rarity() {
            if !profile.rarities.is_empty() {
                let sub = tally_ratio(profile.rarities.get(rarity), max_tally(profile.rarities.values()));
                acc.add_with_reason(w.rarity, sub, || RecommendationReason::RarityMatch {
                    rarity: rarity.to_string(),
                });
            }
        }

        if !item.attributes.is_empty() && !profile.attributes.is_empty() {
            let mut best_hit: Option<(f64, usize)> = None;
            let mut hit_sum = 0.0;
            for (idx, attr) in item.attributes.iter().enumerate() {
                let hit = profile
                    .attributes
                    .get(&attr.trait_type)
                    .map_or(0.0, |values| tally_ratio(values.get(&attr.value), max_tally(values.values())));
                hit_sum += hit;
                if hit > best_hit.map_or(0.0, |(h, _)| h) {
                    best_hit = Some((hit, idx));
                }
            }
            let sub = hit_sum / item.attributes.len() as f64;
            acc.add_with_reason(w.attributes, sub, || {
                let attr = &item.attributes[best_hit.map_or(0, |(_, idx)| idx)];
                RecommendationReason::AttributeMatch {
                    trait_type: attr.trait_type.clone(),
                    value: attr.value.clone(),
                }
            });
        }

        let score = acc.ratio().unwrap_or(0.0);
        let reason = acc
            .strongest
            .map(|(_, reason)| reason)
            .unwrap_or(RecommendationReason::Discovery);
        (score, reason)
    }

    // ---- Ranking ----

    /// Top recommendations as plain items
    pub fn get_recommendations(
        &self,
        catalog: &[CatalogItem],
        current: Option<&CatalogItem>,
        limit: Option<usize>,
    ) -> Vec<CatalogItem> {
        self.get_scored_recommendations(catalog, current, limit)
            .into_iter()
            .map(|scored| scored.item)
            .collect()
    }

    /// Top recommendations with scores and reasons.
    ///
    /// With a `current` item, candidates are ranked by similarity to it, and
    /// candidates whose similarities lie within the tie window of each other
    /// are ordered by match score. Without one, candidates are ranked by match
    /// score, falling back to trending order when there is no profile. The
    /// current item and purchased items are never returned.
    pub fn get_scored_recommendations(
        &self,
        catalog: &[CatalogItem],
        current: Option<&CatalogItem>,
        limit: Option<usize>,
    ) -> Vec<ScoredItem> {
        let timer = PerformanceTimer::new("recommendations");
        let limit = limit.unwrap_or(self.config.max_recommendations);

        let purchased: HashSet<&str> = self.purchases.iter().map(String::as_str).collect();
        let candidates: Vec<&CatalogItem> = catalog
            .iter()
            .filter(|item| current.map_or(true, |c| c.id != item.id))
            .filter(|item| !purchased.contains(item.id.as_str()))
            .collect();

        let profile = self.profile();
        let personalized = self.config.personalization_enabled && !profile.is_empty();

        let mut ranked = match current {
            Some(reference) => self.rank_by_similarity(reference, &candidates, &profile),
            None if personalized => self.rank_by_match(&candidates, &profile),
            None => self.rank_cold_start(&candidates),
        };
        ranked.truncate(limit);

        let items: Vec<CatalogItem> = ranked.iter().map(|s| s.item.clone()).collect();
        metrics::counter!("catalog_recommendations_served_total").increment(ranked.len() as u64);
        metrics::histogram!("catalog_recommendation_ms").record(timer.elapsed_ms() as f64);
        debug!(
            candidates = candidates.len(),
            returned = ranked.len(),
            personalized,
            diversity = telemetry::diversity_score(&items),
            "Generated recommendations"
        );
        timer.log_if_slow(50);

        ranked
    }

    fn rank_by_similarity(
        &self,
        reference: &CatalogItem,
        candidates: &[&CatalogItem],
        profile: &PreferenceProfile,
    ) -> Vec<ScoredItem> {
        let mut scored: Vec<(ScoredItem, f64)> = candidates
            .iter()
            .map(|item| {
                let similarity = self.similarity(reference, item);
                let matched = self.match_score(item, profile);
                let scored = ScoredItem {
                    item: (*item).clone(),
                    score: similarity,
                    reason: RecommendationReason::SimilarTo {
                        item_id: reference.id.clone(),
                        similarity,
                    },
                };
                (scored, matched)
            })
            .collect();

        let window = self.config.similarity_tie_window;
        // Float noise must not turn a gap of exactly the window into a tie
        sort_with_tolerance(
            &mut scored,
            |(s, _)| s.score,
            |(_, a), (_, b)| b.total_cmp(a),
            |gap| gap + SCORE_EPSILON < window,
        );
        scored.into_iter().map(|(s, _)| s).collect()
    }

    fn rank_by_match(&self, candidates: &[&CatalogItem], profile: &PreferenceProfile) -> Vec<ScoredItem> {
        let mut scored: Vec<ScoredItem> = candidates
            .iter()
            .map(|item| {
                let (score, reason) = self.score_against_profile(item, profile);
                ScoredItem {
                    item: (*item).clone(),
                    score,
                    reason,
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    fn rank_cold_start(&self, candidates: &[&CatalogItem]) -> Vec<ScoredItem> {
        let owned: Vec<CatalogItem> = candidates.iter().map(|item| (*item).clone()).collect();
        self.trending(&owned, owned.len())
            .into_iter()
            .map(|item| ScoredItem {
                reason: RecommendationReason::Trending { views: item.views },
                score: 0.0,
                item,
            })
            .collect()
    }

    /// Items most like `item`, excluding itself
    pub fn similar_items(&self, catalog: &[CatalogItem], item: &CatalogItem, limit: usize) -> Vec<CatalogItem> {
        let mut scored: Vec<(f64, &CatalogItem)> = catalog
            .iter()
            .filter(|candidate| candidate.id != item.id)
            .map(|candidate| (self.similarity(item, candidate), candidate))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, candidate)| candidate.clone())
            .collect()
    }

    // ---- Profile-free views ----

    /// Most viewed first; items within the view threshold of their group's most viewed item are ordered newest first
    pub fn trending(&self, catalog: &[CatalogItem], limit: usize) -> Vec<CatalogItem> {
        let mut items = catalog.to_vec();
        let threshold = self.config.trending_view_threshold as f64;
        sort_with_tolerance(
            &mut items,
            |item| item.views as f64,
            |a, b| b.created_at.cmp(&a.created_at),
            |gap| gap <= threshold,
        );
        items.truncate(limit);
        items
    }

    /// Newest listings first
    pub fn newly_listed(&self, catalog: &[CatalogItem], limit: usize) -> Vec<CatalogItem> {
        let mut items = catalog.to_vec();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        items
    }

    /// Open auctions, soonest end first
    pub fn ending_soon(&self, catalog: &[CatalogItem], limit: usize) -> Vec<CatalogItem> {
        self.ending_soon_at(catalog, Utc::now(), limit)
    }

    /// Open auctions as of `now`, soonest end first
    pub fn ending_soon_at(&self, catalog: &[CatalogItem], now: DateTime<Utc>, limit: usize) -> Vec<CatalogItem> {
        let mut items: Vec<CatalogItem> = catalog
            .iter()
            .filter(|item| item.auction_open_at(now))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.auction_end_time.cmp(&b.auction_end_time));
        items.truncate(limit);
        items
    }
}

/// Slack for comparing derived scores against configured windows
const SCORE_EPSILON: f64 = 1e-9;

fn tally_ratio(tally: Option<&f64>, max: f64) -> f64 {
    match tally {
        Some(t) if max > 0.0 => (t / max).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Sort descending by `primary`, then re-order each run whose primary values
/// are `close` to the run's first (highest) value by `secondary`.
///
/// Runs are measured from their head, so a run never spans more than the
/// tolerance however small the steps inside it are.
fn sort_with_tolerance<T, P, S, C>(items: &mut [T], primary: P, secondary: S, close: C)
where
    P: Fn(&T) -> f64,
    S: Fn(&T, &T) -> Ordering,
    C: Fn(f64) -> bool,
{
    items.sort_by(|a, b| primary(b).total_cmp(&primary(a)).then_with(|| secondary(a, b)));

    let mut start = 0;
    for i in 1..=items.len() {
        let run_ends = i == items.len() || !close(primary(&items[start]) - primary(&items[i]));
        if run_ends {
            items[start..i].sort_by(|a, b| secondary(a, b));
            start = i;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Attribute;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn item(id: &str, category: &str, creator: &str, price: &str, rarity: Option<&str>) -> CatalogItem {
        CatalogItem {
            category: category.to_string(),
            creator: creator.to_string(),
            price: price.to_string(),
            rarity: rarity.map(str::to_string),
            ..CatalogItem::new(id, format!("Item {}", id))
        }
    }

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new(Arc::new(MemoryStore::new()), RecommendationConfig::default())
    }

    fn ids(items: &[CatalogItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_similarity_identity_and_bounds() {
        let engine = engine();
        let mut a = item("a", "art", "alice", "0.5", Some("rare"));
        a.attributes = vec![Attribute::new("Eyes", "Laser"), Attribute::new("Hat", "Cap")];
        assert_eq!(engine.similarity(&a, &a), 1.0);

        let mut b = item("b", "art", "bob", "1.0", Some("common"));
        b.attributes = vec![Attribute::new("Eyes", "Laser")];
        // category 0.3 + creator 0 + price 0.1 * 0.5 + rarity 0 + attributes 0.2 * 0.5 over 1.0
        let s = engine.similarity(&a, &b);
        assert!((s - 0.45).abs() < 1e-9, "similarity was {}", s);
        assert!((engine.similarity(&b, &a) - s).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_renormalizes_missing_dimensions() {
        let engine = engine();
        let a = item("a", "art", "", "", None);
        let b = item("b", "art", "", "", None);
        assert_eq!(engine.similarity(&a, &b), 1.0);

        let bare_a = CatalogItem::new("x", "X");
        let bare_b = CatalogItem::new("y", "Y");
        assert_eq!(engine.similarity(&bare_a, &bare_b), 0.0);
        assert_eq!(engine.similarity(&bare_a, &bare_a), 1.0);
    }

    #[test]
    fn test_similarity_zero_prices_are_equal() {
        let engine = engine();
        let a = item("a", "", "", "0", None);
        let b = item("b", "", "", "0", None);
        assert_eq!(engine.similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_match_score_prefers_viewed_category() {
        let mut engine = engine();
        let a = item("a", "art", "alice", "0.05", Some("rare"));
        let c = item("c", "music", "carol", "2", Some("rare"));
        for _ in 0..3 {
            engine.record_view(&a);
        }
        let profile = engine.profile();
        let score_a = engine.match_score(&a, &profile);
        let score_c = engine.match_score(&c, &profile);
        assert!(score_a > score_c);
        assert!((score_a - 1.0).abs() < 1e-9);
        // only rarity matches for c: 0.2 over the 0.8 of dimensions present
        assert!((score_c - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_match_score_zero_without_profile_or_personalization() {
        let a = item("a", "art", "alice", "0.05", Some("rare"));
        let engine = engine();
        assert_eq!(engine.match_score(&a, &engine.profile()), 0.0);

        let mut disabled = RecommendationEngine::new(
            Arc::new(MemoryStore::new()),
            RecommendationConfig {
                personalization_enabled: false,
                ..RecommendationConfig::default()
            },
        );
        disabled.record_view(&a);
        assert_eq!(disabled.match_score(&a, &disabled.profile()), 0.0);
    }

    #[test]
    fn test_recommendations_exclude_current_and_purchased() {
        let mut engine = engine();
        let catalog = vec![
            item("a", "art", "alice", "0.05", Some("rare")),
            item("b", "art", "alice", "0.06", Some("rare")),
            item("c", "art", "bob", "0.07", Some("rare")),
            item("d", "music", "dan", "3", None),
        ];
        engine.record_view(&catalog[0]);
        assert!(engine.record_purchase("b"));
        assert!(!engine.record_purchase("b"));

        let recs = engine.get_recommendations(&catalog, Some(&catalog[0]), None);
        assert_eq!(ids(&recs), vec!["c", "d"]);

        let recs = engine.get_recommendations(&catalog, None, Some(2));
        assert_eq!(ids(&recs), vec!["a", "c"]);
    }

    #[test]
    fn test_similarity_ties_broken_by_match_score() {
        let mut engine = engine();
        let reference = item("ref", "art", "zed", "1", Some("rare"));
        // Both share only category with the reference and have close prices
        let x = item("x", "art", "xavier", "0.95", Some("common"));
        let y = item("y", "art", "yara", "0.9", Some("common"));
        let mut liked = y.clone();
        liked.id = "liked".to_string();
        engine.record_view(&liked);
        engine.record_view(&liked);

        let recs = engine.get_scored_recommendations(&[x.clone(), y.clone()], Some(&reference), None);
        assert_eq!(recs[0].item.id, "y");
        assert!(matches!(recs[0].reason, RecommendationReason::SimilarTo { .. }));
    }

    #[test]
    fn test_cold_start_uses_trending() {
        let engine = engine();
        let mut a = item("a", "art", "alice", "1", None);
        a.views = 10;
        let mut b = item("b", "art", "bob", "1", None);
        b.views = 100;
        let recs = engine.get_scored_recommendations(&[a, b], None, None);
        assert_eq!(recs[0].item.id, "b");
        assert_eq!(recs[0].reason, RecommendationReason::Trending { views: 100 });
    }

    #[test]
    fn test_match_reason_is_dominant_dimension() {
        let mut engine = engine();
        let seen = item("s", "art", "alice", "", None);
        engine.record_view(&seen);
        let candidate = item("c", "art", "bob", "", None);
        let recs = engine.get_scored_recommendations(&[candidate], None, None);
        assert_eq!(
            recs[0].reason,
            RecommendationReason::CategoryMatch {
                category: "art".to_string()
            }
        );
    }

    #[test]
    fn test_trending_threshold_prefers_recent_within_noise() {
        let engine = engine();
        let now = Utc::now();
        let mut old_popular = item("old", "art", "a", "1", None);
        old_popular.views = 100;
        old_popular.created_at = Some(now - Duration::days(10));
        let mut fresh = item("fresh", "art", "b", "1", None);
        fresh.views = 97;
        fresh.created_at = Some(now - Duration::days(1));
        let mut quiet = item("quiet", "art", "c", "1", None);
        quiet.views = 50;
        quiet.created_at = Some(now);

        let ranked = engine.trending(&[quiet, old_popular, fresh], 10);
        assert_eq!(ids(&ranked), vec!["fresh", "old", "quiet"]);
    }

    #[test]
    fn test_newly_listed_and_ending_soon() {
        let engine = engine();
        let now = Utc::now();
        let mut a = item("a", "art", "a", "1", None);
        a.created_at = Some(now - Duration::days(2));
        a.is_auction = true;
        a.auction_end_time = Some(now + Duration::hours(5));
        let mut b = item("b", "art", "b", "1", None);
        b.created_at = Some(now - Duration::days(1));
        b.is_auction = true;
        b.auction_end_time = Some(now + Duration::hours(1));
        let mut c = item("c", "art", "c", "1", None);
        c.created_at = None;
        c.is_auction = true;
        c.auction_end_time = Some(now - Duration::hours(1));

        // Fixed-price listing carrying a stale end time
        let mut d = item("d", "art", "d", "1", None);
        d.created_at = Some(now - Duration::days(3));
        d.is_auction = false;
        d.auction_end_time = Some(now + Duration::minutes(30));

        let catalog = vec![a, b, c, d];
        assert_eq!(ids(&engine.newly_listed(&catalog, 10)), vec!["b", "a", "d", "c"]);
        assert_eq!(ids(&engine.ending_soon_at(&catalog, now, 10)), vec!["b", "a"]);
        assert_eq!(ids(&engine.ending_soon_at(&catalog, now, 1)), vec!["b"]);
    }

    #[test]
    fn test_view_history_bounded_and_persisted() {
        let store = Arc::new(MemoryStore::new());
        let config = RecommendationConfig {
            max_history_items: 3,
            ..RecommendationConfig::default()
        };
        let mut engine = RecommendationEngine::new(store.clone(), config.clone());
        let start = Utc::now();
        for i in 0..5 {
            let it = item(&format!("i{}", i), "art", "a", "1", None);
            engine.record_view_at(&it, start + Duration::seconds(i));
        }
        let kept: Vec<&str> = engine.history().iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(kept, vec!["i2", "i3", "i4"]);

        let restored = RecommendationEngine::new(store, config);
        assert_eq!(restored.history().len(), 3);
    }

    #[test]
    fn test_failing_store_keeps_state_in_memory() {
        let mut engine = RecommendationEngine::new(
            Arc::new(crate::store::tests::FailingStore),
            RecommendationConfig::default(),
        );
        let a = item("a", "art", "alice", "1", None);
        engine.record_view(&a);
        assert!(engine.toggle_favorite("a"));
        assert!(engine.record_purchase("b"));
        assert_eq!(engine.history().len(), 1);
        assert!(engine.is_favorite("a"));
        engine.clear_history();
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_favorites_toggle_and_bonus() {
        let mut engine = engine();
        let a = item("a", "art", "alice", "1", None);
        engine.record_view(&a);
        assert!(engine.toggle_favorite("a"));
        assert!(engine.is_favorite("a"));
        assert_eq!(engine.profile().categories["art"], 4.0);
        assert!(!engine.toggle_favorite("a"));
        assert_eq!(engine.profile().categories["art"], 1.0);
    }

    #[test]
    fn test_similar_items() {
        let engine = engine();
        let base = item("base", "art", "alice", "1", Some("rare"));
        let close = item("close", "art", "alice", "1", Some("rare"));
        let far = item("far", "music", "bob", "10", Some("common"));
        let similar = engine.similar_items(&[far, base.clone(), close], &base, 5);
        assert_eq!(ids(&similar), vec!["close", "far"]);
    }

    #[test]
    fn test_sort_with_tolerance_runs() {
        let mut values = vec![(10.0, 'a'), (3.0, 'b'), (9.5, 'c'), (2.8, 'd')];
        sort_with_tolerance(&mut values, |v| v.0, |a, b| b.1.cmp(&a.1), |gap| gap < 1.0);
        let order: Vec<char> = values.iter().map(|v| v.1).collect();
        assert_eq!(order, vec!['c', 'a', 'd', 'b']);
    }

    #[test]
    fn test_sort_with_tolerance_anchors_runs_at_head() {
        // Every step is below the tolerance but the ladder spans far more
        let mut values: Vec<(f64, usize)> = (0..6).map(|i| (10.0 - i as f64 * 0.6, i)).collect();
        sort_with_tolerance(&mut values, |v| v.0, |a, b| b.1.cmp(&a.1), |gap| gap < 1.0);
        let order: Vec<usize> = values.iter().map(|v| v.1).collect();
        assert_eq!(order, vec![1, 0, 3, 2, 5, 4]);
    }

    /// Items with views 100, 96, ..., 0 where fewer views means more recent
    fn view_ladder() -> Vec<CatalogItem> {
        let base = Utc::now();
        (0..=25)
            .map(|step| {
                let views = 100 - step * 4;
                let mut it = item(&format!("v{}", views), "art", "a", "1", None);
                it.views = views;
                it.created_at = Some(base - Duration::minutes(views as i64));
                it
            })
            .collect()
    }

    fn dated(id: &str, views: u64, age_days: i64) -> CatalogItem {
        let mut it = item(id, "art", "a", "1", None);
        it.views = views;
        it.created_at = Some(Utc::now() - Duration::days(age_days));
        it
    }

    #[test]
    fn test_trending_ladder_does_not_chain() {
        let engine = engine();
        let ranked = engine.trending(&view_ladder(), 5);
        assert!(ranked[0].views >= 95);
        assert_eq!(ids(&ranked), vec!["v96", "v100", "v88", "v92", "v80"]);
    }

    #[test]
    fn test_trending_threshold_is_inclusive() {
        let engine = engine();
        // 5 views apart: noise, newer first
        let ranked = engine.trending(&[dated("old", 10, 9), dated("new", 5, 1)], 2);
        assert_eq!(ids(&ranked), vec!["new", "old"]);
        // 6 views apart: popularity wins
        let ranked = engine.trending(&[dated("old", 10, 9), dated("new", 4, 1)], 2);
        assert_eq!(ids(&ranked), vec!["old", "new"]);
    }

    #[test]
    fn test_cold_start_follows_trending_thresholds() {
        let engine = engine();
        let recs = engine.get_recommendations(&view_ladder(), None, Some(3));
        assert_eq!(ids(&recs), vec!["v96", "v100", "v88"]);

        let recs = engine.get_recommendations(&[dated("old", 10, 9), dated("new", 5, 1)], None, None);
        assert_eq!(ids(&recs), vec!["new", "old"]);
        let recs = engine.get_recommendations(&[dated("old", 10, 9), dated("new", 4, 1)], None, None);
        assert_eq!(ids(&recs), vec!["old", "new"]);
    }

    /// Item carrying only attributes: traits `T0..` with the first `shared` valued "x", the rest "y"
    fn traits_item(id: &str, total: usize, shared: usize) -> CatalogItem {
        let mut it = CatalogItem::new(id, id);
        it.attributes = (0..total)
            .map(|t| Attribute::new(format!("T{}", t), if t < shared { "x" } else { "y" }))
            .collect();
        it
    }

    #[test]
    fn test_similarity_ladder_does_not_chain() {
        let mut engine = engine();
        let reference = traits_item("ref", 6, 6);
        let candidates: Vec<CatalogItem> = (0..=6).map(|k| traits_item(&format!("k{}", k), 6, k)).collect();
        // The user likes what k0 looks like, the item least similar to the reference
        engine.record_view(&traits_item("liked", 6, 0));

        let recs = engine.get_scored_recommendations(&candidates, Some(&reference), None);
        let order: Vec<&str> = recs.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(order, vec!["k5", "k6", "k3", "k4", "k1", "k2", "k0"]);
        assert!(recs[0].score > 0.8);
        assert_eq!(recs.last().map(|r| r.item.id.as_str()), Some("k0"));
    }

    #[test]
    fn test_similarity_gap_of_full_window_is_not_a_tie() {
        let mut engine = engine();
        let reference = traits_item("ref", 5, 5);
        // similarity 1.0 and 0.8; the profile favors the 0.8 item
        let exact = traits_item("exact", 5, 5);
        let near = traits_item("near", 5, 4);
        let mut liked = near.clone();
        liked.id = "liked".to_string();
        engine.record_view(&liked);
        assert!(engine.match_score(&near, &engine.profile()) > engine.match_score(&exact, &engine.profile()));

        let recs = engine.get_recommendations(&[near.clone(), exact.clone()], Some(&reference), None);
        assert_eq!(ids(&recs), vec!["exact", "near"]);

        // 10 traits: similarity 1.0 and 0.9 fall inside the window and the profile decides
        let reference = traits_item("ref", 10, 10);
        let exact = traits_item("exact", 10, 10);
        let near = traits_item("near", 10, 9);
        let mut engine = self::engine();
        let mut liked = near.clone();
        liked.id = "liked".to_string();
        engine.record_view(&liked);
        let recs = engine.get_recommendations(&[exact, near], Some(&reference), None);
        assert_eq!(ids(&recs), vec!["near", "exact"]);
    }
}
