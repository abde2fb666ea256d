//! Free-text catalog search
//!
//! Exact mode keeps items where any searchable field contains the query
//! (case-insensitive). Fuzzy mode additionally keeps items where any field is
//! within the configured edit-distance similarity of the query, so it never
//! returns fewer items than exact mode.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::fuzzy;
use crate::catalog::{fold, CatalogItem};
use crate::config::SearchConfig;
use crate::store::{self, KeyValueStore, SEARCH_HISTORY_KEY};
use crate::telemetry::PerformanceTimer;

/// Marketplace terms offered as suggestions before catalog values
pub const VOCABULARY: &[&str] = &[
    "art", "music", "photography", "gaming", "collectibles", "sports",
    "virtual worlds", "domain names", "utility", "pfp", "generative",
    "pixel", "3d", "abstract", "ai", "animation", "rare", "legendary",
    "epic", "common", "auction", "buy now", "verified", "new", "trending",
];

/// Per-call search switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Use edit-distance matching in addition to substring matching
    pub fuzzy: bool,
    /// Record the query into history when it finds something
    pub record_history: bool,
}

/// Free-text search over a catalog snapshot, with query history and suggestions
pub struct SearchEngine {
    store: Arc<dyn KeyValueStore>,
    config: SearchConfig,
    history: Vec<String>,
}

impl SearchEngine {
    /// Create an engine, restoring history from the store
    pub fn new(store: Arc<dyn KeyValueStore>, config: SearchConfig) -> Self {
        let persisted: Vec<String> = store::load_or_default(store.as_ref(), SEARCH_HISTORY_KEY);

        let mut seen = HashSet::new();
        let history: Vec<String> = persisted
            .into_iter()
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty() && seen.insert(term.to_lowercase()))
            .take(config.max_history_items)
            .collect();

        debug!("Search engine restored {} history entries", history.len());

        Self {
            store,
            config,
            history,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Options used by [`SearchEngine::search`]
    pub fn default_options(&self) -> SearchOptions {
        SearchOptions {
            fuzzy: self.config.fuzzy_by_default,
            record_history: self.config.record_history,
        }
    }

    /// Query history, most recent first
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Search with the configured default options
    pub fn search(&mut self, catalog: &[CatalogItem], query: &str) -> Vec<CatalogItem> {
        let options = self.default_options();
        self.search_with(catalog, query, options)
    }

    /// Search the catalog; an empty query returns the catalog unchanged
    pub fn search_with(
        &mut self,
        catalog: &[CatalogItem],
        query: &str,
        options: SearchOptions,
    ) -> Vec<CatalogItem> {
        let needle = fold(query);
        if needle.is_empty() {
            return catalog.to_vec();
        }

        let _timer = PerformanceTimer::new("search");
        metrics::counter!("catalog_search_queries_total").increment(1);

        let results: Vec<CatalogItem> = catalog
            .iter()
            .filter(|item| self.matches(item, &needle, options.fuzzy))
            .cloned()
            .collect();

        debug!(
            query = %needle,
            fuzzy = options.fuzzy,
            "Search matched {} of {} items",
            results.len(),
            catalog.len()
        );

        if options.record_history && !results.is_empty() {
            self.add_to_history(query);
        }

        results
    }

    /// Whether an item matches an already folded query
    pub fn matches(&self, item: &CatalogItem, folded_query: &str, fuzzy: bool) -> bool {
        item.searchable_fields().any(|field| {
            let field = fold(field);
            field.contains(folded_query)
                || (fuzzy && fuzzy::similarity(folded_query, &field) >= self.config.fuzzy_threshold)
        })
    }

    /// Suggestions capped at the configured `max_suggestions`
    pub fn suggestions(&self, query: &str, catalog: &[CatalogItem]) -> Vec<String> {
        self.suggest(query, catalog, self.config.max_suggestions)
    }

    /// Up to `limit` distinct suggestions: history first, then vocabulary, then catalog values
    pub fn suggest(&self, query: &str, catalog: &[CatalogItem], limit: usize) -> Vec<String> {
        let needle = fold(query);
        if needle.chars().count() < self.config.min_search_length || limit == 0 {
            return Vec::new();
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut suggestions = Vec::new();

        let history = self.history.iter().map(String::as_str);
        let vocabulary = VOCABULARY.iter().copied();
        let catalog_values = catalog.iter().flat_map(|item| {
            [item.name.as_str(), item.creator.as_str(), item.category.as_str()]
                .into_iter()
                .chain(item.tags.iter().map(String::as_str))
        });

        for candidate in history.chain(vocabulary).chain(catalog_values) {
            let key = fold(candidate);
            if key.is_empty() || !key.contains(&needle) {
                continue;
            }
            if seen.insert(key) {
                suggestions.push(candidate.trim().to_string());
                if suggestions.len() >= limit {
                    break;
                }
            }
        }

        suggestions
    }

    /// Move `term` to the front of history, de-duplicating case-insensitively
    pub fn add_to_history(&mut self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        let key = term.to_lowercase();
        self.history.retain(|existing| existing.to_lowercase() != key);
        self.history.insert(0, term.to_string());
        self.history.truncate(self.config.max_history_items);
        self.save();
    }

    /// Remove a history entry (case-insensitive); returns whether anything was removed
    pub fn remove_from_history(&mut self, term: &str) -> bool {
        let key = fold(term);
        let before = self.history.len();
        self.history.retain(|existing| existing.to_lowercase() != key);
        let removed = self.history.len() != before;
        if removed {
            self.save();
        }
        removed
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        store::forget(self.store.as_ref(), SEARCH_HISTORY_KEY);
    }

    fn save(&self) {
        store::persist(self.store.as_ref(), SEARCH_HISTORY_KEY, &self.history);
    }
}
