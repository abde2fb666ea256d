//! Filter engine: current criteria, sorting and the saved-filter library

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::criteria::{FilterCriteria, PriceRange, SavedFilter, SortBy};
use crate::catalog::CatalogItem;
use crate::config::FilterConfig;
use crate::store::{self, KeyValueStore, LAST_FILTER_KEY, SAVED_FILTERS_KEY};

/// Holds the user's filter selection and named presets
pub struct FilterEngine {
    store: Arc<dyn KeyValueStore>,
    config: FilterConfig,
    current: FilterCriteria,
    saved: Vec<SavedFilter>,
    account: Option<String>,
}

impl FilterEngine {
    /// Create an engine, restoring saved filters and (if enabled) the last used criteria
    pub fn new(store: Arc<dyn KeyValueStore>, config: FilterConfig) -> Self {
        let current = if config.remember_last_filter {
            store::load_or_default(store.as_ref(), LAST_FILTER_KEY)
        } else {
            FilterCriteria::default()
        };
        let saved: Vec<SavedFilter> = store::load_or_default(store.as_ref(), SAVED_FILTERS_KEY);

        let mut engine = Self {
            store,
            config,
            current,
            saved,
            account: None,
        };
        engine.evict_oldest();

        debug!(
            "Filter engine restored {} saved filters ({} active constraints)",
            engine.saved.len(),
            engine.current.active_count()
        );
        engine
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Criteria currently selected
    pub fn current(&self) -> &FilterCriteria {
        &self.current
    }

    /// Set the account used by the ownership constraint
    pub fn set_account(&mut self, account: Option<String>) {
        self.account = account.filter(|a| !a.trim().is_empty());
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    // ---- Applying ----

    /// Items satisfying every constraint of `criteria`, in catalog order
    pub fn apply(&self, catalog: &[CatalogItem], criteria: &FilterCriteria) -> Vec<CatalogItem> {
        metrics::counter!("catalog_filter_applied_total").increment(1);
        let account = self.account.as_deref();
        let results: Vec<CatalogItem> = catalog
            .iter()
            .filter(|item| criteria.matches(item, account))
            .cloned()
            .collect();
        debug!("Filter kept {} of {} items", results.len(), catalog.len());
        results
    }

    /// Filter with the current criteria, then sort by its sort order
    pub fn apply_current(&self, catalog: &[CatalogItem]) -> Vec<CatalogItem> {
        let filtered = self.apply(catalog, &self.current);
        Self::sort(filtered, self.current.sort_by)
    }

    /// Stable sort; `Unrecognized` leaves the order unchanged
    pub fn sort(mut items: Vec<CatalogItem>, sort_by: SortBy) -> Vec<CatalogItem> {
        let cmp: fn(&CatalogItem, &CatalogItem) -> Ordering = match sort_by {
            SortBy::Newest => |a, b| b.created_at.cmp(&a.created_at),
            SortBy::Oldest => |a, b| a.created_at.cmp(&b.created_at),
            SortBy::PriceAsc => |a, b| sort_price(a).total_cmp(&sort_price(b)),
            SortBy::PriceDesc => |a, b| sort_price(b).total_cmp(&sort_price(a)),
            SortBy::Popular => |a, b| b.views.cmp(&a.views),
            SortBy::NameAsc => |a, b| compare_names(&a.name, &b.name),
            SortBy::NameDesc => |a, b| compare_names(&b.name, &a.name),
            SortBy::Unrecognized => return items,
        };
        items.sort_by(cmp);
        items
    }

    /// Sort by a sort-order name; unknown names leave the order unchanged
    pub fn sort_by_key(items: Vec<CatalogItem>, key: &str) -> Vec<CatalogItem> {
        match key.parse::<SortBy>() {
            Ok(sort_by) => Self::sort(items, sort_by),
            Err(_) => {
                debug!("Ignoring unknown sort order '{}'", key);
                items
            }
        }
    }

    // ---- Editing the current criteria ----

    /// Replace the current criteria wholesale
    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.current = criteria;
        self.commit();
    }

    /// Back to the all-matching default
    pub fn reset(&mut self) {
        self.set_criteria(FilterCriteria::default());
    }

    /// Add the category if absent, remove it if present
    pub fn toggle_category(&mut self, category: &str) {
        toggle(&mut self.current.categories, category, self.config.multi_select);
        self.commit();
    }

    /// Add the rarity if absent, remove it if present
    pub fn toggle_rarity(&mut self, rarity: &str) {
        toggle(&mut self.current.rarity, rarity, self.config.multi_select);
        self.commit();
    }

    pub fn set_price_range(&mut self, range: PriceRange) {
        self.current.price_range = range;
        self.commit();
    }

    /// Require `value` for `trait_type`, or drop the requirement with `None`
    pub fn set_attribute(&mut self, trait_type: &str, value: Option<&str>) {
        match value {
            Some(v) => {
                self.current
                    .attributes
                    .insert(trait_type.to_string(), v.to_string());
            }
            None => {
                self.current.attributes.remove(trait_type);
            }
        }
        self.commit();
    }

    pub fn set_sort(&mut self, sort_by: SortBy) {
        self.current.sort_by = sort_by;
        self.commit();
    }

    pub fn set_only_verified(&mut self, only_verified: bool) {
        self.current.only_verified = only_verified;
        self.commit();
    }

    pub fn set_show_owned(&mut self, show_owned: bool) {
        self.current.show_owned = show_owned;
        self.commit();
    }

    /// Number of constrained dimensions in the current criteria
    pub fn active_filter_count(&self) -> usize {
        self.current.active_count()
    }

    // ---- Saved filters ----

    pub fn saved_filters(&self) -> &[SavedFilter] {
        &self.saved
    }

    /// Save the current criteria under `name`; a blank name is rejected
    pub fn save_current(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }

        let now = Utc::now();
        match self.saved.iter_mut().find(|s| s.name == name) {
            Some(existing) => {
                existing.criteria = self.current.clone();
                existing.saved_at = now;
            }
            None => {
                self.saved.push(SavedFilter {
                    name: name.to_string(),
                    criteria: self.current.clone(),
                    saved_at: now,
                });
                self.evict_oldest();
            }
        }

        info!("Saved filter '{}' ({} total)", name, self.saved.len());
        self.save_library();
        true
    }

    /// Make a saved filter current; returns false when no filter has that name
    pub fn load_saved(&mut self, name: &str) -> bool {
        let Some(saved) = self.saved.iter().find(|s| s.name == name) else {
            return false;
        };
        self.current = saved.criteria.clone();
        self.commit();
        true
    }

    /// Delete a saved filter by exact name
    pub fn delete_saved(&mut self, name: &str) -> bool {
        let before = self.saved.len();
        self.saved.retain(|s| s.name != name);
        let removed = self.saved.len() != before;
        if removed {
            self.save_library();
        }
        removed
    }

    /// Drop the oldest entries (by `saved_at`, then position) beyond capacity
    fn evict_oldest(&mut self) {
        while self.saved.len() > self.config.max_saved_filters {
            let oldest = self
                .saved
                .iter()
                .enumerate()
                .min_by_key(|(idx, s)| (s.saved_at, *idx))
                .map(|(idx, _)| idx);
            match oldest {
                Some(idx) => {
                    let evicted = self.saved.remove(idx);
                    debug!("Evicted saved filter '{}'", evicted.name);
                }
                None => break,
            }
        }
    }

    fn commit(&self) {
        if self.config.remember_last_filter {
            store::persist(self.store.as_ref(), LAST_FILTER_KEY, &self.current);
        }
    }

    fn save_library(&self) {
        store::persist(self.store.as_ref(), SAVED_FILTERS_KEY, &self.saved);
    }
}

fn toggle(set: &mut std::collections::BTreeSet<String>, value: &str, multi_select: bool) {
    if set.remove(value) {
        return;
    }
    if !multi_select {
        set.clear();
    }
    set.insert(value.to_string());
}

fn sort_price(item: &CatalogItem) -> f64 {
    item.price_value().unwrap_or(0.0)
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}
