//! Configuration management for the catalog discovery engines
//!
//! Provides strongly-typed configuration with validation, environment variable parsing,
//! and defaults that match the marketplace UI's historical behaviour.
//!
//! # Example
//! ```no_run
//! use catalog_discovery::EngineConfig;
//! let config = EngineConfig::from_env().expect("failed to load config");
//! println!("fuzzy threshold: {}", config.search.fuzzy_threshold);
//! ```

use crate::error::{Error, Result};
use tracing::info;

/// Main engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Free-text search configuration
    pub search: SearchConfig,
    /// Structured filter configuration
    pub filter: FilterConfig,
    /// Recommendation engine configuration
    pub recommendation: RecommendationConfig,
}

/// Search engine configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum number of remembered queries
    pub max_history_items: usize,
    /// Queries shorter than this (in characters) produce no suggestions
    pub min_search_length: usize,
    /// Minimum normalized edit-distance similarity for a fuzzy match
    pub fuzzy_threshold: f64,
    /// Whether `search` uses fuzzy matching unless told otherwise
    pub fuzzy_by_default: bool,
    /// Whether `search` records queries into history unless told otherwise
    pub record_history: bool,
    /// Default suggestion count
    pub max_suggestions: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_history_items: 10,
            min_search_length: 2,
            fuzzy_threshold: 0.3,
            fuzzy_by_default: true,
            record_history: true,
            max_suggestions: 8,
        }
    }
}

/// Filter engine configuration
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Capacity of the saved-filter library
    pub max_saved_filters: usize,
    /// Restore and persist the last used criteria
    pub remember_last_filter: bool,
    /// Category/rarity toggles add to the selection instead of replacing it
    pub multi_select: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_saved_filters: 5,
            remember_last_filter: true,
            multi_select: true,
        }
    }
}

/// Recommendation engine configuration
#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    /// Maximum interaction records kept (oldest view evicted first)
    pub max_history_items: usize,
    /// Default number of recommendations returned
    pub max_recommendations: usize,
    /// When false, match scores are always zero
    pub personalization_enabled: bool,
    /// Flat tally bonus for favorited items
    pub favorite_bonus: f64,
    /// Flat tally bonus for purchased items
    pub purchase_bonus: f64,
    /// Similarity gap under which match score breaks the tie
    pub similarity_tie_window: f64,
    /// View-count gap under which trending order falls back to recency
    pub trending_view_threshold: u64,
    /// Prices below this are in the low bucket
    pub price_low_threshold: f64,
    /// Prices at or above this are in the high bucket
    pub price_high_threshold: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            max_history_items: 50,
            max_recommendations: 10,
            personalization_enabled: true,
            favorite_bonus: 3.0,
            purchase_bonus: 5.0,
            similarity_tie_window: 0.2,
            trending_view_threshold: 5,
            price_low_threshold: 0.1,
            price_high_threshold: 1.0,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Try to load .env file (ignore if not found)
        dotenvy::dotenv().ok();

        let config = Self {
            search: SearchConfig::from_env(),
            filter: FilterConfig::from_env(),
            recommendation: RecommendationConfig::from_env(),
        };

        config.validate()?;
        config.log_summary();

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.search.fuzzy_threshold) {
            return Err(Error::InvalidConfig {
                key: "SEARCH_FUZZY_THRESHOLD",
                message: format!(
                    "threshold must be within [0, 1], got {}",
                    self.search.fuzzy_threshold
                )
                .into(),
            });
        }

        for (key, value) in [
            ("SEARCH_MAX_HISTORY", self.search.max_history_items),
            ("FILTER_MAX_SAVED", self.filter.max_saved_filters),
            ("REC_MAX_HISTORY", self.recommendation.max_history_items),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig {
                    key,
                    message: "must be at least 1".into(),
                });
            }
        }

        let rec = &self.recommendation;
        if !(rec.price_low_threshold < rec.price_high_threshold) {
            return Err(Error::InvalidConfig {
                key: "REC_PRICE_LOW",
                message: format!(
                    "low bucket bound {} must be below high bucket bound {}",
                    rec.price_low_threshold, rec.price_high_threshold
                )
                .into(),
            });
        }

        if !(0.0..=1.0).contains(&rec.similarity_tie_window) {
            return Err(Error::InvalidConfig {
                key: "REC_SIMILARITY_TIE_WINDOW",
                message: "tie window must be within [0, 1]".into(),
            });
        }

        if rec.favorite_bonus < 0.0 || rec.purchase_bonus < 0.0 {
            return Err(Error::InvalidConfig {
                key: "REC_FAVORITE_BONUS",
                message: "interaction bonuses cannot be negative".into(),
            });
        }

        Ok(())
    }

    /// Log configuration summary
    fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Search:");
        info!(
            "    History: {} items, min length {}",
            self.search.max_history_items, self.search.min_search_length
        );
        info!(
            "    Fuzzy: {} (threshold {})",
            self.search.fuzzy_by_default, self.search.fuzzy_threshold
        );
        info!("  Filters:");
        info!(
            "    Saved filters: {}, remember last: {}, multi-select: {}",
            self.filter.max_saved_filters,
            self.filter.remember_last_filter,
            self.filter.multi_select
        );
        info!("  Recommendations:");
        info!(
            "    Personalization: {}, results: {}, history: {}",
            self.recommendation.personalization_enabled,
            self.recommendation.max_recommendations,
            self.recommendation.max_history_items
        );
    }
}

impl SearchConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_history_items: get_env_parsed_or("SEARCH_MAX_HISTORY", defaults.max_history_items),
            min_search_length: get_env_parsed_or("SEARCH_MIN_LENGTH", defaults.min_search_length),
            fuzzy_threshold: get_env_parsed_or("SEARCH_FUZZY_THRESHOLD", defaults.fuzzy_threshold),
            fuzzy_by_default: get_env_parsed_or("SEARCH_FUZZY_DEFAULT", defaults.fuzzy_by_default),
            record_history: get_env_parsed_or("SEARCH_RECORD_HISTORY", defaults.record_history),
            max_suggestions: get_env_parsed_or("SEARCH_MAX_SUGGESTIONS", defaults.max_suggestions),
        }
    }
}

impl FilterConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_saved_filters: get_env_parsed_or("FILTER_MAX_SAVED", defaults.max_saved_filters),
            remember_last_filter: get_env_parsed_or(
                "FILTER_REMEMBER_LAST",
                defaults.remember_last_filter,
            ),
            multi_select: get_env_parsed_or("FILTER_MULTI_SELECT", defaults.multi_select),
        }
    }
}

impl RecommendationConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_history_items: get_env_parsed_or("REC_MAX_HISTORY", defaults.max_history_items),
            max_recommendations: get_env_parsed_or("REC_MAX_RESULTS", defaults.max_recommendations),
            personalization_enabled: get_env_parsed_or(
                "REC_PERSONALIZATION",
                defaults.personalization_enabled,
            ),
            favorite_bonus: get_env_parsed_or("REC_FAVORITE_BONUS", defaults.favorite_bonus),
            purchase_bonus: get_env_parsed_or("REC_PURCHASE_BONUS", defaults.purchase_bonus),
            similarity_tie_window: get_env_parsed_or(
                "REC_SIMILARITY_TIE_WINDOW",
                defaults.similarity_tie_window,
            ),
            trending_view_threshold: get_env_parsed_or(
                "REC_TRENDING_VIEW_THRESHOLD",
                defaults.trending_view_threshold,
            ),
            price_low_threshold: get_env_parsed_or("REC_PRICE_LOW", defaults.price_low_threshold),
            price_high_threshold: get_env_parsed_or("REC_PRICE_HIGH", defaults.price_high_threshold),
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get and parse environment variable, falling back to a default when unset or unparsable
fn get_env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable value '{}' for {}", raw, key);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.max_history_items, 10);
        assert_eq!(config.search.min_search_length, 2);
        assert_eq!(config.filter.max_saved_filters, 5);
        assert_eq!(config.recommendation.max_history_items, 50);
        assert!((config.search.fuzzy_threshold - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut config = EngineConfig::default();
        config.search.fuzzy_threshold = 1.5;
        match config.validate() {
            Err(Error::InvalidConfig { key, .. }) => assert_eq!(key, "SEARCH_FUZZY_THRESHOLD"),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = EngineConfig::default();
        config.filter.max_saved_filters = 0;
        match config.validate() {
            Err(Error::InvalidConfig { key, .. }) => assert_eq!(key, "FILTER_MAX_SAVED"),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_inverted_price_buckets() {
        let mut config = EngineConfig::default();
        config.recommendation.price_low_threshold = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("CATALOG_TEST_GARBAGE_USIZE", "not-a-number");
        let value: usize = get_env_parsed_or("CATALOG_TEST_GARBAGE_USIZE", 7);
        assert_eq!(value, 7);

        std::env::set_var("CATALOG_TEST_VALID_F64", " 0.45 ");
        let value: f64 = get_env_parsed_or("CATALOG_TEST_VALID_F64", 0.3);
        assert!((value - 0.45).abs() < f64::EPSILON);
    }
}
