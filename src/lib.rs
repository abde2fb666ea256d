//! Catalog discovery library
//!
//! Search, filtering and recommendations over an in-memory snapshot of a
//! marketplace catalog, with per-user state kept in a pluggable key-value store.

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod recommendation;
pub mod search;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use catalog::{Attribute, CatalogItem};
pub use config::{EngineConfig, FilterConfig, RecommendationConfig, SearchConfig};
pub use error::{Error, Result};
pub use filter::{FilterCriteria, FilterEngine, SortBy};
pub use recommendation::{RecommendationEngine, ScoredItem};
pub use search::{SearchEngine, SearchOptions};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
