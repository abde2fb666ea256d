//! Structured filtering, sorting and saved filter presets
//!
//! [`FilterCriteria`] is plain data; [`FilterEngine`] owns the user's current
//! selection and the saved-filter library and persists both.

pub mod criteria;
pub mod engine;

pub use criteria::{DateRange, FilterCriteria, PriceRange, SavedFilter, SortBy};
pub use engine::FilterEngine;
