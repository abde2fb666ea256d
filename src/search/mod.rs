//! Free-text search, query history and suggestions

pub mod engine;
pub mod fuzzy;

pub use engine::{SearchEngine, SearchOptions, VOCABULARY};
