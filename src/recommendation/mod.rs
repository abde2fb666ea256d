//! Recommendation Module
//!
//! Personalized catalog recommendations for the current user.
//!
//! ## Architecture
//!
//! 1. **Preferences** - Interaction records (views, favorites, purchases) and the preference profile built from them
//! 2. **Engine** - Match scoring, item similarity and ranking
//!
//! ## Scoring
//!
//! Match score and item similarity share one set of dimension weights:
//! - Category (30%)
//! - Creator (20%)
//! - Price bucket (10%)
//! - Rarity (20%)
//! - Attributes (20%)
//!
//! Dimensions an item does not carry are left out of both the weighted sum and
//! the normalizing total, so scores stay in `[0, 1]`.

pub mod engine;
pub mod preferences;

pub use engine::{item_similarity, MatchWeights, RecommendationEngine, RecommendationReason, ScoredItem};
pub use preferences::{build_profile, InteractionRecord, PreferenceProfile, PriceBucket};
