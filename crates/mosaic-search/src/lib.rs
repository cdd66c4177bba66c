//! # mosaic-search
//!
//! Multi-signal search and similarity ranking for the mosaic media library.
//!
//! This crate provides:
//! - Tag similarity with IDF-weighted generalized Jaccard scoring
//! - Free-text search over authors, manual tags, and auto tags
//! - Attribute filter composition, ordering, and pagination
//! - A TTL cache of dataset tag statistics
//! - An in-memory store for tests and embedded use
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mosaic_db::Database;
//! use mosaic_search::{SearchConfig, SearchEngine, SearchRequest};
//!
//! let db = Database::connect("postgres://localhost/mosaic").await?;
//! let engine = SearchEngine::new(Arc::new(db.stacks), SearchConfig::from_env());
//! let page = engine
//!     .dataset(dataset_id)
//!     .search(&SearchRequest::unified("cat -blue"))
//!     .await?;
//! ```

pub mod composer;
pub mod config;
pub mod engine;
pub mod memory;
pub mod similarity;
pub mod tag_stats;
pub mod unified;

// Re-export core types
pub use mosaic_core::*;

pub use composer::FilterComposer;
pub use config::{ScoringWeights, SearchConfig, UnifiedWeights};
pub use engine::{DatasetSearch, SearchEngine};
pub use memory::{InMemoryStackIndex, NewStack};
pub use similarity::{idf_weight, weighted_jaccard, DocumentFrequencies, TagProfile, TagSimilarity};
pub use tag_stats::TagStatistics;
pub use unified::{combine_tokens, token_hits, tokenize, QueryTokens, UnifiedSearch};
