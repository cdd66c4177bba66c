//! # mosaic-core
//!
//! Core types, traits, and pure algorithms for the mosaic media library
//! search engine.
//!
//! This crate provides the domain model, the color math, tag aggregation,
//! and the store traits that the `mosaic-db` and `mosaic-search` crates
//! depend on.

pub mod color;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod logging;
pub mod models;
pub mod search;
pub mod stop_tags;
pub mod tags;
pub mod traits;

// Re-export commonly used types at crate root
pub use color::{
    color_distance, hue_category, max_distance_for_threshold, parse_hex, rgb_to_hsl,
    ColorDistanceMetric, ColorSample, Hsl, HueCategory,
};
pub use error::{Error, Result};
pub use filter::{
    CollectionFilter, ColorFilter, FilterPredicate, RelationFilter, StackFilter,
};
pub use models::{MediaType, StackSummary};
pub use search::*;
pub use stop_tags::{StopTagGroup, StopTagSettings, StopTags, DEFAULT_STOP_TAGS};
pub use tags::{aggregate_predictions, normalize_tag, AutoTagVector, TaggerPrediction};
pub use traits::*;
