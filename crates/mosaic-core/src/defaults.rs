//! Centralized default constants for the mosaic search engine.
//!
//! **This module is the single source of truth** for shared default values.
//! Engine configuration, the PostgreSQL store, and the in-memory index all
//! reference these constants instead of defining their own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section.

use uuid::Uuid;

// =============================================================================
// PRINCIPAL
// =============================================================================

/// The deployment's single implicit user. Favorites are keyed by this ID.
pub const DEFAULT_PRINCIPAL_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_7000_8000_0000_0000_0001);

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for search results.
pub const PAGE_LIMIT: usize = 50;

/// Largest page a single request may ask for.
pub const PAGE_LIMIT_MAX: usize = 500;

/// Default page offset.
pub const PAGE_OFFSET: usize = 0;

/// Maximum number of elements across all arrays of a single filter predicate.
pub const MAX_FILTER_ELEMENTS: usize = 1000;

// =============================================================================
// AUTOMATIC TAGS
// =============================================================================

/// Minimum confidence for a prediction to be stored in an item's aggregate.
///
/// Matches the tagger service's own default threshold.
pub const AUTO_TAG_PREDICT_THRESHOLD: f32 = 0.4;

/// Number of predictions kept per item after thresholding.
pub const AUTO_TAG_TOP_N: usize = 48;

// =============================================================================
// TAG STATISTICS
// =============================================================================

/// Lifetime of cached document frequencies and dataset item counts (5 minutes).
pub const TAG_STATS_TTL_SECS: u64 = 300;

// =============================================================================
// SIMILARITY
// =============================================================================

/// Automatic tags below this score are ignored by similarity search.
pub const SIMILAR_AUTO_MIN_SCORE: f32 = 0.5;

/// Size of the automatic-tag vector built for each item.
pub const SIMILAR_AUTO_TOP_N: usize = 32;

/// Manual tags considered per item.
pub const SIMILAR_MANUAL_MAX: usize = 64;

/// Number of the reference item's top automatic tags probed for candidates.
pub const SIMILAR_PROBE_AUTO_TAGS: usize = 12;

/// Shared automatic tags a candidate needs to be considered.
pub const SIMILAR_AUTO_MIN_OVERLAP: usize = 2;

/// Shared manual tags a candidate needs to be considered.
pub const SIMILAR_MANUAL_MIN_OVERLAP: usize = 1;

/// Candidates returned by each overlap probe.
pub const SIMILAR_CANDIDATE_LIMIT: usize = 500;

/// Weight of an automatic tag's confidence in a tag's value.
pub const SIMILAR_AUTO_WEIGHT: f64 = 1.0;

/// Weight of a manual tag's presence in a tag's value. Must exceed the auto weight.
pub const SIMILAR_MANUAL_WEIGHT: f64 = 2.0;

/// Floor for a tag's IDF weight.
pub const SIMILAR_MIN_IDF: f64 = 0.1;

/// Extra multiplier for tags where either side's signal is a manual tag.
pub const SIMILAR_MANUAL_BOOST: f64 = 1.5;

/// Maximum number of similar items returned.
pub const SIMILAR_RESULT_LIMIT: usize = 200;

/// Minimum similarity score kept.
pub const SIMILAR_THRESHOLD: f64 = 0.0;

// =============================================================================
// UNIFIED SEARCH
// =============================================================================

/// Relevance of a token matching the item's author name.
pub const UNIFIED_AUTHOR_WEIGHT: f64 = 3.0;

/// Relevance of a token matching an automatic tag key or display name.
pub const UNIFIED_AUTO_TAG_WEIGHT: f64 = 2.0;

/// Relevance of a token matching a manual tag title.
pub const UNIFIED_MANUAL_TAG_WEIGHT: f64 = 1.0;

/// Automatic tags below this score never match a free-text token.
pub const UNIFIED_AUTO_TAG_MIN_SCORE: f32 = 0.5;

// =============================================================================
// COLOR
// =============================================================================

/// Dominant colors stored per item or asset.
pub const MAX_COLOR_SAMPLES: usize = 3;

/// Samples at or below this saturation count as gray.
pub const GRAY_SATURATION_MAX: u8 = 10;

/// Scale of the similarity fraction used by search-by-color.
pub const COLOR_DISTANCE_SCALE: f64 = 100.0;

/// Default tolerance for tone matching.
pub const COLOR_TONE_TOLERANCE: f64 = 20.0;

// =============================================================================
// REQUEST
// =============================================================================

/// Deadline for a single search request in milliseconds.
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;
