//! Attribute filters applied by the filter composer.
//!
//! A [`StackFilter`] composes independent dimensions:
//!
//! - **Author** and **Tag**: include / include-any / exclude / not-set
//! - **Favorite** and **Liked**: boolean membership
//! - **Media type**: any-of
//! - **Collection**: manual membership or pre-resolved smart collection
//! - **Color**: hue bucket, tone distance, or search-by-color
//!
//! Each dimension is decomposed into a [`FilterPredicate`] that a store
//! resolves to a set of stack IDs. The composer intersects those sets.
//!
//! # Example
//!
//! ```
//! use mosaic_core::{ColorFilter, HueCategory, MediaType, RelationFilter, StackFilter};
//! use uuid::Uuid;
//!
//! let filter = StackFilter::new()
//!     .with_tags(RelationFilter::new().require(Uuid::nil()).allow_unset())
//!     .with_media_types(vec![MediaType::Image, MediaType::Comic])
//!     .with_color(ColorFilter::hue(vec![HueCategory::Red]));
//!
//! assert!(filter.has_tag_constraints());
//! assert!(!filter.has_author_constraints());
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::color::{
    color_distance, max_distance_for_threshold, ColorDistanceMetric, ColorSample, Hsl,
    HueCategory,
};
use crate::defaults::COLOR_TONE_TOLERANCE;
use crate::models::MediaType;

// =============================================================================
// RELATION FILTER
// =============================================================================

/// Constraint over a stack's related IDs (its author, or its tags).
///
/// Semantics, with `V` the stack's related IDs:
/// - positive branch: every `include` ID is in `V`, and at least one
///   `include_any` ID is in `V` when that list is non-empty
/// - `not_set` adds an OR branch matching stacks where `V` is empty
/// - `exclude` removes stacks where any excluded ID is in `V`
///
/// An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationFilter {
    #[serde(default)]
    pub include: Vec<Uuid>,
    #[serde(default)]
    pub include_any: Vec<Uuid>,
    #[serde(default)]
    pub exclude: Vec<Uuid>,
    #[serde(default)]
    pub not_set: bool,
}

impl RelationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require this ID (AND).
    pub fn require(mut self, id: Uuid) -> Self {
        self.include.push(id);
        self
    }

    /// Accept this ID (OR across `include_any`).
    pub fn any_of(mut self, id: Uuid) -> Self {
        self.include_any.push(id);
        self
    }

    /// Reject stacks related to this ID.
    pub fn exclude(mut self, id: Uuid) -> Self {
        self.exclude.push(id);
        self
    }

    /// Also accept stacks with no related IDs at all.
    pub fn allow_unset(mut self) -> Self {
        self.not_set = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.include_any.is_empty() && self.exclude.is_empty() && !self.not_set
    }

    pub fn has_positive(&self) -> bool {
        !self.include.is_empty() || !self.include_any.is_empty()
    }

    pub fn element_count(&self) -> usize {
        self.include.len() + self.include_any.len() + self.exclude.len()
    }

    /// Evaluate against a stack's related IDs.
    pub fn matches(&self, values: &[Uuid]) -> bool {
        let positive = self.include.iter().all(|id| values.contains(id))
            && (self.include_any.is_empty()
                || self.include_any.iter().any(|id| values.contains(id)));

        let branch = match (self.has_positive(), self.not_set) {
            (false, false) => true,
            (true, false) => positive,
            (false, true) => values.is_empty(),
            (true, true) => positive || values.is_empty(),
        };

        branch && !self.exclude.iter().any(|id| values.contains(id))
    }
}

// =============================================================================
// COLOR FILTER
// =============================================================================

/// Color constraint over a stack's dominant-color samples.
///
/// A stack matches when any of its samples satisfies the predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorFilter {
    /// Exact categorical match on hue bucket (fast path).
    ///
    /// `Gray` matches desaturated samples. With `chromatic_only`, desaturated
    /// samples are also kept out of the chromatic buckets.
    Hue {
        categories: Vec<HueCategory>,
        #[serde(default)]
        chromatic_only: bool,
    },
    /// Distance to a target tone within `tolerance` (precise path).
    Tone { hsl: Hsl, tolerance: f64 },
    /// Search-by-color: similarity fraction in `[0, 1]`.
    Similar { hsl: Hsl, threshold: f64 },
}

impl ColorFilter {
    pub fn hue(categories: Vec<HueCategory>) -> Self {
        ColorFilter::Hue {
            categories,
            chromatic_only: false,
        }
    }

    /// Hue filter whose chromatic buckets skip desaturated samples.
    pub fn chromatic_hue(categories: Vec<HueCategory>) -> Self {
        ColorFilter::Hue {
            categories,
            chromatic_only: true,
        }
    }

    pub fn tone(hsl: Hsl) -> Self {
        ColorFilter::Tone {
            hsl,
            tolerance: COLOR_TONE_TOLERANCE,
        }
    }

    pub fn similar(hsl: Hsl, threshold: f64) -> Self {
        ColorFilter::Similar { hsl, threshold }
    }

    /// Largest accepted distance for the distance-based variants.
    pub fn max_distance(&self) -> Option<f64> {
        match self {
            ColorFilter::Hue { .. } => None,
            ColorFilter::Tone { tolerance, .. } => Some(tolerance.max(0.0)),
            ColorFilter::Similar { threshold, .. } => Some(max_distance_for_threshold(*threshold)),
        }
    }

    /// Whether this filter would accept everything (no categories given).
    pub fn is_empty(&self) -> bool {
        matches!(self, ColorFilter::Hue { categories, .. } if categories.is_empty())
    }

    /// Evaluate against one sample.
    pub fn matches_sample(&self, sample: &ColorSample, metric: ColorDistanceMetric) -> bool {
        match self {
            ColorFilter::Hue {
                categories,
                chromatic_only,
            } => categories.iter().any(|c| {
                if *chromatic_only {
                    sample.in_chromatic_category(*c)
                } else {
                    sample.in_category(*c)
                }
            }),
            ColorFilter::Tone { hsl, .. } | ColorFilter::Similar { hsl, .. } => {
                let max = self.max_distance().unwrap_or(0.0);
                color_distance(sample.hsl, *hsl, metric) <= max
            }
        }
    }

    /// Evaluate against a stack's samples.
    pub fn matches(&self, samples: &[ColorSample], metric: ColorDistanceMetric) -> bool {
        samples.iter().any(|s| self.matches_sample(s, metric))
    }
}

// =============================================================================
// COLLECTION FILTER
// =============================================================================

/// Collection membership constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CollectionFilter {
    /// Stacks manually placed in this collection.
    Collection(Uuid),
    /// Membership already resolved by the caller (smart collections).
    Members(Vec<Uuid>),
}

// =============================================================================
// STACK FILTER
// =============================================================================

/// All attribute filters of one search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<RelationFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<RelationFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_types: Vec<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorFilter>,
}

impl StackFilter {
    /// Create an empty filter (matches all stacks).
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // BUILDER METHODS
    // =========================================================================

    pub fn with_authors(mut self, authors: RelationFilter) -> Self {
        self.authors = Some(authors);
        self
    }

    pub fn with_tags(mut self, tags: RelationFilter) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.favorite = Some(favorite);
        self
    }

    pub fn with_liked(mut self, liked: bool) -> Self {
        self.liked = Some(liked);
        self
    }

    pub fn with_media_types(mut self, media_types: Vec<MediaType>) -> Self {
        self.media_types = media_types;
        self
    }

    pub fn with_collection(mut self, collection: CollectionFilter) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn with_color(mut self, color: ColorFilter) -> Self {
        self.color = Some(color);
        self
    }

    // =========================================================================
    // CONSTRAINT CHECKS
    // =========================================================================

    pub fn has_author_constraints(&self) -> bool {
        self.authors.as_ref().map(|a| !a.is_empty()).unwrap_or(false)
    }

    pub fn has_tag_constraints(&self) -> bool {
        self.tags.as_ref().map(|t| !t.is_empty()).unwrap_or(false)
    }

    pub fn has_color_constraints(&self) -> bool {
        self.color.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.predicates(Uuid::nil(), ColorDistanceMetric::default())
            .is_empty()
    }

    /// Decompose into independent predicates. Empty dimensions are skipped.
    pub fn predicates(&self, principal_id: Uuid, metric: ColorDistanceMetric) -> Vec<FilterPredicate> {
        let mut predicates = Vec::new();

        if let Some(authors) = self.authors.as_ref().filter(|a| !a.is_empty()) {
            predicates.push(FilterPredicate::Author(authors.clone()));
        }
        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            predicates.push(FilterPredicate::Tag(tags.clone()));
        }
        if let Some(favorited) = self.favorite {
            predicates.push(FilterPredicate::Favorite {
                principal_id,
                favorited,
            });
        }
        if let Some(liked) = self.liked {
            predicates.push(FilterPredicate::Liked(liked));
        }
        if !self.media_types.is_empty() {
            predicates.push(FilterPredicate::MediaType(self.media_types.clone()));
        }
        if let Some(collection) = &self.collection {
            predicates.push(FilterPredicate::Collection(collection.clone()));
        }
        if let Some(color) = self.color.as_ref().filter(|c| !c.is_empty()) {
            predicates.push(FilterPredicate::Color {
                filter: color.clone(),
                metric,
            });
        }

        predicates
    }
}

/// One independently resolvable constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPredicate {
    Author(RelationFilter),
    Tag(RelationFilter),
    Favorite { principal_id: Uuid, favorited: bool },
    Liked(bool),
    MediaType(Vec<MediaType>),
    Collection(CollectionFilter),
    Color {
        filter: ColorFilter,
        metric: ColorDistanceMetric,
    },
}

impl FilterPredicate {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FilterPredicate::Author(_) => "author",
            FilterPredicate::Tag(_) => "tag",
            FilterPredicate::Favorite { .. } => "favorite",
            FilterPredicate::Liked(_) => "liked",
            FilterPredicate::MediaType(_) => "media_type",
            FilterPredicate::Collection(_) => "collection",
            FilterPredicate::Color { .. } => "color",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_empty_relation_matches_everything() {
        let f = RelationFilter::new();
        assert!(f.is_empty());
        assert!(f.matches(&[]));
        assert!(f.matches(&ids(2)));
    }

    #[test]
    fn test_include_requires_all() {
        let v = ids(3);
        let f = RelationFilter::new().require(v[0]).require(v[1]);
        assert!(f.matches(&v));
        assert!(!f.matches(&v[..1]));
    }

    #[test]
    fn test_include_any_requires_one() {
        let v = ids(3);
        let f = RelationFilter::new().any_of(v[2]).any_of(Uuid::new_v4());
        assert!(f.matches(&v));
        assert!(!f.matches(&v[..2]));
    }

    #[test]
    fn test_exclude_removes() {
        let v = ids(2);
        let f = RelationFilter::new().exclude(v[1]);
        assert!(!f.matches(&v));
        assert!(f.matches(&v[..1]));
        assert!(f.matches(&[]));
    }

    #[test]
    fn test_not_set_alone_matches_only_empty() {
        let f = RelationFilter::new().allow_unset();
        assert!(f.matches(&[]));
        assert!(!f.matches(&ids(1)));
    }

    #[test]
    fn test_not_set_is_or_branch() {
        let v = ids(2);
        let f = RelationFilter::new().require(v[0]).allow_unset();
        assert!(f.matches(&[]));
        assert!(f.matches(&v));
        assert!(!f.matches(&v[1..]));
    }

    #[test]
    fn test_exclude_applies_to_not_set_branch_too() {
        let v = ids(1);
        let f = RelationFilter::new().allow_unset().exclude(v[0]);
        assert!(f.matches(&[]));
        assert!(!f.matches(&v));
    }

    #[test]
    fn test_color_hue_filter() {
        let red = ColorSample::from_rgb(230, 20, 20, 50.0);
        let gray = ColorSample::from_rgb(120, 120, 120, 50.0);
        let blue = ColorSample::from_rgb(30, 60, 220, 50.0);
        let f = ColorFilter::hue(vec![HueCategory::Red]);
        assert!(f.matches(&[blue.clone(), red.clone()], ColorDistanceMetric::Circular));
        assert!(!f.matches(&[blue], ColorDistanceMetric::Circular));
        // Neutral gray is stored with hue 0, so it sits in the red bucket too.
        assert!(f.matches(&[gray.clone()], ColorDistanceMetric::Circular));
        let g = ColorFilter::hue(vec![HueCategory::Gray]);
        assert!(g.matches(&[gray.clone()], ColorDistanceMetric::Circular));
        assert!(!g.matches(&[red], ColorDistanceMetric::Circular));
    }

    #[test]
    fn test_chromatic_hue_filter_skips_desaturated_samples() {
        let red = ColorSample::from_rgb(230, 20, 20, 50.0);
        let muted = ColorSample::from_rgb(140, 120, 118, 50.0);
        let f = ColorFilter::chromatic_hue(vec![HueCategory::Red]);
        assert!(f.matches(&[red], ColorDistanceMetric::Circular));
        assert!(!f.matches(&[muted.clone()], ColorDistanceMetric::Circular));
        assert!(ColorFilter::hue(vec![HueCategory::Red])
            .matches(&[muted.clone()], ColorDistanceMetric::Circular));
        let with_gray = ColorFilter::chromatic_hue(vec![HueCategory::Red, HueCategory::Gray]);
        assert!(with_gray.matches(&[muted], ColorDistanceMetric::Circular));
    }

    #[test]
    fn test_color_similar_threshold() {
        let sample = ColorSample::from_rgb(255, 0, 0, 50.0); // (0, 100, 50)
        let near = ColorFilter::similar(Hsl::new(5, 100, 50), 0.9); // max distance 10
        let far = ColorFilter::similar(Hsl::new(40, 100, 50), 0.9);
        assert!(near.matches(&[sample.clone()], ColorDistanceMetric::Circular));
        assert!(!far.matches(&[sample], ColorDistanceMetric::Circular));
    }

    #[test]
    fn test_color_tone_wraparound_depends_on_metric() {
        let sample = ColorSample {
            hsl: Hsl::new(359, 60, 50),
            ..ColorSample::from_rgb(200, 40, 40, 50.0)
        };
        let f = ColorFilter::Tone {
            hsl: Hsl::new(2, 60, 50),
            tolerance: 5.0,
        };
        assert!(f.matches(&[sample.clone()], ColorDistanceMetric::Circular));
        assert!(!f.matches(&[sample], ColorDistanceMetric::Linear));
    }

    #[test]
    fn test_predicates_skip_empty_dimensions() {
        let filter = StackFilter::new()
            .with_tags(RelationFilter::new())
            .with_color(ColorFilter::hue(vec![]));
        assert!(filter.is_empty());

        let filter = StackFilter::new()
            .with_favorite(false)
            .with_media_types(vec![MediaType::Video]);
        let preds = filter.predicates(Uuid::nil(), ColorDistanceMetric::Circular);
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].kind(), "favorite");
        assert_eq!(preds[1].kind(), "media_type");
    }

    #[test]
    fn test_filter_deserializes_from_json() {
        let json = r#"{
            "tags": {"include_any": ["00000000-0000-0000-0000-000000000001"]},
            "media_types": ["image"],
            "color": {"kind": "hue", "categories": ["blue", "gray"]},
            "collection": {"kind": "collection", "value": "00000000-0000-0000-0000-000000000002"}
        }"#;
        let filter: StackFilter = serde_json::from_str(json).unwrap();
        assert!(filter.has_tag_constraints());
        assert_eq!(filter.media_types, vec![MediaType::Image]);
        assert!(filter.has_color_constraints());
        assert!(matches!(
            filter.color,
            Some(ColorFilter::Hue { chromatic_only: false, .. })
        ));
        assert!(matches!(filter.collection, Some(CollectionFilter::Collection(_))));
    }
}
