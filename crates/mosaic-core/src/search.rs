//! Search request and result types.
//!
//! A [`SearchRequest`] selects a mode, carries the attribute filters and
//! the sort/pagination, and is executed against one dataset. Candidate
//! generators return [`ScoredIds`]; the filter composer turns them into a
//! [`SearchPage`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::{
    MAX_FILTER_ELEMENTS, PAGE_LIMIT, PAGE_LIMIT_MAX, PAGE_OFFSET, SIMILAR_AUTO_MIN_OVERLAP,
    SIMILAR_AUTO_MIN_SCORE, SIMILAR_AUTO_TOP_N, SIMILAR_CANDIDATE_LIMIT, SIMILAR_MANUAL_MAX,
    SIMILAR_MANUAL_MIN_OVERLAP, SIMILAR_PROBE_AUTO_TAGS, SIMILAR_RESULT_LIMIT, SIMILAR_THRESHOLD,
};
use crate::error::{Error, Result};
use crate::filter::{ColorFilter, StackFilter};

// =============================================================================
// MODE AND SORT
// =============================================================================

/// How candidates are generated before attribute filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Every stack in the dataset.
    #[default]
    All,
    /// Stacks similar to a reference stack, scored.
    Similar,
    /// Free-text query over authors and tags, scored.
    Unified,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::All => "all",
            SearchMode::Similar => "similar",
            SearchMode::Unified => "unified",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(SearchMode::All),
            "similar" => Ok(SearchMode::Similar),
            "unified" => Ok(SearchMode::Unified),
            other => Err(Error::InvalidRequest(format!("unknown search mode: {other}"))),
        }
    }
}

/// Sort key for the final ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// By score when the mode produced one, otherwise newest first.
    #[default]
    Recommended,
    Name,
    CreatedAt,
    UpdatedAt,
    Likes,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Recommended => "recommended",
            SortField::Name => "name",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Likes => "likes",
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recommended" => Ok(SortField::Recommended),
            "name" => Ok(SortField::Name),
            "created_at" | "created" => Ok(SortField::CreatedAt),
            "updated_at" | "updated" => Ok(SortField::UpdatedAt),
            "likes" => Ok(SortField::Likes),
            other => Err(Error::InvalidRequest(format!("unknown sort field: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::InvalidRequest(format!("unknown sort order: {other}"))),
        }
    }
}

// =============================================================================
// PAGINATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_offset")]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_offset() -> usize {
    PAGE_OFFSET
}

fn default_limit() -> usize {
    PAGE_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: PAGE_OFFSET,
            limit: PAGE_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Limit capped at [`PAGE_LIMIT_MAX`]. The flag reports whether it changed.
    pub fn clamped(self) -> (Self, bool) {
        if self.limit > PAGE_LIMIT_MAX {
            (
                Self {
                    limit: PAGE_LIMIT_MAX,
                    ..self
                },
                true,
            )
        } else {
            (self, false)
        }
    }

    /// The `[offset, offset + limit)` window of `items`.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset)
            .take(self.limit)
            .cloned()
            .collect()
    }
}

// =============================================================================
// SIMILARITY PARAMETERS
// =============================================================================

/// Resolved parameters of the tag similarity engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityParams {
    /// Auto tags below this confidence are ignored.
    pub auto_min_score: f32,
    /// Size cap of each stack's auto-tag vector.
    pub auto_top_n: usize,
    /// Size cap of each stack's manual tag set.
    pub manual_max: usize,
    /// How many of the reference's top auto tags are probed for candidates.
    pub probe_auto_tags: usize,
    pub auto_min_overlap: usize,
    pub manual_min_overlap: usize,
    /// Cap on candidates per probe source.
    pub candidate_limit: usize,
    /// Minimum score a candidate needs to be kept.
    pub threshold: f64,
    pub result_limit: usize,
}

impl Default for SimilarityParams {
    fn default() -> Self {
        Self {
            auto_min_score: SIMILAR_AUTO_MIN_SCORE,
            auto_top_n: SIMILAR_AUTO_TOP_N,
            manual_max: SIMILAR_MANUAL_MAX,
            probe_auto_tags: SIMILAR_PROBE_AUTO_TAGS,
            auto_min_overlap: SIMILAR_AUTO_MIN_OVERLAP,
            manual_min_overlap: SIMILAR_MANUAL_MIN_OVERLAP,
            candidate_limit: SIMILAR_CANDIDATE_LIMIT,
            threshold: SIMILAR_THRESHOLD,
            result_limit: SIMILAR_RESULT_LIMIT,
        }
    }
}

/// Per-request overrides of [`SimilarityParams`]. Unset fields keep the
/// engine's configured value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_min_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_top_n: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_max: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_auto_tags: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_min_overlap: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_min_overlap: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_limit: Option<usize>,
}

impl SimilarityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_auto_min_overlap(mut self, overlap: usize) -> Self {
        self.auto_min_overlap = Some(overlap);
        self
    }

    pub fn with_manual_min_overlap(mut self, overlap: usize) -> Self {
        self.manual_min_overlap = Some(overlap);
        self
    }

    pub fn with_auto_min_score(mut self, score: f32) -> Self {
        self.auto_min_score = Some(score);
        self
    }

    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = Some(limit);
        self
    }

    /// Overlay these overrides on `base`.
    pub fn resolve(&self, base: &SimilarityParams) -> SimilarityParams {
        SimilarityParams {
            auto_min_score: self.auto_min_score.unwrap_or(base.auto_min_score),
            auto_top_n: self.auto_top_n.unwrap_or(base.auto_top_n),
            manual_max: self.manual_max.unwrap_or(base.manual_max),
            probe_auto_tags: self.probe_auto_tags.unwrap_or(base.probe_auto_tags),
            auto_min_overlap: self.auto_min_overlap.unwrap_or(base.auto_min_overlap),
            manual_min_overlap: self.manual_min_overlap.unwrap_or(base.manual_min_overlap),
            candidate_limit: self.candidate_limit.unwrap_or(base.candidate_limit),
            threshold: self.threshold.unwrap_or(base.threshold),
            result_limit: self.result_limit.unwrap_or(base.result_limit),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(score) = self.auto_min_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(Error::InvalidRequest(format!(
                    "auto_min_score must be within [0, 1], got {score}"
                )));
            }
        }
        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(Error::InvalidRequest(format!(
                    "similarity threshold must be within [0, 1], got {threshold}"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// One search against a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub mode: SearchMode,
    /// Free-text query (UNIFIED mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Reference stack (SIMILAR mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_stack_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<SimilarityOptions>,
    #[serde(default)]
    pub filter: StackFilter,
    #[serde(default)]
    pub sort: SortField,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub pagination: Pagination,
}

impl SearchRequest {
    /// Every stack in the dataset.
    pub fn all() -> Self {
        Self::default()
    }

    /// Stacks similar to `reference`.
    pub fn similar(reference: Uuid) -> Self {
        Self {
            mode: SearchMode::Similar,
            reference_stack_id: Some(reference),
            ..Self::default()
        }
    }

    /// Free-text query.
    pub fn unified(query: impl Into<String>) -> Self {
        Self {
            mode: SearchMode::Unified,
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: StackFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_similarity(mut self, options: SimilarityOptions) -> Self {
        self.similarity = Some(options);
        self
    }

    pub fn with_sort(mut self, sort: SortField, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn with_pagination(mut self, offset: usize, limit: usize) -> Self {
        self.pagination = Pagination::new(offset, limit);
        self
    }

    /// Check mode parameters and filter sizes.
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            SearchMode::All => {}
            SearchMode::Similar => {
                if self.reference_stack_id.is_none() {
                    return Err(Error::InvalidRequest(
                        "similar search requires reference_stack_id".to_string(),
                    ));
                }
            }
            SearchMode::Unified => {
                let blank = self.query.as_deref().map(str::trim).map_or(true, str::is_empty);
                if blank {
                    return Err(Error::InvalidRequest(
                        "unified search requires a non-empty query".to_string(),
                    ));
                }
            }
        }

        if let Some(options) = &self.similarity {
            options.validate()?;
        }

        let elements = self.filter.authors.as_ref().map_or(0, |a| a.element_count())
            + self.filter.tags.as_ref().map_or(0, |t| t.element_count())
            + self.filter.media_types.len();
        if elements > MAX_FILTER_ELEMENTS {
            return Err(Error::InvalidRequest(format!(
                "filter has {elements} elements, maximum is {MAX_FILTER_ELEMENTS}"
            )));
        }

        match &self.filter.color {
            Some(ColorFilter::Similar { threshold, .. }) if !(0.0..=1.0).contains(threshold) => {
                Err(Error::InvalidRequest(format!(
                    "color threshold must be within [0, 1], got {threshold}"
                )))
            }
            Some(ColorFilter::Tone { tolerance, .. }) if *tolerance < 0.0 || tolerance.is_nan() => {
                Err(Error::InvalidRequest(format!(
                    "color tolerance must be non-negative, got {tolerance}"
                )))
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// Ordered candidate IDs with an optional score per ID.
///
/// `scores` is `Some` only for modes that rank (SIMILAR, UNIFIED). The
/// composer sorts by score only when it is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredIds {
    pub ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<HashMap<Uuid, f64>>,
}

impl ScoredIds {
    /// Unscored IDs.
    pub fn unscored(ids: Vec<Uuid>) -> Self {
        Self { ids, scores: None }
    }

    /// Scored IDs, keeping the given order.
    pub fn scored(entries: Vec<(Uuid, f64)>) -> Self {
        let ids = entries.iter().map(|(id, _)| *id).collect();
        Self {
            ids,
            scores: Some(entries.into_iter().collect()),
        }
    }

    /// No candidates. Scored, so a ranked mode stays ranked when empty.
    pub fn empty_scored() -> Self {
        Self {
            ids: Vec::new(),
            scores: Some(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn score(&self, id: &Uuid) -> Option<f64> {
        self.scores.as_ref().and_then(|s| s.get(id).copied())
    }

    /// Keep only IDs in `allowed`, preserving order.
    pub fn retain(&mut self, allowed: &HashSet<Uuid>) {
        self.ids.retain(|id| allowed.contains(id));
        if let Some(scores) = self.scores.as_mut() {
            scores.retain(|id, _| allowed.contains(id));
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<Uuid>,
    /// Size of the filtered set before pagination.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    /// Scores of the page's items, for ranked modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<HashMap<Uuid, f64>>,
}

impl SearchPage {
    pub fn empty(pagination: Pagination) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            limit: pagination.limit,
            offset: pagination.offset,
            scores: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.offset + self.items.len() < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Hsl;
    use crate::filter::RelationFilter;

    #[test]
    fn test_request_defaults_from_json() {
        let req: SearchRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.mode, SearchMode::All);
        assert_eq!(req.sort, SortField::Recommended);
        assert_eq!(req.order, SortOrder::Desc);
        assert_eq!(req.pagination, Pagination::default());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_partial_pagination_json() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"mode":"unified","query":"cat","pagination":{"offset":20}}"#)
                .unwrap();
        assert_eq!(req.pagination.offset, 20);
        assert_eq!(req.pagination.limit, PAGE_LIMIT);
    }

    #[test]
    fn test_similar_requires_reference() {
        let mut req = SearchRequest::similar(Uuid::new_v4());
        assert!(req.validate().is_ok());
        req.reference_stack_id = None;
        assert!(matches!(req.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_unified_requires_query() {
        assert!(SearchRequest::unified("cat").validate().is_ok());
        assert!(SearchRequest::unified("   ").validate().is_err());
        let mut req = SearchRequest::unified("cat");
        req.query = None;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_filter() {
        let mut tags = RelationFilter::new();
        for _ in 0..=MAX_FILTER_ELEMENTS {
            tags = tags.any_of(Uuid::new_v4());
        }
        let req = SearchRequest::all().with_filter(StackFilter::new().with_tags(tags));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_color_threshold_range() {
        let filter = StackFilter::new().with_color(ColorFilter::similar(Hsl::new(0, 50, 50), 1.5));
        assert!(SearchRequest::all().with_filter(filter).validate().is_err());
    }

    #[test]
    fn test_validate_similarity_threshold_range() {
        let req = SearchRequest::similar(Uuid::new_v4())
            .with_similarity(SimilarityOptions::new().with_threshold(-0.1));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_similarity_options_overlay() {
        let base = SimilarityParams::default();
        let resolved = SimilarityOptions::new()
            .with_auto_min_overlap(1)
            .with_threshold(0.2)
            .resolve(&base);
        assert_eq!(resolved.auto_min_overlap, 1);
        assert_eq!(resolved.threshold, 0.2);
        assert_eq!(resolved.manual_max, base.manual_max);
    }

    #[test]
    fn test_pagination_clamp_and_slice() {
        let (p, clamped) = Pagination::new(0, PAGE_LIMIT_MAX + 1).clamped();
        assert!(clamped);
        assert_eq!(p.limit, PAGE_LIMIT_MAX);

        let items: Vec<u32> = (0..10).collect();
        assert_eq!(Pagination::new(8, 5).slice(&items), vec![8, 9]);
        assert!(Pagination::new(20, 5).slice(&items).is_empty());
    }

    #[test]
    fn test_scored_ids_retain() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut scored = ScoredIds::scored(vec![(a, 2.0), (b, 1.0)]);
        scored.retain(&HashSet::from([b]));
        assert_eq!(scored.ids, vec![b]);
        assert_eq!(scored.score(&a), None);
        assert_eq!(scored.score(&b), Some(1.0));
    }

    #[test]
    fn test_sort_field_parse() {
        assert_eq!("likes".parse::<SortField>().unwrap(), SortField::Likes);
        assert_eq!("created".parse::<SortField>().unwrap(), SortField::CreatedAt);
        assert!("random".parse::<SortField>().is_err());
    }
}
