//! Store traits the search engine runs against.
//!
//! Every method takes the dataset ID explicitly and must never return a
//! stack from another dataset. The PostgreSQL store and the in-memory index
//! both implement these; the engine only sees [`StackIndex`].

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::filter::FilterPredicate;
use crate::models::StackSummary;
use crate::search::{SortField, SortOrder};
use crate::stop_tags::StopTagSettings;
use crate::tags::AutoTagVector;

// =============================================================================
// TAG STATISTICS
// =============================================================================

/// Dataset-wide counts used for IDF weighting.
#[async_trait]
pub trait TagStatsRepository: Send + Sync {
    /// Number of stacks in the dataset.
    async fn stack_count(&self, dataset_id: Uuid) -> Result<i64>;

    /// Per tag, the number of stacks whose auto-tag vector holds it at or
    /// above `min_score`. Tags with no stacks may be omitted.
    async fn auto_tag_document_frequency(
        &self,
        dataset_id: Uuid,
        tags: &[String],
        min_score: f32,
    ) -> Result<HashMap<String, i64>>;

    /// Per tag, the number of stacks carrying it as a manual tag.
    async fn manual_tag_document_frequency(
        &self,
        dataset_id: Uuid,
        tags: &[String],
    ) -> Result<HashMap<String, i64>>;
}

// =============================================================================
// TAG VECTORS
// =============================================================================

/// Which tag signal a query runs against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TagSource {
    /// Automatic tags with confidence at or above `min_score`.
    Auto { min_score: f32 },
    /// Manual tags.
    Manual,
}

/// Find stacks sharing tags with a reference.
#[derive(Debug, Clone)]
pub struct OverlapQuery {
    pub dataset_id: Uuid,
    /// The reference itself; never returned.
    pub exclude_stack_id: Uuid,
    /// Normalized tag keys to probe.
    pub tags: Vec<String>,
    pub source: TagSource,
    /// Minimum number of probe tags a candidate must share.
    pub min_overlap: usize,
    /// Candidates with the most shared tags are kept first.
    pub limit: usize,
}

#[async_trait]
pub trait TagVectorRepository: Send + Sync {
    /// Stop-tag opt-ins configured on the dataset.
    async fn stop_tag_settings(&self, dataset_id: Uuid) -> Result<StopTagSettings>;

    /// Auto-tag vectors of the given stacks. Stacks without one are absent.
    async fn auto_tag_vectors(
        &self,
        dataset_id: Uuid,
        stack_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, AutoTagVector>>;

    /// Normalized manual tag titles of the given stacks.
    async fn manual_tag_sets(
        &self,
        dataset_id: Uuid,
        stack_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>>;

    /// Candidate stacks for similarity scoring.
    async fn overlap_candidates(&self, query: &OverlapQuery) -> Result<Vec<Uuid>>;
}

// =============================================================================
// TEXT MATCHING
// =============================================================================

/// Case-insensitive substring lookups used by unified search.
///
/// `needle` is the raw token; implementations handle escaping.
#[async_trait]
pub trait TextMatchRepository: Send + Sync {
    /// Stacks whose author name contains `needle`.
    async fn stacks_by_author_name(&self, dataset_id: Uuid, needle: &str) -> Result<Vec<Uuid>>;

    /// Stacks with a manual tag whose title contains `needle`.
    async fn stacks_by_manual_tag(&self, dataset_id: Uuid, needle: &str) -> Result<Vec<Uuid>>;

    /// Stacks with an auto tag at or above `min_score` whose key or display
    /// name contains `needle`.
    async fn stacks_by_auto_tag(
        &self,
        dataset_id: Uuid,
        needle: &str,
        min_score: f32,
    ) -> Result<Vec<Uuid>>;
}

// =============================================================================
// STACK FILTERING
// =============================================================================

#[async_trait]
pub trait StackFilterRepository: Send + Sync {
    /// Whether `stack_id` exists in the dataset.
    async fn stack_exists(&self, dataset_id: Uuid, stack_id: Uuid) -> Result<bool>;

    /// Every stack ID in the dataset.
    async fn all_stack_ids(&self, dataset_id: Uuid) -> Result<Vec<Uuid>>;

    /// Stacks in the dataset satisfying one predicate.
    async fn resolve_predicate(
        &self,
        dataset_id: Uuid,
        predicate: &FilterPredicate,
    ) -> Result<Vec<Uuid>>;

    /// Order `ids` by a stored field. IDs outside the dataset are dropped.
    ///
    /// `SortField::Recommended` has no stored field and orders newest first.
    /// Ties are broken by ID so paging is stable.
    async fn order_stacks(
        &self,
        dataset_id: Uuid,
        ids: &[Uuid],
        sort: SortField,
        order: SortOrder,
    ) -> Result<Vec<Uuid>>;

    /// Full records for `ids`, in the order given.
    async fn fetch_summaries(
        &self,
        dataset_id: Uuid,
        ids: &[Uuid],
        principal_id: Uuid,
    ) -> Result<Vec<StackSummary>>;
}

/// Everything the engine needs from a store.
pub trait StackIndex:
    TagStatsRepository + TagVectorRepository + TextMatchRepository + StackFilterRepository
{
}

impl<T> StackIndex for T where
    T: TagStatsRepository + TagVectorRepository + TextMatchRepository + StackFilterRepository
{
}
