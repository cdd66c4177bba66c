//! Filter composition, ordering, and pagination.
//!
//! The composer narrows a candidate set by every attribute filter in the
//! request, orders what remains, and cuts one page out of it. Each filter
//! dimension is resolved by the store independently and the resulting ID
//! sets are intersected.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use futures::future::try_join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use mosaic_core::{
    ColorDistanceMetric, FilterPredicate, Pagination, Result, ScoredIds, SearchPage, SortField,
    SortOrder, StackFilter, StackIndex,
};

/// Reduces candidates to one ordered page.
pub struct FilterComposer<'a> {
    index: &'a dyn StackIndex,
    principal_id: Uuid,
    color_metric: ColorDistanceMetric,
}

impl<'a> FilterComposer<'a> {
    pub fn new(
        index: &'a dyn StackIndex,
        principal_id: Uuid,
        color_metric: ColorDistanceMetric,
    ) -> Self {
        Self {
            index,
            principal_id,
            color_metric,
        }
    }

    /// Filter, order, and paginate.
    ///
    /// `candidates` of `None` means every stack in the dataset. `total` on
    /// the returned page counts the filtered set before pagination.
    pub async fn compose(
        &self,
        dataset_id: Uuid,
        candidates: Option<ScoredIds>,
        filter: &StackFilter,
        sort: SortField,
        order: SortOrder,
        pagination: Pagination,
    ) -> Result<SearchPage> {
        let start = Instant::now();
        let (pagination, clamped) = pagination.clamped();
        if clamped {
            warn!(
                limit = pagination.limit,
                "Requested page limit exceeds maximum, clamped"
            );
        }

        if let Some(empty) = candidates.as_ref().filter(|c| c.is_empty()) {
            debug!("No candidates to filter");
            return Ok(SearchPage {
                scores: empty.scores.as_ref().map(|_| HashMap::new()),
                ..SearchPage::empty(pagination)
            });
        }

        let predicates = filter.predicates(self.principal_id, self.color_metric);
        let allowed = self.resolve(dataset_id, &predicates).await?;

        let working = match (candidates, allowed) {
            (Some(mut candidates), Some(allowed)) => {
                candidates.retain(&allowed);
                candidates
            }
            (Some(candidates), None) => candidates,
            (None, Some(allowed)) => ScoredIds::unscored(allowed.into_iter().collect()),
            (None, None) => ScoredIds::unscored(self.index.all_stack_ids(dataset_id).await?),
        };
        debug!(
            predicate_count = predicates.len(),
            candidate_count = working.len(),
            "Filters applied"
        );

        if working.is_empty() {
            return Ok(SearchPage {
                scores: working.scores.map(|_| HashMap::new()),
                ..SearchPage::empty(pagination)
            });
        }

        let ordered = self.order(dataset_id, &working, sort, order).await?;
        let items = pagination.slice(&ordered);
        let scores: Option<HashMap<Uuid, f64>> = working.scores.as_ref().map(|scores| {
            items
                .iter()
                .filter_map(|id| scores.get(id).map(|s| (*id, *s)))
                .collect()
        });

        debug!(
            total = ordered.len(),
            result_count = items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Page composed"
        );
        Ok(SearchPage {
            items,
            total: ordered.len(),
            limit: pagination.limit,
            offset: pagination.offset,
            scores,
        })
    }

    /// Intersection of every predicate's matches, or `None` with no
    /// predicates.
    async fn resolve(
        &self,
        dataset_id: Uuid,
        predicates: &[FilterPredicate],
    ) -> Result<Option<HashSet<Uuid>>> {
        if predicates.is_empty() {
            return Ok(None);
        }
        let sets = try_join_all(
            predicates
                .iter()
                .map(|p| self.index.resolve_predicate(dataset_id, p)),
        )
        .await?;

        let mut sets = sets.into_iter();
        let mut allowed: HashSet<Uuid> = sets.next().unwrap_or_default().into_iter().collect();
        for set in sets {
            if allowed.is_empty() {
                break;
            }
            let set: HashSet<Uuid> = set.into_iter().collect();
            allowed.retain(|id| set.contains(id));
        }
        Ok(Some(allowed))
    }

    /// Score order for `recommended` on ranked candidates, field order
    /// otherwise. Score ties keep the newest-first order.
    async fn order(
        &self,
        dataset_id: Uuid,
        working: &ScoredIds,
        sort: SortField,
        order: SortOrder,
    ) -> Result<Vec<Uuid>> {
        match (&working.scores, sort) {
            (Some(scores), SortField::Recommended) => {
                let mut ids = self
                    .index
                    .order_stacks(dataset_id, &working.ids, SortField::Recommended, order)
                    .await?;
                ids.sort_by(|a, b| {
                    let (sa, sb) = (
                        scores.get(a).copied().unwrap_or(0.0),
                        scores.get(b).copied().unwrap_or(0.0),
                    );
                    let by_score = sa.partial_cmp(&sb).unwrap_or(Ordering::Equal);
                    match order {
                        SortOrder::Asc => by_score,
                        SortOrder::Desc => by_score.reverse(),
                    }
                });
                Ok(ids)
            }
            _ => {
                self.index
                    .order_stacks(dataset_id, &working.ids, sort, order)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryStackIndex, NewStack};
    use mosaic_core::defaults::{DEFAULT_PRINCIPAL_ID, PAGE_LIMIT_MAX};

    fn composer(index: &InMemoryStackIndex) -> FilterComposer<'_> {
        FilterComposer::new(index, DEFAULT_PRINCIPAL_ID, ColorDistanceMetric::Circular)
    }

    #[tokio::test]
    async fn test_all_stacks_newest_first() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let old = index.add_stack(dataset, NewStack::new("old"));
        let new = index.add_stack(dataset, NewStack::new("new"));

        let page = composer(&index)
            .compose(
                dataset,
                None,
                &StackFilter::new(),
                SortField::Recommended,
                SortOrder::Desc,
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.items, vec![new, old]);
        assert_eq!(page.total, 2);
        assert!(page.scores.is_none());
    }

    #[tokio::test]
    async fn test_score_order_with_recency_tiebreak() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let a = index.add_stack(dataset, NewStack::new("a"));
        let b = index.add_stack(dataset, NewStack::new("b"));
        let c = index.add_stack(dataset, NewStack::new("c"));
        let candidates = ScoredIds::scored(vec![(a, 2.0), (b, 1.0), (c, 2.0)]);

        let page = composer(&index)
            .compose(
                dataset,
                Some(candidates.clone()),
                &StackFilter::new(),
                SortField::Recommended,
                SortOrder::Desc,
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.items, vec![c, a, b]);
        assert_eq!(page.scores.unwrap()[&b], 1.0);

        let ascending = composer(&index)
            .compose(
                dataset,
                Some(candidates),
                &StackFilter::new(),
                SortField::Recommended,
                SortOrder::Asc,
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(ascending.items[0], b);
    }

    #[tokio::test]
    async fn test_field_sort_ignores_scores() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let zed = index.add_stack(dataset, NewStack::new("zed"));
        let amy = index.add_stack(dataset, NewStack::new("amy"));
        let candidates = ScoredIds::scored(vec![(zed, 5.0), (amy, 1.0)]);

        let page = composer(&index)
            .compose(
                dataset,
                Some(candidates),
                &StackFilter::new(),
                SortField::Name,
                SortOrder::Asc,
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.items, vec![amy, zed]);
    }

    #[tokio::test]
    async fn test_filters_intersect_candidates() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let liked = index.add_stack(dataset, NewStack::new("liked").likes(3));
        let plain = index.add_stack(dataset, NewStack::new("plain"));
        let candidates = ScoredIds::scored(vec![(liked, 1.0), (plain, 1.0)]);

        let page = composer(&index)
            .compose(
                dataset,
                Some(candidates),
                &StackFilter::new().with_liked(true),
                SortField::Recommended,
                SortOrder::Desc,
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.items, vec![liked]);
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_empty_candidates_short_circuit() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        index.add_stack(dataset, NewStack::new("a"));

        let page = composer(&index)
            .compose(
                dataset,
                Some(ScoredIds::empty_scored()),
                &StackFilter::new().with_liked(true),
                SortField::Recommended,
                SortOrder::Desc,
                Pagination::default(),
            )
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        index.add_stack(dataset, NewStack::new("a"));

        let page = composer(&index)
            .compose(
                dataset,
                None,
                &StackFilter::new(),
                SortField::Recommended,
                SortOrder::Desc,
                Pagination::new(0, PAGE_LIMIT_MAX + 1),
            )
            .await
            .unwrap();
        assert_eq!(page.limit, PAGE_LIMIT_MAX);
        assert_eq!(page.items.len(), 1);
    }
}
