//! Free-text search (UNIFIED mode).
//!
//! A query is split into positive and negative tokens. Every token is
//! matched against three sources: author names, manual tag titles, and
//! auto-tag keys or display names. Positive tokens are ANDed and their
//! per-source weights summed into a relevance score; negative tokens
//! remove their matches afterwards.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use futures::future::try_join_all;
use tracing::debug;
use uuid::Uuid;

use mosaic_core::{Error, Result, ScoredIds, StackIndex};

use crate::config::UnifiedWeights;

/// Full-width space, treated as a separator.
const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// A query split into required and excluded terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTokens {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

impl QueryTokens {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len()
    }
}

/// Split a query on whitespace. `-term` excludes `term`; a bare `-` is
/// ignored. Tokens are lowercased and deduplicated in order.
pub fn tokenize(query: &str) -> QueryTokens {
    let normalized = query.replace(IDEOGRAPHIC_SPACE, " ");
    let mut tokens = QueryTokens::default();
    for raw in normalized.split_whitespace() {
        let (bucket, term) = match raw.strip_prefix('-') {
            Some(term) => (&mut tokens.negative, term),
            None => (&mut tokens.positive, raw),
        };
        let term = term.to_lowercase();
        if !term.is_empty() && !bucket.contains(&term) {
            bucket.push(term);
        }
    }
    tokens
}

/// Stacks matched by one token, each with the best weight of the sources
/// that matched it.
pub fn token_hits(
    author: &[Uuid],
    auto_tag: &[Uuid],
    manual_tag: &[Uuid],
    weights: &UnifiedWeights,
) -> HashMap<Uuid, f64> {
    let mut hits: HashMap<Uuid, f64> = HashMap::new();
    for (ids, weight) in [
        (author, weights.author),
        (auto_tag, weights.auto_tag),
        (manual_tag, weights.manual_tag),
    ] {
        for id in ids {
            let slot = hits.entry(*id).or_insert(weight);
            if weight > *slot {
                *slot = weight;
            }
        }
    }
    hits
}

/// Intersect positive token hits, summing weights, then drop `negative`.
///
/// Stops at the first empty intersection. With no positive tokens,
/// `universe` minus `negative` is returned with every score 0. Output is
/// ordered by score descending, then stack ID.
pub fn combine_tokens(
    positive: Vec<HashMap<Uuid, f64>>,
    negative: &HashSet<Uuid>,
    universe: &[Uuid],
) -> ScoredIds {
    let mut tokens = positive.into_iter();
    let Some(mut combined) = tokens.next() else {
        return ScoredIds::scored(
            universe
                .iter()
                .filter(|id| !negative.contains(id))
                .map(|id| (*id, 0.0))
                .collect(),
        );
    };

    for hits in tokens {
        if combined.is_empty() {
            break;
        }
        combined.retain(|id, _| hits.contains_key(id));
        for (id, score) in combined.iter_mut() {
            *score += hits.get(id).copied().unwrap_or(0.0);
        }
    }
    combined.retain(|id, _| !negative.contains(id));

    let mut ranked: Vec<(Uuid, f64)> = combined.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ScoredIds::scored(ranked)
}

/// UNIFIED-mode search over one dataset.
pub struct UnifiedSearch<'a> {
    index: &'a dyn StackIndex,
    weights: UnifiedWeights,
}

impl<'a> UnifiedSearch<'a> {
    pub fn new(index: &'a dyn StackIndex, weights: UnifiedWeights) -> Self {
        Self { index, weights }
    }

    /// Scored stacks matching `query`.
    pub async fn search(&self, dataset_id: Uuid, query: &str) -> Result<ScoredIds> {
        let start = Instant::now();
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Err(Error::InvalidRequest(
                "query has no searchable terms".to_string(),
            ));
        }
        debug!(
            token_count = tokens.len(),
            positive = tokens.positive.len(),
            negative = tokens.negative.len(),
            "Query tokenized"
        );

        let positive = try_join_all(
            tokens
                .positive
                .iter()
                .map(|token| self.match_token(dataset_id, token)),
        )
        .await?;

        let survivors = positive
            .iter()
            .map(HashMap::len)
            .min()
            .unwrap_or(usize::MAX);
        if survivors == 0 {
            debug!("A positive token matched nothing");
            return Ok(ScoredIds::empty_scored());
        }

        let negative: HashSet<Uuid> = try_join_all(
            tokens
                .negative
                .iter()
                .map(|token| self.match_token(dataset_id, token)),
        )
        .await?
        .into_iter()
        .flat_map(HashMap::into_keys)
        .collect();

        let universe = if positive.is_empty() {
            self.index.all_stack_ids(dataset_id).await?
        } else {
            Vec::new()
        };

        let result = combine_tokens(positive, &negative, &universe);
        debug!(
            result_count = result.len(),
            excluded = negative.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Unified search combined"
        );
        Ok(result)
    }

    async fn match_token(&self, dataset_id: Uuid, token: &str) -> Result<HashMap<Uuid, f64>> {
        let (author, auto_tag, manual_tag) = tokio::try_join!(
            self.index.stacks_by_author_name(dataset_id, token),
            self.index
                .stacks_by_auto_tag(dataset_id, token, self.weights.auto_tag_min_score),
            self.index.stacks_by_manual_tag(dataset_id, token),
        )?;
        Ok(token_hits(&author, &auto_tag, &manual_tag, &self.weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn hits(entries: &[(u128, f64)]) -> HashMap<Uuid, f64> {
        entries.iter().map(|(n, w)| (id(*n), *w)).collect()
    }

    #[test]
    fn test_tokenize_splits_positive_and_negative() {
        let tokens = tokenize("  Cat -blue  red ");
        assert_eq!(tokens.positive, vec!["cat", "red"]);
        assert_eq!(tokens.negative, vec!["blue"]);
    }

    #[test]
    fn test_tokenize_full_width_space() {
        let tokens = tokenize("猫\u{3000}-犬");
        assert_eq!(tokens.positive, vec!["猫"]);
        assert_eq!(tokens.negative, vec!["犬"]);
    }

    #[test]
    fn test_tokenize_ignores_bare_dash_and_duplicates() {
        let tokens = tokenize("cat - CAT -dog -dog");
        assert_eq!(tokens.positive, vec!["cat"]);
        assert_eq!(tokens.negative, vec!["dog"]);
        assert!(tokenize(" - ").is_empty());
    }

    #[test]
    fn test_token_hits_take_max_weight() {
        let weights = UnifiedWeights::default();
        let h = token_hits(&[id(1)], &[id(1), id(2)], &[id(2), id(3)], &weights);
        assert_eq!(h[&id(1)], weights.author);
        assert_eq!(h[&id(2)], weights.auto_tag);
        assert_eq!(h[&id(3)], weights.manual_tag);
    }

    #[test]
    fn test_combine_intersects_and_sums() {
        let result = combine_tokens(
            vec![hits(&[(1, 1.0), (2, 3.0)]), hits(&[(1, 2.0), (3, 1.0)])],
            &HashSet::new(),
            &[],
        );
        assert_eq!(result.ids, vec![id(1)]);
        assert_eq!(result.score(&id(1)), Some(3.0));
    }

    #[test]
    fn test_combine_subtracts_negatives() {
        let negative: HashSet<Uuid> = [id(2)].into_iter().collect();
        let result = combine_tokens(vec![hits(&[(1, 1.0), (2, 3.0)])], &negative, &[]);
        assert_eq!(result.ids, vec![id(1)]);
    }

    #[test]
    fn test_combine_orders_by_score() {
        let result = combine_tokens(
            vec![hits(&[(1, 1.0), (2, 3.0), (3, 3.0)])],
            &HashSet::new(),
            &[],
        );
        assert_eq!(result.ids, vec![id(2), id(3), id(1)]);
    }

    #[test]
    fn test_combine_empty_intersection() {
        let result = combine_tokens(
            vec![hits(&[(1, 1.0)]), hits(&[(2, 1.0)]), hits(&[(1, 1.0)])],
            &HashSet::new(),
            &[],
        );
        assert!(result.is_empty());
        assert!(result.scores.is_some());
    }

    #[test]
    fn test_combine_negatives_only_uses_universe() {
        let negative: HashSet<Uuid> = [id(2)].into_iter().collect();
        let result = combine_tokens(Vec::new(), &negative, &[id(3), id(2), id(1)]);
        assert_eq!(result.ids, vec![id(3), id(1)]);
        assert_eq!(result.score(&id(3)), Some(0.0));
    }
}
