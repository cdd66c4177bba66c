//! Tag similarity (SIMILAR mode).
//!
//! Each stack is reduced to a [`TagProfile`]: its top auto tags with their
//! confidence scores plus its manual tag set, both with stop tags removed.
//! Candidates come from cheap overlap probes against the store, and each
//! candidate is scored against the reference with an IDF-weighted
//! generalized Jaccard measure.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, trace};
use uuid::Uuid;

use mosaic_core::{
    normalize_tag, AutoTagVector, Error, OverlapQuery, Result, ScoredIds, SimilarityParams,
    StackIndex, StopTags, TagSource,
};

use crate::config::ScoringWeights;
use crate::tag_stats::TagStatistics;

/// IDF weight of a tag seen in `df` of `dataset_size` stacks.
///
/// `ln((N + 1) / (df + 1))`, floored at `min_idf`. Non-increasing in `df`.
pub fn idf_weight(dataset_size: i64, df: i64, min_idf: f64) -> f64 {
    let n = dataset_size.max(0) as f64;
    let df = df.max(0) as f64;
    ((n + 1.0) / (df + 1.0)).ln().max(min_idf)
}

/// The scoring signal of one stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagProfile {
    /// Auto tags by descending score.
    auto: Vec<(String, f64)>,
    manual: BTreeSet<String>,
}

impl TagProfile {
    /// Build from stored vectors.
    ///
    /// Auto tags below `min_score` and stop tags are dropped before the
    /// `auto_top_n` cut. Manual tags are normalized, stop-filtered, and
    /// capped at `manual_max`.
    pub fn build(
        auto: Option<&AutoTagVector>,
        manual: Option<&[String]>,
        stop_tags: &StopTags,
        min_score: f32,
        params: &SimilarityParams,
    ) -> Self {
        let auto: Vec<(String, f64)> = auto
            .map(|v| {
                v.entries()
                    .iter()
                    .filter(|(tag, score)| *score >= min_score && !stop_tags.contains(tag))
                    .take(params.auto_top_n)
                    .map(|(tag, score)| (tag.clone(), f64::from(*score)))
                    .collect()
            })
            .unwrap_or_default();

        let manual: BTreeSet<String> = manual
            .unwrap_or_default()
            .iter()
            .map(|t| normalize_tag(t))
            .filter(|t| !t.is_empty() && !stop_tags.contains(t))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .take(params.manual_max)
            .collect();

        Self { auto, manual }
    }

    /// Profile from raw parts, for scoring without a store.
    pub fn from_parts(auto: &[(&str, f64)], manual: &[&str]) -> Self {
        Self {
            auto: auto.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
            manual: manual.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.auto.is_empty() && self.manual.is_empty()
    }

    pub fn auto_tags(&self) -> impl Iterator<Item = &str> {
        self.auto.iter().map(|(t, _)| t.as_str())
    }

    pub fn manual_tags(&self) -> impl Iterator<Item = &str> {
        self.manual.iter().map(String::as_str)
    }

    fn auto_score(&self, tag: &str) -> f64 {
        self.auto
            .iter()
            .find(|(t, _)| t == tag)
            .map_or(0.0, |(_, s)| *s)
    }

    fn has_manual(&self, tag: &str) -> bool {
        self.manual.contains(tag)
    }
}

/// Dataset statistics the scorer reads.
#[derive(Debug, Clone, Default)]
pub struct DocumentFrequencies {
    pub dataset_size: i64,
    pub auto: HashMap<String, i64>,
    pub manual: HashMap<String, i64>,
}

impl DocumentFrequencies {
    /// Manual df when either side carries the tag manually, auto df
    /// otherwise. Missing entries count as 0.
    fn for_tag(&self, tag: &str, manual_signal: bool) -> i64 {
        let pool = if manual_signal { &self.manual } else { &self.auto };
        pool.get(tag).copied().unwrap_or(0)
    }
}

/// IDF-weighted generalized Jaccard similarity in `[0, 1]`.
///
/// Per tag, each side's value is `auto_weight * auto_score +
/// manual_weight * manual_presence`. The tag's weight is its IDF,
/// multiplied by `manual_boost` when either side has it as a manual tag.
/// The result is `Σ w·min / Σ w·max`, symmetric in its arguments, and 0
/// exactly when the profiles share no tag.
pub fn weighted_jaccard(
    reference: &TagProfile,
    candidate: &TagProfile,
    df: &DocumentFrequencies,
    weights: &ScoringWeights,
) -> f64 {
    let tags: BTreeSet<&str> = reference
        .auto_tags()
        .chain(reference.manual_tags())
        .chain(candidate.auto_tags())
        .chain(candidate.manual_tags())
        .collect();

    let value = |profile: &TagProfile, tag: &str| {
        weights.auto_weight * profile.auto_score(tag)
            + if profile.has_manual(tag) {
                weights.manual_weight
            } else {
                0.0
            }
    };

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for tag in tags {
        let manual_signal = reference.has_manual(tag) || candidate.has_manual(tag);
        let mut weight = idf_weight(df.dataset_size, df.for_tag(tag, manual_signal), weights.min_idf);
        if manual_signal {
            weight *= weights.manual_boost;
        }
        let (r, c) = (value(reference, tag), value(candidate, tag));
        numerator += weight * r.min(c);
        denominator += weight * r.max(c);
    }

    if denominator > 0.0 {
        (numerator / denominator).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// SIMILAR-mode candidate generation and scoring over one dataset.
pub struct TagSimilarity<'a> {
    index: &'a dyn StackIndex,
    stats: &'a TagStatistics,
    weights: ScoringWeights,
    predict_threshold: f32,
}

impl<'a> TagSimilarity<'a> {
    pub fn new(
        index: &'a dyn StackIndex,
        stats: &'a TagStatistics,
        weights: ScoringWeights,
        predict_threshold: f32,
    ) -> Self {
        Self {
            index,
            stats,
            weights,
            predict_threshold,
        }
    }

    /// Stacks similar to `reference`, best first, scored.
    ///
    /// The reference itself is never a candidate. A reference with no
    /// usable tags yields an empty result; a reference outside the
    /// dataset is [`Error::StackNotFound`].
    pub async fn find(
        &self,
        dataset_id: Uuid,
        reference: Uuid,
        params: &SimilarityParams,
    ) -> Result<ScoredIds> {
        let start = Instant::now();
        let min_score = params.auto_min_score.max(self.predict_threshold);
        let reference_ids = [reference];

        let (exists, settings, auto, manual) = tokio::try_join!(
            self.index.stack_exists(dataset_id, reference),
            self.index.stop_tag_settings(dataset_id),
            self.index.auto_tag_vectors(dataset_id, &reference_ids),
            self.index.manual_tag_sets(dataset_id, &reference_ids),
        )?;
        if !exists {
            return Err(Error::StackNotFound(reference));
        }

        let stop_tags = StopTags::from_settings(&settings);
        let reference_profile = TagProfile::build(
            auto.get(&reference),
            manual.get(&reference).map(Vec::as_slice),
            &stop_tags,
            min_score,
            params,
        );
        if reference_profile.is_empty() {
            debug!(stack_id = %reference, "Reference has no similarity signal");
            return Ok(ScoredIds::empty_scored());
        }

        let candidates = self
            .candidates(dataset_id, reference, &reference_profile, min_score, params)
            .await?;
        debug!(
            stack_id = %reference,
            candidate_count = candidates.len(),
            "Similarity candidates generated"
        );
        if candidates.is_empty() {
            return Ok(ScoredIds::empty_scored());
        }

        let (auto, manual) = tokio::try_join!(
            self.index.auto_tag_vectors(dataset_id, &candidates),
            self.index.manual_tag_sets(dataset_id, &candidates),
        )?;
        let profiles: Vec<(Uuid, TagProfile)> = candidates
            .iter()
            .map(|id| {
                let profile = TagProfile::build(
                    auto.get(id),
                    manual.get(id).map(Vec::as_slice),
                    &stop_tags,
                    min_score,
                    params,
                );
                (*id, profile)
            })
            .collect();

        let df = self
            .document_frequencies(dataset_id, &reference_profile, &profiles, min_score)
            .await?;

        let mut scored: Vec<(Uuid, f64)> = profiles
            .iter()
            .filter_map(|(id, profile)| {
                let score = weighted_jaccard(&reference_profile, profile, &df, &self.weights);
                trace!(stack_id = %id, score, "Candidate scored");
                (score > 0.0 && score >= params.threshold).then_some((*id, score))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(params.result_limit);

        debug!(
            stack_id = %reference,
            candidate_count = profiles.len(),
            result_count = scored.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Similarity scoring complete"
        );
        Ok(ScoredIds::scored(scored))
    }

    /// Union of the auto and manual overlap probes, auto hits first.
    async fn candidates(
        &self,
        dataset_id: Uuid,
        reference: Uuid,
        profile: &TagProfile,
        min_score: f32,
        params: &SimilarityParams,
    ) -> Result<Vec<Uuid>> {
        let auto_query = OverlapQuery {
            dataset_id,
            exclude_stack_id: reference,
            tags: profile
                .auto_tags()
                .take(params.probe_auto_tags)
                .map(str::to_string)
                .collect(),
            source: TagSource::Auto { min_score },
            min_overlap: params.auto_min_overlap,
            limit: params.candidate_limit,
        };
        let manual_query = OverlapQuery {
            tags: profile.manual_tags().map(str::to_string).collect(),
            source: TagSource::Manual,
            min_overlap: params.manual_min_overlap,
            ..auto_query.clone()
        };

        let (auto_hits, manual_hits) = tokio::try_join!(
            self.index.overlap_candidates(&auto_query),
            self.index.overlap_candidates(&manual_query),
        )?;

        let mut seen = HashSet::with_capacity(auto_hits.len() + manual_hits.len());
        Ok(auto_hits
            .into_iter()
            .chain(manual_hits)
            .filter(|id| *id != reference && seen.insert(*id))
            .collect())
    }

    async fn document_frequencies(
        &self,
        dataset_id: Uuid,
        reference: &TagProfile,
        candidates: &[(Uuid, TagProfile)],
        min_score: f32,
    ) -> Result<DocumentFrequencies> {
        let profiles = || std::iter::once(reference).chain(candidates.iter().map(|(_, p)| p));
        let auto_pool: Vec<String> = profiles()
            .flat_map(TagProfile::auto_tags)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let manual_pool: Vec<String> = profiles()
            .flat_map(TagProfile::manual_tags)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let (dataset_size, auto, manual) = tokio::try_join!(
            self.stats.dataset_item_count(dataset_id),
            self.stats
                .auto_tag_document_frequency(dataset_id, &auto_pool, min_score),
            self.stats
                .manual_tag_document_frequency(dataset_id, &manual_pool),
        )?;
        Ok(DocumentFrequencies {
            dataset_size,
            auto,
            manual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn df(size: i64, auto: &[(&str, i64)], manual: &[(&str, i64)]) -> DocumentFrequencies {
        DocumentFrequencies {
            dataset_size: size,
            auto: auto.iter().map(|(t, n)| (t.to_string(), *n)).collect(),
            manual: manual.iter().map(|(t, n)| (t.to_string(), *n)).collect(),
        }
    }

    #[test]
    fn test_idf_non_increasing_in_df() {
        let mut previous = f64::INFINITY;
        for n in 0..=100 {
            let w = idf_weight(100, n, 0.1);
            assert!(w <= previous);
            previous = w;
        }
    }

    #[test]
    fn test_idf_floor() {
        assert_eq!(idf_weight(10, 10, 0.1), 0.1);
        assert!((idf_weight(9, 0, 0.1) - 10f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_identical_profiles_score_one() {
        let a = TagProfile::from_parts(&[("cat", 0.9), ("sky", 0.6)], &["cat"]);
        let score = weighted_jaccard(&a, &a.clone(), &df(10, &[], &[]), &ScoringWeights::default());
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_profiles_score_zero() {
        let a = TagProfile::from_parts(&[("cat", 0.9)], &["red"]);
        let b = TagProfile::from_parts(&[("dog", 0.9)], &["blue"]);
        assert_eq!(
            weighted_jaccard(&a, &b, &df(10, &[], &[]), &ScoringWeights::default()),
            0.0
        );
    }

    #[test]
    fn test_symmetric_and_bounded() {
        let a = TagProfile::from_parts(&[("cat", 0.9), ("sky", 0.6)], &["red"]);
        let b = TagProfile::from_parts(&[("cat", 0.5), ("tree", 0.8)], &["red", "blue"]);
        let stats = df(50, &[("cat", 20), ("sky", 3)], &[("red", 5)]);
        let weights = ScoringWeights::default();
        let ab = weighted_jaccard(&a, &b, &stats, &weights);
        let ba = weighted_jaccard(&b, &a, &stats, &weights);
        assert!((ab - ba).abs() < 1e-12);
        assert!(ab > 0.0 && ab < 1.0);
    }

    #[test]
    fn test_rare_shared_tag_beats_common_shared_tag() {
        let reference = TagProfile::from_parts(&[("1girl", 0.9), ("lighthouse", 0.9)], &[]);
        let common = TagProfile::from_parts(&[("1girl", 0.9), ("forest", 0.9)], &[]);
        let rare = TagProfile::from_parts(&[("lighthouse", 0.9), ("forest", 0.9)], &[]);
        let stats = df(1000, &[("1girl", 900), ("lighthouse", 3), ("forest", 50)], &[]);
        let weights = ScoringWeights::default();
        assert!(
            weighted_jaccard(&reference, &rare, &stats, &weights)
                > weighted_jaccard(&reference, &common, &stats, &weights)
        );
    }

    #[test]
    fn test_manual_signal_uses_manual_frequency() {
        // "cat" is universal among auto tags but rare as a manual tag.
        let a = TagProfile::from_parts(&[("dog", 0.8)], &["cat"]);
        let b = TagProfile::from_parts(&[("dog", 0.8)], &["cat"]);
        let c = TagProfile::from_parts(&[("dog", 0.8)], &[]);
        let stats = df(100, &[("cat", 100), ("dog", 10)], &[("cat", 1)]);
        let weights = ScoringWeights::default();
        assert!(weighted_jaccard(&a, &b, &stats, &weights) > weighted_jaccard(&a, &c, &stats, &weights));
    }

    #[test]
    fn test_profile_drops_stop_tags_and_low_scores() {
        let vector = AutoTagVector::new(vec![
            ("highres".to_string(), 0.99),
            ("cat".to_string(), 0.9),
            ("blur".to_string(), 0.45),
        ]);
        let manual = vec!["Watermark".to_string(), " Red ".to_string()];
        let profile = TagProfile::build(
            Some(&vector),
            Some(manual.as_slice()),
            &StopTags::default(),
            0.5,
            &SimilarityParams::default(),
        );
        assert_eq!(profile.auto_tags().collect::<Vec<_>>(), vec!["cat"]);
        assert_eq!(profile.manual_tags().collect::<Vec<_>>(), vec!["red"]);
    }

    #[test]
    fn test_profile_caps() {
        let vector = AutoTagVector::new(vec![
            ("a".to_string(), 0.9),
            ("b".to_string(), 0.8),
            ("c".to_string(), 0.7),
        ]);
        let manual: Vec<String> = ["x", "y", "z"].iter().map(|t| t.to_string()).collect();
        let params = SimilarityParams {
            auto_top_n: 2,
            manual_max: 1,
            ..SimilarityParams::default()
        };
        let profile = TagProfile::build(
            Some(&vector),
            Some(manual.as_slice()),
            &StopTags::default(),
            0.5,
            &params,
        );
        assert_eq!(profile.auto_tags().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(profile.manual_tags().count(), 1);
    }

    #[test]
    fn test_empty_profile() {
        let profile = TagProfile::build(None, None, &StopTags::default(), 0.5, &SimilarityParams::default());
        assert!(profile.is_empty());
    }
}
