//! Engine configuration.
//!
//! [`SearchConfig::default`] is built from `mosaic_core::defaults`.
//! [`SearchConfig::from_env`] overlays `MOSAIC_*` environment variables on
//! top of it. A variable that fails to parse keeps the default and logs a
//! warning.

use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use mosaic_core::defaults::{
    AUTO_TAG_PREDICT_THRESHOLD, DEFAULT_PRINCIPAL_ID, REQUEST_TIMEOUT_MS, SIMILAR_AUTO_WEIGHT,
    SIMILAR_MANUAL_BOOST, SIMILAR_MANUAL_WEIGHT, SIMILAR_MIN_IDF, TAG_STATS_TTL_SECS,
    UNIFIED_AUTHOR_WEIGHT, UNIFIED_AUTO_TAG_MIN_SCORE, UNIFIED_AUTO_TAG_WEIGHT,
    UNIFIED_MANUAL_TAG_WEIGHT,
};
use mosaic_core::{ColorDistanceMetric, SimilarityParams};

/// Per-tag value and IDF weighting used by weighted Jaccard scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Multiplier on an auto-tag confidence score.
    pub auto_weight: f64,
    /// Value contributed by the presence of a manual tag.
    pub manual_weight: f64,
    /// Floor for the IDF weight of any tag.
    pub min_idf: f64,
    /// Extra IDF multiplier when either side carries the tag manually.
    pub manual_boost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            auto_weight: SIMILAR_AUTO_WEIGHT,
            manual_weight: SIMILAR_MANUAL_WEIGHT,
            min_idf: SIMILAR_MIN_IDF,
            manual_boost: SIMILAR_MANUAL_BOOST,
        }
    }
}

/// Per-source relevance weights for free-text search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnifiedWeights {
    pub author: f64,
    pub auto_tag: f64,
    pub manual_tag: f64,
    /// Confidence floor for auto-tag matches.
    pub auto_tag_min_score: f32,
}

impl Default for UnifiedWeights {
    fn default() -> Self {
        Self {
            author: UNIFIED_AUTHOR_WEIGHT,
            auto_tag: UNIFIED_AUTO_TAG_WEIGHT,
            manual_tag: UNIFIED_MANUAL_TAG_WEIGHT,
            auto_tag_min_score: UNIFIED_AUTO_TAG_MIN_SCORE,
        }
    }
}

/// Everything the engine needs besides the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Base similarity parameters; requests may override them.
    pub similarity: SimilarityParams,
    pub scoring: ScoringWeights,
    pub unified: UnifiedWeights,
    /// Auto-tag scores below this are stale and never count as signal.
    pub auto_tag_predict_threshold: f32,
    /// How long cached document frequencies stay valid.
    pub tag_stats_ttl: Duration,
    /// Deadline for one search call.
    pub request_timeout: Duration,
    pub color_metric: ColorDistanceMetric,
    /// Principal whose favorites the favorite filter reads.
    pub principal_id: Uuid,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity: SimilarityParams::default(),
            scoring: ScoringWeights::default(),
            unified: UnifiedWeights::default(),
            auto_tag_predict_threshold: AUTO_TAG_PREDICT_THRESHOLD,
            tag_stats_ttl: Duration::from_secs(TAG_STATS_TTL_SECS),
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
            color_metric: ColorDistanceMetric::default(),
            principal_id: DEFAULT_PRINCIPAL_ID,
        }
    }
}

impl SearchConfig {
    /// Build from environment variables.
    ///
    /// Environment variables:
    /// - `MOSAIC_TAG_STATS_TTL_SECS`
    /// - `MOSAIC_REQUEST_TIMEOUT_MS`
    /// - `MOSAIC_COLOR_METRIC` (`linear` or `circular`)
    /// - `MOSAIC_AUTO_TAG_THRESHOLD`
    /// - `MOSAIC_PRINCIPAL_ID`
    /// - `MOSAIC_SIMILAR_AUTO_MIN_SCORE`, `MOSAIC_SIMILAR_AUTO_TOP_N`,
    ///   `MOSAIC_SIMILAR_MANUAL_MAX`, `MOSAIC_SIMILAR_PROBE_AUTO_TAGS`,
    ///   `MOSAIC_SIMILAR_AUTO_MIN_OVERLAP`, `MOSAIC_SIMILAR_MANUAL_MIN_OVERLAP`,
    ///   `MOSAIC_SIMILAR_CANDIDATE_LIMIT`, `MOSAIC_SIMILAR_THRESHOLD`,
    ///   `MOSAIC_SIMILAR_RESULT_LIMIT`
    /// - `MOSAIC_SIMILAR_AUTO_WEIGHT`, `MOSAIC_SIMILAR_MANUAL_WEIGHT`,
    ///   `MOSAIC_SIMILAR_MIN_IDF`, `MOSAIC_SIMILAR_MANUAL_BOOST`
    /// - `MOSAIC_UNIFIED_AUTHOR_WEIGHT`, `MOSAIC_UNIFIED_AUTO_TAG_WEIGHT`,
    ///   `MOSAIC_UNIFIED_MANUAL_TAG_WEIGHT`, `MOSAIC_UNIFIED_AUTO_TAG_MIN_SCORE`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` uses the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let var = |key: &str, default| parse_var(&lookup, key, default);
        let s = base.similarity;

        let similarity = SimilarityParams {
            auto_min_score: var_f32(&lookup, "MOSAIC_SIMILAR_AUTO_MIN_SCORE", s.auto_min_score),
            auto_top_n: var("MOSAIC_SIMILAR_AUTO_TOP_N", s.auto_top_n),
            manual_max: var("MOSAIC_SIMILAR_MANUAL_MAX", s.manual_max),
            probe_auto_tags: var("MOSAIC_SIMILAR_PROBE_AUTO_TAGS", s.probe_auto_tags),
            auto_min_overlap: var("MOSAIC_SIMILAR_AUTO_MIN_OVERLAP", s.auto_min_overlap),
            manual_min_overlap: var("MOSAIC_SIMILAR_MANUAL_MIN_OVERLAP", s.manual_min_overlap),
            candidate_limit: var("MOSAIC_SIMILAR_CANDIDATE_LIMIT", s.candidate_limit),
            threshold: parse_var(&lookup, "MOSAIC_SIMILAR_THRESHOLD", s.threshold),
            result_limit: var("MOSAIC_SIMILAR_RESULT_LIMIT", s.result_limit),
        };

        let scoring = ScoringWeights {
            auto_weight: parse_var(&lookup, "MOSAIC_SIMILAR_AUTO_WEIGHT", base.scoring.auto_weight),
            manual_weight: parse_var(
                &lookup,
                "MOSAIC_SIMILAR_MANUAL_WEIGHT",
                base.scoring.manual_weight,
            ),
            min_idf: parse_var(&lookup, "MOSAIC_SIMILAR_MIN_IDF", base.scoring.min_idf),
            manual_boost: parse_var(
                &lookup,
                "MOSAIC_SIMILAR_MANUAL_BOOST",
                base.scoring.manual_boost,
            ),
        };

        let unified = UnifiedWeights {
            author: parse_var(&lookup, "MOSAIC_UNIFIED_AUTHOR_WEIGHT", base.unified.author),
            auto_tag: parse_var(&lookup, "MOSAIC_UNIFIED_AUTO_TAG_WEIGHT", base.unified.auto_tag),
            manual_tag: parse_var(
                &lookup,
                "MOSAIC_UNIFIED_MANUAL_TAG_WEIGHT",
                base.unified.manual_tag,
            ),
            auto_tag_min_score: var_f32(
                &lookup,
                "MOSAIC_UNIFIED_AUTO_TAG_MIN_SCORE",
                base.unified.auto_tag_min_score,
            ),
        };

        let color_metric = match lookup("MOSAIC_COLOR_METRIC") {
            Some(val) => match val.trim().to_ascii_lowercase().as_str() {
                "linear" => ColorDistanceMetric::Linear,
                "circular" => ColorDistanceMetric::Circular,
                _ => {
                    tracing::warn!(value = %val, "Invalid MOSAIC_COLOR_METRIC, using default");
                    base.color_metric
                }
            },
            None => base.color_metric,
        };

        Self {
            similarity,
            scoring,
            unified,
            auto_tag_predict_threshold: var_f32(
                &lookup,
                "MOSAIC_AUTO_TAG_THRESHOLD",
                base.auto_tag_predict_threshold,
            ),
            tag_stats_ttl: Duration::from_secs(parse_var(
                &lookup,
                "MOSAIC_TAG_STATS_TTL_SECS",
                base.tag_stats_ttl.as_secs(),
            )),
            request_timeout: Duration::from_millis(parse_var(
                &lookup,
                "MOSAIC_REQUEST_TIMEOUT_MS",
                base.request_timeout.as_millis() as u64,
            )),
            color_metric,
            principal_id: parse_var(&lookup, "MOSAIC_PRINCIPAL_ID", base.principal_id),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tag_stats_ttl(mut self, ttl: Duration) -> Self {
        self.tag_stats_ttl = ttl;
        self
    }

    pub fn with_color_metric(mut self, metric: ColorDistanceMetric) -> Self {
        self.color_metric = metric;
        self
    }

    pub fn with_similarity(mut self, similarity: SimilarityParams) -> Self {
        self.similarity = similarity;
        self
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(val) => match val.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %val, "Invalid configuration value, using default");
                default
            }
        },
        None => default,
    }
}

/// Scores and thresholds must stay in `[0, 1]`.
fn var_f32<F>(lookup: &F, key: &str, default: f32) -> f32
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_var(lookup, key, default);
    if (0.0..=1.0).contains(&value) {
        value
    } else {
        tracing::warn!(key, value, "Score outside [0, 1], using default");
        default
    }
}
