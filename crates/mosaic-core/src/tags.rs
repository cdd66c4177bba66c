//! Automatic tag vectors and their aggregation from asset predictions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::AUTO_TAG_TOP_N;

/// Normalize a tag for comparison: trimmed and lowercased.
///
/// Manual tag titles and automatic tag keys share one namespace after
/// normalization, so a manual "Cat" and a predicted "cat" are the same tag.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Ranked `(tag key, confidence)` pairs for one item, highest score first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutoTagVector(Vec<(String, f32)>);

impl AutoTagVector {
    /// Build a vector, normalizing keys and sorting by score descending
    /// (ties broken by key so ordering is deterministic).
    pub fn new(entries: impl IntoIterator<Item = (String, f32)>) -> Self {
        let mut best: HashMap<String, f32> = HashMap::new();
        for (tag, score) in entries {
            let key = normalize_tag(&tag);
            if key.is_empty() || !score.is_finite() {
                continue;
            }
            let slot = best.entry(key).or_insert(score);
            if score > *slot {
                *slot = score;
            }
        }
        let mut entries: Vec<(String, f32)> = best.into_iter().collect();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Self(entries)
    }

    /// Entries at or above `min_score`, at most `top_n`.
    pub fn top(&self, min_score: f32, top_n: usize) -> impl Iterator<Item = &(String, f32)> {
        self.0
            .iter()
            .filter(move |(_, score)| *score >= min_score)
            .take(top_n)
    }

    pub fn entries(&self) -> &[(String, f32)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Score for a tag, if present.
    pub fn score(&self, tag: &str) -> Option<f32> {
        let key = normalize_tag(tag);
        self.0.iter().find(|(t, _)| *t == key).map(|(_, s)| *s)
    }
}

/// Merge per-asset predictions into one item-level vector.
///
/// Takes the maximum score per tag across assets, drops anything below
/// `threshold`, and keeps the `top_n` best.
pub fn aggregate_predictions<'a, I>(assets: I, threshold: f32, top_n: usize) -> AutoTagVector
where
    I: IntoIterator<Item = &'a [(String, f32)]>,
{
    let merged = assets
        .into_iter()
        .flat_map(|predictions| predictions.iter().cloned())
        .filter(|(_, score)| *score >= threshold);
    let mut vector = AutoTagVector::new(merged);
    vector.0.truncate(top_n);
    vector
}

/// Reply from the automatic tagging service for one image.
///
/// `predicted_tags` lists the labels at or above `threshold`; `scores`
/// carries the raw confidence for every label the model knows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggerPrediction {
    #[serde(rename = "predicted_tags", alias = "tags")]
    pub predicted_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_count: Option<usize>,
    pub threshold: f32,
    #[serde(default)]
    pub scores: HashMap<String, f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
}

impl TaggerPrediction {
    /// Predictions for the reported tags, paired with their scores.
    ///
    /// Tags missing from `scores` are skipped rather than assumed confident.
    pub fn predictions(&self) -> Vec<(String, f32)> {
        self.predicted_tags
            .iter()
            .filter_map(|tag| self.scores.get(tag).map(|score| (tag.clone(), *score)))
            .filter(|(_, score)| *score >= self.threshold)
            .collect()
    }

    /// Item-level vector for a single-image reply, capped at
    /// [`AUTO_TAG_TOP_N`] entries.
    pub fn to_vector(&self) -> AutoTagVector {
        let predictions = self.predictions();
        aggregate_predictions([predictions.as_slice()], self.threshold, AUTO_TAG_TOP_N)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preds(items: &[(&str, f32)]) -> Vec<(String, f32)> {
        items.iter().map(|(t, s)| (t.to_string(), *s)).collect()
    }

    #[test]
    fn test_vector_sorted_and_normalized() {
        let v = AutoTagVector::new(preds(&[("Cat", 0.6), ("sky", 0.9), ("cat", 0.7)]));
        assert_eq!(v.entries(), &preds(&[("sky", 0.9), ("cat", 0.7)])[..]);
        assert_eq!(v.score("CAT"), Some(0.7));
    }

    #[test]
    fn test_vector_ties_break_by_key() {
        let v = AutoTagVector::new(preds(&[("b", 0.5), ("a", 0.5)]));
        assert_eq!(v.entries()[0].0, "a");
    }

    #[test]
    fn test_top_applies_cutoff_and_limit() {
        let v = AutoTagVector::new(preds(&[("a", 0.9), ("b", 0.8), ("c", 0.3)]));
        let top: Vec<_> = v.top(0.5, 1).collect();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, "a");
        assert_eq!(v.top(0.5, 10).count(), 2);
    }

    #[test]
    fn test_aggregate_takes_max_across_assets() {
        let page1 = preds(&[("cat", 0.5), ("dog", 0.45)]);
        let page2 = preds(&[("cat", 0.8), ("tree", 0.2)]);
        let v = aggregate_predictions([page1.as_slice(), page2.as_slice()], 0.4, 10);
        assert_eq!(v.entries(), &preds(&[("cat", 0.8), ("dog", 0.45)])[..]);
    }

    #[test]
    fn test_aggregate_truncates_to_top_n() {
        let page = preds(&[("a", 0.9), ("b", 0.8), ("c", 0.7)]);
        let v = aggregate_predictions([page.as_slice()], 0.4, 2);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_tagger_prediction_parse() {
        let json = r#"{"predicted_tags":["cat","sky"],"tag_count":2,"threshold":0.4,"scores":{"cat":0.91,"sky":0.42,"dog":0.1},"processing_time_ms":12}"#;
        let reply: TaggerPrediction = serde_json::from_str(json).unwrap();
        assert_eq!(reply.tag_count, Some(2));
        assert_eq!(reply.processing_time_ms, Some(12.0));
        let mut got = reply.predictions();
        got.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(got, preds(&[("cat", 0.91), ("sky", 0.42)]));
        assert_eq!(
            reply.to_vector().entries(),
            &preds(&[("cat", 0.91), ("sky", 0.42)])[..]
        );
    }

    #[test]
    fn test_tagger_prediction_accepts_legacy_tags_key() {
        let json = r#"{"tags":["cat"],"threshold":0.4,"scores":{"cat":0.9}}"#;
        let reply: TaggerPrediction = serde_json::from_str(json).unwrap();
        assert_eq!(reply.predictions(), preds(&[("cat", 0.9)]));
        assert!(reply.tag_count.is_none());
    }

    #[test]
    fn test_tagger_prediction_requires_tag_list() {
        let json = r#"{"threshold":0.4,"scores":{"cat":0.9}}"#;
        assert!(serde_json::from_str::<TaggerPrediction>(json).is_err());
    }

    #[test]
    fn test_tagger_vector_is_capped() {
        let predicted_tags: Vec<String> =
            (0..AUTO_TAG_TOP_N + 3).map(|n| format!("t{n}")).collect();
        let scores = predicted_tags.iter().map(|t| (t.clone(), 0.9)).collect();
        let reply = TaggerPrediction {
            predicted_tags,
            tag_count: None,
            threshold: 0.4,
            scores,
            processing_time_ms: None,
        };
        assert_eq!(reply.to_vector().len(), AUTO_TAG_TOP_N);
    }
}
