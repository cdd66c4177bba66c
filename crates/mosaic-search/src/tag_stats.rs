//! Dataset-wide tag statistics with a TTL cache.
//!
//! Document frequencies change slowly relative to search traffic, so every
//! value read from the store is kept for `ttl` and then refetched. There is
//! no explicit invalidation. Concurrent fills of the same key are harmless:
//! both writers store a value read from the store, and the last one wins.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use mosaic_core::{Result, StackIndex};

#[derive(Debug, Clone, Copy)]
struct Cached<T> {
    value: T,
    stored_at: Instant,
}

impl<T: Copy> Cached<T> {
    fn fresh(&self, now: Instant, ttl: Duration) -> Option<T> {
        (now.duration_since(self.stored_at) < ttl).then_some(self.value)
    }
}

/// Which pool a document frequency was counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DfPool {
    /// Auto tags at or above a cutoff, in thousandths.
    Auto { min_score_milli: u32 },
    Manual,
}

impl DfPool {
    fn auto(min_score: f32) -> Self {
        DfPool::Auto {
            min_score_milli: (min_score.clamp(0.0, 1.0) * 1000.0).round() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DfKey {
    dataset_id: Uuid,
    pool: DfPool,
    tag: String,
}

/// Cached read-side statistics over one store, keyed by dataset.
pub struct TagStatistics {
    index: Arc<dyn StackIndex>,
    ttl: Duration,
    counts: RwLock<HashMap<Uuid, Cached<i64>>>,
    frequencies: RwLock<HashMap<DfKey, Cached<i64>>>,
}

impl TagStatistics {
    pub fn new(index: Arc<dyn StackIndex>, ttl: Duration) -> Self {
        Self {
            index,
            ttl,
            counts: RwLock::new(HashMap::new()),
            frequencies: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stacks in the dataset.
    pub async fn dataset_item_count(&self, dataset_id: Uuid) -> Result<i64> {
        let now = Instant::now();
        if let Some(count) = self
            .counts
            .read()
            .await
            .get(&dataset_id)
            .and_then(|c| c.fresh(now, self.ttl))
        {
            return Ok(count);
        }

        let count = self.index.stack_count(dataset_id).await?;
        let mut counts = self.counts.write().await;
        evict_expired(&mut counts, now, self.ttl);
        counts.insert(
            dataset_id,
            Cached {
                value: count,
                stored_at: now,
            },
        );
        Ok(count)
    }

    /// Stacks carrying each auto tag at or above `min_score`. Every
    /// requested tag is present in the result; unseen tags map to 0.
    pub async fn auto_tag_document_frequency(
        &self,
        dataset_id: Uuid,
        tags: &[String],
        min_score: f32,
    ) -> Result<HashMap<String, i64>> {
        let pool = DfPool::auto(min_score);
        self.document_frequency(dataset_id, tags, pool, |missing| async move {
            self.index
                .auto_tag_document_frequency(dataset_id, &missing, min_score)
                .await
        })
        .await
    }

    /// Stacks carrying each manual tag. Every requested tag is present in
    /// the result; unseen tags map to 0.
    pub async fn manual_tag_document_frequency(
        &self,
        dataset_id: Uuid,
        tags: &[String],
    ) -> Result<HashMap<String, i64>> {
        self.document_frequency(dataset_id, tags, DfPool::Manual, |missing| async move {
            self.index
                .manual_tag_document_frequency(dataset_id, &missing)
                .await
        })
        .await
    }

    async fn document_frequency<F, Fut>(
        &self,
        dataset_id: Uuid,
        tags: &[String],
        pool: DfPool,
        fetch: F,
    ) -> Result<HashMap<String, i64>>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: std::future::Future<Output = Result<HashMap<String, i64>>>,
    {
        let now = Instant::now();
        let key = |tag: &str| DfKey {
            dataset_id,
            pool,
            tag: tag.to_string(),
        };

        let mut result = HashMap::with_capacity(tags.len());
        let mut missing = Vec::new();
        {
            let cache = self.frequencies.read().await;
            for tag in tags {
                if result.contains_key(tag) || missing.contains(tag) {
                    continue;
                }
                match cache.get(&key(tag)).and_then(|c| c.fresh(now, self.ttl)) {
                    Some(df) => {
                        result.insert(tag.clone(), df);
                    }
                    None => missing.push(tag.clone()),
                }
            }
        }

        debug!(
            cache_hits = result.len(),
            cache_misses = missing.len(),
            ?pool,
            "Document frequency lookup"
        );

        if missing.is_empty() {
            return Ok(result);
        }

        let fetched = fetch(missing.clone()).await?;
        let mut cache = self.frequencies.write().await;
        evict_expired(&mut cache, now, self.ttl);
        for tag in missing {
            let df = fetched.get(&tag).copied().unwrap_or(0);
            cache.insert(
                key(&tag),
                Cached {
                    value: df,
                    stored_at: now,
                },
            );
            result.insert(tag, df);
        }
        Ok(result)
    }
}

fn evict_expired<K: Eq + Hash, T: Copy>(
    map: &mut HashMap<K, Cached<T>>,
    now: Instant,
    ttl: Duration,
) {
    map.retain(|_, c| c.fresh(now, ttl).is_some());
}
