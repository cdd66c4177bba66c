//! In-memory [`StackIndex`] for tests and embedded callers.
//!
//! Mirrors the semantics of the PostgreSQL store: every query is scoped to
//! one dataset, text matches are case-insensitive literal substrings, and
//! ordering ties break on stack ID.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use mosaic_search::memory::{InMemoryStackIndex, NewStack};
//!
//! let index = Arc::new(InMemoryStackIndex::new());
//! let dataset = index.add_dataset();
//! index.add_stack(dataset, NewStack::new("cat").with_tags(&["cat"]));
//! assert!(index.tag_id(dataset, "cat").is_some());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use mosaic_core::defaults::{AUTO_TAG_TOP_N, DEFAULT_PRINCIPAL_ID, MAX_COLOR_SAMPLES};
use mosaic_core::{
    aggregate_predictions, normalize_tag, AutoTagVector, CollectionFilter, ColorSample, Error, FilterPredicate,
    MediaType, OverlapQuery, Result, SortField, SortOrder, StackFilterRepository, StackSummary,
    StopTagSettings, TagSource, TagStatsRepository, TagVectorRepository, TextMatchRepository,
};

/// A stack to insert, with everything attached to it.
#[derive(Debug, Clone)]
pub struct NewStack {
    pub name: String,
    pub media_type: MediaType,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub auto_tags: Vec<(String, f32)>,
    pub colors: Vec<ColorSample>,
    pub like_count: i32,
    pub favorite: bool,
    /// Unset means "one second after the previously inserted stack".
    pub created_at: Option<DateTime<Utc>>,
}

impl NewStack {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            media_type: MediaType::Image,
            author: None,
            tags: Vec::new(),
            auto_tags: Vec::new(),
            colors: Vec::new(),
            like_count: 0,
            favorite: false,
            created_at: None,
        }
    }

    pub fn media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn with_auto_tags(mut self, tags: &[(&str, f32)]) -> Self {
        self.auto_tags
            .extend(tags.iter().map(|(t, s)| (t.to_string(), *s)));
        self
    }

    pub fn with_color(mut self, sample: ColorSample) -> Self {
        self.colors.push(sample);
        self
    }

    pub fn likes(mut self, count: i32) -> Self {
        self.like_count = count;
        self
    }

    pub fn favorited(mut self) -> Self {
        self.favorite = true;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

#[derive(Debug, Clone)]
struct StoredStack {
    id: Uuid,
    dataset_id: Uuid,
    name: String,
    media_type: MediaType,
    like_count: i32,
    author_id: Option<Uuid>,
    tag_ids: Vec<Uuid>,
    auto_tags: AutoTagVector,
    colors: Vec<ColorSample>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Named {
    dataset_id: Uuid,
    name: String,
}

#[derive(Debug, Default)]
struct State {
    datasets: HashMap<Uuid, StopTagSettings>,
    stacks: Vec<StoredStack>,
    authors: HashMap<Uuid, Named>,
    tags: HashMap<Uuid, Named>,
    display_names: HashMap<String, String>,
    favorites: HashSet<(Uuid, Uuid)>,
    collections: HashMap<Uuid, (Uuid, Vec<Uuid>)>,
    clock: i64,
}

impl State {
    fn stacks_in(&self, dataset_id: Uuid) -> impl Iterator<Item = &StoredStack> {
        self.stacks.iter().filter(move |s| s.dataset_id == dataset_id)
    }

    fn stack(&self, dataset_id: Uuid, id: Uuid) -> Option<&StoredStack> {
        self.stacks_in(dataset_id).find(|s| s.id == id)
    }

    fn manual_titles(&self, stack: &StoredStack) -> Vec<String> {
        let mut titles: Vec<String> = stack
            .tag_ids
            .iter()
            .filter_map(|id| self.tags.get(id))
            .map(|t| normalize_tag(&t.name))
            .collect();
        titles.sort();
        titles.dedup();
        titles
    }

    fn named_id(map: &HashMap<Uuid, Named>, dataset_id: Uuid, name: &str) -> Option<Uuid> {
        map.iter()
            .find(|(_, n)| n.dataset_id == dataset_id && n.name == name)
            .map(|(id, _)| *id)
    }

    fn matches(&self, stack: &StoredStack, predicate: &FilterPredicate) -> bool {
        match predicate {
            FilterPredicate::Author(filter) => {
                let authors: Vec<Uuid> = stack.author_id.into_iter().collect();
                filter.matches(&authors)
            }
            FilterPredicate::Tag(filter) => filter.matches(&stack.tag_ids),
            FilterPredicate::Favorite {
                principal_id,
                favorited,
            } => self.favorites.contains(&(*principal_id, stack.id)) == *favorited,
            FilterPredicate::Liked(liked) => (stack.like_count > 0) == *liked,
            FilterPredicate::MediaType(types) => types.contains(&stack.media_type),
            FilterPredicate::Collection(CollectionFilter::Collection(id)) => self
                .collections
                .get(id)
                .filter(|(dataset_id, _)| *dataset_id == stack.dataset_id)
                .is_some_and(|(_, members)| members.contains(&stack.id)),
            FilterPredicate::Collection(CollectionFilter::Members(ids)) => ids.contains(&stack.id),
            FilterPredicate::Color { filter, metric } => filter.matches(&stack.colors, *metric),
        }
    }
}

/// [`StackIndex`](mosaic_core::StackIndex) held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStackIndex {
    state: RwLock<State>,
    latency: Option<Duration>,
    statistics_unavailable: bool,
    df_queries: AtomicUsize,
}

impl InMemoryStackIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every store call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every statistics call fail.
    pub fn with_unavailable_statistics(mut self) -> Self {
        self.statistics_unavailable = true;
        self
    }

    /// Number of document-frequency queries served so far.
    pub fn document_frequency_queries(&self) -> usize {
        self.df_queries.load(Ordering::Relaxed)
    }

    pub fn add_dataset(&self) -> Uuid {
        let id = Uuid::now_v7();
        self.write().datasets.insert(id, StopTagSettings::default());
        id
    }

    pub fn set_stop_tags(&self, dataset_id: Uuid, settings: StopTagSettings) {
        self.write().datasets.insert(dataset_id, settings);
    }

    pub fn set_display_name(&self, tag_key: &str, display_name: &str) {
        self.write()
            .display_names
            .insert(tag_key.to_string(), display_name.to_string());
    }

    /// Insert a stack, creating its author and tags on first use.
    pub fn add_stack(&self, dataset_id: Uuid, stack: NewStack) -> Uuid {
        let mut guard = self.write();
        let state = &mut *guard;
        state
            .datasets
            .entry(dataset_id)
            .or_insert_with(StopTagSettings::default);

        let author_id = stack
            .author
            .as_deref()
            .map(|name| intern(&mut state.authors, dataset_id, name));

        let mut tag_ids = Vec::with_capacity(stack.tags.len());
        for title in &stack.tags {
            let id = intern(&mut state.tags, dataset_id, title);
            if !tag_ids.contains(&id) {
                tag_ids.push(id);
            }
        }

        let mut colors = stack.colors;
        colors.truncate(MAX_COLOR_SAMPLES);

        state.clock += 1;
        let created_at = stack.created_at.unwrap_or_else(|| logical_time(state.clock));
        let id = Uuid::now_v7();
        if stack.favorite {
            state.favorites.insert((DEFAULT_PRINCIPAL_ID, id));
        }
        state.stacks.push(StoredStack {
            id,
            dataset_id,
            name: stack.name,
            media_type: stack.media_type,
            like_count: stack.like_count,
            author_id,
            tag_ids,
            auto_tags: aggregate_predictions([stack.auto_tags.as_slice()], 0.0, AUTO_TAG_TOP_N),
            colors,
            created_at,
        });
        id
    }

    /// Create a manual collection holding `stacks` in order.
    pub fn add_collection(&self, dataset_id: Uuid, stacks: &[Uuid]) -> Uuid {
        let id = Uuid::now_v7();
        self.write()
            .collections
            .insert(id, (dataset_id, stacks.to_vec()));
        id
    }

    pub fn tag_id(&self, dataset_id: Uuid, title: &str) -> Option<Uuid> {
        State::named_id(&self.read().tags, dataset_id, title)
    }

    pub fn author_id(&self, dataset_id: Uuid, name: &str) -> Option<Uuid> {
        State::named_id(&self.read().authors, dataset_id, name)
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn statistics_guard(&self) -> Result<()> {
        if self.statistics_unavailable {
            Err(Error::Search("tag statistics unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

fn intern(map: &mut HashMap<Uuid, Named>, dataset_id: Uuid, name: &str) -> Uuid {
    if let Some(id) = State::named_id(map, dataset_id, name) {
        return id;
    }
    let id = Uuid::now_v7();
    map.insert(
        id,
        Named {
            dataset_id,
            name: name.to_string(),
        },
    );
    id
}

/// 2026-01-01T00:00:00Z plus `tick` seconds.
fn logical_time(tick: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + tick, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl TagStatsRepository for InMemoryStackIndex {
    async fn stack_count(&self, dataset_id: Uuid) -> Result<i64> {
        self.simulate_latency().await;
        self.statistics_guard()?;
        Ok(self.read().stacks_in(dataset_id).count() as i64)
    }

    async fn auto_tag_document_frequency(
        &self,
        dataset_id: Uuid,
        tags: &[String],
        min_score: f32,
    ) -> Result<HashMap<String, i64>> {
        self.simulate_latency().await;
        self.statistics_guard()?;
        self.df_queries.fetch_add(1, Ordering::Relaxed);
        let state = self.read();
        let mut df = HashMap::new();
        for tag in tags {
            let count = state
                .stacks_in(dataset_id)
                .filter(|s| s.auto_tags.score(tag).is_some_and(|score| score >= min_score))
                .count() as i64;
            if count > 0 {
                df.insert(tag.clone(), count);
            }
        }
        Ok(df)
    }

    async fn manual_tag_document_frequency(
        &self,
        dataset_id: Uuid,
        tags: &[String],
    ) -> Result<HashMap<String, i64>> {
        self.simulate_latency().await;
        self.statistics_guard()?;
        self.df_queries.fetch_add(1, Ordering::Relaxed);
        let state = self.read();
        let mut df = HashMap::new();
        for tag in tags {
            let count = state
                .stacks_in(dataset_id)
                .filter(|s| state.manual_titles(s).contains(tag))
                .count() as i64;
            if count > 0 {
                df.insert(tag.clone(), count);
            }
        }
        Ok(df)
    }
}

#[async_trait]
impl TagVectorRepository for InMemoryStackIndex {
    async fn stop_tag_settings(&self, dataset_id: Uuid) -> Result<StopTagSettings> {
        self.simulate_latency().await;
        Ok(self
            .read()
            .datasets
            .get(&dataset_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn auto_tag_vectors(
        &self,
        dataset_id: Uuid,
        stack_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, AutoTagVector>> {
        self.simulate_latency().await;
        let state = self.read();
        Ok(state
            .stacks_in(dataset_id)
            .filter(|s| stack_ids.contains(&s.id) && !s.auto_tags.is_empty())
            .map(|s| (s.id, s.auto_tags.clone()))
            .collect())
    }

    async fn manual_tag_sets(
        &self,
        dataset_id: Uuid,
        stack_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>> {
        self.simulate_latency().await;
        let state = self.read();
        Ok(state
            .stacks_in(dataset_id)
            .filter(|s| stack_ids.contains(&s.id) && !s.tag_ids.is_empty())
            .map(|s| (s.id, state.manual_titles(s)))
            .collect())
    }

    async fn overlap_candidates(&self, query: &OverlapQuery) -> Result<Vec<Uuid>> {
        self.simulate_latency().await;
        if query.tags.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }
        let wanted: HashSet<String> = query.tags.iter().map(|t| normalize_tag(t)).collect();
        let min_overlap = query.min_overlap.max(1);
        let state = self.read();

        let mut hits: Vec<(Uuid, usize)> = state
            .stacks_in(query.dataset_id)
            .filter(|s| s.id != query.exclude_stack_id)
            .map(|s| {
                let overlap = match query.source {
                    TagSource::Auto { min_score } => s
                        .auto_tags
                        .entries()
                        .iter()
                        .filter(|(tag, score)| *score >= min_score && wanted.contains(tag))
                        .count(),
                    TagSource::Manual => state
                        .manual_titles(s)
                        .iter()
                        .filter(|tag| wanted.contains(*tag))
                        .count(),
                };
                (s.id, overlap)
            })
            .filter(|(_, overlap)| *overlap >= min_overlap)
            .collect();
        hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        hits.truncate(query.limit);
        Ok(hits.into_iter().map(|(id, _)| id).collect())
    }
}

#[async_trait]
impl TextMatchRepository for InMemoryStackIndex {
    async fn stacks_by_author_name(&self, dataset_id: Uuid, needle: &str) -> Result<Vec<Uuid>> {
        self.simulate_latency().await;
        let state = self.read();
        Ok(state
            .stacks_in(dataset_id)
            .filter(|s| {
                s.author_id
                    .and_then(|id| state.authors.get(&id))
                    .is_some_and(|a| contains_ci(&a.name, needle))
            })
            .map(|s| s.id)
            .collect())
    }

    async fn stacks_by_manual_tag(&self, dataset_id: Uuid, needle: &str) -> Result<Vec<Uuid>> {
        self.simulate_latency().await;
        let state = self.read();
        Ok(state
            .stacks_in(dataset_id)
            .filter(|s| {
                s.tag_ids
                    .iter()
                    .filter_map(|id| state.tags.get(id))
                    .any(|t| contains_ci(&t.name, needle))
            })
            .map(|s| s.id)
            .collect())
    }

    async fn stacks_by_auto_tag(
        &self,
        dataset_id: Uuid,
        needle: &str,
        min_score: f32,
    ) -> Result<Vec<Uuid>> {
        self.simulate_latency().await;
        let state = self.read();
        Ok(state
            .stacks_in(dataset_id)
            .filter(|s| {
                s.auto_tags.entries().iter().any(|(key, score)| {
                    *score >= min_score
                        && (contains_ci(key, needle)
                            || state
                                .display_names
                                .get(key)
                                .is_some_and(|name| contains_ci(name, needle)))
                })
            })
            .map(|s| s.id)
            .collect())
    }
}

#[async_trait]
impl StackFilterRepository for InMemoryStackIndex {
    async fn stack_exists(&self, dataset_id: Uuid, stack_id: Uuid) -> Result<bool> {
        self.simulate_latency().await;
        Ok(self.read().stack(dataset_id, stack_id).is_some())
    }

    async fn all_stack_ids(&self, dataset_id: Uuid) -> Result<Vec<Uuid>> {
        self.simulate_latency().await;
        let state = self.read();
        let mut stacks: Vec<&StoredStack> = state.stacks_in(dataset_id).collect();
        stacks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(stacks.into_iter().map(|s| s.id).collect())
    }

    async fn resolve_predicate(
        &self,
        dataset_id: Uuid,
        predicate: &FilterPredicate,
    ) -> Result<Vec<Uuid>> {
        self.simulate_latency().await;
        let state = self.read();
        Ok(state
            .stacks_in(dataset_id)
            .filter(|s| state.matches(s, predicate))
            .map(|s| s.id)
            .collect())
    }

    async fn order_stacks(
        &self,
        dataset_id: Uuid,
        ids: &[Uuid],
        sort: SortField,
        order: SortOrder,
    ) -> Result<Vec<Uuid>> {
        self.simulate_latency().await;
        let state = self.read();
        let mut stacks: Vec<&StoredStack> = state
            .stacks_in(dataset_id)
            .filter(|s| ids.contains(&s.id))
            .collect();
        let order = match sort {
            SortField::Recommended => SortOrder::Desc,
            _ => order,
        };
        stacks.sort_by(|a, b| {
            let primary = match sort {
                // Stacks are never updated in memory.
                SortField::Recommended | SortField::CreatedAt | SortField::UpdatedAt => {
                    a.created_at.cmp(&b.created_at)
                }
                SortField::Name => a.name.cmp(&b.name),
                SortField::Likes => a.like_count.cmp(&b.like_count),
            };
            let ordering = primary.then_with(|| a.id.cmp(&b.id));
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        Ok(stacks.into_iter().map(|s| s.id).collect())
    }

    async fn fetch_summaries(
        &self,
        dataset_id: Uuid,
        ids: &[Uuid],
        principal_id: Uuid,
    ) -> Result<Vec<StackSummary>> {
        self.simulate_latency().await;
        let state = self.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.stack(dataset_id, *id))
            .map(|s| {
                let author = s.author_id.and_then(|id| state.authors.get(&id));
                StackSummary {
                    id: s.id,
                    dataset_id: s.dataset_id,
                    name: s.name.clone(),
                    media_type: s.media_type,
                    like_count: s.like_count,
                    author_id: s.author_id,
                    author_name: author.map(|a| a.name.clone()),
                    colors: s.colors.clone(),
                    favorited: state.favorites.contains(&(principal_id, s.id)),
                    created_at: s.created_at,
                    updated_at: s.created_at,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::{ColorDistanceMetric, ColorFilter, HueCategory, RelationFilter};

    #[tokio::test]
    async fn test_created_at_follows_insertion_order() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let first = index.add_stack(dataset, NewStack::new("first"));
        let second = index.add_stack(dataset, NewStack::new("second"));
        assert_eq!(
            index.all_stack_ids(dataset).await.unwrap(),
            vec![second, first]
        );
    }

    #[tokio::test]
    async fn test_tags_and_authors_shared_within_dataset() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let other = index.add_dataset();
        index.add_stack(dataset, NewStack::new("a").with_tags(&["cat"]).with_author("ann"));
        index.add_stack(dataset, NewStack::new("b").with_tags(&["cat"]).with_author("ann"));
        index.add_stack(other, NewStack::new("c").with_tags(&["cat"]));

        let cat = index.tag_id(dataset, "cat").unwrap();
        assert_ne!(Some(cat), index.tag_id(other, "cat"));
        let tagged = index
            .resolve_predicate(dataset, &FilterPredicate::Tag(RelationFilter::new().require(cat)))
            .await
            .unwrap();
        assert_eq!(tagged.len(), 2);
        assert!(index.author_id(other, "ann").is_none());
    }

    #[tokio::test]
    async fn test_overlap_counts_and_orders() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let reference = index.add_stack(dataset, NewStack::new("ref").with_tags(&["cat", "red"]));
        let both = index.add_stack(dataset, NewStack::new("both").with_tags(&["Cat", "red"]));
        let one = index.add_stack(dataset, NewStack::new("one").with_tags(&["cat"]));

        let query = OverlapQuery {
            dataset_id: dataset,
            exclude_stack_id: reference,
            tags: vec!["cat".to_string(), "red".to_string()],
            source: TagSource::Manual,
            min_overlap: 1,
            limit: 10,
        };
        assert_eq!(index.overlap_candidates(&query).await.unwrap(), vec![both, one]);

        let strict = OverlapQuery {
            min_overlap: 2,
            ..query
        };
        assert_eq!(index.overlap_candidates(&strict).await.unwrap(), vec![both]);
    }

    #[tokio::test]
    async fn test_padded_titles_count_as_one_tag() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let reference = index.add_stack(dataset, NewStack::new("ref").with_tags(&["cat"]));
        let padded = index.add_stack(dataset, NewStack::new("padded").with_tags(&[" Cat "]));

        let tags = vec!["cat".to_string()];
        let df = index
            .manual_tag_document_frequency(dataset, &tags)
            .await
            .unwrap();
        assert_eq!(df.get("cat"), Some(&2));

        let query = OverlapQuery {
            dataset_id: dataset,
            exclude_stack_id: reference,
            tags,
            source: TagSource::Manual,
            min_overlap: 1,
            limit: 10,
        };
        assert_eq!(index.overlap_candidates(&query).await.unwrap(), vec![padded]);
    }

    #[tokio::test]
    async fn test_stored_vectors_and_colors_are_capped() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let predictions: Vec<(String, f32)> = (0..AUTO_TAG_TOP_N + 5)
            .map(|n| (format!("tag{n}"), 0.9))
            .collect();
        let mut stack = NewStack::new("busy");
        stack.auto_tags = predictions;
        for n in 0..MAX_COLOR_SAMPLES + 2 {
            stack = stack.with_color(ColorSample::from_rgb(200, 10 * n as u8, 10, 20.0));
        }
        let id = index.add_stack(dataset, stack);

        let vectors = index.auto_tag_vectors(dataset, &[id]).await.unwrap();
        assert_eq!(vectors[&id].len(), AUTO_TAG_TOP_N);

        let summaries = index
            .fetch_summaries(dataset, &[id], DEFAULT_PRINCIPAL_ID)
            .await
            .unwrap();
        assert_eq!(summaries[0].colors.len(), MAX_COLOR_SAMPLES);
    }

    #[tokio::test]
    async fn test_auto_tag_match_uses_display_name_and_cutoff() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let feline = index.add_stack(dataset, NewStack::new("a").with_auto_tags(&[("feline", 0.9)]));
        index.add_stack(dataset, NewStack::new("b").with_auto_tags(&[("feline", 0.2)]));
        index.set_display_name("feline", "Cat-like");

        assert_eq!(
            index.stacks_by_auto_tag(dataset, "cat", 0.5).await.unwrap(),
            vec![feline]
        );
    }

    #[tokio::test]
    async fn test_color_and_attribute_predicates() {
        let index = InMemoryStackIndex::new();
        let dataset = index.add_dataset();
        let red = index.add_stack(
            dataset,
            NewStack::new("red")
                .with_color(ColorSample::from_rgb(230, 20, 20, 60.0))
                .likes(2)
                .favorited(),
        );
        let gray = index.add_stack(
            dataset,
            NewStack::new("gray").with_color(ColorSample::from_rgb(90, 90, 90, 80.0)),
        );

        let hue = FilterPredicate::Color {
            filter: ColorFilter::hue(vec![HueCategory::Gray]),
            metric: ColorDistanceMetric::Circular,
        };
        assert_eq!(index.resolve_predicate(dataset, &hue).await.unwrap(), vec![gray]);
        assert_eq!(
            index
                .resolve_predicate(dataset, &FilterPredicate::Liked(true))
                .await
                .unwrap(),
            vec![red]
        );
        let favorites = FilterPredicate::Favorite {
            principal_id: DEFAULT_PRINCIPAL_ID,
            favorited: false,
        };
        assert_eq!(
            index.resolve_predicate(dataset, &favorites).await.unwrap(),
            vec![gray]
        );
    }

    #[tokio::test]
    async fn test_statistics_can_be_made_unavailable() {
        let index = InMemoryStackIndex::new().with_unavailable_statistics();
        let dataset = index.add_dataset();
        assert!(matches!(
            index.stack_count(dataset).await,
            Err(Error::Search(_))
        ));
    }
}
