//! PostgreSQL implementation of the search store traits.
//!
//! Every statement is scoped by `stack.dataset_id = $1`; joins to tags,
//! authors, and collections additionally check the joined row's dataset.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use mosaic_core::defaults::MAX_COLOR_SAMPLES;
use mosaic_core::{
    AutoTagVector, ColorSample, Error, FilterPredicate, MediaType, OverlapQuery, Result,
    SortField, SortOrder, StackFilterRepository, StackSummary, StopTagGroup, StopTagSettings,
    TagSource, TagStatsRepository, TagVectorRepository, TextMatchRepository,
};

use crate::escape_like;
use crate::filter_query::{bind_params, ColorStorage, PredicateQueryBuilder};

/// PostgreSQL store for one deployment. Cheap to clone.
#[derive(Clone)]
pub struct PgStackIndex {
    pool: Pool<Postgres>,
    color_storage: ColorStorage,
}

impl PgStackIndex {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            color_storage: ColorStorage::default(),
        }
    }

    /// Read color samples from the JSONB column instead of `stack_color`.
    pub fn with_color_storage(mut self, storage: ColorStorage) -> Self {
        self.color_storage = storage;
        self
    }

    pub fn color_storage(&self) -> ColorStorage {
        self.color_storage
    }
}

/// `ORDER BY` clause for a sort field. Column names come from this fixed set only.
fn order_clause(sort: SortField, order: SortOrder) -> String {
    let (column, order) = match sort {
        SortField::Recommended => ("created_at", SortOrder::Desc),
        SortField::Name => ("name", order),
        SortField::CreatedAt => ("created_at", order),
        SortField::UpdatedAt => ("updated_at", order),
        SortField::Likes => ("like_count", order),
    };
    let dir = order.as_sql();
    format!("{column} {dir}, id {dir}")
}

fn like_pattern(needle: &str) -> String {
    format!("%{}%", escape_like(needle))
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl TagStatsRepository for PgStackIndex {
    async fn stack_count(&self, dataset_id: Uuid) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stack WHERE dataset_id = $1")
            .bind(dataset_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn auto_tag_document_frequency(
        &self,
        dataset_id: Uuid,
        tags: &[String],
        min_score: f32,
    ) -> Result<HashMap<String, i64>> {
        if tags.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT a.tag_key, COUNT(DISTINCT a.stack_id) AS df
            FROM stack_auto_tag a
            JOIN stack s ON s.id = a.stack_id
            WHERE s.dataset_id = $1
              AND a.tag_key = ANY($2::text[])
              AND a.score >= $3
            GROUP BY a.tag_key
            "#,
        )
        .bind(dataset_id)
        .bind(tags)
        .bind(min_score)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("tag_key"), row.get("df")))
            .collect())
    }

    async fn manual_tag_document_frequency(
        &self,
        dataset_id: Uuid,
        tags: &[String],
    ) -> Result<HashMap<String, i64>> {
        if tags.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT lower(btrim(t.title)) AS tag, COUNT(DISTINCT ts.stack_id) AS df
            FROM tag_to_stack ts
            JOIN tag t ON t.id = ts.tag_id
            JOIN stack s ON s.id = ts.stack_id
            WHERE s.dataset_id = $1
              AND t.dataset_id = $1
              AND lower(btrim(t.title)) = ANY($2::text[])
            GROUP BY lower(btrim(t.title))
            "#,
        )
        .bind(dataset_id)
        .bind(tags)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("tag"), row.get("df")))
            .collect())
    }
}

#[async_trait]
impl TagVectorRepository for PgStackIndex {
    async fn stop_tag_settings(&self, dataset_id: Uuid) -> Result<StopTagSettings> {
        let row = sqlx::query(
            "SELECT stop_tag_groups, stop_tags_extra FROM dataset WHERE id = $1",
        )
        .bind(dataset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(StopTagSettings::default());
        };

        let group_names: Vec<String> = row.get("stop_tag_groups");
        let mut settings = StopTagSettings {
            groups: Vec::with_capacity(group_names.len()),
            extra: row.get("stop_tags_extra"),
        };
        for name in group_names {
            match name.parse::<StopTagGroup>() {
                Ok(group) => settings.groups.push(group),
                Err(e) => warn!(
                    subsystem = "database",
                    component = "stack_index",
                    dataset_id = %dataset_id,
                    error = %e,
                    "Ignoring unknown stop tag group"
                ),
            }
        }
        Ok(settings)
    }

    async fn auto_tag_vectors(
        &self,
        dataset_id: Uuid,
        stack_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, AutoTagVector>> {
        if stack_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT a.stack_id, a.tag_key, a.score
            FROM stack_auto_tag a
            JOIN stack s ON s.id = a.stack_id
            WHERE s.dataset_id = $1
              AND a.stack_id = ANY($2::uuid[])
            "#,
        )
        .bind(dataset_id)
        .bind(stack_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut grouped: HashMap<Uuid, Vec<(String, f32)>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.get("stack_id"))
                .or_default()
                .push((row.get("tag_key"), row.get("score")));
        }
        Ok(grouped
            .into_iter()
            .map(|(id, entries)| (id, AutoTagVector::new(entries)))
            .collect())
    }

    async fn manual_tag_sets(
        &self,
        dataset_id: Uuid,
        stack_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<String>>> {
        if stack_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT ts.stack_id, lower(btrim(t.title)) AS tag
            FROM tag_to_stack ts
            JOIN tag t ON t.id = ts.tag_id
            JOIN stack s ON s.id = ts.stack_id
            WHERE s.dataset_id = $1
              AND t.dataset_id = $1
              AND ts.stack_id = ANY($2::uuid[])
            ORDER BY ts.stack_id, lower(btrim(t.title))
            "#,
        )
        .bind(dataset_id)
        .bind(stack_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut sets: HashMap<Uuid, Vec<String>> = HashMap::new();
        for row in rows {
            sets.entry(row.get("stack_id"))
                .or_default()
                .push(row.get("tag"));
        }
        Ok(sets)
    }

    async fn overlap_candidates(&self, query: &OverlapQuery) -> Result<Vec<Uuid>> {
        if query.tags.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }
        let min_overlap = to_i64(query.min_overlap.max(1));
        let limit = to_i64(query.limit);

        let ids = match query.source {
            TagSource::Auto { min_score } => {
                sqlx::query_scalar::<_, Uuid>(
                    r#"
                    SELECT a.stack_id
                    FROM stack_auto_tag a
                    JOIN stack s ON s.id = a.stack_id
                    WHERE s.dataset_id = $1
                      AND a.stack_id <> $2
                      AND a.tag_key = ANY($3::text[])
                      AND a.score >= $4
                    GROUP BY a.stack_id
                    HAVING COUNT(*) >= $5
                    ORDER BY COUNT(*) DESC, a.stack_id
                    LIMIT $6
                    "#,
                )
                .bind(query.dataset_id)
                .bind(query.exclude_stack_id)
                .bind(&query.tags)
                .bind(min_score)
                .bind(min_overlap)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            TagSource::Manual => {
                sqlx::query_scalar::<_, Uuid>(
                    r#"
                    SELECT ts.stack_id
                    FROM tag_to_stack ts
                    JOIN tag t ON t.id = ts.tag_id
                    JOIN stack s ON s.id = ts.stack_id
                    WHERE s.dataset_id = $1
                      AND t.dataset_id = $1
                      AND ts.stack_id <> $2
                      AND lower(btrim(t.title)) = ANY($3::text[])
                    GROUP BY ts.stack_id
                    HAVING COUNT(DISTINCT lower(btrim(t.title))) >= $4
                    ORDER BY COUNT(DISTINCT lower(btrim(t.title))) DESC, ts.stack_id
                    LIMIT $5
                    "#,
                )
                .bind(query.dataset_id)
                .bind(query.exclude_stack_id)
                .bind(&query.tags)
                .bind(min_overlap)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "stack_index",
            op = "overlap_candidates",
            source = ?query.source,
            probe_tags = query.tags.len(),
            candidate_count = ids.len(),
            "Overlap candidates fetched"
        );
        Ok(ids)
    }
}

#[async_trait]
impl TextMatchRepository for PgStackIndex {
    async fn stacks_by_author_name(&self, dataset_id: Uuid, needle: &str) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT s.id
            FROM stack s
            JOIN author a ON a.id = s.author_id
            WHERE s.dataset_id = $1
              AND a.dataset_id = $1
              AND a.name ILIKE $2 ESCAPE '\'
            "#,
        )
        .bind(dataset_id)
        .bind(like_pattern(needle))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn stacks_by_manual_tag(&self, dataset_id: Uuid, needle: &str) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT ts.stack_id
            FROM tag_to_stack ts
            JOIN tag t ON t.id = ts.tag_id
            JOIN stack s ON s.id = ts.stack_id
            WHERE s.dataset_id = $1
              AND t.dataset_id = $1
              AND t.title ILIKE $2 ESCAPE '\'
            "#,
        )
        .bind(dataset_id)
        .bind(like_pattern(needle))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn stacks_by_auto_tag(
        &self,
        dataset_id: Uuid,
        needle: &str,
        min_score: f32,
    ) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT a.stack_id
            FROM stack_auto_tag a
            JOIN stack s ON s.id = a.stack_id
            LEFT JOIN auto_tag_display d ON d.tag_key = a.tag_key
            WHERE s.dataset_id = $1
              AND a.score >= $3
              AND (a.tag_key ILIKE $2 ESCAPE '\' OR d.display_name ILIKE $2 ESCAPE '\')
            "#,
        )
        .bind(dataset_id)
        .bind(like_pattern(needle))
        .bind(min_score)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }
}

#[async_trait]
impl StackFilterRepository for PgStackIndex {
    async fn stack_exists(&self, dataset_id: Uuid, stack_id: Uuid) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM stack WHERE dataset_id = $1 AND id = $2)",
        )
        .bind(dataset_id)
        .bind(stack_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn all_stack_ids(&self, dataset_id: Uuid) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM stack WHERE dataset_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn resolve_predicate(
        &self,
        dataset_id: Uuid,
        predicate: &FilterPredicate,
    ) -> Result<Vec<Uuid>> {
        let (clause, params) = PredicateQueryBuilder::new(1, self.color_storage).build(predicate);
        let sql = format!("SELECT s.id FROM stack s WHERE s.dataset_id = $1 AND {clause}");

        let q = sqlx::query_scalar::<_, Uuid>(&sql).bind(dataset_id);
        let q = bind_params!(q, &params);
        let ids = q.fetch_all(&self.pool).await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "stack_index",
            op = "resolve_predicate",
            predicate = predicate.kind(),
            result_count = ids.len(),
            "Predicate resolved"
        );
        Ok(ids)
    }

    async fn order_stacks(
        &self,
        dataset_id: Uuid,
        ids: &[Uuid],
        sort: SortField,
        order: SortOrder,
    ) -> Result<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id FROM stack WHERE dataset_id = $1 AND id = ANY($2::uuid[]) ORDER BY {}",
            order_clause(sort, order)
        );
        sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(dataset_id)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn fetch_summaries(
        &self,
        dataset_id: Uuid,
        ids: &[Uuid],
        principal_id: Uuid,
    ) -> Result<Vec<StackSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.dataset_id, s.name, s.media_type, s.like_count,
                   s.author_id, a.name AS author_name, s.colors,
                   s.created_at, s.updated_at,
                   EXISTS (
                       SELECT 1 FROM favorite_stack f
                       WHERE f.stack_id = s.id AND f.user_id = $3
                   ) AS favorited
            FROM stack s
            LEFT JOIN author a ON a.id = s.author_id AND a.dataset_id = s.dataset_id
            WHERE s.dataset_id = $1
              AND s.id = ANY($2::uuid[])
            "#,
        )
        .bind(dataset_id)
        .bind(ids)
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let media_type: String = row.get("media_type");
            let colors: serde_json::Value = row.get("colors");
            let mut colors = serde_json::from_value::<Vec<ColorSample>>(colors)?;
            colors.truncate(MAX_COLOR_SAMPLES);
            let summary = StackSummary {
                id: row.get("id"),
                dataset_id: row.get("dataset_id"),
                name: row.get("name"),
                media_type: media_type.parse::<MediaType>()?,
                like_count: row.get("like_count"),
                author_id: row.get("author_id"),
                author_name: row.get("author_name"),
                colors,
                favorited: row.get("favorited"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            };
            by_id.insert(summary.id, summary);
        }

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}
