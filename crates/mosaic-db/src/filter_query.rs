//! SQL generation for filter predicates.
//!
//! Every predicate becomes a WHERE fragment over the `stack s` alias plus
//! the parameters it binds, in order. Values never reach the SQL text; only
//! column names and operators chosen from fixed sets do.

use mosaic_core::defaults::GRAY_SATURATION_MAX;
use mosaic_core::{
    CollectionFilter, ColorDistanceMetric, ColorFilter, FilterPredicate, HueCategory,
    RelationFilter,
};
use uuid::Uuid;

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Uuid(Uuid),
    /// Array of UUIDs (for ANY operations).
    UuidArray(Vec<Uuid>),
    Int(i32),
    BigInt(i64),
    Float(f64),
    Bool(bool),
    String(String),
    StringArray(Vec<String>),
}

/// Bind a slice of [`QueryParam`]s onto a query in order.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut q = $query;
        for param in $params {
            q = match param {
                $crate::filter_query::QueryParam::Uuid(v) => q.bind(*v),
                $crate::filter_query::QueryParam::UuidArray(v) => q.bind(v.clone()),
                $crate::filter_query::QueryParam::Int(v) => q.bind(*v),
                $crate::filter_query::QueryParam::BigInt(v) => q.bind(*v),
                $crate::filter_query::QueryParam::Float(v) => q.bind(*v),
                $crate::filter_query::QueryParam::Bool(v) => q.bind(*v),
                $crate::filter_query::QueryParam::String(v) => q.bind(v.clone()),
                $crate::filter_query::QueryParam::StringArray(v) => q.bind(v.clone()),
            };
        }
        q
    }};
}

pub(crate) use bind_params;

/// Where color samples are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorStorage {
    /// The indexed `stack_color` table.
    #[default]
    SideTable,
    /// The `stack.colors` JSONB column.
    EmbeddedJson,
}

/// Column expressions for one color sample row.
struct ColorColumns {
    source: &'static str,
    hue: &'static str,
    saturation: &'static str,
    lightness: &'static str,
    category: &'static str,
}

impl ColorStorage {
    fn columns(&self) -> ColorColumns {
        match self {
            ColorStorage::SideTable => ColorColumns {
                source: "stack_color sc WHERE sc.stack_id = s.id AND",
                hue: "sc.hue::int",
                saturation: "sc.saturation::int",
                lightness: "sc.lightness::int",
                category: "sc.category",
            },
            ColorStorage::EmbeddedJson => ColorColumns {
                source: "jsonb_array_elements(s.colors) c WHERE",
                hue: "(c->'hsl'->>'h')::int",
                saturation: "(c->'hsl'->>'s')::int",
                lightness: "(c->'hsl'->>'l')::int",
                category: "(c->>'category')",
            },
        }
    }
}

/// SQL membership tests for one relation (authors or tags).
struct RelationSql {
    /// Related to the single ID at `$n`.
    has_one: fn(usize) -> String,
    /// Related to any ID in the array at `$n`.
    has_any: fn(usize) -> String,
    /// No related IDs at all.
    unset: &'static str,
}

fn author_is(idx: usize) -> String {
    format!("s.author_id = ${idx}")
}

fn author_in(idx: usize) -> String {
    format!("s.author_id = ANY(${idx}::uuid[])")
}

fn tagged_with(idx: usize) -> String {
    format!("EXISTS (SELECT 1 FROM tag_to_stack ts WHERE ts.stack_id = s.id AND ts.tag_id = ${idx})")
}

fn tagged_with_any(idx: usize) -> String {
    format!(
        "EXISTS (SELECT 1 FROM tag_to_stack ts WHERE ts.stack_id = s.id AND ts.tag_id = ANY(${idx}::uuid[]))"
    )
}

const AUTHOR_SQL: RelationSql = RelationSql {
    has_one: author_is,
    has_any: author_in,
    unset: "s.author_id IS NULL",
};

const TAG_SQL: RelationSql = RelationSql {
    has_one: tagged_with,
    has_any: tagged_with_any,
    unset: "NOT EXISTS (SELECT 1 FROM tag_to_stack ts WHERE ts.stack_id = s.id)",
};

/// Generates WHERE fragments for [`FilterPredicate`]s.
///
/// # Example
///
/// ```
/// use mosaic_core::FilterPredicate;
/// use mosaic_db::{ColorStorage, PredicateQueryBuilder};
///
/// let builder = PredicateQueryBuilder::new(1, ColorStorage::SideTable);
/// let (sql, params) = builder.build(&FilterPredicate::Liked(true));
/// assert_eq!(sql, "s.like_count > 0");
/// assert!(params.is_empty());
/// ```
pub struct PredicateQueryBuilder {
    param_offset: usize,
    color_storage: ColorStorage,
}

impl PredicateQueryBuilder {
    /// `param_offset` is the number of parameters already in the query.
    pub fn new(param_offset: usize, color_storage: ColorStorage) -> Self {
        Self {
            param_offset,
            color_storage,
        }
    }

    /// Build the fragment and its parameters. Always a valid boolean expression.
    pub fn build(&self, predicate: &FilterPredicate) -> (String, Vec<QueryParam>) {
        let mut params = Vec::new();
        let sql = match predicate {
            FilterPredicate::Author(filter) => self.relation(filter, &AUTHOR_SQL, &mut params),
            FilterPredicate::Tag(filter) => self.relation(filter, &TAG_SQL, &mut params),
            FilterPredicate::Favorite {
                principal_id,
                favorited,
            } => {
                let idx = self.push(&mut params, QueryParam::Uuid(*principal_id));
                let exists = format!(
                    "EXISTS (SELECT 1 FROM favorite_stack f WHERE f.stack_id = s.id AND f.user_id = ${idx})"
                );
                if *favorited {
                    exists
                } else {
                    format!("NOT {exists}")
                }
            }
            FilterPredicate::Liked(true) => "s.like_count > 0".to_string(),
            FilterPredicate::Liked(false) => "s.like_count = 0".to_string(),
            FilterPredicate::MediaType(types) => {
                let values = types.iter().map(|t| t.as_str().to_string()).collect();
                let idx = self.push(&mut params, QueryParam::StringArray(values));
                format!("s.media_type = ANY(${idx}::text[])")
            }
            FilterPredicate::Collection(CollectionFilter::Collection(id)) => {
                let idx = self.push(&mut params, QueryParam::Uuid(*id));
                format!(
                    "EXISTS (SELECT 1 FROM collection_stack cs JOIN collection c ON c.id = cs.collection_id \
                     WHERE cs.stack_id = s.id AND cs.collection_id = ${idx} AND c.dataset_id = s.dataset_id)"
                )
            }
            FilterPredicate::Collection(CollectionFilter::Members(ids)) => {
                let idx = self.push(&mut params, QueryParam::UuidArray(ids.clone()));
                format!("s.id = ANY(${idx}::uuid[])")
            }
            FilterPredicate::Color { filter, metric } => self.color(filter, *metric, &mut params),
        };
        (sql, params)
    }

    fn push(&self, params: &mut Vec<QueryParam>, param: QueryParam) -> usize {
        params.push(param);
        self.param_offset + params.len()
    }

    fn relation(
        &self,
        filter: &RelationFilter,
        sql: &RelationSql,
        params: &mut Vec<QueryParam>,
    ) -> String {
        let mut positive = Vec::new();
        for id in &filter.include {
            let idx = self.push(params, QueryParam::Uuid(*id));
            positive.push((sql.has_one)(idx));
        }
        if !filter.include_any.is_empty() {
            let idx = self.push(params, QueryParam::UuidArray(filter.include_any.clone()));
            positive.push((sql.has_any)(idx));
        }

        let mut clauses = Vec::new();
        match (positive.is_empty(), filter.not_set) {
            (true, false) => {}
            (true, true) => clauses.push(sql.unset.to_string()),
            (false, false) => clauses.push(format!("({})", positive.join(" AND "))),
            (false, true) => clauses.push(format!(
                "(({}) OR {})",
                positive.join(" AND "),
                sql.unset
            )),
        }

        if !filter.exclude.is_empty() {
            let idx = self.push(params, QueryParam::UuidArray(filter.exclude.clone()));
            clauses.push(format!("NOT COALESCE({}, FALSE)", (sql.has_any)(idx)));
        }

        if clauses.is_empty() {
            "TRUE".to_string()
        } else {
            clauses.join(" AND ")
        }
    }

    fn color(
        &self,
        filter: &ColorFilter,
        metric: ColorDistanceMetric,
        params: &mut Vec<QueryParam>,
    ) -> String {
        let cols = self.color_storage.columns();
        let condition = match filter {
            ColorFilter::Hue {
                categories,
                chromatic_only,
            } => {
                let chromatic: Vec<String> = categories
                    .iter()
                    .filter(|c| **c != HueCategory::Gray)
                    .map(|c| c.as_str().to_string())
                    .collect();
                let wants_gray = categories.contains(&HueCategory::Gray);
                if chromatic.is_empty() && !wants_gray {
                    return "TRUE".to_string();
                }

                let needs_gray = wants_gray || (*chromatic_only && !chromatic.is_empty());
                let gray = needs_gray
                    .then(|| self.push(params, QueryParam::Int(i32::from(GRAY_SATURATION_MAX))));
                let mut branches = Vec::new();
                if !chromatic.is_empty() {
                    let idx = self.push(params, QueryParam::StringArray(chromatic));
                    let in_bucket = format!("{} = ANY(${idx}::text[])", cols.category);
                    match gray {
                        Some(gray) if *chromatic_only => branches.push(format!(
                            "({} > ${gray} AND {in_bucket})",
                            cols.saturation
                        )),
                        _ => branches.push(in_bucket),
                    }
                }
                if let Some(gray) = gray.filter(|_| wants_gray) {
                    branches.push(format!("{} <= ${gray}", cols.saturation));
                }
                format!("({})", branches.join(" OR "))
            }
            ColorFilter::Tone { hsl, .. } | ColorFilter::Similar { hsl, .. } => {
                let max = filter.max_distance().unwrap_or(0.0);
                let h = self.push(params, QueryParam::Int(i32::from(hsl.h)));
                let s = self.push(params, QueryParam::Int(i32::from(hsl.s)));
                let l = self.push(params, QueryParam::Int(i32::from(hsl.l)));
                let m = self.push(params, QueryParam::Float(max));
                let dh = match metric {
                    ColorDistanceMetric::Linear => format!("abs({} - ${h})", cols.hue),
                    ColorDistanceMetric::Circular => format!(
                        "least(abs({hue} - ${h}), 360 - abs({hue} - ${h}))",
                        hue = cols.hue
                    ),
                };
                format!(
                    "sqrt(power(({dh})::float8, 2) + power(({sat} - ${s})::float8, 2) + power(({light} - ${l})::float8, 2)) <= ${m}::float8",
                    sat = cols.saturation,
                    light = cols.lightness
                )
            }
        };
        format!("EXISTS (SELECT 1 FROM {} {condition})", cols.source)
    }
}
