//! mosaic-query: run one search against a mosaic database and print the
//! page as JSON.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use mosaic_db::{log_pool_metrics, ColorStorage, Database, PoolConfig};
use mosaic_search::{
    ColorFilter, HueCategory, MediaType, SearchConfig, SearchEngine, SearchMode, SearchPage,
    SearchRequest, SimilarityOptions, SortField, SortOrder, StackFilter, StackSummary,
};

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Storage {
    SideTable,
    EmbeddedJson,
}

impl From<Storage> for ColorStorage {
    fn from(storage: Storage) -> Self {
        match storage {
            Storage::SideTable => ColorStorage::SideTable,
            Storage::EmbeddedJson => ColorStorage::EmbeddedJson,
        }
    }
}

#[derive(Parser)]
#[command(name = "mosaic-query")]
#[command(author, version, about = "Run one search against a mosaic dataset")]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Dataset to search
    #[arg(short, long)]
    dataset: Uuid,

    /// Search mode: all, similar, or unified
    #[arg(short, long, default_value = "all")]
    mode: SearchMode,

    /// Free-text query (unified mode)
    #[arg(short, long)]
    query: Option<String>,

    /// Reference stack (similar mode)
    #[arg(short, long)]
    reference: Option<Uuid>,

    /// Minimum similarity score in [0, 1]
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum shared auto tags for a similarity candidate
    #[arg(long)]
    auto_min_overlap: Option<usize>,

    /// Sort field: recommended, name, created_at, updated_at, likes
    #[arg(long, default_value = "recommended")]
    sort: SortField,

    /// Sort order: asc or desc
    #[arg(long, default_value = "desc")]
    order: SortOrder,

    #[arg(long, default_value_t = 0)]
    offset: usize,

    #[arg(long, default_value_t = mosaic_core::defaults::PAGE_LIMIT)]
    limit: usize,

    /// Only stacks with (true) or without (false) likes
    #[arg(long)]
    liked: Option<bool>,

    /// Only favorited (true) or non-favorited (false) stacks
    #[arg(long)]
    favorite: Option<bool>,

    /// Media types to include (repeatable)
    #[arg(long = "media-type")]
    media_types: Vec<MediaType>,

    /// Hue categories to include (repeatable)
    #[arg(long)]
    hue: Vec<HueCategory>,

    /// Keep desaturated samples out of the chromatic hue categories
    #[arg(long, requires = "hue")]
    chromatic_only: bool,

    /// Where color samples are read from
    #[arg(long, value_enum, default_value = "side-table")]
    color_storage: Storage,

    /// Include stack summaries for the page
    #[arg(long)]
    hydrate: bool,

    #[arg(long, value_enum, env = "LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[derive(Serialize)]
struct Output {
    #[serde(flatten)]
    page: SearchPage,
    #[serde(skip_serializing_if = "Option::is_none")]
    stacks: Option<Vec<StackSummary>>,
}

impl Cli {
    fn request(&self) -> SearchRequest {
        let mut filter = StackFilter::new();
        if let Some(liked) = self.liked {
            filter = filter.with_liked(liked);
        }
        if let Some(favorite) = self.favorite {
            filter = filter.with_favorite(favorite);
        }
        if !self.media_types.is_empty() {
            filter = filter.with_media_types(self.media_types.clone());
        }
        if !self.hue.is_empty() {
            let color = if self.chromatic_only {
                ColorFilter::chromatic_hue(self.hue.clone())
            } else {
                ColorFilter::hue(self.hue.clone())
            };
            filter = filter.with_color(color);
        }

        let mut similarity = SimilarityOptions::new();
        if let Some(threshold) = self.threshold {
            similarity = similarity.with_threshold(threshold);
        }
        if let Some(overlap) = self.auto_min_overlap {
            similarity = similarity.with_auto_min_overlap(overlap);
        }

        SearchRequest {
            mode: self.mode,
            query: self.query.clone(),
            reference_stack_id: self.reference,
            similarity: Some(similarity),
            ..SearchRequest::default()
        }
        .with_filter(filter)
        .with_sort(self.sort, self.order)
        .with_pagination(self.offset, self.limit)
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mosaic_search=info,mosaic_db=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let db = Database::connect_with_config(&cli.database_url, PoolConfig::from_env())
        .await
        .context("connecting to database")?
        .with_color_storage(cli.color_storage.into());
    let engine = SearchEngine::new(Arc::new(db.stacks.clone()), SearchConfig::from_env());
    let search = engine.dataset(cli.dataset);

    let request = cli.request();
    info!(mode = %request.mode, dataset_id = %cli.dataset, "Running search");
    let page = search.search(&request).await?;
    let stacks = if cli.hydrate {
        Some(search.hydrate(&page).await?)
    } else {
        None
    };
    log_pool_metrics(db.pool());

    println!("{}", serde_json::to_string_pretty(&Output { page, stacks })?);
    Ok(())
}
