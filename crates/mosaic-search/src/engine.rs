//! Search orchestration.
//!
//! [`SearchEngine`] owns the store handle, the configuration, and the tag
//! statistics cache. [`SearchEngine::dataset`] binds it to one dataset and
//! returns a [`DatasetSearch`], the value every search runs through.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use mosaic_core::{
    Error, Pagination, Result, ScoredIds, SearchMode, SearchPage, SearchRequest,
    SimilarityOptions, SortField, SortOrder, StackFilter, StackIndex, StackSummary,
};

use crate::composer::FilterComposer;
use crate::config::SearchConfig;
use crate::similarity::TagSimilarity;
use crate::tag_stats::TagStatistics;
use crate::unified::UnifiedSearch;

/// Search engine shared across requests.
#[derive(Clone)]
pub struct SearchEngine {
    index: Arc<dyn StackIndex>,
    stats: Arc<TagStatistics>,
    config: Arc<SearchConfig>,
}

impl SearchEngine {
    pub fn new(index: Arc<dyn StackIndex>, config: SearchConfig) -> Self {
        let stats = Arc::new(TagStatistics::new(index.clone(), config.tag_stats_ttl));
        Self {
            index,
            stats,
            config: Arc::new(config),
        }
    }

    /// Bind to one dataset.
    pub fn dataset(&self, dataset_id: Uuid) -> DatasetSearch {
        DatasetSearch {
            dataset_id,
            index: self.index.clone(),
            stats: self.stats.clone(),
            config: self.config.clone(),
        }
    }

    /// Run `request` against `dataset_id`.
    pub async fn search(&self, dataset_id: Uuid, request: &SearchRequest) -> Result<SearchPage> {
        self.dataset(dataset_id).search(request).await
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn tag_statistics(&self) -> &TagStatistics {
        &self.stats
    }
}

/// Search operations bound to one dataset.
#[derive(Clone)]
pub struct DatasetSearch {
    dataset_id: Uuid,
    index: Arc<dyn StackIndex>,
    stats: Arc<TagStatistics>,
    config: Arc<SearchConfig>,
}

impl DatasetSearch {
    pub fn dataset_id(&self) -> Uuid {
        self.dataset_id
    }

    /// Validate, generate candidates for the mode, filter, order, and
    /// paginate, all under the configured deadline.
    #[instrument(skip(self, request), fields(
        subsystem = "search",
        component = "orchestrator",
        op = "search",
        dataset_id = %self.dataset_id,
        mode = %request.mode,
    ))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let start = Instant::now();
        request.validate()?;

        let deadline = self.config.request_timeout;
        let page = tokio::time::timeout(deadline, self.run(request))
            .await
            .map_err(|_| Error::Timeout(deadline.as_millis() as u64))??;

        info!(
            result_count = page.items.len(),
            total = page.total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(page)
    }

    async fn run(&self, request: &SearchRequest) -> Result<SearchPage> {
        let candidates = match request.mode {
            SearchMode::All => None,
            SearchMode::Similar => {
                let reference = request.reference_stack_id.ok_or_else(|| {
                    Error::InvalidRequest("similar search requires reference_stack_id".to_string())
                })?;
                let options = request.similarity.unwrap_or_default();
                Some(self.similar(reference, &options).await?)
            }
            SearchMode::Unified => {
                let query = request.query.as_deref().unwrap_or_default();
                Some(self.unified(query).await?)
            }
        };
        if let Some(candidates) = &candidates {
            debug!(candidate_count = candidates.len(), "Candidates generated");
        }

        self.compose(
            candidates,
            &request.filter,
            request.sort,
            request.order,
            request.pagination,
        )
        .await
    }

    /// Stacks similar to `reference`, scored.
    #[instrument(skip(self, options), fields(
        subsystem = "search",
        component = "similarity",
        op = "similar",
        dataset_id = %self.dataset_id,
        stack_id = %reference,
    ))]
    pub async fn similar(
        &self,
        reference: Uuid,
        options: &SimilarityOptions,
    ) -> Result<ScoredIds> {
        let params = options.resolve(&self.config.similarity);
        TagSimilarity::new(
            self.index.as_ref(),
            &self.stats,
            self.config.scoring,
            self.config.auto_tag_predict_threshold,
        )
        .find(self.dataset_id, reference, &params)
        .await
    }

    /// Stacks matching free-text `query`, scored.
    #[instrument(skip(self), fields(
        subsystem = "search",
        component = "unified",
        op = "unified",
        dataset_id = %self.dataset_id,
    ))]
    pub async fn unified(&self, query: &str) -> Result<ScoredIds> {
        if query.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "unified search requires a non-empty query".to_string(),
            ));
        }
        UnifiedSearch::new(self.index.as_ref(), self.config.unified)
            .search(self.dataset_id, query)
            .await
    }

    /// Filter `candidates` (every stack when `None`), order, and paginate.
    pub async fn compose(
        &self,
        candidates: Option<ScoredIds>,
        filter: &StackFilter,
        sort: SortField,
        order: SortOrder,
        pagination: Pagination,
    ) -> Result<SearchPage> {
        FilterComposer::new(
            self.index.as_ref(),
            self.config.principal_id,
            self.config.color_metric,
        )
        .compose(self.dataset_id, candidates, filter, sort, order, pagination)
        .await
    }

    /// Summaries of the page's stacks, in page order.
    pub async fn hydrate(&self, page: &SearchPage) -> Result<Vec<StackSummary>> {
        if page.items.is_empty() {
            return Ok(Vec::new());
        }
        self.index
            .fetch_summaries(self.dataset_id, &page.items, self.config.principal_id)
            .await
    }
}
