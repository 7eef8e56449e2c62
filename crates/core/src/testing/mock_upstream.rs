//! Mock upstream catalogue for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::upstream::{
    build_cover_urls, CoverUrls, UpstreamCatalog, UpstreamError, UpstreamManga,
    UpstreamSearchQuery, UpstreamTag, MAX_PAGE_SIZE, PAGINATION_CEILING,
};

/// Mock implementation of the [`UpstreamCatalog`] trait.
///
/// Provides controllable behaviour for testing:
/// - Records kept by upstream id, plus a configurable search result list
/// - Recorded queries and call counters for assertions
/// - One-shot and sticky error injection
pub struct MockUpstream {
    mangas: Arc<RwLock<HashMap<String, UpstreamManga>>>,
    search_results: Arc<RwLock<Vec<UpstreamManga>>>,
    tags: Arc<RwLock<Vec<UpstreamTag>>>,
    recorded_searches: Arc<RwLock<Vec<UpstreamSearchQuery>>>,
    get_calls: Arc<RwLock<Vec<String>>>,
    tag_calls: Arc<RwLock<usize>>,
    next_get_error: Arc<RwLock<Option<UpstreamError>>>,
    fail_all_searches: Arc<RwLock<bool>>,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUpstream {
    pub fn new() -> Self {
        Self {
            mangas: Arc::new(RwLock::new(HashMap::new())),
            search_results: Arc::new(RwLock::new(Vec::new())),
            tags: Arc::new(RwLock::new(Vec::new())),
            recorded_searches: Arc::new(RwLock::new(Vec::new())),
            get_calls: Arc::new(RwLock::new(Vec::new())),
            tag_calls: Arc::new(RwLock::new(0)),
            next_get_error: Arc::new(RwLock::new(None)),
            fail_all_searches: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a record for `get_manga` (and `random`).
    pub async fn put_manga(&self, record: UpstreamManga) {
        self.mangas.write().await.insert(record.id.clone(), record);
    }

    /// Set the records returned by `search`.
    pub async fn set_search_results(&self, records: Vec<UpstreamManga>) {
        *self.search_results.write().await = records;
    }

    pub async fn set_tags(&self, tags: Vec<UpstreamTag>) {
        *self.tags.write().await = tags;
    }

    /// Fail the next `get_manga` with the given error.
    pub async fn fail_next_get(&self, error: UpstreamError) {
        *self.next_get_error.write().await = Some(error);
    }

    /// Make every `search` call fail until cleared.
    pub async fn fail_searches(&self) {
        *self.fail_all_searches.write().await = true;
    }

    pub async fn clear_search_failures(&self) {
        *self.fail_all_searches.write().await = false;
    }

    pub async fn recorded_searches(&self) -> Vec<UpstreamSearchQuery> {
        self.recorded_searches.read().await.clone()
    }

    pub async fn search_count(&self) -> usize {
        self.recorded_searches.read().await.len()
    }

    pub async fn get_count(&self) -> usize {
        self.get_calls.read().await.len()
    }

    pub async fn tag_fetch_count(&self) -> usize {
        *self.tag_calls.read().await
    }
}

#[async_trait]
impl UpstreamCatalog for MockUpstream {
    async fn search(
        &self,
        query: &UpstreamSearchQuery,
    ) -> Result<Vec<UpstreamManga>, UpstreamError> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        if query.offset.saturating_add(limit) > PAGINATION_CEILING {
            return Err(UpstreamError::PaginationLimitExceeded {
                offset: query.offset,
                limit,
            });
        }

        self.recorded_searches.write().await.push(query.clone());

        if *self.fail_all_searches.read().await {
            return Err(UpstreamError::Connection(
                "mock upstream unavailable".to_string(),
            ));
        }

        let results = self.search_results.read().await;
        Ok(results.iter().take(limit as usize).cloned().collect())
    }

    async fn get_manga(&self, uuid: &str) -> Result<UpstreamManga, UpstreamError> {
        self.get_calls.write().await.push(uuid.to_string());

        if let Some(error) = self.next_get_error.write().await.take() {
            return Err(error);
        }

        self.mangas
            .read()
            .await
            .get(uuid)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(format!("manga {uuid}")))
    }

    async fn random(&self) -> Result<UpstreamManga, UpstreamError> {
        self.mangas
            .read()
            .await
            .values()
            .next()
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound("no records registered".to_string()))
    }

    async fn list_tags(&self) -> Vec<UpstreamTag> {
        *self.tag_calls.write().await += 1;
        self.tags.read().await.clone()
    }

    fn cover_urls(&self, manga: &UpstreamManga) -> Option<CoverUrls> {
        build_cover_urls("https://upstream.test", manga)
    }
}
