//! The catalogue service facade.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use super::ServiceError;
use crate::cache::{CacheLayer, TierStats};
use crate::coalesce::Coalescer;
use crate::metrics;
use crate::search::{
    truncate_synopsis, ManhwaSearchResult, Pagination, SearchEngine, SearchRequest, SearchResponse,
};
use crate::store::{Genre, Manhwa, ManhwaStore, NewManhwa, PublicationStatus, TitleData};
use crate::sync::{SyncExecutor, SyncReport, SyncRunner, Syncer};
use crate::upstream::{to_patch, UpstreamCatalog, UpstreamManga, UpstreamSearchQuery};

/// Create payload for a local row. Inputs are transport-validated; the
/// service re-checks the invariants it owns.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateManhwa {
    pub title_data: TitleData,
    pub synopsis: String,
    pub status: PublicationStatus,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub total_chapters: Option<u32>,
    #[serde(default)]
    pub special_chapters: Option<u32>,
    /// Genre slugs; every slug must exist.
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Result of a bulk lookup.
#[derive(Debug, Clone)]
pub struct BulkResult {
    pub entities: HashMap<i64, Manhwa>,
    pub not_found: Vec<i64>,
}

/// Public read/write facade over the catalogue's collaborators.
pub struct CatalogueService {
    store: Arc<dyn ManhwaStore>,
    upstream: Arc<dyn UpstreamCatalog>,
    cache: Arc<CacheLayer>,
    engine: Arc<SearchEngine>,
    coalescer: Coalescer<SearchResponse, ServiceError>,
    runner: Arc<SyncRunner>,
    syncer: Arc<Syncer>,
}

impl CatalogueService {
    pub fn new(
        store: Arc<dyn ManhwaStore>,
        upstream: Arc<dyn UpstreamCatalog>,
        cache: Arc<CacheLayer>,
        runner: Arc<SyncRunner>,
        syncer: Arc<Syncer>,
    ) -> Self {
        Self {
            engine: Arc::new(SearchEngine::new(Arc::clone(&store))),
            store,
            upstream,
            cache,
            coalescer: Coalescer::new(),
            runner,
            syncer,
        }
    }

    /// Search the catalogue: cache, then single-flight local search with the
    /// optional external fallback.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, ServiceError> {
        let key = request.cache_key();
        if let Some(hit) = self.cache.search().get(&key) {
            metrics::SEARCH_REQUESTS.with_label_values(&["cache"]).inc();
            return Ok(hit);
        }

        let engine = Arc::clone(&self.engine);
        let upstream = Arc::clone(&self.upstream);
        let cache = Arc::clone(&self.cache);
        let producer_key = key.clone();
        self.coalescer
            .run(&key, async move {
                let start = Instant::now();
                let mut response = engine.full_text_search(&request).await?;

                if response.results.is_empty() && request.include_external {
                    match external_search(&upstream, &cache, &request).await {
                        Ok(results) => {
                            metrics::SEARCH_REQUESTS
                                .with_label_values(&["external"])
                                .inc();
                            response.pagination = Pagination {
                                current_page: request.effective_page(),
                                // The external path does not paginate.
                                total_pages: 1,
                                total_results: results.len() as u64,
                            };
                            response.results = results;
                            response.metadata.sources_queried =
                                vec!["local".to_string(), "external".to_string()];
                        }
                        Err(e) => {
                            warn!("external search fallback failed: {}", e);
                            metrics::SEARCH_REQUESTS
                                .with_label_values(&["external_failed"])
                                .inc();
                            response
                                .metadata
                                .sources_queried
                                .push("external (failed)".to_string());
                        }
                    }
                }

                response.metadata.query_time_ms = start.elapsed().as_millis() as u64;
                cache.search().set(producer_key, response.clone());
                Ok(response)
            })
            .await
    }

    /// Fetch one entity. Stale upstream rows served from cache schedule a
    /// background refresh; on a cache miss the refresh happens inline and a
    /// failure degrades to the stale row.
    pub async fn get_by_id(&self, id: i64, force_refresh: bool) -> Result<Manhwa, ServiceError> {
        let key = CacheLayer::entity_key(id);
        let now = Utc::now();

        if !force_refresh {
            if let Some(entity) = self.cache.entity().get(&key) {
                if entity.should_refresh(now) {
                    if let Some(upstream_id) = entity.upstream_id.clone() {
                        debug!(id, "stale cached entity, scheduling refresh");
                        self.syncer.sync_now(id, &upstream_id);
                    }
                }
                return Ok(entity);
            }
        }

        let mut row = self.store.find_by_id(id)?;
        if force_refresh || row.should_refresh(now) {
            if let Some(upstream_id) = row.upstream_id.clone() {
                let report = self.runner.sync_one(id, &upstream_id).await;
                if report.is_success() {
                    row = self.store.find_by_id(id)?;
                } else {
                    warn!(id, "refresh failed, serving stale row: {}", report.message);
                }
            }
        }

        self.cache.entity().set(key, row.clone());
        Ok(row)
    }

    /// Fetch many entities through the entity cache with a single store
    /// round-trip for the misses.
    pub async fn bulk_get(&self, ids: &[i64]) -> Result<BulkResult, ServiceError> {
        let mut entities = HashMap::new();
        let mut misses = Vec::new();

        for &id in ids {
            match self.cache.entity().get(&CacheLayer::entity_key(id)) {
                Some(entity) => {
                    entities.insert(id, entity);
                }
                None => misses.push(id),
            }
        }

        if !misses.is_empty() {
            for row in self.store.find_by_ids(&misses)? {
                self.cache
                    .entity()
                    .set(CacheLayer::entity_key(row.id), row.clone());
                entities.insert(row.id, row);
            }
        }

        let not_found = ids
            .iter()
            .copied()
            .filter(|id| !entities.contains_key(id))
            .collect();
        Ok(BulkResult {
            entities,
            not_found,
        })
    }

    /// Create a local row. Local rows never synchronise.
    pub async fn create(&self, dto: CreateManhwa) -> Result<Manhwa, ServiceError> {
        if dto.synopsis.trim().chars().count() < 10 {
            return Err(ServiceError::InvalidData(
                "synopsis must be at least 10 characters".to_string(),
            ));
        }

        let genres = self.resolve_genres(&dto.genres)?;

        let mut row = NewManhwa::local(dto.title_data, dto.synopsis, dto.status);
        row.publisher = dto.publisher;
        row.start_year = dto.start_year;
        row.end_year = dto.end_year;
        row.total_chapters = dto.total_chapters;
        row.special_chapters = dto.special_chapters;

        let inserted = self.store.insert(row)?;
        let genre_ids: Vec<i64> = genres.iter().map(|g| g.id).collect();
        self.store.attach_genres(inserted.id, &genre_ids)?;
        let entity = self.store.find_by_id(inserted.id)?;

        self.cache.search().delete_matching("search:");
        Ok(entity)
    }

    /// Import an upstream record as a new row.
    pub async fn import(&self, upstream_id: &str) -> Result<Manhwa, ServiceError> {
        if upstream_id.trim().is_empty() {
            return Err(ServiceError::BadInput(
                "upstream id must not be empty".to_string(),
            ));
        }
        if self.store.find_by_upstream_id(upstream_id)?.is_some() {
            return Err(ServiceError::BadInput(format!(
                "{upstream_id} is already imported"
            )));
        }

        let record = self.upstream.get_manga(upstream_id).await?;
        let covers = self.upstream.cover_urls(&record);
        let row = crate::upstream::to_new_manhwa(&record, covers.as_ref(), Utc::now());
        let entity = self.store.insert(row)?;

        self.cache.search().delete_matching("search:");
        Ok(entity)
    }

    /// Synchronise one row against the upstream record, synchronously.
    pub async fn sync_one(&self, id: i64, upstream_id: &str) -> SyncReport {
        self.runner.sync_one(id, upstream_id).await
    }

    /// Queue a row for high-priority background sync.
    pub fn enqueue_sync(&self, id: i64) -> Result<(), ServiceError> {
        let row = self.store.find_by_id(id)?;
        let Some(upstream_id) = row.upstream_id else {
            return Err(ServiceError::BadInput(format!(
                "manhwa {id} is local-only and does not synchronise"
            )));
        };
        self.syncer.sync_now(id, &upstream_id);
        Ok(())
    }

    /// Admin refresh: resolve the row's upstream id and run one sync.
    pub async fn refresh(&self, id: i64) -> Result<SyncReport, ServiceError> {
        let row = self.store.find_by_id(id)?;
        let Some(upstream_id) = row.upstream_id else {
            return Err(ServiceError::BadInput(format!(
                "manhwa {id} is local-only and does not synchronise"
            )));
        };
        Ok(self.runner.sync_one(id, &upstream_id).await)
    }

    /// Fetch a random upstream record, reduced to the search-result shape.
    pub async fn random_upstream(&self) -> Result<ManhwaSearchResult, ServiceError> {
        let record = self.upstream.random().await?;
        Ok(external_result(self.upstream.as_ref(), &record))
    }

    /// All genres, name ascending.
    pub async fn list_genres(&self) -> Result<Vec<Genre>, ServiceError> {
        Ok(self.store.list_all_genres()?)
    }

    /// Trending titles (ongoing, most recently updated first).
    pub async fn trending(&self, limit: u32) -> Result<Vec<ManhwaSearchResult>, ServiceError> {
        Ok(self.engine.trending(limit).await?)
    }

    /// Most recently added titles.
    pub async fn recently_added(
        &self,
        limit: u32,
    ) -> Result<Vec<ManhwaSearchResult>, ServiceError> {
        Ok(self.engine.recently_added(limit).await?)
    }

    pub fn cache_stats(&self) -> TierStats {
        self.cache.stats()
    }

    /// Substring invalidation over all tiers; returns dropped entries.
    pub fn clear_cache(&self, pattern: &str) -> usize {
        self.cache.delete_matching(pattern)
    }

    /// Test hook mirroring the coalescer's.
    pub fn pending_searches(&self) -> usize {
        self.coalescer.pending()
    }

    fn resolve_genres(&self, slugs: &[String]) -> Result<Vec<Genre>, ServiceError> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        let found = self.store.list_genres_by_slug(slugs)?;
        let unknown: Vec<&str> = slugs
            .iter()
            .filter(|slug| !found.iter().any(|g| &g.slug == *slug))
            .map(|slug| slug.as_str())
            .collect();
        if !unknown.is_empty() {
            return Err(ServiceError::BadInput(format!(
                "unknown genres: {}",
                unknown.join(", ")
            )));
        }
        Ok(found)
    }
}

/// Search the upstream catalogue with the local filters mapped onto it.
async fn external_search(
    upstream: &Arc<dyn UpstreamCatalog>,
    cache: &Arc<CacheLayer>,
    request: &SearchRequest,
) -> Result<Vec<ManhwaSearchResult>, ServiceError> {
    let included_tags = resolve_genre_tags(upstream, cache, &request.filters.genres).await;
    let limit = request.effective_limit();
    let query = UpstreamSearchQuery {
        title: request.query.clone(),
        limit,
        offset: (request.effective_page() - 1).saturating_mul(limit),
        statuses: request
            .filters
            .status
            .iter()
            .map(|status| status.as_str().to_string())
            .collect(),
        included_tags,
        ..Default::default()
    };

    let records = upstream.search(&query).await?;
    Ok(records
        .iter()
        .map(|record| external_result(upstream.as_ref(), record))
        .collect())
}

/// Map genre slugs to upstream tag UUIDs through the tag cache, fetching the
/// dictionary once on a miss. Slugs with no upstream tag are dropped.
async fn resolve_genre_tags(
    upstream: &Arc<dyn UpstreamCatalog>,
    cache: &Arc<CacheLayer>,
    slugs: &[String],
) -> Vec<String> {
    if slugs.is_empty() {
        return Vec::new();
    }

    let resolve = |cache: &CacheLayer| {
        slugs
            .iter()
            .filter_map(|slug| cache.tag().get(&CacheLayer::tag_key(slug)))
            .collect::<Vec<String>>()
    };

    let resolved = resolve(cache);
    if resolved.len() == slugs.len() {
        return resolved;
    }

    for tag in upstream.list_tags().await {
        cache.tag().set(CacheLayer::tag_key(&tag.name), tag.id);
    }
    resolve(cache)
}

/// Reduce an upstream record to the search-result shape. External hits have
/// no local row, marked by `id = 0`.
fn external_result(upstream: &dyn UpstreamCatalog, record: &UpstreamManga) -> ManhwaSearchResult {
    let patch = to_patch(record);
    let title = patch
        .title_data
        .map(|t| t.primary)
        .unwrap_or_else(|| "Untitled".to_string());
    ManhwaSearchResult {
        id: 0,
        title,
        cover_thumb: upstream.cover_urls(record).map(|covers| covers.thumb),
        synopsis: truncate_synopsis(&patch.synopsis.unwrap_or_default()),
        status: patch
            .status
            .unwrap_or(PublicationStatus::Ongoing)
            .as_str()
            .to_string(),
        total_chapters: patch.total_chapters,
        genres: record.genre_names(),
        score: None,
    }
}
