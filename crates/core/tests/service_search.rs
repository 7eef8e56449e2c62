//! End-to-end search behaviour of the catalogue service: ranked local
//! results, the external fallback, coalescing and cache invalidation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use manhwadex_core::cache::CacheLayer;
use manhwadex_core::config::CacheConfig;
use manhwadex_core::search::SearchRequest;
use manhwadex_core::service::{CatalogueService, CreateManhwa};
use manhwadex_core::store::{
    Genre, Manhwa, ManhwaPatch, ManhwaStore, NewManhwa, OutdatedRow, PublicationStatus,
    RankedManhwa, SearchFilters, SqliteStore, StoreError, TitleData,
};
use manhwadex_core::sync::{SyncRunner, Syncer};
use manhwadex_core::testing::{fixtures, MockUpstream};
use manhwadex_core::upstream::{UpstreamCatalog, UpstreamTag};

/// Store wrapper that counts search executions and can slow them down to
/// widen the coalescing window.
struct CountingStore {
    inner: SqliteStore,
    searches: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingStore {
    fn new(delay: Option<Duration>) -> Self {
        Self {
            inner: SqliteStore::in_memory().unwrap(),
            searches: AtomicUsize::new(0),
            delay,
        }
    }

    fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn count_one(&self) {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
    }
}

impl ManhwaStore for CountingStore {
    fn find_by_id(&self, id: i64) -> Result<Manhwa, StoreError> {
        self.inner.find_by_id(id)
    }

    fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Manhwa>, StoreError> {
        self.inner.find_by_ids(ids)
    }

    fn find_by_upstream_id(&self, upstream_id: &str) -> Result<Option<Manhwa>, StoreError> {
        self.inner.find_by_upstream_id(upstream_id)
    }

    fn insert(&self, row: NewManhwa) -> Result<Manhwa, StoreError> {
        self.inner.insert(row)
    }

    fn update(&self, id: i64, patch: ManhwaPatch) -> Result<(), StoreError> {
        self.inner.update(id, patch)
    }

    fn mark_sync_failed(&self, id: i64) -> Result<(), StoreError> {
        self.inner.mark_sync_failed(id)
    }

    fn full_text_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RankedManhwa>, u64), StoreError> {
        self.count_one();
        self.inner.full_text_search(query, filters, page, limit)
    }

    fn filter_search(
        &self,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RankedManhwa>, u64), StoreError> {
        self.count_one();
        self.inner.filter_search(filters, page, limit)
    }

    fn list_recent(&self, limit: u32) -> Result<Vec<Manhwa>, StoreError> {
        self.inner.list_recent(limit)
    }

    fn list_outdated(
        &self,
        threshold: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<OutdatedRow>, StoreError> {
        self.inner.list_outdated(threshold, limit)
    }

    fn list_genres_by_slug(&self, slugs: &[String]) -> Result<Vec<Genre>, StoreError> {
        self.inner.list_genres_by_slug(slugs)
    }

    fn list_all_genres(&self) -> Result<Vec<Genre>, StoreError> {
        self.inner.list_all_genres()
    }

    fn upsert_genre(&self, name: &str, slug: &str) -> Result<Genre, StoreError> {
        self.inner.upsert_genre(name, slug)
    }

    fn attach_genres(&self, id: i64, genre_ids: &[i64]) -> Result<(), StoreError> {
        self.inner.attach_genres(id, genre_ids)
    }
}

fn build_service(
    store: Arc<dyn ManhwaStore>,
    upstream: Arc<MockUpstream>,
) -> (Arc<CatalogueService>, Arc<CacheLayer>) {
    let cache = Arc::new(CacheLayer::new(&CacheConfig::default()));
    let runner = Arc::new(SyncRunner::new(
        store.clone(),
        upstream.clone() as Arc<dyn UpstreamCatalog>,
        cache.clone(),
    ));
    let syncer = Arc::new(Syncer::new(
        runner.clone() as _,
        store.clone(),
        10,
        Duration::from_secs(900),
    ));
    let service = Arc::new(CatalogueService::new(
        store,
        upstream as Arc<dyn UpstreamCatalog>,
        cache.clone(),
        runner,
        syncer,
    ));
    (service, cache)
}

fn seed(store: &dyn ManhwaStore, title: &str, synopsis: &str) -> i64 {
    store
        .insert(NewManhwa::local(
            TitleData::simple(title),
            synopsis,
            PublicationStatus::Ongoing,
        ))
        .unwrap()
        .id
}

#[tokio::test]
async fn local_search_returns_ranked_hits() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    seed(store.as_ref(), "The Ascent", "A mountain climb story.");
    seed(store.as_ref(), "Ascent of the Tower", "Floor after floor.");
    let (service, _) = build_service(store, Arc::new(MockUpstream::new()));

    let mut request = SearchRequest::titled("Ascent Tower");
    request.limit = 10;
    let response = service.search(request).await.unwrap();

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].title, "Ascent of the Tower");
    assert_eq!(response.results[1].title, "The Ascent");
    assert_eq!(response.metadata.sources_queried, vec!["local"]);
}

#[tokio::test]
async fn external_fallback_fills_empty_local_results() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let upstream = Arc::new(MockUpstream::new());

    let mut record = fixtures::upstream_record("5c1e0f1a-2222-4333-8444-555566667777", "Solo Climb");
    record.description.insert(
        "en".to_string(),
        "s".repeat(250), // Longer than the excerpt budget.
    );
    record.cover_filename = Some("solo.jpg".to_string());
    upstream.set_search_results(vec![record]).await;

    let (service, _) = build_service(store, upstream.clone());

    let mut request = SearchRequest::titled("Solo");
    request.include_external = true;
    let response = service.search(request).await.unwrap();

    assert_eq!(response.results.len(), 1);
    let hit = &response.results[0];
    assert_eq!(hit.id, 0);
    assert_eq!(hit.title, "Solo Climb");
    assert_eq!(hit.synopsis.chars().count(), 201);
    assert!(hit.synopsis.ends_with('…'));
    assert!(hit.cover_thumb.as_deref().unwrap().ends_with(".256.jpg"));
    assert_eq!(
        response.metadata.sources_queried,
        vec!["local", "external"]
    );
    assert_eq!(response.pagination.total_pages, 1);
    assert_eq!(response.pagination.total_results, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn identical_concurrent_searches_are_coalesced() {
    let store = Arc::new(CountingStore::new(Some(Duration::from_millis(50))));
    seed(&*store, "Tower of Night", "Climbing through the dark.");
    let (service, _) = build_service(store.clone(), Arc::new(MockUpstream::new()));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.search(SearchRequest::titled("Tower")).await
        }));
    }

    let mut responses = Vec::new();
    for handle in handles {
        responses.push(handle.await.unwrap().unwrap());
    }

    // One store query served all ten callers.
    assert_eq!(store.search_count(), 1);
    for response in &responses {
        assert_eq!(response.results.len(), 1);
        assert_eq!(
            response.metadata.query_time_ms,
            responses[0].metadata.query_time_ms
        );
    }

    // A later identical request is a cache hit, not a new query.
    service
        .search(SearchRequest::titled("Tower"))
        .await
        .unwrap();
    assert_eq!(store.search_count(), 1);
}

#[tokio::test]
async fn writes_invalidate_cached_searches() {
    let store = Arc::new(CountingStore::new(None));
    seed(&*store, "Existing", "Already in the catalogue.");
    let (service, _) = build_service(store.clone(), Arc::new(MockUpstream::new()));

    let request = SearchRequest::titled("catalogue");
    let first = service.search(request.clone()).await.unwrap();
    assert_eq!(first.results.len(), 1);
    assert_eq!(store.search_count(), 1);

    // Cached: no new store query.
    service.search(request.clone()).await.unwrap();
    assert_eq!(store.search_count(), 1);

    // A create drops the whole search tier...
    service
        .create(CreateManhwa {
            title_data: TitleData::simple("Fresh Catalogue Entry"),
            synopsis: "A brand new catalogue row.".to_string(),
            status: PublicationStatus::Ongoing,
            publisher: None,
            start_year: None,
            end_year: None,
            total_chapters: None,
            special_chapters: None,
            genres: Vec::new(),
        })
        .await
        .unwrap();

    // ...so the next search re-queries and sees the new row.
    let after = service.search(request).await.unwrap();
    assert_eq!(store.search_count(), 2);
    assert_eq!(after.results.len(), 2);
}

#[tokio::test]
async fn genre_slugs_resolve_to_upstream_tags() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let upstream = Arc::new(MockUpstream::new());
    upstream
        .set_tags(vec![
            UpstreamTag {
                id: "tag-romance".to_string(),
                name: "Romance".to_string(),
                group: "genre".to_string(),
            },
            UpstreamTag {
                id: "tag-scifi".to_string(),
                name: "Sci Fi".to_string(),
                group: "genre".to_string(),
            },
        ])
        .await;

    let (service, _) = build_service(store, upstream.clone());

    let mut request = SearchRequest::titled("anything");
    request.include_external = true;
    request.filters.genres = vec!["romance".to_string(), "sci-fi".to_string()];
    service.search(request.clone()).await.unwrap();

    let searches = upstream.recorded_searches().await;
    assert_eq!(searches.len(), 1);
    let mut tags = searches[0].included_tags.clone();
    tags.sort();
    assert_eq!(tags, vec!["tag-romance", "tag-scifi"]);
    assert_eq!(upstream.tag_fetch_count().await, 1);

    // The tag dictionary is now cached; a fresh search does not refetch it.
    let mut request = request;
    request.query = "something else".to_string();
    service.search(request).await.unwrap();
    assert_eq!(upstream.tag_fetch_count().await, 1);
}
