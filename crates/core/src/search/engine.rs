//! Store-backed search execution.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::{
    ManhwaSearchResult, Pagination, SearchError, SearchMetadata, SearchRequest, SearchResponse,
    MAX_PAGE_SIZE,
};
use crate::metrics;
use crate::store::{ManhwaStore, PublicationStatus, SearchFilters};

/// Executes catalogue searches against the local store.
pub struct SearchEngine {
    store: Arc<dyn ManhwaStore>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn ManhwaStore>) -> Self {
        Self { store }
    }

    /// Strip characters that would interfere with query parsing downstream.
    pub fn sanitise(query: &str) -> String {
        query
            .chars()
            .filter(|c| !matches!(c, '\'' | '"' | '\\'))
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Ranked search when the query has text, otherwise the filter path
    /// ordered by recency of update.
    pub async fn full_text_search(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let start = Instant::now();
        let page = request.effective_page();
        let limit = request.effective_limit();
        let sanitised = Self::sanitise(&request.query);

        let (hits, total) = if sanitised.is_empty() {
            self.store
                .filter_search(&request.filters, page, limit)?
        } else {
            self.store
                .full_text_search(&sanitised, &request.filters, page, limit)?
        };

        debug!(
            query = %sanitised,
            total,
            page,
            "local search"
        );
        metrics::SEARCH_REQUESTS.with_label_values(&["local"]).inc();

        let elapsed = start.elapsed();
        metrics::SEARCH_DURATION
            .with_label_values(&["local"])
            .observe(elapsed.as_secs_f64());

        Ok(SearchResponse {
            results: hits.iter().map(ManhwaSearchResult::from_ranked).collect(),
            pagination: Pagination::new(page, total, limit),
            metadata: SearchMetadata {
                sources_queried: vec!["local".to_string()],
                query_time_ms: elapsed.as_millis() as u64,
            },
        })
    }

    /// Ongoing series by recency of update.
    pub async fn trending(&self, limit: u32) -> Result<Vec<ManhwaSearchResult>, SearchError> {
        let filters = SearchFilters {
            status: vec![PublicationStatus::Ongoing],
            ..Default::default()
        };
        let (hits, _) = self
            .store
            .filter_search(&filters, 1, limit.clamp(1, MAX_PAGE_SIZE))?;
        Ok(hits.iter().map(ManhwaSearchResult::from_ranked).collect())
    }

    /// Newest rows by creation time.
    pub async fn recently_added(&self, limit: u32) -> Result<Vec<ManhwaSearchResult>, SearchError> {
        let rows = self.store.list_recent(limit.clamp(1, MAX_PAGE_SIZE))?;
        Ok(rows
            .iter()
            .map(|row| ManhwaSearchResult::from_entity(row, None))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ManhwaPatch, NewManhwa, SqliteStore, TitleData};

    fn engine_with_store() -> (SearchEngine, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        (SearchEngine::new(store.clone()), store)
    }

    fn seed(store: &SqliteStore, title: &str, synopsis: &str) -> i64 {
        store
            .insert(NewManhwa::local(
                TitleData::simple(title),
                synopsis,
                PublicationStatus::Ongoing,
            ))
            .unwrap()
            .id
    }

    #[test]
    fn test_sanitise_drops_quoting() {
        assert_eq!(SearchEngine::sanitise(r#"solo' "leveling\"#), "solo leveling");
        assert_eq!(SearchEngine::sanitise("  plain  "), "plain");
        assert_eq!(SearchEngine::sanitise(r#"'"\"#), "");
    }

    #[tokio::test]
    async fn test_ranked_search_prefers_title_matches() {
        let (engine, store) = engine_with_store();
        seed(&store, "The Ascent", "A mountain climb story.");
        seed(&store, "Ascent of the Tower", "Floor after floor.");

        let response = engine
            .full_text_search(&SearchRequest::titled("Ascent Tower"))
            .await
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].title, "Ascent of the Tower");
        assert_eq!(response.results[1].title, "The Ascent");
        assert!(response.results[0].score.unwrap() > response.results[1].score.unwrap());
        assert_eq!(response.metadata.sources_queried, vec!["local"]);
        assert_eq!(response.pagination.total_results, 2);
        assert_eq!(response.pagination.total_pages, 1);
    }

    #[tokio::test]
    async fn test_blank_query_lists_by_recency() {
        let (engine, store) = engine_with_store();
        let first = seed(&store, "First", "Inserted first.");
        seed(&store, "Second", "Inserted second.");
        store
            .update(
                first,
                ManhwaPatch {
                    synopsis: Some("Touched last.".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let response = engine
            .full_text_search(&SearchRequest::titled("   "))
            .await
            .unwrap();

        assert_eq!(response.results[0].id, first);
        assert!(response.results[0].score.is_none());
    }

    #[tokio::test]
    async fn test_query_of_only_quotes_is_blank() {
        let (engine, store) = engine_with_store();
        seed(&store, "Anything", "Some synopsis here.");

        let response = engine
            .full_text_search(&SearchRequest::titled(r#"'"\"#))
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn test_synopsis_excerpt_in_results() {
        let (engine, store) = engine_with_store();
        seed(&store, "Long One", &"x".repeat(300));

        let response = engine
            .full_text_search(&SearchRequest::titled("Long"))
            .await
            .unwrap();
        let synopsis = &response.results[0].synopsis;
        assert_eq!(synopsis.chars().count(), 201);
        assert!(synopsis.ends_with('…'));
    }

    #[tokio::test]
    async fn test_total_pages_ceiling() {
        let (engine, store) = engine_with_store();
        for i in 0..5 {
            seed(&store, &format!("Series {i}"), "A filler synopsis.");
        }

        let mut request = SearchRequest::titled("");
        request.limit = 2;
        let response = engine.full_text_search(&request).await.unwrap();
        assert_eq!(response.pagination.total_results, 5);
        assert_eq!(response.pagination.total_pages, 3);
        assert_eq!(response.results.len(), 2);
    }

    #[tokio::test]
    async fn test_trending_filters_to_ongoing() {
        let (engine, store) = engine_with_store();
        seed(&store, "Running", "Still going strong.");
        store
            .insert(NewManhwa::local(
                TitleData::simple("Done"),
                "Wrapped up.",
                PublicationStatus::Completed,
            ))
            .unwrap();

        let trending = engine.trending(20).await.unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].title, "Running");
        assert_eq!(trending[0].status, "ongoing");
    }

    #[tokio::test]
    async fn test_recently_added_orders_by_creation() {
        let (engine, store) = engine_with_store();
        let first = seed(&store, "Oldest", "Added first.");
        let second = seed(&store, "Newest", "Added second.");
        // An update does not change creation order.
        store
            .update(
                first,
                ManhwaPatch {
                    synopsis: Some("Touched.".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let recent = engine.recently_added(20).await.unwrap();
        assert_eq!(recent[0].id, second);
        assert_eq!(recent[1].id, first);
    }

    #[tokio::test]
    async fn test_list_limits_clamped() {
        let (engine, _store) = engine_with_store();
        // A zero or oversized limit is clamped rather than erroring.
        assert!(engine.trending(0).await.is_ok());
        assert!(engine.recently_added(10_000).await.is_ok());
    }
}
