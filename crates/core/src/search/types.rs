//! Request and response types for the search path.
//!
//! The serialised field names are the service's public API shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{Manhwa, RankedManhwa, SearchFilters, StoreError};

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size and list limit the service serves.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Synopsis excerpt length in search results.
const SYNOPSIS_EXCERPT_CHARS: usize = 200;

/// A catalogue search request, already validated by the transport layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub include_external: bool,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl SearchRequest {
    pub fn titled(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            include_external: false,
        }
    }

    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    /// Canonical cache key: fixed field order and sorted filter lists, so
    /// logically equal requests share a key.
    pub fn cache_key(&self) -> String {
        let mut genres = self.filters.genres.clone();
        genres.sort();
        let mut statuses: Vec<&str> = self.filters.status.iter().map(|s| s.as_str()).collect();
        statuses.sort();
        let years = match self.filters.year_range {
            Some(range) => format!("{}-{}", range.start, range.end),
            None => String::new(),
        };
        format!(
            "search:q={}|g={}|s={}|y={}|p={}|l={}|x={}",
            self.query.trim(),
            genres.join(","),
            statuses.join(","),
            years,
            self.effective_page(),
            self.effective_limit(),
            self.include_external,
        )
    }
}

/// One search hit, reduced for list rendering. External hits carry `id = 0`
/// because they have no local row yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManhwaSearchResult {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_thumb: Option<String>,
    pub synopsis: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chapters: Option<u32>,
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ManhwaSearchResult {
    pub fn from_entity(manhwa: &Manhwa, score: Option<f64>) -> Self {
        Self {
            id: manhwa.id,
            title: manhwa.title_data.primary.clone(),
            cover_thumb: manhwa.cover_thumb.clone(),
            synopsis: truncate_synopsis(&manhwa.synopsis),
            status: manhwa.status.as_str().to_string(),
            total_chapters: manhwa.total_chapters,
            genres: manhwa.genres.iter().map(|g| g.name.clone()).collect(),
            score,
        }
    }

    pub fn from_ranked(hit: &RankedManhwa) -> Self {
        Self::from_entity(&hit.manhwa, hit.score)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_results: u64,
}

impl Pagination {
    pub fn new(current_page: u32, total_results: u64, limit: u32) -> Self {
        let limit = limit.max(1) as u64;
        Self {
            current_page,
            total_pages: total_results.div_ceil(limit) as u32,
            total_results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    pub sources_queried: Vec<String>,
    #[serde(rename = "queryTime_ms")]
    pub query_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ManhwaSearchResult>,
    pub pagination: Pagination,
    pub metadata: SearchMetadata,
}

/// Errors for the search path.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search failed: {0}")]
    Store(String),
}

impl From<StoreError> for SearchError {
    fn from(e: StoreError) -> Self {
        SearchError::Store(e.to_string())
    }
}

/// Cut a synopsis down to an excerpt, appending an ellipsis when text was
/// dropped.
pub fn truncate_synopsis(synopsis: &str) -> String {
    if synopsis.chars().count() <= SYNOPSIS_EXCERPT_CHARS {
        return synopsis.to_string();
    }
    let mut excerpt: String = synopsis.chars().take(SYNOPSIS_EXCERPT_CHARS).collect();
    excerpt.push('…');
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PublicationStatus, YearRange};

    #[test]
    fn test_cache_key_is_stable_across_list_order() {
        let mut a = SearchRequest::titled("tower");
        a.filters.genres = vec!["action".to_string(), "drama".to_string()];
        a.filters.status = vec![PublicationStatus::Ongoing, PublicationStatus::Hiatus];

        let mut b = SearchRequest::titled("tower");
        b.filters.genres = vec!["drama".to_string(), "action".to_string()];
        b.filters.status = vec![PublicationStatus::Hiatus, PublicationStatus::Ongoing];

        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_distinguishes_requests() {
        let a = SearchRequest::titled("tower");
        let mut b = SearchRequest::titled("tower");
        b.include_external = true;
        let mut c = SearchRequest::titled("tower");
        c.page = 2;
        let mut d = SearchRequest::titled("tower");
        d.filters.year_range = Some(YearRange {
            start: 2010,
            end: 2020,
        });

        let keys = [a.cache_key(), b.cache_key(), c.cache_key(), d.cache_key()];
        for (i, key) in keys.iter().enumerate() {
            assert!(key.starts_with("search:"));
            for other in keys.iter().skip(i + 1) {
                assert_ne!(key, other);
            }
        }
    }

    #[test]
    fn test_truncate_synopsis_exact_budget() {
        let short = "Short synopsis.";
        assert_eq!(truncate_synopsis(short), short);

        let exact: String = "a".repeat(200);
        assert_eq!(truncate_synopsis(&exact), exact);

        let long: String = "b".repeat(250);
        let truncated = truncate_synopsis(&long);
        assert_eq!(truncated.chars().count(), 201);
        assert!(truncated.ends_with('…'));
        assert!(truncated.starts_with(&"b".repeat(200)));
    }

    #[test]
    fn test_truncate_synopsis_counts_chars_not_bytes() {
        let long: String = "한".repeat(220);
        let truncated = truncate_synopsis(&long);
        assert_eq!(truncated.chars().count(), 201);
    }

    #[test]
    fn test_pagination_ceiling_division() {
        assert_eq!(Pagination::new(1, 0, 20).total_pages, 0);
        assert_eq!(Pagination::new(1, 1, 20).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
        assert_eq!(Pagination::new(1, 21, 20).total_pages, 2);
    }

    #[test]
    fn test_effective_bounds() {
        let mut request = SearchRequest::titled("x");
        request.page = 0;
        request.limit = 500;
        assert_eq!(request.effective_page(), 1);
        assert_eq!(request.effective_limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_request_deserialises_with_defaults() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "solo"}"#).unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, DEFAULT_PAGE_SIZE);
        assert!(!request.include_external);
        assert!(request.filters.is_empty());
    }

    #[test]
    fn test_metadata_serialises_query_time_field() {
        let metadata = SearchMetadata {
            sources_queried: vec!["local".to_string()],
            query_time_ms: 12,
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"queryTime_ms\":12"));
        assert!(json.contains("sourcesQueried"));
    }
}
