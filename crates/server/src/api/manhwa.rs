//! Public catalogue handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use manhwadex_core::{Genre, Manhwa, ManhwaSearchResult, SearchRequest, SearchResponse};

use super::error::AppError;
use crate::state::AppState;

const MAX_QUERY_CHARS: usize = 200;
const MAX_GENRE_FILTERS: usize = 10;
const MAX_BULK_IDS: usize = 100;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

fn default_list_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct GetParams {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub ids: Vec<Value>,
}

/// Wire shape of the search body: pagination arrives as a nested object.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub query: String,
    #[serde(default)]
    pub filters: manhwadex_core::store::SearchFilters,
    #[serde(default)]
    pub pagination: PaginationParams,
    #[serde(default)]
    pub include_external: bool,
}

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_list_limit(),
        }
    }
}

impl From<SearchBody> for SearchRequest {
    fn from(body: SearchBody) -> Self {
        Self {
            query: body.query,
            filters: body.filters,
            page: body.pagination.page,
            limit: body.pagination.limit,
            include_external: body.include_external,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse {
    pub entities: HashMap<i64, Manhwa>,
    pub not_found: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub results: Vec<ManhwaSearchResult>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/manhwa/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, AppError> {
    let request = SearchRequest::from(body);
    validate_search(&request)?;
    let response = state.service().search(request).await?;
    Ok(Json(response))
}

/// GET /api/v1/manhwa/{id}
pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<GetParams>,
) -> Result<Json<Manhwa>, AppError> {
    if id < 1 {
        return Err(AppError::validation("id must be a positive integer"));
    }
    let entity = state.service().get_by_id(id, params.refresh).await?;
    Ok(Json(entity))
}

/// POST /api/v1/manhwa/bulk
pub async fn bulk_get(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<BulkResponse>, AppError> {
    if request.ids.is_empty() || request.ids.len() > MAX_BULK_IDS {
        return Err(AppError::validation(format!(
            "ids must contain between 1 and {MAX_BULK_IDS} entries"
        )));
    }

    let ids = parse_ids(&request.ids)?;
    let result = state.service().bulk_get(&ids).await?;
    Ok(Json(BulkResponse {
        entities: result.entities,
        not_found: result.not_found,
    }))
}

/// GET /api/v1/manhwa/trending
pub async fn trending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, AppError> {
    let results = state.service().trending(params.limit).await?;
    Ok(Json(ListResponse { results }))
}

/// GET /api/v1/manhwa/recent
pub async fn recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, AppError> {
    let results = state.service().recently_added(params.limit).await?;
    Ok(Json(ListResponse { results }))
}

/// GET /api/v1/manhwa/genres
pub async fn genres(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Genre>>, AppError> {
    let genres = state.service().list_genres().await?;
    Ok(Json(genres))
}

/// GET /api/v1/manhwa/random
pub async fn random(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ManhwaSearchResult>, AppError> {
    let result = state.service().random_upstream().await?;
    Ok(Json(result))
}

// ============================================================================
// Validation
// ============================================================================

fn validate_search(request: &SearchRequest) -> Result<(), AppError> {
    let query_chars = request.query.chars().count();
    if query_chars == 0 || query_chars > MAX_QUERY_CHARS {
        return Err(AppError::validation(format!(
            "query must be between 1 and {MAX_QUERY_CHARS} characters"
        )));
    }
    if request.filters.genres.len() > MAX_GENRE_FILTERS {
        return Err(AppError::validation(format!(
            "at most {MAX_GENRE_FILTERS} genre filters are allowed"
        )));
    }
    if request.page < 1 {
        return Err(AppError::validation("page must be at least 1"));
    }
    if request.limit < 1 || request.limit > 100 {
        return Err(AppError::validation("limit must be between 1 and 100"));
    }
    Ok(())
}

/// Bulk ids arrive as integers or numeric strings.
fn parse_ids(raw: &[Value]) -> Result<Vec<i64>, AppError> {
    raw.iter()
        .map(|value| match value {
            Value::Number(n) => n
                .as_i64()
                .filter(|id| *id > 0)
                .ok_or_else(|| AppError::validation(format!("invalid id: {n}"))),
            Value::String(s) => s
                .parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| AppError::validation(format!("invalid id: {s:?}"))),
            other => Err(AppError::validation(format!("invalid id: {other}"))),
        })
        .collect()
}
