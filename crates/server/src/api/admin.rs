//! Admin handlers. Role-based guarding sits in front of these routes and is
//! not part of this service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use manhwadex_core::cache::TierStats;
use manhwadex_core::{CreateManhwa, Manhwa, SyncReport, SyncStatus};

use super::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub upstream_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearCacheRequest {
    pub pattern: String,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// POST /api/v1/manhwa
///
/// Create a local-sourced row.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(dto): Json<CreateManhwa>,
) -> Result<Json<Manhwa>, AppError> {
    if dto.title_data.primary.trim().is_empty() {
        return Err(AppError::validation("primary title must not be empty"));
    }
    let entity = state.service().create(dto).await?;
    Ok(Json(entity))
}

/// POST /api/v1/manhwa/import
///
/// Import an upstream record by its UUID.
pub async fn import(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<Manhwa>, AppError> {
    if Uuid::parse_str(&request.upstream_id).is_err() {
        return Err(AppError::validation("upstreamId must be a UUID"));
    }
    let entity = state.service().import(&request.upstream_id).await?;
    Ok(Json(entity))
}

/// POST /api/v1/manhwa/{id}/refresh
///
/// Run one synchronous sync for the row.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SyncReport>, AppError> {
    let report = state.service().refresh(id).await?;
    Ok(Json(report))
}

/// GET /api/v1/manhwa/cache/status
pub async fn cache_status(State(state): State<Arc<AppState>>) -> Json<TierStats> {
    Json(state.service().cache_stats())
}

/// POST /api/v1/manhwa/cache/clear
pub async fn cache_clear(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClearCacheRequest>,
) -> Result<Json<ClearCacheResponse>, AppError> {
    if request.pattern.is_empty() {
        return Err(AppError::validation("pattern must not be empty"));
    }
    let cleared = state.service().clear_cache(&request.pattern);
    Ok(Json(ClearCacheResponse { cleared }))
}

/// POST /api/v1/manhwa/sync/{id}
///
/// Queue one row at the highest priority.
pub async fn sync_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.service().enqueue_sync(id)?;
    Ok(Json(SuccessResponse {
        message: format!("manhwa {id} queued for sync"),
    }))
}

/// POST /api/v1/manhwa/sync/all
///
/// Seed the queue from stale rows and start draining.
pub async fn sync_all(State(state): State<Arc<AppState>>) -> Json<SyncStatus> {
    let syncer = state.syncer();
    syncer.queue_outdated();
    syncer.kick();
    Json(syncer.status())
}

/// GET /api/v1/manhwa/sync/status
pub async fn sync_status(State(state): State<Arc<AppState>>) -> Json<SyncStatus> {
    Json(state.syncer().status())
}
