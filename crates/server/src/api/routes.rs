use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::{admin, handlers, manhwa};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health, config, metrics
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Catalogue reads
        .route("/api/v1/manhwa/search", post(manhwa::search))
        .route("/api/v1/manhwa/bulk", post(manhwa::bulk_get))
        .route("/api/v1/manhwa/trending", get(manhwa::trending))
        .route("/api/v1/manhwa/recent", get(manhwa::recent))
        .route("/api/v1/manhwa/genres", get(manhwa::genres))
        .route("/api/v1/manhwa/random", get(manhwa::random))
        // Admin (guarded externally)
        .route("/api/v1/manhwa", post(admin::create))
        .route("/api/v1/manhwa/import", post(admin::import))
        .route("/api/v1/manhwa/{id}/refresh", post(admin::refresh))
        .route("/api/v1/manhwa/cache/status", get(admin::cache_status))
        .route("/api/v1/manhwa/cache/clear", post(admin::cache_clear))
        .route("/api/v1/manhwa/sync/all", post(admin::sync_all))
        .route("/api/v1/manhwa/sync/status", get(admin::sync_status))
        .route("/api/v1/manhwa/sync/{id}", post(admin::sync_one))
        // Keep the wildcard id route last so the named routes above win.
        .route("/api/v1/manhwa/{id}", get(manhwa::get_by_id))
        .with_state(state)
}
