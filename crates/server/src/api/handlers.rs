//! Health, config and metrics handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::metrics::encode_metrics;
use crate::state::AppState;

/// GET /api/v1/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/v1/config
///
/// The running configuration with secrets redacted.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::to_value(state.sanitized_config()).unwrap_or_default())
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    // Refresh scrape-time gauges before encoding.
    let status = state.syncer().status();
    crate::metrics::SYNC_QUEUE_LENGTH.set(status.queue_length as i64);
    encode_metrics()
}
