//! Execution of a single sync: fetch upstream, transform, write, invalidate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{SyncExecutor, SyncReport};
use crate::cache::CacheLayer;
use crate::metrics;
use crate::store::{ManhwaStore, StoreError, SyncState};
use crate::upstream::{to_patch, UpstreamCatalog, UpstreamError};

/// Carries one row from the upstream record to the committed local update.
/// Shared by the catalogue service (synchronous refresh) and the syncer's
/// worker.
pub struct SyncRunner {
    store: Arc<dyn ManhwaStore>,
    upstream: Arc<dyn UpstreamCatalog>,
    cache: Arc<CacheLayer>,
}

impl SyncRunner {
    pub fn new(
        store: Arc<dyn ManhwaStore>,
        upstream: Arc<dyn UpstreamCatalog>,
        cache: Arc<CacheLayer>,
    ) -> Self {
        Self {
            store,
            upstream,
            cache,
        }
    }

    async fn try_sync(&self, id: i64, upstream_id: &str) -> Result<DateTime<Utc>, SyncFailure> {
        let record = self
            .upstream
            .get_manga(upstream_id)
            .await
            .map_err(SyncFailure::Upstream)?;

        let now = Utc::now();
        let mut patch = to_patch(&record);
        if let Some(covers) = self.upstream.cover_urls(&record) {
            patch.cover_thumb = Some(covers.thumb);
            patch.cover_medium = Some(covers.medium);
            patch.cover_large = Some(covers.large);
        }
        patch.last_synced_at = Some(now);
        patch.sync_status = Some(SyncState::Current);
        patch.bump_version = true;

        self.store.update(id, patch).map_err(SyncFailure::Store)?;

        // Invalidate only after the write has committed so a racing read
        // cannot re-populate the cache with the row we just replaced.
        self.cache.invalidate_for_write(id);

        Ok(now)
    }
}

#[async_trait]
impl SyncExecutor for SyncRunner {
    async fn sync_one(&self, id: i64, upstream_id: &str) -> SyncReport {
        match self.try_sync(id, upstream_id).await {
            Ok(synced_at) => {
                info!(id, upstream_id, "sync succeeded");
                metrics::SYNC_OUTCOMES.with_label_values(&["success"]).inc();
                SyncReport::success(synced_at)
            }
            Err(failure) => {
                let message = failure.message();
                warn!(id, upstream_id, error = %message, "sync failed");
                metrics::SYNC_OUTCOMES.with_label_values(&["failed"]).inc();
                if let Err(e) = self.store.mark_sync_failed(id) {
                    warn!(id, "failed to record sync failure: {}", e);
                }
                SyncReport::failed(message)
            }
        }
    }
}

enum SyncFailure {
    Upstream(UpstreamError),
    Store(StoreError),
}

impl SyncFailure {
    fn message(&self) -> String {
        match self {
            SyncFailure::Upstream(UpstreamError::NotFound(_)) => {
                "manga no longer exists in the upstream catalogue".to_string()
            }
            SyncFailure::Upstream(e @ UpstreamError::RateLimited { .. }) => e.to_string(),
            SyncFailure::Upstream(e) => e.to_string(),
            SyncFailure::Store(e) => e.to_string(),
        }
    }
}
