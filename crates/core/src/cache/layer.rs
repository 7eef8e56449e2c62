//! The three cache tiers used by the catalogue service.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{CacheStats, TtlCache};
use crate::config::CacheConfig;
use crate::search::SearchResponse;
use crate::store::Manhwa;

/// Interval of the background expiry sweep shared by all tiers.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-tier stats snapshot for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub entity: CacheStats,
    pub search: CacheStats,
    pub tag: CacheStats,
}

/// The service's cache tiers: entities by id, search responses by canonical
/// request key, and the upstream tag dictionary by normalised tag name.
pub struct CacheLayer {
    entity: Arc<TtlCache<Manhwa>>,
    search: Arc<TtlCache<SearchResponse>>,
    tag: Arc<TtlCache<String>>,
}

impl CacheLayer {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entity: Arc::new(TtlCache::new(
                "entity",
                Duration::from_secs(config.entity_ttl_secs),
                config.max_keys,
            )),
            search: Arc::new(TtlCache::new(
                "search",
                Duration::from_secs(config.search_ttl_secs),
                config.max_keys,
            )),
            tag: Arc::new(TtlCache::new(
                "tag",
                Duration::from_secs(config.tag_ttl_secs),
                config.max_keys,
            )),
        }
    }

    /// Start the periodic expiry sweeps. Tasks end when the layer is dropped.
    pub fn spawn_sweepers(&self) {
        let _ = self.entity.spawn_sweeper(SWEEP_INTERVAL);
        let _ = self.search.spawn_sweeper(SWEEP_INTERVAL);
        let _ = self.tag.spawn_sweeper(SWEEP_INTERVAL);
    }

    pub fn entity_key(id: i64) -> String {
        format!("manhwa:entity:{id}")
    }

    pub fn entity(&self) -> &TtlCache<Manhwa> {
        &self.entity
    }

    pub fn search(&self) -> &TtlCache<SearchResponse> {
        &self.search
    }

    /// Tag names are keyed lower-cased with hyphens replaced by spaces so
    /// genre slugs resolve directly.
    pub fn tag(&self) -> &TtlCache<String> {
        &self.tag
    }

    pub fn tag_key(name: &str) -> String {
        name.to_lowercase().replace('-', " ")
    }

    /// Write-invalidation protocol: drop the whole search tier and the one
    /// entity key. Called only after the store write has committed.
    pub fn invalidate_for_write(&self, id: i64) {
        self.search.delete_matching("search:");
        self.entity.remove(&Self::entity_key(id));
    }

    /// Substring invalidation across every tier (admin surface).
    pub fn delete_matching(&self, pattern: &str) -> usize {
        self.entity.delete_matching(pattern)
            + self.search.delete_matching(pattern)
            + self.tag.delete_matching(pattern)
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            entity: self.entity.stats(),
            search: self.search.stats(),
            tag: self.tag.stats(),
        }
    }
}
