//! manhwadex core library.
//!
//! The read/write data plane of the catalogue service: a persistent store,
//! three cache tiers, a request coalescer, the rate-limited upstream client,
//! the search engine, the catalogue facade and the background synchroniser.

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod metrics;
pub mod search;
pub mod service;
pub mod store;
pub mod sync;
pub mod testing;
pub mod upstream;

pub use cache::{CacheLayer, CacheStats, TierStats, TtlCache};
pub use coalesce::Coalescer;
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, Profile,
    SanitizedConfig,
};
pub use search::{ManhwaSearchResult, SearchEngine, SearchRequest, SearchResponse};
pub use service::{BulkResult, CatalogueService, CreateManhwa, ServiceError};
pub use store::{Genre, Manhwa, ManhwaStore, SqliteStore, StoreError};
pub use sync::{SyncExecutor, SyncReport, SyncRunner, SyncStatus, Syncer};
pub use upstream::{UpstreamCatalog, UpstreamClient, UpstreamError};
