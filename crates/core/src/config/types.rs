use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Deployment profile. Only affects defaults that are not set explicitly
/// (currently the sync interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Production,
    Development,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("manhwadex.db")
}

/// Upstream catalogue API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream catalogue API.
    pub api_url: String,
    /// Account username used for the session-token login.
    pub username: String,
    /// Account secret used for the session-token login.
    pub secret: String,
    /// User-Agent header sent on every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds (default: 10).
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

fn default_user_agent() -> String {
    format!("manhwadex/{}", env!("CARGO_PKG_VERSION"))
}

fn default_upstream_timeout() -> u64 {
    10
}

/// Cache tier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Entity cache TTL in seconds (default: 3600).
    #[serde(default = "default_entity_ttl")]
    pub entity_ttl_secs: u64,
    /// Search cache TTL in seconds (default: 300).
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,
    /// Tag dictionary cache TTL in seconds (default: 86400).
    #[serde(default = "default_tag_ttl")]
    pub tag_ttl_secs: u64,
    /// Maximum keys per cache tier (default: 1000).
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl_secs: default_entity_ttl(),
            search_ttl_secs: default_search_ttl(),
            tag_ttl_secs: default_tag_ttl(),
            max_keys: default_max_keys(),
        }
    }
}

fn default_entity_ttl() -> u64 {
    3600
}

fn default_search_ttl() -> u64 {
    300
}

fn default_tag_ttl() -> u64 {
    86_400
}

fn default_max_keys() -> usize {
    1000
}

/// Background synchroniser configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SyncConfig {
    /// How many queue items to process concurrently per batch (default: 10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds between scheduled seeding ticks. When unset, the profile
    /// default applies: 900 (production) or 21600 (development).
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl SyncConfig {
    /// Effective seeding interval for the given profile.
    pub fn effective_interval_secs(&self, profile: Profile) -> u64 {
        self.interval_secs.unwrap_or(match profile {
            Profile::Production => 900,
            Profile::Development => 21_600,
        })
    }
}

fn default_batch_size() -> usize {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub profile: Profile,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub upstream: SanitizedUpstreamConfig,
    pub cache: CacheConfig,
    pub sync: SanitizedSyncConfig,
}

/// Sanitized upstream config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUpstreamConfig {
    pub api_url: String,
    pub user_agent: String,
    pub credentials_configured: bool,
    pub timeout_secs: u64,
}

/// Sanitized sync config (interval resolved against the profile)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSyncConfig {
    pub batch_size: usize,
    pub interval_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            profile: config.profile,
            server: config.server.clone(),
            database: config.database.clone(),
            upstream: SanitizedUpstreamConfig {
                api_url: config.upstream.api_url.clone(),
                user_agent: config.upstream.user_agent.clone(),
                credentials_configured: !config.upstream.username.is_empty()
                    && !config.upstream.secret.is_empty(),
                timeout_secs: config.upstream.timeout_secs,
            },
            cache: config.cache.clone(),
            sync: SanitizedSyncConfig {
                batch_size: config.sync.batch_size,
                interval_secs: config.sync.effective_interval_secs(config.profile),
            },
        }
    }
}
