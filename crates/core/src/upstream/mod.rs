//! Client for the upstream third-party catalogue API.
//!
//! The upstream is the source of record for imported rows. Access is
//! rate-limited (a global budget plus per-endpoint overlays) and protected
//! endpoints carry a short-lived session token that the client refreshes on
//! its own.

mod auth;
mod client;
mod limits;
mod transform;
mod types;

pub use client::UpstreamClient;
pub use limits::{RateLimits, WindowLimiter};
pub use transform::{build_cover_urls, pick_localised, to_new_manhwa, to_patch};
pub use types::*;

use async_trait::async_trait;

/// Abstraction over the upstream catalogue for injection in tests and in the
/// service layer.
#[async_trait]
pub trait UpstreamCatalog: Send + Sync {
    /// Search the upstream catalogue. The pagination ceiling and rate limits
    /// are enforced before any request leaves the process.
    async fn search(&self, query: &UpstreamSearchQuery)
        -> Result<Vec<UpstreamManga>, UpstreamError>;

    /// Fetch one record by its upstream identifier.
    async fn get_manga(&self, uuid: &str) -> Result<UpstreamManga, UpstreamError>;

    /// Fetch a random record.
    async fn random(&self) -> Result<UpstreamManga, UpstreamError>;

    /// Fetch the tag dictionary. Failures degrade to an empty list.
    async fn list_tags(&self) -> Vec<UpstreamTag>;

    /// Derive the three cover resolutions for a record, when it has cover
    /// art.
    fn cover_urls(&self, manga: &UpstreamManga) -> Option<CoverUrls>;
}
