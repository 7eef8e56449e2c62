//! Public types for the upstream catalogue client.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling the upstream imposes on deep pagination.
pub const PAGINATION_CEILING: u32 = 10_000;

/// Maximum page size the upstream accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A reduced upstream catalogue record, parsed out of the wire envelope and
/// kept only as far as the transform step needs it. Title and description
/// dictionaries stay untyped (language code -> text) until then.
#[derive(Debug, Clone, Default)]
pub struct UpstreamManga {
    /// Stable upstream identifier (UUID-shaped).
    pub id: String,
    pub title: HashMap<String, String>,
    pub alt_titles: Vec<HashMap<String, String>>,
    pub description: HashMap<String, String>,
    pub status: Option<String>,
    pub year: Option<i32>,
    pub last_chapter: Option<String>,
    /// File name of the cover-art relationship, when included.
    pub cover_filename: Option<String>,
    pub tags: Vec<UpstreamTag>,
}

impl UpstreamManga {
    /// Names of the tags the upstream groups as genres.
    pub fn genre_names(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter(|tag| tag.group == "genre")
            .map(|tag| tag.name.clone())
            .collect()
    }
}

/// One entry of the upstream tag dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamTag {
    pub id: String,
    pub name: String,
    pub group: String,
}

/// The three cover resolutions derived from an upstream cover file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverUrls {
    pub thumb: String,
    pub medium: String,
    pub large: String,
}

/// Search parameters accepted by the upstream catalogue.
#[derive(Debug, Clone, Default)]
pub struct UpstreamSearchQuery {
    pub title: String,
    pub limit: u32,
    pub offset: u32,
    /// Defaults to {safe, suggestive} when empty.
    pub content_ratings: Vec<String>,
    pub statuses: Vec<String>,
    pub demographics: Vec<String>,
    /// Tag UUIDs that must be present.
    pub included_tags: Vec<String>,
    /// Tag UUIDs that must be absent.
    pub excluded_tags: Vec<String>,
}

impl UpstreamSearchQuery {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            limit: MAX_PAGE_SIZE,
            ..Default::default()
        }
    }
}

/// Errors surfaced by the upstream client, normalised from the upstream's
/// error envelope and from transport failures.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Upstream rate limited: {reason}")]
    RateLimited {
        reason: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Upstream rejected the request: {0}")]
    BadInput(String),

    #[error("Not found on upstream: {0}")]
    NotFound(String),

    #[error("Upstream authentication failed: {0}")]
    Unauthorised(String),

    #[error("Pagination window exceeded: offset {offset} + limit {limit} > {PAGINATION_CEILING}")]
    PaginationLimitExceeded { offset: u32, limit: u32 },

    #[error("Upstream API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Upstream connection failed: {0}")]
    Connection(String),

    #[error("Failed to parse upstream response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Connection(format!("request timed out: {}", e))
        } else if e.is_decode() {
            UpstreamError::Parse(e.to_string())
        } else {
            UpstreamError::Connection(e.to_string())
        }
    }
}

/// Error envelope the upstream returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Map an upstream error body to a typed error. Unknown shapes keep the
/// HTTP status.
pub(crate) fn normalise_error(status: u16, body: &str) -> UpstreamError {
    let envelope: Option<ErrorEnvelope> = serde_json::from_str(body).ok();
    let detail = envelope
        .as_ref()
        .filter(|e| e.result == "error")
        .and_then(|e| e.errors.first());

    if let Some(detail) = detail {
        let reason = detail
            .detail
            .clone()
            .unwrap_or_else(|| detail.title.clone());
        return match detail.title.as_str() {
            "captcha_required_exception" => UpstreamError::RateLimited {
                reason,
                retry_after_secs: None,
            },
            "validation_exception" => UpstreamError::BadInput(reason),
            "entity_not_found_exception" => UpstreamError::NotFound(reason),
            _ => UpstreamError::Api {
                status,
                message: reason,
            },
        };
    }

    UpstreamError::Api {
        status,
        message: if body.is_empty() {
            "empty error body".to_string()
        } else {
            body.chars().take(200).collect()
        },
    }
}
