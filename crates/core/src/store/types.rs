//! Domain types for the manhwa store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a catalogue row originated. Local rows never synchronise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Local,
    Upstream,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Local => "local",
            DataSource::Upstream => "upstream",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(DataSource::Local),
            "upstream" => Some(DataSource::Upstream),
            _ => None,
        }
    }
}

/// Publication status of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Ongoing => "ongoing",
            PublicationStatus::Completed => "completed",
            PublicationStatus::Hiatus => "hiatus",
            PublicationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(PublicationStatus::Ongoing),
            "completed" => Some(PublicationStatus::Completed),
            "hiatus" => Some(PublicationStatus::Hiatus),
            "cancelled" => Some(PublicationStatus::Cancelled),
            _ => None,
        }
    }
}

/// Synchronisation bookkeeping state for an upstream-sourced row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Current,
    Outdated,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Current => "current",
            SyncState::Outdated => "outdated",
            SyncState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "current" => Some(SyncState::Current),
            "outdated" => Some(SyncState::Outdated),
            "failed" => Some(SyncState::Failed),
            _ => None,
        }
    }
}

/// An alternative title in a specific language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltTitle {
    /// BCP-47-ish language code as the upstream reports it (e.g. "ko", "ja-ro").
    pub language: String,
    pub title: String,
}

/// Structured title record: one primary title plus localised alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleData {
    pub primary: String,
    #[serde(default)]
    pub alternatives: Vec<AltTitle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub romanized: Option<String>,
}

impl TitleData {
    pub fn simple(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            alternatives: Vec::new(),
            romanized: None,
        }
    }
}

/// A catalogue genre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// The primary catalogue entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manhwa {
    pub id: i64,
    /// Stable identifier in the upstream catalogue; unique when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_id: Option<String>,
    pub data_source: DataSource,
    pub title_data: TitleData,
    pub synopsis: String,
    pub status: PublicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chapters: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_chapters: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_thumb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_large: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_status: SyncState,
    /// Monotonic counter, bumped on every successful sync.
    pub version: i64,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

impl Manhwa {
    /// An upstream row is stale when it has never synced or its last sync is
    /// older than 24 hours.
    pub fn should_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.data_source != DataSource::Upstream {
            return false;
        }
        match self.last_synced_at {
            None => true,
            Some(at) => now.signed_duration_since(at) > chrono::Duration::hours(24),
        }
    }
}

/// Insert payload for a new row.
#[derive(Debug, Clone)]
pub struct NewManhwa {
    pub upstream_id: Option<String>,
    pub data_source: DataSource,
    pub title_data: TitleData,
    pub synopsis: String,
    pub status: PublicationStatus,
    pub publisher: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub total_chapters: Option<u32>,
    pub special_chapters: Option<u32>,
    pub cover_thumb: Option<String>,
    pub cover_medium: Option<String>,
    pub cover_large: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_status: SyncState,
}

impl NewManhwa {
    /// A minimal local row; callers fill in the rest as needed.
    pub fn local(title_data: TitleData, synopsis: impl Into<String>, status: PublicationStatus) -> Self {
        Self {
            upstream_id: None,
            data_source: DataSource::Local,
            title_data,
            synopsis: synopsis.into(),
            status,
            publisher: None,
            start_year: None,
            end_year: None,
            total_chapters: None,
            special_chapters: None,
            cover_thumb: None,
            cover_medium: None,
            cover_large: None,
            last_synced_at: None,
            sync_status: SyncState::Current,
        }
    }
}

/// Partial update for an existing row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ManhwaPatch {
    pub title_data: Option<TitleData>,
    pub synopsis: Option<String>,
    pub status: Option<PublicationStatus>,
    pub publisher: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub total_chapters: Option<u32>,
    pub special_chapters: Option<u32>,
    pub cover_thumb: Option<String>,
    pub cover_medium: Option<String>,
    pub cover_large: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_status: Option<SyncState>,
    /// Increment `version` as part of this update.
    pub bump_version: bool,
}

/// Year interval requested by a search filter. Inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

/// AND-composed filters for search queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default)]
    pub status: Vec<PublicationStatus>,
    /// Genre slugs; a row matches when it carries any of them.
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_range: Option<YearRange>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.status.is_empty() && self.genres.is_empty() && self.year_range.is_none()
    }
}

/// A search hit with its relevance rank. `score` is absent on the
/// blank-query path.
#[derive(Debug, Clone)]
pub struct RankedManhwa {
    pub manhwa: Manhwa,
    pub score: Option<f64>,
}

/// A row the synchroniser should visit.
#[derive(Debug, Clone)]
pub struct OutdatedRow {
    pub id: i64,
    pub upstream_id: String,
    pub sync_status: SyncState,
}

/// Errors for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid data: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Transient(String),
}
