//! Persistent manhwa catalogue storage.
//!
//! The store is the authoritative side of the catalogue. Upstream-sourced
//! rows carry sync bookkeeping (`last_synced_at`, `sync_status`, `version`);
//! local rows never synchronise.

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::*;

use chrono::{DateTime, Utc};

/// Trait for manhwa catalogue storage.
pub trait ManhwaStore: Send + Sync {
    /// Fetch a single row by id, genres attached.
    fn find_by_id(&self, id: i64) -> Result<Manhwa, StoreError>;

    /// Fetch many rows by id. Missing ids are silently absent from the
    /// result; callers diff against their input.
    fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Manhwa>, StoreError>;

    /// Look a row up by its upstream identifier.
    fn find_by_upstream_id(&self, upstream_id: &str) -> Result<Option<Manhwa>, StoreError>;

    /// Insert a new row and return it.
    ///
    /// Fails with `Conflict` on a duplicate `upstream_id` and with `Invalid`
    /// when the source/upstream-id pairing or year interval is inconsistent.
    fn insert(&self, row: NewManhwa) -> Result<Manhwa, StoreError>;

    /// Apply a partial update. The full-text index follows the row via
    /// triggers; `updated_at` is always bumped.
    fn update(&self, id: i64, patch: ManhwaPatch) -> Result<(), StoreError>;

    /// Record a failed sync attempt without touching the payload columns.
    fn mark_sync_failed(&self, id: i64) -> Result<(), StoreError>;

    /// Ranked full-text search over title and synopsis, title weighted
    /// higher. Returns one page of hits plus the unpaginated total.
    fn full_text_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RankedManhwa>, u64), StoreError>;

    /// Blank-query search path: same filters, ordered by `updated_at`
    /// descending.
    fn filter_search(
        &self,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RankedManhwa>, u64), StoreError>;

    /// Most recently created rows, `created_at` descending.
    fn list_recent(&self, limit: u32) -> Result<Vec<Manhwa>, StoreError>;

    /// Upstream rows due for synchronisation: never synced, synced before
    /// `threshold`, or in the failed state. Failed rows sort first, then
    /// oldest sync first.
    fn list_outdated(
        &self,
        threshold: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<OutdatedRow>, StoreError>;

    /// Resolve genre slugs to genre rows. Unknown slugs are absent from the
    /// result.
    fn list_genres_by_slug(&self, slugs: &[String]) -> Result<Vec<Genre>, StoreError>;

    /// All genres, name ascending.
    fn list_all_genres(&self) -> Result<Vec<Genre>, StoreError>;

    /// Insert a genre or return the existing row for the slug.
    fn upsert_genre(&self, name: &str, slug: &str) -> Result<Genre, StoreError>;

    /// Link genres to a row. Existing links are kept.
    fn attach_genres(&self, id: i64, genre_ids: &[i64]) -> Result<(), StoreError>;
}
