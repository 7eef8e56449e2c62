//! SQLite-backed manhwa store implementation.
//!
//! Full-text search runs against an FTS5 external-content table kept in
//! sync with the `manhwa` table by triggers, so any write that touches the
//! title or synopsis re-indexes the row inside the same transaction.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};

use super::{
    DataSource, Genre, Manhwa, ManhwaPatch, ManhwaStore, NewManhwa, OutdatedRow,
    PublicationStatus, RankedManhwa, SearchFilters, StoreError, SyncState, TitleData,
};

const MANHWA_COLUMNS: &str = "m.id, m.upstream_id, m.data_source, m.title, m.title_data, \
     m.synopsis, m.status, m.publisher, m.start_year, m.end_year, m.total_chapters, \
     m.special_chapters, m.cover_thumb, m.cover_medium, m.cover_large, m.created_at, \
     m.updated_at, m.last_synced_at, m.sync_status, m.version";

/// SQLite-backed manhwa store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS manhwa (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                upstream_id TEXT UNIQUE,
                data_source TEXT NOT NULL,
                title TEXT NOT NULL,
                title_data TEXT NOT NULL,
                synopsis TEXT NOT NULL,
                status TEXT NOT NULL,
                publisher TEXT,
                start_year INTEGER,
                end_year INTEGER,
                total_chapters INTEGER,
                special_chapters INTEGER,
                cover_thumb TEXT,
                cover_medium TEXT,
                cover_large TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_synced_at TEXT,
                sync_status TEXT NOT NULL DEFAULT 'current',
                version INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_manhwa_updated_at ON manhwa(updated_at);
            CREATE INDEX IF NOT EXISTS idx_manhwa_created_at ON manhwa(created_at);
            CREATE INDEX IF NOT EXISTS idx_manhwa_sync ON manhwa(data_source, sync_status, last_synced_at);

            CREATE TABLE IF NOT EXISTS genres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS manhwa_genres (
                manhwa_id INTEGER NOT NULL REFERENCES manhwa(id) ON DELETE CASCADE,
                genre_id INTEGER NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
                PRIMARY KEY (manhwa_id, genre_id)
            );

            -- External-content index over title + synopsis. The triggers keep
            -- it in lockstep with the base table, so every committed write is
            -- already searchable.
            CREATE VIRTUAL TABLE IF NOT EXISTS manhwa_fts USING fts5(
                title, synopsis,
                content='manhwa', content_rowid='id'
            );

            CREATE TRIGGER IF NOT EXISTS manhwa_fts_insert AFTER INSERT ON manhwa BEGIN
                INSERT INTO manhwa_fts(rowid, title, synopsis)
                VALUES (new.id, new.title, new.synopsis);
            END;

            CREATE TRIGGER IF NOT EXISTS manhwa_fts_delete AFTER DELETE ON manhwa BEGIN
                INSERT INTO manhwa_fts(manhwa_fts, rowid, title, synopsis)
                VALUES ('delete', old.id, old.title, old.synopsis);
            END;

            CREATE TRIGGER IF NOT EXISTS manhwa_fts_update AFTER UPDATE OF title, synopsis ON manhwa BEGIN
                INSERT INTO manhwa_fts(manhwa_fts, rowid, title, synopsis)
                VALUES ('delete', old.id, old.title, old.synopsis);
                INSERT INTO manhwa_fts(rowid, title, synopsis)
                VALUES (new.id, new.title, new.synopsis);
            END;
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn load_row(conn: &Connection, id: i64) -> Result<Manhwa, StoreError> {
        let sql = format!("SELECT {MANHWA_COLUMNS} FROM manhwa m WHERE m.id = ?");
        let mut row = conn
            .query_row(&sql, params![id], row_to_manhwa)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::NotFound(format!("manhwa id {}", id))
                }
                other => db_err(other),
            })?;
        row.genres = Self::load_genres(conn, id)?;
        Ok(row)
    }

    fn load_genres(conn: &Connection, id: i64) -> Result<Vec<Genre>, StoreError> {
        let mut stmt = conn
            .prepare(
                "SELECT g.id, g.name, g.slug FROM genres g
                 JOIN manhwa_genres mg ON mg.genre_id = g.id
                 WHERE mg.manhwa_id = ? ORDER BY g.name",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![id], |row| {
                Ok(Genre {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            })
            .map_err(db_err)?;

        let mut genres = Vec::new();
        for row in rows {
            genres.push(row.map_err(db_err)?);
        }
        Ok(genres)
    }

    /// Build the WHERE fragments for the AND-composed filters and push their
    /// parameters in clause order.
    fn push_filter_clauses(
        filters: &SearchFilters,
        clauses: &mut Vec<String>,
        values: &mut Vec<Value>,
    ) {
        if !filters.status.is_empty() {
            let marks = vec!["?"; filters.status.len()].join(", ");
            clauses.push(format!("m.status IN ({marks})"));
            for status in &filters.status {
                values.push(Value::Text(status.as_str().to_string()));
            }
        }

        if !filters.genres.is_empty() {
            let marks = vec!["?"; filters.genres.len()].join(", ");
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM manhwa_genres mg JOIN genres g ON g.id = mg.genre_id \
                 WHERE mg.manhwa_id = m.id AND g.slug IN ({marks}))"
            ));
            for slug in &filters.genres {
                values.push(Value::Text(slug.clone()));
            }
        }

        if let Some(range) = filters.year_range {
            // Interval overlap; a null end year is open-ended into the future.
            clauses.push(
                "(m.start_year IS NOT NULL AND m.start_year <= ? \
                 AND COALESCE(m.end_year, 9999) >= ?)"
                    .to_string(),
            );
            values.push(Value::Integer(range.end as i64));
            values.push(Value::Integer(range.start as i64));
        }
    }

    fn query_page(
        conn: &Connection,
        sql: &str,
        count_sql: &str,
        values: &[Value],
        page_values: &[Value],
        ranked: bool,
    ) -> Result<(Vec<RankedManhwa>, u64), StoreError> {
        let total: u64 = conn
            .query_row(count_sql, params_from_iter(values.iter()), |row| {
                row.get::<_, i64>(0)
            })
            .map_err(db_err)? as u64;

        let all_values: Vec<&Value> = values.iter().chain(page_values.iter()).collect();
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(all_values), |row| {
                let manhwa = row_to_manhwa(row)?;
                let score = if ranked {
                    // bm25 ranks best-first with the smallest value; negate so
                    // a higher score means a better match.
                    let rank: f64 = row.get(20)?;
                    Some(-rank)
                } else {
                    None
                };
                Ok(RankedManhwa { manhwa, score })
            })
            .map_err(db_err)?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row.map_err(db_err)?);
        }
        for hit in &mut hits {
            hit.manhwa.genres = Self::load_genres(conn, hit.manhwa.id)?;
        }
        Ok((hits, total))
    }
}

impl ManhwaStore for SqliteStore {
    fn find_by_id(&self, id: i64) -> Result<Manhwa, StoreError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        Self::load_row(&conn, id)
    }

    fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Manhwa>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let marks = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {MANHWA_COLUMNS} FROM manhwa m WHERE m.id IN ({marks})");
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), row_to_manhwa)
            .map_err(db_err)?;

        let mut found = Vec::new();
        for row in rows {
            found.push(row.map_err(db_err)?);
        }
        for row in &mut found {
            row.genres = Self::load_genres(&conn, row.id)?;
        }
        Ok(found)
    }

    fn find_by_upstream_id(&self, upstream_id: &str) -> Result<Option<Manhwa>, StoreError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let sql = format!("SELECT {MANHWA_COLUMNS} FROM manhwa m WHERE m.upstream_id = ?");
        match conn.query_row(&sql, params![upstream_id], row_to_manhwa) {
            Ok(mut row) => {
                row.genres = Self::load_genres(&conn, row.id)?;
                Ok(Some(row))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    fn insert(&self, row: NewManhwa) -> Result<Manhwa, StoreError> {
        match (row.data_source, &row.upstream_id) {
            (DataSource::Local, Some(_)) => {
                return Err(StoreError::Invalid(
                    "local rows must not carry an upstream id".to_string(),
                ))
            }
            (DataSource::Upstream, None) => {
                return Err(StoreError::Invalid(
                    "upstream rows require an upstream id".to_string(),
                ))
            }
            _ => {}
        }
        if let (Some(start), Some(end)) = (row.start_year, row.end_year) {
            if end < start {
                return Err(StoreError::Invalid(format!(
                    "end year {} precedes start year {}",
                    end, start
                )));
            }
        }

        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let now = Utc::now().to_rfc3339();
        let title_json = title_data_json(&row.title_data)?;

        conn.execute(
            "INSERT INTO manhwa (upstream_id, data_source, title, title_data, synopsis, status, \
             publisher, start_year, end_year, total_chapters, special_chapters, cover_thumb, \
             cover_medium, cover_large, created_at, updated_at, last_synced_at, sync_status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                row.upstream_id,
                row.data_source.as_str(),
                row.title_data.primary,
                title_json,
                row.synopsis,
                row.status.as_str(),
                row.publisher,
                row.start_year,
                row.end_year,
                row.total_chapters,
                row.special_chapters,
                row.cover_thumb,
                row.cover_medium,
                row.cover_large,
                now,
                now,
                row.last_synced_at.map(|t| t.to_rfc3339()),
                row.sync_status.as_str(),
            ],
        )
        .map_err(|e| match constraint_violation(&e) {
            true => StoreError::Conflict(format!(
                "upstream id {} already imported",
                row.upstream_id.as_deref().unwrap_or("?")
            )),
            false => db_err(e),
        })?;

        let id = conn.last_insert_rowid();
        Self::load_row(&conn, id)
    }

    fn update(&self, id: i64, patch: ManhwaPatch) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(ref title_data) = patch.title_data {
            sets.push("title = ?".to_string());
            values.push(Value::Text(title_data.primary.clone()));
            sets.push("title_data = ?".to_string());
            values.push(Value::Text(title_data_json(title_data)?));
        }
        if let Some(ref synopsis) = patch.synopsis {
            sets.push("synopsis = ?".to_string());
            values.push(Value::Text(synopsis.clone()));
        }
        if let Some(status) = patch.status {
            sets.push("status = ?".to_string());
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(ref publisher) = patch.publisher {
            sets.push("publisher = ?".to_string());
            values.push(Value::Text(publisher.clone()));
        }
        if let Some(year) = patch.start_year {
            sets.push("start_year = ?".to_string());
            values.push(Value::Integer(year as i64));
        }
        if let Some(year) = patch.end_year {
            sets.push("end_year = ?".to_string());
            values.push(Value::Integer(year as i64));
        }
        if let Some(n) = patch.total_chapters {
            sets.push("total_chapters = ?".to_string());
            values.push(Value::Integer(n as i64));
        }
        if let Some(n) = patch.special_chapters {
            sets.push("special_chapters = ?".to_string());
            values.push(Value::Integer(n as i64));
        }
        if let Some(ref url) = patch.cover_thumb {
            sets.push("cover_thumb = ?".to_string());
            values.push(Value::Text(url.clone()));
        }
        if let Some(ref url) = patch.cover_medium {
            sets.push("cover_medium = ?".to_string());
            values.push(Value::Text(url.clone()));
        }
        if let Some(ref url) = patch.cover_large {
            sets.push("cover_large = ?".to_string());
            values.push(Value::Text(url.clone()));
        }
        if let Some(at) = patch.last_synced_at {
            sets.push("last_synced_at = ?".to_string());
            values.push(Value::Text(at.to_rfc3339()));
        }
        if let Some(state) = patch.sync_status {
            sets.push("sync_status = ?".to_string());
            values.push(Value::Text(state.as_str().to_string()));
        }
        if patch.bump_version {
            sets.push("version = version + 1".to_string());
        }

        sets.push("updated_at = ?".to_string());
        values.push(Value::Text(Utc::now().to_rfc3339()));
        values.push(Value::Integer(id));

        let sql = format!("UPDATE manhwa SET {} WHERE id = ?", sets.join(", "));
        let affected = conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(db_err)?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("manhwa id {}", id)));
        }
        Ok(())
    }

    fn mark_sync_failed(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let affected = conn
            .execute(
                "UPDATE manhwa SET sync_status = 'failed', updated_at = ? WHERE id = ?",
                params![Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("manhwa id {}", id)));
        }
        Ok(())
    }

    fn full_text_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RankedManhwa>, u64), StoreError> {
        let Some(match_expr) = fts_match_expr(query) else {
            return self.filter_search(filters, page, limit);
        };

        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut clauses = vec!["manhwa_fts MATCH ?".to_string()];
        let mut values = vec![Value::Text(match_expr)];
        Self::push_filter_clauses(filters, &mut clauses, &mut values);
        let where_sql = clauses.join(" AND ");

        let sql = format!(
            "SELECT {MANHWA_COLUMNS}, bm25(manhwa_fts, 10.0, 1.0) AS rank \
             FROM manhwa_fts JOIN manhwa m ON m.id = manhwa_fts.rowid \
             WHERE {where_sql} ORDER BY rank, m.id LIMIT ? OFFSET ?"
        );
        let count_sql = format!(
            "SELECT COUNT(*) FROM manhwa_fts JOIN manhwa m ON m.id = manhwa_fts.rowid \
             WHERE {where_sql}"
        );

        let (limit, offset) = page_bounds(page, limit);
        let page_values = [Value::Integer(limit), Value::Integer(offset)];
        Self::query_page(&conn, &sql, &count_sql, &values, &page_values, true)
    }

    fn filter_search(
        &self,
        filters: &SearchFilters,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<RankedManhwa>, u64), StoreError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        Self::push_filter_clauses(filters, &mut clauses, &mut values);
        let where_sql = if clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            clauses.join(" AND ")
        };

        let sql = format!(
            "SELECT {MANHWA_COLUMNS} FROM manhwa m WHERE {where_sql} \
             ORDER BY m.updated_at DESC, m.id DESC LIMIT ? OFFSET ?"
        );
        let count_sql = format!("SELECT COUNT(*) FROM manhwa m WHERE {where_sql}");

        let (limit, offset) = page_bounds(page, limit);
        let page_values = [Value::Integer(limit), Value::Integer(offset)];
        Self::query_page(&conn, &sql, &count_sql, &values, &page_values, false)
    }

    fn list_recent(&self, limit: u32) -> Result<Vec<Manhwa>, StoreError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let sql = format!(
            "SELECT {MANHWA_COLUMNS} FROM manhwa m ORDER BY m.created_at DESC, m.id DESC LIMIT ?"
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_manhwa)
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err)?);
        }
        for row in &mut out {
            row.genres = Self::load_genres(&conn, row.id)?;
        }
        Ok(out)
    }

    fn list_outdated(
        &self,
        threshold: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<OutdatedRow>, StoreError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut stmt = conn
            .prepare(
                "SELECT id, upstream_id, sync_status FROM manhwa \
                 WHERE data_source = 'upstream' AND upstream_id IS NOT NULL \
                 AND (last_synced_at IS NULL OR last_synced_at < ? OR sync_status = 'failed') \
                 ORDER BY CASE WHEN sync_status = 'failed' THEN 0 ELSE 1 END, \
                 COALESCE(last_synced_at, '') LIMIT ?",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![threshold.to_rfc3339(), limit as i64], |row| {
                let state: String = row.get(2)?;
                Ok(OutdatedRow {
                    id: row.get(0)?,
                    upstream_id: row.get(1)?,
                    sync_status: SyncState::parse(&state).unwrap_or(SyncState::Outdated),
                })
            })
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err)?);
        }
        Ok(out)
    }

    fn list_genres_by_slug(&self, slugs: &[String]) -> Result<Vec<Genre>, StoreError> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let marks = vec!["?"; slugs.len()].join(", ");
        let sql =
            format!("SELECT id, name, slug FROM genres WHERE slug IN ({marks}) ORDER BY name");
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(slugs.iter()), |row| {
                Ok(Genre {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            })
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err)?);
        }
        Ok(out)
    }

    fn list_all_genres(&self) -> Result<Vec<Genre>, StoreError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut stmt = conn
            .prepare("SELECT id, name, slug FROM genres ORDER BY name")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Genre {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            })
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_err)?);
        }
        Ok(out)
    }

    fn upsert_genre(&self, name: &str, slug: &str) -> Result<Genre, StoreError> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        conn.execute(
            "INSERT INTO genres (name, slug) VALUES (?, ?) ON CONFLICT(slug) DO NOTHING",
            params![name, slug],
        )
        .map_err(db_err)?;

        conn.query_row(
            "SELECT id, name, slug FROM genres WHERE slug = ?",
            params![slug],
            |row| {
                Ok(Genre {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            },
        )
        .map_err(db_err)
    }

    fn attach_genres(&self, id: i64, genre_ids: &[i64]) -> Result<(), StoreError> {
        if genre_ids.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut stmt = conn
            .prepare("INSERT OR IGNORE INTO manhwa_genres (manhwa_id, genre_id) VALUES (?, ?)")
            .map_err(db_err)?;
        for genre_id in genre_ids {
            stmt.execute(params![id, genre_id]).map_err(db_err)?;
        }
        Ok(())
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Transient(e.to_string())
}

fn poisoned() -> StoreError {
    StoreError::Transient("store connection lock poisoned".to_string())
}

fn constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::ConstraintViolation
    )
}

fn title_data_json(title_data: &TitleData) -> Result<String, StoreError> {
    serde_json::to_string(title_data)
        .map_err(|e| StoreError::Invalid(format!("unserialisable title data: {}", e)))
}

/// Build an FTS5 MATCH expression from a free-text query: strip quoting
/// characters, then OR the remaining terms so partial matches still rank.
fn fts_match_expr(query: &str) -> Option<String> {
    let cleaned: String = query
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '\\'))
        .collect();
    let terms: Vec<String> = cleaned
        .split_whitespace()
        .map(|term| format!("\"{}\"", term))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn page_bounds(page: u32, limit: u32) -> (i64, i64) {
    let page = page.max(1) as i64;
    let limit = limit.max(1) as i64;
    (limit, (page - 1) * limit)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_manhwa(row: &rusqlite::Row) -> rusqlite::Result<Manhwa> {
    let data_source: String = row.get(2)?;
    let title: String = row.get(3)?;
    let title_json: String = row.get(4)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;
    let last_synced_at: Option<String> = row.get(17)?;
    let sync_status: String = row.get(18)?;

    let title_data: TitleData =
        serde_json::from_str(&title_json).unwrap_or_else(|_| TitleData::simple(title));

    Ok(Manhwa {
        id: row.get(0)?,
        upstream_id: row.get(1)?,
        data_source: DataSource::parse(&data_source).unwrap_or(DataSource::Local),
        title_data,
        synopsis: row.get(5)?,
        status: PublicationStatus::parse(&status).unwrap_or(PublicationStatus::Ongoing),
        publisher: row.get(7)?,
        start_year: row.get(8)?,
        end_year: row.get(9)?,
        total_chapters: row.get(10)?,
        special_chapters: row.get(11)?,
        cover_thumb: row.get(12)?,
        cover_medium: row.get(13)?,
        cover_large: row.get(14)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
        last_synced_at: last_synced_at.as_deref().map(parse_datetime),
        sync_status: SyncState::parse(&sync_status).unwrap_or(SyncState::Current),
        version: row.get(19)?,
        genres: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::YearRange;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn local_row(title: &str, synopsis: &str) -> NewManhwa {
        NewManhwa::local(
            TitleData::simple(title),
            synopsis,
            PublicationStatus::Ongoing,
        )
    }

    fn upstream_row(title: &str, upstream_id: &str) -> NewManhwa {
        let mut row = local_row(title, "Synced from the upstream catalogue.");
        row.data_source = DataSource::Upstream;
        row.upstream_id = Some(upstream_id.to_string());
        row
    }

    #[test]
    fn test_insert_and_find_round_trip() {
        let store = store();
        let inserted = store
            .insert(local_row("The Ascent", "A climb up the mountain."))
            .unwrap();
        assert!(inserted.id > 0);
        assert_eq!(inserted.version, 1);
        assert_eq!(inserted.sync_status, SyncState::Current);

        let found = store.find_by_id(inserted.id).unwrap();
        assert_eq!(found.title_data.primary, "The Ascent");
        assert_eq!(found.data_source, DataSource::Local);
        assert!(found.upstream_id.is_none());
    }

    #[test]
    fn test_find_missing_is_not_found() {
        let store = store();
        assert!(matches!(
            store.find_by_id(42).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_duplicate_upstream_id_conflicts() {
        let store = store();
        store.insert(upstream_row("First", "uid-1")).unwrap();
        let err = store.insert(upstream_row("Second", "uid-1")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_local_row_with_upstream_id_is_invalid() {
        let store = store();
        let mut row = local_row("Bad", "Inconsistent source pairing.");
        row.upstream_id = Some("uid-9".to_string());
        assert!(matches!(
            store.insert(row).unwrap_err(),
            StoreError::Invalid(_)
        ));
    }

    #[test]
    fn test_upstream_row_without_upstream_id_is_invalid() {
        let store = store();
        let mut row = local_row("Bad", "Inconsistent source pairing.");
        row.data_source = DataSource::Upstream;
        assert!(matches!(
            store.insert(row).unwrap_err(),
            StoreError::Invalid(_)
        ));
    }

    #[test]
    fn test_inverted_year_interval_is_invalid() {
        let store = store();
        let mut row = local_row("Bad Years", "End precedes start.");
        row.start_year = Some(2020);
        row.end_year = Some(2018);
        assert!(matches!(
            store.insert(row).unwrap_err(),
            StoreError::Invalid(_)
        ));
    }

    #[test]
    fn test_full_text_ranks_title_above_synopsis() {
        let store = store();
        store
            .insert(local_row("The Ascent", "A mountain climb story."))
            .unwrap();
        store
            .insert(local_row("Ascent of the Tower", "Floor after floor."))
            .unwrap();

        let (hits, total) = store
            .full_text_search("Ascent Tower", &SearchFilters::default(), 1, 10)
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].manhwa.title_data.primary, "Ascent of the Tower");
        assert_eq!(hits[1].manhwa.title_data.primary, "The Ascent");
        let top = hits[0].score.unwrap();
        let second = hits[1].score.unwrap();
        assert!(top > second, "expected {top} > {second}");
    }

    #[test]
    fn test_full_text_reindexes_after_update() {
        let store = store();
        let row = store
            .insert(local_row("Placeholder", "Nothing to see here."))
            .unwrap();

        store
            .update(
                row.id,
                ManhwaPatch {
                    title_data: Some(TitleData::simple("Moonlight Sculptor")),
                    ..Default::default()
                },
            )
            .unwrap();

        let (hits, _) = store
            .full_text_search("Moonlight", &SearchFilters::default(), 1, 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].manhwa.id, row.id);

        let (old, _) = store
            .full_text_search("Placeholder", &SearchFilters::default(), 1, 10)
            .unwrap();
        assert!(old.is_empty());
    }

    #[test]
    fn test_blank_query_orders_by_updated_at() {
        let store = store();
        let first = store.insert(local_row("First", "Inserted first.")).unwrap();
        let _second = store
            .insert(local_row("Second", "Inserted second."))
            .unwrap();

        // Touching the first row makes it the most recently updated.
        store
            .update(
                first.id,
                ManhwaPatch {
                    synopsis: Some("Touched again.".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let (hits, total) = store
            .filter_search(&SearchFilters::default(), 1, 10)
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(hits[0].manhwa.id, first.id);
        assert!(hits[0].score.is_none());
    }

    #[test]
    fn test_status_filter() {
        let store = store();
        let mut completed = local_row("Done", "It is finished.");
        completed.status = PublicationStatus::Completed;
        store.insert(completed).unwrap();
        store.insert(local_row("Running", "Still going.")).unwrap();

        let filters = SearchFilters {
            status: vec![PublicationStatus::Completed],
            ..Default::default()
        };
        let (hits, total) = store.filter_search(&filters, 1, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(hits[0].manhwa.title_data.primary, "Done");
    }

    #[test]
    fn test_genre_filter_via_junction() {
        let store = store();
        let action = store.upsert_genre("Action", "action").unwrap();
        let drama = store.upsert_genre("Drama", "drama").unwrap();

        let tagged = store.insert(local_row("Tagged", "Has genres.")).unwrap();
        store.attach_genres(tagged.id, &[action.id]).unwrap();
        store.insert(local_row("Untagged", "No genres.")).unwrap();

        let filters = SearchFilters {
            genres: vec!["action".to_string()],
            ..Default::default()
        };
        let (hits, total) = store.filter_search(&filters, 1, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(hits[0].manhwa.id, tagged.id);
        assert_eq!(hits[0].manhwa.genres, vec![action.clone()]);

        let filters = SearchFilters {
            genres: vec![drama.slug.clone()],
            ..Default::default()
        };
        let (_, total) = store.filter_search(&filters, 1, 10).unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_year_range_overlap() {
        let store = store();
        let mut bounded = local_row("Bounded", "Ran for three years.");
        bounded.start_year = Some(2015);
        bounded.end_year = Some(2018);
        store.insert(bounded).unwrap();

        let mut open = local_row("Open Ended", "Still running.");
        open.start_year = Some(2020);
        store.insert(open).unwrap();

        store
            .insert(local_row("Yearless", "No year recorded."))
            .unwrap();

        let search = |start, end| {
            let filters = SearchFilters {
                year_range: Some(YearRange { start, end }),
                ..Default::default()
            };
            let (hits, _) = store.filter_search(&filters, 1, 10).unwrap();
            hits.into_iter()
                .map(|h| h.manhwa.title_data.primary)
                .collect::<Vec<_>>()
        };

        // Overlapping interval.
        assert_eq!(search(2017, 2019), vec!["Bounded".to_string()]);
        // Null end year is open-ended into the future.
        assert_eq!(search(2024, 2030), vec!["Open Ended".to_string()]);
        // Disjoint before both rows.
        assert!(search(2000, 2010).is_empty());
        // Rows without a start year never match a year filter.
        let both = search(2010, 2030);
        assert_eq!(both.len(), 2);
        assert!(!both.contains(&"Yearless".to_string()));
    }

    #[test]
    fn test_pagination_bounds() {
        let store = store();
        for i in 0..5 {
            store
                .insert(local_row(&format!("Series {i}"), "Filler synopsis."))
                .unwrap();
        }

        let (page1, total) = store
            .filter_search(&SearchFilters::default(), 1, 2)
            .unwrap();
        let (page3, _) = store
            .filter_search(&SearchFilters::default(), 3, 2)
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);
        assert_eq!(page3.len(), 1);
    }

    #[test]
    fn test_update_bumps_version_on_request() {
        let store = store();
        let row = store.insert(local_row("Versioned", "Starts at one.")).unwrap();
        assert_eq!(row.version, 1);

        store
            .update(
                row.id,
                ManhwaPatch {
                    last_synced_at: Some(Utc::now()),
                    sync_status: Some(SyncState::Current),
                    bump_version: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = store.find_by_id(row.id).unwrap();
        assert_eq!(updated.version, 2);
        assert!(updated.last_synced_at.is_some());
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let store = store();
        let err = store
            .update(
                7,
                ManhwaPatch {
                    synopsis: Some("Ghost".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_mark_sync_failed() {
        let store = store();
        let row = store.insert(upstream_row("Flaky", "uid-flaky")).unwrap();
        store.mark_sync_failed(row.id).unwrap();
        let reloaded = store.find_by_id(row.id).unwrap();
        assert_eq!(reloaded.sync_status, SyncState::Failed);
    }

    #[test]
    fn test_list_outdated_ordering() {
        let store = store();
        let now = Utc::now();

        // Local rows never appear.
        store.insert(local_row("Local", "Never synced.")).unwrap();

        let stale = store.insert(upstream_row("Stale", "uid-stale")).unwrap();
        store
            .update(
                stale.id,
                ManhwaPatch {
                    last_synced_at: Some(now - chrono::Duration::hours(30)),
                    ..Default::default()
                },
            )
            .unwrap();

        let failed = store.insert(upstream_row("Failed", "uid-failed")).unwrap();
        store
            .update(
                failed.id,
                ManhwaPatch {
                    last_synced_at: Some(now - chrono::Duration::hours(1)),
                    ..Default::default()
                },
            )
            .unwrap();
        store.mark_sync_failed(failed.id).unwrap();

        let fresh = store.insert(upstream_row("Fresh", "uid-fresh")).unwrap();
        store
            .update(
                fresh.id,
                ManhwaPatch {
                    last_synced_at: Some(now),
                    ..Default::default()
                },
            )
            .unwrap();

        let never = store.insert(upstream_row("Never", "uid-never")).unwrap();

        let outdated = store
            .list_outdated(now - chrono::Duration::hours(24), 100)
            .unwrap();
        let ids: Vec<i64> = outdated.iter().map(|o| o.id).collect();

        // Failed first, then by oldest sync with never-synced rows first.
        assert_eq!(ids, vec![failed.id, never.id, stale.id]);
        assert_eq!(outdated[0].sync_status, SyncState::Failed);
    }

    #[test]
    fn test_find_by_ids_skips_missing() {
        let store = store();
        let a = store.insert(local_row("A", "First entry.")).unwrap();
        let b = store.insert(local_row("B", "Second entry.")).unwrap();

        let found = store.find_by_ids(&[a.id, 999, b.id]).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_genres_sorted_by_name() {
        let store = store();
        store.upsert_genre("Romance", "romance").unwrap();
        store.upsert_genre("Action", "action").unwrap();
        store.upsert_genre("Drama", "drama").unwrap();

        let all = store.list_all_genres().unwrap();
        let names: Vec<&str> = all.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Action", "Drama", "Romance"]);
    }

    #[test]
    fn test_upsert_genre_is_idempotent() {
        let store = store();
        let first = store.upsert_genre("Action", "action").unwrap();
        let second = store.upsert_genre("Action", "action").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_all_genres().unwrap().len(), 1);
    }

    #[test]
    fn test_fts_match_expr_sanitises() {
        assert_eq!(
            fts_match_expr("solo leveling").as_deref(),
            Some("\"solo\" OR \"leveling\"")
        );
        assert_eq!(fts_match_expr("\"' \\").as_deref(), None);
        assert_eq!(fts_match_expr("  ").as_deref(), None);
    }

    #[test]
    fn test_find_by_upstream_id() {
        let store = store();
        store.insert(upstream_row("Synced", "uid-7")).unwrap();
        assert!(store.find_by_upstream_id("uid-7").unwrap().is_some());
        assert!(store.find_by_upstream_id("uid-8").unwrap().is_none());
    }
}
