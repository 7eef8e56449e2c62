//! Shared test fixtures.

use chrono::Utc;

use crate::store::{
    DataSource, Manhwa, NewManhwa, PublicationStatus, SyncState, TitleData,
};
use crate::upstream::UpstreamManga;

/// An in-memory local entity, not backed by any store row.
pub fn local_manhwa(id: i64, title: &str, synopsis: &str) -> Manhwa {
    let now = Utc::now();
    Manhwa {
        id,
        upstream_id: None,
        data_source: DataSource::Local,
        title_data: TitleData::simple(title),
        synopsis: synopsis.to_string(),
        status: PublicationStatus::Ongoing,
        publisher: None,
        start_year: None,
        end_year: None,
        total_chapters: None,
        special_chapters: None,
        cover_thumb: None,
        cover_medium: None,
        cover_large: None,
        created_at: now,
        updated_at: now,
        last_synced_at: None,
        sync_status: SyncState::Current,
        version: 1,
        genres: Vec::new(),
    }
}

/// Insert payload for an upstream-sourced row.
pub fn imported_row(upstream_id: &str, title: &str) -> NewManhwa {
    let mut row = NewManhwa::local(
        TitleData::simple(title),
        "Synced from the upstream catalogue.",
        PublicationStatus::Ongoing,
    );
    row.data_source = DataSource::Upstream;
    row.upstream_id = Some(upstream_id.to_string());
    row
}

/// A minimal upstream record with an English title and description.
pub fn upstream_record(upstream_id: &str, title: &str) -> UpstreamManga {
    let mut record = UpstreamManga {
        id: upstream_id.to_string(),
        ..Default::default()
    };
    record.title.insert("en".to_string(), title.to_string());
    record.description.insert(
        "en".to_string(),
        format!("{title} as described by the upstream catalogue."),
    );
    record.status = Some("ongoing".to_string());
    record
}
