//! Reduction of upstream records to local catalogue rows.
//!
//! Upstream title and description dictionaries stay untyped until this
//! step; here they collapse to the local structured forms with a fixed
//! language preference.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{CoverUrls, UpstreamManga};
use crate::store::{
    AltTitle, DataSource, ManhwaPatch, NewManhwa, PublicationStatus, SyncState, TitleData,
};

/// Language preference for titles and descriptions.
const PREFERRED_LANGUAGES: [&str; 3] = ["en", "ko", "ja"];

/// Alt-title keys that hold a romanized reading.
const ROMANIZED_KEYS: [&str; 3] = ["ja-ro", "ko-ro", "en-ro"];

/// Pick the first non-empty entry for the preferred languages, else any
/// non-empty entry.
pub fn pick_localised(map: &HashMap<String, String>, preferred: &[&str]) -> Option<String> {
    for lang in preferred {
        if let Some(value) = map.get(*lang) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }
    }
    map.values().find(|v| !v.is_empty()).cloned()
}

fn romanized_title(record: &UpstreamManga) -> Option<String> {
    for alt in &record.alt_titles {
        for key in ROMANIZED_KEYS {
            if let Some(value) = alt.get(key) {
                if !value.is_empty() {
                    return Some(value.clone());
                }
            }
        }
    }
    None
}

fn alternatives(record: &UpstreamManga) -> Vec<AltTitle> {
    record
        .alt_titles
        .iter()
        .flat_map(|alt| {
            alt.iter().map(|(language, title)| AltTitle {
                language: language.clone(),
                title: title.clone(),
            })
        })
        .collect()
}

/// Map an upstream status string; anything unknown reads as ongoing.
fn map_status(status: Option<&str>) -> PublicationStatus {
    status
        .and_then(|s| PublicationStatus::parse(&s.to_lowercase()))
        .unwrap_or(PublicationStatus::Ongoing)
}

/// Chapter counters arrive as strings like "179" or "179.5"; keep the whole
/// chapters.
fn chapter_count(last_chapter: Option<&str>) -> Option<u32> {
    let raw = last_chapter?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().map(|n| n.max(0.0) as u32)
}

fn title_data(record: &UpstreamManga) -> TitleData {
    TitleData {
        primary: pick_localised(&record.title, &PREFERRED_LANGUAGES)
            .unwrap_or_else(|| "Untitled".to_string()),
        alternatives: alternatives(record),
        romanized: romanized_title(record),
    }
}

/// Reduce an upstream record to a partial row for `SyncOne`. Fields the
/// upstream has nothing for stay untouched on the local row.
pub fn to_patch(record: &UpstreamManga) -> ManhwaPatch {
    ManhwaPatch {
        title_data: Some(title_data(record)),
        synopsis: pick_localised(&record.description, &PREFERRED_LANGUAGES),
        status: Some(map_status(record.status.as_deref())),
        start_year: record.year,
        total_chapters: chapter_count(record.last_chapter.as_deref()),
        ..Default::default()
    }
}

/// Build the insert payload for `Import`.
pub fn to_new_manhwa(
    record: &UpstreamManga,
    covers: Option<&CoverUrls>,
    now: DateTime<Utc>,
) -> NewManhwa {
    NewManhwa {
        upstream_id: Some(record.id.clone()),
        data_source: DataSource::Upstream,
        title_data: title_data(record),
        synopsis: pick_localised(&record.description, &PREFERRED_LANGUAGES).unwrap_or_default(),
        status: map_status(record.status.as_deref()),
        publisher: None,
        start_year: record.year,
        end_year: None,
        total_chapters: chapter_count(record.last_chapter.as_deref()),
        special_chapters: None,
        cover_thumb: covers.map(|c| c.thumb.clone()),
        cover_medium: covers.map(|c| c.medium.clone()),
        cover_large: covers.map(|c| c.large.clone()),
        last_synced_at: Some(now),
        sync_status: SyncState::Current,
    }
}

/// Derive the three cover resolutions from the cover-art file name. No
/// cover relationship means no URLs.
pub fn build_cover_urls(base_url: &str, record: &UpstreamManga) -> Option<CoverUrls> {
    let filename = record.cover_filename.as_deref()?;
    let base = base_url.trim_end_matches('/');
    let large = format!("{base}/covers/{}/{}", record.id, filename);
    Some(CoverUrls {
        thumb: format!("{large}.256.jpg"),
        medium: format!("{large}.512.jpg"),
        large,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_pick_localised_prefers_english() {
        let map = dict(&[("ko", "한국어"), ("en", "English"), ("ja", "日本語")]);
        assert_eq!(
            pick_localised(&map, &PREFERRED_LANGUAGES),
            Some("English".to_string())
        );
    }

    #[test]
    fn test_pick_localised_falls_through_preference() {
        let map = dict(&[("ja", "日本語"), ("ko", "한국어")]);
        assert_eq!(
            pick_localised(&map, &PREFERRED_LANGUAGES),
            Some("한국어".to_string())
        );
    }

    #[test]
    fn test_pick_localised_any_when_no_preferred() {
        let map = dict(&[("fr", "Français")]);
        assert_eq!(
            pick_localised(&map, &PREFERRED_LANGUAGES),
            Some("Français".to_string())
        );
        assert_eq!(pick_localised(&HashMap::new(), &PREFERRED_LANGUAGES), None);
    }

    #[test]
    fn test_pick_localised_skips_empty_values() {
        let map = dict(&[("en", ""), ("ko", "한국어")]);
        assert_eq!(
            pick_localised(&map, &PREFERRED_LANGUAGES),
            Some("한국어".to_string())
        );
    }

    #[test]
    fn test_romanized_key_priority() {
        let record = UpstreamManga {
            alt_titles: vec![
                dict(&[("ko", "나 혼자만 레벨업")]),
                dict(&[("ko-ro", "Na Honjaman Lebel-eob")]),
            ],
            ..Default::default()
        };
        assert_eq!(
            romanized_title(&record),
            Some("Na Honjaman Lebel-eob".to_string())
        );
    }

    #[test]
    fn test_status_mapping_defaults_to_ongoing() {
        assert_eq!(map_status(Some("completed")), PublicationStatus::Completed);
        assert_eq!(map_status(Some("HIATUS")), PublicationStatus::Hiatus);
        assert_eq!(map_status(Some("axed")), PublicationStatus::Ongoing);
        assert_eq!(map_status(None), PublicationStatus::Ongoing);
    }

    #[test]
    fn test_chapter_count_parsing() {
        assert_eq!(chapter_count(Some("179")), Some(179));
        assert_eq!(chapter_count(Some("179.5")), Some(179));
        assert_eq!(chapter_count(Some("")), None);
        assert_eq!(chapter_count(Some("extra")), None);
        assert_eq!(chapter_count(None), None);
    }

    #[test]
    fn test_to_patch_preserves_missing_synopsis() {
        let record = UpstreamManga {
            id: "uid-1".to_string(),
            title: dict(&[("en", "Tower of Dawn")]),
            ..Default::default()
        };
        let patch = to_patch(&record);
        assert_eq!(patch.title_data.unwrap().primary, "Tower of Dawn");
        // No upstream description must not blank the local synopsis.
        assert!(patch.synopsis.is_none());
        assert_eq!(patch.status, Some(PublicationStatus::Ongoing));
    }

    #[test]
    fn test_to_new_manhwa_is_upstream_sourced() {
        let record = UpstreamManga {
            id: "c0ffee00-1111-2222-3333-444455556666".to_string(),
            title: dict(&[("en", "Imported")]),
            description: dict(&[("en", "An imported series.")]),
            status: Some("completed".to_string()),
            year: Some(2019),
            last_chapter: Some("120".to_string()),
            ..Default::default()
        };
        let covers = CoverUrls {
            thumb: "t".to_string(),
            medium: "m".to_string(),
            large: "l".to_string(),
        };

        let row = to_new_manhwa(&record, Some(&covers), Utc::now());
        assert_eq!(row.data_source, DataSource::Upstream);
        assert_eq!(row.upstream_id.as_deref(), Some(record.id.as_str()));
        assert_eq!(row.status, PublicationStatus::Completed);
        assert_eq!(row.start_year, Some(2019));
        assert_eq!(row.total_chapters, Some(120));
        assert_eq!(row.cover_thumb.as_deref(), Some("t"));
        assert!(row.last_synced_at.is_some());
        assert_eq!(row.sync_status, SyncState::Current);
    }

    #[test]
    fn test_cover_urls_suffixes() {
        let record = UpstreamManga {
            id: "uid-9".to_string(),
            cover_filename: Some("cover.jpg".to_string()),
            ..Default::default()
        };
        let urls = build_cover_urls("https://api.example.org/", &record).unwrap();
        assert_eq!(
            urls.large,
            "https://api.example.org/covers/uid-9/cover.jpg"
        );
        assert_eq!(urls.thumb, format!("{}.256.jpg", urls.large));
        assert_eq!(urls.medium, format!("{}.512.jpg", urls.large));
    }

    #[test]
    fn test_cover_urls_absent_without_relationship() {
        let record = UpstreamManga::default();
        assert!(build_cover_urls("https://api.example.org", &record).is_none());
    }

    #[test]
    fn test_untitled_fallback() {
        let record = UpstreamManga::default();
        let patch = to_patch(&record);
        assert_eq!(patch.title_data.unwrap().primary, "Untitled");
    }
}
