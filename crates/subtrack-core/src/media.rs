// ABOUTME: Types describing tracked episode media files and their fetched subtitles.
// ABOUTME: Contains the episode UID, the upsert payload, and the flat query projection rows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one episode across possibly multiple media files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeUid {
    pub tv_db_id: i64,
    pub season_number: i64,
    pub episode_number: i64,
}

impl fmt::Display for EpisodeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tvdb {} s{:02}e{:02}",
            self.tv_db_id, self.season_number, self.episode_number
        )
    }
}

/// Payload for upserting one tracked media file. The identity key is
/// (tv_db_id, season_number, episode_number, media_filename); every other
/// field is overwritten unconditionally on each upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMediaUpsert {
    pub series_title: Option<String>,
    pub tv_db_id: Option<i64>,
    pub season_number: Option<i64>,
    pub episode_number: Option<i64>,
    pub episode_title: Option<String>,
    pub quality: Option<String>,
    pub video_languages: Option<String>,
    pub media_filename: String,
    pub dirty: bool,
}

impl SeriesMediaUpsert {
    /// Create a payload for the given filename. `dirty` defaults to true
    /// (subtitle state unverified); descriptive fields default to None.
    pub fn new(media_filename: String) -> Self {
        Self {
            series_title: None,
            tv_db_id: None,
            season_number: None,
            episode_number: None,
            episode_title: None,
            quality: None,
            video_languages: None,
            media_filename,
            dirty: true,
        }
    }

    /// Create a payload keyed to a known episode.
    pub fn for_episode(uid: &EpisodeUid, media_filename: String) -> Self {
        Self {
            tv_db_id: Some(uid.tv_db_id),
            season_number: Some(uid.season_number),
            episode_number: Some(uid.episode_number),
            ..Self::new(media_filename)
        }
    }
}

/// One fetched subtitle joined with its parent media row, most-recent-first
/// in query results. One row per subtitle language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedSubtitleRow {
    pub added_timestamp: String,
    pub series_title: Option<String>,
    pub season_number: Option<i64>,
    pub episode_number: Option<i64>,
    pub episode_title: Option<String>,
    pub quality: Option<String>,
    pub video_languages: Option<String>,
    pub subtitle_language: String,
}

/// One tracked media row with its fetched subtitle languages collected into
/// a lexicographically sorted list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSummaryRow {
    pub added_timestamp: String,
    pub series_title: Option<String>,
    pub season_number: Option<i64>,
    pub episode_number: Option<i64>,
    pub episode_title: Option<String>,
    pub quality: Option<String>,
    pub video_languages: Option<String>,
    pub subtitle_languages: Vec<String>,
    pub dirty: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_new_defaults_to_dirty() {
        let upsert = SeriesMediaUpsert::new("ep1.mkv".to_string());

        assert_eq!(upsert.media_filename, "ep1.mkv");
        assert!(upsert.dirty);
        assert!(upsert.series_title.is_none());
        assert!(upsert.tv_db_id.is_none());
        assert!(upsert.quality.is_none());
        assert!(upsert.video_languages.is_none());
    }

    #[test]
    fn upsert_for_episode_sets_key_fields() {
        let uid = EpisodeUid {
            tv_db_id: 100,
            season_number: 1,
            episode_number: 2,
        };
        let upsert = SeriesMediaUpsert::for_episode(&uid, "ep2.mkv".to_string());

        assert_eq!(upsert.tv_db_id, Some(100));
        assert_eq!(upsert.season_number, Some(1));
        assert_eq!(upsert.episode_number, Some(2));
        assert_eq!(upsert.media_filename, "ep2.mkv");
        assert!(upsert.dirty);
    }

    #[test]
    fn episode_uid_display() {
        let uid = EpisodeUid {
            tv_db_id: 100,
            season_number: 1,
            episode_number: 2,
        };
        assert_eq!(uid.to_string(), "tvdb 100 s01e02");
    }
}
