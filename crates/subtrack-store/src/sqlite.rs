// ABOUTME: SQLite schema and query operations for events, tracked media, and fetched subtitles.
// ABOUTME: Provides idempotent table creation, transactional upserts, and ordered list queries.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use subtrack_core::{EpisodeUid, EventRow, FetchedSubtitleRow, MediaSummaryRow, SeriesMediaUpsert};
use thiserror::Error;

/// Timestamp layout persisted in every table: second precision, no timezone.
/// Lexicographic order on the stored text matches chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Fixed cap on the media overview query.
const MEDIA_LIST_LIMIT: u32 = 100;

/// Errors that can occur during SQLite operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("media_filename must not be empty")]
    EmptyMediaFilename,
}

/// Whether an upsert matched an existing row or had to create one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Found,
}

/// A connection to the subtrack database with all schema and query
/// operations. Not Send-shareable; `queue::StoreHandle` owns one of these on
/// a dedicated worker thread for serialized access.
pub struct SqliteDb {
    conn: Connection,
}

impl SqliteDb {
    /// Open or create the database file at the given path.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        Self::from_conn(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, SqliteError> {
        Self::from_conn(Connection::open_in_memory()?)
    }

    fn from_conn(conn: Connection) -> Result<Self, SqliteError> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Create the schema. Safe to call when the tables already exist; must
    /// run before any other operation on a fresh database.
    pub fn create_tables(&self) -> Result<(), SqliteError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY,
                timestamp TEXT NOT NULL,
                type TEXT NOT NULL,
                message TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS series_medias (
                id INTEGER PRIMARY KEY,
                tv_db_id INTEGER,
                season_number INTEGER,
                episode_number INTEGER,
                added_timestamp TEXT NOT NULL,
                series_title TEXT,
                episode_title TEXT,
                quality TEXT,
                video_languages TEXT,
                dirty INTEGER NOT NULL DEFAULT 1,
                media_filename TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_series_medias_filename
                ON series_medias (media_filename);

            CREATE UNIQUE INDEX IF NOT EXISTS idx_series_medias_identity
                ON series_medias (tv_db_id, season_number, episode_number, media_filename);

            CREATE TABLE IF NOT EXISTS series_subtitles (
                id INTEGER PRIMARY KEY,
                series_media_id INTEGER NOT NULL,
                added_timestamp TEXT NOT NULL,
                language TEXT NOT NULL,
                FOREIGN KEY (series_media_id)
                    REFERENCES series_medias (id) ON DELETE CASCADE,
                UNIQUE (series_media_id, language)
            );",
        )?;
        Ok(())
    }

    /// Append one immutable event row, timestamped at call time.
    pub fn insert_event(&self, event_type: &str, message: &str) -> Result<(), SqliteError> {
        self.conn.execute(
            "INSERT INTO events (timestamp, type, message) VALUES (?1, ?2, ?3)",
            params![timestamp_now(), event_type, message],
        )?;
        Ok(())
    }

    /// List the most recent events, newest first, truncated to `limit`.
    pub fn recent_events(&self, limit: u32) -> Result<Vec<EventRow>, SqliteError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, type, message FROM events
             ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(EventRow {
                timestamp: row.get(0)?,
                event_type: row.get(1)?,
                message: row.get(2)?,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Upsert one tracked media file by its identity key
    /// (tv_db_id, season_number, episode_number, media_filename): select, insert
    /// if absent, then overwrite every descriptive field and the dirty flag.
    /// Last write wins per identity key. Runs in one transaction.
    pub fn update_series_media(
        &mut self,
        upsert: &SeriesMediaUpsert,
    ) -> Result<UpsertOutcome, SqliteError> {
        if upsert.media_filename.is_empty() {
            return Err(SqliteError::EmptyMediaFilename);
        }

        let tx = self.conn.transaction()?;

        // IS instead of = so NULL key components still match their row.
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM series_medias
                 WHERE tv_db_id IS ?1 AND season_number IS ?2
                   AND episode_number IS ?3 AND media_filename = ?4",
                params![
                    upsert.tv_db_id,
                    upsert.season_number,
                    upsert.episode_number,
                    upsert.media_filename,
                ],
                |row| row.get(0),
            )
            .optional()?;

        let (media_id, outcome) = match existing {
            Some(id) => (id, UpsertOutcome::Found),
            None => {
                tx.execute(
                    "INSERT INTO series_medias
                        (tv_db_id, season_number, episode_number, added_timestamp, media_filename)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        upsert.tv_db_id,
                        upsert.season_number,
                        upsert.episode_number,
                        timestamp_now(),
                        upsert.media_filename,
                    ],
                )?;
                (tx.last_insert_rowid(), UpsertOutcome::Created)
            }
        };

        tx.execute(
            "UPDATE series_medias
             SET series_title = ?1, episode_title = ?2, quality = ?3,
                 video_languages = ?4, dirty = ?5, media_filename = ?6
             WHERE id = ?7",
            params![
                upsert.series_title,
                upsert.episode_title,
                upsert.quality,
                upsert.video_languages,
                upsert.dirty,
                upsert.media_filename,
                media_id,
            ],
        )?;

        tx.commit()?;
        tracing::debug!(
            filename = %upsert.media_filename,
            ?outcome,
            "upserted series media"
        );
        Ok(outcome)
    }

    /// Record fetched subtitle languages for an episode. Every media row
    /// matching the episode UID gains one subtitle row per newly seen
    /// language (set union, find-or-create) and has its dirty flag set to
    /// `dirty`. Zero matching rows is a no-op. Runs in one transaction.
    pub fn update_fetched_series_subtitles(
        &mut self,
        uid: &EpisodeUid,
        languages: &[String],
        dirty: bool,
    ) -> Result<(), SqliteError> {
        let tx = self.conn.transaction()?;

        let media_ids: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM series_medias
                 WHERE tv_db_id = ?1 AND season_number = ?2 AND episode_number = ?3",
            )?;
            let rows = stmt.query_map(
                params![uid.tv_db_id, uid.season_number, uid.episode_number],
                |row| row.get(0),
            )?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            ids
        };

        let mut created = 0usize;
        for media_id in &media_ids {
            for language in languages {
                let already: bool = tx.query_row(
                    "SELECT EXISTS(
                        SELECT 1 FROM series_subtitles
                        WHERE series_media_id = ?1 AND language = ?2)",
                    params![media_id, language],
                    |row| row.get(0),
                )?;
                if !already {
                    tx.execute(
                        "INSERT INTO series_subtitles (series_media_id, added_timestamp, language)
                         VALUES (?1, ?2, ?3)",
                        params![media_id, timestamp_now(), language],
                    )?;
                    created += 1;
                }
            }
            tx.execute(
                "UPDATE series_medias SET dirty = ?1 WHERE id = ?2",
                params![dirty, media_id],
            )?;
        }

        tx.commit()?;
        tracing::debug!(
            uid = %uid,
            matched = media_ids.len(),
            created,
            "recorded fetched subtitle languages"
        );
        Ok(())
    }

    /// List fetched subtitles joined with their parent media, newest subtitle
    /// first, truncated to `limit`. One row per subtitle language.
    pub fn last_fetched_series(&self, limit: u32) -> Result<Vec<FetchedSubtitleRow>, SqliteError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.added_timestamp, m.series_title, m.season_number, m.episode_number,
                    m.episode_title, m.quality, m.video_languages, s.language
             FROM series_subtitles s
             JOIN series_medias m ON m.id = s.series_media_id
             ORDER BY s.added_timestamp DESC, s.id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(FetchedSubtitleRow {
                added_timestamp: row.get(0)?,
                series_title: row.get(1)?,
                season_number: row.get(2)?,
                episode_number: row.get(3)?,
                episode_title: row.get(4)?,
                quality: row.get(5)?,
                video_languages: row.get(6)?,
                subtitle_language: row.get(7)?,
            })
        })?;

        let mut fetched = Vec::new();
        for row in rows {
            fetched.push(row?);
        }
        Ok(fetched)
    }

    /// List tracked media rows, ordered by series title descending and capped
    /// at an internal limit, each with its subtitle languages sorted
    /// lexicographically.
    pub fn media_summaries(&self) -> Result<Vec<MediaSummaryRow>, SqliteError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, added_timestamp, series_title, season_number, episode_number,
                    episode_title, quality, video_languages, dirty
             FROM series_medias
             ORDER BY series_title DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![MEDIA_LIST_LIMIT], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                MediaSummaryRow {
                    added_timestamp: row.get(1)?,
                    series_title: row.get(2)?,
                    season_number: row.get(3)?,
                    episode_number: row.get(4)?,
                    episode_title: row.get(5)?,
                    quality: row.get(6)?,
                    video_languages: row.get(7)?,
                    subtitle_languages: Vec::new(),
                    dirty: row.get(8)?,
                },
            ))
        })?;

        let mut medias = Vec::new();
        for row in rows {
            medias.push(row?);
        }

        let mut lang_stmt = self.conn.prepare(
            "SELECT language FROM series_subtitles
             WHERE series_media_id = ?1 ORDER BY language ASC",
        )?;

        let mut summaries = Vec::with_capacity(medias.len());
        for (media_id, mut summary) in medias {
            let langs = lang_stmt.query_map(params![media_id], |row| row.get(0))?;
            for lang in langs {
                summary.subtitle_languages.push(lang?);
            }
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// True iff at least one tracked media row has this exact filename.
    pub fn media_exists(&self, media_filename: &str) -> Result<bool, SqliteError> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM series_medias WHERE media_filename = ?1)",
            params![media_filename],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

fn timestamp_now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}
