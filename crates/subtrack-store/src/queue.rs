// ABOUTME: Serialized access queue for the subtrack database.
// ABOUTME: A worker thread owns the lazily opened connection; StoreHandle sends typed requests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;

use subtrack_core::{EpisodeUid, EventRow, FetchedSubtitleRow, MediaSummaryRow, SeriesMediaUpsert};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::sqlite::{SqliteDb, SqliteError, UpsertOutcome};

/// Errors surfaced by the store handle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] SqliteError),

    #[error("store worker has shut down")]
    WorkerGone,
}

type Reply<T> = oneshot::Sender<Result<T, SqliteError>>;

/// One queued operation, paired with the oneshot sender for its result.
enum Request {
    CreateTables {
        reply: Reply<()>,
    },
    InsertEvent {
        event_type: String,
        message: String,
        reply: Reply<()>,
    },
    RecentEvents {
        limit: u32,
        reply: Reply<Vec<EventRow>>,
    },
    UpdateSeriesMedia {
        upsert: SeriesMediaUpsert,
        reply: Reply<UpsertOutcome>,
    },
    UpdateFetchedSeriesSubtitles {
        uid: EpisodeUid,
        languages: Vec<String>,
        dirty: bool,
        reply: Reply<()>,
    },
    LastFetchedSeries {
        limit: u32,
        reply: Reply<Vec<FetchedSubtitleRow>>,
    },
    MediaSummaries {
        reply: Reply<Vec<MediaSummaryRow>>,
    },
    MediaExists {
        media_filename: String,
        reply: Reply<bool>,
    },
}

enum OpenTarget {
    File(PathBuf),
    Memory,
}

/// Cloneable async handle to the store. Every operation, read or write, is
/// queued to one worker thread that owns the connection, so no two
/// operations ever run concurrently against the database. Callers await
/// their operation's completion; there is no timeout or cancellation.
/// Dropping every handle ends the worker and closes the connection.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<Request>,
}

impl StoreHandle {
    /// Start a store worker for the database file at `path`. The connection
    /// itself opens lazily on the first operation. With `reset`, an existing
    /// database file is deleted first; a missing file is fine.
    pub fn open(path: impl Into<PathBuf>, reset: bool) -> Result<Self, StoreError> {
        let path = path.into();
        if reset {
            remove_db_files(&path)?;
        }
        Self::spawn(OpenTarget::File(path))
    }

    /// Start a store worker on a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::spawn(OpenTarget::Memory)
    }

    fn spawn(target: OpenTarget) -> Result<Self, StoreError> {
        let (tx, rx) = mpsc::channel(64);
        thread::Builder::new()
            .name("subtrack-store".to_string())
            .spawn(move || worker_loop(target, rx))?;
        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        req: Request,
        rx: oneshot::Receiver<Result<T, SqliteError>>,
    ) -> Result<T, StoreError> {
        self.tx.send(req).await.map_err(|_| StoreError::WorkerGone)?;
        match rx.await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::WorkerGone),
        }
    }

    /// Create the schema; see [`SqliteDb::create_tables`].
    pub async fn create_tables(&self) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::CreateTables { reply }, rx).await
    }

    /// Append one immutable event row, timestamped at call time.
    pub async fn insert_event(&self, event_type: &str, message: &str) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Request::InsertEvent {
                event_type: event_type.to_string(),
                message: message.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    /// List the most recent events, newest first, truncated to `limit`.
    pub async fn recent_events(&self, limit: u32) -> Result<Vec<EventRow>, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::RecentEvents { limit, reply }, rx).await
    }

    /// Upsert one tracked media file; see [`SqliteDb::update_series_media`].
    pub async fn update_series_media(
        &self,
        upsert: SeriesMediaUpsert,
    ) -> Result<UpsertOutcome, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::UpdateSeriesMedia { upsert, reply }, rx).await
    }

    /// Record fetched subtitle languages for an episode; see
    /// [`SqliteDb::update_fetched_series_subtitles`].
    pub async fn update_fetched_series_subtitles(
        &self,
        uid: EpisodeUid,
        languages: Vec<String>,
        dirty: bool,
    ) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Request::UpdateFetchedSeriesSubtitles {
                uid,
                languages,
                dirty,
                reply,
            },
            rx,
        )
        .await
    }

    /// List fetched subtitles joined with their media, newest first.
    pub async fn last_fetched_series(
        &self,
        limit: u32,
    ) -> Result<Vec<FetchedSubtitleRow>, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::LastFetchedSeries { limit, reply }, rx).await
    }

    /// List tracked media with sorted subtitle languages.
    pub async fn media_summaries(&self) -> Result<Vec<MediaSummaryRow>, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::MediaSummaries { reply }, rx).await
    }

    /// True iff at least one tracked media row has this exact filename.
    pub async fn media_exists(&self, media_filename: &str) -> Result<bool, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Request::MediaExists {
                media_filename: media_filename.to_string(),
                reply,
            },
            rx,
        )
        .await
    }
}

/// Delete the database file together with its `-wal`/`-shm` siblings; a
/// stale WAL next to a recreated database would otherwise be picked up by
/// name. Missing files are fine.
fn remove_db_files(path: &Path) -> Result<(), StoreError> {
    for target in [
        path.to_path_buf(),
        with_suffix(path, "-wal"),
        with_suffix(path, "-shm"),
    ] {
        match std::fs::remove_file(&target) {
            Ok(()) => tracing::info!(path = %target.display(), "removed database file"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

fn worker_loop(target: OpenTarget, mut rx: mpsc::Receiver<Request>) {
    let mut db: Option<SqliteDb> = None;
    while let Some(req) = rx.blocking_recv() {
        match ensure_open(&target, &mut db) {
            Ok(db) => dispatch(db, req),
            Err(err) => refuse(req, err),
        }
    }
    tracing::debug!("store worker stopped");
}

/// Open the connection on first use; later requests reuse it. An open
/// failure is reported to the requester and retried on the next request.
fn ensure_open<'a>(
    target: &OpenTarget,
    db: &'a mut Option<SqliteDb>,
) -> Result<&'a mut SqliteDb, SqliteError> {
    match db {
        Some(opened) => Ok(opened),
        None => {
            let opened = match target {
                OpenTarget::File(path) => {
                    let opened = SqliteDb::open(path)?;
                    tracing::info!(path = %path.display(), "opened database");
                    opened
                }
                OpenTarget::Memory => SqliteDb::open_in_memory()?,
            };
            Ok(db.insert(opened))
        }
    }
}

// Reply send failures are ignored throughout: the caller may have dropped
// its receiver.
fn dispatch(db: &mut SqliteDb, req: Request) {
    match req {
        Request::CreateTables { reply } => {
            let _ = reply.send(db.create_tables());
        }
        Request::InsertEvent {
            event_type,
            message,
            reply,
        } => {
            let _ = reply.send(db.insert_event(&event_type, &message));
        }
        Request::RecentEvents { limit, reply } => {
            let _ = reply.send(db.recent_events(limit));
        }
        Request::UpdateSeriesMedia { upsert, reply } => {
            let _ = reply.send(db.update_series_media(&upsert));
        }
        Request::UpdateFetchedSeriesSubtitles {
            uid,
            languages,
            dirty,
            reply,
        } => {
            let _ = reply.send(db.update_fetched_series_subtitles(&uid, &languages, dirty));
        }
        Request::LastFetchedSeries { limit, reply } => {
            let _ = reply.send(db.last_fetched_series(limit));
        }
        Request::MediaSummaries { reply } => {
            let _ = reply.send(db.media_summaries());
        }
        Request::MediaExists {
            media_filename,
            reply,
        } => {
            let _ = reply.send(db.media_exists(&media_filename));
        }
    }
}

fn refuse(req: Request, err: SqliteError) {
    match req {
        Request::CreateTables { reply } => {
            let _ = reply.send(Err(err));
        }
        Request::InsertEvent { reply, .. } => {
            let _ = reply.send(Err(err));
        }
        Request::RecentEvents { reply, .. } => {
            let _ = reply.send(Err(err));
        }
        Request::UpdateSeriesMedia { reply, .. } => {
            let _ = reply.send(Err(err));
        }
        Request::UpdateFetchedSeriesSubtitles { reply, .. } => {
            let _ = reply.send(Err(err));
        }
        Request::LastFetchedSeries { reply, .. } => {
            let _ = reply.send(Err(err));
        }
        Request::MediaSummaries { reply } => {
            let _ = reply.send(Err(err));
        }
        Request::MediaExists { reply, .. } => {
            let _ = reply.send(Err(err));
        }
    }
}
