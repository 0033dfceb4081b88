// ABOUTME: Domain and boundary types for the subtrack persistence layer.
// ABOUTME: Holds the episode UID, the media upsert payload, and read projection rows.

pub mod event;
pub mod media;

pub use event::EventRow;
pub use media::{EpisodeUid, FetchedSubtitleRow, MediaSummaryRow, SeriesMediaUpsert};
