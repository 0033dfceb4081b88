// ABOUTME: Persistence layer for subtrack: SQLite schema, queries, and the serialized queue.
// ABOUTME: Provides SqliteDb for direct connection use and StoreHandle for queued async access.

pub mod queue;
pub mod sqlite;

pub use queue::{StoreError, StoreHandle};
pub use sqlite::{SqliteDb, SqliteError, UpsertOutcome};
