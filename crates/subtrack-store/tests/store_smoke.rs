// ABOUTME: End-to-end smoke test for the subtrack store lifecycle.
// ABOUTME: Walks event logging, media upserts, subtitle recording, and every read query.

use subtrack_core::{EpisodeUid, SeriesMediaUpsert};
use subtrack_store::{StoreHandle, UpsertOutcome};

#[tokio::test]
async fn smoke_test_full_lifecycle() {
    // 1. Fresh database file in a temp dir
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("subtrack.db");
    let store = StoreHandle::open(&path, false).unwrap();
    store.create_tables().await.unwrap();

    // 2. Log two events; only the newest comes back with limit 1
    store.insert_event("grab", "Episode grabbed").await.unwrap();
    store
        .insert_event("download", "Episode downloaded")
        .await
        .unwrap();

    let events = store.recent_events(1).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "download");
    assert_eq!(events[0].message, "Episode downloaded");
    assert_eq!(events[0].timestamp.len(), 19);

    // 3. Track a media file
    let uid = EpisodeUid {
        tv_db_id: 100,
        season_number: 1,
        episode_number: 2,
    };
    let upsert = SeriesMediaUpsert {
        series_title: Some("Show".to_string()),
        episode_title: Some("The Second One".to_string()),
        quality: Some("1080p".to_string()),
        ..SeriesMediaUpsert::for_episode(&uid, "ep2.mkv".to_string())
    };
    let outcome = store.update_series_media(upsert.clone()).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);
    assert!(store.media_exists("ep2.mkv").await.unwrap());

    // Same key again: found, still one row
    let outcome = store.update_series_media(upsert).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Found);

    // 4. Record fetched subtitle languages for the episode
    store
        .update_fetched_series_subtitles(uid, vec!["en".to_string(), "fr".to_string()], true)
        .await
        .unwrap();

    let summaries = store.media_summaries().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].series_title.as_deref(), Some("Show"));
    assert_eq!(summaries[0].subtitle_languages, vec!["en", "fr"]);
    assert!(summaries[0].dirty);

    // 5. Fetched-subtitles view: one row per language, media fields joined in
    let fetched = store.last_fetched_series(10).await.unwrap();
    assert_eq!(fetched.len(), 2);
    for row in &fetched {
        assert_eq!(row.series_title.as_deref(), Some("Show"));
        assert_eq!(row.quality.as_deref(), Some("1080p"));
        assert_eq!(row.episode_number, Some(2));
    }

    // 6. Unknown filename still reports absent
    assert!(!store.media_exists("ep3.mkv").await.unwrap());
}
