use chrono::{Duration, Utc};
use pcapcache::cache::{AnalysisCache, CacheKey, CacheService, ResultKind};
use pcapcache::cancel::CancelFlag;
use pcapcache::model::VoiceQosResult;
use rusqlite::{params, Connection};
use std::path::Path;
use tempfile::tempdir;

fn backdate(db: &Path, key: &CacheKey, days: i64) {
    let at = (Utc::now() - Duration::days(days)).timestamp_millis();
    let conn = Connection::open(db).unwrap();
    conn.execute(
        "UPDATE analysis_cache SET last_accessed_at = ?1 WHERE cache_key = ?2",
        params![at, key.as_str()],
    )
    .unwrap();
}

async fn seed(cache: &CacheService, digest: &str) -> CacheKey {
    let key = CacheKey::from_digest(digest);
    let cancel = CancelFlag::new();
    cache.save_threats(&key, &[], &cancel).await;
    cache
        .save_voice_qos(&key, &VoiceQosResult::empty(Utc::now()), &cancel)
        .await;
    key
}

#[tokio::test]
async fn test_sweep_removes_only_stale_entries() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let cache = CacheService::new(&db);
    let cancel = CancelFlag::new();

    let old = seed(&cache, "01d").await;
    let fresh = seed(&cache, "f4e5").await;
    backdate(&db, &old, 45);

    assert_eq!(cache.clear_older_than(30, &cancel).await, 2);
    assert!(!cache.is_cached(&old, ResultKind::Threats, &cancel).await);
    assert!(cache.is_cached(&fresh, ResultKind::Threats, &cancel).await);
    assert!(cache.is_cached(&fresh, ResultKind::VoiceQos, &cancel).await);
}

#[tokio::test]
async fn test_hit_refreshes_access_time() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let cache = CacheService::new(&db);
    let cancel = CancelFlag::new();

    let key = seed(&cache, "a11ce").await;
    backdate(&db, &key, 45);

    assert!(cache.load_threats(&key, &cancel).await.is_some());
    assert!(cache.is_cached(&key, ResultKind::VoiceQos, &cancel).await);

    assert_eq!(cache.clear_older_than(30, &cancel).await, 0);
    assert!(cache.load_threats(&key, &cancel).await.is_some());
}

#[tokio::test]
async fn test_entry_info_does_not_refresh() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let cache = CacheService::new(&db);
    let cancel = CancelFlag::new();

    let key = seed(&cache, "b0b").await;
    backdate(&db, &key, 45);

    let info = cache
        .entry_info(&key, ResultKind::Threats, &cancel)
        .await
        .unwrap();
    assert!(info.last_accessed_at < Utc::now() - Duration::days(44));
    assert_eq!(cache.clear_older_than(30, &cancel).await, 2);
}

#[tokio::test]
async fn test_cancelled_sweep_removes_nothing() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let cache = CacheService::new(&db);

    let key = seed(&cache, "c4c4").await;
    let cancelled = CancelFlag::new();
    cancelled.cancel();

    assert_eq!(cache.clear_older_than(0, &cancelled).await, 0);
    assert_eq!(cache.clear_all(&cancelled).await, 0);
    assert!(cache
        .is_cached(&key, ResultKind::Threats, &CancelFlag::new())
        .await);
}

#[tokio::test]
async fn test_compact_after_evict() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let cache = CacheService::new(&db).with_compact_after_evict(true);
    let cancel = CancelFlag::new();

    for i in 0..10 {
        seed(&cache, &format!("{i:x}")).await;
    }
    assert_eq!(cache.clear_older_than(0, &cancel).await, 20);
    assert_eq!(cache.statistics(&cancel).await.total_entries, 0);
}

#[tokio::test]
async fn test_failing_kind_is_skipped_and_partial_count_returned() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let cache = CacheService::new(&db);
    let cancel = CancelFlag::new();

    let key = seed(&cache, "5ca1ab1e").await;
    {
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER keep_threats BEFORE DELETE ON analysis_cache
             WHEN old.result_kind = 'Threats'
             BEGIN SELECT RAISE(ABORT, 'threat rows are locked'); END;",
        )
        .unwrap();
    }

    assert_eq!(cache.clear_older_than(0, &cancel).await, 1);
    assert!(cache.is_cached(&key, ResultKind::Threats, &cancel).await);
    assert!(!cache.is_cached(&key, ResultKind::VoiceQos, &cancel).await);

    let stats = cache.statistics(&cancel).await;
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.threat_entries, 1);
    assert_eq!(stats.voice_qos_entries, 0);
}
