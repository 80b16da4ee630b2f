use chrono::{TimeZone, Utc};
use pcapcache::cache::{AnalysisCache, AnalysisArtifact, CacheKey, CacheService, ResultKind};
use pcapcache::cancel::CancelFlag;
use pcapcache::model::{
    JitterConnection, LatencyConnection, QosFlow, SecurityThreat, ThreatSeverity, VoiceQosResult,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tempfile::tempdir;

fn threat(title: &str, severity: ThreatSeverity) -> SecurityThreat {
    let seen = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let mut threat = SecurityThreat::new("PortScan", severity, title, seen);
    threat.source_address = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
    threat.destination_port = Some(443);
    threat.affected_frames = vec![1, 2, 3, 500];
    threat
        .evidence
        .insert("ports_probed".to_string(), "1024".to_string());
    threat
}

fn three_threats() -> Vec<SecurityThreat> {
    vec![
        threat("Horizontal scan", ThreatSeverity::High),
        threat("Cleartext credentials", ThreatSeverity::Critical),
        threat("Unusual DNS volume", ThreatSeverity::Low),
    ]
}

fn voice_result() -> VoiceQosResult {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    let a = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10));
    let b = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));
    VoiceQosResult {
        qos_traffic: vec![QosFlow {
            source_address: a,
            destination_address: b,
            protocol: "RTP".to_string(),
            dscp: 46,
            dscp_label: Some("EF".to_string()),
            packet_count: 1500,
            total_bytes: 240_000,
            first_seen: at,
            last_seen: at,
        }],
        high_latency_connections: vec![LatencyConnection {
            source_address: a,
            destination_address: b,
            protocol: "RTP".to_string(),
            average_latency_ms: 182.25,
            min_latency_ms: 90.1,
            max_latency_ms: 410.7,
            packet_count: 1500,
            first_seen: at,
            last_seen: at,
        }],
        high_jitter_connections: vec![JitterConnection {
            source_address: b,
            destination_address: a,
            protocol: "RTP".to_string(),
            average_jitter_ms: 31.4,
            min_jitter_ms: 0.3,
            max_jitter_ms: 97.0,
            packet_count: 1480,
            first_seen: at,
            last_seen: at,
        }],
        total_voice_packets: 2980,
        analyzed_at: at,
    }
}

#[tokio::test]
async fn test_save_load_and_age_out() {
    let dir = tempdir().unwrap();
    let cache = CacheService::new(dir.path().join("cache.db"));
    let cancel = CancelFlag::new();
    let key = CacheKey::from_raw("abc123_1.0");
    let threats = three_threats();

    cache.save_threats(&key, &threats, &cancel).await;
    assert!(cache.is_cached(&key, ResultKind::Threats, &cancel).await);
    assert!(!cache.is_cached(&key, ResultKind::VoiceQos, &cancel).await);

    let loaded = cache.load_threats(&key, &cancel).await.unwrap();
    assert_eq!(loaded, threats);

    let stats = cache.statistics(&cancel).await;
    assert!(stats.enabled);
    assert!(stats.available);
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.threat_entries, 1);
    assert!(stats.total_payload_bytes > 0);

    assert_eq!(cache.clear_older_than(0, &cancel).await, 1);
    assert!(cache.load_threats(&key, &cancel).await.is_none());
    assert_eq!(cache.statistics(&cancel).await.total_entries, 0);
}

#[tokio::test]
async fn test_voice_qos_round_trip() {
    let dir = tempdir().unwrap();
    let cache = CacheService::new(dir.path().join("cache.db"));
    let cancel = CancelFlag::new();
    let key = CacheKey::from_digest("feedface");
    let result = voice_result();

    cache.save_voice_qos(&key, &result, &cancel).await;
    let loaded = cache.load_voice_qos(&key, &cancel).await.unwrap();
    assert_eq!(loaded, result);
    assert_eq!(
        loaded.high_latency_connections[0].average_latency_ms.to_bits(),
        182.25f64.to_bits()
    );

    match cache
        .load_artifact(&key, ResultKind::VoiceQos, &cancel)
        .await
    {
        Some(AnalysisArtifact::VoiceQos(artifact)) => assert_eq!(artifact, result),
        other => panic!("unexpected artifact: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_results_are_cached() {
    let dir = tempdir().unwrap();
    let cache = CacheService::new(dir.path().join("cache.db"));
    let cancel = CancelFlag::new();
    let key = CacheKey::from_digest("0000");

    cache.save_threats(&key, &[], &cancel).await;
    assert_eq!(cache.load_threats(&key, &cancel).await, Some(Vec::new()));

    let empty = VoiceQosResult::empty(Utc::now());
    cache.save_voice_qos(&key, &empty, &cancel).await;
    assert!(cache.load_voice_qos(&key, &cancel).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overwrite_keeps_single_row() {
    let dir = tempdir().unwrap();
    let cache = CacheService::new(dir.path().join("cache.db"));
    let cancel = CancelFlag::new();
    let key = CacheKey::from_digest("beef");

    cache.save_threats(&key, &three_threats(), &cancel).await;
    let replacement = vec![threat("Replacement", ThreatSeverity::Medium)];
    cache.save_threats(&key, &replacement, &cancel).await;

    assert_eq!(cache.load_threats(&key, &cancel).await.unwrap(), replacement);
    assert_eq!(cache.statistics(&cancel).await.total_entries, 1);
}

#[tokio::test]
async fn test_kinds_are_independent() {
    let dir = tempdir().unwrap();
    let cache = CacheService::new(dir.path().join("cache.db"));
    let cancel = CancelFlag::new();
    let key = CacheKey::from_digest("cafe");

    cache.save_threats(&key, &three_threats(), &cancel).await;
    cache.save_voice_qos(&key, &voice_result(), &cancel).await;

    let stats = cache.statistics(&cancel).await;
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.threat_entries, 1);
    assert_eq!(stats.voice_qos_entries, 1);

    let info = cache
        .entry_info(&key, ResultKind::VoiceQos, &cancel)
        .await
        .unwrap();
    assert_eq!(info.file_digest, "cafe");
    assert_eq!(info.result_kind, ResultKind::VoiceQos);
}

#[tokio::test]
async fn test_delete_for_file_removes_all_kinds_and_versions() {
    let dir = tempdir().unwrap();
    let cache = CacheService::new(dir.path().join("cache.db"));
    let cancel = CancelFlag::new();
    let current = CacheKey::from_digest("aaaa");
    let stale = CacheKey::from_raw("aaaa_0.9");
    let other = CacheKey::from_digest("bbbb");

    cache.save_threats(&current, &three_threats(), &cancel).await;
    cache.save_voice_qos(&current, &voice_result(), &cancel).await;
    cache.save_threats(&stale, &three_threats(), &cancel).await;
    cache.save_threats(&other, &three_threats(), &cancel).await;

    assert_eq!(cache.delete_for_file("aaaa", &cancel).await, 3);
    assert!(cache.load_threats(&current, &cancel).await.is_none());
    assert!(cache.load_threats(&other, &cancel).await.is_some());
    assert_eq!(cache.delete_for_file("aaaa", &cancel).await, 0);
}

#[tokio::test]
async fn test_clear_all() {
    let dir = tempdir().unwrap();
    let cache = CacheService::new(dir.path().join("cache.db"));
    let cancel = CancelFlag::new();

    for i in 0..5 {
        let key = CacheKey::from_digest(&format!("{i:04x}"));
        cache.save_threats(&key, &three_threats(), &cancel).await;
    }
    assert_eq!(cache.clear_all(&cancel).await, 5);
    assert_eq!(cache.statistics(&cancel).await.total_entries, 0);
}

#[tokio::test]
async fn test_cancelled_save_writes_nothing() {
    let dir = tempdir().unwrap();
    let cache = CacheService::new(dir.path().join("cache.db"));
    let key = CacheKey::from_digest("dead");

    let cancelled = CancelFlag::new();
    cancelled.cancel();
    cache.save_threats(&key, &three_threats(), &cancelled).await;

    let cancel = CancelFlag::new();
    assert!(!cache.is_cached(&key, ResultKind::Threats, &cancel).await);
}

#[tokio::test]
async fn test_compact_keeps_entries() {
    let dir = tempdir().unwrap();
    let cache = CacheService::new(dir.path().join("cache.db"));
    let cancel = CancelFlag::new();
    let keep = CacheKey::from_digest("1111");

    cache.save_threats(&keep, &three_threats(), &cancel).await;
    for i in 0..20 {
        let key = CacheKey::from_digest(&format!("f{i:03}"));
        cache.save_voice_qos(&key, &voice_result(), &cancel).await;
    }
    cache.clear_older_than(0, &cancel).await;
    cache.save_threats(&keep, &three_threats(), &cancel).await;
    cache.compact(&cancel).await;

    assert_eq!(cache.load_threats(&keep, &cancel).await.unwrap().len(), 3);
    assert!(cache.statistics(&cancel).await.store_size_on_disk_bytes > 0);
}

#[tokio::test]
async fn test_reopen_sees_persisted_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    let cancel = CancelFlag::new();
    let key = CacheKey::from_digest("abcd");

    {
        let cache = CacheService::new(&path);
        cache.save_threats(&key, &three_threats(), &cancel).await;
    }

    let cache = CacheService::new(&path);
    assert_eq!(cache.load_threats(&key, &cancel).await.unwrap(), three_threats());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers() {
    let dir = tempdir().unwrap();
    let cache: Arc<dyn AnalysisCache> = Arc::new(CacheService::new(dir.path().join("cache.db")));

    let mut handles = Vec::new();
    for i in 0..16 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            let cancel = CancelFlag::new();
            let key = CacheKey::from_digest(&format!("{i:08x}"));
            let threats = vec![threat(&format!("finding {i}"), ThreatSeverity::Info)];
            cache.save_threats(&key, &threats, &cancel).await;
            cache.load_threats(&key, &cancel).await == Some(threats)
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    let stats = cache.statistics(&CancelFlag::new()).await;
    assert_eq!(stats.total_entries, 16);
}
