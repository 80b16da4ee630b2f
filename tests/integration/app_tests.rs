use chrono::Utc;
use clap::Parser;
use pcapcache::cache::{compute_cache_key, AnalysisCache, CacheService};
use pcapcache::cancel::CancelFlag;
use pcapcache::cli::Cli;
use pcapcache::error::{exit_code_for, ExitCode};
use pcapcache::model::{SecurityThreat, ThreatSeverity};
use pcapcache::run_app;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(db: &Path, args: &[&str]) -> anyhow::Result<ExitCode> {
    let db = db.to_str().unwrap();
    let mut argv = vec!["pcapcache", "-q", "--db", db];
    argv.extend_from_slice(args);
    run_app(Cli::parse_from(argv))
}

fn seed_threats(db: &Path, capture: &Path) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let cache = CacheService::new(db);
        let key = compute_cache_key(capture).unwrap();
        let threats = vec![SecurityThreat::new(
            "SynFlood",
            ThreatSeverity::Critical,
            "SYN flood against 10.0.0.1",
            Utc::now(),
        )];
        cache.save_threats(&key, &threats, &CancelFlag::new()).await;
    });
}

#[test]
fn test_status_and_show_follow_cache_contents() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let capture = dir.path().join("office.pcapng");
    fs::write(&capture, b"capture bytes").unwrap();
    let capture_arg = capture.to_str().unwrap();

    assert_eq!(run(&db, &["status", capture_arg]).unwrap(), ExitCode::NotCached);

    seed_threats(&db, &capture);

    assert_eq!(run(&db, &["status", capture_arg]).unwrap(), ExitCode::Success);
    assert_eq!(run(&db, &["show", capture_arg]).unwrap(), ExitCode::Success);
    assert_eq!(
        run(&db, &["show", capture_arg, "--kind", "voice-qos"]).unwrap(),
        ExitCode::NotCached
    );
}

#[test]
fn test_forget_by_file_and_by_digest() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let capture = dir.path().join("a.pcap");
    fs::write(&capture, b"a").unwrap();
    let capture_arg = capture.to_str().unwrap();

    seed_threats(&db, &capture);
    assert_eq!(run(&db, &["forget", capture_arg]).unwrap(), ExitCode::Success);
    assert_eq!(run(&db, &["status", capture_arg]).unwrap(), ExitCode::NotCached);

    seed_threats(&db, &capture);
    let digest = compute_cache_key(&capture).unwrap().file_digest().to_string();
    assert_eq!(run(&db, &["forget", &digest]).unwrap(), ExitCode::Success);
    assert_eq!(run(&db, &["status", capture_arg]).unwrap(), ExitCode::NotCached);
}

#[test]
fn test_maintenance_commands() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let capture = dir.path().join("a.pcap");
    fs::write(&capture, b"a").unwrap();
    seed_threats(&db, &capture);

    assert_eq!(run(&db, &["stats", "--json"]).unwrap(), ExitCode::Success);
    assert_eq!(run(&db, &["evict", "--older-than", "30"]).unwrap(), ExitCode::Success);
    assert_eq!(run(&db, &["compact"]).unwrap(), ExitCode::Success);
    assert_eq!(run(&db, &["config"]).unwrap(), ExitCode::Success);

    assert!(run(&db, &["clear"]).is_err());
    assert_eq!(run(&db, &["clear", "--yes"]).unwrap(), ExitCode::Success);
    assert_eq!(
        run(&db, &["status", capture.to_str().unwrap()]).unwrap(),
        ExitCode::NotCached
    );
}

#[test]
fn test_missing_capture_is_a_general_error() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("cache.db");
    let missing = dir.path().join("missing.pcap");

    let err = run(&db, &["key", missing.to_str().unwrap()]).unwrap_err();
    assert_eq!(exit_code_for(&err), ExitCode::GeneralError);
    assert!(format!("{:#}", err).contains("missing.pcap"));
}
