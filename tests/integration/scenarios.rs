use aiup_cli::config::InstallerConfig;
use aiup_cli::core::AiupError;
use aiup_cli::test_utils::{
    FakeFetcher, FakeProcess, FakeProcessTable, init_test_logging, running_app,
};
use aiup_cli::update::{
    ProcessGuard, ProcessMatcher, RetryPolicy, Sha256Digest, Transport, UpdateOrchestrator,
    UpdateOutcome,
};
use std::time::Duration;
use tempfile::TempDir;

const API: &str = "https://releases.example.com/api/download";
const DL: &str = "https://downloads.example.com/app-2.0.0.AppImage";

fn release_json(version: &str, body: &[u8]) -> String {
    format!(
        r#"{{"downloadUrl":"{DL}","version":"{version}","sha256":"{}"}}"#,
        Sha256Digest::of_bytes(body)
    )
}

fn orchestrator(
    config: &InstallerConfig,
    fetcher: &FakeFetcher,
    processes: &FakeProcessTable,
) -> UpdateOrchestrator<FakeFetcher, FakeProcessTable, FakeProcessTable> {
    let guard = ProcessGuard::new(
        processes.clone(),
        processes.clone(),
        ProcessMatcher::ByPath(config.binary_path()),
        Duration::ZERO,
    )
    .with_settle(Duration::ZERO);
    UpdateOrchestrator::new(config, Transport::new(fetcher.clone(), RetryPolicy::immediate(3)), guard)
}

fn config(temp: &TempDir) -> InstallerConfig {
    InstallerConfig {
        api_url: API.to_string(),
        ..InstallerConfig::for_install_dir(temp.path().join("cursor"))
    }
}

/// Nothing installed, endpoint offers 1.0.0 with a digest.
#[tokio::test]
async fn fresh_install_writes_binary_and_label() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let fetcher = FakeFetcher::new()
        .with_json(API, release_json("1.0.0", b"AppImage v1"))
        .with_body(DL, b"AppImage v1".to_vec());

    let outcome = orchestrator(&config, &fetcher, &FakeProcessTable::new()).run().await.unwrap();

    assert_eq!(outcome.version(), "1.0.0");
    assert_eq!(std::fs::read(config.binary_path()).unwrap(), b"AppImage v1");
    assert_eq!(std::fs::read_to_string(config.version_file()).unwrap(), "1.0.0");
}

/// Binary present, label matches: no download, no hashing, no signals.
#[tokio::test]
async fn matching_label_skips_everything() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    std::fs::create_dir_all(&config.install_dir).unwrap();
    std::fs::write(config.binary_path(), b"whatever is installed").unwrap();
    std::fs::write(config.version_file(), "2.0.0\n").unwrap();
    let fetcher = FakeFetcher::new()
        .with_json(API, release_json("2.0.0", b"new bytes"))
        .with_body(DL, b"new bytes".to_vec());
    let processes = FakeProcessTable::new()
        .with_process(running_app(500, &config.binary_path()), FakeProcess::cooperative());

    let outcome = orchestrator(&config, &fetcher, &processes).run().await.unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::UpToDate {
            version: "2.0.0".to_string(),
            backfilled: false
        }
    );
    assert_eq!(fetcher.open_count(DL), 0);
    assert!(processes.signals().is_empty());
    assert_eq!(processes.running_pids(), vec![500]);
}

/// Binary present, label file lost, digest matches: backfill only.
#[tokio::test]
async fn digest_match_backfills_label() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    std::fs::create_dir_all(&config.install_dir).unwrap();
    std::fs::write(config.binary_path(), b"AppImage v2").unwrap();
    let fetcher = FakeFetcher::new()
        .with_json(API, release_json("2.0.0", b"AppImage v2"))
        .with_body(DL, b"AppImage v2".to_vec());

    let outcome = orchestrator(&config, &fetcher, &FakeProcessTable::new()).run().await.unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::UpToDate {
            version: "2.0.0".to_string(),
            backfilled: true
        }
    );
    assert_eq!(std::fs::read_to_string(config.version_file()).unwrap(), "2.0.0");
    assert_eq!(fetcher.open_count(DL), 0);
}

/// Old version running; one instance exits on SIGTERM, one needs SIGKILL.
#[tokio::test]
async fn update_stops_running_instances_before_swap() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    std::fs::create_dir_all(&config.install_dir).unwrap();
    std::fs::write(config.binary_path(), b"AppImage v1").unwrap();
    std::fs::write(config.version_file(), "1.0.0").unwrap();
    let fetcher = FakeFetcher::new()
        .with_json(API, release_json("2.0.0", b"AppImage v2"))
        .with_body(DL, b"AppImage v2".to_vec());
    let processes = FakeProcessTable::new()
        .with_process(running_app(101, &config.binary_path()), FakeProcess::cooperative())
        .with_process(running_app(102, &config.binary_path()), FakeProcess::ignores_term());

    let outcome = orchestrator(&config, &fetcher, &processes).run().await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::Installed { .. }));
    assert!(processes.running_pids().is_empty());
    assert_eq!(std::fs::read(config.binary_path()).unwrap(), b"AppImage v2");
    assert_eq!(std::fs::read_to_string(config.version_file()).unwrap(), "2.0.0");
}

/// A download that never completes leaves the old install intact.
#[tokio::test]
async fn interrupted_downloads_never_reach_install_path() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    std::fs::create_dir_all(&config.install_dir).unwrap();
    std::fs::write(config.binary_path(), b"AppImage v1").unwrap();
    std::fs::write(config.version_file(), "1.0.0").unwrap();
    let fetcher = FakeFetcher::new()
        .with_json(API, release_json("2.0.0", b"AppImage v2"))
        .with_body(DL, b"AppImage v2".to_vec())
        .with_chunk_size(4)
        .fail_mid_stream(DL, 3);

    let err = orchestrator(&config, &fetcher, &FakeProcessTable::new()).run().await.unwrap_err();

    match err.downcast_ref::<AiupError>() {
        Some(AiupError::FetchFailed {
            attempts,
            ..
        }) => assert_eq!(*attempts, 3),
        other => panic!("expected FetchFailed, got {other:?}"),
    }
    assert_eq!(std::fs::read(config.binary_path()).unwrap(), b"AppImage v1");
    assert_eq!(std::fs::read_to_string(config.version_file()).unwrap(), "1.0.0");
}

/// Running twice against an unchanged endpoint downloads once.
#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let fetcher = FakeFetcher::new()
        .with_json(API, release_json("1.0.0", b"AppImage v1"))
        .with_body(DL, b"AppImage v1".to_vec());
    let processes = FakeProcessTable::new();

    for _ in 0..3 {
        orchestrator(&config, &fetcher, &processes).run().await.unwrap();
    }

    assert_eq!(fetcher.open_count(DL), 1);
}
