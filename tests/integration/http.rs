use crate::server::TestServer;
use aiup_cli::config::InstallerConfig;
use aiup_cli::core::AiupError;
use aiup_cli::test_utils::FakeProcessTable;
use aiup_cli::update::{
    HttpFetcher, ProcessGuard, ProcessMatcher, Sha256Digest, Transport, UpdateOrchestrator,
    UpdateOutcome,
};
use std::time::Duration;
use tempfile::TempDir;

fn build(
    config: &InstallerConfig,
) -> UpdateOrchestrator<HttpFetcher, FakeProcessTable, FakeProcessTable> {
    let fetcher =
        HttpFetcher::new(&config.user_agent, config.request_timeout(), config.metadata_timeout())
            .unwrap();
    let processes = FakeProcessTable::new();
    let guard = ProcessGuard::new(
        processes.clone(),
        processes,
        ProcessMatcher::ByPath(config.binary_path()),
        Duration::ZERO,
    );
    UpdateOrchestrator::new(config, Transport::new(fetcher, config.retry_policy()), guard)
}

fn config(temp: &TempDir, server: &TestServer) -> InstallerConfig {
    InstallerConfig {
        api_url: server.url("/api"),
        download_attempts: 2,
        ..InstallerConfig::for_install_dir(temp.path().join("app"))
    }
}

#[tokio::test]
async fn installs_over_http() {
    let server = TestServer::start().await;
    let body = vec![7u8; 200_000];
    server.publish("0.42.0", &body, Some(&Sha256Digest::of_bytes(&body).to_hex()));
    let temp = TempDir::new().unwrap();
    let config = config(&temp, &server);

    let outcome = build(&config).run().await.unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            version: "0.42.0".to_string(),
            digest: Sha256Digest::of_bytes(&body),
        }
    );
    assert_eq!(std::fs::read(config.binary_path()).unwrap(), body);
    assert_eq!(server.hits("/app"), 1);
}

#[tokio::test]
async fn missing_artifact_is_retried_then_fatal() {
    let server = TestServer::start().await;
    server.serve_json(
        "/api",
        format!(r#"{{"downloadUrl":"{}","version":"1"}}"#, server.url("/gone")),
    );
    let temp = TempDir::new().unwrap();
    let config = config(&temp, &server);

    let err = build(&config).run().await.unwrap_err();

    assert!(matches!(err.downcast_ref::<AiupError>(), Some(AiupError::FetchFailed { .. })));
    assert_eq!(server.hits("/gone"), 2);
    assert!(!config.binary_path().exists());
}

#[tokio::test]
async fn tampered_artifact_is_rejected() {
    let server = TestServer::start().await;
    server.publish("1", b"tampered", Some(&Sha256Digest::of_bytes(b"genuine").to_hex()));
    let temp = TempDir::new().unwrap();
    let config = config(&temp, &server);

    let err = build(&config).run().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AiupError>(),
        Some(AiupError::IntegrityMismatch { .. })
    ));
    assert!(!config.binary_path().exists());
    assert!(!config.version_file().exists());
}

#[tokio::test]
async fn server_error_on_metadata_is_resolution_failure() {
    let server = TestServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = config(&temp, &server);

    let err = build(&config).run().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AiupError>(),
        Some(AiupError::ResolutionFailed { .. })
    ));
}
