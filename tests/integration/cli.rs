use crate::server::TestServer;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn aiup() -> Command {
    let mut cmd = Command::cargo_bin("aiup").unwrap();
    cmd.env_remove("AIUP_CONFIG_PATH").env_remove("RUST_LOG").env("AIUP_NO_PROGRESS", "1");
    cmd
}

fn write_config(dir: &Path, api_url: &str) -> std::path::PathBuf {
    let path = dir.join("aiup.toml");
    let content = format!(
        "install_dir = \"{}\"\n\
         desktop_file = \"{}\"\n\
         api_url = \"{api_url}\"\n\
         icon_urls = []\n\
         download_attempts = 1\n\
         retry_delay_ms = 0\n\
         metadata_timeout_secs = 5\n\
         termination_grace_ms = 0\n\
         set_software_rendering = false\n",
        dir.join("app").display(),
        dir.join("app.desktop").display(),
    );
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn help_describes_the_tool() {
    aiup()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("AppImage"))
        .stdout(predicate::str::contains("--check"));
}

#[test]
fn version_flag() {
    aiup().arg("--version").assert().success().stdout(predicate::str::contains("aiup"));
}

#[test]
fn verbose_and_quiet_conflict() {
    aiup().args(["-v", "-q"]).assert().failure();
}

#[test]
fn invalid_config_exits_non_zero() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("aiup.toml");
    std::fs::write(&path, "download_attempts = \"lots\"\n").unwrap();

    aiup()
        .arg("--config")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[cfg(target_os = "linux")]
#[test]
fn unreachable_endpoint_exits_non_zero() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "http://127.0.0.1:9/api");

    aiup()
        .args(["--no-launch", "--no-desktop", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to resolve release"));

    assert!(!temp.path().join("app").join("cursor.AppImage").exists());
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread")]
async fn check_reports_available_update_without_installing() {
    let server = TestServer::start().await;
    server.publish("9.9.9", b"binary", None);
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), &server.url("/api"));

    let assert = tokio::task::spawn_blocking(move || {
        aiup().arg("--check").arg("--config").arg(&config).assert()
    })
    .await
    .unwrap();

    assert.success().stdout(predicate::str::contains("Update available: 9.9.9"));
    assert_eq!(server.hits("/app"), 0);
    assert!(!temp.path().join("app").join("cursor.AppImage").exists());
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread")]
async fn full_run_installs_and_writes_desktop_entry() {
    let server = TestServer::start().await;
    server.publish("1.2.3", b"#!/bin/sh\nexit 0\n", None);
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), &server.url("/api"));

    let assert = tokio::task::spawn_blocking(move || {
        aiup().args(["--no-launch", "--no-progress", "--config"]).arg(&config).assert()
    })
    .await
    .unwrap();

    assert.success().stdout(predicate::str::contains("Installed Cursor 1.2.3"));
    let app_dir = temp.path().join("app");
    assert_eq!(std::fs::read(app_dir.join("cursor.AppImage")).unwrap(), b"#!/bin/sh\nexit 0\n");
    assert_eq!(std::fs::read_to_string(app_dir.join(".version")).unwrap(), "1.2.3");
    assert!(app_dir.join("cursor.png").exists());
    let desktop = std::fs::read_to_string(temp.path().join("app.desktop")).unwrap();
    assert!(desktop.contains("cursor.AppImage --no-sandbox --disable-gpu"));
}
