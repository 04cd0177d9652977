//! End-to-end CLI tests for the doc-bundler binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command isolated from any user config file.
fn doc_bundler(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("doc-bundler").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let temp = TempDir::new().unwrap();
    doc_bundler(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bundle product documentation"))
        .stdout(predicate::str::contains("--workers"))
        .stdout(predicate::str::contains("--sticky-failures"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let temp = TempDir::new().unwrap();
    doc_bundler(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("doc-bundler"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let temp = TempDir::new().unwrap();
    doc_bundler(temp.path())
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_rejects_zero_workers() {
    let temp = TempDir::new().unwrap();
    doc_bundler(temp.path())
        .args(["--workers", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("workers"));
}

#[test]
fn test_binary_rejects_path_like_product() {
    let temp = TempDir::new().unwrap();
    doc_bundler(temp.path())
        .args(["--products", "../etc", "-o"])
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid product identifier"));
}

#[test]
fn test_binary_reports_unknown_config_key() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "workers = 2\nspeed = 11\n").unwrap();

    doc_bundler(temp.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"))
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_binary_fails_when_output_root_is_a_file() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    doc_bundler(temp.path())
        .args(["-q", "--products", "ec2", "--settle-ms", "0"])
        .args(["--base-url", "http://127.0.0.1:9/"])
        .arg("-o")
        .arg(&blocker)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot create output directory"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_crawls_mock_site_and_prints_json_report() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ec2/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><a href="/ec2/guide.pdf">Guide</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ec2/guide.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-guide".to_vec()))
        .mount(&server)
        .await;
    // "s3" has no page at all; the run still succeeds.

    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    let base_url = format!("{}/", server.uri());
    let config_home = temp.path().to_path_buf();
    let out_arg = out.clone();

    let output = tokio::task::spawn_blocking(move || {
        doc_bundler(&config_home)
            .args(["-q", "--json", "--settle-ms", "0", "--products", "ec2,s3"])
            .args(["--base-url", base_url.as_str()])
            .arg("--output-dir")
            .arg(&out_arg)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    })
    .await
    .unwrap();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let outcomes = report["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["product"], "ec2");
    assert_eq!(outcomes[0]["status"], "completed");
    assert_eq!(outcomes[0]["report"]["downloads"]["completed"], 1);
    assert_eq!(outcomes[0]["report"]["aggregation"]["status"], "created");
    assert_eq!(outcomes[1]["status"], "completed");
    assert_eq!(outcomes[1]["report"]["candidates"], 0);
    assert_eq!(report["downloaded_files"], 1);

    let products = out.join("products");
    assert_eq!(
        std::fs::read(products.join("ec2").join("guide.pdf")).unwrap(),
        b"%PDF-guide"
    );
    assert_eq!(std::fs::read(products.join("ec2.pdf")).unwrap(), b"%PDF-guide");
    assert!(!products.join("s3.pdf").exists());
}
