// tests/app_boot.rs
//
// Boot the full in-process app from a config file (live adapters are built
// but not called), then talk to it through the router.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use common::send;
use frontier_map::config::ENV_CONFIG_PATH;

const CONFIG: &str = r#"
[extraction]
provider = "mock"

[store]
mode = "memory"

[index]
enabled = false
"#;

#[tokio::test]
#[serial]
async fn app_boots_from_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("discovery.toml");
    std::fs::write(&path, CONFIG).unwrap();
    std::env::set_var(ENV_CONFIG_PATH, &path);

    let app = frontier_map::app().await.expect("app() should build Router in tests");
    std::env::remove_var(ENV_CONFIG_PATH);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));

    let (status, body) = send(&app, "GET", "/discovery/backlog/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_cards"], 0);
}

#[tokio::test]
#[serial]
async fn malformed_config_fails_to_boot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("discovery.toml");
    std::fs::write(&path, "[store\nmode = ").unwrap();
    std::env::set_var(ENV_CONFIG_PATH, &path);

    let res = frontier_map::app().await;
    std::env::remove_var(ENV_CONFIG_PATH);
    assert!(res.is_err());
}
