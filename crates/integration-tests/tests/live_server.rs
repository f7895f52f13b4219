//! Smoke tests against a running passport server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`tp-cli migrate`)
//! - The server running (`cargo run -p tourpass-server`)
//! - `PASSPORT_GATEWAY_SECRET` matching the server's
//!
//! Run with: cargo test -p tourpass-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::Value;

use tourpass_server::middleware::{GATEWAY_SECRET_HEADER, USER_ID_HEADER};

/// Base URL for the passport API (configurable via environment).
fn base_url() -> String {
    std::env::var("PASSPORT_BASE_URL").unwrap_or_else(|_| "http://localhost:3002".to_string())
}

fn gateway_secret() -> String {
    std::env::var("PASSPORT_GATEWAY_SECRET").unwrap()
}

#[tokio::test]
#[ignore = "Requires a running passport server"]
async fn test_live_health() {
    let resp = Client::new()
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
#[ignore = "Requires a running passport server and database"]
async fn test_live_passport_is_stable() {
    let client = Client::new();
    let fetch = || {
        client
            .get(format!("{}/api/passport", base_url()))
            .header(GATEWAY_SECRET_HEADER, gateway_secret())
            .header(USER_ID_HEADER, "424242")
            .send()
    };

    let first: Value = fetch().await.unwrap().json().await.unwrap();
    let second: Value = fetch().await.unwrap().json().await.unwrap();
    assert_eq!(first["passport_number"], second["passport_number"]);
}

#[tokio::test]
#[ignore = "Requires a running passport server"]
async fn test_live_rejects_missing_gateway_secret() {
    let resp = Client::new()
        .get(format!("{}/api/passport", base_url()))
        .header(USER_ID_HEADER, "424242")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
