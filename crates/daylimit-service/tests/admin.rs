//! Admin endpoint integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn reset_restores_consumed_month() {
    let harness = TestHarness::new().await;
    harness.seed_month(2025, 3, 1000).await;

    harness
        .server
        .post("/consume")
        .json(&json!({ "date": "2025-03-15", "amount": 600 }))
        .await
        .assert_status_ok();

    let response = harness.server.post("/reset?year=2025&month=3").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["recordsReset"], 31);
    assert_eq!(body["loadTest"], false);

    let response = harness.server.get("/limits/2025/3/15").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["remaining"], 1000);
    assert_eq!(body["consumed"], 0);
}

#[tokio::test]
async fn reset_load_test_applies_large_limit() {
    let harness = TestHarness::new().await;
    harness.seed_month(2025, 3, 1000).await;

    let response = harness.server.post("/reset/load-test?year=2025&month=3").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["loadTest"], true);

    let response = harness.server.get("/limits/2025/3/15").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["initialLimit"], 999_999_999);
    assert_eq!(body["remaining"], 999_999_999);
}

#[tokio::test]
async fn status_reports_cache_and_sync_health() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/status").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["cacheEnabled"], true);
    assert_eq!(body["syncHealthy"], true);
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn status_with_cache_disabled() {
    let harness = TestHarness::with_cache_enabled(false).await;

    let response = harness.server.get("/status").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["cacheEnabled"], false);

    // Consumes still work, routed direct.
    harness.seed_month(2025, 3, 1000).await;
    let response = harness
        .server
        .post("/consume")
        .json(&json!({ "date": "2025-03-15", "amount": 100 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["source"], "DATABASE");
}

#[tokio::test]
async fn health_endpoint() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "daylimit");
}
