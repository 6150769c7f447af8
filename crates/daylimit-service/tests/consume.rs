//! Consume endpoint integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn consume_success_via_cache() {
    let harness = TestHarness::new().await;
    harness.seed_month(2025, 3, 1_000_000).await;

    let response = harness
        .server
        .post("/consume")
        .json(&json!({ "date": "2025-03-15", "amount": 100 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["date"], "2025-03-15");
    assert_eq!(body["amountConsumed"], 100);
    assert_eq!(body["remainingLimit"], 999_900);
    assert_eq!(body["source"], "CACHE");
    assert_eq!(body["message"], "Success");
    assert!(body["transactionId"].as_str().is_some_and(|s| !s.is_empty()));
    assert!(body["latencyMs"].as_u64().is_some());
}

#[tokio::test]
async fn consume_echoes_transaction_id() {
    let harness = TestHarness::new().await;
    harness.seed_month(2025, 3, 1000).await;

    let response = harness
        .server
        .post("/consume")
        .json(&json!({
            "date": "2025-03-15",
            "amount": 10,
            "transactionId": "txn-42"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["transactionId"], "txn-42");
}

#[tokio::test]
async fn consume_force_direct_db() {
    let harness = TestHarness::new().await;
    harness.seed_month(2025, 3, 1000).await;

    let response = harness
        .server
        .post("/consume")
        .json(&json!({
            "date": "2025-03-15",
            "amount": 100,
            "forceDirectDb": true
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["source"], "DATABASE");
    assert_eq!(body["remainingLimit"], 900);
}

// ============================================================================
// Business errors ride in a 200 response
// ============================================================================

#[tokio::test]
async fn consume_insufficient_limit() {
    let harness = TestHarness::new().await;
    harness.seed_month(2025, 3, 50).await;

    let response = harness
        .server
        .post("/consume")
        .json(&json!({ "date": "2025-03-16", "amount": 100 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Insufficient limit");
    assert_eq!(body["remainingLimit"], 50);
    assert_eq!(body["amountConsumed"], 0);
}

#[tokio::test]
async fn consume_unknown_date() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/consume")
        .json(&json!({ "date": "2099-01-01", "amount": 100 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Date not found");
}

// ============================================================================
// Input errors
// ============================================================================

#[tokio::test]
async fn consume_rejects_non_positive_amount() {
    let harness = TestHarness::new().await;
    harness.seed_month(2025, 3, 1000).await;

    for amount in [0, -5] {
        let response = harness
            .server
            .post("/consume")
            .json(&json!({ "date": "2025-03-15", "amount": amount }))
            .await;
        response.assert_status_bad_request();
    }
}

#[tokio::test]
async fn consume_rejects_malformed_date() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/consume")
        .json(&json!({ "date": "not-a-date", "amount": 100 }))
        .await;

    assert!(response.status_code().is_client_error());
}

// ============================================================================
// Batch
// ============================================================================

#[tokio::test]
async fn consume_batch_counts_outcomes() {
    let harness = TestHarness::new().await;
    harness.seed_month(2025, 3, 250).await;

    let response = harness
        .server
        .post("/consume/batch")
        .json(&json!({
            "transactions": [
                { "date": "2025-03-15", "amount": 100 },
                { "date": "2025-03-15", "amount": 100 },
                { "date": "2025-03-15", "amount": 100 },
                { "date": "2099-01-01", "amount": 100 }
            ]
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["totalRequests"], 4);
    // 250 covers two consumes of 100; the third is insufficient and the
    // unknown date fails.
    assert_eq!(body["successCount"], 2);
    assert_eq!(body["failedCount"], 2);
}
