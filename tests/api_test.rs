//! HTTP layer tests driven through the router without a socket

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bet_ledger::api::create_app;
use bet_ledger::config::{ApiConfig, LedgerConfig};
use bet_ledger::games::{ScriptedRandom, VrfRandom};
use bet_ledger::games::RandomSource;
use bet_ledger::SettlementOrchestrator;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(source: Arc<dyn RandomSource>) -> Router {
    let orchestrator = Arc::new(SettlementOrchestrator::new(LedgerConfig::default(), source));
    create_app(&ApiConfig::default(), orchestrator)
}

fn app() -> Router {
    // Always reveals heads / rock
    app_with(Arc::new(ScriptedRandom::new(vec![0])))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn deposit(app: &Router, account: &str, amount: i64) {
    let (status, _) = send(
        app,
        "POST",
        &format!("/api/accounts/{account}/transactions"),
        Some(json!({ "kind": "deposit", "amount": amount })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Running");
    assert_eq!(body["randomness"], "scripted");
}

#[tokio::test]
async fn test_place_bet_and_read_treasury() {
    let app = app();
    deposit(&app, "alice", 1000).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/accounts/alice/bets",
        Some(json!({
            "game": "coin-flip",
            "choice": "heads",
            "wager_amount": 100,
            "request_id": "bet-1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["classification"], "win");
    assert_eq!(body["outcome"]["settlement_amount"], 96);
    assert_eq!(body["outcome"]["house_fee"], 4);
    assert_eq!(body["balance"], 1096);
    assert_eq!(body["replayed"], false);

    let (status, treasury) = send(&app, "GET", "/api/treasury", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(treasury["total_bets"], 1);
    assert_eq!(treasury["total_won"], 96);
    assert_eq!(treasury["total_house_fees"], 4);
    assert_eq!(treasury["total_wagered"], 100);
    assert_eq!(treasury["total_balance"], 1096);
    assert_eq!(treasury["metrics"]["house_edge"], 4.0);
    assert_eq!(treasury["parameters"]["max_bet"], 10_000);

    let (status, account) = send(&app, "GET", "/api/accounts/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(account["balance"], 1096);
    assert_eq!(account["bets_placed"], 1);
}

#[tokio::test]
async fn test_replayed_bet_returns_same_outcome() {
    let app = app();
    deposit(&app, "alice", 1000).await;
    let body = json!({
        "game": "coin-flip",
        "choice": "heads",
        "wager_amount": 100,
        "request_id": "bet-1"
    });

    let (_, first) = send(&app, "POST", "/api/accounts/alice/bets", Some(body.clone())).await;
    let (status, replay) = send(&app, "POST", "/api/accounts/alice/bets", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["replayed"], true);
    assert_eq!(replay["outcome"], first["outcome"]);
    assert_eq!(replay["balance"], 1096);
}

#[tokio::test]
async fn test_error_codes_and_statuses() {
    let app = app();
    deposit(&app, "alice", 1000).await;

    let cases = [
        (json!({ "game": "coin-flip", "choice": "heads", "wager_amount": 1500, "request_id": "a" }),
            StatusCode::CONFLICT, "INSUFFICIENT_FUNDS"),
        (json!({ "game": "coin-flip", "choice": "heads", "wager_amount": 10_001, "request_id": "b" }),
            StatusCode::UNPROCESSABLE_ENTITY, "BET_OUT_OF_RANGE"),
        (json!({ "game": "coin-flip", "choice": "heads", "wager_amount": 0, "request_id": "c" }),
            StatusCode::BAD_REQUEST, "INVALID_WAGER"),
        (json!({ "game": "coin-flip", "choice": "rock", "wager_amount": 100, "request_id": "d" }),
            StatusCode::BAD_REQUEST, "INVALID_CHOICE"),
        (json!({ "game": "rock-paper-scissors", "choice": "lizard", "wager_amount": 100, "request_id": "e" }),
            StatusCode::BAD_REQUEST, "INVALID_CHOICE"),
    ];

    for (body, status, code) in cases {
        let (actual, response) = send(&app, "POST", "/api/accounts/alice/bets", Some(body)).await;
        assert_eq!(actual, status, "{code}");
        assert_eq!(response["error"]["code"], code);
        assert!(response["request_id"].is_string());
    }

    let (status, response) = send(
        &app,
        "POST",
        "/api/accounts/alice/transactions",
        Some(json!({ "kind": "withdraw", "amount": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], "INVALID_AMOUNT");

    let (_, account) = send(&app, "GET", "/api/accounts/alice", None).await;
    assert_eq!(account["balance"], 1000);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = app();
    let (status, response) = send(
        &app,
        "POST",
        "/api/accounts/alice/bets",
        Some(json!({ "game": "poker", "choice": "heads", "wager_amount": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_withdraw_and_overdraw() {
    let app = app();
    deposit(&app, "bob", 300).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/accounts/bob/transactions",
        Some(json!({ "kind": "withdraw", "amount": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 180);

    let (status, body) = send(
        &app,
        "POST",
        "/api/accounts/bob/transactions",
        Some(json!({ "kind": "withdraw", "amount": 181 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_FUNDS");
}

#[tokio::test]
async fn test_vrf_outcome_verifies() {
    let app = app_with(Arc::new(VrfRandom::new_random()));
    deposit(&app, "alice", 1000).await;

    let (status, bet) = send(
        &app,
        "POST",
        "/api/accounts/alice/bets",
        Some(json!({
            "game": "rock-paper-scissors",
            "choice": "paper",
            "wager_amount": 50,
            "request_id": "vrf-1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let proof = bet["outcome"]["proof"].clone();
    assert!(proof.is_object());
    assert_eq!(proof["input_message"], "alice:vrf-1:rock-paper-scissors:paper");

    let (status, verified) = send(
        &app,
        "POST",
        "/api/verify",
        Some(json!({ "game": "rock-paper-scissors", "proof": proof })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["valid"], true);
    assert_eq!(verified["revealed_value"], bet["outcome"]["revealed_value"]);

    let (status, foreign) = send(
        &app,
        "POST",
        "/api/verify",
        Some(json!({ "game": "rock-paper-scissors", "proof": proof, "account_id": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(foreign["valid"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app();
    deposit(&app, "alice", 1000).await;
    send(
        &app,
        "POST",
        "/api/accounts/alice/bets",
        Some(json!({ "game": "coin-flip", "choice": "heads", "wager_amount": 5000, "request_id": "x" })),
    )
    .await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("bet_ledger_rejections_total{code=\"INSUFFICIENT_FUNDS\"} 1"));
    assert!(text.contains("bet_ledger_transactions_total 1"));
}
