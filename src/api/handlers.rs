//! Request Handlers
//!
//! Thin adapters from HTTP to the settlement orchestrator. The account id in
//! the path is taken as already authenticated by the identity layer in front.

use super::{errors::ApiError, middleware::RequestId, models::*};
use crate::errors::SettlementError;
use crate::games::types::{BetRequest, Choice};
use crate::ledger::AccountSnapshot;
use crate::settlement::{SettlementOrchestrator, TreasuryStats, Verification};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub orchestrator: Arc<SettlementOrchestrator>,
    pub version: String,
}

impl AppState {
    pub fn new(orchestrator: Arc<SettlementOrchestrator>) -> Self {
        Self {
            orchestrator,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check handler - minimal response time
/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
        randomness: state.orchestrator.randomness().to_string(),
    })
}

/// Place a bet
/// POST /api/accounts/:account_id/bets
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    body: Result<Json<PlaceBetBody>, JsonRejection>,
) -> Result<Json<BetResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;

    let choice = match Choice::parse(&body.choice) {
        Some(choice) => choice,
        None => {
            let err = SettlementError::InvalidChoice {
                game: body.game,
                choice: body.choice.clone(),
            };
            state.orchestrator.reject(&account_id, &err);
            return Err(ApiError::settlement(request_id.0, err));
        }
    };

    let bet = BetRequest {
        account_id,
        game: body.game,
        choice,
        wager_amount: body.wager_amount,
        request_id: body.request_id.unwrap_or_else(|| request_id.0.clone()),
    };

    let receipt = state
        .orchestrator
        .place_bet(bet)
        .await
        .map_err(|e| ApiError::settlement(request_id.0.clone(), e))?;

    Ok(Json(BetResponse { receipt }))
}

/// Deposit or withdraw credits
/// POST /api/accounts/:account_id/transactions
pub async fn transact_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    body: Result<Json<TransactBody>, JsonRejection>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;

    let balance = state
        .orchestrator
        .transact(&account_id, body.kind, body.amount)
        .map_err(|e| ApiError::settlement(request_id.0.clone(), e))?;

    Ok(Json(TransactionResponse {
        account_id,
        kind: body.kind,
        amount: body.amount,
        balance,
    }))
}

/// Account balance and activity
/// GET /api/accounts/:account_id
pub async fn account_handler(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Json<AccountSnapshot> {
    Json(state.orchestrator.account(&account_id))
}

/// Platform-wide counters
/// GET /api/treasury
pub async fn treasury_handler(State(state): State<Arc<AppState>>) -> Json<TreasuryStats> {
    Json(state.orchestrator.treasury_stats())
}

/// Check a VRF proof attached to a bet outcome
/// POST /api/verify
pub async fn verify_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Json<Verification>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(request_id.0.clone(), e.body_text()))?;

    let verification = state
        .orchestrator
        .verify_outcome(body.game, &body.proof, body.account_id.as_deref())
        .map_err(|e| match e {
            // A bundle that cannot be decoded is the caller's mistake
            SettlementError::Randomness(inner) => {
                ApiError::bad_request(request_id.0.clone(), inner.to_string())
            }
            other => ApiError::settlement(request_id.0.clone(), other),
        })?;

    Ok(Json(verification))
}

/// Prometheus scrape endpoint
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.orchestrator.metrics().to_prometheus_format(),
    )
}
