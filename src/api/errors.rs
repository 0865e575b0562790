//! API Error Handling
//!
//! Structured error responses with proper HTTP status codes and request tracking.
//! Every settlement failure keeps its own code so clients can tell which rule
//! a request broke.

use crate::errors::SettlementError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

/// Error body with structured information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (INSUFFICIENT_FUNDS, BET_OUT_OF_RANGE, BAD_REQUEST, etc.)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (can be any JSON)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error types with request tracking
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    Settlement(SettlementError),
    BadRequest(String),
}

impl ApiError {
    pub fn settlement(request_id: String, err: SettlementError) -> Self {
        Self {
            kind: ApiErrorKind::Settlement(err),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.kind {
            ApiErrorKind::Settlement(err) => settlement_status(err),
            ApiErrorKind::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match &self.kind {
            ApiErrorKind::Settlement(err) => err.code(),
            ApiErrorKind::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

fn settlement_status(err: &SettlementError) -> StatusCode {
    match err {
        SettlementError::InvalidAmount { .. }
        | SettlementError::InvalidChoice { .. }
        | SettlementError::InvalidWager { .. } => StatusCode::BAD_REQUEST,
        SettlementError::BetOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SettlementError::InsufficientFunds { .. } | SettlementError::DuplicateRequest { .. } => {
            StatusCode::CONFLICT
        }
        SettlementError::AggregatorLag { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SettlementError::Randomness(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn settlement_details(err: &SettlementError) -> Option<serde_json::Value> {
    match err {
        SettlementError::InvalidAmount { amount } => Some(serde_json::json!({ "amount": amount })),
        SettlementError::InvalidWager { wager } => Some(serde_json::json!({ "wager": wager })),
        SettlementError::InvalidChoice { game, choice } => Some(serde_json::json!({
            "game": game,
            "choice": choice,
            "valid_choices": game.choices(),
        })),
        SettlementError::BetOutOfRange { wager, min, max } => Some(serde_json::json!({
            "wager": wager,
            "min_bet": min,
            "max_bet": max,
        })),
        SettlementError::InsufficientFunds {
            requested,
            available,
        } => Some(serde_json::json!({
            "requested": requested,
            "available": available,
        })),
        _ => None,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::Settlement(err) => write!(f, "[{}] {}: {}", self.request_id, err.code(), err),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, details) = match &self.kind {
            ApiErrorKind::Settlement(err) => (err.to_string(), settlement_details(err)),
            ApiErrorKind::BadRequest(msg) => (msg.clone(), None),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}
