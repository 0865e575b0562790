//! Route Definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Account operations
        .route("/api/accounts/:account_id", get(account_handler))
        .route("/api/accounts/:account_id/bets", post(place_bet_handler))
        .route("/api/accounts/:account_id/transactions", post(transact_handler))
        // Platform reporting
        .route("/api/treasury", get(treasury_handler))
        .route("/api/verify", post(verify_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
