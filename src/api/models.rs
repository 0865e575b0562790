//! API Request and Response Models

use crate::games::types::{BetReceipt, Credits, GameType, TransactionKind, VrfBundle};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub randomness: String,
}

/// POST /api/accounts/:account_id/bets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetBody {
    pub game: GameType,
    /// Kept as text so an unknown pick surfaces as INVALID_CHOICE
    pub choice: String,
    pub wager_amount: Credits,
    /// Idempotency key; falls back to the x-request-id header
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetResponse {
    #[serde(flatten)]
    pub receipt: BetReceipt,
}

/// POST /api/accounts/:account_id/transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactBody {
    pub kind: TransactionKind,
    pub amount: Credits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub account_id: String,
    pub kind: TransactionKind,
    pub amount: Credits,
    pub balance: Credits,
}

/// POST /api/verify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyBody {
    pub game: GameType,
    pub proof: VrfBundle,
    /// When set, the proof must be bound to this account
    #[serde(default)]
    pub account_id: Option<String>,
}
