//! Error types for the bet settlement core
//!
//! Every user-visible failure maps to exactly one `SettlementError` variant so
//! callers can tell which ledger invariant a request violated.

use crate::games::types::{BetReceipt, Credits, GameType};
use thiserror::Error;

/// Errors raised while validating, resolving, settling or recording a request
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Invalid amount: {amount} (must be positive)")]
    InvalidAmount { amount: Credits },

    #[error("Invalid choice '{choice}' for {game}")]
    InvalidChoice { game: GameType, choice: String },

    #[error("Invalid wager: {wager} (must be positive)")]
    InvalidWager { wager: Credits },

    #[error("Bet of {wager} outside allowed range [{min}, {max}]")]
    BetOutOfRange {
        wager: Credits,
        min: Credits,
        max: Credits,
    },

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Credits,
        available: Credits,
    },

    /// Replay of an already settled request; carries the original receipt
    #[error("Request {request_id} already settled")]
    DuplicateRequest {
        request_id: String,
        prior: Box<BetReceipt>,
    },

    /// Treasury counters could not take the event yet; retried internally
    #[error("Treasury aggregator lagging on event {event_id} after {attempts} attempt(s)")]
    AggregatorLag { event_id: String, attempts: u32 },

    #[error("Randomness source failed: {0}")]
    Randomness(#[from] RandomnessError),
}

impl SettlementError {
    /// Stable machine-readable code used by the API and metrics
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::InvalidAmount { .. } => "INVALID_AMOUNT",
            SettlementError::InvalidChoice { .. } => "INVALID_CHOICE",
            SettlementError::InvalidWager { .. } => "INVALID_WAGER",
            SettlementError::BetOutOfRange { .. } => "BET_OUT_OF_RANGE",
            SettlementError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            SettlementError::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            SettlementError::AggregatorLag { .. } => "AGGREGATOR_LAG",
            SettlementError::Randomness(_) => "RANDOMNESS_FAILURE",
        }
    }

    /// True for failures detected before any state was touched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SettlementError::InvalidAmount { .. }
                | SettlementError::InvalidChoice { .. }
                | SettlementError::InvalidWager { .. }
                | SettlementError::BetOutOfRange { .. }
                | SettlementError::InsufficientFunds { .. }
        )
    }
}

/// Failures of a random source (VRF signing, proof decoding)
#[derive(Debug, Error)]
pub enum RandomnessError {
    #[error("Invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("Malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("Draw bound must be at least 1, got {0}")]
    EmptyRange(u32),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

pub type SettlementResult<T> = Result<T, SettlementError>;
pub type ConfigResult<T> = Result<T, ConfigurationError>;
