//! Bet Ledger - bet settlement and treasury accounting
//!
//! Resolves rock-paper-scissors and coin-flip wagers, settles them atomically
//! against per-account balances and keeps platform-wide treasury counters
//! derived from the settled events.
//!
//! Request flow: `api` -> `settlement::SettlementOrchestrator` ->
//! `games::OutcomeResolver` + `games::PayoutCalculator` -> `ledger::AccountLedger`
//! -> `treasury::TreasuryAggregator`.

pub mod api;
pub mod config;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod metrics;
pub mod settlement;
pub mod treasury;

pub use config::{AppConfig, ConfigLoader, LedgerConfig};
pub use errors::{SettlementError, SettlementResult};
pub use ledger::{AccountLedger, AccountSnapshot};
pub use settlement::{SettlementOrchestrator, TreasuryStats};
pub use treasury::{TreasuryAggregator, TreasuryCounters};
