//! Bet Ledger HTTP API
//!
//! Request layer in front of the settlement orchestrator: bets, deposits and
//! withdrawals, account lookup, treasury statistics and proof verification.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{create_app, ApiServer};
