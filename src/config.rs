//! Configuration management with validation and defaults
//!
//! Settings come from an optional TOML file, then `BET_LEDGER_*` environment
//! variables, and are validated before anything is built from them.

use crate::errors::{ConfigResult, ConfigurationError};
use crate::games::types::Credits;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Betting limits, fee schedule and aggregator retry policy
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub min_bet: Credits,
    pub max_bet: Credits,
    pub house_fee_rate: Decimal,
    pub win_multiplier: Decimal,
    /// Balance granted when an account is first seen
    pub initial_balance: Credits,
    pub aggregator_retry_attempts: u32,
    pub aggregator_retry_backoff_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_bet: 10,
            max_bet: 10_000,
            house_fee_rate: dec!(0.02),
            win_multiplier: dec!(2.0),
            initial_balance: 0,
            aggregator_retry_attempts: 5,
            aggregator_retry_backoff_ms: 5,
        }
    }
}

impl LedgerConfig {
    pub fn aggregator_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.aggregator_retry_backoff_ms)
    }

    pub fn bet_in_range(&self, wager: Credits) -> bool {
        (self.min_bet..=self.max_bet).contains(&wager)
    }
}

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "bet_ledger=info,tower_http=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        let ledger = &self.ledger;

        if ledger.min_bet < 1 {
            return Err(invalid("ledger.min_bet", ledger.min_bet, "min_bet must be at least 1"));
        }
        if ledger.max_bet < ledger.min_bet {
            return Err(invalid("ledger.max_bet", ledger.max_bet, "max_bet must be >= min_bet"));
        }
        if ledger.house_fee_rate < Decimal::ZERO || ledger.house_fee_rate >= Decimal::ONE {
            return Err(invalid(
                "ledger.house_fee_rate",
                ledger.house_fee_rate,
                "fee rate must be in [0, 1)",
            ));
        }
        // Above 2x the house would pay out more than it takes in on wins
        if ledger.win_multiplier <= Decimal::ONE || ledger.win_multiplier > dec!(2) {
            return Err(invalid(
                "ledger.win_multiplier",
                ledger.win_multiplier,
                "win multiplier must be in (1, 2]",
            ));
        }
        if ledger.initial_balance < 0 {
            return Err(invalid(
                "ledger.initial_balance",
                ledger.initial_balance,
                "initial balance cannot be negative",
            ));
        }
        if ledger.aggregator_retry_attempts == 0 {
            return Err(invalid(
                "ledger.aggregator_retry_attempts",
                ledger.aggregator_retry_attempts,
                "at least one attempt is required",
            ));
        }
        if self.api.port == 0 {
            return Err(invalid("api.port", self.api.port, "port cannot be zero"));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(invalid(
                "api.request_timeout_secs",
                self.api.request_timeout_secs,
                "timeout cannot be zero",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> ConfigResult<AppConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => AppConfig::default(),
        };

        apply_env_overrides(&mut config, |key| env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> ConfigResult<AppConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }
}

/// Apply `BET_LEDGER_*` overrides read through `lookup`
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("BET_LEDGER_MIN_BET") {
        config.ledger.min_bet = parse_var("BET_LEDGER_MIN_BET", value)?;
    }
    if let Some(value) = lookup("BET_LEDGER_MAX_BET") {
        config.ledger.max_bet = parse_var("BET_LEDGER_MAX_BET", value)?;
    }
    if let Some(value) = lookup("BET_LEDGER_HOUSE_FEE_RATE") {
        config.ledger.house_fee_rate = parse_var("BET_LEDGER_HOUSE_FEE_RATE", value)?;
    }
    if let Some(value) = lookup("BET_LEDGER_WIN_MULTIPLIER") {
        config.ledger.win_multiplier = parse_var("BET_LEDGER_WIN_MULTIPLIER", value)?;
    }
    if let Some(value) = lookup("BET_LEDGER_INITIAL_BALANCE") {
        config.ledger.initial_balance = parse_var("BET_LEDGER_INITIAL_BALANCE", value)?;
    }
    if let Some(value) = lookup("BET_LEDGER_API_HOST") {
        config.api.host = value;
    }
    if let Some(value) = lookup("BET_LEDGER_API_PORT") {
        config.api.port = parse_var("BET_LEDGER_API_PORT", value)?;
    }

    Ok(())
}

fn parse_var<T: FromStr>(field: &str, value: String) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigurationError::InvalidValue {
        field: field.to_string(),
        reason: "could not parse value".to_string(),
        value,
    })
}
