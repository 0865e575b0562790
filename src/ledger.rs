//! Account ledger
//!
//! Owns every player balance. Each operation runs while holding the
//! account's map entry, so operations on one account are serialized while
//! different accounts proceed independently. A bet debits the wager and
//! credits the settlement in a single assignment.

use crate::config::LedgerConfig;
use crate::errors::{SettlementError, SettlementResult};
use crate::games::types::{BetOutcome, BetReceipt, Credits};
use crate::treasury::{Total, TreasuryAggregator, TreasuryEvent, TreasuryEventKind};
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Player account as held by the ledger
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub balance: Credits,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    /// Receipts of settled bets keyed by request id
    settled: HashMap<String, BetReceipt>,
}

impl Account {
    fn new(id: &str, balance: Credits) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            balance,
            created_at: now,
            last_active_at: now,
            settled: HashMap::new(),
        }
    }

    fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            id: self.id.clone(),
            balance: self.balance,
            created_at: self.created_at,
            last_active_at: self.last_active_at,
            bets_placed: self.settled.len(),
        }
    }
}

/// Read-only view of an account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub id: String,
    pub balance: Credits,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub bets_placed: usize,
}

pub struct AccountLedger {
    accounts: DashMap<String, Account>,
    config: LedgerConfig,
    treasury: Arc<TreasuryAggregator>,
}

impl AccountLedger {
    pub fn new(config: LedgerConfig, treasury: Arc<TreasuryAggregator>) -> Self {
        Self {
            accounts: DashMap::new(),
            config,
            treasury,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Run `op` with the account entry locked. An unknown account is
    /// opened only if `op` succeeds on it.
    fn locked<T, E, F>(&self, account_id: &str, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Account) -> Result<T, E>,
    {
        let seed = self.config.initial_balance;
        let mut opened = false;

        let result = match self.accounts.entry(account_id.to_string()) {
            Entry::Occupied(mut entry) => op(entry.get_mut()),
            Entry::Vacant(entry) => {
                let mut account = Account::new(account_id, seed);
                let result = op(&mut account);
                if result.is_ok() {
                    entry.insert(account);
                    opened = true;
                }
                result
            }
        };

        if opened {
            info!(account_id, seed, "Account opened");
            if seed > 0 {
                self.treasury.record_or_park(TreasuryEvent {
                    event_id: format!("open:{}", account_id),
                    account_id: account_id.to_string(),
                    kind: TreasuryEventKind::AccountOpened { seed },
                });
            }
        }

        result
    }

    /// Like `locked`, refreshing activity only when `op` succeeds
    fn with_account<T, F>(&self, account_id: &str, op: F) -> SettlementResult<T>
    where
        F: FnOnce(&mut Account) -> SettlementResult<T>,
    {
        self.locked(account_id, |account| {
            let result = op(account);
            if result.is_ok() {
                account.touch();
            }
            result
        })
    }

    /// Create the account if needed and mark it active
    pub fn open_or_touch(&self, account_id: &str) -> AccountSnapshot {
        let opened = self.locked(account_id, |account| {
            account.touch();
            Ok::<_, Infallible>(account.snapshot())
        });
        match opened {
            Ok(snapshot) => snapshot,
            Err(never) => match never {},
        }
    }

    pub fn account(&self, account_id: &str) -> Option<AccountSnapshot> {
        self.accounts.get(account_id).map(|account| account.snapshot())
    }

    /// Balance an account has, or would be opened with
    pub fn balance(&self, account_id: &str) -> Credits {
        self.accounts
            .get(account_id)
            .map(|account| account.balance)
            .unwrap_or(self.config.initial_balance)
    }

    /// Previously settled receipt for a request id, if any
    pub fn settled_receipt(&self, account_id: &str, request_id: &str) -> Option<BetReceipt> {
        self.accounts
            .get(account_id)
            .and_then(|account| account.settled.get(request_id).cloned())
    }

    /// Read-only pre-check of bounds and funds. The authoritative check is
    /// repeated inside `apply_bet`.
    pub fn check_bet(&self, account_id: &str, wager: Credits) -> SettlementResult<()> {
        self.check_bounds(wager)?;
        check_funds(wager, self.balance(account_id))
    }

    fn check_bounds(&self, wager: Credits) -> SettlementResult<()> {
        if wager <= 0 {
            return Err(SettlementError::InvalidWager { wager });
        }
        if !self.config.bet_in_range(wager) {
            return Err(SettlementError::BetOutOfRange {
                wager,
                min: self.config.min_bet,
                max: self.config.max_bet,
            });
        }
        Ok(())
    }

    pub fn deposit(&self, account_id: &str, amount: Credits) -> SettlementResult<Credits> {
        if amount <= 0 {
            return Err(SettlementError::InvalidAmount { amount });
        }

        let balance = self.with_account(account_id, |account| {
            account.balance = account
                .balance
                .checked_add(amount)
                .ok_or(SettlementError::InvalidAmount { amount })?;
            Ok(account.balance)
        })?;

        info!(account_id, amount, balance, "Deposit applied");
        self.notify(account_id, TreasuryEventKind::Deposit { amount });
        Ok(balance)
    }

    pub fn withdraw(&self, account_id: &str, amount: Credits) -> SettlementResult<Credits> {
        if amount <= 0 {
            return Err(SettlementError::InvalidAmount { amount });
        }

        let balance = self.with_account(account_id, |account| {
            check_funds(amount, account.balance)?;
            account.balance -= amount;
            Ok(account.balance)
        })?;

        info!(account_id, amount, balance, "Withdrawal applied");
        self.notify(account_id, TreasuryEventKind::Withdrawal { amount });
        Ok(balance)
    }

    /// Debit the wager and credit the settlement as one state transition.
    ///
    /// A request id that was already settled for this account yields
    /// `DuplicateRequest` carrying the original receipt; nothing changes.
    /// Treasury recording of bets is left to the caller.
    pub fn apply_bet(&self, outcome: &BetOutcome) -> SettlementResult<BetReceipt> {
        let wager = outcome.wager_amount;

        self.with_account(&outcome.account_id, |account| {
            if let Some(prior) = account.settled.get(&outcome.request_id) {
                debug!(request_id = %outcome.request_id, "Replayed bet request");
                return Err(SettlementError::DuplicateRequest {
                    request_id: outcome.request_id.clone(),
                    prior: Box::new(BetReceipt {
                        replayed: true,
                        ..prior.clone()
                    }),
                });
            }

            self.check_bounds(wager)?;
            check_funds(wager, account.balance)?;

            // (balance - wager) + (wager + delta), applied at once
            let balance = account
                .balance
                .checked_add(outcome.settlement_amount)
                .ok_or(SettlementError::InvalidAmount {
                    amount: outcome.settlement_amount,
                })?;
            if balance < 0 {
                return Err(SettlementError::InsufficientFunds {
                    requested: wager,
                    available: account.balance,
                });
            }
            account.balance = balance;

            let receipt = BetReceipt {
                outcome: outcome.clone(),
                balance,
                replayed: false,
            };
            account.settled.insert(outcome.request_id.clone(), receipt.clone());
            Ok(receipt)
        })
    }

    fn notify(&self, account_id: &str, kind: TreasuryEventKind) {
        self.treasury.record_or_park(TreasuryEvent {
            event_id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            kind,
        });
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Sum of all balances, for reconciliation against the treasury
    pub fn total_balance(&self) -> Total {
        self.accounts
            .iter()
            .map(|account| Total::from(account.balance))
            .sum()
    }
}

fn check_funds(requested: Credits, available: Credits) -> SettlementResult<()> {
    if requested > available {
        return Err(SettlementError::InsufficientFunds {
            requested,
            available,
        });
    }
    Ok(())
}
