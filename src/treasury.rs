//! Treasury aggregator
//!
//! Platform-wide counters derived from ledger-confirmed events. Counters are
//! event-sourced: each event is applied exactly once and never recomputed
//! from account state. Bet and account-opening events carry caller-visible
//! ids and are deduplicated on them; deposit and withdrawal ids are minted
//! per call and reach the counters through a single owner, so they are not
//! remembered.

use crate::errors::{SettlementError, SettlementResult};
use crate::games::types::{Classification, Credits};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, TryLockError};
use tracing::{debug, info};

/// Platform-wide sum of `Credits`, wide enough that no run of i64 events overflows it
pub type Total = i128;

/// A ledger change the treasury must account for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreasuryEvent {
    /// Unique per ledger change; bets use their request id
    pub event_id: String,
    pub account_id: String,
    pub kind: TreasuryEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreasuryEventKind {
    /// New account seeded with a starting balance
    AccountOpened { seed: Credits },
    Deposit { amount: Credits },
    Withdrawal { amount: Credits },
    BetSettled {
        wager_amount: Credits,
        classification: Classification,
        settlement_delta: Credits,
        house_fee: Credits,
    },
}

impl TreasuryEventKind {
    /// Whether a repeat of the same event id must be ignored
    pub fn is_deduplicated(&self) -> bool {
        matches!(
            self,
            TreasuryEventKind::AccountOpened { .. } | TreasuryEventKind::BetSettled { .. }
        )
    }
}

/// Running platform totals
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreasuryCounters {
    pub total_balance: Total,
    pub total_bets: u64,
    pub total_wagered: Total,
    pub total_won: Total,
    pub total_lost: Total,
    pub total_house_fees: Total,
    pub total_deposits: Total,
    pub total_withdrawals: Total,
}

impl TreasuryCounters {
    pub fn apply(&mut self, kind: &TreasuryEventKind) {
        match *kind {
            TreasuryEventKind::AccountOpened { seed } => {
                self.total_balance += Total::from(seed);
            }
            TreasuryEventKind::Deposit { amount } => {
                self.total_deposits += Total::from(amount);
                self.total_balance += Total::from(amount);
            }
            TreasuryEventKind::Withdrawal { amount } => {
                self.total_withdrawals += Total::from(amount);
                self.total_balance -= Total::from(amount);
            }
            TreasuryEventKind::BetSettled {
                wager_amount,
                classification,
                settlement_delta,
                house_fee,
            } => {
                self.total_bets += 1;
                match classification {
                    Classification::Win => {
                        self.total_wagered += Total::from(wager_amount);
                        // Net winnings, so won + fees never exceeds wagered
                        self.total_won += Total::from(settlement_delta);
                        self.total_house_fees += Total::from(house_fee);
                    }
                    Classification::Lose => {
                        self.total_wagered += Total::from(wager_amount);
                        self.total_lost += Total::from(wager_amount);
                    }
                    Classification::Draw => {}
                }
                self.total_balance += Total::from(settlement_delta);
            }
        }
    }

    /// Ratios shown alongside the raw totals
    pub fn metrics(&self) -> TreasuryMetrics {
        let wagered = self.total_wagered as f64;
        let percent_of_wagered = |value: Total| {
            if self.total_wagered > 0 {
                round2(value as f64 / wagered * 100.0)
            } else {
                0.0
            }
        };

        TreasuryMetrics {
            player_win_rate: percent_of_wagered(self.total_won),
            house_edge: percent_of_wagered(self.total_house_fees),
            average_bet_size: if self.total_bets > 0 {
                round2(wagered / self.total_bets as f64)
            } else {
                0.0
            },
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derived reporting figures, percentages with two decimals
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TreasuryMetrics {
    pub player_win_rate: f64,
    pub house_edge: f64,
    pub average_bet_size: f64,
}

/// Whether `record` changed the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Applied,
    AlreadyApplied,
}

#[derive(Default)]
struct TreasuryState {
    counters: TreasuryCounters,
    /// Ids of applied deduplicated events
    applied: HashSet<String>,
}

impl TreasuryState {
    fn apply_once(&mut self, event: &TreasuryEvent) -> RecordStatus {
        let deduplicated = event.kind.is_deduplicated();
        if deduplicated && self.applied.contains(&event.event_id) {
            return RecordStatus::AlreadyApplied;
        }
        self.counters.apply(&event.kind);
        if deduplicated {
            self.applied.insert(event.event_id.clone());
        }
        RecordStatus::Applied
    }
}

/// Event-sourced treasury counters with exactly-once application
#[derive(Default)]
pub struct TreasuryAggregator {
    state: Mutex<TreasuryState>,
    /// Events whose recording was deferred; drained by `reconcile`
    parked: DashMap<String, TreasuryEvent>,
}

impl TreasuryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TreasuryState> {
        // Counter updates are single statements, a poisoned guard is consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply an event, waiting for the counters if they are busy
    pub fn record(&self, event: &TreasuryEvent) -> RecordStatus {
        let status = self.lock().apply_once(event);
        debug!(event_id = %event.event_id, ?status, "Treasury event recorded");
        status
    }

    fn try_lock(&self, event_id: &str) -> SettlementResult<MutexGuard<'_, TreasuryState>> {
        match self.state.try_lock() {
            Ok(state) => Ok(state),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(SettlementError::AggregatorLag {
                event_id: event_id.to_string(),
                attempts: 1,
            }),
        }
    }

    /// Apply an event without waiting; `AggregatorLag` if the counters are busy
    pub fn try_record(&self, event: &TreasuryEvent) -> SettlementResult<RecordStatus> {
        let mut state = self.try_lock(&event.event_id)?;
        Ok(state.apply_once(event))
    }

    /// Apply one parked event without waiting. `Ok(None)` means it is no
    /// longer parked (already reconciled elsewhere).
    pub fn try_apply_parked(&self, event_id: &str) -> SettlementResult<Option<RecordStatus>> {
        let mut state = self.try_lock(event_id)?;
        Ok(self
            .parked
            .remove(event_id)
            .map(|(_, event)| state.apply_once(&event)))
    }

    /// Record now if possible, otherwise defer to the next `reconcile`
    pub fn record_or_park(&self, event: TreasuryEvent) -> Option<RecordStatus> {
        match self.try_record(&event) {
            Ok(status) => Some(status),
            Err(_) => {
                self.park(event);
                None
            }
        }
    }

    pub fn park(&self, event: TreasuryEvent) {
        debug!(event_id = %event.event_id, "Treasury event parked");
        self.parked.insert(event.event_id.clone(), event);
    }

    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Apply every parked event; returns how many changed the counters
    pub fn reconcile(&self) -> usize {
        if self.parked.is_empty() {
            return 0;
        }

        let ids: Vec<String> = self.parked.iter().map(|entry| entry.key().clone()).collect();
        let mut applied = 0;
        for id in ids {
            if let Some((_, event)) = self.parked.remove(&id) {
                if self.record(&event) == RecordStatus::Applied {
                    applied += 1;
                }
            }
        }

        if applied > 0 {
            info!(applied, "Reconciled parked treasury events");
        }
        applied
    }

    /// Read-only copy of the counters after draining parked events
    pub fn snapshot(&self) -> TreasuryCounters {
        self.reconcile();
        self.lock().counters
    }

    /// Whether a bet or account-opening event has been applied
    pub fn has_applied(&self, event_id: &str) -> bool {
        self.lock().applied.contains(event_id)
    }

    /// Run `f` while holding the counters, simulating a slow aggregator
    #[cfg(test)]
    pub(crate) fn with_counters_held<F: FnOnce()>(&self, f: F) {
        let _state = self.lock();
        f();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, kind: TreasuryEventKind) -> TreasuryEvent {
        TreasuryEvent {
            event_id: id.to_string(),
            account_id: "alice".to_string(),
            kind,
        }
    }

    fn bet(id: &str, wager: Credits, classification: Classification, delta: Credits, fee: Credits) -> TreasuryEvent {
        event(
            id,
            TreasuryEventKind::BetSettled {
                wager_amount: wager,
                classification,
                settlement_delta: delta,
                house_fee: fee,
            },
        )
    }

    #[test]
    fn test_deposit_and_withdrawal() {
        let treasury = TreasuryAggregator::new();
        treasury.record(&event("d1", TreasuryEventKind::Deposit { amount: 1000 }));
        treasury.record(&event("w1", TreasuryEventKind::Withdrawal { amount: 300 }));

        let counters = treasury.snapshot();
        assert_eq!(counters.total_deposits, 1000);
        assert_eq!(counters.total_withdrawals, 300);
        assert_eq!(counters.total_balance, 700);
    }

    #[test]
    fn test_bet_classifications() {
        let treasury = TreasuryAggregator::new();
        treasury.record(&bet("b1", 100, Classification::Win, 96, 4));
        treasury.record(&bet("b2", 50, Classification::Lose, -50, 0));
        treasury.record(&bet("b3", 70, Classification::Draw, 0, 0));

        let counters = treasury.snapshot();
        assert_eq!(counters.total_bets, 3);
        assert_eq!(counters.total_wagered, 150);
        assert_eq!(counters.total_won, 96);
        assert_eq!(counters.total_lost, 50);
        assert_eq!(counters.total_house_fees, 4);
        assert_eq!(counters.total_balance, 46);
        assert!(counters.total_won + counters.total_house_fees <= counters.total_wagered);
    }

    #[test]
    fn test_replayed_event_counted_once() {
        let treasury = TreasuryAggregator::new();
        let win = bet("b1", 100, Classification::Win, 96, 4);
        assert_eq!(treasury.record(&win), RecordStatus::Applied);
        assert_eq!(treasury.record(&win), RecordStatus::AlreadyApplied);
        assert_eq!(treasury.try_record(&win).unwrap(), RecordStatus::AlreadyApplied);

        assert_eq!(treasury.snapshot().total_bets, 1);
    }

    #[test]
    fn test_try_record_reports_lag_while_busy() {
        let treasury = TreasuryAggregator::new();
        let guard = treasury.lock();
        let err = treasury
            .try_record(&event("d1", TreasuryEventKind::Deposit { amount: 10 }))
            .unwrap_err();
        assert!(matches!(err, SettlementError::AggregatorLag { .. }));
        drop(guard);
    }

    #[test]
    fn test_try_apply_parked() {
        let treasury = TreasuryAggregator::new();
        treasury.park(event("d1", TreasuryEventKind::Deposit { amount: 25 }));

        {
            let _busy = treasury.lock();
            assert!(matches!(
                treasury.try_apply_parked("d1"),
                Err(SettlementError::AggregatorLag { .. })
            ));
        }
        assert_eq!(treasury.parked_count(), 1);

        assert_eq!(treasury.try_apply_parked("d1").unwrap(), Some(RecordStatus::Applied));
        assert_eq!(treasury.try_apply_parked("d1").unwrap(), None);
        assert_eq!(treasury.snapshot().total_deposits, 25);
    }

    #[test]
    fn test_parked_events_reconciled_on_snapshot() {
        let treasury = TreasuryAggregator::new();
        treasury.park(event("d1", TreasuryEventKind::Deposit { amount: 40 }));
        treasury.park(event("d2", TreasuryEventKind::Deposit { amount: 60 }));
        assert_eq!(treasury.parked_count(), 2);

        treasury.park(bet("b1", 100, Classification::Lose, -100, 0));

        let counters = treasury.snapshot();
        assert_eq!(counters.total_deposits, 100);
        assert_eq!(counters.total_bets, 1);
        assert_eq!(treasury.parked_count(), 0);
        assert!(treasury.has_applied("b1"));
        assert_eq!(treasury.reconcile(), 0);
    }

    #[test]
    fn test_transfers_are_not_remembered() {
        let treasury = TreasuryAggregator::new();
        treasury.record(&event("d1", TreasuryEventKind::Deposit { amount: 40 }));
        treasury.record(&event("w1", TreasuryEventKind::Withdrawal { amount: 15 }));
        treasury.record(&event("open:alice", TreasuryEventKind::AccountOpened { seed: 10 }));

        assert!(!treasury.has_applied("d1"));
        assert!(!treasury.has_applied("w1"));
        assert!(treasury.has_applied("open:alice"));
        assert_eq!(treasury.lock().applied.len(), 1);
        assert_eq!(treasury.snapshot().total_balance, 35);
    }

    #[test]
    fn test_totals_past_i64_max() {
        let treasury = TreasuryAggregator::new();
        treasury.record(&event("d1", TreasuryEventKind::Deposit { amount: Credits::MAX }));
        treasury.record(&event("d2", TreasuryEventKind::Deposit { amount: Credits::MAX }));
        treasury.record(&bet("b1", 10, Classification::Win, 9, 1));

        let counters = treasury.snapshot();
        assert_eq!(counters.total_deposits, 2 * Total::from(Credits::MAX));
        assert_eq!(counters.total_balance, 2 * Total::from(Credits::MAX) + 9);
        assert_eq!(counters.total_bets, 1);
    }

    #[test]
    fn test_account_opened_moves_balance_only() {
        let treasury = TreasuryAggregator::new();
        treasury.record(&event("open", TreasuryEventKind::AccountOpened { seed: 1000 }));
        let counters = treasury.snapshot();
        assert_eq!(counters.total_balance, 1000);
        assert_eq!(counters.total_deposits, 0);
    }

    #[test]
    fn test_metrics() {
        let counters = TreasuryCounters {
            total_bets: 4,
            total_wagered: 400,
            total_won: 96,
            total_house_fees: 4,
            ..Default::default()
        };
        let metrics = counters.metrics();
        assert_eq!(metrics.player_win_rate, 24.0);
        assert_eq!(metrics.house_edge, 1.0);
        assert_eq!(metrics.average_bet_size, 100.0);

        let empty = TreasuryCounters::default().metrics();
        assert_eq!(empty.player_win_rate, 0.0);
        assert_eq!(empty.average_bet_size, 0.0);
    }
}
