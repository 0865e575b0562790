//! Settlement orchestrator
//!
//! Drives one bet request through `Received -> Validated -> Resolved ->
//! Settled -> Recorded`, or into `Rejected`. Everything up to `Settled` runs
//! synchronously inside the first poll, so a request is either untouched or
//! fully applied to the ledger; only treasury retries await.

use crate::config::LedgerConfig;
use crate::errors::{SettlementError, SettlementResult};
use crate::games::payout::PayoutCalculator;
use crate::games::random::RandomSource;
use crate::games::resolver::OutcomeResolver;
use crate::games::types::{
    BetOutcome, BetReceipt, BetRequest, Choice, Credits, GameType, TransactionKind, VrfBundle,
};
use crate::games::vrf_engine::verify_draw;
use crate::ledger::{AccountLedger, AccountSnapshot};
use crate::metrics::SettlementMetrics;
use crate::treasury::{
    TreasuryAggregator, TreasuryCounters, TreasuryEvent, TreasuryEventKind, TreasuryMetrics,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle of a bet request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetState {
    Received,
    Validated,
    Resolved,
    Settled,
    Recorded,
    Rejected,
}

impl fmt::Display for BetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BetState::Received => "received",
            BetState::Validated => "validated",
            BetState::Resolved => "resolved",
            BetState::Settled => "settled",
            BetState::Recorded => "recorded",
            BetState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Platform parameters reported with the treasury
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlatformParameters {
    pub min_bet: Credits,
    pub max_bet: Credits,
    pub house_fee_rate: Decimal,
    pub win_multiplier: Decimal,
}

/// Treasury counters plus figures derived from them on read
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TreasuryStats {
    #[serde(flatten)]
    pub counters: TreasuryCounters,
    pub metrics: TreasuryMetrics,
    pub parameters: PlatformParameters,
    /// Accounts currently held by the ledger
    pub accounts: usize,
}

/// Result of checking a proof bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// House pick the proof commits to, when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revealed_value: Option<Choice>,
}

pub struct SettlementOrchestrator {
    ledger: Arc<AccountLedger>,
    treasury: Arc<TreasuryAggregator>,
    resolver: OutcomeResolver,
    payout: PayoutCalculator,
    metrics: Arc<SettlementMetrics>,
}

impl SettlementOrchestrator {
    pub fn new(config: LedgerConfig, source: Arc<dyn RandomSource>) -> Self {
        let treasury = Arc::new(TreasuryAggregator::new());
        let payout = PayoutCalculator::new(config.house_fee_rate, config.win_multiplier);
        let ledger = Arc::new(AccountLedger::new(config, treasury.clone()));

        info!(
            source = source.name(),
            fee_rate = %payout.fee_rate(),
            win_multiplier = %payout.win_multiplier(),
            "Settlement orchestrator ready"
        );

        Self {
            ledger,
            treasury,
            resolver: OutcomeResolver::new(source),
            payout,
            metrics: Arc::new(SettlementMetrics::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<AccountLedger> {
        &self.ledger
    }

    pub fn treasury(&self) -> &Arc<TreasuryAggregator> {
        &self.treasury
    }

    pub fn metrics(&self) -> &Arc<SettlementMetrics> {
        &self.metrics
    }

    /// Name of the random source deciding outcomes
    pub fn randomness(&self) -> &'static str {
        self.resolver.source_name()
    }

    /// Place a bet. A replayed `request_id` returns the original receipt
    /// with `replayed` set and changes nothing.
    pub async fn place_bet(&self, request: BetRequest) -> SettlementResult<BetReceipt> {
        transition(&request, BetState::Received);

        let receipt = match self.settle(&request) {
            Ok(receipt) => receipt,
            Err(SettlementError::DuplicateRequest { prior, .. }) => {
                self.metrics.record_replay();
                info!(
                    request_id = %request.request_id,
                    account_id = %request.account_id,
                    "Replayed bet answered from prior receipt"
                );
                return Ok(*prior);
            }
            Err(err) => {
                transition(&request, BetState::Rejected);
                self.reject(&request.account_id, &err);
                return Err(err);
            }
        };

        let outcome = &receipt.outcome;
        self.metrics.record_bet(outcome.classification);
        info!(
            request_id = %outcome.request_id,
            account_id = %outcome.account_id,
            game = %outcome.game,
            classification = %outcome.classification,
            delta = outcome.settlement_amount,
            balance = receipt.balance,
            "Bet settled"
        );

        self.record_settlement(outcome).await;
        transition(&request, BetState::Recorded);

        Ok(receipt)
    }

    /// Validate, resolve and apply a bet to the ledger
    fn settle(&self, request: &BetRequest) -> SettlementResult<BetReceipt> {
        if let Some(prior) = self
            .ledger
            .settled_receipt(&request.account_id, &request.request_id)
        {
            return Err(SettlementError::DuplicateRequest {
                request_id: request.request_id.clone(),
                prior: Box::new(BetReceipt {
                    replayed: true,
                    ..prior
                }),
            });
        }

        if !request.game.accepts(request.choice) {
            return Err(SettlementError::InvalidChoice {
                game: request.game,
                choice: request.choice.to_string(),
            });
        }
        self.ledger
            .check_bet(&request.account_id, request.wager_amount)?;
        transition(request, BetState::Validated);

        let resolution = self
            .resolver
            .resolve(
                request.game,
                request.choice,
                &request.account_id,
                &request.request_id,
            )?;
        let payout = self
            .payout
            .settle(request.wager_amount, resolution.classification)?;
        transition(request, BetState::Resolved);

        let outcome = BetOutcome {
            request_id: request.request_id.clone(),
            account_id: request.account_id.clone(),
            game: request.game,
            player_choice: request.choice,
            classification: resolution.classification,
            revealed_value: resolution.revealed,
            wager_amount: request.wager_amount,
            settlement_amount: payout.delta,
            house_fee: payout.house_fee,
            proof: resolution.proof,
            created_at: Utc::now(),
        };

        // Bounds and funds are re-checked under the account lock
        let receipt = self.ledger.apply_bet(&outcome)?;
        transition(request, BetState::Settled);
        Ok(receipt)
    }

    /// Feed a settled bet to the treasury, retrying while the counters are
    /// busy. The event is parked before the first await so it survives the
    /// caller going away; `reconcile` picks up whatever is left.
    async fn record_settlement(&self, outcome: &BetOutcome) {
        let event = TreasuryEvent {
            event_id: outcome.request_id.clone(),
            account_id: outcome.account_id.clone(),
            kind: TreasuryEventKind::BetSettled {
                wager_amount: outcome.wager_amount,
                classification: outcome.classification,
                settlement_delta: outcome.settlement_amount,
                house_fee: outcome.house_fee,
            },
        };

        if self.treasury.try_record(&event).is_ok() {
            return;
        }

        let event_id = event.event_id.clone();
        self.treasury.park(event);

        let config = self.ledger.config();
        let attempts = config.aggregator_retry_attempts;
        let backoff = config.aggregator_retry_backoff();

        for attempt in 1..=attempts {
            self.metrics.record_aggregator_retry();
            tokio::time::sleep(backoff * attempt).await;

            match self.treasury.try_apply_parked(&event_id) {
                Ok(status) => {
                    debug!(%event_id, attempt, ?status, "Treasury caught up");
                    return;
                }
                Err(err) => debug!(%event_id, attempt, error = %err, "Treasury still busy"),
            }
        }

        self.metrics.record_aggregator_parked();
        warn!(
            %event_id,
            attempts,
            "Treasury busy after retries, event left for reconciliation"
        );
    }

    /// Deposit or withdraw, returning the new balance
    pub fn transact(
        &self,
        account_id: &str,
        kind: TransactionKind,
        amount: Credits,
    ) -> SettlementResult<Credits> {
        let result = match kind {
            TransactionKind::Deposit => self.ledger.deposit(account_id, amount),
            TransactionKind::Withdraw => self.ledger.withdraw(account_id, amount),
        };

        match result {
            Ok(balance) => {
                self.metrics.record_transaction();
                Ok(balance)
            }
            Err(err) => {
                self.reject(account_id, &err);
                Err(err)
            }
        }
    }

    /// Account view for an authenticated caller, opening it on first access
    pub fn account(&self, account_id: &str) -> AccountSnapshot {
        self.ledger.open_or_touch(account_id)
    }

    pub fn treasury_stats(&self) -> TreasuryStats {
        let counters = self.treasury.snapshot();
        let config = self.ledger.config();

        TreasuryStats {
            metrics: counters.metrics(),
            counters,
            parameters: PlatformParameters {
                min_bet: config.min_bet,
                max_bet: config.max_bet,
                house_fee_rate: self.payout.fee_rate(),
                win_multiplier: self.payout.win_multiplier(),
            },
            accounts: self.ledger.account_count(),
        }
    }

    /// Check a proof bundle and recover the house pick it commits to.
    ///
    /// With `account_id` set, the proof must also be bound to that account;
    /// a bundle copied from another account's bet does not verify.
    pub fn verify_outcome(
        &self,
        game: GameType,
        bundle: &VrfBundle,
        account_id: Option<&str>,
    ) -> SettlementResult<Verification> {
        let bound_to_account = account_id
            .map(|account| bundle.input_message.starts_with(&format!("{}:", account)))
            .unwrap_or(true);

        let choices = game.choices();
        let draw = verify_draw(bundle, choices.len() as u32)?;
        let verification = match draw {
            Some(index) if bound_to_account => Verification {
                valid: true,
                revealed_value: choices.get(index as usize).copied(),
            },
            _ => Verification {
                valid: false,
                revealed_value: None,
            },
        };

        debug!(%game, valid = verification.valid, bound_to_account, "Outcome proof checked");
        Ok(verification)
    }

    pub(crate) fn reject(&self, account_id: &str, err: &SettlementError) {
        self.metrics.record_rejection(err.code());
        warn!(account_id, code = err.code(), error = %err, "Request rejected");
    }
}

fn transition(request: &BetRequest, state: BetState) {
    debug!(
        request_id = %request.request_id,
        account_id = %request.account_id,
        %state,
        "Bet state"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::random::{ScriptedRandom, SeededRandom};
    use crate::games::types::Classification;
    use crate::games::vrf_engine::VrfRandom;

    fn orchestrator(script: Vec<u32>) -> SettlementOrchestrator {
        SettlementOrchestrator::new(LedgerConfig::default(), Arc::new(ScriptedRandom::new(script)))
    }

    fn bet(request_id: &str, game: GameType, choice: Choice, wager: Credits) -> BetRequest {
        BetRequest {
            account_id: "alice".to_string(),
            game,
            choice,
            wager_amount: wager,
            request_id: request_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_place_bet_records_treasury() {
        // 0 = heads
        let orchestrator = orchestrator(vec![0]);
        orchestrator
            .transact("alice", TransactionKind::Deposit, 1000)
            .unwrap();

        let receipt = orchestrator
            .place_bet(bet("r1", GameType::CoinFlip, Choice::Heads, 100))
            .await
            .unwrap();
        assert_eq!(receipt.outcome.classification, Classification::Win);
        assert_eq!(receipt.balance, 1096);

        let stats = orchestrator.treasury_stats();
        assert_eq!(stats.counters.total_bets, 1);
        assert_eq!(stats.counters.total_won, 96);
        assert_eq!(stats.counters.total_balance, 1096);
        assert_eq!(stats.parameters.max_bet, 10_000);
        assert_eq!(orchestrator.metrics().bets_placed(), 1);
    }

    #[tokio::test]
    async fn test_replay_returns_prior_without_resolving_again() {
        // Second draw would lose if the bet were resolved again
        let orchestrator = orchestrator(vec![0, 1]);
        orchestrator
            .transact("alice", TransactionKind::Deposit, 1000)
            .unwrap();

        let first = orchestrator
            .place_bet(bet("r1", GameType::CoinFlip, Choice::Heads, 100))
            .await
            .unwrap();
        let replay = orchestrator
            .place_bet(bet("r1", GameType::CoinFlip, Choice::Heads, 100))
            .await
            .unwrap();

        assert!(replay.replayed);
        assert_eq!(replay.outcome, first.outcome);
        assert_eq!(orchestrator.ledger().balance("alice"), 1096);
        assert_eq!(orchestrator.treasury_stats().counters.total_bets, 1);
        assert_eq!(orchestrator.metrics().replays(), 1);
    }

    #[tokio::test]
    async fn test_invalid_choice_rejected_before_resolution() {
        let orchestrator = orchestrator(vec![0]);
        orchestrator
            .transact("alice", TransactionKind::Deposit, 1000)
            .unwrap();

        let err = orchestrator
            .place_bet(bet("r1", GameType::CoinFlip, Choice::Rock, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidChoice { .. }));
        assert_eq!(orchestrator.metrics().rejections("INVALID_CHOICE"), 1);
        assert_eq!(orchestrator.ledger().balance("alice"), 1000);
    }

    #[tokio::test]
    async fn test_busy_treasury_parks_then_reconciles() {
        let config = LedgerConfig {
            aggregator_retry_attempts: 2,
            aggregator_retry_backoff_ms: 1,
            ..LedgerConfig::default()
        };
        let orchestrator = SettlementOrchestrator::new(config, Arc::new(SeededRandom::new(3)));
        orchestrator
            .transact("alice", TransactionKind::Deposit, 1000)
            .unwrap();

        let treasury = orchestrator.treasury().clone();
        let (hold_tx, hold_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
        let holder = std::thread::spawn(move || {
            treasury.with_counters_held(|| {
                ready_tx.send(()).unwrap();
                hold_rx.recv().unwrap();
            });
        });
        ready_rx.recv().unwrap();

        let receipt = orchestrator
            .place_bet(bet("r1", GameType::RockPaperScissors, Choice::Rock, 100))
            .await
            .unwrap();
        assert_eq!(orchestrator.treasury().parked_count(), 1);

        hold_tx.send(()).unwrap();
        holder.join().unwrap();

        let stats = orchestrator.treasury_stats();
        assert_eq!(stats.counters.total_bets, 1);
        assert_eq!(stats.counters.total_balance, i128::from(receipt.balance));
        assert_eq!(orchestrator.treasury().parked_count(), 0);
    }

    #[test]
    fn test_verify_outcome_with_vrf_source() {
        let orchestrator = SettlementOrchestrator::new(
            LedgerConfig::default(),
            Arc::new(VrfRandom::new_random()),
        );
        let resolution = orchestrator
            .resolver
            .resolve(GameType::RockPaperScissors, Choice::Paper, "alice", "r1")
            .unwrap();
        let mut bundle = resolution.proof.unwrap();

        let verified = orchestrator
            .verify_outcome(GameType::RockPaperScissors, &bundle, Some("alice"))
            .unwrap();
        assert!(verified.valid);
        assert_eq!(verified.revealed_value, Some(resolution.revealed));

        let other_account = orchestrator
            .verify_outcome(GameType::RockPaperScissors, &bundle, Some("mallory"))
            .unwrap();
        assert!(!other_account.valid);

        // Same request replayed under another account must not verify
        bundle.input_message = "mallory:r1:rock-paper-scissors:paper".to_string();
        let tampered = orchestrator
            .verify_outcome(GameType::RockPaperScissors, &bundle, None)
            .unwrap();
        assert!(!tampered.valid);
    }

    #[test]
    fn test_account_opened_with_initial_balance() {
        let config = LedgerConfig {
            initial_balance: 1000,
            ..LedgerConfig::default()
        };
        let orchestrator = SettlementOrchestrator::new(config, Arc::new(SeededRandom::new(1)));
        let account = orchestrator.account("alice");
        assert_eq!(account.balance, 1000);
        assert_eq!(orchestrator.treasury_stats().counters.total_balance, 1000);
        assert_eq!(orchestrator.treasury_stats().accounts, 1);
    }
}
