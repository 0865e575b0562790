//! Settlement counters exported in Prometheus text format

use crate::games::types::Classification;
use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct SettlementMetrics {
    start_time: Instant,
    bets_placed: AtomicU64,
    wins: AtomicU64,
    losses: AtomicU64,
    draws: AtomicU64,
    replays: AtomicU64,
    transactions: AtomicU64,
    aggregator_retries: AtomicU64,
    aggregator_parked: AtomicU64,
    rejections: DashMap<&'static str, u64>,
}

impl SettlementMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            bets_placed: AtomicU64::new(0),
            wins: AtomicU64::new(0),
            losses: AtomicU64::new(0),
            draws: AtomicU64::new(0),
            replays: AtomicU64::new(0),
            transactions: AtomicU64::new(0),
            aggregator_retries: AtomicU64::new(0),
            aggregator_parked: AtomicU64::new(0),
            rejections: DashMap::new(),
        }
    }

    pub fn record_bet(&self, classification: Classification) {
        self.bets_placed.fetch_add(1, Ordering::Relaxed);
        let counter = match classification {
            Classification::Win => &self.wins,
            Classification::Lose => &self.losses,
            Classification::Draw => &self.draws,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replay(&self) {
        self.replays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transaction(&self) {
        self.transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, code: &'static str) {
        *self.rejections.entry(code).or_insert(0) += 1;
    }

    pub fn record_aggregator_retry(&self) {
        self.aggregator_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aggregator_parked(&self) {
        self.aggregator_parked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bets_placed(&self) -> u64 {
        self.bets_placed.load(Ordering::Relaxed)
    }

    pub fn replays(&self) -> u64 {
        self.replays.load(Ordering::Relaxed)
    }

    pub fn rejections(&self, code: &str) -> u64 {
        self.rejections.get(code).map(|count| *count).unwrap_or(0)
    }

    /// Render all counters for a `/metrics` scrape
    pub fn to_prometheus_format(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# HELP bet_ledger_uptime_seconds Process uptime");
        let _ = writeln!(out, "# TYPE bet_ledger_uptime_seconds gauge");
        let _ = writeln!(
            out,
            "bet_ledger_uptime_seconds {}",
            self.start_time.elapsed().as_secs()
        );

        let _ = writeln!(out, "# HELP bet_ledger_bets_total Settled bets by classification");
        let _ = writeln!(out, "# TYPE bet_ledger_bets_total counter");
        for (label, counter) in [("win", &self.wins), ("lose", &self.losses), ("draw", &self.draws)] {
            let _ = writeln!(
                out,
                "bet_ledger_bets_total{{classification=\"{}\"}} {}",
                label,
                counter.load(Ordering::Relaxed)
            );
        }

        let simple = [
            ("bet_ledger_replays_total", "Idempotent bet replays", &self.replays),
            ("bet_ledger_transactions_total", "Deposits and withdrawals", &self.transactions),
            ("bet_ledger_aggregator_retries_total", "Treasury record retries", &self.aggregator_retries),
            ("bet_ledger_aggregator_parked_total", "Treasury events deferred to reconciliation", &self.aggregator_parked),
        ];
        for (name, help, counter) in simple {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.load(Ordering::Relaxed));
        }

        let _ = writeln!(out, "# HELP bet_ledger_rejections_total Rejected requests by error code");
        let _ = writeln!(out, "# TYPE bet_ledger_rejections_total counter");
        let mut rejections: Vec<(&'static str, u64)> =
            self.rejections.iter().map(|entry| (*entry.key(), *entry.value())).collect();
        rejections.sort_unstable();
        for (code, count) in rejections {
            let _ = writeln!(out, "bet_ledger_rejections_total{{code=\"{}\"}} {}", code, count);
        }

        out
    }
}

impl Default for SettlementMetrics {
    fn default() -> Self {
        Self::new()
    }
}
