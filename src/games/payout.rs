//! Payout calculator
//!
//! Turns a wager and a classification into the signed balance delta and the
//! house fee. Uses exact decimal arithmetic with a single rounding step on
//! the final payout (half away from zero).

use crate::errors::{SettlementError, SettlementResult};
use crate::games::types::{Classification, Credits};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Settlement of one bet relative to the balance before the wager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    /// Net signed change to the player's balance
    pub delta: Credits,
    /// Fee retained by the house (wins only)
    pub house_fee: Credits,
}

#[derive(Debug, Clone, Copy)]
pub struct PayoutCalculator {
    fee_rate: Decimal,
    win_multiplier: Decimal,
}

impl PayoutCalculator {
    pub fn new(fee_rate: Decimal, win_multiplier: Decimal) -> Self {
        Self {
            fee_rate,
            win_multiplier,
        }
    }

    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    pub fn win_multiplier(&self) -> Decimal {
        self.win_multiplier
    }

    pub fn settle(&self, wager: Credits, classification: Classification) -> SettlementResult<Payout> {
        settle(wager, classification, self.fee_rate, self.win_multiplier)
    }
}

/// Compute `(delta, house_fee)` for a bet.
///
/// Win: `gross = round(wager * multiplier)`, `payout = round(gross * (1 - fee_rate))`,
/// `house_fee = gross - payout`, `delta = payout - wager`.
/// Lose: `delta = -wager`. Draw: `delta = 0`.
pub fn settle(
    wager: Credits,
    classification: Classification,
    fee_rate: Decimal,
    win_multiplier: Decimal,
) -> SettlementResult<Payout> {
    if wager <= 0 {
        return Err(SettlementError::InvalidWager { wager });
    }

    match classification {
        Classification::Lose => Ok(Payout {
            delta: -wager,
            house_fee: 0,
        }),
        Classification::Draw => Ok(Payout {
            delta: 0,
            house_fee: 0,
        }),
        Classification::Win => {
            let gross = Decimal::from(wager)
                .checked_mul(win_multiplier)
                .map(round_credit)
                .ok_or(SettlementError::InvalidWager { wager })?;
            let payout = gross
                .checked_mul(Decimal::ONE - fee_rate)
                .map(round_credit)
                .ok_or(SettlementError::InvalidWager { wager })?;

            let gross = to_credits(gross, wager)?;
            let payout = to_credits(payout, wager)?;

            Ok(Payout {
                delta: payout - wager,
                house_fee: gross - payout,
            })
        }
    }
}

fn round_credit(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn to_credits(value: Decimal, wager: Credits) -> SettlementResult<Credits> {
    value.to_i64().ok_or(SettlementError::InvalidWager { wager })
}
