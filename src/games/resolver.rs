//! Outcome resolver
//!
//! Draws the house pick for a game and classifies the player's choice
//! against it. Holds no mutable state of its own; all randomness comes from
//! the injected `RandomSource`.

use crate::errors::{SettlementError, SettlementResult};
use crate::games::random::RandomSource;
use crate::games::types::{Choice, Classification, GameType, Resolution};
use std::sync::Arc;

pub struct OutcomeResolver {
    source: Arc<dyn RandomSource>,
}

impl OutcomeResolver {
    pub fn new(source: Arc<dyn RandomSource>) -> Self {
        Self { source }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Resolve one bet. Verifiable draws are bound to the account and the
    /// request, so the same request id on another account draws afresh.
    pub fn resolve(
        &self,
        game: GameType,
        player_choice: Choice,
        account_id: &str,
        request_id: &str,
    ) -> SettlementResult<Resolution> {
        if !game.accepts(player_choice) {
            return Err(SettlementError::InvalidChoice {
                game,
                choice: player_choice.to_string(),
            });
        }

        let house_choices = game.choices();
        let input = draw_input(account_id, request_id, game, player_choice);
        let draw = self.source.draw(&input, house_choices.len() as u32)?;
        let revealed = house_choices[draw.value as usize % house_choices.len()];

        Ok(Resolution {
            revealed,
            classification: classify(game, player_choice, revealed),
            proof: draw.proof,
        })
    }
}

/// Message a draw is bound to: `<account>:<request>:<game>:<choice>`
pub fn draw_input(account_id: &str, request_id: &str, game: GameType, choice: Choice) -> String {
    format!("{}:{}:{}:{}", account_id, request_id, game, choice)
}

/// Classify a player choice against the house pick
pub fn classify(game: GameType, player: Choice, house: Choice) -> Classification {
    match game {
        GameType::RockPaperScissors => {
            if player == house {
                Classification::Draw
            } else if player.beats(house) {
                Classification::Win
            } else {
                Classification::Lose
            }
        }
        GameType::CoinFlip => {
            if player == house {
                Classification::Win
            } else {
                Classification::Lose
            }
        }
    }
}
