use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer amount of credits. Signed so settlement deltas and rejected
/// negative inputs can be represented.
pub type Credits = i64;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GameType {
    RockPaperScissors,
    CoinFlip,
}

impl GameType {
    /// The set of choices a player (and the house) may pick from
    pub fn choices(&self) -> &'static [Choice] {
        match self {
            GameType::RockPaperScissors => &[Choice::Rock, Choice::Paper, Choice::Scissors],
            GameType::CoinFlip => &[Choice::Heads, Choice::Tails],
        }
    }

    pub fn accepts(&self, choice: Choice) -> bool {
        self.choices().contains(&choice)
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::RockPaperScissors => write!(f, "rock-paper-scissors"),
            GameType::CoinFlip => write!(f, "coin-flip"),
        }
    }
}

/// A pick made by the player or revealed by the house
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
    Heads,
    Tails,
}

impl Choice {
    /// Parse a case-insensitive choice name
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rock" => Some(Choice::Rock),
            "paper" => Some(Choice::Paper),
            "scissors" => Some(Choice::Scissors),
            "heads" => Some(Choice::Heads),
            "tails" => Some(Choice::Tails),
            _ => None,
        }
    }

    /// Cyclic rock-paper-scissors rule; coin faces beat nothing
    pub fn beats(&self, other: Choice) -> bool {
        matches!(
            (self, other),
            (Choice::Rock, Choice::Scissors)
                | (Choice::Paper, Choice::Rock)
                | (Choice::Scissors, Choice::Paper)
        )
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Rock => write!(f, "rock"),
            Choice::Paper => write!(f, "paper"),
            Choice::Scissors => write!(f, "scissors"),
            Choice::Heads => write!(f, "heads"),
            Choice::Tails => write!(f, "tails"),
        }
    }
}

/// Result of a bet from the player's point of view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Win,
    Lose,
    Draw,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Win => write!(f, "win"),
            Classification::Lose => write!(f, "lose"),
            Classification::Draw => write!(f, "draw"),
        }
    }
}

/// VRF bundle containing cryptographic proof
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VrfBundle {
    /// Hex-encoded VRF pre-output (32 bytes)
    pub vrf_output: String,
    /// Hex-encoded VRF proof (64 bytes)
    pub vrf_proof: String,
    /// Hex-encoded public key (32 bytes)
    pub public_key: String,
    /// Input message the draw was bound to
    pub input_message: String,
}

/// What the outcome resolver produced for one bet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub revealed: Choice,
    pub classification: Classification,
    pub proof: Option<VrfBundle>,
}

/// Request to place a wager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    pub account_id: String,
    pub game: GameType,
    pub choice: Choice,
    pub wager_amount: Credits,
    /// Client-supplied idempotency key
    pub request_id: String,
}

/// Settled bet, created once per accepted request and never mutated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetOutcome {
    pub request_id: String,
    pub account_id: String,
    pub game: GameType,
    pub player_choice: Choice,
    pub classification: Classification,
    pub revealed_value: Choice,
    pub wager_amount: Credits,
    /// Net signed change to the balance
    pub settlement_amount: Credits,
    pub house_fee: Credits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<VrfBundle>,
    pub created_at: DateTime<Utc>,
}

/// Outcome plus the balance it left behind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetReceipt {
    pub outcome: BetOutcome,
    pub balance: Credits,
    /// Set when this receipt answers a replayed request id
    #[serde(default)]
    pub replayed: bool,
}

/// Direct balance movements that bypass the games
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "deposit"),
            TransactionKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rps_cycle() {
        assert!(Choice::Rock.beats(Choice::Scissors));
        assert!(Choice::Paper.beats(Choice::Rock));
        assert!(Choice::Scissors.beats(Choice::Paper));
        assert!(!Choice::Rock.beats(Choice::Paper));
        assert!(!Choice::Rock.beats(Choice::Rock));
        assert!(!Choice::Heads.beats(Choice::Tails));
    }

    #[test]
    fn test_game_choice_sets() {
        assert!(GameType::CoinFlip.accepts(Choice::Heads));
        assert!(!GameType::CoinFlip.accepts(Choice::Rock));
        assert!(GameType::RockPaperScissors.accepts(Choice::Scissors));
        assert!(!GameType::RockPaperScissors.accepts(Choice::Tails));
    }

    #[test]
    fn test_choice_parse() {
        assert_eq!(Choice::parse(" Heads "), Some(Choice::Heads));
        assert_eq!(Choice::parse("PAPER"), Some(Choice::Paper));
        assert_eq!(Choice::parse("lizard"), None);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&GameType::RockPaperScissors).unwrap();
        assert_eq!(json, "\"rock-paper-scissors\"");
        let game: GameType = serde_json::from_str("\"coin-flip\"").unwrap();
        assert_eq!(game, GameType::CoinFlip);
        assert_eq!(serde_json::to_string(&Classification::Draw).unwrap(), "\"draw\"");
    }
}
