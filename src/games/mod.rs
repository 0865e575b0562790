pub mod types;
pub mod random;
pub mod vrf_engine;
pub mod resolver;
pub mod payout;

pub use types::*;
pub use random::{OsRandom, RandomSource, ScriptedRandom, SeededRandom};
pub use vrf_engine::VrfRandom;
pub use resolver::OutcomeResolver;
pub use payout::{Payout, PayoutCalculator};
