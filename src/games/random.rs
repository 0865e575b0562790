//! Random draw sources for the outcome resolver
//!
//! The resolver only needs one capability: a uniform draw from `0..bound`.
//! Sources may bind the draw to a caller-supplied input and attach a proof.

use crate::errors::RandomnessError;
use crate::games::types::VrfBundle;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A single uniform draw, optionally with a proof of how it was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub value: u32,
    pub proof: Option<VrfBundle>,
}

impl Draw {
    pub fn unproven(value: u32) -> Self {
        Self { value, proof: None }
    }
}

/// Single random-draw capability used by the resolver
pub trait RandomSource: Send + Sync {
    /// Draw uniformly from `0..bound`. `input` identifies the draw
    /// (request id, game, choice); sources may ignore it.
    fn draw(&self, input: &str, bound: u32) -> Result<Draw, RandomnessError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Operating system entropy, unpredictable and unseeded
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn draw(&self, _input: &str, bound: u32) -> Result<Draw, RandomnessError> {
        check_bound(bound)?;
        Ok(Draw::unproven(OsRng.gen_range(0..bound)))
    }

    fn name(&self) -> &'static str {
        "os"
    }
}

/// Reproducible generator for simulations and audits
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn draw(&self, _input: &str, bound: u32) -> Result<Draw, RandomnessError> {
        check_bound(bound)?;
        // A poisoned generator is still a valid generator
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(Draw::unproven(rng.gen_range(0..bound)))
    }

    fn name(&self) -> &'static str {
        "seeded"
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted
pub struct ScriptedRandom {
    script: Vec<u32>,
    cursor: Mutex<VecDeque<u32>>,
}

impl ScriptedRandom {
    pub fn new(script: Vec<u32>) -> Self {
        Self {
            cursor: Mutex::new(script.iter().copied().collect()),
            script,
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn draw(&self, _input: &str, bound: u32) -> Result<Draw, RandomnessError> {
        check_bound(bound)?;
        let mut cursor = self.cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if cursor.is_empty() {
            cursor.extend(self.script.iter().copied());
        }
        let next = cursor.pop_front().unwrap_or(0);
        Ok(Draw::unproven(next % bound))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub(crate) fn check_bound(bound: u32) -> Result<(), RandomnessError> {
    if bound == 0 {
        return Err(RandomnessError::EmptyRange(bound));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_random_in_range() {
        let source = OsRandom;
        for _ in 0..200 {
            let draw = source.draw("any", 3).unwrap();
            assert!(draw.value < 3);
            assert!(draw.proof.is_none());
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = SeededRandom::new(42);
        let b = SeededRandom::new(42);
        let seq_a: Vec<u32> = (0..20).map(|_| a.draw("", 3).unwrap().value).collect();
        let seq_b: Vec<u32> = (0..20).map(|_| b.draw("", 3).unwrap().value).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_scripted_cycles() {
        let source = ScriptedRandom::new(vec![0, 1, 5]);
        let values: Vec<u32> = (0..5).map(|_| source.draw("", 2).unwrap().value).collect();
        assert_eq!(values, vec![0, 1, 1, 0, 1]);
    }

    #[test]
    fn test_zero_bound_rejected() {
        assert!(matches!(
            OsRandom.draw("", 0),
            Err(RandomnessError::EmptyRange(0))
        ));
    }
}
