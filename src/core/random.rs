//! Random number sources.
//!
//! The engine never rolls dice on its own. Shuffles and random choices ask a
//! `RandomSource` for integers in given ranges; the answers are logged so a
//! match can be replayed.
//!
//! - `SeededRandom`: local ChaCha8 source, serializable state.
//! - `ScriptedRandom`: answers from a fixed queue (tests and replays).
//!
//! ```
//! use cu_rules::core::{RandomSource, ScriptedRandom};
//!
//! let mut random = ScriptedRandom::new([2, 0]);
//! assert_eq!(random.next_ints(&[3, 1]).unwrap(), vec![2, 0]);
//! assert!(random.next_int(5).is_err());
//! ```

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Source of integers in `[0, range)`.
///
/// Implementations may block, for example while two peers agree on a value.
pub trait RandomSource: Send {
    /// One integer per entry of `ranges`, each in `[0, range)`.
    fn next_ints(&mut self, ranges: &[u32]) -> Result<Vec<u32>, EngineError>;

    fn next_int(&mut self, range: u32) -> Result<u32, EngineError> {
        self.next_ints(&[range])?
            .into_iter()
            .next()
            .ok_or(EngineError::RandomExhausted)
    }
}

/// Checks a batch of answers against the ranges they were asked for.
pub fn check_ranges(ranges: &[u32], values: &[u32]) -> Result<(), EngineError> {
    if ranges.len() != values.len() {
        return Err(EngineError::RandomExhausted);
    }
    for (&range, &value) in ranges.iter().zip(values) {
        if value >= range.max(1) {
            return Err(EngineError::RandomOutOfRange { value, range });
        }
    }
    Ok(())
}

/// Deterministic local source.
///
/// Uses ChaCha8 so the same seed yields the same match on every platform.
#[derive(Clone, Debug)]
pub struct SeededRandom {
    inner: ChaCha8Rng,
    seed: u64,
}

impl SeededRandom {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Get the current state for serialization.
    #[must_use]
    pub fn state(&self) -> SeededRandomState {
        SeededRandomState {
            seed: self.seed,
            word_pos: self.inner.get_word_pos(),
        }
    }

    /// Restore from a saved state.
    #[must_use]
    pub fn from_state(state: &SeededRandomState) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(state.seed);
        inner.set_word_pos(state.word_pos);
        Self {
            inner,
            seed: state.seed,
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_ints(&mut self, ranges: &[u32]) -> Result<Vec<u32>, EngineError> {
        Ok(ranges
            .iter()
            .map(|&range| self.inner.gen_range(0..range.max(1)))
            .collect())
    }
}

/// Serializable state of a `SeededRandom`.
///
/// The ChaCha8 word position makes capture O(1) however many numbers have
/// been drawn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRandomState {
    pub seed: u64,
    pub word_pos: u128,
}

/// Source that hands out a predetermined sequence.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRandom {
    values: VecDeque<u32>,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    pub fn push(&mut self, values: impl IntoIterator<Item = u32>) {
        self.values.extend(values);
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl RandomSource for ScriptedRandom {
    fn next_ints(&mut self, ranges: &[u32]) -> Result<Vec<u32>, EngineError> {
        if self.values.len() < ranges.len() {
            return Err(EngineError::RandomExhausted);
        }
        let values: Vec<u32> = self.values.drain(..ranges.len()).collect();
        check_ranges(ranges, &values)?;
        Ok(values)
    }
}
