//! Replay log: every response and every random answer of a match, in order.
//!
//! Starting from the same decks and partners, feeding the log back through
//! `driver()` and `random()` reproduces the match exactly.

use std::collections::VecDeque;

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::core::{EngineError, GameState, ScriptedRandom};

use super::driver::Driver;
use super::request::{Request, Response};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayEntry {
    Response(Response),
    Random(Vec<u32>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayLog {
    entries: Vector<ReplayEntry>,
}

impl ReplayLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_response(&mut self, response: Response) {
        self.entries.push_back(ReplayEntry::Response(response));
    }

    pub fn record_random(&mut self, values: Vec<u32>) {
        self.entries.push_back(ReplayEntry::Random(values));
    }

    #[must_use]
    pub fn entries(&self) -> &Vector<ReplayEntry> {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.entries.iter().filter_map(|entry| match entry {
            ReplayEntry::Response(response) => Some(response),
            ReplayEntry::Random(_) => None,
        })
    }

    /// A driver answering with the logged responses.
    #[must_use]
    pub fn driver(&self) -> ReplayDriver {
        ReplayDriver {
            responses: self.responses().cloned().collect(),
        }
    }

    /// A random source answering with the logged values.
    #[must_use]
    pub fn random(&self) -> ScriptedRandom {
        ScriptedRandom::new(
            self.entries
                .iter()
                .filter_map(|entry| match entry {
                    ReplayEntry::Random(values) => Some(values.iter().copied()),
                    ReplayEntry::Response(_) => None,
                })
                .flatten()
                .collect::<Vec<_>>(),
        )
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        bincode::serialize(self).map_err(|e| EngineError::Invariant(format!("replay encode: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        bincode::deserialize(bytes).map_err(|e| EngineError::Setup(format!("replay decode: {e}")))
    }
}

/// Plays back logged responses; runs dry with `NoResponse`.
#[derive(Clone, Debug)]
pub struct ReplayDriver {
    responses: VecDeque<Response>,
}

impl Driver for ReplayDriver {
    fn respond(&mut self, requests: &[Request], _state: &GameState) -> Result<Response, EngineError> {
        self.responses.pop_front().ok_or_else(|| {
            EngineError::NoResponse(
                requests
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RandomSource;

    fn log() -> ReplayLog {
        let mut log = ReplayLog::new();
        log.record_random(vec![1]);
        log.record_response(Response::Pass);
        log.record_random(vec![3, 0]);
        log.record_response(Response::EnterBattlePhase(true));
        log
    }

    #[test]
    fn test_bincode_round_trip() {
        let log = log();
        let bytes = log.to_bytes().unwrap();
        assert_eq!(ReplayLog::from_bytes(&bytes).unwrap(), log);
    }

    #[test]
    fn test_random_values_are_flattened() {
        let mut random = log().random();
        assert_eq!(random.next_ints(&[2, 4, 1]).unwrap(), vec![1, 3, 0]);
        assert_eq!(random.remaining(), 0);
    }

    #[test]
    fn test_responses_skip_random_entries() {
        let log = log();
        let responses: Vec<_> = log.responses().cloned().collect();
        assert_eq!(
            responses,
            vec![Response::Pass, Response::EnterBattlePhase(true)]
        );
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_garbage_does_not_decode() {
        assert!(ReplayLog::from_bytes(&[0xff; 3]).is_err());
    }
}
