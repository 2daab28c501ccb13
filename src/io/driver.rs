//! Drivers: whoever answers the engine's requests.
//!
//! The engine calls `respond` with a batch of requests and blocks until a
//! response comes back; a UI, an AI or a network peer sits behind it.
//! `notify` receives every event batch before the next request.

use std::collections::VecDeque;

use tracing::trace;

use crate::core::{EngineError, GameState};

use super::event::Event;
use super::request::{valid_responses, Request, RequestKind, Response};

/// Answers requests on behalf of both players.
pub trait Driver: Send {
    /// Pick a response to one request of `requests`.
    fn respond(&mut self, requests: &[Request], state: &GameState) -> Result<Response, EngineError>;

    /// Events that happened since the last call.
    fn notify(&mut self, _events: &[Event]) {}
}

/// Answers from a queue of prepared responses.
///
/// In auto mode an empty queue is not an error: the driver passes when it
/// may and otherwise picks the first valid response.
///
/// ```
/// use std::sync::Arc;
/// use cu_rules::cards::CardRegistry;
/// use cu_rules::core::{GameState, PlayerId, RulesConfig};
/// use cu_rules::io::driver::{Driver, ScriptedDriver};
/// use cu_rules::io::request::{Request, RequestKind, Response};
///
/// let state = GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()));
/// let requests = [Request::new(PlayerId::new(0), RequestKind::Pass)];
///
/// let mut driver = ScriptedDriver::new([Response::Pass]);
/// assert_eq!(driver.respond(&requests, &state).unwrap(), Response::Pass);
/// assert!(driver.respond(&requests, &state).is_err());
///
/// let mut auto = ScriptedDriver::auto();
/// assert_eq!(auto.respond(&requests, &state).unwrap(), Response::Pass);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ScriptedDriver {
    queue: VecDeque<Response>,
    auto: bool,
    answered: usize,
}

impl ScriptedDriver {
    pub fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        Self {
            queue: responses.into_iter().collect(),
            auto: false,
            answered: 0,
        }
    }

    /// A driver that fills in for an empty queue.
    #[must_use]
    pub fn auto() -> Self {
        Self {
            auto: true,
            ..Self::default()
        }
    }

    /// Queue responses, then fall back to auto mode.
    pub fn then_auto(responses: impl IntoIterator<Item = Response>) -> Self {
        Self {
            auto: true,
            ..Self::new(responses)
        }
    }

    pub fn push(&mut self, response: Response) {
        self.queue.push_back(response);
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Number of requests answered so far.
    #[must_use]
    pub fn answered(&self) -> usize {
        self.answered
    }

    fn fallback(requests: &[Request], state: &GameState) -> Option<Response> {
        if requests.iter().any(|r| r.kind == RequestKind::Pass) {
            return Some(Response::Pass);
        }
        requests
            .iter()
            .find_map(|request| valid_responses(request, Some(state)).into_iter().next())
    }
}

impl Driver for ScriptedDriver {
    fn respond(&mut self, requests: &[Request], state: &GameState) -> Result<Response, EngineError> {
        let response = match self.queue.pop_front() {
            Some(response) => response,
            None if self.auto => Self::fallback(requests, state).ok_or_else(|| describe(requests))?,
            None => return Err(describe(requests)),
        };
        self.answered += 1;
        trace!(response = response.as_str(), "scripted response");
        Ok(response)
    }
}

fn describe(requests: &[Request]) -> EngineError {
    let names: Vec<String> = requests.iter().map(ToString::to_string).collect();
    EngineError::NoResponse(names.join("; "))
}
