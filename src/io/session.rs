//! Running a game as a suspend/resume state machine.
//!
//! `Session::start` moves a `Game` onto its own thread. Whenever the game
//! needs a decision it parks that thread and hands a `Suspension` to the
//! caller; `resume` wakes it with the answer. With `forward_random` the
//! random source is answered the same way, so two peers can agree on
//! values with whatever protocol they like.
//!
//! ```no_run
//! # use cu_rules::game::Game;
//! use cu_rules::io::request::Response;
//! use cu_rules::io::session::{Resume, Session, Suspension};
//!
//! # fn play(game: Game) -> Result<(), cu_rules::core::EngineError> {
//! let mut session = Session::start(game, false);
//! loop {
//!     match session.next()? {
//!         Suspension::Requests { .. } => session.resume(Resume::Response(Response::Pass))?,
//!         Suspension::Finished { result, .. } => {
//!             println!("{}", result?);
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::core::random::check_ranges;
use crate::core::{EngineError, GameState, RandomSource};
use crate::game::Game;
use crate::rules::GameResult;

use super::driver::Driver;
use super::event::Event;
use super::replay::ReplayLog;
use super::request::{Request, Response};

/// What the game is waiting for, or what it has to report.
#[derive(Debug)]
pub enum Suspension {
    /// Answer one of these with `Resume::Response`.
    Requests {
        requests: Vec<Request>,
        state: Box<GameState>,
    },
    /// Answer with `Resume::Random`, one value per range.
    Random { ranges: Vec<u32> },
    /// Needs no answer.
    Events(Vec<Event>),
    Finished {
        result: Result<GameResult, EngineError>,
        log: ReplayLog,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resume {
    Response(Response),
    Random(Vec<u32>),
}

/// The game thread's end of the channels, shared by driver and random
/// source.
struct Link {
    to_caller: Sender<Suspension>,
    from_caller: Receiver<Resume>,
}

impl Link {
    fn send(&self, suspension: Suspension) -> Result<(), EngineError> {
        self.to_caller
            .send(suspension)
            .map_err(|_| EngineError::Disconnected)
    }

    fn wait(&self) -> Result<Resume, EngineError> {
        self.from_caller.recv().map_err(|_| EngineError::Disconnected)
    }
}

type SharedLink = Arc<Mutex<Link>>;

fn lock(link: &SharedLink) -> Result<std::sync::MutexGuard<'_, Link>, EngineError> {
    link.lock().map_err(|_| EngineError::Disconnected)
}

struct ChannelDriver {
    link: SharedLink,
}

impl Driver for ChannelDriver {
    fn respond(&mut self, requests: &[Request], state: &GameState) -> Result<Response, EngineError> {
        let link = lock(&self.link)?;
        link.send(Suspension::Requests {
            requests: requests.to_vec(),
            state: Box::new(state.clone()),
        })?;
        match link.wait()? {
            Resume::Response(response) => Ok(response),
            Resume::Random(_) => Err(EngineError::NoResponse(
                "random values sent while a response was expected".into(),
            )),
        }
    }

    fn notify(&mut self, events: &[Event]) {
        let sent = lock(&self.link).and_then(|link| link.send(Suspension::Events(events.to_vec())));
        if sent.is_err() {
            warn!(events = events.len(), "events dropped, caller is gone");
        }
    }
}

struct ChannelRandom {
    link: SharedLink,
}

impl RandomSource for ChannelRandom {
    fn next_ints(&mut self, ranges: &[u32]) -> Result<Vec<u32>, EngineError> {
        let link = lock(&self.link)?;
        link.send(Suspension::Random {
            ranges: ranges.to_vec(),
        })?;
        match link.wait()? {
            Resume::Random(values) => {
                check_ranges(ranges, &values)?;
                Ok(values)
            }
            Resume::Response(_) => Err(EngineError::RandomExhausted),
        }
    }
}

/// A game running on its own thread.
pub struct Session {
    from_game: Receiver<Suspension>,
    to_game: Option<Sender<Resume>>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
}

impl Session {
    /// Start `game` on a new thread.
    ///
    /// The game's driver is replaced by this session; with
    /// `forward_random` its random source is as well.
    #[must_use]
    pub fn start(mut game: Game, forward_random: bool) -> Self {
        let (to_caller, from_game) = channel();
        let (to_game, from_caller) = channel();
        let link = Arc::new(Mutex::new(Link {
            to_caller: to_caller.clone(),
            from_caller,
        }));
        game.replace_driver(Box::new(ChannelDriver { link: link.clone() }));
        if forward_random {
            game.replace_random(Box::new(ChannelRandom { link }));
        }
        let handle = std::thread::spawn(move || {
            let result = game.run();
            debug!(ok = result.is_ok(), "session game finished");
            let log = game.log().clone();
            // the caller may already be gone
            let _ = to_caller.send(Suspension::Finished { result, log });
        });
        Self {
            from_game,
            to_game: Some(to_game),
            handle: Some(handle),
            finished: false,
        }
    }

    /// Wait for the game's next suspension.
    pub fn next(&mut self) -> Result<Suspension, EngineError> {
        if self.finished {
            return Err(EngineError::Disconnected);
        }
        let suspension = self.from_game.recv().map_err(|_| EngineError::Disconnected)?;
        if matches!(suspension, Suspension::Finished { .. }) {
            self.finished = true;
        }
        Ok(suspension)
    }

    /// Answer the pending request or random suspension.
    pub fn resume(&mut self, resume: Resume) -> Result<(), EngineError> {
        self.to_game
            .as_ref()
            .ok_or(EngineError::Disconnected)?
            .send(resume)
            .map_err(|_| EngineError::Disconnected)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // a parked game wakes up disconnected and ends
        self.to_game = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("session thread panicked");
            }
        }
    }
}
