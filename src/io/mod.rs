//! Everything that crosses the engine boundary.
//!
//! - `request`: decisions the engine asks for and the responses to them
//! - `event`: records of what happened
//! - `driver`: who answers requests
//! - `replay`: the log that reproduces a match
//! - `session`: a game on its own thread, driven by suspend and resume

pub mod driver;
pub mod event;
pub mod replay;
pub mod request;
pub mod session;

pub use driver::{Driver, ScriptedDriver};
pub use event::Event;
pub use replay::{ReplayDriver, ReplayEntry, ReplayLog};
pub use request::{AbilityOption, ChoiceReason, Request, RequestKind, Response};
pub use session::{Resume, Session, Suspension};
