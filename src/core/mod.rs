//! Core engine types: entities, players, state, randomness, configuration
//! and errors.
//!
//! Everything else in the crate builds on these. `GameState` is the single
//! owner of all match data; the other modules read and change it.

pub mod config;
pub mod entity;
pub mod error;
pub mod player;
pub mod random;
pub mod state;

pub use config::RulesConfig;
pub use entity::{CardRef, EntityId};
pub use error::{DefinitionError, EngineError, ErrorSeverity, ResponseError, ScriptError};
pub(crate) use error::{Flow, Halt};
pub use player::{Player, PlayerId, PlayerMap, VictoryCondition, PLAYER_COUNT};
pub use random::{RandomSource, ScriptedRandom, SeededRandom, SeededRandomState};
pub use state::{AttackDeclaration, Destination, Expiration, GameState, Location};
