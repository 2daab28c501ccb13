//! # cu-rules
//!
//! Rules engine for the Cross Universe trading card game, with an
//! interpreter for CDF Script, the language card abilities are written in.
//!
//! ## Design Principles
//!
//! 1. **Everything is an action**: every change to the game goes through an
//!    `Action` that can be undone, so costs are all or nothing.
//!
//! 2. **No hidden inputs**: decisions come from a `Driver` and randomness
//!    from a `RandomSource`. Logging both reproduces a match exactly.
//!
//! 3. **Explicit context**: scripts evaluate against an immutable
//!    `EvalContext`; there is no global game state.
//!
//! ## Layers
//!
//! Script evaluation runs inside timings, timings inside blocks, blocks
//! inside stacks, stacks inside phases and turns. Any layer may have to
//! wait for a response; the engine code simply blocks on the driver, and
//! `io::session` turns that into a suspend/resume interface.
//!
//! ## Modules
//!
//! - `core`: entities, players, state, randomness, configuration, errors
//! - `zones`: decks, hands, field slots and piles
//! - `cards`: card definitions, their text format and card instances
//! - `values`: base and current values and the modifiers between them
//! - `script`: CDF Script lexer, parser and evaluator
//! - `abilities`: ability definitions and activation rules
//! - `actions`: the indivisible effects and their undo
//! - `timing`: simultaneous actions, substitution, statics and triggers
//! - `stack`: blocks, priority and stack resolution
//! - `rules`: fights, legal moves and game results
//! - `game`: setup and the turn loop
//! - `io`: requests, events, drivers, replays and sessions

pub mod abilities;
pub mod actions;
pub mod cards;
pub mod core;
pub mod game;
pub mod io;
pub mod rules;
pub mod script;
pub mod stack;
pub mod timing;
pub mod values;
pub mod zones;

// Re-export commonly used types
pub use crate::core::{
    CardRef, EngineError, EntityId, GameState, PlayerId, RandomSource, RulesConfig,
    ScriptedRandom, SeededRandom, VictoryCondition,
};

pub use crate::cards::{parse_definition, CardDefinition, CardId, CardRegistry, CardType};

pub use crate::abilities::{AbilityDefinition, AbilityId, AbilityKind};

pub use crate::actions::Action;

pub use crate::game::Game;

pub use crate::io::{Driver, Event, ReplayLog, Request, RequestKind, Response, ScriptedDriver};

pub use crate::rules::GameResult;

pub use crate::script::{parse_expression, parse_script, EvalContext, ScriptValue};
