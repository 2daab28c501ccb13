//! CDF Script: the ability language.
//!
//! ## Pipeline
//!
//! - `lexer`: source text to tokens
//! - `parser`: tokens to the `ast`, binding call arguments to parameter slots
//! - `eval`: evaluates expressions and runs scripts against the game
//! - `functions`: the built-in function library
//!
//! Scripts are parsed once, when a card definition is registered, and
//! shared from then on.

pub mod ast;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{Expr, Script};
pub use eval::{eval_full, evaluate, has_all_targets, EvalError};
pub use functions::Function;
pub use parser::{parse_expression, parse_script, ScriptParser};
pub use value::{EvalContext, ScriptCard, ScriptValue};
