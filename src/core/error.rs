//! Error types.
//!
//! Game-rules outcomes (a player at 0 life, an empty deck) are not errors;
//! they end the game through victory conditions. Targets that disappear or
//! costs that cannot be paid are handled by timing substitution and undo.
//! What remains here are contract violations: malformed scripts and card
//! data, responses that do not answer the pending request, unknown ids and
//! broken transports. They are raised to the caller immediately.
//!
//! ## Severity
//!
//! `EngineError::severity()` classifies an error for callers that route or
//! log them:
//!
//! ```
//! use cu_rules::core::{EngineError, ErrorSeverity, ResponseError};
//!
//! let err: EngineError = ResponseError::DuplicateIndex(2).into();
//! assert_eq!(err.severity(), ErrorSeverity::Validation);
//! ```

use crate::core::entity::EntityId;
use crate::rules::GameResult;

/// How an error should be treated by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// A response or input did not satisfy the request it answered.
    Validation,
    /// Card data or script text is malformed.
    Data,
    /// The driver or random source went away.
    Transport,
    /// Engine state is inconsistent. Indicates a bug.
    Internal,
}

impl ErrorSeverity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Data => "data",
            Self::Transport => "transport",
            Self::Internal => "internal",
        }
    }
}

/// Lexing, parsing and typing failures in CDF Script.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("unexpected character '{ch}' at {line}:{column}")]
    UnexpectedCharacter { ch: char, line: usize, column: usize },

    #[error("expected {expected}, found {found} at {line}:{column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("expected {expected}, found end of line {line}")]
    UnexpectedEnd { expected: String, line: usize },

    #[error("unknown function {name} at line {line}")]
    UnknownFunction { name: String, line: usize },

    #[error("{function} has no parameter slot for a {found} value (line {line})")]
    UnexpectedParameter {
        function: String,
        found: String,
        line: usize,
    },

    #[error("{function} is missing its {param} parameter (line {line})")]
    MissingParameter {
        function: String,
        param: String,
        line: usize,
    },

    #[error("unknown variable ${0}")]
    UnknownVariable(String),

    #[error("expected a {expected} value, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("{property} cannot be modified")]
    UnmodifiableProperty { property: String },
}

/// A response that does not answer its request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    #[error("response {found} does not answer any pending request ({expected})")]
    UnexpectedType { found: String, expected: String },

    #[error("chose {chosen} entries, valid amounts are {valid:?}")]
    InvalidAmount { chosen: usize, valid: Vec<usize> },

    #[error("index {index} is out of range for {len} options")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("index {0} was chosen twice")]
    DuplicateIndex(usize),

    #[error("ordering is not a permutation of {len} entries")]
    NotAPermutation { len: usize },

    #[error("an attack needs at least one attacker")]
    NoAttackers,

    #[error("a combined attack must include exactly one partner")]
    CombinedAttackWithoutPartner,

    #[error("every combined attacker must share a type with the partner")]
    CombinedAttackTypeMismatch,
}

/// Malformed card definitions.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("card {0} is not registered")]
    UnknownCard(String),

    #[error("card {0} is registered twice")]
    DuplicateCard(String),

    #[error("card definition is missing its {field} field")]
    MissingField { field: String },

    #[error("field {field} has invalid value '{value}'")]
    InvalidField { field: String, value: String },

    #[error("unknown ability kind '{0}'")]
    UnknownAbilityKind(String),

    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("in {location}: {source}")]
    Script {
        location: String,
        #[source]
        source: ScriptError,
    },
}

/// Every error the engine can raise.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("ability {0} is not registered")]
    UnknownAbility(String),

    #[error("{0} does not exist")]
    UnknownCard(EntityId),

    #[error("random source is exhausted")]
    RandomExhausted,

    #[error("random value {value} is outside [0, {range})")]
    RandomOutOfRange { value: u32, range: u32 },

    #[error("driver has no response for {0}")]
    NoResponse(String),

    #[error("driver disconnected")]
    Disconnected,

    #[error("invalid setup: {0}")]
    Setup(String),

    #[error("{0} cannot be evaluated without a running game")]
    PureEvaluation(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl EngineError {
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Response(_) | Self::NoResponse(_) | Self::RandomOutOfRange { .. } => {
                ErrorSeverity::Validation
            }
            Self::Script(_)
            | Self::Definition(_)
            | Self::UnknownAbility(_)
            | Self::Setup(_) => ErrorSeverity::Data,
            Self::RandomExhausted | Self::Disconnected => ErrorSeverity::Transport,
            Self::UnknownCard(_) | Self::PureEvaluation(_) | Self::Invariant(_) => {
                ErrorSeverity::Internal
            }
        }
    }
}

/// Why engine code stopped running before reaching its end.
///
/// Crate-internal control flow: a game that ends unwinds through every
/// layer, and a timing that fails stops the script that produced it.
#[derive(Clone, Debug)]
pub(crate) enum Halt {
    GameOver(GameResult),
    /// A script timing could not happen; the script ends here.
    Stopped,
    Error(EngineError),
}

pub(crate) type Flow<T> = Result<T, Halt>;

impl From<EngineError> for Halt {
    fn from(err: EngineError) -> Self {
        Halt::Error(err)
    }
}

impl From<ScriptError> for Halt {
    fn from(err: ScriptError) -> Self {
        Halt::Error(err.into())
    }
}

impl From<ResponseError> for Halt {
    fn from(err: ResponseError) -> Self {
        Halt::Error(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ResponseError::InvalidAmount {
            chosen: 3,
            valid: vec![1],
        };
        assert_eq!(err.to_string(), "chose 3 entries, valid amounts are [1]");

        let err: EngineError = ScriptError::UnknownVariable("x".into()).into();
        assert_eq!(err.to_string(), "unknown variable $x");
    }

    #[test]
    fn test_severity_classes() {
        assert_eq!(
            EngineError::Disconnected.severity(),
            ErrorSeverity::Transport
        );
        assert_eq!(
            EngineError::UnknownCard(EntityId(3)).severity(),
            ErrorSeverity::Internal
        );
        let err: EngineError = DefinitionError::UnknownCard("CU1".into()).into();
        assert_eq!(err.severity(), ErrorSeverity::Data);
        assert_eq!(err.severity().as_str(), "data");
    }
}
