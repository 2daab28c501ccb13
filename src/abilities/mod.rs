//! Abilities: typed wrappers around parsed scripts.
//!
//! ## Kinds
//!
//! - `Cast` / `Deploy`: run as part of casting a spell or deploying an item
//! - `Optional`: activated by the turn player in a main phase
//! - `Fast`: activated by either player whenever they hold priority
//! - `Trigger`: activatable once its trigger became true, or during its phase
//! - `Static`: contributes a modifier to whatever `applyTo` selects
//!
//! Definitions are immutable and shared. Per-card counters and trigger
//! flags live in `AbilityState` on the card instance.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::cards::{Card, CardId};
use crate::core::{DefinitionError, EngineError, GameState, PlayerId};
use crate::script::ast::{Expr, Script};
use crate::script::eval::{evaluate, has_all_targets};
use crate::script::value::truthy;
use crate::script::EvalContext;

/// Identifies an ability by its card and position on the card.
///
/// ```
/// use cu_rules::abilities::AbilityId;
/// use cu_rules::cards::CardId;
///
/// let id = AbilityId::new(CardId::new(17), 1);
/// assert_eq!(id.to_string(), "CU00017:1");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbilityId {
    pub card: CardId,
    pub index: u16,
}

impl AbilityId {
    #[must_use]
    pub const fn new(card: CardId, index: u16) -> Self {
        Self { card, index }
    }
}

impl std::fmt::Display for AbilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.card, self.index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    Cast,
    Deploy,
    Optional,
    Fast,
    Trigger,
    Static,
}

impl AbilityKind {
    pub fn parse(word: &str) -> Result<Self, DefinitionError> {
        Ok(match word {
            "cast" => Self::Cast,
            "deploy" => Self::Deploy,
            "optional" => Self::Optional,
            "fast" => Self::Fast,
            "trigger" => Self::Trigger,
            "static" => Self::Static,
            other => return Err(DefinitionError::UnknownAbilityKind(other.to_string())),
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cast => "cast",
            Self::Deploy => "deploy",
            Self::Optional => "optional",
            Self::Fast => "fast",
            Self::Trigger => "trigger",
            Self::Static => "static",
        }
    }

    /// Kinds a player activates on their own.
    #[must_use]
    pub const fn is_activatable(self) -> bool {
        matches!(self, Self::Optional | Self::Fast | Self::Trigger)
    }
}

/// Static data of one ability.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AbilityDefinition {
    pub id: AbilityId,
    pub kind: AbilityKind,
    pub turn_limit: Option<u32>,
    pub game_limit: Option<u32>,
    /// Mandatory triggers are activated without being offered.
    pub mandatory: bool,
    /// Phase expression the ability is restricted to.
    pub during: Option<Arc<Expr>>,
    pub condition: Option<Arc<Expr>>,
    pub trigger: Option<Arc<Expr>>,
    pub apply_to: Option<Arc<Expr>>,
    pub modifier: Option<Arc<Expr>>,
    pub cost: Arc<Script>,
    pub exec: Arc<Script>,
    pub cancellable: bool,
}

impl AbilityDefinition {
    /// A bare ability of the given kind with empty scripts.
    #[must_use]
    pub fn new(id: AbilityId, kind: AbilityKind) -> Self {
        Self {
            id,
            kind,
            turn_limit: None,
            game_limit: None,
            mandatory: false,
            during: None,
            condition: None,
            trigger: None,
            apply_to: None,
            modifier: None,
            cost: Arc::new(Script::default()),
            exec: Arc::new(Script::default()),
            cancellable: true,
        }
    }

    #[must_use]
    pub fn within_limits(&self, state: &AbilityState) -> bool {
        self.turn_limit
            .map_or(true, |limit| state.activations_this_turn < limit)
            && self
                .game_limit
                .map_or(true, |limit| state.activations_this_game < limit)
    }
}

/// Per-card bookkeeping of one ability.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AbilityState {
    pub activations_this_turn: u32,
    pub activations_this_game: u32,
    /// The trigger became true and the ability has not been activated since.
    pub trigger_met: bool,
    /// The executed actions that met the trigger.
    pub trigger_actions: Arc<Vec<Action>>,
}

impl AbilityState {
    pub fn record_activation(&mut self) {
        self.activations_this_turn += 1;
        self.activations_this_game += 1;
        self.trigger_met = false;
        self.trigger_actions = Arc::new(Vec::new());
    }
}

/// The context an ability's scripts run in.
#[must_use]
pub fn activation_context(ability: &AbilityDefinition, card: &Card, player: PlayerId) -> EvalContext {
    let ctx = EvalContext::new(player)
        .with_card(card.entity)
        .with_ability(ability.id)
        .with_evaluating_player(player);
    match card.ability_state(ability.id) {
        Some(state) if ability.kind == AbilityKind::Trigger => {
            ctx.with_implicit_actions(state.trigger_actions.clone())
        }
        _ => ctx,
    }
}

/// Whether the current phase matches an ability's `during` restriction.
pub fn during_holds(
    ability: &AbilityDefinition,
    ctx: &EvalContext,
    state: &GameState,
) -> Result<bool, EngineError> {
    let Some(during) = &ability.during else {
        return Ok(true);
    };
    let Some(current) = state.current_phase_value() else {
        return Ok(false);
    };
    Ok(evaluate(during, ctx, state)?
        .iter()
        .any(|phase| phase.same_as(&current)))
}

/// Whether an ability's own condition holds.
pub fn condition_holds(
    ability: &AbilityDefinition,
    ctx: &EvalContext,
    state: &GameState,
) -> Result<bool, EngineError> {
    match &ability.condition {
        Some(condition) => Ok(truthy(&evaluate(condition, ctx, state)?)),
        None => Ok(true),
    }
}

/// Whether `player` may activate `ability` of `card` right now, ignoring
/// priority and phase-specific move rules.
pub fn can_activate(
    ability: &AbilityDefinition,
    card: &Card,
    player: PlayerId,
    state: &GameState,
) -> Result<bool, EngineError> {
    if card.values.current.is_ability_cancelled(ability.id) {
        return Ok(false);
    }
    let fresh = AbilityState::default();
    let ability_state = card.ability_state(ability.id).unwrap_or(&fresh);
    if !ability.within_limits(ability_state) {
        return Ok(false);
    }
    if ability.kind == AbilityKind::Trigger && ability.during.is_none() && !ability_state.trigger_met
    {
        return Ok(false);
    }
    let ctx = activation_context(ability, card, player);
    if !during_holds(ability, &ctx, state)? || !condition_holds(ability, &ctx, state)? {
        return Ok(false);
    }
    has_all_targets(&[&ability.cost, &ability.exec], &ctx, state)
}
