//! Runtime values and the evaluation context.
//!
//! Every expression evaluates to a list of `ScriptValue`s. A single number is
//! a one-element list; a card matcher is a list of cards; an empty list is
//! "nothing" (no target, no value).
//!
//! ## Equality
//!
//! Cards compare by identity (their `EntityId`), so a snapshot taken before
//! a zone move still equals the live card. Phases compare by coverage:
//! `mainPhase` equals `mainPhase1`.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::abilities::AbilityId;
use crate::actions::Action;
use crate::cards::{Card, CardId, CardSnapshot, CardType};
use crate::core::{CardRef, EntityId, GameState, PlayerId};
use crate::values::Modification;
use crate::zones::ZoneRef;

use super::ast::{PhaseName, Until, ValueType};

/// A card as seen by a script: a live reference, optionally frozen.
///
/// Cards pulled out of executed actions carry the snapshot taken when the
/// action ran, so their properties read as they were at that moment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptCard {
    pub card: CardRef,
    pub snapshot: Option<Arc<CardSnapshot>>,
}

impl ScriptCard {
    #[must_use]
    pub fn live(card: CardRef) -> Self {
        Self {
            card,
            snapshot: None,
        }
    }

    #[must_use]
    pub fn frozen(snapshot: CardSnapshot) -> Self {
        Self {
            card: snapshot.card.current_ref(),
            snapshot: Some(Arc::new(snapshot)),
        }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.card.id
    }

    /// The live card this refers to, if it has not moved since.
    #[must_use]
    pub fn current(&self, state: &GameState) -> Option<CardRef> {
        let card = state.card(self.card.id).ok()?;
        (!card.removed && card.epoch == self.card.epoch).then(|| card.current_ref())
    }

    /// The card data to read properties from.
    #[must_use]
    pub fn resolve<'a>(&'a self, state: &'a GameState) -> Option<&'a Card> {
        match &self.snapshot {
            Some(snapshot) => Some(&snapshot.card),
            None => state.card(self.card.id).ok(),
        }
    }
}

/// One value produced by a script expression.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ScriptValue {
    Card(ScriptCard),
    Number(i64),
    Player(PlayerId),
    Zone(ZoneRef),
    DeckPosition { player: PlayerId, top: bool },
    Type(String),
    CardType(CardType),
    Name(CardId),
    Bool(bool),
    Ability(AbilityId),
    Action(Box<Action>),
    Modifier(Arc<Vec<Modification>>),
    Until(Until),
    /// A phase; `player` is the turn player it belongs to, if specified.
    Phase {
        player: Option<PlayerId>,
        phase: PhaseName,
    },
}

impl ScriptValue {
    #[must_use]
    pub fn live_card(card: CardRef) -> Self {
        Self::Card(ScriptCard::live(card))
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Card(_) => ValueType::Card,
            Self::Number(_) => ValueType::Number,
            Self::Player(_) => ValueType::Player,
            Self::Zone(_) | Self::DeckPosition { .. } => ValueType::Zone,
            Self::Type(_) => ValueType::Type,
            Self::CardType(_) => ValueType::CardType,
            Self::Name(_) => ValueType::Name,
            Self::Bool(_) => ValueType::Bool,
            Self::Ability(_) => ValueType::Ability,
            Self::Action(_) => ValueType::Action,
            Self::Modifier(_) => ValueType::Modifier,
            Self::Until(_) => ValueType::Until,
            Self::Phase { .. } => ValueType::Phase,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_card(&self) -> Option<&ScriptCard> {
        match self {
            Self::Card(card) => Some(card),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_player(&self) -> Option<PlayerId> {
        match self {
            Self::Player(player) => Some(*player),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Script equality: cards by identity, phases by coverage.
    #[must_use]
    pub fn same_as(&self, other: &ScriptValue) -> bool {
        match (self, other) {
            (Self::Card(a), Self::Card(b)) => a.id() == b.id(),
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Player(a), Self::Player(b)) => a == b,
            (Self::Zone(a), Self::Zone(b)) => a == b,
            (
                Self::DeckPosition { player: a, top: at },
                Self::DeckPosition { player: b, top: bt },
            ) => a == b && at == bt,
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::CardType(a), Self::CardType(b)) => a == b,
            (Self::Name(a), Self::Name(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Ability(a), Self::Ability(b)) => a == b,
            (Self::Until(a), Self::Until(b)) => a == b,
            (
                Self::Phase {
                    player: pa,
                    phase: a,
                },
                Self::Phase {
                    player: pb,
                    phase: b,
                },
            ) => a.covers(*b) && (pa.is_none() || pb.is_none() || pa == pb),
            _ => false,
        }
    }
}

/// Numbers in a value list.
pub fn numbers(values: &[ScriptValue]) -> Vec<i64> {
    values.iter().filter_map(ScriptValue::as_number).collect()
}

/// Card references in a value list.
pub fn cards(values: &[ScriptValue]) -> Vec<ScriptCard> {
    values.iter().filter_map(|v| v.as_card().cloned()).collect()
}

/// A value list read as a condition: true if it holds any `yes`.
#[must_use]
pub fn truthy(values: &[ScriptValue]) -> bool {
    values.iter().any(|v| v.as_bool() == Some(true))
}

/// Variables of one ability activation.
pub type Variables = FxHashMap<String, Vec<ScriptValue>>;

/// Everything an expression may read besides the game state.
///
/// Contexts are immutable; nested scopes derive a new one with the `with_*`
/// builders. The innermost implicit card wins.
///
/// ```
/// use cu_rules::core::{EntityId, PlayerId};
/// use cu_rules::script::EvalContext;
///
/// let ctx = EvalContext::new(PlayerId::new(0)).with_card(EntityId(4));
/// let inner = ctx.with_player(PlayerId::new(1));
/// assert_eq!(inner.card, Some(EntityId(4)));
/// assert_eq!(inner.player, PlayerId::new(1));
/// ```
#[derive(Clone, Debug)]
pub struct EvalContext {
    /// Card whose ability is running. `this`.
    pub card: Option<EntityId>,
    /// Player executing the current function.
    pub player: PlayerId,
    pub ability: Option<AbilityId>,
    /// Player from whose point of view hidden information is judged.
    pub evaluating_player: Option<PlayerId>,
    pub implicit_card: Option<ScriptCard>,
    pub implicit_actions: Arc<Vec<Action>>,
    pub variables: Arc<Variables>,
}

impl EvalContext {
    #[must_use]
    pub fn new(player: PlayerId) -> Self {
        Self {
            card: None,
            player,
            ability: None,
            evaluating_player: None,
            implicit_card: None,
            implicit_actions: Arc::new(Vec::new()),
            variables: Arc::new(Variables::default()),
        }
    }

    #[must_use]
    pub fn with_card(&self, card: EntityId) -> Self {
        Self {
            card: Some(card),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_player(&self, player: PlayerId) -> Self {
        Self {
            player,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_ability(&self, ability: AbilityId) -> Self {
        Self {
            ability: Some(ability),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_evaluating_player(&self, player: PlayerId) -> Self {
        Self {
            evaluating_player: Some(player),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_implicit_card(&self, card: ScriptCard) -> Self {
        Self {
            implicit_card: Some(card),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_implicit_actions(&self, actions: Arc<Vec<Action>>) -> Self {
        Self {
            implicit_actions: actions,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_variables(&self, variables: Arc<Variables>) -> Self {
        Self {
            variables,
            ..self.clone()
        }
    }

    /// A context with one more variable bound.
    #[must_use]
    pub fn with_variable(&self, name: &str, values: Vec<ScriptValue>) -> Self {
        let mut variables = (*self.variables).clone();
        variables.insert(name.to_string(), values);
        self.with_variables(Arc::new(variables))
    }
}
