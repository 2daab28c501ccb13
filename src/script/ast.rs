//! CDF Script syntax tree.
//!
//! A parsed script is a list of `Statement`s, one per source line. Every
//! expression node is a variant of the closed `Expr` enum; the evaluator
//! walks it by pattern matching.
//!
//! Function arguments are bound to their declared parameter slots while
//! parsing, so `FunctionCall::args` always has exactly one entry per slot.

use serde::{Deserialize, Serialize};

use crate::cards::{CardId, CardType};
use crate::values::{Modification, ValueKey};
use crate::zones::ZoneKind;

use super::functions::Function;

/// Static type of an expression, used to bind arguments to parameter slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Card,
    Number,
    Player,
    Zone,
    Type,
    CardType,
    Name,
    Bool,
    Ability,
    Action,
    Modifier,
    Until,
    Phase,
    /// Accepts any value. Only used for parameter slots.
    Any,
}

impl ValueType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Number => "number",
            Self::Player => "player",
            Self::Zone => "zone",
            Self::Type => "type",
            Self::CardType => "cardType",
            Self::Name => "cardName",
            Self::Bool => "bool",
            Self::Ability => "ability",
            Self::Action => "action",
            Self::Modifier => "modifier",
            Self::Until => "untilIndicator",
            Self::Phase => "phase",
            Self::Any => "*",
        }
    }
}

/// `you`, `opponent`, `both` and `own`.
///
/// `you` is the owner of the card whose ability is running, `own` is the
/// player currently executing the function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSelector {
    You,
    Opponent,
    Both,
    Own,
}

/// Zone keywords. `Field` stands for all three field zones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneName {
    Deck,
    Hand,
    UnitZone,
    SpellItemZone,
    PartnerZone,
    Discard,
    Exile,
    Field,
}

impl ZoneName {
    #[must_use]
    pub fn kinds(self) -> &'static [ZoneKind] {
        match self {
            Self::Deck => &[ZoneKind::Deck],
            Self::Hand => &[ZoneKind::Hand],
            Self::UnitZone => &[ZoneKind::Unit],
            Self::SpellItemZone => &[ZoneKind::SpellItem],
            Self::PartnerZone => &[ZoneKind::Partner],
            Self::Discard => &[ZoneKind::Discard],
            Self::Exile => &[ZoneKind::Exile],
            Self::Field => &ZoneKind::FIELD,
        }
    }

    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "deck" => Self::Deck,
            "hand" => Self::Hand,
            "unitZone" => Self::UnitZone,
            "spellItemZone" => Self::SpellItemZone,
            "partnerZone" => Self::PartnerZone,
            "discard" => Self::Discard,
            "exile" => Self::Exile,
            "field" => Self::Field,
            _ => return None,
        })
    }
}

/// Phase keywords. `Main` matches both main phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseName {
    ManaSupply,
    Draw,
    Main,
    Main1,
    Main2,
    Battle,
    End,
}

impl PhaseName {
    /// Whether a phase literal covers a concrete phase.
    #[must_use]
    pub fn covers(self, other: PhaseName) -> bool {
        self == other
            || matches!(
                (self, other),
                (PhaseName::Main, PhaseName::Main1 | PhaseName::Main2)
                    | (PhaseName::Main1 | PhaseName::Main2, PhaseName::Main)
            )
    }

    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "manaSupplyPhase" => Self::ManaSupply,
            "drawPhase" => Self::Draw,
            "mainPhase" => Self::Main,
            "mainPhase1" => Self::Main1,
            "mainPhase2" => Self::Main2,
            "battlePhase" => Self::Battle,
            "endPhase" => Self::End,
            _ => return None,
        })
    }
}

/// How long an applied modifier lasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Until {
    Forever,
    EndOfTurn,
    EndOfNextTurn,
    EndOfYourNextTurn,
    EndOfOpponentNextTurn,
}

impl Until {
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "forever" => Self::Forever,
            "endOfTurn" => Self::EndOfTurn,
            "endOfNextTurn" => Self::EndOfNextTurn,
            "endOfYourNextTurn" => Self::EndOfYourNextTurn,
            "endOfOpponentNextTurn" => Self::EndOfOpponentNextTurn,
            _ => return None,
        })
    }
}

/// Which cards an action accessor pulls out of an action list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessorKind {
    Destroyed,
    Discarded,
    Exiled,
    Moved,
    Summoned,
    Deployed,
    Cast,
    Retired,
    Viewed,
    Declared,
    Targeted,
    ChosenTarget,
}

impl AccessorKind {
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "destroyed" => Self::Destroyed,
            "discarded" => Self::Discarded,
            "exiled" => Self::Exiled,
            "moved" => Self::Moved,
            "summoned" => Self::Summoned,
            "deployed" => Self::Deployed,
            "cast" => Self::Cast,
            "retired" => Self::Retired,
            "viewed" => Self::Viewed,
            "declared" => Self::Declared,
            "targeted" => Self::Targeted,
            "chosenTarget" => Self::ChosenTarget,
            _ => return None,
        })
    }
}

/// Which action list an accessor reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessorScope {
    /// The implicit actions: for triggers, the last executed timing.
    Implicit,
    CurrentBlock,
    CurrentTurn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Equals,
    NotEquals,
    Greater,
    Less,
    Plus,
    Minus,
    Multiply,
    Divide,
    FloorDivide,
}

impl BinaryOp {
    #[must_use]
    pub const fn result_type(self) -> Option<ValueType> {
        match self {
            Self::Or
            | Self::And
            | Self::Equals
            | Self::NotEquals
            | Self::Greater
            | Self::Less => Some(ValueType::Bool),
            Self::Multiply | Self::Divide | Self::FloorDivide => Some(ValueType::Number),
            // takes the left operand's type
            Self::Plus | Self::Minus => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Minus,
    Not,
}

/// Something that can be read off a card or player with `.`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    /// A modifiable value. `base` reads the base view instead of current.
    Value { key: ValueKey, base: bool },
    Owner,
    EquippedUnit,
    Equipments,
    AttacksMade,
    FightingAgainst,
    SelfCard,
    Zone,
    IsToken,
    Life,
    Mana,
    Partner,
}

impl Property {
    /// Parse a property keyword, including `base`-prefixed value names.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        let plain = match word {
            "owner" => Some(Self::Owner),
            "equippedUnit" => Some(Self::EquippedUnit),
            "equipments" => Some(Self::Equipments),
            "attacksMade" => Some(Self::AttacksMade),
            "fightingAgainst" => Some(Self::FightingAgainst),
            "self" => Some(Self::SelfCard),
            "zone" => Some(Self::Zone),
            "isToken" => Some(Self::IsToken),
            "life" => Some(Self::Life),
            "mana" => Some(Self::Mana),
            "partner" => Some(Self::Partner),
            _ => None,
        };
        if plain.is_some() {
            return plain;
        }
        if let Some(key) = ValueKey::parse(word) {
            return Some(Self::Value { key, base: false });
        }
        let rest = word.strip_prefix("base")?;
        let mut chars = rest.chars();
        let first = chars.next()?;
        if !first.is_ascii_uppercase() {
            return None;
        }
        let unbased: String = first.to_ascii_lowercase().to_string() + chars.as_str();
        ValueKey::parse(&unbased).map(|key| Self::Value { key, base: true })
    }

    #[must_use]
    pub fn value_type(self) -> ValueType {
        match self {
            Self::Value { key, .. } => key.value_type(),
            Self::Owner => ValueType::Player,
            Self::EquippedUnit
            | Self::Equipments
            | Self::FightingAgainst
            | Self::SelfCard
            | Self::Partner => ValueType::Card,
            Self::AttacksMade | Self::Life | Self::Mana => ValueType::Number,
            Self::Zone => ValueType::Zone,
            Self::IsToken => ValueType::Bool,
        }
    }
}

/// `[cardTypes from zones where condition]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardMatcher {
    /// Empty means any card.
    pub card_types: Vec<CardType>,
    /// Zone or card expressions the candidates are drawn from.
    pub sources: Vec<Expr>,
    pub condition: Option<Expr>,
}

/// A built-in function invocation with its arguments bound to slots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    /// `None` runs the function for the executing player.
    pub player: Option<PlayerSelector>,
    pub function: Function,
    pub args: Vec<Expr>,
    pub as_many_as_possible: bool,
    pub line: usize,
}

/// An expression node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Expr {
    Number(i64),
    Bool(bool),
    /// `any`, only meaningful as a SELECT amount.
    AnyAmount,
    AllTypes,
    TypeName(String),
    CardType(CardType),
    CardId(CardId),
    Player(PlayerSelector),
    Zone {
        player: Option<PlayerSelector>,
        zone: ZoneName,
    },
    DeckPosition {
        player: Option<PlayerSelector>,
        top: bool,
    },
    Phase {
        player: Option<PlayerSelector>,
        phase: PhaseName,
    },
    Until(Until),
    Variable(String),
    This,
    ImplicitCard,
    AttackTarget,
    Attackers,
    CurrentPhase,
    Property {
        object: Box<Expr>,
        property: Property,
    },
    CardMatch(Box<CardMatcher>),
    Call(Box<FunctionCall>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Accessor {
        scope: AccessorScope,
        accessor: AccessorKind,
    },
    Modifier(Vec<Modification>),
    List(Vec<Expr>),
}

impl Expr {
    /// Static type of this expression. Variables are resolved through
    /// `variable_type`.
    pub fn value_type(&self, variable_type: &dyn Fn(&str) -> Option<ValueType>) -> ValueType {
        match self {
            Expr::Number(_) | Expr::AnyAmount => ValueType::Number,
            Expr::Bool(_) => ValueType::Bool,
            Expr::AllTypes | Expr::TypeName(_) => ValueType::Type,
            Expr::CardType(_) => ValueType::CardType,
            Expr::CardId(_) => ValueType::Name,
            Expr::Player(_) => ValueType::Player,
            Expr::Zone { .. } | Expr::DeckPosition { .. } => ValueType::Zone,
            Expr::Phase { .. } | Expr::CurrentPhase => ValueType::Phase,
            Expr::Until(_) => ValueType::Until,
            Expr::Variable(name) => variable_type(name).unwrap_or(ValueType::Any),
            Expr::This
            | Expr::ImplicitCard
            | Expr::AttackTarget
            | Expr::Attackers
            | Expr::CardMatch(_)
            | Expr::Accessor { .. } => ValueType::Card,
            Expr::Property { property, .. } => property.value_type(),
            Expr::Call(call) => call.function.return_type(),
            Expr::Binary { op, left, .. } => op
                .result_type()
                .unwrap_or_else(|| left.value_type(variable_type)),
            Expr::Unary { op: UnaryOp::Minus, .. } => ValueType::Number,
            Expr::Unary { op: UnaryOp::Not, .. } => ValueType::Bool,
            Expr::Modifier(_) => ValueType::Modifier,
            Expr::List(items) => items
                .first()
                .map_or(ValueType::Card, |item| item.value_type(variable_type)),
        }
    }

    /// Visit every direct child expression.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Property { object, .. } => vec![object.as_ref()],
            Expr::CardMatch(matcher) => matcher
                .sources
                .iter()
                .chain(matcher.condition.as_ref())
                .collect(),
            Expr::Call(call) => call.args.iter().collect(),
            Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::List(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// One line of a script.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Statement {
    /// `$name = expr`.
    Assign {
        name: String,
        value: Expr,
        line: usize,
    },
    /// One or more function calls whose actions happen in the same timing.
    Calls { calls: Vec<FunctionCall>, line: usize },
}

/// A parsed script: an ability's cost or exec part.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Script {
    pub statements: Vec<Statement>,
}

impl Script {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_parse_base_prefix() {
        assert_eq!(
            Property::parse("baseAttack"),
            Some(Property::Value {
                key: ValueKey::Attack,
                base: true
            })
        );
        assert_eq!(
            Property::parse("level"),
            Some(Property::Value {
                key: ValueKey::Level,
                base: false
            })
        );
        assert_eq!(Property::parse("owner"), Some(Property::Owner));
        assert_eq!(Property::parse("basement"), None);
    }

    #[test]
    fn test_main_phase_covers_both_mains() {
        assert!(PhaseName::Main.covers(PhaseName::Main1));
        assert!(PhaseName::Main2.covers(PhaseName::Main));
        assert!(!PhaseName::Main1.covers(PhaseName::Main2));
        assert!(!PhaseName::Battle.covers(PhaseName::End));
    }

    #[test]
    fn test_value_types() {
        let no_vars = |_: &str| None;
        let sum = Expr::Binary {
            op: BinaryOp::Plus,
            left: Box::new(Expr::Number(1)),
            right: Box::new(Expr::Number(2)),
        };
        assert_eq!(sum.value_type(&no_vars), ValueType::Number);
        assert_eq!(
            Expr::DeckPosition {
                player: None,
                top: true
            }
            .value_type(&no_vars),
            ValueType::Zone
        );
        let typed = |name: &str| (name == "x").then_some(ValueType::Card);
        assert_eq!(
            Expr::Variable("x".into()).value_type(&typed),
            ValueType::Card
        );
    }
}
