//! Value sets for cards and players.
//!
//! Every object keeps three views of its values: `initial` (as authored),
//! `base` and `current`. The latter two are derived from `initial` and the
//! modifier stack by the pipeline and are never edited directly.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::abilities::AbilityId;
use crate::cards::{CardId, CardType};
use crate::core::config::RulesConfig;
use crate::core::{EntityId, PlayerId};
use crate::script::ast::{Expr, ValueType};
use crate::script::ScriptValue;

use super::modifier::Modifier;

/// A named, modifiable value of a card or player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKey {
    CardTypes,
    Names,
    Level,
    Types,
    Attack,
    Defense,
    Abilities,
    AttackRights,
    CanAttack,
    CanCounterattack,
    DoLifeDamage,
    ManaGainAmount,
    StandardDrawAmount,
    NeedsToPayForPartner,
}

impl ValueKey {
    pub const CARD: [ValueKey; 11] = [
        ValueKey::CardTypes,
        ValueKey::Names,
        ValueKey::Level,
        ValueKey::Types,
        ValueKey::Attack,
        ValueKey::Defense,
        ValueKey::Abilities,
        ValueKey::AttackRights,
        ValueKey::CanAttack,
        ValueKey::CanCounterattack,
        ValueKey::DoLifeDamage,
    ];

    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "cardType" => Self::CardTypes,
            "name" => Self::Names,
            "level" => Self::Level,
            "types" => Self::Types,
            "attack" => Self::Attack,
            "defense" => Self::Defense,
            "abilities" => Self::Abilities,
            "attackRights" => Self::AttackRights,
            "canAttack" => Self::CanAttack,
            "canCounterattack" => Self::CanCounterattack,
            "doLifeDamage" => Self::DoLifeDamage,
            "manaGainAmount" => Self::ManaGainAmount,
            "standardDrawAmount" => Self::StandardDrawAmount,
            "needsToPayForPartner" => Self::NeedsToPayForPartner,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CardTypes => "cardType",
            Self::Names => "name",
            Self::Level => "level",
            Self::Types => "types",
            Self::Attack => "attack",
            Self::Defense => "defense",
            Self::Abilities => "abilities",
            Self::AttackRights => "attackRights",
            Self::CanAttack => "canAttack",
            Self::CanCounterattack => "canCounterattack",
            Self::DoLifeDamage => "doLifeDamage",
            Self::ManaGainAmount => "manaGainAmount",
            Self::StandardDrawAmount => "standardDrawAmount",
            Self::NeedsToPayForPartner => "needsToPayForPartner",
        }
    }

    #[must_use]
    pub const fn value_type(self) -> ValueType {
        match self {
            Self::CardTypes => ValueType::CardType,
            Self::Names => ValueType::Name,
            Self::Types => ValueType::Type,
            Self::Abilities => ValueType::Ability,
            Self::Level
            | Self::Attack
            | Self::Defense
            | Self::AttackRights
            | Self::ManaGainAmount
            | Self::StandardDrawAmount => ValueType::Number,
            Self::CanAttack
            | Self::CanCounterattack
            | Self::DoLifeDamage
            | Self::NeedsToPayForPartner => ValueType::Bool,
        }
    }

    /// Values only units have.
    #[must_use]
    pub const fn is_unit_only(self) -> bool {
        matches!(
            self,
            Self::Attack
                | Self::Defense
                | Self::AttackRights
                | Self::CanAttack
                | Self::CanCounterattack
        )
    }

    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(
            self,
            Self::CardTypes | Self::Names | Self::Types | Self::Abilities
        )
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self.value_type(), ValueType::Number)
    }
}

/// An ability slot on a card and whether it is currently cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityValue {
    pub id: AbilityId,
    pub cancelled: bool,
}

/// Uniform read/write access used by modifications.
pub trait ValueSet: Clone + Debug + PartialEq {
    /// The values stored under `key`, or `None` if this set has no such key.
    fn read(&self, key: ValueKey) -> Option<Vec<ScriptValue>>;

    /// Replace the values under `key`. Values of the wrong type are ignored.
    fn write(&mut self, key: ValueKey, values: &[ScriptValue]);

    /// Drop values that do not apply to this object any more.
    fn strip_inapplicable(&mut self) {}

    fn abilities_mut(&mut self) -> Option<&mut Vec<AbilityValue>> {
        None
    }

    fn is_unit(&self) -> bool {
        false
    }
}

fn first_number(values: &[ScriptValue]) -> Option<i64> {
    values.iter().find_map(ScriptValue::as_number)
}

fn first_bool(values: &[ScriptValue]) -> Option<bool> {
    values.iter().find_map(ScriptValue::as_bool)
}

/// The modifiable values of a card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardValues {
    pub card_types: SmallVec<[CardType; 2]>,
    pub names: SmallVec<[CardId; 1]>,
    pub level: i64,
    pub types: SmallVec<[String; 2]>,
    pub attack: Option<i64>,
    pub defense: Option<i64>,
    pub abilities: Vec<AbilityValue>,
    pub attack_rights: Option<i64>,
    pub can_attack: Option<bool>,
    pub can_counterattack: Option<bool>,
    pub do_life_damage: bool,
}

impl CardValues {
    #[must_use]
    pub fn has_card_type(&self, card_type: CardType) -> bool {
        self.card_types.contains(&card_type)
    }

    #[must_use]
    pub fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    #[must_use]
    pub fn attack(&self) -> i64 {
        self.attack.unwrap_or(0)
    }

    #[must_use]
    pub fn defense(&self) -> i64 {
        self.defense.unwrap_or(0)
    }

    #[must_use]
    pub fn is_ability_cancelled(&self, ability: AbilityId) -> bool {
        self.abilities
            .iter()
            .any(|a| a.id == ability && a.cancelled)
    }
}

impl ValueSet for CardValues {
    fn read(&self, key: ValueKey) -> Option<Vec<ScriptValue>> {
        let values = match key {
            ValueKey::CardTypes => self
                .card_types
                .iter()
                .map(|t| ScriptValue::CardType(*t))
                .collect(),
            ValueKey::Names => self.names.iter().map(|n| ScriptValue::Name(*n)).collect(),
            ValueKey::Level => vec![ScriptValue::Number(self.level)],
            ValueKey::Types => self
                .types
                .iter()
                .map(|t| ScriptValue::Type(t.clone()))
                .collect(),
            ValueKey::Attack => self.attack.map(ScriptValue::Number).into_iter().collect(),
            ValueKey::Defense => self.defense.map(ScriptValue::Number).into_iter().collect(),
            ValueKey::Abilities => self
                .abilities
                .iter()
                .map(|a| ScriptValue::Ability(a.id))
                .collect(),
            ValueKey::AttackRights => self
                .attack_rights
                .map(ScriptValue::Number)
                .into_iter()
                .collect(),
            ValueKey::CanAttack => self.can_attack.map(ScriptValue::Bool).into_iter().collect(),
            ValueKey::CanCounterattack => self
                .can_counterattack
                .map(ScriptValue::Bool)
                .into_iter()
                .collect(),
            ValueKey::DoLifeDamage => vec![ScriptValue::Bool(self.do_life_damage)],
            ValueKey::ManaGainAmount
            | ValueKey::StandardDrawAmount
            | ValueKey::NeedsToPayForPartner => return None,
        };
        Some(values)
    }

    fn write(&mut self, key: ValueKey, values: &[ScriptValue]) {
        match key {
            ValueKey::CardTypes => {
                self.card_types = values
                    .iter()
                    .filter_map(|v| match v {
                        ScriptValue::CardType(t) => Some(*t),
                        _ => None,
                    })
                    .collect();
            }
            ValueKey::Names => {
                self.names = values
                    .iter()
                    .filter_map(|v| match v {
                        ScriptValue::Name(n) => Some(*n),
                        _ => None,
                    })
                    .collect();
            }
            ValueKey::Level => {
                if let Some(n) = first_number(values) {
                    self.level = n;
                }
            }
            ValueKey::Types => {
                self.types = values
                    .iter()
                    .filter_map(|v| match v {
                        ScriptValue::Type(t) => Some(t.clone()),
                        _ => None,
                    })
                    .collect();
            }
            ValueKey::Attack => self.attack = first_number(values).or(self.attack),
            ValueKey::Defense => self.defense = first_number(values).or(self.defense),
            ValueKey::AttackRights => {
                self.attack_rights = first_number(values).or(self.attack_rights);
            }
            ValueKey::CanAttack => self.can_attack = first_bool(values).or(self.can_attack),
            ValueKey::CanCounterattack => {
                self.can_counterattack = first_bool(values).or(self.can_counterattack);
            }
            ValueKey::DoLifeDamage => {
                if let Some(b) = first_bool(values) {
                    self.do_life_damage = b;
                }
            }
            ValueKey::Abilities => {
                let previous = std::mem::take(&mut self.abilities);
                self.abilities = values
                    .iter()
                    .filter_map(|v| match v {
                        ScriptValue::Ability(id) => Some(*id),
                        _ => None,
                    })
                    .map(|id| {
                        previous
                            .iter()
                            .find(|a| a.id == id)
                            .copied()
                            .unwrap_or(AbilityValue {
                                id,
                                cancelled: false,
                            })
                    })
                    .collect();
            }
            ValueKey::ManaGainAmount
            | ValueKey::StandardDrawAmount
            | ValueKey::NeedsToPayForPartner => {}
        }
    }

    fn strip_inapplicable(&mut self) {
        if !self.has_card_type(CardType::Unit) {
            self.attack = None;
            self.defense = None;
            self.attack_rights = None;
            self.can_attack = None;
            self.can_counterattack = None;
        }
    }

    fn abilities_mut(&mut self) -> Option<&mut Vec<AbilityValue>> {
        Some(&mut self.abilities)
    }

    fn is_unit(&self) -> bool {
        self.has_card_type(CardType::Unit)
    }
}

/// The modifiable values of a player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerValues {
    pub mana_gain_amount: i64,
    pub standard_draw_amount: i64,
    pub needs_to_pay_for_partner: bool,
}

impl PlayerValues {
    #[must_use]
    pub fn from_config(config: &RulesConfig) -> Self {
        Self {
            mana_gain_amount: config.mana_gain,
            standard_draw_amount: config.standard_draw,
            needs_to_pay_for_partner: true,
        }
    }
}

impl ValueSet for PlayerValues {
    fn read(&self, key: ValueKey) -> Option<Vec<ScriptValue>> {
        match key {
            ValueKey::ManaGainAmount => Some(vec![ScriptValue::Number(self.mana_gain_amount)]),
            ValueKey::StandardDrawAmount => {
                Some(vec![ScriptValue::Number(self.standard_draw_amount)])
            }
            ValueKey::NeedsToPayForPartner => {
                Some(vec![ScriptValue::Bool(self.needs_to_pay_for_partner)])
            }
            _ => None,
        }
    }

    fn write(&mut self, key: ValueKey, values: &[ScriptValue]) {
        match key {
            ValueKey::ManaGainAmount => {
                if let Some(n) = first_number(values) {
                    self.mana_gain_amount = n;
                }
            }
            ValueKey::StandardDrawAmount => {
                if let Some(n) = first_number(values) {
                    self.standard_draw_amount = n;
                }
            }
            ValueKey::NeedsToPayForPartner => {
                if let Some(b) = first_bool(values) {
                    self.needs_to_pay_for_partner = b;
                }
            }
            _ => {}
        }
    }
}

/// A record that an object is immune to changes of one value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unaffection {
    pub key: ValueKey,
    /// Only modifiers whose source card satisfies this are blocked.
    pub by: Option<Arc<Expr>>,
    pub source_card: Option<EntityId>,
    pub source_player: PlayerId,
    pub source_ability: Option<AbilityId>,
}

/// The three views of an object's values plus the modifier stack.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectValues<V> {
    pub initial: V,
    pub base: V,
    pub current: V,
    /// Applied in order.
    pub modifiers: Vec<Modifier>,
    pub unaffected_by: Vec<Unaffection>,
}

impl<V: ValueSet> ObjectValues<V> {
    pub fn new(initial: V) -> Self {
        let mut base = initial.clone();
        base.strip_inapplicable();
        Self {
            current: base.clone(),
            base,
            initial,
            modifiers: Vec::new(),
            unaffected_by: Vec::new(),
        }
    }

    /// The view to read: `base` or `current`.
    pub fn view(&self, base: bool) -> &V {
        if base {
            &self.base
        } else {
            &self.current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_values() -> CardValues {
        CardValues {
            card_types: SmallVec::from_slice(&[CardType::Unit]),
            names: SmallVec::from_slice(&[CardId::new(1)]),
            level: 3,
            types: SmallVec::from_vec(vec!["Dragon".to_string()]),
            attack: Some(300),
            defense: Some(200),
            abilities: Vec::new(),
            attack_rights: Some(1),
            can_attack: Some(true),
            can_counterattack: Some(true),
            do_life_damage: true,
        }
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in ValueKey::CARD {
            assert_eq!(ValueKey::parse(key.as_str()), Some(key));
        }
        assert!(ValueKey::Attack.is_unit_only());
        assert!(ValueKey::Types.is_list());
        assert!(ValueKey::Level.is_numeric());
        assert!(!ValueKey::CanAttack.is_numeric());
    }

    #[test]
    fn test_read_write() {
        let mut values = unit_values();
        values.write(ValueKey::Attack, &[ScriptValue::Number(500)]);
        assert_eq!(values.attack, Some(500));

        values.write(
            ValueKey::Types,
            &[
                ScriptValue::Type("Fire".into()),
                ScriptValue::Type("Ice".into()),
            ],
        );
        assert_eq!(values.read(ValueKey::Types).map(|v| v.len()), Some(2));
        assert!(values.read(ValueKey::ManaGainAmount).is_none());
    }

    #[test]
    fn test_non_units_lose_unit_values() {
        let mut values = unit_values();
        values.card_types = SmallVec::from_slice(&[CardType::Spell]);
        values.strip_inapplicable();
        assert_eq!(values.attack, None);
        assert_eq!(values.can_attack, None);
        assert_eq!(values.level, 3);
        assert!(values.read(ValueKey::Attack).unwrap().is_empty());
    }

    #[test]
    fn test_rewriting_abilities_keeps_cancellation() {
        let a = AbilityId::new(CardId::new(1), 0);
        let b = AbilityId::new(CardId::new(1), 1);
        let mut values = unit_values();
        values.abilities = vec![AbilityValue {
            id: a,
            cancelled: true,
        }];
        values.write(
            ValueKey::Abilities,
            &[ScriptValue::Ability(a), ScriptValue::Ability(b)],
        );
        assert!(values.is_ability_cancelled(a));
        assert!(!values.is_ability_cancelled(b));
    }

    #[test]
    fn test_player_values() {
        let mut values = PlayerValues::from_config(&RulesConfig::default());
        assert_eq!(values.mana_gain_amount, 5);
        values.write(ValueKey::StandardDrawAmount, &[ScriptValue::Number(2)]);
        assert_eq!(values.standard_draw_amount, 2);
        assert!(values.read(ValueKey::Attack).is_none());
    }
}
