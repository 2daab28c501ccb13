//! Card definitions: static card data.
//!
//! `CardDefinition` holds the printed properties of a card: its card types,
//! name, level, types, stats and abilities. Per-match data (zone, values,
//! counters) lives in `Card`.
//!
//! ## Text format
//!
//! Definitions are usually loaded from `key: value` text:
//!
//! ```text
//! id: CU00042
//! cardType: unit
//! name: CU00042
//! level: 2
//! types: Dragon,Fire
//! attack: 200
//! defense: 100
//! o: optional
//! turnLimit: 1
//! cost:
//! LOSEMANA(1)
//! exec:
//! DRAW(1)
//! ```
//!
//! Every `o:` line opens an ability section. `cost:` and `exec:` take the
//! lines that follow, up to the next key.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::abilities::{AbilityDefinition, AbilityId, AbilityKind};
use crate::core::{DefinitionError, ScriptError};
use crate::script::ast::Expr;
use crate::script::parser::ScriptParser;
use crate::values::{AbilityValue, CardValues};

/// Identifier of a printed card, `CU` followed by its number.
///
/// ```
/// use cu_rules::cards::CardId;
///
/// let id = CardId::parse("CU00123").unwrap();
/// assert_eq!(id, CardId::new(123));
/// assert_eq!(id.to_string(), "CU00123");
/// assert!(CardId::parse("C00123").is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(pub u32);

impl CardId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let digits = text.strip_prefix("CU")?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CU{:05}", self.0)
    }
}

/// Card types, including the parent types `unit`, `spell` and `item`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Unit,
    Token,
    Spell,
    StandardSpell,
    ContinuousSpell,
    EnchantSpell,
    Item,
    StandardItem,
    ContinuousItem,
    EquipableItem,
}

impl CardType {
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "unit" => Self::Unit,
            "token" => Self::Token,
            "spell" => Self::Spell,
            "standardSpell" => Self::StandardSpell,
            "continuousSpell" => Self::ContinuousSpell,
            "enchantSpell" => Self::EnchantSpell,
            "item" => Self::Item,
            "standardItem" => Self::StandardItem,
            "continuousItem" => Self::ContinuousItem,
            "equipableItem" => Self::EquipableItem,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Token => "token",
            Self::Spell => "spell",
            Self::StandardSpell => "standardSpell",
            Self::ContinuousSpell => "continuousSpell",
            Self::EnchantSpell => "enchantSpell",
            Self::Item => "item",
            Self::StandardItem => "standardItem",
            Self::ContinuousItem => "continuousItem",
            Self::EquipableItem => "equipableItem",
        }
    }

    /// The broader type a printed card type implies.
    #[must_use]
    pub const fn parent(self) -> Option<CardType> {
        match self {
            Self::Token => Some(Self::Unit),
            Self::StandardSpell | Self::ContinuousSpell | Self::EnchantSpell => Some(Self::Spell),
            Self::StandardItem | Self::ContinuousItem | Self::EquipableItem => Some(Self::Item),
            Self::Unit | Self::Spell | Self::Item => None,
        }
    }

    /// A printed card type plus its parent.
    #[must_use]
    pub fn with_parent(self) -> SmallVec<[CardType; 2]> {
        match self.parent() {
            Some(parent) => smallvec![self, parent],
            None => smallvec![self],
        }
    }
}

/// Static card definition.
///
/// ```
/// use cu_rules::cards::{CardDefinition, CardId, CardType};
///
/// let knight = CardDefinition::new(CardId::new(7), CardType::Unit)
///     .with_level(3)
///     .with_stats(300, 200)
///     .with_types(["Warrior"]);
///
/// let values = knight.initial_values();
/// assert_eq!(values.attack(), 300);
/// assert!(values.has_type("Warrior"));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardDefinition {
    pub id: CardId,
    /// Printed card type first, then its parent.
    pub card_types: SmallVec<[CardType; 2]>,
    pub names: SmallVec<[CardId; 1]>,
    pub level: i64,
    pub types: SmallVec<[String; 2]>,
    pub attack: Option<i64>,
    pub defense: Option<i64>,
    /// Which units an equipable item may be equipped to.
    pub equipable_to: Option<Arc<Expr>>,
    pub abilities: Vec<AbilityDefinition>,
}

impl CardDefinition {
    #[must_use]
    pub fn new(id: CardId, card_type: CardType) -> Self {
        let is_unit = card_type.with_parent().contains(&CardType::Unit);
        Self {
            id,
            card_types: card_type.with_parent(),
            names: smallvec![id],
            level: 0,
            types: SmallVec::new(),
            attack: is_unit.then_some(0),
            defense: is_unit.then_some(0),
            equipable_to: None,
            abilities: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: i64) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_stats(mut self, attack: i64, defense: i64) -> Self {
        self.attack = Some(attack);
        self.defense = Some(defense);
        self
    }

    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: CardId) -> Self {
        self.names = smallvec![name];
        self
    }

    /// Add an ability. Its id is rewritten to this card and its position.
    #[must_use]
    pub fn with_ability(mut self, mut ability: AbilityDefinition) -> Self {
        ability.id = AbilityId::new(self.id, self.abilities.len() as u16);
        self.abilities.push(ability);
        self
    }

    #[must_use]
    pub fn printed_type(&self) -> Option<CardType> {
        self.card_types.first().copied()
    }

    #[must_use]
    pub fn has_card_type(&self, card_type: CardType) -> bool {
        self.card_types.contains(&card_type)
    }

    #[must_use]
    pub fn ability(&self, index: u16) -> Option<&AbilityDefinition> {
        self.abilities.get(index as usize)
    }

    /// The values a fresh instance of this card starts with.
    #[must_use]
    pub fn initial_values(&self) -> CardValues {
        let is_unit = self.has_card_type(CardType::Unit);
        CardValues {
            card_types: self.card_types.clone(),
            names: self.names.clone(),
            level: self.level,
            types: self.types.clone(),
            attack: self.attack.filter(|_| is_unit),
            defense: self.defense.filter(|_| is_unit),
            abilities: self
                .abilities
                .iter()
                .map(|a| AbilityValue {
                    id: a.id,
                    cancelled: false,
                })
                .collect(),
            attack_rights: is_unit.then_some(1),
            can_attack: is_unit.then_some(true),
            can_counterattack: is_unit.then_some(true),
            do_life_damage: true,
        }
    }
}

const CARD_KEYS: &[&str] = &[
    "id",
    "cardType",
    "name",
    "level",
    "types",
    "attack",
    "defense",
    "equipableTo",
    "deckLimit",
];

const ABILITY_KEYS: &[&str] = &[
    "o",
    "turnLimit",
    "gameLimit",
    "mandatory",
    "during",
    "condition",
    "trigger",
    "applyTo",
    "modifier",
    "cancellable",
    "cost",
    "exec",
];

/// Split a `key: value` line if `key` is a known key.
fn split_key(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if CARD_KEYS.contains(&key) || ABILITY_KEYS.contains(&key) {
        Some((key, value.trim()))
    } else {
        None
    }
}

fn invalid(field: &str, value: &str) -> DefinitionError {
    DefinitionError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, DefinitionError> {
    value.parse().map_err(|_| invalid(field, value))
}

fn parse_flag(field: &str, value: &str) -> Result<bool, DefinitionError> {
    match value {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(invalid(field, value)),
    }
}

/// Which script block subsequent lines belong to.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Cost,
    Exec,
}

/// Fields of one ability section, unparsed.
struct AbilitySection {
    kind: AbilityKind,
    fields: Vec<(&'static str, String)>,
    cost: Vec<String>,
    exec: Vec<String>,
}

impl AbilitySection {
    fn build(self, id: AbilityId) -> Result<AbilityDefinition, DefinitionError> {
        let mut ability = AbilityDefinition::new(id, self.kind);
        let mut parser = ScriptParser::new();
        let script_error = |part: &str, source: ScriptError| DefinitionError::Script {
            location: format!("{id} {part}"),
            source,
        };

        for (key, value) in &self.fields {
            let key: &str = key;
            let mut expression = || {
                parser
                    .parse_expression(value)
                    .map(Arc::new)
                    .map_err(|e| script_error(key, e))
            };
            match key {
                "turnLimit" => ability.turn_limit = Some(parse_number(key, value)?),
                "gameLimit" => ability.game_limit = Some(parse_number(key, value)?),
                "mandatory" => ability.mandatory = parse_flag(key, value)?,
                "cancellable" => ability.cancellable = parse_flag(key, value)?,
                "during" => ability.during = Some(expression()?),
                "condition" => ability.condition = Some(expression()?),
                "trigger" => ability.trigger = Some(expression()?),
                "applyTo" => ability.apply_to = Some(expression()?),
                "modifier" => ability.modifier = Some(expression()?),
                _ => {}
            }
        }

        let incomplete_static = ability.apply_to.is_none() || ability.modifier.is_none();
        if self.kind == AbilityKind::Static && incomplete_static {
            return Err(DefinitionError::MissingField {
                field: format!("{id} applyTo/modifier"),
            });
        }

        ability.cost = Arc::new(
            parser
                .parse_script(&self.cost.join("\n"))
                .map_err(|e| script_error("cost", e))?,
        );
        ability.exec = Arc::new(
            parser
                .parse_script(&self.exec.join("\n"))
                .map_err(|e| script_error("exec", e))?,
        );
        Ok(ability)
    }
}

fn static_key(key: &str) -> &'static str {
    ABILITY_KEYS
        .iter()
        .chain(CARD_KEYS)
        .find(|k| **k == key)
        .copied()
        .unwrap_or("")
}

/// Parse one card definition from its text form.
///
/// ```
/// use cu_rules::cards::{parse_definition, CardType};
///
/// let def = parse_definition("id: CU00003\ncardType: standardSpell\nlevel: 1\no: cast\nexec:\nDRAW(2)").unwrap();
/// assert!(def.has_card_type(CardType::Spell));
/// assert_eq!(def.abilities.len(), 1);
/// ```
pub fn parse_definition(text: &str) -> Result<CardDefinition, DefinitionError> {
    let mut id = None;
    let mut card_type = None;
    let mut name = None;
    let mut level = None;
    let mut types: Vec<String> = Vec::new();
    let mut attack = None;
    let mut defense = None;
    let mut equipable_to = None;
    let mut sections: Vec<AbilitySection> = Vec::new();
    let mut block = Block::None;

    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = split_key(line) else {
            let Some(section) = sections.last_mut() else {
                return Err(DefinitionError::Malformed {
                    line: line_number,
                    message: format!("expected a key, found '{line}'"),
                });
            };
            match block {
                Block::Cost => section.cost.push(line.to_string()),
                Block::Exec => section.exec.push(line.to_string()),
                Block::None => {
                    return Err(DefinitionError::Malformed {
                        line: line_number,
                        message: format!("script line outside of cost or exec: '{line}'"),
                    })
                }
            }
            continue;
        };
        block = Block::None;

        if key == "o" {
            sections.push(AbilitySection {
                kind: AbilityKind::parse(value)?,
                fields: Vec::new(),
                cost: Vec::new(),
                exec: Vec::new(),
            });
            continue;
        }
        if let Some(section) = sections.last_mut() {
            match key {
                "cost" | "exec" => {
                    block = if key == "cost" { Block::Cost } else { Block::Exec };
                    let target = if key == "cost" {
                        &mut section.cost
                    } else {
                        &mut section.exec
                    };
                    if !value.is_empty() {
                        target.push(value.to_string());
                    }
                }
                _ if ABILITY_KEYS.contains(&key) => {
                    section.fields.push((static_key(key), value.to_string()));
                }
                _ => {
                    return Err(DefinitionError::Malformed {
                        line: line_number,
                        message: format!("card field {key} inside an ability section"),
                    })
                }
            }
            continue;
        }

        match key {
            "id" => id = Some(CardId::parse(value).ok_or_else(|| invalid(key, value))?),
            "cardType" => {
                card_type = Some(CardType::parse(value).ok_or_else(|| invalid(key, value))?);
            }
            "name" => name = Some(CardId::parse(value).ok_or_else(|| invalid(key, value))?),
            "level" => level = Some(parse_number::<i64>(key, value)?),
            "types" => {
                types = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "attack" => attack = Some(parse_number::<i64>(key, value)?),
            "defense" => defense = Some(parse_number::<i64>(key, value)?),
            "equipableTo" => {
                let expr = ScriptParser::new()
                    .parse_expression(value)
                    .map_err(|source| DefinitionError::Script {
                        location: "equipableTo".to_string(),
                        source,
                    })?;
                equipable_to = Some(Arc::new(expr));
            }
            // deck building is not enforced here
            "deckLimit" => {}
            _ => {
                return Err(DefinitionError::Malformed {
                    line: line_number,
                    message: format!("{key} outside an ability section"),
                })
            }
        }
    }

    let id = id.ok_or_else(|| DefinitionError::MissingField {
        field: "id".to_string(),
    })?;
    let card_type = card_type.ok_or_else(|| DefinitionError::MissingField {
        field: "cardType".to_string(),
    })?;

    let mut definition = CardDefinition::new(id, card_type)
        .with_level(level.unwrap_or(0))
        .with_types(types)
        .with_name(name.unwrap_or(id));
    if definition.has_card_type(CardType::Unit) {
        definition.attack = Some(attack.unwrap_or(0));
        definition.defense = Some(defense.unwrap_or(0));
    }
    definition.equipable_to = equipable_to;
    for (index, section) in sections.into_iter().enumerate() {
        let ability = section.build(AbilityId::new(id, index as u16))?;
        definition.abilities.push(ability);
    }
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ast::Statement;

    const DRAGON: &str = "id: CU00010
cardType: unit
name: CU00010
level: 4
types: Dragon, Fire
attack: 400
defense: 300
o: optional
turnLimit: 1
condition: you.mana > 0
cost:
$card = SELECT(1, [card from you.hand])
DISCARD($card)
exec:
DRAW($card.level)
o: trigger
mandatory: yes
trigger: destroyed = this
exec:
opponent.DAMAGE(100)";

    #[test]
    fn test_card_id_parse() {
        assert_eq!(CardId::parse("CU00001"), Some(CardId::new(1)));
        assert_eq!(CardId::parse("CU"), None);
        assert_eq!(CardId::parse("CUx1"), None);
        assert_eq!(CardId::new(12).to_string(), "CU00012");
    }

    #[test]
    fn test_card_type_parents() {
        assert_eq!(
            CardType::Token.with_parent().as_slice(),
            &[CardType::Token, CardType::Unit]
        );
        assert_eq!(CardType::EquipableItem.parent(), Some(CardType::Item));
        assert_eq!(CardType::EnchantSpell.parent(), Some(CardType::Spell));
        assert_eq!(CardType::Unit.parent(), None);
        assert_eq!(CardType::parse("continuousItem"), Some(CardType::ContinuousItem));
    }

    #[test]
    fn test_parse_unit_with_abilities() {
        let def = parse_definition(DRAGON).unwrap();
        assert_eq!(def.id, CardId::new(10));
        assert_eq!(def.level, 4);
        assert_eq!(def.types.as_slice(), &["Dragon".to_string(), "Fire".to_string()]);
        assert_eq!(def.attack, Some(400));
        assert_eq!(def.abilities.len(), 2);

        let optional = &def.abilities[0];
        assert_eq!(optional.kind, AbilityKind::Optional);
        assert_eq!(optional.turn_limit, Some(1));
        assert!(optional.condition.is_some());
        assert_eq!(optional.cost.statements.len(), 2);
        assert!(matches!(optional.exec.statements[0], Statement::Calls { .. }));

        let trigger = &def.abilities[1];
        assert_eq!(trigger.id, AbilityId::new(CardId::new(10), 1));
        assert!(trigger.mandatory);
        assert!(trigger.trigger.is_some());
    }

    #[test]
    fn test_spells_have_no_stats() {
        let def = parse_definition("id: CU00002\ncardType: continuousSpell\nlevel: 2\nattack: 100").unwrap();
        assert_eq!(def.attack, None);
        let values = def.initial_values();
        assert_eq!(values.attack, None);
        assert_eq!(values.attack_rights, None);
        assert!(values.has_card_type(CardType::Spell));
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            parse_definition("cardType: unit"),
            Err(DefinitionError::MissingField { .. })
        ));
        assert!(matches!(
            parse_definition("id: CU00001\ncardType: wizard"),
            Err(DefinitionError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_script_errors_name_the_ability() {
        let err = parse_definition("id: CU00005\ncardType: unit\no: fast\nexec:\nNOTHING(1)")
            .unwrap_err();
        match err {
            DefinitionError::Script { location, .. } => assert_eq!(location, "CU00005:0 exec"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_stray_script_line() {
        assert!(matches!(
            parse_definition("id: CU00005\ncardType: unit\nDRAW(1)"),
            Err(DefinitionError::Malformed { line: 3, .. })
        ));
    }

    #[test]
    fn test_static_needs_modifier() {
        let err = parse_definition("id: CU00006\ncardType: unit\no: static\napplyTo: [unit from you.field]");
        assert!(matches!(err, Err(DefinitionError::MissingField { .. })));
    }
}
