//! Card registry for definition lookup.
//!
//! The `CardRegistry` stores every card definition a match may use. It is
//! built before the game starts and shared read-only afterwards.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::abilities::{AbilityDefinition, AbilityId};
use crate::core::{DefinitionError, EngineError};

use super::definition::{parse_definition, CardDefinition, CardId};

/// Registry of card definitions.
///
/// ```
/// use cu_rules::cards::{CardDefinition, CardId, CardRegistry, CardType};
///
/// let mut registry = CardRegistry::new();
/// registry
///     .register(CardDefinition::new(CardId::new(1), CardType::Unit).with_stats(100, 100))
///     .unwrap();
///
/// let found = registry.get(CardId::new(1)).unwrap();
/// assert_eq!(found.attack, Some(100));
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CardRegistry {
    cards: FxHashMap<CardId, Arc<CardDefinition>>,
}

impl CardRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card definition. Ids must be unique.
    pub fn register(&mut self, card: CardDefinition) -> Result<(), DefinitionError> {
        if self.cards.contains_key(&card.id) {
            return Err(DefinitionError::DuplicateCard(card.id.to_string()));
        }
        self.cards.insert(card.id, Arc::new(card));
        Ok(())
    }

    /// Parse and register a definition in text form. Returns its id.
    pub fn register_text(&mut self, text: &str) -> Result<CardId, DefinitionError> {
        let card = parse_definition(text)?;
        let id = card.id;
        self.register(card)?;
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: CardId) -> Option<&Arc<CardDefinition>> {
        self.cards.get(&id)
    }

    /// Get a card definition, failing for unknown ids.
    pub fn definition(&self, id: CardId) -> Result<&Arc<CardDefinition>, DefinitionError> {
        self.cards
            .get(&id)
            .ok_or_else(|| DefinitionError::UnknownCard(id.to_string()))
    }

    pub fn ability(&self, id: AbilityId) -> Result<&AbilityDefinition, EngineError> {
        self.cards
            .get(&id.card)
            .and_then(|card| card.ability(id.index))
            .ok_or_else(|| EngineError::UnknownAbility(id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, id: CardId) -> bool {
        self.cards.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CardDefinition>> {
        self.cards.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardType;

    #[test]
    fn test_register_and_get() {
        let mut registry = CardRegistry::new();
        registry
            .register(CardDefinition::new(CardId::new(1), CardType::Unit))
            .unwrap();

        assert!(registry.get(CardId::new(1)).is_some());
        assert!(registry.get(CardId::new(99)).is_none());
        assert!(matches!(
            registry.definition(CardId::new(99)),
            Err(DefinitionError::UnknownCard(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = CardRegistry::new();
        registry
            .register(CardDefinition::new(CardId::new(1), CardType::Unit))
            .unwrap();
        let err = registry
            .register(CardDefinition::new(CardId::new(1), CardType::Item))
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateCard("CU00001".into()));
    }

    #[test]
    fn test_ability_lookup() {
        let mut registry = CardRegistry::new();
        let id = registry
            .register_text("id: CU00004\ncardType: unit\no: fast\nexec:\nDRAW(1)")
            .unwrap();

        let ability = registry.ability(AbilityId::new(id, 0)).unwrap();
        assert!(ability.cancellable);
        assert!(matches!(
            registry.ability(AbilityId::new(id, 1)),
            Err(EngineError::UnknownAbility(_))
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut registry = CardRegistry::new();
        registry
            .register_text("id: CU00008\ncardType: standardItem\nlevel: 1\ntypes: Book")
            .unwrap();
        let json = serde_json::to_string(&registry).unwrap();
        let back: CardRegistry = serde_json::from_str(&json).unwrap();
        assert!(back.contains(CardId::new(8)));
        assert_eq!(back.iter().count(), 1);
    }
}
