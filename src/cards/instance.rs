//! Card instances: runtime card state.
//!
//! `Card` is one physical card in a match. It lives in the game's card
//! arena for the whole match, whatever zone it is in. Leaving a zone bumps
//! its epoch and resets everything a fresh card would not have: modified
//! values, counters and attack bookkeeping.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::abilities::{AbilityId, AbilityState};
use crate::core::{CardRef, EntityId, PlayerId};
use crate::values::{CardValues, ObjectValues};
use crate::zones::{ZoneKind, ZoneRef, ZoneVisibility};

use super::definition::{CardDefinition, CardId, CardType};

/// A card in a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Card {
    pub entity: EntityId,
    /// Incremented on every zone change.
    pub epoch: u32,
    pub definition: Arc<CardDefinition>,
    pub owner: PlayerId,
    pub zone: Option<ZoneRef>,
    /// Reserved a field slot but not yet on the field.
    pub placed: bool,
    pub values: ObjectValues<CardValues>,
    pub hidden_from: SmallVec<[PlayerId; 2]>,
    pub equipped_to: Option<EntityId>,
    pub equipments: Vec<EntityId>,
    pub attacks_made: u32,
    /// Granted an extra attack by GIVEATTACK this turn.
    pub can_attack_again: bool,
    pub counters: FxHashMap<String, i64>,
    pub abilities: FxHashMap<AbilityId, AbilityState>,
    pub is_token: bool,
    /// A token that left the field. It is in no zone and never returns.
    pub removed: bool,
}

impl Card {
    #[must_use]
    pub fn new(entity: EntityId, definition: Arc<CardDefinition>, owner: PlayerId) -> Self {
        let values = ObjectValues::new(definition.initial_values());
        let abilities = definition
            .abilities
            .iter()
            .map(|a| (a.id, AbilityState::default()))
            .collect();
        Self {
            entity,
            epoch: 0,
            is_token: definition.has_card_type(CardType::Token),
            definition,
            owner,
            zone: None,
            placed: false,
            values,
            hidden_from: SmallVec::new(),
            equipped_to: None,
            equipments: Vec::new(),
            attacks_made: 0,
            can_attack_again: false,
            counters: FxHashMap::default(),
            abilities,
            removed: false,
        }
    }

    #[must_use]
    pub fn card_id(&self) -> CardId {
        self.definition.id
    }

    /// Reference to this card in its current zone stay.
    #[must_use]
    pub fn current_ref(&self) -> CardRef {
        CardRef::new(self.entity, self.epoch)
    }

    #[must_use]
    pub fn zone_kind(&self) -> Option<ZoneKind> {
        self.zone.map(|z| z.kind)
    }

    /// On the field proper, not merely placed.
    #[must_use]
    pub fn is_on_field(&self) -> bool {
        !self.placed && self.zone_kind().is_some_and(ZoneKind::is_field)
    }

    #[must_use]
    pub fn is_hidden_from(&self, player: PlayerId) -> bool {
        self.hidden_from.contains(&player)
    }

    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.values.current.has_card_type(CardType::Unit)
    }

    #[must_use]
    pub fn ability_state(&self, ability: AbilityId) -> Option<&AbilityState> {
        self.abilities.get(&ability)
    }

    pub fn ability_state_mut(&mut self, ability: AbilityId) -> &mut AbilityState {
        self.abilities.entry(ability).or_default()
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Set visibility to what a card entering `zone` has.
    pub fn reveal_for_zone(&mut self, zone: ZoneRef) {
        self.hidden_from = match zone.kind.visibility() {
            ZoneVisibility::Public => SmallVec::new(),
            ZoneVisibility::OwnerOnly => SmallVec::from_slice(&[self.owner.next()]),
            ZoneVisibility::Hidden => SmallVec::from_slice(&[PlayerId::new(0), PlayerId::new(1)]),
        };
    }

    /// Forget everything tied to the previous zone stay.
    ///
    /// Modifiers, counters and attack state are dropped. Per-game ability
    /// counts survive.
    pub fn reset_for_new_zone(&mut self) {
        self.epoch += 1;
        self.values = ObjectValues::new(self.definition.initial_values());
        self.counters.clear();
        self.attacks_made = 0;
        self.can_attack_again = false;
        for state in self.abilities.values_mut() {
            *state = AbilityState {
                activations_this_game: state.activations_this_game,
                ..AbilityState::default()
            };
        }
    }

    /// Clear per-turn bookkeeping at the end of a turn.
    pub fn end_turn(&mut self) {
        self.attacks_made = 0;
        self.can_attack_again = false;
        for state in self.abilities.values_mut() {
            state.activations_this_turn = 0;
        }
    }

    /// Whether this unit may still declare an attack this turn.
    #[must_use]
    pub fn can_declare_attack(&self) -> bool {
        let values = &self.values.current;
        if !self.is_on_field() || !values.has_card_type(CardType::Unit) {
            return false;
        }
        if values.can_attack == Some(false) {
            return false;
        }
        let rights = values.attack_rights.unwrap_or(1).max(0) as u32;
        self.attacks_made < rights || self.can_attack_again
    }
}

/// A card frozen at the moment an action happened to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub card: Card,
    /// Index or slot the card held in its zone.
    pub index: Option<usize>,
    /// The timing the snapshot was taken in.
    pub timing: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::ZoneKind;

    fn unit() -> Card {
        let def = CardDefinition::new(CardId::new(1), CardType::Unit).with_stats(100, 50);
        Card::new(EntityId(0), Arc::new(def), PlayerId::new(0))
    }

    #[test]
    fn test_new_card() {
        let card = unit();
        assert_eq!(card.current_ref(), CardRef::new(EntityId(0), 0));
        assert!(!card.is_token);
        assert!(!card.is_on_field());
        assert_eq!(card.values.current.attack(), 100);
        assert_eq!(card.counter("charge"), 0);
    }

    #[test]
    fn test_visibility_per_zone() {
        let mut card = unit();
        let p0 = PlayerId::new(0);
        card.reveal_for_zone(ZoneRef::new(p0, ZoneKind::Hand));
        assert!(card.is_hidden_from(p0.next()));
        assert!(!card.is_hidden_from(p0));

        card.reveal_for_zone(ZoneRef::new(p0, ZoneKind::Deck));
        assert!(card.is_hidden_from(p0));

        card.reveal_for_zone(ZoneRef::new(p0, ZoneKind::Discard));
        assert!(card.hidden_from.is_empty());
    }

    #[test]
    fn test_reset_for_new_zone() {
        let mut card = unit();
        card.counters.insert("charge".into(), 2);
        card.attacks_made = 1;
        card.values.current.attack = Some(999);

        card.reset_for_new_zone();
        assert_eq!(card.epoch, 1);
        assert!(card.counters.is_empty());
        assert_eq!(card.attacks_made, 0);
        assert_eq!(card.values.current.attack(), 100);
    }

    #[test]
    fn test_attack_rights() {
        let mut card = unit();
        card.zone = Some(ZoneRef::new(PlayerId::new(0), ZoneKind::Unit));
        assert!(card.can_declare_attack());

        card.attacks_made = 1;
        assert!(!card.can_declare_attack());
        card.can_attack_again = true;
        assert!(card.can_declare_attack());

        card.end_turn();
        card.values.current.can_attack = Some(false);
        assert!(!card.can_declare_attack());
    }
}
