//! Game state: cards, players and turn progress.
//!
//! `GameState` is plain data. It has no driver and no random source, so it
//! can be cloned, serialized and evaluated against freely; everything that
//! needs a player's input goes through `Game`.
//!
//! ## Card arena
//!
//! Every card of the match lives in `cards`, indexed by `EntityId`. Zones
//! hold ids only. `move_card` keeps the two in sync and applies the zone
//! change rules: a new epoch, fresh values, zone visibility, unequipping
//! and token removal.

use std::sync::Arc;

use im::Vector;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::config::RulesConfig;
use super::entity::EntityId;
use super::error::EngineError;
use super::player::{Player, PlayerId, PlayerMap};
use crate::actions::Action;
use crate::cards::{Card, CardDefinition, CardRegistry, CardSnapshot};
use crate::script::ast::PhaseName;
use crate::script::ScriptValue;
use crate::values::{ModifierId, StatTarget};
use crate::zones::{PlayerZones, ZoneKind, ZonePosition, ZoneRef};

/// Where a card sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub zone: ZoneRef,
    /// Pile index (0 = bottom) or field slot.
    pub index: usize,
    /// In a field zone's placement buffer rather than its slots.
    pub placed: bool,
}

/// Where in a zone a moved card lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Pile(ZonePosition),
    Slot(usize),
}

/// The attack currently in progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackDeclaration {
    pub player: PlayerId,
    pub attackers: Vec<EntityId>,
    pub target: Option<EntityId>,
    /// The fight for this attack has been resolved.
    pub fought: bool,
    /// CANCELATTACK ran; the fight will not happen.
    pub cancelled: bool,
}

impl AttackDeclaration {
    #[must_use]
    pub fn is_combined(&self) -> bool {
        self.attackers.len() > 1
    }
}

/// A temporary stat change and the turn at whose end it is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expiration {
    pub turn: u32,
    pub target: StatTarget,
    pub modifier: ModifierId,
}

/// Complete state of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    pub config: Arc<RulesConfig>,
    pub registry: Arc<CardRegistry>,
    pub players: PlayerMap<Player>,
    pub cards: Vec<Card>,
    /// Starts at 1 with the first turn.
    pub turn_number: u32,
    pub turn_player: PlayerId,
    pub phase: Option<PhaseName>,
    /// Incremented for every timing that runs.
    pub timing_counter: u64,
    pub attack: Option<AttackDeclaration>,
    /// Actions executed this turn, in order.
    pub turn_actions: Vector<Action>,
    /// Actions executed by the block currently resolving or being created.
    pub block_actions: Vector<Action>,
    /// Stat changes waiting for the end of a turn.
    pub expirations: Vec<Expiration>,
    next_modifier_id: u64,
}

impl GameState {
    #[must_use]
    pub fn new(config: Arc<RulesConfig>, registry: Arc<CardRegistry>) -> Self {
        let players = PlayerMap::new(|id| Player::new(id, &config));
        Self {
            config,
            registry,
            players,
            cards: Vec::new(),
            turn_number: 0,
            turn_player: PlayerId::new(0),
            phase: None,
            timing_counter: 0,
            attack: None,
            turn_actions: Vector::new(),
            block_actions: Vector::new(),
            expirations: Vec::new(),
            next_modifier_id: 0,
        }
    }

    pub fn card(&self, id: EntityId) -> Result<&Card, EngineError> {
        self.cards.get(id.index()).ok_or(EngineError::UnknownCard(id))
    }

    pub fn card_mut(&mut self, id: EntityId) -> Result<&mut Card, EngineError> {
        self.cards
            .get_mut(id.index())
            .ok_or(EngineError::UnknownCard(id))
    }

    /// Ids of every card that still exists.
    pub fn card_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.cards.iter().filter(|c| !c.removed).map(|c| c.entity)
    }

    #[must_use]
    pub fn zones(&self, player: PlayerId) -> &PlayerZones {
        &self.players[player].zones
    }

    /// Cards in a zone: bottom to top for piles, slot order for the field.
    #[must_use]
    pub fn cards_in(&self, zone: ZoneRef) -> Vec<EntityId> {
        self.zones(zone.player).cards_in(zone.kind)
    }

    /// Cards on either player's field.
    #[must_use]
    pub fn field_cards(&self) -> Vec<EntityId> {
        PlayerId::all()
            .flat_map(|player| {
                ZoneKind::FIELD
                    .into_iter()
                    .flat_map(move |kind| self.cards_in(ZoneRef::new(player, kind)))
            })
            .collect()
    }

    #[must_use]
    pub fn allocate_modifier_id(&mut self) -> ModifierId {
        self.next_modifier_id += 1;
        ModifierId(self.next_modifier_id)
    }

    /// The phase the game is in, as a script value.
    #[must_use]
    pub fn current_phase_value(&self) -> Option<ScriptValue> {
        self.phase.map(|phase| ScriptValue::Phase {
            player: Some(self.turn_player),
            phase,
        })
    }

    /// Add a new card to the arena and put it into a zone.
    pub fn add_card(
        &mut self,
        definition: Arc<CardDefinition>,
        owner: PlayerId,
        zone: ZoneRef,
        destination: Destination,
    ) -> Result<EntityId, EngineError> {
        let id = EntityId::new(self.cards.len() as u32);
        self.cards.push(Card::new(id, definition, owner));
        self.insert(id, zone, destination, false)?;
        let card = self.card_mut(id)?;
        card.zone = Some(zone);
        card.reveal_for_zone(zone);
        Ok(id)
    }

    /// Add a card that is in no zone yet, such as a fresh token.
    pub fn add_detached_card(
        &mut self,
        definition: Arc<CardDefinition>,
        owner: PlayerId,
    ) -> EntityId {
        let id = EntityId::new(self.cards.len() as u32);
        self.cards.push(Card::new(id, definition, owner));
        id
    }

    /// Where a card currently is.
    #[must_use]
    pub fn location(&self, id: EntityId) -> Option<Location> {
        let zone = self.card(id).ok()?.zone?;
        let zones = self.zones(zone.player);
        if let Some(pile) = zones.pile(zone.kind) {
            return Some(Location {
                zone,
                index: pile.index_of(id)?,
                placed: false,
            });
        }
        let field = zones.field(zone.kind)?;
        match field.index_of(id) {
            Some(slot) => Some(Location {
                zone,
                index: slot,
                placed: false,
            }),
            None => Some(Location {
                zone,
                index: field.placed_index_of(id)?,
                placed: true,
            }),
        }
    }

    /// Freeze a card as it is now.
    pub fn snapshot(&self, id: EntityId) -> Result<CardSnapshot, EngineError> {
        Ok(CardSnapshot {
            card: self.card(id)?.clone(),
            index: self.location(id).map(|l| l.index),
            timing: self.timing_counter,
        })
    }

    fn detach(&mut self, id: EntityId) -> Result<Option<Location>, EngineError> {
        let location = self.location(id);
        if let Some(location) = location {
            let zones = &mut self.players[location.zone.player].zones;
            let removed = if let Some(field) = zones.field_mut(location.zone.kind) {
                field.remove(id).is_some()
            } else {
                zones
                    .pile_mut(location.zone.kind)
                    .and_then(|pile| pile.remove(id))
                    .is_some()
            };
            if !removed {
                return Err(EngineError::Invariant(format!(
                    "{id} is not in {}",
                    location.zone
                )));
            }
        }
        Ok(location)
    }

    fn insert(
        &mut self,
        id: EntityId,
        zone: ZoneRef,
        destination: Destination,
        placed: bool,
    ) -> Result<(), EngineError> {
        let zones = &mut self.players[zone.player].zones;
        let inserted = if let Some(field) = zones.field_mut(zone.kind) {
            let slot = match destination {
                Destination::Slot(slot) => Some(slot),
                Destination::Pile(_) => field.free_slots().first().copied(),
            };
            match slot {
                Some(slot) if placed => field.place(slot, id),
                Some(slot) => field.occupy(slot, id),
                None => false,
            }
        } else if let Some(pile) = zones.pile_mut(zone.kind) {
            let position = match destination {
                Destination::Pile(position) => position,
                Destination::Slot(index) => ZonePosition::Index(index),
            };
            pile.insert(id, position);
            true
        } else {
            false
        };
        if inserted {
            Ok(())
        } else {
            Err(EngineError::Invariant(format!(
                "{id} does not fit into {zone}"
            )))
        }
    }

    /// Detach a card from the unit it equips and from its own equipments.
    pub fn unequip(&mut self, id: EntityId) -> Result<(), EngineError> {
        if let Some(unit) = self.card_mut(id)?.equipped_to.take() {
            self.card_mut(unit)?.equipments.retain(|&e| e != id);
        }
        let equipments = std::mem::take(&mut self.card_mut(id)?.equipments);
        for equipment in equipments {
            self.card_mut(equipment)?.equipped_to = None;
        }
        Ok(())
    }

    /// Move a card into a zone as a new card. Returns where it was.
    ///
    /// A token that leaves the field is removed from the game instead.
    pub fn move_card(
        &mut self,
        id: EntityId,
        zone: ZoneRef,
        destination: Destination,
    ) -> Result<Option<Location>, EngineError> {
        let from = self.detach(id)?;
        let was_on_field = self.card(id)?.is_on_field();
        if was_on_field {
            self.unequip(id)?;
            if let Some(attack) = &mut self.attack {
                attack.attackers.retain(|&a| a != id);
                if attack.target == Some(id) {
                    attack.target = None;
                }
            }
        }

        let card = self.card_mut(id)?;
        if card.is_token && (was_on_field || card.placed) && !zone.kind.is_field() {
            card.reset_for_new_zone();
            card.zone = None;
            card.placed = false;
            card.removed = true;
            trace!(card = %id, "token removed");
            return Ok(from);
        }

        self.insert(id, zone, destination, false)?;
        let card = self.card_mut(id)?;
        card.reset_for_new_zone();
        card.zone = Some(zone);
        card.placed = false;
        card.reveal_for_zone(zone);
        trace!(card = %id, to = %zone, epoch = card.epoch, "card moved");
        Ok(from)
    }

    /// Reserve a field slot for a card that is being summoned, deployed or
    /// cast. The card keeps its epoch and becomes public.
    pub fn place(
        &mut self,
        id: EntityId,
        zone: ZoneRef,
        slot: usize,
    ) -> Result<Option<Location>, EngineError> {
        let from = self.detach(id)?;
        self.insert(id, zone, Destination::Slot(slot), true)?;
        let card = self.card_mut(id)?;
        card.zone = Some(zone);
        card.placed = true;
        card.hidden_from.clear();
        Ok(from)
    }

    /// Put a card back exactly as a snapshot recorded it.
    pub fn restore(
        &mut self,
        snapshot: &CardSnapshot,
        location: Option<Location>,
    ) -> Result<(), EngineError> {
        let id = snapshot.card.entity;
        if !self.card(id)?.removed {
            self.detach(id)?;
        }
        if let Some(location) = location {
            let destination = if location.zone.kind.is_field() {
                Destination::Slot(location.index)
            } else {
                Destination::Pile(ZonePosition::Index(location.index))
            };
            self.insert(id, location.zone, destination, location.placed)?;
        }
        *self.card_mut(id)? = snapshot.card.clone();

        if let Some(unit) = snapshot.card.equipped_to {
            let unit = self.card_mut(unit)?;
            if !unit.equipments.contains(&id) {
                unit.equipments.push(id);
            }
        }
        for &equipment in &snapshot.card.equipments {
            self.card_mut(equipment)?.equipped_to = Some(id);
        }
        Ok(())
    }

    /// Swap the positions of two cards. A card that changes zones becomes
    /// a new card there.
    pub fn swap_positions(&mut self, a: EntityId, b: EntityId) -> Result<(), EngineError> {
        let (Some(la), Some(lb)) = (self.location(a), self.location(b)) else {
            return Err(EngineError::Invariant(format!("{a} or {b} is in no zone")));
        };
        self.detach(a)?;
        self.detach(b)?;
        let slot = |l: Location| {
            if l.zone.kind.is_field() {
                Destination::Slot(l.index)
            } else {
                Destination::Pile(ZonePosition::Index(l.index))
            }
        };
        // reinsert the lower pile index first so indexes stay valid
        let (first, second) = if la.index <= lb.index {
            ((b, la), (a, lb))
        } else {
            ((a, lb), (b, la))
        };
        self.insert(first.0, first.1.zone, slot(first.1), first.1.placed)?;
        self.insert(second.0, second.1.zone, slot(second.1), second.1.placed)?;
        for (id, from, to) in [(a, la, lb), (b, lb, la)] {
            let card = self.card_mut(id)?;
            if from.zone != to.zone {
                card.reset_for_new_zone();
                card.reveal_for_zone(to.zone);
            }
            card.zone = Some(to.zone);
            card.placed = to.placed;
        }
        Ok(())
    }

    /// Top `count` cards of a deck, topmost first.
    #[must_use]
    pub fn deck_top(&self, player: PlayerId, count: usize) -> Vec<EntityId> {
        self.zones(player)
            .deck
            .top(count)
            .iter()
            .rev()
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardId, CardType};

    fn state() -> GameState {
        GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()))
    }

    fn add(state: &mut GameState, card_type: CardType, zone: ZoneRef) -> EntityId {
        let def = Arc::new(CardDefinition::new(CardId::new(1), card_type));
        state
            .add_card(def, zone.player, zone, Destination::Pile(ZonePosition::Top))
            .unwrap()
    }

    fn p0() -> PlayerId {
        PlayerId::new(0)
    }

    #[test]
    fn test_add_and_locate() {
        let mut state = state();
        let hand = ZoneRef::new(p0(), ZoneKind::Hand);
        let a = add(&mut state, CardType::Unit, hand);
        let b = add(&mut state, CardType::Unit, hand);

        assert_eq!(state.cards_in(hand), vec![a, b]);
        assert_eq!(state.location(b).unwrap().index, 1);
        assert!(state.card(a).unwrap().is_hidden_from(p0().next()));
        assert!(state.card(EntityId(9)).is_err());
    }

    #[test]
    fn test_move_bumps_epoch() {
        let mut state = state();
        let hand = ZoneRef::new(p0(), ZoneKind::Hand);
        let units = ZoneRef::new(p0(), ZoneKind::Unit);
        let a = add(&mut state, CardType::Unit, hand);

        let from = state.move_card(a, units, Destination::Slot(2)).unwrap();
        assert_eq!(from.unwrap().zone, hand);
        let card = state.card(a).unwrap();
        assert_eq!(card.epoch, 1);
        assert!(card.is_on_field());
        assert!(card.hidden_from.is_empty());
        assert_eq!(state.location(a).unwrap().index, 2);
    }

    #[test]
    fn test_token_leaving_field_is_removed() {
        let mut state = state();
        let units = ZoneRef::new(p0(), ZoneKind::Unit);
        let token = add(&mut state, CardType::Token, units);

        state
            .move_card(token, ZoneRef::new(p0(), ZoneKind::Discard), Destination::Pile(ZonePosition::Top))
            .unwrap();
        assert!(state.card(token).unwrap().removed);
        assert!(state.cards_in(ZoneRef::new(p0(), ZoneKind::Discard)).is_empty());
        assert_eq!(state.card_ids().count(), 0);
    }

    #[test]
    fn test_leaving_field_unequips() {
        let mut state = state();
        let units = ZoneRef::new(p0(), ZoneKind::Unit);
        let items = ZoneRef::new(p0(), ZoneKind::SpellItem);
        let unit = add(&mut state, CardType::Unit, units);
        let item = add(&mut state, CardType::EquipableItem, items);
        state.card_mut(unit).unwrap().equipments.push(item);
        state.card_mut(item).unwrap().equipped_to = Some(unit);

        state
            .move_card(unit, ZoneRef::new(p0(), ZoneKind::Discard), Destination::Pile(ZonePosition::Top))
            .unwrap();
        assert_eq!(state.card(item).unwrap().equipped_to, None);
    }

    #[test]
    fn test_restore_undoes_move() {
        let mut state = state();
        let hand = ZoneRef::new(p0(), ZoneKind::Hand);
        let a = add(&mut state, CardType::Unit, hand);
        let b = add(&mut state, CardType::Unit, hand);
        let snapshot = state.snapshot(a).unwrap();

        let from = state
            .move_card(a, ZoneRef::new(p0(), ZoneKind::Discard), Destination::Pile(ZonePosition::Top))
            .unwrap();
        state.restore(&snapshot, from).unwrap();

        assert_eq!(state.cards_in(hand), vec![a, b]);
        assert_eq!(state.card(a).unwrap().epoch, 0);
        assert!(state.cards_in(ZoneRef::new(p0(), ZoneKind::Discard)).is_empty());
    }

    #[test]
    fn test_place_reserves_slot() {
        let mut state = state();
        let hand = ZoneRef::new(p0(), ZoneKind::Hand);
        let units = ZoneRef::new(p0(), ZoneKind::Unit);
        let a = add(&mut state, CardType::Unit, hand);

        state.place(a, units, 0).unwrap();
        let card = state.card(a).unwrap();
        assert!(card.placed);
        assert!(!card.is_on_field());
        assert!(state.location(a).unwrap().placed);
        assert_eq!(state.zones(p0()).unit.free_slots(), vec![1, 2, 3, 4]);

        state.move_card(a, units, Destination::Slot(0)).unwrap();
        assert!(state.card(a).unwrap().is_on_field());
    }

    #[test]
    fn test_detached_card_has_no_zone() {
        let mut state = state();
        let def = Arc::new(CardDefinition::new(CardId::new(9), CardType::Token));
        let token = state.add_detached_card(def, p0());
        assert_eq!(state.card(token).unwrap().zone, None);
        assert_eq!(state.location(token), None);

        let units = ZoneRef::new(p0(), ZoneKind::Unit);
        state.place(token, units, 1).unwrap();
        assert!(state.location(token).unwrap().placed);
    }

    #[test]
    fn test_deck_top_order() {
        let mut state = state();
        let deck = ZoneRef::new(p0(), ZoneKind::Deck);
        let a = add(&mut state, CardType::Unit, deck);
        let b = add(&mut state, CardType::Unit, deck);
        assert_eq!(state.deck_top(p0(), 5), vec![b, a]);
        assert_eq!(state.deck_top(p0(), 1), vec![b]);
    }
}
