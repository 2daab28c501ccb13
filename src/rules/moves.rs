//! Cards and abilities a player may use right now.
//!
//! These only answer "could this start a block". Whether its cost can be
//! paid is found out by paying it; a standard summon the player cannot
//! afford is still offered and fails when its cost timing runs.

use crate::abilities::{can_activate, AbilityKind};
use crate::actions::equip_candidates;
use crate::cards::{Card, CardType};
use crate::core::{CardRef, EngineError, GameState, PlayerId};
use crate::io::request::AbilityOption;
use crate::zones::ZoneKind;

fn has_free_slot(state: &GameState, player: PlayerId, kind: ZoneKind) -> bool {
    state
        .zones(player)
        .field(kind)
        .is_some_and(|field| !field.free_slots().is_empty())
}

fn hand_cards(state: &GameState, player: PlayerId) -> Result<Vec<&Card>, EngineError> {
    state
        .zones(player)
        .hand
        .cards()
        .iter()
        .map(|&id| state.card(id))
        .collect()
}

/// Whether every ability of `kind` on the card could run.
fn abilities_ready(
    card: &Card,
    kind: AbilityKind,
    player: PlayerId,
    state: &GameState,
) -> Result<bool, EngineError> {
    for ability in card.definition.abilities.iter().filter(|a| a.kind == kind) {
        if !can_activate(ability, card, player, state)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Units in hand that could be standard summoned.
pub fn summonable_units(state: &GameState, player: PlayerId) -> Result<Vec<CardRef>, EngineError> {
    if !has_free_slot(state, player, ZoneKind::Unit) {
        return Ok(Vec::new());
    }
    Ok(hand_cards(state, player)?
        .into_iter()
        .filter(|card| card.values.current.has_card_type(CardType::Unit))
        .map(Card::current_ref)
        .collect())
}

/// Items in hand that could be deployed.
pub fn deployable_items(state: &GameState, player: PlayerId) -> Result<Vec<CardRef>, EngineError> {
    if !has_free_slot(state, player, ZoneKind::SpellItem) {
        return Ok(Vec::new());
    }
    let mut eligible = Vec::new();
    for card in hand_cards(state, player)? {
        let values = &card.values.current;
        if !values.has_card_type(CardType::Item)
            || !abilities_ready(card, AbilityKind::Deploy, player, state)?
        {
            continue;
        }
        if values.has_card_type(CardType::EquipableItem)
            && equip_candidates(card.current_ref(), player, state)?.is_empty()
        {
            continue;
        }
        eligible.push(card.current_ref());
    }
    Ok(eligible)
}

/// Spells in hand that could be cast.
pub fn castable_spells(state: &GameState, player: PlayerId) -> Result<Vec<CardRef>, EngineError> {
    if !has_free_slot(state, player, ZoneKind::SpellItem) {
        return Ok(Vec::new());
    }
    let mut eligible = Vec::new();
    for card in hand_cards(state, player)? {
        if card.values.current.has_card_type(CardType::Spell)
            && abilities_ready(card, AbilityKind::Cast, player, state)?
        {
            eligible.push(card.current_ref());
        }
    }
    Ok(eligible)
}

/// Units in the unit zone. Partners never retire.
pub fn retirable_units(state: &GameState, player: PlayerId) -> Result<Vec<CardRef>, EngineError> {
    state
        .zones(player)
        .unit
        .cards()
        .map(|id| state.card(id).map(Card::current_ref))
        .collect()
}

/// Units and partner that may still declare an attack.
pub fn eligible_attackers(state: &GameState, player: PlayerId) -> Result<Vec<CardRef>, EngineError> {
    let zones = state.zones(player);
    let mut eligible = Vec::new();
    for id in zones.unit.cards().chain(zones.partner.cards()) {
        let card = state.card(id)?;
        if card.can_declare_attack() {
            eligible.push(card.current_ref());
        }
    }
    Ok(eligible)
}

/// Abilities of `kind` the player could activate, with whether each is
/// mandatory.
///
/// Optional and fast abilities come from the player's field. Trigger
/// abilities may fire from anywhere but the deck.
pub fn activatable_abilities(
    state: &GameState,
    player: PlayerId,
    kind: AbilityKind,
) -> Result<Vec<(AbilityOption, bool)>, EngineError> {
    let mut options = Vec::new();
    for id in state.card_ids() {
        let card = state.card(id)?;
        if card.owner != player || card.placed {
            continue;
        }
        let reachable = match kind {
            AbilityKind::Trigger => card.zone_kind().is_some_and(|k| k != ZoneKind::Deck),
            _ => card.is_on_field(),
        };
        if !reachable {
            continue;
        }
        for ability in card.definition.abilities.iter().filter(|a| a.kind == kind) {
            if can_activate(ability, card, player, state)? {
                let option = AbilityOption {
                    card: card.current_ref(),
                    ability: ability.id,
                };
                options.push((option, ability.mandatory));
            }
        }
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cards::{CardDefinition, CardId, CardRegistry};
    use crate::core::{Destination, EntityId, RulesConfig};
    use crate::zones::{ZonePosition, ZoneRef};

    fn p0() -> PlayerId {
        PlayerId::new(0)
    }

    fn add(state: &mut GameState, card_type: CardType, kind: ZoneKind) -> EntityId {
        let def = CardDefinition::new(CardId::new(9), card_type).with_stats(100, 100);
        let destination = match state.zones(p0()).field(kind) {
            Some(field) => Destination::Slot(field.free_slots()[0]),
            None => Destination::Pile(ZonePosition::Top),
        };
        state
            .add_card(Arc::new(def), p0(), ZoneRef::new(p0(), kind), destination)
            .unwrap()
    }

    fn state() -> GameState {
        GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()))
    }

    #[test]
    fn test_hand_cards_by_type() {
        let mut state = state();
        let unit = add(&mut state, CardType::Unit, ZoneKind::Hand);
        let spell = add(&mut state, CardType::StandardSpell, ZoneKind::Hand);
        let item = add(&mut state, CardType::ContinuousItem, ZoneKind::Hand);

        let ids = |refs: Vec<CardRef>| refs.into_iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids(summonable_units(&state, p0()).unwrap()), vec![unit]);
        assert_eq!(ids(castable_spells(&state, p0()).unwrap()), vec![spell]);
        assert_eq!(ids(deployable_items(&state, p0()).unwrap()), vec![item]);
    }

    #[test]
    fn test_full_unit_zone_blocks_summons() {
        let mut state = state();
        add(&mut state, CardType::Unit, ZoneKind::Hand);
        for _ in 0..state.config.unit_zone_size {
            add(&mut state, CardType::Unit, ZoneKind::Unit);
        }
        assert!(summonable_units(&state, p0()).unwrap().is_empty());
        assert_eq!(retirable_units(&state, p0()).unwrap().len(), state.config.unit_zone_size);
    }

    #[test]
    fn test_equipable_item_needs_a_unit() {
        let mut state = state();
        let mut def = CardDefinition::new(CardId::new(4), CardType::EquipableItem);
        def.equipable_to = Some(Arc::new(
            crate::script::parser::parse_expression("[unit from you.field]").unwrap(),
        ));
        let zone = ZoneRef::new(p0(), ZoneKind::Hand);
        state
            .add_card(Arc::new(def), p0(), zone, Destination::Pile(ZonePosition::Top))
            .unwrap();
        assert!(deployable_items(&state, p0()).unwrap().is_empty());

        add(&mut state, CardType::Unit, ZoneKind::Unit);
        assert_eq!(deployable_items(&state, p0()).unwrap().len(), 1);
    }

    #[test]
    fn test_attackers_include_partner() {
        let mut state = state();
        let partner = add(&mut state, CardType::Unit, ZoneKind::Partner);
        let unit = add(&mut state, CardType::Unit, ZoneKind::Unit);
        state.card_mut(unit).unwrap().attacks_made = 1;

        let attackers = eligible_attackers(&state, p0()).unwrap();
        assert_eq!(attackers.len(), 1);
        assert_eq!(attackers[0].id, partner);
    }
}
