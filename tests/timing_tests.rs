//! Timing integration tests: substitution and the timings a game records.

use std::sync::Arc;

use proptest::prelude::*;

use cu_rules::actions::Action;
use cu_rules::cards::{CardDefinition, CardId, CardRegistry, CardType};
use cu_rules::core::{CardRef, Destination, GameState, PlayerId, RulesConfig, ScriptedRandom};
use cu_rules::game::{Game, TurnRecord};
use cu_rules::io::driver::ScriptedDriver;
use cu_rules::script::ast::PhaseName;
use cu_rules::timing::substitute;
use cu_rules::zones::{ZoneKind, ZonePosition, ZoneRef};

fn p0() -> PlayerId {
    PlayerId::new(0)
}

/// A state with three cards in hand and a partner for each player.
fn state() -> (GameState, Vec<CardRef>) {
    let mut state = GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()));
    let def = Arc::new(
        CardDefinition::new(CardId::new(1), CardType::Unit)
            .with_level(2)
            .with_stats(200, 100),
    );
    let mut cards = Vec::new();
    for player in PlayerId::all() {
        for _ in 0..3 {
            let id = state
                .add_card(
                    def.clone(),
                    player,
                    ZoneRef::new(player, ZoneKind::Hand),
                    Destination::Pile(ZonePosition::Top),
                )
                .unwrap();
            cards.push(state.card(id).unwrap().current_ref());
        }
        let partner = state
            .add_card(
                def.clone(),
                player,
                ZoneRef::new(player, ZoneKind::Partner),
                Destination::Slot(0),
            )
            .unwrap();
        cards.push(state.card(partner).unwrap().current_ref());
    }
    (state, cards)
}

/// Turn generated numbers into an action list over the state's cards.
fn build(shape: &[(u8, i64, usize)], cards: &[CardRef]) -> Vec<Action> {
    shape.iter()
        .map(|&(kind, amount, index)| {
            let card = cards[index % cards.len()];
            let player = PlayerId::new((index % 2) as u8);
            match kind % 7 {
                0 => Action::change_mana(player, amount),
                1 => Action::change_life(player, amount * 100),
                2 => Action::deal_damage(player, amount.abs() * 100),
                3 => Action::discard(player, card),
                4 => Action::destroy(player, card),
                5 => Action::exile(player, card),
                _ => Action::draw(player, amount.unsigned_abs() as usize),
            }
        })
        .collect()
}

fn encode(actions: &[Action]) -> serde_json::Value {
    serde_json::to_value(actions).unwrap()
}

// =============================================================================
// Substitution
// =============================================================================

proptest! {
    /// Test that a second substitution pass over settled actions changes nothing.
    #[test]
    fn prop_substitution_is_idempotent(
        shape in prop::collection::vec((0u8..7, -3i64..4, 0usize..8), 0..12)
    ) {
        let (state, cards) = state();
        let first = substitute(build(&shape, &cards), &state).unwrap();
        let second = substitute(first.kept.clone(), &state).unwrap();

        prop_assert!(second.cancelled.is_empty());
        prop_assert_eq!(encode(&second.kept), encode(&first.kept));
        prop_assert_eq!(first.kept.len() + first.cancelled.len(), shape.len());
    }
}

/// Test that mana cannot be spent below zero but can be gained.
#[test]
fn test_mana_changes_need_mana() {
    let (state, _) = state();
    let result = substitute(
        vec![Action::change_mana(p0(), -1), Action::change_mana(p0(), 3)],
        &state,
    )
    .unwrap();
    assert_eq!(result.kept.len(), 1);
    assert_eq!(result.cancelled.len(), 1);
    assert_eq!(result.cancelled[0].name(), "changeMana");
}

/// Test that a partner cannot be discarded from the field by an effect.
#[test]
fn test_partner_cannot_be_destroyed() {
    let (state, cards) = state();
    let partner = cards[3];
    let result = substitute(
        vec![Action::destroy(p0(), partner), Action::change_life(p0(), 100)],
        &state,
    )
    .unwrap();
    assert_eq!(result.kept.len(), 1);
    assert_eq!(result.kept[0].name(), "changeLife");
}

/// Test that a destroy needs a discard of the same card beside it.
#[test]
fn test_destroy_needs_its_discard() {
    let (state, cards) = state();
    let card = cards[0];
    let alone = substitute(vec![Action::destroy(p0(), card)], &state).unwrap();
    assert!(alone.kept.is_empty());

    let paired = substitute(
        vec![Action::discard(p0(), card), Action::destroy(p0(), card)],
        &state,
    )
    .unwrap();
    assert_eq!(paired.kept.len(), 2);
    assert!(paired.cancelled.is_empty());
}

// =============================================================================
// Recorded Timings
// =============================================================================

fn played_game() -> Game {
    let mut registry = CardRegistry::new();
    registry
        .register(CardDefinition::new(CardId::new(1), CardType::Unit).with_level(1))
        .unwrap();
    let mut game = Game::new(
        RulesConfig::default(),
        Arc::new(registry),
        Box::new(ScriptedDriver::auto()),
        Box::new(ScriptedRandom::new(vec![0; 64])),
    );
    for player in PlayerId::all() {
        game.add_deck(player, &[CardId::new(1); 6], CardId::new(1)).unwrap();
    }
    game.run().unwrap();
    game
}

/// Test that mana supply records its gain and upkeep timings.
#[test]
fn test_mana_supply_timings_are_recorded() {
    let game = played_game();
    let first: &TurnRecord = &game.history()[0];
    let supply = &first.phases[0];
    assert_eq!(supply.phase, PhaseName::ManaSupply);

    let names: Vec<&str> = supply
        .timings
        .iter()
        .flat_map(|t| t.actions.iter().map(Action::name))
        .collect();
    // gain 5, pay the level 1 partner
    assert_eq!(names, vec!["changeMana", "changeMana"]);

    // 4 left over, so turn 3 also caps back down to 5
    let third = &game.history()[2].phases[0];
    assert_eq!(third.timings.len(), 3);
    assert_eq!(game.state().players[p0()].mana, 5);
}

/// Test that timing indices only grow over a game.
#[test]
fn test_timing_indices_increase() {
    let game = played_game();
    let mut indices = Vec::new();
    for turn in game.history() {
        for phase in &turn.phases {
            indices.extend(phase.timings.iter().map(|t| t.index));
            for stack in &phase.stacks {
                for block in &stack.blocks {
                    indices.extend(block.costs.iter().map(|t| t.index));
                    indices.extend(block.executed.iter().map(|t| t.index));
                }
            }
        }
    }
    assert!(!indices.is_empty());
    assert!(indices.windows(2).all(|w| w[0] < w[1]));
}

/// Test that the turn history survives a JSON round trip.
#[test]
fn test_history_serializes() {
    let game = played_game();
    let json = serde_json::to_string(game.history()).unwrap();
    let back: Vec<TurnRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.len(), game.history().len());
    assert_eq!(back[0].phases.len(), game.history()[0].phases.len());
}
