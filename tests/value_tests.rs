//! Value pipeline integration tests.
//!
//! Base and current values are always rebuilt from the initial values and
//! the modifier stack, so every check pushes or pops modifiers and then
//! recalculates.

use std::sync::Arc;

use proptest::prelude::*;

use cu_rules::cards::{CardDefinition, CardId, CardRegistry, CardType};
use cu_rules::core::{Destination, EntityId, GameState, PlayerId, RulesConfig};
use cu_rules::script::ast::Expr;
use cu_rules::script::{parse_expression, ScriptValue};
use cu_rules::values::{
    recalculate, Modification, ModificationKind, Modifier, ModifierSource, Operand, StatTarget,
    ValueKey,
};
use cu_rules::zones::{ZoneKind, ZoneRef};

fn p0() -> PlayerId {
    PlayerId::new(0)
}

/// A 300/200 unit on player 0's field.
fn state_with_unit() -> (GameState, EntityId) {
    let mut state = GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()));
    let def = CardDefinition::new(CardId::new(1), CardType::Unit)
        .with_level(3)
        .with_stats(300, 200);
    let id = state
        .add_card(
            Arc::new(def),
            p0(),
            ZoneRef::new(p0(), ZoneKind::Unit),
            Destination::Slot(0),
        )
        .unwrap();
    (state, id)
}

fn source(card: Option<EntityId>) -> ModifierSource {
    ModifierSource {
        card,
        player: p0(),
        ability: None,
    }
}

fn push(state: &mut GameState, id: EntityId, modifications: Vec<Modification>, is_static: bool) {
    let modifier = Modifier {
        id: state.allocate_modifier_id(),
        source: source(None),
        modifications: Arc::new(modifications),
        is_static,
    };
    state.card_mut(id).unwrap().values.modifiers.push(modifier);
    recalculate(state, StatTarget::Card(id)).unwrap();
}

fn number(n: i64) -> Operand {
    Operand::Baked(vec![ScriptValue::Number(n)])
}

fn attack_change(amount: i64, to_base: bool) -> Modification {
    Modification {
        to_base,
        ..Modification::new(ModificationKind::NumericChange {
            key: ValueKey::Attack,
            amount: number(amount),
        })
    }
}

fn attack_set(value: i64, to_base: bool) -> Modification {
    Modification {
        to_base,
        ..Modification::new(ModificationKind::Set {
            key: ValueKey::Attack,
            value: number(value),
        })
    }
}

fn attack(state: &GameState, id: EntityId) -> (i64, i64) {
    let values = &state.card(id).unwrap().values;
    (values.base.attack.unwrap(), values.current.attack.unwrap())
}

// =============================================================================
// Recompute Property
// =============================================================================

#[derive(Clone, Debug)]
enum Step {
    Set(i64),
    Change(i64),
}

impl Step {
    fn apply(&self, value: i64) -> i64 {
        match self {
            Step::Set(v) => *v,
            Step::Change(d) => (value + d).max(0),
        }
    }

    fn modification(&self, to_base: bool) -> Modification {
        match self {
            Step::Set(v) => attack_set(*v, to_base),
            Step::Change(d) => attack_change(*d, to_base),
        }
    }
}

fn step() -> impl Strategy<Value = (Step, bool)> {
    let step = prop_oneof![
        (0i64..1000).prop_map(Step::Set),
        (-400i64..400).prop_map(Step::Change),
    ];
    (step, any::<bool>())
}

/// Base and current as the stack says they must be.
fn expected(stack: &[(Step, bool)]) -> (i64, i64) {
    let base = stack
        .iter()
        .filter(|(_, to_base)| *to_base)
        .fold(300, |value, (step, _)| step.apply(value));
    let current = stack
        .iter()
        .filter(|(_, to_base)| !*to_base)
        .fold(base, |value, (step, _)| step.apply(value));
    (base, current)
}

proptest! {
    /// Test that base and current follow the stack after every push and pop.
    #[test]
    fn prop_values_follow_the_stack(
        stack in prop::collection::vec(step(), 0..10),
        pops in 0usize..10,
    ) {
        let (mut state, id) = state_with_unit();
        for (i, (step, to_base)) in stack.iter().enumerate() {
            push(&mut state, id, vec![step.modification(*to_base)], false);
            prop_assert_eq!(attack(&state, id), expected(&stack[..=i]));
        }

        let remaining = stack.len().saturating_sub(pops);
        state.card_mut(id).unwrap().values.modifiers.truncate(remaining);
        recalculate(&mut state, StatTarget::Card(id)).unwrap();
        prop_assert_eq!(attack(&state, id), expected(&stack[..remaining]));
    }
}

// =============================================================================
// Modifications
// =============================================================================

/// Test that a base change shows through current values pushed before it.
#[test]
fn test_base_change_reaches_current() {
    let (mut state, id) = state_with_unit();
    push(&mut state, id, vec![attack_change(100, false)], false);
    push(&mut state, id, vec![attack_set(500, true)], false);
    assert_eq!(attack(&state, id), (500, 600));
}

/// Test that numeric changes never take a value below zero.
#[test]
fn test_numeric_change_floors_at_zero() {
    let (mut state, id) = state_with_unit();
    push(&mut state, id, vec![attack_change(-1000, false)], false);
    assert_eq!(attack(&state, id), (300, 0));
}

/// Test that division rounds up.
#[test]
fn test_division_rounds_up() {
    let (mut state, id) = state_with_unit();
    push(&mut state, id, vec![attack_change(1, false)], false);
    let halve = Modification::new(ModificationKind::NumericDivide {
        key: ValueKey::Attack,
        by: number(2),
    });
    push(&mut state, id, vec![halve], false);
    assert_eq!(attack(&state, id).1, 151);
}

/// Test that swapping attack and defense exchanges them.
#[test]
fn test_swap_attack_and_defense() {
    let (mut state, id) = state_with_unit();
    let swap = Modification::new(ModificationKind::Swap {
        key: ValueKey::Attack,
        other: ValueKey::Defense,
    });
    push(&mut state, id, vec![swap], false);
    let current = &state.card(id).unwrap().values.current;
    assert_eq!(current.attack, Some(200));
    assert_eq!(current.defense, Some(300));
}

/// Test that modifier literals from scripts apply like built ones.
#[test]
fn test_script_modifier_literal() {
    let (mut state, id) = state_with_unit();
    let Expr::Modifier(modifications) =
        parse_expression("{base level = 5, attack += 50, types += Dragon}").unwrap()
    else {
        panic!("expected a modifier literal");
    };
    push(&mut state, id, modifications, false);

    let values = &state.card(id).unwrap().values;
    assert_eq!(values.base.level, 5);
    assert_eq!(values.current.attack, Some(350));
    assert!(values.current.has_type("Dragon"));
    assert_eq!(values.initial.level, 3);
}

/// Test that an immunity blocks static modifiers but not one-off changes.
#[test]
fn test_immunity_blocks_statics() {
    let (mut state, id) = state_with_unit();
    let immune = Modification::new(ModificationKind::Unaffected {
        key: ValueKey::Attack,
        by: None,
    });
    push(&mut state, id, vec![immune], false);
    push(&mut state, id, vec![attack_change(100, false)], true);
    assert_eq!(attack(&state, id).1, 300);

    push(&mut state, id, vec![attack_change(100, false)], false);
    assert_eq!(attack(&state, id).1, 400);
}

/// Test that removing every modifier restores the printed values.
#[test]
fn test_empty_stack_restores_initial() {
    let (mut state, id) = state_with_unit();
    push(&mut state, id, vec![attack_set(900, true), attack_change(-50, false)], false);
    state.card_mut(id).unwrap().values.modifiers.clear();
    recalculate(&mut state, StatTarget::Card(id)).unwrap();
    assert_eq!(attack(&state, id), (300, 300));
}

/// Test that player values run through the same pipeline.
#[test]
fn test_player_values_recalculate() {
    let mut state = GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()));
    let gain = Modification::new(ModificationKind::NumericChange {
        key: ValueKey::ManaGainAmount,
        amount: number(-2),
    });
    let modifier = Modifier {
        id: state.allocate_modifier_id(),
        source: source(None),
        modifications: Arc::new(vec![gain]),
        is_static: false,
    };
    state.players[p0()].values.modifiers.push(modifier);
    recalculate(&mut state, StatTarget::Player(p0())).unwrap();
    assert_eq!(state.players[p0()].values.current.mana_gain_amount, 3);
    assert_eq!(state.players[p0()].values.base.mana_gain_amount, 5);
}
