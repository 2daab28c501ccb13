//! Recalculation of base and current values from the modifier stack.
//!
//! 1. Collect every unaffection and ability cancel, in stack order.
//! 2. `base` = `initial` with every base modification applied, in order.
//! 3. `current` = `base` with every other modification applied, in order.
//! 4. Mark the collected cancels on `current`'s abilities.
//!
//! Non-unit objects lose unit-only values after each pass. A static
//! modifier whose source ability is cancelled is skipped entirely, and a
//! static modifier on a value the target is immune to is skipped for that
//! value unless the target is its own source.

use tracing::trace;

use crate::abilities::AbilityId;
use crate::core::{EngineError, GameState, PlayerId};
use crate::script::eval::evaluate;
use crate::script::value::truthy;
use crate::script::{EvalContext, ScriptCard, ScriptValue};

use super::modifier::{Modification, ModificationKind, Modifier, StatTarget};
use super::object::{ObjectValues, Unaffection, ValueSet};

/// Freshly derived views of one object.
#[derive(Clone, Debug)]
pub struct Recalculated<V> {
    pub base: V,
    pub current: V,
    pub unaffected_by: Vec<Unaffection>,
}

fn source_cancelled(modifier: &Modifier, state: &GameState) -> bool {
    if !modifier.is_static {
        return false;
    }
    let (Some(card), Some(ability)) = (modifier.source.card, modifier.source.ability) else {
        return false;
    };
    state
        .card(card)
        .map(|c| c.values.current.is_ability_cancelled(ability))
        .unwrap_or(false)
}

fn blocked(
    modifier: &Modifier,
    modification: &Modification,
    target: StatTarget,
    unaffections: &[Unaffection],
    state: &GameState,
) -> Result<bool, EngineError> {
    if !modifier.is_static {
        return Ok(false);
    }
    if let (StatTarget::Card(id), Some(source)) = (target, modifier.source.card) {
        if id == source {
            return Ok(false);
        }
    }
    for unaffection in unaffections.iter().filter(|u| u.key == modification.key()) {
        let Some(by) = &unaffection.by else {
            return Ok(true);
        };
        let mut ctx = EvalContext::new(unaffection.source_player)
            .with_evaluating_player(unaffection.source_player);
        if let Some(card) = unaffection.source_card {
            ctx = ctx.with_card(card);
        }
        if let Some(ability) = unaffection.source_ability {
            ctx = ctx.with_ability(ability);
        }
        if let Some(source) = modifier.source.card {
            if let Ok(card) = state.card(source) {
                ctx = ctx.with_implicit_card(ScriptCard::live(card.current_ref()));
            }
        }
        if truthy(&evaluate(by, &ctx, state)?) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn apply_pass<V: ValueSet>(
    values: &mut V,
    object: &ObjectValues<V>,
    to_base: bool,
    target: StatTarget,
    unaffections: &[Unaffection],
    state: &GameState,
) -> Result<(), EngineError> {
    for modifier in object.modifiers.iter().filter(|m| !source_cancelled(m, state)) {
        let ctx = modifier.source.context(target, state);
        for modification in modifier.modifications.iter() {
            if modification.to_base != to_base || modification.is_preliminary() {
                continue;
            }
            if blocked(modifier, modification, target, unaffections, state)? {
                trace!(?target, key = modification.key().as_str(), "modification blocked");
                continue;
            }
            modification.apply_to(values, &ctx, state)?;
        }
    }
    values.strip_inapplicable();
    Ok(())
}

/// Derive base and current for one object.
pub fn compute<V: ValueSet>(
    object: &ObjectValues<V>,
    target: StatTarget,
    state: &GameState,
) -> Result<Recalculated<V>, EngineError> {
    let mut unaffections = Vec::new();
    let mut cancelled: Vec<AbilityId> = Vec::new();
    for modifier in object.modifiers.iter().filter(|m| !source_cancelled(m, state)) {
        let ctx = modifier.source.context(target, state);
        for modification in modifier.modifications.iter() {
            if !modification.is_preliminary() || !modification.condition_holds(&ctx, state)? {
                continue;
            }
            match &modification.kind {
                ModificationKind::Unaffected { key, by } => unaffections.push(Unaffection {
                    key: *key,
                    by: by.clone(),
                    source_card: modifier.source.card,
                    source_player: modifier.source.player,
                    source_ability: modifier.source.ability,
                }),
                ModificationKind::CancelAbilities { abilities } => {
                    for value in abilities.resolve(&ctx, state)? {
                        if let ScriptValue::Ability(id) = value {
                            if state.registry.ability(id)?.cancellable && !cancelled.contains(&id) {
                                cancelled.push(id);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let mut base = object.initial.clone();
    apply_pass(&mut base, object, true, target, &unaffections, state)?;
    let mut current = base.clone();
    apply_pass(&mut current, object, false, target, &unaffections, state)?;

    if let Some(abilities) = current.abilities_mut() {
        for ability in abilities.iter_mut() {
            ability.cancelled = cancelled.contains(&ability.id);
        }
    }
    Ok(Recalculated {
        base,
        current,
        unaffected_by: unaffections,
    })
}

/// Recalculate one object in place. Returns whether anything changed.
pub fn recalculate(state: &mut GameState, target: StatTarget) -> Result<bool, EngineError> {
    match target {
        StatTarget::Card(id) => {
            let result = compute(&state.card(id)?.values, target, state)?;
            let values = &mut state.card_mut(id)?.values;
            let changed = values.base != result.base || values.current != result.current;
            values.base = result.base;
            values.current = result.current;
            values.unaffected_by = result.unaffected_by;
            Ok(changed)
        }
        StatTarget::Player(player) => {
            let result = compute(&state.players[player].values, target, state)?;
            let values = &mut state.players[player].values;
            let changed = values.base != result.base || values.current != result.current;
            values.base = result.base;
            values.current = result.current;
            values.unaffected_by = result.unaffected_by;
            Ok(changed)
        }
    }
}

/// Upper bound on passes. Cancels feeding back into statics settle fast.
const MAX_PASSES: usize = 16;

/// Recalculate every card and player until nothing changes.
pub fn recalculate_all(state: &mut GameState) -> Result<(), EngineError> {
    let mut targets: Vec<StatTarget> = state.card_ids().map(StatTarget::Card).collect();
    targets.extend(PlayerId::all().map(StatTarget::Player));
    for pass in 0..MAX_PASSES {
        let mut changed = false;
        for &target in &targets {
            changed |= recalculate(state, target)?;
        }
        if !changed {
            trace!(passes = pass + 1, "values settled");
            return Ok(());
        }
    }
    Err(EngineError::Invariant(
        "modifier stack did not settle".to_string(),
    ))
}
