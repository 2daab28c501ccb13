//! Static abilities on the modifier stacks.
//!
//! After every timing the modifiers contributed by static abilities are
//! brought in line with the board: abilities of cards on the field whose
//! condition holds apply a freshly baked modifier to whatever their
//! `applyTo` selects, and every other static modifier is taken off. A
//! modifier that stays keeps its place on the stack.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::abilities::{activation_context, condition_holds, AbilityId, AbilityKind};
use crate::core::{EngineError, EntityId, Flow, GameState, PlayerId};
use crate::io::request::{Request, RequestKind};
use crate::script::eval::evaluate;
use crate::script::ScriptValue;
use crate::values::{recalculate, Modification, Modifier, ModifierId, ModifierSource, StatTarget};

use super::TimingHost;

/// Upper bound on refresh rounds. Statics that cancel each other settle
/// in a handful.
const MAX_ROUNDS: usize = 16;

/// One static modifier the board currently calls for.
#[derive(Clone, Debug)]
struct Wanted {
    target: StatTarget,
    source: ModifierSource,
    modifications: Arc<Vec<Modification>>,
}

fn same_source(modifier: &Modifier, source: &ModifierSource) -> bool {
    modifier.is_static
        && modifier.source.card == source.card
        && modifier.source.ability == source.ability
}

/// Every static modifier the board calls for, in card order.
fn wanted(state: &GameState) -> Result<Vec<Wanted>, EngineError> {
    let mut wanted = Vec::new();
    for id in state.field_cards() {
        let card = state.card(id)?;
        if card.placed {
            continue;
        }
        for ability in &card.definition.abilities {
            if ability.kind != AbilityKind::Static
                || card.values.current.is_ability_cancelled(ability.id)
            {
                continue;
            }
            let ctx = activation_context(ability, card, card.owner);
            if !condition_holds(ability, &ctx, state)? {
                continue;
            }
            let (Some(apply_to), Some(modifier)) = (&ability.apply_to, &ability.modifier) else {
                continue;
            };
            let source = ModifierSource::from_context(&ctx);
            let modifier_values = evaluate(modifier, &ctx, state)?;
            for target in targets(&evaluate(apply_to, &ctx, state)?, state) {
                let bake_ctx = source.context(target, state);
                let mut modifications = Vec::new();
                for value in &modifier_values {
                    let ScriptValue::Modifier(list) = value else {
                        continue;
                    };
                    for modification in list.iter() {
                        if let Some(baked) = modification.bake(&bake_ctx, state)? {
                            modifications.push(baked);
                        }
                    }
                }
                wanted.push(Wanted {
                    target,
                    source,
                    modifications: Arc::new(modifications),
                });
            }
        }
    }
    Ok(wanted)
}

/// The objects an `applyTo` result stands for.
fn targets(values: &[ScriptValue], state: &GameState) -> Vec<StatTarget> {
    let mut targets = Vec::new();
    for value in values {
        let target = match value {
            ScriptValue::Card(card) => match card.current(state) {
                Some(current) => StatTarget::Card(current.id),
                None => continue,
            },
            ScriptValue::Player(player) => StatTarget::Player(*player),
            _ => continue,
        };
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

fn stack_mut(state: &mut GameState, target: StatTarget) -> Result<&mut Vec<Modifier>, EngineError> {
    Ok(match target {
        StatTarget::Card(id) => &mut state.card_mut(id)?.values.modifiers,
        StatTarget::Player(player) => &mut state.players[player].values.modifiers,
    })
}

/// Apply one round of changes. Returns whether modifiers were added or
/// removed, and the targets that gained two or more at once with the stack
/// positions of the new modifiers.
fn apply(
    state: &mut GameState,
    wanted: &[Wanted],
) -> Result<(bool, Vec<(StatTarget, Vec<usize>)>), EngineError> {
    let mut changed = false;
    let mut crowded = Vec::new();
    for target in all_targets(state) {
        let mine: Vec<&Wanted> = wanted.iter().filter(|w| w.target == target).collect();
        let stack = stack_mut(state, target)?;
        let before = stack.len();
        stack.retain(|m| !m.is_static || mine.iter().any(|w| same_source(m, &w.source)));
        changed |= stack.len() != before;

        let mut added = Vec::new();
        for want in mine {
            match stack.iter_mut().find(|m| same_source(m, &want.source)) {
                // re-baked operands show up as value changes on recalculation
                Some(existing) => existing.modifications = want.modifications.clone(),
                None => {
                    added.push(stack.len());
                    stack.push(Modifier {
                        id: ModifierId(0),
                        source: want.source,
                        modifications: want.modifications.clone(),
                        is_static: true,
                    });
                    changed = true;
                }
            }
        }
        for &index in &added {
            let id = state.allocate_modifier_id();
            stack_mut(state, target)?[index].id = id;
        }
        if added.len() > 1 {
            crowded.push((target, added));
        }
    }
    Ok((changed, crowded))
}

/// Let the owner of a card order the static modifiers it just gained.
fn order<H: TimingHost>(host: &mut H, target: StatTarget, added: Vec<usize>) -> Flow<()> {
    let StatTarget::Card(card) = target else {
        return Ok(());
    };
    let state = host.state();
    let live = state.card(card)?;
    let stack = &live.values.modifiers;
    let abilities: Vec<AbilityId> = added
        .iter()
        .filter_map(|&i| stack.get(i).and_then(|m| m.source.ability))
        .collect();
    if abilities.len() != added.len() {
        return Ok(());
    }
    let request = Request::new(
        live.owner,
        RequestKind::ChooseAbilityOrder {
            card: live.current_ref(),
            abilities,
        },
    );
    let chosen = host.request(request)?.into_order()?;
    reorder(stack_mut(host.state_mut(), target)?, &added, &chosen)?;
    trace!(card = %card, "static modifiers ordered");
    Ok(())
}

/// Put the modifiers at `added` into the chosen order. Leaves the stack
/// untouched unless `chosen` is a permutation of those slots.
fn reorder(stack: &mut [Modifier], added: &[usize], chosen: &[usize]) -> Result<(), EngineError> {
    let mut seen = vec![false; added.len()];
    let fits = chosen.len() == added.len()
        && chosen
            .iter()
            .all(|&pick| seen.get_mut(pick).is_some_and(|s| !std::mem::replace(s, true)));
    let new: Option<Vec<Modifier>> = added.iter().map(|&i| stack.get(i).cloned()).collect();
    let Some(new) = new.filter(|_| fits) else {
        return Err(EngineError::Invariant(format!(
            "ability order {chosen:?} does not fit modifier slots {added:?}"
        )));
    };
    for (&slot, &pick) in added.iter().zip(chosen) {
        if let (Some(place), Some(modifier)) = (stack.get_mut(slot), new.get(pick)) {
            *place = modifier.clone();
        }
    }
    Ok(())
}

fn all_targets(state: &GameState) -> Vec<StatTarget> {
    let mut targets: Vec<StatTarget> = state.card_ids().map(StatTarget::Card).collect();
    targets.extend(PlayerId::all().map(StatTarget::Player));
    targets
}

/// Bring the static modifiers in line with the board and recalculate.
pub(crate) fn refresh<H: TimingHost>(host: &mut H) -> Flow<()> {
    for round in 0..MAX_ROUNDS {
        let wanted = wanted(host.state())?;
        let (structural, crowded) = apply(host.state_mut(), &wanted)?;
        for (target, added) in crowded {
            order(host, target, added)?;
        }
        let mut recalculated = false;
        for target in all_targets(host.state()) {
            recalculated |= recalculate(host.state_mut(), target)?;
        }
        if !structural && !recalculated {
            trace!(rounds = round + 1, "statics settled");
            return Ok(());
        }
    }
    debug!("statics did not settle");
    Err(EngineError::Invariant("static abilities did not settle".to_string()).into())
}

/// The objects carrying a static modifier from `card`.
#[must_use]
pub fn modifiers_from(state: &GameState, card: EntityId) -> Vec<StatTarget> {
    let mut targets = Vec::new();
    for id in state.card_ids() {
        if let Ok(live) = state.card(id) {
            if live
                .values
                .modifiers
                .iter()
                .any(|m| m.is_static && m.source.card == Some(card))
            {
                targets.push(StatTarget::Card(id));
            }
        }
    }
    for player in PlayerId::all() {
        if state.players[player]
            .values
            .modifiers
            .iter()
            .any(|m| m.is_static && m.source.card == Some(card))
        {
            targets.push(StatTarget::Player(player));
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardId;

    fn modifier(index: u16) -> Modifier {
        Modifier {
            id: ModifierId(u64::from(index)),
            source: ModifierSource {
                card: None,
                player: PlayerId::new(0),
                ability: Some(AbilityId::new(CardId::new(1), index)),
            },
            modifications: Arc::new(Vec::new()),
            is_static: true,
        }
    }

    fn ids(stack: &[Modifier]) -> Vec<u64> {
        stack.iter().map(|m| m.id.0).collect()
    }

    #[test]
    fn test_reorder_swaps_added_slots() {
        let mut stack = vec![modifier(0), modifier(1), modifier(2)];
        reorder(&mut stack, &[1, 2], &[1, 0]).unwrap();
        assert_eq!(ids(&stack), vec![0, 2, 1]);
    }

    #[test]
    fn test_reorder_rejects_bad_orders() {
        let mut stack = vec![modifier(0), modifier(1), modifier(2)];
        for chosen in [vec![0, 5], vec![1, 1], vec![0]] {
            assert!(matches!(
                reorder(&mut stack, &[1, 2], &chosen),
                Err(EngineError::Invariant(_))
            ));
        }
        assert!(reorder(&mut stack, &[1, 7], &[0, 1]).is_err());
        assert_eq!(ids(&stack), vec![0, 1, 2]);
    }
}
