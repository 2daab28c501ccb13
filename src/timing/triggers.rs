//! Trigger conditions, checked after every timing.

use std::sync::Arc;

use tracing::debug;

use crate::abilities::{activation_context, AbilityId, AbilityKind};
use crate::actions::Action;
use crate::core::{EngineError, EntityId, GameState};
use crate::script::eval::evaluate;
use crate::script::value::truthy;
use crate::zones::ZoneKind;

/// Flag every trigger ability whose trigger holds for `executed`.
///
/// A flag stays up until the ability is activated or the stack closes; the
/// actions that first met it are kept for the ability's scripts.
pub(crate) fn check(state: &mut GameState, executed: &[Action]) -> Result<(), EngineError> {
    let executed = Arc::new(executed.to_vec());
    let mut met: Vec<(EntityId, AbilityId)> = Vec::new();
    for id in state.card_ids() {
        let card = state.card(id)?;
        if matches!(card.zone_kind(), None | Some(ZoneKind::Deck)) {
            continue;
        }
        for ability in &card.definition.abilities {
            if ability.kind != AbilityKind::Trigger
                || card.values.current.is_ability_cancelled(ability.id)
                || card.ability_state(ability.id).is_some_and(|s| s.trigger_met)
            {
                continue;
            }
            let holds = match &ability.trigger {
                Some(trigger) => {
                    let ctx = activation_context(ability, card, card.owner)
                        .with_implicit_actions(executed.clone());
                    truthy(&evaluate(trigger, &ctx, state)?)
                }
                None => true,
            };
            if holds {
                met.push((id, ability.id));
            }
        }
    }
    for (card, ability) in met {
        debug!(card = %card, ability = %ability, "trigger met");
        let ability_state = state.card_mut(card)?.ability_state_mut(ability);
        ability_state.trigger_met = true;
        ability_state.trigger_actions = executed.clone();
    }
    Ok(())
}

/// Lower every trigger flag. Runs when a stack closes.
pub(crate) fn clear(state: &mut GameState) -> Result<(), EngineError> {
    for id in state.card_ids().collect::<Vec<_>>() {
        for ability_state in state.card_mut(id)?.abilities.values_mut() {
            ability_state.trigger_met = false;
            ability_state.trigger_actions = Arc::new(Vec::new());
        }
    }
    Ok(())
}
