//! Priority: what the acting player may do next, and asking them.
//!
//! Some moves pre-empt the rest. Mandatory trigger abilities go first; a
//! single one is activated without asking. After those, a pending
//! standard draw or a declared fight is the only move offered.

use tracing::debug;

use crate::abilities::{AbilityId, AbilityKind};
use crate::core::{CardRef, EngineError, EntityId, Flow, PlayerId};
use crate::game::Game;
use crate::io::request::{AbilityOption, Request, RequestKind, Response};
use crate::rules;
use crate::script::ast::PhaseName;

use super::block::Plan;
use super::Stack;

pub(crate) enum Choice {
    Pass,
    Block(Plan),
}

/// Mandatory triggers `player` has to activate now.
///
/// A mandatory ability is forced once per phase, or again when its trigger
/// is met anew.
fn forced_triggers(game: &Game, player: PlayerId) -> Result<Vec<AbilityOption>, EngineError> {
    let mut forced = Vec::new();
    for (option, mandatory) in rules::activatable_abilities(&game.state, player, AbilityKind::Trigger)? {
        if !mandatory {
            continue;
        }
        let key = (option.card.id, option.ability);
        if !game.phase_forced.contains(&key) || trigger_met(game, key)? {
            forced.push(option);
        }
    }
    Ok(forced)
}

fn trigger_met(game: &Game, (card, ability): (EntityId, AbilityId)) -> Result<bool, EngineError> {
    Ok(game
        .state
        .card(card)?
        .ability_state(ability)
        .is_some_and(|s| s.trigger_met))
}

fn pick<T: Copy>(options: &[T], index: usize) -> Result<T, EngineError> {
    options
        .get(index)
        .copied()
        .ok_or_else(|| EngineError::Invariant(format!("option {index} of {}", options.len())))
}

fn pick_many(options: &[CardRef], indices: &[usize]) -> Result<Vec<CardRef>, EngineError> {
    indices.iter().map(|&i| pick(options, i)).collect()
}

/// Turn a validated response into the move it stands for.
fn to_choice(request: &Request, response: Response) -> Result<Choice, EngineError> {
    let plan = match (&request.kind, response) {
        (_, Response::Pass) => return Ok(Choice::Pass),
        (RequestKind::DoStandardDraw, Response::DoStandardDraw) => Plan::StandardDraw,
        (RequestKind::DoFight, Response::DoFight) => Plan::Fight,
        (RequestKind::DoStandardSummon { eligible }, Response::DoStandardSummon(i)) => {
            Plan::StandardSummon(pick(eligible, i)?)
        }
        (RequestKind::DeployItem { eligible }, Response::DeployItem(i)) => {
            Plan::DeployItem(pick(eligible, i)?)
        }
        (RequestKind::CastSpell { eligible }, Response::CastSpell(i)) => {
            Plan::CastSpell(pick(eligible, i)?)
        }
        (RequestKind::DoRetire { eligible }, Response::DoRetire(indices)) => {
            Plan::Retire(pick_many(eligible, &indices)?)
        }
        (RequestKind::DoAttackDeclaration { eligible }, Response::DoAttackDeclaration(indices)) => {
            Plan::AttackDeclaration(pick_many(eligible, &indices)?)
        }
        (RequestKind::ActivateOptionalAbility { eligible }, Response::ActivateOptionalAbility(i))
        | (RequestKind::ActivateFastAbility { eligible }, Response::ActivateFastAbility(i))
        | (RequestKind::ActivateTriggerAbility { eligible }, Response::ActivateTriggerAbility(i)) => {
            Plan::Ability(pick(eligible, i)?)
        }
        (kind, response) => {
            return Err(EngineError::Invariant(format!(
                "{} does not answer {}",
                response.as_str(),
                kind.as_str()
            )))
        }
    };
    Ok(Choice::Block(plan))
}

fn abilities(
    game: &Game,
    player: PlayerId,
    kind: AbilityKind,
) -> Result<Vec<AbilityOption>, EngineError> {
    Ok(rules::activatable_abilities(&game.state, player, kind)?
        .into_iter()
        .filter(|(_, mandatory)| !mandatory)
        .map(|(option, _)| option)
        .collect())
}

/// Every move `player` may make right now, pass included.
fn options(game: &Game, stack: &Stack, player: PlayerId) -> Result<Vec<Request>, EngineError> {
    let state = &game.state;
    let turn_player = player == state.turn_player;
    let main = matches!(state.phase, Some(PhaseName::Main1 | PhaseName::Main2));
    let empty = stack.blocks.is_empty();

    let mut kinds = vec![RequestKind::Pass];
    if turn_player && main && empty {
        let eligible = rules::summonable_units(state, player)?;
        if !eligible.is_empty() {
            kinds.push(RequestKind::DoStandardSummon { eligible });
        }
        let eligible = rules::deployable_items(state, player)?;
        if !eligible.is_empty() {
            kinds.push(RequestKind::DeployItem { eligible });
        }
        let eligible = rules::retirable_units(state, player)?;
        if !eligible.is_empty() {
            kinds.push(RequestKind::DoRetire { eligible });
        }
        let eligible = abilities(game, player, AbilityKind::Optional)?;
        if !eligible.is_empty() {
            kinds.push(RequestKind::ActivateOptionalAbility { eligible });
        }
    }
    if turn_player && main {
        let eligible = rules::castable_spells(state, player)?;
        if !eligible.is_empty() {
            kinds.push(RequestKind::CastSpell { eligible });
        }
    }
    if turn_player && state.phase == Some(PhaseName::Battle) && empty && state.attack.is_none() {
        let eligible = rules::eligible_attackers(state, player)?;
        if !eligible.is_empty() {
            kinds.push(RequestKind::DoAttackDeclaration { eligible });
        }
    }
    let eligible = abilities(game, player, AbilityKind::Fast)?;
    if !eligible.is_empty() {
        kinds.push(RequestKind::ActivateFastAbility { eligible });
    }
    let eligible = abilities(game, player, AbilityKind::Trigger)?;
    if !eligible.is_empty() {
        kinds.push(RequestKind::ActivateTriggerAbility { eligible });
    }
    Ok(kinds
        .into_iter()
        .map(|kind| Request::new(player, kind))
        .collect())
}

/// The move the game itself forces on `player`, if any.
fn forced_move(game: &Game, stack: &Stack, player: PlayerId) -> Option<RequestKind> {
    let state = &game.state;
    if player != state.turn_player || !stack.blocks.is_empty() {
        return None;
    }
    match state.phase {
        Some(PhaseName::Draw) if !game.standard_draw_done => Some(RequestKind::DoStandardDraw),
        Some(PhaseName::Battle)
            if state
                .attack
                .as_ref()
                .is_some_and(|a| !a.fought && !a.cancelled && a.target.is_some()) =>
        {
            Some(RequestKind::DoFight)
        }
        _ => None,
    }
}

/// Let `player` pick their next move.
pub(crate) fn choose(game: &mut Game, stack: &Stack, player: PlayerId) -> Flow<Choice> {
    let forced = forced_triggers(game, player)?;
    match forced.as_slice() {
        [] => {}
        [only] => {
            debug!(player = %player, ability = %only.ability, "mandatory trigger");
            return Ok(Choice::Block(Plan::Ability(*only)));
        }
        _ => {
            let request = Request::new(
                player,
                RequestKind::ActivateTriggerAbility {
                    eligible: forced.clone(),
                },
            );
            let (request, response) = game.ask(vec![request])?;
            return Ok(to_choice(&request, response)?);
        }
    }

    let requests = match forced_move(game, stack, player) {
        Some(kind) => vec![Request::new(player, kind)],
        None => options(game, stack, player)?,
    };
    let (request, response) = game.ask(requests)?;
    Ok(to_choice(&request, response)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardId;

    fn card(n: u32) -> CardRef {
        CardRef::new(EntityId(n), 0)
    }

    #[test]
    fn test_pass_answers_anything() {
        let request = Request::new(PlayerId::new(0), RequestKind::Pass);
        assert!(matches!(
            to_choice(&request, Response::Pass).unwrap(),
            Choice::Pass
        ));
    }

    #[test]
    fn test_indices_pick_cards() {
        let request = Request::new(
            PlayerId::new(0),
            RequestKind::DoRetire {
                eligible: vec![card(3), card(5), card(7)],
            },
        );
        match to_choice(&request, Response::DoRetire(vec![0, 2])).unwrap() {
            Choice::Block(Plan::Retire(units)) => assert_eq!(units, vec![card(3), card(7)]),
            _ => panic!("expected a retire"),
        }
    }

    #[test]
    fn test_ability_option_is_picked() {
        let option = AbilityOption {
            card: card(1),
            ability: AbilityId::new(CardId::new(8), 0),
        };
        let request = Request::new(
            PlayerId::new(1),
            RequestKind::ActivateFastAbility {
                eligible: vec![option],
            },
        );
        match to_choice(&request, Response::ActivateFastAbility(0)).unwrap() {
            Choice::Block(Plan::Ability(picked)) => assert_eq!(picked, option),
            _ => panic!("expected an ability"),
        }
    }

    #[test]
    fn test_mismatch_is_an_error() {
        let request = Request::new(PlayerId::new(0), RequestKind::DoFight);
        assert!(to_choice(&request, Response::DoStandardDraw).is_err());
    }
}
