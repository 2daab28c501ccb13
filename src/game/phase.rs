//! Phases of a turn.

use tracing::debug;

use crate::actions::{Action, ActionHost};
use crate::core::{Flow, PlayerId, VictoryCondition};
use crate::io::event::Event;
use crate::io::request::{ChoiceReason, Request, RequestKind};
use crate::script::ast::PhaseName;
use crate::stack::run_stack;
use crate::timing::{TimingHost, TimingMode};

use super::{Game, PhaseRecord};

fn begin(game: &mut Game, phase: PhaseName) -> Flow<()> {
    let player = game.state.turn_player;
    game.state.phase = Some(phase);
    game.phase_forced.clear();
    game.current_turn()?.phases.push(PhaseRecord {
        phase,
        timings: Vec::new(),
        stacks: Vec::new(),
    });
    debug!(player = %player, ?phase, "phase started");
    game.emit(Event::PhaseStarted { player, phase });
    Ok(())
}

/// Bring every listed player down to the mana cap.
fn cap_mana(game: &mut Game, players: &[PlayerId]) -> Flow<()> {
    let cap = game.state.config.mana_cap;
    let actions: Vec<Action> = players
        .iter()
        .filter_map(|&p| {
            let mana = game.state.players[p].mana;
            (mana > cap).then(|| Action::change_mana(p, cap - mana))
        })
        .collect();
    if !actions.is_empty() {
        game.timing(actions, TimingMode::Effect)?;
    }
    Ok(())
}

/// Make `player` discard down to the hand limit.
fn enforce_hand_limit(game: &mut Game, player: PlayerId) -> Flow<()> {
    let limit = game.state.config.hand_limit;
    let hand = game.state.zones(player).hand.cards().to_vec();
    let excess = hand.len().saturating_sub(limit);
    if excess == 0 {
        return Ok(());
    }
    let cards = hand
        .into_iter()
        .map(|id| game.state.card(id).map(|c| c.current_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let request = Request::new(
        player,
        RequestKind::ChooseCards {
            cards: cards.clone(),
            valid_amounts: vec![excess],
            reason: ChoiceReason::HandLimit,
        },
    );
    let chosen = game.request(request)?.into_indices()?;
    let discards = chosen
        .into_iter()
        .filter_map(|i| cards.get(i))
        .map(|&card| Action::discard(player, card))
        .collect();
    game.timing(discards, TimingMode::Effect)?;
    Ok(())
}

/// Mana supply: cap, gain, partner upkeep, cap again, hand limit.
///
/// A turn player who cannot pay their partner's level loses; their
/// opponent gains `partnerUpkeep`.
pub(super) fn mana_supply(game: &mut Game) -> Flow<()> {
    begin(game, PhaseName::ManaSupply)?;
    let start = game.record.len();
    let player = game.state.turn_player;

    cap_mana(game, &[player, player.next()])?;
    let gain = game.state.config.mana_gain;
    if gain > 0 {
        game.timing(vec![Action::change_mana(player, gain)], TimingMode::Effect)?;
    }

    let mut upkeep = 0;
    for id in game.state.zones(player).partner.cards() {
        upkeep += game.state.card(id)?.values.current.level.max(0);
    }
    if upkeep > 0
        && game
            .timing(vec![Action::change_mana(player, -upkeep)], TimingMode::Cost)?
            .is_none()
    {
        debug!(player = %player, upkeep, "partner upkeep not paid");
        let loss = Action::grant_victory(player.next(), VictoryCondition::PartnerUpkeep);
        game.timing(vec![loss], TimingMode::Effect)?;
    }
    cap_mana(game, &[player])?;

    for p in [player, player.next()] {
        enforce_hand_limit(game, p)?;
    }
    let timings = game.record.split_off(start);
    game.current_phase()?.timings = timings;
    Ok(())
}

/// A phase played out in stacks, until one closes empty.
pub(super) fn stack_phase(game: &mut Game, phase: PhaseName) -> Flow<()> {
    begin(game, phase)?;
    let mut index = 0;
    loop {
        index += 1;
        if run_stack(game, index)? == 0 {
            return Ok(());
        }
    }
}
