//! One turn: its phases in order, then end-of-turn cleanup.

use tracing::debug;

use crate::actions::{Action, ActionHost};
use crate::core::{Flow, GameState};
use crate::io::event::Event;
use crate::io::request::{Request, RequestKind, Response};
use crate::script::ast::PhaseName;
use crate::timing::{TimingHost, TimingMode};
use crate::values::{ModifierId, StatTarget};

use super::{phase, Game, TurnRecord};

pub(super) fn run_turn(game: &mut Game) -> Flow<()> {
    let player = game.state.turn_player;
    game.state.turn_number += 1;
    game.state.turn_actions.clear();
    game.standard_draw_done = false;
    let turn = game.state.turn_number;
    debug!(turn, player = %player, "turn started");
    game.history.push(TurnRecord {
        number: turn,
        player,
        phases: Vec::new(),
    });
    game.emit(Event::TurnStarted { player, turn });

    phase::mana_supply(game)?;
    phase::stack_phase(game, PhaseName::Draw)?;
    phase::stack_phase(game, PhaseName::Main1)?;
    let battle = game.request(Request::new(player, RequestKind::EnterBattlePhase))?;
    if battle == Response::EnterBattlePhase(true) {
        phase::stack_phase(game, PhaseName::Battle)?;
        phase::stack_phase(game, PhaseName::Main2)?;
    }
    phase::stack_phase(game, PhaseName::End)?;
    end_turn(game)
}

fn modifier_exists(state: &GameState, target: StatTarget, id: ModifierId) -> bool {
    let stack = match target {
        StatTarget::Card(card) => state.card(card).map(|c| &c.values.modifiers),
        StatTarget::Player(p) => Ok(&state.players[p].values.modifiers),
    };
    stack.is_ok_and(|modifiers| modifiers.iter().any(|m| m.id == id))
}

/// Expire stat changes, reset per-turn counters and hand the turn over.
fn end_turn(game: &mut Game) -> Flow<()> {
    let turn = game.state.turn_number;
    let player = game.state.turn_player;

    // modifiers that left with their card expire quietly
    let state = &game.state;
    let live: Vec<_> = state
        .expirations
        .iter()
        .filter(|e| modifier_exists(state, e.target, e.modifier))
        .cloned()
        .collect();
    game.state.expirations = live;
    let expired: Vec<Action> = game
        .state
        .expirations
        .iter()
        .filter(|e| e.turn <= turn)
        .map(|e| Action::remove_stat_change(player, e.target, e.modifier))
        .collect();
    if !expired.is_empty() {
        game.timing(expired, TimingMode::Effect)?;
    }
    game.state.expirations.retain(|e| e.turn > turn);

    let ids: Vec<_> = game.state.card_ids().collect();
    for id in ids {
        game.state.card_mut(id)?.end_turn();
    }
    game.state.attack = None;
    game.record.clear();
    game.state.turn_player = player.next();
    debug!(turn, "turn ended");
    Ok(())
}
