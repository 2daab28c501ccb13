//! Timings: actions that happen at the same moment.
//!
//! Before a timing runs, actions that became impossible are pruned until
//! nothing else drops out. What remains runs in order; afterwards values
//! are recalculated, static abilities are refreshed, triggers are checked
//! against the executed actions and victory conditions end the game.
//!
//! ## Modes
//!
//! - `Effect`: pruning is fine, but an empty timing fails
//! - `Cost`: all or nothing; an empty cost is paid trivially
//!
//! ```
//! use std::sync::Arc;
//! use cu_rules::actions::Action;
//! use cu_rules::cards::CardRegistry;
//! use cu_rules::core::{GameState, PlayerId, RulesConfig};
//! use cu_rules::timing::substitute;
//!
//! let state = GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()));
//! let actions = vec![
//!     Action::change_mana(PlayerId::new(0), -2),
//!     Action::change_life(PlayerId::new(0), 100),
//! ];
//! let substituted = substitute(actions, &state).unwrap();
//! assert_eq!(substituted.kept.len(), 1);
//! assert_eq!(substituted.cancelled[0].name(), "changeMana");
//! ```

pub mod statics;
pub mod triggers;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::actions::{link_destroys, Action, ActionHost};
use crate::core::{EngineError, Flow, GameState, Halt};
use crate::io::event::Event;
use crate::rules::GameResult;
use crate::values::recalculate_all;

/// What running timings needs beyond running actions.
pub(crate) trait TimingHost: ActionHost {
    fn emit(&mut self, event: Event);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingMode {
    Effect,
    Cost,
}

/// A timing that ran, with its executed actions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Timing {
    pub index: u64,
    pub actions: Vec<Action>,
}

impl Timing {
    /// Undo every action, last first.
    pub(crate) fn undo(&mut self, state: &mut GameState) -> Result<(), EngineError> {
        for action in self.actions.iter_mut().rev() {
            action.undo(state)?;
        }
        debug!(timing = self.index, "timing undone");
        Ok(())
    }
}

/// The result of pruning a timing.
#[derive(Clone, Debug, Default)]
pub struct Substitution {
    pub kept: Vec<Action>,
    pub cancelled: Vec<Action>,
}

/// Prune impossible actions until a pass removes nothing.
///
/// Each pass judges every action against the list as it stood at the start
/// of the pass, so actions that invalidate each other drop out together.
pub fn substitute(actions: Vec<Action>, state: &GameState) -> Result<Substitution, EngineError> {
    let mut kept = actions;
    let mut cancelled = Vec::new();
    let mut pass = 0;
    loop {
        pass += 1;
        let mut impossible = Vec::with_capacity(kept.len());
        for (index, action) in kept.iter().enumerate() {
            impossible.push(action.is_impossible(index, &kept, state)?);
        }
        if !impossible.contains(&true) {
            trace!(pass, kept = kept.len(), "substitution settled");
            return Ok(Substitution { kept, cancelled });
        }
        let (still, dropped): (Vec<_>, Vec<_>) = kept
            .into_iter()
            .zip(impossible)
            .partition(|(_, impossible)| !impossible);
        trace!(pass, dropped = dropped.len(), "substitution pass");
        kept = still.into_iter().map(|(action, _)| action).collect();
        cancelled.extend(dropped.into_iter().map(|(action, _)| action));
    }
}

/// Run one timing. `None` if it failed: an empty effect timing, or a cost
/// that could not be paid in full. A failed timing changes nothing.
pub(crate) fn run_timing<H: TimingHost>(
    host: &mut H,
    actions: Vec<Action>,
    mode: TimingMode,
) -> Flow<Option<Timing>> {
    let Substitution {
        mut kept,
        cancelled,
    } = substitute(actions, host.state())?;
    for action in &cancelled {
        warn!(action = action.name(), player = %action.player, "action cancelled");
        host.emit(Event::ActionCancelled {
            player: action.player,
            action: action.name().to_string(),
        });
    }

    match mode {
        TimingMode::Effect if kept.is_empty() => {
            debug!("empty timing");
            return Ok(None);
        }
        TimingMode::Cost => {
            if !cancelled.is_empty() {
                debug!(cancelled = cancelled.len(), "cost lost actions to substitution");
                return Ok(None);
            }
            for action in &kept {
                if !action.is_fully_possible(host.state())? {
                    debug!(action = action.name(), "cost cannot be paid in full");
                    return Ok(None);
                }
            }
        }
        TimingMode::Effect => {}
    }

    let state = host.state_mut();
    state.timing_counter += 1;
    let index = state.timing_counter;
    debug!(timing = index, actions = kept.len(), ?mode, "running timing");

    for action in &mut kept {
        for event in action.run(&mut *host)? {
            host.emit(event);
        }
    }
    link_destroys(&mut kept);

    let state = host.state_mut();
    for action in &kept {
        state.turn_actions.push_back(action.clone());
        state.block_actions.push_back(action.clone());
    }
    settle(host, &kept)?;
    Ok(Some(Timing {
        index,
        actions: kept,
    }))
}

/// Bring derived state up to date after `executed` ran.
fn settle<H: TimingHost>(host: &mut H, executed: &[Action]) -> Flow<()> {
    recalculate_all(host.state_mut())?;
    statics::refresh(host)?;
    triggers::check(host.state_mut(), executed)?;
    match GameResult::from_state(host.state()) {
        Some(result) => Err(Halt::GameOver(result)),
        None => Ok(()),
    }
}

/// Recompute values and statics after timings were undone.
pub(crate) fn resettle<H: TimingHost>(host: &mut H) -> Flow<()> {
    recalculate_all(host.state_mut())?;
    statics::refresh(host)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cards::{CardDefinition, CardId, CardRegistry, CardType};
    use crate::core::{CardRef, Destination, PlayerId, RulesConfig};
    use crate::zones::{ZoneKind, ZonePosition, ZoneRef};

    fn p0() -> PlayerId {
        PlayerId::new(0)
    }

    fn state() -> GameState {
        GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()))
    }

    fn add(state: &mut GameState, kind: ZoneKind) -> CardRef {
        let def = Arc::new(CardDefinition::new(CardId::new(1), CardType::Unit));
        let zone = ZoneRef::new(p0(), kind);
        let destination = match state.zones(p0()).field(kind) {
            Some(field) => Destination::Slot(field.free_slots()[0]),
            None => Destination::Pile(ZonePosition::Top),
        };
        let id = state.add_card(def, p0(), zone, destination).unwrap();
        state.card(id).unwrap().current_ref()
    }

    #[test]
    fn test_substitution_cascades() {
        let mut state = state();
        let partner = add(&mut state, ZoneKind::Partner);
        // the discard is impossible, which takes the destroy with it
        let actions = vec![
            Action::discard(p0(), partner),
            Action::destroy(p0(), partner),
            Action::deal_damage(p0(), 100),
        ];
        let result = substitute(actions, &state).unwrap();
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.kept[0].name(), "dealDamage");
        assert_eq!(result.cancelled.len(), 2);
    }

    #[test]
    fn test_substitution_keeps_order() {
        let mut state = state();
        let a = add(&mut state, ZoneKind::Hand);
        let b = add(&mut state, ZoneKind::Hand);
        let actions = vec![
            Action::discard(p0(), a),
            Action::change_mana(p0(), 0),
            Action::discard(p0(), b),
        ];
        let result = substitute(actions, &state).unwrap();
        let cards: Vec<_> = result.kept.iter().filter_map(Action::card).collect();
        assert_eq!(cards, vec![a, b]);
    }

    #[test]
    fn test_empty_substitution() {
        let state = state();
        let result = substitute(Vec::new(), &state).unwrap();
        assert!(result.kept.is_empty());
        assert!(result.cancelled.is_empty());
    }
}
