//! Stacks: rounds of alternating priority within a phase.
//!
//! The turn player acts first. Every created block hands priority to the
//! opponent; a block that fails to be created leaves it where it was. Two
//! passes in a row close the stack, and its blocks then run last in, first
//! out. A phase keeps opening stacks until one closes empty.
//!
//! ## Key Types
//!
//! - `BlockKind`: the kinds of move a block can be
//! - `Stack`: the blocks created so far in one round

mod block;
mod priority;

pub use block::BlockKind;

pub(crate) use block::{Block, Plan};

use tracing::{debug, warn};

use crate::game::{Game, StackRecord};
use crate::io::event::Event;
use crate::timing::{triggers, TimingHost};

use priority::Choice;

/// The blocks of one round, in creation order.
pub(crate) struct Stack {
    pub index: u32,
    pub blocks: Vec<Block>,
}

/// Run one stack to its end and return how many blocks it held.
pub(crate) fn run_stack(game: &mut Game, index: u32) -> crate::core::Flow<usize> {
    let mut stack = Stack {
        index,
        blocks: Vec::new(),
    };
    debug!(index, phase = ?game.state.phase, "stack started");
    game.emit(Event::StackStarted { index });

    let mut player = game.state.turn_player;
    let mut passes = 0;
    while passes < 2 {
        let plan = match priority::choose(game, &stack, player)? {
            Choice::Pass => {
                game.emit(Event::PlayerPassed { player });
                passes += 1;
                player = player.next();
                continue;
            }
            Choice::Block(plan) => plan,
        };
        let kind = plan.kind();
        let activated = match &plan {
            Plan::Ability(option) => Some((option.card.id, option.ability)),
            _ => None,
        };
        if let Some(key) = activated {
            game.phase_forced.push(key);
        }
        match block::create(game, player, plan)? {
            Some(block) => {
                if kind == BlockKind::StandardDraw {
                    game.standard_draw_done = true;
                }
                game.emit(Event::BlockCreated { player, kind });
                stack.blocks.push(block);
                passes = 0;
                player = player.next();
            }
            None => {
                warn!(player = %player, kind = %kind, "block creation failed");
                game.emit(Event::BlockCreationFailed { player, kind });
                if let Some((card, ability)) = activated {
                    let state = game.state.card_mut(card)?.ability_state_mut(ability);
                    state.trigger_met = false;
                }
            }
        }
    }

    triggers::clear(&mut game.state)?;
    let count = stack.blocks.len();
    debug!(index = stack.index, blocks = count, "stack closed");
    let mut records = Vec::with_capacity(count);
    while let Some(mut block) = stack.blocks.pop() {
        block::execute(game, &mut block)?;
        records.push(block.into_record());
    }
    records.reverse();

    if game
        .state
        .attack
        .as_ref()
        .is_some_and(|a| a.fought || a.cancelled || a.target.is_none() || a.attackers.is_empty())
    {
        game.state.attack = None;
    }
    game.current_phase()?.stacks.push(StackRecord {
        index: stack.index,
        blocks: records,
    });
    game.emit(Event::StackClosed {
        index: stack.index,
        blocks: count,
    });
    Ok(count)
}
