//! Blocks: one move a player puts on the stack.
//!
//! Creating a block pays its costs right away, timing by timing. If any
//! of them cannot be paid, everything already paid is undone and the block
//! never joins the stack. The block's effect runs later, when the stack
//! closes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::abilities::{activation_context, AbilityDefinition, AbilityKind};
use crate::actions::{Action, ActionKind};
use crate::cards::CardType;
use crate::core::{CardRef, EngineError, Flow, Halt, PlayerId};
use crate::game::{BlockRecord, Game};
use crate::io::event::Event;
use crate::io::request::AbilityOption;
use crate::rules;
use crate::script::eval::run_script;
use crate::script::EvalContext;
use crate::timing::{Timing, TimingHost, TimingMode};
use crate::zones::{ZoneKind, ZoneRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    StandardDraw,
    StandardSummon,
    DeployItem,
    CastSpell,
    Retire,
    AttackDeclaration,
    Fight,
    AbilityActivation,
}

impl BlockKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StandardDraw => "standardDraw",
            Self::StandardSummon => "standardSummon",
            Self::DeployItem => "deployItem",
            Self::CastSpell => "castSpell",
            Self::Retire => "retire",
            Self::AttackDeclaration => "attackDeclaration",
            Self::Fight => "fight",
            Self::AbilityActivation => "abilityActivation",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The move a player picked, before its costs are paid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Plan {
    StandardDraw,
    StandardSummon(CardRef),
    DeployItem(CardRef),
    CastSpell(CardRef),
    Retire(Vec<CardRef>),
    AttackDeclaration(Vec<CardRef>),
    Fight,
    Ability(AbilityOption),
}

impl Plan {
    pub(crate) const fn kind(&self) -> BlockKind {
        match self {
            Self::StandardDraw => BlockKind::StandardDraw,
            Self::StandardSummon(_) => BlockKind::StandardSummon,
            Self::DeployItem(_) => BlockKind::DeployItem,
            Self::CastSpell(_) => BlockKind::CastSpell,
            Self::Retire(_) => BlockKind::Retire,
            Self::AttackDeclaration(_) => BlockKind::AttackDeclaration,
            Self::Fight => BlockKind::Fight,
            Self::Ability(_) => BlockKind::AbilityActivation,
        }
    }
}

/// An ability's effect script with the context its cost left behind.
type PendingScript = (AbilityDefinition, EvalContext);

pub(crate) struct Block {
    pub kind: BlockKind,
    pub player: PlayerId,
    pub cancelled: bool,
    pub costs: Vec<Timing>,
    pub executed: Vec<Timing>,
    plan: Plan,
    scripts: Vec<PendingScript>,
}

impl Block {
    pub(crate) fn into_record(self) -> BlockRecord {
        BlockRecord {
            kind: self.kind,
            player: self.player,
            cancelled: self.cancelled,
            costs: self.costs,
            executed: self.executed,
        }
    }

    fn cost_actions(&self) -> Vec<Action> {
        self.costs
            .iter()
            .flat_map(|timing| timing.actions.iter().cloned())
            .collect()
    }
}

/// Pay the costs of `plan`. `None` if they could not be paid in full, in
/// which case the game is as it was before.
pub(crate) fn create(game: &mut Game, player: PlayerId, plan: Plan) -> Flow<Option<Block>> {
    let start = game.record.len();
    game.state.block_actions.clear();
    let mode = std::mem::replace(&mut game.mode, TimingMode::Cost);
    let paid = pay(game, player, &plan);
    game.mode = mode;

    match paid {
        Ok(Some(scripts)) => {
            let costs = game.record.split_off(start);
            debug!(kind = %plan.kind(), player = %player, costs = costs.len(), "block created");
            Ok(Some(Block {
                kind: plan.kind(),
                player,
                cancelled: false,
                costs,
                executed: Vec::new(),
                plan,
                scripts,
            }))
        }
        Ok(None) | Err(Halt::Stopped) => {
            game.rollback(start)?;
            Ok(None)
        }
        Err(halt) => Err(halt),
    }
}

/// Put a card from hand into a free slot and pay its level in mana.
fn placement_cost(game: &mut Game, player: PlayerId, card: CardRef, zone: ZoneKind) -> Flow<bool> {
    let level = game.state.card(card.id)?.values.current.level;
    let mut actions = vec![Action::place(player, card, ZoneRef::new(player, zone))];
    if level > 0 {
        actions.push(Action::change_mana(player, -level));
    }
    Ok(game.timing(actions, TimingMode::Cost)?.is_some())
}

/// Place a spell or item, then run the cost scripts of its cast or deploy
/// abilities.
fn card_costs(
    game: &mut Game,
    player: PlayerId,
    card: CardRef,
    kind: AbilityKind,
) -> Flow<Option<Vec<PendingScript>>> {
    if !placement_cost(game, player, card, ZoneKind::SpellItem)? {
        return Ok(None);
    }
    let definition = game.state.card(card.id)?.definition.clone();
    let mut scripts = Vec::new();
    for ability in definition.abilities.iter().filter(|a| a.kind == kind) {
        let ctx = activation_context(ability, game.state.card(card.id)?, player);
        let ctx = run_script(&ability.cost, &ctx, game)?;
        scripts.push((ability.clone(), ctx));
    }
    Ok(Some(scripts))
}

fn pay(game: &mut Game, player: PlayerId, plan: &Plan) -> Flow<Option<Vec<PendingScript>>> {
    let paid = match plan {
        Plan::StandardDraw | Plan::Fight => true,
        Plan::StandardSummon(card) => placement_cost(game, player, *card, ZoneKind::Unit)?,
        Plan::DeployItem(card) => return card_costs(game, player, *card, AbilityKind::Deploy),
        Plan::CastSpell(card) => return card_costs(game, player, *card, AbilityKind::Cast),
        Plan::Retire(units) => {
            let actions = units.iter().map(|&unit| Action::retire(player, unit)).collect();
            game.timing(actions, TimingMode::Cost)?.is_some()
        }
        Plan::AttackDeclaration(attackers) => {
            let actions = vec![Action::establish_attack(player, attackers.clone())];
            game.timing(actions, TimingMode::Cost)?.is_some()
        }
        Plan::Ability(option) => return ability_costs(game, player, *option),
    };
    Ok(paid.then(Vec::new))
}

fn ability_costs(
    game: &mut Game,
    player: PlayerId,
    option: AbilityOption,
) -> Flow<Option<Vec<PendingScript>>> {
    let card = game.state.card(option.card.id)?;
    let ability = card
        .definition
        .abilities
        .iter()
        .find(|a| a.id == option.ability)
        .cloned()
        .ok_or_else(|| EngineError::UnknownAbility(option.ability.to_string()))?;
    let ctx = activation_context(&ability, card, player);
    let ctx = run_script(&ability.cost, &ctx, game)?;

    game.state
        .card_mut(option.card.id)?
        .ability_state_mut(ability.id)
        .record_activation();
    game.emit(Event::AbilityActivated {
        player,
        card: option.card,
        ability: ability.id,
    });
    Ok(Some(vec![(ability, ctx)]))
}

/// Whether a block lost its purpose while it waited on the stack.
fn lost_purpose(game: &Game, block: &Block) -> Result<bool, EngineError> {
    Ok(match &block.plan {
        Plan::Fight => game
            .state
            .attack
            .as_ref()
            .map_or(true, |a| a.cancelled || a.target.is_none() || a.attackers.is_empty()),
        Plan::AttackDeclaration(_) => game.state.attack.as_ref().map_or(true, |a| a.cancelled),
        Plan::Ability(option) => {
            let card = game.state.card(option.card.id)?;
            card.epoch == option.card.epoch && card.values.current.is_ability_cancelled(option.ability)
        }
        _ => false,
    })
}

/// Run the effect of a block. Cancelled blocks do nothing.
pub(crate) fn execute(game: &mut Game, block: &mut Block) -> Flow<()> {
    if lost_purpose(game, block)? {
        block.cancelled = true;
        debug!(kind = %block.kind, player = %block.player, "block cancelled");
        game.emit(Event::BlockCancelled {
            player: block.player,
            kind: block.kind,
        });
        return Ok(());
    }
    let start = game.record.len();
    game.state.block_actions.clear();
    let outcome = run_effect(game, block);
    block.executed = game.record.split_off(start);
    match outcome {
        Ok(()) | Err(Halt::Stopped) => Ok(()),
        Err(halt) => Err(halt),
    }
}

fn run_scripts(game: &mut Game, scripts: &[PendingScript]) -> Flow<()> {
    for (ability, ctx) in scripts {
        run_script(&ability.exec, ctx, game)?;
    }
    Ok(())
}

/// The card a promotion moved, as it is now.
fn promoted(executed: &[Action]) -> Option<CardRef> {
    executed.iter().find_map(|action| match &action.kind {
        ActionKind::Deploy { moved, .. } | ActionKind::Cast { moved, .. } => {
            moved.as_ref().map(|m| m.to)
        }
        _ => None,
    })
}

fn run_effect(game: &mut Game, block: &Block) -> Flow<()> {
    let player = block.player;
    let effect = TimingMode::Effect;
    match &block.plan {
        Plan::StandardDraw => {
            let amount = usize::try_from(game.state.config.standard_draw).unwrap_or(0);
            game.timing(vec![Action::draw(player, amount)], effect)?;
        }
        Plan::StandardSummon(card) => {
            game.timing(vec![Action::summon(player, *card)], effect)?;
        }
        Plan::DeployItem(card) => {
            let Some(executed) = game.timing(vec![Action::deploy(player, *card)], effect)? else {
                return Ok(());
            };
            if let Some(item) = promoted(&executed) {
                if game.state.card(item.id)?.values.current.has_card_type(CardType::EquipableItem) {
                    game.timing(vec![Action::equip(player, item)], effect)?;
                }
            }
            run_scripts(game, &block.scripts)?;
        }
        Plan::CastSpell(card) => {
            let Some(executed) = game.timing(vec![Action::cast(player, *card)], effect)? else {
                return Ok(());
            };
            match run_scripts(game, &block.scripts) {
                Ok(()) | Err(Halt::Stopped) => {}
                Err(halt) => return Err(halt),
            }
            // standard spells go to the discard pile once they resolved
            if let Some(spell) = promoted(&executed) {
                let card = game.state.card(spell.id)?;
                if card.epoch == spell.epoch
                    && card.is_on_field()
                    && card.values.current.has_card_type(CardType::StandardSpell)
                {
                    game.timing(vec![Action::discard(player, spell)], effect)?;
                }
            }
        }
        Plan::Retire(_) => {
            let mana = rules::retire_mana(&block.cost_actions());
            if mana > 0 {
                game.timing(vec![Action::change_mana(player, mana)], effect)?;
            }
        }
        Plan::AttackDeclaration(_) => {}
        Plan::Fight => {
            if let Some(fight) = rules::fight(&game.state)? {
                for event in fight.events() {
                    game.emit(event);
                }
                let defender = fight.defender;
                if !fight.actions.is_empty() {
                    game.timing(fight.actions, effect)?;
                }
                // a partner takes damage but stays, so it strikes back too
                let survived = game.state.card(defender.id).is_ok_and(|card| {
                    card.epoch == defender.epoch && !card.removed && card.is_on_field()
                });
                if survived {
                    if let Some(back) = rules::counterattack(&game.state)? {
                        for event in back.events() {
                            game.emit(event);
                        }
                        if !back.actions.is_empty() {
                            game.timing(back.actions, effect)?;
                        }
                    }
                }
            }
            if let Some(attack) = &mut game.state.attack {
                attack.fought = true;
            }
        }
        Plan::Ability(_) => run_scripts(game, &block.scripts)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::AbilityId;
    use crate::cards::CardId;
    use crate::core::EntityId;

    #[test]
    fn test_plan_kinds() {
        let card = CardRef::new(EntityId(4), 0);
        assert_eq!(Plan::StandardSummon(card).kind(), BlockKind::StandardSummon);
        assert_eq!(Plan::Retire(vec![card]).kind(), BlockKind::Retire);
        let option = AbilityOption {
            card,
            ability: AbilityId::new(CardId::new(2), 1),
        };
        assert_eq!(Plan::Ability(option).kind(), BlockKind::AbilityActivation);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(BlockKind::AttackDeclaration.to_string(), "attackDeclaration");
        assert_eq!(BlockKind::StandardDraw.as_str(), "standardDraw");
    }
}
