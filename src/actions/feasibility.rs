//! Whether an action can happen at all, and whether it can happen in full.
//!
//! Impossible actions are pruned from their timing before anything runs.
//! The second check only matters when a timing is paid as a cost: a cost
//! that would only partially happen is not paid at all.

use crate::core::{CardRef, EngineError, GameState};
use crate::values::StatTarget;
use crate::zones::{ZoneKind, ZoneRef};

use super::run::{equip_candidates, stat_change_applies, stat_change_fully_applies};
use super::{Action, ActionKind};

/// The card no longer exists as the instance `card` refers to.
fn is_gone(card: CardRef, state: &GameState) -> bool {
    state
        .card(card.id)
        .map_or(true, |live| live.removed || live.epoch != card.epoch)
}

fn is_removed(card: CardRef, state: &GameState) -> bool {
    state.card(card.id).map_or(true, |live| live.removed)
}

fn in_partner_zone(card: CardRef, state: &GameState) -> bool {
    state
        .card(card.id)
        .is_ok_and(|live| live.zone_kind() == Some(ZoneKind::Partner))
}

fn free_slots(zone: ZoneRef, state: &GameState) -> usize {
    state
        .zones(zone.player)
        .field(zone.kind)
        .map_or(0, |field| field.free_slots().len())
}

/// How many actions up to and including `index` want a slot in `zone`.
fn slots_wanted(zone: ZoneRef, index: usize, timing: &[Action]) -> usize {
    timing
        .iter()
        .take(index + 1)
        .filter(|action| match &action.kind {
            ActionKind::Place { zone: z, .. } => *z == zone,
            ActionKind::Move {
                zone: z,
                destination: None,
                ..
            } => *z == zone,
            _ => false,
        })
        .count()
}

impl Action {
    /// Whether this action must be removed from `timing`, where it sits at
    /// `index`.
    pub(crate) fn is_impossible(
        &self,
        index: usize,
        timing: &[Action],
        state: &GameState,
    ) -> Result<bool, EngineError> {
        let player = &state.players[self.player];
        Ok(match &self.kind {
            ActionKind::ChangeMana { amount, .. } => {
                *amount == 0 || (player.mana == 0 && *amount < 0)
            }
            ActionKind::ChangeLife { amount, .. } => *amount == 0,
            ActionKind::DealDamage { amount, .. } => *amount < 0,
            ActionKind::Draw { .. } | ActionKind::Shuffle { .. } => false,

            ActionKind::Place { card, zone, .. } => {
                is_gone(*card, state) || free_slots(*zone, state) < slots_wanted(*zone, index, timing)
            }
            ActionKind::Summon { card, .. }
            | ActionKind::Deploy { card, .. }
            | ActionKind::Cast { card, .. } => match state.location(card.id) {
                Some(location) if location.placed => {
                    // someone else took the reserved slot in the meantime
                    state
                        .zones(location.zone.player)
                        .field(location.zone.kind)
                        .and_then(|field| field.get(location.index))
                        .is_some_and(|occupant| occupant != card.id)
                }
                _ => true,
            },
            ActionKind::Move {
                card,
                zone,
                destination,
                ..
            } => {
                is_removed(*card, state)
                    || in_partner_zone(*card, state)
                    || (zone.kind.is_field()
                        && match destination {
                            Some(_) => free_slots(*zone, state) == 0,
                            None => free_slots(*zone, state) < slots_wanted(*zone, index, timing),
                        })
            }
            ActionKind::Discard { card, .. } | ActionKind::Exile { card, .. } => {
                is_gone(*card, state) || in_partner_zone(*card, state)
            }
            ActionKind::Destroy { card, .. } => {
                in_partner_zone(*card, state)
                    || !timing.iter().any(|other| {
                        matches!(&other.kind, ActionKind::Discard { card: c, .. } if c.id == card.id)
                    })
            }

            ActionKind::EstablishAttackDeclaration { attackers, .. } => {
                attackers.iter().all(|a| is_gone(*a, state))
            }
            ActionKind::ApplyStatChange {
                target,
                modifications,
                source,
                ..
            } => {
                if let StatTarget::Card(id) = target {
                    if !state.card(*id)?.is_on_field() {
                        return Ok(true);
                    }
                }
                !stat_change_applies(*target, modifications, source, state)?
            }
            ActionKind::RemoveStatChange {
                target, modifier, ..
            } => {
                let stack = match target {
                    StatTarget::Card(id) => &state.card(*id)?.values.modifiers,
                    StatTarget::Player(p) => &state.players[*p].values.modifiers,
                };
                !stack.iter().any(|m| m.id == *modifier)
            }
            ActionKind::CancelAttack { .. } => state.attack.is_none(),
            ActionKind::SetAttackTarget { target, .. } => {
                state.attack.is_none()
                    || is_gone(*target, state)
                    || !state
                        .card(target.id)
                        .is_ok_and(|c| c.is_on_field() && c.is_unit())
            }
            ActionKind::GiveAttack { card, .. } => {
                is_removed(*card, state) || !state.card(card.id).is_ok_and(|c| c.is_unit())
            }
            ActionKind::EquipCard { equipment, .. } => {
                is_gone(*equipment, state)
                    || equip_candidates(*equipment, self.player, state)?.is_empty()
            }
            ActionKind::View { card, .. } => is_removed(*card, state),
            ActionKind::Reveal { card, .. } => {
                is_removed(*card, state) || state.card(card.id)?.hidden_from.is_empty()
            }
            ActionKind::ChangeCounters {
                card,
                counter,
                amount,
                ..
            } => {
                is_gone(*card, state)
                    || *amount == 0
                    || (*amount < 0 && state.card(card.id)?.counter(counter) == 0)
            }
            ActionKind::Swap { first, second, .. } => {
                let leaves_field = |token: CardRef, other: CardRef| {
                    state.card(token.id).is_ok_and(|c| c.is_token)
                        && !state
                            .card(other.id)
                            .is_ok_and(|c| c.zone.is_some_and(|z| z.kind.is_field()))
                };
                is_removed(*first, state)
                    || is_removed(*second, state)
                    || leaves_field(*first, *second)
                    || leaves_field(*second, *first)
            }
            ActionKind::CreateToken { .. } | ActionKind::GrantVictory { .. } => false,
        })
    }

    /// Whether this action would happen in full. Only asked of actions that
    /// are not impossible.
    pub(crate) fn is_fully_possible(&self, state: &GameState) -> Result<bool, EngineError> {
        let player = &state.players[self.player];
        Ok(match &self.kind {
            ActionKind::ChangeMana { amount, .. } => {
                player.mana.checked_add(*amount).is_some_and(|m| m >= 0)
            }
            ActionKind::ChangeLife { amount, .. } => {
                player.life.checked_add(*amount).is_some_and(|l| l >= 0)
            }
            ActionKind::Draw { amount, .. } => state.zones(self.player).deck.len() >= *amount,
            ActionKind::ApplyStatChange {
                target,
                modifications,
                source,
                ..
            } => stat_change_fully_applies(*target, modifications, source, state)?,
            ActionKind::ChangeCounters {
                card,
                counter,
                amount,
                ..
            } => state.card(card.id)?.counter(counter) + amount >= 0,
            _ => true,
        })
    }
}
