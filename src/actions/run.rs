//! Running and undoing actions.

use std::sync::Arc;

use tracing::trace;

use crate::core::{
    AttackDeclaration, CardRef, Destination, EngineError, EntityId, Expiration, Flow, GameState,
    PlayerId, VictoryCondition,
};
use crate::io::event::Event;
use crate::io::request::{ChoiceReason, Request, RequestKind};
use crate::script::ast::Until;
use crate::script::eval::evaluate;
use crate::script::value::cards;
use crate::script::EvalContext;
use crate::values::{Modification, Modifier, ModifierId, ModifierSource, StatTarget};
use crate::zones::{ZoneKind, ZonePosition, ZoneRef};

use super::{Action, ActionHost, ActionKind, AttackerRecord, Moved};

/// Move a card and keep what is needed to put it back.
fn relocate(
    state: &mut GameState,
    card: EntityId,
    zone: ZoneRef,
    destination: Destination,
) -> Result<Moved, EngineError> {
    let snapshot = Arc::new(state.snapshot(card)?);
    let from = state.move_card(card, zone, destination)?;
    let to = state.card(card)?.current_ref();
    Ok(Moved { snapshot, from, to })
}

/// Turn a placed card into a card on the field proper, in its reserved slot.
fn promote(state: &mut GameState, card: CardRef) -> Result<Moved, EngineError> {
    let location = state
        .location(card.id)
        .filter(|l| l.placed)
        .ok_or_else(|| EngineError::Invariant(format!("{card} is not placed")))?;
    relocate(state, card.id, location.zone, Destination::Slot(location.index))
}

/// Pick one of a field zone's free slots, asking `player` if there is a
/// choice. `None` if the zone is full.
fn choose_slot(host: &mut dyn ActionHost, player: PlayerId, zone: ZoneRef) -> Flow<Option<usize>> {
    let free = host
        .state()
        .zones(zone.player)
        .field(zone.kind)
        .map(|field| field.free_slots())
        .unwrap_or_default();
    match free.as_slice() {
        [] => Ok(None),
        [slot] => Ok(Some(*slot)),
        _ => {
            let request = Request::new(
                player,
                RequestKind::ChooseZoneSlot {
                    zone,
                    slots: free.clone(),
                },
            );
            let index = host.request(request)?.into_index()?;
            Ok(free.get(index).copied())
        }
    }
}

fn grant(state: &mut GameState, player: PlayerId, condition: VictoryCondition) -> Event {
    state.players[player].victory_conditions.push(condition);
    Event::VictoryConditionGained { player, condition }
}

fn revoke(state: &mut GameState, player: PlayerId, condition: VictoryCondition) {
    let conditions = &mut state.players[player].victory_conditions;
    if let Some(index) = conditions.iter().rposition(|&c| c == condition) {
        conditions.remove(index);
    }
}

/// Change life by `delta`, floored at 0. Returns the applied change and
/// whether the opponent won by it.
fn change_life(state: &mut GameState, player: PlayerId, delta: i64, events: &mut Vec<Event>) -> (i64, bool) {
    let before = state.players[player].life;
    let after = before.saturating_add(delta).max(0);
    state.players[player].life = after;
    let granted = after == 0 && before > 0;
    if granted {
        events.push(grant(state, player.next(), VictoryCondition::LifeZero));
    }
    (after - before, granted)
}

/// The turn at whose end a temporary stat change is removed.
fn expiry_turn(until: Until, source: &ModifierSource, state: &GameState) -> Option<u32> {
    let turn = state.turn_number;
    let own_turn = state.turn_player == source.player;
    match until {
        Until::Forever => None,
        Until::EndOfTurn => Some(turn),
        Until::EndOfNextTurn => Some(turn + 1),
        Until::EndOfYourNextTurn => Some(turn + if own_turn { 2 } else { 1 }),
        Until::EndOfOpponentNextTurn => Some(turn + if own_turn { 1 } else { 2 }),
    }
}

fn modifiers_mut(state: &mut GameState, target: StatTarget) -> Result<&mut Vec<Modifier>, EngineError> {
    Ok(match target {
        StatTarget::Card(id) => &mut state.card_mut(id)?.values.modifiers,
        StatTarget::Player(player) => &mut state.players[player].values.modifiers,
    })
}

/// The modifications that can change the target right now.
fn applicable(
    modifications: &[Modification],
    target: StatTarget,
    source: &ModifierSource,
    state: &GameState,
) -> Result<Vec<Modification>, EngineError> {
    let ctx = source.context(target, state);
    let mut kept = Vec::new();
    for modification in modifications {
        let fits = match target {
            StatTarget::Card(id) => {
                modification.can_apply_to(&state.card(id)?.values.current, &ctx, state)?
            }
            StatTarget::Player(player) => {
                modification.can_apply_to(&state.players[player].values.current, &ctx, state)?
            }
        };
        if fits {
            kept.push(modification.clone());
        }
    }
    Ok(kept)
}

/// Units on the field an equipable item may attach to.
pub fn equip_candidates(
    equipment: CardRef,
    player: PlayerId,
    state: &GameState,
) -> Result<Vec<CardRef>, EngineError> {
    let card = state.card(equipment.id)?;
    let Some(equipable_to) = card.definition.equipable_to.clone() else {
        return Ok(Vec::new());
    };
    let ctx = EvalContext::new(player)
        .with_card(equipment.id)
        .with_evaluating_player(player);
    let values = evaluate(&equipable_to, &ctx, state)?;
    Ok(cards(&values)
        .into_iter()
        .filter_map(|c| c.current(state))
        .filter(|c| {
            state
                .card(c.id)
                .is_ok_and(|unit| unit.is_on_field() && unit.is_unit())
        })
        .collect())
}

impl Action {
    /// Perform the action and record what it did.
    pub(crate) fn run(&mut self, host: &mut dyn ActionHost) -> Flow<Vec<Event>> {
        let player = self.player;
        let mut events = Vec::new();
        trace!(action = self.name(), %player, "running action");

        match &mut self.kind {
            ActionKind::ChangeMana { amount, applied } => {
                let state = host.state_mut();
                let before = state.players[player].mana;
                let after = before.saturating_add(*amount).max(0);
                state.players[player].mana = after;
                *applied = Some(after - before);
                events.push(Event::ManaChanged {
                    player,
                    amount: after - before,
                    mana: after,
                });
            }

            ActionKind::ChangeLife {
                amount,
                applied,
                granted,
            } => {
                let state = host.state_mut();
                let (delta, won) = change_life(state, player, *amount, &mut events);
                *applied = Some(delta);
                *granted = won;
                events.insert(
                    0,
                    Event::LifeChanged {
                        player,
                        amount: delta,
                        life: state.players[player].life,
                    },
                );
            }

            ActionKind::DealDamage {
                amount,
                applied,
                granted,
            } => {
                let state = host.state_mut();
                let (delta, won) = change_life(state, player, amount.saturating_neg(), &mut events);
                *applied = Some(delta);
                *granted = won;
                events.insert(
                    0,
                    Event::DamageDealt {
                        player,
                        amount: *amount,
                    },
                );
            }

            ActionKind::Draw {
                amount,
                drawn,
                granted,
            } => {
                let state = host.state_mut();
                if *amount > state.zones(player).deck.len() {
                    events.push(grant(state, player.next(), VictoryCondition::DrawFromEmptyDeck));
                    *granted = true;
                } else {
                    let hand = ZoneRef::new(player, ZoneKind::Hand);
                    for card in state.deck_top(player, *amount) {
                        drawn.push(relocate(
                            state,
                            card,
                            hand,
                            Destination::Pile(ZonePosition::Top),
                        )?);
                    }
                    events.push(Event::CardsDrawn {
                        player,
                        cards: drawn.iter().map(|m| m.to).collect(),
                    });
                }
            }

            ActionKind::Place {
                card,
                zone,
                slot,
                moved,
            } => {
                let chosen = match *slot {
                    Some(slot) => Some(slot),
                    None => choose_slot(host, player, *zone)?,
                };
                if let Some(chosen) = chosen {
                    let state = host.state_mut();
                    let snapshot = Arc::new(state.snapshot(card.id)?);
                    let from = state.place(card.id, *zone, chosen)?;
                    *slot = Some(chosen);
                    *moved = Some(Moved {
                        snapshot,
                        from,
                        to: *card,
                    });
                    events.push(Event::CardPlaced {
                        player,
                        card: *card,
                        zone: *zone,
                        slot: chosen,
                    });
                }
            }

            ActionKind::Summon { card, moved } => {
                let record = promote(host.state_mut(), *card)?;
                events.push(Event::Summoned {
                    player,
                    card: record.to,
                });
                *moved = Some(record);
            }
            ActionKind::Deploy { card, moved } => {
                let record = promote(host.state_mut(), *card)?;
                events.push(Event::Deployed {
                    player,
                    card: record.to,
                });
                *moved = Some(record);
            }
            ActionKind::Cast { card, moved } => {
                let record = promote(host.state_mut(), *card)?;
                events.push(Event::Cast {
                    player,
                    card: record.to,
                });
                *moved = Some(record);
            }

            ActionKind::Move {
                card,
                zone,
                destination,
                moved,
            } => {
                let target = match *destination {
                    Some(destination) => Some(destination),
                    None if zone.kind.is_field() => {
                        choose_slot(host, player, *zone)?.map(Destination::Slot)
                    }
                    None => Some(Destination::Pile(ZonePosition::Top)),
                };
                if let Some(target) = target {
                    let record = relocate(host.state_mut(), card.id, *zone, target)?;
                    events.push(Event::CardMoved {
                        card: *card,
                        to: record.to,
                        zone: *zone,
                    });
                    *destination = Some(target);
                    *moved = Some(record);
                }
            }

            ActionKind::Discard {
                card,
                retire,
                moved,
            } => {
                let state = host.state_mut();
                let owner = state.card(card.id)?.owner;
                let record = relocate(
                    state,
                    card.id,
                    ZoneRef::new(owner, ZoneKind::Discard),
                    Destination::Pile(ZonePosition::Top),
                )?;
                events.push(Event::Discarded {
                    card: *card,
                    retired: *retire,
                });
                *moved = Some(record);
            }

            ActionKind::Destroy { card, .. } => {
                events.push(Event::Destroyed { card: *card });
            }

            ActionKind::Exile { card, moved } => {
                let state = host.state_mut();
                let owner = state.card(card.id)?.owner;
                let record = relocate(
                    state,
                    card.id,
                    ZoneRef::new(owner, ZoneKind::Exile),
                    Destination::Pile(ZonePosition::Top),
                )?;
                events.push(Event::Exiled { card: *card });
                *moved = Some(record);
            }

            ActionKind::EstablishAttackDeclaration {
                attackers,
                target,
                previous,
                records,
            } => {
                let state = host.state();
                let opponent = player.next();
                let units = state.cards_in(ZoneRef::new(opponent, ZoneKind::Unit));
                // the partner can only be attacked once no other unit defends it
                let defenders = if units.is_empty() {
                    state.cards_in(ZoneRef::new(opponent, ZoneKind::Partner))
                } else {
                    units
                };
                let eligible: Vec<CardRef> = defenders
                    .into_iter()
                    .filter_map(|id| state.card(id).ok().map(|c| c.current_ref()))
                    .collect();

                *target = match eligible.as_slice() {
                    [] => None,
                    options => {
                        let request = Request::new(
                            player,
                            RequestKind::ChooseCards {
                                cards: options.to_vec(),
                                valid_amounts: vec![1],
                                reason: ChoiceReason::AttackTarget,
                            },
                        );
                        let indices = host.request(request)?.into_indices()?;
                        indices.first().and_then(|&i| options.get(i).copied())
                    }
                };

                let state = host.state_mut();
                *previous = Some(state.attack.take());
                records.clear();
                for attacker in attackers.iter() {
                    let card = state.card_mut(attacker.id)?;
                    records.push(AttackerRecord {
                        card: attacker.id,
                        attacks_made: card.attacks_made,
                        can_attack_again: card.can_attack_again,
                    });
                    let rights = card.values.current.attack_rights.unwrap_or(1).max(0) as u32;
                    if card.attacks_made >= rights {
                        card.can_attack_again = false;
                    }
                    card.attacks_made += 1;
                }
                state.attack = Some(AttackDeclaration {
                    player,
                    attackers: attackers.iter().map(|a| a.id).collect(),
                    target: target.map(|t| t.id),
                    fought: false,
                    cancelled: false,
                });
                events.push(Event::AttackDeclared {
                    player,
                    attackers: attackers.clone(),
                    target: *target,
                });
            }

            ActionKind::ApplyStatChange {
                target,
                modifications,
                until,
                source,
                applied,
            } => {
                let kept = applicable(modifications, *target, source, host.state())?;
                let state = host.state_mut();
                let id = state.allocate_modifier_id();
                modifiers_mut(state, *target)?.push(Modifier {
                    id,
                    source: *source,
                    modifications: Arc::new(kept),
                    is_static: false,
                });
                if let Some(turn) = expiry_turn(*until, source, state) {
                    state.expirations.push(Expiration {
                        turn,
                        target: *target,
                        modifier: id,
                    });
                }
                *applied = Some(id);
                events.push(Event::StatChanged {
                    target: *target,
                    modifier: id,
                });
            }

            ActionKind::RemoveStatChange {
                target,
                modifier,
                removed,
            } => {
                let state = host.state_mut();
                let stack = modifiers_mut(state, *target)?;
                if let Some(index) = stack.iter().position(|m| m.id == *modifier) {
                    *removed = Some((index, stack.remove(index)));
                    events.push(Event::StatChangeRemoved {
                        target: *target,
                        modifier: *modifier,
                    });
                }
                state.expirations.retain(|e| e.modifier != *modifier);
            }

            ActionKind::CancelAttack { previous } => {
                if let Some(attack) = &mut host.state_mut().attack {
                    *previous = Some(attack.cancelled);
                    attack.cancelled = true;
                    events.push(Event::AttackCancelled {
                        player: attack.player,
                    });
                }
            }

            ActionKind::SetAttackTarget { target, previous } => {
                if let Some(attack) = &mut host.state_mut().attack {
                    *previous = Some(attack.target);
                    attack.target = Some(target.id);
                    events.push(Event::AttackTargetChanged { target: *target });
                }
            }

            ActionKind::GiveAttack { card, previous } => {
                let live = host.state_mut().card_mut(card.id)?;
                *previous = Some(live.can_attack_again);
                live.can_attack_again = true;
                events.push(Event::AttackGiven { card: *card });
            }

            ActionKind::EquipCard { equipment, unit } => {
                let options = equip_candidates(*equipment, player, host.state())?;
                let chosen = match options.as_slice() {
                    [] => None,
                    [only] => Some(*only),
                    _ => {
                        let request = Request::new(
                            player,
                            RequestKind::ChooseCards {
                                cards: options.clone(),
                                valid_amounts: vec![1],
                                reason: ChoiceReason::EquipTarget,
                            },
                        );
                        let indices = host.request(request)?.into_indices()?;
                        indices.first().and_then(|&i| options.get(i).copied())
                    }
                };
                if let Some(chosen) = chosen {
                    let state = host.state_mut();
                    state.card_mut(equipment.id)?.equipped_to = Some(chosen.id);
                    state.card_mut(chosen.id)?.equipments.push(equipment.id);
                    *unit = Some(chosen);
                    events.push(Event::CardEquipped {
                        equipment: *equipment,
                        unit: chosen,
                    });
                }
            }

            ActionKind::Shuffle { previous } => {
                let order = host.state().zones(player).deck.cards().to_vec();
                let len = order.len();
                *previous = Some(order);
                if len > 1 {
                    // Fisher-Yates driven by outside randomness, one range per
                    // position from the top down
                    let ranges: Vec<u32> = (1..len as u32).rev().collect();
                    let values = host.random(&ranges)?;
                    let deck = &mut host.state_mut().players[player].zones.deck;
                    for (i, value) in (1..len).rev().zip(values) {
                        deck.swap(i, value as usize);
                    }
                }
                events.push(Event::DeckShuffled { player });
            }

            ActionKind::View { card, snapshot } => {
                let state = host.state();
                let mut seen = state.snapshot(card.id)?;
                seen.card.hidden_from.retain(|p| *p != player);
                *snapshot = Some(Arc::new(seen));
                events.push(Event::CardViewed {
                    player,
                    card: *card,
                });
            }

            ActionKind::Reveal { card, previous } => {
                let live = host.state_mut().card_mut(card.id)?;
                *previous = Some(std::mem::take(&mut live.hidden_from));
                events.push(Event::CardRevealed { card: *card });
            }

            ActionKind::ChangeCounters {
                card,
                counter,
                amount,
                previous,
            } => {
                let live = host.state_mut().card_mut(card.id)?;
                let before = live.counter(counter);
                let total = (before + *amount).max(0);
                live.counters.insert(counter.clone(), total);
                *previous = Some(before);
                events.push(Event::CountersChanged {
                    card: *card,
                    counter: counter.clone(),
                    amount: total - before,
                    total,
                });
            }

            ActionKind::Swap {
                first,
                second,
                transfer_equipments,
                snapshots,
            } => {
                let state = host.state_mut();
                let a = Arc::new(state.snapshot(first.id)?);
                let b = Arc::new(state.snapshot(second.id)?);
                state.swap_positions(first.id, second.id)?;
                if *transfer_equipments {
                    for id in [first.id, second.id] {
                        let equipments = std::mem::take(&mut state.card_mut(id)?.equipments);
                        for equipment in equipments {
                            state.card_mut(equipment)?.equipped_to = None;
                        }
                    }
                    // each card takes over what equipped the card it replaced
                    for (from, holder) in [(&a, second.id), (&b, first.id)] {
                        if !state.card(holder)?.is_on_field() {
                            continue;
                        }
                        for &equipment in &from.card.equipments {
                            state.card_mut(equipment)?.equipped_to = Some(holder);
                            state.card_mut(holder)?.equipments.push(equipment);
                        }
                    }
                } else {
                    for id in [first.id, second.id] {
                        if !state.card(id)?.is_on_field() {
                            state.unequip(id)?;
                        }
                    }
                }
                events.push(Event::CardsSwapped {
                    first: state.card(first.id)?.current_ref(),
                    second: state.card(second.id)?.current_ref(),
                });
                *snapshots = Some((a, b));
            }

            ActionKind::CreateToken {
                definition,
                created,
            } => {
                let state = host.state_mut();
                let id = state.add_detached_card(definition.clone(), player);
                let card = state.card_mut(id)?;
                card.is_token = true;
                let token = card.current_ref();
                *created = Some(token);
                events.push(Event::TokenCreated {
                    player,
                    card: token,
                });
            }

            ActionKind::GrantVictory { condition, granted } => {
                events.push(grant(host.state_mut(), player, *condition));
                *granted = true;
            }
        }
        Ok(events)
    }

    /// Reverse a completed `run`.
    pub(crate) fn undo(&mut self, state: &mut GameState) -> Result<(), EngineError> {
        let player = self.player;
        trace!(action = self.name(), %player, "undoing action");

        match &mut self.kind {
            ActionKind::ChangeMana { applied, .. } => {
                if let Some(delta) = applied.take() {
                    state.players[player].mana -= delta;
                }
            }
            ActionKind::ChangeLife {
                applied, granted, ..
            }
            | ActionKind::DealDamage {
                applied, granted, ..
            } => {
                if let Some(delta) = applied.take() {
                    state.players[player].life -= delta;
                }
                if std::mem::take(granted) {
                    revoke(state, player.next(), VictoryCondition::LifeZero);
                }
            }
            ActionKind::Draw { drawn, granted, .. } => {
                for moved in drawn.drain(..).rev() {
                    moved.undo(state)?;
                }
                if std::mem::take(granted) {
                    revoke(state, player.next(), VictoryCondition::DrawFromEmptyDeck);
                }
            }
            ActionKind::Place { moved, .. }
            | ActionKind::Summon { moved, .. }
            | ActionKind::Deploy { moved, .. }
            | ActionKind::Cast { moved, .. }
            | ActionKind::Move { moved, .. }
            | ActionKind::Discard { moved, .. }
            | ActionKind::Exile { moved, .. } => {
                if let Some(moved) = moved.take() {
                    moved.undo(state)?;
                }
            }
            ActionKind::Destroy { snapshot, .. } | ActionKind::View { snapshot, .. } => {
                *snapshot = None;
            }
            ActionKind::EstablishAttackDeclaration {
                previous, records, ..
            } => {
                if let Some(previous) = previous.take() {
                    state.attack = previous;
                }
                for record in records.drain(..) {
                    let card = state.card_mut(record.card)?;
                    card.attacks_made = record.attacks_made;
                    card.can_attack_again = record.can_attack_again;
                }
            }
            ActionKind::ApplyStatChange {
                target, applied, ..
            } => {
                if let Some(id) = applied.take() {
                    modifiers_mut(state, *target)?.retain(|m| m.id != id);
                    state.expirations.retain(|e| e.modifier != id);
                }
            }
            ActionKind::RemoveStatChange {
                target, removed, ..
            } => {
                if let Some((index, modifier)) = removed.take() {
                    let stack = modifiers_mut(state, *target)?;
                    let index = index.min(stack.len());
                    stack.insert(index, modifier);
                }
            }
            ActionKind::CancelAttack { previous } => {
                if let (Some(was), Some(attack)) = (previous.take(), &mut state.attack) {
                    attack.cancelled = was;
                }
            }
            ActionKind::SetAttackTarget { previous, .. } => {
                if let (Some(was), Some(attack)) = (previous.take(), &mut state.attack) {
                    attack.target = was;
                }
            }
            ActionKind::GiveAttack { card, previous } => {
                if let Some(was) = previous.take() {
                    state.card_mut(card.id)?.can_attack_again = was;
                }
            }
            ActionKind::EquipCard { equipment, unit } => {
                if let Some(unit) = unit.take() {
                    state.card_mut(equipment.id)?.equipped_to = None;
                    state
                        .card_mut(unit.id)?
                        .equipments
                        .retain(|&e| e != equipment.id);
                }
            }
            ActionKind::Shuffle { previous } => {
                if let Some(order) = previous.take() {
                    state.players[player].zones.deck.restore_order(order);
                }
            }
            ActionKind::Reveal { card, previous } => {
                if let Some(hidden) = previous.take() {
                    state.card_mut(card.id)?.hidden_from = hidden;
                }
            }
            ActionKind::ChangeCounters {
                card,
                counter,
                previous,
                ..
            } => {
                if let Some(before) = previous.take() {
                    state.card_mut(card.id)?.counters.insert(counter.clone(), before);
                }
            }
            ActionKind::Swap {
                first,
                second,
                snapshots,
                ..
            } => {
                if let Some((a, b)) = snapshots.take() {
                    state.swap_positions(first.id, second.id)?;
                    for snapshot in [a, b] {
                        let location = state.location(snapshot.card.entity);
                        state.restore(&snapshot, location)?;
                    }
                }
            }
            ActionKind::CreateToken { created, .. } => {
                if let Some(token) = created.take() {
                    let card = state.card_mut(token.id)?;
                    card.removed = true;
                    card.zone = None;
                }
            }
            ActionKind::GrantVictory { condition, granted } => {
                if std::mem::take(granted) {
                    revoke(state, player, *condition);
                }
            }
        }
        Ok(())
    }
}

/// Whether a stat change could alter its target at all.
pub(super) fn stat_change_applies(
    target: StatTarget,
    modifications: &Arc<Vec<Modification>>,
    source: &ModifierSource,
    state: &GameState,
) -> Result<bool, EngineError> {
    let trial = Modifier {
        id: ModifierId(0),
        source: *source,
        modifications: modifications.clone(),
        is_static: false,
    };
    match target {
        StatTarget::Card(id) => trial.can_apply_to(&state.card(id)?.values.current, target, state),
        StatTarget::Player(player) => {
            trial.can_apply_to(&state.players[player].values.current, target, state)
        }
    }
}

/// Whether every modification of a stat change applies completely.
pub(super) fn stat_change_fully_applies(
    target: StatTarget,
    modifications: &Arc<Vec<Modification>>,
    source: &ModifierSource,
    state: &GameState,
) -> Result<bool, EngineError> {
    let trial = Modifier {
        id: ModifierId(0),
        source: *source,
        modifications: modifications.clone(),
        is_static: false,
    };
    match target {
        StatTarget::Card(id) => {
            trial.can_fully_apply_to(&state.card(id)?.values.current, target, state)
        }
        StatTarget::Player(player) => {
            trial.can_fully_apply_to(&state.players[player].values.current, target, state)
        }
    }
}
