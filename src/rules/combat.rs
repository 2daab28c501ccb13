//! Fights and retiring.
//!
//! A fight compares the attackers' total attack with the target's defense.
//! A target that survives strikes back at the single attacker, or at the
//! partner of a combined attack, by the same rule. Partners cannot be
//! discarded, so their discard drops out of the timing and only the life
//! damage remains.

use crate::actions::{Action, ActionKind};
use crate::cards::Card;
use crate::core::{CardRef, EngineError, GameState};
use crate::io::event::Event;
use crate::zones::ZoneKind;

/// One side striking the other, and the timing it causes.
#[derive(Clone, Debug)]
pub struct Fight {
    pub attackers: Vec<CardRef>,
    pub defender: CardRef,
    pub counterattack: bool,
    /// Empty if the defender holds. A partner that loses only takes damage.
    pub actions: Vec<Action>,
}

impl Fight {
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.attackers
            .iter()
            .map(|&attacker| Event::Fight {
                attacker,
                target: self.defender,
                counterattack: self.counterattack,
            })
            .collect()
    }
}

fn strike(attack: i64, life_damage: bool, defender: &Card) -> Vec<Action> {
    let defense = defender.values.current.defense();
    if attack <= defense {
        return Vec::new();
    }
    let target = defender.current_ref();
    let mut actions = vec![
        Action::discard(defender.owner, target),
        Action::destroy(defender.owner, target),
    ];
    if defender.zone_kind() == Some(ZoneKind::Partner) {
        let damage = if life_damage { attack.saturating_sub(defense) } else { 0 };
        actions.push(Action::deal_damage(defender.owner, damage));
    }
    actions
}

/// The attackers' strike at the declared target.
pub fn fight(state: &GameState) -> Result<Option<Fight>, EngineError> {
    let Some(attack) = &state.attack else {
        return Ok(None);
    };
    let Some(target) = attack.target else {
        return Ok(None);
    };
    if attack.cancelled || attack.attackers.is_empty() {
        return Ok(None);
    }
    let mut total = 0;
    let mut life_damage = true;
    let mut attackers = Vec::with_capacity(attack.attackers.len());
    for &id in &attack.attackers {
        let card = state.card(id)?;
        total = card.values.current.attack().saturating_add(total);
        life_damage &= card.values.current.do_life_damage;
        attackers.push(card.current_ref());
    }
    let defender = state.card(target)?;
    Ok(Some(Fight {
        attackers,
        defender: defender.current_ref(),
        counterattack: false,
        actions: strike(total, life_damage, defender),
    }))
}

/// The surviving target's strike back.
pub fn counterattack(state: &GameState) -> Result<Option<Fight>, EngineError> {
    let Some(attack) = &state.attack else {
        return Ok(None);
    };
    let Some(target) = attack.target else {
        return Ok(None);
    };
    let striker = state.card(target)?;
    if attack.cancelled || striker.values.current.can_counterattack == Some(false) {
        return Ok(None);
    }
    let victim = match attack.attackers.as_slice() {
        [] => return Ok(None),
        [single] => Some(*single),
        many => many.iter().copied().find(|&id| {
            state
                .card(id)
                .is_ok_and(|c| c.zone_kind() == Some(ZoneKind::Partner))
        }),
    };
    let Some(victim) = victim else {
        return Ok(None);
    };
    let victim = state.card(victim)?;
    let values = &striker.values.current;
    Ok(Some(Fight {
        attackers: vec![striker.current_ref()],
        defender: victim.current_ref(),
        counterattack: true,
        actions: strike(values.attack(), values.do_life_damage, victim),
    }))
}

/// Mana gained from a retire timing: the levels of the discarded units.
#[must_use]
pub fn retire_mana(executed: &[Action]) -> i64 {
    executed
        .iter()
        .filter_map(|action| match &action.kind {
            ActionKind::Discard {
                retire: true,
                moved: Some(moved),
                ..
            } => Some(moved.snapshot.card.values.current.level.max(0)),
            _ => None,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cards::{CardDefinition, CardId, CardRegistry, CardType};
    use crate::core::{AttackDeclaration, Destination, EntityId, PlayerId, RulesConfig};
    use crate::zones::ZoneRef;

    fn state() -> GameState {
        GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()))
    }

    fn unit(state: &mut GameState, player: u8, kind: ZoneKind, stats: (i64, i64)) -> EntityId {
        let player = PlayerId::new(player);
        let def = CardDefinition::new(CardId::new(5), CardType::Unit).with_stats(stats.0, stats.1);
        let zone = ZoneRef::new(player, kind);
        let slot = state.zones(player).field(kind).map_or(0, |f| f.free_slots()[0]);
        state
            .add_card(Arc::new(def), player, zone, Destination::Slot(slot))
            .unwrap()
    }

    fn declare(state: &mut GameState, attackers: Vec<EntityId>, target: EntityId) {
        state.attack = Some(AttackDeclaration {
            player: PlayerId::new(0),
            attackers,
            target: Some(target),
            fought: false,
            cancelled: false,
        });
    }

    #[test]
    fn test_stronger_attacker_destroys() {
        let mut state = state();
        let attacker = unit(&mut state, 0, ZoneKind::Unit, (300, 100));
        let target = unit(&mut state, 1, ZoneKind::Unit, (100, 200));
        declare(&mut state, vec![attacker], target);

        let fight = fight(&state).unwrap().unwrap();
        let names: Vec<_> = fight.actions.iter().map(Action::name).collect();
        assert_eq!(names, vec!["discard", "destroy"]);
        assert_eq!(fight.events().len(), 1);
    }

    #[test]
    fn test_partner_takes_life_damage() {
        let mut state = state();
        let a = unit(&mut state, 0, ZoneKind::Unit, (300, 100));
        let b = unit(&mut state, 0, ZoneKind::Unit, (200, 100));
        let partner = unit(&mut state, 1, ZoneKind::Partner, (0, 400));
        declare(&mut state, vec![a, b], partner);

        let fight = fight(&state).unwrap().unwrap();
        match &fight.actions[2].kind {
            ActionKind::DealDamage { amount, .. } => assert_eq!(*amount, 100),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_counterattack_hits_single_attacker() {
        let mut state = state();
        let attacker = unit(&mut state, 0, ZoneKind::Unit, (100, 100));
        let target = unit(&mut state, 1, ZoneKind::Unit, (300, 300));
        declare(&mut state, vec![attacker], target);

        assert!(fight(&state).unwrap().unwrap().actions.is_empty());
        let back = counterattack(&state).unwrap().unwrap();
        assert!(back.counterattack);
        assert_eq!(back.defender.id, attacker);
        assert_eq!(back.actions.len(), 2);
    }

    #[test]
    fn test_combined_counterattack_hits_partner() {
        let mut state = state();
        let unit_a = unit(&mut state, 0, ZoneKind::Unit, (100, 100));
        let partner = unit(&mut state, 0, ZoneKind::Partner, (100, 100));
        let target = unit(&mut state, 1, ZoneKind::Unit, (0, 500));
        declare(&mut state, vec![unit_a, partner], target);

        let back = counterattack(&state).unwrap().unwrap();
        assert_eq!(back.defender.id, partner);
        // 0 attack does not beat 100 defense
        assert!(back.actions.is_empty());
    }

    #[test]
    fn test_no_fight_without_target() {
        let mut state = state();
        let attacker = unit(&mut state, 0, ZoneKind::Unit, (100, 100));
        let target = unit(&mut state, 1, ZoneKind::Unit, (0, 0));
        declare(&mut state, vec![attacker], target);
        if let Some(attack) = &mut state.attack {
            attack.target = None;
        }
        assert!(fight(&state).unwrap().is_none());
        assert!(counterattack(&state).unwrap().is_none());
    }
}
