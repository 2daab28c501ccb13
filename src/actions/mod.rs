//! Actions: the indivisible effects of the game.
//!
//! Every change to the game state goes through an `Action`. Actions are
//! collected into timings, pruned when they became impossible, run, and
//! undone again if a cost turns out not to be payable. After running, an
//! action keeps what it needs to undo itself and serves as a permanent record
//! of what happened, with snapshots of every card it moved.
//!
//! ## Key Types
//!
//! - `Action`: the acting player plus an `ActionKind`
//! - `ActionKind`: one variant per effect
//! - `Moved`: the undo record of a zone change
//!
//! ```
//! use cu_rules::actions::Action;
//! use cu_rules::core::PlayerId;
//!
//! let draw = Action::draw(PlayerId::new(0), 2);
//! assert_eq!(draw.name(), "draw");
//! assert!(!draw.has_run());
//! ```

mod feasibility;
mod run;

pub use run::equip_candidates;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cards::{CardDefinition, CardSnapshot};
use crate::core::{
    AttackDeclaration, CardRef, Destination, EntityId, Flow, GameState, Location, PlayerId,
    VictoryCondition,
};
use crate::io::request::{Request, Response};
use crate::script::ast::{AccessorKind, Until};
use crate::script::ScriptCard;
use crate::values::{Modification, Modifier, ModifierId, ModifierSource, StatTarget};
use crate::zones::ZoneRef;

/// What running actions needs from the game.
pub(crate) trait ActionHost {
    fn state(&self) -> &GameState;

    fn state_mut(&mut self) -> &mut GameState;

    /// Ask a player and wait for a validated response.
    fn request(&mut self, request: Request) -> Flow<Response>;

    /// One integer per range, each in `[0, range)`.
    fn random(&mut self, ranges: &[u32]) -> Flow<Vec<u32>>;
}

/// Undo record of one zone change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Moved {
    /// The card as it was before the move.
    pub snapshot: Arc<CardSnapshot>,
    pub from: Option<Location>,
    /// The card after the move.
    pub to: CardRef,
}

impl Moved {
    pub(crate) fn undo(&self, state: &mut GameState) -> Result<(), crate::core::EngineError> {
        state.restore(&self.snapshot, self.from)
    }

    /// The moved card as scripts see it: where it went, valued as it was.
    #[must_use]
    pub fn script_card(&self) -> ScriptCard {
        ScriptCard {
            card: self.to,
            snapshot: Some(self.snapshot.clone()),
        }
    }
}

/// Attack bookkeeping of one attacker before a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackerRecord {
    pub card: EntityId,
    pub attacks_made: u32,
    pub can_attack_again: bool,
}

/// One kind of effect. Fields named after a past participle (`applied`,
/// `moved`, `previous`) are filled in when the action runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ActionKind {
    ChangeMana {
        amount: i64,
        applied: Option<i64>,
    },
    ChangeLife {
        amount: i64,
        applied: Option<i64>,
        granted: bool,
    },
    DealDamage {
        amount: i64,
        applied: Option<i64>,
        granted: bool,
    },
    Draw {
        amount: usize,
        drawn: Vec<Moved>,
        granted: bool,
    },
    /// Reserve a field slot without entering the field yet.
    Place {
        card: CardRef,
        zone: ZoneRef,
        slot: Option<usize>,
        moved: Option<Moved>,
    },
    Summon {
        card: CardRef,
        moved: Option<Moved>,
    },
    Deploy {
        card: CardRef,
        moved: Option<Moved>,
    },
    Cast {
        card: CardRef,
        moved: Option<Moved>,
    },
    Move {
        card: CardRef,
        zone: ZoneRef,
        destination: Option<Destination>,
        moved: Option<Moved>,
    },
    Discard {
        card: CardRef,
        retire: bool,
        moved: Option<Moved>,
    },
    /// Travels with a `Discard` of the same card and changes nothing itself.
    Destroy {
        card: CardRef,
        snapshot: Option<Arc<CardSnapshot>>,
    },
    Exile {
        card: CardRef,
        moved: Option<Moved>,
    },
    EstablishAttackDeclaration {
        attackers: Vec<CardRef>,
        target: Option<CardRef>,
        previous: Option<Option<AttackDeclaration>>,
        records: Vec<AttackerRecord>,
    },
    ApplyStatChange {
        target: StatTarget,
        modifications: Arc<Vec<Modification>>,
        until: Until,
        source: ModifierSource,
        applied: Option<ModifierId>,
    },
    RemoveStatChange {
        target: StatTarget,
        modifier: ModifierId,
        removed: Option<(usize, Modifier)>,
    },
    CancelAttack {
        previous: Option<bool>,
    },
    SetAttackTarget {
        target: CardRef,
        previous: Option<Option<EntityId>>,
    },
    GiveAttack {
        card: CardRef,
        previous: Option<bool>,
    },
    /// Attach an equipable item to a unit its `equipableTo` allows.
    EquipCard {
        equipment: CardRef,
        unit: Option<CardRef>,
    },
    Shuffle {
        previous: Option<Vec<EntityId>>,
    },
    View {
        card: CardRef,
        snapshot: Option<Arc<CardSnapshot>>,
    },
    Reveal {
        card: CardRef,
        previous: Option<SmallVec<[PlayerId; 2]>>,
    },
    ChangeCounters {
        card: CardRef,
        counter: String,
        amount: i64,
        previous: Option<i64>,
    },
    Swap {
        first: CardRef,
        second: CardRef,
        transfer_equipments: bool,
        snapshots: Option<(Arc<CardSnapshot>, Arc<CardSnapshot>)>,
    },
    CreateToken {
        definition: Arc<CardDefinition>,
        created: Option<CardRef>,
    },
    /// The acting player gains a victory condition.
    GrantVictory {
        condition: VictoryCondition,
        granted: bool,
    },
}

/// One effect, performed on behalf of `player`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub player: PlayerId,
    pub kind: ActionKind,
}

impl Action {
    #[must_use]
    pub fn new(player: PlayerId, kind: ActionKind) -> Self {
        Self { player, kind }
    }

    #[must_use]
    pub fn change_mana(player: PlayerId, amount: i64) -> Self {
        Self::new(
            player,
            ActionKind::ChangeMana {
                amount,
                applied: None,
            },
        )
    }

    #[must_use]
    pub fn change_life(player: PlayerId, amount: i64) -> Self {
        Self::new(
            player,
            ActionKind::ChangeLife {
                amount,
                applied: None,
                granted: false,
            },
        )
    }

    /// Damage dealt to `player`.
    #[must_use]
    pub fn deal_damage(player: PlayerId, amount: i64) -> Self {
        Self::new(
            player,
            ActionKind::DealDamage {
                amount,
                applied: None,
                granted: false,
            },
        )
    }

    #[must_use]
    pub fn draw(player: PlayerId, amount: usize) -> Self {
        Self::new(
            player,
            ActionKind::Draw {
                amount,
                drawn: Vec::new(),
                granted: false,
            },
        )
    }

    /// Place into a free slot, asking the player if there is a choice.
    #[must_use]
    pub fn place(player: PlayerId, card: CardRef, zone: ZoneRef) -> Self {
        Self::new(
            player,
            ActionKind::Place {
                card,
                zone,
                slot: None,
                moved: None,
            },
        )
    }

    #[must_use]
    pub fn summon(player: PlayerId, card: CardRef) -> Self {
        Self::new(player, ActionKind::Summon { card, moved: None })
    }

    #[must_use]
    pub fn deploy(player: PlayerId, card: CardRef) -> Self {
        Self::new(player, ActionKind::Deploy { card, moved: None })
    }

    #[must_use]
    pub fn cast(player: PlayerId, card: CardRef) -> Self {
        Self::new(player, ActionKind::Cast { card, moved: None })
    }

    #[must_use]
    pub fn move_card(
        player: PlayerId,
        card: CardRef,
        zone: ZoneRef,
        destination: Option<Destination>,
    ) -> Self {
        Self::new(
            player,
            ActionKind::Move {
                card,
                zone,
                destination,
                moved: None,
            },
        )
    }

    #[must_use]
    pub fn discard(player: PlayerId, card: CardRef) -> Self {
        Self::new(
            player,
            ActionKind::Discard {
                card,
                retire: false,
                moved: None,
            },
        )
    }

    #[must_use]
    pub fn retire(player: PlayerId, card: CardRef) -> Self {
        Self::new(
            player,
            ActionKind::Discard {
                card,
                retire: true,
                moved: None,
            },
        )
    }

    #[must_use]
    pub fn destroy(player: PlayerId, card: CardRef) -> Self {
        Self::new(
            player,
            ActionKind::Destroy {
                card,
                snapshot: None,
            },
        )
    }

    #[must_use]
    pub fn exile(player: PlayerId, card: CardRef) -> Self {
        Self::new(player, ActionKind::Exile { card, moved: None })
    }

    #[must_use]
    pub fn establish_attack(player: PlayerId, attackers: Vec<CardRef>) -> Self {
        Self::new(
            player,
            ActionKind::EstablishAttackDeclaration {
                attackers,
                target: None,
                previous: None,
                records: Vec::new(),
            },
        )
    }

    #[must_use]
    pub fn apply_stat_change(
        player: PlayerId,
        target: StatTarget,
        modifications: Vec<Modification>,
        until: Until,
        source: ModifierSource,
    ) -> Self {
        Self::new(
            player,
            ActionKind::ApplyStatChange {
                target,
                modifications: Arc::new(modifications),
                until,
                source,
                applied: None,
            },
        )
    }

    #[must_use]
    pub fn remove_stat_change(player: PlayerId, target: StatTarget, modifier: ModifierId) -> Self {
        Self::new(
            player,
            ActionKind::RemoveStatChange {
                target,
                modifier,
                removed: None,
            },
        )
    }

    #[must_use]
    pub fn cancel_attack(player: PlayerId) -> Self {
        Self::new(player, ActionKind::CancelAttack { previous: None })
    }

    #[must_use]
    pub fn set_attack_target(player: PlayerId, target: CardRef) -> Self {
        Self::new(
            player,
            ActionKind::SetAttackTarget {
                target,
                previous: None,
            },
        )
    }

    #[must_use]
    pub fn give_attack(player: PlayerId, card: CardRef) -> Self {
        Self::new(
            player,
            ActionKind::GiveAttack {
                card,
                previous: None,
            },
        )
    }

    #[must_use]
    pub fn equip(player: PlayerId, equipment: CardRef) -> Self {
        Self::new(
            player,
            ActionKind::EquipCard {
                equipment,
                unit: None,
            },
        )
    }

    #[must_use]
    pub fn shuffle(player: PlayerId) -> Self {
        Self::new(player, ActionKind::Shuffle { previous: None })
    }

    /// Show `card` to `player` only.
    #[must_use]
    pub fn view(player: PlayerId, card: CardRef) -> Self {
        Self::new(
            player,
            ActionKind::View {
                card,
                snapshot: None,
            },
        )
    }

    #[must_use]
    pub fn reveal(player: PlayerId, card: CardRef) -> Self {
        Self::new(
            player,
            ActionKind::Reveal {
                card,
                previous: None,
            },
        )
    }

    #[must_use]
    pub fn change_counters(player: PlayerId, card: CardRef, counter: String, amount: i64) -> Self {
        Self::new(
            player,
            ActionKind::ChangeCounters {
                card,
                counter,
                amount,
                previous: None,
            },
        )
    }

    #[must_use]
    pub fn swap(player: PlayerId, first: CardRef, second: CardRef, transfer_equipments: bool) -> Self {
        Self::new(
            player,
            ActionKind::Swap {
                first,
                second,
                transfer_equipments,
                snapshots: None,
            },
        )
    }

    #[must_use]
    pub fn create_token(player: PlayerId, definition: Arc<CardDefinition>) -> Self {
        Self::new(
            player,
            ActionKind::CreateToken {
                definition,
                created: None,
            },
        )
    }

    #[must_use]
    pub fn grant_victory(player: PlayerId, condition: VictoryCondition) -> Self {
        Self::new(
            player,
            ActionKind::GrantVictory {
                condition,
                granted: false,
            },
        )
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match &self.kind {
            ActionKind::ChangeMana { .. } => "changeMana",
            ActionKind::ChangeLife { .. } => "changeLife",
            ActionKind::DealDamage { .. } => "dealDamage",
            ActionKind::Draw { .. } => "draw",
            ActionKind::Place { .. } => "place",
            ActionKind::Summon { .. } => "summon",
            ActionKind::Deploy { .. } => "deploy",
            ActionKind::Cast { .. } => "cast",
            ActionKind::Move { .. } => "move",
            ActionKind::Discard { .. } => "discard",
            ActionKind::Destroy { .. } => "destroy",
            ActionKind::Exile { .. } => "exile",
            ActionKind::EstablishAttackDeclaration { .. } => "establishAttackDeclaration",
            ActionKind::ApplyStatChange { .. } => "applyStatChange",
            ActionKind::RemoveStatChange { .. } => "removeStatChange",
            ActionKind::CancelAttack { .. } => "cancelAttack",
            ActionKind::SetAttackTarget { .. } => "setAttackTarget",
            ActionKind::GiveAttack { .. } => "giveAttack",
            ActionKind::EquipCard { .. } => "equipCard",
            ActionKind::Shuffle { .. } => "shuffle",
            ActionKind::View { .. } => "view",
            ActionKind::Reveal { .. } => "reveal",
            ActionKind::ChangeCounters { .. } => "changeCounters",
            ActionKind::Swap { .. } => "swap",
            ActionKind::CreateToken { .. } => "createToken",
            ActionKind::GrantVictory { .. } => "grantVictory",
        }
    }

    /// The card this action is about, if it is about exactly one.
    #[must_use]
    pub fn card(&self) -> Option<CardRef> {
        match &self.kind {
            ActionKind::Place { card, .. }
            | ActionKind::Summon { card, .. }
            | ActionKind::Deploy { card, .. }
            | ActionKind::Cast { card, .. }
            | ActionKind::Move { card, .. }
            | ActionKind::Discard { card, .. }
            | ActionKind::Destroy { card, .. }
            | ActionKind::Exile { card, .. }
            | ActionKind::GiveAttack { card, .. }
            | ActionKind::View { card, .. }
            | ActionKind::Reveal { card, .. }
            | ActionKind::ChangeCounters { card, .. } => Some(*card),
            ActionKind::SetAttackTarget { target, .. } => Some(*target),
            ActionKind::EquipCard { equipment, .. } => Some(*equipment),
            _ => None,
        }
    }

    /// Whether `run` has completed on this action.
    #[must_use]
    pub fn has_run(&self) -> bool {
        match &self.kind {
            ActionKind::ChangeMana { applied, .. }
            | ActionKind::ChangeLife { applied, .. }
            | ActionKind::DealDamage { applied, .. } => applied.is_some(),
            ActionKind::Draw { drawn, granted, .. } => !drawn.is_empty() || *granted,
            ActionKind::Place { moved, .. }
            | ActionKind::Summon { moved, .. }
            | ActionKind::Deploy { moved, .. }
            | ActionKind::Cast { moved, .. }
            | ActionKind::Move { moved, .. }
            | ActionKind::Discard { moved, .. }
            | ActionKind::Exile { moved, .. } => moved.is_some(),
            ActionKind::Destroy { snapshot, .. } | ActionKind::View { snapshot, .. } => {
                snapshot.is_some()
            }
            ActionKind::EstablishAttackDeclaration { previous, .. } => previous.is_some(),
            ActionKind::ApplyStatChange { applied, .. } => applied.is_some(),
            ActionKind::RemoveStatChange { removed, .. } => removed.is_some(),
            ActionKind::CancelAttack { previous } | ActionKind::GiveAttack { previous, .. } => {
                previous.is_some()
            }
            ActionKind::SetAttackTarget { previous, .. } => previous.is_some(),
            ActionKind::EquipCard { unit, .. } => unit.is_some(),
            ActionKind::Shuffle { previous } => previous.is_some(),
            ActionKind::Reveal { previous, .. } => previous.is_some(),
            ActionKind::ChangeCounters { previous, .. } => previous.is_some(),
            ActionKind::Swap { snapshots, .. } => snapshots.is_some(),
            ActionKind::CreateToken { created, .. } => created.is_some(),
            ActionKind::GrantVictory { granted, .. } => *granted,
        }
    }

    /// The cards an accessor like `discarded` or `summoned` pulls out of this
    /// executed action.
    #[must_use]
    pub fn accessed_cards(&self, accessor: AccessorKind) -> Vec<ScriptCard> {
        let moved_card =
            |moved: &Option<Moved>| -> Vec<ScriptCard> { moved.iter().map(Moved::script_card).collect() };
        match (accessor, &self.kind) {
            (AccessorKind::Summoned, ActionKind::Summon { moved, .. })
            | (AccessorKind::Deployed, ActionKind::Deploy { moved, .. })
            | (AccessorKind::Cast, ActionKind::Cast { moved, .. })
            | (AccessorKind::Exiled, ActionKind::Exile { moved, .. })
            | (AccessorKind::Moved, ActionKind::Move { moved, .. }) => moved_card(moved),
            (AccessorKind::Discarded, ActionKind::Discard { moved, .. }) => moved_card(moved),
            (AccessorKind::Retired, ActionKind::Discard { moved, retire: true, .. }) => {
                moved_card(moved)
            }
            (AccessorKind::Destroyed, ActionKind::Destroy { card, snapshot }) => snapshot
                .iter()
                .map(|snapshot| ScriptCard {
                    card: *card,
                    snapshot: Some(snapshot.clone()),
                })
                .collect(),
            (AccessorKind::Viewed, ActionKind::View { card, snapshot }) => vec![ScriptCard {
                card: *card,
                snapshot: snapshot.clone(),
            }],
            (AccessorKind::Declared, ActionKind::EstablishAttackDeclaration { attackers, .. }) => {
                attackers.iter().copied().map(ScriptCard::live).collect()
            }
            (
                AccessorKind::Targeted | AccessorKind::ChosenTarget,
                ActionKind::EstablishAttackDeclaration { target, .. },
            ) => target.iter().copied().map(ScriptCard::live).collect(),
            (AccessorKind::Targeted, ActionKind::SetAttackTarget { target, .. }) => {
                vec![ScriptCard::live(*target)]
            }
            _ => Vec::new(),
        }
    }
}

/// Copy every executed discard's snapshot into the destroy it travels with.
pub(crate) fn link_destroys(actions: &mut [Action]) {
    let discarded: Vec<(EntityId, Arc<CardSnapshot>, CardRef)> = actions
        .iter()
        .filter_map(|action| match &action.kind {
            ActionKind::Discard {
                card,
                moved: Some(moved),
                ..
            } => Some((card.id, moved.snapshot.clone(), moved.to)),
            _ => None,
        })
        .collect();
    for action in actions.iter_mut() {
        if let ActionKind::Destroy { card, snapshot } = &mut action.kind {
            if let Some((_, found, to)) = discarded.iter().find(|(id, _, _)| *id == card.id) {
                *snapshot = Some(found.clone());
                *card = *to;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityId;

    fn card(id: u32) -> CardRef {
        CardRef::new(EntityId(id), 0)
    }

    #[test]
    fn test_card_of_action() {
        let p0 = PlayerId::new(0);
        assert_eq!(Action::discard(p0, card(3)).card(), Some(card(3)));
        assert_eq!(Action::set_attack_target(p0, card(4)).card(), Some(card(4)));
        assert_eq!(Action::draw(p0, 1).card(), None);
    }

    #[test]
    fn test_accessors_ignore_unrun_actions() {
        let p0 = PlayerId::new(0);
        let discard = Action::discard(p0, card(2));
        assert!(discard.accessed_cards(AccessorKind::Discarded).is_empty());
        assert!(discard.accessed_cards(AccessorKind::Exiled).is_empty());

        let declaration = Action::establish_attack(p0, vec![card(1), card(2)]);
        assert_eq!(declaration.accessed_cards(AccessorKind::Declared).len(), 2);
        assert!(declaration.accessed_cards(AccessorKind::Targeted).is_empty());
    }

    #[test]
    fn test_retired_needs_retire_flag() {
        let p0 = PlayerId::new(0);
        let mut retire = Action::retire(p0, card(2));
        let mut discard = Action::discard(p0, card(3));
        let snapshot = |id: u32| {
            let def = Arc::new(CardDefinition::new(
                crate::cards::CardId::new(1),
                crate::cards::CardType::Unit,
            ));
            Moved {
                snapshot: Arc::new(CardSnapshot {
                    card: crate::cards::Card::new(EntityId(id), def, p0),
                    index: Some(0),
                    timing: 1,
                }),
                from: None,
                to: CardRef::new(EntityId(id), 1),
            }
        };
        if let ActionKind::Discard { moved, .. } = &mut retire.kind {
            *moved = Some(snapshot(2));
        }
        if let ActionKind::Discard { moved, .. } = &mut discard.kind {
            *moved = Some(snapshot(3));
        }
        assert_eq!(retire.accessed_cards(AccessorKind::Retired).len(), 1);
        assert!(discard.accessed_cards(AccessorKind::Retired).is_empty());
        assert_eq!(discard.accessed_cards(AccessorKind::Discarded)[0].card.epoch, 1);
    }

    #[test]
    fn test_link_destroys() {
        let p0 = PlayerId::new(0);
        let def = Arc::new(CardDefinition::new(
            crate::cards::CardId::new(1),
            crate::cards::CardType::Unit,
        ));
        let mut actions = vec![
            Action::discard(p0, card(5)),
            Action::destroy(p0, card(5)),
            Action::destroy(p0, card(6)),
        ];
        if let ActionKind::Discard { moved, .. } = &mut actions[0].kind {
            *moved = Some(Moved {
                snapshot: Arc::new(CardSnapshot {
                    card: crate::cards::Card::new(EntityId(5), def, p0),
                    index: Some(2),
                    timing: 4,
                }),
                from: None,
                to: CardRef::new(EntityId(5), 1),
            });
        }
        link_destroys(&mut actions);
        assert!(actions[1].has_run());
        assert!(!actions[2].has_run());
        assert_eq!(actions[1].accessed_cards(AccessorKind::Destroyed).len(), 1);
    }
}
