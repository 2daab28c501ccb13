//! Events: immutable records of what happened.
//!
//! Every executed action, block and phase change emits one. The engine
//! never reads events back; they exist for front ends and logs.

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityId;
use crate::core::{CardRef, PlayerId, VictoryCondition};
use crate::rules::GameResult;
use crate::script::ast::PhaseName;
use crate::stack::BlockKind;
use crate::values::{ModifierId, StatTarget};
use crate::zones::ZoneRef;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    GameStarted {
        starting_player: PlayerId,
    },
    TurnStarted {
        player: PlayerId,
        turn: u32,
    },
    PhaseStarted {
        player: PlayerId,
        phase: PhaseName,
    },
    StackStarted {
        index: u32,
    },
    StackClosed {
        index: u32,
        blocks: usize,
    },
    BlockCreated {
        player: PlayerId,
        kind: BlockKind,
    },
    BlockCreationFailed {
        player: PlayerId,
        kind: BlockKind,
    },
    BlockCancelled {
        player: PlayerId,
        kind: BlockKind,
    },
    PlayerPassed {
        player: PlayerId,
    },
    AbilityActivated {
        player: PlayerId,
        card: CardRef,
        ability: AbilityId,
    },

    ManaChanged {
        player: PlayerId,
        amount: i64,
        mana: i64,
    },
    LifeChanged {
        player: PlayerId,
        amount: i64,
        life: i64,
    },
    DamageDealt {
        player: PlayerId,
        amount: i64,
    },
    CardsDrawn {
        player: PlayerId,
        cards: Vec<CardRef>,
    },
    CardPlaced {
        player: PlayerId,
        card: CardRef,
        zone: ZoneRef,
        slot: usize,
    },
    CardMoved {
        card: CardRef,
        to: CardRef,
        zone: ZoneRef,
    },
    Summoned {
        player: PlayerId,
        card: CardRef,
    },
    Deployed {
        player: PlayerId,
        card: CardRef,
    },
    Cast {
        player: PlayerId,
        card: CardRef,
    },
    Discarded {
        card: CardRef,
        retired: bool,
    },
    Destroyed {
        card: CardRef,
    },
    Exiled {
        card: CardRef,
    },

    AttackDeclared {
        player: PlayerId,
        attackers: Vec<CardRef>,
        target: Option<CardRef>,
    },
    AttackCancelled {
        player: PlayerId,
    },
    AttackTargetChanged {
        target: CardRef,
    },
    AttackGiven {
        card: CardRef,
    },
    Fight {
        attacker: CardRef,
        target: CardRef,
        counterattack: bool,
    },
    CardEquipped {
        equipment: CardRef,
        unit: CardRef,
    },

    StatChanged {
        target: StatTarget,
        modifier: ModifierId,
    },
    StatChangeRemoved {
        target: StatTarget,
        modifier: ModifierId,
    },
    DeckShuffled {
        player: PlayerId,
    },
    CardViewed {
        player: PlayerId,
        card: CardRef,
    },
    CardRevealed {
        card: CardRef,
    },
    CountersChanged {
        card: CardRef,
        counter: String,
        amount: i64,
        total: i64,
    },
    CardsSwapped {
        first: CardRef,
        second: CardRef,
    },
    TokenCreated {
        player: PlayerId,
        card: CardRef,
    },

    CardsSelected {
        player: PlayerId,
        cards: Vec<CardRef>,
    },
    PlayerSelected {
        player: PlayerId,
        chosen: PlayerId,
    },
    TypeSelected {
        player: PlayerId,
        chosen: String,
    },

    /// An action was pruned from its timing before anything ran.
    ActionCancelled {
        player: PlayerId,
        action: String,
    },
    VictoryConditionGained {
        player: PlayerId,
        condition: VictoryCondition,
    },
    GameEnded {
        result: GameResult,
    },
}

impl Event {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GameStarted { .. } => "gameStarted",
            Self::TurnStarted { .. } => "turnStarted",
            Self::PhaseStarted { .. } => "phaseStarted",
            Self::StackStarted { .. } => "stackStarted",
            Self::StackClosed { .. } => "stackClosed",
            Self::BlockCreated { .. } => "blockCreated",
            Self::BlockCreationFailed { .. } => "blockCreationFailed",
            Self::BlockCancelled { .. } => "blockCancelled",
            Self::PlayerPassed { .. } => "playerPassed",
            Self::AbilityActivated { .. } => "abilityActivated",
            Self::ManaChanged { .. } => "manaChanged",
            Self::LifeChanged { .. } => "lifeChanged",
            Self::DamageDealt { .. } => "damageDealt",
            Self::CardsDrawn { .. } => "cardsDrawn",
            Self::CardPlaced { .. } => "cardPlaced",
            Self::CardMoved { .. } => "cardMoved",
            Self::Summoned { .. } => "summoned",
            Self::Deployed { .. } => "deployed",
            Self::Cast { .. } => "cast",
            Self::Discarded { .. } => "discarded",
            Self::Destroyed { .. } => "destroyed",
            Self::Exiled { .. } => "exiled",
            Self::AttackDeclared { .. } => "attackDeclared",
            Self::AttackCancelled { .. } => "attackCancelled",
            Self::AttackTargetChanged { .. } => "attackTargetChanged",
            Self::AttackGiven { .. } => "attackGiven",
            Self::Fight { .. } => "fight",
            Self::CardEquipped { .. } => "cardEquipped",
            Self::StatChanged { .. } => "statChanged",
            Self::StatChangeRemoved { .. } => "statChangeRemoved",
            Self::DeckShuffled { .. } => "deckShuffled",
            Self::CardViewed { .. } => "cardViewed",
            Self::CardRevealed { .. } => "cardRevealed",
            Self::CountersChanged { .. } => "countersChanged",
            Self::CardsSwapped { .. } => "cardsSwapped",
            Self::TokenCreated { .. } => "tokenCreated",
            Self::CardsSelected { .. } => "cardsSelected",
            Self::PlayerSelected { .. } => "playerSelected",
            Self::TypeSelected { .. } => "typeSelected",
            Self::ActionCancelled { .. } => "actionCancelled",
            Self::VictoryConditionGained { .. } => "victoryConditionGained",
            Self::GameEnded { .. } => "gameEnded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityId;

    #[test]
    fn test_names() {
        let event = Event::CardsDrawn {
            player: PlayerId::new(0),
            cards: vec![CardRef::new(EntityId(1), 2)],
        };
        assert_eq!(event.as_str(), "cardsDrawn");
        assert_eq!(
            Event::GameEnded {
                result: GameResult::Draw
            }
            .as_str(),
            "gameEnded"
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let event = Event::CountersChanged {
            card: CardRef::new(EntityId(3), 1),
            counter: "Charge".into(),
            amount: 2,
            total: 5,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
