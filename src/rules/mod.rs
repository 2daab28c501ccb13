//! Game rules that sit above single actions.
//!
//! - `combat`: fights, counterattacks and retiring units
//! - `moves`: which cards a player may summon, deploy, cast, retire or
//!   attack with right now
//!
//! `GameResult` ends a match. It is read off the players' victory
//! conditions after every timing.

pub mod combat;
pub mod moves;

use serde::{Deserialize, Serialize};

use crate::core::{GameState, PlayerId, VictoryCondition};

pub use combat::{counterattack, fight, retire_mana, Fight};
pub use moves::{
    activatable_abilities, castable_spells, deployable_items, eligible_attackers, retirable_units,
    summonable_units,
};

/// Result of a completed game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// Single winner and the conditions they met.
    Winner {
        player: PlayerId,
        conditions: Vec<VictoryCondition>,
    },
    /// Both players met a victory condition in the same timing.
    Draw,
}

impl GameResult {
    /// The result the victory conditions call for, if any.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use cu_rules::cards::CardRegistry;
    /// use cu_rules::core::{GameState, PlayerId, RulesConfig, VictoryCondition};
    /// use cu_rules::rules::GameResult;
    ///
    /// let mut state = GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()));
    /// assert_eq!(GameResult::from_state(&state), None);
    ///
    /// state.players[PlayerId::new(1)].victory_conditions.push(VictoryCondition::LifeZero);
    /// let result = GameResult::from_state(&state).unwrap();
    /// assert!(result.is_winner(PlayerId::new(1)));
    /// ```
    #[must_use]
    pub fn from_state(state: &GameState) -> Option<Self> {
        let winners: Vec<PlayerId> = PlayerId::all()
            .filter(|&player| state.players[player].has_won())
            .collect();
        match winners.as_slice() {
            [] => None,
            [player] => Some(Self::Winner {
                player: *player,
                conditions: state.players[*player].victory_conditions.clone(),
            }),
            _ => Some(Self::Draw),
        }
    }

    #[must_use]
    pub fn is_winner(&self, player: PlayerId) -> bool {
        matches!(self, Self::Winner { player: p, .. } if *p == player)
    }

    #[must_use]
    pub fn winner(&self) -> Option<PlayerId> {
        match self {
            Self::Winner { player, .. } => Some(*player),
            Self::Draw => None,
        }
    }
}

impl std::fmt::Display for GameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Winner { player, conditions } => {
                let reasons: Vec<&str> = conditions.iter().map(|c| c.as_str()).collect();
                write!(f, "{player} wins ({})", reasons.join(", "))
            }
            Self::Draw => f.write_str("draw"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cards::CardRegistry;
    use crate::core::RulesConfig;

    #[test]
    fn test_both_players_winning_is_a_draw() {
        let mut state = GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()));
        state.players[PlayerId::new(0)]
            .victory_conditions
            .push(VictoryCondition::DrawFromEmptyDeck);
        state.players[PlayerId::new(1)]
            .victory_conditions
            .push(VictoryCondition::LifeZero);
        let result = GameResult::from_state(&state).unwrap();
        assert_eq!(result, GameResult::Draw);
        assert_eq!(result.winner(), None);
        assert_eq!(result.to_string(), "draw");
    }

    #[test]
    fn test_winner_display() {
        let result = GameResult::Winner {
            player: PlayerId::new(0),
            conditions: vec![VictoryCondition::PartnerUpkeep],
        };
        assert_eq!(result.to_string(), "Player 0 wins (partnerUpkeep)");
        assert!(!result.is_winner(PlayerId::new(1)));
    }
}
