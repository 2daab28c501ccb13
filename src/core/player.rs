//! Player identification and per-player data storage.
//!
//! ## PlayerId
//!
//! Cross Universe is strictly a two-player game, so `PlayerId` is either
//! player 0 or player 1 and `next()` names the opponent.
//!
//! ## PlayerMap
//!
//! Per-player storage backed by a `Vec` for O(1) access, indexable by
//! `PlayerId`.
//!
//! ## Player
//!
//! A player's life, mana, zones, values and the victory conditions their
//! opponent's play has handed them.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

use crate::values::{ObjectValues, PlayerValues};
use crate::zones::PlayerZones;

use super::config::RulesConfig;

/// Number of players in a match.
pub const PLAYER_COUNT: usize = 2;

/// Player identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Create a new player ID.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw player index (0-based).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The opponent of this player.
    ///
    /// ```
    /// use cu_rules::core::PlayerId;
    ///
    /// assert_eq!(PlayerId::new(0).next(), PlayerId::new(1));
    /// assert_eq!(PlayerId::new(1).next(), PlayerId::new(0));
    /// ```
    #[must_use]
    pub const fn next(self) -> Self {
        Self(1 - (self.0 & 1))
    }

    /// Both players, this one first.
    #[must_use]
    pub const fn with_opponent(self) -> [PlayerId; 2] {
        [self, self.next()]
    }

    /// Iterate over both player IDs.
    pub fn all() -> impl Iterator<Item = PlayerId> {
        (0..PLAYER_COUNT as u8).map(PlayerId)
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player {}", self.0)
    }
}

/// Per-player data storage with O(1) access.
///
/// ```
/// use cu_rules::core::{PlayerId, PlayerMap};
///
/// let mut life: PlayerMap<i64> = PlayerMap::new(|_| 1000);
/// life[PlayerId::new(1)] -= 200;
/// assert_eq!(life[PlayerId::new(1)], 800);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerMap<T> {
    data: Vec<T>,
}

impl<T> PlayerMap<T> {
    /// Create a new PlayerMap with values from a factory function.
    pub fn new(factory: impl Fn(PlayerId) -> T) -> Self {
        Self {
            data: PlayerId::all().map(factory).collect(),
        }
    }

    /// Create a new PlayerMap with all entries set to the same value.
    pub fn with_value(value: T) -> Self
    where
        T: Clone,
    {
        Self::new(|_| value.clone())
    }

    /// Build a map from exactly one value per player, player 0 first.
    pub fn from_pair(first: T, second: T) -> Self {
        Self {
            data: vec![first, second],
        }
    }

    #[must_use]
    pub fn get(&self, player: PlayerId) -> &T {
        &self.data[player.index()]
    }

    pub fn get_mut(&mut self, player: PlayerId) -> &mut T {
        &mut self.data[player.index()]
    }

    /// Iterate over (PlayerId, &T) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (PlayerId(i as u8), v))
    }

    /// Iterate over (PlayerId, &mut T) pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PlayerId, &mut T)> {
        self.data
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (PlayerId(i as u8), v))
    }
}

impl<T: Default> Default for PlayerMap<T> {
    fn default() -> Self {
        Self::new(|_| T::default())
    }
}

impl<T> Index<PlayerId> for PlayerMap<T> {
    type Output = T;

    fn index(&self, player: PlayerId) -> &Self::Output {
        self.get(player)
    }
}

impl<T> IndexMut<PlayerId> for PlayerMap<T> {
    fn index_mut(&mut self, player: PlayerId) -> &mut Self::Output {
        self.get_mut(player)
    }
}

/// Reasons a player has won.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VictoryCondition {
    /// The opponent's life reached 0.
    LifeZero,
    /// The opponent had to draw more cards than their deck held.
    DrawFromEmptyDeck,
    /// The opponent could not pay for their partner during mana supply.
    PartnerUpkeep,
}

impl VictoryCondition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LifeZero => "lifeZero",
            Self::DrawFromEmptyDeck => "drawFromEmptyDeck",
            Self::PartnerUpkeep => "partnerUpkeep",
        }
    }
}

impl std::fmt::Display for VictoryCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two players of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub life: i64,
    pub mana: i64,
    pub zones: PlayerZones,
    pub values: ObjectValues<PlayerValues>,
    /// Conditions under which this player has won. Any entry ends the game.
    pub victory_conditions: Vec<VictoryCondition>,
}

impl Player {
    /// A fresh player with empty zones and starting life and mana.
    #[must_use]
    pub fn new(id: PlayerId, config: &RulesConfig) -> Self {
        Self {
            id,
            life: config.starting_life,
            mana: config.starting_mana,
            zones: PlayerZones::new(id, config),
            values: ObjectValues::new(PlayerValues::from_config(config)),
            victory_conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_won(&self) -> bool {
        !self.victory_conditions.is_empty()
    }
}
