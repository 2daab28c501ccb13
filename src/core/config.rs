//! Rules configuration.
//!
//! `RulesConfig` carries the numbers the Cross Universe rules are written
//! around. Defaults match the published rules; `with_*` builders override
//! individual values for tests and variants.
//!
//! ```
//! use cu_rules::core::RulesConfig;
//!
//! let config = RulesConfig::default().with_starting_life(500);
//! assert_eq!(config.starting_life, 500);
//! assert_eq!(config.hand_limit, 8);
//! ```

use serde::{Deserialize, Serialize};

/// Card types known to the rules. `allTypes` expands to this list.
pub const ALL_TYPES: &[&str] = &[
    "Angel", "Armor", "Beast", "Bird", "Book", "Boundary", "Bug", "Chain", "Curse", "Dark",
    "Demon", "Dragon", "Earth", "Electric", "Figure", "Fire", "Fish", "Ghost", "Ice", "Illusion",
    "Katana", "Kingdom", "Light", "Machine", "Mage", "Medicine", "Myth", "Plant", "Psychic",
    "Rock", "Samurai", "Shield", "Spirit", "Structure", "Sword", "Warrior", "Water", "Wind",
];

/// Numbers and limits of the game rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub starting_life: i64,
    pub starting_mana: i64,
    /// Mana above this is discarded during mana supply.
    pub mana_cap: i64,
    /// Mana each player gains at the start of their turn.
    pub mana_gain: i64,
    /// Hand size a player discards down to during mana supply.
    pub hand_limit: usize,
    pub opening_hand: usize,
    pub standard_draw: i64,
    pub unit_zone_size: usize,
    pub spell_item_zone_size: usize,
    pub partner_zone_size: usize,
    /// Type names `allTypes` expands to.
    pub all_types: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            starting_life: 1000,
            starting_mana: 0,
            mana_cap: 5,
            mana_gain: 5,
            hand_limit: 8,
            opening_hand: 5,
            standard_draw: 1,
            unit_zone_size: 5,
            spell_item_zone_size: 4,
            partner_zone_size: 1,
            all_types: ALL_TYPES.iter().map(|t| (*t).to_string()).collect(),
        }
    }
}

impl RulesConfig {
    #[must_use]
    pub fn with_starting_life(mut self, life: i64) -> Self {
        self.starting_life = life;
        self
    }

    #[must_use]
    pub fn with_starting_mana(mut self, mana: i64) -> Self {
        self.starting_mana = mana;
        self
    }

    #[must_use]
    pub fn with_mana_cap(mut self, cap: i64) -> Self {
        self.mana_cap = cap;
        self
    }

    #[must_use]
    pub fn with_mana_gain(mut self, gain: i64) -> Self {
        self.mana_gain = gain;
        self
    }

    #[must_use]
    pub fn with_standard_draw(mut self, amount: i64) -> Self {
        self.standard_draw = amount;
        self
    }

    #[must_use]
    pub fn with_hand_limit(mut self, limit: usize) -> Self {
        self.hand_limit = limit;
        self
    }

    #[must_use]
    pub fn with_opening_hand(mut self, size: usize) -> Self {
        self.opening_hand = size;
        self
    }

    #[must_use]
    pub fn with_all_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.all_types = types.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_rules() {
        let config = RulesConfig::default();
        assert_eq!(config.starting_life, 1000);
        assert_eq!(config.mana_cap, 5);
        assert_eq!(config.mana_gain, 5);
        assert_eq!(config.opening_hand, 5);
        assert_eq!(config.unit_zone_size, 5);
        assert_eq!(config.spell_item_zone_size, 4);
        assert_eq!(config.partner_zone_size, 1);
        assert!(config.all_types.iter().any(|t| t == "Dragon"));
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: RulesConfig = serde_json::from_str(r#"{"starting_life": 300}"#).unwrap();
        assert_eq!(config.starting_life, 300);
        assert_eq!(config.hand_limit, 8);
    }
}
