//! Card identity.
//!
//! Every card that takes part in a match (deck cards, partners and tokens)
//! lives in the game's card arena under a stable `EntityId`. The id survives
//! zone moves.
//!
//! ## Epochs
//!
//! A card gets a new epoch whenever it enters a new zone. A `CardRef` pairs
//! the id with the epoch it was taken at, so a reference captured before a
//! move is detectably stale afterwards:
//!
//! ```
//! use cu_rules::core::{CardRef, EntityId};
//!
//! let before = CardRef::new(EntityId(7), 0);
//! let after = before.next_epoch();
//!
//! assert_eq!(before.id, after.id);
//! assert!(!before.is_same_instance(&after));
//! ```

use serde::{Deserialize, Serialize};

/// Stable arena index of a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Create a new entity ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Position of this card in the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Generation handle to a card in one particular zone stay.
///
/// Two refs with the same id denote the same physical card. They denote the
/// same *instance* only when their epochs match too.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardRef {
    pub id: EntityId,
    pub epoch: u32,
}

impl CardRef {
    #[must_use]
    pub const fn new(id: EntityId, epoch: u32) -> Self {
        Self { id, epoch }
    }

    /// The ref the same card will have after its next zone change.
    #[must_use]
    pub const fn next_epoch(self) -> Self {
        Self {
            id: self.id,
            epoch: self.epoch + 1,
        }
    }

    /// True if both refs point at the same card during the same zone stay.
    #[must_use]
    pub fn is_same_instance(&self, other: &CardRef) -> bool {
        self.id == other.id && self.epoch == other.epoch
    }
}

impl std::fmt::Display for CardRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Card({}#{})", self.id.0, self.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_display() {
        assert_eq!(format!("{}", EntityId(42)), "Entity(42)");
        assert_eq!(EntityId::new(3).index(), 3);
    }

    #[test]
    fn test_card_ref_epochs() {
        let r = CardRef::new(EntityId(1), 4);
        let next = r.next_epoch();
        assert_eq!(next.epoch, 5);
        assert!(r.is_same_instance(&CardRef::new(EntityId(1), 4)));
        assert!(!r.is_same_instance(&next));
        assert_eq!(format!("{}", r), "Card(1#4)");
    }

    #[test]
    fn test_serialization() {
        let r = CardRef::new(EntityId(123), 2);
        let json = serde_json::to_string(&r).unwrap();
        let back: CardRef = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
