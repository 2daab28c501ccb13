//! Zone storage.
//!
//! Every player owns seven zones. Deck, hand, discard and exile are ordered
//! piles; the unit, spell/item and partner zones are fixed-size slot arrays
//! (`FieldZone`).
//!
//! ## Ordering
//!
//! Piles keep the top card at the end of their list. `ZonePosition::Top`
//! pushes, `ZonePosition::Bottom` inserts at index 0.
//!
//! ## Placement
//!
//! A field zone has a placement buffer next to its slots. A card that is
//! being summoned, deployed or cast is first *placed* into a slot: it
//! reserves the slot but is not yet on the field.
//!
//! ```
//! use cu_rules::core::{EntityId, PlayerId};
//! use cu_rules::zones::{FieldZone, ZoneKind};
//!
//! let mut units = FieldZone::new(ZoneKind::Unit, PlayerId::new(0), 5);
//! assert!(units.place(2, EntityId(9)));
//! assert_eq!(units.free_slots(), vec![0, 1, 3, 4]);
//! assert_eq!(units.cards().count(), 0);
//!
//! assert!(units.occupy(2, EntityId(9)));
//! assert_eq!(units.get(2), Some(EntityId(9)));
//! ```

use serde::{Deserialize, Serialize};

use crate::core::config::RulesConfig;
use crate::core::entity::EntityId;
use crate::core::player::PlayerId;

/// The seven kinds of zone a player owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    Deck,
    Hand,
    Unit,
    SpellItem,
    Partner,
    Discard,
    Exile,
}

impl ZoneKind {
    pub const ALL: [ZoneKind; 7] = [
        ZoneKind::Deck,
        ZoneKind::Hand,
        ZoneKind::Unit,
        ZoneKind::SpellItem,
        ZoneKind::Partner,
        ZoneKind::Discard,
        ZoneKind::Exile,
    ];

    pub const FIELD: [ZoneKind; 3] = [ZoneKind::Unit, ZoneKind::SpellItem, ZoneKind::Partner];

    /// Slot-array zones that make up the field.
    #[must_use]
    pub const fn is_field(self) -> bool {
        matches!(self, ZoneKind::Unit | ZoneKind::SpellItem | ZoneKind::Partner)
    }

    #[must_use]
    pub const fn visibility(self) -> ZoneVisibility {
        match self {
            ZoneKind::Deck => ZoneVisibility::Hidden,
            ZoneKind::Hand => ZoneVisibility::OwnerOnly,
            _ => ZoneVisibility::Public,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ZoneKind::Deck => "deck",
            ZoneKind::Hand => "hand",
            ZoneKind::Unit => "unitZone",
            ZoneKind::SpellItem => "spellItemZone",
            ZoneKind::Partner => "partnerZone",
            ZoneKind::Discard => "discard",
            ZoneKind::Exile => "exile",
        }
    }
}

/// Who may see the cards in a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneVisibility {
    Public,
    OwnerOnly,
    Hidden,
}

/// A specific player's zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneRef {
    pub player: PlayerId,
    pub kind: ZoneKind,
}

impl ZoneRef {
    #[must_use]
    pub const fn new(player: PlayerId, kind: ZoneKind) -> Self {
        Self { player, kind }
    }
}

impl std::fmt::Display for ZoneRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.player, self.kind.as_str())
    }
}

/// Position for inserting a card into a pile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZonePosition {
    Top,
    Bottom,
    /// Insert at a specific index (0 = bottom). Clamped to the pile size.
    Index(usize),
}

/// Ordered pile of cards: deck, hand, discard or exile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub kind: ZoneKind,
    pub owner: PlayerId,
    cards: Vec<EntityId>,
}

impl Zone {
    #[must_use]
    pub fn new(kind: ZoneKind, owner: PlayerId) -> Self {
        Self {
            kind,
            owner,
            cards: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Cards bottom to top.
    #[must_use]
    pub fn cards(&self) -> &[EntityId] {
        &self.cards
    }

    #[must_use]
    pub fn contains(&self, card: EntityId) -> bool {
        self.cards.contains(&card)
    }

    #[must_use]
    pub fn index_of(&self, card: EntityId) -> Option<usize> {
        self.cards.iter().position(|&c| c == card)
    }

    /// The top `count` cards, topmost last.
    #[must_use]
    pub fn top(&self, count: usize) -> &[EntityId] {
        let start = self.cards.len().saturating_sub(count);
        &self.cards[start..]
    }

    /// Insert a card and return the index it landed at.
    pub fn insert(&mut self, card: EntityId, position: ZonePosition) -> usize {
        let index = match position {
            ZonePosition::Top => self.cards.len(),
            ZonePosition::Bottom => 0,
            ZonePosition::Index(i) => i.min(self.cards.len()),
        };
        self.cards.insert(index, card);
        index
    }

    /// Remove a card, returning the index it was at.
    pub fn remove(&mut self, card: EntityId) -> Option<usize> {
        let index = self.index_of(card)?;
        self.cards.remove(index);
        Some(index)
    }

    /// Put the pile back into an earlier order of the same cards.
    pub fn restore_order(&mut self, cards: Vec<EntityId>) {
        self.cards = cards;
    }

    /// Swap two positions. Out-of-range indexes are ignored.
    pub fn swap(&mut self, a: usize, b: usize) {
        if a < self.cards.len() && b < self.cards.len() {
            self.cards.swap(a, b);
        }
    }
}

/// Fixed-size slot array with a placement buffer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldZone {
    pub kind: ZoneKind,
    pub owner: PlayerId,
    slots: Vec<Option<EntityId>>,
    placed: Vec<Option<EntityId>>,
}

impl FieldZone {
    #[must_use]
    pub fn new(kind: ZoneKind, owner: PlayerId, size: usize) -> Self {
        Self {
            kind,
            owner,
            slots: vec![None; size],
            placed: vec![None; size],
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// The card occupying a slot.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<EntityId> {
        self.slots.get(slot).copied().flatten()
    }

    /// The card placed into a slot, not yet on the field.
    #[must_use]
    pub fn placed_at(&self, slot: usize) -> Option<EntityId> {
        self.placed.get(slot).copied().flatten()
    }

    #[must_use]
    pub fn is_free(&self, slot: usize) -> bool {
        slot < self.slots.len() && self.slots[slot].is_none() && self.placed[slot].is_none()
    }

    /// Slots that are neither occupied nor reserved.
    #[must_use]
    pub fn free_slots(&self) -> Vec<usize> {
        (0..self.slots.len()).filter(|&s| self.is_free(s)).collect()
    }

    /// Cards on the field in slot order. Placed cards are not included.
    pub fn cards(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().filter_map(|s| *s)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot a card occupies.
    #[must_use]
    pub fn index_of(&self, card: EntityId) -> Option<usize> {
        self.slots.iter().position(|&s| s == Some(card))
    }

    /// Slot a card is placed into.
    #[must_use]
    pub fn placed_index_of(&self, card: EntityId) -> Option<usize> {
        self.placed.iter().position(|&s| s == Some(card))
    }

    /// Put a card into a slot. Fails if another card holds it. A placement
    /// of this same card is consumed.
    pub fn occupy(&mut self, slot: usize, card: EntityId) -> bool {
        if slot >= self.slots.len() || self.slots[slot].is_some_and(|c| c != card) {
            return false;
        }
        if self.placed[slot] == Some(card) {
            self.placed[slot] = None;
        }
        self.slots[slot] = Some(card);
        true
    }

    /// Reserve a free slot for a card.
    pub fn place(&mut self, slot: usize, card: EntityId) -> bool {
        if !self.is_free(slot) {
            return false;
        }
        self.placed[slot] = Some(card);
        true
    }

    /// Remove a card from its slot or its placement, returning the slot.
    pub fn remove(&mut self, card: EntityId) -> Option<usize> {
        if let Some(slot) = self.index_of(card) {
            self.slots[slot] = None;
            return Some(slot);
        }
        let slot = self.placed_index_of(card)?;
        self.placed[slot] = None;
        Some(slot)
    }
}

/// All seven zones of one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerZones {
    pub deck: Zone,
    pub hand: Zone,
    pub unit: FieldZone,
    pub spell_item: FieldZone,
    pub partner: FieldZone,
    pub discard: Zone,
    pub exile: Zone,
}

impl PlayerZones {
    #[must_use]
    pub fn new(owner: PlayerId, config: &RulesConfig) -> Self {
        Self {
            deck: Zone::new(ZoneKind::Deck, owner),
            hand: Zone::new(ZoneKind::Hand, owner),
            unit: FieldZone::new(ZoneKind::Unit, owner, config.unit_zone_size),
            spell_item: FieldZone::new(ZoneKind::SpellItem, owner, config.spell_item_zone_size),
            partner: FieldZone::new(ZoneKind::Partner, owner, config.partner_zone_size),
            discard: Zone::new(ZoneKind::Discard, owner),
            exile: Zone::new(ZoneKind::Exile, owner),
        }
    }

    #[must_use]
    pub fn pile(&self, kind: ZoneKind) -> Option<&Zone> {
        match kind {
            ZoneKind::Deck => Some(&self.deck),
            ZoneKind::Hand => Some(&self.hand),
            ZoneKind::Discard => Some(&self.discard),
            ZoneKind::Exile => Some(&self.exile),
            _ => None,
        }
    }

    pub fn pile_mut(&mut self, kind: ZoneKind) -> Option<&mut Zone> {
        match kind {
            ZoneKind::Deck => Some(&mut self.deck),
            ZoneKind::Hand => Some(&mut self.hand),
            ZoneKind::Discard => Some(&mut self.discard),
            ZoneKind::Exile => Some(&mut self.exile),
            _ => None,
        }
    }

    #[must_use]
    pub fn field(&self, kind: ZoneKind) -> Option<&FieldZone> {
        match kind {
            ZoneKind::Unit => Some(&self.unit),
            ZoneKind::SpellItem => Some(&self.spell_item),
            ZoneKind::Partner => Some(&self.partner),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, kind: ZoneKind) -> Option<&mut FieldZone> {
        match kind {
            ZoneKind::Unit => Some(&mut self.unit),
            ZoneKind::SpellItem => Some(&mut self.spell_item),
            ZoneKind::Partner => Some(&mut self.partner),
            _ => None,
        }
    }

    /// Cards in a zone: bottom to top for piles, slot order for the field.
    #[must_use]
    pub fn cards_in(&self, kind: ZoneKind) -> Vec<EntityId> {
        match (self.pile(kind), self.field(kind)) {
            (Some(pile), _) => pile.cards().to_vec(),
            (_, Some(field)) => field.cards().collect(),
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self, kind: ZoneKind) -> usize {
        match (self.pile(kind), self.field(kind)) {
            (Some(pile), _) => pile.len(),
            (_, Some(field)) => field.len(),
            _ => 0,
        }
    }

    /// Zone and index (slot for field zones) a card occupies.
    #[must_use]
    pub fn find(&self, card: EntityId) -> Option<(ZoneKind, usize)> {
        ZoneKind::ALL.into_iter().find_map(|kind| {
            let index = match (self.pile(kind), self.field(kind)) {
                (Some(pile), _) => pile.index_of(card),
                (_, Some(field)) => field.index_of(card),
                _ => None,
            }?;
            Some((kind, index))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p0() -> PlayerId {
        PlayerId::new(0)
    }

    #[test]
    fn test_pile_positions() {
        let mut deck = Zone::new(ZoneKind::Deck, p0());
        deck.insert(EntityId(1), ZonePosition::Top);
        deck.insert(EntityId(2), ZonePosition::Top);
        deck.insert(EntityId(3), ZonePosition::Bottom);
        assert_eq!(deck.cards(), &[EntityId(3), EntityId(1), EntityId(2)]);
        assert_eq!(deck.top(1), &[EntityId(2)]);
        assert_eq!(deck.top(10).len(), 3);

        assert_eq!(deck.insert(EntityId(4), ZonePosition::Index(99)), 3);
        assert_eq!(deck.remove(EntityId(1)), Some(1));
        assert_eq!(deck.remove(EntityId(1)), None);
    }

    #[test]
    fn test_field_occupy_conflict() {
        let mut zone = FieldZone::new(ZoneKind::Unit, p0(), 2);
        assert!(zone.occupy(0, EntityId(1)));
        assert!(!zone.occupy(0, EntityId(2)));
        assert!(!zone.place(0, EntityId(2)));
        assert!(zone.place(1, EntityId(2)));
        assert!(zone.free_slots().is_empty());

        assert_eq!(zone.remove(EntityId(2)), Some(1));
        assert_eq!(zone.free_slots(), vec![1]);
        assert!(!zone.occupy(5, EntityId(3)));
    }

    #[test]
    fn test_player_zones_lookup() {
        let mut zones = PlayerZones::new(p0(), &RulesConfig::default());
        zones.hand.insert(EntityId(5), ZonePosition::Top);
        zones.unit.occupy(3, EntityId(6));

        assert_eq!(zones.find(EntityId(5)), Some((ZoneKind::Hand, 0)));
        assert_eq!(zones.find(EntityId(6)), Some((ZoneKind::Unit, 3)));
        assert_eq!(zones.find(EntityId(7)), None);
        assert_eq!(zones.cards_in(ZoneKind::Unit), vec![EntityId(6)]);
        assert_eq!(zones.len(ZoneKind::SpellItem), 0);
        assert_eq!(zones.partner.size(), 1);
    }

    #[test]
    fn test_visibility() {
        assert_eq!(ZoneKind::Deck.visibility(), ZoneVisibility::Hidden);
        assert_eq!(ZoneKind::Hand.visibility(), ZoneVisibility::OwnerOnly);
        assert_eq!(ZoneKind::Discard.visibility(), ZoneVisibility::Public);
        assert!(ZoneKind::Partner.is_field());
        assert!(!ZoneKind::Exile.is_field());
    }
}
