//! Zones: where cards are.
//!
//! ## Key Types
//!
//! - `ZoneKind`: the seven zones every player owns
//! - `ZoneRef`: a specific player's zone
//! - `Zone`: ordered pile (deck, hand, discard, exile)
//! - `FieldZone`: slot array with a placement buffer (unit, spell/item, partner)
//! - `PlayerZones`: one player's full set

pub mod zone;

pub use zone::{FieldZone, PlayerZones, Zone, ZoneKind, ZonePosition, ZoneRef, ZoneVisibility};
