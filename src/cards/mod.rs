//! Card system: definitions, instances, and registry.
//!
//! ## Key Types
//!
//! - `CardId`: identifier of a printed card (`CU00042`)
//! - `CardType`: unit, spell and item kinds plus their parents
//! - `CardDefinition`: static card data and abilities
//! - `Card`: runtime card state (zone, values, counters)
//! - `CardRegistry`: definition lookup

pub mod definition;
pub mod instance;
pub mod registry;

pub use definition::{parse_definition, CardDefinition, CardId, CardType};
pub use instance::{Card, CardSnapshot};
pub use registry::CardRegistry;
