//! Card and player values and the modifier pipeline.
//!
//! ## Key Types
//!
//! - `ValueKey`: the name of a modifiable value
//! - `CardValues` / `PlayerValues`: one view of an object's values
//! - `ObjectValues`: initial, base and current views plus the modifier stack
//! - `Modifier` / `Modification`: entries of the modifier stack
//!
//! `pipeline::recalculate` derives base and current from initial and the
//! stack, always from scratch.

pub mod modifier;
pub mod object;
pub mod pipeline;

pub use modifier::{
    div_ceil, Modification, ModificationKind, Modifier, ModifierId, ModifierSource, Operand,
    StatTarget,
};
pub use object::{
    AbilityValue, CardValues, ObjectValues, PlayerValues, Unaffection, ValueKey, ValueSet,
};
pub use pipeline::{compute, recalculate, recalculate_all, Recalculated};
