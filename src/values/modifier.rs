//! Modifiers and the modifications they carry.
//!
//! A `Modifier` is one entry on an object's modifier stack: a list of
//! `Modification`s plus where they came from. Modifications are a closed
//! enum of seven kinds; operands are script expressions until the
//! modification is *baked* against a target, after which they are frozen
//! values.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityId;
use crate::core::{EngineError, EntityId, GameState, PlayerId};
use crate::script::ast::Expr;
use crate::script::eval::evaluate;
use crate::script::value::{numbers, truthy};
use crate::script::{EvalContext, ScriptCard, ScriptValue};

use super::object::{ValueKey, ValueSet};

/// Unique id of a modifier on some stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModifierId(pub u64);

/// The object a modifier sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatTarget {
    Card(EntityId),
    Player(PlayerId),
}

/// The ability that produced a modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSource {
    pub card: Option<EntityId>,
    pub player: PlayerId,
    pub ability: Option<AbilityId>,
}

impl ModifierSource {
    #[must_use]
    pub fn from_context(ctx: &EvalContext) -> Self {
        Self {
            card: ctx.card,
            player: ctx.player,
            ability: ctx.ability,
        }
    }

    /// The context modification operands evaluate in, with `target` as the
    /// implicit card.
    pub fn context(&self, target: StatTarget, state: &GameState) -> EvalContext {
        let mut ctx = EvalContext::new(self.player).with_evaluating_player(self.player);
        if let Some(card) = self.card {
            ctx = ctx.with_card(card);
        }
        if let Some(ability) = self.ability {
            ctx = ctx.with_ability(ability);
        }
        if let StatTarget::Card(id) = target {
            if let Ok(card) = state.card(id) {
                ctx = ctx.with_implicit_card(ScriptCard::live(card.current_ref()));
            }
        }
        ctx
    }
}

/// An operand: an expression until baked, frozen values afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Operand {
    Expr(Arc<Expr>),
    Baked(Vec<ScriptValue>),
}

impl Operand {
    pub fn resolve(
        &self,
        ctx: &EvalContext,
        state: &GameState,
    ) -> Result<Vec<ScriptValue>, EngineError> {
        match self {
            Operand::Expr(expr) => evaluate(expr, ctx, state),
            Operand::Baked(values) => Ok(values.clone()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ModificationKind {
    Set { key: ValueKey, value: Operand },
    Append { key: ValueKey, values: Operand },
    NumericChange { key: ValueKey, amount: Operand },
    /// Divides and rounds up.
    NumericDivide { key: ValueKey, by: Operand },
    Swap { key: ValueKey, other: ValueKey },
    CancelAbilities { abilities: Operand },
    Unaffected { key: ValueKey, by: Option<Arc<Expr>> },
}

/// One change to one value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Modification {
    pub kind: ModificationKind,
    /// Applies to the base view rather than current.
    pub to_base: bool,
    /// Evaluated with the modified object as the implicit card.
    pub condition: Option<Arc<Expr>>,
}

impl Modification {
    #[must_use]
    pub fn new(kind: ModificationKind) -> Self {
        Self {
            kind,
            to_base: false,
            condition: None,
        }
    }

    /// The value this modification changes. Cancels change abilities.
    #[must_use]
    pub fn key(&self) -> ValueKey {
        match &self.kind {
            ModificationKind::Set { key, .. }
            | ModificationKind::Append { key, .. }
            | ModificationKind::NumericChange { key, .. }
            | ModificationKind::NumericDivide { key, .. }
            | ModificationKind::Swap { key, .. }
            | ModificationKind::Unaffected { key, .. } => *key,
            ModificationKind::CancelAbilities { .. } => ValueKey::Abilities,
        }
    }

    /// Cancels and unaffections are collected before any values are computed.
    #[must_use]
    pub fn is_preliminary(&self) -> bool {
        matches!(
            self.kind,
            ModificationKind::CancelAbilities { .. } | ModificationKind::Unaffected { .. }
        )
    }

    /// Freeze the operands against a target. `None` means the modification
    /// would change nothing.
    pub fn bake(
        &self,
        ctx: &EvalContext,
        state: &GameState,
    ) -> Result<Option<Modification>, EngineError> {
        let freeze = |operand: &Operand| -> Result<Operand, EngineError> {
            Ok(Operand::Baked(operand.resolve(ctx, state)?))
        };
        let kind = match &self.kind {
            ModificationKind::Set { key, value } => {
                let value = freeze(value)?;
                if matches!(&value, Operand::Baked(v) if v.is_empty()) {
                    return Ok(None);
                }
                ModificationKind::Set { key: *key, value }
            }
            ModificationKind::Append { key, values } => ModificationKind::Append {
                key: *key,
                values: freeze(values)?,
            },
            ModificationKind::NumericChange { key, amount } => ModificationKind::NumericChange {
                key: *key,
                amount: freeze(amount)?,
            },
            ModificationKind::NumericDivide { key, by } => ModificationKind::NumericDivide {
                key: *key,
                by: freeze(by)?,
            },
            ModificationKind::CancelAbilities { abilities } => ModificationKind::CancelAbilities {
                abilities: freeze(abilities)?,
            },
            kind @ (ModificationKind::Swap { .. } | ModificationKind::Unaffected { .. }) => {
                kind.clone()
            }
        };
        Ok(Some(Modification {
            kind,
            to_base: self.to_base,
            condition: self.condition.clone(),
        }))
    }

    /// Whether the condition holds for the target in `ctx`.
    pub fn condition_holds(
        &self,
        ctx: &EvalContext,
        state: &GameState,
    ) -> Result<bool, EngineError> {
        match &self.condition {
            Some(condition) => Ok(truthy(&evaluate(condition, ctx, state)?)),
            None => Ok(true),
        }
    }

    /// Whether this modification can change `values` at all.
    pub fn can_apply_to<V: ValueSet>(
        &self,
        values: &V,
        ctx: &EvalContext,
        state: &GameState,
    ) -> Result<bool, EngineError> {
        if self.key().is_unit_only() && !values.is_unit() {
            return Ok(false);
        }
        if values.read(self.key()).is_none() {
            return Ok(false);
        }
        if let ModificationKind::CancelAbilities { abilities } = &self.kind {
            let targeted = cancel_targets(abilities, values, ctx, state)?;
            return Ok(targeted.iter().any(|(_, cancellable)| *cancellable));
        }
        Ok(true)
    }

    /// Whether applying leaves every value legal.
    pub fn can_fully_apply_to<V: ValueSet>(
        &self,
        values: &V,
        ctx: &EvalContext,
        state: &GameState,
    ) -> Result<bool, EngineError> {
        if !self.can_apply_to(values, ctx, state)? {
            return Ok(false);
        }
        match &self.kind {
            ModificationKind::NumericChange { key, amount } => {
                let delta: i64 = numbers(&amount.resolve(ctx, state)?).iter().sum();
                let current = values.read(*key).unwrap_or_default();
                Ok(numbers(&current).iter().all(|n| n + delta >= 0))
            }
            ModificationKind::CancelAbilities { abilities } => {
                let targeted = cancel_targets(abilities, values, ctx, state)?;
                Ok(!targeted.is_empty() && targeted.iter().all(|(_, cancellable)| *cancellable))
            }
            _ => Ok(true),
        }
    }

    /// Apply a set, append, numeric or swap modification. Cancels and
    /// unaffections are handled by the pipeline.
    pub fn apply_to<V: ValueSet>(
        &self,
        values: &mut V,
        ctx: &EvalContext,
        state: &GameState,
    ) -> Result<(), EngineError> {
        if !self.condition_holds(ctx, state)? {
            return Ok(());
        }
        match &self.kind {
            ModificationKind::Set { key, value } => {
                let value = value.resolve(ctx, state)?;
                if !value.is_empty() {
                    values.write(*key, &value);
                }
            }
            ModificationKind::Append { key, values: appended } => {
                let Some(mut current) = values.read(*key) else {
                    return Ok(());
                };
                for value in appended.resolve(ctx, state)? {
                    if !current.iter().any(|v| v.same_as(&value)) {
                        current.push(value);
                    }
                }
                values.write(*key, &current);
            }
            ModificationKind::NumericChange { key, amount } => {
                let delta: i64 = numbers(&amount.resolve(ctx, state)?).iter().sum();
                let changed = map_numbers(values.read(*key), |n| (n + delta).max(0));
                if let Some(changed) = changed {
                    values.write(*key, &changed);
                }
            }
            ModificationKind::NumericDivide { key, by } => {
                let Some(divisor) = numbers(&by.resolve(ctx, state)?).first().copied() else {
                    return Ok(());
                };
                if divisor == 0 {
                    return Ok(());
                }
                let changed = map_numbers(values.read(*key), |n| div_ceil(n, divisor));
                if let Some(changed) = changed {
                    values.write(*key, &changed);
                }
            }
            ModificationKind::Swap { key, other } => {
                if key.value_type() != other.value_type() {
                    return Ok(());
                }
                if let (Some(a), Some(b)) = (values.read(*key), values.read(*other)) {
                    values.write(*key, &b);
                    values.write(*other, &a);
                }
            }
            ModificationKind::CancelAbilities { .. } | ModificationKind::Unaffected { .. } => {}
        }
        Ok(())
    }
}

fn map_numbers(values: Option<Vec<ScriptValue>>, f: impl Fn(i64) -> i64) -> Option<Vec<ScriptValue>> {
    let values = values?;
    if values.is_empty() {
        return None;
    }
    Some(
        values
            .into_iter()
            .map(|v| match v {
                ScriptValue::Number(n) => ScriptValue::Number(f(n)),
                other => other,
            })
            .collect(),
    )
}

/// Integer division rounding towards positive infinity.
#[must_use]
pub fn div_ceil(n: i64, d: i64) -> i64 {
    let q = n.div_euclid(d);
    if n.rem_euclid(d) != 0 && d > 0 {
        q + 1
    } else {
        q
    }
}

/// Abilities a cancel targets on `values`, with whether each is cancellable
/// right now (cancellable by definition and not already cancelled).
pub(crate) fn cancel_targets<V: ValueSet>(
    abilities: &Operand,
    values: &V,
    ctx: &EvalContext,
    state: &GameState,
) -> Result<Vec<(AbilityId, bool)>, EngineError> {
    let mut values = values.clone();
    let present: Vec<(AbilityId, bool)> = values
        .abilities_mut()
        .map(|abilities| abilities.iter().map(|a| (a.id, a.cancelled)).collect())
        .unwrap_or_default();
    let requested = abilities.resolve(ctx, state)?;
    let mut targeted = Vec::new();
    for value in requested {
        let ScriptValue::Ability(id) = value else {
            continue;
        };
        let Some((_, cancelled)) = present.iter().find(|(a, _)| *a == id) else {
            continue;
        };
        let cancellable = state.registry.ability(id)?.cancellable;
        targeted.push((id, cancellable && !cancelled));
    }
    Ok(targeted)
}

/// One entry on a modifier stack.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Modifier {
    pub id: ModifierId,
    pub source: ModifierSource,
    pub modifications: Arc<Vec<Modification>>,
    /// Contributed by a static ability; rebuilt on every refresh.
    pub is_static: bool,
}

impl Modifier {
    /// Whether any modification can change the target.
    pub fn can_apply_to<V: ValueSet>(
        &self,
        values: &V,
        target: StatTarget,
        state: &GameState,
    ) -> Result<bool, EngineError> {
        let ctx = self.source.context(target, state);
        for modification in self.modifications.iter() {
            if modification.can_apply_to(values, &ctx, state)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether every modification applies completely to the target.
    pub fn can_fully_apply_to<V: ValueSet>(
        &self,
        values: &V,
        target: StatTarget,
        state: &GameState,
    ) -> Result<bool, EngineError> {
        let ctx = self.source.context(target, state);
        for modification in self.modifications.iter() {
            if !modification.can_fully_apply_to(values, &ctx, state)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_div_ceil() {
        assert_eq!(div_ceil(7, 2), 4);
        assert_eq!(div_ceil(6, 2), 3);
        assert_eq!(div_ceil(0, 3), 0);
        assert_eq!(div_ceil(1, 3), 1);
    }

    #[test]
    fn test_map_numbers_skips_empty() {
        assert!(map_numbers(Some(Vec::new()), |n| n).is_none());
        let mapped = map_numbers(Some(vec![ScriptValue::Number(3)]), |n| n * 2).unwrap();
        assert_eq!(numbers(&mapped), vec![6]);
    }

    #[test]
    fn test_modification_keys() {
        let cancel = Modification::new(ModificationKind::CancelAbilities {
            abilities: Operand::Baked(Vec::new()),
        });
        assert_eq!(cancel.key(), ValueKey::Abilities);
        assert!(cancel.is_preliminary());

        let swap = Modification::new(ModificationKind::Swap {
            key: ValueKey::Attack,
            other: ValueKey::Defense,
        });
        assert_eq!(swap.key(), ValueKey::Attack);
        assert!(!swap.is_preliminary());
    }
}
