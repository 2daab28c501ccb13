//! Requests to players and their responses.
//!
//! Whenever the engine needs a decision it hands a batch of `Request`s to
//! the driver and blocks until one `Response` comes back. The response must
//! answer one request of the batch, and must be structurally valid for it:
//!
//! ```
//! use cu_rules::core::PlayerId;
//! use cu_rules::io::request::{ChoiceReason, Request, RequestKind, Response};
//!
//! let request = Request::new(
//!     PlayerId::new(0),
//!     RequestKind::ChooseType {
//!         types: vec!["Fire".into(), "Ice".into()],
//!         reason: ChoiceReason::Effect(None),
//!     },
//! );
//! assert!(Response::ChooseType(1).validate_against(&request, None).is_ok());
//! assert!(Response::ChooseType(2).validate_against(&request, None).is_err());
//! ```
//!
//! ## Enumeration
//!
//! `valid_responses` lists every structurally valid answer to a request, so
//! automated players can iterate their options.

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityId;
use crate::core::{CardRef, GameState, PlayerId, ResponseError};
use crate::zones::{ZoneKind, ZoneRef};

/// Why a player is asked to choose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceReason {
    /// An ability's SELECT, ORDER and similar functions.
    Effect(Option<AbilityId>),
    /// MOVE found fewer free slots than cards.
    EffectMove(Option<AbilityId>),
    AttackTarget,
    EquipTarget,
    HandLimit,
}

/// An ability a player may activate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityOption {
    pub card: CardRef,
    pub ability: AbilityId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    /// `valid_amounts` empty means any amount from 1 to the number of cards.
    ChooseCards {
        cards: Vec<CardRef>,
        valid_amounts: Vec<usize>,
        reason: ChoiceReason,
    },
    ChoosePlayer {
        reason: ChoiceReason,
    },
    ChooseType {
        types: Vec<String>,
        reason: ChoiceReason,
    },
    ChooseZoneSlot {
        zone: ZoneRef,
        slots: Vec<usize>,
    },
    ChooseAbilityOrder {
        card: CardRef,
        abilities: Vec<AbilityId>,
    },
    OrderCards {
        cards: Vec<CardRef>,
        reason: ChoiceReason,
    },
    Pass,
    DoStandardDraw,
    DoStandardSummon {
        eligible: Vec<CardRef>,
    },
    DeployItem {
        eligible: Vec<CardRef>,
    },
    CastSpell {
        eligible: Vec<CardRef>,
    },
    DoAttackDeclaration {
        eligible: Vec<CardRef>,
    },
    DoFight,
    DoRetire {
        eligible: Vec<CardRef>,
    },
    EnterBattlePhase,
    ActivateOptionalAbility {
        eligible: Vec<AbilityOption>,
    },
    ActivateFastAbility {
        eligible: Vec<AbilityOption>,
    },
    ActivateTriggerAbility {
        eligible: Vec<AbilityOption>,
    },
}

impl RequestKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ChooseCards { .. } => "chooseCards",
            Self::ChoosePlayer { .. } => "choosePlayer",
            Self::ChooseType { .. } => "chooseType",
            Self::ChooseZoneSlot { .. } => "chooseZoneSlot",
            Self::ChooseAbilityOrder { .. } => "chooseAbilityOrder",
            Self::OrderCards { .. } => "orderCards",
            Self::Pass => "pass",
            Self::DoStandardDraw => "doStandardDraw",
            Self::DoStandardSummon { .. } => "doStandardSummon",
            Self::DeployItem { .. } => "deployItem",
            Self::CastSpell { .. } => "castSpell",
            Self::DoAttackDeclaration { .. } => "doAttackDeclaration",
            Self::DoFight => "doFight",
            Self::DoRetire { .. } => "doRetire",
            Self::EnterBattlePhase => "enterBattlePhase",
            Self::ActivateOptionalAbility { .. } => "activateOptionalAbility",
            Self::ActivateFastAbility { .. } => "activateFastAbility",
            Self::ActivateTriggerAbility { .. } => "activateTriggerAbility",
        }
    }
}

/// A decision the engine is waiting for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub player: PlayerId,
    pub kind: RequestKind,
}

impl Request {
    #[must_use]
    pub const fn new(player: PlayerId, kind: RequestKind) -> Self {
        Self { player, kind }
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} for {}", self.kind.as_str(), self.player)
    }
}

/// A player's answer. Indices refer to the option lists of the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    ChooseCards(Vec<usize>),
    ChoosePlayer(PlayerId),
    ChooseType(usize),
    ChooseZoneSlot(usize),
    ChooseAbilityOrder(Vec<usize>),
    OrderCards(Vec<usize>),
    Pass,
    DoStandardDraw,
    DoStandardSummon(usize),
    DeployItem(usize),
    CastSpell(usize),
    DoAttackDeclaration(Vec<usize>),
    DoFight,
    DoRetire(Vec<usize>),
    /// Whether to enter the battle phase.
    EnterBattlePhase(bool),
    ActivateOptionalAbility(usize),
    ActivateFastAbility(usize),
    ActivateTriggerAbility(usize),
}

impl Response {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ChooseCards(_) => "chooseCards",
            Self::ChoosePlayer(_) => "choosePlayer",
            Self::ChooseType(_) => "chooseType",
            Self::ChooseZoneSlot(_) => "chooseZoneSlot",
            Self::ChooseAbilityOrder(_) => "chooseAbilityOrder",
            Self::OrderCards(_) => "orderCards",
            Self::Pass => "pass",
            Self::DoStandardDraw => "doStandardDraw",
            Self::DoStandardSummon(_) => "doStandardSummon",
            Self::DeployItem(_) => "deployItem",
            Self::CastSpell(_) => "castSpell",
            Self::DoAttackDeclaration(_) => "doAttackDeclaration",
            Self::DoFight => "doFight",
            Self::DoRetire(_) => "doRetire",
            Self::EnterBattlePhase(_) => "enterBattlePhase",
            Self::ActivateOptionalAbility(_) => "activateOptionalAbility",
            Self::ActivateFastAbility(_) => "activateFastAbility",
            Self::ActivateTriggerAbility(_) => "activateTriggerAbility",
        }
    }

    fn unexpected(&self, expected: &str) -> ResponseError {
        ResponseError::UnexpectedType {
            found: self.as_str().to_string(),
            expected: expected.to_string(),
        }
    }

    pub fn into_indices(self) -> Result<Vec<usize>, ResponseError> {
        match self {
            Self::ChooseCards(indices) => Ok(indices),
            other => Err(other.unexpected("chooseCards")),
        }
    }

    pub fn into_order(self) -> Result<Vec<usize>, ResponseError> {
        match self {
            Self::OrderCards(order) | Self::ChooseAbilityOrder(order) => Ok(order),
            other => Err(other.unexpected("orderCards")),
        }
    }

    pub fn into_player(self) -> Result<PlayerId, ResponseError> {
        match self {
            Self::ChoosePlayer(player) => Ok(player),
            other => Err(other.unexpected("choosePlayer")),
        }
    }

    pub fn into_index(self) -> Result<usize, ResponseError> {
        match self {
            Self::ChooseType(index) | Self::ChooseZoneSlot(index) => Ok(index),
            other => Err(other.unexpected("chooseType")),
        }
    }

    /// Find the request this response answers and check it against it.
    ///
    /// `state` is needed to judge combined attacks; without it they are
    /// only checked for range and duplicates.
    pub fn validate<'a>(
        &self,
        requests: &'a [Request],
        state: Option<&GameState>,
    ) -> Result<&'a Request, ResponseError> {
        let request = requests
            .iter()
            .find(|r| r.kind.as_str() == self.as_str())
            .ok_or_else(|| ResponseError::UnexpectedType {
                found: self.as_str().to_string(),
                expected: requests
                    .iter()
                    .map(|r| r.kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;
        self.validate_against(request, state)?;
        Ok(request)
    }

    /// Check this response against one request.
    pub fn validate_against(
        &self,
        request: &Request,
        state: Option<&GameState>,
    ) -> Result<(), ResponseError> {
        match (&request.kind, self) {
            (
                RequestKind::ChooseCards {
                    cards,
                    valid_amounts,
                    ..
                },
                Self::ChooseCards(indices),
            ) => {
                check_indices(indices, cards.len())?;
                let amount_ok = if valid_amounts.is_empty() {
                    !indices.is_empty() && indices.len() <= cards.len()
                } else {
                    valid_amounts.contains(&indices.len())
                };
                if amount_ok {
                    Ok(())
                } else {
                    Err(ResponseError::InvalidAmount {
                        chosen: indices.len(),
                        valid: valid_amounts.clone(),
                    })
                }
            }
            (RequestKind::ChoosePlayer { .. }, Self::ChoosePlayer(player)) => {
                check_index(player.index(), crate::core::PLAYER_COUNT)
            }
            (RequestKind::ChooseType { types, .. }, Self::ChooseType(index)) => {
                check_index(*index, types.len())
            }
            (RequestKind::ChooseZoneSlot { slots, .. }, Self::ChooseZoneSlot(index)) => {
                check_index(*index, slots.len())
            }
            (RequestKind::ChooseAbilityOrder { abilities, .. }, Self::ChooseAbilityOrder(order)) => {
                check_permutation(order, abilities.len())
            }
            (RequestKind::OrderCards { cards, .. }, Self::OrderCards(order)) => {
                check_permutation(order, cards.len())
            }
            (RequestKind::Pass, Self::Pass)
            | (RequestKind::DoStandardDraw, Self::DoStandardDraw)
            | (RequestKind::DoFight, Self::DoFight)
            | (RequestKind::EnterBattlePhase, Self::EnterBattlePhase(_)) => Ok(()),
            (RequestKind::DoStandardSummon { eligible }, Self::DoStandardSummon(index))
            | (RequestKind::DeployItem { eligible }, Self::DeployItem(index))
            | (RequestKind::CastSpell { eligible }, Self::CastSpell(index)) => {
                check_index(*index, eligible.len())
            }
            (RequestKind::DoAttackDeclaration { eligible }, Self::DoAttackDeclaration(indices)) => {
                if indices.is_empty() {
                    return Err(ResponseError::NoAttackers);
                }
                check_indices(indices, eligible.len())?;
                match state {
                    Some(state) if indices.len() > 1 => {
                        let attackers: Vec<CardRef> =
                            indices.iter().map(|&i| eligible[i]).collect();
                        check_combined_attack(&attackers, state)
                    }
                    _ => Ok(()),
                }
            }
            (RequestKind::DoRetire { eligible }, Self::DoRetire(indices)) => {
                if indices.is_empty() {
                    return Err(ResponseError::InvalidAmount {
                        chosen: 0,
                        valid: (1..=eligible.len()).collect(),
                    });
                }
                check_indices(indices, eligible.len())
            }
            (RequestKind::ActivateOptionalAbility { eligible }, Self::ActivateOptionalAbility(i))
            | (RequestKind::ActivateFastAbility { eligible }, Self::ActivateFastAbility(i))
            | (RequestKind::ActivateTriggerAbility { eligible }, Self::ActivateTriggerAbility(i)) => {
                check_index(*i, eligible.len())
            }
            (kind, response) => Err(response.unexpected(kind.as_str())),
        }
    }
}

fn check_index(index: usize, len: usize) -> Result<(), ResponseError> {
    if index < len {
        Ok(())
    } else {
        Err(ResponseError::IndexOutOfRange { index, len })
    }
}

fn check_indices(indices: &[usize], len: usize) -> Result<(), ResponseError> {
    for (position, &index) in indices.iter().enumerate() {
        check_index(index, len)?;
        if indices[..position].contains(&index) {
            return Err(ResponseError::DuplicateIndex(index));
        }
    }
    Ok(())
}

fn check_permutation(order: &[usize], len: usize) -> Result<(), ResponseError> {
    if order.len() != len || check_indices(order, len).is_err() {
        return Err(ResponseError::NotAPermutation { len });
    }
    Ok(())
}

/// More than one attacker needs exactly one partner, and every other
/// attacker must share a type with it.
pub fn check_combined_attack(attackers: &[CardRef], state: &GameState) -> Result<(), ResponseError> {
    if attackers.len() < 2 {
        return Ok(());
    }
    let mut partners = Vec::new();
    let mut others = Vec::new();
    for attacker in attackers {
        let Ok(card) = state.card(attacker.id) else {
            continue;
        };
        if card.zone_kind() == Some(ZoneKind::Partner) {
            partners.push(card);
        } else {
            others.push(card);
        }
    }
    let [partner] = partners.as_slice() else {
        return Err(ResponseError::CombinedAttackWithoutPartner);
    };
    let partner_types = &partner.values.current.types;
    for other in others {
        if !other
            .values
            .current
            .types
            .iter()
            .any(|t| partner_types.contains(t))
        {
            return Err(ResponseError::CombinedAttackTypeMismatch);
        }
    }
    Ok(())
}

/// Every `k`-element subset of `0..n`, in lexicographic order.
///
/// ```
/// use cu_rules::io::request::combinations;
///
/// assert_eq!(combinations(3, 2), vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
/// assert_eq!(combinations(2, 3), Vec::<Vec<usize>>::new());
/// ```
#[must_use]
pub fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut result = Vec::new();
    if k > n {
        return result;
    }
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        result.push(current.clone());
        // rightmost position that can still advance
        let Some(i) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            return result;
        };
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, n: usize, out: &mut Vec<Vec<usize>>) {
        if prefix.len() == n {
            out.push(prefix.clone());
            return;
        }
        for i in 0..n {
            if !prefix.contains(&i) {
                prefix.push(i);
                extend(prefix, n, out);
                prefix.pop();
            }
        }
    }
    let mut out = Vec::new();
    extend(&mut Vec::with_capacity(n), n, &mut out);
    out
}

/// Every structurally valid response to `request`.
///
/// With a state, combined attacks that break the partner rule are left out.
#[must_use]
pub fn valid_responses(request: &Request, state: Option<&GameState>) -> Vec<Response> {
    match &request.kind {
        RequestKind::ChooseCards {
            cards,
            valid_amounts,
            ..
        } => {
            let amounts: Vec<usize> = if valid_amounts.is_empty() {
                (1..=cards.len()).collect()
            } else {
                valid_amounts.clone()
            };
            amounts
                .into_iter()
                .flat_map(|k| combinations(cards.len(), k))
                .map(Response::ChooseCards)
                .collect()
        }
        RequestKind::ChoosePlayer { .. } => PlayerId::all().map(Response::ChoosePlayer).collect(),
        RequestKind::ChooseType { types, .. } => {
            (0..types.len()).map(Response::ChooseType).collect()
        }
        RequestKind::ChooseZoneSlot { slots, .. } => {
            (0..slots.len()).map(Response::ChooseZoneSlot).collect()
        }
        RequestKind::ChooseAbilityOrder { abilities, .. } => permutations(abilities.len())
            .into_iter()
            .map(Response::ChooseAbilityOrder)
            .collect(),
        RequestKind::OrderCards { cards, .. } => permutations(cards.len())
            .into_iter()
            .map(Response::OrderCards)
            .collect(),
        RequestKind::Pass => vec![Response::Pass],
        RequestKind::DoStandardDraw => vec![Response::DoStandardDraw],
        RequestKind::DoFight => vec![Response::DoFight],
        RequestKind::EnterBattlePhase => vec![
            Response::EnterBattlePhase(true),
            Response::EnterBattlePhase(false),
        ],
        RequestKind::DoStandardSummon { eligible } => {
            (0..eligible.len()).map(Response::DoStandardSummon).collect()
        }
        RequestKind::DeployItem { eligible } => {
            (0..eligible.len()).map(Response::DeployItem).collect()
        }
        RequestKind::CastSpell { eligible } => {
            (0..eligible.len()).map(Response::CastSpell).collect()
        }
        RequestKind::DoAttackDeclaration { eligible } => (1..=eligible.len())
            .flat_map(|k| combinations(eligible.len(), k))
            .map(Response::DoAttackDeclaration)
            .filter(|response| response.validate_against(request, state).is_ok())
            .collect(),
        RequestKind::DoRetire { eligible } => (1..=eligible.len())
            .flat_map(|k| combinations(eligible.len(), k))
            .map(Response::DoRetire)
            .collect(),
        RequestKind::ActivateOptionalAbility { eligible } => (0..eligible.len())
            .map(Response::ActivateOptionalAbility)
            .collect(),
        RequestKind::ActivateFastAbility { eligible } => {
            (0..eligible.len()).map(Response::ActivateFastAbility).collect()
        }
        RequestKind::ActivateTriggerAbility { eligible } => (0..eligible.len())
            .map(Response::ActivateTriggerAbility)
            .collect(),
    }
}
