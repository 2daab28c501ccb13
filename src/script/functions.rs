//! The built-in function library.
//!
//! Every function declares its parameter slots and three operations:
//!
//! - `run`: evaluate the call. Functions that change the game produce
//!   `Output::Actions`; the caller hands those to a timing.
//! - `has_targets`: whether the call could do anything in the current state.
//!   Checked before an ability is offered or its cost is paid.
//! - `eval_full`: every value the call could produce, for functions whose
//!   outcomes can be listed. Others report `NotYetSupported`.
//!
//! Player choices go through the `ScriptHost`, so `run` blocks until the
//! choosing player's response arrives.

use std::sync::Arc;

use tracing::trace;

use crate::actions::{Action, ActionKind};
use crate::cards::{CardDefinition, CardId, CardType};
use crate::core::{
    CardRef, Destination, EngineError, EntityId, Flow, GameState, Halt, PlayerId,
};
use crate::io::event::Event;
use crate::io::request::{combinations, ChoiceReason, Request, RequestKind};
use crate::values::{ModifierSource, StatTarget};
use crate::zones::{ZoneKind, ZonePosition, ZoneRef};

use super::ast::{Expr, FunctionCall, PlayerSelector, Until, ValueType, ZoneName};
use super::eval::{eval, eval_full as eval_expr_full, product, EvalError, ScriptHost};
use super::value::{cards, numbers, EvalContext, ScriptCard, ScriptValue};

/// A built-in function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Function {
    Apply,
    CancelAttack,
    Count,
    Damage,
    DeckTop,
    Destroy,
    Different,
    Discard,
    Draw,
    Exile,
    GainLife,
    GainMana,
    GetCounters,
    GiveAttack,
    LoseLife,
    LoseMana,
    Move,
    Order,
    PutCounters,
    RemoveCounters,
    Reveal,
    Select,
    SelectPlayer,
    SelectType,
    SetAttackTarget,
    Shuffle,
    Sum,
    Summon,
    Swap,
    Tokens,
    View,
}

/// Value an omitted argument takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultArg {
    Forever,
    EmptyList,
    /// The executing player's unit zone.
    OwnUnitZone,
    Yes,
    No,
}

impl DefaultArg {
    #[must_use]
    pub fn to_expr(self) -> Expr {
        match self {
            Self::Forever => Expr::Until(Until::Forever),
            Self::EmptyList => Expr::List(Vec::new()),
            Self::OwnUnitZone => Expr::Zone {
                player: Some(PlayerSelector::Own),
                zone: ZoneName::UnitZone,
            },
            Self::Yes => Expr::Bool(true),
            Self::No => Expr::Bool(false),
        }
    }
}

/// One declared parameter slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ValueType,
    pub default: Option<DefaultArg>,
}

impl ParamSpec {
    const fn required(name: &'static str, ty: ValueType) -> Self {
        Self {
            name,
            ty,
            default: None,
        }
    }

    const fn optional(name: &'static str, ty: ValueType, default: DefaultArg) -> Self {
        Self {
            name,
            ty,
            default: Some(default),
        }
    }
}

const CARD: ParamSpec = ParamSpec::required("card", ValueType::Card);
const NUMBER: ParamSpec = ParamSpec::required("number", ValueType::Number);
const ANY: ParamSpec = ParamSpec::required("list", ValueType::Any);
const UNTIL: ParamSpec = ParamSpec::optional("until", ValueType::Until, DefaultArg::Forever);
const COUNTER: ParamSpec = ParamSpec::required("counter", ValueType::Type);

const NO_PARAMS: &[ParamSpec] = &[];
const CARD_ONLY: &[ParamSpec] = &[CARD];
const NUMBER_ONLY: &[ParamSpec] = &[NUMBER];
const ANY_ONLY: &[ParamSpec] = &[ANY];
const APPLY: &[ParamSpec] = &[
    CARD,
    ParamSpec::required("modifier", ValueType::Modifier),
    UNTIL,
];
const EXILE: &[ParamSpec] = &[CARD, UNTIL];
const GET_COUNTERS: &[ParamSpec] = &[CARD, COUNTER];
const CHANGE_COUNTERS: &[ParamSpec] = &[CARD, COUNTER, ParamSpec::required("amount", ValueType::Number)];
const MOVE: &[ParamSpec] = &[CARD, ParamSpec::required("zone", ValueType::Zone)];
const SELECT: &[ParamSpec] = &[ParamSpec::required("amount", ValueType::Number), CARD];
const SELECT_TYPE: &[ParamSpec] = &[ParamSpec::required("types", ValueType::Type)];
const SHUFFLE: &[ParamSpec] = &[ParamSpec::optional(
    "excluded",
    ValueType::Card,
    DefaultArg::EmptyList,
)];
const SUMMON: &[ParamSpec] = &[
    CARD,
    ParamSpec::optional("zone", ValueType::Zone, DefaultArg::OwnUnitZone),
    ParamSpec::optional("payCost", ValueType::Bool, DefaultArg::Yes),
];
const SWAP: &[ParamSpec] = &[
    ParamSpec::required("first", ValueType::Card),
    ParamSpec::required("second", ValueType::Card),
    ParamSpec::optional("transferEquipments", ValueType::Bool, DefaultArg::No),
];
const TOKENS: &[ParamSpec] = &[
    ParamSpec::required("amount", ValueType::Number),
    ParamSpec::required("cardIds", ValueType::Name),
    ParamSpec::required("name", ValueType::Name),
    ParamSpec::required("level", ValueType::Number),
    ParamSpec::required("types", ValueType::Type),
    ParamSpec::required("attack", ValueType::Number),
    ParamSpec::required("defense", ValueType::Number),
];

impl Function {
    pub const ALL: [Function; 31] = [
        Function::Apply,
        Function::CancelAttack,
        Function::Count,
        Function::Damage,
        Function::DeckTop,
        Function::Destroy,
        Function::Different,
        Function::Discard,
        Function::Draw,
        Function::Exile,
        Function::GainLife,
        Function::GainMana,
        Function::GetCounters,
        Function::GiveAttack,
        Function::LoseLife,
        Function::LoseMana,
        Function::Move,
        Function::Order,
        Function::PutCounters,
        Function::RemoveCounters,
        Function::Reveal,
        Function::Select,
        Function::SelectPlayer,
        Function::SelectType,
        Function::SetAttackTarget,
        Function::Shuffle,
        Function::Sum,
        Function::Summon,
        Function::Swap,
        Function::Tokens,
        Function::View,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "APPLY",
            Self::CancelAttack => "CANCELATTACK",
            Self::Count => "COUNT",
            Self::Damage => "DAMAGE",
            Self::DeckTop => "DECKTOP",
            Self::Destroy => "DESTROY",
            Self::Different => "DIFFERENT",
            Self::Discard => "DISCARD",
            Self::Draw => "DRAW",
            Self::Exile => "EXILE",
            Self::GainLife => "GAINLIFE",
            Self::GainMana => "GAINMANA",
            Self::GetCounters => "GETCOUNTERS",
            Self::GiveAttack => "GIVEATTACK",
            Self::LoseLife => "LOSELIFE",
            Self::LoseMana => "LOSEMANA",
            Self::Move => "MOVE",
            Self::Order => "ORDER",
            Self::PutCounters => "PUTCOUNTERS",
            Self::RemoveCounters => "REMOVECOUNTERS",
            Self::Reveal => "REVEAL",
            Self::Select => "SELECT",
            Self::SelectPlayer => "SELECTPLAYER",
            Self::SelectType => "SELECTTYPE",
            Self::SetAttackTarget => "SETATTACKTARGET",
            Self::Shuffle => "SHUFFLE",
            Self::Sum => "SUM",
            Self::Summon => "SUMMON",
            Self::Swap => "SWAP",
            Self::Tokens => "TOKENS",
            Self::View => "VIEW",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    /// Declared parameter slots, in order.
    #[must_use]
    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            Self::Apply => APPLY,
            Self::CancelAttack | Self::SelectPlayer => NO_PARAMS,
            Self::Count | Self::Different => ANY_ONLY,
            Self::Damage
            | Self::DeckTop
            | Self::Draw
            | Self::GainLife
            | Self::GainMana
            | Self::LoseLife
            | Self::LoseMana
            | Self::Sum => NUMBER_ONLY,
            Self::Destroy
            | Self::Discard
            | Self::GiveAttack
            | Self::Order
            | Self::Reveal
            | Self::SetAttackTarget
            | Self::View => CARD_ONLY,
            Self::Exile => EXILE,
            Self::GetCounters => GET_COUNTERS,
            Self::PutCounters | Self::RemoveCounters => CHANGE_COUNTERS,
            Self::Move => MOVE,
            Self::Select => SELECT,
            Self::SelectType => SELECT_TYPE,
            Self::Shuffle => SHUFFLE,
            Self::Summon => SUMMON,
            Self::Swap => SWAP,
            Self::Tokens => TOKENS,
        }
    }

    #[must_use]
    pub const fn return_type(self) -> ValueType {
        match self {
            Self::Count | Self::GetCounters | Self::Sum => ValueType::Number,
            Self::DeckTop | Self::Order | Self::Select | Self::Tokens => ValueType::Card,
            Self::Different => ValueType::Bool,
            Self::SelectPlayer => ValueType::Player,
            Self::SelectType => ValueType::Type,
            _ => ValueType::Action,
        }
    }
}

/// Result of running a function.
#[derive(Clone, Debug)]
pub(crate) enum Output {
    Values(Vec<ScriptValue>),
    /// Actions still to be executed in a timing.
    Actions(Vec<Action>),
}

fn arg(
    call: &FunctionCall,
    slot: usize,
    ctx: &EvalContext,
    host: &mut dyn ScriptHost,
) -> Flow<Vec<ScriptValue>> {
    let expr = slot_expr(call, slot)?;
    eval(expr, ctx, host)
}

fn slot_expr(call: &FunctionCall, slot: usize) -> Result<&Expr, EngineError> {
    call.args.get(slot).ok_or_else(|| {
        EngineError::Invariant(format!(
            "{} has no argument in slot {slot}",
            call.function.as_str()
        ))
    })
}

fn first_number(values: &[ScriptValue]) -> i64 {
    numbers(values).first().copied().unwrap_or(0)
}

fn first_bool(values: &[ScriptValue], default: bool) -> bool {
    values
        .iter()
        .find_map(ScriptValue::as_bool)
        .unwrap_or(default)
}

fn type_names(values: &[ScriptValue]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match v {
            ScriptValue::Type(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn card_ids(values: &[ScriptValue]) -> Vec<CardId> {
    values
        .iter()
        .filter_map(|v| match v {
            ScriptValue::Name(id) => Some(*id),
            _ => None,
        })
        .collect()
}

/// Cards in `values` that are still where the script saw them.
fn current_cards(values: &[ScriptValue], state: &GameState) -> Vec<CardRef> {
    cards(values)
        .iter()
        .filter_map(|card| card.current(state))
        .collect()
}

fn live_values(ids: &[EntityId], state: &GameState) -> Result<Vec<ScriptValue>, EngineError> {
    ids.iter()
        .map(|&id| Ok(ScriptValue::live_card(state.card(id)?.current_ref())))
        .collect()
}

/// Functions that only read the game state.
fn compute(
    function: Function,
    args: &[Vec<ScriptValue>],
    player: PlayerId,
    state: &GameState,
) -> Result<Vec<ScriptValue>, EngineError> {
    let first = args.first().map(Vec::as_slice).unwrap_or_default();
    Ok(match function {
        Function::Count => vec![ScriptValue::Number(first.len() as i64)],
        Function::Sum => vec![ScriptValue::Number(numbers(first).iter().sum())],
        Function::Different => {
            let distinct = first.iter().enumerate().all(|(i, a)| {
                first
                    .iter()
                    .skip(i + 1)
                    .all(|b| !a.same_as(b))
            });
            vec![ScriptValue::Bool(distinct)]
        }
        Function::GetCounters => {
            let counter = args.get(1).map(|v| type_names(v)).unwrap_or_default();
            let Some(counter) = counter.first() else {
                return Ok(vec![ScriptValue::Number(0)]);
            };
            let total = cards(first)
                .iter()
                .filter_map(|card| card.resolve(state))
                .map(|card| card.counter(counter))
                .sum();
            vec![ScriptValue::Number(total)]
        }
        Function::DeckTop => {
            let amount = first_number(first).max(0) as usize;
            live_values(&state.deck_top(player, amount), state)?
        }
        other => {
            return Err(EngineError::Invariant(format!(
                "{} is not a pure function",
                other.as_str()
            )))
        }
    })
}

/// Ask `player` to pick cards out of `options`.
fn choose_cards(
    host: &mut dyn ScriptHost,
    player: PlayerId,
    options: &[CardRef],
    valid_amounts: Vec<usize>,
    reason: ChoiceReason,
) -> Flow<Vec<CardRef>> {
    let request = Request::new(
        player,
        RequestKind::ChooseCards {
            cards: options.to_vec(),
            valid_amounts,
            reason,
        },
    );
    let indices = host.request(request)?.into_indices()?;
    Ok(indices
        .into_iter()
        .filter_map(|i| options.get(i).copied())
        .collect())
}

/// Where a card moved by MOVE lands, given the evaluated zone argument.
///
/// Field zones only accept fitting cards; the first fitting zone wins. Field
/// slots are chosen when the move runs.
fn move_target(
    values: &[ScriptValue],
    card: CardRef,
    state: &GameState,
) -> Result<Option<(ZoneRef, Option<Destination>)>, EngineError> {
    let live = state.card(card.id)?;
    for value in values {
        match value {
            ScriptValue::DeckPosition { player, top } => {
                let position = if *top {
                    ZonePosition::Top
                } else {
                    ZonePosition::Bottom
                };
                return Ok(Some((
                    ZoneRef::new(*player, ZoneKind::Deck),
                    Some(Destination::Pile(position)),
                )));
            }
            ScriptValue::Zone(zone) if zone.kind.is_field() => {
                let current = &live.values.current;
                let fits = match zone.kind {
                    ZoneKind::Unit | ZoneKind::Partner => live.is_unit(),
                    _ => {
                        current.has_card_type(CardType::Spell)
                            || current.has_card_type(CardType::Item)
                    }
                };
                if fits {
                    return Ok(Some((*zone, None)));
                }
            }
            ScriptValue::Zone(zone) => {
                return Ok(Some((*zone, Some(Destination::Pile(ZonePosition::Top)))));
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Run a function call for the executing player in `ctx`.
pub(crate) fn run(
    call: &FunctionCall,
    ctx: &EvalContext,
    host: &mut dyn ScriptHost,
) -> Flow<Output> {
    let player = ctx.player;
    trace!(function = call.function.as_str(), %player, "running function");
    let effect = ChoiceReason::Effect(ctx.ability);

    let output = match call.function {
        Function::Count
        | Function::Sum
        | Function::Different
        | Function::GetCounters
        | Function::DeckTop => {
            let mut args = Vec::with_capacity(call.args.len());
            for slot in 0..call.args.len() {
                args.push(arg(call, slot, ctx, host)?);
            }
            if call.function == Function::DeckTop && call.as_many_as_possible {
                let deck = host.state().zones(player).deck.len() as i64;
                args[0] = vec![ScriptValue::Number(first_number(&args[0]).min(deck))];
            }
            Output::Values(compute(call.function, &args, player, host.state())?)
        }

        Function::Apply => {
            let targets = arg(call, 0, ctx, host)?;
            let modifier = arg(call, 1, ctx, host)?;
            let until = arg(call, 2, ctx, host)?
                .iter()
                .find_map(|v| match v {
                    ScriptValue::Until(until) => Some(*until),
                    _ => None,
                })
                .unwrap_or(Until::Forever);
            let source = ModifierSource::from_context(ctx);
            let state = host.state();
            let mut stat_targets: Vec<StatTarget> = current_cards(&targets, state)
                .into_iter()
                .map(|card| StatTarget::Card(card.id))
                .collect();
            stat_targets.extend(
                targets
                    .iter()
                    .filter_map(ScriptValue::as_player)
                    .map(StatTarget::Player),
            );
            let mut actions = Vec::new();
            for target in stat_targets {
                let bake_ctx = source.context(target, state);
                let mut baked = Vec::new();
                for value in &modifier {
                    let ScriptValue::Modifier(modifications) = value else {
                        continue;
                    };
                    for modification in modifications.iter() {
                        if let Some(m) = modification.bake(&bake_ctx, state)? {
                            baked.push(m);
                        }
                    }
                }
                actions.push(Action::apply_stat_change(
                    player, target, baked, until, source,
                ));
            }
            Output::Actions(actions)
        }

        Function::CancelAttack => Output::Actions(vec![Action::cancel_attack(player)]),

        Function::Damage => {
            let amount = first_number(&arg(call, 0, ctx, host)?);
            Output::Actions(vec![Action::deal_damage(player, amount)])
        }

        Function::Destroy => {
            let targets = current_cards(&arg(call, 0, ctx, host)?, host.state());
            let mut actions: Vec<Action> = targets
                .iter()
                .map(|&card| Action::discard(player, card))
                .collect();
            actions.extend(targets.iter().map(|&card| Action::destroy(player, card)));
            Output::Actions(actions)
        }

        Function::Discard => {
            let targets = current_cards(&arg(call, 0, ctx, host)?, host.state());
            Output::Actions(targets.into_iter().map(|c| Action::discard(player, c)).collect())
        }

        Function::Draw => {
            let mut amount = first_number(&arg(call, 0, ctx, host)?).max(0);
            if call.as_many_as_possible {
                amount = amount.min(host.state().zones(player).deck.len() as i64);
            }
            Output::Actions(vec![Action::draw(player, amount as usize)])
        }

        Function::Exile => {
            let targets = current_cards(&arg(call, 0, ctx, host)?, host.state());
            Output::Actions(targets.into_iter().map(|c| Action::exile(player, c)).collect())
        }

        Function::GainLife | Function::LoseLife => {
            let amount = first_number(&arg(call, 0, ctx, host)?);
            let amount = if call.function == Function::LoseLife {
                -amount
            } else {
                amount
            };
            Output::Actions(vec![Action::change_life(player, amount)])
        }

        Function::GainMana | Function::LoseMana => {
            let amount = first_number(&arg(call, 0, ctx, host)?);
            let amount = if call.function == Function::LoseMana {
                -amount
            } else {
                amount
            };
            Output::Actions(vec![Action::change_mana(player, amount)])
        }

        Function::GiveAttack => {
            let targets = current_cards(&arg(call, 0, ctx, host)?, host.state());
            Output::Actions(
                targets
                    .first()
                    .map(|&card| Action::give_attack(player, card))
                    .into_iter()
                    .collect(),
            )
        }

        Function::Move => {
            let targets = cards(&arg(call, 0, ctx, host)?);
            let mut moves: Vec<(CardRef, ZoneRef, Option<Destination>)> = Vec::new();
            for card in targets {
                let Some(current) = card.current(host.state()) else {
                    continue;
                };
                let zone_ctx = ctx.with_implicit_card(ScriptCard::live(current));
                let zone_values = arg(call, 1, &zone_ctx, host)?;
                if let Some((zone, destination)) = move_target(&zone_values, current, host.state())? {
                    moves.push((current, zone, destination));
                }
            }

            let mut field_zones: Vec<ZoneRef> = Vec::new();
            for (_, zone, _) in &moves {
                if zone.kind.is_field() && !field_zones.contains(zone) {
                    field_zones.push(*zone);
                }
            }
            for zone in field_zones {
                let moving: Vec<CardRef> = moves
                    .iter()
                    .filter(|(_, z, _)| *z == zone)
                    .map(|(card, _, _)| *card)
                    .collect();
                let free = host
                    .state()
                    .zones(zone.player)
                    .field(zone.kind)
                    .map_or(0, |field| field.free_slots().len());
                if free < moving.len() {
                    let kept = choose_cards(
                        host,
                        player,
                        &moving,
                        vec![free],
                        ChoiceReason::EffectMove(ctx.ability),
                    )?;
                    moves.retain(|(card, z, _)| *z != zone || kept.contains(card));
                }
            }
            Output::Actions(
                moves
                    .into_iter()
                    .map(|(card, zone, destination)| Action::move_card(player, card, zone, destination))
                    .collect(),
            )
        }

        Function::Order => {
            let to_order = current_cards(&arg(call, 0, ctx, host)?, host.state());
            let request = Request::new(
                player,
                RequestKind::OrderCards {
                    cards: to_order.clone(),
                    reason: effect,
                },
            );
            let order = host.request(request)?.into_order()?;
            Output::Values(
                order
                    .into_iter()
                    .filter_map(|i| to_order.get(i).copied())
                    .map(ScriptValue::live_card)
                    .collect(),
            )
        }

        Function::PutCounters | Function::RemoveCounters => {
            let targets = current_cards(&arg(call, 0, ctx, host)?, host.state());
            let counter = type_names(&arg(call, 1, ctx, host)?);
            let amount = first_number(&arg(call, 2, ctx, host)?);
            let amount = if call.function == Function::RemoveCounters {
                -amount
            } else {
                amount
            };
            let Some(counter) = counter.into_iter().next() else {
                return Ok(Output::Actions(Vec::new()));
            };
            Output::Actions(
                targets
                    .into_iter()
                    .map(|card| Action::change_counters(player, card, counter.clone(), amount))
                    .collect(),
            )
        }

        Function::Reveal => {
            let targets = current_cards(&arg(call, 0, ctx, host)?, host.state());
            Output::Actions(targets.into_iter().map(|c| Action::reveal(player, c)).collect())
        }

        Function::Select => {
            let amounts = arg(call, 0, ctx, host)?;
            let eligible = current_cards(&arg(call, 1, ctx, host)?, host.state());
            if eligible.is_empty() {
                return Ok(Output::Values(Vec::new()));
            }
            let amounts: Vec<usize> = numbers(&amounts)
                .into_iter()
                .filter(|&n| n >= 0)
                .map(|n| n as usize)
                .collect();

            // The chooser sees their own cards and open zones. Cards in an
            // opponent's hand or deck are picked blind.
            let mut visibility: Vec<(EntityId, bool)> = Vec::new();
            for card in &eligible {
                let live = host.state().card(card.id)?;
                let blind = live.owner != player
                    && matches!(live.zone_kind(), Some(ZoneKind::Deck | ZoneKind::Hand));
                let was_hidden = live.is_hidden_from(player);
                if was_hidden != blind {
                    visibility.push((card.id, was_hidden));
                    host.set_hidden(card.id, player, blind)?;
                }
            }
            let chosen = choose_cards(host, player, &eligible, amounts, effect);
            for (card, was_hidden) in visibility {
                host.set_hidden(card, player, was_hidden)?;
            }
            let chosen = chosen?;
            host.emit(Event::CardsSelected {
                player,
                cards: chosen.clone(),
            });
            Output::Values(chosen.into_iter().map(ScriptValue::live_card).collect())
        }

        Function::SelectPlayer => {
            let request = Request::new(player, RequestKind::ChoosePlayer { reason: effect });
            let chosen = host.request(request)?.into_player()?;
            host.emit(Event::PlayerSelected { player, chosen });
            Output::Values(vec![ScriptValue::Player(chosen)])
        }

        Function::SelectType => {
            let mut types = type_names(&arg(call, 0, ctx, host)?);
            types.dedup();
            let request = Request::new(
                player,
                RequestKind::ChooseType {
                    types: types.clone(),
                    reason: effect,
                },
            );
            let index = host.request(request)?.into_index()?;
            let Some(chosen) = types.get(index).cloned() else {
                return Ok(Output::Values(Vec::new()));
            };
            host.emit(Event::TypeSelected {
                player,
                chosen: chosen.clone(),
            });
            Output::Values(vec![ScriptValue::Type(chosen)])
        }

        Function::SetAttackTarget => {
            let targets = current_cards(&arg(call, 0, ctx, host)?, host.state());
            Output::Actions(
                targets
                    .first()
                    .map(|&card| Action::set_attack_target(player, card))
                    .into_iter()
                    .collect(),
            )
        }

        Function::Shuffle => Output::Actions(vec![Action::shuffle(player)]),

        Function::Summon => summon(call, ctx, host)?,

        Function::Swap => {
            let first = current_cards(&arg(call, 0, ctx, host)?, host.state());
            let second = current_cards(&arg(call, 1, ctx, host)?, host.state());
            let transfer = first_bool(&arg(call, 2, ctx, host)?, false);
            match (first.first(), second.first()) {
                (Some(&a), Some(&b)) => {
                    Output::Actions(vec![Action::swap(player, a, b, transfer)])
                }
                _ => Output::Actions(Vec::new()),
            }
        }

        Function::Tokens => tokens(call, ctx, host)?,

        Function::View => {
            let targets = current_cards(&arg(call, 0, ctx, host)?, host.state());
            Output::Actions(targets.into_iter().map(|c| Action::view(player, c)).collect())
        }
    };
    Ok(output)
}

/// Place the cards and pay their levels in one cost timing, then summon
/// whatever got placed.
fn summon(call: &FunctionCall, ctx: &EvalContext, host: &mut dyn ScriptHost) -> Flow<Output> {
    let player = ctx.player;
    let targets = arg(call, 0, ctx, host)?;
    let zone_values = arg(call, 1, ctx, host)?;
    let pay = first_bool(&arg(call, 2, ctx, host)?, true);

    let zone = zone_values.iter().find_map(|v| match v {
        ScriptValue::Zone(zone) if zone.kind.is_field() => Some(*zone),
        _ => None,
    });
    let Some(zone) = zone else {
        return Ok(Output::Actions(Vec::new()));
    };

    let state = host.state();
    let free = state
        .zones(zone.player)
        .field(zone.kind)
        .map_or(0, |field| field.free_slots().len());
    let mut costs = Vec::new();
    let mut mana = 0;
    for card in current_cards(&targets, state).into_iter().take(free) {
        costs.push(Action::place(player, card, zone));
        if pay {
            mana += state.card(card.id)?.values.current.level.max(0);
        }
    }
    if costs.is_empty() {
        return Ok(Output::Actions(Vec::new()));
    }
    if mana > 0 {
        costs.push(Action::change_mana(player, -mana));
    }

    let Some(paid) = host.run_cost_timing(costs)? else {
        return Ok(Output::Actions(Vec::new()));
    };
    Ok(Output::Actions(
        paid.iter()
            .filter_map(|action| match &action.kind {
                ActionKind::Place { card, .. } => Some(Action::summon(player, *card)),
                _ => None,
            })
            .collect(),
    ))
}

/// Create token cards outside of any zone. They exist once created, so the
/// creation runs as its own timing right away.
fn tokens(call: &FunctionCall, ctx: &EvalContext, host: &mut dyn ScriptHost) -> Flow<Output> {
    let player = ctx.player;
    let amount = first_number(&arg(call, 0, ctx, host)?).max(0) as usize;
    let variants = card_ids(&arg(call, 1, ctx, host)?);
    let name = card_ids(&arg(call, 2, ctx, host)?).first().copied();
    let level = first_number(&arg(call, 3, ctx, host)?);
    let types = type_names(&arg(call, 4, ctx, host)?);
    let attack = first_number(&arg(call, 5, ctx, host)?);
    let defense = first_number(&arg(call, 6, ctx, host)?);
    if variants.is_empty() || amount == 0 {
        return Ok(Output::Values(Vec::new()));
    }

    let creations = variants
        .iter()
        .cycle()
        .take(amount)
        .map(|&id| {
            let mut definition = CardDefinition::new(id, CardType::Token)
                .with_level(level)
                .with_types(types.iter().cloned())
                .with_stats(attack, defense);
            if let Some(name) = name {
                definition = definition.with_name(name);
            }
            Action::create_token(player, Arc::new(definition))
        })
        .collect();
    let created = host.execute(creations)?.ok_or(Halt::Stopped)?;
    Ok(Output::Values(
        created
            .iter()
            .filter_map(|action| match &action.kind {
                ActionKind::CreateToken {
                    created: Some(card),
                    ..
                } => Some(ScriptValue::live_card(*card)),
                _ => None,
            })
            .collect(),
    ))
}

/// Every possible value of one argument, or `None` if it cannot be listed.
fn arg_options(
    call: &FunctionCall,
    slot: usize,
    ctx: &EvalContext,
    state: &GameState,
) -> Result<Option<Vec<Vec<ScriptValue>>>, EngineError> {
    match eval_expr_full(slot_expr(call, slot)?, ctx, state) {
        Ok(options) => Ok(Some(options)),
        Err(EvalError::Engine(err)) => Err(err),
        Err(_) => Ok(None),
    }
}

/// Whether the call has enough targets to do something. Arguments that
/// cannot be enumerated count as having targets.
pub(crate) fn has_targets(
    call: &FunctionCall,
    ctx: &EvalContext,
    state: &GameState,
) -> Result<bool, EngineError> {
    let player = ctx.player;
    let any_card = |slot: usize| -> Result<bool, EngineError> {
        Ok(match arg_options(call, slot, ctx, state)? {
            Some(options) => options.iter().any(|option| !cards(option).is_empty()),
            None => true,
        })
    };
    let deck = state.zones(player).deck.len();

    Ok(match call.function {
        Function::Apply
        | Function::Destroy
        | Function::Discard
        | Function::Exile
        | Function::GiveAttack
        | Function::Move
        | Function::PutCounters
        | Function::RemoveCounters
        | Function::Reveal
        | Function::SetAttackTarget
        | Function::Summon
        | Function::View => any_card(0)?,
        Function::Swap => any_card(0)? && any_card(1)?,
        Function::CancelAttack => state.attack.is_some(),
        Function::DeckTop if call.as_many_as_possible => deck > 0,
        Function::DeckTop => match arg_options(call, 0, ctx, state)? {
            Some(options) => options
                .iter()
                .any(|amount| numbers(amount).first().is_some_and(|&n| deck as i64 >= n)),
            None => true,
        },
        Function::Select => {
            match (
                arg_options(call, 0, ctx, state)?,
                arg_options(call, 1, ctx, state)?,
            ) {
                (Some(amounts), Some(choices)) => amounts.iter().any(|amount| {
                    let amount = numbers(amount);
                    choices.iter().any(|choice| {
                        let available = current_cards(choice, state).len() as i64;
                        match amount.iter().min() {
                            None => available > 0,
                            Some(&least) => least <= available,
                        }
                    })
                }),
                _ => true,
            }
        }
        Function::Shuffle => match arg_options(call, 0, ctx, state)? {
            Some(options) => {
                let least = options.iter().map(|o| cards(o).len()).min().unwrap_or(0);
                deck > least
            }
            None => true,
        },
        _ => true,
    })
}

/// Upper bound on the selections SELECT enumerates.
const MAX_SELECT_OPTIONS: u64 = 4096;

fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u64, |acc, i| acc.saturating_mul(n - i) / (i + 1))
}

/// Every value the call could produce.
pub(crate) fn eval_full(
    call: &FunctionCall,
    ctx: &EvalContext,
    state: &GameState,
) -> Result<Vec<Vec<ScriptValue>>, EvalError> {
    let player = ctx.player;
    let unsupported = || EvalError::NotYetSupported {
        function: call.function.as_str(),
    };
    let options = |slot: usize| -> Result<Vec<Vec<ScriptValue>>, EvalError> {
        let expr = slot_expr(call, slot)?;
        eval_expr_full(expr, ctx, state)
    };

    match call.function {
        Function::Count
        | Function::Sum
        | Function::Different
        | Function::GetCounters
        | Function::DeckTop => {
            let mut per_slot = Vec::with_capacity(call.args.len());
            for slot in 0..call.args.len() {
                per_slot.push(options(slot)?);
            }
            let mut results = Vec::new();
            for combination in product(&per_slot) {
                results.push(compute(call.function, &combination, player, state)?);
            }
            Ok(results)
        }

        Function::Select => {
            let amounts = options(0)?.into_iter().next().unwrap_or_default();
            let eligible = current_cards(&options(1)?.into_iter().next().unwrap_or_default(), state);
            if eligible.is_empty() {
                return Ok(vec![Vec::new()]);
            }
            let amounts: Vec<usize> = match numbers(&amounts) {
                any if any.is_empty() => (1..=eligible.len()).collect(),
                listed => listed
                    .into_iter()
                    .filter(|&n| n >= 0 && n as usize <= eligible.len())
                    .map(|n| n as usize)
                    .collect(),
            };
            let total: u64 = amounts
                .iter()
                .map(|&k| binomial(eligible.len() as u64, k as u64))
                .sum();
            if total > MAX_SELECT_OPTIONS {
                return Err(EvalError::TooManyOptions {
                    function: call.function.as_str(),
                });
            }
            Ok(amounts
                .into_iter()
                .flat_map(|k| combinations(eligible.len(), k))
                .map(|picked| {
                    picked
                        .into_iter()
                        .map(|i| ScriptValue::live_card(eligible[i]))
                        .collect()
                })
                .collect())
        }

        Function::SelectPlayer => Ok(PlayerId::all()
            .map(|p| vec![ScriptValue::Player(p)])
            .collect()),

        Function::SelectType => {
            let mut types: Vec<String> = Vec::new();
            for option in options(0)? {
                for name in type_names(&option) {
                    if !types.contains(&name) {
                        types.push(name);
                    }
                }
            }
            Ok(types.into_iter().map(|t| vec![ScriptValue::Type(t)]).collect())
        }

        // the order does not change which cards there are
        Function::Order => options(0),

        Function::Discard
        | Function::Destroy
        | Function::Exile
        | Function::Reveal
        | Function::View => Ok(options(0)?
            .into_iter()
            .map(|option| {
                let targets = current_cards(&option, state);
                let mut actions: Vec<Action> = targets
                    .iter()
                    .map(|&card| match call.function {
                        Function::Exile => Action::exile(player, card),
                        Function::Reveal => Action::reveal(player, card),
                        Function::View => Action::view(player, card),
                        _ => Action::discard(player, card),
                    })
                    .collect();
                if call.function == Function::Destroy {
                    actions.extend(targets.iter().map(|&card| Action::destroy(player, card)));
                }
                actions
                    .into_iter()
                    .map(|a| ScriptValue::Action(Box::new(a)))
                    .collect()
            })
            .collect()),

        Function::Move => {
            let zone_expr = slot_expr(call, 1)?;
            let mut results = Vec::new();
            for option in options(0)? {
                let mut actions = Vec::new();
                for card in current_cards(&option, state) {
                    let zone_ctx = ctx.with_implicit_card(ScriptCard::live(card));
                    let zones = eval_expr_full(zone_expr, &zone_ctx, state)?
                        .into_iter()
                        .next()
                        .unwrap_or_default();
                    if let Some((zone, destination)) = move_target(&zones, card, state)? {
                        actions.push(ScriptValue::Action(Box::new(Action::move_card(
                            player,
                            card,
                            zone,
                            destination,
                        ))));
                    }
                }
                results.push(actions);
            }
            Ok(results)
        }

        _ => Err(unsupported()),
    }
}
