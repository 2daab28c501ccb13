//! Expression and script evaluation.
//!
//! `eval` walks an expression against a `ScriptHost`. Pure reads go through
//! `host.state()`; anything that needs a player decision or changes the
//! game goes through the host's request and execute methods, which the game
//! implements by blocking on its driver. `evaluate` runs against a
//! `PureHost` that refuses both, for conditions and modifier operands.
//!
//! `eval_full` lists every value an expression could take without asking
//! anyone. `has_all_targets` uses it to decide whether an ability could do
//! anything before its cost is paid.

use std::sync::Arc;

use tracing::trace;

use crate::actions::Action;
use crate::core::{EngineError, EntityId, Flow, GameState, Halt, PlayerId, ScriptError};
use crate::io::event::Event;
use crate::io::request::{Request, Response};
use crate::values::ValueSet;
use crate::zones::{ZoneKind, ZoneRef};

use super::ast::{
    AccessorScope, BinaryOp, CardMatcher, Expr, FunctionCall, PlayerSelector, Property, Script,
    Statement, UnaryOp,
};
use super::functions::{self, Output};
use super::value::{numbers, truthy, EvalContext, ScriptCard, ScriptValue};

/// Why `eval_full` could not list an expression's values.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("{function} cannot enumerate its results")]
    NotYetSupported { function: &'static str },

    #[error("{function} has too many possible results to enumerate")]
    TooManyOptions { function: &'static str },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// What script evaluation needs from the running game.
pub(crate) trait ScriptHost {
    fn state(&self) -> &GameState;

    /// Ask a player and wait for a validated response.
    fn request(&mut self, request: Request) -> Flow<Response>;

    /// Run actions as the script's next timing. `None` if the timing failed.
    fn execute(&mut self, actions: Vec<Action>) -> Flow<Option<Vec<Action>>>;

    /// Run actions as an all-or-nothing cost timing.
    fn run_cost_timing(&mut self, actions: Vec<Action>) -> Flow<Option<Vec<Action>>>;

    fn emit(&mut self, event: Event);

    fn set_hidden(&mut self, card: EntityId, player: PlayerId, hidden: bool) -> Flow<()>;
}

/// A host that can only read.
pub(crate) struct PureHost<'a> {
    pub state: &'a GameState,
}

impl PureHost<'_> {
    fn refuse<T>(what: &str) -> Flow<T> {
        Err(Halt::Error(EngineError::PureEvaluation(what.to_string())))
    }
}

impl ScriptHost for PureHost<'_> {
    fn state(&self) -> &GameState {
        self.state
    }

    fn request(&mut self, request: Request) -> Flow<Response> {
        Self::refuse(request.kind.as_str())
    }

    fn execute(&mut self, _actions: Vec<Action>) -> Flow<Option<Vec<Action>>> {
        Self::refuse("an action")
    }

    fn run_cost_timing(&mut self, _actions: Vec<Action>) -> Flow<Option<Vec<Action>>> {
        Self::refuse("a cost")
    }

    fn emit(&mut self, _event: Event) {}

    fn set_hidden(&mut self, _card: EntityId, _player: PlayerId, _hidden: bool) -> Flow<()> {
        Self::refuse("a visibility change")
    }
}

/// Evaluate an expression that must not touch the game.
///
/// ```
/// use std::sync::Arc;
/// use cu_rules::cards::CardRegistry;
/// use cu_rules::core::{GameState, PlayerId, RulesConfig};
/// use cu_rules::script::{eval::evaluate, parser::parse_expression, EvalContext};
///
/// let state = GameState::new(Arc::new(RulesConfig::default()), Arc::new(CardRegistry::new()));
/// let expr = parse_expression("you.life + 200").unwrap();
/// let values = evaluate(&expr, &EvalContext::new(PlayerId::new(0)), &state).unwrap();
/// assert_eq!(values[0].as_number(), Some(1200));
/// ```
pub fn evaluate(
    expr: &Expr,
    ctx: &EvalContext,
    state: &GameState,
) -> Result<Vec<ScriptValue>, EngineError> {
    let mut host = PureHost { state };
    eval(expr, ctx, &mut host).map_err(|halt| match halt {
        Halt::Error(err) => err,
        other => EngineError::Invariant(format!("pure evaluation halted: {other:?}")),
    })
}

/// The players a selector stands for.
pub(crate) fn players_for(
    selector: Option<PlayerSelector>,
    ctx: &EvalContext,
    state: &GameState,
) -> Vec<PlayerId> {
    let you = || {
        ctx.card
            .and_then(|id| state.card(id).ok())
            .map_or(ctx.player, |card| card.owner)
    };
    match selector {
        None | Some(PlayerSelector::Own) => vec![ctx.player],
        Some(PlayerSelector::You) => vec![you()],
        Some(PlayerSelector::Opponent) => vec![you().next()],
        Some(PlayerSelector::Both) => vec![state.turn_player, state.turn_player.next()],
    }
}

fn live(state: &GameState, id: EntityId) -> Option<ScriptValue> {
    state
        .card(id)
        .ok()
        .filter(|card| !card.removed)
        .map(|card| ScriptValue::live_card(card.current_ref()))
}

pub(crate) fn eval(
    expr: &Expr,
    ctx: &EvalContext,
    host: &mut dyn ScriptHost,
) -> Flow<Vec<ScriptValue>> {
    let values = match expr {
        Expr::Number(n) => vec![ScriptValue::Number(*n)],
        Expr::Bool(b) => vec![ScriptValue::Bool(*b)],
        // any amount
        Expr::AnyAmount => Vec::new(),
        Expr::AllTypes => host
            .state()
            .config
            .all_types
            .iter()
            .map(|t| ScriptValue::Type(t.clone()))
            .collect(),
        Expr::TypeName(name) => vec![ScriptValue::Type(name.clone())],
        Expr::CardType(card_type) => vec![ScriptValue::CardType(*card_type)],
        Expr::CardId(id) => vec![ScriptValue::Name(*id)],
        Expr::Until(until) => vec![ScriptValue::Until(*until)],
        Expr::Player(selector) => players_for(Some(*selector), ctx, host.state())
            .into_iter()
            .map(ScriptValue::Player)
            .collect(),
        Expr::Zone { player, zone } => {
            let players = match player {
                Some(selector) => players_for(Some(*selector), ctx, host.state()),
                None => {
                    let first = ctx.evaluating_player.unwrap_or(ctx.player);
                    vec![first, first.next()]
                }
            };
            players
                .into_iter()
                .flat_map(|p| {
                    zone.kinds()
                        .iter()
                        .map(move |&kind| ScriptValue::Zone(ZoneRef::new(p, kind)))
                })
                .collect()
        }
        Expr::DeckPosition { player, top } => {
            let players = match player {
                Some(selector) => players_for(Some(*selector), ctx, host.state()),
                None => vec![ctx.player],
            };
            players
                .into_iter()
                .map(|player| ScriptValue::DeckPosition { player, top: *top })
                .collect()
        }
        Expr::Phase { player, phase } => {
            let player = player
                .and_then(|selector| players_for(Some(selector), ctx, host.state()).first().copied());
            vec![ScriptValue::Phase {
                player,
                phase: *phase,
            }]
        }
        Expr::Variable(name) => ctx
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::UnknownVariable(name.clone()))?,
        Expr::This => ctx
            .card
            .and_then(|id| live(host.state(), id))
            .into_iter()
            .collect(),
        Expr::ImplicitCard => ctx
            .implicit_card
            .clone()
            .map(ScriptValue::Card)
            .into_iter()
            .collect(),
        Expr::AttackTarget => {
            let state = host.state();
            state
                .attack
                .as_ref()
                .and_then(|attack| attack.target)
                .and_then(|id| live(state, id))
                .into_iter()
                .collect()
        }
        Expr::Attackers => {
            let state = host.state();
            state
                .attack
                .iter()
                .flat_map(|attack| attack.attackers.iter())
                .filter_map(|&id| live(state, id))
                .collect()
        }
        Expr::CurrentPhase => host.state().current_phase_value().into_iter().collect(),
        Expr::Property { object, property } => {
            let objects = eval(object, ctx, host)?;
            let state = host.state();
            objects
                .iter()
                .flat_map(|value| read_property(value, *property, state))
                .collect()
        }
        Expr::CardMatch(matcher) => match_cards(matcher, ctx, host)?,
        Expr::Call(call) => eval_call(call, ctx, host)?,
        Expr::Binary { op, left, right } => {
            let left = eval(left, ctx, host)?;
            match op {
                BinaryOp::And if !truthy(&left) => vec![ScriptValue::Bool(false)],
                BinaryOp::Or if truthy(&left) => vec![ScriptValue::Bool(true)],
                _ => {
                    let right = eval(right, ctx, host)?;
                    apply_binary(*op, &left, &right)
                }
            }
        }
        Expr::Unary { op, operand } => apply_unary(*op, &eval(operand, ctx, host)?),
        Expr::Accessor { scope, accessor } => {
            let state = host.state();
            let actions: Vec<&Action> = match scope {
                AccessorScope::Implicit => ctx.implicit_actions.iter().collect(),
                AccessorScope::CurrentBlock => state.block_actions.iter().collect(),
                AccessorScope::CurrentTurn => state.turn_actions.iter().collect(),
            };
            let mut found: Vec<ScriptCard> = Vec::new();
            for card in actions.into_iter().flat_map(|a| a.accessed_cards(*accessor)) {
                if !found.iter().any(|c| c.id() == card.id()) {
                    found.push(card);
                }
            }
            found.into_iter().map(ScriptValue::Card).collect()
        }
        Expr::Modifier(modifications) => {
            vec![ScriptValue::Modifier(Arc::new(modifications.clone()))]
        }
        Expr::List(items) => {
            let mut values = Vec::new();
            for item in items {
                values.extend(eval(item, ctx, host)?);
            }
            values
        }
    };
    Ok(values)
}

/// Run a call inside an expression. Actions it produces execute right away
/// as their own timing.
fn eval_call(
    call: &FunctionCall,
    ctx: &EvalContext,
    host: &mut dyn ScriptHost,
) -> Flow<Vec<ScriptValue>> {
    let mut values = Vec::new();
    let mut actions = Vec::new();
    let mut acted = false;
    for player in players_for(call.player, ctx, host.state()) {
        match functions::run(call, &ctx.with_player(player), host)? {
            Output::Values(v) => values.extend(v),
            Output::Actions(a) => {
                acted = true;
                actions.extend(a);
            }
        }
    }
    if acted {
        let executed = host.execute(actions)?.ok_or(Halt::Stopped)?;
        values.extend(
            executed
                .into_iter()
                .map(|action| ScriptValue::Action(Box::new(action))),
        );
    }
    Ok(values)
}

fn read_property(value: &ScriptValue, property: Property, state: &GameState) -> Vec<ScriptValue> {
    match value {
        ScriptValue::Card(script_card) => {
            let Some(card) = script_card.resolve(state) else {
                return Vec::new();
            };
            match property {
                Property::Value { key, base } => {
                    card.values.view(base).read(key).unwrap_or_default()
                }
                Property::Owner => vec![ScriptValue::Player(card.owner)],
                Property::EquippedUnit => card
                    .equipped_to
                    .and_then(|id| live(state, id))
                    .into_iter()
                    .collect(),
                Property::Equipments => card
                    .equipments
                    .iter()
                    .filter_map(|&id| live(state, id))
                    .collect(),
                Property::AttacksMade => vec![ScriptValue::Number(i64::from(card.attacks_made))],
                Property::FightingAgainst => {
                    let Some(attack) = &state.attack else {
                        return Vec::new();
                    };
                    if attack.attackers.contains(&card.entity) {
                        attack.target.and_then(|id| live(state, id)).into_iter().collect()
                    } else if attack.target == Some(card.entity) {
                        attack
                            .attackers
                            .iter()
                            .filter_map(|&id| live(state, id))
                            .collect()
                    } else {
                        Vec::new()
                    }
                }
                Property::SelfCard => live(state, card.entity).into_iter().collect(),
                Property::Zone => card.zone.map(ScriptValue::Zone).into_iter().collect(),
                Property::IsToken => vec![ScriptValue::Bool(card.is_token)],
                Property::Life | Property::Mana | Property::Partner => Vec::new(),
            }
        }
        ScriptValue::Player(player) => {
            let player = &state.players[*player];
            match property {
                Property::Life => vec![ScriptValue::Number(player.life)],
                Property::Mana => vec![ScriptValue::Number(player.mana)],
                Property::Partner => player
                    .zones
                    .cards_in(ZoneKind::Partner)
                    .into_iter()
                    .filter_map(|id| live(state, id))
                    .collect(),
                Property::Value { key, base } => {
                    player.values.view(base).read(key).unwrap_or_default()
                }
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// `[types from sources where condition]`.
///
/// A card the evaluating player cannot see matches unconditionally, unless
/// it is in that player's own deck.
fn match_cards(
    matcher: &CardMatcher,
    ctx: &EvalContext,
    host: &mut dyn ScriptHost,
) -> Flow<Vec<ScriptValue>> {
    let mut candidates: Vec<ScriptCard> = Vec::new();
    for source in &matcher.sources {
        for value in eval(source, ctx, host)? {
            let found: Vec<ScriptCard> = match value {
                ScriptValue::Zone(zone) => host
                    .state()
                    .cards_in(zone)
                    .into_iter()
                    .filter_map(|id| host.state().card(id).ok())
                    .map(|card| ScriptCard::live(card.current_ref()))
                    .collect(),
                ScriptValue::Card(card) => vec![card],
                _ => Vec::new(),
            };
            for card in found {
                if !candidates.iter().any(|c| c.id() == card.id()) {
                    candidates.push(card);
                }
            }
        }
    }

    let evaluating = ctx.evaluating_player;
    let mut matching = Vec::new();
    for candidate in candidates {
        let (blind, types_match) = {
            let Some(card) = candidate.resolve(host.state()) else {
                continue;
            };
            let blind = evaluating.is_some_and(|player| {
                card.is_hidden_from(player)
                    && card.zone != Some(ZoneRef::new(player, ZoneKind::Deck))
            });
            let types_match = matcher.card_types.is_empty()
                || matcher
                    .card_types
                    .iter()
                    .any(|&t| card.values.current.has_card_type(t));
            (blind, types_match)
        };
        if blind {
            matching.push(ScriptValue::Card(candidate));
            continue;
        }
        if !types_match {
            continue;
        }
        let holds = match &matcher.condition {
            Some(condition) => {
                let inner = ctx.with_implicit_card(candidate.clone());
                truthy(&eval(condition, &inner, host)?)
            }
            None => true,
        };
        if holds {
            matching.push(ScriptValue::Card(candidate));
        }
    }
    Ok(matching)
}

/// Combine numbers of two lists: pairwise if the lengths match, otherwise
/// on the sums. Results that overflow are dropped.
fn numeric(left: &[i64], right: &[i64], f: impl Fn(i64, i64) -> Option<i64>) -> Vec<ScriptValue> {
    let sum = |ns: &[i64]| ns.iter().try_fold(0i64, |acc, n| acc.checked_add(*n));
    let pairs: Vec<(i64, i64)> = if left.len() == right.len() {
        left.iter().copied().zip(right.iter().copied()).collect()
    } else {
        match (sum(left), sum(right)) {
            (Some(a), Some(b)) => vec![(a, b)],
            _ => Vec::new(),
        }
    };
    pairs
        .into_iter()
        .filter_map(|(a, b)| f(a, b))
        .map(ScriptValue::Number)
        .collect()
}

fn all_numbers(values: &[ScriptValue]) -> bool {
    !values.is_empty() && values.iter().all(|v| v.as_number().is_some())
}

fn apply_binary(op: BinaryOp, left: &[ScriptValue], right: &[ScriptValue]) -> Vec<ScriptValue> {
    let overlap = || left.iter().any(|a| right.iter().any(|b| a.same_as(b)));
    let (ln, rn) = (numbers(left), numbers(right));
    match op {
        BinaryOp::Or => vec![ScriptValue::Bool(truthy(left) || truthy(right))],
        BinaryOp::And => vec![ScriptValue::Bool(truthy(left) && truthy(right))],
        BinaryOp::Equals => vec![ScriptValue::Bool(overlap())],
        BinaryOp::NotEquals => vec![ScriptValue::Bool(!overlap())],
        BinaryOp::Greater => vec![ScriptValue::Bool(
            ln.iter().any(|a| rn.iter().any(|b| a > b)),
        )],
        BinaryOp::Less => vec![ScriptValue::Bool(
            ln.iter().any(|a| rn.iter().any(|b| a < b)),
        )],
        BinaryOp::Plus if all_numbers(left) && all_numbers(right) => {
            numeric(&ln, &rn, i64::checked_add)
        }
        BinaryOp::Minus if all_numbers(left) && all_numbers(right) => {
            numeric(&ln, &rn, i64::checked_sub)
        }
        BinaryOp::Plus => left.iter().chain(right).cloned().collect(),
        BinaryOp::Minus => left
            .iter()
            .filter(|a| !right.iter().any(|b| a.same_as(b)))
            .cloned()
            .collect(),
        BinaryOp::Multiply => numeric(&ln, &rn, i64::checked_mul),
        // rounds up, like the divide modification
        BinaryOp::Divide => numeric(&ln, &rn, |a, b| {
            a.checked_div_euclid(b).map(|_| crate::values::div_ceil(a, b))
        }),
        BinaryOp::FloorDivide => numeric(&ln, &rn, i64::checked_div_euclid),
    }
}

fn apply_unary(op: UnaryOp, operand: &[ScriptValue]) -> Vec<ScriptValue> {
    match op {
        UnaryOp::Minus => numbers(operand)
            .into_iter()
            .filter_map(|n| n.checked_neg().map(ScriptValue::Number))
            .collect(),
        UnaryOp::Not => vec![ScriptValue::Bool(!truthy(operand))],
    }
}

/// Run a script's statements. Each call line runs as one timing; returns
/// the context with every assigned variable bound.
pub(crate) fn run_script(
    script: &Script,
    ctx: &EvalContext,
    host: &mut dyn ScriptHost,
) -> Flow<EvalContext> {
    let mut ctx = ctx.clone();
    for statement in &script.statements {
        match statement {
            Statement::Assign { name, value, line } => {
                trace!(variable = %name, line, "assigning");
                let values = eval(value, &ctx, host)?;
                ctx = ctx.with_variable(name, values);
            }
            Statement::Calls { calls, line } => {
                trace!(line, calls = calls.len(), "running line");
                let mut actions = Vec::new();
                let mut acted = false;
                for call in calls {
                    for player in players_for(call.player, &ctx, host.state()) {
                        if let Output::Actions(a) =
                            functions::run(call, &ctx.with_player(player), host)?
                        {
                            acted = true;
                            actions.extend(a);
                        }
                    }
                }
                if acted {
                    host.execute(actions)?.ok_or(Halt::Stopped)?;
                }
            }
        }
    }
    Ok(ctx)
}

/// Cartesian product of per-slot options.
pub(crate) fn product(slots: &[Vec<Vec<ScriptValue>>]) -> Vec<Vec<Vec<ScriptValue>>> {
    slots.iter().fold(vec![Vec::new()], |acc, options| {
        acc.iter()
            .flat_map(|prefix| {
                options.iter().map(move |option| {
                    let mut next = prefix.clone();
                    next.push(option.clone());
                    next
                })
            })
            .collect()
    })
}

fn contains_call(expr: &Expr) -> bool {
    matches!(expr, Expr::Call(_)) || expr.children().into_iter().any(contains_call)
}

/// Every value list `expr` could evaluate to.
pub fn eval_full(
    expr: &Expr,
    ctx: &EvalContext,
    state: &GameState,
) -> Result<Vec<Vec<ScriptValue>>, EvalError> {
    match expr {
        Expr::Call(call) => {
            let mut per_player = Vec::new();
            for player in players_for(call.player, ctx, state) {
                per_player.push(functions::eval_full(call, &ctx.with_player(player), state)?);
            }
            Ok(product(&per_player)
                .into_iter()
                .map(|lists| lists.concat())
                .collect())
        }
        Expr::Binary { op, left, right } => {
            let sides = [eval_full(left, ctx, state)?, eval_full(right, ctx, state)?];
            Ok(product(&sides)
                .into_iter()
                .map(|pair| apply_binary(*op, &pair[0], &pair[1]))
                .collect())
        }
        Expr::Unary { op, operand } => Ok(eval_full(operand, ctx, state)?
            .into_iter()
            .map(|values| apply_unary(*op, &values))
            .collect()),
        Expr::Property { object, property } => Ok(eval_full(object, ctx, state)?
            .into_iter()
            .map(|objects| {
                objects
                    .iter()
                    .flat_map(|value| read_property(value, *property, state))
                    .collect()
            })
            .collect()),
        Expr::List(items) => {
            let mut per_item = Vec::with_capacity(items.len());
            for item in items {
                per_item.push(eval_full(item, ctx, state)?);
            }
            Ok(product(&per_item)
                .into_iter()
                .map(|lists| lists.concat())
                .collect())
        }
        other if contains_call(other) => Err(EvalError::NotYetSupported {
            function: "nested call",
        }),
        other => Ok(vec![evaluate(other, ctx, state)?]),
    }
}

fn call_has_targets(
    call: &FunctionCall,
    ctx: &EvalContext,
    state: &GameState,
) -> Result<bool, EngineError> {
    for player in players_for(call.player, ctx, state) {
        let ctx = ctx.with_player(player);
        for arg in &call.args {
            if !expr_has_targets(arg, &ctx, state)? {
                return Ok(false);
            }
        }
        if !functions::has_targets(call, &ctx, state)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn expr_has_targets(expr: &Expr, ctx: &EvalContext, state: &GameState) -> Result<bool, EngineError> {
    if let Expr::Call(call) = expr {
        return call_has_targets(call, ctx, state);
    }
    for child in expr.children() {
        if !expr_has_targets(child, ctx, state)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn statements_have_targets(
    statements: &[&Statement],
    ctx: &EvalContext,
    state: &GameState,
) -> Result<bool, EngineError> {
    let Some((first, rest)) = statements.split_first() else {
        return Ok(true);
    };
    match first {
        Statement::Calls { calls, .. } => {
            for call in calls {
                if !call_has_targets(call, ctx, state)? {
                    return Ok(false);
                }
            }
            statements_have_targets(rest, ctx, state)
        }
        Statement::Assign { name, value, .. } => {
            if !expr_has_targets(value, ctx, state)? {
                return Ok(false);
            }
            match eval_full(value, ctx, state) {
                Ok(options) => {
                    for option in options {
                        if statements_have_targets(rest, &ctx.with_variable(name, option), state)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Err(EvalError::Engine(err)) => Err(err),
                Err(_) => Ok(true),
            }
        }
    }
}

/// Whether running `scripts` in order could do something in every line.
///
/// Variables assigned from enumerable expressions are tried with each of
/// their possible values; one working branch is enough.
pub fn has_all_targets(
    scripts: &[&Arc<Script>],
    ctx: &EvalContext,
    state: &GameState,
) -> Result<bool, EngineError> {
    let statements: Vec<&Statement> = scripts
        .iter()
        .flat_map(|script| script.statements.iter())
        .collect();
    statements_have_targets(&statements, ctx, state)
}
