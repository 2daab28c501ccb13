//! Recursive-descent parser for CDF Script.
//!
//! ## Grammar
//!
//! ```text
//! script     := (statement? NEWLINE)*
//! statement  := VARIABLE '=' expr | call+
//! call       := (player '.')? FUNCTION ('(' (expr (',' expr)*)? ')')? ('.' asManyAsPossible)?
//! expr       := or
//! or         := and ('|' and)*
//! and        := equality ('&' equality)*
//! equality   := comparison (('=' | '!=') comparison)*
//! comparison := additive (('>' | '<') additive)*
//! additive   := term (('+' | '-') term)*
//! term       := unary (('*' | '/' | '\') unary)*
//! unary      := ('-' | '!') unary | postfix
//! postfix    := primary ('.' PROPERTY)*
//! ```
//!
//! Variables are typed when they are assigned. A `ScriptParser` keeps those
//! types across calls, so an ability's cost and exec share their variables.
//!
//! ```
//! use cu_rules::script::parser::ScriptParser;
//!
//! let mut parser = ScriptParser::new();
//! let cost = parser.parse_script("$card = SELECT(1, [card from you.hand])\nDISCARD($card)").unwrap();
//! let exec = parser.parse_script("DRAW($card.level)").unwrap();
//! assert_eq!(cost.statements.len(), 2);
//! assert_eq!(exec.statements.len(), 1);
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::ScriptError;
use crate::values::{Modification, ModificationKind, Operand, ValueKey};

use super::ast::{
    AccessorScope, BinaryOp, CardMatcher, Expr, FunctionCall, PlayerSelector, Property, Script,
    Statement, UnaryOp, ValueType,
};
use super::functions::Function;
use super::lexer::{tokenize, Keyword, Token, TokenKind};

/// Parser state that outlives a single script: the variable types.
#[derive(Clone, Debug, Default)]
pub struct ScriptParser {
    variable_types: FxHashMap<String, ValueType>,
}

impl ScriptParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a multi-line script.
    pub fn parse_script(&mut self, source: &str) -> Result<Script, ScriptError> {
        let tokens = tokenize(source)?;
        let mut cursor = Cursor {
            tokens,
            pos: 0,
            variable_types: &mut self.variable_types,
        };
        let mut statements = Vec::new();
        while !cursor.at_end() {
            if cursor.eat(&TokenKind::Newline) {
                continue;
            }
            statements.push(cursor.statement()?);
            cursor.end_of_line()?;
        }
        Ok(Script { statements })
    }

    /// Parse a single expression, such as a trigger or condition.
    pub fn parse_expression(&mut self, source: &str) -> Result<Expr, ScriptError> {
        let tokens = tokenize(source)?;
        let mut cursor = Cursor {
            tokens,
            pos: 0,
            variable_types: &mut self.variable_types,
        };
        while cursor.eat(&TokenKind::Newline) {}
        let expr = cursor.expr()?;
        while cursor.eat(&TokenKind::Newline) {}
        if let Some(token) = cursor.peek() {
            return Err(unexpected("end of expression", token));
        }
        Ok(expr)
    }

    #[must_use]
    pub fn variable_type(&self, name: &str) -> Option<ValueType> {
        self.variable_types.get(name).copied()
    }
}

/// Parse a standalone script with fresh variables.
pub fn parse_script(source: &str) -> Result<Script, ScriptError> {
    ScriptParser::new().parse_script(source)
}

/// Parse a standalone expression with fresh variables.
pub fn parse_expression(source: &str) -> Result<Expr, ScriptError> {
    ScriptParser::new().parse_expression(source)
}

fn unexpected(expected: &str, token: &Token) -> ScriptError {
    ScriptError::UnexpectedToken {
        expected: expected.to_string(),
        found: token.kind.describe(),
        line: token.line,
        column: token.column,
    }
}

struct Cursor<'a> {
    tokens: Vec<Token>,
    pos: usize,
    variable_types: &'a mut FxHashMap<String, ValueType>,
}

impl Cursor<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(&TokenKind::Keyword(keyword))
    }

    fn next(&mut self, expected: &str) -> Result<Token, ScriptError> {
        match self.tokens.get(self.pos) {
            Some(token) => {
                self.pos += 1;
                Ok(token.clone())
            }
            None => Err(ScriptError::UnexpectedEnd {
                expected: expected.to_string(),
                line: self.line(),
            }),
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ScriptError> {
        let token = self.next(expected)?;
        if &token.kind == kind {
            Ok(())
        } else {
            Err(unexpected(expected, &token))
        }
    }

    fn end_of_line(&mut self) -> Result<(), ScriptError> {
        match self.peek() {
            None => Ok(()),
            Some(token) if token.kind == TokenKind::Newline => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => Err(unexpected("end of line", token)),
        }
    }

    fn variable_type(&self, name: &str) -> Option<ValueType> {
        self.variable_types.get(name).copied()
    }

    fn type_of(&self, expr: &Expr) -> ValueType {
        expr.value_type(&|name| self.variable_type(name))
    }

    // ==================== statements ====================

    fn statement(&mut self) -> Result<Statement, ScriptError> {
        let line = self.line();
        if let (Some(TokenKind::Variable(name)), Some(TokenKind::Equals)) =
            (self.peek_kind(), self.peek_kind_at(1))
        {
            let name = name.clone();
            self.pos += 2;
            let value = self.expr()?;
            let value_type = self.type_of(&value);
            self.variable_types.insert(name.clone(), value_type);
            return Ok(Statement::Assign { name, value, line });
        }

        let mut calls = Vec::new();
        while !matches!(self.peek_kind(), None | Some(TokenKind::Newline)) {
            let player = match (self.peek_kind(), self.peek_kind_at(1)) {
                (Some(TokenKind::Keyword(Keyword::Player(player))), Some(TokenKind::Dot)) => {
                    let player = *player;
                    self.pos += 2;
                    Some(player)
                }
                _ => None,
            };
            calls.push(self.call(player)?);
        }
        if calls.is_empty() {
            return Err(ScriptError::UnexpectedEnd {
                expected: "function call".into(),
                line,
            });
        }
        Ok(Statement::Calls { calls, line })
    }

    fn call(&mut self, player: Option<PlayerSelector>) -> Result<FunctionCall, ScriptError> {
        let token = self.next("function call")?;
        let TokenKind::Function(name) = &token.kind else {
            return Err(unexpected("function call", &token));
        };
        let function = Function::parse(name).ok_or_else(|| ScriptError::UnknownFunction {
            name: name.clone(),
            line: token.line,
        })?;

        let mut args = Vec::new();
        if self.eat(&TokenKind::LeftParen) && !self.eat(&TokenKind::RightParen) {
            loop {
                args.push(self.expr()?);
                if self.eat(&TokenKind::RightParen) {
                    break;
                }
                self.expect(&TokenKind::Comma, "',' or ')'")?;
            }
        }

        let as_many_as_possible = matches!(
            (self.peek_kind(), self.peek_kind_at(1)),
            (
                Some(TokenKind::Dot),
                Some(TokenKind::Keyword(Keyword::AsManyAsPossible))
            )
        );
        if as_many_as_possible {
            self.pos += 2;
        }

        let args = self.bind_arguments(function, args, token.line)?;
        Ok(FunctionCall {
            player,
            function,
            args,
            as_many_as_possible,
            line: token.line,
        })
    }

    /// The n-th argument of a type fills the n-th slot of that type.
    fn bind_arguments(
        &self,
        function: Function,
        args: Vec<Expr>,
        line: usize,
    ) -> Result<Vec<Expr>, ScriptError> {
        let params = function.params();
        let mut slots: Vec<Option<Expr>> = vec![None; params.len()];
        for arg in args {
            let found = self.type_of(&arg);
            let slot = params.iter().enumerate().position(|(i, param)| {
                slots[i].is_none()
                    && (param.ty == found || param.ty == ValueType::Any || found == ValueType::Any)
            });
            match slot {
                Some(i) => slots[i] = Some(arg),
                None => {
                    return Err(ScriptError::UnexpectedParameter {
                        function: function.as_str().to_string(),
                        found: found.as_str().to_string(),
                        line,
                    })
                }
            }
        }
        slots
            .into_iter()
            .zip(params)
            .map(|(slot, param)| match (slot, param.default) {
                (Some(expr), _) => Ok(expr),
                (None, Some(default)) => Ok(default.to_expr()),
                (None, None) => Err(ScriptError::MissingParameter {
                    function: function.as_str().to_string(),
                    param: param.name.to_string(),
                    line,
                }),
            })
            .collect()
    }

    // ==================== expressions ====================

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(0)
    }

    fn binary_level(&mut self, level: usize) -> Result<Expr, ScriptError> {
        const LEVELS: &[&[(TokenKind, BinaryOp)]] = &[
            &[(TokenKind::Or, BinaryOp::Or)],
            &[(TokenKind::And, BinaryOp::And)],
            &[
                (TokenKind::Equals, BinaryOp::Equals),
                (TokenKind::NotEquals, BinaryOp::NotEquals),
            ],
            &[
                (TokenKind::Greater, BinaryOp::Greater),
                (TokenKind::Less, BinaryOp::Less),
            ],
            &[
                (TokenKind::Plus, BinaryOp::Plus),
                (TokenKind::Minus, BinaryOp::Minus),
            ],
            &[
                (TokenKind::Star, BinaryOp::Multiply),
                (TokenKind::Slash, BinaryOp::Divide),
                (TokenKind::Backslash, BinaryOp::FloorDivide),
            ],
        ];
        let Some(operators) = LEVELS.get(level) else {
            return self.unary();
        };
        let mut left = self.binary_level(level + 1)?;
        loop {
            let op = operators
                .iter()
                .find(|(kind, _)| self.peek_kind() == Some(kind))
                .map(|(_, op)| *op);
            let Some(op) = op else {
                return Ok(left);
            };
            self.pos += 1;
            let right = self.binary_level(level + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(match operand {
                Expr::Number(n) => Expr::Number(-n),
                operand => Expr::Unary {
                    op: UnaryOp::Minus,
                    operand: Box::new(operand),
                },
            });
        }
        if self.eat(&TokenKind::Bang) {
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(self.unary()?),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        while let (Some(TokenKind::Dot), Some(TokenKind::Keyword(Keyword::Property(property)))) =
            (self.peek_kind(), self.peek_kind_at(1))
        {
            let property = *property;
            self.pos += 2;
            expr = Expr::Property {
                object: Box::new(expr),
                property,
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let token = self.next("expression")?;
        let expr = match &token.kind {
            TokenKind::Number(n) => Expr::Number(*n),
            TokenKind::TypeName(name) => Expr::TypeName(name.clone()),
            TokenKind::CardId(id) => Expr::CardId(*id),
            TokenKind::Variable(name) => {
                if self.variable_type(name).is_none() {
                    return Err(ScriptError::UnknownVariable(name.clone()));
                }
                Expr::Variable(name.clone())
            }
            TokenKind::Function(_) => {
                self.pos -= 1;
                Expr::Call(Box::new(self.call(None)?))
            }
            TokenKind::LeftParen => {
                let first = self.expr()?;
                if self.eat(&TokenKind::RightParen) {
                    first
                } else {
                    let mut items = vec![first];
                    while self.eat(&TokenKind::Comma) {
                        items.push(self.expr()?);
                    }
                    self.expect(&TokenKind::RightParen, "')'")?;
                    Expr::List(items)
                }
            }
            TokenKind::LeftBracket => self.card_matcher()?,
            TokenKind::LeftBrace => self.modifier()?,
            TokenKind::Keyword(keyword) => self.keyword(*keyword, &token)?,
            _ => return Err(unexpected("expression", &token)),
        };
        Ok(expr)
    }

    fn keyword(&mut self, keyword: Keyword, token: &Token) -> Result<Expr, ScriptError> {
        Ok(match keyword {
            Keyword::Player(player) => self.player_qualified(player)?,
            Keyword::Zone(zone) => Expr::Zone { player: None, zone },
            Keyword::DeckPosition { top } => Expr::DeckPosition { player: None, top },
            Keyword::Phase { player, phase } => Expr::Phase { player, phase },
            Keyword::Bool(b) => Expr::Bool(b),
            Keyword::Any => Expr::AnyAmount,
            Keyword::AllTypes => Expr::AllTypes,
            Keyword::This => Expr::This,
            Keyword::AttackTarget => Expr::AttackTarget,
            Keyword::Attackers => Expr::Attackers,
            Keyword::CurrentPhase => Expr::CurrentPhase,
            Keyword::CardType(card_type) => Expr::CardType(card_type),
            Keyword::Until(until) => Expr::Until(until),
            Keyword::Accessor(accessor) => Expr::Accessor {
                scope: AccessorScope::Implicit,
                accessor,
            },
            Keyword::CurrentBlock | Keyword::CurrentTurn => {
                let scope = if keyword == Keyword::CurrentBlock {
                    AccessorScope::CurrentBlock
                } else {
                    AccessorScope::CurrentTurn
                };
                self.expect(&TokenKind::Dot, "'.'")?;
                let next = self.next("action accessor")?;
                let TokenKind::Keyword(Keyword::Accessor(accessor)) = next.kind else {
                    return Err(unexpected("action accessor", &next));
                };
                Expr::Accessor { scope, accessor }
            }
            Keyword::Property(property) => Expr::Property {
                object: Box::new(Expr::ImplicitCard),
                property,
            },
            Keyword::Base => {
                let next = self.next("property")?;
                match next.kind {
                    TokenKind::Keyword(Keyword::Property(Property::Value { key, .. })) => {
                        Expr::Property {
                            object: Box::new(Expr::ImplicitCard),
                            property: Property::Value { key, base: true },
                        }
                    }
                    _ => return Err(unexpected("property", &next)),
                }
            }
            _ => return Err(unexpected("expression", token)),
        })
    }

    /// `you`, `you.hand`, `you.deckTop`, `you.DRAW(1)`.
    fn player_qualified(&mut self, player: PlayerSelector) -> Result<Expr, ScriptError> {
        if self.peek_kind() != Some(&TokenKind::Dot) {
            return Ok(Expr::Player(player));
        }
        let expr = match self.peek_kind_at(1) {
            Some(TokenKind::Keyword(Keyword::Zone(zone))) => Expr::Zone {
                player: Some(player),
                zone: *zone,
            },
            Some(TokenKind::Keyword(Keyword::DeckPosition { top })) => Expr::DeckPosition {
                player: Some(player),
                top: *top,
            },
            Some(TokenKind::Function(_)) => {
                self.pos += 1;
                return Ok(Expr::Call(Box::new(self.call(Some(player))?)));
            }
            _ => return Ok(Expr::Player(player)),
        };
        self.pos += 2;
        Ok(expr)
    }

    /// `[unit, item from you.field where level > 2]`, after the `[`.
    fn card_matcher(&mut self) -> Result<Expr, ScriptError> {
        let mut card_types = Vec::new();
        loop {
            let token = self.next("card type")?;
            match token.kind {
                TokenKind::Keyword(Keyword::CardType(card_type)) => card_types.push(card_type),
                TokenKind::Keyword(Keyword::AnyCard) => {}
                _ => return Err(unexpected("card type", &token)),
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Keyword(Keyword::From), "'from'")?;

        let mut sources = vec![self.expr()?];
        while self.eat(&TokenKind::Comma) {
            sources.push(self.expr()?);
        }
        let condition = if self.eat_keyword(Keyword::Where) {
            Some(self.expr()?)
        } else {
            None
        };
        self.expect(&TokenKind::RightBracket, "']'")?;
        Ok(Expr::CardMatch(Box::new(CardMatcher {
            card_types,
            sources,
            condition,
        })))
    }

    /// `{attack += 100 if ..., cancel abilities, immune to level}`, after the `{`.
    fn modifier(&mut self) -> Result<Expr, ScriptError> {
        let mut modifications = Vec::new();
        if self.eat(&TokenKind::RightBrace) {
            return Ok(Expr::Modifier(modifications));
        }
        loop {
            modifications.push(self.modification()?);
            if self.eat(&TokenKind::RightBrace) {
                return Ok(Expr::Modifier(modifications));
            }
            self.expect(&TokenKind::Comma, "',' or '}'")?;
        }
    }

    fn modification(&mut self) -> Result<Modification, ScriptError> {
        if self.eat_keyword(Keyword::Cancel) {
            let abilities = self.expr()?;
            let kind = ModificationKind::CancelAbilities {
                abilities: Operand::Expr(Arc::new(abilities)),
            };
            return self.finish_modification(kind, false);
        }
        if self.eat_keyword(Keyword::Immune) {
            self.expect(&TokenKind::Keyword(Keyword::To), "'to'")?;
            let (key, _) = self.modifiable_value()?;
            let by = if self.eat_keyword(Keyword::From) {
                Some(Arc::new(self.expr()?))
            } else {
                None
            };
            return self.finish_modification(ModificationKind::Unaffected { key, by }, false);
        }

        let explicit_base = self.eat_keyword(Keyword::Base);
        let (key, based) = self.modifiable_value()?;
        let to_base = explicit_base || based;

        let op = self.next("modification operator")?;
        let kind = match op.kind {
            TokenKind::Equals => ModificationKind::Set {
                key,
                value: Operand::Expr(Arc::new(self.expr()?)),
            },
            TokenKind::PlusAssign if key.is_list() => ModificationKind::Append {
                key,
                values: Operand::Expr(Arc::new(self.expr()?)),
            },
            TokenKind::PlusAssign | TokenKind::MinusAssign | TokenKind::DivideAssign
                if !key.is_numeric() =>
            {
                return Err(ScriptError::TypeMismatch {
                    expected: "number".into(),
                    found: key.as_str().into(),
                });
            }
            TokenKind::PlusAssign => ModificationKind::NumericChange {
                key,
                amount: Operand::Expr(Arc::new(self.expr()?)),
            },
            TokenKind::MinusAssign => ModificationKind::NumericChange {
                key,
                amount: Operand::Expr(Arc::new(Expr::Unary {
                    op: UnaryOp::Minus,
                    operand: Box::new(self.expr()?),
                })),
            },
            TokenKind::DivideAssign => ModificationKind::NumericDivide {
                key,
                by: Operand::Expr(Arc::new(self.expr()?)),
            },
            TokenKind::Swap => {
                let (other, _) = self.modifiable_value()?;
                ModificationKind::Swap { key, other }
            }
            _ => return Err(unexpected("modification operator", &op)),
        };
        self.finish_modification(kind, to_base)
    }

    fn finish_modification(
        &mut self,
        kind: ModificationKind,
        to_base: bool,
    ) -> Result<Modification, ScriptError> {
        let condition = if self.eat_keyword(Keyword::If) {
            Some(Arc::new(self.expr()?))
        } else {
            None
        };
        Ok(Modification {
            kind,
            to_base,
            condition,
        })
    }

    fn modifiable_value(&mut self) -> Result<(ValueKey, bool), ScriptError> {
        let token = self.next("value")?;
        match token.kind {
            TokenKind::Keyword(Keyword::Property(Property::Value { key, base })) => Ok((key, base)),
            TokenKind::Keyword(Keyword::Property(property)) => {
                Err(ScriptError::UnmodifiableProperty {
                    property: format!("{property:?}"),
                })
            }
            _ => Err(unexpected("value", &token)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ast::{PhaseName, ZoneName};

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3 = 7 | no").unwrap();
        let Expr::Binary { op: BinaryOp::Or, left, .. } = expr else {
            panic!("expected or at the root");
        };
        let Expr::Binary {
            op: BinaryOp::Equals,
            left: sum,
            ..
        } = *left
        else {
            panic!("expected equality under or");
        };
        assert!(matches!(
            *sum,
            Expr::Binary {
                op: BinaryOp::Plus,
                ..
            }
        ));
    }

    #[test]
    fn test_player_qualified_forms() {
        assert!(matches!(
            parse_expression("opponent.discard").unwrap(),
            Expr::Zone {
                player: Some(PlayerSelector::Opponent),
                zone: ZoneName::Discard
            }
        ));
        assert!(matches!(
            parse_expression("you.deckTop").unwrap(),
            Expr::DeckPosition {
                player: Some(PlayerSelector::You),
                top: true
            }
        ));
        assert!(matches!(
            parse_expression("you.life").unwrap(),
            Expr::Property {
                property: Property::Life,
                ..
            }
        ));
        assert!(matches!(
            parse_expression("yourEndPhase").unwrap(),
            Expr::Phase {
                player: Some(PlayerSelector::You),
                phase: PhaseName::End
            }
        ));
    }

    #[test]
    fn test_card_matcher() {
        let expr = parse_expression("[unit, item from you.field, discard where level < 3]").unwrap();
        let Expr::CardMatch(matcher) = expr else {
            panic!("expected card matcher");
        };
        assert_eq!(matcher.card_types.len(), 2);
        assert_eq!(matcher.sources.len(), 2);
        assert!(matcher.condition.is_some());
    }

    #[test]
    fn test_arguments_bind_by_type() {
        let script = parse_script("MOVE(you.hand, [card from discard])").unwrap();
        let Statement::Calls { calls, .. } = &script.statements[0] else {
            panic!("expected calls");
        };
        assert!(matches!(calls[0].args[0], Expr::CardMatch(_)));
        assert!(matches!(calls[0].args[1], Expr::Zone { .. }));
    }

    #[test]
    fn test_defaults_fill_missing_slots() {
        let script = parse_script("SHUFFLE()").unwrap();
        let Statement::Calls { calls, .. } = &script.statements[0] else {
            panic!("expected calls");
        };
        assert_eq!(calls[0].args.len(), 1);
    }

    #[test]
    fn test_missing_and_unexpected_parameters() {
        assert!(matches!(
            parse_script("DAMAGE()"),
            Err(ScriptError::MissingParameter { .. })
        ));
        assert!(matches!(
            parse_script("DRAW(1, 2)"),
            Err(ScriptError::UnexpectedParameter { .. })
        ));
        assert!(matches!(
            parse_script("EXPLODE(1)"),
            Err(ScriptError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_calls_on_one_line_form_one_statement() {
        let script = parse_script("DRAW(1) opponent.DRAW(1)\nGAINLIFE(100)").unwrap();
        assert_eq!(script.statements.len(), 2);
        let Statement::Calls { calls, .. } = &script.statements[0] else {
            panic!("expected calls");
        };
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].player, Some(PlayerSelector::Opponent));
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            parse_script("DRAW($x)").unwrap_err(),
            ScriptError::UnknownVariable("x".into())
        );
    }

    #[test]
    fn test_modifier_literal() {
        let expr =
            parse_expression("{attack += 100, base level = 2, types += Dragon if level > 1, cancel abilities, immune to attack}")
                .unwrap();
        let Expr::Modifier(modifications) = expr else {
            panic!("expected modifier");
        };
        assert_eq!(modifications.len(), 5);
        assert!(matches!(
            modifications[0].kind,
            ModificationKind::NumericChange {
                key: ValueKey::Attack,
                ..
            }
        ));
        assert!(modifications[1].to_base);
        assert!(matches!(
            modifications[2].kind,
            ModificationKind::Append {
                key: ValueKey::Types,
                ..
            }
        ));
        assert!(modifications[2].condition.is_some());
        assert!(matches!(
            modifications[3].kind,
            ModificationKind::CancelAbilities { .. }
        ));
        assert!(matches!(
            modifications[4].kind,
            ModificationKind::Unaffected {
                key: ValueKey::Attack,
                by: None
            }
        ));
    }

    #[test]
    fn test_minus_assign_needs_number() {
        assert!(matches!(
            parse_expression("{types -= Dragon}"),
            Err(ScriptError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unexpected_token_position() {
        let err = parse_script("DRAW(1))").unwrap_err();
        assert!(matches!(
            err,
            ScriptError::UnexpectedToken {
                line: 1,
                column: 8,
                ..
            }
        ));
    }
}
