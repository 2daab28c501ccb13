//! CDF Script lexer.
//!
//! Words are classified by fixed keyword tables first. What remains is
//! sorted by shape: `CU` followed by digits is a card id, an all-caps word is
//! a function name, a capitalised word is a type name, and anything else is
//! a plain name.
//!
//! ```
//! use cu_rules::script::lexer::{tokenize, TokenKind};
//!
//! let tokens = tokenize("DRAW(2)").unwrap();
//! assert_eq!(tokens[0].kind, TokenKind::Function("DRAW".into()));
//! assert_eq!(tokens[2].kind, TokenKind::Number(2));
//! ```

use crate::cards::{CardId, CardType};
use crate::core::ScriptError;

use super::ast::{AccessorKind, PhaseName, PlayerSelector, Property, Until, ZoneName};

/// Reserved words, grouped by category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Zone(ZoneName),
    Property(Property),
    Phase {
        player: Option<PlayerSelector>,
        phase: PhaseName,
    },
    Player(PlayerSelector),
    Bool(bool),
    CardType(CardType),
    /// `card`, any card type.
    AnyCard,
    Until(Until),
    DeckPosition {
        top: bool,
    },
    Accessor(AccessorKind),
    From,
    Where,
    If,
    Cancel,
    Immune,
    To,
    Base,
    Any,
    AllTypes,
    This,
    AttackTarget,
    Attackers,
    CurrentBlock,
    CurrentPhase,
    CurrentTurn,
    AsManyAsPossible,
}

impl Keyword {
    /// Look a word up in the keyword tables.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        let simple = match word {
            "from" => Some(Self::From),
            "where" => Some(Self::Where),
            "if" => Some(Self::If),
            "cancel" => Some(Self::Cancel),
            "immune" => Some(Self::Immune),
            "to" => Some(Self::To),
            "base" => Some(Self::Base),
            "any" => Some(Self::Any),
            "allTypes" => Some(Self::AllTypes),
            "this" => Some(Self::This),
            "attackTarget" => Some(Self::AttackTarget),
            "attackers" => Some(Self::Attackers),
            "currentBlock" => Some(Self::CurrentBlock),
            "currentPhase" => Some(Self::CurrentPhase),
            "currentTurn" => Some(Self::CurrentTurn),
            "asManyAsPossible" => Some(Self::AsManyAsPossible),
            "card" => Some(Self::AnyCard),
            "yes" => Some(Self::Bool(true)),
            "no" => Some(Self::Bool(false)),
            "you" => Some(Self::Player(PlayerSelector::You)),
            "opponent" => Some(Self::Player(PlayerSelector::Opponent)),
            "both" => Some(Self::Player(PlayerSelector::Both)),
            "own" => Some(Self::Player(PlayerSelector::Own)),
            "deckTop" => Some(Self::DeckPosition { top: true }),
            "deckBottom" => Some(Self::DeckPosition { top: false }),
            _ => None,
        };
        simple
            .or_else(|| ZoneName::parse(word).map(Self::Zone))
            .or_else(|| AccessorKind::parse(word).map(Self::Accessor))
            .or_else(|| Until::parse(word).map(Self::Until))
            .or_else(|| CardType::parse(word).map(Self::CardType))
            .or_else(|| parse_phase(word))
            .or_else(|| Property::parse(word).map(Self::Property))
    }
}

/// `mainPhase`, `yourBattlePhase`, `opponentEndPhase`, ...
fn parse_phase(word: &str) -> Option<Keyword> {
    if let Some(phase) = PhaseName::parse(word) {
        return Some(Keyword::Phase {
            player: None,
            phase,
        });
    }
    let (player, rest) = if let Some(rest) = word.strip_prefix("your") {
        (PlayerSelector::You, rest)
    } else {
        (PlayerSelector::Opponent, word.strip_prefix("opponent")?)
    };
    let mut chars = rest.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    let lowered = first.to_ascii_lowercase().to_string() + chars.as_str();
    PhaseName::parse(&lowered).map(|phase| Keyword::Phase {
        player: Some(player),
        phase,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Number(i64),
    Name(String),
    Function(String),
    TypeName(String),
    CardId(CardId),
    Variable(String),
    Keyword(Keyword),
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Backslash,
    Equals,
    NotEquals,
    Greater,
    Less,
    And,
    Or,
    Bang,
    PlusAssign,
    MinusAssign,
    DivideAssign,
    Swap,
    Newline,
}

impl TokenKind {
    /// Short description for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number {n}"),
            Self::Name(name) => format!("name '{name}'"),
            Self::Function(name) => format!("function {name}"),
            Self::TypeName(name) => format!("type {name}"),
            Self::CardId(id) => format!("card id {id}"),
            Self::Variable(name) => format!("variable ${name}"),
            Self::Keyword(keyword) => format!("keyword {keyword:?}"),
            Self::Newline => "end of line".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::LeftBracket => "[",
            Self::RightBracket => "]",
            Self::LeftBrace => "{",
            Self::RightBrace => "}",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Backslash => "\\",
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::And => "&",
            Self::Or => "|",
            Self::Bang => "!",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::DivideAssign => "/=",
            Self::Swap => "><",
            _ => "?",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Split script text into tokens. Lines and columns are 1-based.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut line_start = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        let column = pos - line_start + 1;
        let next = chars.get(pos + 1).copied();

        let (kind, width) = match ch {
            ' ' | '\t' | '\r' => (None, 1),
            '\n' => (Some(TokenKind::Newline), 1),
            '(' => (Some(TokenKind::LeftParen), 1),
            ')' => (Some(TokenKind::RightParen), 1),
            '[' => (Some(TokenKind::LeftBracket), 1),
            ']' => (Some(TokenKind::RightBracket), 1),
            '{' => (Some(TokenKind::LeftBrace), 1),
            '}' => (Some(TokenKind::RightBrace), 1),
            ',' => (Some(TokenKind::Comma), 1),
            '.' => (Some(TokenKind::Dot), 1),
            '*' => (Some(TokenKind::Star), 1),
            '\\' => (Some(TokenKind::Backslash), 1),
            '&' => (Some(TokenKind::And), 1),
            '|' => (Some(TokenKind::Or), 1),
            '=' => (Some(TokenKind::Equals), 1),
            '<' => (Some(TokenKind::Less), 1),
            '+' | '-' | '/' | '!' | '>' => match (ch, next) {
                ('+', Some('=')) => (Some(TokenKind::PlusAssign), 2),
                ('-', Some('=')) => (Some(TokenKind::MinusAssign), 2),
                ('/', Some('=')) => (Some(TokenKind::DivideAssign), 2),
                ('!', Some('=')) => (Some(TokenKind::NotEquals), 2),
                ('>', Some('<')) => (Some(TokenKind::Swap), 2),
                ('+', _) => (Some(TokenKind::Plus), 1),
                ('-', _) => (Some(TokenKind::Minus), 1),
                ('/', _) => (Some(TokenKind::Slash), 1),
                ('!', _) => (Some(TokenKind::Bang), 1),
                _ => (Some(TokenKind::Greater), 1),
            },
            '$' => {
                let len = word_len(&chars[pos + 1..]);
                if len == 0 {
                    return Err(ScriptError::UnexpectedCharacter { ch, line, column });
                }
                let name: String = chars[pos + 1..pos + 1 + len].iter().collect();
                (Some(TokenKind::Variable(name)), len + 1)
            }
            c if c.is_ascii_digit() => {
                let len = chars[pos..].iter().take_while(|c| c.is_ascii_digit()).count();
                let text: String = chars[pos..pos + len].iter().collect();
                let value = text
                    .parse()
                    .map_err(|_| ScriptError::UnexpectedCharacter { ch, line, column })?;
                (Some(TokenKind::Number(value)), len)
            }
            c if c.is_ascii_alphabetic() => {
                let len = word_len(&chars[pos..]);
                let word: String = chars[pos..pos + len].iter().collect();
                (Some(classify_word(word)), len)
            }
            _ => return Err(ScriptError::UnexpectedCharacter { ch, line, column }),
        };

        if let Some(kind) = kind {
            tokens.push(Token { kind, line, column });
        }
        if ch == '\n' {
            line += 1;
            line_start = pos + 1;
        }
        pos += width;
    }
    Ok(tokens)
}

fn word_len(chars: &[char]) -> usize {
    chars
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
        .count()
}

fn classify_word(word: String) -> TokenKind {
    if let Some(id) = CardId::parse(&word) {
        return TokenKind::CardId(id);
    }
    if let Some(keyword) = Keyword::parse(&word) {
        return TokenKind::Keyword(keyword);
    }
    let mut chars = word.chars();
    let first_upper = chars.next().is_some_and(|c| c.is_ascii_uppercase());
    if word.len() > 1 && word.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
        TokenKind::Function(word)
    } else if first_upper {
        TokenKind::TypeName(word)
    } else {
        TokenKind::Name(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ValueKey;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_word_classes() {
        assert_eq!(
            kinds("CU00042 DRAW Dragon foo"),
            vec![
                TokenKind::CardId(CardId::new(42)),
                TokenKind::Function("DRAW".into()),
                TokenKind::TypeName("Dragon".into()),
                TokenKind::Name("foo".into()),
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("you.hand"),
            vec![
                TokenKind::Keyword(Keyword::Player(PlayerSelector::You)),
                TokenKind::Dot,
                TokenKind::Keyword(Keyword::Zone(ZoneName::Hand)),
            ]
        );
        assert_eq!(
            kinds("yourMainPhase baseAttack"),
            vec![
                TokenKind::Keyword(Keyword::Phase {
                    player: Some(PlayerSelector::You),
                    phase: PhaseName::Main
                }),
                TokenKind::Keyword(Keyword::Property(Property::Value {
                    key: ValueKey::Attack,
                    base: true
                })),
            ]
        );
        assert_eq!(
            kinds("unit card"),
            vec![
                TokenKind::Keyword(Keyword::CardType(CardType::Unit)),
                TokenKind::Keyword(Keyword::AnyCard),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("+= -= /= >< != ! > - \\"),
            vec![
                TokenKind::PlusAssign,
                TokenKind::MinusAssign,
                TokenKind::DivideAssign,
                TokenKind::Swap,
                TokenKind::NotEquals,
                TokenKind::Bang,
                TokenKind::Greater,
                TokenKind::Minus,
                TokenKind::Backslash,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("DRAW(1)\n  $x = 2").unwrap();
        let variable = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Variable("x".into()))
            .unwrap();
        assert_eq!((variable.line, variable.column), (2, 3));
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            tokenize("DRAW(1) ?"),
            Err(ScriptError::UnexpectedCharacter {
                ch: '?',
                line: 1,
                column: 9
            })
        );
    }
}
