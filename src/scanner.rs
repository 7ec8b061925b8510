//! An eager, table-driven scanner.
//!
//! The scanner consumes the entire source before handing the tokens to the
//! parser. At every position it skips whitespace, then tries the entries of
//! a [`PatternTable`] in order and takes the *first* one whose pattern matches
//! a prefix of the remaining text. It is not a longest-match scanner, so the
//! table order carries meaning:
//!
//! - multi-character operators come before their prefixes (`===` before `==`
//!   before `=`, `>=` before `>`),
//! - keywords come before the identifier pattern,
//! - string literals and comments come before any punctuation they contain.

use std::fmt;
use std::ops::Range;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Function,
    If,
    Else,
    Print,
    VarDecl,
    Return,
    True,
    False,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    Assign,
    StrictEqual,
    StrictNotEqual,
    Equal,
    NotEqual,
    GreaterEqual,
    LessEqual,
    Greater,
    Less,
    Plus,
    Minus,
    Star,
    Slash,
    And,
    Or,
    Integer,
    String,
    Identifier,
    Comment,
}

impl TokenKind {
    /// Human readable name used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Function => "`function`",
            TokenKind::If => "`if`",
            TokenKind::Else => "`else`",
            TokenKind::Print => "`print`",
            TokenKind::VarDecl => "variable declaration keyword",
            TokenKind::Return => "`return`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::OpenBrace => "`{`",
            TokenKind::CloseBrace => "`}`",
            TokenKind::OpenParen => "`(`",
            TokenKind::CloseParen => "`)`",
            TokenKind::Comma => "`,`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Assign => "`=`",
            TokenKind::StrictEqual => "`===`",
            TokenKind::StrictNotEqual => "`!==`",
            TokenKind::Equal => "`==`",
            TokenKind::NotEqual => "`!=`",
            TokenKind::GreaterEqual => "`>=`",
            TokenKind::LessEqual => "`<=`",
            TokenKind::Greater => "`>`",
            TokenKind::Less => "`<`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::And => "`&&`",
            TokenKind::Or => "`||`",
            TokenKind::Integer => "integer literal",
            TokenKind::String => "string literal",
            TokenKind::Identifier => "identifier",
            TokenKind::Comment => "comment",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// Byte range of the lexeme in the scanned source.
    pub span: Range<usize>,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Position {
    /// Resolves a byte offset into a 1-based line and column.
    pub fn locate(source: &str, offset: usize) -> Self {
        let mut line = 1;
        let mut column = 1;
        for c in source[..offset.min(source.len())].chars() {
            column += 1;
            if c == '\n' {
                line += 1;
                column = 1;
            }
        }
        Self {
            offset,
            line,
            column,
        }
    }
}

#[derive(Debug, thiserror::Error, Serialize)]
#[error(
    "no token matches at line {}, column {}: `{}`",
    .position.line,
    .position.column,
    snippet(.remaining)
)]
pub struct LexError {
    pub position: Position,
    /// Everything from the offending character to the end of the source.
    pub remaining: String,
}

fn snippet(remaining: &str) -> String {
    const MAX_CHARS: usize = 24;
    let line = remaining.lines().next().unwrap_or_default();
    if line.chars().count() > MAX_CHARS {
        format!("{}...", line.chars().take(MAX_CHARS).collect::<String>())
    } else {
        line.to_string()
    }
}

const STANDARD_PATTERNS: &[(TokenKind, &str)] = &[
    // Comments must be tried before `/`.
    (TokenKind::Comment, r"//[^\n]*"),
    (TokenKind::Comment, r"/\*[\s\S]*?\*/"),
    (TokenKind::Function, r"function\b"),
    (TokenKind::If, r"if\b"),
    (TokenKind::Else, r"else\b"),
    (TokenKind::Print, r"console\.log\b|print\b"),
    (TokenKind::VarDecl, r"(?:var|const|let)\b"),
    (TokenKind::Return, r"return\b"),
    (TokenKind::True, r"true\b"),
    (TokenKind::False, r"false\b"),
    (TokenKind::String, r#""(?:[^"\\\n]|\\.)*""#),
    (TokenKind::String, r"'(?:[^'\\\n]|\\.)*'"),
    (TokenKind::StrictEqual, r"==="),
    (TokenKind::StrictNotEqual, r"!=="),
    (TokenKind::Equal, r"=="),
    (TokenKind::NotEqual, r"!="),
    (TokenKind::GreaterEqual, r">="),
    (TokenKind::LessEqual, r"<="),
    (TokenKind::And, r"&&"),
    (TokenKind::Or, r"\|\|"),
    (TokenKind::Assign, r"="),
    (TokenKind::Greater, r">"),
    (TokenKind::Less, r"<"),
    (TokenKind::Plus, r"\+"),
    (TokenKind::Minus, r"-"),
    (TokenKind::Star, r"\*"),
    (TokenKind::Slash, r"/"),
    (TokenKind::OpenBrace, r"\{"),
    (TokenKind::CloseBrace, r"\}"),
    (TokenKind::OpenParen, r"\("),
    (TokenKind::CloseParen, r"\)"),
    (TokenKind::Comma, r","),
    (TokenKind::Semicolon, r";"),
    (TokenKind::Integer, r"[0-9]+\b"),
    // Keywords above end in `\b`, so this set must stay within word characters.
    (TokenKind::Identifier, r"[A-Za-z_][A-Za-z0-9_]*"),
];

/// An ordered list of `(kind, pattern)` entries. Every pattern is anchored to
/// the current scan position when the table is built.
#[derive(Clone, Debug)]
pub struct PatternTable {
    entries: Vec<(TokenKind, Regex)>,
}

impl PatternTable {
    pub fn new<'a>(
        entries: impl IntoIterator<Item = (TokenKind, &'a str)>,
    ) -> Result<Self, regex::Error> {
        let entries = entries
            .into_iter()
            .map(|(kind, pattern)| Ok((kind, Regex::new(&format!(r"\A(?:{pattern})"))?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { entries })
    }

    /// The grammar of the source language.
    pub fn standard() -> Self {
        Self::new(STANDARD_PATTERNS.iter().copied())
            .expect("built-in token patterns are valid regular expressions")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the kind and byte length of the first entry matching a
    /// non-empty prefix of `rest`.
    fn first_match(&self, rest: &str) -> Option<(TokenKind, usize)> {
        self.entries.iter().find_map(|(kind, regex)| {
            regex
                .find(rest)
                .filter(|m| !m.is_empty())
                .map(|m| (*kind, m.end()))
        })
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scanner {
    table: PatternTable,
}

impl Scanner {
    pub fn new(table: PatternTable) -> Self {
        Self { table }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(source_len = source.len()))]
    pub fn scan(&self, source: &str) -> Result<Vec<Token>, LexError> {
        let mut tokens = vec![];
        let mut offset = 0;
        loop {
            let rest = &source[offset..];
            let trimmed = rest.trim_start();
            offset += rest.len() - trimmed.len();
            if trimmed.is_empty() {
                break;
            }

            let Some((kind, len)) = self.table.first_match(trimmed) else {
                return Err(LexError {
                    position: Position::locate(source, offset),
                    remaining: trimmed.to_string(),
                });
            };
            tokens.push(Token::new(kind, &trimmed[..len], offset..offset + len));
            offset += len;
        }
        trace!(token_count = tokens.len(), "Scanned source");
        Ok(tokens)
    }
}

/// Scans `source` with the standard pattern table.
pub fn scan(source: &str) -> Result<Vec<Token>, LexError> {
    Scanner::default().scan(source)
}
