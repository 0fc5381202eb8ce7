use std::fmt;
use std::mem;

use serde::Serialize;

/// The different kinds of tokens recognised by the Lox scanner.
///
/// Variants without data represent single-character, operator, or keyword
/// tokens.  `STRING(String)` and `NUMBER(f64)` carry their literal values.
/// `IDENTIFIER` is used for user-defined names.  `EOF` marks the end of input
/// and is emitted exactly once per scan.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Serialize)]
pub enum TokenType {
    // Single-character punctuators.
    LEFT_PAREN,
    RIGHT_PAREN,
    LEFT_BRACE,
    RIGHT_BRACE,
    COMMA,
    DOT,
    MINUS,
    PLUS,
    SEMICOLON,
    SLASH,
    STAR,

    // One- or two-character operators.
    BANG,
    BANG_EQUAL,
    EQUAL,
    EQUAL_EQUAL,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,

    /// A user-defined identifier.
    IDENTIFIER,

    /// A string literal (contents without the surrounding quotes).
    STRING(String),

    /// A numeric literal.
    #[serde(rename = "NUMBER")]
    NUMBER(f64),

    // Keywords.
    AND,
    CLASS,
    ELSE,
    FALSE,
    FUN,
    FOR,
    IF,
    NIL,
    OR,
    PRINT,
    RETURN,
    SUPER,
    THIS,
    TRUE,
    VAR,
    WHILE,

    /// End-of-file marker.
    EOF,
}

impl PartialEq for TokenType {
    /// Two `TokenType`s are equal if they share the same variant (ignoring any
    /// inner data).  Uses `mem::discriminant`, so `NUMBER(1.0) == NUMBER(2.0)`
    /// holds — the parser matches on token *kinds*, never literal payloads.
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

impl TokenType {
    /// The variant name without payloads, for token dumps.
    pub fn name(&self) -> &'static str {
        match self {
            TokenType::LEFT_PAREN => "LEFT_PAREN",
            TokenType::RIGHT_PAREN => "RIGHT_PAREN",
            TokenType::LEFT_BRACE => "LEFT_BRACE",
            TokenType::RIGHT_BRACE => "RIGHT_BRACE",
            TokenType::COMMA => "COMMA",
            TokenType::DOT => "DOT",
            TokenType::MINUS => "MINUS",
            TokenType::PLUS => "PLUS",
            TokenType::SEMICOLON => "SEMICOLON",
            TokenType::SLASH => "SLASH",
            TokenType::STAR => "STAR",
            TokenType::BANG => "BANG",
            TokenType::BANG_EQUAL => "BANG_EQUAL",
            TokenType::EQUAL => "EQUAL",
            TokenType::EQUAL_EQUAL => "EQUAL_EQUAL",
            TokenType::GREATER => "GREATER",
            TokenType::GREATER_EQUAL => "GREATER_EQUAL",
            TokenType::LESS => "LESS",
            TokenType::LESS_EQUAL => "LESS_EQUAL",
            TokenType::IDENTIFIER => "IDENTIFIER",
            TokenType::STRING(_) => "STRING",
            TokenType::NUMBER(_) => "NUMBER",
            TokenType::AND => "AND",
            TokenType::CLASS => "CLASS",
            TokenType::ELSE => "ELSE",
            TokenType::FALSE => "FALSE",
            TokenType::FUN => "FUN",
            TokenType::FOR => "FOR",
            TokenType::IF => "IF",
            TokenType::NIL => "NIL",
            TokenType::OR => "OR",
            TokenType::PRINT => "PRINT",
            TokenType::RETURN => "RETURN",
            TokenType::SUPER => "SUPER",
            TokenType::THIS => "THIS",
            TokenType::TRUE => "TRUE",
            TokenType::VAR => "VAR",
            TokenType::WHILE => "WHILE",
            TokenType::EOF => "EOF",
        }
    }
}

/// A scanned token: its kind, the original lexeme, and the line number where
/// it was found.  Immutable once produced; the AST stores owned copies so
/// nodes can outlive the source buffer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Token {
    /// The category of this token.
    pub token_type: TokenType,

    /// The exact substring from the source that produced this token.
    pub lexeme: String,

    /// 1-based line number in the source.
    pub line: usize,
}

impl Token {
    /// Create a new token with the given kind, lexeme, and line.
    pub fn new<S: Into<String>>(token_type: TokenType, lexeme: S, line: usize) -> Self {
        Self {
            token_type,
            lexeme: lexeme.into(),
            line,
        }
    }
}

impl fmt::Display for Token {
    /// `VARIANT lexeme literal` — the shape expected by `tokenize` dumps.
    /// Integral numbers render with a trailing `.0` (`3` scans as `3.0`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token_type {
            TokenType::STRING(s) => write!(f, "STRING {} {}", self.lexeme, s),
            TokenType::NUMBER(n) => {
                if n.fract() == 0.0 {
                    let mut buf = itoa::Buffer::new();
                    write!(f, "NUMBER {} {}.0", self.lexeme, buf.format(*n as i64))
                } else {
                    write!(f, "NUMBER {} {}", self.lexeme, n)
                }
            }
            other => write!(f, "{} {} null", other.name(), self.lexeme),
        }
    }
}
