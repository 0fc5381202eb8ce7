//! Module `scanner` implements a one-pass, streaming lexer for the Lox
//! language.
//!
//! It transforms a byte slice (`&[u8]`) into a sequence of owned [`Token`]s,
//! skipping whitespace and `//` comments, and emitting exactly one `EOF`
//! token at the end.  Designed as a `FusedIterator`, it can be chained safely
//! with other iterator adapters; a lex error does not stop the scan, so the
//! caller can report every bad character in one pass.
//!
//! Identifiers are resolved against a compile-time perfect-hash `KEYWORDS`
//! map (`phf`), and comment skipping fast-forwards to the next newline with
//! `memchr` instead of walking byte by byte.

use std::iter::FusedIterator;

use log::{debug, info};
use memchr::memchr;
use phf::phf_map;

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile-time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// A single-pass **scanner / lexer** that converts raw source bytes into a
/// sequence of [`Token`]s.
pub struct Scanner<'a> {
    src: &'a [u8], // entire source buffer (typically memory-mapped)
    start: usize,  // index of the *first* byte of the current lexeme
    curr: usize,   // index *one past* the last byte examined
    line: usize,   // 1-based line counter (\n increments)
    eof: bool,     // has the single EOF token been emitted?
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'a [u8]) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            eof: false,
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.src.len()
    }

    /// Advance one byte and return it.  Callers always guard with
    /// [`Scanner::is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.curr];
        self.curr += 1;
        b
    }

    /// Peek at the current byte without consuming it.  Returns `0` past EOF
    /// to avoid branching at the call-site.
    #[inline(always)]
    fn peek(&self) -> u8 {
        self.src.get(self.curr).copied().unwrap_or(0)
    }

    /// Peek one byte beyond [`Scanner::peek`].  Safe at EOF.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        self.src.get(self.curr + 1).copied().unwrap_or(0)
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.curr += 1;
            true
        } else {
            false
        }
    }

    /// The lexeme scanned so far, as owned text.
    fn lexeme(&self) -> String {
        String::from_utf8_lossy(&self.src[self.start..self.curr]).into_owned()
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* token starting at `self.start`.  Returns `Ok(None)`
    /// for whitespace and comments, `Ok(Some(kind))` for a recognised lexeme,
    /// and `Err` for an unexpected or malformed one.
    fn scan_token(&mut self) -> Result<Option<TokenType>> {
        let b = self.advance();

        let kind = match b {
            // ── single-character punctuators ──────────────────────────────
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,

            // ── one- or two-character operators ──────────────────────────
            b'!' => {
                if self.match_byte(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                }
            }

            b'=' => {
                if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                }
            }

            b'<' => {
                if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                }
            }

            b'>' => {
                if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                }
            }

            // ── whitespace / newline ─────────────────────────────────────
            b' ' | b'\r' | b'\t' => return Ok(None),

            b'\n' => {
                self.line += 1;
                return Ok(None);
            }

            // ── comments (// … until newline) ────────────────────────────
            b'/' => {
                if self.match_byte(b'/') {
                    // Fast-forward to the next newline; if none is found,
                    // the comment runs to EOF.
                    match memchr(b'\n', &self.src[self.curr..]) {
                        Some(pos) => self.curr += pos,
                        None => self.curr = self.src.len(),
                    }

                    return Ok(None);
                }

                TokenType::SLASH
            }

            // ── string literal " … " ─────────────────────────────────────
            b'"' => self.scan_string()?,

            // ── number literal (digit-leading) ───────────────────────────
            b'0'..=b'9' => self.scan_number(),

            // ── identifiers / keywords ───────────────────────────────────
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(),

            // ── unexpected character ─────────────────────────────────────
            _ => {
                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", b as char),
                ));
            }
        };

        Ok(Some(kind))
    }

    /// Scan a double-quoted string literal.  Strings may span multiple lines.
    fn scan_string(&mut self) -> Result<TokenType> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // closing quote

        // Contents without the surrounding quotes.
        let contents =
            String::from_utf8_lossy(&self.src[self.start + 1..self.curr - 1]).into_owned();

        Ok(TokenType::STRING(contents))
    }

    /// Scan a numeric literal (`123`, `3.14`).  The fractional part is
    /// optional and requires a digit after the dot, so `123.` scans as the
    /// number `123` followed by a `DOT`.
    fn scan_number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.curr += 1;
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.curr += 1; // consume "."

            while self.peek().is_ascii_digit() {
                self.curr += 1;
            }
        }

        // Digits only, so the parse cannot fail.
        let n: f64 = self.lexeme().parse().unwrap_or(0.0);

        TokenType::NUMBER(n)
    }

    /// Scan an identifier and decide whether it is a **keyword** or a generic
    /// `IDENTIFIER` token.
    fn scan_identifier(&mut self) -> TokenType {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.curr += 1;
        }

        KEYWORDS
            .get(&self.src[self.start..self.curr])
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>; // alias = Result<T, LoxError>

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // EOF guard: emit exactly one EOF token, then terminate.
            if self.is_at_end() {
                if self.eof {
                    return None;
                }

                self.eof = true;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
            }

            self.start = self.curr;

            match self.scan_token() {
                Err(e) => return Some(Err(e)),
                Ok(Some(kind)) => {
                    debug!("Scanned token ({:?}) on line {}", kind, self.line);
                    return Some(Ok(Token::new(kind, self.lexeme(), self.line)));
                }
                // Whitespace or comment: keep scanning.
                Ok(None) => {}
            }
        }
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
