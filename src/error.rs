//! Centralised error hierarchy for the **treelox** interpreter.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables
//! a uniform `Result<T>` alias throughout the crate and ergonomic
//! inter-operation with `anyhow`, while still preserving rich diagnostic
//! detail.
//!
//! Reported diagnostics follow the canonical shape
//! `[line <n>] Error<where>: <message>`, where `<where>` is empty, `" at end"`
//! or `" at '<lexeme>'"`.  Runtime errors print their message followed by the
//! offending line.  The module **does not** print diagnostics itself.

use std::io;

use log::debug;
use thiserror::Error;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error, located at a concrete token.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        line: usize,

        /// `""`, `" at end"`, or `" at '<lexeme>'"`.
        location: String,
    },

    /// Static-analysis failure found by the resolver pass.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        line: usize,
        location: String,
    },

    /// Runtime evaluation error.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF-8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**, anchored at `token`.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!(
            "Creating Parse error: line={}, at={:?}, msg={}",
            token.line, token.lexeme, message
        );

        LoxError::Parse {
            message,
            line: token.line,
            location: locate(token),
        }
    }

    /// Helper constructor for the **resolver**, anchored at `token`.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!(
            "Creating Resolve error: line={}, at={:?}, msg={}",
            token.line, token.lexeme, message
        );

        LoxError::Resolve {
            message,
            line: token.line,
            location: locate(token),
        }
    }

    /// Helper constructor for **runtime** failures.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        LoxError::Runtime {
            message: msg.into(),
            line,
        }
    }
}

/// Render the `<where>` part of a diagnostic for `token`.
fn locate(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
