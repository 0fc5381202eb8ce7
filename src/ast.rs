//! Abstract syntax tree for Lox.
//!
//! Expressions and statements are **closed sum types**; every pass over the
//! tree (resolver, printer, evaluator) pattern-matches exhaustively instead
//! of going through visitor double-dispatch, so adding a node variant is a
//! compile-time checklist of every place that must handle it.
//!
//! Variable-reference nodes (`Variable`, `Assign`, `This`, `Super`) carry a
//! parser-assigned [`ExprId`].  The resolver keys its lexical-distance
//! side-table on these ids, which stands in for node identity: two
//! occurrences of the same name are distinct nodes with distinct ids and may
//! resolve to different frames.

use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::token::Token;

/// Identity of a resolvable expression node.
///
/// Ids are process-unique, not per-parse: an interactive session merges the
/// side-tables of successive passes into one interpreter, and a later line's
/// function may close over an earlier line's tree, so ids from different
/// parses must never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

impl ExprId {
    /// Mint a fresh, never-before-issued id.
    pub fn next() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        ExprId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A **literal constant** that appears directly in the source code.
///
/// These variants are the terminal leaves of the expression tree; the parser
/// copies the value out of the token at parse time so the AST owns its data.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal, stored as IEEE-754 `f64`.  Integral lexemes such as
    /// `"3"` are still parsed as `3.0`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// The boolean constant `true`.
    True,

    /// The boolean constant `false`.
    False,

    /// The `nil` literal.
    Nil,
}

/// AST node for every kind of *expression* in Lox.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Parenthesised sub-expression: `"(" expression ")"`.
    Grouping(Box<Expr>),

    /// Prefix unary operator expression, e.g. `!isReady` or `-42`.
    Unary {
        /// The operator token (`!` or `-`).
        operator: Token,
        right: Box<Expr>,
    },

    /// Infix binary operator expression, e.g. `a + b` or `x <= y`.
    Binary {
        left: Box<Expr>,
        /// Operator token such as `+`, `*`, `==`, …
        operator: Token,
        right: Box<Expr>,
    },

    /// Short-circuiting logical operators `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Variable access.
    Variable { id: ExprId, name: Token },

    /// Assignment expression: `identifier "=" expression`.
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// Function- or method-call expression.
    Call {
        /// Expression that evaluates to a callable (variable, property, …).
        callee: Box<Expr>,
        /// The closing `)` token, retained for error reporting.
        paren: Token,
        /// Argument list (may be empty).
        arguments: Vec<Expr>,
    },

    /// Property read: `object.property`.
    Get { object: Box<Expr>, name: Token },

    /// Property write: `object.property = value`.
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// The `this` keyword inside a method.
    This { id: ExprId, keyword: Token },

    /// Superclass method access: `super.method`.
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
}

/// A named function declaration: shared between the AST ([`Stmt::Function`],
/// class method lists) and runtime function values, which keep the same
/// `Rc` alive for as long as the function can be called.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,

    /// Parameter name tokens (arity ≤ 255, enforced by the parser).
    pub params: Vec<Token>,

    /// Body executed when the function is called.
    pub body: Vec<Stmt>,
}

/// AST node for *statements*.  A program is a sequence of these, as returned
/// by `Parser::parse`.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Stand-alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print` statement.
    Print(Expr),

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    /// `if` / `else` conditional.
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while` loop.  `for` loops desugar to this plus a wrapping block.
    While { condition: Expr, body: Box<Stmt> },

    /// Function declaration — becomes a first-class callable value.
    Function(Rc<FunctionDecl>),

    /// `return` statement inside a function body.
    Return {
        /// The `return` keyword token (for error locations).
        keyword: Token,

        /// Optional expression to return.  Absent ⇒ `nil`.
        value: Option<Expr>,
    },

    /// Class declaration with optional superclass and method list.
    Class {
        name: Token,

        /// Always an [`Expr::Variable`] when present; kept as an expression
        /// so the resolver and evaluator treat it as an ordinary reference.
        superclass: Option<Expr>,

        methods: Vec<Rc<FunctionDecl>>,
    },
}
