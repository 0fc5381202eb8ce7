//! Static resolver pass.
//!
//! One walk over the parsed tree does three things:
//! 1. Build lexical scopes (a stack of `HashMap<String, bool>` tracking
//!    declared/defined names).
//! 2. Report static errors: redeclaration in the same scope, reading a
//!    variable inside its own initializer, invalid `return`/`this`/`super`
//!    placement, a class inheriting from itself.
//! 3. Record, for each `Variable`/`Assign`/`This`/`Super` node, the number
//!    of environment hops between its occurrence and the frame declaring the
//!    name.  Names found in no scope are left out of the table and resolve
//!    against the global environment at run time.
//!
//! The scope stack must introduce a scope for exactly the constructs the
//! evaluator gives a fresh environment: blocks, function bodies (parameters
//! included), the `this` binding layer around method bodies, and the `super`
//! layer around methods of a subclass.  Any divergence makes the recorded
//! distances address the wrong frame, silently.

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::token::Token;

/// Lexical distances, keyed by node identity.  The only channel between the
/// resolver and the evaluator.
pub type SideTable = HashMap<ExprId, usize>;

/// What kind of function body are we inside?  Gates `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// Are we inside a class body, and does that class have a superclass?
/// Gates `this` and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances into a [`SideTable`].
pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>, // false = declared, true = defined
    locals: SideTable,
    errors: Vec<LoxError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top-level statements.  Errors aggregate: the walk keeps
    /// going after a bad construct so one pass reports everything.
    pub fn resolve(mut self, statements: &[Stmt]) -> Result<SideTable, Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            Ok(self.locals)
        } else {
            Err(self.errors)
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            // declare → resolve initializer → define; the gap between the
            // two phases is what catches `var a = a;`.
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            // The name is defined *before* the body resolves, so a function
            // can recurse into itself.
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.report(LoxError::resolve(
                        keyword,
                        "Cannot return from top-level code",
                    ));
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.report(LoxError::resolve(
                            keyword,
                            "Cannot return a value from an initializer",
                        ));
                    }

                    self.resolve_expr(expr);
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[std::rc::Rc<FunctionDecl>],
    ) {
        let enclosing = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                if super_name.lexeme == name.lexeme {
                    self.report(LoxError::resolve(
                        super_name,
                        "A class cannot inherit from itself",
                    ));
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            // Extra layer holding `super`, mirroring the closure environment
            // the evaluator wraps around subclass methods.
            self.begin_scope();
            self.scope_insert("super");
        }

        self.begin_scope();
        self.scope_insert("this");

        for method in methods {
            let declaration = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, declaration);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                // Declared but not yet defined means we are inside this very
                // variable's initializer.
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.report(LoxError::resolve(
                            name,
                            "Cannot read local variable in its own initializer",
                        ));
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.report(LoxError::resolve(
                        keyword,
                        "Cannot use 'this' outside of a class",
                    ));
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.report(LoxError::resolve(
                            keyword,
                            "Cannot use 'super' outside of a class",
                        ));
                    }
                    ClassType::Class => {
                        self.report(LoxError::resolve(
                            keyword,
                            "Cannot use 'super' in a class with no superclass",
                        ));
                    }
                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, decl: &FunctionDecl, ftype: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = ftype;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Insert a synthetic, already-defined binding into the current scope
    /// (`this` / `super`).
    fn scope_insert(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                let err = LoxError::resolve(name, "Variable already declared in this scope");
                self.report(err);
                return;
            }

            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn report(&mut self, err: LoxError) {
        self.errors.push(err);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at the depth of the innermost scope
    /// containing the name, or as a global (no entry) if none does.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
