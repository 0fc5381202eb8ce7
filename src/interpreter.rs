//! Tree-walking evaluator.
//!
//! Executes statements against a chain of lexical environments, consuming
//! the resolver's side-table for variable addressing: a recorded distance
//! means "hop exactly that many frames up", absence means "look in the
//! global frame".  The two passes must agree on what introduces a scope;
//! a wrong address reads the wrong frame rather than crashing, so that
//! agreement is a hard invariant.
//!
//! Non-local control flow is modelled as the error channel of [`IResult`]:
//! [`InterpretError::Return`] unwinds to the nearest function-call boundary
//! where `LoxFunction::call` catches it, while [`InterpretError::Runtime`]
//! propagates all the way to [`Interpreter::interpret`], aborting only the
//! current top-level pass.  The interpreter itself — global environment
//! included — stays valid for a subsequent pass, which is what a REPL
//! relies on.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{debug, info};
use thiserror::Error;

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::function::{Callable, LoxFunction, NativeFunction};
use crate::resolver::SideTable;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Evaluation outcome channel.  `Return` is an unwind signal, not a failure:
/// it must never be confused with (or caught as) a runtime error.
#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    #[error("return signal carrying: {0}")]
    Return(Value),
}

impl InterpretError {
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        InterpretError::Runtime {
            message: msg.into(),
            line,
        }
    }

    /// Map onto the crate-wide error type at the interpret boundary.  A
    /// `Return` reaching top level means the resolver let one through, which
    /// it never does for resolved programs.
    fn into_lox(self) -> LoxError {
        match self {
            InterpretError::Runtime { message, line } => LoxError::Runtime { message, line },
            InterpretError::Return(_) => LoxError::runtime(0, "Cannot return from top-level code."),
        }
    }
}

/// Convenient alias for evaluator results.
pub type IResult<T> = Result<T, InterpretError>;

pub struct Interpreter {
    /// The persistent global frame, pre-seeded with host natives.  Lives for
    /// the whole process; an interactive driver reuses it across passes.
    globals: Rc<RefCell<Environment>>,

    /// The currently active frame.
    environment: Rc<RefCell<Environment>>,

    /// Lexical distances from the resolver, merged across passes so REPL
    /// lines keep earlier bindings addressable.
    locals: HashMap<ExprId, usize>,

    /// Sink for `print` output.  Injectable so tests capture prints without
    /// touching process stdout.
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create a new interpreter printing to stdout, with native functions
    /// such as `clock` defined in the global frame.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Create a new interpreter printing to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: |_args: &[Value]| {
                    let timestamp: f64 = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map_err(|e: SystemTimeError| format!("Clock error: {}", e))?
                        .as_secs_f64();

                    Ok(Value::Number(timestamp))
                },
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    /// Execute a program against this interpreter's state.
    ///
    /// `locals` is the side-table produced by resolving exactly these
    /// statements; it is merged into any table from earlier passes.  A
    /// runtime error aborts the remaining statements of *this* call only.
    pub fn interpret(
        &mut self,
        statements: &[Stmt],
        locals: &SideTable,
    ) -> crate::error::Result<()> {
        debug!("Interpreting {} statements", statements.len());

        self.locals.extend(locals.iter().map(|(id, d)| (*id, *d)));

        for stmt in statements {
            self.execute(stmt).map_err(InterpretError::into_lox)?;
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Evaluate a single expression (the `evaluate` subcommand).  No
    /// side-table: every name resolves against the global frame.
    pub fn evaluate_expression(&mut self, expr: &Expr) -> crate::error::Result<Value> {
        self.evaluate(expr).map_err(InterpretError::into_lox)
    }

    // ─────────────────────────── statements ────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.out, "{}", value).map_err(|e| {
                    InterpretError::runtime(0, format!("Failed to write output: {}", e))
                })?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(())
            }

            Stmt::Block(statements) => {
                let child = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, Rc::new(RefCell::new(child)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }

            // The closure captures the environment active at *declaration*
            // time, not call time.
            Stmt::Function(decl) => {
                let function = LoxFunction::new(
                    Rc::clone(decl),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(InterpretError::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Run `statements` against `environment`, restoring the previous frame
    /// afterwards no matter how the block exits — normal completion, return
    /// signal, or error.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> IResult<()> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result = Ok(());
        for stmt in statements {
            result = self.execute(stmt);
            if result.is_err() {
                break;
            }
        }

        self.environment = previous;
        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> IResult<()> {
        debug!("Declaring class '{}'", name.lexeme);

        // Placeholder binding first, so method bodies can reference the
        // class name before the class value exists.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let superclass_value = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let line = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };
                    return Err(InterpretError::runtime(line, "Superclass must be a class."));
                }
            },
            None => None,
        };

        // Methods close over an extra frame binding `super` when a
        // superclass exists; the resolver pushed the matching scope.
        let method_env = match &superclass_value {
            Some(class) => {
                let mut env = Environment::with_enclosing(Rc::clone(&self.environment));
                env.define("super", Value::Class(Rc::clone(class)));
                Rc::new(RefCell::new(env))
            }
            None => Rc::clone(&self.environment),
        };

        let mut method_table = HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme == "init";
            let function =
                LoxFunction::new(Rc::clone(method), Rc::clone(&method_env), is_initializer);
            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass_value, method_table);

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(Rc::new(class)))
            .map_err(|message| InterpretError::runtime(name.line, message))?;

        Ok(())
    }

    // ─────────────────────────── expressions ───────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(Self::evaluate_literal(value)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right),

            Expr::Variable { id, name } => self.lookup_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                self.assign_variable(*id, name, value.clone())?;
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(InterpretError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.borrow_mut().set(name, value.clone());
                    Ok(value)
                }
                _ => Err(InterpretError::runtime(
                    name.line,
                    "Only instances have fields.",
                )),
            },

            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_literal(value: &LiteralValue) -> Value {
        match value {
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::Str(s) => Value::String(s.clone()),
            LiteralValue::True => Value::Bool(true),
            LiteralValue::False => Value::Bool(false),
            LiteralValue::Nil => Value::Nil,
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> IResult<Value> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(InterpretError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),

            _ => Err(InterpretError::runtime(
                operator.line,
                format!("Invalid unary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> IResult<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        // Equality never type-errors; everything else below wants numbers,
        // except `+` which also concatenates strings.
        match operator.token_type {
            TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left == right)),
            TokenType::BANG_EQUAL => return Ok(Value::Bool(left != right)),
            _ => {}
        }

        if let TokenType::PLUS = operator.token_type {
            return match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(InterpretError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),
            };
        }

        let (a, b) = match (left, right) {
            (Value::Number(a), Value::Number(b)) => (a, b),
            _ => {
                return Err(InterpretError::runtime(
                    operator.line,
                    "Operands must be numbers.",
                ))
            }
        };

        let value = match operator.token_type {
            TokenType::MINUS => Value::Number(a - b),
            TokenType::STAR => Value::Number(a * b),
            // Division by zero follows IEEE-754: 1/0 is inf, 0/0 is NaN.
            TokenType::SLASH => Value::Number(a / b),
            TokenType::GREATER => Value::Bool(a > b),
            TokenType::GREATER_EQUAL => Value::Bool(a >= b),
            TokenType::LESS => Value::Bool(a < b),
            TokenType::LESS_EQUAL => Value::Bool(a <= b),
            _ => {
                return Err(InterpretError::runtime(
                    operator.line,
                    format!("Invalid binary operator '{}'.", operator.lexeme),
                ))
            }
        };

        Ok(value)
    }

    /// Short-circuit: the left value itself is returned when it decides the
    /// outcome, and the right operand is not evaluated at all.
    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> IResult<Value> {
        let left = self.evaluate(left)?;

        match operator.token_type {
            TokenType::OR if left.is_truthy() => Ok(left),
            TokenType::AND if !left.is_truthy() => Ok(left),
            _ => self.evaluate(right),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> IResult<Value> {
        let callee = self.evaluate(callee)?;

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        let Some(callable) = as_callable(&callee) else {
            return Err(InterpretError::runtime(
                paren.line,
                "Can only call functions and classes.",
            ));
        };

        if args.len() != callable.arity() {
            return Err(InterpretError::runtime(
                paren.line,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    args.len()
                ),
            ));
        }

        callable.call(self, &args, paren)
    }

    /// `super.method`: the superclass is fetched at the statically resolved
    /// distance, `this` one frame closer, and the method is bound to the
    /// *calling instance* so further dispatch from inside it stays dynamic.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> IResult<Value> {
        let distance = *self.locals.get(&id).ok_or_else(|| {
            InterpretError::runtime(keyword.line, "Unresolved 'super' reference.")
        })?;

        let superclass = Environment::get_at(&self.environment, distance, "super")
            .map_err(|message| InterpretError::runtime(keyword.line, message))?;

        let object = Environment::get_at(&self.environment, distance - 1, "this")
            .map_err(|message| InterpretError::runtime(keyword.line, message))?;

        let Value::Class(superclass) = superclass else {
            return Err(InterpretError::runtime(
                keyword.line,
                "'super' does not refer to a class.",
            ));
        };

        let Some(found) = superclass.find_method(&method.lexeme) else {
            return Err(InterpretError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            ));
        };

        Ok(Value::Function(Rc::new(found.bind(object))))
    }

    // ─────────────────────── variable addressing ───────────────────────

    fn lookup_variable(&self, id: ExprId, name: &Token) -> IResult<Value> {
        let result = match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme),
            None => self.globals.borrow().get(&name.lexeme),
        };

        result.map_err(|message| InterpretError::runtime(name.line, message))
    }

    fn assign_variable(&mut self, id: ExprId, name: &Token, value: Value) -> IResult<()> {
        let result = match self.locals.get(&id) {
            Some(&distance) => {
                Environment::assign_at(&self.environment, distance, &name.lexeme, value)
            }
            None => self.globals.borrow_mut().assign(&name.lexeme, value),
        };

        result.map_err(|message| InterpretError::runtime(name.line, message))
    }
}

/// View a value through the [`Callable`] capability, if it has one.
fn as_callable(value: &Value) -> Option<&dyn Callable> {
    match value {
        Value::Function(f) => Some(f.as_ref()),
        Value::NativeFunction(f) => Some(f.as_ref()),
        Value::Class(c) => Some(c),
        _ => None,
    }
}
