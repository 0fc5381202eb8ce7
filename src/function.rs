//! Callable runtime objects: user-defined functions and host natives.
//!
//! [`Callable`] is a capability, not a hierarchy: anything exposing an arity
//! and a call operation.  The interpreter checks arity at the call site and
//! then dispatches through the trait, so user functions, classes (as
//! constructors), and natives share one seam.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::interpreter::{IResult, Interpreter, InterpretError};
use crate::token::Token;
use crate::value::Value;

/// Capability shared by every value that can appear as a call target.
pub trait Callable {
    /// Number of arguments the target expects; checked by the interpreter
    /// before [`Callable::call`] runs.
    fn arity(&self) -> usize;

    /// Invoke the target.  `paren` is the call-site `)` token, kept for
    /// error reporting.
    fn call(&self, interpreter: &mut Interpreter, arguments: &[Value], paren: &Token)
        -> IResult<Value>;
}

/// A host-native function exposed to Lox programs (e.g. `clock`).
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, String>,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        arguments: &[Value],
        paren: &Token,
    ) -> IResult<Value> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(arguments).map_err(|message| InterpretError::runtime(paren.line, message))
    }
}

/// A user-defined function: the shared declaration plus the environment
/// captured at declaration time.  Binding a method to an instance produces a
/// new `LoxFunction` whose closure has `this` injected one frame in.
#[derive(Debug)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    /// A copy of this function whose closure binds `this` to `instance`.
    /// The extra frame mirrors the `this` scope the resolver pushed around
    /// method bodies, so recorded distances line up.
    pub fn bind(&self, instance: Value) -> LoxFunction {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment.define("this", instance);

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }

    /// The bound instance, for initializers that must yield `this`.
    fn bound_this(&self) -> IResult<Value> {
        Environment::get_at(&self.closure, 0, "this")
            .map_err(|message| InterpretError::runtime(self.declaration.name.line, message))
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Value],
        _paren: &Token,
    ) -> IResult<Value> {
        debug!("Calling function '{}'", self.name());

        // The new frame's parent is the *captured* environment, not the
        // caller's — this is what makes scope lexical rather than dynamic.
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, argument) in self.declaration.params.iter().zip(arguments.iter()) {
            environment.define(&param.lexeme, argument.clone());
        }

        let result = interpreter.execute_block(
            &self.declaration.body,
            Rc::new(RefCell::new(environment)),
        );

        match result {
            // `return` unwinds exactly to this call boundary and no further.
            Err(InterpretError::Return(value)) => {
                if self.is_initializer {
                    self.bound_this()
                } else {
                    Ok(value)
                }
            }

            Ok(()) => {
                if self.is_initializer {
                    self.bound_this()
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(e) => Err(e),
        }
    }
}
