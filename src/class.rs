//! Classes and instances.
//!
//! A class owns its method table and an optional shared reference to its
//! superclass, used for method lookup only — no state is copied down.  Both
//! are immutable once the class statement has executed.  Instances own their
//! mutable field map; fields are created on first assignment, never declared.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::function::{Callable, LoxFunction};
use crate::interpreter::{IResult, Interpreter, InterpretError};
use crate::token::Token;
use crate::value::Value;

#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Closest-first method lookup: this class's own table, then the
    /// superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }
}

/// Calling a class constructs an instance.  Implemented on `Rc<LoxClass>`
/// because the new instance must hold a shared reference to its class.
impl Callable for Rc<LoxClass> {
    /// A class's arity is its `init` arity, or zero without one.
    fn arity(&self) -> usize {
        self.find_method("init")
            .map(|init| init.arity())
            .unwrap_or(0)
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Value],
        paren: &Token,
    ) -> IResult<Value> {
        debug!("Constructing instance of '{}'", self.name);

        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(self))));

        // `init` is dispatched through the superclass chain, bound to the
        // fresh instance, and its return value discarded: construction
        // always yields the instance.
        if let Some(init) = self.find_method("init") {
            init.bind(Value::Instance(Rc::clone(&instance)))
                .call(interpreter, arguments, paren)?;
        }

        Ok(Value::Instance(instance))
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass> {
        &self.class
    }

    /// Property read: the instance's own fields shadow class methods.  A
    /// method hit is bound to this instance so `this` works inside it.
    pub fn get(instance: &Rc<RefCell<LoxInstance>>, name: &Token) -> IResult<Value> {
        if let Some(value) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = instance.borrow().class.find_method(&name.lexeme) {
            let bound = method.bind(Value::Instance(Rc::clone(instance)));
            return Ok(Value::Function(Rc::new(bound)));
        }

        Err(InterpretError::runtime(
            name.line,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    /// Property write: always lands in the instance's own field map,
    /// creating the field if needed.
    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
