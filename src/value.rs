//! Runtime values.
//!
//! Scalars are stored inline; functions, classes, and instances are
//! `Rc`-shared, so cloning a [`Value`] is always cheap and two clones of a
//! reference value observe the same underlying object.  Equality on
//! reference values is pointer identity, matching Lox semantics where two
//! distinct instances are never `==` even with identical fields.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::class::{LoxClass, LoxInstance};
use crate::function::{LoxFunction, NativeFunction};

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    NativeFunction(Rc<NativeFunction>),
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<RefCell<LoxInstance>>),
}

impl Value {
    /// `nil` and `false` are falsy; every other value (including `0` and
    /// `""`) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// The evaluator's "stringify" form: `nil` prints as `nil`, integral
    /// numbers print without a trailing `.0`, everything else uses its
    /// natural textual form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.0e18 {
                    let mut buf = itoa::Buffer::new();
                    f.write_str(buf.format(*n as i64))
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::NativeFunction(func) => write!(f, "<native fn {}>", func.name),

            Value::Function(func) => write!(f, "<fn {}>", func.name()),

            Value::Class(class) => write!(f, "{}", class.name),

            Value::Instance(instance) => {
                write!(f, "{} instance", instance.borrow().class().name)
            }
        }
    }
}
