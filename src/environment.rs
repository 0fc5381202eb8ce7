//! Chained lexical environments.
//!
//! An environment maps names to values and optionally points at an enclosing
//! environment; the chain from any frame to the global frame is finite and
//! acyclic.  Frames are shared (`Rc<RefCell<_>>`) because every closure
//! created while a frame was active keeps it alive, and two closures from
//! the same block alias the same frame.
//!
//! Two addressing modes coexist: chain-walking `get`/`assign` for globals
//! (no side-table entry), and `get_at`/`assign_at` which hop exactly the
//! resolver-computed distance and then look only in that frame's own map.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    /// A root environment with no parent (the global frame).
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    /// A child frame of `enclosing`.
    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Bind `name` in this frame.  Re-defining an existing name is allowed
    /// here (last write wins); the resolver rejects it for locals before
    /// execution ever starts.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Read `name`, walking the chain outward.  Used only for names the
    /// resolver classified as global.
    pub fn get(&self, name: &str) -> Result<Value, String> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(format!("Undefined variable '{}'.", name))
        }
    }

    /// Write to an existing `name`, walking the chain outward.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), String> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(format!("Undefined variable '{}'.", name))
        }
    }

    /// The frame exactly `distance` hops up the chain from `env`.
    ///
    /// A distance past the end of the chain means the resolver and the
    /// evaluator disagree about scope shape; that is reported rather than
    /// unwrapped so a resolver bug surfaces as a runtime diagnostic.
    fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Result<Rc<RefCell<Environment>>, String> {
        let mut frame = Rc::clone(env);

        for _ in 0..distance {
            let parent = frame
                .borrow()
                .enclosing
                .clone()
                .ok_or_else(|| format!("No enclosing environment at distance {}.", distance))?;
            frame = parent;
        }

        Ok(frame)
    }

    /// Read `name` from the frame at exactly `distance` hops — no further
    /// chain fallback from there.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
    ) -> Result<Value, String> {
        let frame = Self::ancestor(env, distance)?;
        let value = frame
            .borrow()
            .values
            .get(name)
            .cloned()
            .ok_or_else(|| format!("Undefined variable '{}'.", name))?;

        Ok(value)
    }

    /// Write `name` in the frame at exactly `distance` hops.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
    ) -> Result<(), String> {
        let frame = Self::ancestor(env, distance)?;
        frame.borrow_mut().define(name, value);

        Ok(())
    }
}
