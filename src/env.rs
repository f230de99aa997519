// ABOUTME: Environment module for managing variable bindings and scopes

use crate::error::{ErrorKind, EvalError};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A single frame in the lexical environment chain.
///
/// Frames are shared through `Rc` so closures can capture them; bindings
/// use interior mutability because `set` writes through shared frames.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new root environment with no parent
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a new child environment with a parent
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    pub fn parent(&self) -> Option<&Rc<Environment>> {
        self.parent.as_ref()
    }

    /// Defines a binding in THIS frame. Fails if the name already exists
    /// here; shadowing an outer binding is fine.
    pub fn define(&self, name: &str, value: Value) -> Result<(), EvalError> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return Err(EvalError::new(ErrorKind::Assertion(format!(
                "variable {} already defined",
                name
            ))));
        }
        bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Removes a binding from THIS frame. Fails if absent here.
    pub fn undefine(&self, name: &str) -> Result<(), EvalError> {
        if self.bindings.borrow_mut().remove(name).is_none() {
            return Err(EvalError::new(ErrorKind::Assertion(format!(
                "variable {} is not defined",
                name
            ))));
        }
        Ok(())
    }

    /// Returns the frame owning `name`, searching up the chain.
    pub fn is_defined(self: &Rc<Self>, name: &str) -> Option<Rc<Environment>> {
        if self.bindings.borrow().contains_key(name) {
            return Some(self.clone());
        }
        self.parent.as_ref().and_then(|p| p.is_defined(name))
    }

    /// Reads the nearest binding of `name`, failing if unbound.
    pub fn read(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Ok(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.read(name),
            None => Err(EvalError::new(ErrorKind::UndefinedSymbol(name.to_string()))),
        }
    }

    /// Mutates the nearest binding of `name`, failing at the root if the
    /// name was never bound (contrast `define`).
    pub fn write(&self, name: &str, value: Value) -> Result<(), EvalError> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            bindings.insert(name.to_string(), value);
            return Ok(());
        }
        drop(bindings);
        match &self.parent {
            Some(parent) => parent.write(name, value),
            None => Err(EvalError::new(ErrorKind::WriteToUnbound(name.to_string()))),
        }
    }
}
