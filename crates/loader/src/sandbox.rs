//! Isolation-boundary collaborator.
//!
//! The loader never executes scripts. It only asks the sandbox which global
//! property was assigned last and what that property currently holds.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;

pub trait Sandbox {
    /// Name of the most recently assigned global property, if any.
    fn latest_set_prop(&self) -> Option<String>;

    fn global(&self, prop: &str) -> Option<Value>;
}

/// What an entry resolved to.
#[derive(Clone, Debug, PartialEq)]
pub enum EntryValue {
    /// The document had no external script to wait for.
    Empty,
    /// Value exposed by the entry script.
    Exports(Value),
}

impl EntryValue {
    /// Reads the entry's exports from `sandbox` as it stands now.
    ///
    /// Without a sandbox, or before any global was assigned, this is an
    /// empty object. A recorded property that no longer resolves is `null`.
    pub fn capture(sandbox: Option<&dyn Sandbox>) -> Self {
        let value = match sandbox.and_then(|sandbox| sandbox.latest_set_prop().map(|p| (sandbox, p))) {
            Some((sandbox, prop)) => sandbox.global(&prop).unwrap_or(Value::Null),
            None => Value::Object(Map::new()),
        };
        EntryValue::Exports(value)
    }

    pub fn exports(&self) -> Option<&Value> {
        match self {
            EntryValue::Exports(value) => Some(value),
            EntryValue::Empty => None,
        }
    }
}

/// Table-backed sandbox for tests and headless hosts.
#[derive(Debug, Default)]
pub struct MemorySandbox {
    globals: RefCell<HashMap<String, Value>>,
    latest: RefCell<Option<String>>,
}

impl MemorySandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a global, the way an executing script would.
    pub fn set_global(&self, prop: impl Into<String>, value: Value) {
        let prop = prop.into();
        *self.latest.borrow_mut() = Some(prop.clone());
        self.globals.borrow_mut().insert(prop, value);
    }

    pub fn remove_global(&self, prop: &str) -> Option<Value> {
        self.globals.borrow_mut().remove(prop)
    }
}

impl Sandbox for MemorySandbox {
    fn latest_set_prop(&self) -> Option<String> {
        self.latest.borrow().clone()
    }

    fn global(&self, prop: &str) -> Option<Value> {
        self.globals.borrow().get(prop).cloned()
    }
}
