//! Shared variable store.
//!
//! One store is created per top-level run and handed by reference to every
//! nested state machine, so a write made inside an included file is visible
//! to the includer and to files included after it.  Keys are case-folded to
//! lowercase on every read and write.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::script::Value;

/// Handle shared by the state machines and the script evaluator.
pub type SharedVars = Rc<RefCell<VarStore>>;

/// Case-insensitive key/value variable store.
#[derive(Debug, Default)]
pub struct VarStore {
    vars: HashMap<String, Value>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh store in a [`SharedVars`] handle.
    pub fn shared() -> SharedVars {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Set (or overwrite) a variable.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.vars.insert(name.to_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(&name.to_lowercase())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut vars = VarStore::new();
        vars.set("title", "Hello");
        assert_eq!(vars.get("title"), Some(&Value::from("Hello")));
    }

    #[test]
    fn keys_are_case_insensitive() {
        let mut vars = VarStore::new();
        vars.set("FOO", 3i64);
        assert_eq!(vars.get("foo"), Some(&Value::Int(3)));
        assert_eq!(vars.get("Foo"), Some(&Value::Int(3)));
        vars.set("foo", 4i64);
        assert_eq!(vars.get("FOO"), Some(&Value::Int(4)));
        assert_eq!(vars.vars.len(), 1);
    }

    #[test]
    fn contains_ignores_case() {
        let mut vars = VarStore::new();
        vars.set("Here", true);
        assert!(vars.contains("HERE"));
        assert!(!vars.contains("gone"));
    }

    #[test]
    fn shared_handle_sees_writes() {
        let vars = VarStore::shared();
        let other = Rc::clone(&vars);
        other.borrow_mut().set("x", 1i64);
        assert!(vars.borrow().contains("x"));
    }
}
