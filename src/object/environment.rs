use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::object::Object;

#[derive(Debug)]
pub(crate) struct EnvironmentInner {
    pub(crate) store: IndexMap<String, Object>,
    pub(crate) outer: Option<Environment>,
}

/// Weak handle to a scope record. The evaluator's heap holds the one strong
/// reference; a handle that is still reachable from the root scope is always
/// backed by a live record, because the sweep frees unreachable records only.
#[derive(Clone, Debug)]
pub struct Environment(pub(crate) Weak<RefCell<EnvironmentInner>>);

impl Environment {
    pub fn get(&self, key: &str) -> Option<Object> {
        let cell = self.upgrade();
        let inner = cell.borrow();

        match inner.store.get(key) {
            Some(value) => Some(value.clone()),
            None => inner.outer.as_ref().and_then(|outer| outer.get(key)),
        }
    }

    /// Writes into this scope only; shadowed outer bindings are untouched.
    /// The key is copied.
    pub fn set(&self, key: &str, value: Object) {
        self.upgrade()
            .borrow_mut()
            .store
            .insert(key.to_string(), value);
    }

    pub(crate) fn upgrade(&self) -> Rc<RefCell<EnvironmentInner>> {
        self.0
            .upgrade()
            .expect("environment was collected while still referenced")
    }
}
