use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::ast::BlockStatement;
use crate::object::environment::{Environment, EnvironmentInner};
use crate::object::{FunctionObject, FunctionRef, Object, ObjectRef};

/// The one strong reference to a heap allocation, tagged with its kind.
#[derive(Debug)]
enum HeapEntry {
    Environment(Rc<RefCell<EnvironmentInner>>),
    Object(Rc<Object>),
    Function(Rc<FunctionObject>),
}

impl HeapEntry {
    fn address(&self) -> usize {
        match self {
            HeapEntry::Environment(rc) => address_of(rc),
            HeapEntry::Object(rc) => address_of(rc),
            HeapEntry::Function(rc) => address_of(rc),
        }
    }
}

/// Registry of every Environment, FunctionObject and return payload the
/// evaluator has allocated, keyed by stable allocation address. Values
/// elsewhere hold weak handles only, so a closure and the environment that
/// stores it never form a strong cycle: liveness is decided by tracing from
/// the roots, and dropping an entry frees it outright.
#[derive(Debug, Default)]
pub struct Heap {
    entries: HashMap<usize, HeapEntry>,
}

impl Heap {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn alloc_environment(&mut self, outer: Option<Environment>) -> Environment {
        let inner = Rc::new(RefCell::new(EnvironmentInner {
            store: IndexMap::new(),
            outer,
        }));
        let handle = Environment(Rc::downgrade(&inner));
        self.register(HeapEntry::Environment(inner));
        handle
    }

    pub fn alloc_return(&mut self, value: Object) -> ObjectRef {
        let payload = Rc::new(value);
        let handle = ObjectRef(Rc::downgrade(&payload));
        self.register(HeapEntry::Object(payload));
        handle
    }

    pub fn alloc_function(
        &mut self,
        parameters: Vec<String>,
        body: BlockStatement,
        environment: Environment,
    ) -> FunctionRef {
        let function = Rc::new(FunctionObject {
            parameters,
            body,
            environment,
        });
        let handle = FunctionRef(Rc::downgrade(&function));
        self.register(HeapEntry::Function(function));
        handle
    }

    fn register(&mut self, entry: HeapEntry) {
        self.entries.insert(entry.address(), entry);
    }

    /// Mark-and-sweep pass: trace everything reachable from `root` and from
    /// the in-flight `result` value, then drop every other entry. Returns
    /// the number of entries freed.
    pub fn collect(&mut self, root: &Environment, result: &Object) -> usize {
        let mut reachable = HashSet::new();
        mark_environment(root, &mut reachable);
        mark_object(result, &mut reachable);

        let before = self.entries.len();
        self.entries.retain(|address, _| reachable.contains(address));
        let freed = before - self.entries.len();

        trace!(freed, live = self.entries.len(), "swept heap");

        freed
    }
}

fn address_of<T>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

fn mark_environment(environment: &Environment, reachable: &mut HashSet<usize>) {
    let cell = environment.upgrade();
    if !reachable.insert(address_of(&cell)) {
        return;
    }

    let inner = cell.borrow();
    if let Some(outer) = &inner.outer {
        mark_environment(outer, reachable);
    }
    for value in inner.store.values() {
        mark_object(value, reachable);
    }
}

fn mark_object(object: &Object, reachable: &mut HashSet<usize>) {
    match object {
        Object::Return(payload) => {
            let payload = payload.get();
            if reachable.insert(address_of(&payload)) {
                mark_object(&payload, reachable);
            }
        }
        Object::Function(function) => {
            let function = function.get();
            if reachable.insert(address_of(&function)) {
                mark_environment(&function.environment, reachable);
            }
        }
        _ => {}
    }
}
