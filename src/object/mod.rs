use std::fmt;
use std::rc::{Rc, Weak};

use thiserror::Error;

use crate::ast::BlockStatement;

pub mod environment;
pub mod heap;

pub use crate::object::environment::Environment;
pub use crate::object::heap::Heap;

/// Runtime values. `Integer`, `Boolean` and `Null` are inline and freely
/// copyable; `Return` and `Function` carry weak handles into the evaluator's
/// heap and outlive neither a sweep that proves them unreachable nor the
/// evaluator itself.
#[derive(Clone, Debug)]
pub enum Object {
    Null,
    Integer(i64),
    Boolean(bool),
    Return(ObjectRef),
    Function(FunctionRef),
}

/// A closure: parameter names and body cloned out of the AST, plus the
/// environment that was current at definition time.
#[derive(Debug)]
pub struct FunctionObject {
    pub parameters: Vec<String>,
    pub body: BlockStatement,
    pub environment: Environment,
}

/// Weak handle to a heap-registered return payload.
#[derive(Clone, Debug)]
pub struct ObjectRef(pub(crate) Weak<Object>);

/// Weak handle to a heap-registered function object.
#[derive(Clone, Debug)]
pub struct FunctionRef(pub(crate) Weak<FunctionObject>);

impl ObjectRef {
    pub fn upgrade(&self) -> Option<Rc<Object>> {
        self.0.upgrade()
    }

    pub fn get(&self) -> Rc<Object> {
        self.upgrade()
            .expect("return payload was collected while still referenced")
    }
}

impl FunctionRef {
    pub fn upgrade(&self) -> Option<Rc<FunctionObject>> {
        self.0.upgrade()
    }

    pub fn get(&self) -> Rc<FunctionObject> {
        self.upgrade()
            .expect("function was collected while still referenced")
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Integer(v) => write!(f, "{}", v),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::Return(payload) => write!(f, "{}", payload.get()),
            Object::Function(function) => {
                let function = function.get();
                write!(f, "fn({}) {}", function.parameters.join(", "), function.body)
            }
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Return(a), Object::Return(b)) => a.0.ptr_eq(&b.0),
            (Object::Function(a), Object::Function(b)) => a.0.ptr_eq(&b.0),
            _ => false,
        }
    }
}

impl Object {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Boolean(false))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Object::Null => "NULL",
            Object::Integer(_) => "INTEGER",
            Object::Boolean(_) => "BOOLEAN",
            Object::Return(_) => "RETURN",
            Object::Function(_) => "FUNCTION",
        }
    }
}

pub type EvalResult = std::result::Result<Object, EvalError>;

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("not a function: {0}")]
    NotAFunction(String),
    #[error("wrong number of arguments: expected {expected}, got {got}")]
    FunctionArgumentMismatch { expected: usize, got: usize },
}
