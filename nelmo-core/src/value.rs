//! Runtime values produced by evaluation.

use core::fmt;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::{Expr, Literal};
use crate::error::CoreError;

/// Signature of host-provided functions.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, CoreError>;

#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
    /// Named members, e.g. the host's `Native` namespace.
    Record(Rc<BTreeMap<String, Value>>),
}

/// A function value built from an anonymous function expression.
///
/// `bound` holds the arguments of a partial application; they fill the
/// first parameters.
#[derive(Debug)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: Rc<Expr>,
    pub bound: Vec<Value>,
}

pub struct NativeFunction {
    pub name: String,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value]) -> Result<Value, CoreError> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Value {
    pub fn native(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value, CoreError> + 'static,
    ) -> Value {
        Value::Native(Rc::new(NativeFunction {
            name: name.into(),
            func: Box::new(func),
        }))
    }

    pub fn record<K: Into<String>>(members: impl IntoIterator<Item = (K, Value)>) -> Value {
        let members = members
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        Value::Record(Rc::new(members))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bool(_) => "Bool",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Record(_) => "record",
        }
    }

    /// Host truthiness: `False`, zero, NaN and the empty string are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0 && !value.is_nan(),
            Value::String(value) => !value.is_empty(),
            Value::Bool(value) => *value,
            Value::Function(_) | Value::Native(_) | Value::Record(_) => true,
        }
    }

    /// Equality as the `==` operator sees it: numbers compare by value
    /// across `Int` and `Float`, functions and records by identity.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(left), Value::Int(right)) => left == right,
            (Value::Int(left), Value::Float(right)) => (*left as f64) == *right,
            (Value::Float(left), Value::Int(right)) => *left == (*right as f64),
            (Value::Float(left), Value::Float(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            (Value::Native(left), Value::Native(right)) => Rc::ptr_eq(left, right),
            (Value::Record(left), Value::Record(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Int(value) => Value::Int(*value),
            Literal::Float(value) => Value::Float(*value),
            Literal::String(value) => Value::String(value.clone()),
            Literal::Bool(value) => Value::Bool(*value),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(left), Value::Int(right)) => left == right,
            (Value::Float(left), Value::Float(right)) => left == right,
            (Value::Record(left), Value::Record(right)) => left == right,
            (Value::Int(_) | Value::Float(_), _) | (Value::Record(_), _) => false,
            _ => self.loosely_equals(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "Int({value})"),
            Value::Float(value) => write!(f, "Float({value})"),
            Value::String(value) => write!(f, "String({value:?})"),
            Value::Bool(value) => write!(f, "Bool({value})"),
            Value::Function(closure) => write!(f, "Function({:?})", closure.params),
            Value::Native(native) => write!(f, "Native({:?})", native.name),
            Value::Record(members) => f.debug_map().entries(members.iter()).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Function(closure) => write!(f, "<function/{}>", closure.params.len()),
            Value::Native(native) => write!(f, "<native {}>", native.name),
            Value::Record(members) => {
                let keys: Vec<&str> = members.keys().map(String::as_str).collect();
                write!(f, "{{ {} }}", keys.join(", "))
            }
        }
    }
}
