//! The tagged value shared by the compiler and every runtime component.
//!
//! Values are immutable: "mutation" of a list or record produces a new
//! `Value` rather than editing one in place. `FutureRef`, `FunctionRef` and
//! `ForeignRef` carry only identifiers, never pointers into executor state,
//! so a `Value` remains valid across thread suspension and (in distributed
//! mode) across a trip through the controller's remote store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{FutureId, Symbol};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Symbol(Symbol),
    List(Vec<Value>),
    Record(BTreeMap<Symbol, Value>),
    FunctionRef { name: Symbol, arity: u8 },
    ForeignRef { name: Symbol, arity: u8 },
    FutureRef(FutureId),
    Null,
}

impl Value {
    /// A short, stable name for the variant, used in `TypeMismatch` errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::FunctionRef { .. } => "function",
            Value::ForeignRef { .. } => "foreign",
            Value::FutureRef(_) => "future",
            Value::Null => "null",
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    /// The canonical textual form used by `print` and diagnostic traces.
    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::FunctionRef { name, arity } => write!(f, "<fn {name}/{arity}>"),
            Value::ForeignRef { name, arity } => write!(f, "<foreign {name}/{arity}>"),
            Value::FutureRef(id) => write!(f, "<future {id}>"),
            Value::Null => write!(f, "null"),
        }
    }
}
