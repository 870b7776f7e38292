//! # Value Type System
//!
//! The coerced-value representation shared by C2 (type coercion), C4
//! (condition resolution), and C9 (row buffers / computed fields). Narrower
//! than a general-purpose columnar value type: no vector/tensor kinds, since
//! similarity search is not part of this domain.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// The declared type of a `PropertyReference`, used to pick a coercion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int64,
    Float64,
    Bool,
    String,
    Uuid,
    DateTime,
    /// A named enum type; coercion matches variant names per `enumMatchMode`.
    Enum(&'static str),
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int64 => write!(f, "Int64"),
            DataType::Float64 => write!(f, "Float64"),
            DataType::Bool => write!(f, "Bool"),
            DataType::String => write!(f, "String"),
            DataType::Uuid => write!(f, "Uuid"),
            DataType::DateTime => write!(f, "DateTime"),
            DataType::Enum(name) => write!(f, "Enum({name})"),
        }
    }
}

/// A raw, untyped value as it arrives on the wire (spec.md §6 JSON-like payload),
/// before C2 coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Sequence(Vec<RawValue>),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

/// A coerced, typed value. Produced by `coerce::coerce` and consumed by
/// `PredicateBackend` implementations and computed-field providers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int64(i64),
    Float64(f64),
    Bool(bool),
    String(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    /// An ordered sequence of coerced elements, produced for `IN`/`RANGE`.
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
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
        }
    }
}
