//! Runtime attribute values.
//!
//! [`Value`] is the unified representation of everything a property can hold:
//! it is what the attribute protocol accepts, what the state machine diffs,
//! and what adapters persist. [`Key`] is the ordered sequence of key-property
//! values that identifies a resource against the backing store.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The working attribute map of a resource. An absent entry means the
/// property has not been loaded (or assigned) yet.
pub(crate) type AttrMap = HashMap<&'static str, Value>;

/// Runtime representation of an attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Explicit null (distinct from "not loaded").
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// UUID identity value.
    Id(Uuid),
    /// Timestamp value.
    Time(DateTime<Utc>),
}

/// The kind of value a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Text,
    Id,
    Time,
}

impl Value {
    /// The kind of this value, or `None` for `Null` (null fits any kind).
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Int(_) => Some(ValueKind::Int),
            Value::Float(_) => Some(ValueKind::Float),
            Value::Text(_) => Some(ValueKind::Text),
            Value::Id(_) => Some(ValueKind::Id),
            Value::Time(_) => Some(ValueKind::Time),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<Uuid> {
        match self {
            Value::Id(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(v) => Some(*v),
            _ => None,
        }
    }

    /// Canonical single-token encoding, used to build adapter index keys.
    /// Each variant carries a sigil so `Text("1")` and `Int(1)` never collide.
    fn encode_into(&self, out: &mut String) {
        match self {
            Value::Null => out.push('~'),
            Value::Bool(v) => {
                out.push('b');
                out.push(if *v { '1' } else { '0' });
            }
            Value::Int(v) => {
                out.push('i');
                out.push_str(&v.to_string());
            }
            Value::Float(v) => {
                out.push('f');
                out.push_str(&v.to_bits().to_string());
            }
            Value::Text(s) => {
                out.push('t');
                // escape the key separator
                out.push_str(&s.replace('\\', "\\\\").replace('|', "\\|"));
            }
            Value::Id(v) => {
                out.push('u');
                out.push_str(&v.to_string());
            }
            Value::Time(v) => {
                out.push('d');
                out.push_str(&v.to_rfc3339());
            }
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "Bool",
            ValueKind::Int => "Int",
            ValueKind::Float => "Float",
            ValueKind::Text => "Text",
            ValueKind::Id => "Id",
            ValueKind::Time => "Time",
        };
        f.write_str(name)
    }
}

/// The identity key of a resource: the values of its key properties, in
/// property-declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key(pub Vec<Value>);

impl Key {
    /// A key is valid only when every component is present and non-null.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|v| !v.is_null())
    }

    /// Deterministic string encoding used by adapters to index records.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('|');
            }
            value.encode_into(&mut out);
        }
        out
    }
}
