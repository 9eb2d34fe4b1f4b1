//! Property descriptors.
//!
//! A [`Property`] describes one typed attribute of a model: the kind of value
//! it holds, whether it participates in the identity key, whether the store
//! assigns it (serial), and an optional default. Properties are the schema
//! side of the attribute protocol; the runtime values live on the resource.

use crate::error::{DatamapError, Result};
use crate::value::{Value, ValueKind};

/// Specification for a single property.
#[derive(Debug, Clone)]
pub struct Property {
    /// The attribute name used in the API (e.g., "id", "title").
    pub name: &'static str,

    /// The kind of value this property holds.
    pub kind: ValueKind,

    /// Whether this property is part of the identity key.
    pub key: bool,

    /// Whether the store assigns this property's value on create
    /// (auto-incrementing integer or generated UUID).
    pub serial: bool,

    /// Default applied when the property is read or created without an
    /// assigned value.
    pub default: Option<Value>,
}

impl Property {
    /// Create a new property with default flags (all off, no default).
    pub fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            key: false,
            serial: false,
            default: None,
        }
    }

    /// Mark this property as part of the identity key.
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Mark this property as store-assigned. A serial property is implicitly
    /// part of the identity key.
    pub fn serial(mut self) -> Self {
        self.serial = true;
        self.key = true;
        self
    }

    /// Attach a default value.
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Check an incoming value against this property's kind.
    ///
    /// `Null` is accepted for any kind, `Int` widens losslessly to `Float`,
    /// everything else must match exactly.
    pub fn typecast(&self, model: &str, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Int(i) if self.kind == ValueKind::Float => Ok(Value::Float(i as f64)),
            value if value.kind() == Some(self.kind) => Ok(value),
            value => Err(DatamapError::Typecast {
                model: model.to_string(),
                property: self.name.to_string(),
                expected: self.kind.to_string(),
                found: value
                    .kind()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "Null".to_string()),
            }),
        }
    }
}
