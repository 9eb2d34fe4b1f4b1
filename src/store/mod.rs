//! Storage adapters.
//!
//! The [`Adapter`] trait is the whole storage boundary the core sees: commit
//! a create or an update, commit a delete, and answer whether an identity is
//! already known. Adapters report acceptance as a boolean — `Err` is
//! reserved for real I/O or serialization failures, and the core never
//! interprets *why* a commit was rejected, only *whether*.
//!
//! Methods take `&self`; implementations handle their own interior
//! mutability (the core is single-threaded).

pub mod json;
pub mod memory;

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::Result;
use crate::model::Model;
use crate::value::{Key, Value, ValueKind};

pub use json::JsonAdapter;
pub use memory::MemoryAdapter;

/// One stored record: property name to value.
pub type Record = BTreeMap<String, Value>;

pub trait Adapter {
    /// Persist a new record. The adapter assigns the model's serial identity
    /// into `values` when it is missing (counting integers, fresh v4 UUIDs).
    /// Returns `false` when the store declines the write, including when the
    /// identity is already taken.
    fn create(&self, model: &Model, values: &mut Record) -> Result<bool>;

    /// Apply a minimal write-set to an existing record.
    fn update(&self, model: &Model, key: &Key, changes: &Record) -> Result<bool>;

    /// Remove a record. Returns `false` when the identity is unknown.
    fn delete(&self, model: &Model, key: &Key) -> Result<bool>;

    /// Whether this identity is already known to the store.
    fn contains(&self, model: &Model, key: &Key) -> Result<bool>;
}

/// Fill in the store-assigned identity of a record about to be created.
pub(crate) fn assign_serial(
    model: &Model,
    values: &mut Record,
    next_int: impl FnOnce() -> i64,
) {
    if let Some(serial) = model.serial() {
        let missing = values.get(serial.name).map_or(true, Value::is_null);
        if missing {
            let value = match serial.kind {
                ValueKind::Id => Value::Id(Uuid::new_v4()),
                _ => Value::Int(next_int()),
            };
            values.insert(serial.name.to_string(), value);
        }
    }
}

/// Extract the identity key of a record, if every component is known.
pub(crate) fn record_key(model: &Model, values: &Record) -> Option<Key> {
    let key = Key(
        model
            .key_properties()
            .map(|p| values.get(p.name).cloned().unwrap_or(Value::Null))
            .collect(),
    );
    key.is_valid().then_some(key)
}
