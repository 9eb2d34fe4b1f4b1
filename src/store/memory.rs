//! In-memory storage adapter.
//!
//! Backs tests and any caller that wants commit semantics without a durable
//! store. Uses `RefCell`/`Cell` for interior mutability since the core is
//! single-threaded; this keeps the [`Adapter`] trait on `&self` without lock
//! overhead.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use super::{assign_serial, record_key, Adapter, Record};
use crate::error::Result;
use crate::model::Model;
use crate::value::Key;

#[derive(Default)]
pub struct MemoryAdapter {
    /// model name → encoded key → record
    tables: RefCell<HashMap<String, BTreeMap<String, Record>>>,
    serials: RefCell<HashMap<String, i64>>,
    reject_writes: Cell<bool>,
    creates: Cell<usize>,
    updates: Cell<usize>,
    deletes: Cell<usize>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write commit report rejection, for exercising failure
    /// handling.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    /// Number of records stored for a model.
    pub fn len(&self, model: &str) -> usize {
        self.tables
            .borrow()
            .get(model)
            .map_or(0, |table| table.len())
    }

    pub fn is_empty(&self, model: &str) -> bool {
        self.len(model) == 0
    }

    /// Fetch a stored record by identity.
    pub fn record(&self, model: &str, key: &Key) -> Option<Record> {
        self.tables
            .borrow()
            .get(model)
            .and_then(|table| table.get(&key.encode()).cloned())
    }

    /// Number of `create` commits attempted.
    pub fn create_count(&self) -> usize {
        self.creates.get()
    }

    /// Number of `update` commits attempted.
    pub fn update_count(&self) -> usize {
        self.updates.get()
    }

    /// Number of `delete` commits attempted.
    pub fn delete_count(&self) -> usize {
        self.deletes.get()
    }

    fn next_serial(&self, model: &str) -> i64 {
        let mut serials = self.serials.borrow_mut();
        let counter = serials.entry(model.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}

impl Adapter for MemoryAdapter {
    fn create(&self, model: &Model, values: &mut Record) -> Result<bool> {
        self.creates.set(self.creates.get() + 1);
        if self.reject_writes.get() {
            return Ok(false);
        }

        assign_serial(model, values, || self.next_serial(model.name()));
        let Some(key) = record_key(model, values) else {
            return Ok(false);
        };

        let mut tables = self.tables.borrow_mut();
        let table = tables.entry(model.name().to_string()).or_default();
        let encoded = key.encode();
        if table.contains_key(&encoded) {
            return Ok(false);
        }
        trace!(model = model.name(), key = %encoded, "memory create");
        table.insert(encoded, values.clone());
        Ok(true)
    }

    fn update(&self, model: &Model, key: &Key, changes: &Record) -> Result<bool> {
        self.updates.set(self.updates.get() + 1);
        if self.reject_writes.get() {
            return Ok(false);
        }

        let mut tables = self.tables.borrow_mut();
        let Some(record) = tables
            .get_mut(model.name())
            .and_then(|table| table.get_mut(&key.encode()))
        else {
            return Ok(false);
        };
        for (name, value) in changes {
            record.insert(name.clone(), value.clone());
        }
        Ok(true)
    }

    fn delete(&self, model: &Model, key: &Key) -> Result<bool> {
        self.deletes.set(self.deletes.get() + 1);
        if self.reject_writes.get() {
            return Ok(false);
        }

        let mut tables = self.tables.borrow_mut();
        let removed = tables
            .get_mut(model.name())
            .and_then(|table| table.remove(&key.encode()))
            .is_some();
        Ok(removed)
    }

    fn contains(&self, model: &Model, key: &Key) -> Result<bool> {
        Ok(self
            .tables
            .borrow()
            .get(model.name())
            .is_some_and(|table| table.contains_key(&key.encode())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::property::Property;
    use crate::value::{Value, ValueKind};
    use std::rc::Rc;

    fn article() -> Rc<Model> {
        Model::build("article")
            .property(Property::new("id", ValueKind::Int).serial())
            .property(Property::new("title", ValueKind::Text))
            .finish()
            .unwrap()
    }

    fn uuid_keyed() -> Rc<Model> {
        Model::build("session")
            .property(Property::new("id", ValueKind::Id).serial())
            .finish()
            .unwrap()
    }

    #[test]
    fn create_assigns_counting_serials() {
        let adapter = MemoryAdapter::new();
        let model = article();

        let mut first = Record::new();
        first.insert("title".into(), Value::Text("a".into()));
        let mut second = Record::new();
        second.insert("title".into(), Value::Text("b".into()));

        assert!(adapter.create(&model, &mut first).unwrap());
        assert!(adapter.create(&model, &mut second).unwrap());
        assert_eq!(first.get("id"), Some(&Value::Int(1)));
        assert_eq!(second.get("id"), Some(&Value::Int(2)));
        assert_eq!(adapter.len("article"), 2);
    }

    #[test]
    fn create_assigns_uuid_serials() {
        let adapter = MemoryAdapter::new();
        let mut record = Record::new();
        assert!(adapter.create(&uuid_keyed(), &mut record).unwrap());
        assert!(matches!(record.get("id"), Some(Value::Id(_))));
    }

    #[test]
    fn create_rejects_a_taken_identity() {
        let adapter = MemoryAdapter::new();
        let model = article();
        let mut record = Record::new();
        record.insert("id".into(), Value::Int(5));
        assert!(adapter.create(&model, &mut record.clone()).unwrap());
        assert!(!adapter.create(&model, &mut record).unwrap());
    }

    #[test]
    fn update_merges_changes() {
        let adapter = MemoryAdapter::new();
        let model = article();
        let mut record = Record::new();
        record.insert("title".into(), Value::Text("a".into()));
        adapter.create(&model, &mut record).unwrap();
        let key = record_key(&model, &record).unwrap();

        let mut changes = Record::new();
        changes.insert("title".into(), Value::Text("b".into()));
        assert!(adapter.update(&model, &key, &changes).unwrap());
        assert_eq!(
            adapter.record("article", &key).unwrap().get("title"),
            Some(&Value::Text("b".into()))
        );
    }

    #[test]
    fn update_of_unknown_identity_is_rejected() {
        let adapter = MemoryAdapter::new();
        let key = Key(vec![Value::Int(404)]);
        assert!(!adapter.update(&article(), &key, &Record::new()).unwrap());
    }

    #[test]
    fn delete_removes_and_reports() {
        let adapter = MemoryAdapter::new();
        let model = article();
        let mut record = Record::new();
        adapter.create(&model, &mut record).unwrap();
        let key = record_key(&model, &record).unwrap();

        assert!(adapter.contains(&model, &key).unwrap());
        assert!(adapter.delete(&model, &key).unwrap());
        assert!(!adapter.contains(&model, &key).unwrap());
        assert!(!adapter.delete(&model, &key).unwrap());
    }

    #[test]
    fn rejected_writes_change_nothing() {
        let adapter = MemoryAdapter::new();
        adapter.set_reject_writes(true);
        let mut record = Record::new();
        assert!(!adapter.create(&article(), &mut record).unwrap());
        assert!(adapter.is_empty("article"));
    }
}
