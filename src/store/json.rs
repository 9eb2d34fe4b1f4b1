//! JSON-file storage adapter.
//!
//! Persists every model's records into a single `data.json` under the given
//! root directory. The file is rewritten on each accepted commit with an
//! atomic tmp-file-then-rename so a killed process never leaves a partial
//! document behind. State is loaded once on open; the adapter assumes it is
//! the only writer for the lifetime of the handle.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{assign_serial, record_key, Adapter, Record};
use crate::error::Result;
use crate::model::Model;
use crate::value::Key;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    /// model name → encoded key → record
    tables: HashMap<String, BTreeMap<String, Record>>,
    serials: HashMap<String, i64>,
}

pub struct JsonAdapter {
    path: PathBuf,
    state: RefCell<StoreFile>,
}

impl JsonAdapter {
    /// Open (or start) a store rooted at `root`. The data file is
    /// `root/data.json`; a missing file is an empty store.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            fs::create_dir_all(root)?;
        }
        let path = root.join("data.json");
        let state = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            StoreFile::default()
        };
        Ok(Self {
            path,
            state: RefCell::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self, model: &str) -> usize {
        self.state
            .borrow()
            .tables
            .get(model)
            .map_or(0, |table| table.len())
    }

    pub fn record(&self, model: &str, key: &Key) -> Option<Record> {
        self.state
            .borrow()
            .tables
            .get(model)
            .and_then(|table| table.get(&key.encode()).cloned())
    }

    fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&*self.state.borrow())?;

        // Atomic write: tmp then rename
        let tmp = self
            .path
            .with_file_name(format!(".data-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Adapter for JsonAdapter {
    fn create(&self, model: &Model, values: &mut Record) -> Result<bool> {
        {
            let mut state = self.state.borrow_mut();
            assign_serial(model, values, || {
                let counter = state.serials.entry(model.name().to_string()).or_insert(0);
                *counter += 1;
                *counter
            });
            let Some(key) = record_key(model, values) else {
                return Ok(false);
            };
            let table = state.tables.entry(model.name().to_string()).or_default();
            let encoded = key.encode();
            if table.contains_key(&encoded) {
                return Ok(false);
            }
            debug!(model = model.name(), key = %encoded, "json create");
            table.insert(encoded, values.clone());
        }
        self.persist()?;
        Ok(true)
    }

    fn update(&self, model: &Model, key: &Key, changes: &Record) -> Result<bool> {
        {
            let mut state = self.state.borrow_mut();
            let Some(record) = state
                .tables
                .get_mut(model.name())
                .and_then(|table| table.get_mut(&key.encode()))
            else {
                return Ok(false);
            };
            for (name, value) in changes {
                record.insert(name.clone(), value.clone());
            }
        }
        self.persist()?;
        Ok(true)
    }

    fn delete(&self, model: &Model, key: &Key) -> Result<bool> {
        let removed = {
            let mut state = self.state.borrow_mut();
            state
                .tables
                .get_mut(model.name())
                .and_then(|table| table.remove(&key.encode()))
                .is_some()
        };
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    fn contains(&self, model: &Model, key: &Key) -> Result<bool> {
        Ok(self
            .state
            .borrow()
            .tables
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

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonAdapter::open(dir.path()).unwrap();
        assert_eq!(adapter.len("article"), 0);
    }

    #[test]
    fn create_and_reopen_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let model = article();
        let key;
        {
            let adapter = JsonAdapter::open(dir.path()).unwrap();
            let mut record = Record::new();
            record.insert("title".into(), Value::Text("persisted".into()));
            assert!(adapter.create(&model, &mut record).unwrap());
            key = record_key(&model, &record).unwrap();
        }

        let reopened = JsonAdapter::open(dir.path()).unwrap();
        assert_eq!(reopened.len("article"), 1);
        assert_eq!(
            reopened.record("article", &key).unwrap().get("title"),
            Some(&Value::Text("persisted".into()))
        );
    }

    #[test]
    fn serial_counter_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let model = article();
        {
            let adapter = JsonAdapter::open(dir.path()).unwrap();
            let mut record = Record::new();
            adapter.create(&model, &mut record).unwrap();
            assert_eq!(record.get("id"), Some(&Value::Int(1)));
        }
        let reopened = JsonAdapter::open(dir.path()).unwrap();
        let mut record = Record::new();
        reopened.create(&model, &mut record).unwrap();
        assert_eq!(record.get("id"), Some(&Value::Int(2)));
    }

    #[test]
    fn update_and_delete_are_durable() {
        let dir = tempfile::tempdir().unwrap();
        let model = article();
        let adapter = JsonAdapter::open(dir.path()).unwrap();

        let mut record = Record::new();
        record.insert("title".into(), Value::Text("a".into()));
        adapter.create(&model, &mut record).unwrap();
        let key = record_key(&model, &record).unwrap();

        let mut changes = Record::new();
        changes.insert("title".into(), Value::Text("b".into()));
        assert!(adapter.update(&model, &key, &changes).unwrap());
        assert!(adapter.delete(&model, &key).unwrap());

        let reopened = JsonAdapter::open(dir.path()).unwrap();
        assert!(!reopened.contains(&model, &key).unwrap());
    }

    #[test]
    fn no_tmp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonAdapter::open(dir.path()).unwrap();
        let mut record = Record::new();
        adapter.create(&article(), &mut record).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .collect();
        assert!(leftovers.is_empty());
    }
}
