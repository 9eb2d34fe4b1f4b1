//! Mapped resource instances.
//!
//! A [`Resource`] is one mapped record: a working attribute map, exactly one
//! [`PersistedState`], the loaded parent/child associations, and a memoized
//! identity [`Key`]. All reads and writes go through the attribute protocol
//! (`get`/`set`/`set_attributes`) so that every mutation is observable as a
//! state transition; nothing else may touch the working values.
//!
//! Resources are handled through [`ResourceRef`], a shared single-threaded
//! handle (`Rc<RefCell<_>>`) — the save cascade and association graph need
//! aliasing, and cyclic graphs are expected. The handle's pointer identity is
//! what the recursion guard keys on.
//!
//! The dirty evaluator lives in `dirty`, the save/destroy orchestrator in
//! `save`.

mod dirty;
mod save;

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::mem;
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::error::{DatamapError, Result};
use crate::guard::Op;
use crate::model::Model;
use crate::relationship::{RelKind, Relationship};
use crate::state::PersistedState;
use crate::store::Record;
use crate::value::{AttrMap, Key, Value};

/// One mass-assignable attribute: a property value, a parent resource, or a
/// child collection.
#[derive(Debug, Clone)]
pub enum Assign {
    Value(Value),
    Resource(ResourceRef),
    Collection(Vec<ResourceRef>),
}

impl From<Value> for Assign {
    fn from(value: Value) -> Self {
        Assign::Value(value)
    }
}

impl From<ResourceRef> for Assign {
    fn from(resource: ResourceRef) -> Self {
        Assign::Resource(resource)
    }
}

impl From<Vec<ResourceRef>> for Assign {
    fn from(resources: Vec<ResourceRef>) -> Self {
        Assign::Collection(resources)
    }
}

/// One mapped record instance.
pub struct Resource {
    model: Rc<Model>,
    values: AttrMap,
    state: PersistedState,
    key: OnceCell<Key>,
    parents: HashMap<&'static str, ResourceRef>,
    children: HashMap<&'static str, Vec<ResourceRef>>,
    raise_on_save_failure: Option<bool>,
}

impl Resource {
    /// Create a transient (never persisted) resource.
    pub fn new(model: Rc<Model>) -> ResourceRef {
        ResourceRef(Rc::new(RefCell::new(Resource {
            model,
            values: AttrMap::new(),
            state: PersistedState::Transient,
            key: OnceCell::new(),
            parents: HashMap::new(),
            children: HashMap::new(),
            raise_on_save_failure: None,
        })))
    }

    /// Create a clean resource from values read out of the store. This is
    /// the loader's entry point: values land directly in the working map and
    /// the state starts at `Clean`.
    pub fn materialized(
        model: Rc<Model>,
        values: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Result<ResourceRef> {
        let handle = Resource::new(model);
        {
            let mut resource = handle.inner_mut();
            for (name, value) in values {
                let property = resource.model.property(name).cloned().ok_or_else(|| {
                    DatamapError::UnknownAttribute {
                        model: resource.model.name().to_string(),
                        name: name.to_string(),
                    }
                })?;
                let value = property.typecast(resource.model.name(), value)?;
                resource.values.insert(property.name, value);
            }
            resource.state = PersistedState::Clean;
        }
        Ok(handle)
    }

    pub fn model(&self) -> &Rc<Model> {
        &self.model
    }

    /// Read an attribute. Unloaded default-bearing properties of a transient
    /// resource materialize their default on first read.
    pub fn get(&mut self, name: &str) -> Result<Option<Value>> {
        let property = self.model.property(name).cloned().ok_or_else(|| {
            DatamapError::UnknownAttribute {
                model: self.model.name().to_string(),
                name: name.to_string(),
            }
        })?;

        if let Some(value) = self.values.get(property.name) {
            return Ok(Some(value.clone()));
        }
        if self.state.is_transient() {
            if let Some(default) = &property.default {
                self.values.insert(property.name, default.clone());
                return Ok(Some(default.clone()));
            }
        }
        Ok(None)
    }

    /// Write an attribute through the state machine. The state is replaced
    /// wholesale by the transition's successor.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let property = self.model.property(name).cloned().ok_or_else(|| {
            DatamapError::UnknownAttribute {
                model: self.model.name().to_string(),
                name: name.to_string(),
            }
        })?;
        let value = property.typecast(self.model.name(), value)?;

        let state = mem::take(&mut self.state);
        match state.set(&mut self.values, &property, value, self.model.name()) {
            Ok(next) => {
                self.state = next;
                Ok(())
            }
            Err((state, err)) => {
                self.state = state;
                Err(err)
            }
        }
    }

    /// Write a value directly, bypassing the state machine. Reserved for the
    /// internals that re-establish known-good values: adapter serial
    /// write-back and key resets.
    pub(crate) fn set_raw(&mut self, name: &'static str, value: Value) {
        self.values.insert(name, value);
    }

    /// Discard pending changes, restoring every recorded original value.
    pub fn rollback(&mut self) {
        let state = mem::take(&mut self.state);
        self.state = state.rollback(&mut self.values);
    }

    pub(crate) fn commit(&mut self) {
        self.state = mem::take(&mut self.state).commit();
    }

    pub(crate) fn tombstone(&mut self) {
        self.state = mem::take(&mut self.state).delete();
    }

    /// Restore the key-bearing attributes to their recorded original values.
    pub(crate) fn reset_key(&mut self) {
        let restores: Vec<(&'static str, Option<Value>)> = match self.state.original() {
            Some(original) => self
                .model
                .key_properties()
                .filter_map(|p| original.get(p.name).map(|v| (p.name, v.clone())))
                .collect(),
            None => Vec::new(),
        };
        for (name, previous) in restores {
            match previous {
                Some(value) => {
                    self.values.insert(name, value);
                }
                None => {
                    self.values.remove(name);
                }
            }
        }
    }

    // --- Predicates ---

    pub fn is_new(&self) -> bool {
        self.state.is_transient()
    }

    /// Persisted and live (clean or dirty).
    pub fn saved(&self) -> bool {
        self.state.is_persisted()
    }

    pub fn clean(&self) -> bool {
        self.state.is_clean()
    }

    pub fn readonly(&self) -> bool {
        self.state.is_immutable()
    }

    /// Destroyed means immutable with a known identity key — not a separate
    /// flag, so a rollback can never leave one dangling.
    pub fn destroyed(&self) -> bool {
        self.state.is_immutable() && self.key().is_some()
    }

    /// Whether this resource alone (ignoring associations) has unsaved
    /// changes. A transient resource counts as dirty when creating it would
    /// produce a non-trivial row: it has a store-assigned identity or any
    /// property with a default.
    pub fn dirty_self(&self) -> bool {
        if self
            .state
            .original()
            .is_some_and(|original| !original.is_empty())
        {
            return true;
        }
        if self.state.is_transient() {
            return self.model.serial().is_some()
                || self.model.properties().iter().any(|p| p.has_default());
        }
        false
    }

    // --- Identity ---

    /// The identity key: the key-property values, in declaration order.
    /// Returns `None` until every component is non-null. The first valid key
    /// is memoized and never changes for the life of the instance, even if
    /// key-backing properties are mutated afterwards — association integrity
    /// during a cascade depends on this.
    pub fn key(&self) -> Option<Key> {
        if let Some(key) = self.key.get() {
            return Some(key.clone());
        }
        let candidate = Key(
            self.model
                .key_properties()
                .map(|p| self.values.get(p.name).cloned().unwrap_or(Value::Null))
                .collect(),
        );
        if candidate.is_valid() {
            let _ = self.key.set(candidate.clone());
            Some(candidate)
        } else {
            None
        }
    }

    // --- Snapshots ---

    /// The loaded attribute values, by property name.
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// The pre-write values recorded since the last clean point, or `None`
    /// when the resource is not dirty. A `None` entry value means the
    /// property was not loaded before its first write.
    pub fn original_attributes(&self) -> Option<BTreeMap<String, Option<Value>>> {
        self.state.original().map(|original| {
            original
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect()
        })
    }

    /// All loaded values as an adapter record (used on create).
    pub(crate) fn record(&self) -> Record {
        self.values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// The minimal write-set: current values of every property touched since
    /// the last clean point (used on update).
    pub(crate) fn pending_changes(&self) -> Record {
        match self.state.original() {
            Some(original) => original
                .keys()
                .map(|name| {
                    (
                        name.to_string(),
                        self.values.get(name).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect(),
            None => Record::new(),
        }
    }

    // --- Associations ---

    pub(crate) fn loaded_parent(&self, name: &str) -> Option<ResourceRef> {
        self.parents.get(name).cloned()
    }

    pub(crate) fn loaded_children(&self, name: &str) -> Vec<ResourceRef> {
        self.children.get(name).cloned().unwrap_or_default()
    }

    pub fn raise_on_save_failure(&self) -> Option<bool> {
        self.raise_on_save_failure
    }

    /// Per-instance `raise_on_save_failure` override (`None` defers to the
    /// model, then the global default).
    pub fn set_raise_on_save_failure(&mut self, value: Option<bool>) {
        self.raise_on_save_failure = value;
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // associations are printed as counts: the graph may be cyclic
        f.debug_struct("Resource")
            .field("model", &self.model.name())
            .field("state", &self.state)
            .field("values", &self.values)
            .field("parents", &self.parents.len())
            .field("children", &self.children.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

/// Shared handle to a resource. Clones alias the same instance.
#[derive(Clone)]
pub struct ResourceRef(Rc<RefCell<Resource>>);

impl ResourceRef {
    pub(crate) fn inner(&self) -> Ref<'_, Resource> {
        self.0.borrow()
    }

    pub(crate) fn inner_mut(&self) -> RefMut<'_, Resource> {
        self.0.borrow_mut()
    }

    /// Stable identity for the recursion guard: the allocation address.
    pub(crate) fn guard_key(&self, op: Op) -> (usize, Op) {
        (Rc::as_ptr(&self.0) as *const () as usize, op)
    }

    pub fn model(&self) -> Rc<Model> {
        self.inner().model.clone()
    }

    pub fn model_name(&self) -> String {
        match self.0.try_borrow() {
            Ok(resource) => resource.model.name().to_string(),
            Err(_) => "<borrowed resource>".to_string(),
        }
    }

    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        self.inner_mut().get(name)
    }

    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        self.inner_mut().set(name, value)
    }

    /// Mass assignment. Each pair assigns a property value, a parent
    /// resource, or a child collection; a name matching neither a property
    /// nor a relationship fails naming the model and the key.
    pub fn set_attributes(
        &self,
        attrs: impl IntoIterator<Item = (&'static str, Assign)>,
    ) -> Result<()> {
        for (name, assign) in attrs {
            match assign {
                Assign::Value(value) => self.set(name, value)?,
                Assign::Resource(resource) => {
                    let kind = self.relationship_kind(name)?;
                    if kind.is_parent() {
                        self.set_parent(name, &resource)?;
                    } else {
                        self.add_child(name, &resource)?;
                    }
                }
                Assign::Collection(resources) => {
                    for resource in &resources {
                        self.add_child(name, resource)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn relationship_kind(&self, name: &str) -> Result<RelKind> {
        let resource = self.inner();
        resource
            .model
            .relationship(name)
            .map(|rel| rel.kind)
            .ok_or_else(|| DatamapError::UnknownAttribute {
                model: resource.model.name().to_string(),
                name: name.to_string(),
            })
    }

    /// Load a parent association and eagerly propagate any already-known
    /// parent key components into this resource's foreign-key properties.
    pub fn set_parent(&self, name: &str, parent: &ResourceRef) -> Result<()> {
        let rel = {
            let resource = self.inner();
            let rel = resource.model.relationship(name).cloned().ok_or_else(|| {
                DatamapError::UnknownAttribute {
                    model: resource.model.name().to_string(),
                    name: name.to_string(),
                }
            })?;
            if !rel.kind.is_parent() {
                return Err(DatamapError::InvalidModel {
                    model: resource.model.name().to_string(),
                    reason: format!("`{}` is not a parent association", name),
                });
            }
            rel
        };
        self.inner_mut().parents.insert(rel.name, parent.clone());
        propagate_keys(parent, self, &rel)
    }

    /// Load a child into an association. `HasOne` replaces, the collection
    /// kinds append.
    pub fn add_child(&self, name: &str, child: &ResourceRef) -> Result<()> {
        let rel = {
            let resource = self.inner();
            let rel = resource.model.relationship(name).cloned().ok_or_else(|| {
                DatamapError::UnknownAttribute {
                    model: resource.model.name().to_string(),
                    name: name.to_string(),
                }
            })?;
            if !rel.kind.is_child() {
                return Err(DatamapError::InvalidModel {
                    model: resource.model.name().to_string(),
                    reason: format!("`{}` is not a child association", name),
                });
            }
            rel
        };
        let mut resource = self.inner_mut();
        let slot = resource.children.entry(rel.name).or_default();
        if rel.kind == RelKind::HasOne {
            slot.clear();
        }
        slot.push(child.clone());
        Ok(())
    }

    // --- Delegated accessors ---

    pub fn key(&self) -> Option<Key> {
        self.inner().key()
    }

    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.inner().attributes()
    }

    pub fn original_attributes(&self) -> Option<BTreeMap<String, Option<Value>>> {
        self.inner().original_attributes()
    }

    pub fn is_new(&self) -> bool {
        self.inner().is_new()
    }

    pub fn saved(&self) -> bool {
        self.inner().saved()
    }

    pub fn clean(&self) -> bool {
        self.inner().clean()
    }

    pub fn readonly(&self) -> bool {
        self.inner().readonly()
    }

    pub fn destroyed(&self) -> bool {
        self.inner().destroyed()
    }

    pub fn dirty_self(&self) -> bool {
        self.inner().dirty_self()
    }

    pub fn rollback(&self) {
        self.inner_mut().rollback();
    }

    pub fn set_raise_on_save_failure(&self, value: Option<bool>) {
        self.inner_mut().set_raise_on_save_failure(value);
    }

    /// Reset a saved resource to what the store knows: key-bearing
    /// attributes return to their original values, every other loaded
    /// attribute is dropped so it re-loads lazily, and the state rolls back
    /// to clean.
    pub fn reload(&self) {
        let mut resource = self.inner_mut();
        if !resource.saved() {
            return;
        }
        resource.reset_key();
        let key_names: Vec<&'static str> =
            resource.model.key_properties().map(|p| p.name).collect();
        resource.values.retain(|name, _| key_names.contains(name));
        // pending changes are gone with the values they referred to
        resource.state = match mem::take(&mut resource.state) {
            PersistedState::Dirty { .. } => PersistedState::Clean,
            state => state,
        };
    }
}

/// Copy the known key components of the parent side of `rel` into the child
/// side's foreign-key properties, through the state machine so the write is
/// tracked and persisted. Components the parent does not know yet are
/// skipped; the cascade re-assigns after the parent save. Already-matching
/// values are left alone so re-assignment never dirties a clean child.
pub(crate) fn propagate_keys(
    parent: &ResourceRef,
    child: &ResourceRef,
    rel: &Relationship,
) -> Result<()> {
    let assignments: Vec<(&'static str, Value)> = {
        let parent = parent.inner();
        rel.child_key
            .iter()
            .zip(rel.parent_key.iter())
            .filter_map(|(child_name, parent_name)| {
                parent
                    .values
                    .get(*parent_name)
                    .filter(|value| !value.is_null())
                    .map(|value| (*child_name, value.clone()))
            })
            .collect()
    };
    for (name, value) in assignments {
        let unchanged = child.inner().values.get(name) == Some(&value);
        if !unchanged {
            child.set(name, value)?;
        }
    }
    Ok(())
}

/// Two handles are equal when they alias the same instance, or when both are
/// persisted resources of the same model with equal identity keys.
impl PartialEq for ResourceRef {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let a = self.inner();
        let b = other.inner();
        if !a.saved() || !b.saved() || a.model.name() != b.model.name() {
            return false;
        }
        match (a.key(), b.key()) {
            (Some(ka), Some(kb)) => ka == kb,
            _ => false,
        }
    }
}

impl fmt::Debug for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(resource) => fmt::Debug::fmt(&*resource, f),
            // a handle printed from inside one of its own borrows
            Err(_) => f.write_str("Resource(<borrowed>)"),
        }
    }
}
