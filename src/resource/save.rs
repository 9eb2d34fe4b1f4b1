//! The save/destroy orchestrator.
//!
//! `save` walks the loaded association graph: parents first (recursively),
//! then the resource itself, then children, with many-to-many collections
//! last so the join rows see fully-assigned keys on both sides. Each phase
//! short-circuits — children and self are never written after a parent
//! failure. The whole walk runs under one [`GuardSet`] so cyclic graphs
//! terminate, and each physical commit is wrapped in its hook pipeline
//! unless the raw (hook-free) entry point was used.
//!
//! Cascade failures travel as `Ok(false)` up to the public entry points,
//! which convert them into an error only when `raise_on_save_failure` is
//! enabled (instance override, then model override, then the global
//! default).

use tracing::debug;

use crate::config;
use crate::error::{DatamapError, Result};
use crate::guard::{GuardSet, Op};
use crate::hooks::{Event, Phase};
use crate::relationship::{RelKind, Relationship};
use crate::resource::{propagate_keys, Assign, ResourceRef};
use crate::store::Adapter;

impl ResourceRef {
    /// Cascading save with hooks. Returns `Ok(false)` when any phase
    /// declined to write (hook halt, adapter rejection, failed parent),
    /// unless `raise_on_save_failure` converts that into an error. Saving a
    /// destroyed resource is a programmer error and fails immediately.
    pub fn save<A: Adapter>(&self, adapter: &A) -> Result<bool> {
        self.save_with(adapter, true, &mut GuardSet::new())
    }

    /// Cascading save that bypasses every hook pipeline. The cascade itself
    /// (parents, self, children) still runs.
    pub fn save_raw<A: Adapter>(&self, adapter: &A) -> Result<bool> {
        self.save_with(adapter, false, &mut GuardSet::new())
    }

    /// Assign attributes and save, with hooks. Refuses to run on a resource
    /// that is new or already has unsaved changes — an update must start
    /// from a clean state rather than silently folding pending edits into
    /// the write.
    pub fn update<A: Adapter>(
        &self,
        adapter: &A,
        attrs: impl IntoIterator<Item = (&'static str, Assign)>,
    ) -> Result<bool> {
        self.assert_update_clean()?;
        self.set_attributes(attrs)?;
        self.save(adapter)
    }

    /// Assign attributes and save without hooks.
    pub fn update_raw<A: Adapter>(
        &self,
        adapter: &A,
        attrs: impl IntoIterator<Item = (&'static str, Assign)>,
    ) -> Result<bool> {
        self.assert_update_clean()?;
        self.set_attributes(attrs)?;
        self.save_raw(adapter)
    }

    /// Destroy with hooks. Idempotent: destroying an already-destroyed
    /// resource returns `true` without touching hooks or storage.
    pub fn destroy<A: Adapter>(&self, adapter: &A) -> Result<bool> {
        if self.destroyed() {
            return Ok(true);
        }
        if !self.run_hooks(Event::Destroy, Phase::Before)? {
            return Ok(self.destroyed());
        }
        if !self.persist_delete(adapter)? {
            return Ok(self.destroyed());
        }
        self.run_hooks(Event::Destroy, Phase::After)?;
        Ok(self.destroyed())
    }

    /// Destroy without hooks.
    pub fn destroy_raw<A: Adapter>(&self, adapter: &A) -> Result<bool> {
        if self.destroyed() {
            return Ok(true);
        }
        self.persist_delete(adapter)?;
        Ok(self.destroyed())
    }

    pub(crate) fn save_with<A: Adapter>(
        &self,
        adapter: &A,
        execute_hooks: bool,
        guard: &mut GuardSet,
    ) -> Result<bool> {
        if self.destroyed() {
            return Err(DatamapError::SaveDestroyed {
                model: self.model_name(),
            });
        }
        let saved = self.run_save(adapter, execute_hooks, guard)?;
        if !saved && self.effective_raise_on_save_failure() {
            return Err(DatamapError::SaveFailure {
                resource: self.clone(),
            });
        }
        Ok(saved)
    }

    fn run_save<A: Adapter>(
        &self,
        adapter: &A,
        execute_hooks: bool,
        guard: &mut GuardSet,
    ) -> Result<bool> {
        guard.try_run_once(self.guard_key(Op::Save), true, |guard| {
            Ok(self.save_parents(adapter, execute_hooks, guard)?
                && self.save_self(adapter, execute_hooks)?
                && self.save_children(adapter, execute_hooks, guard)?)
        })
    }

    /// Save every loaded parent association (its own parents first, then the
    /// parent itself), re-assigning the association afterwards so
    /// foreign-key properties receive the parent's now-known identity.
    /// A single failing parent fails the phase; later parents are not
    /// attempted.
    fn save_parents<A: Adapter>(
        &self,
        adapter: &A,
        execute_hooks: bool,
        guard: &mut GuardSet,
    ) -> Result<bool> {
        guard.try_run_once(self.guard_key(Op::SaveParents), true, |guard| {
            let parent_rels: Vec<(Relationship, ResourceRef)> = {
                let resource = self.inner();
                resource
                    .model()
                    .relationships()
                    .iter()
                    .filter(|rel| rel.kind.is_parent())
                    .filter_map(|rel| {
                        resource
                            .loaded_parent(rel.name)
                            .map(|parent| (rel.clone(), parent))
                    })
                    .collect()
            };
            for (rel, parent) in parent_rels {
                let saved = parent.save_parents(adapter, execute_hooks, guard)?
                    && parent.save_self(adapter, execute_hooks)?;
                if !saved {
                    debug!(
                        model = %self.model_name(),
                        relationship = rel.name,
                        "parent save failed, aborting cascade"
                    );
                    return Ok(false);
                }
                propagate_keys(&parent, self, &rel)?;
            }
            Ok(true)
        })
    }

    /// Persist this resource alone. Not dirty means nothing to write and the
    /// current saved-ness is the answer; otherwise run the create or update
    /// path and report whether the resource came out clean.
    fn save_self<A: Adapter>(&self, adapter: &A, execute_hooks: bool) -> Result<bool> {
        if !self.dirty_self() {
            return Ok(self.saved());
        }
        match (execute_hooks, self.is_new()) {
            (true, true) => self.create_with_hooks(adapter)?,
            (true, false) => self.update_with_hooks(adapter)?,
            (false, true) => {
                self.persist_create(adapter)?;
            }
            (false, false) => {
                self.persist_update(adapter)?;
            }
        }
        Ok(self.clean())
    }

    /// Save every loaded child association, many-to-many collections last.
    /// Children receive this resource's key before their own save.
    fn save_children<A: Adapter>(
        &self,
        adapter: &A,
        execute_hooks: bool,
        guard: &mut GuardSet,
    ) -> Result<bool> {
        let groups: Vec<(Relationship, Vec<ResourceRef>)> = {
            let resource = self.inner();
            let rels = resource.model().relationships();
            let ordinary = rels
                .iter()
                .filter(|rel| rel.kind.is_child() && rel.kind != RelKind::ManyToMany);
            let joined = rels.iter().filter(|rel| rel.kind == RelKind::ManyToMany);
            ordinary
                .chain(joined)
                .map(|rel| (rel.clone(), resource.loaded_children(rel.name)))
                .filter(|(_, children)| !children.is_empty())
                .collect()
        };
        for (rel, children) in groups {
            for child in children {
                propagate_keys(self, &child, &rel)?;
                if !child.save_with(adapter, execute_hooks, guard)? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    // --- Hook-wrapped commits ---

    fn create_with_hooks<A: Adapter>(&self, adapter: &A) -> Result<()> {
        if !self.run_hooks(Event::Save, Phase::Before)? {
            return Ok(());
        }
        if !self.run_hooks(Event::Create, Phase::Before)? {
            return Ok(());
        }
        if !self.persist_create(adapter)? {
            return Ok(());
        }
        if !self.run_hooks(Event::Create, Phase::After)? {
            return Ok(());
        }
        self.run_hooks(Event::Save, Phase::After)?;
        Ok(())
    }

    fn update_with_hooks<A: Adapter>(&self, adapter: &A) -> Result<()> {
        if !self.run_hooks(Event::Save, Phase::Before)? {
            return Ok(());
        }
        if !self.run_hooks(Event::Update, Phase::Before)? {
            return Ok(());
        }
        if !self.persist_update(adapter)? {
            return Ok(());
        }
        if !self.run_hooks(Event::Update, Phase::After)? {
            return Ok(());
        }
        self.run_hooks(Event::Save, Phase::After)?;
        Ok(())
    }

    fn run_hooks(&self, event: Event, phase: Phase) -> Result<bool> {
        let model = self.model();
        if model.hooks().is_empty() {
            return Ok(true);
        }
        model.hooks().run(event, phase, &mut self.inner_mut())
    }

    // --- Physical commits ---

    fn persist_create<A: Adapter>(&self, adapter: &A) -> Result<bool> {
        let (model, mut record) = {
            let mut resource = self.inner_mut();
            let model = resource.model().clone();
            // a created row carries every declared default
            for property in model.properties() {
                if !resource.values.contains_key(property.name) {
                    if let Some(default) = &property.default {
                        resource.values.insert(property.name, default.clone());
                    }
                }
            }
            (model, resource.record())
        };

        debug!(model = model.name(), "creating resource");
        let created = adapter.create(&model, &mut record)?;
        if created {
            let mut resource = self.inner_mut();
            // adapter-assigned serials come back outside the state machine
            for property in model.properties().iter().filter(|p| p.serial) {
                if let Some(value) = record.get(property.name) {
                    resource.set_raw(property.name, value.clone());
                }
            }
            resource.commit();
            let _ = resource.key();
        }
        Ok(created)
    }

    fn persist_update<A: Adapter>(&self, adapter: &A) -> Result<bool> {
        let (model, key, changes) = {
            let resource = self.inner();
            (
                resource.model().clone(),
                resource.key(),
                resource.pending_changes(),
            )
        };
        // a persisted resource without a knowable key cannot be addressed
        let Some(key) = key else {
            return Ok(false);
        };

        debug!(
            model = model.name(),
            changed = changes.len(),
            "updating resource"
        );
        let updated = adapter.update(&model, &key, &changes)?;
        if updated {
            self.inner_mut().commit();
        }
        Ok(updated)
    }

    /// Tombstone the state, then commit the physical delete. The tombstone
    /// is not rolled back when the store rejects the delete (see DESIGN.md).
    fn persist_delete<A: Adapter>(&self, adapter: &A) -> Result<bool> {
        let (model, key, was_persisted) = {
            let resource = self.inner();
            (resource.model().clone(), resource.key(), resource.saved())
        };
        self.inner_mut().tombstone();
        if !was_persisted {
            // nothing was ever written for this resource
            return Ok(true);
        }
        let Some(key) = key else {
            return Ok(false);
        };
        debug!(model = model.name(), "deleting resource");
        adapter.delete(&model, &key)
    }

    fn assert_update_clean(&self) -> Result<()> {
        if self.is_new() || self.dirty() {
            return Err(DatamapError::UpdateConflict {
                model: self.model_name(),
            });
        }
        Ok(())
    }

    fn effective_raise_on_save_failure(&self) -> bool {
        let resource = self.inner();
        config::resolve_raise_on_save_failure(
            resource.raise_on_save_failure(),
            resource.model().raise_on_save_failure(),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::hooks::{Event, HookFlow, Phase};
    use crate::model::Model;
    use crate::property::Property;
    use crate::resource::Resource;
    use crate::store::MemoryAdapter;
    use crate::test_utils::fixtures::article;
    use crate::value::{Key, Value, ValueKind};

    #[test]
    fn saving_a_transient_resource_creates_and_cleans() {
        let adapter = MemoryAdapter::new();
        let r = Resource::new(article());
        r.set("title", Value::Text("a".into())).unwrap();

        assert!(r.save(&adapter).unwrap());
        assert!(r.clean());
        // the adapter assigned the serial and the key is memoized
        assert_eq!(r.key(), Some(Key(vec![Value::Int(1)])));
        assert_eq!(adapter.len("article"), 1);
    }

    #[test]
    fn saving_a_clean_resource_is_a_no_op() {
        let adapter = MemoryAdapter::new();
        let r = Resource::new(article());
        r.save(&adapter).unwrap();
        let creates = adapter.create_count();

        assert!(r.save(&adapter).unwrap());
        assert_eq!(adapter.create_count(), creates);
    }

    #[test]
    fn updating_writes_only_the_changed_properties() {
        let adapter = MemoryAdapter::new();
        let r = Resource::new(article());
        r.set("title", Value::Text("a".into())).unwrap();
        r.save(&adapter).unwrap();

        r.set("title", Value::Text("b".into())).unwrap();
        assert!(r.save(&adapter).unwrap());

        let record = adapter.record("article", &r.key().unwrap()).unwrap();
        assert_eq!(record.get("title"), Some(&Value::Text("b".into())));
        assert_eq!(adapter.update_count(), 1);
    }

    #[test]
    fn rejected_create_leaves_the_resource_transient() {
        let adapter = MemoryAdapter::new();
        adapter.set_reject_writes(true);
        let r = Resource::new(article());
        r.set("title", Value::Text("a".into())).unwrap();

        assert!(!r.save(&adapter).unwrap());
        assert!(r.is_new());
    }

    #[test]
    fn save_raw_skips_hooks_but_still_commits() {
        let adapter = MemoryAdapter::new();
        let model = Model::build("article")
            .property(Property::new("id", ValueKind::Int).serial())
            .property(Property::new("title", ValueKind::Text))
            .hook(Event::Save, Phase::Before, |_| Ok(HookFlow::Halt))
            .finish()
            .unwrap();

        let r = Resource::new(model);
        r.set("title", Value::Text("a".into())).unwrap();

        // hooked save halts, raw save does not
        assert!(!r.save(&adapter).unwrap());
        assert!(r.is_new());
        assert!(r.save_raw(&adapter).unwrap());
        assert!(r.clean());
    }

    #[test]
    fn destroy_then_save_is_an_error() {
        let adapter = MemoryAdapter::new();
        let r = Resource::new(article());
        r.save(&adapter).unwrap();
        r.destroy(&adapter).unwrap();

        assert!(matches!(
            r.save(&adapter),
            Err(crate::error::DatamapError::SaveDestroyed { .. })
        ));
    }

    #[test]
    fn destroying_a_transient_resource_skips_storage() {
        let adapter = MemoryAdapter::new();
        let r = Resource::new(article());
        r.set("title", Value::Text("a".into())).unwrap();

        // nothing was persisted, so there is nothing to delete; without a
        // known key the resource is readonly but not "destroyed"
        assert!(!r.destroy(&adapter).unwrap());
        assert!(r.readonly());
        assert!(!r.destroyed());
        assert_eq!(adapter.delete_count(), 0);
    }
}
