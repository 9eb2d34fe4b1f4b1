//! The dirty evaluator.
//!
//! `dirty` answers whether a resource — or anything reachable through its
//! loaded associations — has unsaved changes. The walk follows relationships
//! in registration order and runs under the recursion guard, because
//! association graphs may be cyclic.
//!
//! The in-flight defaults differ on purpose: `dirty` defaults to `true`
//! (an in-progress check gates whether an update may proceed, and failing
//! open to "dirty" is safer than silently skipping a write), while
//! `dirty_parents`/`dirty_children` default to `false` (a cycle must not
//! report itself as eternally dirty).

use crate::guard::{GuardSet, Op};
use crate::resource::ResourceRef;

impl ResourceRef {
    /// Whether this resource, its loaded parents, or its loaded children
    /// have unsaved changes.
    pub fn dirty(&self) -> bool {
        self.dirty_with(&mut GuardSet::new())
    }

    /// Whether any loaded parent association is dirty (itself or
    /// transitively through its own parents).
    pub fn dirty_parents(&self) -> bool {
        self.dirty_parents_with(&mut GuardSet::new())
    }

    /// Whether any loaded child association is dirty.
    pub fn dirty_children(&self) -> bool {
        self.dirty_children_with(&mut GuardSet::new())
    }

    pub(crate) fn dirty_with(&self, guard: &mut GuardSet) -> bool {
        guard.run_once(self.guard_key(Op::Dirty), true, |guard| {
            self.dirty_self()
                || self.dirty_parents_with(guard)
                || self.dirty_children_with(guard)
        })
    }

    pub(crate) fn dirty_parents_with(&self, guard: &mut GuardSet) -> bool {
        guard.run_once(self.guard_key(Op::DirtyParents), false, |guard| {
            for parent in self.parent_associations() {
                if parent.dirty_self() || parent.dirty_parents_with(guard) {
                    return true;
                }
            }
            false
        })
    }

    pub(crate) fn dirty_children_with(&self, guard: &mut GuardSet) -> bool {
        guard.run_once(self.guard_key(Op::DirtyChildren), false, |guard| {
            for child in self.child_associations() {
                if child.dirty_with(guard) {
                    return true;
                }
            }
            false
        })
    }

    /// Loaded parent associations, in relationship-registration order.
    pub(crate) fn parent_associations(&self) -> Vec<ResourceRef> {
        let resource = self.inner();
        resource
            .model()
            .relationships()
            .iter()
            .filter(|rel| rel.kind.is_parent())
            .filter_map(|rel| resource.loaded_parent(rel.name))
            .collect()
    }

    /// Loaded child associations, in relationship-registration order,
    /// flattened across collections.
    pub(crate) fn child_associations(&self) -> Vec<ResourceRef> {
        let resource = self.inner();
        resource
            .model()
            .relationships()
            .iter()
            .filter(|rel| rel.kind.is_child())
            .flat_map(|rel| resource.loaded_children(rel.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::model::Model;
    use crate::property::Property;
    use crate::relationship::Relationship;
    use crate::resource::Resource;
    use crate::value::{Value, ValueKind};

    fn author() -> Rc<Model> {
        Model::build("author")
            .property(Property::new("id", ValueKind::Int).serial())
            .property(Property::new("name", ValueKind::Text))
            .relationship(Relationship::has_many("books").child_key(&["author_id"]))
            .finish()
            .unwrap()
    }

    fn book() -> Rc<Model> {
        Model::build("book")
            .property(Property::new("id", ValueKind::Int).serial())
            .property(Property::new("author_id", ValueKind::Int))
            .property(Property::new("title", ValueKind::Text))
            .relationship(Relationship::belongs_to("author").child_key(&["author_id"]))
            .finish()
            .unwrap()
    }

    #[test]
    fn clean_resource_without_associations_is_not_dirty() {
        let r = Resource::materialized(author(), [("id", Value::Int(1))]).unwrap();
        assert!(!r.dirty());
        assert!(!r.dirty_self());
    }

    #[test]
    fn transient_resource_with_serial_is_dirty() {
        let r = Resource::new(author());
        assert!(r.dirty_self());
        assert!(r.dirty());
    }

    #[test]
    fn transient_resource_without_serial_or_defaults_is_not_dirty() {
        let plain = Model::build("plain")
            .property(Property::new("code", ValueKind::Text).key())
            .finish()
            .unwrap();
        let r = Resource::new(plain);
        assert!(!r.dirty_self());
        assert!(!r.dirty());
    }

    #[test]
    fn dirty_parent_makes_the_child_dirty() {
        let a = Resource::materialized(author(), [("id", Value::Int(1))]).unwrap();
        let b = Resource::materialized(
            book(),
            [("id", Value::Int(2)), ("author_id", Value::Int(1))],
        )
        .unwrap();
        b.set_parent("author", &a).unwrap();

        assert!(!b.dirty());
        a.set("name", Value::Text("new".into())).unwrap();
        assert!(b.dirty_parents());
        assert!(b.dirty());
        assert!(!b.dirty_self());
    }

    #[test]
    fn dirty_child_makes_the_parent_dirty() {
        let a = Resource::materialized(author(), [("id", Value::Int(1))]).unwrap();
        let b = Resource::materialized(
            book(),
            [("id", Value::Int(2)), ("author_id", Value::Int(1))],
        )
        .unwrap();
        a.add_child("books", &b).unwrap();

        assert!(!a.dirty());
        b.set("title", Value::Text("new".into())).unwrap();
        assert!(a.dirty_children());
        assert!(a.dirty());
    }

    #[test]
    fn cyclic_graph_terminates() {
        let a = Resource::materialized(author(), [("id", Value::Int(1))]).unwrap();
        let b = Resource::materialized(
            book(),
            [("id", Value::Int(2)), ("author_id", Value::Int(1))],
        )
        .unwrap();
        a.add_child("books", &b).unwrap();
        b.set_parent("author", &a).unwrap();

        // both directions must terminate and agree that nothing is dirty
        assert!(!a.dirty());
        assert!(!b.dirty());

        b.set("title", Value::Text("changed".into())).unwrap();
        assert!(a.dirty());
        assert!(b.dirty());
    }
}
