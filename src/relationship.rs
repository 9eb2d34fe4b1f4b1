//! Relationship descriptors.
//!
//! A [`Relationship`] names an association between two models and carries the
//! property names the save cascade needs: `child_key` (the foreign-key
//! properties on the child side) and `parent_key` (the identity properties on
//! the parent side). The [`RelKind`] discrimination drives cascade ordering:
//! `BelongsTo` associations are saved before the resource itself, the child
//! kinds after it, and `ManyToMany` last of all so both sides carry
//! fully-assigned keys by the time the join is written.

/// The kind of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelKind {
    /// This model holds the foreign key of a parent resource.
    BelongsTo,
    /// One dependent child resource.
    HasOne,
    /// A collection of dependent child resources.
    HasMany,
    /// A collection joined through an intermediary; saved after all other
    /// child kinds.
    ManyToMany,
}

impl RelKind {
    /// Parent associations are saved before the resource itself.
    pub fn is_parent(self) -> bool {
        matches!(self, RelKind::BelongsTo)
    }

    /// Child associations are saved after the resource itself.
    pub fn is_child(self) -> bool {
        !self.is_parent()
    }
}

/// Specification for a single association.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// The association name used in the API (e.g., "author", "comments").
    pub name: &'static str,

    pub kind: RelKind,

    /// Foreign-key property names on the child side. For `BelongsTo` these
    /// live on the declaring model; for the child kinds they live on the
    /// associated resources. Empty for `ManyToMany` (the join rows are the
    /// adapter's concern).
    pub child_key: Vec<&'static str>,

    /// Identity property names on the parent side, zipped positionally with
    /// `child_key` when keys are propagated.
    pub parent_key: Vec<&'static str>,
}

impl Relationship {
    pub fn belongs_to(name: &'static str) -> Self {
        Self::new(name, RelKind::BelongsTo)
    }

    pub fn has_one(name: &'static str) -> Self {
        Self::new(name, RelKind::HasOne)
    }

    pub fn has_many(name: &'static str) -> Self {
        Self::new(name, RelKind::HasMany)
    }

    pub fn many_to_many(name: &'static str) -> Self {
        Self::new(name, RelKind::ManyToMany)
    }

    fn new(name: &'static str, kind: RelKind) -> Self {
        Self {
            name,
            kind,
            child_key: Vec::new(),
            parent_key: vec!["id"],
        }
    }

    /// Set the foreign-key property names on the child side.
    pub fn child_key(mut self, names: &[&'static str]) -> Self {
        self.child_key = names.to_vec();
        self
    }

    /// Set the identity property names on the parent side (defaults to
    /// `["id"]`).
    pub fn parent_key(mut self, names: &[&'static str]) -> Self {
        self.parent_key = names.to_vec();
        self
    }
}
