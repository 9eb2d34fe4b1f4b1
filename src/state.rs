//! The persisted-state machine.
//!
//! Every resource owns exactly one [`PersistedState`] describing how its
//! in-memory attributes relate to the backing store:
//!
//! - `Transient`: never persisted; writes mutate the working values in place
//!   and track no diff, because everything is new.
//! - `Clean`: persisted and identical to the store.
//! - `Dirty`: persisted, with pending changes recorded against the values
//!   held at the last known-clean point.
//! - `Immutable`: read-only; a destroyed or frozen resource. Terminal.
//!
//! Transitions consume the current state and return its successor; the
//! working attribute map is passed in explicitly so a transition never
//! reaches outside the resource that owns it. Valid transitions:
//! `Transient → {Clean, Immutable}`, `Clean → {Dirty, Immutable}`,
//! `Dirty → {Clean, Immutable}`.

use std::collections::HashMap;

use crate::error::DatamapError;
use crate::property::Property;
use crate::value::{AttrMap, Value};

/// The original values a dirty resource diffs against. `None` records that
/// the property was not loaded before its first write, so rollback can
/// un-load it instead of writing a spurious null.
pub type OriginalMap = HashMap<&'static str, Option<Value>>;

/// The commit/rollback state of one resource instance.
#[derive(Debug, Default)]
pub enum PersistedState {
    /// Never persisted. This is the constructor state.
    #[default]
    Transient,

    /// Persisted, no pending changes.
    Clean,

    /// Persisted with pending changes; carries the pre-write value of every
    /// property touched since the last clean point.
    Dirty { original: OriginalMap },

    /// Read-only. No further writes or commits are accepted.
    Immutable,
}

impl PersistedState {
    pub fn is_transient(&self) -> bool {
        matches!(self, PersistedState::Transient)
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, PersistedState::Clean)
    }

    pub fn is_immutable(&self) -> bool {
        matches!(self, PersistedState::Immutable)
    }

    /// Persisted and live: `Clean` or `Dirty`.
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistedState::Clean | PersistedState::Dirty { .. })
    }

    pub(crate) fn original(&self) -> Option<&OriginalMap> {
        match self {
            PersistedState::Dirty { original } => Some(original),
            _ => None,
        }
    }

    /// Apply a write.
    ///
    /// `Transient` mutates the working value in place. `Clean` records the
    /// pre-write value and becomes `Dirty`. `Dirty` applies the value,
    /// recording the original only on the first write to that property.
    /// `Immutable` refuses; the error carries the unchanged state back so the
    /// caller can restore it.
    pub(crate) fn set(
        self,
        values: &mut AttrMap,
        property: &Property,
        value: Value,
        model: &str,
    ) -> std::result::Result<PersistedState, (PersistedState, DatamapError)> {
        match self {
            PersistedState::Transient => {
                values.insert(property.name, value);
                Ok(PersistedState::Transient)
            }
            PersistedState::Clean => {
                let mut original = OriginalMap::new();
                original.insert(property.name, values.get(property.name).cloned());
                values.insert(property.name, value);
                Ok(PersistedState::Dirty { original })
            }
            PersistedState::Dirty { mut original } => {
                // first-write-wins: keep the value we will diff against
                original
                    .entry(property.name)
                    .or_insert_with(|| values.get(property.name).cloned());
                values.insert(property.name, value);
                Ok(PersistedState::Dirty { original })
            }
            PersistedState::Immutable => Err((
                PersistedState::Immutable,
                DatamapError::ReadOnly {
                    model: model.to_string(),
                },
            )),
        }
    }

    /// Acknowledge a successful physical write: `Transient` and `Dirty`
    /// become `Clean` (dropping the diff), `Clean` and `Immutable` are
    /// no-ops.
    pub(crate) fn commit(self) -> PersistedState {
        match self {
            PersistedState::Transient | PersistedState::Dirty { .. } | PersistedState::Clean => {
                PersistedState::Clean
            }
            PersistedState::Immutable => PersistedState::Immutable,
        }
    }

    /// Tombstone the resource: every non-immutable state becomes
    /// `Immutable`. Whether the resource then counts as destroyed depends on
    /// its key being known, not on a separate flag.
    pub(crate) fn delete(self) -> PersistedState {
        PersistedState::Immutable
    }

    /// Discard pending changes. `Dirty` restores every recorded original
    /// value into the working map and becomes `Clean`; every other state is
    /// returned unchanged, so a second rollback is a no-op.
    pub(crate) fn rollback(self, values: &mut AttrMap) -> PersistedState {
        match self {
            PersistedState::Dirty { original } => {
                for (name, previous) in original {
                    match previous {
                        Some(value) => {
                            values.insert(name, value);
                        }
                        None => {
                            values.remove(name);
                        }
                    }
                }
                PersistedState::Clean
            }
            other => other,
        }
    }
}
