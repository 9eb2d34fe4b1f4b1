use thiserror::Error;

use crate::resource::ResourceRef;

#[derive(Error, Debug)]
pub enum DatamapError {
    /// A write was attempted on an immutable (destroyed or frozen) resource.
    #[error("{model} is read-only and cannot be modified")]
    ReadOnly { model: String },

    /// `save` was called on a resource that has already been destroyed.
    #[error("cannot save {model}: the resource was destroyed")]
    SaveDestroyed { model: String },

    /// `update` was called while the resource still has unsaved changes.
    #[error("cannot update {model}: the resource is dirty or not yet saved")]
    UpdateConflict { model: String },

    /// Mass assignment named an attribute with no matching property or
    /// relationship.
    #[error("unknown attribute `{name}` for model {model}")]
    UnknownAttribute { model: String, name: String },

    /// The cascading save did not fully succeed and the resource (or its
    /// model, or the global default) opted into raising on failure.
    /// Carries the resource so the caller can inspect what was left dirty.
    #[error("save returned failure for {}", .resource.model_name())]
    SaveFailure { resource: ResourceRef },

    #[error("cannot assign {found} to {model}.{property} (expected {expected})")]
    Typecast {
        model: String,
        property: String,
        expected: String,
        found: String,
    },

    #[error("invalid model {model}: {reason}")]
    InvalidModel { model: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, DatamapError>;
