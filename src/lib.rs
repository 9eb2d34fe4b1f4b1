//! # datamap
//!
//! A lightweight data-mapper core. A [`Model`] declares typed properties and
//! relationships; a [`Resource`] instance tracks its own persistence state
//! (transient, clean, dirty, immutable) so that [`ResourceRef::save`] and
//! [`ResourceRef::destroy`] translate into the right create/update/delete
//! commits against a pluggable storage [`Adapter`].
//!
//! The interesting machinery is the cascade: `save` walks the loaded
//! association graph — parents first, then the resource, then children —
//! writing each dirty resource exactly once, under a recursion guard that
//! keeps cyclic graphs terminating. Lifecycle hooks wrap each physical
//! commit and may cooperatively halt it.
//!
//! ```
//! use datamap::{Model, MemoryAdapter, Property, Resource, Value, ValueKind};
//!
//! let model = Model::build("article")
//!     .property(Property::new("id", ValueKind::Int).serial())
//!     .property(Property::new("title", ValueKind::Text))
//!     .finish()
//!     .unwrap();
//!
//! let adapter = MemoryAdapter::new();
//! let article = Resource::new(model);
//! article.set("title", Value::Text("hello".into())).unwrap();
//!
//! assert!(article.save(&adapter).unwrap());
//! assert!(article.clean());
//! assert_eq!(article.get("id").unwrap(), Some(Value::Int(1)));
//! ```
//!
//! The core is single-threaded and synchronous: resources are shared through
//! `Rc<RefCell<_>>` handles and every operation runs to completion on the
//! calling thread.

pub mod config;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod model;
pub mod property;
pub mod relationship;
pub mod resource;
pub mod state;
pub mod store;
pub mod value;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use error::{DatamapError, Result};
pub use hooks::{Event, HookFlow, Phase};
pub use model::{Model, ModelBuilder};
pub use property::Property;
pub use relationship::{RelKind, Relationship};
pub use resource::{Assign, Resource, ResourceRef};
pub use state::PersistedState;
pub use store::{Adapter, JsonAdapter, MemoryAdapter, Record};
pub use value::{Key, Value, ValueKind};
