//! Model definitions.
//!
//! A [`Model`] is the schema for one mapped record type: its ordered
//! properties, its ordered relationships, its hook registry, and its
//! `raise_on_save_failure` override. Models are built once through
//! [`ModelBuilder`], validated, and then shared immutably (`Rc<Model>`) by
//! every resource instance of that type. Declaration order is preserved —
//! the save cascade and the dirty evaluator walk relationships in
//! registration order so cascades stay deterministic.

use std::rc::Rc;

use crate::error::{DatamapError, Result};
use crate::hooks::{Event, HookFlow, Hooks, Phase};
use crate::property::Property;
use crate::relationship::{RelKind, Relationship};
use crate::resource::Resource;

#[derive(Debug)]
pub struct Model {
    name: String,
    properties: Vec<Property>,
    relationships: Vec<Relationship>,
    hooks: Hooks,
    raise_on_save_failure: Option<bool>,
}

impl Model {
    /// Start defining a model.
    pub fn build(name: &str) -> ModelBuilder {
        ModelBuilder {
            name: name.to_string(),
            properties: Vec::new(),
            relationships: Vec::new(),
            hooks: Hooks::new(),
            raise_on_save_failure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Key properties, in declaration order.
    pub fn key_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.key)
    }

    /// The store-assigned identity property, if the model has one.
    pub fn serial(&self) -> Option<&Property> {
        self.properties.iter().find(|p| p.serial)
    }

    pub fn raise_on_save_failure(&self) -> Option<bool> {
        self.raise_on_save_failure
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.hooks
    }
}

pub struct ModelBuilder {
    name: String,
    properties: Vec<Property>,
    relationships: Vec<Relationship>,
    hooks: Hooks,
    raise_on_save_failure: Option<bool>,
}

impl ModelBuilder {
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Register a lifecycle hook. Hooks run in registration order.
    pub fn hook(
        mut self,
        event: Event,
        phase: Phase,
        hook: impl Fn(&mut Resource) -> Result<HookFlow> + 'static,
    ) -> Self {
        self.hooks.register(event, phase, Box::new(hook));
        self
    }

    pub fn raise_on_save_failure(mut self, value: bool) -> Self {
        self.raise_on_save_failure = Some(value);
        self
    }

    /// Validate and freeze the definition.
    pub fn finish(self) -> Result<Rc<Model>> {
        let model = Model {
            name: self.name,
            properties: self.properties,
            relationships: self.relationships,
            hooks: self.hooks,
            raise_on_save_failure: self.raise_on_save_failure,
        };
        model.validate()?;
        Ok(Rc::new(model))
    }
}

impl Model {
    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| DatamapError::InvalidModel {
            model: self.name.clone(),
            reason,
        };

        for (i, property) in self.properties.iter().enumerate() {
            if self.properties[..i].iter().any(|p| p.name == property.name) {
                return Err(invalid(format!("duplicate property `{}`", property.name)));
            }
        }

        if self.key_properties().next().is_none() {
            return Err(invalid("no key property declared".to_string()));
        }

        for (i, rel) in self.relationships.iter().enumerate() {
            if self.relationships[..i].iter().any(|r| r.name == rel.name) {
                return Err(invalid(format!("duplicate relationship `{}`", rel.name)));
            }
            if rel.name.is_empty() {
                return Err(invalid("relationship with empty name".to_string()));
            }
            if self.property(rel.name).is_some() {
                return Err(invalid(format!(
                    "relationship `{}` shadows a property",
                    rel.name
                )));
            }
            match rel.kind {
                RelKind::BelongsTo => {
                    // foreign keys of a parent association live on this model
                    for name in &rel.child_key {
                        if self.property(name).is_none() {
                            return Err(invalid(format!(
                                "relationship `{}` names unknown foreign key `{}`",
                                rel.name, name
                            )));
                        }
                    }
                    if rel.child_key.len() != rel.parent_key.len() {
                        return Err(invalid(format!(
                            "relationship `{}` has mismatched key arity",
                            rel.name
                        )));
                    }
                }
                RelKind::HasOne | RelKind::HasMany => {
                    if rel.child_key.len() != rel.parent_key.len() {
                        return Err(invalid(format!(
                            "relationship `{}` has mismatched key arity",
                            rel.name
                        )));
                    }
                }
                // join rows belong to the adapter; no keys to check here
                RelKind::ManyToMany => {}
            }
        }

        Ok(())
    }
}
