//! Shared model graph for integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use datamap::{Event, HookFlow, Model, Phase, Property, Relationship, ValueKind};

pub fn author() -> Rc<Model> {
    Model::build("author")
        .property(Property::new("id", ValueKind::Int).serial())
        .property(Property::new("name", ValueKind::Text))
        .relationship(Relationship::has_many("books").child_key(&["author_id"]))
        .finish()
        .unwrap()
}

pub fn book() -> Rc<Model> {
    Model::build("book")
        .property(Property::new("id", ValueKind::Int).serial())
        .property(Property::new("author_id", ValueKind::Int))
        .property(Property::new("title", ValueKind::Text))
        .relationship(Relationship::belongs_to("author").child_key(&["author_id"]))
        .relationship(Relationship::has_many("reviews").child_key(&["book_id"]))
        .relationship(Relationship::many_to_many("tags"))
        .finish()
        .unwrap()
}

pub fn review() -> Rc<Model> {
    Model::build("review")
        .property(Property::new("id", ValueKind::Int).serial())
        .property(Property::new("book_id", ValueKind::Int))
        .property(Property::new("body", ValueKind::Text))
        .relationship(Relationship::belongs_to("book").child_key(&["book_id"]))
        .finish()
        .unwrap()
}

pub fn tag() -> Rc<Model> {
    Model::build("tag")
        .property(Property::new("id", ValueKind::Int).serial())
        .property(Property::new("name", ValueKind::Text))
        .finish()
        .unwrap()
}

/// A shared journal of commit order, written by after-create hooks.
pub type Journal = Rc<RefCell<Vec<&'static str>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

/// Attach an after-create hook that records `tag` into the journal.
pub fn journaling(builder: datamap::ModelBuilder, journal: &Journal, tag: &'static str) -> datamap::ModelBuilder {
    let journal = journal.clone();
    builder.hook(Event::Create, Phase::After, move |_| {
        journal.borrow_mut().push(tag);
        Ok(HookFlow::Continue)
    })
}
