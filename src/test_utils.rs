//! Shared fixtures for tests.
//!
//! Available to downstream crates through the `test_utils` feature.

pub mod fixtures {
    use std::rc::Rc;

    use crate::model::Model;
    use crate::property::Property;
    use crate::relationship::Relationship;
    use crate::value::{Value, ValueKind};

    /// A standalone model: serial id, a text field, a defaulted flag.
    pub fn article() -> Rc<Model> {
        Model::build("article")
            .property(Property::new("id", ValueKind::Int).serial())
            .property(Property::new("title", ValueKind::Text))
            .property(Property::new("draft", ValueKind::Bool).default(Value::Bool(true)))
            .finish()
            .expect("article fixture is valid")
    }

    /// Parent side of the author ↔ book graph.
    pub fn author() -> Rc<Model> {
        Model::build("author")
            .property(Property::new("id", ValueKind::Int).serial())
            .property(Property::new("name", ValueKind::Text))
            .relationship(Relationship::has_many("books").child_key(&["author_id"]))
            .finish()
            .expect("author fixture is valid")
    }

    /// Child of author, parent of review, joined to tag.
    pub fn book() -> Rc<Model> {
        Model::build("book")
            .property(Property::new("id", ValueKind::Int).serial())
            .property(Property::new("author_id", ValueKind::Int))
            .property(Property::new("title", ValueKind::Text))
            .relationship(Relationship::belongs_to("author").child_key(&["author_id"]))
            .relationship(Relationship::has_many("reviews").child_key(&["book_id"]))
            .relationship(Relationship::many_to_many("tags"))
            .finish()
            .expect("book fixture is valid")
    }

    pub fn review() -> Rc<Model> {
        Model::build("review")
            .property(Property::new("id", ValueKind::Int).serial())
            .property(Property::new("book_id", ValueKind::Int))
            .property(Property::new("body", ValueKind::Text))
            .relationship(Relationship::belongs_to("book").child_key(&["book_id"]))
            .finish()
            .expect("review fixture is valid")
    }

    pub fn tag() -> Rc<Model> {
        Model::build("tag")
            .property(Property::new("id", ValueKind::Int).serial())
            .property(Property::new("name", ValueKind::Text))
            .finish()
            .expect("tag fixture is valid")
    }
}
