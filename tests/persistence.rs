//! Resources against the JSON-file adapter: the same cascade, durable.

mod common;

use datamap::{JsonAdapter, Resource, Value};

#[test]
fn a_saved_graph_survives_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let key;
    {
        let adapter = JsonAdapter::open(dir.path()).unwrap();
        let a = Resource::new(common::author());
        let b = Resource::new(common::book());
        a.set("name", Value::Text("Ursula".into())).unwrap();
        b.set("title", Value::Text("Dispossessed".into())).unwrap();
        b.set_parent("author", &a).unwrap();

        assert!(b.save(&adapter).unwrap());
        key = b.key().unwrap();
    }

    let adapter = JsonAdapter::open(dir.path()).unwrap();
    assert_eq!(adapter.len("author"), 1);
    let record = adapter.record("book", &key).unwrap();
    assert_eq!(record.get("title"), Some(&Value::Text("Dispossessed".into())));
    assert_eq!(record.get("author_id"), Some(&Value::Int(1)));
}

#[test]
fn updates_and_destroys_are_durable() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = JsonAdapter::open(dir.path()).unwrap();

    let a = Resource::new(common::author());
    a.set("name", Value::Text("before".into())).unwrap();
    a.save(&adapter).unwrap();
    let key = a.key().unwrap();

    a.set("name", Value::Text("after".into())).unwrap();
    assert!(a.save(&adapter).unwrap());

    {
        let reopened = JsonAdapter::open(dir.path()).unwrap();
        assert_eq!(
            reopened.record("author", &key).unwrap().get("name"),
            Some(&Value::Text("after".into()))
        );
    }

    assert!(a.destroy(&adapter).unwrap());
    let reopened = JsonAdapter::open(dir.path()).unwrap();
    assert_eq!(reopened.len("author"), 0);
}

#[test]
fn materialized_resources_update_against_the_stored_record() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = JsonAdapter::open(dir.path()).unwrap();

    let a = Resource::new(common::author());
    a.set("name", Value::Text("stored".into())).unwrap();
    a.save(&adapter).unwrap();
    let id = a.get("id").unwrap().unwrap();

    // a loader materializes a clean resource from the stored record
    let loaded = Resource::materialized(
        common::author(),
        [("id", id), ("name", Value::Text("stored".into()))],
    )
    .unwrap();
    assert!(loaded.clean());

    loaded.set("name", Value::Text("edited".into())).unwrap();
    assert!(loaded.save(&adapter).unwrap());

    let record = adapter.record("author", &loaded.key().unwrap()).unwrap();
    assert_eq!(record.get("name"), Some(&Value::Text("edited".into())));
}
