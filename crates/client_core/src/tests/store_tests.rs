use std::collections::HashSet;

use super::*;
use crate::test_support::todo;

fn ids(store: &TodoStore) -> Vec<&str> {
    store.records().iter().map(|todo| todo.id.as_str()).collect()
}

#[test]
fn seed_drops_soft_deleted_and_duplicate_records() {
    let mut gone = todo("b", "Gone");
    gone.deleted = Some(true);
    let mut store = TodoStore::new();
    store.seed(vec![todo("a", "First"), gone, todo("c", "Third"), todo("a", "Copy")]);

    assert_eq!(ids(&store), vec!["a", "c"]);
    assert_eq!(store.get(&TodoId::new("a")).expect("a").title, "First");
}

#[test]
fn seed_replaces_previous_contents() {
    let mut store = TodoStore::new();
    store.seed(vec![todo("a", "First")]);
    store.seed(vec![todo("b", "Second")]);
    assert_eq!(ids(&store), vec!["b"]);
}

#[test]
fn create_echo_is_idempotent() {
    let mut store = TodoStore::new();
    store.on_remote_create(todo("a", "Buy milk"));
    store.on_remote_create(todo("a", "Buy milk"));
    assert_eq!(store.len(), 1);
}

#[test]
fn update_replaces_known_record_and_ignores_unknown() {
    let mut store = TodoStore::new();
    store.seed(vec![todo("a", "Buy milk")]);

    let mut done = todo("a", "Buy oat milk");
    done.completed = true;
    store.on_remote_update(done.clone());
    store.on_remote_update(todo("zz", "Never seen"));

    assert_eq!(store.records(), &[done]);
}

#[test]
fn delete_is_a_no_op_when_absent() {
    let mut store = TodoStore::new();
    store.seed(vec![todo("a", "Buy milk")]);
    store.on_remote_delete(&TodoId::new("a"));
    store.on_remote_delete(&TodoId::new("a"));
    assert!(store.is_empty());
}

#[test]
fn late_delete_echo_after_unrelated_create_keeps_the_new_record() {
    let mut store = TodoStore::new();
    store.seed(vec![todo("a", "Old")]);

    // Local removal after the delete call, then an unrelated create, then
    // the echo of the original delete.
    store.apply(SyncEvent::Deleted(TodoId::new("a")));
    store.apply(SyncEvent::Created(todo("b", "New")));
    store.apply(SyncEvent::Deleted(TodoId::new("a")));

    assert_eq!(ids(&store), vec!["b"]);
}

#[test]
fn identifiers_stay_unique_under_interleaved_events() {
    let mut store = TodoStore::new();
    store.seed(vec![todo("a", "A"), todo("b", "B")]);
    let events = vec![
        SyncEvent::Created(todo("c", "C")),
        SyncEvent::Created(todo("a", "A again")),
        SyncEvent::Updated(todo("c", "C edited")),
        SyncEvent::Created(todo("c", "C echo")),
        SyncEvent::Deleted(TodoId::new("b")),
        SyncEvent::Updated(todo("b", "B resurrected?")),
        SyncEvent::Created(todo("b", "B for real")),
        SyncEvent::Deleted(TodoId::new("missing")),
    ];
    for event in events {
        store.apply(event);
        let unique: HashSet<_> = store.records().iter().map(|todo| &todo.id).collect();
        assert_eq!(unique.len(), store.len());
    }

    assert_eq!(ids(&store), vec!["a", "c", "b"]);
    assert_eq!(store.get(&TodoId::new("c")).expect("c").title, "C edited");
}
