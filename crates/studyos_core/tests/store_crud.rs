use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use studyos_core::{new_record_id, Collection, LocalStore, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    id: String,
    title: String,
    status: String,
}

fn task(id: &str, title: &str, status: &str) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        status: status.to_string(),
    }
}

#[test]
fn task_lifecycle_add_update_delete() {
    let store = LocalStore::in_memory();
    let draft = task("t1", "Write report", "todo");

    store.add(Collection::Tasks, &draft).unwrap();
    let all: Vec<Task> = store.get_all(Collection::Tasks).unwrap();
    assert_eq!(all, vec![draft.clone()]);

    store
        .update(Collection::Tasks, &task("t1", "Write report", "done"))
        .unwrap();
    let loaded: Task = store.get(Collection::Tasks, "t1").unwrap().unwrap();
    assert_eq!(loaded.status, "done");

    store.delete(Collection::Tasks, "t1").unwrap();
    assert!(store.get::<Task>(Collection::Tasks, "t1").unwrap().is_none());
}

#[test]
fn duplicate_add_fails_and_keeps_original() {
    let store = LocalStore::in_memory();
    store
        .add(Collection::Habits, &json!({"id": "h1", "name": "Read", "streak": 3}))
        .unwrap();

    let err = store
        .add(Collection::Habits, &json!({"id": "h1", "name": "Run"}))
        .unwrap_err();
    match err {
        StoreError::DuplicateKey { collection, id } => {
            assert_eq!(collection, Collection::Habits);
            assert_eq!(id, "h1");
        }
        other => panic!("unexpected error: {other}"),
    }

    let all: Vec<Value> = store.get_all(Collection::Habits).unwrap();
    assert_eq!(all, vec![json!({"id": "h1", "name": "Read", "streak": 3})]);
}

#[test]
fn update_inserts_when_absent_and_fully_replaces_when_present() {
    let store = LocalStore::in_memory();

    store
        .update(Collection::Goals, &json!({"id": "g1", "title": "Ship", "target": 5}))
        .unwrap();
    let inserted: Value = store.get(Collection::Goals, "g1").unwrap().unwrap();
    assert_eq!(inserted, json!({"id": "g1", "title": "Ship", "target": 5}));

    store
        .update(Collection::Goals, &json!({"id": "g1", "title": "Ship v2"}))
        .unwrap();
    let replaced: Value = store.get(Collection::Goals, "g1").unwrap().unwrap();
    assert_eq!(replaced, json!({"id": "g1", "title": "Ship v2"}));
    assert!(replaced.get("target").is_none());
    assert_eq!(store.count(Collection::Goals).unwrap(), 1);
}

#[test]
fn delete_is_idempotent() {
    let store = LocalStore::in_memory();
    store
        .add(Collection::Notes, &json!({"id": "n1", "body": "hello"}))
        .unwrap();
    store
        .add(Collection::Notes, &json!({"id": "n2", "body": "world"}))
        .unwrap();

    store.delete(Collection::Notes, "n1").unwrap();
    let after_first: Vec<Value> = store.get_all(Collection::Notes).unwrap();
    store.delete(Collection::Notes, "n1").unwrap();
    let after_second: Vec<Value> = store.get_all(Collection::Notes).unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(after_second, vec![json!({"id": "n2", "body": "world"})]);

    store.delete(Collection::Notes, "never-existed").unwrap();
}

#[test]
fn reads_see_preceding_writes() {
    let store = LocalStore::in_memory();
    let id = new_record_id();
    let entry = json!({"id": id, "mood": "good", "text": "Finished chapter 3"});

    store.add(Collection::Journal, &entry).unwrap();
    let all: Vec<Value> = store.get_all(Collection::Journal).unwrap();
    assert!(all.contains(&entry));

    store.delete(Collection::Journal, &id).unwrap();
    assert!(store.get::<Value>(Collection::Journal, &id).unwrap().is_none());
}

#[test]
fn clear_empties_only_the_target_collection() {
    let store = LocalStore::in_memory();
    for index in 0..3 {
        store
            .add(Collection::Widgets, &json!({"id": format!("w{index}")}))
            .unwrap();
    }
    store
        .add(Collection::Challenges, &json!({"id": "c1", "xp": 50}))
        .unwrap();

    store.clear(Collection::Widgets).unwrap();

    assert_eq!(store.count(Collection::Widgets).unwrap(), 0);
    assert_eq!(store.count(Collection::Challenges).unwrap(), 1);
    store.clear(Collection::Widgets).unwrap();
}

#[test]
fn get_all_on_empty_collection_returns_empty() {
    let store = LocalStore::in_memory();
    for collection in Collection::ALL {
        let records: Vec<Value> = store.get_all(collection).unwrap();
        assert!(records.is_empty(), "{collection} should start empty");
    }
}

#[test]
fn unknown_collection_names_fail_fast() {
    let err = "projects".parse::<Collection>().unwrap_err();
    let err: StoreError = err.into();
    assert!(matches!(err, StoreError::UnknownCollection(name) if name == "projects"));

    let collection: Collection = "studySessions".parse().unwrap();
    assert_eq!(collection, Collection::StudySessions);
}

#[test]
fn records_are_opaque_attribute_bags() {
    let store = LocalStore::in_memory();
    let session = json!({
        "id": "s1",
        "subject": "Math",
        "duration": 25,
        "nested": {"pomodoros": [1, 2, 3], "notes": null},
        "completed": true
    });

    store.add(Collection::StudySessions, &session).unwrap();
    let loaded: Value = store.get(Collection::StudySessions, "s1").unwrap().unwrap();
    assert_eq!(loaded, session);
}
