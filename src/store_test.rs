use super::*;

fn user() -> User {
    serde_json::from_value(serde_json::json!({"id": "u1", "name": "Ada", "score": 5})).unwrap()
}

fn persistent(backend: &MemoryStore) -> PersistentStore {
    PersistentStore::new(Rc::new(backend.clone()), &SessionConfig::default())
}

// =============================================================
// PersistentStore
// =============================================================

#[test]
fn token_round_trip_and_removal() {
    let backend = MemoryStore::new();
    let store = persistent(&backend);

    assert!(store.write_token(Some("abc")));
    assert_eq!(store.read_token().as_deref(), Some("abc"));
    assert_eq!(backend.get("auth_token").unwrap().as_deref(), Some("abc"));

    assert!(store.write_token(None));
    assert_eq!(store.read_token(), None);
    assert_eq!(backend.get("auth_token").unwrap(), None);
}

#[test]
fn empty_token_reads_as_absent() {
    let backend = MemoryStore::new();
    backend.set("auth_token", "").unwrap();
    assert_eq!(persistent(&backend).read_token(), None);
}

#[test]
fn user_snapshot_is_json_encoded() {
    let backend = MemoryStore::new();
    let store = persistent(&backend);
    store.write_user(Some(&user()));

    let raw = backend.get("auth_user").unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["name"], "Ada");
    assert_eq!(store.read_user(), Some(user()));
}

#[test]
fn corrupt_user_snapshot_is_cleared() {
    let backend = MemoryStore::new();
    backend.set("auth_user", "{not json").unwrap();
    let store = persistent(&backend);

    assert_eq!(store.read_user(), None);
    assert_eq!(backend.get("auth_user").unwrap(), None);
}

#[test]
fn unavailable_backend_fails_softly() {
    let backend = MemoryStore::new();
    let store = persistent(&backend);
    store.write_token(Some("abc"));
    backend.set_unavailable(true);

    assert!(!store.write_token(Some("def")));
    assert_eq!(store.read_token(), None);

    backend.set_unavailable(false);
    assert_eq!(store.read_token().as_deref(), Some("abc"));
}

#[test]
fn classify_recognizes_owned_keys_only() {
    let store = persistent(&MemoryStore::new());
    assert_eq!(store.classify("auth_token"), Some(StoreKey::Token));
    assert_eq!(store.classify("auth_user"), Some(StoreKey::User));
    assert_eq!(store.classify("theme"), None);
}

// =============================================================
// MemoryStore tabs
// =============================================================

#[test]
fn writes_notify_other_tabs_only() {
    let origin = MemoryStore::new();
    let (tab1, mut rx1) = origin.open_tab();
    let (_tab2, mut rx2) = origin.open_tab();

    tab1.set("auth_token", "t1").unwrap();

    assert!(rx1.try_next().is_err(), "writer must not see its own change");
    let change = rx2.try_next().unwrap().unwrap();
    assert_eq!(
        change,
        StorageChange {
            key: Some("auth_token".to_owned()),
            old_value: None,
            new_value: Some("t1".to_owned()),
        }
    );
}

#[test]
fn unchanged_writes_do_not_notify() {
    let origin = MemoryStore::new();
    let (tab1, _rx1) = origin.open_tab();
    let (_tab2, mut rx2) = origin.open_tab();

    tab1.remove("auth_token").unwrap();
    assert!(rx2.try_next().is_err());

    tab1.set("auth_token", "t1").unwrap();
    tab1.set("auth_token", "t1").unwrap();
    assert!(rx2.try_next().unwrap().is_some());
    assert!(rx2.try_next().is_err());
}

#[test]
fn tabs_share_items() {
    let origin = MemoryStore::new();
    let (tab1, _rx1) = origin.open_tab();
    let (tab2, _rx2) = origin.open_tab();
    tab1.set("k", "v").unwrap();
    assert_eq!(tab2.get("k").unwrap().as_deref(), Some("v"));
    assert_eq!(origin.get("k").unwrap().as_deref(), Some("v"));
}
