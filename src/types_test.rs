use super::*;

fn user() -> User {
    User {
        id: "u1".to_owned(),
        name: "Ada Lovelace".to_owned(),
        email: Some("ada@example.com".to_owned()),
        mobile: None,
        avatar: None,
        score: 10,
        notification_preference: None,
        extra: Map::new(),
    }
}

// =============================================================
// User decoding
// =============================================================

#[test]
fn user_accepts_numeric_id() {
    let user: User = serde_json::from_value(serde_json::json!({"id": 42, "name": "Bob"})).unwrap();
    assert_eq!(user.id, "42");
    assert_eq!(user.score, 0);
}

#[test]
fn user_rejects_object_id() {
    let result = serde_json::from_value::<User>(serde_json::json!({"id": {"x": 1}, "name": "Bob"}));
    assert!(result.is_err());
}

#[test]
fn user_keeps_unknown_fields_in_extra() {
    let raw = serde_json::json!({"id": "u1", "name": "Ada", "score": 3, "badge": "gold"});
    let user: User = serde_json::from_value(raw).unwrap();
    assert_eq!(user.extra.get("badge"), Some(&serde_json::json!("gold")));

    let back = serde_json::to_value(&user).unwrap();
    assert_eq!(back["badge"], "gold");
    assert_eq!(back["score"], 3);
}

// =============================================================
// UserPatch
// =============================================================

#[test]
fn patch_only_touches_present_fields() {
    let mut u = user();
    u.apply(UserPatch::score(99));
    assert_eq!(u.score, 99);
    assert_eq!(u.name, "Ada Lovelace");
    assert_eq!(u.email.as_deref(), Some("ada@example.com"));
}

#[test]
fn patch_merges_extra_fields() {
    let mut u = user();
    let mut patch = UserPatch { name: Some("Ada L.".to_owned()), ..UserPatch::default() };
    patch.extra.insert("locale".to_owned(), serde_json::json!("en"));
    u.apply(patch);
    assert_eq!(u.name, "Ada L.");
    assert_eq!(u.extra.get("locale"), Some(&serde_json::json!("en")));
    assert_eq!(u.id, "u1");
}

// =============================================================
// Session
// =============================================================

#[test]
fn session_phase_follows_fields() {
    assert_eq!(Session::bootstrapping().phase(), SessionPhase::Bootstrapping);
    assert_eq!(Session::default().phase(), SessionPhase::Guest);

    let authenticating = Session { token: Some("t".to_owned()), user: None, is_loading: true };
    assert_eq!(authenticating.phase(), SessionPhase::Authenticating);
    assert!(!authenticating.is_authenticated());

    let authed = Session { token: Some("t".to_owned()), user: Some(user()), is_loading: false };
    assert_eq!(authed.phase(), SessionPhase::Authenticated);
    assert!(authed.is_authenticated());
}

#[test]
fn user_without_token_is_not_authenticated() {
    let s = Session { token: None, user: Some(user()), is_loading: false };
    assert!(!s.is_authenticated());
    assert_eq!(s.phase(), SessionPhase::Guest);
}
