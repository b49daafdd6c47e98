//! Session and user DTOs shared by every module in the crate.
//!
//! DESIGN
//! ======
//! `User` mirrors the `/auth/me` payload. Unknown backend fields ride along in
//! `extra` so a snapshot written to the persistent store round-trips without
//! losing data the forum UI may read later.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// USER
// =============================================================================

/// Canonical user record returned by the identity endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Backend user id. Numeric ids are stringified on decode.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    /// Avatar image URL, if the user uploaded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Reputation score.
    #[serde(default)]
    pub score: i64,
    /// Notification delivery preference (e.g. `"email"`, `"none"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_preference: Option<String>,
    /// Backend fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Merge `patch` into this record in place. The id never changes.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = Some(email);
        }
        if let Some(mobile) = patch.mobile {
            self.mobile = Some(mobile);
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = Some(avatar);
        }
        if let Some(score) = patch.score {
            self.score = score;
        }
        if let Some(pref) = patch.notification_preference {
            self.notification_preference = Some(pref);
        }
        self.extra.extend(patch.extra);
    }
}

/// Partial update for [`User`]. Absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_preference: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserPatch {
    /// Patch that only sets the score.
    #[must_use]
    pub fn score(score: i64) -> Self {
        Self { score: Some(score), ..Self::default() }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// In-memory session record owned by [`crate::machine::SessionMachine`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    /// Opaque bearer credential; `None` means guest.
    pub token: Option<String>,
    /// Profile snapshot, possibly stale until the next identity fetch.
    pub user: Option<User>,
    /// True only during the initial bootstrap reconciliation.
    pub is_loading: bool,
}

impl Session {
    /// Fresh record before bootstrap has run.
    #[must_use]
    pub fn bootstrapping() -> Self {
        Self { token: None, user: None, is_loading: true }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// Lifecycle phase derived from the three fields.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (&self.token, &self.user) {
            (Some(_), Some(_)) => SessionPhase::Authenticated,
            (Some(_), None) => SessionPhase::Authenticating,
            (None, _) if self.is_loading => SessionPhase::Bootstrapping,
            (None, _) => SessionPhase::Guest,
        }
    }
}

/// Coarse lifecycle state of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Bootstrapping,
    Guest,
    /// Token present, identity fetch outstanding.
    Authenticating,
    Authenticated,
}

/// Values seeded by server-side rendering, consumed once at bootstrap.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialSession {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}
