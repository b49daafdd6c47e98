//! Consumer-facing projection of the session machine.
//!
//! SYSTEM CONTEXT
//! ==============
//! Components read session state and trigger login/logout through this type
//! instead of the machine. It adds the two view helpers the forum UI needs:
//! an ownership permission check and avatar initials.

#[cfg(test)]
#[path = "facade_test.rs"]
mod facade_test;

use serde_json::Value;

use crate::error::SessionError;
use crate::events::EventBus;
use crate::machine::SessionMachine;
use crate::types::{Session, User, UserPatch};

/// Placeholder shown when no name is available.
pub const UNKNOWN_INITIALS: &str = "?";

/// A resource that may be owned by a user.
pub trait OwnedResource {
    /// Id of the owning user, if the resource exposes one.
    fn owner_id(&self) -> Option<String>;
}

/// JSON resources expose ownership as `owner.id` (string or number).
impl OwnedResource for Value {
    fn owner_id(&self) -> Option<String> {
        match self.get("owner")?.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl OwnedResource for User {
    fn owner_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

#[derive(Clone)]
pub struct SessionFacade {
    machine: SessionMachine,
}

impl SessionFacade {
    pub fn new(machine: SessionMachine) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn session(&self) -> Session {
        self.machine.snapshot()
    }

    pub fn is_authenticated(&self) -> bool {
        self.machine.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.machine.snapshot().is_loading
    }

    pub fn user(&self) -> Option<User> {
        self.machine.user()
    }

    pub fn token(&self) -> Option<String> {
        self.machine.token()
    }

    pub fn events(&self) -> &EventBus {
        self.machine.events()
    }

    /// Start the OAuth redirect. See [`SessionMachine::login`].
    ///
    /// # Errors
    ///
    /// Propagates redirect-negotiation failures.
    pub async fn login(&self, intended_url: Option<&str>) -> Result<(), SessionError> {
        self.machine.login(intended_url).await
    }

    /// Sign out. See [`SessionMachine::logout`].
    ///
    /// # Errors
    ///
    /// Propagates the remote logout failure; local state is cleared regardless.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.machine.logout().await
    }

    pub fn update_user(&self, patch: UserPatch) -> Option<User> {
        self.machine.update_user(patch)
    }

    /// Whether the current user may perform `permission` on `resource`.
    ///
    /// Guests are always denied. Otherwise the only rule is ownership: the
    /// resource's owner id must equal the current user's id.
    pub fn can<R>(&self, permission: &str, resource: &R) -> bool
    where
        R: OwnedResource + ?Sized,
    {
        let session = self.machine.snapshot();
        let Some(user) = session.user.as_ref().filter(|_| session.is_authenticated()) else {
            return false;
        };
        let allowed = resource.owner_id().is_some_and(|owner| owner == user.id);
        log::trace!("can({permission}) for user={} -> {allowed}", user.id);
        allowed
    }

    /// Initials for `name`, or for the current user's name when `None`.
    pub fn initials(&self, name: Option<&str>) -> String {
        let own;
        let name = match name {
            Some(name) => Some(name),
            None => {
                own = self.machine.user().map(|u| u.name);
                own.as_deref()
            }
        };
        name.and_then(initials_of).unwrap_or_else(|| UNKNOWN_INITIALS.to_owned())
    }
}

/// Up to two uppercase initials from the whitespace-separated words of `name`.
///
/// Each word contributes one character, even when its uppercase form expands.
pub fn initials_of(name: &str) -> Option<String> {
    let initials: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next()?.to_uppercase().next())
        .take(2)
        .collect();
    if initials.is_empty() { None } else { Some(initials) }
}
