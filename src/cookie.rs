//! Best-effort mirror of the bearer token into a server-visible cookie.
//!
//! SYSTEM CONTEXT
//! ==============
//! Server-rendered pages read identity from a cookie before any client code
//! runs. After the client captures or drops a token it asks the same-origin
//! session endpoint to set or clear that cookie. Calls are fire-and-forget:
//! failures are logged and never block or roll back the session transition.

#[cfg(test)]
#[path = "cookie_test.rs"]
mod cookie_test;

use std::rc::Rc;

use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::net::api::AuthApi;

#[derive(Clone)]
pub struct CookieMirror {
    api: Rc<dyn AuthApi>,
    spawner: Rc<dyn LocalSpawn>,
}

impl CookieMirror {
    pub fn new(api: Rc<dyn AuthApi>, spawner: Rc<dyn LocalSpawn>) -> Self {
        Self { api, spawner }
    }

    /// Schedule `POST {session_endpoint}` with `token`.
    pub fn set_cookie(&self, token: &str) {
        self.spawn(Some(token.to_owned()));
    }

    /// Schedule `DELETE {session_endpoint}`.
    pub fn clear_cookie(&self) {
        self.spawn(None);
    }

    fn spawn(&self, token: Option<String>) {
        let mirror = self.clone();
        let task = async move { mirror.sync(token.as_deref()).await };
        if let Err(e) = self.spawner.spawn_local(task) {
            log::warn!("cookie mirror could not be scheduled: {e}");
        }
    }

    /// Perform the mirror call inline. Failures are logged, never returned.
    pub async fn sync(&self, token: Option<&str>) {
        let result = match token {
            Some(token) => self.api.set_session_cookie(token).await,
            None => self.api.clear_session_cookie().await,
        };
        match result {
            Ok(()) => log::debug!("session cookie {}", if token.is_some() { "set" } else { "cleared" }),
            Err(e) => log::warn!("session cookie sync failed: {e}"),
        }
    }
}
