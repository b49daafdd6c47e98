//! Scriptable [`AuthApi`] double that records every call.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use async_trait::async_trait;
use futures::channel::oneshot;

use super::api::AuthApi;
use crate::error::SessionError;
use crate::types::User;

pub(crate) fn user(id: &str, name: &str) -> User {
    serde_json::from_value(serde_json::json!({"id": id, "name": name, "score": 1})).unwrap()
}

#[derive(Default)]
pub(crate) struct FakeAuthApi {
    users: RefCell<HashMap<String, User>>,
    me_gates: RefCell<Vec<oneshot::Receiver<()>>>,
    pub me_calls: RefCell<Vec<String>>,
    pub redirect_calls: RefCell<Vec<String>>,
    pub logout_calls: RefCell<Vec<String>>,
    pub cookie_sets: RefCell<Vec<String>>,
    pub cookie_clears: Cell<usize>,
    pub fail_redirect: Cell<bool>,
    pub fail_logout: Cell<bool>,
    pub fail_cookies: Cell<bool>,
}

impl FakeAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `token` resolve to `user` on `/auth/me`.
    pub fn accept(&self, token: &str, user: User) {
        self.users.borrow_mut().insert(token.to_owned(), user);
    }

    /// Hold the next `/auth/me` response until the returned sender fires.
    pub fn hold_next_me(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.me_gates.borrow_mut().push(rx);
        tx
    }

    pub fn me_count(&self) -> usize {
        self.me_calls.borrow().len()
    }

    /// Total requests sent to any endpoint.
    pub fn total_calls(&self) -> usize {
        self.me_calls.borrow().len()
            + self.redirect_calls.borrow().len()
            + self.logout_calls.borrow().len()
            + self.cookie_sets.borrow().len()
            + self.cookie_clears.get()
    }
}

fn network() -> SessionError {
    SessionError::Network("simulated failure".to_owned())
}

#[async_trait(?Send)]
impl AuthApi for FakeAuthApi {
    async fn fetch_me(&self, token: &str) -> Result<User, SessionError> {
        self.me_calls.borrow_mut().push(token.to_owned());
        let gate = {
            let mut gates = self.me_gates.borrow_mut();
            if gates.is_empty() { None } else { Some(gates.remove(0)) }
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.users
            .borrow()
            .get(token)
            .cloned()
            .ok_or(SessionError::Status { endpoint: "/api/auth/me".to_owned(), status: 401 })
    }

    async fn request_login_redirect(&self, intended_url: &str) -> Result<String, SessionError> {
        self.redirect_calls.borrow_mut().push(intended_url.to_owned());
        if self.fail_redirect.get() {
            return Err(network());
        }
        Ok(format!("https://sso.test/authorize?next={intended_url}"))
    }

    async fn logout(&self, token: &str) -> Result<(), SessionError> {
        self.logout_calls.borrow_mut().push(token.to_owned());
        if self.fail_logout.get() {
            return Err(network());
        }
        Ok(())
    }

    async fn set_session_cookie(&self, token: &str) -> Result<(), SessionError> {
        self.cookie_sets.borrow_mut().push(token.to_owned());
        if self.fail_cookies.get() {
            return Err(network());
        }
        Ok(())
    }

    async fn clear_session_cookie(&self) -> Result<(), SessionError> {
        self.cookie_clears.set(self.cookie_clears.get() + 1);
        if self.fail_cookies.get() {
            return Err(network());
        }
        Ok(())
    }
}
