//! In-page publish/subscribe bus.
//!
//! SYSTEM CONTEXT
//! ==============
//! Any part of the forum client can publish or subscribe to string-named
//! events here (a vote button listening for forced logout, the REST client
//! announcing a 401). The session subsystem reserves three names and only
//! ever publishes them through the typed [`SessionEvent`].
//!
//! DESIGN
//! ======
//! Delivery is synchronous and best-effort. The handler list is snapshotted
//! before dispatch so handlers may publish or (un)subscribe while running; a
//! panicking handler is caught and logged, never propagated to the publisher.
//!
//! TRADE-OFFS
//! ==========
//! Panic isolation only works where panics unwind (native builds and tests).
//! On `wasm32-unknown-unknown` a panic aborts the module regardless, so
//! handlers must not panic in the browser.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::types::User;

pub const TOKEN_CHANGED: &str = "token-changed";
pub const LOGIN: &str = "login";
pub const LOGOUT: &str = "logout";

type Handler = Rc<dyn Fn(&Value)>;

// =============================================================================
// SESSION EVENTS
// =============================================================================

/// Typed form of the three reserved session events.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    TokenChanged { token: Option<String> },
    Login { user: User },
    Logout,
}

impl SessionEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TokenChanged { .. } => TOKEN_CHANGED,
            Self::Login { .. } => LOGIN,
            Self::Logout => LOGOUT,
        }
    }

    /// Wire detail published alongside the name.
    #[must_use]
    pub fn detail(&self) -> Value {
        match self {
            Self::TokenChanged { token } => serde_json::json!({ "token": token }),
            Self::Login { user } => serde_json::json!({ "user": user }),
            Self::Logout => serde_json::json!({}),
        }
    }

    /// Parse a bus event back into its typed form. Returns `None` for
    /// unrelated names or a detail that does not match the reserved shape.
    #[must_use]
    pub fn from_parts(name: &str, detail: &Value) -> Option<Self> {
        match name {
            TOKEN_CHANGED => {
                let token = detail.get("token").and_then(Value::as_str).map(str::to_owned);
                Some(Self::TokenChanged { token })
            }
            LOGIN => match serde_json::from_value(detail.get("user")?.clone()) {
                Ok(user) => Some(Self::Login { user }),
                Err(e) => {
                    log::debug!("login event carries an unreadable user: {e}");
                    None
                }
            },
            LOGOUT => Some(Self::Logout),
            _ => None,
        }
    }
}

// =============================================================================
// BUS
// =============================================================================

/// Page-scoped event bus. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    handlers: RefCell<Vec<(u64, String, Handler)>>,
    next_id: Cell<u64>,
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping it leaves the handler registered for the life of the bus.
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl Subscription {
    /// Remove the handler. No-op once the bus is gone.
    pub fn unsubscribe(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.handlers.borrow_mut().retain(|(id, _, _)| *id != self.id);
        }
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events named `name`.
    pub fn subscribe<F>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .handlers
            .borrow_mut()
            .push((id, name.to_owned(), Rc::new(handler)));
        Subscription { bus: Rc::downgrade(&self.inner), id }
    }

    /// Register a typed handler for the reserved session events.
    pub fn on_session_event<F>(&self, name: &'static str, handler: F) -> Subscription
    where
        F: Fn(SessionEvent) + 'static,
    {
        self.subscribe(name, move |detail| match SessionEvent::from_parts(name, detail) {
            Some(event) => handler(event),
            None => log::warn!("ignoring malformed {name} event: {detail}"),
        })
    }

    /// Deliver `detail` to every handler subscribed to `name`.
    ///
    /// Returns the number of handlers that completed without panicking. A
    /// panicking handler is skipped only on unwinding targets; in wasm32 it
    /// still aborts the page.
    pub fn publish(&self, name: &str, detail: &Value) -> usize {
        let targets: Vec<Handler> = self
            .inner
            .handlers
            .borrow()
            .iter()
            .filter(|(_, n, _)| n == name)
            .map(|(_, _, h)| Rc::clone(h))
            .collect();

        let mut delivered = 0;
        for handler in targets {
            match catch_unwind(AssertUnwindSafe(|| handler(detail))) {
                Ok(()) => delivered += 1,
                Err(_) => log::error!("event handler for {name} panicked"),
            }
        }
        delivered
    }

    /// Publish a reserved session event.
    pub fn emit(&self, event: &SessionEvent) -> usize {
        log::debug!("session event: {}", event.name());
        self.publish(event.name(), &event.detail())
    }

    /// Number of handlers currently registered for `name`.
    #[must_use]
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.inner
            .handlers
            .borrow()
            .iter()
            .filter(|(_, n, _)| n == name)
            .count()
    }
}
