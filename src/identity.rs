//! Token-to-user identity fetch with single-slot call deduplication.
//!
//! DESIGN
//! ======
//! At most one `/auth/me` request is outstanding. The slot holds a shared
//! future; every caller that arrives while it is set awaits the same result
//! instead of issuing a second request. A guard owned by the request future
//! clears the slot when the request settles, including on unwind, so a failed
//! fetch never wedges later callers.
//!
//! TRADE-OFFS
//! ==========
//! The slot is not keyed by token. A caller passing a different token while a
//! request is outstanding joins that request and receives its result. The
//! machine discards results whose *own* token went stale, but a caller for the
//! newer token can still observe the older token's user.

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use crate::net::api::AuthApi;
use crate::types::User;

/// Pending identity result shared between deduplicated callers.
///
/// Resolves to `None` when the token was rejected or the request failed.
pub type PendingUser = Shared<LocalBoxFuture<'static, Option<User>>>;

struct InFlight {
    id: u64,
    token: String,
    pending: PendingUser,
}

/// Clears the slot when the request future completes or unwinds.
struct SlotGuard {
    slot: Weak<RefCell<Option<InFlight>>>,
    id: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let Ok(mut slot) = slot.try_borrow_mut() else {
            log::error!("identity slot busy while settling request {}", self.id);
            return;
        };
        if slot.as_ref().is_some_and(|f| f.id == self.id) {
            *slot = None;
        }
    }
}

#[derive(Clone)]
pub struct IdentityFetcher {
    api: Rc<dyn AuthApi>,
    slot: Rc<RefCell<Option<InFlight>>>,
    next_id: Rc<Cell<u64>>,
}

impl IdentityFetcher {
    pub fn new(api: Rc<dyn AuthApi>) -> Self {
        Self { api, slot: Rc::new(RefCell::new(None)), next_id: Rc::new(Cell::new(0)) }
    }

    /// Resolve `token` to its user, joining the outstanding request if any.
    pub fn fetch_user(&self, token: &str) -> PendingUser {
        if let Some(in_flight) = self.slot.borrow().as_ref() {
            if in_flight.token != token {
                log::debug!("identity fetch joins outstanding request for a different token");
            }
            return in_flight.pending.clone();
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let guard = SlotGuard { slot: Rc::downgrade(&self.slot), id };
        let api = Rc::clone(&self.api);
        let owned = token.to_owned();

        let pending = async move {
            let _guard = guard;
            match api.fetch_me(&owned).await {
                Ok(user) => Some(user),
                Err(e) => {
                    log::warn!("identity fetch rejected token: {e}");
                    None
                }
            }
        }
        .boxed_local()
        .shared();

        *self.slot.borrow_mut() = Some(InFlight { id, token: token.to_owned(), pending: pending.clone() });
        pending
    }

    /// Token of the outstanding request, if one is in flight.
    pub fn in_flight_token(&self) -> Option<String> {
        self.slot.borrow().as_ref().map(|f| f.token.clone())
    }
}
