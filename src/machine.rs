//! Session state machine: the single owner of the token/user record.
//!
//! ARCHITECTURE
//! ============
//! Four sources feed the record: the bootstrap seed (server render, URL
//! fragment, persistent store), explicit `login()`/`logout()`, cross-tab
//! `storage` notifications, and `logout` events published on the bus by other
//! parts of the client. The machine is the only writer of the persistent store
//! and the only publisher of the reserved session events.
//!
//! ORDERING
//! ========
//! Every transition mutates memory, then writes the store, then notifies
//! observers, then publishes on the bus. Handlers reading the store from a
//! `login`/`logout` callback therefore see the new state.
//!
//! `login`/`logout` events fire only when a *settled* state (Guest or
//! Authenticated) differs from the previous settled state. `Authenticating`
//! never emits, so re-fetching a user or applying a duplicate notification
//! cannot double-publish.

#[cfg(test)]
#[path = "machine_test.rs"]
mod machine_test;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::config::SessionConfig;
use crate::cookie::CookieMirror;
use crate::error::SessionError;
use crate::events::{EventBus, LOGOUT, SessionEvent, Subscription};
use crate::identity::IdentityFetcher;
use crate::location::{Location, capture_token};
use crate::net::api::AuthApi;
use crate::store::{KeyValueStore, PersistentStore, StorageChange, StoreKey, decode_user};
use crate::types::{InitialSession, Session, User, UserPatch};

type Observer = Rc<dyn Fn(&Session)>;

/// Collaborators injected into the machine.
pub struct SessionDeps {
    pub store: Rc<dyn KeyValueStore>,
    pub api: Rc<dyn AuthApi>,
    pub location: Rc<dyn Location>,
    pub spawner: Rc<dyn LocalSpawn>,
    pub bus: EventBus,
}

/// Handle to the session state machine. Clones share the same state.
#[derive(Clone)]
pub struct SessionMachine {
    inner: Rc<Inner>,
}

struct Inner {
    config: SessionConfig,
    session: RefCell<Session>,
    /// Authenticated flag of the last settled state; `None` until bootstrap settles.
    last_settled: Cell<Option<bool>>,
    bootstrapped: Cell<bool>,
    store: PersistentStore,
    bus: EventBus,
    fetcher: IdentityFetcher,
    cookies: CookieMirror,
    api: Rc<dyn AuthApi>,
    location: Rc<dyn Location>,
    spawner: Rc<dyn LocalSpawn>,
    observers: RefCell<Vec<Observer>>,
    logout_subscription: RefCell<Option<Subscription>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(sub) = self.logout_subscription.get_mut().take() {
            sub.unsubscribe();
        }
    }
}

impl SessionMachine {
    pub fn new(config: SessionConfig, deps: SessionDeps) -> Self {
        let store = PersistentStore::new(deps.store, &config);
        let fetcher = IdentityFetcher::new(Rc::clone(&deps.api));
        let cookies = CookieMirror::new(Rc::clone(&deps.api), Rc::clone(&deps.spawner));

        let inner = Rc::new(Inner {
            config,
            session: RefCell::new(Session::bootstrapping()),
            last_settled: Cell::new(None),
            bootstrapped: Cell::new(false),
            store,
            bus: deps.bus,
            fetcher,
            cookies,
            api: deps.api,
            location: deps.location,
            spawner: deps.spawner,
            observers: RefCell::new(Vec::new()),
            logout_subscription: RefCell::new(None),
        });

        let weak: Weak<Inner> = Rc::downgrade(&inner);
        let sub = inner.bus.subscribe(LOGOUT, move |_| {
            if let Some(inner) = weak.upgrade() {
                SessionMachine { inner }.handle_external_logout();
            }
        });
        *inner.logout_subscription.borrow_mut() = Some(sub);

        Self { inner }
    }

    // =========================================================================
    // READ SURFACE
    // =========================================================================

    /// Copy of the current record.
    pub fn snapshot(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.session.borrow().token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.session.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.borrow().is_authenticated()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Call `observer` after every transition with the new record.
    pub fn on_change<F>(&self, observer: F)
    where
        F: Fn(&Session) + 'static,
    {
        self.inner.observers.borrow_mut().push(Rc::new(observer));
    }

    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    /// Reconcile the initial record. Runs once per page; later calls are ignored.
    ///
    /// Precedence: a token in the URL, then the server-rendered seed, then the
    /// persistent store. A token without a user snapshot triggers one identity
    /// fetch; `is_loading` stays true until it settles.
    pub async fn bootstrap(&self, initial: InitialSession) {
        if self.inner.bootstrapped.replace(true) {
            log::warn!("session bootstrap called twice; ignoring");
            return;
        }

        let (token, user, mirror) = self.bootstrap_seed(initial);
        let Some(token) = token else {
            log::debug!("bootstrap: no token, starting as guest");
            self.inner.store.write_user(None);
            self.mutate(|s| {
                s.user = None;
                s.is_loading = false;
            });
            self.settle();
            return;
        };

        self.inner.store.write_token(Some(&token));
        self.inner.store.write_user(user.as_ref());
        let authenticated = user.is_some();
        self.mutate(|s| {
            s.token = Some(token.clone());
            s.user = user;
            s.is_loading = !authenticated;
        });
        self.inner.bus.emit(&SessionEvent::TokenChanged { token: Some(token.clone()) });
        if mirror {
            self.inner.cookies.set_cookie(&token);
        }

        if authenticated {
            log::debug!("bootstrap: seeded user, no identity fetch needed");
        } else {
            log::debug!("bootstrap: token without user, fetching identity");
            self.authenticate(token).await;
            self.mutate(|s| s.is_loading = false);
        }
        self.settle();
    }

    /// Returns the seed token and user, and whether the token needs mirroring
    /// into the cookie (true unless the server rendered it).
    fn bootstrap_seed(&self, initial: InitialSession) -> (Option<String>, Option<User>, bool) {
        let location = &self.inner.location;
        if let Some(captured) = capture_token(&location.href(), &self.inner.config.token_param) {
            location.replace(&captured.cleaned_url);
            log::debug!("bootstrap: captured token from {:?}", captured.source);
            return (Some(captured.token), None, true);
        }

        if let Some(token) = initial.token.filter(|t| !t.is_empty()) {
            return (Some(token), initial.user, false);
        }

        let token = self.inner.store.read_token();
        let user = token.as_ref().and_then(|_| self.inner.store.read_user());
        (token, user, true)
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// Fetch the user for `token` and fold the result into the record.
    ///
    /// A result whose token is no longer current is discarded.
    async fn authenticate(&self, token: String) {
        let user = self.inner.fetcher.fetch_user(&token).await;

        if self.token().as_deref() != Some(token.as_str()) {
            log::debug!("discarding identity result for a token that is no longer current");
            return;
        }

        match user {
            Some(user) => {
                self.inner.store.write_user(Some(&user));
                self.mutate(|s| s.user = Some(user));
                self.settle();
            }
            None => {
                log::info!("session token rejected; signing out");
                self.clear(true);
                self.inner.cookies.clear_cookie();
                self.settle();
            }
        }
    }

    fn spawn_authenticate(&self, token: String) {
        let machine = self.clone();
        let task = async move { machine.authenticate(token).await };
        if let Err(e) = self.inner.spawner.spawn_local(task) {
            log::error!("failed to schedule identity fetch: {e}");
        }
    }

    // =========================================================================
    // EXPLICIT LOGIN / LOGOUT / UPDATE
    // =========================================================================

    /// Negotiate the OAuth redirect and navigate to it.
    ///
    /// Local state is untouched; the token arrives on the page the provider
    /// redirects back to. `intended_url` defaults to the current location.
    ///
    /// # Errors
    ///
    /// Returns the redirect-negotiation failure so the caller can show feedback.
    pub async fn login(&self, intended_url: Option<&str>) -> Result<(), SessionError> {
        let intended = intended_url.map_or_else(|| self.inner.location.href(), str::to_owned);
        let redirect = self.inner.api.request_login_redirect(&intended).await?;
        log::info!("redirecting to login provider");
        self.inner.location.assign(&redirect);
        Ok(())
    }

    /// Sign out locally, then revoke the token server-side.
    ///
    /// The local transition to guest always happens, even when the remote call
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns the remote logout failure after local state has been cleared.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let Some(token) = self.token() else {
            log::debug!("logout while guest; nothing to do");
            return Ok(());
        };

        log::info!("signing out");
        self.clear(true);
        self.inner.cookies.clear_cookie();
        self.settle();

        self.inner
            .api
            .logout(&token)
            .await
            .inspect_err(|e| log::warn!("remote logout failed (local session already cleared): {e}"))
    }

    /// Merge `patch` into the current user and re-persist the snapshot.
    ///
    /// Returns the updated user, or `None` when there is no user to update.
    /// Never changes the token and never publishes `login`/`logout`.
    pub fn update_user(&self, patch: UserPatch) -> Option<User> {
        let updated = {
            let mut session = self.inner.session.borrow_mut();
            let user = session.user.as_mut()?;
            user.apply(patch);
            user.clone()
        };
        self.inner.store.write_user(Some(&updated));
        self.notify();
        Some(updated)
    }

    // =========================================================================
    // EXTERNAL NOTIFICATIONS
    // =========================================================================

    /// Fold a cross-tab `storage` notification into the record.
    pub fn handle_storage_change(&self, change: &StorageChange) {
        let key = match change.key.as_deref() {
            None => StoreKey::Token,
            Some(raw) => match self.inner.store.classify(raw) {
                Some(key) => key,
                None => return,
            },
        };
        let new_value = change.new_value.as_deref().filter(|v| !v.is_empty());

        match key {
            StoreKey::Token => self.handle_remote_token(new_value),
            StoreKey::User => self.handle_remote_user(new_value),
        }
    }

    fn handle_remote_token(&self, new_token: Option<&str>) {
        let current = self.token();
        match new_token {
            None if current.is_none() => {}
            None => {
                log::info!("session ended in another tab");
                self.clear(false);
                self.settle();
            }
            Some(token) if current.as_deref() == Some(token) => {}
            Some(token) => {
                log::debug!("another tab changed the session token; re-authenticating");
                self.mutate(|s| {
                    s.token = Some(token.to_owned());
                    s.user = None;
                });
                self.inner.bus.emit(&SessionEvent::TokenChanged { token: Some(token.to_owned()) });
                self.spawn_authenticate(token.to_owned());
            }
        }
    }

    fn handle_remote_user(&self, raw: Option<&str>) {
        let Some(raw) = raw else {
            return;
        };
        let Some(current) = self.token() else {
            return;
        };
        if self.inner.store.read_token().as_deref() != Some(current.as_str()) {
            return;
        }
        match decode_user(raw) {
            Ok(user) => {
                if self.user().as_ref() == Some(&user) {
                    return;
                }
                log::debug!("adopting user snapshot written by another tab");
                self.mutate(|s| s.user = Some(user));
                self.settle();
            }
            Err(e) => log::warn!("ignoring unreadable user snapshot from another tab: {e}"),
        }
    }

    /// A `logout` published by someone else (e.g. the REST client after a 401).
    fn handle_external_logout(&self) {
        {
            let session = self.inner.session.borrow();
            if session.token.is_none() && session.user.is_none() {
                return;
            }
        }
        log::info!("forced logout from event bus");
        self.clear(true);
        self.inner.cookies.clear_cookie();
        // The logout event is already on the bus; record the boundary silently.
        self.inner.last_settled.set(Some(false));
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut Session),
    {
        f(&mut self.inner.session.borrow_mut());
        self.notify();
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        let observers: Vec<Observer> = self.inner.observers.borrow().iter().cloned().collect();
        for observer in observers {
            observer(&snapshot);
        }
    }

    /// Drop token and user from memory (and the store when `persist`).
    fn clear(&self, persist: bool) {
        if persist {
            self.inner.store.write_token(None);
            self.inner.store.write_user(None);
        }
        self.mutate(|s| {
            s.token = None;
            s.user = None;
        });
        self.inner.bus.emit(&SessionEvent::TokenChanged { token: None });
    }

    /// Publish `login`/`logout` if the settled authentication state changed.
    ///
    /// No-op while a token is waiting on its identity fetch.
    fn settle(&self) {
        let (now, pending) = {
            let session = self.inner.session.borrow();
            (session.is_authenticated(), session.token.is_some() && session.user.is_none())
        };
        if pending {
            return;
        }
        let previous = self.inner.last_settled.replace(Some(now));
        if previous == Some(now) {
            return;
        }
        if now {
            if let Some(user) = self.user() {
                log::info!("session authenticated: user={}", user.id);
                self.inner.bus.emit(&SessionEvent::Login { user });
            }
        } else {
            self.inner.bus.emit(&SessionEvent::Logout);
        }
    }
}
