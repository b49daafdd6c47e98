//! Persistent key/value storage for the token and user snapshot.
//!
//! SYSTEM CONTEXT
//! ==============
//! The browser's `localStorage` is shared by every tab of the same origin and
//! fires a `storage` event in the *other* tabs when a key changes. This module
//! owns the two key names and the JSON encoding of the user snapshot; the
//! machine folds the resulting [`StorageChange`]s back into its record.
//!
//! ERROR HANDLING
//! ==============
//! Storage failures (quota, privacy mode) are logged and dropped. The in-memory
//! session stays authoritative for the rest of the page lifetime.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::mpsc;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::types::User;

/// Synchronous string store scoped to the browser profile/origin.
pub trait KeyValueStore {
    /// Read the raw value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] when the backing store is unavailable.
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Write `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] when the write is rejected.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Remove `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] when the store is unavailable.
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// Cross-tab notification for a changed key.
///
/// `key == None` means the whole store was cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageChange {
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// One of the two keys this subsystem owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKey {
    Token,
    User,
}

// =============================================================================
// PERSISTENT STORE
// =============================================================================

/// Typed wrapper over a [`KeyValueStore`] for the token and user keys.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Rc<dyn KeyValueStore>,
    token_key: String,
    user_key: String,
}

impl PersistentStore {
    pub fn new(backend: Rc<dyn KeyValueStore>, config: &SessionConfig) -> Self {
        Self { backend, token_key: config.token_key.clone(), user_key: config.user_key.clone() }
    }

    fn key_name(&self, key: StoreKey) -> &str {
        match key {
            StoreKey::Token => &self.token_key,
            StoreKey::User => &self.user_key,
        }
    }

    /// Map a raw key name back to the key it represents, if it is ours.
    pub fn classify(&self, raw: &str) -> Option<StoreKey> {
        if raw == self.token_key {
            Some(StoreKey::Token)
        } else if raw == self.user_key {
            Some(StoreKey::User)
        } else {
            None
        }
    }

    /// Raw read; failures are logged and read as absent.
    pub fn read(&self, key: StoreKey) -> Option<String> {
        match self.backend.get(self.key_name(key)) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("session store read failed: key={} error={e}", self.key_name(key));
                None
            }
        }
    }

    /// Raw write; `None` removes the key. Returns `false` when the store rejected it.
    pub fn write(&self, key: StoreKey, value: Option<&str>) -> bool {
        let name = self.key_name(key);
        let result = match value {
            Some(v) => self.backend.set(name, v),
            None => self.backend.remove(name),
        };
        if let Err(e) = result {
            log::warn!("session store write failed: key={name} error={e}");
            return false;
        }
        true
    }

    pub fn read_token(&self) -> Option<String> {
        self.read(StoreKey::Token).filter(|t| !t.is_empty())
    }

    pub fn write_token(&self, token: Option<&str>) -> bool {
        self.write(StoreKey::Token, token)
    }

    /// Read the user snapshot. A corrupt snapshot is removed and read as absent.
    pub fn read_user(&self) -> Option<User> {
        let raw = self.read(StoreKey::User)?;
        match decode_user(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("discarding corrupt user snapshot: {e}");
                self.write(StoreKey::User, None);
                None
            }
        }
    }

    pub fn write_user(&self, user: Option<&User>) -> bool {
        match user.map(serde_json::to_string).transpose() {
            Ok(raw) => self.write(StoreKey::User, raw.as_deref()),
            Err(e) => {
                log::warn!("{}", SessionError::from(e));
                false
            }
        }
    }
}

/// Decode a user snapshot as written by [`PersistentStore::write_user`].
///
/// # Errors
///
/// Returns [`SessionError::Serialize`] when `raw` is not a valid snapshot.
pub fn decode_user(raw: &str) -> Result<User, SessionError> {
    Ok(serde_json::from_str(raw)?)
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory [`KeyValueStore`] shared between simulated tabs.
///
/// Every handle returned by [`MemoryStore::open_tab`] sees the same items.
/// A write that changes a value is delivered as a [`StorageChange`] to every
/// *other* tab's receiver, matching the browser `storage` event.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Rc<RefCell<SharedItems>>,
    tab: usize,
}

#[derive(Default)]
struct SharedItems {
    items: HashMap<String, String>,
    tabs: Vec<(usize, mpsc::UnboundedSender<StorageChange>)>,
    next_tab: usize,
    unavailable: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let shared = SharedItems { next_tab: 1, ..SharedItems::default() };
        Self { shared: Rc::new(RefCell::new(shared)), tab: 0 }
    }

    /// Open another tab on the same origin, returning its handle and the
    /// stream of changes made by other tabs.
    #[must_use]
    pub fn open_tab(&self) -> (Self, mpsc::UnboundedReceiver<StorageChange>) {
        let (tx, rx) = mpsc::unbounded();
        let mut shared = self.shared.borrow_mut();
        let tab = shared.next_tab;
        shared.next_tab += 1;
        shared.tabs.push((tab, tx));
        (Self { shared: Rc::clone(&self.shared), tab }, rx)
    }

    /// Simulate quota exhaustion or privacy mode.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.borrow_mut().unavailable = unavailable;
    }

    fn check_available(&self) -> Result<(), SessionError> {
        if self.shared.borrow().unavailable {
            return Err(SessionError::Storage("memory store marked unavailable".to_owned()));
        }
        Ok(())
    }

    fn apply(&self, key: &str, new_value: Option<String>) {
        let mut shared = self.shared.borrow_mut();
        let old_value = match &new_value {
            Some(v) => shared.items.insert(key.to_owned(), v.clone()),
            None => shared.items.remove(key),
        };
        if old_value == new_value {
            return;
        }
        let change = StorageChange { key: Some(key.to_owned()), old_value, new_value };
        let writer = self.tab;
        shared.tabs.retain(|(tab, tx)| {
            if *tab == writer {
                return !tx.is_closed();
            }
            tx.unbounded_send(change.clone()).is_ok()
        });
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        self.check_available()?;
        Ok(self.shared.borrow().items.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.check_available()?;
        self.apply(key, Some(value.to_owned()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.check_available()?;
        self.apply(key, None);
        Ok(())
    }
}
