//! Browser bindings and startup for the session subsystem.
//!
//! SYSTEM CONTEXT
//! ==============
//! Compiled only with the `hydrate` feature. Supplies `localStorage`, the
//! address bar and the `wasm_bindgen_futures` executor to the machine, and
//! forwards the window `storage` event so other tabs' writes reach it.

use std::rc::Rc;

use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::EventBus;
use crate::facade::SessionFacade;
use crate::location::Location;
use crate::machine::{SessionDeps, SessionMachine};
use crate::net::api::HttpAuthApi;
use crate::store::{KeyValueStore, StorageChange};
use crate::types::InitialSession;

fn js_error(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{e:?}"))
}

// =============================================================================
// STORAGE
// =============================================================================

/// [`KeyValueStore`] over `window.localStorage`.
///
/// The handle is looked up on every call; privacy modes can revoke it.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserStore;

impl BrowserStore {
    fn storage() -> Result<web_sys::Storage, SessionError> {
        let window = web_sys::window().ok_or_else(|| SessionError::Storage("no window".to_owned()))?;
        window
            .local_storage()
            .map_err(|e| SessionError::Storage(js_error(&e)))?
            .ok_or_else(|| SessionError::Storage("localStorage disabled".to_owned()))
    }
}

impl KeyValueStore for BrowserStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Self::storage()?.get_item(key).map_err(|e| SessionError::Storage(js_error(&e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        Self::storage()?.set_item(key, value).map_err(|e| SessionError::Storage(js_error(&e)))
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        Self::storage()?.remove_item(key).map_err(|e| SessionError::Storage(js_error(&e)))
    }
}

// =============================================================================
// LOCATION
// =============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserLocation;

impl Location for BrowserLocation {
    fn href(&self) -> String {
        let Some(window) = web_sys::window() else {
            return String::new();
        };
        match window.location().href() {
            Ok(href) => href,
            Err(e) => {
                log::warn!("location.href unavailable: {}", js_error(&e));
                String::new()
            }
        }
    }

    fn replace(&self, url: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let result = window
            .history()
            .and_then(|history| history.replace_state_with_url(&JsValue::NULL, "", Some(url)));
        if let Err(e) = result {
            log::warn!("history.replaceState failed: {}", js_error(&e));
        }
    }

    fn assign(&self, url: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if let Err(e) = window.location().assign(url) {
            log::error!("navigation to {url} failed: {}", js_error(&e));
        }
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// [`LocalSpawn`] onto the browser microtask queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

// =============================================================================
// STARTUP
// =============================================================================

/// Route `log` to the browser console and install the panic hook.
pub fn init_logging(level: log::Level) {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(level) {
        web_sys::console::warn_1(&format!("logger already installed: {e}").into());
    }
}

/// Build the session subsystem for this page and start bootstrapping it.
///
/// Call once at hydration with the server-rendered seed. The returned facade
/// is immediately usable; it reports `is_loading` until bootstrap settles.
pub fn start(config: SessionConfig, initial: InitialSession) -> SessionFacade {
    let api = Rc::new(HttpAuthApi::new(config.clone()));
    let machine = SessionMachine::new(
        config,
        SessionDeps {
            store: Rc::new(BrowserStore),
            api,
            location: Rc::new(BrowserLocation),
            spawner: Rc::new(BrowserSpawner),
            bus: EventBus::new(),
        },
    );

    listen_for_storage(machine.clone());

    let boot = machine.clone();
    wasm_bindgen_futures::spawn_local(async move { boot.bootstrap(initial).await });

    SessionFacade::new(machine)
}

/// Forward `storage` events from other tabs for the lifetime of the page.
fn listen_for_storage(machine: SessionMachine) {
    let Some(window) = web_sys::window() else {
        log::warn!("no window; cross-tab sync disabled");
        return;
    };

    let callback = Closure::<dyn FnMut(web_sys::StorageEvent)>::new(move |event: web_sys::StorageEvent| {
        machine.handle_storage_change(&StorageChange {
            key: event.key(),
            old_value: event.old_value(),
            new_value: event.new_value(),
        });
    });
    if let Err(e) = window.add_event_listener_with_callback("storage", callback.as_ref().unchecked_ref()) {
        log::warn!("storage listener not installed: {}", js_error(&e));
    }
    callback.forget();
}
