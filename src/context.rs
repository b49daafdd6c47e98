//! Leptos context wiring for the session facade.
//!
//! `provide_session` is called once in the app root after
//! [`crate::browser::start`]. Components then read the reactive record with
//! `use_session_state()` and trigger actions through `use_session()`.

use leptos::prelude::*;

use crate::facade::SessionFacade;
use crate::types::Session;

/// Provide `facade` and a signal tracking every session transition.
pub fn provide_session(facade: SessionFacade) -> RwSignal<Session> {
    let state = RwSignal::new(facade.session());
    facade.machine().on_change(move |session| state.set(session.clone()));
    provide_context(StoredValue::new_local(facade));
    provide_context(state);
    state
}

/// The facade provided by [`provide_session`].
pub fn use_session() -> SessionFacade {
    expect_context::<StoredValue<SessionFacade, LocalStorage>>().get_value()
}

/// Reactive session record provided by [`provide_session`].
pub fn use_session_state() -> RwSignal<Session> {
    expect_context::<RwSignal<Session>>()
}
