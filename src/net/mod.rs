//! Networking for the session subsystem.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` defines the [`api::AuthApi`] seam over the identity, login-redirect,
//! logout and cookie-mirror endpoints, plus the gloo-net implementation used
//! in the browser.

pub mod api;

#[cfg(test)]
#[path = "fake_test.rs"]
pub(crate) mod fake;
