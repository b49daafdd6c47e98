//! Client-side session manager for the forum web client.
//!
//! This crate owns the browser user's authentication session: it reconciles
//! the initial token from the URL, the server-rendered seed and local storage,
//! resolves the token to a user through the identity endpoint, keeps tabs of
//! the same origin in sync, mirrors the token into a server-visible cookie and
//! announces `login`/`logout`/`token-changed` on a page-wide event bus.
//!
//! Everything runs on the single browser thread. Browser bindings live behind
//! the `hydrate` feature; the rest builds and tests natively against in-memory
//! stand-ins.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`machine`] | Session state machine, the single owner of the record |
//! | [`facade`] | Read/write projection for UI consumers |
//! | [`store`] | Persistent key/value store and cross-tab change model |
//! | [`events`] | String-keyed event bus and typed session events |
//! | [`identity`] | Deduplicated token-to-user fetch |
//! | [`cookie`] | Best-effort cookie mirror |
//! | [`location`] | Address-bar seam and OAuth token capture |
//! | [`net`] | Backend endpoint seam and HTTP implementation |
//! | [`config`] | Endpoint and storage-key configuration |
//! | [`types`] | User and session records |
//! | [`error`] | Crate error type |
//! | `browser` | Browser implementations and startup (`hydrate`) |
//! | `context` | Leptos context wiring (`hydrate`) |

pub mod config;
pub mod cookie;
pub mod error;
pub mod events;
pub mod facade;
pub mod identity;
pub mod location;
pub mod machine;
pub mod net;
pub mod store;
pub mod types;

#[cfg(feature = "hydrate")]
pub mod browser;
#[cfg(feature = "hydrate")]
pub mod context;

pub use error::SessionError;
pub use facade::SessionFacade;
pub use machine::{SessionDeps, SessionMachine};
pub use types::{InitialSession, Session, SessionPhase, User, UserPatch};
