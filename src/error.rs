//! Error type for the session subsystem.
//!
//! Only `login()` and `logout()` surface these to callers. Identity fetch,
//! cookie mirroring and storage failures are logged and absorbed where they
//! happen.

/// Failure raised by a backend call or by the persistent store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
    /// The endpoint answered with a non-2xx status.
    #[error("{endpoint} failed: {status}")]
    Status { endpoint: String, status: u16 },
    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
    /// The key/value store rejected a read or write (quota, privacy mode).
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("failed to encode user snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The operation needs a browser environment.
    #[error("{0} not available outside the browser")]
    Unavailable(&'static str),
}
