//! Backend calls made by the session subsystem.
//!
//! Client-side (hydrate): real HTTP calls via `gloo-net`.
//! Elsewhere: every call reports [`SessionError::Unavailable`], since these
//! endpoints are only meaningful in the browser.
//!
//! ERROR HANDLING
//! ==============
//! Implementations return typed [`SessionError`]s. Callers decide how much of
//! that to surface: the identity fetcher collapses every failure to "token
//! invalid", the cookie mirror only logs, and `login()`/`logout()` propagate.

#![allow(clippy::unused_async)]

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use async_trait::async_trait;
#[cfg(any(test, feature = "hydrate"))]
use serde::Deserialize;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::types::User;

/// Backend surface used by the session subsystem.
#[async_trait(?Send)]
pub trait AuthApi {
    /// `GET {api_base}/auth/me` with the bearer token.
    async fn fetch_me(&self, token: &str) -> Result<User, SessionError>;

    /// `POST {api_base}/auth/redirect`; returns the URL to navigate to.
    async fn request_login_redirect(&self, intended_url: &str) -> Result<String, SessionError>;

    /// `POST {api_base}/auth/logout` with the bearer token. Body is ignored.
    async fn logout(&self, token: &str) -> Result<(), SessionError>;

    /// `POST {session_endpoint}` with `{ token }`, setting the mirrored cookie.
    async fn set_session_cookie(&self, token: &str) -> Result<(), SessionError>;

    /// `DELETE {session_endpoint}`, clearing the mirrored cookie.
    async fn clear_session_cookie(&self) -> Result<(), SessionError>;
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRedirectRequest<'a> {
    pub intended_url: &'a str,
}

#[cfg(any(test, feature = "hydrate"))]
#[derive(Debug, Deserialize)]
pub(crate) struct LoginRedirectResponse {
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionCookieRequest<'a> {
    pub token: &'a str,
}

#[cfg(any(test, feature = "hydrate"))]
fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[cfg(any(test, feature = "hydrate"))]
fn status_error(endpoint: &str, status: u16) -> SessionError {
    SessionError::Status { endpoint: endpoint.to_owned(), status }
}

/// Parse a login-redirect response body, rejecting an empty target.
#[cfg(any(test, feature = "hydrate"))]
pub(crate) fn parse_redirect(body: &str) -> Result<String, SessionError> {
    let parsed: LoginRedirectResponse =
        serde_json::from_str(body).map_err(|e| SessionError::Decode(e.to_string()))?;
    if parsed.redirect_url.trim().is_empty() {
        return Err(SessionError::Decode("empty redirect_url".to_owned()));
    }
    Ok(parsed.redirect_url)
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// [`AuthApi`] over same-origin `fetch`, credentials included.
#[derive(Clone, Debug)]
pub struct HttpAuthApi {
    config: SessionConfig,
}

impl HttpAuthApi {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    #[cfg(not(feature = "hydrate"))]
    fn unavailable(&self) -> SessionError {
        log::debug!("http client disabled outside the browser (api_base={})", self.config.api_base);
        SessionError::Unavailable("http client")
    }
}

#[cfg(feature = "hydrate")]
fn network(e: gloo_net::Error) -> SessionError {
    SessionError::Network(e.to_string())
}

#[async_trait(?Send)]
impl AuthApi for HttpAuthApi {
    async fn fetch_me(&self, token: &str) -> Result<User, SessionError> {
        #[cfg(feature = "hydrate")]
        {
            let url = self.config.me_url();
            let resp = gloo_net::http::Request::get(&url)
                .header("Authorization", &bearer(token))
                .credentials(web_sys::RequestCredentials::Include)
                .send()
                .await
                .map_err(network)?;
            if !resp.ok() {
                return Err(status_error(&url, resp.status()));
            }
            resp.json::<User>()
                .await
                .map_err(|e| SessionError::Decode(e.to_string()))
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = token;
            Err(self.unavailable())
        }
    }

    async fn request_login_redirect(&self, intended_url: &str) -> Result<String, SessionError> {
        #[cfg(feature = "hydrate")]
        {
            let url = self.config.login_redirect_url();
            let resp = gloo_net::http::Request::post(&url)
                .credentials(web_sys::RequestCredentials::Include)
                .json(&LoginRedirectRequest { intended_url })
                .map_err(network)?
                .send()
                .await
                .map_err(network)?;
            if !resp.ok() {
                return Err(status_error(&url, resp.status()));
            }
            let body = resp.text().await.map_err(network)?;
            parse_redirect(&body)
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = LoginRedirectRequest { intended_url };
            Err(self.unavailable())
        }
    }

    async fn logout(&self, token: &str) -> Result<(), SessionError> {
        #[cfg(feature = "hydrate")]
        {
            let url = self.config.logout_url();
            let resp = gloo_net::http::Request::post(&url)
                .header("Authorization", &bearer(token))
                .credentials(web_sys::RequestCredentials::Include)
                .send()
                .await
                .map_err(network)?;
            if !resp.ok() {
                return Err(status_error(&url, resp.status()));
            }
            Ok(())
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = token;
            Err(self.unavailable())
        }
    }

    async fn set_session_cookie(&self, token: &str) -> Result<(), SessionError> {
        #[cfg(feature = "hydrate")]
        {
            let url = &self.config.session_endpoint;
            let resp = gloo_net::http::Request::post(url)
                .credentials(web_sys::RequestCredentials::Include)
                .json(&SessionCookieRequest { token })
                .map_err(network)?
                .send()
                .await
                .map_err(network)?;
            if !resp.ok() {
                return Err(status_error(url, resp.status()));
            }
            Ok(())
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = SessionCookieRequest { token };
            Err(self.unavailable())
        }
    }

    async fn clear_session_cookie(&self) -> Result<(), SessionError> {
        #[cfg(feature = "hydrate")]
        {
            let url = &self.config.session_endpoint;
            let resp = gloo_net::http::Request::delete(url)
                .credentials(web_sys::RequestCredentials::Include)
                .send()
                .await
                .map_err(network)?;
            if !resp.ok() {
                return Err(status_error(url, resp.status()));
            }
            Ok(())
        }
        #[cfg(not(feature = "hydrate"))]
        {
            Err(self.unavailable())
        }
    }
}
