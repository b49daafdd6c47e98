//! Session subsystem configuration.
//!
//! Defaults match the forum backend routes. `from_env` overlays environment
//! variables for native builds and tests; in the browser no variables exist
//! and the defaults apply.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

pub const DEFAULT_API_BASE: &str = "/api";
pub const DEFAULT_SESSION_ENDPOINT: &str = "/session";
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";
pub const DEFAULT_USER_KEY: &str = "auth_user";
pub const DEFAULT_TOKEN_PARAM: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Prefix for the `/auth/*` endpoints, without a trailing slash.
    pub api_base: String,
    /// Same-origin endpoint that sets/clears the mirrored cookie.
    pub session_endpoint: String,
    /// Persistent-store key holding the bearer token.
    pub token_key: String,
    /// Persistent-store key holding the JSON user snapshot.
    pub user_key: String,
    /// URL fragment/query parameter carrying a token after an OAuth redirect.
    pub token_param: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            session_endpoint: DEFAULT_SESSION_ENDPOINT.to_owned(),
            token_key: DEFAULT_TOKEN_KEY.to_owned(),
            user_key: DEFAULT_USER_KEY.to_owned(),
            token_param: DEFAULT_TOKEN_PARAM.to_owned(),
        }
    }
}

impl SessionConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Optional:
    /// - `FORUM_API_BASE`: default `/api`
    /// - `FORUM_SESSION_ENDPOINT`: default `/session`
    /// - `FORUM_TOKEN_KEY`: default `auth_token`
    /// - `FORUM_USER_KEY`: default `auth_user`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_owned())
        };

        Self {
            api_base: var("FORUM_API_BASE", DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_owned(),
            session_endpoint: var("FORUM_SESSION_ENDPOINT", DEFAULT_SESSION_ENDPOINT)
                .trim_end_matches('/')
                .to_owned(),
            token_key: var("FORUM_TOKEN_KEY", DEFAULT_TOKEN_KEY),
            user_key: var("FORUM_USER_KEY", DEFAULT_USER_KEY),
            token_param: DEFAULT_TOKEN_PARAM.to_owned(),
        }
    }

    /// `GET` endpoint exchanging a bearer token for the user record.
    #[must_use]
    pub fn me_url(&self) -> String {
        format!("{}/auth/me", self.api_base)
    }

    /// `POST` endpoint negotiating the OAuth login redirect.
    #[must_use]
    pub fn login_redirect_url(&self) -> String {
        format!("{}/auth/redirect", self.api_base)
    }

    /// `POST` endpoint revoking the bearer token server-side.
    #[must_use]
    pub fn logout_url(&self) -> String {
        format!("{}/auth/logout", self.api_base)
    }
}
