//! Address-bar access and OAuth token capture.
//!
//! SYSTEM CONTEXT
//! ==============
//! After the OAuth round-trip the backend redirects to a page carrying
//! `#token=<value>` (or the legacy `?token=<value>`). The token is captured
//! once and immediately stripped from the visible URL so it does not leak via
//! history or `Referer` headers.

#[cfg(test)]
#[path = "location_test.rs"]
mod location_test;

use std::cell::RefCell;

use url::{Url, form_urlencoded};

/// Browser location surface used by the session machine.
pub trait Location {
    /// Current absolute URL.
    fn href(&self) -> String;
    /// Replace the visible URL without navigating or adding history.
    fn replace(&self, url: &str);
    /// Full-page navigation to `url`.
    fn assign(&self, url: &str);
}

/// Where a captured token was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
    Fragment,
    /// Legacy `?token=` form.
    Query,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedToken {
    pub token: String,
    pub source: TokenSource,
    /// `href` with every occurrence of the token parameter removed.
    pub cleaned_url: String,
}

/// Find a token in `href`, checking the fragment before the query string.
///
/// Returns `None` when `href` does not parse or carries no non-empty token.
pub fn capture_token(href: &str, param: &str) -> Option<CapturedToken> {
    let mut url = match Url::parse(href) {
        Ok(url) => url,
        Err(e) => {
            log::debug!("location not parseable, skipping token capture: {e}");
            return None;
        }
    };

    let from_fragment = url.fragment().and_then(|f| strip_param(f, param));
    let from_query = url.query().and_then(|q| strip_param(q, param));

    // Strip both locations even when the fragment wins.
    if let Some((_, rest)) = &from_fragment {
        url.set_fragment(non_empty(rest));
    }
    if let Some((_, rest)) = &from_query {
        url.set_query(non_empty(rest));
    }

    let (token, source) = match (from_fragment, from_query) {
        (Some((token, _)), _) => (token, TokenSource::Fragment),
        (None, Some((token, _))) => (token, TokenSource::Query),
        (None, None) => return None,
    };
    Some(CapturedToken { token, source, cleaned_url: url.into() })
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

/// Split `param` out of an `&`-separated list, keeping other segments verbatim.
fn strip_param(raw: &str, param: &str) -> Option<(String, String)> {
    let mut token = None;
    let mut rest = Vec::new();
    for segment in raw.split('&') {
        let decoded = form_urlencoded::parse(segment.as_bytes()).next();
        match decoded {
            Some((key, value)) if key == param => {
                if token.is_none() && !value.is_empty() {
                    token = Some(value.into_owned());
                }
            }
            _ => rest.push(segment),
        }
    }
    token.map(|t| (t, rest.join("&")))
}

// =============================================================================
// MEMORY LOCATION
// =============================================================================

/// [`Location`] for tests and non-browser hosts. Records navigations.
#[derive(Debug, Default)]
pub struct MemoryLocation {
    href: RefCell<String>,
    navigations: RefCell<Vec<String>>,
}

impl MemoryLocation {
    pub fn new(href: &str) -> Self {
        Self { href: RefCell::new(href.to_owned()), navigations: RefCell::new(Vec::new()) }
    }

    /// URLs passed to [`Location::assign`], oldest first.
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.borrow().clone()
    }
}

impl Location for MemoryLocation {
    fn href(&self) -> String {
        self.href.borrow().clone()
    }

    fn replace(&self, url: &str) {
        url.clone_into(&mut self.href.borrow_mut());
    }

    fn assign(&self, url: &str) {
        self.navigations.borrow_mut().push(url.to_owned());
        url.clone_into(&mut self.href.borrow_mut());
    }
}
