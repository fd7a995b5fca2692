//! Header manipulation for backend sub-requests.
//!
//! # Responsibilities
//! - Select the request headers wwwhisper may see (allow-list, per profile)
//! - Keep only wwwhisper's own cookies
//! - Add the `Site-Url` and `User-Agent` headers wwwhisper expects
//! - Strip hop-by-hop headers from relayed responses
//!
//! # Design Decisions
//! - Allow-list, never block-list: unrelated application headers and
//!   cookies must not reach the authorization service
//! - An empty cookie selection sends no `Cookie` header at all

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use cookie::Cookie;

/// Prefix shared by all cookies issued by wwwhisper.
pub const AUTH_COOKIE_PREFIX: &str = "wwwhisper-";

/// Origin of the protected site, as reported to wwwhisper.
pub const SITE_URL: &str = "site-url";

/// CSRF token header used by wwwhisper's login and admin pages.
pub const X_CSRF_TOKEN: &str = "x-csrftoken";

/// Marker header set by XHR requests from wwwhisper's pages.
pub const X_REQUESTED_WITH: &str = "x-requested-with";

/// Client identifier sent with every backend request.
pub const USER_AGENT: &str = concat!("wwwhisper-gate/", env!("CARGO_PKG_VERSION"));

static HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::TE,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Which backend call the headers are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// The `is-authorized` query issued for ordinary requests.
    AuthQuery,
    /// A request to wwwhisper's own login, admin or asset endpoints.
    Proxy,
}

static AUTH_QUERY_HEADERS: [HeaderName; 2] = [header::ACCEPT, header::ACCEPT_LANGUAGE];

static PROXY_HEADERS: [HeaderName; 7] = [
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
    header::ORIGIN,
    HeaderName::from_static(X_CSRF_TOKEN),
    HeaderName::from_static(X_REQUESTED_WITH),
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
];

impl Profile {
    fn allowed(self) -> &'static [HeaderName] {
        match self {
            Profile::AuthQuery => &AUTH_QUERY_HEADERS,
            Profile::Proxy => &PROXY_HEADERS,
        }
    }
}

/// Build the header set forwarded to wwwhisper for `profile`.
pub fn backend_headers(incoming: &HeaderMap, profile: Profile, site_url: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in profile.allowed() {
        for value in incoming.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    if let Some(cookies) = auth_cookies(incoming) {
        headers.insert(header::COOKIE, cookies);
    }

    if let Some(site_url) = site_url.and_then(|s| HeaderValue::from_str(s).ok()) {
        headers.insert(SITE_URL, site_url);
    }
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));

    headers
}

/// Collect the wwwhisper cookies from all `Cookie` headers.
///
/// Pairs that do not parse are dropped. Returns `None` when the visitor
/// sent no wwwhisper cookie.
pub fn auth_cookies(incoming: &HeaderMap) -> Option<HeaderValue> {
    let mut selected = String::new();

    for value in incoming.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for parsed in Cookie::split_parse(raw) {
            let Ok(cookie) = parsed else { continue };
            if !cookie.name().starts_with(AUTH_COOKIE_PREFIX) {
                continue;
            }
            if !selected.is_empty() {
                selected.push_str("; ");
            }
            selected.push_str(cookie.name());
            selected.push('=');
            selected.push_str(cookie.value());
        }
    }

    if selected.is_empty() {
        return None;
    }
    HeaderValue::from_str(&selected).ok()
}

/// Remove hop-by-hop headers before relaying a response to the client.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}
