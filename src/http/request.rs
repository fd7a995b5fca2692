//! Request handling and transformation.
//!
//! # Responsibilities
//! - Normalize the request path before any access decision is made
//! - Separate the query string from the path
//! - Reconstruct the site origin the visitor sees (scheme + host)
//!
//! # Design Decisions
//! - Dot segments follow RFC 3986 `remove_dot_segments`, never escaping root
//! - Percent-encoded unreserved characters are decoded first, so `%2e%2e`
//!   counts as `..`
//! - The query string is kept for the application but never takes part in
//!   an access decision

use std::borrow::Cow;

use axum::http::{header, uri::PathAndQuery, HeaderMap, Request, Uri};

/// Request extension marking a connection that arrived over TLS.
///
/// A TLS-terminating server inserts it so the gate reports an `https` site
/// origin to wwwhisper. Deployments behind a load balancer rely on
/// `X-Forwarded-Proto` instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureTransport;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Resolve a raw request path into a canonical absolute path.
///
/// ```
/// use wwwhisper_gate::http::request::normalize_path;
///
/// assert_eq!(normalize_path("/foo/./bar/../../bar"), "/bar");
/// assert_eq!(normalize_path("/../"), "/");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(raw: &str) -> String {
    let mut segments: Vec<Cow<'_, str>> = Vec::new();
    let mut trailing_slash = false;

    for segment in raw.split('/') {
        let segment = decode_unreserved(segment);
        match segment.as_ref() {
            "" | "." => trailing_slash = true,
            ".." => {
                segments.pop();
                trailing_slash = true;
            }
            _ => {
                segments.push(segment);
                trailing_slash = false;
            }
        }
    }

    let mut normalized = String::with_capacity(raw.len() + 1);
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if trailing_slash || segments.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Rebuild `uri` with a normalized path, keeping scheme, authority and query.
pub fn normalized_uri(uri: &Uri) -> Result<Uri, axum::http::Error> {
    let path = normalize_path(uri.path());
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}

/// Origin of the protected site as seen by the visitor, e.g. `https://example.org`.
///
/// Returns `None` when the request carries no host at all.
pub fn site_url<B>(request: &Request<B>) -> Option<String> {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))?;

    Some(format!("{}://{}", scheme(request), host))
}

fn scheme<B>(request: &Request<B>) -> &str {
    if let Some(proto) = forwarded_proto(request.headers()) {
        return proto;
    }
    let secure = request.extensions().get::<SecureTransport>().is_some()
        || request.uri().scheme_str() == Some("https");
    if secure {
        "https"
    } else {
        "http"
    }
}

fn forwarded_proto(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Decode `%XX` triplets that encode RFC 3986 unreserved characters.
fn decode_unreserved(segment: &str) -> Cow<'_, str> {
    if !segment.contains('%') {
        return Cow::Borrowed(segment);
    }

    let bytes = segment.as_bytes();
    let mut decoded = String::with_capacity(segment.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            if let Ok(value) = u8::from_str_radix(&segment[i + 1..i + 3], 16) {
                if value.is_ascii_alphanumeric() || matches!(value, b'-' | b'.' | b'_' | b'~') {
                    decoded.push(value as char);
                    i += 3;
                    continue;
                }
            }
        }
        // Copy one (possibly multi-byte) character unchanged.
        let ch = segment[i..].chars().next().unwrap_or_default();
        decoded.push(ch);
        i += ch.len_utf8().max(1);
    }
    Cow::Owned(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_normalize_examples() {
        assert_eq!(normalize_path("/foo/./bar/../../bar"), "/bar");
        assert_eq!(normalize_path("/../"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//"), "/");
    }

    #[test]
    fn test_normalize_collapses_slashes() {
        assert_eq!(normalize_path("/foo//bar///baz"), "/foo/bar/baz");
        assert_eq!(normalize_path("///foo/"), "/foo/");
    }

    #[test]
    fn test_normalize_keeps_trailing_slash() {
        assert_eq!(normalize_path("/foo/"), "/foo/");
        assert_eq!(normalize_path("/foo/bar/.."), "/foo/");
        assert_eq!(normalize_path("/foo/bar/."), "/foo/bar/");
        assert_eq!(normalize_path("/foo/.."), "/");
    }

    #[test]
    fn test_normalize_never_escapes_root() {
        assert_eq!(normalize_path("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize_path("/a/../../b"), "/b");
        assert_eq!(normalize_path("foo/bar"), "/foo/bar");
    }

    #[test]
    fn test_normalize_encoded_dots() {
        assert_eq!(normalize_path("/secret/%2e%2e/public"), "/public");
        assert_eq!(normalize_path("/%2E/a"), "/a");
        assert_eq!(normalize_path("/%7Euser"), "/~user");
        // Reserved characters stay encoded.
        assert_eq!(normalize_path("/a%2Fb"), "/a%2Fb");
        assert_eq!(normalize_path("/a%20b"), "/a%20b");
        assert_eq!(normalize_path("/100%"), "/100%");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "/foo/./bar/../../bar",
            "/../",
            "",
            "//",
            "/a/b/../c/",
            "/x/%2e%2e/y",
            "/wwwhisper/admin/",
            "/a%252e%252e/b",
        ] {
            let once = normalize_path(raw);
            assert_eq!(normalize_path(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_normalized_uri_keeps_query() {
        let uri: Uri = "/foo/../bar?x=1".parse().unwrap();
        let normalized = normalized_uri(&uri).unwrap();
        assert_eq!(normalized.path(), "/bar");
        assert_eq!(normalized.query(), Some("x=1"));
    }

    #[test]
    fn test_site_url_from_forwarded_proto() {
        let req = Request::builder()
            .uri("/")
            .header("Host", "example.org")
            .header("X-Forwarded-Proto", "https, http")
            .body(Body::empty())
            .unwrap();
        assert_eq!(site_url(&req).as_deref(), Some("https://example.org"));
    }

    #[test]
    fn test_site_url_from_secure_transport() {
        let mut req = Request::builder()
            .uri("/")
            .header("Host", "example.org:8443")
            .body(Body::empty())
            .unwrap();
        assert_eq!(site_url(&req).as_deref(), Some("http://example.org:8443"));

        req.extensions_mut().insert(SecureTransport);
        assert_eq!(site_url(&req).as_deref(), Some("https://example.org:8443"));
    }

    #[test]
    fn test_site_url_without_host() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(site_url(&req), None);
    }
}
