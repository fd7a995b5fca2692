//! Response handling and transformation.
//!
//! # Responsibilities
//! - Decide whether a protected response gets the wwwhisper iframe script
//! - Insert the script before the last closing body tag
//!
//! # Design Decisions
//! - The decision is taken from the headers the application hands back,
//!   before any body byte is read, and never revisited
//! - Responses that are not rewritten are returned untouched and stream
//! - Compressed bodies are never rewritten
//! - A document without `</body>` passes through unchanged

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};

use crate::observability::metrics;

/// Script reference inserted into protected HTML pages.
pub const IFRAME_SCRIPT: &str =
    r#"<script type="text/javascript" src="/wwwhisper/auth/iframe.js"></script>"#;

const CLOSING_BODY_TAG: &[u8] = b"</body>";

/// Whether a response with these attributes should carry the iframe script.
pub fn should_inject(method: &Method, status: StatusCode, headers: &HeaderMap) -> bool {
    if *method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return false;
    }
    is_html(headers) && is_identity_encoded(headers)
}

/// Buffer the body of `response` and insert the iframe script.
///
/// `Content-Length` is dropped when the body changes; the server derives
/// the new length from the rewritten body.
pub async fn inject_iframe(response: Response) -> Response {
    let (mut parts, body) = response.into_parts();

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read response body for script injection");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read response body",
            )
                .into_response();
        }
    };

    match inject_script(&bytes) {
        Some(rewritten) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            metrics::record_injection();
            Response::from_parts(parts, Body::from(rewritten))
        }
        None => {
            tracing::debug!("No closing body tag, leaving HTML response unchanged");
            Response::from_parts(parts, Body::from(bytes))
        }
    }
}

/// Insert [`IFRAME_SCRIPT`] right before the last `</body>` in `body`.
///
/// Returns `None` when the document has no closing body tag.
pub fn inject_script(body: &[u8]) -> Option<Vec<u8>> {
    let at = rfind_closing_body(body)?;

    let mut rewritten = Vec::with_capacity(body.len() + IFRAME_SCRIPT.len());
    rewritten.extend_from_slice(&body[..at]);
    rewritten.extend_from_slice(IFRAME_SCRIPT.as_bytes());
    rewritten.extend_from_slice(&body[at..]);
    Some(rewritten)
}

fn rfind_closing_body(body: &[u8]) -> Option<usize> {
    let last_start = body.len().checked_sub(CLOSING_BODY_TAG.len())?;
    (0..=last_start)
        .rev()
        .find(|&i| body[i..i + CLOSING_BODY_TAG.len()].eq_ignore_ascii_case(CLOSING_BODY_TAG))
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|media_type| media_type.trim().eq_ignore_ascii_case("text/html"))
        .unwrap_or(false)
}

fn is_identity_encoded(headers: &HeaderMap) -> bool {
    headers.get_all(header::CONTENT_ENCODING).iter().all(|v| {
        v.to_str()
            .map(|v| v.trim().eq_ignore_ascii_case("identity"))
            .unwrap_or(false)
    })
}
