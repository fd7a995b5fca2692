//! wwwhisper backend subsystem.
//!
//! # Data Flow
//! ```text
//! WWWHISPER_URL (startup)
//!     → endpoint.rs (parse origin + credentials, immutable)
//!     → client.rs (pooled HTTP(S) client, shared by all requests)
//!
//! Per request:
//!     auth query  → GET /wwwhisper/auth/api/is-authorized/?path=...
//!     proxy call  → method/body of the visitor's request, streamed
//! ```
//!
//! # Design Decisions
//! - One client per process; each call checks out its own connection
//! - Every call is bounded by a timeout
//! - Transport failures are returned, never retried

pub mod client;
pub mod endpoint;

pub use client::{BackendClient, BackendError};
pub use endpoint::{Endpoint, EndpointError};

/// Namespace of everything served by wwwhisper itself.
pub const ADMIN_PREFIX: &str = "/wwwhisper/";

/// Login page, logout iframe and their assets; reachable without a session.
pub const AUTH_PREFIX: &str = "/wwwhisper/auth/";

/// Endpoint answering whether the visitor may access a path.
pub const IS_AUTHORIZED_PATH: &str = "/wwwhisper/auth/api/is-authorized/";

/// Script rendering the login/logout widget on protected pages.
pub const IFRAME_SCRIPT_PATH: &str = "/wwwhisper/auth/iframe.js";

/// Response header carrying the authenticated user.
pub const USER_HEADER: &str = "user";
