//! wwwhisper-gate
//!
//! An authorization gate for web applications protected by wwwhisper.
//! Every request is checked with the wwwhisper service before it reaches
//! the application; wwwhisper's own login and admin pages are proxied.
//!
//! ```text
//!     Client ──▶ http::server ──▶ security::access_control ──▶ http::upstream ──▶ App
//!                                        │    ▲
//!                              is-authorized / proxy
//!                                        ▼    │
//!                                     backend::client ──▶ wwwhisper
//! ```
//!
//! The gate is also usable as a library: [`security::protect`] puts any
//! axum [`Router`](axum::Router) behind a [`Gate`].

// Core subsystems
pub mod backend;
pub mod config;
pub mod http;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GateConfig;
pub use http::GateServer;
pub use lifecycle::Shutdown;
pub use security::{protect, Gate, GateOptions, RemoteUser};
