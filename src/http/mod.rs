//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing, request ID, timeout)
//!     → request.rs (normalize path, site origin)
//!     → [access control decides] (security::access_control)
//!     → upstream.rs (forward to the protected application)
//!     → response.rs (iframe injection into HTML)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

pub use server::GateServer;
