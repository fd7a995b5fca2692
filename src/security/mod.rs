//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (normalize path, ask wwwhisper, decide)
//!     → headers.rs (filtered headers and cookies for wwwhisper)
//!     → Protected application, or wwwhisper itself for /wwwhisper/…
//! ```
//!
//! # Design Decisions
//! - Fail closed: a failed authorization query never reaches the app
//! - No trust in client input: the `User` request header is always replaced

pub mod access_control;
pub mod headers;

pub use access_control::{authorize, protect, Gate, GateOptions, RemoteUser};
