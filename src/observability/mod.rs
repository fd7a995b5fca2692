//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate, backend client, server:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (decision and backend counters, latency histogram)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
