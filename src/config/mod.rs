//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, WWWHISPER_* env overrides)
//!     → validation.rs (semantic checks)
//!     → activation.rs (enabled with endpoint / disabled / fatal error)
//!     → GateConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod activation;
pub mod loader;
pub mod schema;
pub mod validation;

pub use activation::Activation;
pub use loader::{load_config, load_config_with, ConfigError};
pub use schema::{AppConfig, GateConfig, ListenerConfig, WwwhisperConfig};
