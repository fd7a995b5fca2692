//! Gate activation.
//!
//! Decides once at startup whether requests go through wwwhisper.

use crate::backend::Endpoint;
use crate::config::loader::ConfigError;
use crate::config::schema::WwwhisperConfig;

/// Whether the gate protects the application.
#[derive(Debug, Clone)]
pub enum Activation {
    /// Every request is checked against this endpoint.
    Enabled(Endpoint),
    /// Requests pass straight through to the application.
    Disabled,
}

impl Activation {
    /// Resolve activation from configuration.
    ///
    /// An explicit disable wins over a configured URL. Having neither is a
    /// configuration error: silently serving an unprotected site is never
    /// the default.
    pub fn resolve(config: &WwwhisperConfig) -> Result<Self, ConfigError> {
        if config.disable {
            return Ok(Activation::Disabled);
        }

        match config.url.as_deref() {
            Some(url) => Endpoint::parse(url)
                .map(Activation::Enabled)
                .map_err(ConfigError::InvalidEndpoint),
            None => Err(ConfigError::MissingEndpoint),
        }
    }
}
