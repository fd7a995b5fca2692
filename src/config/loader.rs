//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::backend::EndpointError;
use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the wwwhisper URL.
pub const WWWHISPER_URL: &str = "WWWHISPER_URL";

/// Environment variable turning the gate off when set to `1`.
pub const WWWHISPER_DISABLE: &str = "WWWHISPER_DISABLE";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    MissingEndpoint,
    InvalidEndpoint(EndpointError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::MissingEndpoint => write!(
                f,
                "neither {} nor {} is set",
                WWWHISPER_URL, WWWHISPER_DISABLE
            ),
            ConfigError::InvalidEndpoint(e) => write!(f, "Invalid wwwhisper URL: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::InvalidEndpoint(e) => Some(e),
            ConfigError::Validation(_) | ConfigError::MissingEndpoint => None,
        }
    }
}

/// Load configuration from an optional TOML file, apply environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    load_config_with(path, |_| {})
}

/// Like [`load_config`], with `adjust` applied after the environment
/// overrides and before validation. Command-line overrides go here.
pub fn load_config_with<F>(path: Option<&Path>, adjust: F) -> Result<GateConfig, ConfigError>
where
    F: FnOnce(&mut GateConfig),
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            parse_config(&content)?
        }
        None => GateConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    adjust(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse TOML configuration without validating it.
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Apply `WWWHISPER_URL` and `WWWHISPER_DISABLE` on top of `config`.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(WWWHISPER_URL).filter(|url| !url.trim().is_empty()) {
        config.wwwhisper.url = Some(url);
    }

    if let Some(disable) = lookup(WWWHISPER_DISABLE) {
        config.wwwhisper.disable = matches!(disable.trim(), "1" | "true");
    }
}
