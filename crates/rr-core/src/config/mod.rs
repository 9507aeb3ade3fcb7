//! Configuration management for remote-repl

mod console;
mod endpoint;
pub mod serde_utils;

pub use console::ConsoleConfig;
pub use endpoint::EndpointConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("remote-repl")
}

/// Get the default console configuration file path
pub fn default_console_config_path() -> PathBuf {
    default_config_dir().join("console.toml")
}

/// Get the default endpoint configuration file path
pub fn default_endpoint_config_path() -> PathBuf {
    default_config_dir().join("endpoint.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration if the file exists, falling back to defaults
pub fn load_or_default<T>(path: &Path) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match load_config(path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => T::default(),
        Err(e) => {
            tracing::warn!("Failed to load config from {:?}: {}", path, e);
            T::default()
        }
    }
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}
