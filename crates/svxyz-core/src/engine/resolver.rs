use super::config::{ConfigError, FilterConfig};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "txyz.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Loaded,
    /// The file did not exist and was populated with defaults.
    CreatedDefault,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub config: FilterConfig,
    pub source: ConfigSource,
}

/// Loads the configuration at `path`, writing the defaults there first if it is absent.
///
/// The result is not validated: command-line overrides may still repair it, so
/// callers run [`FilterConfig::validate`] once everything is merged.
pub fn resolve(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    if path.exists() {
        let config = load(path)?;
        return Ok(ResolvedConfig {
            config,
            source: ConfigSource::Loaded,
        });
    }

    let config = FilterConfig::default();
    write_config(path, &config)?;
    info!(
        "Configuration file {:?} not found; wrote defaults (all filters disabled).",
        path
    );
    Ok(ResolvedConfig {
        config,
        source: ConfigSource::CreatedDefault,
    })
}

pub fn load(path: &Path) -> Result<FilterConfig, ConfigError> {
    debug!("Loading filter configuration from {:?}", path);
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `config` as pretty-printed JSON.
pub fn write_config(path: &Path, config: &FilterConfig) -> Result<(), ConfigError> {
    let mut text = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    text.push('\n');
    fs::write(path, text).map_err(|source| ConfigError::WriteDefault {
        path: path.to_path_buf(),
        source,
    })
}
