use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable overriding `proxy.base-url`
pub const ENV_PROXY_URL: &str = "HARVEST_PROXY_URL";

/// Environment variable overriding `proxy.token`
pub const ENV_PROXY_TOKEN: &str = "HARVEST_PROXY_TOKEN";

/// Loads and parses a configuration file from the given path
///
/// Proxy settings found in the environment (`HARVEST_PROXY_URL`,
/// `HARVEST_PROXY_TOKEN`) take precedence over the file.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use listing_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Max concurrent: {}", config.dispatcher.max_concurrent);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    apply_overrides(&mut config, |key| std::env::var(key).ok());

    validate(&config)?;

    Ok(config)
}

/// Applies environment-style overrides to a parsed configuration
///
/// `lookup` resolves a variable name to its value; empty values are ignored.
pub fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_PROXY_URL).filter(|v| !v.trim().is_empty()) {
        tracing::debug!("Proxy base URL taken from {}", ENV_PROXY_URL);
        config.proxy.base_url = url;
    }

    if let Some(token) = lookup(ENV_PROXY_TOKEN).filter(|v| !v.trim().is_empty()) {
        config.proxy.token = Some(token);
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored on every run so runs made with different settings can be told apart.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
