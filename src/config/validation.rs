use crate::config::types::{
    Config, CrawlerConfig, DispatcherConfig, OutputConfig, ProxyConfig, SiteConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_proxy_config(&config.proxy)?;
    validate_dispatcher_config(&config.dispatcher)?;
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the proxy connection settings
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    validate_http_url("proxy.base-url", &config.base_url)?;

    if config.timeout_secs < 1 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    if let Some(token) = &config.token {
        if token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "token cannot be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates dispatcher limits
fn validate_dispatcher_config(config: &DispatcherConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.transport_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "transport_retries must be >= 1, got {}",
            config.transport_retries
        )));
    }

    if config.backoff_base_ms < 1 {
        return Err(ConfigError::Validation(
            "backoff_base_ms must be >= 1".to_string(),
        ));
    }

    if config.backoff_max_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_max_ms ({}) must be >= backoff_base_ms ({})",
            config.backoff_max_ms, config.backoff_base_ms
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.chunk_size < 1 {
        return Err(ConfigError::Validation(format!(
            "chunk_size must be >= 1, got {}",
            config.chunk_size
        )));
    }

    if config.target_limit == Some(0) {
        return Err(ConfigError::Validation(
            "target_limit must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the classifieds site layout
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("site.base-url", &config.base_url)?;

    if !config.search_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "search_path must start with '/', got '{}'",
            config.search_path
        )));
    }

    for placeholder in ["{area}", "{query}"] {
        if !config.search_path.contains(placeholder) {
            return Err(ConfigError::Validation(format!(
                "search_path must contain the {} placeholder",
                placeholder
            )));
        }
    }

    if config.page_param.is_empty()
        || !config
            .page_param
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "page_param must be a non-empty query parameter name, got '{}'",
            config.page_param
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a URL parses and uses an HTTP(S) scheme
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}
