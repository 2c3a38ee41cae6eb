//! Configuration module for Listing-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use listing_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Proxy: {}", config.proxy.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DispatcherConfig, OutputConfig, ProxyConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{
    apply_overrides, compute_config_hash, load_config, load_config_with_hash, ENV_PROXY_TOKEN,
    ENV_PROXY_URL,
};
pub use validation::validate;
