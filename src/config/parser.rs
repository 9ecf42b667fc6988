use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub start_id: Option<i64>,
    pub end_id: Option<i64>,
    pub workers: Option<u32>,
    pub fail_limit: Option<u32>,
    pub mirror: Option<String>,
}

/// Loads and parses a configuration file from the given path
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
/// use range_sweep::config::load_config;
///
/// let config = load_config(Path::new("sweep.toml")).unwrap();
/// println!("Walking {} -> {}", config.crawler.start_id, config.crawler.end_id);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded with every run so the run ledger shows which settings produced it.
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

/// Applies command-line overrides and re-validates the result
///
/// A mirror override replaces any configured `url-template`.
pub fn apply_overrides(mut config: Config, overrides: &Overrides) -> Result<Config, ConfigError> {
    if let Some(start) = overrides.start_id {
        config.crawler.start_id = start;
    }
    if let Some(end) = overrides.end_id {
        config.crawler.end_id = end;
    }
    if let Some(workers) = overrides.workers {
        config.crawler.workers = workers;
    }
    if let Some(fail_limit) = overrides.fail_limit {
        config.crawler.fail_limit = fail_limit;
    }
    if let Some(mirror) = &overrides.mirror {
        config.fetch.url_template = None;
        config.fetch.mirror = Some(mirror.clone());
    }

    validate(&config)?;
    Ok(config)
}
