use crate::config::types::{Config, CrawlerConfig, FetchConfig, OutputConfig};
use crate::state::Direction;
use crate::ConfigError;

/// Upper bound on the worker pool size
const MAX_WORKERS: u32 = 500;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.start_id < 0 || config.end_id < 0 {
        return Err(ConfigError::Validation(format!(
            "start-id and end-id must be non-negative, got {} and {}",
            config.start_id, config.end_id
        )));
    }

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if let Some(direction) = config.direction {
        validate_direction(direction, config.start_id, config.end_id)?;
    }

    Ok(())
}

/// Checks that an explicit direction agrees with the range
fn validate_direction(direction: Direction, start: i64, end: i64) -> Result<(), ConfigError> {
    if start == end {
        return Ok(());
    }

    let inferred = Direction::from_range(start, end);
    if inferred != direction {
        return Err(ConfigError::Validation(format!(
            "direction '{}' contradicts range {} -> {} ({})",
            direction, start, end, inferred
        )));
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    match (&config.url_template, &config.mirror) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::Validation(
                "set either url-template or mirror, not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(ConfigError::Validation(
                "one of url-template or mirror is required".to_string(),
            ))
        }
        _ => {}
    }

    config
        .template()
        .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_direction() {
        assert!(validate_direction(Direction::Descending, 100, 95).is_ok());
        assert!(validate_direction(Direction::Ascending, 10, 14).is_ok());
        assert!(validate_direction(Direction::Descending, 7, 7).is_ok());

        assert!(validate_direction(Direction::Ascending, 100, 95).is_err());
        assert!(validate_direction(Direction::Descending, 10, 14).is_err());
    }

    #[test]
    fn test_validate_fetch_requires_one_source() {
        let mut fetch = FetchConfig {
            url_template: None,
            mirror: None,
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 7,
        };
        assert!(validate_fetch_config(&fetch).is_err());

        fetch.mirror = Some("https://mirror.example/torrent/1".to_string());
        assert!(validate_fetch_config(&fetch).is_ok());

        fetch.url_template = Some("https://mirror.example/torrent/{id}".to_string());
        assert!(validate_fetch_config(&fetch).is_err());
    }

    #[test]
    fn test_validate_fetch_rejects_bad_template() {
        let fetch = FetchConfig {
            url_template: Some("https://mirror.example/torrent/".to_string()),
            mirror: None,
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 7,
        };
        assert!(matches!(
            validate_fetch_config(&fetch),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_fetch_rejects_zero_timeout() {
        let fetch = FetchConfig {
            url_template: Some("https://mirror.example/torrent/{id}".to_string()),
            mirror: None,
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 0,
        };
        assert!(validate_fetch_config(&fetch).is_err());
    }
}
