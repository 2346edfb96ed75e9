use crate::config::types::{Config, CrawlerConfig, HttpConfig, PersistenceConfig, StorageConfig};
use crate::ConfigError;

/// Upper bound on the gate width; beyond this the connection pool and the
/// OS file-descriptor limit become the bottleneck
const MAX_CONCURRENCY: usize = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_persistence_config(&config.persistence)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_concurrency(config.concurrency)?;

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be greater than 0".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be greater than 0".to_string(),
        ));
    }

    if config.connect_timeout_secs > config.request_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-secs ({}) cannot exceed request-timeout-secs ({})",
            config.connect_timeout_secs, config.request_timeout_secs
        )));
    }

    if config.progress_every == 0 {
        return Err(ConfigError::Validation(
            "progress-every must be greater than 0".to_string(),
        ));
    }

    if let Some(region) = &config.region {
        normalize_region(region)?;
    }

    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.accept_language.trim().is_empty() {
        return Err(ConfigError::Validation(
            "accept-language cannot be empty".to_string(),
        ));
    }

    // Header values must be visible ASCII
    for (key, value) in [
        ("user-agent", &config.user_agent),
        ("accept-language", &config.accept_language),
    ] {
        if !value.chars().all(|c| c == ' ' || c.is_ascii_graphic()) {
            return Err(ConfigError::Validation(format!(
                "{} contains characters not allowed in an HTTP header",
                key
            )));
        }
    }

    Ok(())
}

/// Validates batch persister configuration
fn validate_persistence_config(config: &PersistenceConfig) -> Result<(), ConfigError> {
    if config.flush_threshold == 0 {
        return Err(ConfigError::Validation(
            "flush-threshold must be at least 1".to_string(),
        ));
    }

    if config.final_flush_attempts == 0 {
        return Err(ConfigError::Validation(
            "final-flush-attempts must be at least 1".to_string(),
        ));
    }

    if config.cleaned_max_chars == 0 {
        return Err(ConfigError::Validation(
            "cleaned-max-chars must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a gate width, either from the config file or the command line
pub fn validate_concurrency(concurrency: usize) -> Result<(), ConfigError> {
    if concurrency < 1 || concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, concurrency
        )));
    }
    Ok(())
}

/// Resolves the gate width for a run: the command-line override if given,
/// otherwise `crawler.concurrency`
pub fn effective_concurrency(
    config: &Config,
    override_width: Option<usize>,
) -> Result<usize, ConfigError> {
    let concurrency = override_width.unwrap_or(config.crawler.concurrency);
    validate_concurrency(concurrency)?;
    Ok(concurrency)
}

/// Validates a region (country) code and returns it upper-cased
///
/// Region codes are two or three ASCII letters, e.g. `IT` or `ITA`.
pub fn normalize_region(raw: &str) -> Result<String, ConfigError> {
    let code = raw.trim();

    if !(2..=3).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(format!(
            "region must be a 2-3 letter country code, got '{}'",
            raw
        )));
    }

    Ok(code.to_ascii_uppercase())
}
