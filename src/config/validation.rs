use crate::config::types::{
    Config, CrawlerConfig, DelayRange, LightConfig, PipelineKind, RenderedConfig, RetryConfig,
};
use crate::ConfigError;
use url::Url;

const PIPELINES: [PipelineKind; 4] = [
    PipelineKind::Products,
    PipelineKind::Catalog,
    PipelineKind::Count,
    PipelineKind::Details,
];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_light_config(&config.light)?;
    validate_rendered_config(&config.rendered)?;
    validate_retry_config(&config.retry)?;
    validate_pipelines(config)?;
    Ok(())
}

fn validate_concurrency(name: &str, value: u32) -> Result<(), ConfigError> {
    if !(1..=100).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and 100, got {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_range(name: &str, range: DelayRange) -> Result<(), ConfigError> {
    if range.min_ms() > range.max_ms() {
        return Err(ConfigError::Validation(format!(
            "{} must be [min, max] with min <= max, got [{}, {}]",
            name,
            range.min_ms(),
            range.max_ms()
        )));
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_concurrency(
        "global_max_concurrent_fetches",
        config.global_max_concurrent_fetches,
    )?;
    validate_range("page_delay_ms", config.page_delay_ms)?;

    for pattern in &config.allowed_domains {
        let domain = pattern.strip_prefix("*.").unwrap_or(pattern);
        if domain.is_empty()
            || !domain
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "Invalid allowed domain pattern '{}'",
                pattern
            )));
        }
    }

    Ok(())
}

/// Validates plain-fetch configuration
fn validate_light_config(config: &LightConfig) -> Result<(), ConfigError> {
    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents must contain at least one user agent".to_string(),
        ));
    }

    if let Some(index) = config.user_agents.iter().position(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "user_agents[{}] is empty",
            index
        )));
    }

    validate_range("pre_request_delay_ms", config.pre_request_delay_ms)?;

    if !config.referer.is_empty() {
        Url::parse(&config.referer)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid referer: {}", e)))?;
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser rendering configuration
fn validate_rendered_config(config: &RenderedConfig) -> Result<(), ConfigError> {
    validate_range("pre_navigation_delay_ms", config.pre_navigation_delay_ms)?;
    validate_range("settle_delay_ms", config.settle_delay_ms)?;
    validate_range("pointer_pause_ms", config.pointer_pause_ms)?;
    validate_range("scroll_settle_ms", config.scroll_settle_ms)?;

    if config.navigation_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "navigation_timeout_secs must be >= 1".to_string(),
        ));
    }

    let (low, high) = config.evasion.pointer_range;
    if low > high {
        return Err(ConfigError::Validation(format!(
            "pointer_range must be [min, max] with min <= max, got [{}, {}]",
            low, high
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    validate_range("rate_limit_jitter_ms", config.rate_limit_jitter_ms)?;
    validate_range("server_error_jitter_ms", config.server_error_jitter_ms)?;
    validate_range("network_jitter_ms", config.network_jitter_ms)?;

    Ok(())
}

/// Validates every pipeline's resolved settings
fn validate_pipelines(config: &Config) -> Result<(), ConfigError> {
    for kind in PIPELINES {
        let settings = config.pipeline(kind);

        validate_concurrency(
            &format!("{}.max_concurrent_fetches", kind.name()),
            settings.max_concurrent_fetches,
        )?;

        if settings.output.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{}.output cannot be empty",
                kind.name()
            )));
        }

        for start in &settings.start_urls {
            validate_start_url(start)?;
        }

        if kind == PipelineKind::Details {
            if settings.links_file.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Validation(
                    "details.links_file must be set".to_string(),
                ));
            }
        } else if settings.start_urls.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} must have at least one start URL",
                kind.name()
            )));
        }
    }

    Ok(())
}

fn validate_start_url(start: &str) -> Result<(), ConfigError> {
    let url = Url::parse(start)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", start, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Start URL '{}' must use HTTP or HTTPS",
            start
        )));
    }

    Ok(())
}
