use crate::config::types::{
    CircuitBreakerConfig, ContentConfig, CrawlerConfig, FilterConfig, HttpConfig, ProxyConfig,
    ScraperConfig, SplitLength,
};
use crate::url::guard::is_forbidden_host;
use crate::ConfigError;
use url::Url;

/// Longest single wait the configuration may ask for, in seconds
const MAX_CONFIGURED_SECONDS: f64 = 3600.0;

/// Validates the entire configuration
pub fn validate(config: &ScraperConfig) -> Result<(), ConfigError> {
    validate_seed(&config.domain, config.filter.block_private_hosts)?;
    validate_crawler_config(&config.crawler)?;
    validate_filter_config(&config.filter)?;
    validate_http_config(&config.http)?;
    validate_circuit_breaker_config(&config.circuit_breaker)?;
    validate_content_config(&config.content)?;
    validate_proxy_config(&config.proxy)?;
    Ok(())
}

/// Validates the seed URL without touching the network
///
/// Hostnames are resolved later by the URL filter; here only literal
/// loopback/private addresses and `localhost` are refused.
fn validate_seed(domain: &str, block_private_hosts: bool) -> Result<(), ConfigError> {
    if domain.trim().is_empty() {
        return Err(ConfigError::Validation("domain is required".to_string()));
    }

    let url = Url::parse(domain.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid domain '{}': {}", domain, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Invalid URL scheme '{}' in domain; use http or https",
            url.scheme()
        )));
    }

    let Some(host) = url.host() else {
        return Err(ConfigError::InvalidUrl(format!(
            "Domain '{}' has no hostname",
            domain
        )));
    };

    if block_private_hosts && is_forbidden_host(&host) {
        return Err(ConfigError::ForbiddenSeed(host.to_string()));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrent_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "concurrent_requests must be at least 1, got {}",
            config.concurrent_requests
        )));
    }

    if config.connections_per_host < 1 {
        return Err(ConfigError::Validation(format!(
            "connections_per_host must be at least 1, got {}",
            config.connections_per_host
        )));
    }

    validate_seconds(
        "delay_between_requests",
        config.delay_between_requests,
        true,
    )?;

    Ok(())
}

fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    validate_non_empty_entries("include_keywords", &config.include_keywords)?;
    validate_non_empty_entries("exclude_keywords", &config.exclude_keywords)?;
    validate_non_empty_entries("start_with", &config.start_with)?;
    validate_non_empty_entries("excluded_protocols", &config.excluded_protocols)?;
    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    validate_seconds("base_delay", config.base_delay, false)?;
    validate_seconds("max_backoff", config.max_backoff, false)?;
    validate_seconds("timeout", config.timeout, false)?;

    if config.max_backoff < config.base_delay {
        return Err(ConfigError::Validation(format!(
            "max_backoff ({}s) must not be smaller than base_delay ({}s)",
            config.max_backoff, config.base_delay
        )));
    }

    if config.max_body_size == 0 {
        return Err(ConfigError::Validation(
            "max_body_size must be positive".to_string(),
        ));
    }

    if let Some(agent) = &config.user_agent {
        if agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user_agent cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_circuit_breaker_config(config: &CircuitBreakerConfig) -> Result<(), ConfigError> {
    if config.threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "circuit_breaker threshold must be at least 1, got {}",
            config.threshold
        )));
    }

    if !(0.0..=1.0).contains(&config.failure_rate) {
        return Err(ConfigError::Validation(format!(
            "circuit_breaker failure_rate must be between 0.0 and 1.0, got {}",
            config.failure_rate
        )));
    }

    if config.min_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "circuit_breaker min_requests must be at least 1, got {}",
            config.min_requests
        )));
    }

    Ok(())
}

fn validate_content_config(config: &ContentConfig) -> Result<(), ConfigError> {
    if config.split_length == SplitLength::Chars(0) {
        return Err(ConfigError::Validation(
            "split_length must be positive or \"none\"".to_string(),
        ));
    }

    if let Some(selector) = &config.target_selector {
        scraper::Selector::parse(selector).map_err(|e| {
            ConfigError::Validation(format!("Invalid target_selector '{}': {:?}", selector, e))
        })?;
    }

    Ok(())
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    match config {
        ProxyConfig::None => Ok(()),
        ProxyConfig::List { proxies } => {
            if proxies.is_empty() {
                return Err(ConfigError::Validation(
                    "Proxy list cannot be empty".to_string(),
                ));
            }
            for proxy in proxies {
                Url::parse(proxy).map_err(|e| {
                    // The proxy URL may carry credentials; report only the parse error
                    ConfigError::InvalidUrl(format!("Invalid proxy URL in list: {}", e))
                })?;
            }
            Ok(())
        }
        ProxyConfig::ScraperApi { api_key, .. } => {
            if api_key.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "ScraperAPI requires an API key".to_string(),
                ));
            }
            Ok(())
        }
        ProxyConfig::BrightData {
            username, password, ..
        } => require_credentials("BrightData", username, password),
        ProxyConfig::Oxylabs {
            username, password, ..
        } => require_credentials("Oxylabs", username, password),
    }
}

fn require_credentials(provider: &str, username: &str, password: &str) -> Result<(), ConfigError> {
    if username.is_empty() || password.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} requires username and password",
            provider
        )));
    }
    Ok(())
}

/// Checks a duration given in seconds
fn validate_seconds(name: &str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 || (!allow_zero && value == 0.0) {
        let expected = if allow_zero { "non-negative" } else { "positive" };
        return Err(ConfigError::Validation(format!(
            "{} must be {} seconds, got {}",
            name, expected, value
        )));
    }

    if value > MAX_CONFIGURED_SECONDS {
        return Err(ConfigError::Validation(format!(
            "{} must be at most {} seconds, got {}",
            name, MAX_CONFIGURED_SECONDS, value
        )));
    }

    Ok(())
}

fn validate_non_empty_entries(name: &str, entries: &[String]) -> Result<(), ConfigError> {
    if entries.iter().any(|entry| entry.is_empty()) {
        return Err(ConfigError::Validation(format!(
            "{} cannot contain empty entries",
            name
        )));
    }
    Ok(())
}
