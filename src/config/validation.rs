use crate::config::types::{ApiConfig, Config, SchedulerConfig, TuningConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Hard ceiling on concurrency accepted from a config file
const MAX_CONFIGURED_CONCURRENCY: usize = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_tuning(&config.tuning)?;
    Ok(())
}

/// Validates the upstream API description
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.page_param.is_empty() {
        return Err(ConfigError::Validation(
            "page_param cannot be empty".to_string(),
        ));
    }

    if config.params.contains_key(&config.page_param) {
        return Err(ConfigError::Validation(format!(
            "params must not set the page parameter '{}'",
            config.page_param
        )));
    }

    if matches!(config.items_field.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "items_field cannot be empty when set".to_string(),
        ));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout_ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate client name: non-empty, alphanumeric + hyphens only
    if config.client_name.is_empty() {
        return Err(ConfigError::Validation(
            "client_name cannot be empty".to_string(),
        ));
    }

    if !config
        .client_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "client_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.client_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates scheduler run parameters
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.total_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "total_pages must be >= 1, got {}",
            config.total_pages
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.candidates.is_empty() {
        return Err(ConfigError::Validation(
            "candidates must contain at least one batch size".to_string(),
        ));
    }

    if config.candidates.contains(&0) {
        return Err(ConfigError::Validation(
            "candidates must not contain a zero batch size".to_string(),
        ));
    }

    if config.sample_rounds < 1 {
        return Err(ConfigError::Validation(format!(
            "sample_rounds must be >= 1, got {}",
            config.sample_rounds
        )));
    }

    if config.max_concurrency < 1 || config.max_concurrency > MAX_CONFIGURED_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and {}, got {}",
            MAX_CONFIGURED_CONCURRENCY, config.max_concurrency
        )));
    }

    if config.initial_concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "initial_concurrency must be >= 1, got {}",
            config.initial_concurrency
        )));
    }

    if config.deadline_ms == Some(0) {
        return Err(ConfigError::Validation(
            "deadline_ms must be >= 1 when set".to_string(),
        ));
    }

    if config.page_timeout_ms == Some(0) {
        return Err(ConfigError::Validation(
            "page_timeout_ms must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates feedback controller constants
///
/// Also called by the adaptive runner, since tuning can be supplied
/// programmatically without going through a config file.
pub fn validate_tuning(config: &TuningConfig) -> Result<(), ConfigError> {
    if config.step < 1 {
        return Err(ConfigError::Validation(format!(
            "step must be >= 1, got {}",
            config.step
        )));
    }

    if !(0.0..1.0).contains(&config.throughput_tolerance) {
        return Err(ConfigError::Validation(format!(
            "throughput_tolerance must be in [0, 1), got {}",
            config.throughput_tolerance
        )));
    }

    if !(0.0..=1.0).contains(&config.error_tolerance) {
        return Err(ConfigError::Validation(format!(
            "error_tolerance must be in [0, 1], got {}",
            config.error_tolerance
        )));
    }

    if config.divergence_window < 2 {
        return Err(ConfigError::Validation(format!(
            "divergence_window must be >= 2, got {}",
            config.divergence_window
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
