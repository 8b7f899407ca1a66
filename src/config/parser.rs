//! TOML loading for run configurations
//!
//! A configuration file is read once; the same text is both parsed and
//! hashed so the logged hash always describes the config that was used.

use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads a configuration file and validates it
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use pagewise::config::load_config;
///
/// let config = load_config(Path::new("pagewise.toml")).unwrap();
/// println!("Total pages: {}", config.scheduler.total_pages);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex-encoded SHA-256 of a configuration file
///
/// Stamped into the markdown report so a report can be traced back to the
/// exact configuration that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Reads a configuration file once, returning the validated config and the
/// hash of the text it was parsed from
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_CONFIG: &str = r#"
[api]
base-url = "https://analytics.example.com/api/2.0/events"
items-field = "results"
timeout-ms = 5000

[api.params]
project_id = "42"

[user-agent]
client-name = "pagewise"
client-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "ops@example.com"

[scheduler]
total-pages = 50
batch-size = 8
max-concurrency = 15
deadline-ms = 30000
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.scheduler.total_pages, 50);
        assert_eq!(config.scheduler.batch_size, 8);
        assert_eq!(config.scheduler.max_concurrency, 15);
        assert_eq!(config.api.page_param, "page");
        assert_eq!(config.api.items_field.as_deref(), Some("results"));
        assert_eq!(config.api.params.get("project_id").map(String::as_str), Some("42"));
        assert_eq!(config.user_agent.client_name, "pagewise");
    }

    #[test]
    fn test_defaults_are_applied() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.scheduler.candidates, vec![1, 3, 5, 8, 10, 15, 20]);
        assert_eq!(config.scheduler.sample_rounds, 2);
        assert_eq!(config.scheduler.initial_concurrency, 5);
        assert_eq!(config.scheduler.baseline_pages, 5);
        assert_eq!(config.tuning.step, 2);
        assert!((config.tuning.throughput_tolerance - 0.10).abs() < f64::EPSILON);
        assert_eq!(config.tuning.error_tolerance, 0.0);
        assert!(config.output.summary_path.is_none());
        assert_eq!(
            config.scheduler.deadline(),
            Some(std::time::Duration::from_secs(30))
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/pagewise.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = VALID_CONFIG.replace("total-pages = 50", "total-pages = 0");
        let file = create_temp_config(&config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_parse_config_from_text() {
        let config = parse_config(VALID_CONFIG).unwrap();
        assert_eq!(config.scheduler.total_pages, 50);

        let broken = VALID_CONFIG.replace("batch-size = 8", "batch-size = 0");
        assert!(matches!(
            parse_config(&broken).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn test_load_with_hash_matches_file_hash() {
        let file = create_temp_config(VALID_CONFIG);
        let (config, hash) = load_config_with_hash(file.path()).unwrap();

        assert_eq!(config.scheduler.batch_size, 8);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
        assert_eq!(hash, hash_content(VALID_CONFIG));
    }

    #[test]
    fn test_load_with_hash_rejects_invalid_config() {
        let content = VALID_CONFIG.replace("total-pages = 50", "total-pages = 0");
        let file = create_temp_config(&content);
        assert!(matches!(
            load_config_with_hash(file.path()).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn test_compute_config_hash() {
        let config_content = "test content";
        let file = create_temp_config(config_content);

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        // Same content should produce same hash
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
