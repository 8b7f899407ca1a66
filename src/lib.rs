//! Pagewise: an adaptive parallel pagination fetcher
//!
//! This crate retrieves a known number of sequentially numbered pages from a
//! rate-sensitive API. Pages are fetched in barrier-synchronized rounds of
//! bounded concurrency; the round size is either fixed, chosen by profiling
//! candidate sizes, or tuned between rounds from observed throughput and errors.

pub mod config;
pub mod fetch;
pub mod output;
pub mod scheduler;

use thiserror::Error;

/// Main error type for Pagewise operations
#[derive(Debug, Error)]
pub enum PagewiseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// These are the only errors a scheduler run surfaces to its caller. They are
/// returned before the first round starts; every runtime condition after that
/// point is absorbed into the report.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Total page count must be at least 1")]
    NoPages,

    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Candidate batch size set is empty")]
    EmptyCandidates,
}

/// Result type alias for Pagewise operations
pub type Result<T> = std::result::Result<T, PagewiseError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use fetch::{FetchError, PageFetcher, PageRequest, PageResult};
pub use scheduler::{
    run_adaptive, run_fixed, run_profile, AdaptiveOptions, AggregateReport, ProfileOptions,
    ProfileOutcome, RunOptions,
};
