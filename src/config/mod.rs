//! Configuration module for Pagewise
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pagewise::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagewise.toml")).unwrap();
//! println!("Will fetch {} pages", config.scheduler.total_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, OutputConfig, SchedulerConfig, TuningConfig, UserAgentConfig,
    DEFAULT_CANDIDATES,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_tuning};
