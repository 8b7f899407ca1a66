//! Output module for run reports
//!
//! This module handles:
//! - Printing run and profiling statistics to the terminal
//! - Generating markdown summaries of completed runs

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_report, generate_markdown_report, ReportHeader, RunOutcome};
pub use stats::{print_profile, print_report};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
