//! Page fetching primitives
//!
//! This module defines the single-page fetch seam used by every scheduler mode:
//! - `PageRequest` / `PageResult`, the per-page input and outcome
//! - `PageFetcher`, the trait a caller implements to reach its upstream
//! - `HttpPageFetcher`, a reqwest-backed implementation for JSON APIs
//! - `SimulatedFetcher`, a scripted implementation for dry runs and tests

mod http;
mod simulated;

pub use http::{build_http_client, count_items, HttpPageFetcher};
pub use simulated::SimulatedFetcher;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Query parameters shared by every page request of a run
pub type QueryParams = BTreeMap<String, String>;

/// A request for a single page
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// 1-based page number
    pub page_number: u32,

    /// Opaque query parameters, shared across the run
    pub params: Arc<QueryParams>,
}

/// Outcome of fetching a single page
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// 1-based page number
    pub page_number: u32,

    /// Time from issuing the fetch until it resolved
    pub elapsed: Duration,

    /// Number of items the page contained (0 for failed pages)
    pub item_count: u64,

    /// Whether the fetch succeeded
    pub success: bool,

    /// Failure description for unsuccessful pages
    pub error: Option<String>,
}

impl PageResult {
    pub fn succeeded(page_number: u32, elapsed: Duration, item_count: u64) -> Self {
        Self {
            page_number,
            elapsed,
            item_count,
            success: true,
            error: None,
        }
    }

    pub fn failed(page_number: u32, elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            page_number,
            elapsed,
            item_count: 0,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Errors a single page fetch can produce
///
/// None of these abort a run: the round barrier turns them into a failed
/// `PageResult` and the run continues.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request for page {page} failed: {source}")]
    Http { page: u32, source: reqwest::Error },

    #[error("Page {page} returned HTTP {status}")]
    Status { page: u32, status: u16 },

    #[error("Page {page} was rate limited (HTTP 429)")]
    RateLimited { page: u32 },

    #[error("Page {page} timed out after {timeout:?}")]
    Timeout { page: u32, timeout: Duration },

    #[error("Failed to decode page {page}: {message}")]
    Decode { page: u32, message: String },

    #[error("Page {page} failed: {message}")]
    Other { page: u32, message: String },
}

impl FetchError {
    /// Returns the page this error belongs to
    pub fn page(&self) -> u32 {
        match self {
            Self::Http { page, .. }
            | Self::Status { page, .. }
            | Self::RateLimited { page }
            | Self::Timeout { page, .. }
            | Self::Decode { page, .. }
            | Self::Other { page, .. } => *page,
        }
    }

    /// Returns true if the upstream pushed back on load
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout { .. })
    }
}

/// Single-page fetch primitive supplied by the caller
///
/// Implementations are expected to bound their own per-call latency and to
/// report failures as `Err` rather than panicking. A panic is still contained
/// by the round barrier and recorded as a failed page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one page and returns the number of items it contained
    async fn fetch(&self, request: &PageRequest) -> Result<u64, FetchError>;
}
