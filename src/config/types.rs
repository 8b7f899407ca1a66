use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Candidate batch sizes tried by the profiler when none are configured
pub const DEFAULT_CANDIDATES: [usize; 7] = [1, 3, 5, 8, 10, 15, 20];

/// Main configuration structure for Pagewise
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub tuning: TuningConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Upstream API description
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Endpoint that serves one page per request
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Query parameter carrying the page number
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    /// JSON field holding the page's item array. When absent the response
    /// body itself must be an array.
    #[serde(rename = "items-field")]
    pub items_field: Option<String>,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Query parameters shared by every page request
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "client-name")]
    pub client_name: String,

    #[serde(rename = "client-version")]
    pub client_version: String,

    /// URL with information about the client
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Scheduler run parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Number of pages to fetch (pages are numbered 1..=total_pages)
    #[serde(rename = "total-pages")]
    pub total_pages: u32,

    /// Round size for fixed runs
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Batch sizes benchmarked by the profiler
    #[serde(default = "default_candidates")]
    pub candidates: Vec<usize>,

    /// Rounds each profiler candidate is sampled for
    #[serde(rename = "sample-rounds", default = "default_sample_rounds")]
    pub sample_rounds: usize,

    #[serde(rename = "initial-concurrency", default = "default_initial_concurrency")]
    pub initial_concurrency: usize,

    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Time budget for the whole run (milliseconds), checked between rounds
    #[serde(rename = "deadline-ms")]
    pub deadline_ms: Option<u64>,

    /// Upper bound on a single page fetch (milliseconds)
    #[serde(rename = "page-timeout-ms")]
    pub page_timeout_ms: Option<u64>,

    /// Pages fetched one at a time for the speedup baseline (0 disables it)
    #[serde(rename = "baseline-pages", default = "default_baseline_pages")]
    pub baseline_pages: u32,
}

impl SchedulerConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn page_timeout(&self) -> Option<Duration> {
        self.page_timeout_ms.map(Duration::from_millis)
    }
}

/// Feedback controller constants for adaptive runs
///
/// Round timings are noisy, so throughput is compared with a relative
/// tolerance band instead of exact equality. Inside the band the concurrency
/// is held.
#[derive(Debug, Clone, Deserialize)]
pub struct TuningConfig {
    /// Amount the concurrency moves by on each adjustment
    #[serde(default = "default_step")]
    pub step: usize,

    /// Relative throughput change (0.10 = 10%) treated as noise
    #[serde(rename = "throughput-tolerance", default = "default_throughput_tolerance")]
    pub throughput_tolerance: f64,

    /// Round error rate above which the controller backs off
    #[serde(rename = "error-tolerance", default)]
    pub error_tolerance: f64,

    /// Number of strictly alternating adjustments reported as oscillation
    #[serde(rename = "divergence-window", default = "default_divergence_window")]
    pub divergence_window: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            throughput_tolerance: default_throughput_tolerance(),
            error_tolerance: 0.0,
            divergence_window: default_divergence_window(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Path to the markdown report file
    #[serde(rename = "summary-path")]
    pub summary_path: Option<String>,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_batch_size() -> usize {
    5
}

fn default_candidates() -> Vec<usize> {
    DEFAULT_CANDIDATES.to_vec()
}

fn default_sample_rounds() -> usize {
    2
}

fn default_initial_concurrency() -> usize {
    5
}

fn default_max_concurrency() -> usize {
    20
}

fn default_baseline_pages() -> u32 {
    5
}

fn default_step() -> usize {
    2
}

fn default_throughput_tolerance() -> f64 {
    0.10
}

fn default_divergence_window() -> usize {
    4
}
