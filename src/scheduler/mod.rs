//! Round-based page scheduling
//!
//! This module fetches pages `1..=N` of a paginated API in rounds. A round
//! issues a contiguous range of pages concurrently and waits for all of
//! them before the next round starts. Three runners share that primitive:
//!
//! - [`run_fixed`]: every round has the same size
//! - [`run_profile`]: benchmarks candidate sizes on a sample and recommends one
//! - [`run_adaptive`]: tunes the round size between rounds from observed
//!   throughput and errors
//!
//! Runs own all of their state. Nothing is shared between two runs except
//! what the caller passes in (the fetcher and the observer), so any number of
//! runs may execute concurrently.

pub mod adaptive;
pub mod aggregator;
pub mod fixed;
pub mod observer;
pub mod profiler;
pub mod round;

pub use adaptive::{
    run_adaptive, AdaptiveHistory, AdaptiveOptions, AdaptivePhase, AdaptiveState, Adjustment,
    DivergenceWarning, RoundSample, RoundThroughput, Termination,
};
pub use aggregator::{AggregateReport, Baseline, ResultAggregator};
pub use fixed::{partition, run_fixed};
pub use observer::{RoundObserver, RoundSummary, TracingObserver};
pub use profiler::{run_profile, ProfileOptions, ProfileOutcome, ProfileReport};
pub use round::BatchRound;

use crate::fetch::QueryParams;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Options shared by every runner
#[derive(Clone)]
pub struct RunOptions {
    /// Query parameters sent unchanged with every page request
    pub params: Arc<QueryParams>,

    /// Per-call limit; a page still pending after it is marked failed
    pub page_timeout: Option<Duration>,

    /// Run budget measured from run start. Checked between rounds, so an
    /// in-flight round always completes.
    pub deadline: Option<Duration>,

    /// Pages fetched sequentially before the run to estimate the speedup.
    /// Zero disables the baseline.
    pub baseline_pages: u32,

    pub observer: Arc<dyn RoundObserver>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            params: Arc::new(QueryParams::new()),
            page_timeout: None,
            deadline: None,
            baseline_pages: 0,
            observer: Arc::new(TracingObserver),
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("params", &self.params)
            .field("page_timeout", &self.page_timeout)
            .field("deadline", &self.deadline)
            .field("baseline_pages", &self.baseline_pages)
            .finish_non_exhaustive()
    }
}

impl RunOptions {
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = Arc::new(params);
        self
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = Some(timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_baseline(mut self, pages: u32) -> Self {
        self.baseline_pages = pages;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RoundObserver>) -> Self {
        self.observer = observer;
        self
    }
}

pub(crate) fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    /// The paused clock advances in whole milliseconds, so timer-driven
    /// durations may land a tick past their nominal value.
    pub fn assert_near(actual: Duration, expected: Duration) {
        let slack = Duration::from_millis(5);
        let low = expected.saturating_sub(slack);
        assert!(
            actual >= low && actual <= expected + slack,
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_options_builders() {
        let mut params = QueryParams::new();
        params.insert("per_page".to_string(), "50".to_string());

        let options = RunOptions::default()
            .with_params(params)
            .with_page_timeout(Duration::from_secs(2))
            .with_deadline(Duration::from_secs(30))
            .with_baseline(3);

        assert_eq!(options.params.get("per_page").map(String::as_str), Some("50"));
        assert_eq!(options.page_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.deadline, Some(Duration::from_secs(30)));
        assert_eq!(options.baseline_pages, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_passed() {
        assert!(!deadline_passed(None));

        let deadline = Instant::now() + Duration::from_millis(100);
        assert!(!deadline_passed(Some(deadline)));
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(deadline_passed(Some(deadline)));
    }
}
