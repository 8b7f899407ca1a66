//! Round execution: one fan-out/fan-in barrier over a contiguous page range
//!
//! A round issues every fetch of its page range at once and completes only
//! when each of them has resolved. Fetch errors, per-call timeouts and
//! fetcher panics all resolve the page as failed, so a round always yields
//! exactly one `PageResult` per page.

use crate::fetch::{FetchError, PageFetcher, PageRequest, PageResult};
use crate::scheduler::observer::RoundSummary;
use crate::scheduler::RunOptions;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::ops::RangeInclusive;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Elapsed time used in place of zero when computing rates
const MIN_ROUND_ELAPSED: Duration = Duration::from_micros(1);

/// A completed round of concurrent page fetches
#[derive(Debug, Clone)]
pub struct BatchRound {
    /// 0-based position of the round within its run
    pub index: usize,

    /// Contiguous page range fetched by the round
    pub pages: RangeInclusive<u32>,

    pub started_at: Instant,

    /// Wall-clock time from round start until the barrier released
    pub elapsed: Duration,

    /// One result per page, in page order
    pub results: Vec<PageResult>,
}

impl BatchRound {
    /// Number of pages fetched in the round
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    /// Pages per second
    pub fn throughput(&self) -> f64 {
        self.len() as f64 / self.elapsed.max(MIN_ROUND_ELAPSED).as_secs_f64()
    }

    /// Fraction of the round's pages that failed
    pub fn error_rate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.failures() as f64 / self.len() as f64
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            index: self.index,
            first_page: *self.pages.start(),
            last_page: *self.pages.end(),
            elapsed: self.elapsed,
            failures: self.failures(),
        }
    }
}

/// Issues rounds against one fetcher with one set of run options
pub(crate) struct RoundExecutor<'a, F: PageFetcher + ?Sized> {
    fetcher: &'a F,
    options: &'a RunOptions,
}

impl<'a, F: PageFetcher + ?Sized> RoundExecutor<'a, F> {
    pub(crate) fn new(fetcher: &'a F, options: &'a RunOptions) -> Self {
        Self { fetcher, options }
    }

    /// Fetches every page of `pages` concurrently and waits for all of them
    pub(crate) async fn execute(&self, index: usize, pages: RangeInclusive<u32>) -> BatchRound {
        self.options.observer.round_started(index, &pages);
        let started_at = Instant::now();

        let fetches = pages.clone().map(|page_number| {
            let request = PageRequest {
                page_number,
                params: Arc::clone(&self.options.params),
            };
            fetch_page(self.fetcher, request, self.options.page_timeout)
        });
        let results = join_all(fetches).await;

        let round = BatchRound {
            index,
            pages,
            started_at,
            elapsed: started_at.elapsed(),
            results,
        };
        self.options.observer.round_finished(&round.summary());
        round
    }

    /// Fetches a single page outside of any round
    pub(crate) async fn fetch_one(&self, page_number: u32) -> PageResult {
        let request = PageRequest {
            page_number,
            params: Arc::clone(&self.options.params),
        };
        fetch_page(self.fetcher, request, self.options.page_timeout).await
    }
}

/// Fetches one page, converting every failure mode into a failed result
async fn fetch_page<F: PageFetcher + ?Sized>(
    fetcher: &F,
    request: PageRequest,
    page_timeout: Option<Duration>,
) -> PageResult {
    let page = request.page_number;
    let started = Instant::now();

    let attempt = AssertUnwindSafe(fetcher.fetch(&request)).catch_unwind();
    let outcome = match page_timeout {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => Ok(Err(FetchError::Timeout {
                page,
                timeout: limit,
            })),
        },
        None => attempt.await,
    };
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(item_count)) => {
            tracing::trace!("Page {} fetched {} items in {:?}", page, item_count, elapsed);
            PageResult::succeeded(page, elapsed, item_count)
        }
        Ok(Err(e)) => {
            tracing::debug!("Page {} failed after {:?}: {}", page, elapsed, e);
            PageResult::failed(page, elapsed, e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!("Fetcher panicked on page {}: {}", page, message);
            PageResult::failed(page, elapsed, format!("fetcher panicked: {}", message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
