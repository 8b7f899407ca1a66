//! Result aggregation and run statistics
//!
//! The aggregator owns a fixed-size buffer with one slot per page, addressed
//! by `page_number - 1`. Rounds are absorbed in arrival order, and because
//! round ranges only ever increase the filled slots always form a prefix of
//! the run, so the final sequence is page-ordered without sorting.

use crate::fetch::{PageFetcher, PageResult};
use crate::scheduler::adaptive::AdaptiveHistory;
use crate::scheduler::round::{BatchRound, RoundExecutor};
use std::time::Duration;
use tokio::time::Instant;

/// Sequential reference measurement used for the speedup factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    /// Pages fetched one at a time
    pub sampled_pages: u32,

    /// Wall-clock time for the whole sequential sample
    pub elapsed: Duration,
}

impl Baseline {
    pub fn avg_per_page(&self) -> Duration {
        if self.sampled_pages == 0 {
            return Duration::ZERO;
        }
        self.elapsed / self.sampled_pages
    }

    /// Projected sequential time for `pages` pages
    pub fn extrapolate(&self, pages: usize) -> Duration {
        self.avg_per_page().saturating_mul(pages as u32)
    }
}

/// Fetches the first `min(sample_pages, total_pages)` pages one at a time
///
/// Returns `None` when the sample size is zero.
pub(crate) async fn measure_baseline<F: PageFetcher + ?Sized>(
    executor: &RoundExecutor<'_, F>,
    sample_pages: u32,
    total_pages: u32,
) -> Option<Baseline> {
    let sampled_pages = sample_pages.min(total_pages);
    if sampled_pages == 0 {
        return None;
    }

    let started = Instant::now();
    for page in 1..=sampled_pages {
        executor.fetch_one(page).await;
    }

    let baseline = Baseline {
        sampled_pages,
        elapsed: started.elapsed(),
    };
    tracing::debug!(
        "Sequential baseline: {} pages in {:?} ({:?}/page)",
        sampled_pages,
        baseline.elapsed,
        baseline.avg_per_page()
    );
    Some(baseline)
}

/// Final outcome of a fixed or adaptive run
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Number of pages the run was asked to fetch
    pub requested_pages: u32,

    /// Page results in page order. Complete runs hold every page 1..=N;
    /// truncated runs hold a contiguous prefix.
    pub results: Vec<PageResult>,

    /// Sum of round wall-clock durations
    pub total_elapsed: Duration,

    /// Items across successful pages
    pub total_items: u64,

    pub error_count: usize,

    /// Mean latency over every returned page, successful or not
    pub average_per_page: Duration,

    pub rounds: usize,

    pub baseline: Option<Baseline>,

    /// Sequential projection divided by the actual total elapsed time
    pub speedup_factor: Option<f64>,

    /// Whether the run stopped at its deadline before fetching every page
    pub truncated: bool,

    /// Per-round controller history (adaptive runs only)
    pub history: Option<AdaptiveHistory>,
}

impl AggregateReport {
    pub fn completed_pages(&self) -> usize {
        self.results.len()
    }

    pub fn success_count(&self) -> usize {
        self.results.len() - self.error_count
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        (self.success_count() as f64 / self.results.len() as f64) * 100.0
    }

    /// Page numbers of failed pages
    pub fn failed_pages(&self) -> Vec<u32> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.page_number)
            .collect()
    }
}

/// Collects round results into a page-indexed buffer
#[derive(Debug)]
pub struct ResultAggregator {
    slots: Vec<Option<PageResult>>,
    total_elapsed: Duration,
    rounds: usize,
}

impl ResultAggregator {
    /// Creates an aggregator for pages `1..=total_pages`
    pub fn new(total_pages: u32) -> Self {
        Self {
            slots: vec![None; total_pages as usize],
            total_elapsed: Duration::ZERO,
            rounds: 0,
        }
    }

    /// Absorbs a completed round
    ///
    /// Results are placed by page number, so their order inside the round
    /// does not matter. A result for a page outside the run or for a page
    /// already present is dropped.
    pub fn absorb(&mut self, round: BatchRound) {
        self.total_elapsed += round.elapsed;
        self.rounds += 1;

        for result in round.results {
            let Some(slot) = (result.page_number as usize)
                .checked_sub(1)
                .and_then(|index| self.slots.get_mut(index))
            else {
                tracing::warn!(
                    "Dropping result for page {} outside 1..={}",
                    result.page_number,
                    self.slots.len()
                );
                continue;
            };

            if slot.is_some() {
                tracing::warn!("Dropping duplicate result for page {}", result.page_number);
                continue;
            }
            *slot = Some(result);
        }
    }

    /// Number of pages with a result, counted from page 1
    pub fn completed_pages(&self) -> usize {
        self.slots.iter().take_while(|slot| slot.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_pages() == self.slots.len()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Builds the final report from the absorbed rounds
    pub fn into_report(
        self,
        truncated: bool,
        baseline: Option<Baseline>,
        history: Option<AdaptiveHistory>,
    ) -> AggregateReport {
        let requested_pages = self.slots.len() as u32;
        let results: Vec<PageResult> = self.slots.into_iter().map_while(|slot| slot).collect();

        let total_items = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.item_count)
            .sum();
        let error_count = results.iter().filter(|r| !r.success).count();
        let average_per_page = if results.is_empty() {
            Duration::ZERO
        } else {
            results.iter().map(|r| r.elapsed).sum::<Duration>() / results.len() as u32
        };

        let speedup_factor = baseline.and_then(|baseline| {
            if results.is_empty() || self.total_elapsed.is_zero() {
                return None;
            }
            let sequential = baseline.extrapolate(results.len());
            Some(sequential.as_secs_f64() / self.total_elapsed.as_secs_f64())
        });

        AggregateReport {
            requested_pages,
            results,
            total_elapsed: self.total_elapsed,
            total_items,
            error_count,
            average_per_page,
            rounds: self.rounds,
            baseline,
            speedup_factor,
            truncated,
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_round(index: usize, results: Vec<PageResult>, elapsed_ms: u64) -> BatchRound {
        let first = results.iter().map(|r| r.page_number).min().unwrap();
        let last = results.iter().map(|r| r.page_number).max().unwrap();
        BatchRound {
            index,
            pages: first..=last,
            started_at: Instant::now(),
            elapsed: Duration::from_millis(elapsed_ms),
            results,
        }
    }

    fn ok(page: u32, elapsed_ms: u64, items: u64) -> PageResult {
        PageResult::succeeded(page, Duration::from_millis(elapsed_ms), items)
    }

    #[tokio::test]
    async fn test_results_placed_by_page_number() {
        let mut aggregator = ResultAggregator::new(4);
        // Completion order inside a round is irrelevant
        aggregator.absorb(create_round(0, vec![ok(2, 10, 1), ok(1, 20, 1)], 20));
        aggregator.absorb(create_round(1, vec![ok(4, 10, 1), ok(3, 30, 1)], 30));

        let report = aggregator.into_report(false, None, None);
        let pages: Vec<u32> = report.results.iter().map(|r| r.page_number).collect();
        assert_eq!(pages, vec![1, 2, 3, 4]);
        assert_eq!(report.rounds, 2);
    }

    #[tokio::test]
    async fn test_statistics() {
        let mut aggregator = ResultAggregator::new(3);
        aggregator.absorb(create_round(
            0,
            vec![
                ok(1, 100, 10),
                PageResult::failed(2, Duration::from_millis(200), "HTTP 500"),
                ok(3, 300, 5),
            ],
            300,
        ));

        let report = aggregator.into_report(false, None, None);
        assert_eq!(report.total_items, 15);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.average_per_page, Duration::from_millis(200));
        assert_eq!(report.total_elapsed, Duration::from_millis(300));
        assert_eq!(report.failed_pages(), vec![2]);
        assert!(report.speedup_factor.is_none());
    }

    #[tokio::test]
    async fn test_total_elapsed_sums_rounds_not_pages() {
        let mut aggregator = ResultAggregator::new(4);
        aggregator.absorb(create_round(0, vec![ok(1, 100, 1), ok(2, 100, 1)], 100));
        aggregator.absorb(create_round(1, vec![ok(3, 100, 1), ok(4, 100, 1)], 100));

        assert_eq!(aggregator.total_elapsed(), Duration::from_millis(200));
        assert!(aggregator.is_complete());
    }

    #[tokio::test]
    async fn test_out_of_range_and_duplicate_results_dropped() {
        let mut aggregator = ResultAggregator::new(2);
        aggregator.absorb(create_round(0, vec![ok(1, 10, 1), ok(3, 10, 1)], 10));
        aggregator.absorb(create_round(1, vec![ok(1, 10, 99), ok(2, 10, 1)], 10));

        let report = aggregator.into_report(false, None, None);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].item_count, 1);
    }

    #[tokio::test]
    async fn test_truncated_report_is_prefix() {
        let mut aggregator = ResultAggregator::new(10);
        aggregator.absorb(create_round(0, vec![ok(1, 10, 1), ok(2, 10, 1), ok(3, 10, 1)], 10));
        assert_eq!(aggregator.completed_pages(), 3);
        assert!(!aggregator.is_complete());

        let report = aggregator.into_report(true, None, None);
        assert!(report.truncated);
        assert_eq!(report.requested_pages, 10);
        assert_eq!(report.completed_pages(), 3);
    }

    #[tokio::test]
    async fn test_speedup_factor_from_baseline() {
        let mut aggregator = ResultAggregator::new(4);
        aggregator.absorb(create_round(
            0,
            vec![ok(1, 100, 1), ok(2, 100, 1), ok(3, 100, 1), ok(4, 100, 1)],
            100,
        ));
        let baseline = Baseline {
            sampled_pages: 2,
            elapsed: Duration::from_millis(200),
        };

        let report = aggregator.into_report(false, Some(baseline), None);
        let speedup = report.speedup_factor.unwrap();
        assert!((speedup - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_average() {
        let baseline = Baseline {
            sampled_pages: 5,
            elapsed: Duration::from_millis(500),
        };
        assert_eq!(baseline.avg_per_page(), Duration::from_millis(100));
        assert_eq!(baseline.extrapolate(20), Duration::from_secs(2));
    }
}
