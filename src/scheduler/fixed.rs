//! Fixed-size batching
//!
//! Pages `1..=N` are split into `⌈N/k⌉` contiguous rounds of `k` pages (the
//! last round may be shorter) that run strictly one after another.

use crate::fetch::PageFetcher;
use crate::scheduler::aggregator::{measure_baseline, AggregateReport, ResultAggregator};
use crate::scheduler::round::RoundExecutor;
use crate::scheduler::{deadline_passed, RunOptions};
use crate::ConfigError;
use std::ops::RangeInclusive;
use tokio::time::Instant;
use tracing::Instrument;

/// Splits pages `1..=total_pages` into contiguous ranges of `batch_size`
///
/// A batch size larger than `total_pages` yields a single range.
pub fn partition(
    total_pages: u32,
    batch_size: usize,
) -> impl Iterator<Item = RangeInclusive<u32>> {
    let total = u64::from(total_pages);
    let step = u64::try_from(batch_size)
        .unwrap_or(u64::MAX)
        .clamp(1, total.max(1));

    (0..)
        .map(move |round: u64| round.saturating_mul(step).saturating_add(1))
        .take_while(move |first| *first <= total)
        .map(move |first| first as u32..=first.saturating_add(step - 1).min(total) as u32)
}

/// Runs rounds over pages `1..=upto` at a fixed size
///
/// Returns the aggregator and whether the deadline cut the run short.
pub(crate) async fn execute_rounds<F: PageFetcher + ?Sized>(
    executor: &RoundExecutor<'_, F>,
    upto: u32,
    batch_size: usize,
    deadline: Option<Instant>,
) -> (ResultAggregator, bool) {
    let mut aggregator = ResultAggregator::new(upto);

    for (index, pages) in partition(upto, batch_size).enumerate() {
        if deadline_passed(deadline) {
            tracing::warn!(
                "Deadline reached after {} of {} pages",
                aggregator.completed_pages(),
                upto
            );
            return (aggregator, true);
        }
        let round = executor.execute(index, pages).await;
        aggregator.absorb(round);
    }

    (aggregator, false)
}

/// Fetches pages `1..=total_pages` in rounds of `batch_size`
///
/// # Arguments
///
/// * `total_pages` - Number of pages to fetch
/// * `batch_size` - Pages fetched concurrently per round
/// * `fetcher` - The single-page fetch primitive
/// * `options` - Shared run options (parameters, deadline, baseline, observer)
///
/// # Returns
///
/// * `Ok(AggregateReport)` - One result per page, in page order
/// * `Err(ConfigError)` - Invalid arguments, rejected before any fetch
///
/// # Example
///
/// ```no_run
/// use pagewise::fetch::SimulatedFetcher;
/// use pagewise::scheduler::{run_fixed, RunOptions};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = SimulatedFetcher::new(Duration::from_millis(100));
/// let report = run_fixed(20, 5, &fetcher, &RunOptions::default().with_baseline(5)).await?;
/// println!("{} rounds, speedup {:?}", report.rounds, report.speedup_factor);
/// # Ok(())
/// # }
/// ```
pub async fn run_fixed<F: PageFetcher + ?Sized>(
    total_pages: u32,
    batch_size: usize,
    fetcher: &F,
    options: &RunOptions,
) -> Result<AggregateReport, ConfigError> {
    if total_pages == 0 {
        return Err(ConfigError::NoPages);
    }
    if batch_size == 0 {
        return Err(ConfigError::ZeroBatchSize);
    }

    let span = tracing::info_span!("fixed_run", total_pages, batch_size);
    async move {
        let started = Instant::now();
        let deadline = options.deadline.map(|budget| started + budget);
        let executor = RoundExecutor::new(fetcher, options);

        tracing::info!(
            "Starting fixed run over {} pages in batches of {}",
            total_pages,
            batch_size
        );

        let baseline = measure_baseline(&executor, options.baseline_pages, total_pages).await;
        let (aggregator, truncated) =
            execute_rounds(&executor, total_pages, batch_size, deadline).await;
        let report = aggregator.into_report(truncated, baseline, None);

        tracing::info!(
            "Fixed run finished: {}/{} pages, {} errors, {} rounds in {:?}",
            report.completed_pages(),
            total_pages,
            report.error_count,
            report.rounds,
            report.total_elapsed
        );
        Ok(report)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::SimulatedFetcher;
    use std::time::Duration;

    #[test]
    fn test_partition_round_count_and_ranges() {
        let rounds: Vec<_> = partition(10, 3).collect();
        assert_eq!(rounds, vec![1..=3, 4..=6, 7..=9, 10..=10]);

        for (n, k) in [(1, 1), (1, 5), (20, 5), (21, 5), (7, 7), (100, 3)] {
            let count = partition(n, k).count();
            assert_eq!(count, (n as usize).div_ceil(k), "n={} k={}", n, k);
        }
    }

    #[test]
    fn test_partition_with_oversized_batch() {
        assert_eq!(partition(10, usize::MAX).collect::<Vec<_>>(), vec![1..=10]);
        assert_eq!(partition(u32::MAX, usize::MAX).count(), 1);
        assert_eq!(
            partition(u32::MAX, 1 << 31).collect::<Vec<_>>(),
            vec![1..=(1 << 31), (1 << 31) + 1..=u32::MAX]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_batch_runs_one_round() {
        let fetcher = SimulatedFetcher::new(Duration::from_millis(10));
        let report = run_fixed(10, usize::MAX, &fetcher, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.rounds, 1);
        assert_eq!(report.completed_pages(), 10);
        assert_eq!(fetcher.calls(), 10);
    }

    #[test]
    fn test_partition_covers_every_page_once() {
        let pages: Vec<u32> = partition(23, 4).flatten().collect();
        assert_eq!(pages, (1..=23).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_batch_size() {
        let fetcher = SimulatedFetcher::new(Duration::from_millis(20));
        let report = run_fixed(17, 4, &fetcher, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.rounds, 5);
        assert_eq!(fetcher.peak_in_flight(), 4);
        assert_eq!(fetcher.calls(), 17);
    }

    #[tokio::test]
    async fn test_rejects_bad_configuration() {
        let fetcher = SimulatedFetcher::new(Duration::ZERO);
        let options = RunOptions::default();

        assert!(matches!(
            run_fixed(0, 5, &fetcher, &options).await,
            Err(ConfigError::NoPages)
        ));
        assert!(matches!(
            run_fixed(5, 0, &fetcher, &options).await,
            Err(ConfigError::ZeroBatchSize)
        ));
        assert_eq!(fetcher.calls(), 0);
    }
}
