//! Batch size profiling
//!
//! Each candidate batch size `k` is benchmarked on a bounded sample of
//! `min(N, k × sample_rounds)` pages instead of the full run. The measured
//! time per page is projected linearly to all `N` pages, and candidates are
//! ranked by that projection.

use crate::fetch::PageFetcher;
use crate::scheduler::fixed::execute_rounds;
use crate::scheduler::round::RoundExecutor;
use crate::scheduler::RunOptions;
use crate::ConfigError;
use std::time::Duration;
use tracing::Instrument;

pub const DEFAULT_SAMPLE_ROUNDS: usize = 2;

/// Settings for a profiling run
#[derive(Debug, Clone)]
pub struct ProfileOptions {
    /// Rounds each candidate is sampled for
    pub sample_rounds: usize,

    /// Options applied to every sample run. The deadline and baseline are
    /// ignored: every candidate is always measured in full.
    pub run: RunOptions,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            sample_rounds: DEFAULT_SAMPLE_ROUNDS,
            run: RunOptions::default(),
        }
    }
}

/// Measurement of one candidate batch size
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileReport {
    pub batch_size: usize,
    pub sampled_pages: u32,
    pub measured_elapsed: Duration,
    pub avg_per_page: Duration,

    /// Projected time to fetch all requested pages at this batch size
    pub extrapolated_total: Duration,

    /// Failed pages in the sample
    pub error_count: usize,
}

/// Ranked profiling results
#[derive(Debug, Clone)]
pub struct ProfileOutcome {
    /// Candidates sorted by ascending `extrapolated_total`
    pub ranked: Vec<ProfileReport>,

    /// Batch size with the smallest projected total
    pub recommended: usize,
}

/// Benchmarks candidate batch sizes and recommends the fastest
///
/// Every candidate is tested, including ones larger than `total_pages`
/// (those sample all pages and their projection equals the measurement).
/// Repeated candidates are measured once. Ties keep candidate order.
///
/// # Returns
///
/// * `Ok(ProfileOutcome)` - Ranked reports and the recommended batch size
/// * `Err(ConfigError)` - Invalid arguments, rejected before any fetch
pub async fn run_profile<F: PageFetcher + ?Sized>(
    total_pages: u32,
    candidates: &[usize],
    fetcher: &F,
    options: &ProfileOptions,
) -> Result<ProfileOutcome, ConfigError> {
    if total_pages == 0 {
        return Err(ConfigError::NoPages);
    }
    if candidates.is_empty() {
        return Err(ConfigError::EmptyCandidates);
    }
    if candidates.contains(&0) {
        return Err(ConfigError::ZeroBatchSize);
    }
    if options.sample_rounds == 0 {
        return Err(ConfigError::Validation(
            "sample_rounds must be >= 1".to_string(),
        ));
    }

    let mut unique = Vec::with_capacity(candidates.len());
    for &candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }

    let span = tracing::info_span!("profile_run", total_pages, candidates = unique.len());
    async move {
        let executor = RoundExecutor::new(fetcher, &options.run);
        let mut ranked = Vec::with_capacity(unique.len());

        for batch_size in unique {
            let report =
                profile_candidate(&executor, total_pages, batch_size, options.sample_rounds)
                    .await;
            tracing::info!(
                "Batch size {:>3}: {} pages in {:?}, {:?}/page, projected {:?}",
                report.batch_size,
                report.sampled_pages,
                report.measured_elapsed,
                report.avg_per_page,
                report.extrapolated_total
            );
            ranked.push(report);
        }

        ranked.sort_by_key(|report| report.extrapolated_total);
        let Some(recommended) = ranked.first().map(|report| report.batch_size) else {
            return Err(ConfigError::EmptyCandidates);
        };

        tracing::info!("Recommended batch size: {}", recommended);
        Ok(ProfileOutcome {
            ranked,
            recommended,
        })
    }
    .instrument(span)
    .await
}

async fn profile_candidate<F: PageFetcher + ?Sized>(
    executor: &RoundExecutor<'_, F>,
    total_pages: u32,
    batch_size: usize,
    sample_rounds: usize,
) -> ProfileReport {
    let budget = (batch_size as u64).saturating_mul(sample_rounds as u64);
    let sampled_pages = budget.min(u64::from(total_pages)) as u32;

    let (aggregator, _) = execute_rounds(executor, sampled_pages, batch_size, None).await;
    let report = aggregator.into_report(false, None, None);

    let measured_elapsed = report.total_elapsed;
    let avg_per_page = measured_elapsed / sampled_pages;
    let extrapolated_total = if sampled_pages == total_pages {
        measured_elapsed
    } else {
        avg_per_page.saturating_mul(total_pages)
    };

    ProfileReport {
        batch_size,
        sampled_pages,
        measured_elapsed,
        avg_per_page,
        extrapolated_total,
        error_count: report.error_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::SimulatedFetcher;

    #[tokio::test(start_paused = true)]
    async fn test_sample_size_is_bounded() {
        let fetcher = SimulatedFetcher::new(Duration::from_millis(100));
        let outcome = run_profile(100, &[3, 10], &fetcher, &ProfileOptions::default())
            .await
            .unwrap();

        let by_size = |k: usize| outcome.ranked.iter().find(|r| r.batch_size == k).unwrap();
        assert_eq!(by_size(3).sampled_pages, 6);
        assert_eq!(by_size(10).sampled_pages, 20);
        assert_eq!(fetcher.calls(), 26);
    }

    #[tokio::test(start_paused = true)]
    async fn test_candidate_larger_than_total_uses_all_pages() {
        let fetcher = SimulatedFetcher::new(Duration::from_millis(100));
        let outcome = run_profile(4, &[20], &fetcher, &ProfileOptions::default())
            .await
            .unwrap();

        let report = &outcome.ranked[0];
        assert_eq!(report.sampled_pages, 4);
        assert_eq!(report.extrapolated_total, report.measured_elapsed);
        assert_eq!(outcome.recommended, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_candidates_measured_once() {
        let fetcher = SimulatedFetcher::new(Duration::from_millis(10));
        let outcome = run_profile(50, &[5, 5, 2], &fetcher, &ProfileOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.ranked.len(), 2);
        assert_eq!(fetcher.calls(), 10 + 4);
    }

    #[tokio::test]
    async fn test_rejects_bad_configuration() {
        let fetcher = SimulatedFetcher::new(Duration::ZERO);
        let options = ProfileOptions::default();

        assert!(matches!(
            run_profile(10, &[], &fetcher, &options).await,
            Err(ConfigError::EmptyCandidates)
        ));
        assert!(matches!(
            run_profile(0, &[1], &fetcher, &options).await,
            Err(ConfigError::NoPages)
        ));
        assert!(matches!(
            run_profile(10, &[1, 0], &fetcher, &options).await,
            Err(ConfigError::ZeroBatchSize)
        ));
        let no_rounds = ProfileOptions {
            sample_rounds: 0,
            ..ProfileOptions::default()
        };
        assert!(matches!(
            run_profile(10, &[1], &fetcher, &no_rounds).await,
            Err(ConfigError::Validation(_))
        ));
        assert_eq!(fetcher.calls(), 0);
    }
}
