//! Adaptive batching
//!
//! An adaptive run replaces the fixed round size with one that is tuned
//! between rounds. After every round the controller compares the round's
//! throughput (pages per second) and error rate with the previous round:
//!
//! | Observation | Action |
//! |-------------|--------|
//! | error rate above `error_tolerance` | decrease by `step` (floor 1) |
//! | throughput fell by more than `throughput_tolerance` | decrease by `step` |
//! | throughput rose by more than `throughput_tolerance` | increase by `step` (ceiling max) |
//! | otherwise | hold |
//!
//! The first round has nothing to compare against; it steps upward unless
//! it saw errors. A throughput drop right after a decrease is the expected
//! effect of the smaller round and does not trigger a second decrease.
//!
//! Run phases: `Initializing -> Running(round) -> {Converged | Truncated} -> Done`.

use crate::config::{validate_tuning, TuningConfig};
use crate::fetch::PageFetcher;
use crate::scheduler::aggregator::{measure_baseline, AggregateReport, ResultAggregator};
use crate::scheduler::round::{BatchRound, RoundExecutor};
use crate::scheduler::{deadline_passed, RunOptions};
use crate::ConfigError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

pub const DEFAULT_INITIAL_CONCURRENCY: usize = 5;
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;

/// Controller settings for an adaptive run
#[derive(Debug, Clone)]
pub struct AdaptiveOptions {
    /// Round size of the first round, clamped to `[1, max_concurrency]`
    pub initial_concurrency: usize,

    pub max_concurrency: usize,

    pub tuning: TuningConfig,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            initial_concurrency: DEFAULT_INITIAL_CONCURRENCY,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            tuning: TuningConfig::default(),
        }
    }
}

impl AdaptiveOptions {
    pub fn new(initial_concurrency: usize, max_concurrency: usize) -> Self {
        Self {
            initial_concurrency,
            max_concurrency,
            tuning: TuningConfig::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: TuningConfig) -> Self {
        self.tuning = tuning;
        self
    }
}

/// Direction of a concurrency change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Increase,
    Decrease,
    Hold,
}

/// Lifecycle of an adaptive run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptivePhase {
    Initializing,
    Running { round: usize },
    Converged,
    Truncated,
    Done,
}

/// How an adaptive run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every page was fetched
    Converged,
    /// The deadline passed with pages left
    Truncated,
}

/// Measurements of one round fed to the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundSample {
    pub pages: usize,
    pub failures: usize,
    pub elapsed: Duration,
}

impl RoundSample {
    pub fn from_round(round: &BatchRound) -> Self {
        Self {
            pages: round.len(),
            failures: round.failures(),
            elapsed: round.elapsed,
        }
    }

    /// Pages per second
    pub fn throughput(&self) -> f64 {
        self.pages as f64 / self.elapsed.max(Duration::from_micros(1)).as_secs_f64()
    }

    pub fn error_rate(&self) -> f64 {
        if self.pages == 0 {
            return 0.0;
        }
        self.failures as f64 / self.pages as f64
    }
}

/// History entry for one adaptive round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundThroughput {
    pub round_index: usize,
    pub first_page: u32,
    pub last_page: u32,

    /// Concurrency level in effect for the round
    pub concurrency: usize,

    /// Pages actually fetched (less than `concurrency` for a final partial round)
    pub pages: usize,
    pub failures: usize,
    pub elapsed: Duration,
    pub throughput: f64,
    pub error_rate: f64,

    /// Effective change applied after the round
    pub adjustment: Adjustment,

    /// Concurrency level chosen for the following round
    pub next_concurrency: usize,
}

/// Concurrency flipped direction on every round for a whole window
///
/// Diagnostic only; the run continues unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceWarning {
    /// Round that completed the alternating window
    pub round_index: usize,
    pub window: usize,
    pub concurrency: usize,
}

/// Diagnostic record of an adaptive run
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveHistory {
    pub rounds: Vec<RoundThroughput>,
    pub warnings: Vec<DivergenceWarning>,
    pub termination: Termination,
    pub final_concurrency: usize,
}

impl AdaptiveHistory {
    /// Lowest and highest concurrency used by any round
    pub fn concurrency_range(&self) -> Option<(usize, usize)> {
        let min = self.rounds.iter().map(|r| r.concurrency).min()?;
        let max = self.rounds.iter().map(|r| r.concurrency).max()?;
        Some((min, max))
    }
}

/// Controller state owned by a single adaptive run
#[derive(Debug, Clone)]
pub struct AdaptiveState {
    current_concurrency: usize,
    max_concurrency: usize,
    tuning: TuningConfig,
    history: Vec<RoundThroughput>,
    warnings: Vec<DivergenceWarning>,
    last_adjustment: Adjustment,
    phase: AdaptivePhase,
    oscillation_reported: bool,
}

impl AdaptiveState {
    pub fn new(options: &AdaptiveOptions) -> Self {
        let max_concurrency = options.max_concurrency.max(1);
        Self {
            current_concurrency: options.initial_concurrency.clamp(1, max_concurrency),
            max_concurrency,
            tuning: options.tuning.clone(),
            history: Vec::new(),
            warnings: Vec::new(),
            last_adjustment: Adjustment::Hold,
            phase: AdaptivePhase::Initializing,
            oscillation_reported: false,
        }
    }

    pub fn current_concurrency(&self) -> usize {
        self.current_concurrency
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn phase(&self) -> AdaptivePhase {
        self.phase
    }

    pub fn last_adjustment(&self) -> Adjustment {
        self.last_adjustment
    }

    pub fn history(&self) -> &[RoundThroughput] {
        &self.history
    }

    pub fn warnings(&self) -> &[DivergenceWarning] {
        &self.warnings
    }

    pub fn begin_round(&mut self, round: usize) {
        self.phase = AdaptivePhase::Running { round };
    }

    /// Feeds one round's measurements to the controller
    ///
    /// Returns the effective adjustment, which is `Hold` when a requested
    /// change was absorbed by the `[1, max_concurrency]` bounds.
    pub fn record_round(
        &mut self,
        first_page: u32,
        last_page: u32,
        sample: RoundSample,
    ) -> Adjustment {
        let before = self.current_concurrency;
        let after = match self.decide(&sample) {
            Adjustment::Increase => before
                .saturating_add(self.tuning.step)
                .min(self.max_concurrency),
            Adjustment::Decrease => before.saturating_sub(self.tuning.step).max(1),
            Adjustment::Hold => before,
        };
        let adjustment = match after.cmp(&before) {
            std::cmp::Ordering::Greater => Adjustment::Increase,
            std::cmp::Ordering::Less => Adjustment::Decrease,
            std::cmp::Ordering::Equal => Adjustment::Hold,
        };

        self.current_concurrency = after;
        self.last_adjustment = adjustment;
        self.history.push(RoundThroughput {
            round_index: self.history.len(),
            first_page,
            last_page,
            concurrency: before,
            pages: sample.pages,
            failures: sample.failures,
            elapsed: sample.elapsed,
            throughput: sample.throughput(),
            error_rate: sample.error_rate(),
            adjustment,
            next_concurrency: after,
        });
        self.check_divergence();

        adjustment
    }

    fn decide(&self, sample: &RoundSample) -> Adjustment {
        if sample.error_rate() > self.tuning.error_tolerance {
            return Adjustment::Decrease;
        }

        let Some(previous) = self.history.last() else {
            return Adjustment::Increase;
        };

        let tolerance = self.tuning.throughput_tolerance;
        let throughput = sample.throughput();

        if throughput < previous.throughput * (1.0 - tolerance)
            && previous.adjustment != Adjustment::Decrease
        {
            Adjustment::Decrease
        } else if throughput > previous.throughput * (1.0 + tolerance) {
            Adjustment::Increase
        } else {
            Adjustment::Hold
        }
    }

    fn check_divergence(&mut self) {
        let window = self.tuning.divergence_window;
        if self.history.len() < window {
            return;
        }

        let recent = &self.history[self.history.len() - window..];
        let alternating = recent.iter().all(|r| r.adjustment != Adjustment::Hold)
            && recent
                .windows(2)
                .all(|pair| pair[0].adjustment != pair[1].adjustment);

        if !alternating {
            self.oscillation_reported = false;
            return;
        }
        if self.oscillation_reported {
            return;
        }
        self.oscillation_reported = true;

        if let Some(last) = recent.last() {
            tracing::warn!(
                "Concurrency oscillated for {} consecutive rounds (round {}, now {})",
                window,
                last.round_index,
                last.next_concurrency
            );
            self.warnings.push(DivergenceWarning {
                round_index: last.round_index,
                window,
                concurrency: last.next_concurrency,
            });
        }
    }

    /// Ends the run and hands over its history
    ///
    /// The phase becomes `Converged` or `Truncated` and stays there until
    /// [`AdaptiveState::close`] is called.
    pub fn finish(&mut self, termination: Termination) -> AdaptiveHistory {
        self.phase = match termination {
            Termination::Converged => AdaptivePhase::Converged,
            Termination::Truncated => AdaptivePhase::Truncated,
        };
        tracing::debug!(
            "Adaptive run {:?} after {} rounds at concurrency {}",
            self.phase,
            self.history.len(),
            self.current_concurrency
        );

        AdaptiveHistory {
            rounds: std::mem::take(&mut self.history),
            warnings: std::mem::take(&mut self.warnings),
            termination,
            final_concurrency: self.current_concurrency,
        }
    }

    /// Marks a finished run as done once its report has been built
    pub fn close(&mut self) {
        self.phase = AdaptivePhase::Done;
    }
}

/// Fetches pages `1..=total_pages` with a self-tuning round size
///
/// # Arguments
///
/// * `total_pages` - Number of pages to fetch
/// * `fetcher` - The single-page fetch primitive
/// * `adaptive` - Controller bounds and tuning constants
/// * `options` - Shared run options (parameters, deadline, baseline, observer)
///
/// # Returns
///
/// * `Ok(AggregateReport)` - Complete or deadline-truncated report with history
/// * `Err(ConfigError)` - Invalid arguments, rejected before any fetch
pub async fn run_adaptive<F: PageFetcher + ?Sized>(
    total_pages: u32,
    fetcher: &F,
    adaptive: &AdaptiveOptions,
    options: &RunOptions,
) -> Result<AggregateReport, ConfigError> {
    if total_pages == 0 {
        return Err(ConfigError::NoPages);
    }
    if adaptive.max_concurrency == 0 {
        return Err(ConfigError::Validation(
            "max_concurrency must be >= 1".to_string(),
        ));
    }
    validate_tuning(&adaptive.tuning)?;

    let span = tracing::info_span!(
        "adaptive_run",
        total_pages,
        max_concurrency = adaptive.max_concurrency
    );
    async move {
        let started = Instant::now();
        let deadline = options.deadline.map(|budget| started + budget);
        let executor = RoundExecutor::new(fetcher, options);

        let baseline = measure_baseline(&executor, options.baseline_pages, total_pages).await;

        let mut state = AdaptiveState::new(adaptive);
        let mut aggregator = ResultAggregator::new(total_pages);
        let mut next_page = 1u64;
        let mut round_index = 0;

        tracing::info!(
            "Starting adaptive run over {} pages at concurrency {}",
            total_pages,
            state.current_concurrency()
        );

        let termination = loop {
            if next_page > u64::from(total_pages) {
                break Termination::Converged;
            }
            if deadline_passed(deadline) {
                tracing::warn!(
                    "Deadline reached after {} of {} pages",
                    next_page - 1,
                    total_pages
                );
                break Termination::Truncated;
            }

            let size = u64::try_from(state.current_concurrency()).unwrap_or(u64::MAX);
            let first = next_page as u32;
            let last = next_page
                .saturating_add(size - 1)
                .min(u64::from(total_pages)) as u32;

            state.begin_round(round_index);
            let round = executor.execute(round_index, first..=last).await;

            let from = state.current_concurrency();
            let adjustment = state.record_round(first, last, RoundSample::from_round(&round));
            options
                .observer
                .concurrency_adjusted(round_index, from, state.current_concurrency(), adjustment);

            aggregator.absorb(round);
            next_page = u64::from(last) + 1;
            round_index += 1;
        };

        let history = state.finish(termination);
        let report = aggregator.into_report(
            termination == Termination::Truncated,
            baseline,
            Some(history),
        );
        state.close();

        tracing::info!(
            "Adaptive run finished: {}/{} pages, {} errors, {} rounds in {:?}",
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
