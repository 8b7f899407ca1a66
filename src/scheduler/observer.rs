//! Per-run progress observers
//!
//! Each run receives its observer through `RunOptions`, so concurrent runs
//! report independently and no logging state is shared between them.

use crate::scheduler::adaptive::Adjustment;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Summary of a completed round, as seen by observers
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub index: usize,
    pub first_page: u32,
    pub last_page: u32,
    pub elapsed: Duration,
    pub failures: usize,
}

impl RoundSummary {
    /// Number of pages fetched concurrently in the round
    pub fn pages(&self) -> usize {
        (self.last_page - self.first_page) as usize + 1
    }
}

/// Receives progress callbacks from a scheduler run
///
/// All methods default to no-ops.
pub trait RoundObserver: Send + Sync {
    /// Called before the fetches of a round are issued
    fn round_started(&self, _index: usize, _pages: &RangeInclusive<u32>) {}

    /// Called once the round barrier has released
    fn round_finished(&self, _summary: &RoundSummary) {}

    /// Called after an adaptive run decides the next round's concurrency
    fn concurrency_adjusted(&self, _round: usize, _from: usize, _to: usize, _why: Adjustment) {}
}

/// Observer that forwards progress to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RoundObserver for TracingObserver {
    fn round_started(&self, index: usize, pages: &RangeInclusive<u32>) {
        tracing::trace!(
            "Round {} starting: pages {}..={}",
            index,
            pages.start(),
            pages.end()
        );
    }

    fn round_finished(&self, summary: &RoundSummary) {
        tracing::debug!(
            "Round {} finished: {} pages ({}..={}) in {:?}, {} failed",
            summary.index,
            summary.pages(),
            summary.first_page,
            summary.last_page,
            summary.elapsed,
            summary.failures
        );
    }

    fn concurrency_adjusted(&self, round: usize, from: usize, to: usize, why: Adjustment) {
        if from != to {
            tracing::debug!(
                "Round {}: concurrency {} -> {} ({:?})",
                round,
                from,
                to,
                why
            );
        }
    }
}
