//! Scripted page fetcher
//!
//! `SimulatedFetcher` stands in for a real upstream: every page sleeps for a
//! configured latency and returns a fixed item count, selected pages fail, and
//! an optional capacity makes the fetcher reject calls once too many are in
//! flight at the same time. It also records how many calls were made and the
//! highest number of concurrent calls it observed.

use crate::fetch::{FetchError, PageFetcher, PageRequest};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct SimulatedFetcher {
    default_delay: Duration,
    page_delays: HashMap<u32, Duration>,
    failing_pages: HashSet<u32>,
    item_count: u64,
    capacity: Option<usize>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Decrements the in-flight counter when a call resolves or is dropped
struct InFlightGuard<'a>(&'a Counters);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SimulatedFetcher {
    /// Creates a fetcher where every page takes `delay` and holds 10 items
    pub fn new(delay: Duration) -> Self {
        Self {
            default_delay: delay,
            item_count: 10,
            ..Self::default()
        }
    }

    /// Overrides the latency of one page
    pub fn with_page_delay(mut self, page: u32, delay: Duration) -> Self {
        self.page_delays.insert(page, delay);
        self
    }

    /// Overrides the latency of every page from an iterator of `(page, delay)`
    pub fn with_page_delays(mut self, delays: impl IntoIterator<Item = (u32, Duration)>) -> Self {
        self.page_delays.extend(delays);
        self
    }

    /// Makes the given pages fail after their delay
    pub fn failing_pages(mut self, pages: impl IntoIterator<Item = u32>) -> Self {
        self.failing_pages.extend(pages);
        self
    }

    /// Sets the number of items every successful page reports
    pub fn with_item_count(mut self, item_count: u64) -> Self {
        self.item_count = item_count;
        self
    }

    /// Rejects calls with HTTP 429 once more than `capacity` are in flight
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Total number of fetch calls made so far
    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }

    fn delay_for(&self, page: u32) -> Duration {
        self.page_delays
            .get(&page)
            .copied()
            .unwrap_or(self.default_delay)
    }
}

#[async_trait]
impl PageFetcher for SimulatedFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<u64, FetchError> {
        let page = request.page_number;
        let counters = &self.counters;

        counters.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters
            .peak_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        let _guard = InFlightGuard(counters);

        tokio::time::sleep(self.delay_for(page)).await;

        if self.capacity.is_some_and(|capacity| in_flight > capacity) {
            return Err(FetchError::RateLimited { page });
        }

        if self.failing_pages.contains(&page) {
            return Err(FetchError::Other {
                page,
                message: "simulated failure".to_string(),
            });
        }

        Ok(self.item_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn request(page_number: u32) -> PageRequest {
        PageRequest {
            page_number,
            params: Arc::new(BTreeMap::new()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_fetch_success_and_failure() {
        let fetcher = SimulatedFetcher::new(Duration::from_millis(50))
            .with_item_count(7)
            .failing_pages([2]);

        assert_eq!(fetcher.fetch(&request(1)).await.unwrap(), 7);
        assert!(matches!(
            fetcher.fetch(&request(2)).await,
            Err(FetchError::Other { page: 2, .. })
        ));
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(fetcher.peak_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_delay_override() {
        let fetcher = SimulatedFetcher::new(Duration::from_millis(10))
            .with_page_delay(3, Duration::from_millis(200));

        let start = tokio::time::Instant::now();
        fetcher.fetch(&request(3)).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(210));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_rejects_excess_calls() {
        let fetcher = SimulatedFetcher::new(Duration::from_millis(10)).with_capacity(2);
        let requests: Vec<_> = (1..=4).map(request).collect();

        let results =
            futures::future::join_all(requests.iter().map(|r| fetcher.fetch(r))).await;

        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(FetchError::RateLimited { .. })))
            .count();
        assert_eq!(rejected, 2);
        assert_eq!(fetcher.peak_in_flight(), 4);
    }
}
