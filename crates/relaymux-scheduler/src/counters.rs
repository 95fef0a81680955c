//! Per-pipeline execution counters (spec.md §4.6 "Pipeline counters")

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use relaymux_core::now_unix_secs;

/// Rolling state the scheduler keeps per pipeline, independent of the
/// `Pipeline` object itself — a pipeline can be torn down and rebuilt while
/// its counters are retained for the lifetime of the scheduler process.
pub struct PipelineCounters {
    error_count: AtomicU32,
    last_error_time: AtomicU64,
    total_requests: AtomicU64,
    in_flight: AtomicU32,
    last_response_time_ms: AtomicU64,
    response_time_history: Mutex<std::collections::VecDeque<u64>>,
    window: usize,
}

impl PipelineCounters {
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            error_count: AtomicU32::new(0),
            last_error_time: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            in_flight: AtomicU32::new(0),
            last_response_time_ms: AtomicU64::new(0),
            response_time_history: Mutex::new(std::collections::VecDeque::with_capacity(window)),
            window,
        }
    }

    /// Consecutive-error count since the last success
    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Acquire)
    }

    pub fn last_error_time(&self) -> u64 {
        self.last_error_time.load(Ordering::Acquire)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Acquire)
    }

    /// Requests currently in flight against this pipeline, for the
    /// least-connections algorithm
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn last_response_time_ms(&self) -> u64 {
        self.last_response_time_ms.load(Ordering::Acquire)
    }

    /// Mean response time over the trailing window, 0 if no samples yet
    pub fn windowed_mean_response_time_ms(&self) -> f64 {
        let history = self.response_time_history.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if history.is_empty() {
            return 0.0;
        }
        let sum: u64 = history.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum as f64 / history.len() as f64;
        mean
    }

    /// Called when a request is dispatched to this pipeline
    pub fn begin_request(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.total_requests.fetch_add(1, Ordering::AcqRel);
    }

    /// Called when a pipeline execution completes, success or failure
    pub fn record_result(&self, response_time_ms: u64, succeeded: bool) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.last_response_time_ms.store(response_time_ms, Ordering::Release);

        let mut history = self.response_time_history.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if history.len() == self.window {
            history.pop_front();
        }
        history.push_back(response_time_ms);
        drop(history);

        if succeeded {
            self.error_count.store(0, Ordering::Release);
        } else {
            self.error_count.fetch_add(1, Ordering::AcqRel);
            self.last_error_time.store(now_unix_secs(), Ordering::Release);
        }
    }

    /// Approximate recent error rate, used by the weighted algorithm
    /// (spec.md §4.6 weighted formula): errors over total requests seen,
    /// capped so a handful of early failures does not saturate the weight.
    pub fn error_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = f64::from(self.error_count()) / total as f64;
        rate.min(1.0)
    }

    /// A point-in-time, lock-free copy of the stats a selection algorithm
    /// needs. Taken up front so algorithms never hold a `DashMap` guard (or
    /// this struct's internal mutex) while comparing candidates.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            in_flight: self.in_flight(),
            last_response_time_ms: self.last_response_time_ms(),
            windowed_mean_response_time_ms: self.windowed_mean_response_time_ms(),
            error_rate: self.error_rate(),
        }
    }
}

/// Owned snapshot of a pipeline's counters, passed into selection
/// algorithms instead of a live reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterSnapshot {
    pub in_flight: u32,
    pub last_response_time_ms: u64,
    pub windowed_mean_response_time_ms: f64,
    pub error_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_error_count() {
        let counters = PipelineCounters::new(4);
        counters.begin_request();
        counters.record_result(10, false);
        counters.begin_request();
        counters.record_result(10, false);
        assert_eq!(counters.error_count(), 2);

        counters.begin_request();
        counters.record_result(10, true);
        assert_eq!(counters.error_count(), 0);
    }

    #[test]
    fn response_time_window_is_capped() {
        let counters = PipelineCounters::new(3);
        for ms in [10, 20, 30, 40] {
            counters.begin_request();
            counters.record_result(ms, true);
        }
        let history = counters.response_time_history.lock().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(*history.front().unwrap(), 20);
    }

    #[test]
    fn in_flight_tracks_concurrent_requests() {
        let counters = PipelineCounters::new(4);
        counters.begin_request();
        counters.begin_request();
        assert_eq!(counters.in_flight(), 2);
        counters.record_result(5, true);
        assert_eq!(counters.in_flight(), 1);
    }
}
