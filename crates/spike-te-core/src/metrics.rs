//! Atomic counters for estimator observability.
//!
//! All counters use relaxed ordering; they are diagnostic only.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::boundary::{AdaptiveRadii, SearchWindow};
use crate::diagnostics::Diagnostics;

/// Pipeline counters. Install as a diagnostics sink to have them filled in.
#[derive(Debug)]
pub struct EstimatorMetrics {
    /// Trials passed through the event extractor.
    pub trials: AtomicU64,
    /// Events extracted across all trials.
    pub events: AtomicU64,
    /// Trials that produced no events.
    pub empty_trials: AtomicU64,
    /// k-nearest-neighbour queries issued.
    pub knn_queries: AtomicU64,
    /// Range and window counting queries issued.
    pub range_queries: AtomicU64,
    /// Destination events whose joint-space probability was rescaled.
    pub boundary_corrections: AtomicU64,
    /// Completed estimates.
    pub estimates: AtomicU64,
}

impl EstimatorMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trials: AtomicU64::new(0),
            events: AtomicU64::new(0),
            empty_trials: AtomicU64::new(0),
            knn_queries: AtomicU64::new(0),
            range_queries: AtomicU64::new(0),
            boundary_corrections: AtomicU64::new(0),
            estimates: AtomicU64::new(0),
        }
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            trials: Self::get(&self.trials),
            events: Self::get(&self.events),
            empty_trials: Self::get(&self.empty_trials),
            knn_queries: Self::get(&self.knn_queries),
            range_queries: Self::get(&self.range_queries),
            boundary_corrections: Self::get(&self.boundary_corrections),
            estimates: Self::get(&self.estimates),
        }
    }
}

impl Default for EstimatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics for EstimatorMetrics {
    fn trial_extracted(&self, _trial: usize, events: usize) {
        Self::inc(&self.trials);
        Self::add(&self.events, events as u64);
        if events == 0 {
            Self::inc(&self.empty_trials);
        }
    }

    fn adaptive_radius(&self, _event: usize, _radii: &AdaptiveRadii) {
        Self::inc(&self.knn_queries);
    }

    fn history_matches(&self, _event: usize, _dest_greater: usize, _source_greater: usize) {
        Self::add(&self.range_queries, 2);
    }

    fn search_window(&self, _event: usize, window: &SearchWindow) {
        if window.is_corrected() {
            Self::inc(&self.boundary_corrections);
        }
    }

    fn destination_matches(&self, _event: usize, _matched: usize, _and_greater: usize) {
        Self::inc(&self.range_queries);
    }

    fn estimate_complete(&self, _estimate: f64, _total_time: f64, _destination_events: usize) {
        Self::inc(&self.estimates);
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub trials: u64,
    pub events: u64,
    pub empty_trials: u64,
    pub knn_queries: u64,
    pub range_queries: u64,
    pub boundary_corrections: u64,
    pub estimates: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = EstimatorMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn hooks_drive_counters() {
        let m = EstimatorMetrics::new();
        m.trial_extracted(0, 5);
        m.trial_extracted(1, 0);
        m.adaptive_radius(0, &AdaptiveRadii::default());
        m.history_matches(0, 1, 2);
        m.search_window(0, &SearchWindow::untrimmed(0.5));
        m.destination_matches(0, 4, 6);
        let snap = m.snapshot();
        assert_eq!(snap.trials, 2);
        assert_eq!(snap.events, 5);
        assert_eq!(snap.empty_trials, 1);
        assert_eq!(snap.knn_queries, 1);
        assert_eq!(snap.range_queries, 3);
        assert_eq!(snap.boundary_corrections, 0);
    }

    #[test]
    fn snapshot_serialises() {
        let json = serde_json::to_string(&MetricsSnapshot::default()).unwrap();
        assert!(json.contains("\"knn_queries\":0"));
    }
}
