//! Diagnostics hooks for the estimator pipeline.
//!
//! The calculator reports each major decision to a [`Diagnostics`] sink.
//! Every hook has an empty default body, so a sink implements only what it
//! cares about. Sinks must be `Send + Sync`; the caller may keep a shared
//! handle and inspect it after the computation.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::boundary::{AdaptiveRadii, SearchWindow};

/// Receiver for estimator decision points.
///
/// `event` arguments are indices into the destination-next partition.
pub trait Diagnostics: Send + Sync {
    /// A trial was embedded into `events` events.
    fn trial_extracted(&self, _trial: usize, _events: usize) {}

    /// Search structures were built over the two partitions.
    fn indices_built(&self, _destination_events: usize, _source_events: usize) {}

    /// Radii taken from the `Knns` nearest joint-space neighbours.
    fn adaptive_radius(&self, _event: usize, _radii: &AdaptiveRadii) {}

    /// Counts of history matches whose next spike is later.
    fn history_matches(&self, _event: usize, _dest_greater: usize, _source_greater: usize) {}

    /// Time window after boundary correction.
    fn search_window(&self, _event: usize, _window: &SearchWindow) {}

    /// Destination-history matches inside and at-or-after the time window.
    fn destination_matches(&self, _event: usize, _matched: usize, _and_greater: usize) {}

    /// Log-probability difference added by one destination event.
    fn contribution(&self, _event: usize, _value: f64) {}

    /// Final estimate over the total elapsed time.
    fn estimate_complete(&self, _estimate: f64, _total_time: f64, _destination_events: usize) {}
}

/// Sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {}

/// One buffered diagnostics record.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticRecord {
    TrialExtracted {
        trial: usize,
        events: usize,
    },
    IndicesBuilt {
        destination_events: usize,
        source_events: usize,
    },
    AdaptiveRadius {
        event: usize,
        radii: AdaptiveRadii,
    },
    HistoryMatches {
        event: usize,
        dest_greater: usize,
        source_greater: usize,
    },
    SearchWindow {
        event: usize,
        window: SearchWindow,
    },
    DestinationMatches {
        event: usize,
        matched: usize,
        and_greater: usize,
    },
    Contribution {
        event: usize,
        value: f64,
    },
    EstimateComplete {
        estimate: f64,
        total_time: f64,
        destination_events: usize,
    },
}

/// Buffers every record in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl RecordingDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().clone()
    }

    /// Drain the buffer.
    pub fn take(&self) -> Vec<DiagnosticRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Per-event contributions in the order they were reported.
    #[must_use]
    pub fn contributions(&self) -> Vec<(usize, f64)> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match *r {
                DiagnosticRecord::Contribution { event, value } => Some((event, value)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, record: DiagnosticRecord) {
        self.records.lock().push(record);
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn trial_extracted(&self, trial: usize, events: usize) {
        self.push(DiagnosticRecord::TrialExtracted { trial, events });
    }

    fn indices_built(&self, destination_events: usize, source_events: usize) {
        self.push(DiagnosticRecord::IndicesBuilt {
            destination_events,
            source_events,
        });
    }

    fn adaptive_radius(&self, event: usize, radii: &AdaptiveRadii) {
        self.push(DiagnosticRecord::AdaptiveRadius {
            event,
            radii: *radii,
        });
    }

    fn history_matches(&self, event: usize, dest_greater: usize, source_greater: usize) {
        self.push(DiagnosticRecord::HistoryMatches {
            event,
            dest_greater,
            source_greater,
        });
    }

    fn search_window(&self, event: usize, window: &SearchWindow) {
        self.push(DiagnosticRecord::SearchWindow {
            event,
            window: *window,
        });
    }

    fn destination_matches(&self, event: usize, matched: usize, and_greater: usize) {
        self.push(DiagnosticRecord::DestinationMatches {
            event,
            matched,
            and_greater,
        });
    }

    fn contribution(&self, event: usize, value: f64) {
        self.push(DiagnosticRecord::Contribution { event, value });
    }

    fn estimate_complete(&self, estimate: f64, total_time: f64, destination_events: usize) {
        self.push(DiagnosticRecord::EstimateComplete {
            estimate,
            total_time,
            destination_events,
        });
    }
}

/// Forwards every hook to each inner sink, in order.
#[derive(Default, Clone)]
pub struct FanoutDiagnostics {
    sinks: Vec<Arc<dyn Diagnostics>>,
}

impl std::fmt::Debug for FanoutDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutDiagnostics")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl FanoutDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn Diagnostics>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Diagnostics for FanoutDiagnostics {
    fn trial_extracted(&self, trial: usize, events: usize) {
        self.sinks.iter().for_each(|s| s.trial_extracted(trial, events));
    }

    fn indices_built(&self, destination_events: usize, source_events: usize) {
        self.sinks
            .iter()
            .for_each(|s| s.indices_built(destination_events, source_events));
    }

    fn adaptive_radius(&self, event: usize, radii: &AdaptiveRadii) {
        self.sinks.iter().for_each(|s| s.adaptive_radius(event, radii));
    }

    fn history_matches(&self, event: usize, dest_greater: usize, source_greater: usize) {
        self.sinks
            .iter()
            .for_each(|s| s.history_matches(event, dest_greater, source_greater));
    }

    fn search_window(&self, event: usize, window: &SearchWindow) {
        self.sinks.iter().for_each(|s| s.search_window(event, window));
    }

    fn destination_matches(&self, event: usize, matched: usize, and_greater: usize) {
        self.sinks
            .iter()
            .for_each(|s| s.destination_matches(event, matched, and_greater));
    }

    fn contribution(&self, event: usize, value: f64) {
        self.sinks.iter().for_each(|s| s.contribution(event, value));
    }

    fn estimate_complete(&self, estimate: f64, total_time: f64, destination_events: usize) {
        self.sinks
            .iter()
            .for_each(|s| s.estimate_complete(estimate, total_time, destination_events));
    }
}
