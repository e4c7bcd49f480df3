//! Diagnostics sink that writes estimator hooks as JSONL records.

use parking_lot::Mutex;
use serde_json::json;
use spike_te_core::{AdaptiveRadii, Diagnostics, SearchWindow};

use crate::structured_log::{LogEmitter, LogEntry, LogLevel};

/// Forwards [`Diagnostics`] hooks to a [`LogEmitter`].
///
/// Run-level hooks (`trial_extracted`, `indices_built`, `estimate_complete`)
/// are always written. Per-event hooks are written only when `per_event` is
/// set, since they produce several lines per destination spike.
///
/// Hooks cannot fail, so the first write error is held until [`finish`].
///
/// [`finish`]: LogDiagnostics::finish
#[derive(Debug)]
pub struct LogDiagnostics {
    emitter: Mutex<LogEmitter>,
    scenario: Option<String>,
    per_event: bool,
    first_error: Mutex<Option<std::io::Error>>,
}

impl LogDiagnostics {
    #[must_use]
    pub fn new(emitter: LogEmitter, per_event: bool) -> Self {
        Self {
            emitter: Mutex::new(emitter),
            scenario: None,
            per_event,
            first_error: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    /// Write an entry built by the caller through the shared emitter.
    pub fn log(&self, level: LogLevel, event: &str, decorate: impl FnOnce(LogEntry) -> LogEntry) {
        let mut emitter = self.emitter.lock();
        let mut entry = emitter.entry(level, event);
        if let Some(scenario) = &self.scenario {
            entry = entry.with_scenario(scenario);
        }
        if let Err(err) = emitter.emit_entry(decorate(entry)) {
            self.first_error.lock().get_or_insert(err);
        }
    }

    /// Flush the emitter and surface any write error seen by a hook.
    pub fn finish(&self) -> std::io::Result<()> {
        let flushed = self.emitter.lock().flush();
        match self.first_error.lock().take() {
            Some(err) => Err(err),
            None => flushed,
        }
    }

    fn log_event(&self, event: usize, name: &str, details: serde_json::Value) {
        if self.per_event {
            self.log(LogLevel::Trace, name, |e| {
                e.with_event_index(event).with_details(details)
            });
        }
    }
}

impl Diagnostics for LogDiagnostics {
    fn trial_extracted(&self, trial: usize, events: usize) {
        let level = if events == 0 {
            LogLevel::Warn
        } else {
            LogLevel::Debug
        };
        self.log(level, "trial_extracted", |e| {
            e.with_trial(trial).with_details(json!({ "events": events }))
        });
    }

    fn indices_built(&self, destination_events: usize, source_events: usize) {
        self.log(LogLevel::Info, "indices_built", |e| {
            e.with_details(json!({
                "destination_events": destination_events,
                "source_events": source_events,
            }))
        });
    }

    fn adaptive_radius(&self, event: usize, radii: &AdaptiveRadii) {
        self.log_event(
            event,
            "adaptive_radius",
            json!({ "source": radii.source, "dest": radii.dest, "time": radii.time }),
        );
    }

    fn history_matches(&self, event: usize, dest_greater: usize, source_greater: usize) {
        self.log_event(
            event,
            "history_matches",
            json!({ "dest_greater": dest_greater, "source_greater": source_greater }),
        );
    }

    fn search_window(&self, event: usize, window: &SearchWindow) {
        self.log_event(
            event,
            "search_window",
            json!({
                "case": window.case.as_str(),
                "ratio": window.search_area_ratio,
                "lower": window.r_time_lower,
                "upper": window.r_time_upper,
            }),
        );
    }

    fn destination_matches(&self, event: usize, matched: usize, and_greater: usize) {
        self.log_event(
            event,
            "destination_matches",
            json!({ "matched": matched, "and_greater": and_greater }),
        );
    }

    fn contribution(&self, event: usize, value: f64) {
        self.log_event(event, "contribution", json!({ "value": value }));
    }

    fn estimate_complete(&self, estimate: f64, total_time: f64, destination_events: usize) {
        self.log(LogLevel::Info, "estimate_complete", |e| {
            e.with_details(json!({
                "estimate": estimate,
                "total_time": total_time,
                "destination_events": destination_events,
            }))
        });
    }
}
