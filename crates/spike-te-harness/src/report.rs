//! Estimate runs over synthetic scenarios and their JSON reports.
//!
//! Reports carry no timestamps or durations, so the same run parameters
//! always serialise to the same bytes.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use spike_te_core::{
    EstimatorConfig, EstimatorMetrics, FanoutDiagnostics, MetricsSnapshot, NextSpiker,
    SpikingTransferEntropy, TransferEntropyCalculator,
};

use crate::error::{HarnessError, Result};
use crate::log_diagnostics::LogDiagnostics;
use crate::scenario::{Scenario, spike_data_digest};
use crate::structured_log::{LogLevel, Outcome};

const REPORT_VERSION: &str = "v1";

/// Parameters of one estimate run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateRun {
    pub scenario: Scenario,
    pub seed: u64,
    pub trials: usize,
    pub spikes: usize,
    pub config: EstimatorConfig,
}

impl EstimateRun {
    fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(HarnessError::InvalidArgument(
                "trials must be at least 1".to_string(),
            ));
        }
        if self.spikes == 0 {
            return Err(HarnessError::InvalidArgument(
                "spikes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one estimate run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateReport {
    pub version: String,
    pub scenario: Scenario,
    pub seed: u64,
    pub trials: usize,
    pub spikes_per_trial: usize,
    pub dest_history: usize,
    pub source_history: usize,
    pub knns: usize,
    pub trim_to_positive_times: bool,
    pub events_per_trial: Vec<usize>,
    pub destination_events: usize,
    /// Transfer entropy in nats per unit time.
    pub estimate: f64,
    pub metrics: MetricsSnapshot,
    pub spike_data_sha256: String,
}

impl EstimateReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()? + "\n")?;
        Ok(())
    }
}

/// Generate the run's spike data, estimate, and report.
///
/// When `log` is given it receives every estimator hook plus `run_start`
/// and `run_complete` entries.
pub fn run_estimate(run: &EstimateRun, log: Option<&Arc<LogDiagnostics>>) -> Result<EstimateReport> {
    run.validate()?;
    let started = Instant::now();
    if let Some(log) = log {
        log.log(LogLevel::Info, "run_start", |e| {
            e.with_details(serde_json::json!({
                "seed": run.seed,
                "trials": run.trials,
                "spikes": run.spikes,
            }))
        });
    }

    let data = run.scenario.generate(run.seed, run.trials, run.spikes);
    let digest = spike_data_digest(&data);

    let metrics = Arc::new(EstimatorMetrics::new());
    let mut sinks = FanoutDiagnostics::new().with(metrics.clone());
    if let Some(log) = log {
        sinks = sinks.with(log.clone());
    }

    let mut calc = TransferEntropyCalculator::with_config(run.config);
    calc.set_diagnostics(Arc::new(sinks));
    let result = estimate_trials(&mut calc, &data);

    if let Some(log) = log {
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (level, outcome) = match &result {
            Ok(_) => (LogLevel::Info, Outcome::Pass),
            Err(_) => (LogLevel::Error, Outcome::Error),
        };
        let error = result.as_ref().err().map(ToString::to_string);
        log.log(level, "run_complete", |e| {
            let e = e.with_outcome(outcome).with_duration_ms(elapsed);
            match error {
                Some(message) => e.with_details(serde_json::json!({ "error": message })),
                None => e,
            }
        });
    }
    let estimate = result?;

    let (events_per_trial, destination_events) = calc
        .store()
        .map(|store| {
            (
                store.events_per_trial().to_vec(),
                store.partition(NextSpiker::Destination).len(),
            )
        })
        .unwrap_or_default();

    Ok(EstimateReport {
        version: REPORT_VERSION.to_string(),
        scenario: run.scenario,
        seed: run.seed,
        trials: run.trials,
        spikes_per_trial: run.spikes,
        dest_history: run.config.dest_history(),
        source_history: run.config.source_history(),
        knns: run.config.knns(),
        trim_to_positive_times: run.config.trim_to_positive_times(),
        events_per_trial,
        destination_events,
        estimate,
        metrics: metrics.snapshot(),
        spike_data_sha256: digest,
    })
}

fn estimate_trials(
    calc: &mut TransferEntropyCalculator,
    data: &[(Vec<f64>, Vec<f64>)],
) -> spike_te_core::Result<f64> {
    calc.start_add_observations()?;
    for (source, dest) in data {
        calc.add_observations(source, dest)?;
    }
    calc.finalise_add_observations()?;
    calc.compute_average_local_of_observations()
}

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

/// Summary of repeated runs of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub scenario: Scenario,
    pub seeds: Vec<u64>,
    pub estimates: Vec<f64>,
    pub mean: f64,
    /// Sample standard deviation; 0 for a single run.
    pub std_dev: f64,
}

impl ScenarioSummary {
    fn from_estimates(scenario: Scenario, seeds: Vec<u64>, estimates: Vec<f64>) -> Self {
        let n = estimates.len() as f64;
        let mean = if estimates.is_empty() {
            0.0
        } else {
            estimates.iter().sum::<f64>() / n
        };
        let std_dev = if estimates.len() < 2 {
            0.0
        } else {
            let ss: f64 = estimates.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        };
        Self {
            scenario,
            seeds,
            estimates,
            mean,
            std_dev,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub version: String,
    pub trials: usize,
    pub spikes_per_trial: usize,
    pub dest_history: usize,
    pub source_history: usize,
    pub knns: usize,
    pub trim_to_positive_times: bool,
    pub scenarios: Vec<ScenarioSummary>,
}

impl SweepReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn summary(&self, scenario: Scenario) -> Option<&ScenarioSummary> {
        self.scenarios.iter().find(|s| s.scenario == scenario)
    }
}

/// Run every scenario over seeds `base.seed .. base.seed + repeats`.
///
/// `base.scenario` is ignored.
pub fn run_sweep(
    base: &EstimateRun,
    repeats: usize,
    log: Option<&Arc<LogDiagnostics>>,
) -> Result<SweepReport> {
    if repeats == 0 {
        return Err(HarnessError::InvalidArgument(
            "repeats must be at least 1".to_string(),
        ));
    }
    let mut scenarios = Vec::with_capacity(Scenario::ALL.len());
    for scenario in Scenario::ALL {
        let mut seeds = Vec::with_capacity(repeats);
        let mut estimates = Vec::with_capacity(repeats);
        for r in 0..repeats as u64 {
            let run = EstimateRun {
                scenario,
                seed: base.seed.wrapping_add(r),
                ..*base
            };
            let report = run_estimate(&run, log)?;
            seeds.push(run.seed);
            estimates.push(report.estimate);
        }
        scenarios.push(ScenarioSummary::from_estimates(scenario, seeds, estimates));
    }
    Ok(SweepReport {
        version: REPORT_VERSION.to_string(),
        trials: base.trials,
        spikes_per_trial: base.spikes,
        dest_history: base.config.dest_history(),
        source_history: base.config.source_history(),
        knns: base.config.knns(),
        trim_to_positive_times: base.config.trim_to_positive_times(),
        scenarios,
    })
}
