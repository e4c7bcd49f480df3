//! Calculator lifecycle and the nearest-neighbour counting estimator.
//!
//! Lifecycle: `Empty -> Collecting -> Finalised`. Configuration can only
//! change while `Empty`; observations are embedded and indexed once, on
//! [`finalise_add_observations`](SpikingTransferEntropy::finalise_add_observations).
//!
//! For each destination-next event the estimate compares two bias-corrected
//! log probabilities of the next destination spike arriving when it did:
//! one conditioned on both histories, one on the destination history alone.
//! The sum of the differences is divided by the total observed time.

use std::sync::Arc;

use crate::boundary::{self, AdaptiveRadii, SearchWindow};
use crate::config::{EstimatorConfig, EstimatorOption, OptionKey};
use crate::diagnostics::{Diagnostics, NoDiagnostics};
use crate::error::{Result, TeError};
use crate::events::EventExtractor;
use crate::index::{DestHistoryIndex, IndexSet};
use crate::special::digamma_count;
use crate::store::{EmbeddedEvent, EmbeddingStore, EventLocator, NextSpiker};

/// Operations of a spiking transfer-entropy calculator.
pub trait SpikingTransferEntropy {
    /// Discard observations and indices and return to `Empty`.
    fn initialise(&mut self) -> Result<()>;

    /// Set the destination history length `k`, then [`initialise`](Self::initialise).
    fn initialise_with_history(&mut self, k: usize) -> Result<()>;

    /// Set both history lengths, then [`initialise`](Self::initialise).
    fn initialise_with_histories(&mut self, k: usize, l: usize) -> Result<()>;

    /// Change one option. Only allowed while `Empty`.
    fn set_option(&mut self, option: EstimatorOption) -> Result<()>;

    fn option(&self, key: OptionKey) -> EstimatorOption;

    /// Single-trial shortcut for start, add and finalise.
    fn set_observations(&mut self, source: &[f64], dest: &[f64]) -> Result<()> {
        self.start_add_observations()?;
        self.add_observations(source, dest)?;
        self.finalise_add_observations()
    }

    fn start_add_observations(&mut self) -> Result<()>;

    /// Queue one trial. Spike times need not be sorted.
    fn add_observations(&mut self, source: &[f64], dest: &[f64]) -> Result<()>;

    /// Embed every queued trial and build the search structures.
    fn finalise_add_observations(&mut self) -> Result<()>;

    fn added_more_than_one_observation_set(&self) -> bool;

    /// Transfer entropy in nats per unit time.
    fn compute_average_local_of_observations(&mut self) -> Result<f64>;

    fn last_average(&self) -> Option<f64>;

    /// Per-event local values, one per destination-next event.
    fn compute_local_of_previous_observations(&self) -> Result<SpikingLocalValues>;

    /// Null distribution from `permutations` random source reorderings.
    fn compute_significance(&self, permutations: usize) -> Result<EmpiricalNullDistribution>;

    /// Null distribution from caller-supplied source reorderings.
    fn compute_significance_with_orderings(
        &self,
        orderings: &[Vec<usize>],
    ) -> Result<EmpiricalNullDistribution>;

    fn set_diagnostics(&mut self, sink: Arc<dyn Diagnostics>);
}

/// Local transfer-entropy values, one per destination-next event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpikingLocalValues {
    pub values: Vec<f64>,
}

/// Surrogate estimates under the null hypothesis of no source influence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmpiricalNullDistribution {
    pub actual_value: f64,
    pub surrogates: Vec<f64>,
}

impl EmpiricalNullDistribution {
    /// Fraction of surrogates at least as large as the actual value.
    #[must_use]
    pub fn p_value(&self) -> f64 {
        if self.surrogates.is_empty() {
            return 1.0;
        }
        let hits = self
            .surrogates
            .iter()
            .filter(|&&s| s >= self.actual_value)
            .count();
        hits as f64 / self.surrogates.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Empty,
    Collecting,
    Finalised,
}

#[derive(Debug, Clone)]
struct Trial {
    source: Vec<f64>,
    dest: Vec<f64>,
}

#[derive(Debug)]
struct Finalised {
    store: EmbeddingStore,
    index: IndexSet,
    trials: usize,
}

#[derive(Debug)]
enum State {
    Empty,
    Collecting(Vec<Trial>),
    Finalised(Box<Finalised>),
}

/// Transfer entropy calculator for spike trains.
pub struct TransferEntropyCalculator {
    config: EstimatorConfig,
    state: State,
    last_average: Option<f64>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl std::fmt::Debug for TransferEntropyCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEntropyCalculator")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("last_average", &self.last_average)
            .finish_non_exhaustive()
    }
}

impl Default for TransferEntropyCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferEntropyCalculator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EstimatorConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EstimatorConfig) -> Self {
        Self {
            config,
            state: State::Empty,
            last_average: None,
            diagnostics: Arc::new(NoDiagnostics),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        match self.state {
            State::Empty => LifecycleState::Empty,
            State::Collecting(_) => LifecycleState::Collecting,
            State::Finalised(_) => LifecycleState::Finalised,
        }
    }

    /// Embedded events, available once finalised.
    #[must_use]
    pub fn store(&self) -> Option<&EmbeddingStore> {
        match &self.state {
            State::Finalised(f) => Some(&f.store),
            _ => None,
        }
    }

    fn reconfigure(&mut self, config: EstimatorConfig) -> Result<()> {
        self.config = config;
        self.initialise()
    }

    fn finalised(&self) -> Result<&Finalised> {
        match &self.state {
            State::Finalised(f) => Ok(f),
            _ => Err(TeError::NotFinalised),
        }
    }

    fn estimate(&self, finalised: &Finalised) -> Result<f64> {
        let store = &finalised.store;
        if store.is_empty() {
            return Err(TeError::NoEvents);
        }
        let destination_events = store.partition(NextSpiker::Destination).len();
        let knns = self.config.knns();
        if destination_events < knns + 1 {
            return Err(TeError::InsufficientNeighbours {
                requested: knns,
                available: destination_events.saturating_sub(1),
            });
        }

        let mut total_time = 0.0;
        let mut contributions = 0.0;
        for (locator, event) in store.timeline() {
            total_time += event.elapsed_time();
            if let EventLocator::Destination(idx) = locator {
                let value = self.local_value(store, &finalised.index, idx, event)?;
                self.diagnostics.contribution(idx, value);
                contributions += value;
            }
        }
        if total_time <= 0.0 {
            return Err(TeError::NoEvents);
        }
        let estimate = contributions / total_time;
        self.diagnostics
            .estimate_complete(estimate, total_time, destination_events);
        Ok(estimate)
    }

    /// Log-probability difference for destination-next event `idx`.
    fn local_value(
        &self,
        store: &EmbeddingStore,
        index: &IndexSet,
        idx: usize,
        event: &EmbeddedEvent,
    ) -> Result<f64> {
        let knns = self.config.knns();
        let t = event.time_to_next;

        let radii = adaptive_radii(index, knns, idx)?;
        self.diagnostics.adaptive_radius(idx, &radii);

        let history_radii = [radii.source, radii.dest];
        let destination_next = store.partition(NextSpiker::Destination);
        let dest_greater = index
            .destination_next
            .histories
            .points_within_radii(idx, &history_radii, true)?
            .into_iter()
            .filter(|&j| destination_next[j].time_to_next - t >= radii.time)
            .count();
        let source_next = store.partition(NextSpiker::Source);
        let source_greater = index
            .source_next
            .histories
            .points_within_radii_of(&[&event.source_history, &event.dest_history], &history_radii)?
            .into_iter()
            .filter(|&j| source_next[j].time_to_next - t >= -radii.time)
            .count();
        self.diagnostics
            .history_matches(idx, dest_greater, source_greater);

        let window = boundary::search_window(
            idx,
            t,
            event.source_offset(),
            &radii,
            self.config.trim_to_positive_times(),
        )?;
        self.diagnostics.search_window(idx, &window);

        let (matched, and_greater) = dest_history_counts(store, index, idx, &radii, &window)?;
        self.diagnostics
            .destination_matches(idx, matched, and_greater);
        if matched < knns {
            return Err(TeError::AdaptiveRadiusViolated {
                event: idx,
                matched,
                knns,
            });
        }

        let k = knns as f64;
        let joint_count = knns + source_greater + dest_greater;
        let (mut log_p_joint, log_p_dest) = if self.config.dest_history() > 1 {
            (
                digamma_count(knns) - 2.0 / k - digamma_count(joint_count)
                    + 1.0 / joint_count as f64,
                digamma_count(matched) - 1.0 / matched as f64 - digamma_count(and_greater),
            )
        } else {
            (
                digamma_count(knns) - 1.0 / k - digamma_count(joint_count),
                digamma_count(matched) - digamma_count(and_greater),
            )
        };
        if self.config.trim_to_positive_times() {
            log_p_joint -= window.search_area_ratio.ln();
        }
        Ok(log_p_joint - log_p_dest)
    }
}

/// Per-group maxima over the `knns` nearest joint-space neighbours.
fn adaptive_radii(index: &IndexSet, knns: usize, idx: usize) -> Result<AdaptiveRadii> {
    let neighbours = index.destination_next.joint.k_nearest(knns, idx)?;
    Ok(neighbours
        .iter()
        .fold(AdaptiveRadii::default(), |r, n| AdaptiveRadii {
            source: r.source.max(n.norms[0]),
            dest: r.dest.max(n.norms[1]),
            time: r.time.max(n.norms[2]),
        }))
}

/// Destination-history matches inside the time window and at or after its
/// lower edge.
fn dest_history_counts(
    store: &EmbeddingStore,
    index: &IndexSet,
    idx: usize,
    radii: &AdaptiveRadii,
    window: &SearchWindow,
) -> Result<(usize, usize)> {
    match &index.dest_history {
        DestHistoryIndex::Univariate(searcher) => Ok((
            searcher.count_within(idx, window.r_time_lower, window.r_time_upper, true),
            searcher.count_at_least(idx, window.r_time_lower, true),
        )),
        DestHistoryIndex::Tree(tree) => {
            let samples = store.destination_samples();
            let t = samples[idx].time_to_next;
            let symmetric = window.is_symmetric();
            let mut in_window = 0;
            let mut and_greater = 0;
            for j in tree.points_within_radii(idx, &[radii.dest], true)? {
                let diff = samples[j].time_to_next - t;
                if diff >= -window.r_time_lower {
                    and_greater += 1;
                    if !symmetric && diff <= window.r_time_upper {
                        in_window += 1;
                    }
                }
            }
            // a symmetric window is a plain radius in the joint space
            let matched = if symmetric {
                index
                    .dest_joint
                    .points_within_radii(idx, &[radii.dest, window.r_time_upper], true)?
                    .len()
            } else {
                in_window
            };
            Ok((matched, and_greater))
        }
    }
}

impl SpikingTransferEntropy for TransferEntropyCalculator {
    fn initialise(&mut self) -> Result<()> {
        self.state = State::Empty;
        self.last_average = None;
        Ok(())
    }

    fn initialise_with_history(&mut self, k: usize) -> Result<()> {
        let config = self.config.with_option(EstimatorOption::DestHistory(k))?;
        self.reconfigure(config)
    }

    fn initialise_with_histories(&mut self, k: usize, l: usize) -> Result<()> {
        if k < 1 || l < 1 {
            return Err(TeError::UnsupportedEmbeddingDepth { k, l });
        }
        let config = EstimatorConfig::builder()
            .dest_history(k)
            .source_history(l)
            .knns(self.config.knns())
            .trim_to_positive_times(self.config.trim_to_positive_times())
            .build()?;
        self.reconfigure(config)
    }

    fn set_option(&mut self, option: EstimatorOption) -> Result<()> {
        if !matches!(self.state, State::Empty) {
            return Err(TeError::ConfigurationLocked);
        }
        self.config = self.config.with_option(option)?;
        Ok(())
    }

    fn option(&self, key: OptionKey) -> EstimatorOption {
        self.config.option(key)
    }

    fn start_add_observations(&mut self) -> Result<()> {
        self.state = State::Collecting(Vec::new());
        Ok(())
    }

    fn add_observations(&mut self, source: &[f64], dest: &[f64]) -> Result<()> {
        let State::Collecting(trials) = &mut self.state else {
            return Err(TeError::NoObservationSession);
        };
        trials.push(Trial {
            source: source.to_vec(),
            dest: dest.to_vec(),
        });
        Ok(())
    }

    fn finalise_add_observations(&mut self) -> Result<()> {
        let State::Collecting(trials) = &self.state else {
            return Err(TeError::NoObservationSession);
        };
        let extractor =
            EventExtractor::new(self.config.dest_history(), self.config.source_history())?;
        let mut store = EmbeddingStore::new();
        for (n, trial) in trials.iter().enumerate() {
            let events = extractor.extract_trial(n, &trial.source, &trial.dest, &mut store)?;
            self.diagnostics.trial_extracted(n, events);
        }
        let index = IndexSet::build(
            &store,
            self.config.dest_history(),
            self.config.source_history(),
        )?;
        self.diagnostics.indices_built(
            store.partition(NextSpiker::Destination).len(),
            store.partition(NextSpiker::Source).len(),
        );
        let trials = trials.len();
        self.state = State::Finalised(Box::new(Finalised {
            store,
            index,
            trials,
        }));
        self.last_average = None;
        Ok(())
    }

    fn added_more_than_one_observation_set(&self) -> bool {
        match &self.state {
            State::Empty => false,
            State::Collecting(trials) => trials.len() > 1,
            State::Finalised(f) => f.trials > 1,
        }
    }

    fn compute_average_local_of_observations(&mut self) -> Result<f64> {
        let estimate = self.estimate(self.finalised()?)?;
        self.last_average = Some(estimate);
        Ok(estimate)
    }

    fn last_average(&self) -> Option<f64> {
        self.last_average
    }

    fn compute_local_of_previous_observations(&self) -> Result<SpikingLocalValues> {
        Err(TeError::Unsupported("local values of previous observations"))
    }

    fn compute_significance(&self, _permutations: usize) -> Result<EmpiricalNullDistribution> {
        Err(TeError::Unsupported("significance testing"))
    }

    fn compute_significance_with_orderings(
        &self,
        _orderings: &[Vec<usize>],
    ) -> Result<EmpiricalNullDistribution> {
        Err(TeError::Unsupported("significance testing"))
    }

    fn set_diagnostics(&mut self, sink: Arc<dyn Diagnostics>) {
        self.diagnostics = sink;
    }
}
