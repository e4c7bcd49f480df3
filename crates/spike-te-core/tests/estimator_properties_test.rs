use std::sync::Arc;

use spike_te_core::boundary::{self, AdaptiveRadii};
use spike_te_core::diagnostics::DiagnosticRecord;
use spike_te_core::special::digamma_count;
use spike_te_core::store::EmbeddingStore;
use spike_te_core::{
    EmbeddedEvent, EstimatorConfig, EstimatorMetrics, EventLocator, NextSpiker,
    RecordingDiagnostics, SpikingTransferEntropy, TeError, TransferEntropyCalculator, WindowCase,
};

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn exponential(&mut self, rate: f64) -> f64 {
        -(1.0 - self.next_f64()).ln() / rate
    }

    fn gen_range(&mut self, low: usize, high_inclusive: usize) -> usize {
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

fn poisson_train(rng: &mut XorShift64, rate: f64, spikes: usize) -> Vec<f64> {
    let mut t = 0.0;
    (0..spikes)
        .map(|_| {
            t += rng.exponential(rate);
            t
        })
        .collect()
}

fn independent_pair(seed: u64, spikes: usize) -> (Vec<f64>, Vec<f64>) {
    let mut rng = XorShift64::new(seed);
    let source = poisson_train(&mut rng, 1.0, spikes);
    let dest = poisson_train(&mut rng, 1.0, spikes);
    (source, dest)
}

fn coupled_pair(seed: u64, spikes: usize) -> (Vec<f64>, Vec<f64>) {
    let mut rng = XorShift64::new(seed);
    let source = poisson_train(&mut rng, 1.0, spikes);
    let dest = source
        .iter()
        .map(|s| s + 0.05 + 0.004 * (rng.next_f64() - 0.5))
        .collect();
    (source, dest)
}

fn shuffle(rng: &mut XorShift64, values: &mut [f64]) {
    for i in (1..values.len()).rev() {
        let j = rng.gen_range(0, i);
        values.swap(i, j);
    }
}

fn config(k: usize, l: usize, knns: usize, trim: bool) -> EstimatorConfig {
    EstimatorConfig::builder()
        .dest_history(k)
        .source_history(l)
        .knns(knns)
        .trim_to_positive_times(trim)
        .build()
        .unwrap()
}

fn estimate(cfg: EstimatorConfig, source: &[f64], dest: &[f64]) -> f64 {
    let mut calc = TransferEntropyCalculator::with_config(cfg);
    calc.set_observations(source, dest).unwrap();
    calc.compute_average_local_of_observations().unwrap()
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

/// Direct O(n^2) evaluation of the estimator over a finalised store.
fn brute_force_estimate(store: &EmbeddingStore, cfg: &EstimatorConfig) -> f64 {
    let dest_events = store.partition(NextSpiker::Destination);
    let source_events = store.partition(NextSpiker::Source);
    let knns = cfg.knns();

    let mut total_time = 0.0;
    let mut sum = 0.0;
    for (locator, event) in store.timeline() {
        total_time += event.elapsed_time();
        let EventLocator::Destination(i) = locator else {
            continue;
        };
        let t = event.time_to_next;

        let mut neighbours: Vec<(f64, [f64; 3], usize)> = dest_events
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(j, other)| {
                let norms = [
                    max_abs_diff(&event.source_history, &other.source_history),
                    max_abs_diff(&event.dest_history, &other.dest_history),
                    (t - other.time_to_next).abs(),
                ];
                (norms.iter().copied().fold(0.0, f64::max), norms, j)
            })
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.2.cmp(&b.2)));
        let radii = neighbours[..knns]
            .iter()
            .fold(AdaptiveRadii::default(), |r, (_, n, _)| AdaptiveRadii {
                source: r.source.max(n[0]),
                dest: r.dest.max(n[1]),
                time: r.time.max(n[2]),
            });

        let histories_match = |other: &EmbeddedEvent| {
            max_abs_diff(&event.source_history, &other.source_history) <= radii.source
                && max_abs_diff(&event.dest_history, &other.dest_history) <= radii.dest
        };
        let dest_greater = dest_events
            .iter()
            .enumerate()
            .filter(|&(j, other)| {
                j != i && histories_match(other) && other.time_to_next - t >= radii.time
            })
            .count();
        let source_greater = source_events
            .iter()
            .filter(|other| histories_match(*other) && other.time_to_next - t >= -radii.time)
            .count();

        let window = boundary::search_window(
            i,
            t,
            event.source_offset(),
            &radii,
            cfg.trim_to_positive_times(),
        )
        .unwrap();
        let dest_matches: Vec<f64> = dest_events
            .iter()
            .enumerate()
            .filter(|&(j, other)| {
                j != i && max_abs_diff(&event.dest_history, &other.dest_history) <= radii.dest
            })
            .map(|(_, other)| other.time_to_next - t)
            .collect();
        let and_greater = dest_matches
            .iter()
            .filter(|&&d| d >= -window.r_time_lower)
            .count();
        let matched = dest_matches
            .iter()
            .filter(|&&d| d >= -window.r_time_lower && d <= window.r_time_upper)
            .count();
        assert!(matched >= knns);

        let k = knns as f64;
        let n = knns + source_greater + dest_greater;
        let (mut joint, marginal) = if cfg.dest_history() > 1 {
            (
                digamma_count(knns) - 2.0 / k - digamma_count(n) + 1.0 / n as f64,
                digamma_count(matched) - 1.0 / matched as f64 - digamma_count(and_greater),
            )
        } else {
            (
                digamma_count(knns) - 1.0 / k - digamma_count(n),
                digamma_count(matched) - digamma_count(and_greater),
            )
        };
        if cfg.trim_to_positive_times() {
            joint -= window.search_area_ratio.ln();
        }
        sum += joint - marginal;
    }
    sum / total_time
}

#[test]
fn matches_brute_force_across_configurations() {
    let (source, dest) = independent_pair(41, 220);
    for (k, l, knns, trim) in [
        (1, 1, 4, false),
        (2, 1, 3, false),
        (1, 2, 4, true),
        (3, 2, 5, true),
    ] {
        let cfg = config(k, l, knns, trim);
        let mut calc = TransferEntropyCalculator::with_config(cfg);
        calc.set_observations(&source, &dest).unwrap();
        let fast = calc.compute_average_local_of_observations().unwrap();
        let brute = brute_force_estimate(calc.store().unwrap(), &cfg);
        assert!(
            (fast - brute).abs() <= 1e-9 * (1.0 + brute.abs()),
            "k={k} l={l} knns={knns} trim={trim}: {fast} vs {brute}"
        );
    }
}

#[test]
fn estimate_ignores_input_order() {
    let (source, dest) = independent_pair(5, 300);
    let mut rng = XorShift64::new(99);
    let mut shuffled_source = source.clone();
    let mut shuffled_dest = dest.clone();
    shuffle(&mut rng, &mut shuffled_source);
    shuffle(&mut rng, &mut shuffled_dest);

    let cfg = config(2, 2, 4, true);
    let mut ordered = TransferEntropyCalculator::with_config(cfg);
    ordered.set_observations(&source, &dest).unwrap();
    let mut unordered = TransferEntropyCalculator::with_config(cfg);
    unordered
        .set_observations(&shuffled_source, &shuffled_dest)
        .unwrap();
    assert_eq!(ordered.store(), unordered.store());
    assert_eq!(
        ordered.compute_average_local_of_observations().unwrap(),
        unordered.compute_average_local_of_observations().unwrap()
    );
}

#[test]
fn untrimmed_windows_are_symmetric_and_unscaled() {
    let (source, dest) = coupled_pair(8, 200);
    let sink = Arc::new(RecordingDiagnostics::new());
    let mut calc = TransferEntropyCalculator::with_config(config(1, 1, 4, false));
    calc.set_diagnostics(sink.clone());
    calc.set_observations(&source, &dest).unwrap();
    calc.compute_average_local_of_observations().unwrap();

    let mut windows = 0;
    for record in sink.records() {
        if let DiagnosticRecord::SearchWindow { window, .. } = record {
            windows += 1;
            assert_eq!(window.case, WindowCase::Untrimmed);
            assert_eq!(window.search_area_ratio, 1.0);
            assert_eq!(window.r_time_lower, window.r_time_upper);
        }
    }
    assert_eq!(
        windows,
        calc.store().unwrap().partition(NextSpiker::Destination).len()
    );
}

#[test]
fn sparse_trial_contributes_nothing() {
    let (source, dest) = independent_pair(13, 150);
    let mut calc = TransferEntropyCalculator::with_config(config(3, 1, 4, false));
    calc.start_add_observations().unwrap();
    calc.add_observations(&source, &dest).unwrap();
    calc.add_observations(&[0.5, 1.5, 2.5], &[1.0, 2.0]).unwrap();
    calc.finalise_add_observations().unwrap();
    assert!(calc.added_more_than_one_observation_set());

    let store = calc.store().unwrap();
    assert_eq!(store.events_per_trial().len(), 2);
    assert_eq!(store.events_per_trial()[1], 0);
    assert_eq!(store.events_per_trial()[0], store.len());
    assert!(calc.compute_average_local_of_observations().is_ok());
}

#[test]
fn elapsed_time_is_the_per_event_sum() {
    let (source, dest) = coupled_pair(21, 250);
    let sink = Arc::new(RecordingDiagnostics::new());
    let mut calc = TransferEntropyCalculator::with_config(config(2, 1, 4, false));
    calc.set_diagnostics(sink.clone());
    calc.set_observations(&source, &dest).unwrap();
    let te = calc.compute_average_local_of_observations().unwrap();

    let store = calc.store().unwrap();
    let mut manual = 0.0;
    for (_, event) in store.timeline() {
        let offset = event.source_history[0];
        manual += if offset < 0.0 {
            event.time_to_next + offset
        } else {
            event.time_to_next
        };
    }
    let total_time = sink
        .records()
        .iter()
        .find_map(|r| match *r {
            DiagnosticRecord::EstimateComplete { total_time, .. } => Some(total_time),
            _ => None,
        })
        .unwrap();
    assert_eq!(total_time, manual);

    let contributions: f64 = sink.contributions().iter().map(|(_, v)| v).sum();
    assert!((contributions / total_time - te).abs() < 1e-12);
}

#[test]
fn independent_trains_give_small_estimates() {
    let mut independent = 0.0;
    let mut coupled = 0.0;
    for seed in [1_u64, 2, 3] {
        let (s, d) = independent_pair(seed, 800);
        independent += estimate(config(1, 1, 4, false), &s, &d) / 3.0;
        let (s, d) = coupled_pair(seed, 800);
        coupled += estimate(config(1, 1, 4, false), &s, &d) / 3.0;
    }
    assert!(independent.abs() < 0.5, "independent estimate {independent}");
    assert!(
        independent.abs() * 5.0 < coupled,
        "independent {independent} vs coupled {coupled}"
    );
}

#[test]
fn coupled_trains_give_positive_estimates() {
    for (k, l, trim) in [(1, 1, false), (2, 1, true), (1, 2, false)] {
        let (s, d) = coupled_pair(17, 600);
        let te = estimate(config(k, l, 4, trim), &s, &d);
        assert!(te > 0.5, "k={k} l={l} trim={trim}: {te}");
    }
}

#[test]
fn metrics_sink_counts_queries() {
    let (source, dest) = independent_pair(33, 200);
    let metrics = Arc::new(EstimatorMetrics::new());
    let mut calc = TransferEntropyCalculator::with_config(config(2, 1, 4, true));
    calc.set_diagnostics(metrics.clone());
    calc.start_add_observations().unwrap();
    calc.add_observations(&source, &dest).unwrap();
    calc.add_observations(&[1.0], &[2.0]).unwrap();
    calc.finalise_add_observations().unwrap();
    calc.compute_average_local_of_observations().unwrap();

    let snap = metrics.snapshot();
    let store = calc.store().unwrap();
    let dest_events = store.partition(NextSpiker::Destination).len() as u64;
    assert_eq!(snap.trials, 2);
    assert_eq!(snap.empty_trials, 1);
    assert_eq!(snap.events, store.len() as u64);
    assert_eq!(snap.knn_queries, dest_events);
    assert_eq!(snap.range_queries, 3 * dest_events);
    assert_eq!(snap.estimates, 1);
}

#[test]
fn non_finite_spike_times_fail_finalise() {
    let mut calc = TransferEntropyCalculator::new();
    calc.start_add_observations().unwrap();
    calc.add_observations(&[0.0, f64::INFINITY], &[1.0, 2.0]).unwrap();
    assert!(matches!(
        calc.finalise_add_observations(),
        Err(TeError::NonFiniteSpikeTime { trial: 0, .. })
    ));
}
