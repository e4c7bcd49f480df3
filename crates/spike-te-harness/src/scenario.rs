//! Deterministic synthetic spike-train scenarios.
//!
//! Every generator is driven by a seeded xorshift64* stream, so the same
//! `(scenario, seed, trials, spikes)` always yields bit-identical trains and
//! the same [`spike_data_digest`].

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::Digest;

/// Mean firing rate of generated source trains (spikes per unit time).
pub const BASE_RATE: f64 = 1.0;
/// Delay between a source spike and its destination echo in the coupled
/// scenario.
pub const COUPLING_DELAY: f64 = 0.05;
/// Full width of the uniform jitter added to the coupling delay.
pub const COUPLING_JITTER: f64 = 0.004;

/// One trial: `(source, dest)` spike times.
pub type Trial = (Vec<f64>, Vec<f64>);

/// Synthetic scenario selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Two independent Poisson trains at the same rate.
    Independent,
    /// Destination repeats each source spike after a short jittered delay.
    Coupled,
}

impl Scenario {
    pub const ALL: [Self; 2] = [Self::Independent, Self::Coupled];

    #[must_use]
    pub fn from_str_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "independent" | "indep" | "null" => Some(Self::Independent),
            "coupled" | "driven" => Some(Self::Coupled),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Independent => "independent",
            Self::Coupled => "coupled",
        }
    }

    /// Generate `trials` trials of `spikes` source spikes each.
    ///
    /// Trials are drawn from one stream in order, so trial `i` depends on the
    /// seed and on every earlier trial.
    #[must_use]
    pub fn generate(self, seed: u64, trials: usize, spikes: usize) -> Vec<Trial> {
        let mut rng = SpikeRng::new(seed);
        (0..trials)
            .map(|_| match self {
                Self::Independent => {
                    let source = rng.poisson_train(BASE_RATE, spikes);
                    let dest = rng.poisson_train(BASE_RATE, spikes);
                    (source, dest)
                }
                Self::Coupled => {
                    let source = rng.poisson_train(BASE_RATE, spikes);
                    let dest = source
                        .iter()
                        .map(|s| s + COUPLING_DELAY + COUPLING_JITTER * (rng.next_f64() - 0.5))
                        .collect();
                    (source, dest)
                }
            })
            .collect()
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// xorshift64* generator.
#[derive(Debug, Clone, Copy)]
pub struct SpikeRng {
    state: u64,
}

impl SpikeRng {
    /// A zero seed would lock the stream at zero; it is remapped.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn exponential(&mut self, rate: f64) -> f64 {
        -(1.0 - self.next_f64()).ln() / rate
    }

    /// Homogeneous Poisson train starting after time zero.
    pub fn poisson_train(&mut self, rate: f64, spikes: usize) -> Vec<f64> {
        let mut t = 0.0;
        (0..spikes)
            .map(|_| {
                t += self.exponential(rate);
                t
            })
            .collect()
    }
}

/// SHA-256 over the little-endian bit patterns of every spike time, with
/// trial and train lengths mixed in so boundaries are unambiguous.
#[must_use]
pub fn spike_data_digest(trials: &[Trial]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update((trials.len() as u64).to_le_bytes());
    for (source, dest) in trials {
        for train in [source, dest] {
            hasher.update((train.len() as u64).to_le_bytes());
            for t in train {
                hasher.update(t.to_bits().to_le_bytes());
            }
        }
    }
    hex_lower(&hasher.finalize())
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}
