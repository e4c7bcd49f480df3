//! Estimator configuration.
//!
//! The configuration is fixed before any observations are added and stays
//! immutable for the lifetime of one store/index pair. It can be built in
//! code, overlaid from the environment, or set option by option through
//! [`EstimatorOption`]:
//! - `SPIKE_TE_K`: destination history length `k` (default 1)
//! - `SPIKE_TE_L`: source history length `l` (default 1)
//! - `SPIKE_TE_KNNS`: neighbours for the adaptive radius (default 4)
//! - `SPIKE_TE_TRIM`: trim the next-spike window to positive times (default off)

use crate::error::{Result, TeError};

/// Default number of nearest neighbours in the joint space.
pub const DEFAULT_KNNS: usize = 4;

/// Validated estimator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorConfig {
    dest_history: usize,
    source_history: usize,
    knns: usize,
    trim_to_positive_times: bool,
}

impl EstimatorConfig {
    #[must_use]
    pub fn builder() -> EstimatorConfigBuilder {
        EstimatorConfigBuilder::default()
    }

    /// Destination history length `k` (number of past destination spikes).
    #[must_use]
    pub const fn dest_history(&self) -> usize {
        self.dest_history
    }

    /// Source history length `l` (number of past source spikes).
    #[must_use]
    pub const fn source_history(&self) -> usize {
        self.source_history
    }

    #[must_use]
    pub const fn knns(&self) -> usize {
        self.knns
    }

    #[must_use]
    pub const fn trim_to_positive_times(&self) -> bool {
        self.trim_to_positive_times
    }

    /// Number of destination inter-spike intervals kept per event (`k - 1`).
    #[must_use]
    pub const fn dest_interval_dims(&self) -> usize {
        self.dest_history - 1
    }

    /// Overlay `SPIKE_TE_*` environment variables on the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        for (var, key) in [
            ("SPIKE_TE_K", OptionKey::DestHistory),
            ("SPIKE_TE_L", OptionKey::SourceHistory),
            ("SPIKE_TE_KNNS", OptionKey::Knns),
            ("SPIKE_TE_TRIM", OptionKey::TrimToPositiveTimes),
        ] {
            if let Some(raw) = lookup(var) {
                builder = builder.option(EstimatorOption::parse(key, raw.trim())?);
            }
        }
        builder.build()
    }

    /// Apply a single option, re-validating the result.
    pub fn with_option(self, option: EstimatorOption) -> Result<Self> {
        EstimatorConfigBuilder::from(self).option(option).build()
    }

    /// Read back the value of one option.
    #[must_use]
    pub fn option(&self, key: OptionKey) -> EstimatorOption {
        match key {
            OptionKey::DestHistory => EstimatorOption::DestHistory(self.dest_history),
            OptionKey::SourceHistory => EstimatorOption::SourceHistory(self.source_history),
            OptionKey::Knns => EstimatorOption::Knns(self.knns),
            OptionKey::TrimToPositiveTimes => {
                EstimatorOption::TrimToPositiveTimes(self.trim_to_positive_times)
            }
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            dest_history: 1,
            source_history: 1,
            knns: DEFAULT_KNNS,
            trim_to_positive_times: false,
        }
    }
}

/// Builder that validates on [`build`](EstimatorConfigBuilder::build).
#[derive(Debug, Clone, Copy)]
pub struct EstimatorConfigBuilder {
    inner: EstimatorConfig,
}

impl Default for EstimatorConfigBuilder {
    fn default() -> Self {
        Self {
            inner: EstimatorConfig::default(),
        }
    }
}

impl From<EstimatorConfig> for EstimatorConfigBuilder {
    fn from(inner: EstimatorConfig) -> Self {
        Self { inner }
    }
}

impl EstimatorConfigBuilder {
    #[must_use]
    pub fn dest_history(mut self, k: usize) -> Self {
        self.inner.dest_history = k;
        self
    }

    #[must_use]
    pub fn source_history(mut self, l: usize) -> Self {
        self.inner.source_history = l;
        self
    }

    #[must_use]
    pub fn knns(mut self, knns: usize) -> Self {
        self.inner.knns = knns;
        self
    }

    #[must_use]
    pub fn trim_to_positive_times(mut self, trim: bool) -> Self {
        self.inner.trim_to_positive_times = trim;
        self
    }

    #[must_use]
    pub fn option(self, option: EstimatorOption) -> Self {
        match option {
            EstimatorOption::DestHistory(k) => self.dest_history(k),
            EstimatorOption::SourceHistory(l) => self.source_history(l),
            EstimatorOption::Knns(knns) => self.knns(knns),
            EstimatorOption::TrimToPositiveTimes(trim) => self.trim_to_positive_times(trim),
        }
    }

    pub fn build(self) -> Result<EstimatorConfig> {
        let cfg = self.inner;
        if cfg.dest_history < 1 || cfg.source_history < 1 {
            return Err(TeError::UnsupportedEmbeddingDepth {
                k: cfg.dest_history,
                l: cfg.source_history,
            });
        }
        if cfg.knns < 1 {
            return Err(TeError::InvalidNeighbourCount { knns: cfg.knns });
        }
        Ok(cfg)
    }
}

/// Recognised option names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    DestHistory,
    SourceHistory,
    Knns,
    TrimToPositiveTimes,
}

impl OptionKey {
    /// Parse an option name (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "k" | "k_history" | "dest_history" => Some(Self::DestHistory),
            "l" | "l_history" | "source_history" => Some(Self::SourceHistory),
            "knns" => Some(Self::Knns),
            "trim_range_to_pos_times" | "trim" | "trim_to_positive_times" => {
                Some(Self::TrimToPositiveTimes)
            }
            _ => None,
        }
    }

    /// Canonical option name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DestHistory => "K",
            Self::SourceHistory => "L",
            Self::Knns => "Knns",
            Self::TrimToPositiveTimes => "TRIM_RANGE_TO_POS_TIMES",
        }
    }
}

/// A typed option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorOption {
    DestHistory(usize),
    SourceHistory(usize),
    Knns(usize),
    TrimToPositiveTimes(bool),
}

impl EstimatorOption {
    #[must_use]
    pub const fn key(self) -> OptionKey {
        match self {
            Self::DestHistory(_) => OptionKey::DestHistory,
            Self::SourceHistory(_) => OptionKey::SourceHistory,
            Self::Knns(_) => OptionKey::Knns,
            Self::TrimToPositiveTimes(_) => OptionKey::TrimToPositiveTimes,
        }
    }

    /// Parse a raw value for `key`.
    pub fn parse(key: OptionKey, raw: &str) -> Result<Self> {
        let invalid = || TeError::InvalidOptionValue {
            option: key.name(),
            value: raw.to_string(),
        };
        match key {
            OptionKey::DestHistory => raw.parse().map(Self::DestHistory).map_err(|_| invalid()),
            OptionKey::SourceHistory => {
                raw.parse().map(Self::SourceHistory).map_err(|_| invalid())
            }
            OptionKey::Knns => raw.parse().map(Self::Knns).map_err(|_| invalid()),
            OptionKey::TrimToPositiveTimes => parse_bool_loose(raw)
                .map(Self::TrimToPositiveTimes)
                .ok_or_else(invalid),
        }
    }

    /// Parse a `NAME=value` assignment.
    pub fn parse_assignment(assignment: &str) -> Result<Self> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| TeError::UnknownOption(assignment.to_string()))?;
        let key = OptionKey::from_str_loose(name.trim())
            .ok_or_else(|| TeError::UnknownOption(name.trim().to_string()))?;
        Self::parse(key, value.trim())
    }
}

fn parse_bool_loose(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
