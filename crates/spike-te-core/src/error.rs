//! Error type shared by every stage of the estimator pipeline.
//!
//! Configuration and lifecycle faults are recoverable by the caller.
//! The geometric faults (`NegativeTimeToNext`, `NextSpikeBeforeSource`,
//! `SearchWindowInverted`, `AdaptiveRadiusViolated`) mean an internal
//! invariant broke and the whole computation must be abandoned.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TeError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TeError {
    #[error("unsupported embedding depth: k={k}, l={l} (both must be at least 1)")]
    UnsupportedEmbeddingDepth { k: usize, l: usize },

    #[error("neighbour count must be at least 1, got {knns}")]
    InvalidNeighbourCount { knns: usize },

    #[error("configuration is locked while observations are held; call initialise() first")]
    ConfigurationLocked,

    #[error("invalid value '{value}' for option {option}")]
    InvalidOptionValue { option: &'static str, value: String },

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("no observation session is open; call start_add_observations() first")]
    NoObservationSession,

    #[error("observations have not been finalised")]
    NotFinalised,

    #[error("non-finite spike time {value} in trial {trial}")]
    NonFiniteSpikeTime { trial: usize, value: f64 },

    #[error("negative time to next spike ({time_to_next}) in trial {trial}")]
    NegativeTimeToNext { trial: usize, time_to_next: f64 },

    #[error(
        "next spike at {next_time} precedes the most recent source spike at {source_time} in trial {trial}"
    )]
    NextSpikeBeforeSource {
        trial: usize,
        next_time: f64,
        source_time: f64,
    },

    #[error("expected {expected} distance groups, got {actual}")]
    GroupMismatch { expected: usize, actual: usize },

    #[error("requested {requested} neighbours but only {available} other points are indexed")]
    InsufficientNeighbours { requested: usize, available: usize },

    #[error(
        "next destination spike window [.., {window_upper}] lies before the previous source spike window [{source_lower}, ..] at event {event}"
    )]
    SearchWindowInverted {
        event: usize,
        window_upper: f64,
        source_lower: f64,
    },

    #[error(
        "adaptive radius invariant violated at destination event {event}: {matched} matches for {knns} neighbours"
    )]
    AdaptiveRadiusViolated {
        event: usize,
        matched: usize,
        knns: usize,
    },

    #[error("no events with positive elapsed time were extracted")]
    NoEvents,

    #[error("{0} is not supported by this estimator")]
    Unsupported(&'static str),
}
