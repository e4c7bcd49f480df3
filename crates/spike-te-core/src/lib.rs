//! Transfer entropy between spike trains.
//!
//! This crate estimates directed information flow from a source spike train
//! to a destination spike train, in nats per unit time, with a
//! nearest-neighbour (KSG-style) estimator adapted to continuous-time point
//! processes.
//!
//! # Architecture
//!
//! - **Spatial index** (`spatial`): multi-group k-d tree with exact k-NN and
//!   per-group-radius range search, plus a sorted 1-D counter
//! - **Event extractor** (`events`): merges two spike trains into embedded
//!   "next spike" events
//! - **Embedding store** (`store`): events partitioned by next spiker
//! - **Index set** (`index`): the search structures built from a store
//! - **Boundary correction** (`boundary`): time-window clipping
//! - **Estimator** (`estimator`): calculator lifecycle and counting algorithm
//! - **Configuration** (`config`), **errors** (`error`), **diagnostics**
//!   (`diagnostics`), **metrics** (`metrics`), **digamma** (`special`)

#![forbid(unsafe_code)]

pub mod boundary;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod estimator;
pub mod events;
pub mod index;
pub mod metrics;
pub mod spatial;
pub mod special;
pub mod store;

pub use boundary::{AdaptiveRadii, SearchWindow, WindowCase};
pub use config::{EstimatorConfig, EstimatorOption, OptionKey};
pub use diagnostics::{Diagnostics, FanoutDiagnostics, NoDiagnostics, RecordingDiagnostics};
pub use error::{Result, TeError};
pub use estimator::{
    EmpiricalNullDistribution, LifecycleState, SpikingLocalValues, SpikingTransferEntropy,
    TransferEntropyCalculator,
};
pub use metrics::{EstimatorMetrics, MetricsSnapshot};
pub use store::{EmbeddedEvent, EventLocator, NextSpiker};
