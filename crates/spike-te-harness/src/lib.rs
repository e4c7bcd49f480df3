//! Synthetic-scenario harness for spike-te.
//!
//! This crate provides:
//! - Scenarios: deterministic independent and coupled spike-train generators
//! - Reports: JSON estimate and sweep reports with a digest of the input data
//! - Structured logging: JSONL entries, an emitter, and a schema validator
//! - A diagnostics sink that writes estimator hooks through the emitter

#![forbid(unsafe_code)]

pub mod error;
pub mod log_diagnostics;
pub mod report;
pub mod scenario;
pub mod structured_log;

pub use error::{HarnessError, Result};
pub use log_diagnostics::LogDiagnostics;
pub use report::{EstimateReport, EstimateRun, SweepReport, run_estimate, run_sweep};
pub use scenario::Scenario;
