//! CLI entrypoint for the spike-te synthetic harness.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use spike_te_core::EstimatorConfig;
use spike_te_core::config::EstimatorConfigBuilder;
use spike_te_harness::structured_log::LogEmitter;
use spike_te_harness::{EstimateRun, LogDiagnostics, Scenario, run_estimate, run_sweep};

/// Transfer entropy runs over synthetic spike trains.
#[derive(Debug, Parser)]
#[command(name = "spike-te-harness")]
#[command(about = "Synthetic scenario harness for spike-train transfer entropy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Number of trials to generate.
    #[arg(long, default_value_t = 1)]
    trials: usize,
    /// Source spikes per trial.
    #[arg(long, default_value_t = 1000)]
    spikes: usize,
    /// Seed for the deterministic generator.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Destination history length (overrides SPIKE_TE_K).
    #[arg(long)]
    k: Option<usize>,
    /// Source history length (overrides SPIKE_TE_L).
    #[arg(long)]
    l: Option<usize>,
    /// Neighbours for the adaptive radius (overrides SPIKE_TE_KNNS).
    #[arg(long)]
    knns: Option<usize>,
    /// Trim the next-spike window to positive times: true or false
    /// (overrides SPIKE_TE_TRIM).
    #[arg(long, value_name = "BOOL")]
    trim: Option<bool>,
    /// Write a JSONL structured log here.
    #[arg(long)]
    log: Option<PathBuf>,
    /// Include per-event records in the structured log.
    #[arg(long)]
    log_events: bool,
    /// Output JSON path (if omitted, prints to stdout).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Estimate transfer entropy for one scenario.
    Estimate {
        /// Scenario to generate (independent or coupled).
        #[arg(long, default_value = "coupled")]
        scenario: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Repeat the estimate over consecutive seeds for every scenario.
    Sweep {
        /// Number of seeds per scenario.
        #[arg(long, default_value_t = 5)]
        repeats: usize,
        #[command(flatten)]
        run: RunArgs,
    },
}

impl RunArgs {
    fn config(&self) -> Result<EstimatorConfig, Box<dyn std::error::Error>> {
        self.overlay(EstimatorConfig::from_env()?)
    }

    /// Apply the command-line overrides on top of `base`.
    fn overlay(&self, base: EstimatorConfig) -> Result<EstimatorConfig, Box<dyn std::error::Error>> {
        let mut builder = EstimatorConfigBuilder::from(base);
        if let Some(k) = self.k {
            builder = builder.dest_history(k);
        }
        if let Some(l) = self.l {
            builder = builder.source_history(l);
        }
        if let Some(knns) = self.knns {
            builder = builder.knns(knns);
        }
        if let Some(trim) = self.trim {
            builder = builder.trim_to_positive_times(trim);
        }
        Ok(builder.build()?)
    }

    fn log_sink(
        &self,
        component: &str,
        scenario: Option<Scenario>,
    ) -> Result<Option<Arc<LogDiagnostics>>, Box<dyn std::error::Error>> {
        let Some(path) = &self.log else {
            return Ok(None);
        };
        let run_id = format!("seed{}", self.seed);
        let emitter = LogEmitter::to_file(path, component, &run_id)?;
        let mut sink = LogDiagnostics::new(emitter, self.log_events);
        if let Some(scenario) = scenario {
            sink = sink.with_scenario(scenario.as_str());
        }
        Ok(Some(Arc::new(sink)))
    }
}

fn write_output(json: &str, output: Option<&Path>) -> std::io::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Estimate { scenario, run } => {
            let scenario = Scenario::from_str_loose(&scenario)
                .ok_or_else(|| format!("unknown scenario '{scenario}'"))?;
            let plan = EstimateRun {
                scenario,
                seed: run.seed,
                trials: run.trials,
                spikes: run.spikes,
                config: run.config()?,
            };
            eprintln!(
                "Estimating {scenario}: {} trial(s) x {} spikes, seed {}",
                plan.trials, plan.spikes, plan.seed
            );
            let sink = run.log_sink("estimate", Some(scenario))?;
            let report = run_estimate(&plan, sink.as_ref());
            if let Some(sink) = &sink {
                sink.finish()?;
            }
            let report = report?;
            eprintln!(
                "TE = {:.6} nats/unit time over {} destination events",
                report.estimate, report.destination_events
            );
            write_output(&report.to_json()?, run.output.as_deref())?;
        }
        Command::Sweep { repeats, run } => {
            let base = EstimateRun {
                scenario: Scenario::Independent,
                seed: run.seed,
                trials: run.trials,
                spikes: run.spikes,
                config: run.config()?,
            };
            eprintln!(
                "Sweeping {} scenario(s) over {repeats} seed(s) from {}",
                Scenario::ALL.len(),
                base.seed
            );
            let sink = run.log_sink("sweep", None)?;
            let report = run_sweep(&base, repeats, sink.as_ref());
            if let Some(sink) = &sink {
                sink.finish()?;
            }
            let report = report?;
            for summary in &report.scenarios {
                eprintln!(
                    "{}: mean {:.6} std {:.6}",
                    summary.scenario, summary.mean, summary.std_dev
                );
            }
            write_output(&report.to_json()?, run.output.as_deref())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Estimate { run, .. } | Command::Sweep { run, .. } => run,
        }
    }

    fn trimmed_base() -> EstimatorConfig {
        EstimatorConfig::builder()
            .trim_to_positive_times(true)
            .build()
            .unwrap()
    }

    #[test]
    fn trim_flag_can_switch_trimming_off() {
        let run = run_args(&["spike-te-harness", "estimate", "--trim", "false"]);
        let cfg = run.overlay(trimmed_base()).unwrap();
        assert!(!cfg.trim_to_positive_times());
    }

    #[test]
    fn trim_flag_can_switch_trimming_on() {
        let run = run_args(&["spike-te-harness", "sweep", "--trim", "true"]);
        let cfg = run.overlay(EstimatorConfig::default()).unwrap();
        assert!(cfg.trim_to_positive_times());
    }

    #[test]
    fn absent_flags_keep_base_config() {
        let run = run_args(&["spike-te-harness", "estimate"]);
        let cfg = run.overlay(trimmed_base()).unwrap();
        assert!(cfg.trim_to_positive_times());
        assert_eq!(cfg, trimmed_base());
    }

    #[test]
    fn history_overrides_apply() {
        let run = run_args(&["spike-te-harness", "estimate", "--k", "2", "--l", "3", "--knns", "6"]);
        let cfg = run.overlay(EstimatorConfig::default()).unwrap();
        assert_eq!(cfg.dest_history(), 2);
        assert_eq!(cfg.source_history(), 3);
        assert_eq!(cfg.knns(), 6);
    }
}
