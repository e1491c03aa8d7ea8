//! Per-step inference metrics, mirroring `asm_mcmc::metrics::MetricsRecorder`'s
//! record/aggregate/CSV-export shape.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use venture_core::VentureError;

/// One inference step's recorded metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    /// Inference step index (0-based).
    pub step: usize,
    /// Which kernel produced this sample.
    pub kernel: String,
    /// Whether the proposal was accepted (always `true` for Gibbs/PGibbs,
    /// which never reject).
    pub accepted: bool,
    /// Size of `randomChoices` at the start of the step.
    pub random_choice_count: usize,
    /// The acceptance log-ratio computed for the step (`0.0` for kernels
    /// that do not compute one).
    pub log_acceptance_ratio: f64,
}

/// Aggregate statistics over a run's recorded samples.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Total steps recorded.
    pub steps: usize,
    /// Fraction of steps accepted.
    pub acceptance_rate: f64,
    /// Mean random-choice count across recorded steps.
    pub mean_random_choice_count: f64,
}

impl RunSummary {
    /// An empty summary for a run with no recorded samples.
    pub fn empty() -> Self {
        Self {
            steps: 0,
            acceptance_rate: 0.0,
            mean_random_choice_count: 0.0,
        }
    }
}

/// Collects per-step metrics samples and computes run-level aggregates.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    samples: Vec<MetricSample>,
}

impl MetricsRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one step's sample.
    pub fn push_sample(&mut self, sample: MetricSample) {
        self.samples.push(sample);
    }

    /// The recorded samples, in recording order.
    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    /// Computes the run-level summary over everything recorded so far.
    pub fn summary(&self) -> RunSummary {
        if self.samples.is_empty() {
            return RunSummary::empty();
        }
        let accepted = self.samples.iter().filter(|s| s.accepted).count();
        let total_choices: usize = self.samples.iter().map(|s| s.random_choice_count).sum();
        RunSummary {
            steps: self.samples.len(),
            acceptance_rate: accepted as f64 / self.samples.len() as f64,
            mean_random_choice_count: total_choices as f64 / self.samples.len() as f64,
        }
    }

    /// Writes the recorded samples to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), VentureError> {
        let path = path.as_ref();
        let mut file = File::create(path).map_err(|err| {
            VentureError::Serde(
                venture_core::ErrorInfo::new("metrics-create", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        writeln!(file, "step,kernel,accepted,random_choice_count,log_acceptance_ratio")
            .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("metrics-write", err.to_string())))?;
        for sample in &self.samples {
            writeln!(
                file,
                "{},{},{},{},{:.6}",
                sample.step,
                sample.kernel,
                sample.accepted,
                sample.random_choice_count,
                sample.log_acceptance_ratio
            )
            .map_err(|err| VentureError::Serde(venture_core::ErrorInfo::new("metrics-write", err.to_string())))?;
        }
        Ok(())
    }
}
