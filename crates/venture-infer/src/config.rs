//! Run configuration: a serde/YAML-configurable convenience layer over the
//! directive API, mirroring `asm_mcmc::config::RunConfig`'s nested,
//! individually-defaulted sub-config pattern.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which inference kernel a run should drive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum KernelChoice {
    /// Single-site Metropolis-Hastings (spec.md §4.7).
    SingleSiteMh,
    /// Gibbs-over-enumerable, restricted to nodes whose PSP supports
    /// `enumerate` (spec.md §4.8 closing paragraph).
    EnumerativeGibbs,
    /// Particle Gibbs / conditional SMC (spec.md §4.8).
    ParticleGibbs {
        /// Number of particles to carry per sweep.
        #[serde(default = "default_particle_count")]
        particles: usize,
    },
}

fn default_particle_count() -> usize {
    8
}

impl Default for KernelChoice {
    fn default() -> Self {
        KernelChoice::SingleSiteMh
    }
}

/// Top-level inference run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferConfig {
    /// Which kernel to run each step.
    #[serde(default)]
    pub kernel: KernelChoice,
    /// Number of inference steps (one kernel invocation each) to run.
    #[serde(default = "default_steps")]
    pub steps: usize,
    /// Master seed and substream labeling policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Optional checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Optional metrics recording behaviour.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_steps() -> usize {
    1000
}

impl Default for InferConfig {
    fn default() -> Self {
        Self {
            kernel: KernelChoice::default(),
            steps: default_steps(),
            seed_policy: SeedPolicy::default(),
            checkpoint: CheckpointConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Deterministic seeding configuration (mirrors `asm_mcmc::config::SeedPolicy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used to construct the trace's `RngHandle` and every
    /// substream this crate derives from it.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional human-readable label recorded in the run manifest.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Checkpointing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Interval in steps between checkpoint writes (0 disables checkpoints).
    #[serde(default)]
    pub interval: usize,
    /// Directory checkpoints are written to.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Maximum number of checkpoints to retain.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_checkpoint_retention() -> usize {
    4
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            directory: None,
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Metrics recording configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Interval in steps between metrics samples (0 disables recording).
    #[serde(default = "default_metrics_interval")]
    pub interval: usize,
    /// Where to write the metrics CSV, if recording is enabled.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_metrics_interval() -> usize {
    1
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval: default_metrics_interval(),
            path: None,
        }
    }
}
