//! Inference kernels driving a `venture_trace::Trace`: single-site
//! Metropolis-Hastings (spec.md §4.7), Gibbs-over-enumerable, and
//! Particle-Gibbs / conditional SMC (spec.md §4.8), plus the ambient
//! configuration, determinism, metrics, checkpoint and manifest layers
//! mirroring `asm-mcmc`'s equivalents.

pub mod checkpoint;
pub mod config;
pub mod determinism;
pub mod gibbs;
pub mod hash;
pub mod manifest;
pub mod metrics;
pub mod mh;
pub mod pgibbs;

pub use checkpoint::{checkpoint_path, CheckpointPayload};
pub use config::{CheckpointConfig, InferConfig, KernelChoice, MetricsConfig, SeedPolicy};
pub use gibbs::gibbs_step;
pub use hash::trace_hash;
pub use manifest::RunManifest;
pub use metrics::{MetricSample, MetricsRecorder, RunSummary};
pub use mh::mh_step;
pub use pgibbs::pgibbs_step;
