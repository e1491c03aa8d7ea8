//! Deterministic substream derivation for inference steps.
//!
//! Mirrors `asm_mcmc::determinism`: every kernel invocation derives its own
//! RNG substream from the trace's master seed plus a small integer index, so
//! that identical seeds and identical directive/inference sequences
//! reproduce bit-identical results (spec.md §5 "Ordering").

use venture_core::derive_substream_seed;

/// Derives the seed for the `step`th single-site MH or Gibbs step.
pub fn mh_step_seed(master_seed: u64, step: usize) -> u64 {
    derive_substream_seed(master_seed, step as u64)
}

/// Derives the seed for one particle within one Particle-Gibbs sweep.
pub fn particle_seed(master_seed: u64, sweep: usize, particle_index: usize) -> u64 {
    let intermediate = derive_substream_seed(master_seed, sweep as u64);
    derive_substream_seed(intermediate, particle_index as u64)
}

/// Derives the seed for the resampling draw after processing one DRG node
/// within a Particle-Gibbs sweep.
pub fn resample_seed(master_seed: u64, sweep: usize, node_slot: usize) -> u64 {
    derive_substream_seed(
        master_seed ^ 0xA5A5_A5A5_A5A5_A5A5,
        (sweep as u64) << 16 | node_slot as u64,
    )
}
