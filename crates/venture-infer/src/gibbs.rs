//! Gibbs-over-enumerable kernel (spec.md §4.8 closing paragraph).
//!
//! Restricted to a single node whose output PSP supports
//! [`venture_core::OutputPsp::enumerate`]: an exact categorical proposal over
//! the full conditional, so there is no accept/reject step — the draw is
//! always "accepted".

use venture_core::{Args, NodeId, Value, VentureError};
use venture_scaffold::{detach, regen, Scaffold};
use venture_trace::{NodeKind, Trace};

fn gather_args(trace: &Trace, node: NodeId) -> Result<(NodeId, Vec<NodeId>, Vec<Value>, Vec<NodeId>, Vec<Value>, venture_core::EnvId), VentureError> {
    let (operator, operand_nodes) = match trace.nodes().get(node)?.kind() {
        NodeKind::Output {
            operator, operands, ..
        } => (*operator, operands.clone()),
        _ => {
            return Err(VentureError::invariant(
                "not-an-output-node",
                "gibbs_step requires an Output node",
            ))
        }
    };
    let operands = trace.operand_values(&operand_nodes)?;
    let esr_nodes = trace.nodes().get(node)?.esr_parents().to_vec();
    let esr_values = trace.operand_values(&esr_nodes)?;
    let environment = trace.nodes().output_env(node)?;
    Ok((operator, operand_nodes, operands, esr_nodes, esr_values, environment))
}

/// Runs one Gibbs-over-enumerable step on `node`. Errors if `node`'s
/// procedure does not support enumeration.
pub fn gibbs_step(trace: &mut Trace, node: NodeId) -> Result<(), VentureError> {
    let (operator, operand_nodes, operands, esr_nodes, esr_values, environment) =
        gather_args(trace, node)?;
    let sp_id = trace.procedure_of(operator)?;
    let psp = trace.output_psp(sp_id)?;
    if !psp.can_enumerate() {
        return Err(VentureError::invariant(
            "not-enumerable",
            "gibbs_step called on a node whose PSP does not support enumerate",
        ));
    }

    let scaffold = Scaffold::build(trace, vec![node])?;
    let candidates = {
        let (spaux, _rng) = trace.spaux_and_rng_mut(operator)?;
        let args = Args {
            operands: operands.clone(),
            operand_nodes: operand_nodes.clone(),
            request_node: None,
            output_node: node,
            esr_values: esr_values.clone(),
            esr_nodes: esr_nodes.clone(),
            environment,
            spaux,
            envs: None,
            sps: None,
        };
        psp.enumerate(&args)?
    };
    if candidates.is_empty() {
        return Err(VentureError::invariant(
            "empty-enumeration",
            "enumerate returned no candidate values",
        ));
    }

    let base_rollback = detach(trace, &scaffold)?;

    let mut log_weights = Vec::with_capacity(candidates.len());
    for (value, prior_log_density) in &candidates {
        trace.nodes_mut().set_value(node, value.clone())?;
        let downstream_weight = regen(trace, &scaffold, false, &base_rollback)?;
        log_weights.push(prior_log_density + downstream_weight);
        // Restore the pre-enumeration baseline (not just this candidate's
        // own unincorporation) before scoring the next candidate, so every
        // trial starts from the same configuration instead of compounding.
        detach(trace, &scaffold)?;
        regen(trace, &scaffold, true, &base_rollback)?;
        detach(trace, &scaffold)?;
    }

    let max_log_weight = log_weights
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    let total: f64 = log_weights.iter().map(|w| (w - max_log_weight).exp()).sum();
    let draw = trace.rng_mut().uniform() * total;
    let mut cumulative = 0.0;
    let mut chosen = candidates.len() - 1;
    for (idx, weight) in log_weights.iter().enumerate() {
        cumulative += (weight - max_log_weight).exp();
        if draw <= cumulative {
            chosen = idx;
            break;
        }
    }

    trace.nodes_mut().set_value(node, candidates[chosen].0.clone())?;
    regen(trace, &scaffold, false, &base_rollback)?;
    Ok(())
}
