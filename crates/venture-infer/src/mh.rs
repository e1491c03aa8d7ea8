//! Single-site Metropolis-Hastings driver (spec.md §4.7, C8).
//!
//! Grounded directly on `asm_mcmc::kernel`'s propose/score/accept-or-reject/
//! record shape (`apply_code_proposal`/`apply_graph_proposal`), adapted to
//! this trace's detach/regen protocol and to the mandatory `log(N0/N1)`
//! cardinality correction spec.md §4.7 step 6 requires (the teacher's own
//! acceptance formula omits this term because its move set never changes the
//! number of candidate proposals; this trace's brush-creating requests do).

use venture_core::{NodeId, VentureError};
use venture_scaffold::{detach, regen, Scaffold};
use venture_trace::Trace;

/// Runs one single-site MH step against `trace`, returning whether the
/// proposal was accepted. Returns `Ok(false)` with no trace mutation if
/// there are no random choices to propose over.
pub fn mh_step(trace: &mut Trace) -> Result<bool, VentureError> {
    let random_choices = trace.random_choices()?;
    if random_choices.is_empty() {
        return Ok(false);
    }

    let n0 = random_choices.len();
    let pick = (trace.rng_mut().uniform() * n0 as f64) as usize;
    let principal = random_choices[pick.min(n0 - 1)];

    let scaffold = Scaffold::build(trace, vec![principal])?;
    let rho_rollback = detach(trace, &scaffold)?;
    let rho_weight = rho_rollback.old_log_weight;

    let proposed_value = resimulate_principal(trace, principal)?;
    trace.nodes_mut().set_value(principal, proposed_value)?;
    let xi_weight = regen(trace, &scaffold, false, &rho_rollback)?;

    let n1 = trace.random_choices()?.len();
    let log_ratio = xi_weight - rho_weight + (n0 as f64).ln() - (n1 as f64).ln();

    let accept = log_ratio >= 0.0 || trace.rng_mut().uniform().ln() < log_ratio;
    if !accept {
        // Unincorporate the proposed state (its own snapshot is discarded:
        // the restore pass below rebuilds from `rho_rollback`, the snapshot
        // taken before the proposal was ever applied), then restore the
        // exact pre-proposal trace byte-for-byte, brush included.
        detach(trace, &scaffold)?;
        regen(trace, &scaffold, true, &rho_rollback)?;
    }
    Ok(accept)
}

/// Draws a fresh value for the principal node from its own output PSP's
/// prior, used as the MH proposal distribution (spec.md §4.7 step 4's
/// `regen` call is driven by whatever value the caller supplies for the
/// principal; here that value is a fresh prior draw).
fn resimulate_principal(trace: &mut Trace, principal: NodeId) -> Result<venture_core::Value, VentureError> {
    use venture_trace::NodeKind;
    let operator = match trace.nodes().get(principal)?.kind() {
        NodeKind::Output { operator, .. } => *operator,
        _ => {
            return Err(VentureError::invariant(
                "not-an-output-node",
                "MH principal node must be an Output node",
            ))
        }
    };
    let sp_id = trace.procedure_of(operator)?;
    let psp = trace.output_psp(sp_id)?;
    let operand_nodes = match trace.nodes().get(principal)?.kind() {
        NodeKind::Output { operands, .. } => operands.clone(),
        _ => unreachable!(),
    };
    let operands = trace.operand_values(&operand_nodes)?;
    let esr_nodes = trace.nodes().get(principal)?.esr_parents().to_vec();
    let esr_values = trace.operand_values(&esr_nodes)?;
    let environment = trace.nodes().output_env(principal)?;
    let (spaux, rng) = trace.spaux_and_rng_mut(operator)?;
    let mut args = venture_core::Args {
        operands,
        operand_nodes,
        request_node: None,
        output_node: principal,
        esr_values,
        esr_nodes,
        environment,
        spaux,
        envs: None,
        sps: None,
    };
    psp.simulate(&mut args, rng)
}
