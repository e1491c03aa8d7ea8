//! The detach/regenerate protocol: tearing down and rebuilding the portion
//! of a trace a [`Scaffold`] names, with enough state snapshotted to
//! restore the exact prior trace if a proposal is rejected.
//!
//! Grounded on the teacher's `HypergraphImpl::detach_edge`/`restore_edge`
//! pair (`asm-graph::hypergraph`): detach never destroys information it
//! cannot put back, and a `restore: bool` flag on regen picks between
//! replaying the proposed state (forward) or rebuilding the exact
//! pre-detach configuration byte-for-byte from the snapshot, reusing
//! [`Trace::resurrect_node_exclusive`] to bring back the old brush rather
//! than re-deriving it via a fresh `simulate`/`eval_family` pass (spec.md
//! §4.6's reversibility contract: a rejected proposal must restore the
//! exact prior trace, not merely an equivalent one).

use std::collections::BTreeMap;

use venture_core::{Args, EnvId, LatentDbHandle, NodeId, SpAux, Value, VentureError};
use venture_trace::{NodeKind, Trace};

use crate::scaffold::{NodeRole, Scaffold};

/// Snapshot of everything [`detach`] needs to be able to undo.
pub struct RollbackDb {
    values: BTreeMap<NodeId, Value>,
    spaux_snapshots: BTreeMap<NodeId, Box<dyn SpAux>>,
    latent_dbs: BTreeMap<NodeId, LatentDbHandle>,
    /// Pre-detach ESR-parent list of every `Output` node in the scaffold
    /// that pairs with a requesting SP, so a restore pass can bring the
    /// exact prior brush back instead of drawing a fresh one.
    esr_parents: BTreeMap<NodeId, Vec<NodeId>>,
    /// Sum of `log p(value)` over every `Absorbing`/`Aaa` node, evaluated
    /// against the trace as it stood just before detachment.
    pub old_log_weight: f64,
}

impl RollbackDb {
    /// The value a node held just before detachment.
    pub fn old_value(&self, node: NodeId) -> Option<&Value> {
        self.values.get(&node)
    }

    /// The latent-state snapshot a node's SP detached, if it has one (spec
    /// §9 "`DB::getLatentDB` return type").
    pub fn latent_db(&self, node: NodeId) -> Option<&LatentDbHandle> {
        self.latent_dbs.get(&node)
    }

    /// The ESR-parent roots an output node held just before detachment.
    pub fn esr_parents(&self, output_node: NodeId) -> Option<&[NodeId]> {
        self.esr_parents.get(&output_node).map(Vec::as_slice)
    }
}

struct OutputArgsData {
    operands: Vec<Value>,
    operand_nodes: Vec<NodeId>,
    esr_values: Vec<Value>,
    esr_nodes: Vec<NodeId>,
    environment: EnvId,
}

fn gather_output_args(trace: &Trace, output_node: NodeId) -> Result<OutputArgsData, VentureError> {
    let operand_nodes = operand_nodes_of(trace, output_node)?;
    let operands = trace.operand_values(&operand_nodes)?;
    let esr_nodes = trace.nodes().get(output_node)?.esr_parents().to_vec();
    let esr_values = trace.operand_values(&esr_nodes)?;
    let environment = trace.nodes().output_env(output_node)?;
    Ok(OutputArgsData {
        operands,
        operand_nodes,
        esr_values,
        esr_nodes,
        environment,
    })
}

/// Tears down the scaffold: walks [`Scaffold::order`] back to front,
/// unincorporating every DRG/Principal output's contribution and every
/// Absorbing/Aaa node's contribution, snapshotting enough to rebuild the
/// old configuration on reject.
pub fn detach(trace: &mut Trace, scaffold: &Scaffold) -> Result<RollbackDb, VentureError> {
    let mut values = BTreeMap::new();
    let mut spaux_snapshots: BTreeMap<NodeId, Box<dyn SpAux>> = BTreeMap::new();
    let mut latent_dbs: BTreeMap<NodeId, LatentDbHandle> = BTreeMap::new();
    let mut esr_parents: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    let mut old_log_weight = 0.0;

    for node in scaffold.order().iter().rev().copied() {
        let role = scaffold.role(node)?;
        let old_value = trace.nodes().get(node)?.value().cloned();
        if let Some(value) = &old_value {
            values.insert(node, value.clone());
        }

        let operator = match trace.nodes().get(node)?.kind() {
            NodeKind::Output { operator, .. } => {
                let parents = trace.nodes().get(node)?.esr_parents().to_vec();
                if !parents.is_empty() {
                    esr_parents.insert(node, parents);
                }
                Some(*operator)
            }
            _ => None,
        };
        let (Some(operator), Some(old_value)) = (operator, old_value) else {
            continue;
        };

        if !spaux_snapshots.contains_key(&operator) {
            let snapshot = trace
                .nodes()
                .get(operator)?
                .spaux()
                .map(|aux| aux.clone_box());
            if let Some(snapshot) = snapshot {
                spaux_snapshots.insert(operator, snapshot);
            }
        }

        let sp_id = trace.procedure_of(operator)?;
        let psp = trace.output_psp(sp_id)?;
        let data = gather_output_args(trace, node)?;

        if matches!(role, NodeRole::Absorbing | NodeRole::Aaa) {
            let (spaux, _rng) = trace.spaux_and_rng_mut(operator)?;
            let args = Args {
                operands: data.operands.clone(),
                operand_nodes: data.operand_nodes.clone(),
                request_node: None,
                output_node: node,
                esr_values: data.esr_values.clone(),
                esr_nodes: data.esr_nodes.clone(),
                environment: data.environment,
                spaux,
                envs: None,
                sps: None,
            };
            old_log_weight += psp.log_density(&old_value, &args)?;
        }

        let (spaux, _rng) = trace.spaux_and_rng_mut(operator)?;
        let mut args = Args {
            operands: data.operands,
            operand_nodes: data.operand_nodes,
            request_node: None,
            output_node: node,
            esr_values: data.esr_values,
            esr_nodes: data.esr_nodes,
            environment: data.environment,
            spaux,
            envs: None,
            sps: None,
        };
        psp.unincorporate(&old_value, &mut args);
        if psp.has_latents() {
            if let Some(handle) = psp.detach_latents(&mut args) {
                latent_dbs.insert(node, handle);
            }
        }
    }

    Ok(RollbackDb {
        values,
        spaux_snapshots,
        latent_dbs,
        esr_parents,
        old_log_weight,
    })
}

/// Regenerates the scaffold in forward order. `restore == false` replays
/// the proposal that is already installed on each `Principal` node (the
/// caller sets that value on the trace before calling this); `restore ==
/// true` rebuilds the exact pre-detach configuration from `rollback`
/// instead — old values, old spaux, old latents, and the old brush, all
/// reused rather than resimulated. Returns the sum of `log p(value)` over
/// every `Absorbing`/`Aaa` node under the regenerated operand values.
pub fn regen(
    trace: &mut Trace,
    scaffold: &Scaffold,
    restore: bool,
    rollback: &RollbackDb,
) -> Result<f64, VentureError> {
    let mut new_log_weight = 0.0;
    for node in scaffold.order().iter().copied() {
        new_log_weight += regen_node(trace, scaffold, node, restore, rollback)?;
    }
    if restore {
        for (operator, snapshot) in &rollback.spaux_snapshots {
            trace.nodes_mut().set_spaux(*operator, snapshot.clone_box())?;
        }
    }
    Ok(new_log_weight)
}

/// Regenerates exactly one scaffold node, as `regen`'s loop body. Exposed
/// separately so a particle-filter kernel can interleave resampling between
/// nodes (spec.md §4.8's Particle-Gibbs driver runs this one node at a time
/// across many particles rather than draining a whole scaffold per particle).
pub fn regen_node(
    trace: &mut Trace,
    scaffold: &Scaffold,
    node: NodeId,
    restore: bool,
    rollback: &RollbackDb,
) -> Result<f64, VentureError> {
    let role = scaffold.role(node)?;
    let kind = trace.nodes().get(node)?.kind().clone();
    match kind {
        NodeKind::Constant => Ok(0.0),
        NodeKind::Lookup { source } => {
            let value = trace.nodes().get(source)?.value().cloned();
            if let Some(value) = value {
                trace.nodes_mut().set_value(node, value)?;
            }
            Ok(0.0)
        }
        NodeKind::Request {
            operator,
            operands,
            env,
        } => {
            let output_node = trace.nodes().paired_output(node)?;
            if let Some(output_node) = output_node {
                while let Some(old_root) = trace.nodes_mut().pop_esr_parent(output_node)? {
                    trace.forget_node_exclusive(old_root)?;
                }
            }

            if restore {
                if let Some(output_node) = output_node {
                    if let Some(old_roots) = rollback.esr_parents(output_node) {
                        for root in old_roots.to_vec() {
                            trace.resurrect_node_exclusive(root)?;
                            trace.nodes_mut().push_esr_parent(output_node, root)?;
                        }
                    }
                }
                let old_request_value = rollback.old_value(node).cloned().ok_or_else(|| {
                    VentureError::invariant(
                        "missing-request-value",
                        "restore called without a snapshotted value for a request node",
                    )
                })?;
                trace.nodes_mut().set_value(node, old_request_value)?;
                return Ok(0.0);
            }

            let operand_values = trace.operand_values(&operands)?;
            let sp_id = trace.procedure_of(operator)?;
            let psp = trace.request_psp(sp_id)?;

            let request_value = {
                let (spaux, rng) = trace.spaux_and_rng_mut(operator)?;
                let mut args = Args {
                    operands: operand_values,
                    operand_nodes: operands.clone(),
                    request_node: Some(node),
                    output_node: output_node.unwrap_or(node),
                    esr_values: Vec::new(),
                    esr_nodes: Vec::new(),
                    environment: env,
                    spaux,
                    envs: None,
                    sps: None,
                };
                psp.simulate(&mut args, rng)?
            };
            trace.nodes_mut().set_value(node, request_value.clone())?;

            if let Some(output_node) = output_node {
                for (_, expr, req_env) in flatten_requests(&request_value) {
                    let root = trace.eval_family(req_env, &expr)?;
                    trace.nodes_mut().push_esr_parent(output_node, root)?;
                }
            }
            Ok(0.0)
        }
        NodeKind::Output { operator, .. } => {
            let sp_id = trace.procedure_of(operator)?;
            let psp = trace.output_psp(sp_id)?;
            let data = gather_output_args(trace, node)?;

            match role {
                NodeRole::Principal => {
                    let new_value = trace.nodes().get(node)?.value().cloned().ok_or_else(|| {
                        VentureError::invariant(
                            "missing-principal-value",
                            "regen called without a value pre-set on a principal node",
                        )
                    })?;
                    let (spaux, rng) = trace.spaux_and_rng_mut(operator)?;
                    let mut args = Args {
                        operands: data.operands,
                        operand_nodes: data.operand_nodes,
                        request_node: None,
                        output_node: node,
                        esr_values: data.esr_values,
                        esr_nodes: data.esr_nodes,
                        environment: data.environment,
                        spaux,
                        envs: None,
                        sps: None,
                    };
                    psp.incorporate(&new_value, &mut args);
                    let latent_weight = if psp.has_latents() {
                        let latent_db = if restore { rollback.latent_db(node) } else { None };
                        psp.simulate_latents(&mut args, restore, latent_db, rng)?
                    } else {
                        0.0
                    };
                    Ok(latent_weight)
                }
                NodeRole::Drg => {
                    if restore {
                        let old_value = rollback.old_value(node).cloned().ok_or_else(|| {
                            VentureError::invariant(
                                "missing-drg-value",
                                "restore called without a snapshotted value for a DRG node",
                            )
                        })?;
                        let (spaux, rng) = trace.spaux_and_rng_mut(operator)?;
                        let mut args = Args {
                            operands: data.operands,
                            operand_nodes: data.operand_nodes,
                            request_node: None,
                            output_node: node,
                            esr_values: data.esr_values,
                            esr_nodes: data.esr_nodes,
                            environment: data.environment,
                            spaux,
                            envs: None,
                            sps: None,
                        };
                        psp.incorporate(&old_value, &mut args);
                        let latent_weight = if psp.has_latents() {
                            psp.simulate_latents(&mut args, true, rollback.latent_db(node), rng)?
                        } else {
                            0.0
                        };
                        trace.nodes_mut().set_value(node, old_value)?;
                        return Ok(latent_weight);
                    }
                    let (spaux, rng) = trace.spaux_and_rng_mut(operator)?;
                    let mut args = Args {
                        operands: data.operands,
                        operand_nodes: data.operand_nodes,
                        request_node: None,
                        output_node: node,
                        esr_values: data.esr_values,
                        esr_nodes: data.esr_nodes,
                        environment: data.environment,
                        spaux,
                        envs: None,
                        sps: None,
                    };
                    let value = psp.simulate(&mut args, rng)?;
                    psp.incorporate(&value, &mut args);
                    let latent_weight = if psp.has_latents() {
                        psp.simulate_latents(&mut args, false, None, rng)?
                    } else {
                        0.0
                    };
                    trace.nodes_mut().set_value(node, value)?;
                    Ok(latent_weight)
                }
                NodeRole::Absorbing | NodeRole::Aaa => {
                    let fixed_value = trace.nodes().get(node)?.value().cloned().ok_or_else(|| {
                        VentureError::invariant(
                            "missing-absorbing-value",
                            "absorbing node has no cached value to rescore",
                        )
                    })?;
                    let (spaux, _rng) = trace.spaux_and_rng_mut(operator)?;
                    let mut args = Args {
                        operands: data.operands,
                        operand_nodes: data.operand_nodes,
                        request_node: None,
                        output_node: node,
                        esr_values: data.esr_values,
                        esr_nodes: data.esr_nodes,
                        environment: data.environment,
                        spaux,
                        envs: None,
                        sps: None,
                    };
                    let log_density = psp.log_density(&fixed_value, &args)?;
                    psp.incorporate(&fixed_value, &mut args);
                    Ok(log_density)
                }
            }
        }
    }
}

fn operand_nodes_of(trace: &Trace, output_node: NodeId) -> Result<Vec<NodeId>, VentureError> {
    match trace.nodes().get(output_node)?.kind() {
        NodeKind::Output { operands, .. } => Ok(operands.clone()),
        _ => Err(VentureError::invariant(
            "not-an-output-node",
            "operand_nodes_of called on a non-output node",
        )),
    }
}

fn flatten_requests(
    value: &Value,
) -> Vec<(venture_core::RequestId, std::rc::Rc<venture_core::Expression>, EnvId)> {
    match value {
        Value::Request(id, expr, env) => vec![(*id, expr.clone(), *env)],
        Value::Array(items) => items.iter().flat_map(flatten_requests).collect(),
        _ => Vec::new(),
    }
}
