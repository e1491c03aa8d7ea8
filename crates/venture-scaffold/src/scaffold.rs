//! Scaffold construction: given a set of principal nodes a kernel wants to
//! resimulate, computes the four-way partition of everything structurally
//! downstream of them (spec §4.4): the Definite Regeneration Graph (DRG),
//! the Absorbing boundary, the Absorbing-At-Applications (AAA) boundary,
//! and (implicitly, discovered only during regeneration) the brush.
//!
//! Grounded on the teacher's `rewire.rs` dry-run/commit split: building a
//! scaffold is the "dry-run" analysis pass (read-only, just walks
//! `children()` edges) that [`crate::detach_regen`] later commits against.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use venture_core::{Args, NodeId, OutputPsp, VentureError};
use venture_trace::{NodeKind, Trace};

/// A downstream node's role in one scaffold (spec §4.4's four-way
/// partition; brush is not listed here because it is discovered fresh each
/// time the scaffold is regenerated rather than fixed at build time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Selected by the kernel for resimulation.
    Principal,
    /// Downstream and must be recomputed because its value structurally
    /// depends on a principal or DRG node (lookups, requests, and
    /// applications of a deterministic procedure).
    Drg,
    /// A downstream application of a random, non-exchangeable procedure.
    /// Its cached value is held fixed; only its log density under the new
    /// operand values is recomputed, and propagation stops here.
    Absorbing,
    /// A downstream application of an exchangeable-coupler procedure
    /// (`is_aaa() == true`, e.g. a collapsed sufficient-statistic sampler).
    /// Like `Absorbing`, its value is held fixed and propagation stops,
    /// but its sufficient statistics are unincorporated/incorporated rather
    /// than merely rescored.
    Aaa,
}

/// The result of a scaffold build: every node reachable downstream of the
/// principal set, in forward topological order, tagged with its role.
#[derive(Debug, Clone)]
pub struct Scaffold {
    principal: Vec<NodeId>,
    order: Vec<NodeId>,
    roles: BTreeMap<NodeId, NodeRole>,
}

impl Scaffold {
    /// Builds a scaffold over `principal` nodes in `trace`. Takes `trace`
    /// mutably because classifying an `Output` node calls its PSP's
    /// `can_absorb(args)`, which needs a real [`Args`] (including a mutable
    /// handle to the operator's own auxiliary state) to evaluate.
    pub fn build(trace: &mut Trace, principal: Vec<NodeId>) -> Result<Scaffold, VentureError> {
        let mut roles = BTreeMap::new();
        let mut order = Vec::new();
        let mut visited: BTreeSet<NodeId> = BTreeSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();

        for node in &principal {
            roles.insert(*node, NodeRole::Principal);
            visited.insert(*node);
            order.push(*node);
            queue.push_back(*node);
        }

        while let Some(node) = queue.pop_front() {
            for child in trace.nodes().children(node)?.clone() {
                if !trace.nodes().get(child)?.is_alive() || visited.contains(&child) {
                    continue;
                }
                visited.insert(child);
                let role = classify(trace, child)?;
                roles.insert(child, role);
                order.push(child);
                if matches!(role, NodeRole::Drg) {
                    queue.push_back(child);
                }
            }
        }

        Ok(Scaffold {
            principal,
            order,
            roles,
        })
    }

    /// The kernel-selected principal nodes, in the order supplied to
    /// [`Scaffold::build`].
    pub fn principal(&self) -> &[NodeId] {
        &self.principal
    }

    /// Every node in the scaffold (principal plus downstream), in forward
    /// topological order: safe to walk front-to-back for regeneration and
    /// back-to-front for detachment.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// The role assigned to `node`, or an error if it is not part of this
    /// scaffold.
    pub fn role(&self, node: NodeId) -> Result<NodeRole, VentureError> {
        self.roles.get(&node).copied().ok_or_else(|| {
            VentureError::invariant(
                "not-in-scaffold",
                format!("node {} is not part of this scaffold", node.as_raw()),
            )
        })
    }

    /// Whether `node` is any part of this scaffold.
    pub fn contains(&self, node: NodeId) -> bool {
        self.roles.contains_key(&node)
    }
}

fn classify(trace: &mut Trace, node: NodeId) -> Result<NodeRole, VentureError> {
    let (operator, operand_nodes) = match trace.nodes().get(node)?.kind() {
        NodeKind::Constant | NodeKind::Lookup { .. } | NodeKind::Request { .. } => {
            return Ok(NodeRole::Drg)
        }
        NodeKind::Output {
            operator, operands, ..
        } => (*operator, operands.clone()),
    };

    let sp_id = trace.procedure_of(operator)?;
    let psp = trace.output_psp(sp_id)?;
    if psp.is_aaa() {
        return Ok(NodeRole::Aaa);
    }
    if !psp.is_random() {
        return Ok(NodeRole::Drg);
    }

    let operands = trace.operand_values(&operand_nodes)?;
    let esr_nodes = trace.nodes().get(node)?.esr_parents().to_vec();
    let esr_values = trace.operand_values(&esr_nodes)?;
    let environment = trace.nodes().output_env(node)?;
    let (spaux, _rng) = trace.spaux_and_rng_mut(operator)?;
    let args = Args {
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

    if psp.can_absorb(&args) {
        Ok(NodeRole::Absorbing)
    } else {
        Ok(NodeRole::Drg)
    }
}
