//! The node arena: a slab of trace nodes addressed by [`NodeId`], with
//! alive-flag soft deletion and back-edge bookkeeping.
//!
//! Grounded on the teacher's `HypergraphImpl` (`asm-graph::hypergraph`):
//! nodes are never physically removed from the backing `Vec`, only marked
//! `alive = false`, so that `NodeId`s handed out before a detach stay valid
//! (a dangling lookup is a programmer error to be reported, not a use of a
//! freed slot) and so the detach/regen protocol (`venture-scaffold`) can
//! resurrect a node by flipping the flag back rather than re-allocating.

use std::collections::BTreeSet;

use venture_core::{EnvId, FamilyId, NodeId, VentureError};
use venture_core::{SpAux, Value};

/// What kind of node this is and who its structural parents are.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A self-evaluating literal; no parents.
    Constant,
    /// A symbol lookup; its single parent is the node the symbol resolved
    /// to in some enclosing environment frame.
    Lookup {
        /// The node being looked up.
        source: NodeId,
    },
    /// The request half of an application: simulating it may yield ESR
    /// edges that regeneration must also walk.
    Request {
        /// The operator node (must evaluate to a `Value::Procedure`).
        operator: NodeId,
        /// The operand nodes, in argument order.
        operands: Vec<NodeId>,
        /// The environment the application was evaluated in.
        env: EnvId,
    },
    /// The output half of an application, paired 1:1 with a `Request` node.
    Output {
        /// The operator node (same as the paired request node's).
        operator: NodeId,
        /// The operand nodes, in argument order.
        operands: Vec<NodeId>,
        /// The paired request node.
        request: NodeId,
    },
}

/// A single slot in the node arena.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    kind: NodeKind,
    value: Option<Value>,
    alive: bool,
    /// Back-edges: nodes whose `kind` names this node as a parent.
    children: BTreeSet<NodeId>,
    /// Existing-simulation-request parents, populated once this node's
    /// paired request has been simulated and its ESR family regenerated.
    /// Empty for anything but an `Output` node of a requesting SP.
    esr_parents: Vec<NodeId>,
    /// Set exactly once, when this node is the root of a family created by
    /// a top-level directive or by a request-PSP's ESR.
    family_id: Option<FamilyId>,
    /// Present only on nodes whose value is a `Value::Procedure` that owns
    /// mutable sufficient statistics (e.g. `make_csp`-produced compound
    /// procedures, or exchangeable couplers).
    spaux: Option<Box<dyn SpAux>>,
}

impl NodeRecord {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            value: None,
            alive: true,
            children: BTreeSet::new(),
            esr_parents: Vec::new(),
            family_id: None,
            spaux: None,
        }
    }

    /// The node's structural kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The node's current cached value, if it has simulated one.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Whether the node is alive (not currently detached).
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// The node's existing-simulation-request parents.
    pub fn esr_parents(&self) -> &[NodeId] {
        &self.esr_parents
    }

    /// The node's auxiliary state, if it owns any.
    pub fn spaux(&self) -> Option<&dyn SpAux> {
        self.spaux.as_deref()
    }

    /// Mutable access to the node's auxiliary state, if it owns any.
    pub fn spaux_mut(&mut self) -> Option<&mut dyn SpAux> {
        self.spaux.as_deref_mut()
    }

    /// The node's structural parents, in a fixed traversal order: operator,
    /// then operands, then (for `Output`) its paired request, then its ESR
    /// parents last. `Lookup`'s single parent is its source.
    pub fn parents(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Constant => Vec::new(),
            NodeKind::Lookup { source } => vec![*source],
            NodeKind::Request {
                operator, operands, ..
            } => {
                let mut parents = Vec::with_capacity(operands.len() + 1);
                parents.push(*operator);
                parents.extend(operands.iter().copied());
                parents
            }
            NodeKind::Output {
                operator,
                operands,
                request,
            } => {
                let mut parents = Vec::with_capacity(operands.len() + 2 + self.esr_parents.len());
                parents.push(*operator);
                parents.extend(operands.iter().copied());
                parents.push(*request);
                parents.extend(self.esr_parents.iter().copied());
                parents
            }
        }
    }
}

/// A slab-backed arena of trace nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<NodeRecord>,
}

impl NodeArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push(&mut self, record: NodeRecord) -> NodeId {
        let id = NodeId::from_raw(self.nodes.len() as u64);
        self.nodes.push(record);
        id
    }

    fn wire_parents(&mut self, id: NodeId, parents: &[NodeId]) {
        for parent in parents {
            self.nodes[parent.as_raw() as usize].children.insert(id);
        }
    }

    /// Allocates a constant node.
    pub fn add_constant(&mut self, value: Value) -> NodeId {
        let mut record = NodeRecord::new(NodeKind::Constant);
        record.value = Some(value);
        self.push(record)
    }

    /// Allocates a lookup node whose value mirrors `source`'s.
    pub fn add_lookup(&mut self, source: NodeId) -> NodeId {
        let id = self.push(NodeRecord::new(NodeKind::Lookup { source }));
        self.wire_parents(id, &[source]);
        id
    }

    /// Allocates a request node.
    pub fn add_request(&mut self, operator: NodeId, operands: Vec<NodeId>, env: EnvId) -> NodeId {
        let mut parents = vec![operator];
        parents.extend(operands.iter().copied());
        let id = self.push(NodeRecord::new(NodeKind::Request {
            operator,
            operands,
            env,
        }));
        self.wire_parents(id, &parents);
        id
    }

    /// Allocates an output node paired with `request`.
    pub fn add_output(&mut self, operator: NodeId, operands: Vec<NodeId>, request: NodeId) -> NodeId {
        let mut parents = vec![operator];
        parents.extend(operands.iter().copied());
        parents.push(request);
        let id = self.push(NodeRecord::new(NodeKind::Output {
            operator,
            operands,
            request,
        }));
        self.wire_parents(id, &parents);
        id
    }

    /// Looks up a node record, erroring if the id is out of range.
    pub fn get(&self, id: NodeId) -> Result<&NodeRecord, VentureError> {
        self.nodes.get(id.as_raw() as usize).ok_or_else(|| {
            VentureError::invariant("unknown-node", format!("no such node: {}", id.as_raw()))
        })
    }

    /// Mutable lookup of a node record, erroring if the id is out of range.
    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord, VentureError> {
        self.nodes.get_mut(id.as_raw() as usize).ok_or_else(|| {
            VentureError::invariant("unknown-node", format!("no such node: {}", id.as_raw()))
        })
    }

    /// Sets a node's cached value.
    pub fn set_value(&mut self, id: NodeId, value: Value) -> Result<(), VentureError> {
        self.get_mut(id)?.value = Some(value);
        Ok(())
    }

    /// Clears a node's cached value (it becomes un-simulated).
    pub fn clear_value(&mut self, id: NodeId) -> Result<(), VentureError> {
        self.get_mut(id)?.value = None;
        Ok(())
    }

    /// Marks `id`'s family root, used when a directive or ESR mints a new
    /// family.
    pub fn set_family_id(&mut self, id: NodeId, family: FamilyId) -> Result<(), VentureError> {
        self.get_mut(id)?.family_id = Some(family);
        Ok(())
    }

    /// The family id this node roots, if any.
    pub fn family_id(&self, id: NodeId) -> Result<Option<FamilyId>, VentureError> {
        Ok(self.get(id)?.family_id)
    }

    /// Appends an ESR parent to an `Output` node, recording the back-edge.
    pub fn push_esr_parent(&mut self, output: NodeId, esr_root: NodeId) -> Result<(), VentureError> {
        self.get_mut(output)?.esr_parents.push(esr_root);
        self.nodes[esr_root.as_raw() as usize].children.insert(output);
        Ok(())
    }

    /// Removes the last-pushed ESR parent from an `Output` node (used when
    /// unwinding a rejected proposal that had extended the ESR list).
    pub fn pop_esr_parent(&mut self, output: NodeId) -> Result<Option<NodeId>, VentureError> {
        let record = self.get_mut(output)?;
        let popped = record.esr_parents.pop();
        if let Some(esr_root) = popped {
            self.nodes[esr_root.as_raw() as usize]
                .children
                .remove(&output);
        }
        Ok(popped)
    }

    /// Installs (or replaces) the auxiliary state owned by `id`.
    pub fn set_spaux(&mut self, id: NodeId, spaux: Box<dyn SpAux>) -> Result<(), VentureError> {
        self.get_mut(id)?.spaux = Some(spaux);
        Ok(())
    }

    /// Follows `Lookup` parent chains from `node` to the node that
    /// originally produced its value. A `Value::Procedure` with auxiliary
    /// state (an `assume`d exchangeable coupler, a `mem`-wrapped procedure)
    /// is invoked through a fresh `Lookup` node at every call site, but its
    /// `spaux` must accumulate in one stable place rather than reset per
    /// site; this is the node callers should read and write that state on.
    pub fn spaux_owner(&self, node: NodeId) -> Result<NodeId, VentureError> {
        let mut cursor = node;
        loop {
            match self.get(cursor)?.kind() {
                NodeKind::Lookup { source } => cursor = *source,
                _ => return Ok(cursor),
            }
        }
    }

    /// Marks a node detached. Structural edges are left intact so `restore`
    /// can bring it back exactly as it was; only `alive` flips.
    pub fn detach(&mut self, id: NodeId) -> Result<(), VentureError> {
        self.get_mut(id)?.alive = false;
        Ok(())
    }

    /// Reverses [`NodeArena::detach`].
    pub fn restore(&mut self, id: NodeId) -> Result<(), VentureError> {
        self.get_mut(id)?.alive = true;
        Ok(())
    }

    /// The children (back-edges) of a node: every node whose `parents()`
    /// includes `id`.
    pub fn children(&self, id: NodeId) -> Result<&BTreeSet<NodeId>, VentureError> {
        Ok(&self.get(id)?.children)
    }

    /// The number of live slots ever allocated (includes detached nodes).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena has allocated any nodes yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds the `Output` node paired with `request_node`, if any has been
    /// created yet.
    pub fn paired_output(&self, request_node: NodeId) -> Result<Option<NodeId>, VentureError> {
        for child in self.children(request_node)? {
            if let NodeKind::Output { request, .. } = self.get(*child)?.kind() {
                if *request == request_node {
                    return Ok(Some(*child));
                }
            }
        }
        Ok(None)
    }

    /// Every id ever allocated, in allocation order (includes detached
    /// nodes; callers filter on [`NodeRecord::is_alive`]).
    pub fn iter_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u64).map(NodeId::from_raw)
    }

    /// The environment an application was evaluated in, read off its
    /// paired request node.
    pub fn output_env(&self, output_node: NodeId) -> Result<EnvId, VentureError> {
        let request = match self.get(output_node)?.kind() {
            NodeKind::Output { request, .. } => *request,
            _ => {
                return Err(VentureError::invariant(
                    "not-an-output-node",
                    "output_env called on a non-output node",
                ))
            }
        };
        match self.get(request)?.kind() {
            NodeKind::Request { env, .. } => Ok(*env),
            _ => Err(VentureError::invariant(
                "malformed-pair",
                "output node's request field does not point at a request node",
            )),
        }
    }
}
