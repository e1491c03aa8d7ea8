//! The directive-level trace: owns the node arena, environment arena and SP
//! registry, and exposes the host-facing directive operations (spec §6),
//! grounded directly on the original implementation's `PyTrace` class
//! (`evalExpression`, `extractPythonValue`, `bindInGlobalEnv`, `observe`).

use std::collections::BTreeSet;
use std::rc::Rc;

use venture_core::{
    Args, DirectiveId, EnvId, Expression, FamilyId, NodeId, OutputPsp, RequestPsp, RngHandle,
    SpAux, SpId, SpRegistry, Value, VentureError,
};

use crate::arena::NodeArena;
use crate::compound::{CompoundOutputPsp, CompoundRequestPsp};
use crate::env::EnvArena;

#[derive(Clone)]
struct SpEntry {
    request: Rc<dyn RequestPsp>,
    output: Rc<dyn OutputPsp>,
}

impl SpRegistry for Vec<SpEntry> {
    fn register(&mut self, request: Box<dyn RequestPsp>, output: Box<dyn OutputPsp>) -> SpId {
        let id = SpId::from_raw(self.len() as u64);
        self.push(SpEntry {
            request: Rc::from(request),
            output: Rc::from(output),
        });
        id
    }
}

/// The full mutable state of one trace: its node arena, environment chain,
/// registered stochastic procedures, and the bookkeeping the host bridge
/// needs (directive -> family root, which nodes are observed).
///
/// Cheaply `Clone`: the node/environment arenas and `SpAux` snapshots are
/// deep-copied, but registered PSPs are `Rc`-shared, not re-boxed. Used by
/// the particle-Gibbs kernel (`venture-infer::pgibbs`), which needs several
/// independent candidate trajectories alive at once.
#[derive(Clone)]
pub struct Trace {
    nodes: NodeArena,
    envs: EnvArena,
    global_env: EnvId,
    sps: Vec<SpEntry>,
    directives: Vec<(DirectiveId, NodeId, FamilyId)>,
    next_family: u64,
    constrained: BTreeSet<NodeId>,
    rng: RngHandle,
}

impl Trace {
    /// Creates an empty trace seeded deterministically from `seed`.
    pub fn new(seed: u64) -> Self {
        let (envs, global_env) = EnvArena::new();
        Self {
            nodes: NodeArena::new(),
            envs,
            global_env,
            sps: Vec::new(),
            directives: Vec::new(),
            next_family: 0,
            constrained: BTreeSet::new(),
            rng: RngHandle::from_seed(seed),
        }
    }

    /// Read access to the node arena, for the scaffold/detach-regen crate.
    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    /// Mutable access to the node arena, for the scaffold/detach-regen
    /// crate's traversal.
    pub fn nodes_mut(&mut self) -> &mut NodeArena {
        &mut self.nodes
    }

    /// Read access to the environment arena.
    pub fn envs(&self) -> &EnvArena {
        &self.envs
    }

    /// Mutable access to the environment arena.
    pub fn envs_mut(&mut self) -> &mut EnvArena {
        &mut self.envs
    }

    /// The root (outermost) environment.
    pub fn global_env(&self) -> EnvId {
        self.global_env
    }

    /// Mutable access to the trace's own RNG stream.
    pub fn rng_mut(&mut self) -> &mut RngHandle {
        &mut self.rng
    }

    /// Whether `node` is currently held constant by an observation.
    pub fn is_constrained(&self, node: NodeId) -> bool {
        self.constrained.contains(&node)
    }

    /// The full set of currently-constrained output nodes.
    pub fn constrained_nodes(&self) -> &BTreeSet<NodeId> {
        &self.constrained
    }

    /// Every currently-live, unconstrained `Output` node whose procedure is
    /// random: the pool a kernel may pick a principal node from (spec §4.7
    /// step 1's `randomChoices`).
    pub fn random_choices(&self) -> Result<Vec<NodeId>, VentureError> {
        let mut choices = Vec::new();
        for id in self.nodes.iter_ids() {
            let record = self.nodes.get(id)?;
            if !record.is_alive() || self.constrained.contains(&id) {
                continue;
            }
            if let crate::arena::NodeKind::Output { operator, .. } = record.kind() {
                let sp_id = self.procedure_of(*operator)?;
                if self.output_psp(sp_id)?.is_random() {
                    choices.push(id);
                }
            }
        }
        Ok(choices)
    }

    /// Registers a stochastic procedure's PSP pair and returns its id. The
    /// registry is append-only; SPs are never unregistered (mirrors the
    /// node arena's own alive-flag-not-physical-removal discipline).
    pub fn register_sp(&mut self, request: Box<dyn RequestPsp>, output: Box<dyn OutputPsp>) -> SpId {
        self.sps.register(request, output)
    }

    fn sp(&self, id: SpId) -> Result<&SpEntry, VentureError> {
        self.sps.get(id.as_raw() as usize).ok_or_else(|| {
            VentureError::invariant("unknown-sp", format!("no such procedure: {}", id.as_raw()))
        })
    }

    /// Exposes a registered procedure's output PSP as a cheaply-cloned
    /// handle (kernels and the scaffold crate need to call `simulate`/
    /// `log_density` while also holding a mutable borrow of the trace, so
    /// an owned `Rc` rather than a borrowed reference is returned).
    pub fn output_psp(&self, id: SpId) -> Result<Rc<dyn OutputPsp>, VentureError> {
        Ok(self.sp(id)?.output.clone())
    }

    /// Exposes a registered procedure's request PSP as a cheaply-cloned
    /// handle, for the same reason as [`Trace::output_psp`].
    pub fn request_psp(&self, id: SpId) -> Result<Rc<dyn RequestPsp>, VentureError> {
        Ok(self.sp(id)?.request.clone())
    }

    /// Splits a mutable borrow of the trace into the operator node's
    /// auxiliary-state slot and the trace's RNG stream, so a caller can
    /// build an [`Args`] and pass the RNG to a PSP method in the same
    /// statement.
    pub fn spaux_and_rng_mut(
        &mut self,
        operator: NodeId,
    ) -> Result<(Option<&mut dyn SpAux>, &mut RngHandle), VentureError> {
        let owner = self.nodes.spaux_owner(operator)?;
        let spaux = self.nodes.get_mut(owner)?.spaux_mut();
        Ok((spaux, &mut self.rng))
    }

    /// The stochastic procedure id an operator node currently evaluates to.
    pub fn procedure_of(&self, node: NodeId) -> Result<SpId, VentureError> {
        match self.nodes.get(node)?.value() {
            Some(Value::Procedure(sp_id)) => Ok(*sp_id),
            Some(other) => Err(VentureError::type_error(
                "combine",
                "procedure",
                other.kind_name(),
            )),
            None => Err(VentureError::invariant(
                "unsimulated-operator",
                "operator node has no value yet",
            )),
        }
    }

    /// Builds and simulates a fresh family for `expr` evaluated in `env`,
    /// returning its root node. Used both by top-level directives and by
    /// request-PSPs that construct brush (`branch`, `mem`, `eval`).
    pub fn eval_family(&mut self, env: EnvId, expr: &Expression) -> Result<NodeId, VentureError> {
        match expr {
            Expression::Literal(lit) => Ok(self.nodes.add_constant(lit.to_value())),
            Expression::Variable(name) => {
                let source = self.envs.lookup(env, name)?;
                let node = self.nodes.add_lookup(source);
                let value = self.nodes.get(source)?.value().cloned();
                if let Some(value) = value {
                    self.nodes.set_value(node, value)?;
                }
                Ok(node)
            }
            Expression::Application(parts) => {
                let operator_node = self.eval_family(env, &parts[0])?;
                let mut operand_nodes = Vec::with_capacity(parts.len().saturating_sub(1));
                for operand_expr in &parts[1..] {
                    operand_nodes.push(self.eval_family(env, operand_expr)?);
                }
                self.apply(operator_node, operand_nodes, env)
            }
            Expression::Lambda(params, body) => {
                let sp_id = self.register_sp(
                    Box::new(CompoundRequestPsp {
                        params: params.clone(),
                        body: body.clone(),
                        closure_env: env,
                    }),
                    Box::new(CompoundOutputPsp),
                );
                Ok(self.nodes.add_constant(Value::Procedure(sp_id)))
            }
        }
    }


    /// Gathers the current cached values of `operand_nodes`, in order.
    pub fn operand_values(&self, operand_nodes: &[NodeId]) -> Result<Vec<Value>, VentureError> {
        operand_nodes
            .iter()
            .map(|id| {
                self.nodes.get(*id)?.value().cloned().ok_or_else(|| {
                    VentureError::invariant("unsimulated-operand", "operand node has no value yet")
                })
            })
            .collect()
    }

    /// Applies the procedure at `operator_node` to `operand_nodes`,
    /// allocating the request/output node pair, simulating the request,
    /// regenerating any ESR brush it names, and simulating the output.
    pub fn apply(
        &mut self,
        operator_node: NodeId,
        operand_nodes: Vec<NodeId>,
        env: EnvId,
    ) -> Result<NodeId, VentureError> {
        let sp_id = self.procedure_of(operator_node)?;
        let spaux_owner = self.nodes.spaux_owner(operator_node)?;
        let operands = self.operand_values(&operand_nodes)?;

        let request_node = self
            .nodes
            .add_request(operator_node, operand_nodes.clone(), env);
        let output_node = self
            .nodes
            .add_output(operator_node, operand_nodes.clone(), request_node);

        let sp_index = sp_id.as_raw() as usize;
        if sp_index >= self.sps.len() {
            return Err(VentureError::invariant(
                "unknown-sp",
                format!("no such procedure: {}", sp_id.as_raw()),
            ));
        }

        if let Some(aux) = self.sps[sp_index].output.initial_spaux(&operands) {
            self.nodes.set_spaux(output_node, aux)?;
        }

        {
            let request_psp = self.sps[sp_index].request.clone();
            let mut args = Args {
                operands: operands.clone(),
                operand_nodes: operand_nodes.clone(),
                request_node: Some(request_node),
                output_node,
                esr_values: Vec::new(),
                esr_nodes: Vec::new(),
                environment: env,
                spaux: self.nodes.get_mut(spaux_owner)?.spaux_mut(),
                envs: Some(&mut self.envs),
                sps: Some(&mut self.sps),
            };
            let request_value = request_psp.simulate(&mut args, &mut self.rng)?;
            self.nodes.set_value(request_node, request_value)?;
        }

        self.regenerate_esrs(request_node, output_node)?;

        let esr_nodes: Vec<NodeId> = self.nodes.get(output_node)?.esr_parents().to_vec();
        let esr_values = self.operand_values(&esr_nodes)?;

        let value = {
            let output_psp = self.sps[sp_index].output.clone();
            let mut args = Args {
                operands,
                operand_nodes,
                request_node: Some(request_node),
                output_node,
                esr_values: esr_values.clone(),
                esr_nodes: esr_nodes.clone(),
                environment: env,
                spaux: self.nodes.get_mut(spaux_owner)?.spaux_mut(),
                envs: Some(&mut self.envs),
                sps: Some(&mut self.sps),
            };
            let value = output_psp.simulate(&mut args, &mut self.rng)?;
            output_psp.incorporate(&value, &mut args);
            value
        };
        self.nodes.set_value(output_node, value)?;
        Ok(output_node)
    }

    /// Walks the request node's simulated value and regenerates any ESR
    /// families it names, wiring each family's root as an ESR parent of
    /// `output_node`.
    fn regenerate_esrs(&mut self, request_node: NodeId, output_node: NodeId) -> Result<(), VentureError> {
        let request_value = self
            .nodes
            .get(request_node)?
            .value()
            .cloned()
            .expect("request node simulated above");
        for requested in flatten_requests(&request_value) {
            let (_, expr, env) = requested;
            let root = self.eval_family(env, &expr)?;
            self.nodes.push_esr_parent(output_node, root)?;
        }
        Ok(())
    }

    /// `eval` directive: builds and simulates a fresh family for `expr` in
    /// the global environment, records it under `directive`, and returns
    /// the resulting value.
    pub fn eval(&mut self, directive: DirectiveId, expr: &Expression) -> Result<Value, VentureError> {
        let root = self.eval_family(self.global_env, expr)?;
        let family = FamilyId::from_raw(self.next_family);
        self.next_family += 1;
        self.nodes.set_family_id(root, family)?;
        self.directives.push((directive, root, family));
        self.extract_value(directive)
    }

    /// Every directive registered so far, as `(directive, family root,
    /// family id)` triples in registration order. Used by the ambient
    /// metrics/checkpoint/manifest layer in `venture-infer`, which needs to
    /// walk directive roots without access to trace internals.
    pub fn directives(&self) -> &[(DirectiveId, NodeId, FamilyId)] {
        &self.directives
    }

    fn directive_root(&self, directive: DirectiveId) -> Result<NodeId, VentureError> {
        self.directives
            .iter()
            .rev()
            .find(|(id, ..)| *id == directive)
            .map(|(_, root, _)| *root)
            .ok_or_else(|| {
                VentureError::invariant(
                    "unknown-directive",
                    format!("no such directive: {}", directive.as_raw()),
                )
            })
    }

    /// `extract_value` directive: returns the current value bound to
    /// `directive`'s root node.
    pub fn extract_value(&self, directive: DirectiveId) -> Result<Value, VentureError> {
        let root = self.directive_root(directive)?;
        self.nodes
            .get(root)?
            .value()
            .cloned()
            .ok_or_else(|| VentureError::invariant("unsimulated-directive", "directive root has no value"))
    }

    /// `bind_in_global_env` directive: binds `symbol` in the global
    /// environment to `directive`'s root node, so later expressions can
    /// refer to it by name (the `assume` surface form).
    pub fn bind_in_global_env(&mut self, symbol: &str, directive: DirectiveId) -> Result<(), VentureError> {
        let root = self.directive_root(directive)?;
        self.envs.bind(self.global_env, symbol, root)
    }

    /// `observe` directive: constrains `directive`'s root node to `value`,
    /// removing it from the pool of nodes kernels may resimulate. Reincorporates
    /// the node's sufficient statistics under the new value (spec §4.4's
    /// `constrain` contract) and errors if the node's PSP is non-assessable
    /// (spec §8's "constraining a node whose PSP is non-assessable is an
    /// error" boundary case).
    pub fn observe(&mut self, directive: DirectiveId, value: Value) -> Result<(), VentureError> {
        let root = self.directive_root(directive)?;
        let (operator, operand_nodes, request_node) = match self.nodes.get(root)?.kind() {
            NodeKind::Output {
                operator,
                operands,
                request,
            } => (*operator, operands.clone(), *request),
            _ => {
                return Err(VentureError::invariant(
                    "non-assessable-constrain",
                    "cannot constrain a non-stochastic node, only a stochastic application",
                ))
            }
        };

        let old_value = self
            .nodes
            .get(root)?
            .value()
            .cloned()
            .ok_or_else(|| VentureError::invariant("unsimulated-directive", "directive root has no value"))?;

        let sp_id = self.procedure_of(operator)?;
        let psp = self.output_psp(sp_id)?;
        let spaux_owner = self.nodes.spaux_owner(operator)?;
        let operands = self.operand_values(&operand_nodes)?;
        let esr_nodes: Vec<NodeId> = self.nodes.get(root)?.esr_parents().to_vec();
        let esr_values = self.operand_values(&esr_nodes)?;
        let env = match self.nodes.get(request_node)?.kind() {
            NodeKind::Request { env, .. } => *env,
            _ => {
                return Err(VentureError::invariant(
                    "malformed-application",
                    "output node's paired request node is not a request",
                ))
            }
        };

        {
            let mut args = Args {
                operands: operands.clone(),
                operand_nodes: operand_nodes.clone(),
                request_node: Some(request_node),
                output_node: root,
                esr_values: esr_values.clone(),
                esr_nodes: esr_nodes.clone(),
                environment: env,
                spaux: self.nodes.get_mut(spaux_owner)?.spaux_mut(),
                envs: None,
                sps: None,
            };
            psp.log_density(&value, &args).map_err(|_| {
                VentureError::invariant(
                    "non-assessable-constrain",
                    "cannot constrain a node whose PSP has no log_density",
                )
            })?;
            psp.unincorporate(&old_value, &mut args);
        }

        self.nodes.set_value(root, value.clone())?;

        {
            let mut args = Args {
                operands,
                operand_nodes,
                request_node: Some(request_node),
                output_node: root,
                esr_values,
                esr_nodes,
                environment: env,
                spaux: self.nodes.get_mut(spaux_owner)?.spaux_mut(),
                envs: None,
                sps: None,
            };
            psp.incorporate(&value, &mut args);
        }

        self.constrained.insert(root);
        Ok(())
    }

    /// Reverses [`Trace::observe`], freeing the node for resimulation again.
    pub fn unobserve(&mut self, directive: DirectiveId) -> Result<(), VentureError> {
        let root = self.directive_root(directive)?;
        self.constrained.remove(&root);
        Ok(())
    }

    /// `forget` directive: detaches the family rooted at `directive`,
    /// unincorporating any random choices it made, stopping wherever a node
    /// is still shared by some other live family.
    pub fn forget(&mut self, directive: DirectiveId) -> Result<(), VentureError> {
        let root = self.directive_root(directive)?;
        self.constrained.remove(&root);
        self.detach_exclusive(root)?;
        self.directives.retain(|(id, ..)| *id != directive);
        Ok(())
    }

    /// Detaches `node` and any of its ancestors left with no other live
    /// child, stopping as soon as a shared ancestor is reached. Used both
    /// by [`Trace::forget`] and by the scaffold crate to tear down obsolete
    /// brush subtrees during regeneration.
    pub fn forget_node_exclusive(&mut self, node: NodeId) -> Result<(), VentureError> {
        self.detach_exclusive(node)
    }

    fn detach_exclusive(&mut self, node: NodeId) -> Result<(), VentureError> {
        if !self.nodes.get(node)?.is_alive() {
            return Ok(());
        }
        let parents = self.nodes.get(node)?.parents();
        self.nodes.detach(node)?;
        for parent in parents {
            let live_children = self
                .nodes
                .children(parent)?
                .iter()
                .any(|child| *child != node && self.nodes.get(*child).map(|n| n.is_alive()).unwrap_or(false));
            if !live_children {
                self.detach_exclusive(parent)?;
            }
        }
        Ok(())
    }

    /// Brings a subtree forgotten by [`Trace::forget_node_exclusive`] back to
    /// life: the exact inverse, flipping `alive` back on `node` and on any of
    /// its structural parents that are still dead. Used by the scaffold
    /// crate to restore the pre-proposal brush of a rejected MH move instead
    /// of re-deriving it via a fresh `simulate`/`eval_family` pass.
    pub fn resurrect_node_exclusive(&mut self, node: NodeId) -> Result<(), VentureError> {
        self.restore_exclusive(node)
    }

    fn restore_exclusive(&mut self, node: NodeId) -> Result<(), VentureError> {
        if self.nodes.get(node)?.is_alive() {
            return Ok(());
        }
        let parents = self.nodes.get(node)?.parents();
        self.nodes.restore(node)?;
        for parent in parents {
            if !self.nodes.get(parent)?.is_alive() {
                self.restore_exclusive(parent)?;
            }
        }
        Ok(())
    }
}

fn flatten_requests(value: &Value) -> Vec<(venture_core::RequestId, std::rc::Rc<Expression>, EnvId)> {
    match value {
        Value::Request(id, expr, env) => vec![(*id, expr.clone(), *env)],
        Value::Array(items) => items.iter().flat_map(flatten_requests).collect(),
        _ => Vec::new(),
    }
}
