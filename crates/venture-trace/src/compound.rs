//! The request/output PSP pair backing every value produced by
//! [`venture_core::Expression::Lambda`]: a compound procedure closing over
//! the environment it was built in.
//!
//! Grounded on the original implementation's `MakeCSPOutputPSP`/
//! `CSPRequestPSP` (`backend/new_cxx/src/sps/csp.cxx`): applying a compound
//! procedure extends its closure environment with one frame binding
//! parameters to the call's operand nodes, then requests evaluation of the
//! body in that extended frame as a single ESR. The output PSP just forwards
//! whatever that ESR computed.

use std::rc::Rc;

use venture_core::{
    Args, EnvArena, EnvId, Expression, NodeId, OutputPsp, RequestId, RequestPsp, RngHandle, Value,
    VentureError,
};

/// Request half of a compound procedure: binds `params` to the call's
/// operand nodes in a fresh frame off `closure_env` and requests evaluation
/// of `body` there.
#[derive(Debug)]
pub struct CompoundRequestPsp {
    pub params: Vec<String>,
    pub body: Rc<Expression>,
    pub closure_env: EnvId,
}

impl RequestPsp for CompoundRequestPsp {
    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        if args.operand_nodes.len() != self.params.len() {
            return Err(VentureError::arity_error(
                "compound procedure",
                self.params.len(),
                args.operand_nodes.len(),
            ));
        }
        let envs = args.envs.as_mut().ok_or_else(|| {
            VentureError::invariant(
                "missing-env-arena",
                "compound procedure application requires a mutable environment arena",
            )
        })?;
        let bindings: Vec<(String, NodeId)> = self
            .params
            .iter()
            .cloned()
            .zip(args.operand_nodes.iter().copied())
            .collect();
        let call_env = envs.extend_with(self.closure_env, &bindings);
        Ok(Value::Request(RequestId::from_raw(0), self.body.clone(), call_env))
    }
}

/// Output half of every request-only SP: forwards the single ESR value a
/// request-PSP asked for as this application's own output. Shared by
/// compound-procedure application and (in `venture-stdlib`) `branch`/`mem`.
#[derive(Debug)]
pub struct CompoundOutputPsp;

impl OutputPsp for CompoundOutputPsp {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.esr_values.first().cloned().ok_or_else(|| {
            VentureError::invariant(
                "missing-esr",
                "compound procedure application produced no ESR value",
            )
        })
    }
}

/// Builds a request that applies the already-evaluated procedure at
/// `callee` to `operand_nodes`, by binding each into a fresh scratch frame
/// off `base_env` (via `envs`) and evaluating a plain variable-application
/// expression over those bindings. Lets a request-PSP hand brush over nodes
/// it already has (rather than expression text) to the normal
/// `eval_family`/`apply` machinery, without needing a `&mut Trace` — only
/// the `&mut EnvArena` a request-PSP already gets through `args.envs`.
/// `venture-stdlib`'s `branch` (its chosen arm) and `mem` (its cache-miss
/// re-application) both build their ESR this way.
///
/// The request ids minted here are never compared for identity (the only
/// place a `RequestId` is read back is `Value::Request`'s own `PartialEq`,
/// which no kernel code exercises), so a fixed placeholder is fine rather
/// than threading a counter through every request-PSP.
pub fn request_application(envs: &mut EnvArena, base_env: EnvId, callee: NodeId, operand_nodes: &[NodeId]) -> Value {
    let mut bindings = Vec::with_capacity(operand_nodes.len() + 1);
    bindings.push(("%callee".to_string(), callee));
    let mut parts = vec![Expression::var("%callee")];
    for (index, node) in operand_nodes.iter().enumerate() {
        let name = format!("%arg{index}");
        bindings.push((name.clone(), *node));
        parts.push(Expression::var(name));
    }
    let scratch_env = envs.extend_with(base_env, &bindings);
    Value::Request(RequestId::from_raw(0), Rc::new(Expression::Application(parts)), scratch_env)
}
