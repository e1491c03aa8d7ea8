//! Environment-manipulation procedures: `get_current_environment`,
//! `get_empty_environment`, `extend_environment`, `eval` (SPEC_FULL.md §14;
//! spec.md §8 scenario 5 "program synthesis via `eval`").
//!
//! Grounded on `builtin.cxx`'s registration of these four names and on the
//! `Args.envs`/`EnvArena::extend_with` plumbing added for compound-procedure
//! application (`venture_trace::compound`): `extend_environment` needs no new
//! node, since the value it binds is already backed by one of its own
//! operand nodes — it just binds that existing node under a new symbol in a
//! fresh frame, the same trick `request_application` uses for its scratch
//! bindings.

use std::rc::Rc;

use venture_core::{Args, Expression, Literal, OutputPsp, RequestId, RequestPsp, RngHandle, Value, VentureError};

/// `(get_current_environment)`: returns the environment the call itself was
/// evaluated in.
#[derive(Debug)]
pub struct GetCurrentEnvironment;

impl OutputPsp for GetCurrentEnvironment {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::Env(args.environment))
    }
}

/// `(get_empty_environment)`: returns a fixed, permanently unbound-into root
/// frame, captured once at bootstrap time. Distinct from the global
/// environment, which keeps gaining `assume` bindings over a trace's life.
#[derive(Debug)]
pub struct GetEmptyEnvironment {
    pub empty_env: venture_core::EnvId,
}

impl OutputPsp for GetEmptyEnvironment {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, _args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::Env(self.empty_env))
    }
}

/// `(extend_environment env symbol value)`: binds `symbol` to `value` in a
/// fresh frame off `env`. Reuses the operand node already holding `value`
/// rather than minting a new constant node — `Args` exposes no `NodeArena`
/// handle, only `EnvArena`, and none is needed here.
#[derive(Debug)]
pub struct ExtendEnvironment;

impl OutputPsp for ExtendEnvironment {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("extend_environment", 3)?;
        let env = match args.operand("extend_environment", 0)? {
            Value::Env(e) => *e,
            other => return Err(VentureError::type_error("extend_environment", "env", other.kind_name())),
        };
        let symbol = args.operand("extend_environment", 1)?.as_symbol("extend_environment")?.to_string();
        let value_node = args.operand_nodes[2];
        let envs = args.envs.as_mut().ok_or_else(|| {
            VentureError::invariant("missing-env-arena", "extend_environment requires a mutable environment arena")
        })?;
        let child = envs.extend_with(env, &[(symbol, value_node)]);
        Ok(Value::Env(child))
    }
}

/// Translates a quoted `Value` (built from `Symbol`/`Pair`/self-evaluating
/// literals, the homoiconic code-as-data convention `eval` relies on) back
/// into an `Expression` tree. A `Pair`-chain is read as an application whose
/// first element is the operator sub-expression; everything else
/// self-evaluates.
fn value_to_expression(value: &Value) -> Result<Expression, VentureError> {
    match value {
        Value::Number(x) => Ok(Expression::number(*x)),
        Value::Bool(b) => Ok(Expression::Literal(Literal::Bool(*b))),
        Value::Atom(a) => Ok(Expression::Literal(Literal::Atom(*a))),
        Value::Symbol(s) => Ok(Expression::var(s.as_ref())),
        Value::Nil | Value::Pair(..) => {
            let items = value.list_to_vec("eval")?;
            if items.is_empty() {
                return Err(VentureError::domain_error("eval", "cannot evaluate the empty list"));
            }
            let parts = items
                .iter()
                .map(value_to_expression)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expression::Application(parts))
        }
        other => Err(VentureError::type_error("eval", "expression", other.kind_name())),
    }
}

/// `(eval expr env)`: evaluates a quoted expression value in `env` as a
/// single ESR. The request PSP only has to translate the quoted value and
/// hand the result to the normal family-evaluation machinery; the output PSP
/// is the same ESR-forwarding `CompoundOutputPsp` every other request-only
/// procedure in this crate uses.
#[derive(Debug)]
pub struct Eval;

impl RequestPsp for Eval {
    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("eval", 2)?;
        let expr_value = args.operand("eval", 0)?.clone();
        let env = match args.operand("eval", 1)? {
            Value::Env(e) => *e,
            other => return Err(VentureError::type_error("eval", "env", other.kind_name())),
        };
        let expression = value_to_expression(&expr_value)?;
        Ok(Value::Request(RequestId::from_raw(0), Rc::new(expression), env))
    }
}

pub use venture_trace::CompoundOutputPsp as EvalOutputPsp;

#[cfg(test)]
mod tests {
    use super::*;
    use venture_core::DirectiveId;
    use venture_trace::Trace;

    #[test]
    fn extend_environment_shadows_in_a_fresh_frame() {
        let mut trace = Trace::new(1);
        let outer = trace.global_env();
        let x_node = trace.nodes_mut().add_constant(Value::Number(1.0));
        trace.envs_mut().bind(outer, "x", x_node).unwrap();

        let extend_sp = trace.register_sp(Box::new(crate::support::NoRequest), Box::new(ExtendEnvironment));
        let extend_node = trace.nodes_mut().add_constant(Value::Procedure(extend_sp));
        trace.envs_mut().bind(outer, "extend_environment", extend_node).unwrap();
        let get_env_sp = trace.register_sp(Box::new(crate::support::NoRequest), Box::new(GetCurrentEnvironment));
        let get_env_node = trace.nodes_mut().add_constant(Value::Procedure(get_env_sp));
        trace.envs_mut().bind(outer, "get_current_environment", get_env_node).unwrap();

        let expr = Expression::apply(
            Expression::var("extend_environment"),
            vec![
                Expression::apply(Expression::var("get_current_environment"), vec![]),
                Expression::Literal(Literal::QuotedSymbol("x".to_string())),
                Expression::number(2.0),
            ],
        );
        let directive = DirectiveId::from_raw(0);
        let value = trace.eval(directive, &expr).unwrap();
        let inner = match value {
            Value::Env(id) => id,
            other => panic!("expected env, got {other:?}"),
        };
        let looked_up = trace.envs().lookup(inner, "x").unwrap();
        assert_eq!(trace.nodes().get(looked_up).unwrap().value(), Some(&Value::Number(2.0)));
        // the outer frame is untouched
        let outer_looked_up = trace.envs().lookup(outer, "x").unwrap();
        assert_eq!(trace.nodes().get(outer_looked_up).unwrap().value(), Some(&Value::Number(1.0)));
    }
}
