//! `branch`, the request-PSP that evaluates exactly one of two
//! sub-expressions (SPEC_FULL.md §14; spec.md §8 scenario 3).
//!
//! Grounded on `original_source`'s `BranchSP`/`BiplexSP` (`sps/cond.cxx`, not
//! itself retrieved into `original_source/`, but named in `builtin.cxx`'s
//! registration table) and, for how this workspace achieves the same
//! laziness without special-casing `branch` in the evaluator, on
//! `backend/new_cxx/src/sps/csp.cxx`'s request/closure pattern.
//!
//! `eval_family`'s `Application` case evaluates every operand eagerly, so by
//! the time `branch`'s request PSP runs, both arm operands have already been
//! evaluated — cheaply, because each arm is expected to be a zero-argument
//! `Expression::Lambda` thunk (see [`venture_core::Expression::thunk`]), not
//! the guarded expression itself. `branch` picks the taken thunk's node and
//! requests its application as a single ESR via
//! [`venture_trace::request_application`]; only that one thunk's body ever
//! gets evaluated.

use venture_core::{Args, RequestPsp, RngHandle, Value, VentureError};
use venture_trace::request_application;

pub use venture_trace::CompoundOutputPsp as BranchOutputPsp;

#[derive(Debug)]
pub struct Branch;

impl RequestPsp for Branch {
    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("branch", 3)?;
        let predicate = args.operand("branch", 0)?.as_bool("branch")?;
        let chosen = if predicate {
            args.operand_nodes[1]
        } else {
            args.operand_nodes[2]
        };
        let envs = args.envs.as_mut().ok_or_else(|| {
            VentureError::invariant("missing-env-arena", "branch requires a mutable environment arena")
        })?;
        Ok(request_application(envs, args.environment, chosen, &[]))
    }
}

/// `biplex`: the non-requesting sibling of `branch` — both arms are plain
/// (already-evaluated) values rather than thunks, so there is nothing to
/// request; this is an ordinary deterministic output procedure.
#[derive(Debug)]
pub struct Biplex;

impl venture_core::OutputPsp for Biplex {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("biplex", 3)?;
        let predicate = args.operand("biplex", 0)?.as_bool("biplex")?;
        Ok(if predicate {
            args.operand("biplex", 1)?.clone()
        } else {
            args.operand("biplex", 2)?.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_core::{DirectiveId, Expression, OutputPsp};
    use venture_trace::Trace;

    /// Always errors when applied, so a test can tell whether the untaken
    /// arm of a `branch` ever actually ran.
    #[derive(Debug)]
    struct Poison;

    impl OutputPsp for Poison {
        fn is_random(&self) -> bool {
            false
        }

        fn simulate(&self, _args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
            Err(VentureError::invariant("poison", "the untaken branch arm was evaluated"))
        }
    }

    #[test]
    fn branch_evaluates_only_the_taken_arm() {
        let mut trace = Trace::new(7);
        let branch_sp = trace.register_sp(Box::new(Branch), Box::new(BranchOutputPsp));
        let branch_node = trace.nodes_mut().add_constant(Value::Procedure(branch_sp));
        trace.envs_mut().bind(trace.global_env(), "branch", branch_node).unwrap();

        let poison_sp = trace.register_sp(Box::new(crate::support::NoRequest), Box::new(Poison));
        let poison_node = trace.nodes_mut().add_constant(Value::Procedure(poison_sp));
        trace.envs_mut().bind(trace.global_env(), "poison", poison_node).unwrap();

        let poison_call = Expression::apply(Expression::var("poison"), vec![]);
        let expr = Expression::apply(
            Expression::var("branch"),
            vec![
                Expression::Literal(venture_core::Literal::Bool(true)),
                Expression::thunk(Expression::number(42.0)),
                Expression::thunk(poison_call),
            ],
        );

        let directive = DirectiveId::from_raw(0);
        let value = trace.eval(directive, &expr).unwrap();
        assert_eq!(value, Value::Number(42.0));
    }
}
