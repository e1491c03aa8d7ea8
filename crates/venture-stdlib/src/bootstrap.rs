//! Assembles every built-in value and procedure into a trace's global
//! environment (SPEC_FULL.md §14).
//!
//! Grounded directly on `original_source/backend/cxx/src/builtin.cxx`'s
//! `initBuiltInValues()`/`initBuiltInSPs()` registration tables: every name
//! bound here matches a name in that table, in the same grouping order
//! (numbers, lists, vectors, maps, booleans, discrete distributions,
//! continuous distributions, control flow, environments, exchangeable
//! random procedures, `mem`). `map_list` (`MapListSP` in that table) is the
//! one name deliberately left unbound — it needs a way to mint a fresh
//! constant node per list element that nothing in `Args` currently exposes
//! (see `venture_stdlib::collections`'s module doc), recorded as an omission
//! in DESIGN.md rather than implemented against the wrong primitive.

use venture_core::{EnvId, OutputPsp, RequestPsp, Value};
use venture_trace::Trace;

use crate::arithmetic::{AtomEq, Div, Eq, Gt, Gte, Lt, Lte, Minus, Plus, Power, Real, Times};
use crate::boolean::{And, Not, Or, Xor};
use crate::collections::{First, IsPair, ListRef, ListSp, MakeMap, MakeVector, MapLookup, Pair, Rest, VectorLookup};
use crate::continuous::{Beta, Gamma, Normal, StudentT, UniformContinuous};
use crate::control::{Biplex, Branch, BranchOutputPsp};
use crate::crp::MakeCrp;
use crate::dirichlet::{MakeSymDirMult, MakeUcSymDirMult};
use crate::discrete::{Bernoulli, Categorical, Flip, UniformDiscrete};
use crate::env_ops::{Eval, EvalOutputPsp, ExtendEnvironment, GetCurrentEnvironment, GetEmptyEnvironment};
use crate::hmm::MakeLazyHmm;
use crate::mem::Mem;
use crate::support::NoRequest;

/// Binds every SPEC_FULL.md §14 built-in (values and procedures) into
/// `trace`'s global environment. Call once per fresh [`Trace`], before
/// evaluating any directive that references a built-in name.
pub fn install(trace: &mut Trace) {
    let global = trace.global_env();

    macro_rules! bind_value {
        ($name:expr, $value:expr) => {{
            let node = trace.nodes_mut().add_constant($value);
            trace.envs_mut().bind(global, $name, node).unwrap();
        }};
    }
    macro_rules! bind_output {
        ($name:expr, $psp:expr) => {{
            let sp_id = trace.register_sp(Box::new(NoRequest), Box::new($psp));
            let node = trace.nodes_mut().add_constant(Value::Procedure(sp_id));
            trace.envs_mut().bind(global, $name, node).unwrap();
        }};
    }
    macro_rules! bind_request {
        ($name:expr, $request:expr, $output:expr) => {{
            let sp_id = trace.register_sp(Box::new($request), Box::new($output));
            let node = trace.nodes_mut().add_constant(Value::Procedure(sp_id));
            trace.envs_mut().bind(global, $name, node).unwrap();
        }};
    }

    bind_value!("true", Value::Bool(true));
    bind_value!("false", Value::Bool(false));

    // numbers
    bind_output!("plus", Plus);
    bind_output!("minus", Minus);
    bind_output!("times", Times);
    bind_output!("div", Div);
    bind_output!("power", Power);
    bind_output!("eq", Eq);
    bind_output!("gt", Gt);
    bind_output!("lt", Lt);
    bind_output!("gte", Gte);
    bind_output!("lte", Lte);
    bind_output!("real", Real);
    bind_output!("atom_eq", AtomEq);

    // lists
    bind_output!("pair", Pair);
    bind_output!("first", First);
    bind_output!("rest", Rest);
    bind_output!("list", ListSp);
    bind_output!("is_pair", IsPair);
    bind_output!("list_ref", ListRef);

    // vectors
    bind_output!("make_vector", MakeVector);
    bind_output!("vector_lookup", VectorLookup);

    // maps
    bind_output!("make_map", MakeMap);
    bind_output!("map_lookup", MapLookup);

    // booleans
    bind_output!("and", And);
    bind_output!("or", Or);
    bind_output!("not", Not);
    bind_output!("xor", Xor);

    // discrete distributions
    bind_output!("flip", Flip);
    bind_output!("bernoulli", Bernoulli);
    bind_output!("categorical", Categorical);
    bind_output!("uniform_discrete", UniformDiscrete);

    // continuous distributions
    bind_output!("normal", Normal);
    bind_output!("gamma", Gamma);
    bind_output!("uniform_continuous", UniformContinuous);
    bind_output!("beta", Beta);
    bind_output!("student_t", StudentT);

    // control flow
    bind_request!("branch", Branch, BranchOutputPsp);
    bind_output!("biplex", Biplex);

    // environments
    bind_output!("get_current_environment", GetCurrentEnvironment);
    let empty_env: EnvId = trace.envs_mut().new_root();
    bind_output!("get_empty_environment", GetEmptyEnvironment { empty_env });
    bind_output!("extend_environment", ExtendEnvironment);
    bind_request!("eval", Eval, EvalOutputPsp);

    // exchangeable random procedures
    bind_output!("make_sym_dir_mult", MakeSymDirMult);
    bind_output!("make_uc_sym_dir_mult", MakeUcSymDirMult);
    bind_output!("make_crp", MakeCrp);

    // latent-state
    bind_output!("make_lazy_hmm", MakeLazyHmm);

    // miscellaneous
    bind_output!("mem", Mem);
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_core::{DirectiveId, Expression};

    #[test]
    fn installed_global_env_answers_a_plus_call() {
        let mut trace = Trace::new(1);
        install(&mut trace);
        let expr = Expression::apply(Expression::var("plus"), vec![Expression::number(2.0), Expression::number(3.0)]);
        let value = trace.eval(DirectiveId::from_raw(0), &expr).unwrap();
        assert_eq!(value, Value::Number(5.0));
    }

    #[test]
    fn true_and_false_are_bound_as_plain_values() {
        let mut trace = Trace::new(1);
        install(&mut trace);
        let expr = Expression::var("true");
        let value = trace.eval(DirectiveId::from_raw(0), &expr).unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn get_empty_environment_is_distinct_from_the_global_env() {
        let mut trace = Trace::new(1);
        install(&mut trace);
        let x_node = trace.nodes_mut().add_constant(Value::Number(1.0));
        trace.envs_mut().bind(trace.global_env(), "x", x_node).unwrap();

        let expr = Expression::apply(Expression::var("get_empty_environment"), vec![]);
        let value = trace.eval(DirectiveId::from_raw(0), &expr).unwrap();
        let empty = match value {
            Value::Env(id) => id,
            other => panic!("expected env, got {other:?}"),
        };
        assert!(trace.envs().lookup(empty, "x").is_err());
    }
}
