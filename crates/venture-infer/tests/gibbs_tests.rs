use venture_core::{Args, DirectiveId, Expression, NodeId, OutputPsp, RequestPsp, RngHandle, Value, VentureError};
use venture_infer::gibbs_step;
use venture_trace::Trace;

#[derive(Debug)]
struct NoRequest;

impl RequestPsp for NoRequest {
    fn simulate(&self, _args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::Nil)
    }
}

/// A uniform three-sided die, enumerable for Gibbs.
#[derive(Debug)]
struct Die3;

impl OutputPsp for Die3 {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, _args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::Atom((rng.uniform() * 3.0) as u32))
    }

    fn log_density(&self, value: &Value, _args: &Args<'_>) -> Result<f64, VentureError> {
        match value {
            Value::Atom(_) => Ok((1.0_f64 / 3.0).ln()),
            _ => Err(VentureError::type_error("die3", "atom", value.kind_name())),
        }
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn enumerate(&self, _args: &Args<'_>) -> Result<Vec<(Value, f64)>, VentureError> {
        let log_p = (1.0_f64 / 3.0).ln();
        Ok(vec![
            (Value::Atom(0), log_p),
            (Value::Atom(1), log_p),
            (Value::Atom(2), log_p),
        ])
    }
}

#[test]
fn gibbs_step_always_lands_in_support() {
    let mut trace = Trace::new(42);
    let die_sp = trace.register_sp(Box::new(NoRequest), Box::new(Die3));
    let die_proc = trace.nodes_mut().add_constant(Value::Procedure(die_sp));
    trace.envs_mut().bind(trace.global_env(), "die", die_proc).unwrap();

    let directive = DirectiveId::from_raw(0);
    trace
        .eval(directive, &Expression::apply(Expression::var("die"), vec![]))
        .unwrap();

    // Node allocation: 0 = die_proc constant, 1 = lookup for `var("die")`,
    // 2 = request, 3 = output.
    let node = NodeId::from_raw(3);

    for _ in 0..10 {
        gibbs_step(&mut trace, node).unwrap();
        let value = trace.extract_value(directive).unwrap();
        match value {
            Value::Atom(a) => assert!(a <= 2),
            other => panic!("unexpected value {other:?}"),
        }
    }
}

#[test]
fn gibbs_step_rejects_non_enumerable_node() {
    let mut trace = Trace::new(1);

    #[derive(Debug)]
    struct Constant5;
    impl OutputPsp for Constant5 {
        fn is_random(&self) -> bool {
            false
        }
        fn simulate(&self, _args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
            Ok(Value::Number(5.0))
        }
    }

    let sp = trace.register_sp(Box::new(NoRequest), Box::new(Constant5));
    let proc = trace.nodes_mut().add_constant(Value::Procedure(sp));
    trace.envs_mut().bind(trace.global_env(), "five", proc).unwrap();
    let directive = DirectiveId::from_raw(0);
    trace
        .eval(directive, &Expression::apply(Expression::var("five"), vec![]))
        .unwrap();
    let node = NodeId::from_raw(3);

    assert!(gibbs_step(&mut trace, node).is_err());
}
