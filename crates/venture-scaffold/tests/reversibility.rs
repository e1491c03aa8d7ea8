use venture_core::{Args, DirectiveId, Expression, Literal, OutputPsp, RequestPsp, RngHandle, Value, VentureError};
use venture_scaffold::{detach, regen, Scaffold};
use venture_trace::Trace;

#[derive(Debug)]
struct NoRequest;

impl RequestPsp for NoRequest {
    fn simulate(&self, _args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::Nil)
    }
}

#[derive(Debug)]
struct Coin;

impl OutputPsp for Coin {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, _args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::Number(if rng.uniform() < 0.5 { 0.0 } else { 1.0 }))
    }

    fn log_density(&self, _value: &Value, _args: &Args<'_>) -> Result<f64, VentureError> {
        Ok(0.5_f64.ln())
    }
}

#[derive(Debug)]
struct Plus;

impl OutputPsp for Plus {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        let a = args.operand("plus", 0)?.as_number("plus")?;
        let b = args.operand("plus", 1)?.as_number("plus")?;
        Ok(Value::Number(a + b))
    }
}

#[test]
fn detach_regen_round_trip_preserves_downstream_value() {
    let mut trace = Trace::new(11);
    let coin_sp = trace.register_sp(Box::new(NoRequest), Box::new(Coin));
    let plus_sp = trace.register_sp(Box::new(NoRequest), Box::new(Plus));

    let coin_proc = trace.nodes_mut().add_constant(Value::Procedure(coin_sp));
    trace
        .envs_mut()
        .bind(trace.global_env(), "coin", coin_proc)
        .unwrap();
    let plus_proc = trace.nodes_mut().add_constant(Value::Procedure(plus_sp));
    trace
        .envs_mut()
        .bind(trace.global_env(), "plus", plus_proc)
        .unwrap();

    let coin_directive = DirectiveId::from_raw(0);
    trace
        .eval(coin_directive, &Expression::apply(Expression::var("coin"), vec![]))
        .unwrap();
    trace.bind_in_global_env("x", coin_directive).unwrap();
    let coin_value = trace.extract_value(coin_directive).unwrap();

    let y_directive = DirectiveId::from_raw(1);
    let y_value_before = trace
        .eval(
            y_directive,
            &Expression::apply(
                Expression::var("plus"),
                vec![Expression::var("x"), Expression::Literal(Literal::Number(1.0))],
            ),
        )
        .unwrap();
    assert_eq!(
        y_value_before,
        Value::Number(coin_value.as_number("test").unwrap() + 1.0)
    );

    // Node allocation order: constants 0 (coin proc), 1 (plus proc), then
    // the coin directive's lookup (2), request (3) and output (4) nodes.
    let principal = venture_core::NodeId::from_raw(4);
    assert_eq!(
        trace.nodes().get(principal).unwrap().value().cloned(),
        Some(coin_value.clone())
    );

    let scaffold = Scaffold::build(&mut trace, vec![principal]).unwrap();
    let rollback = detach(&mut trace, &scaffold).unwrap();

    let proposed = Value::Number(1.0 - coin_value.as_number("test").unwrap());
    trace.nodes_mut().set_value(principal, proposed.clone()).unwrap();
    regen(&mut trace, &scaffold, false, &rollback).unwrap();

    let y_after_propose = trace.extract_value(y_directive).unwrap();
    assert_eq!(
        y_after_propose,
        Value::Number(proposed.as_number("test").unwrap() + 1.0)
    );

    // Reject: unincorporate the proposed state, then restore byte-for-byte
    // from the snapshot taken before the proposal was ever applied.
    detach(&mut trace, &scaffold).unwrap();
    regen(&mut trace, &scaffold, true, &rollback).unwrap();

    let y_after_reject = trace.extract_value(y_directive).unwrap();
    assert_eq!(y_after_reject, y_value_before);
}
