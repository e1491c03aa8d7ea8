use venture_core::{Args, DirectiveId, Expression, Literal, OutputPsp, RequestPsp, RngHandle, Value, VentureError};
use venture_infer::mh_step;
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

fn build_trace(seed: u64) -> (Trace, DirectiveId, DirectiveId) {
    let mut trace = Trace::new(seed);
    let coin_sp = trace.register_sp(Box::new(NoRequest), Box::new(Coin));
    let plus_sp = trace.register_sp(Box::new(NoRequest), Box::new(Plus));

    let coin_proc = trace.nodes_mut().add_constant(Value::Procedure(coin_sp));
    trace.envs_mut().bind(trace.global_env(), "coin", coin_proc).unwrap();
    let plus_proc = trace.nodes_mut().add_constant(Value::Procedure(plus_sp));
    trace.envs_mut().bind(trace.global_env(), "plus", plus_proc).unwrap();

    let coin_directive = DirectiveId::from_raw(0);
    trace
        .eval(coin_directive, &Expression::apply(Expression::var("coin"), vec![]))
        .unwrap();
    trace.bind_in_global_env("x", coin_directive).unwrap();

    let y_directive = DirectiveId::from_raw(1);
    trace
        .eval(
            y_directive,
            &Expression::apply(
                Expression::var("plus"),
                vec![Expression::var("x"), Expression::Literal(Literal::Number(1.0))],
            ),
        )
        .unwrap();

    (trace, coin_directive, y_directive)
}

#[test]
fn mh_step_keeps_downstream_consistent() {
    let (mut trace, coin_directive, y_directive) = build_trace(7);

    for _ in 0..25 {
        mh_step(&mut trace).unwrap();
        let x = trace.extract_value(coin_directive).unwrap();
        let y = trace.extract_value(y_directive).unwrap();
        assert_eq!(y, Value::Number(x.as_number("test").unwrap() + 1.0));
    }

    assert_eq!(trace.random_choices().unwrap().len(), 1);
}

#[test]
fn mh_step_is_a_no_op_with_no_random_choices() {
    let mut trace = Trace::new(3);
    let plus_sp = trace.register_sp(Box::new(NoRequest), Box::new(Plus));
    let plus_proc = trace.nodes_mut().add_constant(Value::Procedure(plus_sp));
    trace.envs_mut().bind(trace.global_env(), "plus", plus_proc).unwrap();

    let directive = DirectiveId::from_raw(0);
    trace
        .eval(
            directive,
            &Expression::apply(
                Expression::var("plus"),
                vec![
                    Expression::Literal(Literal::Number(1.0)),
                    Expression::Literal(Literal::Number(2.0)),
                ],
            ),
        )
        .unwrap();

    assert_eq!(mh_step(&mut trace).unwrap(), false);
    assert_eq!(trace.extract_value(directive).unwrap(), Value::Number(3.0));
}
