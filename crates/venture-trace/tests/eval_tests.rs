use venture_core::{Args, DirectiveId, OutputPsp, RequestPsp, RngHandle, Value, VentureError};
use venture_trace::Trace;

#[derive(Debug)]
struct NoRequest;

impl RequestPsp for NoRequest {
    fn simulate(&self, _args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        Ok(Value::Nil)
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

#[test]
fn eval_simple_application_computes_value() {
    let mut trace = Trace::new(1);
    let sp_id = trace.register_sp(Box::new(NoRequest), Box::new(Plus));

    let plus_directive = DirectiveId::from_raw(0);
    trace
        .eval(
            plus_directive,
            &venture_core::Expression::Literal(venture_core::Literal::Number(0.0)),
        )
        .unwrap();

    // Bind `plus` as a procedure value in the global environment directly,
    // bypassing the directive machinery (no literal syntax for procedures).
    let proc_node = trace.nodes_mut().add_constant(Value::Procedure(sp_id));
    trace
        .envs_mut()
        .bind(trace.global_env(), "plus", proc_node)
        .unwrap();

    let directive = DirectiveId::from_raw(1);
    let expr = venture_core::Expression::apply(
        venture_core::Expression::var("plus"),
        vec![venture_core::Expression::number(2.0), venture_core::Expression::number(3.0)],
    );
    let value = trace.eval(directive, &expr).unwrap();
    assert_eq!(value, Value::Number(5.0));
    assert_eq!(trace.extract_value(directive).unwrap(), Value::Number(5.0));
}

#[test]
fn observe_constrains_a_stochastic_node_and_reincorporates() {
    let mut trace = Trace::new(2);
    let coin_sp = trace.register_sp(Box::new(NoRequest), Box::new(Coin));
    let proc_node = trace.nodes_mut().add_constant(Value::Procedure(coin_sp));
    trace.envs_mut().bind(trace.global_env(), "coin", proc_node).unwrap();

    let directive = DirectiveId::from_raw(0);
    trace
        .eval(directive, &venture_core::Expression::apply(venture_core::Expression::var("coin"), vec![]))
        .unwrap();
    trace.observe(directive, Value::Number(9.0)).unwrap();
    assert_eq!(trace.extract_value(directive).unwrap(), Value::Number(9.0));
}

#[test]
fn observe_errors_on_a_constant_node() {
    let mut trace = Trace::new(2);
    let directive = DirectiveId::from_raw(0);
    trace
        .eval(directive, &venture_core::Expression::number(1.0))
        .unwrap();
    assert!(trace.observe(directive, Value::Number(9.0)).is_err());
}

#[test]
fn observe_errors_on_a_non_assessable_output_node() {
    let mut trace = Trace::new(2);
    let sp_id = trace.register_sp(Box::new(NoRequest), Box::new(Plus));
    let proc_node = trace.nodes_mut().add_constant(Value::Procedure(sp_id));
    trace.envs_mut().bind(trace.global_env(), "plus", proc_node).unwrap();

    let directive = DirectiveId::from_raw(0);
    trace
        .eval(
            directive,
            &venture_core::Expression::apply(
                venture_core::Expression::var("plus"),
                vec![venture_core::Expression::number(2.0), venture_core::Expression::number(3.0)],
            ),
        )
        .unwrap();
    assert!(trace.observe(directive, Value::Number(9.0)).is_err());
}

#[test]
fn unbound_symbol_is_an_error() {
    let mut trace = Trace::new(3);
    let directive = DirectiveId::from_raw(0);
    let err = trace.eval(directive, &venture_core::Expression::var("nope"));
    assert!(err.is_err());
}
