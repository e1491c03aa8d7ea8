//! Arithmetic and comparison built-ins (SPEC_FULL.md §14).
//!
//! Grounded directly on `original_source/backend/cxx/src/sps/number.cxx`:
//! each SP is a deterministic output procedure with no request half, so
//! `log_density` is never overridden — `is_random` is `false` for all of
//! them, meaning the trace never asks one of these for a density.

use venture_core::{Args, OutputPsp, RngHandle, Value, VentureError};

macro_rules! deterministic_output {
    ($name:ident, $simulate:expr) => {
        #[derive(Debug)]
        pub struct $name;

        impl OutputPsp for $name {
            fn is_random(&self) -> bool {
                false
            }

            fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
                $simulate(args)
            }
        }
    };
}

deterministic_output!(Plus, |args: &mut Args<'_>| {
    let mut sum = 0.0;
    for operand in &args.operands {
        sum += operand.as_number("plus")?;
    }
    Ok(Value::Number(sum))
});

deterministic_output!(Minus, |args: &mut Args<'_>| {
    args.require_arity("minus", 2)?;
    let a = args.operand("minus", 0)?.as_number("minus")?;
    let b = args.operand("minus", 1)?.as_number("minus")?;
    Ok(Value::Number(a - b))
});

deterministic_output!(Times, |args: &mut Args<'_>| {
    let mut prod = 1.0;
    for operand in &args.operands {
        prod *= operand.as_number("times")?;
    }
    Ok(Value::Number(prod))
});

deterministic_output!(Div, |args: &mut Args<'_>| {
    args.require_arity("div", 2)?;
    let a = args.operand("div", 0)?.as_number("div")?;
    let b = args.operand("div", 1)?.as_number("div")?;
    Ok(Value::Number(a / b))
});

deterministic_output!(Power, |args: &mut Args<'_>| {
    args.require_arity("power", 2)?;
    let a = args.operand("power", 0)?.as_number("power")?;
    let b = args.operand("power", 1)?.as_number("power")?;
    Ok(Value::Number(a.powf(b)))
});

deterministic_output!(Eq, |args: &mut Args<'_>| {
    args.require_arity("eq", 2)?;
    let a = args.operand("eq", 0)?.as_number("eq")?;
    let b = args.operand("eq", 1)?.as_number("eq")?;
    Ok(Value::Bool(a == b))
});

deterministic_output!(Gt, |args: &mut Args<'_>| {
    args.require_arity("gt", 2)?;
    let a = args.operand("gt", 0)?.as_number("gt")?;
    let b = args.operand("gt", 1)?.as_number("gt")?;
    Ok(Value::Bool(a > b))
});

deterministic_output!(Lt, |args: &mut Args<'_>| {
    args.require_arity("lt", 2)?;
    let a = args.operand("lt", 0)?.as_number("lt")?;
    let b = args.operand("lt", 1)?.as_number("lt")?;
    Ok(Value::Bool(a < b))
});

deterministic_output!(Gte, |args: &mut Args<'_>| {
    args.require_arity("gte", 2)?;
    let a = args.operand("gte", 0)?.as_number("gte")?;
    let b = args.operand("gte", 1)?.as_number("gte")?;
    Ok(Value::Bool(a >= b))
});

deterministic_output!(Lte, |args: &mut Args<'_>| {
    args.require_arity("lte", 2)?;
    let a = args.operand("lte", 0)?.as_number("lte")?;
    let b = args.operand("lte", 1)?.as_number("lte")?;
    Ok(Value::Bool(a <= b))
});

deterministic_output!(Real, |args: &mut Args<'_>| {
    args.require_arity("real", 1)?;
    let atom = args.operand("real", 0)?.as_atom("real")?;
    Ok(Value::Number(atom as f64))
});

deterministic_output!(AtomEq, |args: &mut Args<'_>| {
    args.require_arity("atom_eq", 2)?;
    let a = args.operand("atom_eq", 0)?.as_atom("atom_eq")?;
    let b = args.operand("atom_eq", 1)?.as_atom("atom_eq")?;
    Ok(Value::Bool(a == b))
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::NoRequest;
    use venture_core::Args;

    fn args(operands: Vec<Value>) -> Args<'static> {
        Args {
            operand_nodes: vec![venture_core::NodeId::from_raw(0); operands.len()],
            operands,
            request_node: None,
            output_node: venture_core::NodeId::from_raw(0),
            esr_values: Vec::new(),
            esr_nodes: Vec::new(),
            environment: venture_core::EnvId::from_raw(0),
            spaux: None,
            envs: None,
            sps: None,
        }
    }

    #[test]
    fn plus_sums_all_operands() {
        let mut rng = RngHandle::from_seed(0);
        let mut a = args(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(Plus.simulate(&mut a, &mut rng).unwrap(), Value::Number(6.0));
    }

    #[test]
    fn power_matches_powf() {
        let mut rng = RngHandle::from_seed(0);
        let mut a = args(vec![Value::Number(2.0), Value::Number(10.0)]);
        assert_eq!(Power.simulate(&mut a, &mut rng).unwrap(), Value::Number(1024.0));
    }

    #[test]
    fn no_request_is_a_no_op() {
        let mut rng = RngHandle::from_seed(0);
        let mut a = args(vec![]);
        assert_eq!(NoRequest.simulate(&mut a, &mut rng).unwrap(), Value::Nil);
    }
}
