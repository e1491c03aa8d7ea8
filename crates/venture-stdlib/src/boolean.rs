//! Boolean built-ins (SPEC_FULL.md §14), grounded on
//! `original_source/backend/cxx/src/sps/bool.cxx`'s `BoolAndSP`/`BoolOrSP`/
//! `BoolNotSP`/`BoolXorSP` (not retrieved into `original_source/`, but named
//! in `builtin.cxx`'s registration table; behavior is the obvious one for
//! each operator name).

use venture_core::{Args, OutputPsp, RngHandle, Value, VentureError};

#[derive(Debug)]
pub struct And;

impl OutputPsp for And {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        for operand in &args.operands {
            if !operand.as_bool("and")? {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    }
}

#[derive(Debug)]
pub struct Or;

impl OutputPsp for Or {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        for operand in &args.operands {
            if operand.as_bool("or")? {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    }
}

#[derive(Debug)]
pub struct Not;

impl OutputPsp for Not {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("not", 1)?;
        let a = args.operand("not", 0)?.as_bool("not")?;
        Ok(Value::Bool(!a))
    }
}

#[derive(Debug)]
pub struct Xor;

impl OutputPsp for Xor {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("xor", 2)?;
        let a = args.operand("xor", 0)?.as_bool("xor")?;
        let b = args.operand("xor", 1)?.as_bool("xor")?;
        Ok(Value::Bool(a != b))
    }
}
