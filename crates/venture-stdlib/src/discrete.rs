//! Discrete-valued elementary random procedures: `flip`, `bernoulli`,
//! `categorical`, `uniform_discrete` (SPEC_FULL.md §14).
//!
//! Grounded on `original_source/backend/cxx/src/sps/discrete.cxx`'s
//! `BernoulliSP`/`CategoricalSP`, including their `logDensityOutput` bodies.
//! `enumerate` departs from the original's `enumerateOutput` (which returns
//! "every value in the support except the current one", intended to be
//! resampled with a separate weight for staying put) — SPEC_FULL.md §19
//! resolves this Open Question by having `enumerate` return the *entire*
//! support paired with its log density, current value included, and letting
//! the Gibbs-over-enumerable kernel itself exclude the current value when it
//! needs to; that keeps the `OutputPsp::enumerate` contract uniform across
//! every enumerable SP instead of special-casing "skip the current value"
//! per procedure.

use venture_core::{Args, OutputPsp, RngHandle, Value, VentureError};

fn require_probability(operator: &str, p: f64) -> Result<(), VentureError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(VentureError::domain_error(
            operator,
            format!("probability must lie in [0, 1], got {p}"),
        ));
    }
    Ok(())
}

/// `(flip)` or `(flip p)`, defaulting `p` to 0.5.
#[derive(Debug)]
pub struct Flip;

impl Flip {
    fn p(args: &Args<'_>) -> Result<f64, VentureError> {
        match args.operands.first() {
            None => Ok(0.5),
            Some(value) => {
                let p = value.as_number("flip")?;
                require_probability("flip", p)?;
                Ok(p)
            }
        }
    }
}

impl OutputPsp for Flip {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let p = Self::p(args)?;
        Ok(Value::Bool(rng.uniform() < p))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let p = Self::p(args)?;
        let b = value.as_bool("flip")?;
        Ok(if b { p.ln() } else { (1.0 - p).ln() })
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn enumerate(&self, args: &Args<'_>) -> Result<Vec<(Value, f64)>, VentureError> {
        let p = Self::p(args)?;
        Ok(vec![(Value::Bool(true), p.ln()), (Value::Bool(false), (1.0 - p).ln())])
    }
}

/// `(bernoulli p)`: `flip` with a required probability operand.
#[derive(Debug)]
pub struct Bernoulli;

impl OutputPsp for Bernoulli {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("bernoulli", 1)?;
        let p = args.operand("bernoulli", 0)?.as_number("bernoulli")?;
        require_probability("bernoulli", p)?;
        Ok(Value::Bool(rng.uniform() < p))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let p = args.operand("bernoulli", 0)?.as_number("bernoulli")?;
        let b = value.as_bool("bernoulli")?;
        Ok(if b { p.ln() } else { (1.0 - p).ln() })
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn enumerate(&self, args: &Args<'_>) -> Result<Vec<(Value, f64)>, VentureError> {
        let p = args.operand("bernoulli", 0)?.as_number("bernoulli")?;
        Ok(vec![(Value::Bool(true), p.ln()), (Value::Bool(false), (1.0 - p).ln())])
    }
}

fn categorical_weights(args: &Args<'_>) -> Result<Vec<f64>, VentureError> {
    let ps = args.operand("categorical", 0)?.as_array("categorical")?;
    ps.iter().map(|v| v.as_number("categorical")).collect()
}

/// `(categorical ps)`: returns an atom index drawn from the (courtesy-
/// normalized, per SPEC_FULL.md's resolution of the original's un-normalized
/// "TODO normalize" comment) discrete distribution over `ps`.
#[derive(Debug)]
pub struct Categorical;

impl OutputPsp for Categorical {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("categorical", 1)?;
        let weights = categorical_weights(args)?;
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(VentureError::domain_error("categorical", "weights must sum to a positive value"));
        }
        let u = rng.uniform() * total;
        let mut sum = 0.0;
        for (i, p) in weights.iter().enumerate() {
            sum += p;
            if u < sum {
                return Ok(Value::Atom(i as u32));
            }
        }
        Ok(Value::Atom((weights.len() - 1) as u32))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let weights = categorical_weights(args)?;
        let total: f64 = weights.iter().sum();
        let i = value.as_atom("categorical")? as usize;
        let p = weights
            .get(i)
            .ok_or_else(|| VentureError::domain_error("categorical", format!("atom #{i} out of range")))?;
        Ok((p / total).ln())
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn enumerate(&self, args: &Args<'_>) -> Result<Vec<(Value, f64)>, VentureError> {
        let weights = categorical_weights(args)?;
        let total: f64 = weights.iter().sum();
        Ok(weights
            .iter()
            .enumerate()
            .map(|(i, p)| (Value::Atom(i as u32), (p / total).ln()))
            .collect())
    }
}

/// `(uniform_discrete lo hi)`: an atom uniform over the integers `[lo, hi)`.
#[derive(Debug)]
pub struct UniformDiscrete;

impl UniformDiscrete {
    fn bounds(args: &Args<'_>) -> Result<(i64, i64), VentureError> {
        args.require_arity("uniform_discrete", 2)?;
        let lo = args.operand("uniform_discrete", 0)?.as_number("uniform_discrete")? as i64;
        let hi = args.operand("uniform_discrete", 1)?.as_number("uniform_discrete")? as i64;
        if hi <= lo {
            return Err(VentureError::domain_error("uniform_discrete", "hi must be greater than lo"));
        }
        Ok((lo, hi))
    }
}

impl OutputPsp for UniformDiscrete {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let (lo, hi) = Self::bounds(args)?;
        let span = (hi - lo) as f64;
        let offset = (rng.uniform() * span) as i64;
        Ok(Value::Atom((lo + offset) as u32))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let (lo, hi) = Self::bounds(args)?;
        let n = value.as_atom("uniform_discrete")? as i64;
        if n < lo || n >= hi {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(-((hi - lo) as f64).ln())
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn enumerate(&self, args: &Args<'_>) -> Result<Vec<(Value, f64)>, VentureError> {
        let (lo, hi) = Self::bounds(args)?;
        let density = -((hi - lo) as f64).ln();
        Ok((lo..hi).map(|n| (Value::Atom(n as u32), density)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(operands: Vec<Value>) -> Args<'static> {
        Args {
            operands,
            operand_nodes: Vec::new(),
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
    fn bernoulli_log_density_matches_coin_weighting() {
        let psp = Bernoulli;
        let a = args(vec![Value::Number(0.3)]);
        assert!((psp.log_density(&Value::Bool(true), &a).unwrap() - 0.3_f64.ln()).abs() < 1e-12);
        assert!((psp.log_density(&Value::Bool(false), &a).unwrap() - 0.7_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn categorical_normalizes_unnormalized_weights() {
        let psp = Categorical;
        let a = args(vec![Value::Array(vec![Value::Number(2.0), Value::Number(2.0)].into())]);
        let enumerated = psp.enumerate(&a).unwrap();
        assert_eq!(enumerated.len(), 2);
        for (_, density) in &enumerated {
            assert!((density.exp() - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn uniform_discrete_density_is_zero_outside_range() {
        let psp = UniformDiscrete;
        let a = args(vec![Value::Number(0.0), Value::Number(3.0)]);
        assert_eq!(psp.log_density(&Value::Atom(5), &a).unwrap(), f64::NEG_INFINITY);
        assert!(psp.log_density(&Value::Atom(1), &a).unwrap().is_finite());
    }
}
