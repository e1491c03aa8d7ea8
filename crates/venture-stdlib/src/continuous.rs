//! Continuous-valued elementary random procedures: `normal`, `gamma`,
//! `uniform_continuous`, `beta`, `student_t` (SPEC_FULL.md §14).
//!
//! `original_source` only retrieved `number.cxx`/`discrete.cxx`, not a
//! `continuous.cxx`, so these are grounded on `rand_distr`'s documented
//! distributions directly (the crate this workspace already depends on for
//! every other non-uniform draw) plus the closed-form densities they each
//! implement, rather than on a specific original source file.

use rand_distr::Distribution;

use venture_core::{Args, OutputPsp, RngHandle, Value, VentureError};

/// Lanczos approximation to `ln(Gamma(x))`, used by the `gamma`, `beta` and
/// `student_t` densities; none of this workspace's other dependencies
/// expose `lgamma`.
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        // Reflection formula.
        (std::f64::consts::PI / (std::f64::consts::PI * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut acc = COEFFICIENTS[0];
        for (i, c) in COEFFICIENTS.iter().enumerate().skip(1) {
            acc += c / (x + i as f64);
        }
        let t = x + G + 0.5;
        0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
    }
}

/// `(normal mu sigma)`.
#[derive(Debug)]
pub struct Normal;

impl Normal {
    fn params(args: &Args<'_>) -> Result<(f64, f64), VentureError> {
        args.require_arity("normal", 2)?;
        let mu = args.operand("normal", 0)?.as_number("normal")?;
        let sigma = args.operand("normal", 1)?.as_number("normal")?;
        if sigma <= 0.0 {
            return Err(VentureError::domain_error("normal", "sigma must be positive"));
        }
        Ok((mu, sigma))
    }
}

impl OutputPsp for Normal {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let (mu, sigma) = Self::params(args)?;
        let dist = rand_distr::Normal::new(mu, sigma)
            .map_err(|e| VentureError::domain_error("normal", e.to_string()))?;
        Ok(Value::Number(dist.sample(rng)))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let (mu, sigma) = Self::params(args)?;
        let x = value.as_number("normal")?;
        let z = (x - mu) / sigma;
        Ok(-0.5 * (2.0 * std::f64::consts::PI).ln() - sigma.ln() - 0.5 * z * z)
    }
}

/// `(gamma shape scale)`.
#[derive(Debug)]
pub struct Gamma;

impl Gamma {
    fn params(args: &Args<'_>) -> Result<(f64, f64), VentureError> {
        args.require_arity("gamma", 2)?;
        let shape = args.operand("gamma", 0)?.as_number("gamma")?;
        let scale = args.operand("gamma", 1)?.as_number("gamma")?;
        if shape <= 0.0 || scale <= 0.0 {
            return Err(VentureError::domain_error("gamma", "shape and scale must be positive"));
        }
        Ok((shape, scale))
    }
}

impl OutputPsp for Gamma {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let (shape, scale) = Self::params(args)?;
        let dist = rand_distr::Gamma::new(shape, scale)
            .map_err(|e| VentureError::domain_error("gamma", e.to_string()))?;
        Ok(Value::Number(dist.sample(rng)))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let (shape, scale) = Self::params(args)?;
        let x = value.as_number("gamma")?;
        if x <= 0.0 {
            return Ok(f64::NEG_INFINITY);
        }
        Ok((shape - 1.0) * x.ln() - x / scale - shape * scale.ln() - ln_gamma(shape))
    }
}

/// `(uniform_continuous lo hi)`.
#[derive(Debug)]
pub struct UniformContinuous;

impl UniformContinuous {
    fn bounds(args: &Args<'_>) -> Result<(f64, f64), VentureError> {
        args.require_arity("uniform_continuous", 2)?;
        let lo = args.operand("uniform_continuous", 0)?.as_number("uniform_continuous")?;
        let hi = args.operand("uniform_continuous", 1)?.as_number("uniform_continuous")?;
        if hi <= lo {
            return Err(VentureError::domain_error("uniform_continuous", "hi must be greater than lo"));
        }
        Ok((lo, hi))
    }
}

impl OutputPsp for UniformContinuous {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let (lo, hi) = Self::bounds(args)?;
        Ok(Value::Number(lo + rng.uniform() * (hi - lo)))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let (lo, hi) = Self::bounds(args)?;
        let x = value.as_number("uniform_continuous")?;
        if x < lo || x > hi {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(-(hi - lo).ln())
    }
}

/// `(beta alpha beta)`.
#[derive(Debug)]
pub struct Beta;

impl Beta {
    fn params(args: &Args<'_>) -> Result<(f64, f64), VentureError> {
        args.require_arity("beta", 2)?;
        let alpha = args.operand("beta", 0)?.as_number("beta")?;
        let beta = args.operand("beta", 1)?.as_number("beta")?;
        if alpha <= 0.0 || beta <= 0.0 {
            return Err(VentureError::domain_error("beta", "alpha and beta must be positive"));
        }
        Ok((alpha, beta))
    }
}

impl OutputPsp for Beta {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let (alpha, beta) = Self::params(args)?;
        let dist = rand_distr::Beta::new(alpha, beta)
            .map_err(|e| VentureError::domain_error("beta", e.to_string()))?;
        Ok(Value::Number(dist.sample(rng)))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let (alpha, beta) = Self::params(args)?;
        let x = value.as_number("beta")?;
        if !(0.0..=1.0).contains(&x) {
            return Ok(f64::NEG_INFINITY);
        }
        let log_beta_fn = ln_gamma(alpha) + ln_gamma(beta) - ln_gamma(alpha + beta);
        Ok((alpha - 1.0) * x.ln() + (beta - 1.0) * (1.0 - x).ln() - log_beta_fn)
    }
}

/// `(student_t nu)`: the standard (location 0, scale 1) Student's t
/// distribution with `nu` degrees of freedom.
#[derive(Debug)]
pub struct StudentT;

impl StudentT {
    fn nu(args: &Args<'_>) -> Result<f64, VentureError> {
        args.require_arity("student_t", 1)?;
        let nu = args.operand("student_t", 0)?.as_number("student_t")?;
        if nu <= 0.0 {
            return Err(VentureError::domain_error("student_t", "nu must be positive"));
        }
        Ok(nu)
    }
}

impl OutputPsp for StudentT {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let nu = Self::nu(args)?;
        let dist = rand_distr::StudentT::new(nu).map_err(|e| VentureError::domain_error("student_t", e.to_string()))?;
        Ok(Value::Number(dist.sample(rng)))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let nu = Self::nu(args)?;
        let x = value.as_number("student_t")?;
        let log_norm = ln_gamma((nu + 1.0) / 2.0) - ln_gamma(nu / 2.0) - 0.5 * (nu * std::f64::consts::PI).ln();
        Ok(log_norm - ((nu + 1.0) / 2.0) * (1.0 + x * x / nu).ln())
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
    fn normal_density_peaks_at_mean() {
        let psp = Normal;
        let a = args(vec![Value::Number(0.0), Value::Number(1.0)]);
        let at_mean = psp.log_density(&Value::Number(0.0), &a).unwrap();
        let off_mean = psp.log_density(&Value::Number(2.0), &a).unwrap();
        assert!(at_mean > off_mean);
    }

    #[test]
    fn uniform_continuous_density_is_uniform_inside_range() {
        let psp = UniformContinuous;
        let a = args(vec![Value::Number(0.0), Value::Number(2.0)]);
        let d1 = psp.log_density(&Value::Number(0.5), &a).unwrap();
        let d2 = psp.log_density(&Value::Number(1.5), &a).unwrap();
        assert!((d1 - d2).abs() < 1e-12);
        assert_eq!(psp.log_density(&Value::Number(3.0), &a).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn beta_density_matches_uniform_at_one_one() {
        let psp = Beta;
        let a = args(vec![Value::Number(1.0), Value::Number(1.0)]);
        let d = psp.log_density(&Value::Number(0.3), &a).unwrap();
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn ln_gamma_matches_known_factorials() {
        // Gamma(5) = 4! = 24
        assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-9);
    }
}
