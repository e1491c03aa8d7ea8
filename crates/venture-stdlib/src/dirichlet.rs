//! `make_sym_dir_mult`/`make_uc_sym_dir_mult`: symmetric Dirichlet-multinomial
//! makers (SPEC_FULL.md §14; spec.md §8 scenario 5, the AAA exchangeable-
//! coupler scenario).
//!
//! `original_source` names `make_sym_dir_mult`/`make_uc_sym_dir_mult` in
//! `builtin.cxx`'s registration table but did not retrieve `dirmult.cxx`
//! itself, so the predictive-probability formula below is grounded on the
//! standard closed-form Dirichlet-multinomial collapse (a symmetric-Dirichlet
//! Polya urn: `P(atom i) = (count_i + alpha) / (total + n*alpha)`) rather
//! than a specific original file.
//!
//! `make_sym_dir_mult`'s minted procedure is this workspace's one concrete
//! instance of spec.md §4.4's "always absorbing at applications" (AAA)
//! partition: its sufficient statistics (per-atom counts) must be visible
//! to every call site of the minted procedure, which is exactly what
//! [`venture_core::OutputPsp::initial_spaux`]/[`venture_trace::NodeArena::spaux_owner`]
//! exist to make possible — see their doc comments for why a maker SP
//! cannot simply stash this state in a field captured by closure the way
//! `mem`'s cache is.

use std::any::Any;

use rand_distr::Distribution;

use venture_core::{Args, OutputPsp, RngHandle, SpAux, Value, VentureError};

#[derive(Debug, Clone)]
struct DirMultAux {
    counts: Vec<u64>,
}

impl SpAux for DirMultAux {
    fn clone_box(&self) -> Box<dyn SpAux> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Reads back a `make_sym_dir_mult`-minted procedure's per-atom sufficient
/// statistics, in atom order. `None` if `node` isn't such a procedure.
/// Exposed for tests that need to assert the exact post-observation counts
/// (spec.md §8 scenario 5), since the trace/scaffold crates only ever move
/// the `SpAux` box around and never downcast it themselves.
pub fn sym_dir_mult_counts(trace: &venture_trace::Trace, node: venture_core::NodeId) -> Option<Vec<u64>> {
    trace
        .nodes()
        .get(node)
        .ok()?
        .spaux()?
        .as_any()
        .downcast_ref::<DirMultAux>()
        .map(|aux| aux.counts.clone())
}

fn read_aux<'a>(args: &'a Args<'_>, operator: &str) -> Result<&'a DirMultAux, VentureError> {
    args.spaux
        .as_deref()
        .and_then(|aux| aux.as_any().downcast_ref::<DirMultAux>())
        .ok_or_else(|| VentureError::invariant("missing-spaux", format!("{operator} missing its auxiliary counts")))
}

/// `(make_sym_dir_mult alpha n)`: collapsed maker. `alpha` is the symmetric
/// concentration parameter, `n` the (fixed, finite) number of outcomes.
#[derive(Debug)]
pub struct MakeSymDirMult;

impl OutputPsp for MakeSymDirMult {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        let (alpha, n) = params(args, "make_sym_dir_mult")?;
        let sps = args.sps.as_deref_mut().ok_or_else(|| {
            VentureError::invariant("missing-sp-registry", "make_sym_dir_mult requires a mutable procedure registry")
        })?;
        let sp_id = sps.register(
            Box::new(crate::support::NoRequest),
            Box::new(SymDirMultOutputPsp { alpha, n }),
        );
        Ok(Value::Procedure(sp_id))
    }

    fn initial_spaux(&self, operands: &[Value]) -> Option<Box<dyn SpAux>> {
        let n = operands.get(1)?.as_number("make_sym_dir_mult").ok()? as usize;
        Some(Box::new(DirMultAux { counts: vec![0; n] }))
    }
}

fn params(args: &Args<'_>, operator: &str) -> Result<(f64, usize), VentureError> {
    args.require_arity(operator, 2)?;
    let alpha = args.operand(operator, 0)?.as_number(operator)?;
    let n = args.operand(operator, 1)?.as_number(operator)? as usize;
    if alpha <= 0.0 {
        return Err(VentureError::domain_error(operator, "alpha must be positive"));
    }
    if n == 0 {
        return Err(VentureError::domain_error(operator, "n must be at least 1"));
    }
    Ok((alpha, n))
}

#[derive(Debug)]
struct SymDirMultOutputPsp {
    alpha: f64,
    n: usize,
}

impl SymDirMultOutputPsp {
    fn predictive(&self, counts: &[u64], i: usize) -> f64 {
        let total: u64 = counts.iter().sum();
        (counts[i] as f64 + self.alpha) / (total as f64 + self.n as f64 * self.alpha)
    }
}

impl OutputPsp for SymDirMultOutputPsp {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let counts = read_aux(args, "sym_dir_mult")?.counts.clone();
        let u = rng.uniform();
        let mut acc = 0.0;
        for i in 0..self.n {
            acc += self.predictive(&counts, i);
            if u < acc {
                return Ok(Value::Atom(i as u32));
            }
        }
        Ok(Value::Atom((self.n - 1) as u32))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let i = value.as_atom("sym_dir_mult")? as usize;
        if i >= self.n {
            return Err(VentureError::domain_error("sym_dir_mult", "atom out of range"));
        }
        let counts = &read_aux(args, "sym_dir_mult")?.counts;
        Ok(self.predictive(counts, i).ln())
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn enumerate(&self, args: &Args<'_>) -> Result<Vec<(Value, f64)>, VentureError> {
        let counts = read_aux(args, "sym_dir_mult")?.counts.clone();
        Ok((0..self.n)
            .map(|i| (Value::Atom(i as u32), self.predictive(&counts, i).ln()))
            .collect())
    }

    fn incorporate(&self, value: &Value, args: &mut Args<'_>) {
        let Ok(i) = value.as_atom("sym_dir_mult") else { return };
        if let Some(aux) = args.spaux.as_deref_mut().and_then(|a| a.as_any_mut().downcast_mut::<DirMultAux>()) {
            if let Some(count) = aux.counts.get_mut(i as usize) {
                *count += 1;
            }
        }
    }

    fn unincorporate(&self, value: &Value, args: &mut Args<'_>) {
        let Ok(i) = value.as_atom("sym_dir_mult") else { return };
        if let Some(aux) = args.spaux.as_deref_mut().and_then(|a| a.as_any_mut().downcast_mut::<DirMultAux>()) {
            if let Some(count) = aux.counts.get_mut(i as usize) {
                *count = count.saturating_sub(1);
            }
        }
    }

    fn is_aaa(&self) -> bool {
        true
    }
}

/// `(make_uc_sym_dir_mult alpha n)`: uncollapsed variant — samples a
/// concrete multinomial parameter vector from `Dirichlet(alpha, ..., alpha)`
/// once at make-time and draws categorically from it thereafter. Unlike the
/// collapsed maker, the minted procedure carries no sufficient statistics:
/// its `theta` never changes after creation, so it needs neither `SpAux`
/// nor `is_aaa`. Resampling `theta` itself (the textbook use of the
/// uncollapsed form) is left to a future `assume`d `dirichlet` draw feeding
/// it rather than built into this maker; recorded as a simplification in
/// DESIGN.md.
#[derive(Debug)]
pub struct MakeUcSymDirMult;

impl OutputPsp for MakeUcSymDirMult {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let (alpha, n) = params(args, "make_uc_sym_dir_mult")?;
        let dist = rand_distr::Dirichlet::new_with_size(alpha, n)
            .map_err(|e| VentureError::domain_error("make_uc_sym_dir_mult", e.to_string()))?;
        let theta: Vec<f64> = dist.sample(rng);
        let sps = args.sps.as_deref_mut().ok_or_else(|| {
            VentureError::invariant(
                "missing-sp-registry",
                "make_uc_sym_dir_mult requires a mutable procedure registry",
            )
        })?;
        let sp_id = sps.register(Box::new(crate::support::NoRequest), Box::new(UcSymDirMultOutputPsp { theta }));
        Ok(Value::Procedure(sp_id))
    }
}

#[derive(Debug)]
struct UcSymDirMultOutputPsp {
    theta: Vec<f64>,
}

impl OutputPsp for UcSymDirMultOutputPsp {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, _args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let u = rng.uniform();
        let mut acc = 0.0;
        for (i, p) in self.theta.iter().enumerate() {
            acc += p;
            if u < acc {
                return Ok(Value::Atom(i as u32));
            }
        }
        Ok(Value::Atom((self.theta.len() - 1) as u32))
    }

    fn log_density(&self, value: &Value, _args: &Args<'_>) -> Result<f64, VentureError> {
        let i = value.as_atom("uc_sym_dir_mult")? as usize;
        let p = self
            .theta
            .get(i)
            .ok_or_else(|| VentureError::domain_error("uc_sym_dir_mult", "atom out of range"))?;
        Ok(p.ln())
    }

    fn can_enumerate(&self) -> bool {
        true
    }

    fn enumerate(&self, _args: &Args<'_>) -> Result<Vec<(Value, f64)>, VentureError> {
        Ok(self
            .theta
            .iter()
            .enumerate()
            .map(|(i, p)| (Value::Atom(i as u32), p.ln()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_core::{DirectiveId, Expression};
    use venture_trace::Trace;

    #[test]
    fn sym_dir_mult_posterior_shifts_toward_observed_atom() {
        let mut trace = Trace::new(11);
        let global = trace.global_env();
        let maker_sp = trace.register_sp(Box::new(crate::support::NoRequest), Box::new(MakeSymDirMult));
        let maker_node = trace.nodes_mut().add_constant(Value::Procedure(maker_sp));
        trace.envs_mut().bind(global, "make_sym_dir_mult", maker_node).unwrap();

        let make_expr = Expression::apply(
            Expression::var("make_sym_dir_mult"),
            vec![Expression::number(1.0), Expression::number(3.0)],
        );
        let directive = DirectiveId::from_raw(0);
        trace.eval(directive, &make_expr).unwrap();
        let f_node = trace.directives().last().unwrap().1;
        trace.envs_mut().bind(global, "f", f_node).unwrap();

        let sp_id = trace.procedure_of(f_node).unwrap();
        let psp = trace.output_psp(sp_id).unwrap();

        // With no observations, each atom is equally likely.
        let args_empty = venture_core::Args {
            operands: vec![],
            operand_nodes: vec![],
            request_node: None,
            output_node: f_node,
            esr_values: vec![],
            esr_nodes: vec![],
            environment: global,
            spaux: trace.nodes_mut().get_mut(f_node).unwrap().spaux_mut(),
            envs: None,
            sps: None,
        };
        let uniform_density = psp.log_density(&Value::Atom(0), &args_empty).unwrap();
        assert!((uniform_density.exp() - 1.0 / 3.0).abs() < 1e-9);
        drop(args_empty);

        // Incorporate several observations of atom 0 and confirm its
        // predictive probability has risen above uniform.
        for _ in 0..5 {
            let mut args = venture_core::Args {
                operands: vec![],
                operand_nodes: vec![],
                request_node: None,
                output_node: f_node,
                esr_values: vec![],
                esr_nodes: vec![],
                environment: global,
                spaux: trace.nodes_mut().get_mut(f_node).unwrap().spaux_mut(),
                envs: None,
                sps: None,
            };
            psp.incorporate(&Value::Atom(0), &mut args);
        }
        let args_after = venture_core::Args {
            operands: vec![],
            operand_nodes: vec![],
            request_node: None,
            output_node: f_node,
            esr_values: vec![],
            esr_nodes: vec![],
            environment: global,
            spaux: trace.nodes_mut().get_mut(f_node).unwrap().spaux_mut(),
            envs: None,
            sps: None,
        };
        let shifted_density = psp.log_density(&Value::Atom(0), &args_after).unwrap();
        assert!(shifted_density.exp() > uniform_density.exp());
    }
}
