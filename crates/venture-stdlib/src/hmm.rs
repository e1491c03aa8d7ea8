//! `make_lazy_hmm`: the one stdlib procedure exercising `has_latents`/
//! `simulate_latents`/`detach_latents` from the C4 interface (SPEC_FULL.md
//! §14).
//!
//! `original_source` names `make_lazy_hmm` in `builtin.cxx`'s registration
//! table (`MakeLazyHMMSP`) but `sps/hmm.cxx` itself was not retrieved, so the
//! generative model below is grounded on the standard discrete hidden Markov
//! chain directly: `(make_lazy_hmm p0 trans obs)` mints a procedure `f` such
//! that `(f t)` samples a fresh hidden-state chain `state_0..state_t`
//! (`state_0 ~ p0`, `state_i ~ trans[state_{i-1}]`) and returns an
//! observation drawn from `obs[state_t]`. "Lazy" names the original's
//! on-demand chain growth; this workspace has no shared per-application node
//! to grow a chain across calls against (each `(f t)` is its own family), so
//! each call resamples its own chain from scratch, same as the original's
//! behavior the first time a given `t` is requested.
//!
//! The chain backing one application is exactly the kind of latent state
//! [`venture_core::LatentDb`] exists for, but it is keyed by `output_node`
//! inside the PSP's own `RefCell`, the same node-keyed-cache shape
//! `mem`'s `Rc<RefCell<IndexMap<..>>>` uses — `Args` has no per-node slot a
//! PSP can stash arbitrary data into ahead of `detach_latents` reading it
//! back, only the `output_node` id itself to key by.

use std::any::Any;
use std::cell::RefCell;

use indexmap::IndexMap;

use venture_core::{Args, LatentDb, LatentDbHandle, NodeId, OutputPsp, RngHandle, Value, VentureError};

fn normalize(weights: &[f64], operator: &str) -> Result<Vec<f64>, VentureError> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(VentureError::domain_error(operator, "distribution weights must sum to a positive value"));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

fn categorical_draw(weights: &[f64], rng: &mut RngHandle) -> usize {
    let u = rng.uniform();
    let mut acc = 0.0;
    for (i, p) in weights.iter().enumerate() {
        acc += p;
        if u < acc {
            return i;
        }
    }
    weights.len() - 1
}

fn categorical_log_density(weights: &[f64], i: usize, operator: &str) -> Result<f64, VentureError> {
    weights
        .get(i)
        .map(|p| p.ln())
        .ok_or_else(|| VentureError::domain_error(operator, format!("atom #{i} out of range")))
}

fn row_matrix(value: &Value, operator: &str) -> Result<Vec<Vec<f64>>, VentureError> {
    value
        .as_array(operator)?
        .iter()
        .map(|row| row.as_array(operator)?.iter().map(|v| v.as_number(operator)).collect())
        .collect()
}

/// `(make_lazy_hmm p0 trans obs)`: `p0` an array of `n` state weights,
/// `trans`/`obs` arrays of `n` rows each (next-state and observation weights
/// per state), all courtesy-normalized the same way `categorical` is.
#[derive(Debug)]
pub struct MakeLazyHmm;

impl OutputPsp for MakeLazyHmm {
    fn is_random(&self) -> bool {
        false
    }

    fn simulate(&self, args: &mut Args<'_>, _rng: &mut RngHandle) -> Result<Value, VentureError> {
        args.require_arity("make_lazy_hmm", 3)?;
        let p0 = normalize(
            &args.operand("make_lazy_hmm", 0)?.as_array("make_lazy_hmm")?.iter().map(|v| v.as_number("make_lazy_hmm")).collect::<Result<Vec<_>, _>>()?,
            "make_lazy_hmm",
        )?;
        let trans = row_matrix(args.operand("make_lazy_hmm", 1)?, "make_lazy_hmm")?
            .into_iter()
            .map(|row| normalize(&row, "make_lazy_hmm"))
            .collect::<Result<Vec<_>, _>>()?;
        let obs = row_matrix(args.operand("make_lazy_hmm", 2)?, "make_lazy_hmm")?
            .into_iter()
            .map(|row| normalize(&row, "make_lazy_hmm"))
            .collect::<Result<Vec<_>, _>>()?;
        if trans.len() != p0.len() || obs.len() != p0.len() {
            return Err(VentureError::domain_error(
                "make_lazy_hmm",
                "trans and obs must each have one row per state in p0",
            ));
        }
        let sps = args.sps.as_deref_mut().ok_or_else(|| {
            VentureError::invariant("missing-sp-registry", "make_lazy_hmm requires a mutable procedure registry")
        })?;
        let sp_id = sps.register(
            Box::new(crate::support::NoRequest),
            Box::new(LazyHmmOutputPsp {
                p0,
                trans,
                obs,
                chains: RefCell::new(IndexMap::new()),
            }),
        );
        Ok(Value::Procedure(sp_id))
    }
}

#[derive(Debug, Clone)]
struct HmmChain(Vec<usize>);

impl LatentDb for HmmChain {
    fn clone_box(&self) -> Box<dyn LatentDb> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug)]
struct LazyHmmOutputPsp {
    p0: Vec<f64>,
    trans: Vec<Vec<f64>>,
    obs: Vec<Vec<f64>>,
    /// One sampled state chain per application (`output_node`), since a
    /// `SpAux` is shared across every application of this SP rather than
    /// scoped to one.
    chains: RefCell<IndexMap<NodeId, Vec<usize>>>,
}

impl LazyHmmOutputPsp {
    fn sample_chain(&self, index: usize, rng: &mut RngHandle) -> Vec<usize> {
        let mut chain = Vec::with_capacity(index + 1);
        chain.push(categorical_draw(&self.p0, rng));
        for _ in 1..=index {
            let prev = *chain.last().expect("chain seeded with state_0 above");
            chain.push(categorical_draw(&self.trans[prev], rng));
        }
        chain
    }

    fn index(args: &Args<'_>) -> Result<usize, VentureError> {
        args.require_arity("lazy_hmm", 1)?;
        Ok(args.operand("lazy_hmm", 0)?.as_number("lazy_hmm")? as usize)
    }
}

impl OutputPsp for LazyHmmOutputPsp {
    fn is_random(&self) -> bool {
        true
    }

    fn simulate(&self, args: &mut Args<'_>, rng: &mut RngHandle) -> Result<Value, VentureError> {
        let index = Self::index(args)?;
        let chain = self.sample_chain(index, rng);
        let state = chain[index];
        let observation = categorical_draw(&self.obs[state], rng);
        self.chains.borrow_mut().insert(args.output_node, chain);
        Ok(Value::Atom(observation as u32))
    }

    fn log_density(&self, value: &Value, args: &Args<'_>) -> Result<f64, VentureError> {
        let index = Self::index(args)?;
        let observation = value.as_atom("lazy_hmm")? as usize;
        let chains = self.chains.borrow();
        let chain = chains.get(&args.output_node).ok_or_else(|| {
            VentureError::invariant("missing-latent-db", "lazy_hmm scored before its hidden chain was simulated")
        })?;
        let state = chain[index];
        categorical_log_density(&self.obs[state], observation, "lazy_hmm")
    }

    fn has_latents(&self) -> bool {
        true
    }

    /// A fresh forward pass already sampled and cached its chain inside
    /// [`OutputPsp::simulate`] (observation generation needs the state
    /// before this method ever runs, per `regen_node`'s
    /// simulate-then-incorporate-then-`simulate_latents` order), so this is
    /// only live on the restore path. Ancestral sampling needs no importance
    /// correction either way, so both branches return zero weight.
    fn simulate_latents(
        &self,
        args: &mut Args<'_>,
        should_restore: bool,
        latent_db: Option<&LatentDbHandle>,
        _rng: &mut RngHandle,
    ) -> Result<f64, VentureError> {
        if should_restore {
            let handle = latent_db.ok_or_else(|| {
                VentureError::invariant("missing-latent-db", "lazy_hmm restore requested with no saved chain")
            })?;
            let chain = handle
                .as_any()
                .downcast_ref::<HmmChain>()
                .ok_or_else(|| VentureError::invariant("latent-db-type-mismatch", "saved latent state was not an HmmChain"))?;
            self.chains.borrow_mut().insert(args.output_node, chain.0.clone());
        }
        Ok(0.0)
    }

    fn detach_latents(&self, args: &mut Args<'_>) -> Option<LatentDbHandle> {
        self.chains
            .borrow()
            .get(&args.output_node)
            .map(|chain| Box::new(HmmChain(chain.clone())) as LatentDbHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venture_core::{DirectiveId, Expression};
    use venture_trace::Trace;

    fn array_of_numbers(xs: &[f64]) -> Expression {
        Expression::apply(
            Expression::var("make_vector"),
            xs.iter().map(|&x| Expression::number(x)).collect(),
        )
    }

    #[test]
    fn deterministic_two_state_chain_always_observes_its_state() {
        // state 0 always emits observation 0, state 1 always observation 1,
        // and the chain never leaves its starting state, so `(f t)` for any
        // t must equal state_0.
        let mut trace = Trace::new(13);
        let global = trace.global_env();
        crate::install(&mut trace);

        let make_expr = Expression::apply(
            Expression::var("make_lazy_hmm"),
            vec![
                array_of_numbers(&[1.0, 0.0]),
                Expression::apply(
                    Expression::var("make_vector"),
                    vec![array_of_numbers(&[1.0, 0.0]), array_of_numbers(&[0.0, 1.0])],
                ),
                Expression::apply(
                    Expression::var("make_vector"),
                    vec![array_of_numbers(&[1.0, 0.0]), array_of_numbers(&[0.0, 1.0])],
                ),
            ],
        );
        let directive = DirectiveId::from_raw(0);
        trace.eval(directive, &make_expr).unwrap();
        let f_node = trace.directives().last().unwrap().1;
        trace.envs_mut().bind(global, "f", f_node).unwrap();

        for (i, t) in [1, 2, 3].into_iter().enumerate() {
            let call = Expression::apply(Expression::var("f"), vec![Expression::number(t as f64)]);
            let value = trace.eval(DirectiveId::from_raw((i + 1) as u64), &call).unwrap();
            assert_eq!(value, Value::Atom(0), "state-0-locked chain must always observe 0 at t={t}");
        }
    }
}
