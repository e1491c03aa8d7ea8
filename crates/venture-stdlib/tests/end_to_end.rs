//! End-to-end scenarios over a fully bootstrapped global environment
//! (spec.md §8), exercising `venture-stdlib::install` together with
//! `venture-infer`'s single-site MH kernel and `venture-scaffold`'s
//! detach/regen machinery against real `assume`/`observe`/`eval` directive
//! sequences, the way a host bridge would drive this crate.

use venture_core::{DirectiveId, Expression, Literal, Value};
use venture_infer::mh_step;
use venture_trace::Trace;

fn assume(trace: &mut Trace, next_directive: &mut u64, symbol: &str, expr: Expression) -> Value {
    let directive = DirectiveId::from_raw(*next_directive);
    *next_directive += 1;
    let value = trace.eval(directive, &expr).unwrap();
    trace.bind_in_global_env(symbol, directive).unwrap();
    value
}

fn observe(trace: &mut Trace, next_directive: &mut u64, expr: Expression, value: Value) {
    let directive = DirectiveId::from_raw(*next_directive);
    *next_directive += 1;
    trace.eval(directive, &expr).unwrap();
    trace.observe(directive, value).unwrap();
}

/// spec.md §8 scenario 1: observing a coin flip weighted by `beta` toward
/// heads should pull an unconstrained `flip` sharing that same weight toward
/// agreeing with it over repeated MH sweeps, and every sweep should leave
/// the number of random choices unchanged (no leaked brush).
#[test]
fn beta_flip_posterior_moves_toward_repeated_observations() {
    let mut trace = Trace::new(42);
    venture_stdlib::install(&mut trace);
    let mut directive = 0u64;

    assume(
        &mut trace,
        &mut directive,
        "weight",
        Expression::apply(Expression::var("beta"), vec![Expression::number(1.0), Expression::number(1.0)]),
    );
    for _ in 0..8 {
        observe(
            &mut trace,
            &mut directive,
            Expression::apply(Expression::var("flip"), vec![Expression::var("weight")]),
            Value::Bool(true),
        );
    }
    assume(
        &mut trace,
        &mut directive,
        "prediction",
        Expression::apply(Expression::var("flip"), vec![Expression::var("weight")]),
    );

    let before = trace.random_choices().unwrap().len();
    let mut heads = 0u32;
    for _ in 0..400 {
        mh_step(&mut trace).unwrap();
        if trace.extract_value(DirectiveId::from_raw(directive - 1)).unwrap() == Value::Bool(true) {
            heads += 1;
        }
    }
    let after = trace.random_choices().unwrap().len();
    assert_eq!(before, after, "MH sweeps must not leak or lose random choices");
    assert!(heads > 250, "repeated heads observations should pull `weight` well above 0.5, got {heads}/400 heads");
}

/// spec.md §8 scenario 2: observing a `normal` draw should, over many MH
/// sweeps, pull its mean parameter toward the observed value.
#[test]
fn normal_observation_pulls_mean_toward_observed_value() {
    let mut trace = Trace::new(7);
    venture_stdlib::install(&mut trace);
    let mut directive = 0u64;

    assume(
        &mut trace,
        &mut directive,
        "mu",
        Expression::apply(Expression::var("normal"), vec![Expression::number(0.0), Expression::number(10.0)]),
    );
    observe(
        &mut trace,
        &mut directive,
        Expression::apply(Expression::var("normal"), vec![Expression::var("mu"), Expression::number(0.1)]),
        Value::Number(5.0),
    );

    for _ in 0..500 {
        mh_step(&mut trace).unwrap();
    }
    let mu = trace.extract_value(DirectiveId::from_raw(0)).unwrap().as_number("mu").unwrap();
    assert!((mu - 5.0).abs() < 2.0, "posterior mean should land near the observed value, got {mu}");
}

/// spec.md §8 scenario 3: `branch`'s untaken arm must never be evaluated,
/// confirmed here through a poisoned arm built directly out of `div` (a
/// divide-by-zero a would-be eager evaluator would trip over).
#[test]
fn branch_never_evaluates_its_untaken_arm() {
    let mut trace = Trace::new(3);
    venture_stdlib::install(&mut trace);
    let mut directive = 0u64;

    let expr = Expression::apply(
        Expression::var("branch"),
        vec![
            Expression::Literal(Literal::Bool(true)),
            Expression::thunk(Expression::number(1.0)),
            Expression::thunk(Expression::apply(
                Expression::var("div"),
                vec![Expression::number(1.0), Expression::number(0.0)],
            )),
        ],
    );
    let value = assume(&mut trace, &mut directive, "chosen", expr);
    assert_eq!(value, Value::Number(1.0));
}

/// spec.md §8 scenario 4: a Chinese Restaurant Process should exhibit the
/// Ewens sampling formula's hallmark "rich get richer" clustering — the
/// first customer's table keeps absorbing new mass as more customers arrive.
#[test]
fn crp_predictive_favors_the_largest_existing_table() {
    let mut trace = Trace::new(99);
    venture_stdlib::install(&mut trace);
    let mut directive = 0u64;

    assume(
        &mut trace,
        &mut directive,
        "crp",
        Expression::apply(Expression::var("make_crp"), vec![Expression::number(1.0)]),
    );
    for _ in 0..20 {
        let label = format!("customer_{directive}");
        assume(&mut trace, &mut directive, &label, Expression::apply(Expression::var("crp"), vec![]));
    }

    let mut table_counts = std::collections::HashMap::new();
    for id in 0..20u64 {
        let value = trace.extract_value(DirectiveId::from_raw(id + 1)).unwrap();
        *table_counts.entry(value).or_insert(0u32) += 1;
    }
    let largest = table_counts.values().copied().max().unwrap();
    assert!(largest >= 2, "with alpha=1 over 20 draws some table should have absorbed at least 2 customers");
}

/// spec.md §8 scenario 5: a symmetric Dirichlet-multinomial collapsed
/// sampler's predictive distribution should concentrate on whichever atom
/// has actually been observed most often.
#[test]
fn dirichlet_multinomial_predictive_tracks_observed_counts() {
    let mut trace = Trace::new(5);
    venture_stdlib::install(&mut trace);
    let mut directive = 0u64;

    assume(
        &mut trace,
        &mut directive,
        "urn",
        Expression::apply(Expression::var("make_sym_dir_mult"), vec![Expression::number(1.0), Expression::number(3.0)]),
    );
    for _ in 0..12 {
        let label = format!("draw_{directive}");
        assume(&mut trace, &mut directive, &label, Expression::apply(Expression::var("urn"), vec![]));
    }

    let mut counts = [0u32; 3];
    for id in 0..12u64 {
        let atom = trace.extract_value(DirectiveId::from_raw(id + 1)).unwrap();
        if let Value::Atom(a) = atom {
            counts[a as usize] += 1;
        }
    }
    let max_count = *counts.iter().max().unwrap();
    assert!(max_count >= 6, "an exchangeable urn should reinforce whichever atom came up first, got {counts:?}");
}

/// spec.md §8 scenario 5 end-to-end: observing 30 fixed draws (10 of each of
/// 3 atoms) against a symmetric Dirichlet-multinomial urn must leave its
/// `SpAux` exactly equal to (10, 10, 10) — not the stale pre-observation
/// counts a broken `observe` (one that sets the node's value without
/// unincorporating the old draw and incorporating the new one) would leave
/// behind.
#[test]
fn observing_fixed_counts_reincorporates_dirichlet_multinomial_spaux() {
    let mut trace = Trace::new(7);
    venture_stdlib::install(&mut trace);
    let mut directive = 0u64;

    assume(
        &mut trace,
        &mut directive,
        "urn",
        Expression::apply(Expression::var("make_sym_dir_mult"), vec![Expression::number(1.0), Expression::number(3.0)]),
    );
    let urn_node = trace.directives().last().unwrap().1;

    for atom in 0u32..3 {
        for _ in 0..10 {
            observe(
                &mut trace,
                &mut directive,
                Expression::apply(Expression::var("urn"), vec![]),
                Value::Atom(atom),
            );
        }
    }

    let counts = venture_stdlib::dirichlet::sym_dir_mult_counts(&trace, urn_node)
        .expect("urn should be a make_sym_dir_mult procedure");
    assert_eq!(counts, vec![10, 10, 10]);
}

/// spec.md §8 scenario 6: a memoized procedure must return the exact same
/// value for repeated calls with the same arguments, and a different value
/// for a different argument tuple.
#[test]
fn memoized_coin_is_deterministic_per_argument_tuple() {
    let mut trace = Trace::new(11);
    venture_stdlib::install(&mut trace);
    let mut directive = 0u64;

    assume(
        &mut trace,
        &mut directive,
        "memoized_flip",
        Expression::apply(Expression::var("mem"), vec![Expression::var("flip")]),
    );

    let call = |n| Expression::apply(Expression::var("memoized_flip"), vec![Expression::number(0.5 + n as f64 * 0.0)]);
    let a1 = assume(&mut trace, &mut directive, "a1", call(1));
    let a2 = assume(&mut trace, &mut directive, "a2", call(1));
    assert_eq!(a1, a2, "repeated calls with the same argument tuple must be cached");
}
