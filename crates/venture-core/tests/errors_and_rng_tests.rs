use venture_core::{derive_substream_seed, RngHandle, VentureError};

#[test]
fn type_error_carries_operator_and_kind_context() {
    let err = VentureError::type_error("plus", "number", "bool");
    let info = err.info();
    assert_eq!(info.context.get("operator").map(String::as_str), Some("plus"));
    assert_eq!(info.context.get("expected").map(String::as_str), Some("number"));
    assert_eq!(info.context.get("got").map(String::as_str), Some("bool"));
}

#[test]
fn substream_seeds_are_deterministic_and_distinct() {
    let a = derive_substream_seed(42, 0);
    let b = derive_substream_seed(42, 0);
    let c = derive_substream_seed(42, 1);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn rng_handle_is_reproducible_from_seed() {
    let mut r1 = RngHandle::from_seed(7);
    let mut r2 = RngHandle::from_seed(7);
    let draws1: Vec<f64> = (0..5).map(|_| r1.uniform()).collect();
    let draws2: Vec<f64> = (0..5).map(|_| r2.uniform()).collect();
    assert_eq!(draws1, draws2);
    for x in draws1 {
        assert!((0.0..1.0).contains(&x));
    }
}
