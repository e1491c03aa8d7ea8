use venture_core::{Value, ValueKey};

#[test]
fn lists_round_trip_through_vec() {
    let values = vec![Value::Number(1.0), Value::Bool(true), Value::Atom(3)];
    let list = Value::list_from(&values);
    let recovered = list.list_to_vec("test").expect("proper list");
    assert_eq!(recovered, values);
}

#[test]
fn numbers_hash_by_bit_pattern() {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let a = Value::Number(0.0);
    let b = Value::Number(0.0);
    assert_eq!(a, b);

    let mut ha = DefaultHasher::new();
    a.hash(&mut ha);
    let mut hb = DefaultHasher::new();
    b.hash(&mut hb);
    assert_eq!(ha.finish(), hb.finish());
}

#[test]
fn improper_list_is_a_type_error() {
    let improper = Value::Pair(
        std::rc::Rc::new(Value::Number(1.0)),
        std::rc::Rc::new(Value::Number(2.0)),
    );
    assert!(improper.list_to_vec("test").is_err());
}

#[test]
fn value_key_equality_matches_value_equality() {
    let a: ValueKey = Value::Symbol(std::rc::Rc::from("x")).into();
    let b: ValueKey = Value::Symbol(std::rc::Rc::from("x")).into();
    assert_eq!(a, b);
}
