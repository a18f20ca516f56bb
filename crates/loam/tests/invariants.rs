//! Property tests for the quantified invariants: equality/hash coherence,
//! the value→type round trip, and the match relation's laws.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use proptest::prelude::*;

use loam::{check_type, common_type, Name, Type, TypeMatch, Value};

fn hash_of<T: Hash>(t: &T) -> u64 {
    let mut h = DefaultHasher::new();
    t.hash(&mut h);
    h.finish()
}

/// Rebuild a value structurally so the copy shares no heap cells with the
/// original. Identity-compared kinds never appear in the strategies below.
fn deep_clone(v: &Value) -> Value {
    match v {
        Value::List(items) => Value::list(items.borrow().iter().map(deep_clone).collect()),
        Value::Array(items) => Value::array(items.iter().map(deep_clone).collect()),
        Value::String(s) => Value::string(s.borrow().clone()),
        Value::Set(items) => Value::set(items.borrow().iter().map(deep_clone)),
        Value::Table(pairs) => Value::table(
            pairs
                .borrow()
                .iter()
                .map(|(k, v)| (deep_clone(k), deep_clone(v))),
        ),
        Value::Composite(fields) => Value::composite(
            fields
                .borrow()
                .iter()
                .map(|(name, v)| (*name, deep_clone(v))),
        ),
        other => other.clone(),
    }
}

fn atom() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::None),
        any::<i64>().prop_map(Value::int),
        any::<u64>().prop_map(Value::uint),
        any::<f64>().prop_map(Value::float),
        any::<bool>().prop_map(Value::boolean),
        "[a-z]{0,8}".prop_map(Value::string),
    ]
}

fn value(depth: u32) -> BoxedStrategy<Value> {
    if depth == 0 {
        return atom().boxed();
    }
    prop_oneof![
        atom(),
        prop::collection::vec(value(depth - 1), 0..4).prop_map(Value::list),
        prop::collection::vec(value(depth - 1), 0..4).prop_map(Value::array),
        prop::collection::vec(value(depth - 1), 0..4).prop_map(Value::set),
        prop::collection::vec((value(depth - 1), value(depth - 1)), 0..3)
            .prop_map(Value::table),
        prop::collection::vec(("[a-z]{1,6}", value(depth - 1)), 0..3).prop_map(|fields| {
            Value::composite(
                fields
                    .into_iter()
                    .map(|(name, v)| (Name::new(&name), v)),
            )
        }),
    ]
    .boxed()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn equality_is_reflexive_and_hash_stable(v in value(2)) {
        prop_assert_eq!(&v, &v);
        prop_assert_eq!(hash_of(&v), hash_of(&v));
    }

    #[test]
    fn structural_copies_are_equal_with_equal_hashes(v in value(2)) {
        let copy = deep_clone(&v);
        prop_assert_eq!(&v, &copy);
        prop_assert_eq!(hash_of(&v), hash_of(&copy));
    }

    #[test]
    fn values_satisfy_their_derived_type(v in value(2)) {
        prop_assert!(check_type(&v, &v.to_type()));
    }

    #[test]
    fn derived_types_match_themselves_equal(v in value(2)) {
        let t = v.to_type();
        prop_assert_eq!(t.match_type(&t), TypeMatch::Equal);
    }

    #[test]
    fn structural_copies_derive_equal_types(v in value(2)) {
        let copy = deep_clone(&v);
        let (ta, tb) = (v.to_type(), copy.to_type());
        prop_assert_eq!(ta.match_type(&tb), TypeMatch::Equal);
        prop_assert_eq!(tb.match_type(&ta), TypeMatch::Equal);
    }

    #[test]
    fn common_type_admits_both_values(a in value(2), b in value(2)) {
        let joined = common_type(&a.to_type(), &b.to_type());
        prop_assert!(check_type(&a, &joined));
        prop_assert!(check_type(&b, &joined));
    }
}

/// Reference and function values hash by identity, so separately built
/// cells differ; this sits outside proptest because it needs fixed
/// identities.
#[test]
fn test_identity_kinds_do_not_alias() {
    let a = Value::reference(Value::int(1));
    let b = Value::reference(Value::int(1));
    assert_ne!(a, b);
    assert_eq!(hash_of(&a), hash_of(&a.clone()));

    let t: Rc<Type> = a.to_type();
    assert!(check_type(&a, &t));
    assert!(check_type(&b, &t));
}
