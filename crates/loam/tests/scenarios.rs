//! The smoke-test programs, written as the expression trees the external
//! parser would produce for them.

mod common;

use std::rc::Rc;

use loam::BinaryOp::{Add, Div, Eq, IntDiv, Mod, Mul, Sub};
use loam::{Expression as E, LoamError, Value};

// 1 + 1
fn one_plus_one() -> Vec<Rc<E>> {
    vec![E::binary(Add, E::int(1), E::int(1))]
}

// a = "abcd"; a
fn string_variable() -> Vec<Rc<E>> {
    vec![E::assign("a", E::string("abcd")), E::name("a")]
}

// a = (b = do c = 1); a + (b + 3) + c
fn nested_assignment() -> Vec<Rc<E>> {
    vec![
        E::assign(
            "a",
            E::assign("b", E::block(vec![E::assign("c", E::int(1))])),
        ),
        E::binary(
            Add,
            E::binary(
                Add,
                E::name("a"),
                E::binary(Add, E::name("b"), E::int(3)),
            ),
            E::name("c"),
        ),
    ]
}

// 9 * (1 + 4) / 2 - 3f
fn float_division() -> Vec<Rc<E>> {
    vec![E::binary(
        Sub,
        E::binary(
            Div,
            E::binary(Mul, E::int(9), E::binary(Add, E::int(1), E::int(4))),
            E::int(2),
        ),
        E::float(3.0),
    )]
}

// 9 * (1 + 4) div 2 - 3
fn integer_division() -> Vec<Rc<E>> {
    vec![E::binary(
        Sub,
        E::binary(
            IntDiv,
            E::binary(Mul, E::int(9), E::binary(Add, E::int(1), E::int(4))),
            E::int(2),
        ),
        E::int(3),
    )]
}

// foo(x) = x + 1; foo(3)
fn untyped_function() -> Vec<Rc<E>> {
    vec![
        E::def(
            "foo",
            vec![E::param("x")],
            None,
            E::binary(Add, E::name("x"), E::int(1)),
        ),
        E::call(E::name("foo"), vec![E::int(3)]),
    ]
}

// gcd(a: Int, b: Int): Int = if b == 0 then a else gcd(b, a mod b); gcd(12, 42)
fn recursive_gcd() -> Vec<Rc<E>> {
    vec![
        E::def(
            "gcd",
            vec![
                E::typed_param("a", E::name("Int")),
                E::typed_param("b", E::name("Int")),
            ],
            Some(E::name("Int")),
            E::if_(
                E::binary(Eq, E::name("b"), E::int(0)),
                E::name("a"),
                Some(E::call(
                    E::name("gcd"),
                    vec![E::name("b"), E::binary(Mod, E::name("a"), E::name("b"))],
                )),
            ),
        ),
        E::call(E::name("gcd"), vec![E::int(12), E::int(42)]),
    ]
}

// foo(x) = x + 1; foo(x: Int) = x - 1; foo(3)
fn specificity_dispatch() -> Vec<Rc<E>> {
    vec![
        E::def(
            "foo",
            vec![E::param("x")],
            None,
            E::binary(Add, E::name("x"), E::int(1)),
        ),
        E::def(
            "foo",
            vec![E::typed_param("x", E::name("Int"))],
            None,
            E::binary(Sub, E::name("x"), E::int(1)),
        ),
        E::call(E::name("foo"), vec![E::int(3)]),
    ]
}

// foo(x: Float) = x - 1.0; foo(x) = x + 1; foo(3)
fn elimination_dispatch() -> Vec<Rc<E>> {
    vec![
        E::def(
            "foo",
            vec![E::typed_param("x", E::name("Float"))],
            None,
            E::binary(Sub, E::name("x"), E::float(1.0)),
        ),
        E::def(
            "foo",
            vec![E::param("x")],
            None,
            E::binary(Add, E::name("x"), E::int(1)),
        ),
        E::call(E::name("foo"), vec![E::int(3)]),
    ]
}

scenario_tests! {
    scenario_addition: one_plus_one() => Value::int(2),
    scenario_string_variable: string_variable() => Value::string("abcd"),
    scenario_nested_assignment: nested_assignment() => Value::int(6),
    scenario_float_division: float_division() => Value::float(19.5),
    scenario_integer_division: integer_division() => Value::int(19),
    scenario_untyped_function: untyped_function() => Value::int(4),
    scenario_recursive_gcd: recursive_gcd() => Value::int(6),
    scenario_specificity_dispatch: specificity_dispatch() => Value::int(2),
    scenario_elimination_dispatch: elimination_dispatch() => Value::int(4),
}

// 1 + 1.0: no `+` overload takes mixed operands; rejected at compile.
#[test]
fn scenario_mixed_addition_fails_to_compile() {
    let program = vec![E::binary(Add, E::int(1), E::float(1.0))];
    let err = common::run_err(&program);
    assert!(
        matches!(err, LoamError::NoOverloadFound { .. }),
        "expected an overload failure, got: {err}"
    );
}

// Dispatch stability: the same call site picks the same overload every
// time.
#[test]
fn scenario_dispatch_is_stable() {
    for _ in 0..8 {
        assert_eq!(common::run(&specificity_dispatch()), Value::int(2));
    }
}
