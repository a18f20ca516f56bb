use std::rc::Rc;

use loam::{Expression, LoamError, Runtime, Value};

/// Run a program in a fresh runtime, panicking on failure.
pub fn run(program: &[Rc<Expression>]) -> Value {
    Runtime::new()
        .run(program)
        .unwrap_or_else(|e| panic!("program failed: {e}"))
}

/// Run a program expecting an error.
pub fn run_err(program: &[Rc<Expression>]) -> LoamError {
    Runtime::new()
        .run(program)
        .expect_err("expected the program to fail")
}

/// Generate a `_value` test asserting the program's result and a
/// `_typechecks` test asserting the result round-trips through its own
/// derived type.
#[macro_export]
macro_rules! scenario_tests {
    ($($name:ident : $program:expr => $expected:expr),* $(,)?) => {
        $(
            paste::paste! {
                #[test]
                fn [<$name _value>]() {
                    let result = common::run(&$program);
                    assert_eq!(result, $expected);
                }

                #[test]
                fn [<$name _typechecks>]() {
                    let result = common::run(&$program);
                    assert!(
                        loam::check_type(&result, &result.to_type()),
                        "value should satisfy its own derived type"
                    );
                }
            }
        )*
    };
}
