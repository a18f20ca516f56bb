use loam_core::check_arity;
use loam_core::types::Type;
use loam_core::value::Value;
use loam_core::LoamError;

use crate::Registry;

fn as_float(v: &Value, name: &str) -> Result<f64, LoamError> {
    match v {
        Value::Float(f) => Ok(*f),
        Value::Integer(n) => Ok(*n as f64),
        Value::Unsigned(n) => Ok(*n as f64),
        other => Err(LoamError::type_mismatch(
            format!("{name}: number"),
            other.type_name(),
        )),
    }
}

/// One overload per operand kind; the compiler routes statically typed
/// operands straight to the arithmetic instructions, so these natives
/// serve the dynamically typed path through `Dispatch`.
pub fn register(registry: &Registry) {
    macro_rules! int_op {
        ($name:literal, $f:expr) => {
            registry.native(
                $name,
                vec![Type::integer(), Type::integer()],
                Type::integer(),
                |args| {
                    check_arity!($name, args, 2);
                    match (&args[0], &args[1]) {
                        (Value::Integer(a), Value::Integer(b)) => $f(*a, *b),
                        _ => Err(LoamError::type_mismatch(
                            concat!($name, ": integers"),
                            args[0].type_name(),
                        )),
                    }
                },
            );
        };
    }

    macro_rules! uint_op {
        ($name:literal, $f:expr) => {
            registry.native(
                $name,
                vec![Type::unsigned(), Type::unsigned()],
                Type::unsigned(),
                |args| {
                    check_arity!($name, args, 2);
                    match (&args[0], &args[1]) {
                        (Value::Unsigned(a), Value::Unsigned(b)) => $f(*a, *b),
                        _ => Err(LoamError::type_mismatch(
                            concat!($name, ": unsigned integers"),
                            args[0].type_name(),
                        )),
                    }
                },
            );
        };
    }

    macro_rules! float_op {
        ($name:literal, $f:expr) => {
            registry.native(
                $name,
                vec![Type::float(), Type::float()],
                Type::float(),
                |args| {
                    check_arity!($name, args, 2);
                    match (&args[0], &args[1]) {
                        (Value::Float(a), Value::Float(b)) => Ok(Value::float($f(*a, *b))),
                        _ => Err(LoamError::type_mismatch(
                            concat!($name, ": floats"),
                            args[0].type_name(),
                        )),
                    }
                },
            );
        };
    }

    int_op!("+", |a: i64, b: i64| Ok(Value::int(a.wrapping_add(b))));
    int_op!("-", |a: i64, b: i64| Ok(Value::int(a.wrapping_sub(b))));
    int_op!("*", |a: i64, b: i64| Ok(Value::int(a.wrapping_mul(b))));
    int_op!("div", |a: i64, b: i64| {
        if b == 0 {
            Err(LoamError::domain("integer division by zero"))
        } else {
            Ok(Value::int(a.wrapping_div(b)))
        }
    });
    int_op!("mod", |a: i64, b: i64| {
        if b == 0 {
            Err(LoamError::domain("integer modulo by zero"))
        } else {
            Ok(Value::int(a.wrapping_rem(b)))
        }
    });

    uint_op!("+", |a: u64, b: u64| Ok(Value::uint(a.wrapping_add(b))));
    uint_op!("-", |a: u64, b: u64| Ok(Value::uint(a.wrapping_sub(b))));
    uint_op!("*", |a: u64, b: u64| Ok(Value::uint(a.wrapping_mul(b))));
    uint_op!("div", |a: u64, b: u64| {
        if b == 0 {
            Err(LoamError::domain("integer division by zero"))
        } else {
            Ok(Value::uint(a / b))
        }
    });
    uint_op!("mod", |a: u64, b: u64| {
        if b == 0 {
            Err(LoamError::domain("integer modulo by zero"))
        } else {
            Ok(Value::uint(a % b))
        }
    });

    float_op!("+", |a, b| a + b);
    float_op!("-", |a, b| a - b);
    float_op!("*", |a, b| a * b);
    float_op!("mod", |a: f64, b: f64| a % b);

    // `/` is float division over any numeric operands, IEEE semantics.
    let numeric = || Type::union(vec![Type::integer(), Type::unsigned(), Type::float()]);
    registry.native("/", vec![numeric(), numeric()], Type::float(), |args| {
        check_arity!("/", args, 2);
        Ok(Value::float(
            as_float(&args[0], "/")? / as_float(&args[1], "/")?,
        ))
    });

    registry.native("neg", vec![Type::integer()], Type::integer(), |args| {
        check_arity!("neg", args, 1);
        match &args[0] {
            Value::Integer(n) => Ok(Value::int(n.wrapping_neg())),
            other => Err(LoamError::type_mismatch("neg: integer", other.type_name())),
        }
    });
    registry.native("neg", vec![Type::float()], Type::float(), |args| {
        check_arity!("neg", args, 1);
        match &args[0] {
            Value::Float(f) => Ok(Value::float(-f)),
            other => Err(LoamError::type_mismatch("neg: float", other.type_name())),
        }
    });
}
