use loam_core::check_arity;
use loam_core::types::Type;
use loam_core::value::Value;
use loam_core::LoamError;

use crate::Registry;

pub fn register(registry: &Registry) {
    // Structural equality over any operands.
    registry.native(
        "==",
        vec![Type::any(), Type::any()],
        Type::boolean(),
        |args| {
            check_arity!("==", args, 2);
            Ok(Value::boolean(args[0] == args[1]))
        },
    );
    registry.native(
        "!=",
        vec![Type::any(), Type::any()],
        Type::boolean(),
        |args| {
            check_arity!("!=", args, 2);
            Ok(Value::boolean(args[0] != args[1]))
        },
    );

    macro_rules! ordered {
        ($name:literal, $op:tt) => {
            registry.native(
                $name,
                vec![Type::integer(), Type::integer()],
                Type::boolean(),
                |args| {
                    check_arity!($name, args, 2);
                    match (&args[0], &args[1]) {
                        (Value::Integer(a), Value::Integer(b)) => Ok(Value::boolean(a $op b)),
                        _ => Err(LoamError::type_mismatch(
                            concat!($name, ": integers"),
                            args[0].type_name(),
                        )),
                    }
                },
            );
            registry.native(
                $name,
                vec![Type::unsigned(), Type::unsigned()],
                Type::boolean(),
                |args| {
                    check_arity!($name, args, 2);
                    match (&args[0], &args[1]) {
                        (Value::Unsigned(a), Value::Unsigned(b)) => Ok(Value::boolean(a $op b)),
                        _ => Err(LoamError::type_mismatch(
                            concat!($name, ": unsigned integers"),
                            args[0].type_name(),
                        )),
                    }
                },
            );
            registry.native(
                $name,
                vec![Type::float(), Type::float()],
                Type::boolean(),
                |args| {
                    check_arity!($name, args, 2);
                    match (&args[0], &args[1]) {
                        (Value::Float(a), Value::Float(b)) => Ok(Value::boolean(a $op b)),
                        _ => Err(LoamError::type_mismatch(
                            concat!($name, ": floats"),
                            args[0].type_name(),
                        )),
                    }
                },
            );
        };
    }

    ordered!("<", <);
    ordered!("<=", <=);
    ordered!(">", >);
    ordered!(">=", >=);

    registry.native("not", vec![Type::boolean()], Type::boolean(), |args| {
        check_arity!("not", args, 1);
        match &args[0] {
            Value::Boolean(b) => Ok(Value::boolean(!b)),
            other => Err(LoamError::type_mismatch("not: boolean", other.type_name())),
        }
    });
}
