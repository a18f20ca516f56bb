use loam_core::check_arity;
use loam_core::types::Type;
use loam_core::value::Value;
use loam_core::LoamError;

use crate::Registry;

pub fn register(registry: &Registry) {
    registry.native(
        "ref",
        vec![Type::any()],
        Type::reference_to(Type::any()),
        |args| {
            check_arity!("ref", args, 1);
            Ok(Value::reference(args[0].clone()))
        },
    );

    registry.native(
        "deref",
        vec![Type::reference_to(Type::any())],
        Type::any(),
        |args| {
            check_arity!("deref", args, 1);
            match &args[0] {
                Value::Reference(cell) => Ok(cell.borrow().clone()),
                other => Err(LoamError::type_mismatch(
                    "deref: reference",
                    other.type_name(),
                )),
            }
        },
    );

    registry.native(
        "put",
        vec![Type::reference_to(Type::any()), Type::any()],
        Type::any(),
        |args| {
            check_arity!("put", args, 2);
            match &args[0] {
                Value::Reference(cell) => {
                    *cell.borrow_mut() = args[1].clone();
                    Ok(args[1].clone())
                }
                other => Err(LoamError::type_mismatch(
                    "put: reference",
                    other.type_name(),
                )),
            }
        },
    );

    registry.native("len", vec![Type::any()], Type::integer(), |args| {
        check_arity!("len", args, 1);
        let n = match &args[0] {
            Value::List(items) => items.borrow().len(),
            Value::Array(items) => items.len(),
            Value::String(s) => s.borrow().len(),
            Value::Set(items) => items.borrow().len(),
            Value::Table(pairs) => pairs.borrow().len(),
            Value::Composite(fields) => fields.borrow().len(),
            other => {
                return Err(LoamError::type_mismatch(
                    "len: collection",
                    other.type_name(),
                ))
            }
        };
        Ok(Value::int(n as i64))
    });
}
