use loam_core::check_arity;
use loam_core::types::Type;
use loam_core::value::Value;
use loam_core::LoamError;

use crate::Registry;

fn type_argument(args: &[Value], index: usize, name: &str) -> Result<std::rc::Rc<Type>, LoamError> {
    match &args[index] {
        Value::Type(t) => Ok(t.clone()),
        other => Err(LoamError::type_mismatch(
            format!("{name}: type argument"),
            other.type_name(),
        )),
    }
}

pub fn register(registry: &Registry) {
    registry.ty("None", Type::none_value());
    registry.ty("Int", Type::integer());
    registry.ty("Uint", Type::unsigned());
    registry.ty("Float", Type::float());
    registry.ty("Bool", Type::boolean());
    registry.ty("String", Type::string());
    registry.ty("Any", Type::any());

    // Type constructors, so annotations like `List(Int)` are ordinary
    // compile-time calls.
    registry.native(
        "List",
        vec![Type::type_of(Type::any())],
        Type::type_of(Type::any()),
        |args| {
            check_arity!("List", args, 1);
            Ok(Value::type_value(Type::list_of(type_argument(
                args, 0, "List",
            )?)))
        },
    );
    registry.native(
        "Set",
        vec![Type::type_of(Type::any())],
        Type::type_of(Type::any()),
        |args| {
            check_arity!("Set", args, 1);
            Ok(Value::type_value(Type::set_of(type_argument(
                args, 0, "Set",
            )?)))
        },
    );
    registry.native(
        "Ref",
        vec![Type::type_of(Type::any())],
        Type::type_of(Type::any()),
        |args| {
            check_arity!("Ref", args, 1);
            Ok(Value::type_value(Type::reference_to(type_argument(
                args, 0, "Ref",
            )?)))
        },
    );
    registry.native(
        "Table",
        vec![Type::type_of(Type::any()), Type::type_of(Type::any())],
        Type::type_of(Type::any()),
        |args| {
            check_arity!("Table", args, 2);
            Ok(Value::type_value(Type::table_of(
                type_argument(args, 0, "Table")?,
                type_argument(args, 1, "Table")?,
            )))
        },
    );
}
