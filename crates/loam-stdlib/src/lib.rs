mod arithmetic;
mod comparison;
mod templates;
mod type_names;
mod values;

pub use templates::{template_tag, typed_template_tag};

use std::rc::Rc;

use loam_core::intern::Name;
use loam_core::scope::{Context, Scope};
use loam_core::stack::Stack;
use loam_core::types::Type;
use loam_core::value::Value;
use loam_core::LoamError;

/// The primitives context: a top-level stack of named type constants and
/// native-function overloads, imported by every compiled module.
pub struct Primitives {
    context: Rc<Context>,
}

impl Primitives {
    pub fn context(&self) -> &Rc<Context> {
        &self.context
    }

    pub fn stack(&self) -> Rc<Stack> {
        self.context
            .runtime_stack()
            .expect("primitives always carry their runtime stack")
    }
}

/// Build the standard primitives registry.
pub fn primitives() -> Primitives {
    let context = Context::new(vec![]);
    {
        let registry = Registry {
            scope: context.top_scope(),
        };
        type_names::register(&registry);
        arithmetic::register(&registry);
        comparison::register(&registry);
        values::register(&registry);
        templates::register(&registry);
    }
    // The designated runtime stack doubles as the compile-time snapshot,
    // so annotation resolution sees the same bindings the evaluator will.
    let stack = context.new_stack();
    context.set_runtime_stack(stack);
    Primitives { context }
}

pub(crate) struct Registry {
    scope: Rc<Scope>,
}

impl Registry {
    /// Declare an eagerly evaluated binding with a known compile-time
    /// value.
    pub fn value(&self, name: &str, value: Value, ty: Rc<Type>) {
        let variable = self.scope.declare(Name::new(name), ty);
        variable.finish_evaluation(value);
    }

    /// Declare a named type constant.
    pub fn ty(&self, name: &str, t: Rc<Type>) {
        self.value(name, Value::type_value(t.clone()), Type::type_of(t));
    }

    /// Declare one native overload under `name`.
    pub fn native(
        &self,
        name: &str,
        parameters: Vec<Rc<Type>>,
        return_type: Rc<Type>,
        f: impl Fn(&[Value]) -> Result<Value, LoamError> + 'static,
    ) {
        self.value(
            name,
            Value::native(name, f),
            Type::function(parameters, return_type),
        );
    }
}
