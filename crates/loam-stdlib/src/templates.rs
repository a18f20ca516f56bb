use std::rc::Rc;

use loam_core::check_arity;
use loam_core::matching::{covariant, TypeMatch};
use loam_core::property::{Properties, PropertyTag};
use loam_core::types::{check_type, Type};
use loam_core::value::Value;
use loam_core::LoamError;

use crate::Registry;

/// The template tag: a startup singleton identified by pointer. Template
/// metaprogramming lives outside the core; this identity is its contract
/// with it.
pub fn template_tag() -> PropertyTag {
    thread_local! {
        static TAG: PropertyTag = PropertyTag::new("Template");
    }
    TAG.with(PropertyTag::clone)
}

/// The typed-template tag, also a startup singleton. Its argument is the
/// produced type; the matchers refine candidates against it.
pub fn typed_template_tag() -> PropertyTag {
    thread_local! {
        static TAG: PropertyTag = PropertyTag::with_matchers(
            "TypedTemplate",
            vec![Type::type_of(Type::any())],
            Some(Box::new(|t, args| match args.first() {
                Some(Value::Type(produced)) => covariant(produced, t),
                _ => TypeMatch::None,
            })),
            Some(Box::new(|v, args| match args.first() {
                Some(Value::Type(produced)) => check_type(v, produced),
                _ => false,
            })),
        );
    }
    TAG.with(PropertyTag::clone)
}

fn expect_type(args: &[Value], index: usize, name: &str) -> Result<Rc<Type>, LoamError> {
    match &args[index] {
        Value::Type(t) => Ok(t.clone()),
        other => Err(LoamError::type_mismatch(
            format!("{name}: type argument"),
            other.type_name(),
        )),
    }
}

pub fn register(registry: &Registry) {
    // Refinement-type constructors over the startup tag identities.
    registry.native(
        "Template",
        vec![Type::type_of(Type::any())],
        Type::type_of(Type::any()),
        |args| {
            check_arity!("Template", args, 1);
            let inner = expect_type(args, 0, "Template")?;
            Ok(Value::type_value(Type::with_property_tag(
                inner,
                template_tag(),
            )))
        },
    );
    registry.native(
        "TypedTemplate",
        vec![Type::type_of(Type::any()), Type::type_of(Type::any())],
        Type::type_of(Type::any()),
        |args| {
            check_arity!("TypedTemplate", args, 2);
            let inner = expect_type(args, 0, "TypedTemplate")?;
            expect_type(args, 1, "TypedTemplate")?;
            // The produced type rides in the property bag so both tag
            // matchers see it during matching and value checking.
            let refined = Type::with_property_tag(inner, typed_template_tag());
            Ok(Value::type_value(Rc::new(Type::with_properties(
                refined.body.clone(),
                Properties::single(typed_template_tag(), vec![args[1].clone()]),
            ))))
        },
    );

    // Value taggers: annotate a value with the singleton tags so refined
    // overloads and `checkType` recognize it.
    registry.native("template", vec![Type::any()], Type::any(), |args| {
        check_arity!("template", args, 1);
        Ok(Value::property_reference(
            Properties::single(template_tag(), vec![]),
            args[0].clone(),
        ))
    });
    registry.native(
        "typed_template",
        vec![Type::any(), Type::type_of(Type::any())],
        Type::any(),
        |args| {
            check_arity!("typed_template", args, 2);
            expect_type(args, 1, "typed_template")?;
            Ok(Value::property_reference(
                Properties::single(typed_template_tag(), vec![args[1].clone()]),
                args[0].clone(),
            ))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_startup_singletons() {
        assert_eq!(template_tag(), template_tag());
        assert_eq!(typed_template_tag(), typed_template_tag());
        assert_ne!(template_tag(), typed_template_tag());
    }

    #[test]
    fn test_template_refinement_requires_the_tag() {
        let refined = Type::with_property_tag(Type::any(), template_tag());
        let tagged = Value::property_reference(
            Properties::single(template_tag(), vec![]),
            Value::int(1),
        );
        assert!(check_type(&tagged, &refined));
        assert!(!check_type(&Value::int(1), &refined));
    }

    #[test]
    fn test_typed_template_value_matcher_checks_the_produced_type() {
        let matcher = typed_template_tag();
        let vm = matcher.value_matcher().expect("tag carries a value matcher");
        let produced = [Value::type_value(Type::integer())];
        assert!(vm(&Value::int(3), &produced));
        assert!(!vm(&Value::string("s"), &produced));
    }

    #[test]
    fn test_typed_template_type_matcher_refines_candidates() {
        let matcher = typed_template_tag();
        let tm = matcher.type_matcher().expect("tag carries a type matcher");
        let produced = [Value::type_value(Type::integer())];
        assert!(tm(&Type::integer(), &produced).matches());
        assert!(!tm(&Type::string(), &produced).matches());
        assert_eq!(tm(&Type::integer(), &[]), TypeMatch::None);
    }
}
