use std::rc::Rc;

use loam_core::expr::{BinaryOp, Expression};
use loam_core::intern::Name;
use loam_core::scope::{Context, Scope};
use loam_core::statement::StatementKind;
use loam_core::types::{Type, TypeKind};
use loam_core::value::Value;
use loam_core::LoamError;
use loam_eval::Evaluator;

use crate::{compile, lower, Compiler};

/// A miniature primitives context: enough named bindings for the
/// compiler paths under test. The real registry lives in loam-stdlib.
fn primitives() -> Rc<Context> {
    let ctx = Context::new(vec![]);
    let scope = ctx.top_scope();

    let declare_value = |name: &str, value: Value, ty: Rc<Type>| {
        let variable = scope.declare(Name::new(name), ty);
        variable.finish_evaluation(value);
    };

    declare_value(
        "Int",
        Value::type_value(Type::integer()),
        Type::type_of(Type::integer()),
    );
    declare_value(
        "Float",
        Value::type_value(Type::float()),
        Type::type_of(Type::float()),
    );
    declare_value(
        "+",
        Value::native("+", |args| match (&args[0], &args[1]) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::int(a.wrapping_add(*b))),
            _ => Err(LoamError::domain("expected integers")),
        }),
        Type::function(vec![Type::integer(), Type::integer()], Type::integer()),
    );
    declare_value(
        "+",
        Value::native("+", |args| match (&args[0], &args[1]) {
            (Value::Float(a), Value::Float(b)) => Ok(Value::float(a + b)),
            _ => Err(LoamError::domain("expected floats")),
        }),
        Type::function(vec![Type::float(), Type::float()], Type::float()),
    );
    declare_value(
        "==",
        Value::native("==", |args| Ok(Value::boolean(args[0] == args[1]))),
        Type::function(vec![Type::any(), Type::any()], Type::boolean()),
    );

    ctx.set_runtime_stack(ctx.new_stack());
    ctx
}

struct Fixture {
    module: Rc<Context>,
}

impl Fixture {
    fn new() -> Fixture {
        Fixture {
            module: Context::new(vec![primitives()]),
        }
    }

    fn scope(&self) -> Rc<Scope> {
        self.module.top_scope()
    }

    fn run(&self, program: &[Rc<Expression>]) -> Result<Value, LoamError> {
        let compiler = Compiler::new();
        let scope = self.scope();
        let mut statements = Vec::new();
        for e in program {
            statements.push(compiler.compile_expression(e, &scope)?);
        }
        let instructions = statements
            .iter()
            .map(lower)
            .collect::<Result<Vec<_>, _>>()?;
        let stack = self.module.new_stack();
        let evaluator = Evaluator::new();
        let mut result = Value::None;
        for i in &instructions {
            result = evaluator.evaluate(i, &stack)?;
        }
        Ok(result)
    }
}

#[test]
fn test_literal_compiles_to_typed_constant() {
    let fx = Fixture::new();
    let statement = compile(&Expression::int(3), &fx.scope()).unwrap();
    assert!(matches!(statement.kind, StatementKind::Constant(_)));
    assert_eq!(statement.cached_type().kind(), TypeKind::Integer);
}

#[test]
fn test_every_statement_gets_a_cached_type() {
    let fx = Fixture::new();
    let exprs = [
        Expression::int(1),
        Expression::string("s"),
        Expression::list(vec![Expression::int(1)]),
        Expression::assign("v", Expression::int(2)),
        Expression::name("v"),
        Expression::block(vec![Expression::int(1), Expression::float(2.0)]),
    ];
    for e in exprs {
        let statement = compile(&e, &fx.scope()).unwrap();
        // The none-value type marks statements that yield nothing; every
        // expression here has a real type.
        assert_ne!(statement.cached_type().kind(), TypeKind::NoneValue);
    }
}

#[test]
fn test_static_int_addition_lowers_to_add_int() {
    let fx = Fixture::new();
    let statement = compile(
        &Expression::binary(BinaryOp::Add, Expression::int(1), Expression::int(1)),
        &fx.scope(),
    )
    .unwrap();
    assert!(matches!(
        statement.kind,
        StatementKind::Binary { .. }
    ));
    assert_eq!(statement.cached_type().kind(), TypeKind::Integer);
}

#[test]
fn test_mixed_arithmetic_is_a_compile_error() {
    let fx = Fixture::new();
    let result = compile(
        &Expression::binary(BinaryOp::Add, Expression::int(1), Expression::float(1.0)),
        &fx.scope(),
    );
    assert!(matches!(
        result,
        Err(LoamError::NoOverloadFound { .. })
    ));
}

#[test]
fn test_assignment_declares_then_widens() {
    let fx = Fixture::new();
    let scope = fx.scope();
    let compiler = Compiler::new();
    compiler
        .compile_expression(&Expression::assign("x", Expression::int(1)), &scope)
        .unwrap();
    let declared = scope.lookup(Name::new("x")).unwrap();
    assert_eq!(declared.variable.cached_type().kind(), TypeKind::Integer);

    compiler
        .compile_expression(&Expression::assign("x", Expression::float(2.0)), &scope)
        .unwrap();
    assert_eq!(declared.variable.cached_type().kind(), TypeKind::Union);
}

#[test]
fn test_unresolved_identifier_is_a_compile_error() {
    let fx = Fixture::new();
    let result = compile(&Expression::name("missing"), &fx.scope());
    assert!(matches!(result, Err(LoamError::Compile(_))));
}

#[test]
fn test_do_block_bindings_stay_visible() {
    let fx = Fixture::new();
    // a = (b = do c = 1); a + (b + 3) + c
    let program = [
        Expression::assign(
            "a",
            Expression::assign(
                "b",
                Expression::block(vec![Expression::assign("c", Expression::int(1))]),
            ),
        ),
        Expression::binary(
            BinaryOp::Add,
            Expression::binary(
                BinaryOp::Add,
                Expression::name("a"),
                Expression::binary(BinaryOp::Add, Expression::name("b"), Expression::int(3)),
            ),
            Expression::name("c"),
        ),
    ];
    assert_eq!(fx.run(&program).unwrap(), Value::int(6));
}

#[test]
fn test_function_def_declares_a_function_typed_variable() {
    let fx = Fixture::new();
    let scope = fx.scope();
    compile(
        &Expression::def(
            "inc",
            vec![Expression::typed_param("x", Expression::name("Int"))],
            Some(Expression::name("Int")),
            Expression::binary(BinaryOp::Add, Expression::name("x"), Expression::int(1)),
        ),
        &scope,
    )
    .unwrap();
    let inc = scope.lookup(Name::new("inc")).unwrap();
    let (params, ret) = inc.variable.cached_type().function_signature().unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].kind(), TypeKind::Integer);
    assert_eq!(ret.kind(), TypeKind::Integer);
}

#[test]
fn test_function_call_end_to_end() {
    let fx = Fixture::new();
    let program = [
        Expression::def(
            "inc",
            vec![Expression::param("x")],
            None,
            Expression::binary(BinaryOp::Add, Expression::name("x"), Expression::int(1)),
        ),
        Expression::call(Expression::name("inc"), vec![Expression::int(41)]),
    ];
    assert_eq!(fx.run(&program).unwrap(), Value::int(42));
}

#[test]
fn test_single_survivor_compiles_to_direct_call() {
    let fx = Fixture::new();
    let scope = fx.scope();
    let compiler = Compiler::new();
    compiler
        .compile_expression(
            &Expression::def(
                "only",
                vec![Expression::typed_param("x", Expression::name("Int"))],
                None,
                Expression::name("x"),
            ),
            &scope,
        )
        .unwrap();
    let call = compiler
        .compile_expression(
            &Expression::call(Expression::name("only"), vec![Expression::int(1)]),
            &scope,
        )
        .unwrap();
    assert!(matches!(call.kind, StatementKind::FunctionCall { .. }));
}

#[test]
fn test_surviving_overloads_compile_to_dispatch() {
    let fx = Fixture::new();
    let scope = fx.scope();
    let compiler = Compiler::new();
    for def in [
        Expression::def(
            "f",
            vec![Expression::param("x")],
            None,
            Expression::name("x"),
        ),
        Expression::def(
            "f",
            vec![Expression::typed_param("x", Expression::name("Int"))],
            None,
            Expression::name("x"),
        ),
    ] {
        compiler.compile_expression(&def, &scope).unwrap();
    }
    let call = compiler
        .compile_expression(
            &Expression::call(Expression::name("f"), vec![Expression::int(1)]),
            &scope,
        )
        .unwrap();
    match call.kind {
        StatementKind::Dispatch { candidates, .. } => assert_eq!(candidates.len(), 2),
        other => panic!("expected dispatch, got {other:?}"),
    }
}

#[test]
fn test_statically_impossible_candidate_is_eliminated() {
    let fx = Fixture::new();
    let scope = fx.scope();
    let compiler = Compiler::new();
    for def in [
        Expression::def(
            "g",
            vec![Expression::typed_param("x", Expression::name("Float"))],
            None,
            Expression::name("x"),
        ),
        Expression::def(
            "g",
            vec![Expression::param("x")],
            None,
            Expression::name("x"),
        ),
    ] {
        compiler.compile_expression(&def, &scope).unwrap();
    }
    // An Int argument can never satisfy the Float overload; one survivor,
    // so the call is direct.
    let call = compiler
        .compile_expression(
            &Expression::call(Expression::name("g"), vec![Expression::int(1)]),
            &scope,
        )
        .unwrap();
    assert!(matches!(call.kind, StatementKind::FunctionCall { .. }));
}

#[test]
fn test_annotation_must_be_a_type() {
    let fx = Fixture::new();
    let scope = fx.scope();
    let compiler = Compiler::new();
    compiler
        .compile_expression(&Expression::assign("notatype", Expression::int(1)), &scope)
        .unwrap();
    let result = compiler.compile_expression(
        &Expression::def(
            "h",
            vec![Expression::typed_param("x", Expression::name("notatype"))],
            None,
            Expression::name("x"),
        ),
        &scope,
    );
    assert!(matches!(result, Err(LoamError::Compile(_))));
}

#[test]
fn test_lazy_variable_forces_once() {
    let fx = Fixture::new();
    let scope = fx.scope();
    let lazy = scope.declare_lazy(
        Name::new("lazyint"),
        Type::type_of(Type::integer()),
        Expression::literal(Value::type_value(Type::integer())),
    );
    let compiler = Compiler::new();
    let resolved = scope.lookup(Name::new("lazyint")).unwrap();
    let first = compiler.compile_time_value(&resolved).unwrap();
    assert_eq!(first, Value::type_value(Type::integer()));
    assert!(lazy.is_evaluated());
    // Second observation reuses the stored value.
    assert_eq!(compiler.compile_time_value(&resolved).unwrap(), first);
}

#[test]
fn test_lazy_annotation_resolves_through_forcing() {
    let fx = Fixture::new();
    let scope = fx.scope();
    scope.declare_lazy(
        Name::new("MyInt"),
        Type::type_of(Type::integer()),
        Rc::new(Expression::Name(Name::new("Int"))),
    );
    let compiler = Compiler::new();
    let ty = compiler
        .resolve_annotation(&Expression::Name(Name::new("MyInt")), &scope)
        .unwrap();
    assert_eq!(ty.kind(), TypeKind::Integer);
}

#[test]
fn test_lazy_cycle_is_detected() {
    let fx = Fixture::new();
    let scope = fx.scope();
    scope.declare_lazy(
        Name::new("ouroboros"),
        Type::any(),
        Rc::new(Expression::Name(Name::new("ouroboros"))),
    );
    let compiler = Compiler::new();
    let resolved = scope.lookup(Name::new("ouroboros")).unwrap();
    let result = compiler.compile_time_value(&resolved);
    assert!(matches!(result, Err(LoamError::Cycle(_))));
}

#[test]
fn test_condition_must_be_boolean() {
    let fx = Fixture::new();
    let result = compile(
        &Expression::if_(Expression::int(1), Expression::int(2), None),
        &fx.scope(),
    );
    assert!(matches!(result, Err(LoamError::Compile(_))));
}

#[test]
fn test_if_without_else_widens_with_none() {
    let fx = Fixture::new();
    let statement = compile(
        &Expression::if_(Expression::boolean(true), Expression::int(1), None),
        &fx.scope(),
    )
    .unwrap();
    assert_eq!(statement.cached_type().kind(), TypeKind::Union);
}

#[test]
fn test_collection_literals_get_element_types() {
    let fx = Fixture::new();
    let statement = compile(
        &Expression::list(vec![Expression::int(1), Expression::int(2)]),
        &fx.scope(),
    )
    .unwrap();
    assert_eq!(statement.cached_type().kind(), TypeKind::List);

    let statement = compile(
        &Expression::tuple(vec![Expression::int(1), Expression::string("s")]),
        &fx.scope(),
    )
    .unwrap();
    assert_eq!(statement.cached_type().kind(), TypeKind::Tuple);
}
