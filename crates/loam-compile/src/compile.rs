use std::cell::Cell;
use std::rc::Rc;

use loam_core::expr::{BinaryOp, Expression, Parameter, UnaryOp};
use loam_core::instruction::{BinaryInstructionKind, UnaryInstructionKind};
use loam_core::intern::Name;
use loam_core::matching::{common_type, covariant, TypeMatch};
use loam_core::scope::{Context, ResolvedVariable, Scope};
use loam_core::stack::Stack;
use loam_core::statement::{Statement, StatementCandidate, StatementKind};
use loam_core::types::{Type, TypeBody, TypeKind};
use loam_core::value::Value;
use loam_core::LoamError;
use loam_eval::Evaluator;

use crate::lower::lower;

/// Maximum recursion depth for the compiler; prevents native stack
/// overflow from deeply nested expressions.
const MAX_COMPILE_DEPTH: usize = 256;

/// Compile a parsed expression against a scope, producing a statement
/// whose `cached_type` is populated.
pub fn compile(expression: &Expression, scope: &Rc<Scope>) -> Result<Statement, LoamError> {
    Compiler::new().compile_expression(expression, scope)
}

/// The expression compiler. Owns an evaluator for compile-time work:
/// forcing lazy variables and resolving type annotations.
pub struct Compiler {
    evaluator: Evaluator,
    depth: Cell<usize>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler {
            evaluator: Evaluator::new(),
            depth: Cell::new(0),
        }
    }

    pub fn compile_expression(
        &self,
        expression: &Expression,
        scope: &Rc<Scope>,
    ) -> Result<Statement, LoamError> {
        let depth = self.depth.get() + 1;
        if depth > MAX_COMPILE_DEPTH {
            return Err(LoamError::compile("maximum compile depth exceeded"));
        }
        self.depth.set(depth);
        let result = self.compile_inner(expression, scope);
        self.depth.set(depth - 1);
        result
    }

    fn compile_inner(
        &self,
        expression: &Expression,
        scope: &Rc<Scope>,
    ) -> Result<Statement, LoamError> {
        match expression {
            Expression::Literal(v) => Ok(Statement::constant(v.clone())),

            Expression::Name(name) => {
                let resolved = scope.lookup_all(*name);
                match resolved.first() {
                    // Observing a lazy variable forces its initializer and
                    // folds the value in place.
                    Some(r) if r.variable.lazy_expression().is_some() => {
                        Ok(Statement::constant(self.compile_time_value(r)?))
                    }
                    // A bare reference to an overload set means its nearest
                    // declaration.
                    Some(r) => Ok(access(r)),
                    None => Err(unresolved(*name, scope)),
                }
            }

            Expression::Call { callee, arguments } => {
                let args = arguments
                    .iter()
                    .map(|a| self.compile_expression(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Expression::Name(name) = &**callee {
                    return self.compile_named_call(*name, args, scope);
                }
                let callee = self.compile_expression(callee, scope)?;
                let callee_type = callee.cached_type();
                if callee_type.kind().is_concrete() && callee_type.kind() != TypeKind::Function {
                    return Err(LoamError::compile(format!(
                        "`{callee_type}` is not callable"
                    )));
                }
                let cached_type = candidate_return(&callee_type);
                Ok(Statement::new(
                    StatementKind::FunctionCall {
                        callee: Box::new(callee),
                        arguments: args,
                    },
                    cached_type,
                ))
            }

            Expression::Unary { op, operand } => {
                let operand = self.compile_expression(operand, scope)?;
                match (op, operand.cached_type().kind()) {
                    (UnaryOp::Neg, TypeKind::Integer) => Ok(Statement::new(
                        StatementKind::Unary {
                            kind: UnaryInstructionKind::NegInt,
                            operand: Box::new(operand),
                        },
                        Type::integer(),
                    )),
                    (UnaryOp::Neg, TypeKind::Float) => Ok(Statement::new(
                        StatementKind::Unary {
                            kind: UnaryInstructionKind::NegFloat,
                            operand: Box::new(operand),
                        },
                        Type::float(),
                    )),
                    (UnaryOp::Neg, _) => {
                        self.compile_named_call(Name::new(op.symbol()), vec![operand], scope)
                    }
                }
            }

            Expression::Binary { op, lhs, rhs } => {
                let lhs = self.compile_expression(lhs, scope)?;
                let rhs = self.compile_expression(rhs, scope)?;
                self.compile_binary(*op, lhs, rhs, scope)
            }

            Expression::Assign { target, value } => {
                let value = self.compile_expression(value, scope)?;
                let value_type = value.cached_type();
                match scope.lookup(*target) {
                    Some(resolved) => {
                        let old = resolved.variable.cached_type();
                        if *old != *value_type {
                            resolved
                                .variable
                                .set_cached_type(common_type(&old, &value_type));
                        }
                        let kind = if resolved.is_local() {
                            StatementKind::VariableSet {
                                slot: resolved.variable.stack_index(),
                                value: Box::new(value),
                            }
                        } else {
                            StatementKind::SetAddress {
                                address: resolved.address(),
                                value: Box::new(value),
                            }
                        };
                        Ok(Statement::new(kind, value_type))
                    }
                    None => {
                        let variable = scope.declare(*target, value_type.clone());
                        Ok(Statement::new(
                            StatementKind::VariableSet {
                                slot: variable.stack_index(),
                                value: Box::new(value),
                            },
                            value_type,
                        ))
                    }
                }
            }

            Expression::FunctionDef {
                name,
                parameters,
                return_annotation,
                body,
            } => self.compile_function_def(*name, parameters, return_annotation.as_deref(), body, scope),

            Expression::Block(expressions) => {
                let mut items = Vec::with_capacity(expressions.len());
                for e in expressions {
                    items.push(self.compile_expression(e, scope)?);
                }
                let cached_type = items
                    .last()
                    .map(Statement::cached_type)
                    .unwrap_or_else(Type::none_value);
                Ok(Statement::new(StatementKind::Sequence(items), cached_type))
            }

            Expression::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.compile_condition(condition, scope)?;
                let then_branch = self.compile_expression(then_branch, scope)?;
                let else_branch = else_branch
                    .as_ref()
                    .map(|e| self.compile_expression(e, scope))
                    .transpose()?;
                let else_type = else_branch
                    .as_ref()
                    .map(Statement::cached_type)
                    .unwrap_or_else(Type::none_value);
                let cached_type = common_type(&then_branch.cached_type(), &else_type);
                Ok(Statement::new(
                    StatementKind::If {
                        condition: Box::new(condition),
                        then_branch: Box::new(then_branch),
                        else_branch: else_branch.map(Box::new),
                    },
                    cached_type,
                ))
            }

            Expression::While { condition, body } => {
                let condition = self.compile_condition(condition, scope)?;
                let body = self.compile_expression(body, scope)?;
                Ok(Statement::new(
                    StatementKind::While {
                        condition: Box::new(condition),
                        body: Box::new(body),
                    },
                    Type::none_value(),
                ))
            }

            Expression::DoUntil { body, condition } => {
                let body = self.compile_expression(body, scope)?;
                let condition = self.compile_condition(condition, scope)?;
                Ok(Statement::new(
                    StatementKind::DoUntil {
                        body: Box::new(body),
                        condition: Box::new(condition),
                    },
                    Type::none_value(),
                ))
            }

            Expression::Emit(value) => {
                let value = self.compile_expression(value, scope)?;
                Ok(Statement::new(
                    StatementKind::EmitEffect {
                        value: Box::new(value),
                    },
                    Type::none_value(),
                ))
            }

            Expression::Handle { handler, body } => {
                let handler = self.compile_expression(handler, scope)?;
                let body = self.compile_expression(body, scope)?;
                let cached_type = common_type(
                    &body.cached_type(),
                    &candidate_return(&handler.cached_type()),
                );
                Ok(Statement::new(
                    StatementKind::HandleEffect {
                        handler: Box::new(handler),
                        body: Box::new(body),
                    },
                    cached_type,
                ))
            }

            Expression::TupleLiteral(elements) => {
                let items = self.compile_all(elements, scope)?;
                let cached_type =
                    Type::tuple(items.iter().map(Statement::cached_type).collect());
                Ok(Statement::new(StatementKind::BuildTuple(items), cached_type))
            }

            Expression::ListLiteral(elements) => {
                let items = self.compile_all(elements, scope)?;
                let cached_type = Type::list_of(common_of(&items));
                Ok(Statement::new(StatementKind::BuildList(items), cached_type))
            }

            Expression::SetLiteral(elements) => {
                let items = self.compile_all(elements, scope)?;
                let cached_type = Type::set_of(common_of(&items));
                Ok(Statement::new(StatementKind::BuildSet(items), cached_type))
            }

            Expression::TableLiteral(pairs) => {
                let mut compiled = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    compiled.push((
                        self.compile_expression(k, scope)?,
                        self.compile_expression(v, scope)?,
                    ));
                }
                let keys: Vec<Statement> = compiled.iter().map(|(k, _)| k.clone()).collect();
                let values: Vec<Statement> = compiled.iter().map(|(_, v)| v.clone()).collect();
                let cached_type = Type::table_of(common_of(&keys), common_of(&values));
                Ok(Statement::new(
                    StatementKind::BuildTable(compiled),
                    cached_type,
                ))
            }

            Expression::CompositeLiteral(fields) => {
                let mut compiled = Vec::with_capacity(fields.len());
                for (name, e) in fields {
                    compiled.push((*name, self.compile_expression(e, scope)?));
                }
                let cached_type = Type::composite(
                    compiled
                        .iter()
                        .map(|(name, s)| (*name, s.cached_type()))
                        .collect(),
                );
                Ok(Statement::new(
                    StatementKind::BuildComposite(compiled),
                    cached_type,
                ))
            }
        }
    }

    fn compile_all(
        &self,
        expressions: &[Rc<Expression>],
        scope: &Rc<Scope>,
    ) -> Result<Vec<Statement>, LoamError> {
        expressions
            .iter()
            .map(|e| self.compile_expression(e, scope))
            .collect()
    }

    /// Conditions must be statically boolean-compatible.
    fn compile_condition(
        &self,
        expression: &Expression,
        scope: &Rc<Scope>,
    ) -> Result<Statement, LoamError> {
        let condition = self.compile_expression(expression, scope)?;
        let ty = condition.cached_type();
        if ty.kind().is_concrete() && ty.kind() != TypeKind::Boolean {
            return Err(LoamError::compile(format!(
                "condition has type {ty}, expected Bool"
            )));
        }
        Ok(condition)
    }

    fn compile_binary(
        &self,
        op: BinaryOp,
        lhs: Statement,
        rhs: Statement,
        scope: &Rc<Scope>,
    ) -> Result<Statement, LoamError> {
        use BinaryInstructionKind as K;
        let lk = lhs.cached_type().kind();
        let rk = rhs.cached_type().kind();
        let both = |k: TypeKind| lk == k && rk == k;

        let typed = match op {
            BinaryOp::Add if both(TypeKind::Integer) => Some((K::AddInt, Type::integer())),
            BinaryOp::Sub if both(TypeKind::Integer) => Some((K::SubInt, Type::integer())),
            BinaryOp::Mul if both(TypeKind::Integer) => Some((K::MulInt, Type::integer())),
            BinaryOp::Add if both(TypeKind::Float) => Some((K::AddFloat, Type::float())),
            BinaryOp::Sub if both(TypeKind::Float) => Some((K::SubFloat, Type::float())),
            BinaryOp::Mul if both(TypeKind::Float) => Some((K::MulFloat, Type::float())),
            // `/` is float division whatever the numeric operand kinds.
            BinaryOp::Div if is_numeric(lk) && is_numeric(rk) => {
                Some((K::DivFloat, Type::float()))
            }
            BinaryOp::IntDiv if both(TypeKind::Integer) => Some((K::DivInt, Type::integer())),
            BinaryOp::Mod if both(TypeKind::Integer) => Some((K::ModInt, Type::integer())),
            BinaryOp::Mod if both(TypeKind::Float) => Some((K::ModFloat, Type::float())),
            _ => None,
        };

        match typed {
            Some((kind, cached_type)) => Ok(Statement::new(
                StatementKind::Binary {
                    kind,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                cached_type,
            )),
            // Operand types not statically decidable (or not instruction
            // material): go through the primitives' overload set.
            None => self.compile_named_call(Name::new(op.symbol()), vec![lhs, rhs], scope),
        }
    }

    /// Compile a call to a named binding: overload elimination against the
    /// statically known argument types, then a direct call (one survivor)
    /// or a runtime dispatch.
    fn compile_named_call(
        &self,
        name: Name,
        arguments: Vec<Statement>,
        scope: &Rc<Scope>,
    ) -> Result<Statement, LoamError> {
        let resolved = scope.lookup_all(name);
        if resolved.is_empty() {
            return Err(unresolved(name, scope));
        }
        let argument_types: Vec<Rc<Type>> =
            arguments.iter().map(Statement::cached_type).collect();

        let mut survivors: Vec<(&ResolvedVariable, Vec<Rc<Type>>, Rc<Type>)> = Vec::new();
        for r in &resolved {
            let ty = r.variable.cached_type();
            let Some(parameters) = candidate_parameters(&ty, arguments.len()) else {
                continue;
            };
            // Eliminate only on a certain mismatch; False-grade scores are
            // for the runtime dispatcher to judge.
            let eliminated = parameters
                .iter()
                .zip(&argument_types)
                .any(|(p, a)| covariant(p, a) == TypeMatch::None);
            if !eliminated {
                survivors.push((r, parameters, candidate_return(&ty)));
            }
        }

        match survivors.len() {
            0 => {
                if resolved.len() == 1 && !callable_shape(&resolved[0].variable.cached_type()) {
                    return Err(LoamError::compile(format!(
                        "`{name}` has type {} and is not callable",
                        resolved[0].variable.cached_type()
                    )));
                }
                Err(LoamError::no_overload(
                    name.as_string(),
                    describe_types(&argument_types),
                ))
            }
            1 => {
                let (r, _, return_type) = survivors.pop().expect("one survivor");
                Ok(Statement::new(
                    StatementKind::FunctionCall {
                        callee: Box::new(access(r)),
                        arguments,
                    },
                    return_type,
                ))
            }
            _ => {
                let cached_type = survivors
                    .iter()
                    .map(|(_, _, ret)| ret.clone())
                    .reduce(|a, b| common_type(&a, &b))
                    .expect("at least two survivors");
                let candidates = survivors
                    .into_iter()
                    .map(|(r, parameters, _)| StatementCandidate {
                        parameter_types: parameters,
                        callee: access(r),
                    })
                    .collect();
                Ok(Statement::new(
                    StatementKind::Dispatch {
                        candidates,
                        arguments,
                    },
                    cached_type,
                ))
            }
        }
    }

    fn compile_function_def(
        &self,
        name: Name,
        parameters: &[Parameter],
        return_annotation: Option<&Expression>,
        body: &Expression,
        scope: &Rc<Scope>,
    ) -> Result<Statement, LoamError> {
        let mut parameter_types = Vec::with_capacity(parameters.len());
        for p in parameters {
            parameter_types.push(match &p.annotation {
                Some(a) => self.resolve_annotation(a, scope)?,
                None => Type::any(),
            });
        }
        let annotated_return = return_annotation
            .map(|a| self.resolve_annotation(a, scope))
            .transpose()?;

        // Declared before the body compiles so recursion resolves; the
        // return type is provisional until the body's type is known.
        let provisional = annotated_return.clone().unwrap_or_else(Type::any);
        let variable = scope.declare(
            name,
            Type::function(parameter_types.clone(), provisional),
        );

        let child_context = Context::new(vec![scope.context()]);
        let child_scope = child_context.top_scope();
        for (p, ty) in parameters.iter().zip(&parameter_types) {
            child_scope.declare(p.name, ty.clone());
        }
        let body_statement = self.compile_expression(body, &child_scope)?;

        let return_type = match annotated_return {
            Some(annotation) => {
                if covariant(&annotation, &body_statement.cached_type()) == TypeMatch::None {
                    return Err(LoamError::compile(format!(
                        "body of `{name}` has type {}, declared {annotation}",
                        body_statement.cached_type()
                    )));
                }
                annotation
            }
            None => body_statement.cached_type(),
        };
        let function_type = Type::function(parameter_types, return_type);
        variable.set_cached_type(function_type.clone());

        let instruction = Rc::new(lower(&body_statement)?);
        let template = Value::function(
            Stack::new(vec![], child_context.variable_count()),
            instruction,
        );
        Ok(Statement::new(
            StatementKind::VariableSet {
                slot: variable.stack_index(),
                value: Box::new(Statement::new(
                    StatementKind::ArmStack {
                        function: Box::new(Statement::new(
                            StatementKind::Constant(template),
                            function_type.clone(),
                        )),
                    },
                    function_type.clone(),
                )),
            },
            function_type,
        ))
    }

    /// Resolve a type annotation at compile time. Name annotations go
    /// through the variable's compile-time value (forcing lazies); any
    /// other expression is evaluated against the context's snapshot stack.
    pub fn resolve_annotation(
        &self,
        expression: &Expression,
        scope: &Rc<Scope>,
    ) -> Result<Rc<Type>, LoamError> {
        let value = match expression {
            Expression::Name(name) => {
                let Some(resolved) = scope.lookup(*name) else {
                    return Err(unresolved(*name, scope));
                };
                self.compile_time_value(&resolved)?
            }
            _ => {
                let statement = self.compile_expression(expression, scope)?;
                let instruction = lower(&statement)?;
                let stack = scope.context().snapshot_stack();
                self.evaluator.evaluate(&instruction, &stack)?
            }
        };
        match value {
            Value::Type(t) => Ok(t),
            other => Err(LoamError::compile(format!(
                "annotation evaluates to {}, expected a type",
                other.type_name()
            ))),
        }
    }

    /// The compile-time value of a variable, forcing its lazy initializer
    /// exactly once. Re-entrance is a cycle error.
    pub fn compile_time_value(&self, resolved: &ResolvedVariable) -> Result<Value, LoamError> {
        let variable = &resolved.variable;
        if let Some(value) = variable.value() {
            return Ok(value);
        }
        let Some(lazy) = variable.lazy_expression() else {
            return Err(LoamError::compile(format!(
                "variable `{}` has no compile-time value",
                variable.name()
            )));
        };
        let Some(declaring_scope) = variable.scope() else {
            return Err(LoamError::compile(format!(
                "variable `{}` outlived its scope",
                variable.name()
            )));
        };
        variable.begin_evaluation()?;
        let result = self
            .compile_expression(&lazy, &declaring_scope)
            .and_then(|statement| lower(&statement))
            .and_then(|instruction| {
                let stack = declaring_scope.context().snapshot_stack();
                self.evaluator.evaluate(&instruction, &stack)
            });
        match result {
            Ok(value) => {
                variable.finish_evaluation(value.clone());
                Ok(value)
            }
            Err(e) => {
                variable.abort_evaluation();
                Err(e)
            }
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────

fn unresolved(name: Name, scope: &Rc<Scope>) -> LoamError {
    LoamError::compile(format!(
        "unresolved identifier `{name}` in {}",
        scope.describe()
    ))
}

/// Variable access: a slot read, wrapped in import hops when the binding
/// lives in another context.
fn access(resolved: &ResolvedVariable) -> Statement {
    let cached_type = resolved.variable.cached_type();
    let mut statement = Statement::new(
        StatementKind::VariableGet {
            slot: resolved.variable.stack_index(),
        },
        cached_type.clone(),
    );
    for &import in resolved.import_path.iter().rev() {
        statement = Statement::new(
            StatementKind::FromImportedStack {
                import,
                inner: Box::new(statement),
            },
            cached_type.clone(),
        );
    }
    statement
}

fn is_numeric(kind: TypeKind) -> bool {
    matches!(
        kind,
        TypeKind::Integer | TypeKind::Unsigned | TypeKind::Float
    )
}

fn callable_shape(ty: &Type) -> bool {
    matches!(ty.body, TypeBody::Function { .. }) || !ty.kind().is_concrete()
}

/// Effective parameter types of a candidate for a call of `argc`
/// arguments, varargs expanded; `None` when the shape cannot take part.
fn candidate_parameters(ty: &Type, argc: usize) -> Option<Vec<Rc<Type>>> {
    match &ty.body {
        TypeBody::Function { arguments, .. } => match &arguments.body {
            TypeBody::Tuple { elements, varargs } => {
                if elements.len() == argc {
                    Some(elements.clone())
                } else if elements.len() < argc {
                    varargs.as_ref().map(|va| {
                        let mut params = elements.clone();
                        params.resize(argc, va.clone());
                        params
                    })
                } else {
                    None
                }
            }
            _ => None,
        },
        // Callee shape unknown to the compiler: rank as all-Any.
        _ if !ty.kind().is_concrete() => Some(vec![Type::any(); argc]),
        _ => None,
    }
}

fn candidate_return(ty: &Type) -> Rc<Type> {
    match &ty.body {
        TypeBody::Function { return_type, .. } => return_type.clone(),
        _ => Type::any(),
    }
}

fn common_of(statements: &[Statement]) -> Rc<Type> {
    statements
        .iter()
        .map(Statement::cached_type)
        .reduce(|a, b| common_type(&a, &b))
        .unwrap_or_else(Type::any)
}

fn describe_types(types: &[Rc<Type>]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
