//! A small programmable runtime: a unified value representation, an
//! algebraic type lattice with a five-valued ordered match relation, and a
//! stack-based instruction tree executed by a tree-walking evaluator.
//!
//! The surface parser is an external collaborator; programs enter as
//! [`Expression`] trees, are compiled against a [`Scope`] into typed
//! [`Statement`]s, lowered to [`Instruction`]s, and evaluated against a
//! [`Stack`].

use std::rc::Rc;

pub use loam_compile::{compile, lower, Compiler};
pub use loam_core::{
    check_type, common_type, compare, BinaryOp, Context, Expression, Instruction, LoamError,
    Name, Parameter, Properties, PropertyTag, Scope, Stack, Statement, Type, TypeBound,
    TypeMatch, UnaryOp, Value, Variance,
};
pub use loam_eval::Evaluator;
pub use loam_stdlib::{primitives, template_tag, typed_template_tag, Primitives};

/// Convenience wrapper wiring the primitives registry, compiler, and
/// evaluator together for one-shot programs.
pub struct Runtime {
    primitives: Primitives,
    evaluator: Evaluator,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Runtime {
        Runtime {
            primitives: primitives(),
            evaluator: Evaluator::new(),
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Compile and run a program in a fresh module context. The result is
    /// the last expression's value, or an unhandled `Effect`.
    pub fn run(&self, program: &[Rc<Expression>]) -> Result<Value, LoamError> {
        let module = Context::new(vec![self.primitives.context().clone()]);
        let scope = module.top_scope();
        let compiler = Compiler::new();
        let mut statements = Vec::with_capacity(program.len());
        for expression in program {
            statements.push(compiler.compile_expression(expression, &scope)?);
        }
        let instructions = statements
            .iter()
            .map(lower)
            .collect::<Result<Vec<_>, _>>()?;
        // The module stack is sized only after the whole program compiled,
        // since the context grows as declarations are seen.
        let stack = module.new_stack();
        let mut result = Value::None;
        for instruction in &instructions {
            result = self.evaluator.evaluate(instruction, &stack)?;
            if result.is_effect() {
                break;
            }
        }
        Ok(result)
    }

    /// Like [`Runtime::run`], but an unhandled effect is an error.
    pub fn run_strict(&self, program: &[Rc<Expression>]) -> Result<Value, LoamError> {
        match self.run(program)? {
            Value::Effect(payload) => Err(LoamError::UnhandledEffect((*payload).clone())),
            value => Ok(value),
        }
    }
}
