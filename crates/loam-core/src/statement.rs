use std::rc::Rc;

use crate::instruction::{BinaryInstructionKind, UnaryInstructionKind};
use crate::intern::Name;
use crate::scope::VariableAddress;
use crate::types::Type;
use crate::value::Value;

/// One overload candidate of a `Dispatch` statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementCandidate {
    pub parameter_types: Vec<Rc<Type>>,
    pub callee: Statement,
}

/// The typed pre-execution tree the compiler produces. Children are
/// growable; lowering turns them into the fixed-shape `Instruction` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatementKind {
    None,
    Constant(Value),
    FunctionCall {
        callee: Box<Statement>,
        arguments: Vec<Statement>,
    },
    Dispatch {
        candidates: Vec<StatementCandidate>,
        arguments: Vec<Statement>,
    },
    Sequence(Vec<Statement>),
    VariableGet {
        slot: usize,
    },
    VariableSet {
        slot: usize,
        value: Box<Statement>,
    },
    FromImportedStack {
        import: usize,
        inner: Box<Statement>,
    },
    SetAddress {
        address: VariableAddress,
        value: Box<Statement>,
    },
    ArmStack {
        function: Box<Statement>,
    },
    If {
        condition: Box<Statement>,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Box<Statement>,
        body: Box<Statement>,
    },
    DoUntil {
        body: Box<Statement>,
        condition: Box<Statement>,
    },
    EmitEffect {
        value: Box<Statement>,
    },
    HandleEffect {
        handler: Box<Statement>,
        body: Box<Statement>,
    },
    BuildTuple(Vec<Statement>),
    BuildList(Vec<Statement>),
    BuildSet(Vec<Statement>),
    BuildTable(Vec<(Statement, Statement)>),
    BuildComposite(Vec<(Name, Statement)>),
    Unary {
        kind: UnaryInstructionKind,
        operand: Box<Statement>,
    },
    Binary {
        kind: BinaryInstructionKind,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
}

/// A typed statement. `cached_type` is populated by the compiler before
/// lowering and participates in equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    pub kind: StatementKind,
    pub cached_type: Rc<Type>,
}

impl Statement {
    pub fn new(kind: StatementKind, cached_type: Rc<Type>) -> Statement {
        Statement { kind, cached_type }
    }

    pub fn none() -> Statement {
        Statement::new(StatementKind::None, Type::none_value())
    }

    pub fn constant(value: Value) -> Statement {
        let cached_type = value.to_type();
        Statement::new(StatementKind::Constant(value), cached_type)
    }

    pub fn cached_type(&self) -> Rc<Type> {
        self.cached_type.clone()
    }
}
