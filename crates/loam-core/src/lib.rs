pub mod error;
pub mod expr;
pub mod instruction;
pub mod intern;
pub mod matching;
pub mod property;
pub mod scope;
pub mod stack;
pub mod statement;
pub mod types;
pub mod value;

pub use error::LoamError;
pub use expr::{BinaryOp, Expression, Parameter, UnaryOp};
pub use instruction::{
    BinaryInstructionKind, DispatchCandidate, Instruction, UnaryInstructionKind,
};
pub use intern::{compare_spurs, intern, resolve, with_resolved, Name};
pub use matching::{
    common_type, compare, contravariant, covariant, rank_overloads, reduce_match,
    OverloadResolution, TypeBound, TypeMatch, Variance,
};
pub use property::{Properties, Property, PropertyTag};
pub use scope::{Context, LazyState, ResolvedVariable, Scope, Variable, VariableAddress};
pub use stack::Stack;
pub use statement::{Statement, StatementCandidate, StatementKind};
pub use types::{check_type, CustomMatcher, Type, TypeBody, TypeKind};
pub use value::{FunctionValue, NativeFn, PropertyRef, Value, ValueKind};
