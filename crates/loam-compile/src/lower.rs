use loam_core::instruction::{DispatchCandidate, Instruction};
use loam_core::statement::{Statement, StatementKind};
use loam_core::LoamError;

/// Statement trees nested deeper than this are rejected instead of
/// risking native stack overflow during lowering.
const LOWER_DEPTH_LIMIT: usize = 512;

/// Lower a typed statement tree into the executable instruction form.
pub fn lower(statement: &Statement) -> Result<Instruction, LoamError> {
    lower_at(statement, 0)
}

fn lower_at(statement: &Statement, depth: usize) -> Result<Instruction, LoamError> {
    if depth == LOWER_DEPTH_LIMIT {
        return Err(LoamError::compile("statement tree too deep to lower"));
    }
    lower_kind(&statement.kind, depth + 1)
}

fn lower_box(statement: &Statement, depth: usize) -> Result<Box<Instruction>, LoamError> {
    Ok(Box::new(lower_at(statement, depth)?))
}

fn lower_all(statements: &[Statement], depth: usize) -> Result<Box<[Instruction]>, LoamError> {
    statements.iter().map(|s| lower_at(s, depth)).collect()
}

fn lower_kind(kind: &StatementKind, depth: usize) -> Result<Instruction, LoamError> {
    Ok(match kind {
        StatementKind::None => Instruction::NoOp,

        StatementKind::Constant(v) => Instruction::Constant(v.clone()),

        StatementKind::FunctionCall { callee, arguments } => Instruction::FunctionCall {
            callee: lower_box(callee, depth)?,
            arguments: lower_all(arguments, depth)?,
        },

        StatementKind::Dispatch {
            candidates,
            arguments,
        } => Instruction::Dispatch {
            candidates: candidates
                .iter()
                .map(|c| {
                    Ok(DispatchCandidate {
                        parameter_types: c.parameter_types.clone().into_boxed_slice(),
                        callee: lower_at(&c.callee, depth)?,
                    })
                })
                .collect::<Result<_, LoamError>>()?,
            arguments: lower_all(arguments, depth)?,
        },

        StatementKind::Sequence(items) => Instruction::Sequence(lower_all(items, depth)?),

        StatementKind::VariableGet { slot } => Instruction::VariableGet { slot: *slot },

        StatementKind::VariableSet { slot, value } => Instruction::VariableSet {
            slot: *slot,
            value: lower_box(value, depth)?,
        },

        StatementKind::FromImportedStack { import, inner } => Instruction::FromImportedStack {
            import: *import,
            inner: lower_box(inner, depth)?,
        },

        StatementKind::SetAddress { address, value } => Instruction::SetAddress {
            address: address.indices().into(),
            value: lower_box(value, depth)?,
        },

        StatementKind::ArmStack { function } => Instruction::ArmStack {
            function: lower_box(function, depth)?,
        },

        StatementKind::If {
            condition,
            then_branch,
            else_branch,
        } => Instruction::If {
            condition: lower_box(condition, depth)?,
            then_branch: lower_box(then_branch, depth)?,
            else_branch: else_branch
                .as_deref()
                .map(|s| lower_box(s, depth))
                .transpose()?,
        },

        StatementKind::While { condition, body } => Instruction::While {
            condition: lower_box(condition, depth)?,
            body: lower_box(body, depth)?,
        },

        StatementKind::DoUntil { body, condition } => Instruction::DoUntil {
            body: lower_box(body, depth)?,
            condition: lower_box(condition, depth)?,
        },

        StatementKind::EmitEffect { value } => Instruction::EmitEffect {
            value: lower_box(value, depth)?,
        },

        StatementKind::HandleEffect { handler, body } => Instruction::HandleEffect {
            handler: lower_box(handler, depth)?,
            body: lower_box(body, depth)?,
        },

        StatementKind::BuildTuple(items) => Instruction::BuildTuple(lower_all(items, depth)?),
        StatementKind::BuildList(items) => Instruction::BuildList(lower_all(items, depth)?),
        StatementKind::BuildSet(items) => Instruction::BuildSet(lower_all(items, depth)?),

        StatementKind::BuildTable(pairs) => Instruction::BuildTable(
            pairs
                .iter()
                .map(|(k, v)| Ok((lower_at(k, depth)?, lower_at(v, depth)?)))
                .collect::<Result<_, LoamError>>()?,
        ),

        StatementKind::BuildComposite(fields) => Instruction::BuildComposite(
            fields
                .iter()
                .map(|(name, v)| Ok((*name, lower_at(v, depth)?)))
                .collect::<Result<_, LoamError>>()?,
        ),

        StatementKind::Unary { kind, operand } => {
            Instruction::unary(*kind, lower_at(operand, depth)?)
        }

        StatementKind::Binary { kind, lhs, rhs } => {
            Instruction::binary(*kind, lower_at(lhs, depth)?, lower_at(rhs, depth)?)
        }
    })
}
