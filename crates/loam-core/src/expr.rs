use std::rc::Rc;

use crate::intern::Name;
use crate::value::Value;

/// Binary operators as the surface parser produces them. Arithmetic over
/// statically typed operands lowers to typed instructions; everything else
/// desugars to the primitives' overload sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// `/`: float division regardless of operand kinds.
    Div,
    /// `div`: integer division.
    IntDiv,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// The primitive name the operator desugars to when its operand types
    /// are not statically decidable.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
        }
    }
}

/// A function parameter: a name plus an optional type annotation, itself
/// an expression evaluated at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: Name,
    pub annotation: Option<Rc<Expression>>,
}

/// The parsed form the external reader produces and the compiler consumes.
/// Carried as a first-class value under `ValueKind::Expression`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Literal(Value),
    Name(Name),
    Call {
        callee: Rc<Expression>,
        arguments: Vec<Rc<Expression>>,
    },
    Unary {
        op: UnaryOp,
        operand: Rc<Expression>,
    },
    Binary {
        op: BinaryOp,
        lhs: Rc<Expression>,
        rhs: Rc<Expression>,
    },
    /// `name = value`: declares on first use, assigns afterwards.
    Assign {
        target: Name,
        value: Rc<Expression>,
    },
    /// `name(params) = body`: repeated definitions of one name form an
    /// overload set.
    FunctionDef {
        name: Name,
        parameters: Vec<Parameter>,
        return_annotation: Option<Rc<Expression>>,
        body: Rc<Expression>,
    },
    /// `;`-sequences and `do` groups. Does not open a scope.
    Block(Vec<Rc<Expression>>),
    If {
        condition: Rc<Expression>,
        then_branch: Rc<Expression>,
        else_branch: Option<Rc<Expression>>,
    },
    While {
        condition: Rc<Expression>,
        body: Rc<Expression>,
    },
    DoUntil {
        body: Rc<Expression>,
        condition: Rc<Expression>,
    },
    Emit(Rc<Expression>),
    Handle {
        handler: Rc<Expression>,
        body: Rc<Expression>,
    },
    TupleLiteral(Vec<Rc<Expression>>),
    ListLiteral(Vec<Rc<Expression>>),
    SetLiteral(Vec<Rc<Expression>>),
    TableLiteral(Vec<(Rc<Expression>, Rc<Expression>)>),
    CompositeLiteral(Vec<(Name, Rc<Expression>)>),
}

// Constructor helpers keeping hand-built trees close to surface syntax.
impl Expression {
    pub fn literal(v: Value) -> Rc<Expression> {
        Rc::new(Expression::Literal(v))
    }

    pub fn int(n: i64) -> Rc<Expression> {
        Expression::literal(Value::int(n))
    }

    pub fn float(f: f64) -> Rc<Expression> {
        Expression::literal(Value::float(f))
    }

    pub fn boolean(b: bool) -> Rc<Expression> {
        Expression::literal(Value::boolean(b))
    }

    pub fn string(s: &str) -> Rc<Expression> {
        Expression::literal(Value::string(s))
    }

    pub fn name(n: &str) -> Rc<Expression> {
        Rc::new(Expression::Name(Name::new(n)))
    }

    pub fn call(callee: Rc<Expression>, arguments: Vec<Rc<Expression>>) -> Rc<Expression> {
        Rc::new(Expression::Call { callee, arguments })
    }

    pub fn binary(op: BinaryOp, lhs: Rc<Expression>, rhs: Rc<Expression>) -> Rc<Expression> {
        Rc::new(Expression::Binary { op, lhs, rhs })
    }

    pub fn neg(operand: Rc<Expression>) -> Rc<Expression> {
        Rc::new(Expression::Unary {
            op: UnaryOp::Neg,
            operand,
        })
    }

    pub fn assign(target: &str, value: Rc<Expression>) -> Rc<Expression> {
        Rc::new(Expression::Assign {
            target: Name::new(target),
            value,
        })
    }

    pub fn def(
        name: &str,
        parameters: Vec<Parameter>,
        return_annotation: Option<Rc<Expression>>,
        body: Rc<Expression>,
    ) -> Rc<Expression> {
        Rc::new(Expression::FunctionDef {
            name: Name::new(name),
            parameters,
            return_annotation,
            body,
        })
    }

    pub fn param(name: &str) -> Parameter {
        Parameter {
            name: Name::new(name),
            annotation: None,
        }
    }

    pub fn typed_param(name: &str, annotation: Rc<Expression>) -> Parameter {
        Parameter {
            name: Name::new(name),
            annotation: Some(annotation),
        }
    }

    pub fn block(expressions: Vec<Rc<Expression>>) -> Rc<Expression> {
        Rc::new(Expression::Block(expressions))
    }

    pub fn if_(
        condition: Rc<Expression>,
        then_branch: Rc<Expression>,
        else_branch: Option<Rc<Expression>>,
    ) -> Rc<Expression> {
        Rc::new(Expression::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn while_(condition: Rc<Expression>, body: Rc<Expression>) -> Rc<Expression> {
        Rc::new(Expression::While { condition, body })
    }

    pub fn do_until(body: Rc<Expression>, condition: Rc<Expression>) -> Rc<Expression> {
        Rc::new(Expression::DoUntil { body, condition })
    }

    pub fn emit(value: Rc<Expression>) -> Rc<Expression> {
        Rc::new(Expression::Emit(value))
    }

    pub fn handle(handler: Rc<Expression>, body: Rc<Expression>) -> Rc<Expression> {
        Rc::new(Expression::Handle { handler, body })
    }

    pub fn tuple(elements: Vec<Rc<Expression>>) -> Rc<Expression> {
        Rc::new(Expression::TupleLiteral(elements))
    }

    pub fn list(elements: Vec<Rc<Expression>>) -> Rc<Expression> {
        Rc::new(Expression::ListLiteral(elements))
    }

    pub fn set_literal(elements: Vec<Rc<Expression>>) -> Rc<Expression> {
        Rc::new(Expression::SetLiteral(elements))
    }

    pub fn table(pairs: Vec<(Rc<Expression>, Rc<Expression>)>) -> Rc<Expression> {
        Rc::new(Expression::TableLiteral(pairs))
    }

    pub fn record(fields: Vec<(&str, Rc<Expression>)>) -> Rc<Expression> {
        Rc::new(Expression::CompositeLiteral(
            fields
                .into_iter()
                .map(|(name, e)| (Name::new(name), e))
                .collect(),
        ))
    }
}
