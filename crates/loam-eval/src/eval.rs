use std::cell::{Cell, RefCell};
use std::rc::Rc;

use loam_core::instruction::Instruction;
use loam_core::stack::Stack;
use loam_core::value::{FunctionValue, Value};
use loam_core::LoamError;

use crate::dispatch::select_candidate;

pub type EvalResult = Result<Value, LoamError>;

/// Maximum native recursion depth while walking instruction trees.
const MAX_EVAL_DEPTH: usize = 2048;

/// Propagate an in-flight effect out of the current instruction.
macro_rules! bubble {
    ($e:expr) => {{
        let v = $e;
        if v.is_effect() {
            return Ok(v);
        }
        v
    }};
}

/// Single-threaded tree-walking interpreter.
///
/// Cooperative suspension: the step budget and cancellation flag are
/// consulted at loop back-edges and before every call or dispatch. When
/// either trips, evaluation unwinds with an effect carrying the
/// host-configured payload.
pub struct Evaluator {
    step_limit: Cell<usize>,
    steps: Cell<usize>,
    cancelled: Cell<bool>,
    cancel_payload: RefCell<Value>,
    depth: Cell<usize>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator {
            step_limit: Cell::new(0),
            steps: Cell::new(0),
            cancelled: Cell::new(false),
            cancel_payload: RefCell::new(Value::None),
            depth: Cell::new(0),
        }
    }

    pub fn with_step_limit(limit: usize) -> Self {
        let ev = Evaluator::new();
        ev.step_limit.set(limit);
        ev
    }

    /// 0 disables the budget.
    pub fn set_step_limit(&self, limit: usize) {
        self.step_limit.set(limit);
        self.steps.set(0);
    }

    pub fn steps_taken(&self) -> usize {
        self.steps.get()
    }

    /// Request cancellation; takes hold at the next suspension point.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn set_cancel_payload(&self, payload: Value) {
        *self.cancel_payload.borrow_mut() = payload;
    }

    /// Evaluate an instruction against a stack. The result is either a
    /// plain value or an unhandled `Effect` that reached the top.
    pub fn evaluate(&self, instruction: &Instruction, stack: &Rc<Stack>) -> EvalResult {
        let depth = self.depth.get();
        if depth >= MAX_EVAL_DEPTH {
            return Err(LoamError::domain("maximum evaluation depth exceeded"));
        }
        self.depth.set(depth + 1);
        let result = self.eval(instruction, stack);
        self.depth.set(depth);
        result
    }

    /// Consult the budget and cancellation flag; `Some` means unwind with
    /// this effect.
    fn suspend(&self) -> Option<Value> {
        if self.cancelled.get() {
            return Some(Value::effect(self.cancel_payload.borrow().clone()));
        }
        let steps = self.steps.get() + 1;
        self.steps.set(steps);
        let limit = self.step_limit.get();
        if limit != 0 && steps > limit {
            return Some(Value::effect(self.cancel_payload.borrow().clone()));
        }
        None
    }

    fn eval(&self, instruction: &Instruction, stack: &Rc<Stack>) -> EvalResult {
        match instruction {
            Instruction::NoOp => Ok(Value::None),

            Instruction::Constant(v) => Ok(v.clone()),

            Instruction::Sequence(items) => {
                let mut result = Value::None;
                for item in items.iter() {
                    result = bubble!(self.evaluate(item, stack)?);
                }
                Ok(result)
            }

            Instruction::VariableGet { slot } => stack.get(*slot),

            Instruction::VariableSet { slot, value } => {
                let v = bubble!(self.evaluate(value, stack)?);
                stack.set(*slot, v.clone())?;
                Ok(v)
            }

            Instruction::FromImportedStack { import, inner } => {
                let imported = stack.import(*import)?;
                self.evaluate(inner, &imported)
            }

            Instruction::SetAddress { address, value } => {
                let v = bubble!(self.evaluate(value, stack)?);
                stack.set_address(address, v.clone())?;
                Ok(v)
            }

            Instruction::FunctionCall { callee, arguments } => {
                if let Some(effect) = self.suspend() {
                    return Ok(effect);
                }
                let callee = bubble!(self.evaluate(callee, stack)?);
                let mut args = Vec::with_capacity(arguments.len());
                for a in arguments.iter() {
                    args.push(bubble!(self.evaluate(a, stack)?));
                }
                self.call_value(&callee, args)
            }

            Instruction::Dispatch {
                candidates,
                arguments,
            } => {
                if let Some(effect) = self.suspend() {
                    return Ok(effect);
                }
                let mut args = Vec::with_capacity(arguments.len());
                for a in arguments.iter() {
                    args.push(bubble!(self.evaluate(a, stack)?));
                }
                let arg_types: Vec<_> = args.iter().map(Value::to_type).collect();
                let winner = select_candidate(candidates, &arg_types)?;
                let callee = bubble!(self.evaluate(&candidates[winner].callee, stack)?);
                self.call_value(&callee, args)
            }

            Instruction::ArmStack { function } => {
                let f = bubble!(self.evaluate(function, stack)?);
                let Value::Function(template) = &f else {
                    return Err(LoamError::type_mismatch("function", f.type_name()));
                };
                // Arm the template with the current stack as its lexical
                // environment: the closure's single import.
                let armed = Stack::with_slots(
                    vec![stack.clone()],
                    (0..template.stack.len())
                        .map(|i| template.stack.get(i))
                        .collect::<Result<_, _>>()?,
                );
                Ok(Value::Function(Rc::new(FunctionValue {
                    stack: armed,
                    instruction: template.instruction.clone(),
                })))
            }

            Instruction::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let c = bubble!(self.evaluate(condition, stack)?);
                match (c, else_branch) {
                    (Value::Boolean(true), _) => self.evaluate(then_branch, stack),
                    (Value::Boolean(false), Some(e)) => self.evaluate(e, stack),
                    (Value::Boolean(false), None) => Ok(Value::None),
                    (other, _) => Err(LoamError::type_mismatch("boolean", other.type_name())),
                }
            }

            Instruction::While { condition, body } => loop {
                if let Some(effect) = self.suspend() {
                    return Ok(effect);
                }
                let c = bubble!(self.evaluate(condition, stack)?);
                match c {
                    Value::Boolean(true) => {
                        bubble!(self.evaluate(body, stack)?);
                    }
                    Value::Boolean(false) => return Ok(Value::None),
                    other => {
                        return Err(LoamError::type_mismatch("boolean", other.type_name()))
                    }
                }
            },

            Instruction::DoUntil { body, condition } => loop {
                if let Some(effect) = self.suspend() {
                    return Ok(effect);
                }
                bubble!(self.evaluate(body, stack)?);
                let c = bubble!(self.evaluate(condition, stack)?);
                match c {
                    Value::Boolean(true) => return Ok(Value::None),
                    Value::Boolean(false) => {}
                    other => {
                        return Err(LoamError::type_mismatch("boolean", other.type_name()))
                    }
                }
            },

            Instruction::EmitEffect { value } => {
                let v = bubble!(self.evaluate(value, stack)?);
                Ok(Value::effect(v))
            }

            Instruction::HandleEffect { handler, body } => {
                let result = self.evaluate(body, stack)?;
                let Value::Effect(payload) = result else {
                    return Ok(result);
                };
                let handler = bubble!(self.evaluate(handler, stack)?);
                self.call_value(&handler, vec![(*payload).clone()])
            }

            Instruction::BuildTuple(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    out.push(bubble!(self.evaluate(item, stack)?));
                }
                Ok(Value::array(out))
            }

            Instruction::BuildList(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    out.push(bubble!(self.evaluate(item, stack)?));
                }
                Ok(Value::list(out))
            }

            Instruction::BuildSet(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    out.push(bubble!(self.evaluate(item, stack)?));
                }
                Ok(Value::set(out))
            }

            Instruction::BuildTable(pairs) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (key, value) in pairs.iter() {
                    let k = bubble!(self.evaluate(key, stack)?);
                    let v = bubble!(self.evaluate(value, stack)?);
                    out.push((k, v));
                }
                Ok(Value::table(out))
            }

            Instruction::BuildComposite(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for (name, value) in fields.iter() {
                    out.push((*name, bubble!(self.evaluate(value, stack)?)));
                }
                Ok(Value::composite(out))
            }

            Instruction::AddInt(l, r) => self.int_binary(l, r, stack, |a, b| {
                Ok(a.wrapping_add(b))
            }),
            Instruction::SubInt(l, r) => self.int_binary(l, r, stack, |a, b| {
                Ok(a.wrapping_sub(b))
            }),
            Instruction::MulInt(l, r) => self.int_binary(l, r, stack, |a, b| {
                Ok(a.wrapping_mul(b))
            }),
            Instruction::DivInt(l, r) => self.int_binary(l, r, stack, |a, b| {
                if b == 0 {
                    Err(LoamError::domain("integer division by zero"))
                } else {
                    Ok(a.wrapping_div(b))
                }
            }),
            Instruction::ModInt(l, r) => self.int_binary(l, r, stack, |a, b| {
                if b == 0 {
                    Err(LoamError::domain("integer modulo by zero"))
                } else {
                    Ok(a.wrapping_rem(b))
                }
            }),

            Instruction::AddFloat(l, r) => self.float_binary(l, r, stack, |a, b| a + b),
            Instruction::SubFloat(l, r) => self.float_binary(l, r, stack, |a, b| a - b),
            Instruction::MulFloat(l, r) => self.float_binary(l, r, stack, |a, b| a * b),
            Instruction::DivFloat(l, r) => self.float_binary(l, r, stack, |a, b| a / b),
            Instruction::ModFloat(l, r) => self.float_binary(l, r, stack, |a, b| a % b),

            Instruction::NegInt(operand) => {
                let v = bubble!(self.evaluate(operand, stack)?);
                match v {
                    Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
                    other => Err(LoamError::domain(format!(
                        "integer negation over {}",
                        other.type_name()
                    ))),
                }
            }

            Instruction::NegFloat(operand) => {
                let v = bubble!(self.evaluate(operand, stack)?);
                Ok(Value::Float(-as_float(&v)?))
            }
        }
    }

    /// Invoke a callable with already-evaluated arguments. Function values
    /// get a refreshed frame with arguments in the leading slots.
    pub fn call_value(&self, callee: &Value, args: Vec<Value>) -> EvalResult {
        match callee {
            Value::Function(fv) => {
                if args.len() > fv.stack.len() {
                    return Err(LoamError::arity(
                        "function",
                        fv.stack.len().to_string(),
                        args.len(),
                    ));
                }
                let frame = fv.stack.shallow_refresh();
                for (i, arg) in args.into_iter().enumerate() {
                    frame.set(i, arg)?;
                }
                self.evaluate(&fv.instruction, &frame)
            }
            Value::NativeFunction(nf) => (nf.func)(&args),
            other => Err(LoamError::type_mismatch("callable", other.type_name())),
        }
    }

    fn int_binary(
        &self,
        l: &Instruction,
        r: &Instruction,
        stack: &Rc<Stack>,
        op: impl FnOnce(i64, i64) -> Result<i64, LoamError>,
    ) -> EvalResult {
        let a = bubble!(self.evaluate(l, stack)?);
        let b = bubble!(self.evaluate(r, stack)?);
        match (&a, &b) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(op(*a, *b)?)),
            _ => Err(LoamError::domain(format!(
                "integer arithmetic over {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    fn float_binary(
        &self,
        l: &Instruction,
        r: &Instruction,
        stack: &Rc<Stack>,
        op: impl FnOnce(f64, f64) -> f64,
    ) -> EvalResult {
        let a = bubble!(self.evaluate(l, stack)?);
        let b = bubble!(self.evaluate(r, stack)?);
        Ok(Value::Float(op(as_float(&a)?, as_float(&b)?)))
    }
}

/// Float-kind instructions accept integers and coerce; this is what makes
/// surface `/` produce floats over integer operands.
fn as_float(v: &Value) -> Result<f64, LoamError> {
    match v {
        Value::Float(f) => Ok(*f),
        Value::Integer(n) => Ok(*n as f64),
        Value::Unsigned(n) => Ok(*n as f64),
        other => Err(LoamError::domain(format!(
            "float arithmetic over {}",
            other.type_name()
        ))),
    }
}
