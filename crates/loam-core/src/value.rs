use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use crate::error::LoamError;
use crate::expr::Expression;
use crate::instruction::Instruction;
use crate::intern::Name;
use crate::property::Properties;
use crate::scope::Scope;
use crate::stack::Stack;
use crate::statement::Statement;
use crate::types::Type;

// ── Supporting types ──────────────────────────────────────────────

/// A native function callable from loam code.
pub type NativeFnInner = dyn Fn(&[Value]) -> Result<Value, LoamError>;

pub struct NativeFn {
    pub name: String,
    pub func: Box<NativeFnInner>,
}

impl NativeFn {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, LoamError> + 'static,
    ) -> Self {
        NativeFn {
            name: name.into(),
            func: Box::new(f),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native-fn {}>", self.name)
    }
}

/// A compiled function: a template stack plus the instruction tree of its
/// body. The stack stored here is never executed directly; each call goes
/// through `Stack::shallow_refresh` first.
#[derive(Debug)]
pub struct FunctionValue {
    pub stack: Rc<Stack>,
    pub instruction: Rc<Instruction>,
}

/// A value annotated with a runtime property bag.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRef {
    pub properties: Properties,
    pub value: Value,
}

// ── ValueKind ─────────────────────────────────────────────────────

/// The discriminant of a `Value`, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    None,
    Integer,
    Unsigned,
    Float,
    Boolean,
    List,
    String,
    Array,
    Reference,
    Composite,
    PropertyReference,
    Type,
    NativeFunction,
    Function,
    Effect,
    Set,
    Table,
    Expression,
    Statement,
    Scope,
}

// ── The Value type ────────────────────────────────────────────────

/// A runtime datum: one tag word plus one payload word. Primitives pack
/// their payload directly; everything else is an owned `Rc`.
#[derive(Clone)]
pub enum Value {
    None,
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Boolean(bool),
    List(Rc<RefCell<Vec<Value>>>),
    String(Rc<RefCell<String>>),
    Array(Rc<Vec<Value>>),
    Reference(Rc<RefCell<Value>>),
    Composite(Rc<RefCell<BTreeMap<Name, Value>>>),
    PropertyReference(Rc<PropertyRef>),
    Type(Rc<Type>),
    NativeFunction(Rc<NativeFn>),
    Function(Rc<FunctionValue>),
    Effect(Rc<Value>),
    Set(Rc<RefCell<HashSet<Value>>>),
    Table(Rc<RefCell<HashMap<Value, Value>>>),
    Expression(Rc<Expression>),
    Statement(Rc<Statement>),
    Scope(Rc<Scope>),
}

// Two machine words: every payload is either an immediate or one pointer.
#[cfg(target_pointer_width = "64")]
const _: () = assert!(std::mem::size_of::<Value>() == 16);

// ── Constructors ──────────────────────────────────────────────────

impl Value {
    pub fn none() -> Value {
        Value::None
    }

    pub fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    pub fn uint(n: u64) -> Value {
        Value::Unsigned(n)
    }

    pub fn float(f: f64) -> Value {
        Value::Float(f)
    }

    pub fn boolean(b: bool) -> Value {
        Value::Boolean(b)
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Rc::new(RefCell::new(s.into())))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(items))
    }

    pub fn reference(inner: Value) -> Value {
        Value::Reference(Rc::new(RefCell::new(inner)))
    }

    pub fn composite(fields: impl IntoIterator<Item = (Name, Value)>) -> Value {
        Value::Composite(Rc::new(RefCell::new(fields.into_iter().collect())))
    }

    pub fn property_reference(properties: Properties, value: Value) -> Value {
        Value::PropertyReference(Rc::new(PropertyRef { properties, value }))
    }

    pub fn type_value(ty: Rc<Type>) -> Value {
        Value::Type(ty)
    }

    pub fn native(
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, LoamError> + 'static,
    ) -> Value {
        Value::NativeFunction(Rc::new(NativeFn::new(name, f)))
    }

    pub fn function(stack: Rc<Stack>, instruction: Rc<Instruction>) -> Value {
        Value::Function(Rc::new(FunctionValue { stack, instruction }))
    }

    pub fn effect(inner: Value) -> Value {
        Value::Effect(Rc::new(inner))
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Set(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn table(pairs: impl IntoIterator<Item = (Value, Value)>) -> Value {
        Value::Table(Rc::new(RefCell::new(pairs.into_iter().collect())))
    }

    pub fn expression(e: Rc<Expression>) -> Value {
        Value::Expression(e)
    }

    pub fn statement(s: Rc<Statement>) -> Value {
        Value::Statement(s)
    }

    pub fn scope(s: Rc<Scope>) -> Value {
        Value::Scope(s)
    }
}

// ── Inspection ────────────────────────────────────────────────────

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::None => ValueKind::None,
            Value::Integer(_) => ValueKind::Integer,
            Value::Unsigned(_) => ValueKind::Unsigned,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::List(_) => ValueKind::List,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Reference(_) => ValueKind::Reference,
            Value::Composite(_) => ValueKind::Composite,
            Value::PropertyReference(_) => ValueKind::PropertyReference,
            Value::Type(_) => ValueKind::Type,
            Value::NativeFunction(_) => ValueKind::NativeFunction,
            Value::Function(_) => ValueKind::Function,
            Value::Effect(_) => ValueKind::Effect,
            Value::Set(_) => ValueKind::Set,
            Value::Table(_) => ValueKind::Table,
            Value::Expression(_) => ValueKind::Expression,
            Value::Statement(_) => ValueKind::Statement,
            Value::Scope(_) => ValueKind::Scope,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            ValueKind::None => "none",
            ValueKind::Integer => "integer",
            ValueKind::Unsigned => "unsigned",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::List => "list",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Reference => "reference",
            ValueKind::Composite => "composite",
            ValueKind::PropertyReference => "property-reference",
            ValueKind::Type => "type",
            ValueKind::NativeFunction => "native-function",
            ValueKind::Function => "function",
            ValueKind::Effect => "effect",
            ValueKind::Set => "set",
            ValueKind::Table => "table",
            ValueKind::Expression => "expression",
            ValueKind::Statement => "statement",
            ValueKind::Scope => "scope",
        }
    }

    pub fn is_effect(&self) -> bool {
        matches!(self, Value::Effect(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::NativeFunction(_))
    }

    /// Follow `PropertyReference` wrappers down to the annotated value.
    pub fn unwrap_properties(&self) -> &Value {
        let mut v = self;
        while let Value::PropertyReference(pr) = v {
            v = &pr.value;
        }
        v
    }

    /// The property bag carried by this value at runtime (empty unless the
    /// value is a `PropertyReference`).
    pub fn runtime_properties(&self) -> Properties {
        match self {
            Value::PropertyReference(pr) => pr.properties.clone(),
            _ => Properties::new(),
        }
    }
}

// ── Equality ──────────────────────────────────────────────────────

// Reference, Function, NativeFunction, and Scope compare by identity; this
// is the cycle-breaker for the value graph. Everything else is structural.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Unsigned(a), Value::Unsigned(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Reference(a), Value::Reference(b)) => Rc::ptr_eq(a, b),
            (Value::Composite(a), Value::Composite(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::PropertyReference(a), Value::PropertyReference(b)) => {
                Rc::ptr_eq(a, b) || **a == **b
            }
            (Value::Type(a), Value::Type(b)) => Rc::ptr_eq(a, b) || **a == **b,
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Effect(a), Value::Effect(b)) => Rc::ptr_eq(a, b) || **a == **b,
            (Value::Set(a), Value::Set(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            (Value::Table(a), Value::Table(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Expression(a), Value::Expression(b)) => Rc::ptr_eq(a, b) || **a == **b,
            (Value::Statement(a), Value::Statement(b)) => Rc::ptr_eq(a, b) || **a == **b,
            (Value::Scope(a), Value::Scope(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

// ── Hash ──────────────────────────────────────────────────────────

/// Hash a single item with a fresh hasher; used to fold unordered
/// collections into an order-independent digest.
fn solo_hash<T: Hash + ?Sized>(item: &T) -> u64 {
    let mut h = std::collections::hash_map::DefaultHasher::new();
    item.hash(&mut h);
    h.finish()
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::None => 0u8.hash(state),
            Value::Integer(n) => {
                1u8.hash(state);
                n.hash(state);
            }
            Value::Unsigned(n) => {
                2u8.hash(state);
                n.hash(state);
            }
            Value::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Boolean(b) => {
                4u8.hash(state);
                b.hash(state);
            }
            Value::List(items) => {
                5u8.hash(state);
                items.borrow().hash(state);
            }
            Value::String(s) => {
                6u8.hash(state);
                s.borrow().hash(state);
            }
            Value::Array(items) => {
                7u8.hash(state);
                items.hash(state);
            }
            Value::Reference(cell) => {
                8u8.hash(state);
                (Rc::as_ptr(cell) as usize).hash(state);
            }
            Value::Composite(fields) => {
                9u8.hash(state);
                fields.borrow().hash(state);
            }
            Value::PropertyReference(pr) => {
                10u8.hash(state);
                pr.properties.hash(state);
                pr.value.hash(state);
            }
            Value::Type(t) => {
                11u8.hash(state);
                t.hash(state);
            }
            Value::NativeFunction(nf) => {
                12u8.hash(state);
                (Rc::as_ptr(nf) as usize).hash(state);
            }
            Value::Function(fv) => {
                13u8.hash(state);
                (Rc::as_ptr(fv) as usize).hash(state);
            }
            Value::Effect(inner) => {
                14u8.hash(state);
                inner.hash(state);
            }
            Value::Set(items) => {
                15u8.hash(state);
                let items = items.borrow();
                items.len().hash(state);
                let digest = items.iter().fold(0u64, |acc, v| acc ^ solo_hash(v));
                digest.hash(state);
            }
            Value::Table(pairs) => {
                16u8.hash(state);
                let pairs = pairs.borrow();
                pairs.len().hash(state);
                let digest = pairs
                    .iter()
                    .fold(0u64, |acc, (k, v)| acc ^ solo_hash(&(k, v)));
                digest.hash(state);
            }
            Value::Expression(e) => {
                17u8.hash(state);
                e.hash(state);
            }
            Value::Statement(s) => {
                18u8.hash(state);
                s.hash(state);
            }
            Value::Scope(s) => {
                19u8.hash(state);
                (Rc::as_ptr(s) as usize).hash(state);
            }
        }
    }
}

// ── Debug / Display ───────────────────────────────────────────────

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// The printers are debug-only and not specified bit-exactly.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Unsigned(n) => write!(f, "{n}u"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::String(s) => write!(f, "{:?}", s.borrow()),
            Value::Array(items) => {
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            Value::Reference(_) => write!(f, "<reference>"),
            Value::Composite(fields) => {
                write!(f, "{{")?;
                for (i, (name, v)) in fields.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::PropertyReference(pr) => write!(f, "{}", pr.value),
            Value::Type(t) => write!(f, "{t}"),
            Value::NativeFunction(nf) => write!(f, "<native-fn {}>", nf.name),
            Value::Function(_) => write!(f, "<function>"),
            Value::Effect(inner) => write!(f, "<effect {inner}>"),
            Value::Set(items) => {
                write!(f, "{{")?;
                for (i, v) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
            Value::Table(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Expression(_) => write!(f, "<expression>"),
            Value::Statement(_) => write!(f, "<statement>"),
            Value::Scope(_) => write!(f, "<scope>"),
        }
    }
}
