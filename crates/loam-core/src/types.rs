use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::intern::Name;
use crate::matching::{common_type, covariant, TypeMatch};
use crate::property::{Properties, PropertyTag};
use crate::value::Value;

// ── TypeKind ──────────────────────────────────────────────────────

/// The discriminant of a `Type`. Concrete kinds describe one class of
/// runtime values; typeclass kinds describe sets of types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    // concrete
    NoneValue,
    Integer,
    Unsigned,
    Float,
    Boolean,
    Function,
    Tuple,
    Reference,
    List,
    String,
    Set,
    Table,
    Expression,
    Statement,
    Scope,
    Composite,
    Type,
    // typeclass
    Any,
    None,
    Union,
    Intersection,
    Not,
    BaseType,
    WithProperty,
    // matcher
    CustomMatcher,
}

impl TypeKind {
    pub fn is_concrete(self) -> bool {
        matches!(
            self,
            TypeKind::NoneValue
                | TypeKind::Integer
                | TypeKind::Unsigned
                | TypeKind::Float
                | TypeKind::Boolean
                | TypeKind::Function
                | TypeKind::Tuple
                | TypeKind::Reference
                | TypeKind::List
                | TypeKind::String
                | TypeKind::Set
                | TypeKind::Table
                | TypeKind::Expression
                | TypeKind::Statement
                | TypeKind::Scope
                | TypeKind::Composite
                | TypeKind::Type
        )
    }

    /// Atomic concrete kinds carry no structural payload.
    pub fn is_atomic(self) -> bool {
        matches!(
            self,
            TypeKind::NoneValue
                | TypeKind::Integer
                | TypeKind::Unsigned
                | TypeKind::Float
                | TypeKind::Boolean
                | TypeKind::String
                | TypeKind::Expression
                | TypeKind::Statement
                | TypeKind::Scope
        )
    }
}

// ── CustomMatcher ─────────────────────────────────────────────────

/// Host-supplied predicate pair. Compared and hashed by identity.
pub struct CustomMatcher {
    pub name: String,
    pub type_matcher: Option<Box<dyn Fn(&Type) -> TypeMatch>>,
    pub value_matcher: Option<Box<dyn Fn(&Value) -> bool>>,
}

impl fmt::Debug for CustomMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<matcher {}>", self.name)
    }
}

// ── Type ──────────────────────────────────────────────────────────

/// The structural payload of a type.
#[derive(Debug, Clone)]
pub enum TypeBody {
    NoneValue,
    Integer,
    Unsigned,
    Float,
    Boolean,
    String,
    Expression,
    Statement,
    Scope,
    Function {
        /// Always a `Tuple` body in well-formed types.
        arguments: Rc<Type>,
        return_type: Rc<Type>,
    },
    Tuple {
        elements: Vec<Rc<Type>>,
        varargs: Option<Rc<Type>>,
    },
    Reference(Rc<Type>),
    List(Rc<Type>),
    Set(Rc<Type>),
    Table {
        key: Rc<Type>,
        value: Rc<Type>,
    },
    Composite(BTreeMap<Name, Rc<Type>>),
    Type(Rc<Type>),
    Any,
    None,
    Union(Vec<Rc<Type>>),
    Intersection(Vec<Rc<Type>>),
    Not(Rc<Type>),
    BaseType(TypeKind),
    WithProperty {
        inner: Rc<Type>,
        tag: PropertyTag,
    },
    CustomMatcher(Rc<CustomMatcher>),
}

/// An algebraic description of a set of values. Every type carries a
/// property bag regardless of kind.
#[derive(Debug, Clone)]
pub struct Type {
    pub body: TypeBody,
    pub properties: Properties,
}

// Atomic and typeclass singletons are shared per thread so the identity
// fast path in `match_type` fires for the common cases.
macro_rules! shared_type {
    ($name:ident, $body:expr) => {
        pub fn $name() -> Rc<Type> {
            thread_local! {
                static T: Rc<Type> = Rc::new(Type::plain($body));
            }
            T.with(Rc::clone)
        }
    };
}

impl Type {
    pub fn plain(body: TypeBody) -> Type {
        Type {
            body,
            properties: Properties::new(),
        }
    }

    pub fn with_properties(body: TypeBody, properties: Properties) -> Type {
        Type { body, properties }
    }

    shared_type!(none_value, TypeBody::NoneValue);
    shared_type!(integer, TypeBody::Integer);
    shared_type!(unsigned, TypeBody::Unsigned);
    shared_type!(float, TypeBody::Float);
    shared_type!(boolean, TypeBody::Boolean);
    shared_type!(string, TypeBody::String);
    shared_type!(expression, TypeBody::Expression);
    shared_type!(statement, TypeBody::Statement);
    shared_type!(scope, TypeBody::Scope);
    shared_type!(any, TypeBody::Any);
    shared_type!(nothing, TypeBody::None);

    pub fn list_of(element: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::List(element)))
    }

    pub fn set_of(element: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Set(element)))
    }

    pub fn reference_to(element: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Reference(element)))
    }

    pub fn table_of(key: Rc<Type>, value: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Table { key, value }))
    }

    pub fn tuple(elements: Vec<Rc<Type>>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Tuple {
            elements,
            varargs: None,
        }))
    }

    pub fn tuple_varargs(elements: Vec<Rc<Type>>, varargs: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Tuple {
            elements,
            varargs: Some(varargs),
        }))
    }

    /// A function type over fixed parameter types.
    pub fn function(parameters: Vec<Rc<Type>>, return_type: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Function {
            arguments: Type::tuple(parameters),
            return_type,
        }))
    }

    /// The type of callables whose signature is unknown: any arguments,
    /// any result.
    pub fn callable() -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Function {
            arguments: Type::tuple_varargs(Vec::new(), Type::any()),
            return_type: Type::any(),
        }))
    }

    pub fn composite(fields: BTreeMap<Name, Rc<Type>>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Composite(fields)))
    }

    pub fn type_of(inner: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Type(inner)))
    }

    pub fn union(operands: Vec<Rc<Type>>) -> Rc<Type> {
        debug_assert!(!operands.is_empty(), "union of no operands");
        Rc::new(Type::plain(TypeBody::Union(operands)))
    }

    pub fn intersection(operands: Vec<Rc<Type>>) -> Rc<Type> {
        debug_assert!(!operands.is_empty(), "intersection of no operands");
        Rc::new(Type::plain(TypeBody::Intersection(operands)))
    }

    pub fn negation(inner: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::Not(inner)))
    }

    pub fn base(kind: TypeKind) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::BaseType(kind)))
    }

    pub fn with_property_tag(inner: Rc<Type>, tag: PropertyTag) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::WithProperty { inner, tag }))
    }

    pub fn custom(matcher: CustomMatcher) -> Rc<Type> {
        Rc::new(Type::plain(TypeBody::CustomMatcher(Rc::new(matcher))))
    }

    pub fn kind(&self) -> TypeKind {
        match &self.body {
            TypeBody::NoneValue => TypeKind::NoneValue,
            TypeBody::Integer => TypeKind::Integer,
            TypeBody::Unsigned => TypeKind::Unsigned,
            TypeBody::Float => TypeKind::Float,
            TypeBody::Boolean => TypeKind::Boolean,
            TypeBody::String => TypeKind::String,
            TypeBody::Expression => TypeKind::Expression,
            TypeBody::Statement => TypeKind::Statement,
            TypeBody::Scope => TypeKind::Scope,
            TypeBody::Function { .. } => TypeKind::Function,
            TypeBody::Tuple { .. } => TypeKind::Tuple,
            TypeBody::Reference(_) => TypeKind::Reference,
            TypeBody::List(_) => TypeKind::List,
            TypeBody::Set(_) => TypeKind::Set,
            TypeBody::Table { .. } => TypeKind::Table,
            TypeBody::Composite(_) => TypeKind::Composite,
            TypeBody::Type(_) => TypeKind::Type,
            TypeBody::Any => TypeKind::Any,
            TypeBody::None => TypeKind::None,
            TypeBody::Union(_) => TypeKind::Union,
            TypeBody::Intersection(_) => TypeKind::Intersection,
            TypeBody::Not(_) => TypeKind::Not,
            TypeBody::BaseType(_) => TypeKind::BaseType,
            TypeBody::WithProperty { .. } => TypeKind::WithProperty,
            TypeBody::CustomMatcher(_) => TypeKind::CustomMatcher,
        }
    }

    /// Fixed parameter types and return type, if this is a well-formed
    /// function type.
    pub fn function_signature(&self) -> Option<(Vec<Rc<Type>>, Rc<Type>)> {
        if let TypeBody::Function {
            arguments,
            return_type,
        } = &self.body
        {
            if let TypeBody::Tuple { elements, .. } = &arguments.body {
                return Some((elements.clone(), return_type.clone()));
            }
        }
        None
    }
}

// ── Equality / hashing ────────────────────────────────────────────

/// Ref-typed subfields compare by pointed-to content, with an identity
/// fast path.
fn rc_type_eq(a: &Rc<Type>, b: &Rc<Type>) -> bool {
    Rc::ptr_eq(a, b) || **a == **b
}

fn opt_rc_type_eq(a: &Option<Rc<Type>>, b: &Option<Rc<Type>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => rc_type_eq(a, b),
        _ => false,
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties && self.body == other.body
    }
}

impl Eq for Type {}

impl PartialEq for TypeBody {
    fn eq(&self, other: &Self) -> bool {
        use TypeBody::*;
        match (self, other) {
            (NoneValue, NoneValue)
            | (Integer, Integer)
            | (Unsigned, Unsigned)
            | (Float, Float)
            | (Boolean, Boolean)
            | (String, String)
            | (Expression, Expression)
            | (Statement, Statement)
            | (Scope, Scope)
            | (Any, Any)
            | (None, None) => true,
            (
                Function {
                    arguments: a1,
                    return_type: r1,
                },
                Function {
                    arguments: a2,
                    return_type: r2,
                },
            ) => rc_type_eq(a1, a2) && rc_type_eq(r1, r2),
            (
                Tuple {
                    elements: e1,
                    varargs: v1,
                },
                Tuple {
                    elements: e2,
                    varargs: v2,
                },
            ) => {
                e1.len() == e2.len()
                    && e1.iter().zip(e2).all(|(a, b)| rc_type_eq(a, b))
                    && opt_rc_type_eq(v1, v2)
            }
            (Reference(a), Reference(b)) | (List(a), List(b)) | (Set(a), Set(b)) => {
                rc_type_eq(a, b)
            }
            (Table { key: k1, value: v1 }, Table { key: k2, value: v2 }) => {
                rc_type_eq(k1, k2) && rc_type_eq(v1, v2)
            }
            (Composite(f1), Composite(f2)) => {
                f1.len() == f2.len()
                    && f1
                        .iter()
                        .zip(f2)
                        .all(|((n1, t1), (n2, t2))| n1 == n2 && rc_type_eq(t1, t2))
            }
            (Type(a), Type(b)) => rc_type_eq(a, b),
            (Union(a), Union(b)) | (Intersection(a), Intersection(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| rc_type_eq(x, y))
            }
            (Not(a), Not(b)) => rc_type_eq(a, b),
            (BaseType(a), BaseType(b)) => a == b,
            (
                WithProperty {
                    inner: i1,
                    tag: t1,
                },
                WithProperty {
                    inner: i2,
                    tag: t2,
                },
            ) => t1 == t2 && rc_type_eq(i1, i2),
            (CustomMatcher(a), CustomMatcher(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for TypeBody {}

/// Sentinel hashed in place of an absent optional subfield, distinct from
/// any non-nil hash prefix.
const NIL_FIELD_HASH: u64 = 0x9e37_79b9_7f4a_7c15;

fn hash_opt_type<H: Hasher>(t: &Option<Rc<Type>>, state: &mut H) {
    match t {
        Option::None => NIL_FIELD_HASH.hash(state),
        Option::Some(t) => t.hash(state),
    }
}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.properties.hash(state);
        std::mem::discriminant(&self.body).hash(state);
        match &self.body {
            TypeBody::NoneValue
            | TypeBody::Integer
            | TypeBody::Unsigned
            | TypeBody::Float
            | TypeBody::Boolean
            | TypeBody::String
            | TypeBody::Expression
            | TypeBody::Statement
            | TypeBody::Scope
            | TypeBody::Any
            | TypeBody::None => {}
            TypeBody::Function {
                arguments,
                return_type,
            } => {
                arguments.hash(state);
                return_type.hash(state);
            }
            TypeBody::Tuple { elements, varargs } => {
                elements.hash(state);
                hash_opt_type(varargs, state);
            }
            TypeBody::Reference(t) | TypeBody::List(t) | TypeBody::Set(t) => t.hash(state),
            TypeBody::Table { key, value } => {
                key.hash(state);
                value.hash(state);
            }
            TypeBody::Composite(fields) => fields.hash(state),
            TypeBody::Type(t) => t.hash(state),
            TypeBody::Union(ops) | TypeBody::Intersection(ops) => ops.hash(state),
            TypeBody::Not(t) => t.hash(state),
            TypeBody::BaseType(k) => k.hash(state),
            TypeBody::WithProperty { inner, tag } => {
                inner.hash(state);
                tag.hash(state);
            }
            TypeBody::CustomMatcher(m) => (Rc::as_ptr(m) as usize).hash(state),
        }
    }
}

// ── Display ───────────────────────────────────────────────────────

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            TypeBody::NoneValue => write!(f, "None"),
            TypeBody::Integer => write!(f, "Int"),
            TypeBody::Unsigned => write!(f, "Uint"),
            TypeBody::Float => write!(f, "Float"),
            TypeBody::Boolean => write!(f, "Bool"),
            TypeBody::String => write!(f, "String"),
            TypeBody::Expression => write!(f, "Expression"),
            TypeBody::Statement => write!(f, "Statement"),
            TypeBody::Scope => write!(f, "Scope"),
            TypeBody::Function {
                arguments,
                return_type,
            } => write!(f, "{arguments} -> {return_type}"),
            TypeBody::Tuple { elements, varargs } => {
                write!(f, "(")?;
                for (i, t) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                if let Some(v) = varargs {
                    if !elements.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}...")?;
                }
                write!(f, ")")
            }
            TypeBody::Reference(t) => write!(f, "Ref({t})"),
            TypeBody::List(t) => write!(f, "List({t})"),
            TypeBody::Set(t) => write!(f, "Set({t})"),
            TypeBody::Table { key, value } => write!(f, "Table({key}, {value})"),
            TypeBody::Composite(fields) => {
                write!(f, "{{")?;
                for (i, (name, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {t}")?;
                }
                write!(f, "}}")
            }
            TypeBody::Type(t) => write!(f, "Type({t})"),
            TypeBody::Any => write!(f, "Any"),
            TypeBody::None => write!(f, "Never"),
            TypeBody::Union(ops) => {
                for (i, t) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
            TypeBody::Intersection(ops) => {
                for (i, t) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
            TypeBody::Not(t) => write!(f, "!{t}"),
            TypeBody::BaseType(k) => write!(f, "base({k:?})"),
            TypeBody::WithProperty { inner, tag } => write!(f, "{inner} with {tag:?}"),
            TypeBody::CustomMatcher(m) => write!(f, "<matcher {}>", m.name),
        }
    }
}

// ── Value → Type derivation ───────────────────────────────────────

fn common_element_type<'a>(values: impl Iterator<Item = &'a Value>) -> Rc<Type> {
    let mut out: Option<Rc<Type>> = None;
    for v in values {
        let t = v.to_type();
        out = Some(match out {
            None => t,
            Some(prev) => common_type(&prev, &t),
        });
    }
    out.unwrap_or_else(Type::any)
}

/// Unordered collections fold their element types in a canonical order,
/// so equal sets and tables derive structurally equal types regardless of
/// hash-iteration order.
fn common_unordered_type<'a>(values: impl Iterator<Item = &'a Value>) -> Rc<Type> {
    let mut types: Vec<Rc<Type>> = values.map(Value::to_type).collect();
    types.sort_by_cached_key(|t| t.to_string());
    types.dedup_by(|a, b| a == b);
    types
        .into_iter()
        .reduce(|a, b| common_type(&a, &b))
        .unwrap_or_else(Type::any)
}

impl Value {
    /// The tightest concrete type describing this value.
    pub fn to_type(&self) -> Rc<Type> {
        match self {
            Value::None => Type::none_value(),
            Value::Integer(_) => Type::integer(),
            Value::Unsigned(_) => Type::unsigned(),
            Value::Float(_) => Type::float(),
            Value::Boolean(_) => Type::boolean(),
            Value::List(items) => Type::list_of(common_element_type(items.borrow().iter())),
            Value::String(_) => Type::string(),
            Value::Array(items) => Type::tuple(items.iter().map(Value::to_type).collect()),
            Value::Reference(cell) => Type::reference_to(cell.borrow().to_type()),
            Value::Composite(fields) => Type::composite(
                fields
                    .borrow()
                    .iter()
                    .map(|(name, v)| (*name, v.to_type()))
                    .collect(),
            ),
            Value::PropertyReference(pr) => {
                let inner = pr.value.to_type();
                Rc::new(Type::with_properties(
                    inner.body.clone(),
                    inner.properties.merged(&pr.properties),
                ))
            }
            Value::Type(t) => Type::type_of(t.clone()),
            // The core does not track signatures on function values; both
            // callables derive the unknown-signature function type.
            Value::NativeFunction(_) | Value::Function(_) => Type::callable(),
            Value::Effect(_) => Type::any(),
            Value::Set(items) => Type::set_of(common_unordered_type(items.borrow().iter())),
            Value::Table(pairs) => {
                let pairs = pairs.borrow();
                Type::table_of(
                    common_unordered_type(pairs.keys()),
                    common_unordered_type(pairs.values()),
                )
            }
            Value::Expression(_) => Type::expression(),
            Value::Statement(_) => Type::statement(),
            Value::Scope(_) => Type::scope(),
        }
    }
}

// ── checkType ─────────────────────────────────────────────────────

/// Test a value against a type, mirroring the type-match relation.
pub fn check_type(value: &Value, ty: &Type) -> bool {
    // Every property on the type with a value matcher must accept.
    for prop in ty.properties.iter() {
        if let Some(vm) = prop.tag.value_matcher() {
            if !vm(value, &prop.arguments) {
                return false;
            }
        }
    }
    match &ty.body {
        TypeBody::WithProperty { inner, tag } => {
            value.runtime_properties().has(tag) && check_type(value, inner)
        }
        TypeBody::Any => true,
        TypeBody::None => false,
        TypeBody::Union(ops) => ops.iter().any(|t| check_type(value, t)),
        TypeBody::Intersection(ops) => ops.iter().all(|t| check_type(value, t)),
        TypeBody::Not(inner) => !check_type(value, inner),
        TypeBody::BaseType(kind) => value.to_type().kind() == *kind,
        TypeBody::CustomMatcher(m) => {
            if let Some(vm) = &m.value_matcher {
                vm(value)
            } else if let Some(tm) = &m.type_matcher {
                tm(&value.to_type()).matches()
            } else {
                false
            }
        }
        // Concrete kinds look through runtime property annotations.
        _ => check_concrete(value.unwrap_properties(), ty),
    }
}

fn check_concrete(value: &Value, ty: &Type) -> bool {
    match (&ty.body, value) {
        (TypeBody::NoneValue, Value::None) => true,
        (TypeBody::Integer, Value::Integer(_)) => true,
        (TypeBody::Unsigned, Value::Unsigned(_)) => true,
        (TypeBody::Float, Value::Float(_)) => true,
        (TypeBody::Boolean, Value::Boolean(_)) => true,
        (TypeBody::String, Value::String(_)) => true,
        (TypeBody::Expression, Value::Expression(_)) => true,
        (TypeBody::Statement, Value::Statement(_)) => true,
        (TypeBody::Scope, Value::Scope(_)) => true,
        // Signatures are not enforced on values, only callability.
        (TypeBody::Function { .. }, v) => v.is_callable(),
        (TypeBody::Tuple { elements, varargs }, Value::Array(items)) => {
            match varargs {
                Option::None => {
                    items.len() == elements.len()
                        && items
                            .iter()
                            .zip(elements)
                            .all(|(v, t)| check_type(v, t))
                }
                Option::Some(va) => {
                    items.len() >= elements.len()
                        && items
                            .iter()
                            .zip(elements)
                            .all(|(v, t)| check_type(v, t))
                        && items[elements.len()..].iter().all(|v| check_type(v, va))
                }
            }
        }
        (TypeBody::Reference(inner), Value::Reference(cell)) => {
            check_type(&cell.borrow(), inner)
        }
        (TypeBody::List(el), Value::List(items)) => {
            items.borrow().iter().all(|v| check_type(v, el))
        }
        (TypeBody::Set(el), Value::Set(items)) => {
            items.borrow().iter().all(|v| check_type(v, el))
        }
        (TypeBody::Table { key, value: val }, Value::Table(pairs)) => pairs
            .borrow()
            .iter()
            .all(|(k, v)| check_type(k, key) && check_type(v, val)),
        (TypeBody::Composite(fields), Value::Composite(actual)) => {
            let actual = actual.borrow();
            fields.len() == actual.len()
                && fields.iter().all(|(name, t)| {
                    actual.get(name).is_some_and(|v| check_type(v, t))
                })
        }
        (TypeBody::Type(inner), Value::Type(actual)) => covariant(inner, actual).matches(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyTag;

    #[test]
    fn test_to_type_atoms() {
        assert_eq!(Value::int(1).to_type().kind(), TypeKind::Integer);
        assert_eq!(Value::uint(1).to_type().kind(), TypeKind::Unsigned);
        assert_eq!(Value::float(1.0).to_type().kind(), TypeKind::Float);
        assert_eq!(Value::boolean(true).to_type().kind(), TypeKind::Boolean);
        assert_eq!(Value::None.to_type().kind(), TypeKind::NoneValue);
        assert_eq!(Value::string("s").to_type().kind(), TypeKind::String);
    }

    #[test]
    fn test_to_type_folds_element_types() {
        let homogeneous = Value::list(vec![Value::int(1), Value::int(2)]);
        assert_eq!(
            *homogeneous.to_type(),
            *Type::list_of(Type::integer())
        );

        let mixed = Value::list(vec![Value::int(1), Value::string("x")]);
        let mixed_type = mixed.to_type();
        let TypeBody::List(element) = &mixed_type.body else {
            panic!("expected a list type");
        };
        assert_eq!(element.kind(), TypeKind::Union);

        let empty = Value::list(vec![]);
        assert_eq!(*empty.to_type(), *Type::list_of(Type::any()));
    }

    #[test]
    fn test_to_type_array_is_tuple() {
        let v = Value::array(vec![Value::int(1), Value::string("x")]);
        assert_eq!(
            *v.to_type(),
            *Type::tuple(vec![Type::integer(), Type::string()])
        );
    }

    #[test]
    fn test_check_type_roundtrip() {
        let values = [
            Value::None,
            Value::int(3),
            Value::float(0.5),
            Value::string("ab"),
            Value::list(vec![Value::int(1)]),
            Value::array(vec![Value::int(1), Value::boolean(false)]),
            Value::reference(Value::string("inner")),
            Value::set(vec![Value::int(1), Value::int(2)]),
            Value::table(vec![(Value::string("k"), Value::int(1))]),
            Value::composite(vec![(Name::new("x"), Value::int(1))]),
            Value::type_value(Type::integer()),
            Value::native("id", |args| Ok(args[0].clone())),
        ];
        for v in values {
            assert!(check_type(&v, &v.to_type()), "{v} vs {}", v.to_type());
        }
    }

    #[test]
    fn test_check_type_union_intersection_not() {
        let int_or_string = Type::union(vec![Type::integer(), Type::string()]);
        assert!(check_type(&Value::int(1), &int_or_string));
        assert!(check_type(&Value::string("s"), &int_or_string));
        assert!(!check_type(&Value::float(1.0), &int_or_string));

        let not_int = Type::negation(Type::integer());
        assert!(!check_type(&Value::int(1), &not_int));
        assert!(check_type(&Value::string("s"), &not_int));

        let both = Type::intersection(vec![Type::base(TypeKind::Integer), Type::integer()]);
        assert!(check_type(&Value::int(1), &both));
        assert!(!check_type(&Value::string("s"), &both));

        assert!(check_type(&Value::int(1), &Type::any()));
        assert!(!check_type(&Value::int(1), &Type::nothing()));
    }

    #[test]
    fn test_check_type_function_only_requires_callability() {
        let f = Type::function(vec![Type::integer()], Type::integer());
        assert!(check_type(
            &Value::native("n", |_| Ok(Value::None)),
            &f
        ));
        assert!(!check_type(&Value::int(1), &f));
    }

    #[test]
    fn test_check_type_tuple_varargs() {
        let open = Type::tuple_varargs(vec![Type::integer()], Type::string());
        let ok = Value::array(vec![
            Value::int(1),
            Value::string("a"),
            Value::string("b"),
        ]);
        assert!(check_type(&ok, &open));
        let bad = Value::array(vec![Value::int(1), Value::int(2)]);
        assert!(!check_type(&bad, &open));
        let short = Value::array(vec![]);
        assert!(!check_type(&short, &open));
    }

    #[test]
    fn test_with_property_consults_runtime_properties() {
        let tag = PropertyTag::new("Template");
        let ty = Type::with_property_tag(Type::integer(), tag.clone());
        let plain = Value::int(1);
        assert!(!check_type(&plain, &ty));
        let tagged =
            Value::property_reference(Properties::single(tag, vec![]), Value::int(1));
        assert!(check_type(&tagged, &ty));
    }

    #[test]
    fn test_value_matcher_properties_must_accept() {
        let even = PropertyTag::with_matchers(
            "Even",
            vec![],
            None,
            Some(Box::new(|v: &Value, _args: &[Value]| {
                matches!(v, Value::Integer(n) if n % 2 == 0)
            })),
        );
        let ty = Rc::new(Type::with_properties(
            TypeBody::Integer,
            Properties::single(even, vec![]),
        ));
        assert!(check_type(&Value::int(4), &ty));
        assert!(!check_type(&Value::int(3), &ty));
    }

    #[test]
    fn test_custom_matcher_checks_values() {
        let ty = Type::custom(CustomMatcher {
            name: "positive".into(),
            type_matcher: None,
            value_matcher: Some(Box::new(|v| matches!(v, Value::Integer(n) if *n > 0))),
        });
        assert!(check_type(&Value::int(5), &ty));
        assert!(!check_type(&Value::int(-5), &ty));
    }

    #[test]
    fn test_property_reference_merges_into_derived_type() {
        let tag = PropertyTag::new("Template");
        let tagged = Value::property_reference(
            Properties::single(tag.clone(), vec![]),
            Value::int(1),
        );
        let ty = tagged.to_type();
        assert_eq!(ty.kind(), TypeKind::Integer);
        assert!(ty.properties.has(&tag));
    }
}
