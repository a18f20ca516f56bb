use std::rc::Rc;

use crate::types::{Type, TypeBody};

// ── TypeMatch ─────────────────────────────────────────────────────

/// Outcome of matching a matcher type against a candidate type.
///
/// The declared order is both the lattice used for min/max reduction and
/// the ranking used by overload dispatch (higher is better).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeMatch {
    /// The matcher is not informative in this direction.
    Unknown,
    /// Strong incompatibility; short-circuits any composition.
    None,
    FiniteFalse,
    False,
    True,
    FiniteTrue,
    /// Equivalent for dispatch purposes but differing in metadata.
    AlmostEqual,
    /// Same set, structurally agreeing. Symmetric.
    Equal,
}

impl TypeMatch {
    pub fn matches(self) -> bool {
        self >= TypeMatch::True
    }

    pub fn converse(self) -> TypeMatch {
        match self {
            TypeMatch::True => TypeMatch::False,
            TypeMatch::False => TypeMatch::True,
            TypeMatch::FiniteTrue => TypeMatch::FiniteFalse,
            TypeMatch::FiniteFalse => TypeMatch::FiniteTrue,
            other => other,
        }
    }
}

/// Combine per-field matches of two structural types: `None` if the field
/// counts differ, otherwise the covariant minimum across pairs.
pub fn reduce_match<'a>(
    lhs: impl ExactSizeIterator<Item = &'a Rc<Type>>,
    rhs: impl ExactSizeIterator<Item = &'a Rc<Type>>,
) -> TypeMatch {
    if lhs.len() != rhs.len() {
        return TypeMatch::None;
    }
    let mut out = TypeMatch::Equal;
    for (a, b) in lhs.zip(rhs) {
        let m = covariant(a, b);
        if m == TypeMatch::None {
            return TypeMatch::None;
        }
        out = out.min(m);
    }
    out
}

/// Covariant field match: try the matcher's view, fall back to the
/// converse of the candidate's view when uninformative.
pub fn covariant(bound: &Type, t: &Type) -> TypeMatch {
    let m = bound.match_type(t);
    if m == TypeMatch::Unknown {
        t.match_type(bound).converse()
    } else {
        m
    }
}

/// Contravariant field match: the candidate's view first.
pub fn contravariant(bound: &Type, t: &Type) -> TypeMatch {
    let m = t.match_type(bound);
    if m == TypeMatch::Unknown {
        bound.match_type(t).converse()
    } else {
        m
    }
}

// ── The match relation ────────────────────────────────────────────

impl Type {
    /// The ordered match relation: how does `self` (the matcher) accept
    /// the candidate type `t`?
    pub fn match_type(&self, t: &Type) -> TypeMatch {
        // Identical or structurally equal operands (properties included)
        // are the only road to Equal; everything below is clamped.
        if std::ptr::eq(self, t) || self == t {
            return TypeMatch::Equal;
        }
        let mut m = self.match_body(t).min(TypeMatch::AlmostEqual);
        // Fold in the matcher's property predicates.
        for prop in self.properties.iter() {
            if m == TypeMatch::None {
                return TypeMatch::None;
            }
            if let Some(tm) = prop.tag.type_matcher() {
                m = m.min(tm(t, &prop.arguments));
            }
        }
        m
    }

    fn match_body(&self, t: &Type) -> TypeMatch {
        match &self.body {
            TypeBody::Any => TypeMatch::True,
            TypeBody::None => TypeMatch::Unknown,
            TypeBody::Union(ops) => {
                let mut best = TypeMatch::Unknown;
                for op in ops {
                    best = best.max(op.match_type(t));
                    if best >= TypeMatch::FiniteTrue {
                        return TypeMatch::FiniteTrue;
                    }
                }
                best
            }
            TypeBody::Intersection(ops) => {
                let mut worst = TypeMatch::Equal;
                for op in ops {
                    let m = op.match_type(t);
                    if m == TypeMatch::None {
                        return TypeMatch::None;
                    }
                    worst = worst.min(m);
                    if worst <= TypeMatch::FiniteFalse {
                        return TypeMatch::FiniteFalse;
                    }
                }
                worst
            }
            TypeBody::Not(inner) => inner.match_type(t).converse(),
            TypeBody::BaseType(kind) => {
                if t.kind() == *kind {
                    TypeMatch::True
                } else {
                    TypeMatch::False
                }
            }
            TypeBody::WithProperty { inner, tag } => {
                let presence = if t.properties.has(tag) {
                    TypeMatch::AlmostEqual
                } else {
                    TypeMatch::FiniteFalse
                };
                presence.min(covariant(inner, t))
            }
            TypeBody::CustomMatcher(m) => match &m.type_matcher {
                Some(tm) => tm(t),
                None => TypeMatch::None,
            },
            // Concrete matcher.
            _ => self.match_concrete(t),
        }
    }

    fn match_concrete(&self, t: &Type) -> TypeMatch {
        debug_assert!(self.kind().is_concrete());
        if !t.kind().is_concrete() {
            return TypeMatch::Unknown;
        }
        if self.kind() != t.kind() {
            return TypeMatch::None;
        }
        if self.kind().is_atomic() {
            return TypeMatch::AlmostEqual;
        }
        match (&self.body, &t.body) {
            (
                TypeBody::Function {
                    arguments: a1,
                    return_type: r1,
                },
                TypeBody::Function {
                    arguments: a2,
                    return_type: r2,
                },
            ) => contravariant(a1, a2).min(covariant(r1, r2)),
            (
                TypeBody::Tuple {
                    elements: e1,
                    varargs: v1,
                },
                TypeBody::Tuple {
                    elements: e2,
                    varargs: v2,
                },
            ) => match (v1, v2) {
                (None, None) => reduce_match(e1.iter(), e2.iter()),
                // Both sides open: fixed prefixes must agree, then the
                // varargs tails match covariantly.
                (Some(v1), Some(v2)) => {
                    reduce_match(e1.iter(), e2.iter()).min(covariant(v1, v2))
                }
                // Open matcher, closed candidate: extra candidate elements
                // each match the varargs type.
                (Some(va), None) => {
                    if e2.len() < e1.len() {
                        return TypeMatch::None;
                    }
                    let prefix = reduce_match(e1.iter(), e2[..e1.len()].iter());
                    if prefix == TypeMatch::None {
                        return TypeMatch::None;
                    }
                    let mut out = prefix;
                    for extra in &e2[e1.len()..] {
                        let m = covariant(va, extra);
                        if m == TypeMatch::None {
                            return TypeMatch::None;
                        }
                        out = out.min(m);
                    }
                    out
                }
                // A closed matcher cannot accept an open candidate.
                (None, Some(_)) => TypeMatch::None,
            },
            (TypeBody::Reference(a), TypeBody::Reference(b))
            | (TypeBody::List(a), TypeBody::List(b))
            | (TypeBody::Set(a), TypeBody::Set(b))
            | (TypeBody::Type(a), TypeBody::Type(b)) => covariant(a, b),
            (
                TypeBody::Table { key: k1, value: v1 },
                TypeBody::Table { key: k2, value: v2 },
            ) => covariant(k1, k2).min(covariant(v1, v2)),
            (TypeBody::Composite(f1), TypeBody::Composite(f2)) => {
                // Same key set, pointwise covariant on values.
                if f1.len() != f2.len() {
                    return TypeMatch::None;
                }
                let mut out = TypeMatch::Equal;
                for (name, t1) in f1 {
                    let Some(t2) = f2.get(name) else {
                        return TypeMatch::None;
                    };
                    let m = covariant(t1, t2);
                    if m == TypeMatch::None {
                        return TypeMatch::None;
                    }
                    out = out.min(m);
                }
                out
            }
            _ => unreachable!("concrete kinds already matched"),
        }
    }
}

// ── Bounds ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variance {
    Covariant,
    Contravariant,
    Invariant,
    /// Reserved; currently treated as `Invariant`.
    Ultravariant,
}

/// A type paired with a variance, used for subtyping checks.
#[derive(Debug, Clone)]
pub struct TypeBound {
    pub bound: Rc<Type>,
    pub variance: Variance,
}

impl TypeBound {
    pub fn new(bound: Rc<Type>, variance: Variance) -> TypeBound {
        TypeBound { bound, variance }
    }

    pub fn covariant(bound: Rc<Type>) -> TypeBound {
        TypeBound::new(bound, Variance::Covariant)
    }

    pub fn match_bound(&self, t: &Type) -> TypeMatch {
        match self.variance {
            Variance::Covariant => covariant(&self.bound, t),
            Variance::Contravariant => contravariant(&self.bound, t),
            Variance::Invariant | Variance::Ultravariant => {
                let m = self.bound.match_type(t);
                if m == TypeMatch::Unknown {
                    m.max(t.match_type(&self.bound))
                } else {
                    m
                }
            }
        }
    }

    pub fn matches_bound(&self, t: &Type) -> bool {
        self.match_bound(t).matches()
    }
}

// ── Ordering and join ─────────────────────────────────────────────

/// Signed comparison of two types by the strength of their mutual match.
pub fn compare(t1: &Type, t2: &Type) -> i32 {
    t1.match_type(t2) as i32 - t2.match_type(t1) as i32
}

/// The supertype of the two, or their union when neither side subsumes
/// the other.
pub fn common_type(a: &Rc<Type>, b: &Rc<Type>) -> Rc<Type> {
    let ab = a.match_type(b);
    if ab == TypeMatch::Equal {
        return a.clone();
    }
    let ba = b.match_type(a);
    if ab.matches() && ab >= ba {
        a.clone()
    } else if ba.matches() {
        b.clone()
    } else {
        Type::union(vec![a.clone(), b.clone()])
    }
}

// ── Overload ranking ──────────────────────────────────────────────

/// Outcome of ranking overload candidates against argument types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadResolution {
    Selected(usize),
    /// No candidate matched every argument.
    NoMatch,
    /// Two tied candidates with incomparable specificities.
    Ambiguous(usize, usize),
}

/// Score one candidate's parameters against the argument types: the
/// covariant minimum, or `None` on arity mismatch.
pub fn score_candidate(parameters: &[Rc<Type>], arguments: &[Rc<Type>]) -> TypeMatch {
    if parameters.len() != arguments.len() {
        return TypeMatch::None;
    }
    let mut out = TypeMatch::Equal;
    for (p, a) in parameters.iter().zip(arguments) {
        let m = covariant(p, a);
        if m == TypeMatch::None {
            return TypeMatch::None;
        }
        out = out.min(m);
    }
    out
}

/// `true` when every parameter of `a` is at least as specific as the
/// corresponding parameter of `b`.
fn at_least_as_specific(a: &[Rc<Type>], b: &[Rc<Type>]) -> bool {
    a.iter().zip(b).all(|(x, y)| compare(x, y) <= 0)
}

/// Rank candidates by reduced match strength over the argument types.
/// Ties are resolved by specificity, then declaration order; tied
/// candidates with incomparable specificities fail.
pub fn rank_overloads<'a>(
    candidates: impl Iterator<Item = &'a [Rc<Type>]>,
    arguments: &[Rc<Type>],
) -> OverloadResolution {
    let candidates: Vec<&[Rc<Type>]> = candidates.collect();
    let mut best: Option<(TypeMatch, Vec<usize>)> = None;
    for (i, params) in candidates.iter().enumerate() {
        let score = score_candidate(params, arguments);
        if !score.matches() {
            continue;
        }
        match &mut best {
            None => best = Some((score, vec![i])),
            Some((top, ties)) => {
                if score > *top {
                    *top = score;
                    ties.clear();
                    ties.push(i);
                } else if score == *top {
                    ties.push(i);
                }
            }
        }
    }
    let Some((_, ties)) = best else {
        return OverloadResolution::NoMatch;
    };
    if ties.len() == 1 {
        return OverloadResolution::Selected(ties[0]);
    }
    // First (in declaration order) candidate at least as specific as every
    // other tied candidate wins.
    for &i in &ties {
        if ties
            .iter()
            .all(|&j| j == i || at_least_as_specific(candidates[i], candidates[j]))
        {
            return OverloadResolution::Selected(i);
        }
    }
    OverloadResolution::Ambiguous(ties[0], ties[1])
}
