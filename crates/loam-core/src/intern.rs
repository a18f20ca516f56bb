use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;

use lasso::{Rodeo, Spur};

thread_local! {
    static INTERNER: RefCell<Rodeo> = RefCell::new(Rodeo::default());
}

/// Intern a string, returning a Spur key.
pub fn intern(s: &str) -> Spur {
    INTERNER.with(|r| r.borrow_mut().get_or_intern(s))
}

/// Resolve a Spur key back to a String.
pub fn resolve(spur: Spur) -> String {
    INTERNER.with(|r| r.borrow().resolve(&spur).to_string())
}

/// Resolve a Spur and call f with the &str, avoiding allocation.
pub fn with_resolved<F, R>(spur: Spur, f: F) -> R
where
    F: FnOnce(&str) -> R,
{
    INTERNER.with(|r| {
        let interner = r.borrow();
        f(interner.resolve(&spur))
    })
}

/// Compare two Spurs by their resolved string content (lexicographic).
pub fn compare_spurs(a: Spur, b: Spur) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    INTERNER.with(|r| {
        let interner = r.borrow();
        interner.resolve(&a).cmp(interner.resolve(&b))
    })
}

/// An interned short name (variable names, composite field names).
///
/// Equality and hashing go through the Spur key; ordering is lexicographic
/// over the resolved string, which is what gives composites their
/// deterministic field order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name(pub Spur);

impl Name {
    pub fn new(s: &str) -> Name {
        Name(intern(s))
    }

    pub fn as_string(&self) -> String {
        resolve(self.0)
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_spurs(self.0, other.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_resolved(self.0, |s| write!(f, "{s:?}"))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_resolved(self.0, |s| f.write_str(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedups() {
        assert_eq!(intern("abc"), intern("abc"));
        assert_ne!(intern("abc"), intern("abd"));
    }

    #[test]
    fn test_name_orders_lexicographically() {
        let mut names = vec![Name::new("zeta"), Name::new("alpha"), Name::new("mu")];
        names.sort();
        let sorted: Vec<String> = names.iter().map(Name::as_string).collect();
        assert_eq!(sorted, ["alpha", "mu", "zeta"]);
    }
}
