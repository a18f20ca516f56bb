use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::matching::TypeMatch;
use crate::types::Type;
use crate::value::Value;

/// Predicate over a candidate type, given the property's arguments.
pub type TypeMatcherFn = dyn Fn(&Type, &[Value]) -> TypeMatch;

/// Predicate over a candidate value, given the property's arguments.
pub type ValueMatcherFn = dyn Fn(&Value, &[Value]) -> bool;

pub struct PropertyTagData {
    /// Debug only; tag identity is the pointer, never the name.
    pub name: String,
    pub argument_types: Vec<Rc<Type>>,
    pub type_matcher: Option<Box<TypeMatcherFn>>,
    pub value_matcher: Option<Box<ValueMatcherFn>>,
}

/// A named property identity. Cloning shares the identity; two tags created
/// separately are distinct even under the same name.
#[derive(Clone)]
pub struct PropertyTag(Rc<PropertyTagData>);

impl PropertyTag {
    pub fn new(name: impl Into<String>) -> PropertyTag {
        PropertyTag(Rc::new(PropertyTagData {
            name: name.into(),
            argument_types: Vec::new(),
            type_matcher: None,
            value_matcher: None,
        }))
    }

    pub fn with_matchers(
        name: impl Into<String>,
        argument_types: Vec<Rc<Type>>,
        type_matcher: Option<Box<TypeMatcherFn>>,
        value_matcher: Option<Box<ValueMatcherFn>>,
    ) -> PropertyTag {
        PropertyTag(Rc::new(PropertyTagData {
            name: name.into(),
            argument_types,
            type_matcher,
            value_matcher,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn argument_types(&self) -> &[Rc<Type>] {
        &self.0.argument_types
    }

    pub fn type_matcher(&self) -> Option<&TypeMatcherFn> {
        self.0.type_matcher.as_deref()
    }

    pub fn value_matcher(&self) -> Option<&ValueMatcherFn> {
        self.0.value_matcher.as_deref()
    }
}

impl PartialEq for PropertyTag {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for PropertyTag {}

impl Hash for PropertyTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for PropertyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.name)
    }
}

/// One attached property: a tag plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub tag: PropertyTag,
    pub arguments: Vec<Value>,
}

/// A property bag: tag identity → argument list, unique per tag.
///
/// Stored as a small vector; bags are tiny and iteration order is the
/// insertion order, which keeps hashing order-independent via XOR folding.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: Vec<Property>,
}

impl Properties {
    pub fn new() -> Properties {
        Properties::default()
    }

    pub fn single(tag: PropertyTag, arguments: Vec<Value>) -> Properties {
        let mut p = Properties::new();
        p.insert(tag, arguments);
        p
    }

    /// Attach a property; replaces any existing entry for the same tag.
    pub fn insert(&mut self, tag: PropertyTag, arguments: Vec<Value>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.arguments = arguments;
        } else {
            self.entries.push(Property { tag, arguments });
        }
    }

    pub fn get(&self, tag: &PropertyTag) -> Option<&[Value]> {
        self.entries
            .iter()
            .find(|e| e.tag == *tag)
            .map(|e| e.arguments.as_slice())
    }

    pub fn has(&self, tag: &PropertyTag) -> bool {
        self.entries.iter().any(|e| e.tag == *tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A bag holding every entry of both; `other` wins on shared tags.
    pub fn merged(&self, other: &Properties) -> Properties {
        let mut out = self.clone();
        for entry in &other.entries {
            out.insert(entry.tag.clone(), entry.arguments.clone());
        }
        out
    }
}

impl PartialEq for Properties {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|e| other.get(&e.tag) == Some(e.arguments.as_slice()))
    }
}

impl Eq for Properties {}

impl Hash for Properties {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entries.len().hash(state);
        let digest = self.entries.iter().fold(0u64, |acc, e| {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            e.tag.hash(&mut h);
            e.arguments.hash(&mut h);
            acc ^ h.finish()
        });
        digest.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_identity_is_by_pointer() {
        let a = PropertyTag::new("Template");
        let b = PropertyTag::new("Template");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_insert_replaces_same_tag() {
        let tag = PropertyTag::new("Sized");
        let mut props = Properties::new();
        props.insert(tag.clone(), vec![Value::int(1)]);
        props.insert(tag.clone(), vec![Value::int(2)]);
        assert_eq!(props.len(), 1);
        assert_eq!(props.get(&tag), Some(&[Value::int(2)][..]));
    }

    #[test]
    fn test_bag_equality_ignores_order() {
        let a = PropertyTag::new("A");
        let b = PropertyTag::new("B");
        let mut p1 = Properties::new();
        p1.insert(a.clone(), vec![]);
        p1.insert(b.clone(), vec![Value::int(7)]);
        let mut p2 = Properties::new();
        p2.insert(b, vec![Value::int(7)]);
        p2.insert(a, vec![]);
        assert_eq!(p1, p2);
    }
}
