use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::LoamError;
use crate::value::Value;

/// The activation record of a context or function: a fixed array of value
/// slots plus the stacks of imported modules.
///
/// Imports are shared between refreshes; slot writes through `set_address`
/// on an imported stack are therefore visible to every holder, which is how
/// module-level variables behave.
pub struct Stack {
    imports: Rc<[Rc<Stack>]>,
    slots: RefCell<Box<[Value]>>,
}

impl Stack {
    pub fn new(imports: Vec<Rc<Stack>>, size: usize) -> Rc<Stack> {
        Stack::with_slots(imports, vec![Value::None; size])
    }

    pub fn with_slots(imports: Vec<Rc<Stack>>, slots: Vec<Value>) -> Rc<Stack> {
        Rc::new(Stack {
            imports: imports.into(),
            slots: RefCell::new(slots.into_boxed_slice()),
        })
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    pub fn imports(&self) -> &[Rc<Stack>] {
        &self.imports
    }

    pub fn get(&self, slot: usize) -> Result<Value, LoamError> {
        self.slots
            .borrow()
            .get(slot)
            .cloned()
            .ok_or_else(|| LoamError::domain(format!("stack slot {slot} out of range")))
    }

    pub fn set(&self, slot: usize, value: Value) -> Result<(), LoamError> {
        match self.slots.borrow_mut().get_mut(slot) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(LoamError::domain(format!(
                "stack slot {slot} out of range"
            ))),
        }
    }

    pub fn import(&self, index: usize) -> Result<Rc<Stack>, LoamError> {
        self.imports
            .get(index)
            .cloned()
            .ok_or_else(|| LoamError::domain(format!("stack import {index} out of range")))
    }

    /// A new stack sharing this one's imports, with a fresh copy of the
    /// value slots. Called on function entry so recursive calls do not
    /// clobber outer frames.
    pub fn shallow_refresh(&self) -> Rc<Stack> {
        Rc::new(Stack {
            imports: self.imports.clone(),
            slots: RefCell::new(self.slots.borrow().clone()),
        })
    }

    fn walk_address<'a>(
        self: &'a Rc<Self>,
        address: &[usize],
    ) -> Result<(Rc<Stack>, usize), LoamError> {
        let Some((&slot, imports)) = address.split_last() else {
            return Err(LoamError::domain("empty variable address"));
        };
        let mut stack = self.clone();
        for &i in imports {
            stack = stack.import(i)?;
        }
        Ok((stack, slot))
    }

    /// Read through a variable address: all but the last index select
    /// imports in turn, the last is the slot.
    pub fn get_address(self: &Rc<Self>, address: &[usize]) -> Result<Value, LoamError> {
        let (stack, slot) = self.walk_address(address)?;
        stack.get(slot)
    }

    /// Write through a variable address.
    pub fn set_address(self: &Rc<Self>, address: &[usize], value: Value) -> Result<(), LoamError> {
        let (stack, slot) = self.walk_address(address)?;
        stack.set(slot, value)
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<stack {} slots, {} imports>",
            self.len(),
            self.imports.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_roundtrip() {
        let stack = Stack::new(vec![], 3);
        stack.set(1, Value::int(42)).unwrap();
        assert_eq!(stack.get(1).unwrap(), Value::int(42));
        assert_eq!(stack.get(0).unwrap(), Value::None);
    }

    #[test]
    fn test_out_of_range_is_domain_error() {
        let stack = Stack::new(vec![], 1);
        assert!(stack.get(5).is_err());
        assert!(stack.set(5, Value::None).is_err());
        assert!(stack.import(0).is_err());
    }

    #[test]
    fn test_shallow_refresh_copies_slots_and_shares_imports() {
        let module = Stack::new(vec![], 1);
        module.set(0, Value::int(7)).unwrap();
        let frame = Stack::new(vec![module.clone()], 2);
        frame.set(0, Value::int(1)).unwrap();

        let fresh = frame.shallow_refresh();
        assert_eq!(fresh.get(0).unwrap(), Value::int(1));
        fresh.set(0, Value::int(99)).unwrap();
        // Original slots untouched; imports shared by pointer.
        assert_eq!(frame.get(0).unwrap(), Value::int(1));
        assert!(Rc::ptr_eq(&fresh.import(0).unwrap(), &module));
    }

    #[test]
    fn test_address_walks_imports() {
        let inner = Stack::new(vec![], 1);
        inner.set(0, Value::string("deep")).unwrap();
        let mid = Stack::new(vec![inner], 0);
        let outer = Stack::new(vec![mid], 0);

        assert_eq!(
            outer.get_address(&[0, 0, 0]).unwrap(),
            Value::string("deep")
        );
        outer.set_address(&[0, 0, 0], Value::int(3)).unwrap();
        assert_eq!(outer.get_address(&[0, 0, 0]).unwrap(), Value::int(3));
        assert!(outer.get_address(&[]).is_err());
    }

    #[test]
    fn test_import_mutation_is_visible_to_all_holders() {
        let module = Stack::new(vec![], 1);
        let a = Stack::new(vec![module.clone()], 0);
        let b = Stack::new(vec![module], 0);
        a.set_address(&[0, 0], Value::int(5)).unwrap();
        assert_eq!(b.get_address(&[0, 0]).unwrap(), Value::int(5));
    }
}
