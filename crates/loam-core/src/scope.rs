use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::LoamError;
use crate::expr::Expression;
use crate::intern::Name;
use crate::stack::Stack;
use crate::types::Type;
use crate::value::Value;

// ── Variable ──────────────────────────────────────────────────────

/// Lifecycle of a lazy variable's compile-time value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyState {
    NotEvaluated,
    Evaluating,
    Evaluated,
}

/// A binding: a stack slot within its owning context, a cached type, and
/// an optional lazy initializer evaluated at most once.
pub struct Variable {
    name: Name,
    cached_type: RefCell<Rc<Type>>,
    stack_index: usize,
    scope: Weak<Scope>,
    lazy_expression: RefCell<Option<Rc<Expression>>>,
    state: Cell<LazyState>,
    value: RefCell<Option<Value>>,
}

impl Variable {
    pub fn name(&self) -> Name {
        self.name
    }

    pub fn cached_type(&self) -> Rc<Type> {
        self.cached_type.borrow().clone()
    }

    pub fn set_cached_type(&self, ty: Rc<Type>) {
        *self.cached_type.borrow_mut() = ty;
    }

    pub fn stack_index(&self) -> usize {
        self.stack_index
    }

    pub fn scope(&self) -> Option<Rc<Scope>> {
        self.scope.upgrade()
    }

    pub fn lazy_expression(&self) -> Option<Rc<Expression>> {
        self.lazy_expression.borrow().clone()
    }

    pub fn state(&self) -> LazyState {
        self.state.get()
    }

    pub fn is_evaluated(&self) -> bool {
        self.state.get() == LazyState::Evaluated
    }

    /// The compile-time value, if one has been established.
    pub fn value(&self) -> Option<Value> {
        self.value.borrow().clone()
    }

    /// Enter the `Evaluating` state; re-entrance is a cycle error.
    pub fn begin_evaluation(&self) -> Result<(), LoamError> {
        match self.state.get() {
            LazyState::Evaluating => Err(LoamError::cycle(format!(
                "variable `{}` depends on its own value",
                self.name
            ))),
            _ => {
                self.state.set(LazyState::Evaluating);
                Ok(())
            }
        }
    }

    pub fn finish_evaluation(&self, value: Value) {
        *self.value.borrow_mut() = Some(value);
        self.state.set(LazyState::Evaluated);
    }

    /// Roll back a failed evaluation so a later observation may retry.
    pub fn abort_evaluation(&self) {
        if self.state.get() == LazyState::Evaluating {
            self.state.set(LazyState::NotEvaluated);
        }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<variable {} @{} : {}>",
            self.name,
            self.stack_index,
            self.cached_type.borrow()
        )
    }
}

// ── Context ───────────────────────────────────────────────────────

/// Compile-time owner of all variables of a module or function. Grows
/// monotonically; stack indices handed out stay stable for its lifetime.
pub struct Context {
    imports: Vec<Rc<Context>>,
    top_scope: RefCell<Option<Rc<Scope>>>,
    all_variables: RefCell<Vec<Rc<Variable>>>,
    runtime_stack: RefCell<Option<Rc<Stack>>>,
}

impl Context {
    pub fn new(imports: Vec<Rc<Context>>) -> Rc<Context> {
        let ctx = Rc::new(Context {
            imports,
            top_scope: RefCell::new(None),
            all_variables: RefCell::new(Vec::new()),
            runtime_stack: RefCell::new(None),
        });
        let top = Rc::new(Scope {
            context: Rc::downgrade(&ctx),
            parent: None,
            variables: RefCell::new(Vec::new()),
        });
        *ctx.top_scope.borrow_mut() = Some(top);
        ctx
    }

    pub fn imports(&self) -> &[Rc<Context>] {
        &self.imports
    }

    pub fn top_scope(&self) -> Rc<Scope> {
        self.top_scope
            .borrow()
            .clone()
            .expect("context always has a top scope")
    }

    pub fn variable_count(&self) -> usize {
        self.all_variables.borrow().len()
    }

    pub fn variable(&self, index: usize) -> Option<Rc<Variable>> {
        self.all_variables.borrow().get(index).cloned()
    }

    fn register(&self, variable: Rc<Variable>) {
        self.all_variables.borrow_mut().push(variable);
    }

    /// Designate the canonical runtime stack for this context (the
    /// primitives registry does this so compile-time evaluation sees the
    /// same native values the evaluator will).
    pub fn set_runtime_stack(&self, stack: Rc<Stack>) {
        *self.runtime_stack.borrow_mut() = Some(stack);
    }

    pub fn runtime_stack(&self) -> Option<Rc<Stack>> {
        self.runtime_stack.borrow().clone()
    }

    /// A stack populated with the compile-time values established so far,
    /// for evaluating lazy initializers and type annotations during
    /// compilation. Returns the designated runtime stack when one exists.
    pub fn snapshot_stack(self: &Rc<Self>) -> Rc<Stack> {
        match self.runtime_stack() {
            Some(stack) => stack,
            None => self.new_stack(),
        }
    }

    /// A fresh execution stack for this context, imports resolved through
    /// the imported contexts' designated stacks, slots pre-filled with any
    /// compile-time values already established.
    pub fn new_stack(self: &Rc<Self>) -> Rc<Stack> {
        let imports = self.imports.iter().map(Context::snapshot_stack).collect();
        let stack = Stack::new(imports, self.variable_count());
        for variable in self.all_variables.borrow().iter() {
            if let Some(value) = variable.value() {
                // In range by construction.
                let _ = stack.set(variable.stack_index(), value);
            }
        }
        stack
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<context {} variables, {} imports>",
            self.variable_count(),
            self.imports.len()
        )
    }
}

// ── Scope ─────────────────────────────────────────────────────────

/// A lexical restriction over a context's variables. Scopes chain along
/// `parent`; only the top scope reaches the context's imports.
pub struct Scope {
    context: Weak<Context>,
    parent: Option<Rc<Scope>>,
    variables: RefCell<Vec<Rc<Variable>>>,
}

/// A variable found by name resolution, together with the import path
/// leading to its owning context (empty for the current context).
#[derive(Debug, Clone)]
pub struct ResolvedVariable {
    pub variable: Rc<Variable>,
    pub import_path: Vec<usize>,
}

impl ResolvedVariable {
    pub fn is_local(&self) -> bool {
        self.import_path.is_empty()
    }

    pub fn address(&self) -> VariableAddress {
        let mut indices = self.import_path.clone();
        indices.push(self.variable.stack_index());
        VariableAddress(indices)
    }
}

impl Scope {
    pub fn context(&self) -> Rc<Context> {
        self.context.upgrade().expect("context outlives its scopes")
    }

    pub fn parent(&self) -> Option<Rc<Scope>> {
        self.parent.clone()
    }

    pub fn child(self: &Rc<Self>) -> Rc<Scope> {
        Rc::new(Scope {
            context: self.context.clone(),
            parent: Some(self.clone()),
            variables: RefCell::new(Vec::new()),
        })
    }

    pub fn variables(&self) -> Vec<Rc<Variable>> {
        self.variables.borrow().clone()
    }

    /// Declare a new variable in this scope, allocating the next stack
    /// slot of the owning context. Duplicate names form overload sets.
    pub fn declare(self: &Rc<Self>, name: Name, cached_type: Rc<Type>) -> Rc<Variable> {
        self.declare_inner(name, cached_type, None)
    }

    /// Declare a lazy variable whose value is computed from `expression`
    /// the first time it is observed.
    pub fn declare_lazy(
        self: &Rc<Self>,
        name: Name,
        cached_type: Rc<Type>,
        expression: Rc<Expression>,
    ) -> Rc<Variable> {
        self.declare_inner(name, cached_type, Some(expression))
    }

    fn declare_inner(
        self: &Rc<Self>,
        name: Name,
        cached_type: Rc<Type>,
        lazy_expression: Option<Rc<Expression>>,
    ) -> Rc<Variable> {
        let context = self.context();
        let variable = Rc::new(Variable {
            name,
            cached_type: RefCell::new(cached_type),
            stack_index: context.variable_count(),
            scope: Rc::downgrade(self),
            lazy_expression: RefCell::new(lazy_expression),
            state: Cell::new(LazyState::NotEvaluated),
            value: RefCell::new(None),
        });
        context.register(variable.clone());
        self.variables.borrow_mut().push(variable.clone());
        variable
    }

    /// The nearest variable with this name, searching the scope chain and
    /// then the context's imports.
    pub fn lookup(self: &Rc<Self>, name: Name) -> Option<ResolvedVariable> {
        self.lookup_all(name).into_iter().next()
    }

    /// Every variable with this name from the nearest region declaring it:
    /// the scope chain first, then imported contexts transitively in
    /// declaration order. Multiple hits form an overload set.
    pub fn lookup_all(self: &Rc<Self>, name: Name) -> Vec<ResolvedVariable> {
        let mut found = Vec::new();
        let mut scope = Some(self.clone());
        while let Some(s) = scope {
            for variable in s.variables.borrow().iter() {
                if variable.name() == name {
                    found.push(ResolvedVariable {
                        variable: variable.clone(),
                        import_path: Vec::new(),
                    });
                }
            }
            scope = s.parent.clone();
        }
        if !found.is_empty() {
            return found;
        }
        let mut path = Vec::new();
        search_imports(&self.context(), name, &mut path, &mut found);
        found
    }

    /// One-line description of what is visible here, for diagnostics.
    pub fn describe(&self) -> String {
        let mut names: Vec<String> = self
            .variables
            .borrow()
            .iter()
            .map(|v| v.name().as_string())
            .collect();
        names.dedup();
        format!("scope [{}]", names.join(", "))
    }
}

/// Depth-first search of the import graph; the first context declaring
/// the name (in import order) contributes all its candidates.
fn search_imports(
    context: &Rc<Context>,
    name: Name,
    path: &mut Vec<usize>,
    found: &mut Vec<ResolvedVariable>,
) {
    // Import graphs are shallow; a generous depth cap guards against
    // accidental cycles.
    if path.len() > 64 {
        return;
    }
    for (i, import) in context.imports().iter().enumerate() {
        path.push(i);
        for variable in import.top_scope().variables.borrow().iter() {
            if variable.name() == name {
                found.push(ResolvedVariable {
                    variable: variable.clone(),
                    import_path: path.clone(),
                });
            }
        }
        if found.is_empty() {
            search_imports(import, name, path, found);
        }
        path.pop();
        if !found.is_empty() {
            return;
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.describe())
    }
}

// ── VariableAddress ───────────────────────────────────────────────

/// An ordered index sequence: imports in turn, then the stack slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableAddress(pub Vec<usize>);

impl VariableAddress {
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_allocates_consecutive_slots() {
        let ctx = Context::new(vec![]);
        let scope = ctx.top_scope();
        let a = scope.declare(Name::new("a"), Type::integer());
        let b = scope.declare(Name::new("b"), Type::float());
        assert_eq!(a.stack_index(), 0);
        assert_eq!(b.stack_index(), 1);
        assert_eq!(ctx.variable_count(), 2);
    }

    #[test]
    fn test_child_scope_sees_parent_not_vice_versa() {
        let ctx = Context::new(vec![]);
        let top = ctx.top_scope();
        top.declare(Name::new("outer"), Type::any());
        let child = top.child();
        child.declare(Name::new("inner"), Type::any());

        assert!(child.lookup(Name::new("outer")).is_some());
        assert!(top.lookup(Name::new("inner")).is_none());
    }

    #[test]
    fn test_shadowing_finds_nearest() {
        let ctx = Context::new(vec![]);
        let top = ctx.top_scope();
        let outer = top.declare(Name::new("x"), Type::integer());
        let child = top.child();
        let inner = child.declare(Name::new("x"), Type::float());

        let hit = child.lookup(Name::new("x")).unwrap();
        assert_eq!(hit.variable.stack_index(), inner.stack_index());
        let hit = top.lookup(Name::new("x")).unwrap();
        assert_eq!(hit.variable.stack_index(), outer.stack_index());
    }

    #[test]
    fn test_lookup_crosses_imports_with_path() {
        let prims = Context::new(vec![]);
        prims.top_scope().declare(Name::new("Int"), Type::any());
        let module = Context::new(vec![prims]);
        let function = Context::new(vec![module]);

        let hit = function.top_scope().lookup(Name::new("Int")).unwrap();
        assert_eq!(hit.import_path, vec![0, 0]);
        assert_eq!(hit.address().indices(), &[0, 0, 0]);
    }

    #[test]
    fn test_overloads_collect_in_declaration_order() {
        let ctx = Context::new(vec![]);
        let scope = ctx.top_scope();
        let first = scope.declare(Name::new("f"), Type::any());
        let second = scope.declare(Name::new("f"), Type::any());
        let hits = scope.lookup_all(Name::new("f"));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].variable.stack_index(), first.stack_index());
        assert_eq!(hits[1].variable.stack_index(), second.stack_index());
    }

    #[test]
    fn test_lazy_state_machine_detects_cycles() {
        let ctx = Context::new(vec![]);
        let scope = ctx.top_scope();
        let v = scope.declare_lazy(
            Name::new("lazy"),
            Type::any(),
            Expression::literal(Value::int(1)),
        );
        assert_eq!(v.state(), LazyState::NotEvaluated);
        v.begin_evaluation().unwrap();
        assert!(matches!(
            v.begin_evaluation(),
            Err(LoamError::Cycle(_))
        ));
        v.finish_evaluation(Value::int(1));
        assert!(v.is_evaluated());
        assert_eq!(v.value(), Some(Value::int(1)));
    }

    #[test]
    fn test_snapshot_stack_carries_evaluated_values() {
        let ctx = Context::new(vec![]);
        let scope = ctx.top_scope();
        let v = scope.declare(Name::new("k"), Type::integer());
        v.finish_evaluation(Value::int(9));
        let stack = ctx.snapshot_stack();
        assert_eq!(stack.get(v.stack_index()).unwrap(), Value::int(9));
    }
}
